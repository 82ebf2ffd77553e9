use super::traits::VideoQuality;

/// Rank a host's quality label; higher is better, unknown labels rank 0.
///
/// `auto` sits between 480p and 720p since adaptive streams usually settle on
/// a decent rendition.
#[must_use]
pub fn quality_priority(label: &str) -> u32 {
    let lower = label.trim().to_lowercase();
    match lower.as_str() {
        "4k" | "2160p" | "2160" => 2160,
        "1440p" | "1440" => 1440,
        "1080p" | "1080" | "full" | "hd" => 1080,
        "720p" | "720" => 720,
        "480p" | "480" | "sd" => 480,
        "360p" | "360" => 360,
        "240p" | "240" => 240,
        "144p" | "144" => 144,
        "auto" => 500,
        _ if lower.contains("1080") => 1080,
        _ if lower.contains("720") => 720,
        _ if lower.contains("480") => 480,
        _ => 0,
    }
}

/// Highest-ranked quality; the first one wins a tie.
#[must_use]
pub fn select_best(qualities: &[VideoQuality]) -> Option<&VideoQuality> {
    qualities.iter().fold(None, |best, candidate| match best {
        Some(current) if quality_priority(&current.name) >= quality_priority(&candidate.name) => {
            Some(current)
        }
        _ => Some(candidate),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> Vec<VideoQuality> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| VideoQuality::new(*name, format!("https://cdn.example/{i}")))
            .collect()
    }

    #[test]
    fn test_priority_table() {
        assert_eq!(quality_priority("4K"), 2160);
        assert_eq!(quality_priority("hd"), 1080);
        assert_eq!(quality_priority("Full"), 1080);
        assert_eq!(quality_priority("sd"), 480);
        assert_eq!(quality_priority("auto"), 500);
        assert_eq!(quality_priority("144p"), 144);
        assert_eq!(quality_priority("1080p60"), 1080);
        assert_eq!(quality_priority("h264_720"), 720);
        assert_eq!(quality_priority("mobile"), 0);
    }

    #[test]
    fn test_auto_between_480_and_720() {
        assert!(quality_priority("auto") > quality_priority("480p"));
        assert!(quality_priority("auto") < quality_priority("720p"));
    }

    #[test]
    fn test_select_best() {
        let qualities = labels(&["360p", "1080p", "auto", "720"]);
        assert_eq!(select_best(&qualities).unwrap().name, "1080p");
    }

    #[test]
    fn test_select_best_tie_keeps_first() {
        let qualities = labels(&["mobile", "lowest"]);
        assert_eq!(select_best(&qualities).unwrap().url, "https://cdn.example/0");

        let qualities = labels(&["hd", "1080p"]);
        assert_eq!(select_best(&qualities).unwrap().name, "hd");
    }

    #[test]
    fn test_select_best_empty() {
        assert!(select_best(&[]).is_none());
    }
}
