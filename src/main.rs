use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use videopost_scraper::config::Config;
use videopost_scraper::listing::SiteScraper;

const DEFAULT_PAGE_SIZE: usize = 20;

/// List video posts and resolve their players to media URLs.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Defaults to `list` for the first page
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Print one page of the listing as JSON
    List {
        /// Page number, starting at 1
        #[arg(default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        page: u32,

        /// Maximum number of posts to print
        #[arg(default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: usize,
    },

    /// Find a post's player and resolve it
    Resolve {
        /// URL of the post page
        page_url: String,
    },

    /// Resolve an embed URL directly
    Embed {
        /// URL of the embedded player
        embed_url: String,
    },
}

impl Cli {
    fn into_command(self) -> Command {
        self.command.unwrap_or(Command::List {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let command = Cli::parse().into_command();

    // Load .env file if present
    let _ = dotenvy::dotenv();

    // Initialize logging
    init_tracing()?;

    // Load and validate configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    info!(
        site = %config.site_base_url,
        solver = %config.solver_url,
        "Configuration loaded"
    );

    let scraper = SiteScraper::new(config).context("Failed to initialize scraper")?;

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    match command {
        Command::List { page, page_size } => {
            let posts = scraper.get_videos(page, page_size, &cancel).await;
            if posts.is_empty() {
                warn!(
                    page,
                    last_error = ?scraper.session().last_error(),
                    "No posts returned"
                );
            }
            println!("{}", serde_json::to_string_pretty(&posts)?);
        }
        Command::Resolve { page_url } => match scraper.resolve_post(&page_url, &cancel).await {
            Some(info) => println!("{}", serde_json::to_string_pretty(&info)?),
            None => {
                warn!(url = %page_url, "No embeddable player found");
                println!("null");
            }
        },
        Command::Embed { embed_url } => {
            let info = scraper.resolve_embed(&embed_url, &cancel).await;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
    }

    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,videopost_scraper=debug"));

    // Check if JSON logging is requested
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    // Logs go to stderr so stdout stays machine-readable
    if use_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}

async fn cancel_on_signal(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Interrupted, cancelling in-flight requests");
            cancel.cancel();
        }
        Err(e) => warn!(error = %e, "Failed to install Ctrl+C handler"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Command, clap::Error> {
        Cli::try_parse_from(std::iter::once("videopost-scraper").chain(args.iter().copied()))
            .map(Cli::into_command)
    }

    #[test]
    fn test_parse_list_defaults() {
        assert_eq!(
            parse(&[]).unwrap(),
            Command::List {
                page: 1,
                page_size: DEFAULT_PAGE_SIZE
            }
        );
        assert_eq!(
            parse(&["list"]).unwrap(),
            Command::List {
                page: 1,
                page_size: DEFAULT_PAGE_SIZE
            }
        );
        assert_eq!(
            parse(&["list", "3", "5"]).unwrap(),
            Command::List {
                page: 3,
                page_size: 5
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse(&["list", "x"]).is_err());
        assert!(parse(&["list", "0"]).is_err());
        assert!(parse(&["resolve"]).is_err());
        assert!(parse(&["frobnicate"]).is_err());
    }

    #[test]
    fn test_help_is_not_a_page_number() {
        let err = parse(&["list", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);

        let err = parse(&["--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_parse_embed() {
        assert_eq!(
            parse(&["embed", "https://ok.ru/videoembed/1"]).unwrap(),
            Command::Embed {
                embed_url: "https://ok.ru/videoembed/1".to_string()
            }
        );
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
