use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::header::{self, HeaderMap, HeaderValue};
use tracing::debug;
use url::Url;

use super::error::FetchError;
use super::models::{Solution, SolverCookie};
use super::Page;
use crate::constants::{ACCEPT_HTML, ACCEPT_LANGUAGE};

/// HTTP client carrying solver-obtained cookies and the solver browser's user agent.
///
/// Only constructible from a solution with a non-empty user agent and at least one cookie.
#[derive(Debug, Clone)]
pub struct DirectChannel {
    client: reqwest::Client,
    user_agent: String,
    cookie_count: usize,
}

impl DirectChannel {
    /// Build a fresh cookie jar and client from a solver solution.
    ///
    /// # Errors
    ///
    /// Returns an error if the solution has no user agent or no cookies, or the client
    /// cannot be built.
    pub fn from_solution(
        solution: &Solution,
        target: &Url,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let user_agent = solution.user_agent.trim();
        if user_agent.is_empty() {
            return Err(FetchError::IncompleteSolution("no user agent"));
        }
        let user_agent_header = HeaderValue::from_str(user_agent)
            .map_err(|_| FetchError::IncompleteSolution("user agent is not a valid header"))?;

        let jar = Arc::new(Jar::default());
        let mut cookie_count = 0;
        for cookie in solution.cookies.iter().flatten() {
            if cookie.name.is_empty() {
                continue;
            }
            let scope = cookie_scope(cookie, target);
            jar.add_cookie_str(&cookie.to_set_cookie(), &scope);
            cookie_count += 1;
        }
        if cookie_count == 0 {
            return Err(FetchError::IncompleteSolution("no cookies"));
        }

        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, user_agent_header);
        headers.insert(header::ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGE));

        let client = reqwest::Client::builder()
            .cookie_provider(jar)
            .default_headers(headers)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;

        debug!(cookies = cookie_count, host = ?target.host_str(), "Built direct channel");

        Ok(Self {
            client,
            user_agent: user_agent.to_string(),
            cookie_count,
        })
    }

    /// User agent reported by the solver's browser.
    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Number of cookies loaded into the jar.
    #[must_use]
    pub fn cookie_count(&self) -> usize {
        self.cookie_count
    }

    pub(crate) async fn get(&self, url: &str) -> Result<Page, FetchError> {
        let response = self.client.get(url).send().await?;
        Page::read(response).await
    }

    pub(crate) async fn post_form(&self, url: &str, body: &str) -> Result<Page, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::invalid_url(url, e))?;
        let response = self
            .client
            .post(url)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header("X-Requested-With", "XMLHttpRequest")
            .header(header::ORIGIN, parsed.origin().ascii_serialization())
            .body(body.to_string())
            .send()
            .await?;
        Page::read(response).await
    }
}

/// URL a solver cookie is registered against: its own domain, or the target when host-only.
fn cookie_scope(cookie: &SolverCookie, target: &Url) -> Url {
    let domain = cookie.bare_domain();
    if domain.is_empty() {
        return target.clone();
    }
    let path = if cookie.path.starts_with('/') {
        cookie.path.as_str()
    } else {
        "/"
    };
    Url::parse(&format!("{}://{domain}{path}", target.scheme())).unwrap_or_else(|_| target.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solution(user_agent: &str, cookies: Vec<SolverCookie>) -> Solution {
        Solution {
            url: "https://site.example/".to_string(),
            status: 200,
            user_agent: user_agent.to_string(),
            cookies: Some(cookies),
            ..Solution::default()
        }
    }

    fn clearance() -> SolverCookie {
        SolverCookie {
            name: "cf_clearance".to_string(),
            value: "abc".to_string(),
            domain: ".site.example".to_string(),
            ..SolverCookie::default()
        }
    }

    #[test]
    fn test_builds_from_complete_solution() {
        let target = Url::parse("https://site.example/douga").unwrap();
        let channel = DirectChannel::from_solution(
            &solution("Mozilla/5.0 Test", vec![clearance()]),
            &target,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(channel.user_agent(), "Mozilla/5.0 Test");
        assert_eq!(channel.cookie_count(), 1);
    }

    #[test]
    fn test_rejects_missing_user_agent() {
        let target = Url::parse("https://site.example/").unwrap();
        let err = DirectChannel::from_solution(
            &solution("  ", vec![clearance()]),
            &target,
            Duration::from_secs(5),
        )
        .unwrap_err();
        assert!(matches!(err, FetchError::IncompleteSolution(_)));
    }

    #[test]
    fn test_rejects_empty_cookie_jar() {
        let target = Url::parse("https://site.example/").unwrap();
        let err = DirectChannel::from_solution(
            &solution("Mozilla/5.0 Test", Vec::new()),
            &target,
            Duration::from_secs(5),
        )
        .unwrap_err();
        assert!(matches!(err, FetchError::IncompleteSolution("no cookies")));
    }

    #[test]
    fn test_cookie_scope_uses_own_domain() {
        let target = Url::parse("https://www.site.example/page").unwrap();
        let scope = cookie_scope(&clearance(), &target);
        assert_eq!(scope.as_str(), "https://site.example/");

        let host_only = SolverCookie {
            domain: String::new(),
            ..clearance()
        };
        assert_eq!(cookie_scope(&host_only, &target), target);
    }
}
