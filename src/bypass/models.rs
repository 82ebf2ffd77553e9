//! Wire models for the browser-automation solver's JSON API.

use std::collections::HashMap;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Command posted to the solver endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolverRequest<'a> {
    /// `request.get` or `request.post`.
    pub cmd: &'a str,
    pub url: &'a str,
    /// Milliseconds the solver may spend in the browser.
    pub max_timeout: u64,
    /// Form-encoded body for `request.post`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_data: Option<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolverResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub solution: Option<Solution>,
}

impl SolverResponse {
    /// The solution, if the solver reported success.
    ///
    /// # Errors
    ///
    /// Returns the solver's message when the status is not `ok` or no solution was sent.
    pub fn into_solution(self) -> Result<Solution, String> {
        match (self.status.as_str(), self.solution) {
            ("ok", Some(solution)) => Ok(solution),
            _ if self.message.is_empty() => Err("unknown solver error".to_string()),
            _ => Err(self.message),
        }
    }
}

/// What the solver's browser saw for the requested URL.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Solution {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub headers: Option<HashMap<String, serde_json::Value>>,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub cookies: Option<Vec<SolverCookie>>,
    #[serde(default)]
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SolverCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub expires: f64,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: String,
}

impl Default for SolverCookie {
    fn default() -> Self {
        Self {
            name: String::new(),
            value: String::new(),
            domain: String::new(),
            path: "/".to_string(),
            expires: 0.0,
            http_only: false,
            secure: false,
            same_site: String::new(),
        }
    }
}

impl SolverCookie {
    /// Cookie domain with the leading dot removed, so it covers the bare domain and subdomains.
    #[must_use]
    pub fn bare_domain(&self) -> &str {
        self.domain.trim_start_matches('.')
    }

    /// Render as a `Set-Cookie` header value for the cookie jar.
    #[must_use]
    pub fn to_set_cookie(&self) -> String {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        let mut header = format!("{}={}; Path={path}", self.name, self.value);
        // IP hosts cannot carry a Domain attribute; leave those host-only.
        if !self.bare_domain().is_empty() && self.bare_domain().parse::<IpAddr>().is_err() {
            header.push_str("; Domain=");
            header.push_str(self.bare_domain());
        }
        if self.secure {
            header.push_str("; Secure");
        }
        if self.http_only {
            header.push_str("; HttpOnly");
        }
        header
    }
}
