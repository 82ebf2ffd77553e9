//! Bypass session manager for the protected origin.
//!
//! Owns the choice between routing requests through the browser-automation
//! solver and issuing them directly with solver-obtained cookies. A successful
//! solver-routed call installs a direct channel as a side effect, so the
//! *next* call takes the cheaper direct path.

mod challenge;
mod channel;
mod error;
mod models;

pub use challenge::{is_challenge, is_interstitial_response};
pub use channel::DirectChannel;
pub use error::FetchError;
pub use models::{Solution, SolverCookie, SolverRequest, SolverResponse};

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::Config;
use crate::constants::{COOKIE_ACQUIRE_TIMEOUT_MS, SOLVER_MARKER};

/// Timeout for the health probe against the solver root.
const PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// A fetched page, from either channel.
#[derive(Debug, Clone)]
pub struct Page {
    pub url: String,
    pub status: u16,
    pub body: String,
}

impl Page {
    pub(crate) async fn read(response: reqwest::Response) -> Result<Self, FetchError> {
        let url = response.url().to_string();
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(Self { url, status, body })
    }

    fn from_solution(solution: Solution, requested: &str) -> Self {
        Self {
            url: if solution.url.is_empty() {
                requested.to_string()
            } else {
                solution.url
            },
            status: solution.status,
            body: solution.response.unwrap_or_default(),
        }
    }

    /// 2xx, or no status reported at all.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == 0 || (200..300).contains(&self.status)
    }

    fn ensure_success(self) -> Result<Self, FetchError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(FetchError::Status {
                url: self.url,
                status: self.status,
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStatus {
    /// Never probed, or the endpoint changed since the last probe.
    Unconfigured,
    Available,
    Unavailable,
}

/// How requests to the protected origin are currently issued.
#[derive(Debug, Clone)]
pub enum Channel {
    SolverBacked,
    Direct(DirectChannel),
}

/// Point-in-time view of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub endpoint: String,
    pub solver: SolverStatus,
    pub has_direct_channel: bool,
    pub user_agent: Option<String>,
    pub last_error: Option<String>,
}

impl SessionSnapshot {
    /// Whether the solver has been probed since the endpoint was last set.
    #[must_use]
    pub fn configured(&self) -> bool {
        self.solver != SolverStatus::Unconfigured
    }

    /// Whether the last probe succeeded.
    #[must_use]
    pub fn available(&self) -> bool {
        self.solver == SolverStatus::Available
    }
}

struct SessionState {
    endpoint: String,
    solver: SolverStatus,
    channel: Channel,
    /// Bumped every time a direct channel is installed.
    generation: u64,
    last_error: Option<String>,
}

#[derive(Clone, Copy)]
enum Method<'a> {
    Get,
    Post(&'a str),
}

impl<'a> Method<'a> {
    const fn solver_cmd(self) -> &'static str {
        match self {
            Self::Get => "request.get",
            Self::Post(_) => "request.post",
        }
    }

    const fn post_data(self) -> Option<&'a str> {
        match self {
            Self::Get => None,
            Self::Post(body) => Some(body),
        }
    }
}

/// Process-lifetime session against one protected origin.
pub struct BypassSession {
    http: reqwest::Client,
    channel_timeout: Duration,
    state: Mutex<SessionState>,
    probe_gate: tokio::sync::Mutex<()>,
    acquire_gate: tokio::sync::Mutex<()>,
}

impl BypassSession {
    /// Create an unconfigured session.
    ///
    /// `solver_timeout` bounds every call to the solver; `channel_timeout` bounds
    /// direct-channel requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        endpoint: &str,
        solver_timeout: Duration,
        channel_timeout: Duration,
    ) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder().timeout(solver_timeout).build()?;

        Ok(Self {
            http,
            channel_timeout,
            state: Mutex::new(SessionState {
                endpoint: endpoint.to_string(),
                solver: SolverStatus::Unconfigured,
                channel: Channel::SolverBacked,
                generation: 0,
                last_error: None,
            }),
            probe_gate: tokio::sync::Mutex::new(()),
            acquire_gate: tokio::sync::Mutex::new(()),
        })
    }

    /// Create a session from application configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        Self::new(
            &config.solver_url,
            config.solver_timeout,
            config.request_timeout,
        )
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current solver request endpoint.
    #[must_use]
    pub fn endpoint(&self) -> String {
        self.state().endpoint.clone()
    }

    /// Change the solver endpoint. A different value marks the session unconfigured.
    pub fn set_endpoint(&self, endpoint: &str) {
        let mut state = self.state();
        if state.endpoint != endpoint {
            info!(endpoint = %endpoint, "Solver endpoint changed");
            state.endpoint = endpoint.to_string();
            state.solver = SolverStatus::Unconfigured;
        }
    }

    /// Copy of the current session state.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state();
        let user_agent = match &state.channel {
            Channel::Direct(channel) => Some(channel.user_agent().to_string()),
            Channel::SolverBacked => None,
        };
        SessionSnapshot {
            endpoint: state.endpoint.clone(),
            solver: state.solver,
            has_direct_channel: user_agent.is_some(),
            user_agent,
            last_error: state.last_error.clone(),
        }
    }

    /// Whether the last probe found the solver.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.state().solver == SolverStatus::Available
    }

    /// Whether requests currently go out directly with solver cookies.
    #[must_use]
    pub fn has_direct_channel(&self) -> bool {
        matches!(self.state().channel, Channel::Direct(_))
    }

    /// Diagnostic from the most recent failure, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.state().last_error.clone()
    }

    fn record_error(&self, error: &FetchError) {
        self.state().last_error = Some(error.to_string());
    }

    fn direct_channel(&self) -> Option<(DirectChannel, u64)> {
        let state = self.state();
        match &state.channel {
            Channel::Direct(channel) => Some((channel.clone(), state.generation)),
            Channel::SolverBacked => None,
        }
    }

    fn install_channel(&self, channel: DirectChannel) {
        let mut state = self.state();
        state.channel = Channel::Direct(channel);
        state.generation += 1;
    }

    /// Drop the direct channel; subsequent requests route through the solver.
    pub fn invalidate_cookies(&self) {
        let mut state = self.state();
        if matches!(state.channel, Channel::Direct(_)) {
            info!("Cookies invalidated");
        }
        state.channel = Channel::SolverBacked;
    }

    fn invalidate_generation(&self, generation: u64) {
        let mut state = self.state();
        if state.generation == generation {
            state.channel = Channel::SolverBacked;
        }
    }

    /// Probe the solver, optionally switching endpoints first.
    ///
    /// Idempotent once configured unless the endpoint changes. Concurrent callers
    /// share a single probe.
    pub async fn configure(&self, endpoint: Option<&str>) -> bool {
        if let Some(endpoint) = endpoint {
            self.set_endpoint(endpoint);
        }

        let _gate = self.probe_gate.lock().await;

        let endpoint = {
            let state = self.state();
            match state.solver {
                SolverStatus::Available => return true,
                SolverStatus::Unavailable => return false,
                SolverStatus::Unconfigured => state.endpoint.clone(),
            }
        };

        let outcome = self.run_probe(&endpoint).await;

        let mut state = self.state();
        if state.endpoint != endpoint {
            debug!(endpoint = %endpoint, "Endpoint changed during probe, discarding result");
            return false;
        }
        match outcome {
            Ok(()) => {
                info!(endpoint = %endpoint, "Solver available");
                state.solver = SolverStatus::Available;
                state.last_error = None;
                true
            }
            Err(e) => {
                warn!(endpoint = %endpoint, error = %e, "Solver unavailable");
                state.solver = SolverStatus::Unavailable;
                state.last_error = Some(e.to_string());
                false
            }
        }
    }

    async fn run_probe(&self, endpoint: &str) -> Result<(), FetchError> {
        let root = solver_root(endpoint);
        debug!(url = %root, "Probing solver");

        let response = self.http.get(&root).timeout(PROBE_TIMEOUT).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::ProbeFailed(format!(
                "solver answered HTTP {}",
                status.as_u16()
            )));
        }

        let body = response.text().await?;
        if body.to_lowercase().contains(SOLVER_MARKER) {
            Ok(())
        } else {
            Err(FetchError::ProbeFailed(
                "response does not identify a solver".to_string(),
            ))
        }
    }

    /// Have the solver load `target_url` and build a direct channel from its cookies.
    ///
    /// On failure the previous channel, if any, is left in place.
    pub async fn acquire_cookies(&self, target_url: &str, cancel: &CancellationToken) -> bool {
        let seen = self.state().generation;
        let _gate = self.acquire_gate.lock().await;

        {
            let state = self.state();
            if state.generation != seen && matches!(state.channel, Channel::Direct(_)) {
                debug!(url = %target_url, "Cookies acquired by a concurrent caller");
                return true;
            }
        }

        info!(url = %target_url, "Acquiring cookies via solver");
        match self.fetch_cookies(target_url, cancel).await {
            Ok(channel) => {
                info!(
                    url = %target_url,
                    cookies = channel.cookie_count(),
                    "Cookies acquired"
                );
                self.install_channel(channel);
                true
            }
            Err(e) => {
                warn!(url = %target_url, error = %e, "Cookie acquisition failed");
                self.record_error(&e);
                false
            }
        }
    }

    async fn fetch_cookies(
        &self,
        target_url: &str,
        cancel: &CancellationToken,
    ) -> Result<DirectChannel, FetchError> {
        let target = Url::parse(target_url).map_err(|e| FetchError::invalid_url(target_url, e))?;
        if !self.configure(None).await {
            return Err(FetchError::SolverUnavailable);
        }
        let solution = self
            .solver_command(Method::Get, target_url, COOKIE_ACQUIRE_TIMEOUT_MS, cancel)
            .await?;
        DirectChannel::from_solution(&solution, &target, self.channel_timeout)
    }

    /// GET `url`, directly when cookies are held, otherwise through the solver.
    ///
    /// Failures are recorded in [`last_error`](Self::last_error) and yield `None`.
    pub async fn get(
        &self,
        url: &str,
        max_timeout_ms: u64,
        cancel: &CancellationToken,
    ) -> Option<Page> {
        self.try_get(url, max_timeout_ms, cancel).await.ok()
    }

    /// POST a form-encoded `body` to `url`; routed like [`get`](Self::get).
    pub async fn post(
        &self,
        url: &str,
        body: &str,
        max_timeout_ms: u64,
        cancel: &CancellationToken,
    ) -> Option<Page> {
        self.try_post(url, body, max_timeout_ms, cancel).await.ok()
    }

    /// Like [`get`](Self::get), keeping the failure cause.
    ///
    /// # Errors
    ///
    /// Returns the transport, protocol or challenge failure; it is also recorded
    /// as the last error.
    pub async fn try_get(
        &self,
        url: &str,
        max_timeout_ms: u64,
        cancel: &CancellationToken,
    ) -> Result<Page, FetchError> {
        self.request(url, Method::Get, max_timeout_ms, cancel).await
    }

    /// Like [`post`](Self::post), keeping the failure cause.
    ///
    /// # Errors
    ///
    /// Returns the transport, protocol or challenge failure; it is also recorded
    /// as the last error.
    pub async fn try_post(
        &self,
        url: &str,
        body: &str,
        max_timeout_ms: u64,
        cancel: &CancellationToken,
    ) -> Result<Page, FetchError> {
        self.request(url, Method::Post(body), max_timeout_ms, cancel)
            .await
    }

    async fn request(
        &self,
        url: &str,
        method: Method<'_>,
        max_timeout_ms: u64,
        cancel: &CancellationToken,
    ) -> Result<Page, FetchError> {
        let result = match self.direct_channel() {
            Some((channel, generation)) => {
                self.direct_request(&channel, generation, url, method, cancel)
                    .await
            }
            None => self.solver_request(url, method, max_timeout_ms, cancel).await,
        };
        if let Err(e) = &result {
            debug!(url = %url, error = %e, "Request failed");
            self.record_error(e);
        }
        result
    }

    async fn direct_request(
        &self,
        channel: &DirectChannel,
        generation: u64,
        url: &str,
        method: Method<'_>,
        cancel: &CancellationToken,
    ) -> Result<Page, FetchError> {
        debug!(url = %url, method = method.solver_cmd(), "Direct request with cookies");
        let page = cancellable(cancel, async {
            match method {
                Method::Get => channel.get(url).await,
                Method::Post(body) => channel.post_form(url, body).await,
            }
        })
        .await?;

        if is_interstitial_response(page.status, &page.body) {
            warn!(url = %url, status = page.status, "Challenge served on direct channel, dropping cookies");
            self.invalidate_generation(generation);
            return Err(FetchError::Challenge {
                url: url.to_string(),
            });
        }
        page.ensure_success()
    }

    async fn solver_request(
        &self,
        url: &str,
        method: Method<'_>,
        max_timeout_ms: u64,
        cancel: &CancellationToken,
    ) -> Result<Page, FetchError> {
        let target = Url::parse(url).map_err(|e| FetchError::invalid_url(url, e))?;
        if !self.configure(None).await {
            return Err(FetchError::SolverUnavailable);
        }

        debug!(url = %url, cmd = method.solver_cmd(), "Request via solver");
        let solution = self
            .solver_command(method, url, max_timeout_ms, cancel)
            .await?;

        match DirectChannel::from_solution(&solution, &target, self.channel_timeout) {
            Ok(channel) => {
                info!(url = %url, "Solver response upgraded session to direct channel");
                self.install_channel(channel);
            }
            Err(e) => debug!(url = %url, error = %e, "Solver response yielded no direct channel"),
        }

        Page::from_solution(solution, url).ensure_success()
    }

    async fn solver_command(
        &self,
        method: Method<'_>,
        url: &str,
        max_timeout_ms: u64,
        cancel: &CancellationToken,
    ) -> Result<Solution, FetchError> {
        let endpoint = self.endpoint();
        let request = SolverRequest {
            cmd: method.solver_cmd(),
            url,
            max_timeout: max_timeout_ms,
            post_data: method.post_data(),
        };

        cancellable(cancel, async {
            let response = self.http.post(&endpoint).json(&request).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status {
                    url: endpoint.clone(),
                    status: status.as_u16(),
                });
            }
            let parsed: SolverResponse = response
                .json()
                .await
                .map_err(|e| FetchError::Decode(e.to_string()))?;
            parsed.into_solution().map_err(FetchError::Solver)
        })
        .await
    }
}

/// Race `future` against `cancel`; cancellation wins ties.
pub(crate) async fn cancellable<T, F>(cancel: &CancellationToken, future: F) -> Result<T, FetchError>
where
    F: Future<Output = Result<T, FetchError>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(FetchError::Cancelled),
        result = future => result,
    }
}

/// Root of the solver service, where its health banner is served.
fn solver_root(endpoint: &str) -> String {
    let trimmed = endpoint.trim_end_matches('/');
    trimmed
        .strip_suffix("/v1")
        .unwrap_or(trimmed)
        .trim_end_matches('/')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solver_root() {
        assert_eq!(solver_root("http://host:8191/v1"), "http://host:8191");
        assert_eq!(solver_root("http://host:8191/v1/"), "http://host:8191");
        assert_eq!(solver_root("http://host:8191"), "http://host:8191");
        assert_eq!(solver_root("http://host:8191/"), "http://host:8191");
    }

    #[test]
    fn test_set_endpoint_resets_configuration() {
        let session =
            BypassSession::new("http://a:8191/v1", Duration::from_secs(1), Duration::from_secs(1))
                .unwrap();
        session.state().solver = SolverStatus::Available;

        session.set_endpoint("http://a:8191/v1");
        assert!(session.snapshot().configured());

        session.set_endpoint("http://b:8191/v1");
        let snapshot = session.snapshot();
        assert!(!snapshot.configured());
        assert_eq!(snapshot.endpoint, "http://b:8191/v1");
    }

    #[test]
    fn test_page_status() {
        let page = Page {
            url: "https://site.example/".to_string(),
            status: 404,
            body: String::new(),
        };
        assert!(!page.is_success());
        assert!(matches!(
            page.ensure_success(),
            Err(FetchError::Status { status: 404, .. })
        ));

        let unknown = Page {
            url: String::new(),
            status: 0,
            body: String::new(),
        };
        assert!(unknown.is_success());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: Result<(), FetchError> =
            cancellable(&cancel, std::future::pending()).await;
        assert!(matches!(result, Err(FetchError::Cancelled)));
    }
}
