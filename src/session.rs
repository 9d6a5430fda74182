//! Session handling for OData services
//!
//! A [`Session`] owns the connection to one host: credentials, the CSRF
//! token required on state-changing requests, and the transport handle.
//! Configuration is passed explicitly at construction; nothing is read from
//! ambient state. The lifecycle is construct → use → [`Session::close`],
//! after which every call fails with [`Error::SessionClosed`].

use std::time::Duration;

use crate::error::{Error, Result};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};

const CSRF_HEADER: &str = "x-csrf-token";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Hostname of the OData source system, without scheme or port.
    pub host: String,
    pub username: String,
    pub password: String,
    /// "https" unless overridden.
    pub scheme: String,
    pub port: u16,
    /// Per-request timeout enforced by the transport.
    pub timeout: Duration,
}

impl SessionConfig {
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            password: password.into(),
            scheme: "https".to_string(),
            port: 443,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Unauthenticated,
    Authenticated,
    Closed,
}

/// A blocking connection to one OData host.
///
/// Shared (not duplicated) across fetch and batch calls for the services on
/// that host. Not internally synchronized; callers sharing a session across
/// threads must serialize access externally.
pub struct Session {
    config: SessionConfig,
    transport: Option<Box<dyn HttpTransport>>,
    csrf_token: Option<String>,
    state: SessionState,
}

impl Session {
    /// Open a session against `config.host` using the default reqwest
    /// transport.
    pub fn new(config: SessionConfig) -> Result<Self> {
        let transport =
            ReqwestTransport::new(config.timeout, &config.username, &config.password)?;
        Self::with_transport(config, Box::new(transport))
    }

    /// Open a session with a caller-supplied transport.
    pub fn with_transport(
        config: SessionConfig,
        transport: Box<dyn HttpTransport>,
    ) -> Result<Self> {
        if config.host.trim().is_empty() {
            return Err(Error::Validation(
                "session host must not be empty".to_string(),
            ));
        }
        Ok(Self {
            config,
            transport: Some(transport),
            csrf_token: None,
            state: SessionState::Unauthenticated,
        })
    }

    /// Close the session, releasing the connection handle. Further calls
    /// fail with [`Error::SessionClosed`].
    pub fn close(&mut self) {
        if self.state != SessionState::Closed {
            log::debug!("closing session to {}", self.config.host);
        }
        self.transport = None;
        self.csrf_token = None;
        self.state = SessionState::Closed;
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state == SessionState::Closed {
            return Err(Error::SessionClosed);
        }
        Ok(())
    }

    fn execute(&mut self, request: &HttpRequest) -> Result<HttpResponse> {
        let transport = self.transport.as_mut().ok_or(Error::SessionClosed)?;
        transport.execute(request)
    }

    /// Remember the CSRF token a response carries, if any.
    fn harvest_token(&mut self, response: &HttpResponse) {
        if let Some(token) = response.header(CSRF_HEADER) {
            if token != "Required" && !token.is_empty() {
                self.csrf_token = Some(token.to_string());
            }
        }
    }

    fn build_get(&self, path: &str) -> HttpRequest {
        HttpRequest::new("GET", format!("{}{}", self.config.base_url(), path))
            .header("Accept", "application/json")
            .header(
                CSRF_HEADER,
                self.csrf_token.as_deref().unwrap_or("fetch"),
            )
    }

    /// Issue a GET. On a 401/403 the CSRF token is discarded, re-fetched
    /// and the request retried exactly once; a second rejection surfaces as
    /// [`Error::Authentication`].
    pub(crate) fn get(&mut self, path: &str) -> Result<HttpResponse> {
        self.ensure_open()?;
        let response = self.execute(&self.build_get(path))?;
        self.harvest_token(&response);

        if matches!(response.status, 401 | 403) {
            log::debug!(
                "GET {} rejected with HTTP {}, refreshing token and retrying once",
                path,
                response.status
            );
            self.csrf_token = None;
            let retry = self.execute(&self.build_get(path))?;
            self.harvest_token(&retry);
            if matches!(retry.status, 401 | 403) {
                return Err(Error::Authentication(format!(
                    "GET {} rejected after token refresh (HTTP {})",
                    path, retry.status
                )));
            }
            self.state = SessionState::Authenticated;
            return Ok(retry);
        }

        if response.is_success() {
            self.state = SessionState::Authenticated;
        }
        Ok(response)
    }

    fn build_post(&self, path: &str, content_type: &str, body: &str) -> HttpRequest {
        let mut request = HttpRequest::new("POST", format!("{}{}", self.config.base_url(), path))
            .header("Accept", "application/json")
            .header("Content-Type", content_type)
            .body(body.to_string());
        if let Some(token) = &self.csrf_token {
            request = request.header(CSRF_HEADER, token.clone());
        }
        request
    }

    /// Issue a POST with the current CSRF token, fetching one via a GET to
    /// `token_path` first when none is cached. One automatic token refresh
    /// and retry on 401/403, then [`Error::Authentication`].
    pub(crate) fn post(
        &mut self,
        path: &str,
        token_path: &str,
        content_type: &str,
        body: &str,
    ) -> Result<HttpResponse> {
        self.ensure_open()?;
        if self.csrf_token.is_none() {
            log::debug!("no CSRF token cached, fetching one from {}", token_path);
            self.get(token_path)?;
        }

        let response = self.execute(&self.build_post(path, content_type, body))?;
        self.harvest_token(&response);

        if matches!(response.status, 401 | 403) {
            log::debug!(
                "POST {} rejected with HTTP {}, refreshing token and retrying once",
                path,
                response.status
            );
            self.csrf_token = None;
            self.get(token_path)?;
            let retry = self.execute(&self.build_post(path, content_type, body))?;
            if matches!(retry.status, 401 | 403) {
                return Err(Error::Authentication(format!(
                    "POST {} rejected after token refresh (HTTP {})",
                    path, retry.status
                )));
            }
            return Ok(retry);
        }
        Ok(response)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.config.host)
            .field("state", &self.state)
            .finish()
    }
}
