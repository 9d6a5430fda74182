//! HTTP transport seam
//!
//! The engines never talk to the network directly; they build
//! [`HttpRequest`] values and hand them to an [`HttpTransport`]. The default
//! implementation wraps reqwest's blocking client and owns TLS, basic
//! authentication and the per-request timeout. Tests substitute a canned
//! transport through [`crate::Session::with_transport`].

use crate::error::{Error, Result};

/// A single HTTP request as issued by the fetch and batch engines.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method, e.g. "GET" or "POST".
    pub method: String,
    /// Absolute URL.
    pub url: String,
    /// Header name/value pairs.
    pub headers: Vec<(String, String)>,
    /// Request body, if any.
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// A raw HTTP response: status, headers and body bytes decoded as text.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    /// Whether the status code is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup, first match wins.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Blocking HTTP transport used by a [`crate::Session`].
///
/// Implementations are responsible for connection handling, TLS and
/// credentials; the request they receive carries only protocol-level
/// headers.
pub trait HttpTransport {
    /// Execute one request, blocking until the response or a transport
    /// error arrives.
    fn execute(&mut self, request: &HttpRequest) -> Result<HttpResponse>;
}

/// Default transport backed by reqwest's blocking client.
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
    username: String,
    password: String,
}

impl ReqwestTransport {
    pub fn new(timeout: std::time::Duration, username: &str, password: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

impl HttpTransport for ReqwestTransport {
    fn execute(&mut self, request: &HttpRequest) -> Result<HttpResponse> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|_| Error::Transport(format!("invalid HTTP method {:?}", request.method)))?;

        let mut builder = self
            .client
            .request(method, &request.url)
            .basic_auth(&self.username, Some(&self.password));
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .map_err(|e| Error::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        let body = response
            .text()
            .map_err(|e| Error::Transport(format!("failed to read response body: {e}")))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
