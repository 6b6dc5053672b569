use std::collections::HashMap;
use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, Url};

use crate::error::EidError;

/// A simple wrapper on an HTTP client for making requests. Sets sensible defaults such as timeouts
/// and user-agent, and maps transport failures into protocol errors. Requests are never retried.
#[derive(Debug, Clone)]
pub(crate) struct Request {
    client: reqwest::Client,
    timeout: Duration,
}

impl Request {
    /// Initializes a new `Request` instance with a per-request `timeout`.
    pub(crate) fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    /// Creates a request builder with defaults applied.
    pub(crate) fn req(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .timeout(self.timeout)
            .header(
                "User-Agent",
                format!("eidkit-core/{}", env!("CARGO_PKG_VERSION")),
            )
    }

    /// Creates a GET request builder with defaults and the caller's `headers` applied.
    pub(crate) fn get(
        &self,
        url: Url,
        headers: Option<&HashMap<String, String>>,
    ) -> RequestBuilder {
        let mut request = self.req(Method::GET, url);
        for (key, value) in headers.into_iter().flatten() {
            request = request.header(key, value);
        }
        request
    }

    /// Sends a request built by `req`/`get`.
    ///
    /// Transport failures map to [`EidError::ServerTimeout`] when the timeout elapsed and to
    /// [`EidError::ServerRejected`] otherwise. Any status code is returned as a response.
    pub(crate) async fn handle(
        &self,
        request_builder: RequestBuilder,
    ) -> Result<Response, EidError> {
        request_builder.send().await.map_err(|err| {
            if err.is_timeout() {
                EidError::ServerTimeout
            } else {
                let url = err
                    .url()
                    .map_or_else(|| "<unknown>".to_string(), ToString::to_string);
                EidError::ServerRejected(format!("request to {url} failed: {err}"))
            }
        })
    }
}

/// Which schemes the mobile flow accepts for `getAuthSuccessUrl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollUrlPolicy {
    /// Only `https` URLs are polled.
    #[default]
    HttpsOnly,
    /// Plain `http` is accepted as well. Meant for local test servers.
    AllowPlainHttp,
}

impl PollUrlPolicy {
    /// Whether `url` may be polled under this policy.
    #[must_use]
    pub fn permits(self, url: &Url) -> bool {
        match url.scheme() {
            "https" => true,
            "http" => self == Self::AllowPlainHttp,
            _ => false,
        }
    }
}
