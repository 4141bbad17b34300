use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response, StatusCode};
use slotflow_domain::constants::{
    DEFAULT_NOTIFICATION_MAX_ATTEMPTS, DEFAULT_NOTIFICATION_TIMEOUT_SECS,
};
use slotflow_domain::SlotflowError;
use tracing::{debug, warn};

use crate::errors::InfraError;

/// Retry schedule shared by every request of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RetryPolicy {
    attempts: usize,
    base_backoff: Duration,
}

impl RetryPolicy {
    /// Delay before retry `n` (1-based): `base * 2^(n-1)`, capped at 2^8.
    fn delay_before(&self, retry: usize) -> Duration {
        let exponent = u32::try_from(retry.saturating_sub(1).min(8)).unwrap_or(8);
        self.base_backoff.saturating_mul(1u32 << exponent)
    }

    fn retries_status(status: StatusCode) -> bool {
        status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
    }

    fn retries_error(err: &reqwest::Error) -> bool {
        err.is_timeout() || err.is_connect() || err.is_request()
    }
}

/// Outcome of one attempt
enum Attempt {
    Done(Response),
    Retry,
    Failed(reqwest::Error),
}

/// reqwest wrapper used by the delivery provider.
///
/// Transport failures, `5xx` and `429` are retried with exponential backoff.
/// Any other response is handed back to the caller untouched.
#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    retry: RetryPolicy,
}

impl HttpClient {
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    /// Send `builder`, retrying according to the client's policy.
    ///
    /// # Errors
    /// `SlotflowError::Network` when every attempt failed at the transport
    /// level; `SlotflowError::Internal` for bodies that cannot be cloned.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, SlotflowError> {
        let mut retry = 0;
        loop {
            let last = retry + 1 >= self.retry.attempts;
            let request = builder
                .try_clone()
                .ok_or_else(|| SlotflowError::Internal("request body is not replayable".into()))?
                .build()
                .map_err(|err| SlotflowError::from(InfraError::from(err)))?;

            match self.attempt(request, last).await {
                Attempt::Done(response) => return Ok(response),
                Attempt::Failed(err) => return Err(InfraError::from(err).into()),
                Attempt::Retry => {
                    retry += 1;
                    let delay = self.retry.delay_before(retry);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }

    async fn attempt(&self, request: reqwest::Request, last: bool) -> Attempt {
        let method = request.method().clone();
        let url = request.url().clone();

        match self.client.execute(request).await {
            Ok(response) if !last && RetryPolicy::retries_status(response.status()) => {
                debug!(%method, %url, status = %response.status(), "retryable response");
                Attempt::Retry
            }
            Ok(response) => {
                debug!(%method, %url, status = %response.status(), "response");
                Attempt::Done(response)
            }
            Err(err) if !last && RetryPolicy::retries_error(&err) => {
                debug!(%method, %url, error = %err, "transport failure, retrying");
                Attempt::Retry
            }
            Err(err) => {
                warn!(%method, %url, error = %err, "request failed");
                Attempt::Failed(err)
            }
        }
    }
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    retry: RetryPolicy,
    user_agent: String,
    bearer_token: Option<String>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_NOTIFICATION_TIMEOUT_SECS),
            retry: RetryPolicy {
                attempts: DEFAULT_NOTIFICATION_MAX_ATTEMPTS,
                base_backoff: Duration::from_millis(200),
            },
            user_agent: concat!("slotflow/", env!("CARGO_PKG_VERSION")).to_string(),
            bearer_token: None,
        }
    }
}

impl HttpClientBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Total attempts per request, the first one included. Never below one.
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.retry.attempts = attempts.max(1);
        self
    }

    pub fn base_backoff(mut self, backoff: Duration) -> Self {
        self.retry.base_backoff = backoff;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Attach `Authorization: Bearer <token>` to every request.
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// # Errors
    /// `SlotflowError::Config` for a token that is not a valid header value.
    pub fn build(self) -> Result<HttpClient, SlotflowError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = self.bearer_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| SlotflowError::Config("API token is not a valid header value".into()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = ReqwestClient::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent)
            .default_headers(headers)
            .no_proxy()
            .build()
            .map_err(|err| SlotflowError::from(InfraError::from(err)))?;

        Ok(HttpClient { client, retry: self.retry })
    }
}
