use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// Blocking JSON-over-HTTP transport shared by the provider clients.
///
/// `retry_attempts` counts total attempts, so `1` means a single request with
/// no retry. Only server errors and transport failures are retried.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    agent: ureq::Agent,
    retry_attempts: u32,
    backoff_base_ms: u64,
    bearer_token: Option<String>,
}

impl HttpTransport {
    #[inline]
    pub fn new(timeout: Duration, retry_attempts: u32) -> Self {
        Self {
            agent: Self::agent(timeout),
            retry_attempts: retry_attempts.max(1),
            backoff_base_ms: 1000,
            bearer_token: None,
        }
    }

    #[inline]
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Delay before the second attempt; doubles on every further attempt
    #[inline]
    pub fn with_backoff_base(mut self, delay: Duration) -> Self {
        self.backoff_base_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[inline]
    pub fn retry_attempts(&self) -> u32 {
        self.retry_attempts
    }

    fn agent(timeout: Duration) -> ureq::Agent {
        ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into()
    }

    /// POSTs `body` as JSON and decodes the JSON response
    #[inline]
    pub fn post_json<B, R>(&self, url: &Url, body: &B) -> Result<R>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let request_json = serde_json::to_string(body).context("Failed to serialize request")?;

        let response_text = self
            .make_request_with_retry(url, || {
                let mut request = self
                    .agent
                    .post(url.as_str())
                    .header("Content-Type", "application/json");
                if let Some(token) = &self.bearer_token {
                    request = request.header("Authorization", &format!("Bearer {token}"));
                }
                let mut response = request.send(&request_json)?;
                let status = response.status().as_u16();
                let text = response.body_mut().read_to_string()?;
                Ok((status, text))
            })
            .with_context(|| format!("Request to {url} failed"))?;

        serde_json::from_str(&response_text)
            .with_context(|| format!("Failed to parse response from {url}"))
    }

    fn make_request_with_retry<F>(&self, url: &Url, mut request_fn: F) -> Result<String>
    where
        F: FnMut() -> Result<(u16, String), ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("HTTP request attempt {}/{}", attempt, self.retry_attempts);

            match request_fn() {
                Ok((status, response_text)) if status < 400 => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(response_text);
                }
                Ok((status, response_text)) => {
                    let detail = error_detail(&response_text);
                    if status >= 500 {
                        warn!(
                            "Server error (status {}), attempt {}/{}",
                            status, attempt, self.retry_attempts
                        );
                        last_error = Some(anyhow!("Server error: HTTP {status}: {detail}"));
                    } else {
                        warn!("Client error (status {}), not retrying", status);
                        return Err(anyhow!("Client error: HTTP {status}: {detail}"));
                    }
                }
                Err(
                    error @ (ureq::Error::ConnectionFailed
                    | ureq::Error::HostNotFound
                    | ureq::Error::Timeout(_)
                    | ureq::Error::Io(_)),
                ) => {
                    warn!(
                        "Transport error: {}, attempt {}/{}",
                        error, attempt, self.retry_attempts
                    );
                    last_error = Some(anyhow!("Request error: {error}"));
                }
                Err(error) => {
                    warn!("Non-retryable error: {}", error);
                    return Err(anyhow!("Non-retryable error: {error}"));
                }
            }

            if attempt < self.retry_attempts {
                let delay_ms = EXPONENTIAL_BACKOFF_BASE
                    .saturating_pow(attempt - 1)
                    .saturating_mul(self.backoff_base_ms);
                let delay = Duration::from_millis(delay_ms);
                debug!("Waiting {:?} before retry", delay);
                std::thread::sleep(delay);
            }
        }

        error!("All {} attempts failed for request to {}", self.retry_attempts, url);

        Err(last_error.unwrap_or_else(|| anyhow!("Request failed after retries")))
    }
}

/// Pulls a readable message out of an error body, falling back to the raw text
fn error_detail(body: &str) -> String {
    #[derive(serde::Deserialize)]
    struct Envelope {
        error: ErrorField,
    }

    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    enum ErrorField {
        Message { message: String },
        Plain(String),
    }

    match serde_json::from_str::<Envelope>(body) {
        Ok(Envelope {
            error: ErrorField::Message { message } | ErrorField::Plain(message),
        }) => message,
        Err(_) => body.trim().chars().take(200).collect(),
    }
}
