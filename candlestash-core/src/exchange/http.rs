//! Blocking HTTP transport shared by the REST clients.
//!
//! Wraps a `reqwest::blocking::Client` with the request pacer and a retry loop:
//! connect/timeout failures, HTTP 429 and 5xx are retried with exponential
//! backoff; a ban (403/418) or any other non-success status fails at once.
//! Waits between attempts end early when the client's interrupt is raised.

use super::pacing::RequestPacer;
use super::{ClientOptions, ExchangeError};
use crate::Interrupt;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, warn};

/// Longest `Retry-After` the transport will sleep for before retrying.
const MAX_RETRY_AFTER_SECS: u64 = 60;

pub struct HttpTransport {
    client: reqwest::blocking::Client,
    pacer: RequestPacer,
    max_retries: u32,
    base_delay: Duration,
    interrupt: Interrupt,
}

impl HttpTransport {
    pub fn new(options: &ClientOptions, min_interval: Duration) -> Result<Self, ExchangeError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(options.request_timeout)
            .user_agent(concat!("candlestash/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ExchangeError::Initialization(e.to_string()))?;

        Ok(Self {
            client,
            pacer: RequestPacer::new(min_interval),
            max_retries: options.max_retries,
            base_delay: options.retry_base_delay,
            interrupt: options.interrupt.clone(),
        })
    }

    pub fn pacer(&self) -> &RequestPacer {
        &self.pacer
    }

    /// GET `url` with `query`, returning the response body of a 2xx reply.
    pub fn get(&self, url: &str, query: &[(&str, String)]) -> Result<String, ExchangeError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if self.interrupt.is_triggered() {
                return Err(ExchangeError::Interrupted);
            }
            if attempt > 0 {
                let delay = match &last_error {
                    Some(ExchangeError::RateLimited { retry_after_secs }) => {
                        Duration::from_secs((*retry_after_secs).min(MAX_RETRY_AFTER_SECS))
                    }
                    _ => backoff_delay(self.base_delay, attempt),
                };
                debug!(attempt, ?delay, url, "retrying request");
                if self.interrupt.sleep(delay) {
                    return Err(ExchangeError::Interrupted);
                }
            }

            self.pacer.wait();

            let resp = match self.client.get(url).query(query).send() {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    warn!(attempt, error = %e, "request failed");
                    last_error = Some(ExchangeError::Network(e.to_string()));
                    continue;
                }
                Err(e) => return Err(ExchangeError::Network(e.to_string())),
            };

            let status = resp.status();

            if status == StatusCode::FORBIDDEN || status.as_u16() == 418 {
                // Ban: never retried.
                return Err(ExchangeError::RateLimited {
                    retry_after_secs: retry_after(&resp).unwrap_or(0),
                });
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after_secs = retry_after(&resp).unwrap_or(MAX_RETRY_AFTER_SECS);
                warn!(attempt, retry_after_secs, "rate limited");
                last_error = Some(ExchangeError::RateLimited { retry_after_secs });
                continue;
            }

            if status.is_server_error() {
                warn!(attempt, %status, "server error");
                last_error = Some(ExchangeError::Api {
                    status: status.as_u16(),
                    message: resp.text().unwrap_or_default(),
                });
                continue;
            }

            let body = resp
                .text()
                .map_err(|e| ExchangeError::Network(format!("reading response body: {e}")))?;

            if !status.is_success() {
                return Err(ExchangeError::Api {
                    status: status.as_u16(),
                    message: body,
                });
            }

            return Ok(body);
        }

        Err(last_error.unwrap_or_else(|| ExchangeError::Network("max retries exceeded".into())))
    }
}

/// Wait before retry number `attempt` (1-based): `base`, doubling each time.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
}

fn retry_after(resp: &reqwest::blocking::Response) -> Option<u64> {
    resp.headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
}
