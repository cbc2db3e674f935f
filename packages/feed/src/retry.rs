//! Retry/backoff wrapper shared by the crime feed and routing provider
//! clients (§6, §7).
//!
//! Only these two outbound HTTP collaborators retry in-request; database
//! errors fail fast (§7). The policy here — 3 attempts, 250ms then
//! doubling to 1s then 4s — is the spec's own numbers, distinct from the
//! source toolchain's 5-attempt/1s-doubling policy used elsewhere in this
//! codebase.

use std::time::Duration;

use crate::FeedError;

/// Maximum retry attempts for a transient failure against the crime feed
/// or routing provider (§7: "capped exponential (3 attempts, 250 ms → 1
/// s → 4 s)").
const MAX_RETRIES: u32 = 3;

/// Backoff delay before retry attempt `n` (1-indexed): 250ms, 1s, 4s.
fn backoff_delay(attempt: u32) -> Duration {
    match attempt {
        1 => Duration::from_millis(250),
        2 => Duration::from_secs(1),
        _ => Duration::from_secs(4),
    }
}

/// Sends an HTTP request built by `build_request`, retrying transient
/// failures (timeouts, connection errors, HTTP 429, HTTP 5xx) up to
/// [`MAX_RETRIES`] times with the §7 backoff schedule.
///
/// # Errors
///
/// Returns [`FeedError::Upstream`] if the request fails after all
/// retries or the server returns a non-retryable status code.
pub async fn send<F>(build_request: F) -> Result<reqwest::Response, FeedError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut last_error: Option<FeedError> = None;

    for attempt in 0..=MAX_RETRIES {
        if attempt > 0 {
            let delay = backoff_delay(attempt);
            log::warn!("retry {attempt}/{MAX_RETRIES} in {delay:?}");
            tokio::time::sleep(delay).await;
        }

        match build_request().send().await {
            Err(e) => {
                if is_transient(&e) && attempt < MAX_RETRIES {
                    last_error = Some(FeedError::Upstream(e.to_string()));
                    continue;
                }
                return Err(FeedError::Upstream(e.to_string()));
            }
            Ok(response) => {
                let status = response.status();

                if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    if attempt < MAX_RETRIES {
                        log::warn!("transient HTTP {status}, will retry");
                        last_error = Some(FeedError::Upstream(format!("HTTP {status}")));
                        continue;
                    }
                    return Err(FeedError::Upstream(format!(
                        "HTTP {status} after {MAX_RETRIES} retries"
                    )));
                }

                if status.is_client_error() {
                    return Err(FeedError::Upstream(format!("HTTP {status}")));
                }

                return Ok(response);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| FeedError::Upstream("request failed".to_string())))
}

fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_decode() || e.is_request()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_schedule_matches_spec() {
        assert_eq!(backoff_delay(1), Duration::from_millis(250));
        assert_eq!(backoff_delay(2), Duration::from_secs(1));
        assert_eq!(backoff_delay(3), Duration::from_secs(4));
    }
}
