use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::time::sleep;

use crate::error::{Result, SourceError};

const BASE_BACKOFF_MS: u64 = 250;
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Delay before retry number `attempt + 1`: 250 ms doubling, capped at 30 s.
fn backoff_for(attempt: u32) -> Duration {
    2u64.checked_pow(attempt)
        .and_then(|factor| factor.checked_mul(BASE_BACKOFF_MS))
        .map_or(MAX_BACKOFF, |ms| Duration::from_millis(ms).min(MAX_BACKOFF))
}

/// JSON-over-HTTP client with exponential backoff on transport failures.
///
/// Non-2xx responses are returned immediately; only connection-level errors
/// are retried, up to `max_retries` extra attempts.
pub struct JsonClient {
    client: reqwest::Client,
    max_retries: u32,
}

impl JsonClient {
    pub fn new(max_retries: u32, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .gzip(true)
            .build()?;
        Ok(Self {
            client,
            max_retries,
        })
    }

    pub async fn get(&self, url: &str) -> Result<String> {
        let mut attempt = 0u32;
        loop {
            let resp = self.client.get(url).send().await;
            match resp {
                Ok(r) if !r.status().is_success() => {
                    let status = r.status().as_u16();
                    let body = r.text().await.unwrap_or_default();
                    return Err(SourceError::ApiError(url.to_string(), status, body));
                }
                Ok(r) => return r.text().await.map_err(SourceError::Http),
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(SourceError::Http(e));
                    }
                    let backoff = backoff_for(attempt);
                    tracing::debug!(url, attempt, ?backoff, error = %e, "retrying request");
                    sleep(backoff).await;
                    attempt = attempt.saturating_add(1);
                }
            }
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let text = self.get(url).await?;
        serde_json::from_str(&text).map_err(|e| SourceError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_from_base() {
        assert_eq!(backoff_for(0), Duration::from_millis(250));
        assert_eq!(backoff_for(1), Duration::from_millis(500));
        assert_eq!(backoff_for(3), Duration::from_millis(2_000));
    }

    #[test]
    fn backoff_caps_for_large_attempt_counts() {
        assert_eq!(backoff_for(7), Duration::from_millis(30_000));
        for attempt in [8, 40, 62, 63, 64, 1_000, u32::MAX] {
            assert_eq!(backoff_for(attempt), MAX_BACKOFF, "attempt {attempt}");
        }
    }
}
