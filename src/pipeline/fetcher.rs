use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use reqwest::header::{HeaderMap, USER_AGENT};
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::cli::config::FetchSettings;
use crate::pipeline::task::FetchOutcome;

/// HTTP status codes that are worth retrying
const TRANSIENT_STATUS: [u16; 5] = [429, 500, 502, 503, 504];

/// Single-shot HTTP fetcher
///
/// Performs one GET per call and classifies the outcome; all retry
/// decisions belong to the retry policy, not here.
pub struct Fetcher {
    client: Client,
    user_agents: Vec<String>,
}

impl Fetcher {
    /// Build a fetcher from the fetch settings
    pub fn new(settings: &FetchSettings) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(5));

        if let Some(proxy_url) = &settings.proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .context(format!("Invalid proxy URL: {}", proxy_url))?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            user_agents: settings.user_agents.clone(),
        })
    }

    /// Fetch a URL once and classify the result
    pub async fn fetch(&self, url: &str) -> FetchOutcome {
        let started = Instant::now();

        let mut request = self.client.get(url);
        if let Some(agent) = self.random_user_agent() {
            request = request.header(USER_AGENT, agent);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                // Timeouts, DNS failures, refused connections and TLS errors
                // all land here and are candidates for a retry.
                debug!("Network error fetching {}: {}", url, e);
                return FetchOutcome::TransientFailure {
                    reason: format!("network error: {}", e),
                };
            }
        };

        let status = response.status();
        let headers = flatten_headers(response.headers());

        if is_transient_status(status) {
            return FetchOutcome::TransientFailure {
                reason: format!("HTTP {}", status.as_u16()),
            };
        }

        if !status.is_success() {
            return FetchOutcome::PermanentFailure {
                reason: format!("HTTP {}", status.as_u16()),
            };
        }

        if let Some(content_type) = headers.get("content-type") {
            if !is_textual_content_type(content_type) {
                return FetchOutcome::PermanentFailure {
                    reason: format!("unsupported content type: {}", content_type),
                };
            }
        }

        match response.bytes().await {
            Ok(body) => {
                let elapsed = started.elapsed();
                debug!(
                    "Fetched {} ({} bytes in {} ms)",
                    url,
                    body.len(),
                    elapsed.as_millis()
                );
                FetchOutcome::Fetched {
                    status_code: status.as_u16(),
                    body: body.to_vec(),
                    headers,
                    elapsed,
                }
            }
            Err(e) => FetchOutcome::TransientFailure {
                reason: format!("failed to read response body: {}", e),
            },
        }
    }

    fn random_user_agent(&self) -> Option<&str> {
        self.user_agents
            .choose(&mut rand::thread_rng())
            .map(|s| s.as_str())
    }
}

/// Whether a Content-Type header value indicates HTML or plain text
fn is_textual_content_type(value: &str) -> bool {
    let value = value.to_ascii_lowercase();
    value.contains("text/html")
        || value.contains("application/xhtml")
        || value.contains("text/plain")
}

fn flatten_headers(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_lowercase(), v.to_string()))
        })
        .collect()
}

/// Whether a status code would be classified as transient
pub fn is_transient_status(status: StatusCode) -> bool {
    TRANSIENT_STATUS.contains(&status.as_u16())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_textual_content_types() {
        assert!(is_textual_content_type("text/html"));
        assert!(is_textual_content_type("text/html; charset=utf-8"));
        assert!(is_textual_content_type("application/xhtml+xml"));
        assert!(is_textual_content_type("text/plain"));
        assert!(!is_textual_content_type("application/pdf"));
        assert!(!is_textual_content_type("image/png"));
    }

    #[test]
    fn test_transient_status_set() {
        for code in [429u16, 500, 502, 503, 504] {
            assert!(is_transient_status(StatusCode::from_u16(code).unwrap()));
        }
        for code in [200u16, 301, 400, 401, 403, 404, 410] {
            assert!(!is_transient_status(StatusCode::from_u16(code).unwrap()));
        }
    }
}
