//! HTTP fetcher implementation
//!
//! This module handles every page request of the pipeline:
//! - Building the HTTP client with the configured timeouts
//! - Rotating the User-Agent per request
//! - Routing requests through an optional rendering proxy
//! - Retrying transient failures with exponential backoff

use crate::config::{FetchConfig, RenderProxyConfig};
use crate::ConfigError;
use rand::seq::SliceRandom;
use reqwest::{header, redirect::Policy, Client};
use std::time::Duration;
use url::Url;

/// Maximum redirect hops followed before the request fails
const MAX_REDIRECTS: usize = 10;

/// Outcome of a single attempt
#[derive(Debug)]
enum Attempt {
    /// Body of a 2xx response
    Page(String),

    /// Failure worth another attempt (network error, timeout, non-2xx, body read)
    Transient(String),

    /// Failure that no retry can fix (redirect loop, invalid request)
    Fatal(String),
}

/// Retry budget and backoff schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
}

impl RetryPolicy {
    /// Sleep after failed attempt `attempt` (1-based): `base * 2^(attempt - 1)`
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.backoff_base.saturating_mul(1u32 << exponent)
    }
}

impl From<&FetchConfig> for RetryPolicy {
    fn from(config: &FetchConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
        }
    }
}

/// Rendering proxy with its resolved API key
#[derive(Debug, Clone)]
struct RenderProxy {
    endpoint: Url,
    api_key: String,
}

impl RenderProxy {
    fn from_config(config: &RenderProxyConfig) -> Result<Self, ConfigError> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", config.endpoint, e)))?;
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| ConfigError::MissingEnv(config.api_key_env.clone()))?;

        Ok(Self { endpoint, api_key })
    }

    fn wrap(&self, address: &str) -> String {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("api_key", &self.api_key)
            .append_pair("url", address)
            .append_pair("render_js", "true");
        url.into()
    }
}

/// Page fetcher shared by every stage
///
/// Holds no mutable state, so one instance can serve all workers
/// concurrently behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    retry: RetryPolicy,
    user_agents: Vec<String>,
    proxy: Option<RenderProxy>,
}

impl Fetcher {
    /// Builds a fetcher from the fetch configuration
    ///
    /// Fails when the rendering proxy is configured but its API key variable
    /// is not set.
    pub fn new(config: &FetchConfig) -> Result<Self, crate::TrawlError> {
        let client = build_http_client(config)?;
        let proxy = config
            .render_proxy
            .as_ref()
            .map(RenderProxy::from_config)
            .transpose()?;

        if proxy.is_some() {
            tracing::info!("Routing page requests through the rendering proxy");
        }

        Ok(Self {
            client,
            retry: RetryPolicy::from(config),
            user_agents: config.user_agents.clone(),
            proxy,
        })
    }

    /// Fetches one page, returning its body or `None` once retries are spent
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | 2xx | Return body |
    /// | Non-2xx status | Retry with backoff |
    /// | Timeout / connection error | Retry with backoff |
    /// | Body read error | Retry with backoff |
    /// | Redirect loop / too many redirects | Give up immediately |
    /// | Invalid request | Give up immediately |
    ///
    /// No sleep follows the final attempt.
    pub async fn fetch(&self, address: &str) -> Option<String> {
        let target = match &self.proxy {
            Some(proxy) => proxy.wrap(address),
            None => address.to_string(),
        };

        for attempt in 1..=self.retry.max_attempts {
            match self.attempt(&target).await {
                Attempt::Page(body) => return Some(body),
                Attempt::Fatal(reason) => {
                    tracing::error!("Giving up on {}: {}", address, reason);
                    return None;
                }
                Attempt::Transient(reason) => {
                    if attempt == self.retry.max_attempts {
                        tracing::error!(
                            "Failed to fetch {} after {} attempts: {}",
                            address,
                            attempt,
                            reason
                        );
                        break;
                    }

                    let delay = self.retry.delay_after(attempt);
                    tracing::warn!(
                        "Attempt {} for {} failed ({}), retrying in {:?}",
                        attempt,
                        address,
                        reason,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }

        None
    }

    async fn attempt(&self, target: &str) -> Attempt {
        let mut request = self.client.get(target);
        if let Some(agent) = self.user_agents.choose(&mut rand::thread_rng()) {
            request = request.header(header::USER_AGENT, agent.as_str());
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return classify_error(e),
        };

        let status = response.status();
        if !status.is_success() {
            return Attempt::Transient(format!("HTTP {}", status.as_u16()));
        }

        match response.text().await {
            Ok(body) => Attempt::Page(body),
            Err(e) => Attempt::Transient(format!("body read failed: {}", e)),
        }
    }
}

fn classify_error(e: reqwest::Error) -> Attempt {
    if e.is_redirect() {
        Attempt::Fatal(format!("redirect error: {}", e))
    } else if e.is_builder() {
        Attempt::Fatal(format!("invalid request: {}", e))
    } else if e.is_timeout() {
        Attempt::Transient("request timeout".to_string())
    } else if e.is_connect() {
        Attempt::Transient(format!("connection failed: {}", e))
    } else {
        Attempt::Transient(e.to_string())
    }
}

/// Builds an HTTP client with the configured timeouts
pub fn build_http_client(config: &FetchConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TrawlError;
    use wiremock::matchers::{header as header_eq, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_config(max_retries: u32) -> FetchConfig {
        FetchConfig {
            max_retries,
            backoff_base_ms: 1,
            user_agents: vec!["TestAgent/1.0".to_string()],
            ..FetchConfig::default()
        }
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff_base: Duration::from_secs(2),
        };
        assert_eq!(policy.delay_after(1), Duration::from_secs(2));
        assert_eq!(policy.delay_after(2), Duration::from_secs(4));
        assert_eq!(policy.delay_after(3), Duration::from_secs(8));
    }

    #[test]
    fn test_zero_retries_still_makes_one_attempt() {
        let policy = RetryPolicy::from(&fast_config(0));
        assert_eq!(policy.max_attempts, 1);
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/detail/1"))
            .and(header_eq("user-agent", "TestAgent/1.0"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&fast_config(3)).unwrap();
        let body = fetcher.fetch(&format!("{}/detail/1", server.uri())).await;
        assert_eq!(body.as_deref(), Some("<html>ok</html>"));
    }

    #[tokio::test]
    async fn test_server_error_retried_until_budget_spent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&fast_config(3)).unwrap();
        assert!(fetcher.fetch(&format!("{}/broken", server.uri())).await.is_none());
    }

    #[tokio::test]
    async fn test_not_found_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .expect(2)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&fast_config(2)).unwrap();
        assert!(fetcher.fetch(&format!("{}/gone", server.uri())).await.is_none());
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string("second time"))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&fast_config(3)).unwrap();
        let body = fetcher.fetch(&format!("{}/flaky", server.uri())).await;
        assert_eq!(body.as_deref(), Some("second time"));
    }

    #[tokio::test]
    async fn test_redirect_loop_is_not_retried() {
        let server = MockServer::start().await;
        let location = format!("{}/loop", server.uri());
        Mock::given(method("GET"))
            .and(path("/loop"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", location.as_str()))
            .mount(&server)
            .await;

        // A retry would sleep for a minute
        let config = FetchConfig {
            backoff_base_ms: 60_000,
            ..fast_config(3)
        };
        let fetcher = Fetcher::new(&config).unwrap();
        let result = tokio::time::timeout(
            Duration::from_secs(10),
            fetcher.fetch(&format!("{}/loop", server.uri())),
        )
        .await
        .expect("redirect failure should not back off");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_render_proxy_wraps_address() {
        std::env::set_var("LISTING_TRAWL_TEST_PROXY_KEY", "secret");

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/render"))
            .and(query_param("api_key", "secret"))
            .and(query_param("url", "https://jobs.example.com/detail/1"))
            .and(query_param("render_js", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_string("rendered"))
            .expect(1)
            .mount(&server)
            .await;

        let config = FetchConfig {
            render_proxy: Some(RenderProxyConfig {
                endpoint: format!("{}/render", server.uri()),
                api_key_env: "LISTING_TRAWL_TEST_PROXY_KEY".to_string(),
            }),
            ..fast_config(1)
        };
        let fetcher = Fetcher::new(&config).unwrap();
        let body = fetcher.fetch("https://jobs.example.com/detail/1").await;
        assert_eq!(body.as_deref(), Some("rendered"));
    }

    #[test]
    fn test_missing_proxy_key_is_config_error() {
        let config = FetchConfig {
            render_proxy: Some(RenderProxyConfig {
                endpoint: "https://render.example.com/api".to_string(),
                api_key_env: "LISTING_TRAWL_TEST_UNSET_KEY".to_string(),
            }),
            ..FetchConfig::default()
        };

        let result = Fetcher::new(&config);
        assert!(matches!(
            result,
            Err(TrawlError::Config(ConfigError::MissingEnv(ref name)))
                if name == "LISTING_TRAWL_TEST_UNSET_KEY"
        ));
    }
}
