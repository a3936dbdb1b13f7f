//! Search page scheduling and rate limiting
//!
//! This module handles:
//! - Building search result URLs from the configured template
//! - The jittered pause between consecutive search page requests

use crate::config::{FetchConfig, SiteConfig};
use rand::Rng;
use std::time::Duration;
use url::form_urlencoded;

/// Random pause between search page requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    min: Duration,
    max: Duration,
}

impl RateLimit {
    /// Creates a limit drawing uniformly from `min..=max`
    ///
    /// Bounds given in the wrong order are swapped.
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// A limit that never sleeps
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Draws the next delay
    pub fn next_delay(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        rand::thread_rng().gen_range(self.min..=self.max)
    }

    /// Sleeps for one drawn delay
    pub async fn pause(&self) {
        let delay = self.next_delay();
        if !delay.is_zero() {
            tracing::trace!("Rate limit pause of {:?}", delay);
            tokio::time::sleep(delay).await;
        }
    }
}

impl From<&FetchConfig> for RateLimit {
    fn from(config: &FetchConfig) -> Self {
        Self::new(
            Duration::from_millis(config.min_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }
}

/// Ordered search terms and the URL template that pages through them
#[derive(Debug, Clone)]
pub struct SearchPlan {
    template: String,
    terms: Vec<String>,
}

impl SearchPlan {
    pub fn new(template: impl Into<String>, terms: Vec<String>) -> Self {
        Self {
            template: template.into(),
            terms,
        }
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// URL of result page `page` (1-based) for `term`
    ///
    /// The term is form-encoded, so spaces become `+`.
    pub fn page_url(&self, term: &str, page: u32) -> String {
        let encoded: String = form_urlencoded::byte_serialize(term.as_bytes()).collect();
        self.template
            .replace("{term}", &encoded)
            .replace("{page}", &page.to_string())
    }
}

impl From<&SiteConfig> for SearchPlan {
    fn from(site: &SiteConfig) -> Self {
        Self::new(site.search_url.clone(), site.search_terms.clone())
    }
}
