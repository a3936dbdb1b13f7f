//! Listing addresses
//!
//! A [`ListingAddress`] is the canonical URL of one detail page. It is the
//! deduplication key in every pipeline stage.

mod normalize;

use serde::Serialize;
use std::fmt;

pub use normalize::canonicalize;

/// Canonical identifier of one listing's detail page
///
/// Only [`canonicalize`] builds addresses from untrusted hrefs, so two
/// addresses are equal exactly when their canonical strings are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ListingAddress(String);

impl ListingAddress {
    pub(crate) fn from_canonical(url: String) -> Self {
        Self(url)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ListingAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ListingAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    #[test]
    fn test_display_matches_as_str() {
        let base = Url::parse("https://example.com").unwrap();
        let address = canonicalize("/detail/9", &base).unwrap();
        assert_eq!(address.to_string(), address.as_str());
        assert_eq!(address.into_string(), "https://example.com/detail/9");
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let base = Url::parse("https://example.com").unwrap();
        let address = canonicalize("/detail/9", &base).unwrap();
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, "\"https://example.com/detail/9\"");
    }
}
