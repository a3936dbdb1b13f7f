//! Search result parsing
//!
//! This module reads a search result page and extracts:
//! - Detail links, canonicalized against the site base URL
//! - The total page count advertised in the embedded metadata blob

use crate::url::{canonicalize, ListingAddress};
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::OnceLock;
use url::Url;

fn meta_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r#""meta":\s*\{\s*"numPages":\s*(\d+)"#).ok())
        .as_ref()
}

fn num_pages_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r#""numPages"\s*:\s*(\d+)"#).ok())
        .as_ref()
}

/// Extracts the canonical detail addresses linked from a search page
///
/// Links are returned in document order of their first occurrence. Hrefs
/// that do not resolve to an http(s) URL are skipped.
pub fn extract_detail_links(html: &str, selector: &Selector, base: &Url) -> Vec<ListingAddress> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();

    document
        .select(selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| match canonicalize(href, base) {
            Ok(address) => Some(address),
            Err(e) => {
                tracing::debug!("Skipping detail link {}: {}", href, e);
                None
            }
        })
        .filter(|address| seen.insert(address.clone()))
        .collect()
}

/// Reads the number of result pages from a search page
///
/// # Lookup Order
///
/// 1. `"meta": { "numPages": N` anywhere in the page
/// 2. `"numPages": N` inside a `<script>` element that mentions `"meta":`
/// 3. `1`
pub fn total_pages(html: &str) -> u32 {
    if let Some(pages) = capture_count(meta_pattern(), html) {
        return pages;
    }

    let document = Html::parse_document(html);
    if let Ok(scripts) = Selector::parse("script") {
        for script in document.select(&scripts) {
            let text: String = script.text().collect();
            if !text.contains("\"meta\":") {
                continue;
            }
            if let Some(pages) = capture_count(num_pages_pattern(), &text) {
                tracing::info!("Extracted {} pages from script tag", pages);
                return pages;
            }
        }
    }

    1
}

fn capture_count(pattern: Option<&Regex>, haystack: &str) -> Option<u32> {
    pattern?
        .captures(haystack)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
