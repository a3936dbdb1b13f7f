//! Crawler module: the stages of the harvest pipeline
//!
//! This module contains:
//! - HTTP fetching with retry, backoff and user-agent rotation
//! - Search page parsing and detail link discovery
//! - Detail page extraction and the scraper pool
//! - The raw-page archiver and its compression pass
//! - Orchestration of the phases

mod archiver;
mod discoverer;
mod extract;
mod fetcher;
mod parser;
mod pipeline;
mod scheduler;
mod scraper;

pub use archiver::{compress_archive, listing_file_name, ArchiverPool, CompressionOutcome};
pub use discoverer::{DiscoveryQueues, DiscoveryReport, LinkDiscoverer};
pub use extract::{ExtractedFields, Extractor, LabelExtractor};
pub use fetcher::{build_http_client, Fetcher, RetryPolicy};
pub use parser::{extract_detail_links, total_pages};
pub use pipeline::{run_pipeline, Pipeline, RunSummary};
pub use scheduler::{RateLimit, SearchPlan};
pub use scraper::{ScrapeReport, ScraperPool};
