//! Integration tests for the harvest pipeline
//!
//! These tests use wiremock to stand in for the job site and run the full
//! discover, scrape, persist and archive cycle end-to-end against a
//! temporary data directory.

use listing_trawl::config::{
    Config, FetchConfig, LoggingConfig, OutputConfig, PipelineConfig, SiteConfig, StatusConfig,
};
use listing_trawl::crawler::{CompressionOutcome, Pipeline};
use listing_trawl::storage::{RunStatus, SqliteStore};
use std::fs::File;
use std::path::Path;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing at the mock site
fn create_test_config(
    server: &MockServer,
    data_dir: &Path,
    terms: &[&str],
    target_jobs: usize,
    archive_cap: usize,
) -> Config {
    Config {
        pipeline: PipelineConfig {
            target_jobs,
            archive_cap,
            discoverer_workers: 2,
            scraper_workers: 3,
            archiver_workers: 2,
            batch_size: 2,
            idle_flush_ms: 50,
        },
        fetch: FetchConfig {
            max_retries: 3,
            backoff_base_ms: 1,
            timeout_secs: 5,
            min_delay_ms: 0,
            max_delay_ms: 0,
            ..FetchConfig::default()
        },
        site: SiteConfig {
            base_url: server.uri(),
            search_url: format!("{}/search?page={{page}}&term={{term}}", server.uri()),
            detail_link_selector: "a[href^='/detail/']".to_string(),
            search_terms: terms.iter().map(|t| t.to_string()).collect(),
            ..SiteConfig::default()
        },
        output: OutputConfig {
            data_dir: data_dir.to_path_buf(),
            ..OutputConfig::default()
        },
        status: StatusConfig {
            live: false,
            completion_retries: 0,
            completion_poll_ms: 1,
            ..StatusConfig::default()
        },
        logging: LoggingConfig::default(),
    }
}

fn results_page(ids: &[u32], num_pages: u32) -> String {
    let links: String = ids
        .iter()
        .map(|id| format!(r#"<li><a href="/detail/{}/">Job {}</a></li>"#, id, id))
        .collect();
    format!(
        r#"<html><body><ul>{}</ul><script>window.__INIT__ = {{"meta": {{"numPages": {}}}}}</script></body></html>"#,
        links, num_pages
    )
}

fn detail_page(id: u32) -> String {
    format!(
        r#"<html><head><title>Job {} - Job Offer at Example AG</title></head><body>
            <h1>Job {}</h1>
            <span>Publication date:</span><span>0{} March 2025</span>
            <span>Workload:</span><span>80 – 100%</span>
            <span>Place of work:</span><span>Bern</span>
        </body></html>"#,
        id, id, id
    )
}

async fn mount_search(server: &MockServer, term: &str, page: u32, body: String) {
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("term", term))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_details(server: &MockServer, ids: impl IntoIterator<Item = u32>) {
    for id in ids {
        Mock::given(method("GET"))
            .and(path(format!("/detail/{}", id)))
            .respond_with(ResponseTemplate::new(200).set_body_string(detail_page(id)))
            .mount(server)
            .await;
    }
}

fn read_csv(path: &Path) -> Vec<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .expect("CSV file should exist");
    reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect()
}

fn zip_entries(path: &Path) -> Vec<String> {
    let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut names: Vec<String> = (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_full_run_two_terms() {
    let server = MockServer::start().await;
    mount_search(&server, "nurse", 1, results_page(&[1, 2, 3], 2)).await;
    mount_search(&server, "nurse", 2, results_page(&[], 2)).await;
    mount_search(&server, "cook", 1, results_page(&[4, 5, 6], 2)).await;
    mount_search(&server, "cook", 2, results_page(&[], 2)).await;
    mount_details(&server, 1..=6).await;

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&server, dir.path(), &["nurse", "cook"], 5, 2);
    let output = config.output.clone();

    let summary = Pipeline::new(config, "test-hash").run().await.unwrap();

    assert_eq!(summary.discovery.accepted, 5);
    assert_eq!(summary.scraped, 5);
    assert_eq!(summary.persist.accepted, 5);
    assert!(summary.completed);
    assert_eq!(
        summary.progress.to_string(),
        "Fetched: 5/5 | Scraped: 5/5 | Downloaded: 2/2"
    );

    // CSV: one header, five data rows, ids 1..=5
    let rows = read_csv(&output.csv_path());
    assert_eq!(rows.len(), 6);
    assert_eq!(rows[0][0], "id");
    let mut ids: Vec<u64> = rows[1..].iter().map(|r| r[0].parse().unwrap()).collect();
    ids.sort();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    assert!(rows[1..].iter().all(|r| r[8] == "Bern" && r[6] == "N/A"));

    // JSON and SQLite hold the same records
    let json: Vec<serde_json::Value> =
        serde_json::from_str(&std::fs::read_to_string(output.json_path()).unwrap()).unwrap();
    assert_eq!(json.len(), 5);

    let store = SqliteStore::open(&output.database_path()).unwrap();
    assert_eq!(store.count_listings().unwrap(), 5);
    assert_eq!(store.count_distinct_urls().unwrap(), 5);

    let run = store.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.config_hash, "test-hash");
    assert_eq!(run.fetched, 5);
    assert_eq!(run.scraped, 5);
    assert_eq!(run.downloaded, 2);
}

#[tokio::test]
async fn test_failing_detail_page_yields_no_record() {
    let server = MockServer::start().await;
    mount_search(&server, "nurse", 1, results_page(&[1, 2, 3], 1)).await;
    mount_details(&server, [1, 2]).await;
    Mock::given(method("GET"))
        .and(path("/detail/3"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&server, dir.path(), &["nurse"], 10, 0);
    let output = config.output.clone();

    let summary = Pipeline::new(config, "h").run().await.unwrap();

    assert_eq!(summary.discovery.accepted, 3);
    assert_eq!(summary.scraped, 2);
    assert_eq!(summary.scrape_failures, 1);

    let rows = read_csv(&output.csv_path());
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| !r[1].ends_with("/detail/3")));
}

#[tokio::test]
async fn test_archive_cap_limits_raw_pages() {
    let server = MockServer::start().await;
    mount_search(&server, "nurse", 1, results_page(&[1, 2, 3, 4, 5], 1)).await;
    mount_details(&server, 1..=5).await;

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&server, dir.path(), &["nurse"], 5, 2);
    let output = config.output.clone();

    let summary = Pipeline::new(config, "h").run().await.unwrap();

    assert_eq!(summary.archived, 2);
    assert_eq!(summary.compression, CompressionOutcome::Written(2));
    assert_eq!(std::fs::read_dir(output.html_path()).unwrap().count(), 2);
    assert_eq!(
        zip_entries(&output.archive_path()),
        vec!["listing_1.html", "listing_2.html"]
    );
}

#[tokio::test]
async fn test_below_cap_skips_compression() {
    let server = MockServer::start().await;
    mount_search(&server, "nurse", 1, results_page(&[1, 2, 3], 1)).await;
    mount_details(&server, 1..=3).await;

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&server, dir.path(), &["nurse"], 10, 5);
    let output = config.output.clone();

    let summary = Pipeline::new(config, "h").run().await.unwrap();

    assert_eq!(summary.archived, 3);
    assert_eq!(summary.compression, CompressionOutcome::Skipped { saved: 3 });
    assert_eq!(std::fs::read_dir(output.html_path()).unwrap().count(), 3);
    assert!(!output.archive_path().exists());
}

#[tokio::test]
async fn test_rerun_skips_known_listings() {
    let server = MockServer::start().await;
    mount_search(&server, "nurse", 1, results_page(&[1, 2, 3], 1)).await;
    mount_details(&server, 1..=3).await;

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&server, dir.path(), &["nurse"], 10, 0);
    let output = config.output.clone();

    let first = Pipeline::new(config.clone(), "h").run().await.unwrap();
    assert_eq!(first.persist.accepted, 3);

    let second = Pipeline::new(config, "h").run().await.unwrap();
    assert_eq!(second.scraped, 3);
    assert_eq!(second.persist.accepted, 0);
    assert_eq!(second.persist.duplicates, 3);

    assert_eq!(read_csv(&output.csv_path()).len(), 4);
    let store = SqliteStore::open(&output.database_path()).unwrap();
    assert_eq!(store.count_listings().unwrap(), 3);
    assert_eq!(store.count_runs().unwrap(), 2);
}

#[tokio::test]
async fn test_unreachable_site_completes_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&server, dir.path(), &["nurse", "cook"], 5, 2);
    let output = config.output.clone();

    let summary = Pipeline::new(config, "h").run().await.unwrap();

    assert_eq!(summary.discovery.accepted, 0);
    assert_eq!(summary.scraped, 0);
    assert_eq!(summary.persist.batches, 0);
    assert!(!output.csv_path().exists());
    assert_eq!(
        summary.compression,
        CompressionOutcome::Skipped { saved: 0 }
    );
}
