use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Listing-Trawl
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub status: StatusConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Pipeline targets and pool sizes
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of detail addresses to discover before discovery stops
    #[serde(rename = "target-jobs")]
    pub target_jobs: usize,

    /// Maximum number of raw pages written before compression
    #[serde(rename = "archive-cap")]
    pub archive_cap: usize,

    /// Parallel discoverer workers, each walking the full term list
    #[serde(rename = "discoverer-workers")]
    pub discoverer_workers: usize,

    /// Detail scraper workers
    #[serde(rename = "scraper-workers")]
    pub scraper_workers: usize,

    /// Raw-page archiver workers
    #[serde(rename = "archiver-workers")]
    pub archiver_workers: usize,

    /// Records per sink flush
    #[serde(rename = "batch-size")]
    pub batch_size: usize,

    /// Idle time on the save queue after which a partial batch is flushed (milliseconds)
    #[serde(rename = "idle-flush-ms")]
    pub idle_flush_ms: u64,
}

impl PipelineConfig {
    pub fn idle_flush(&self) -> Duration {
        Duration::from_millis(self.idle_flush_ms)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_jobs: 1000,
            archive_cap: 90,
            discoverer_workers: 3,
            scraper_workers: 3,
            archiver_workers: 3,
            batch_size: 50,
            idle_flush_ms: 10_000,
        }
    }
}

/// Page fetch behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Attempts per page before giving up
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Delay after the first failed attempt; doubles on every further failure (milliseconds)
    #[serde(rename = "backoff-base-ms")]
    pub backoff_base_ms: u64,

    /// Whole-request timeout (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Connect timeout (seconds)
    #[serde(rename = "connect-timeout-secs")]
    pub connect_timeout_secs: u64,

    /// Lower bound of the delay between two search pages (milliseconds)
    #[serde(rename = "min-delay-ms")]
    pub min_delay_ms: u64,

    /// Upper bound of the delay between two search pages (milliseconds)
    #[serde(rename = "max-delay-ms")]
    pub max_delay_ms: u64,

    /// User-Agent strings picked at random per request
    #[serde(rename = "user-agents")]
    pub user_agents: Vec<String>,

    /// Optional JavaScript rendering proxy
    #[serde(rename = "render-proxy")]
    pub render_proxy: Option<RenderProxyConfig>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_ms: 2000,
            timeout_secs: 15,
            connect_timeout_secs: 10,
            min_delay_ms: 500,
            max_delay_ms: 1500,
            user_agents: DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect(),
            render_proxy: None,
        }
    }
}

const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64; rv:90.0) Gecko/20100101 Firefox/90.0",
];

/// Rendering proxy that fetches pages on our behalf and runs their JavaScript
#[derive(Debug, Clone, Deserialize)]
pub struct RenderProxyConfig {
    /// Proxy API endpoint
    pub endpoint: String,

    /// Name of the environment variable holding the API key
    #[serde(rename = "api-key-env", default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_api_key_env() -> String {
    "API_KEY".to_string()
}

/// Target site layout
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Base URL used to resolve relative detail links
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Search page template with `{term}` and `{page}` placeholders
    #[serde(rename = "search-url")]
    pub search_url: String,

    /// CSS selector matching detail links on a search page
    #[serde(rename = "detail-link-selector")]
    pub detail_link_selector: String,

    /// Text cut from the end of the `<title>` element
    #[serde(rename = "title-suffix")]
    pub title_suffix: String,

    /// Ordered search terms; the first is exhausted first
    #[serde(rename = "search-terms")]
    pub search_terms: Vec<String>,

    /// Label texts preceding each field on a detail page
    pub labels: FieldLabels,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.jobs.ch".to_string(),
            search_url: "https://www.jobs.ch/en/vacancies/?page={page}&term={term}".to_string(),
            detail_link_selector: "a[href^='/en/vacancies/detail/']".to_string(),
            title_suffix: " - Job Offer".to_string(),
            search_terms: DEFAULT_SEARCH_TERMS.iter().map(|s| s.to_string()).collect(),
            labels: FieldLabels::default(),
        }
    }
}

const DEFAULT_SEARCH_TERMS: &[&str] = &[
    "Elektroniker",
    "Informatiker",
    "Arzt",
    "Buchhalter",
    "Ingenieur",
    "Mechaniker",
    "Lehrer",
    "Verkäufer",
    "Koch",
    "Krankenpfleger",
];

/// Label texts for label-preceded fields
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FieldLabels {
    #[serde(rename = "publication-date")]
    pub publication_date: String,
    pub workload: String,
    #[serde(rename = "contract-type")]
    pub contract_type: String,
    pub salary: String,
    pub languages: String,
    #[serde(rename = "place-of-work")]
    pub place_of_work: String,
}

impl Default for FieldLabels {
    fn default() -> Self {
        Self {
            publication_date: "Publication date:".to_string(),
            workload: "Workload:".to_string(),
            contract_type: "Contract type:".to_string(),
            salary: "Salary:".to_string(),
            languages: "Language:".to_string(),
            place_of_work: "Place of work:".to_string(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory holding every artifact of a run
    #[serde(rename = "data-dir")]
    pub data_dir: PathBuf,

    #[serde(rename = "csv-file")]
    pub csv_file: String,

    #[serde(rename = "json-file")]
    pub json_file: String,

    #[serde(rename = "database-file")]
    pub database_file: String,

    /// Directory, under the data directory, for numbered raw pages
    #[serde(rename = "html-dir")]
    pub html_dir: String,

    #[serde(rename = "archive-file")]
    pub archive_file: String,

    /// Seed the persister with listings already in the database
    #[serde(rename = "skip-known")]
    pub skip_known: bool,
}

impl OutputConfig {
    pub fn csv_path(&self) -> PathBuf {
        self.data_dir.join(&self.csv_file)
    }

    pub fn json_path(&self) -> PathBuf {
        self.data_dir.join(&self.json_file)
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }

    pub fn html_path(&self) -> PathBuf {
        self.data_dir.join(&self.html_dir)
    }

    pub fn archive_path(&self) -> PathBuf {
        self.data_dir.join(&self.archive_file)
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            csv_file: "job_descriptions.csv".to_string(),
            json_file: "job_descriptions.json".to_string(),
            database_file: "jobs.db".to_string(),
            html_dir: "html".to_string(),
            archive_file: "job_html_files.zip".to_string(),
            skip_known: true,
        }
    }
}

/// Live status line and completion polling
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Render the live status line on stdout
    pub live: bool,

    /// Sampling interval of the status line (milliseconds)
    #[serde(rename = "interval-ms")]
    pub interval_ms: u64,

    /// Polls before `await_completion` gives up
    #[serde(rename = "completion-retries")]
    pub completion_retries: u32,

    /// Delay between two completion polls (milliseconds)
    #[serde(rename = "completion-poll-ms")]
    pub completion_poll_ms: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            live: true,
            interval_ms: 100,
            completion_retries: 10,
            completion_poll_ms: 1000,
        }
    }
}

/// Log destination
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Write logs to this file instead of stderr
    pub file: Option<PathBuf>,
}
