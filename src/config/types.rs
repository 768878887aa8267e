use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Site-Audit
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub escalation: EscalationConfig,
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Timeout for a single fetch, redirects included (milliseconds)
    #[serde(rename = "request-timeout-ms", default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Delay inserted between any two fetches of one crawl (milliseconds)
    #[serde(rename = "politeness-delay-ms", default = "default_politeness_delay_ms")]
    pub politeness_delay_ms: u64,

    /// Maximum redirect hops followed for one request
    #[serde(rename = "max-redirects", default = "default_max_redirects")]
    pub max_redirects: u32,

    /// Maximum nesting of sitemap indexes
    #[serde(rename = "sitemap-depth", default = "default_sitemap_depth")]
    pub sitemap_depth: u32,

    /// Maximum number of uncrawled internal links probed for broken status
    #[serde(rename = "broken-link-sample", default = "default_broken_link_sample")]
    pub broken_link_sample: usize,

    /// Cap on the normalized text kept per page
    #[serde(rename = "max-content-chars", default = "default_max_content_chars")]
    pub max_content_chars: usize,

    /// Honour robots.txt Disallow rules for our user agent
    #[serde(rename = "respect-robots", default = "default_true")]
    pub respect_robots: bool,

    /// Hosts exempt from the private-network check. Intended for local test servers.
    #[serde(rename = "trusted-hosts", default)]
    pub trusted_hosts: Vec<String>,
}

impl CrawlerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn politeness_delay(&self) -> Duration {
        Duration::from_millis(self.politeness_delay_ms)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            politeness_delay_ms: default_politeness_delay_ms(),
            max_redirects: default_max_redirects(),
            sitemap_depth: default_sitemap_depth(),
            broken_link_sample: default_broken_link_sample(),
            max_content_chars: default_max_content_chars(),
            respect_robots: true,
            trusted_hosts: Vec::new(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Format: CrawlerName/Version (+ContactURL; ContactEmail)
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Component scheduling configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// A component `running` for longer than this is presumed crashed (seconds)
    #[serde(rename = "stale-threshold-secs", default = "default_stale_threshold_secs")]
    pub stale_threshold_secs: u64,

    /// Interval between retry sweeps of one job (seconds)
    #[serde(rename = "retry-interval-secs", default = "default_retry_interval_secs")]
    pub retry_interval_secs: u64,
}

impl PipelineConfig {
    pub fn stale_threshold(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.stale_threshold_secs as i64)
    }

    pub fn retry_interval(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.retry_interval_secs as i64)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stale_threshold_secs: default_stale_threshold_secs(),
            retry_interval_secs: default_retry_interval_secs(),
        }
    }
}

/// Escalation thresholds applied by the retry sweep
#[derive(Debug, Clone, Deserialize)]
pub struct EscalationConfig {
    /// Job age after which the requester is told the audit is delayed (seconds)
    #[serde(rename = "delay-notice-secs", default = "default_delay_notice_secs")]
    pub delay_notice_secs: u64,

    /// Retry count after which support is alerted
    #[serde(rename = "support-alert-retries", default = "default_support_alert_retries")]
    pub support_alert_retries: u32,

    /// Job age after which the job fails permanently (seconds)
    #[serde(rename = "hard-timeout-secs", default = "default_hard_timeout_secs")]
    pub hard_timeout_secs: u64,
}

impl EscalationConfig {
    pub fn delay_notice(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.delay_notice_secs as i64)
    }

    pub fn hard_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.hard_timeout_secs as i64)
    }
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            delay_notice_secs: default_delay_notice_secs(),
            support_alert_retries: default_support_alert_retries(),
            hard_timeout_secs: default_hard_timeout_secs(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file holding jobs
    #[serde(rename = "database-path")]
    pub database_path: String,
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_politeness_delay_ms() -> u64 {
    250
}

fn default_max_redirects() -> u32 {
    10
}

fn default_sitemap_depth() -> u32 {
    3
}

fn default_broken_link_sample() -> usize {
    20
}

fn default_max_content_chars() -> usize {
    10_000
}

fn default_true() -> bool {
    true
}

fn default_stale_threshold_secs() -> u64 {
    600
}

fn default_retry_interval_secs() -> u64 {
    900
}

fn default_delay_notice_secs() -> u64 {
    2 * 60 * 60
}

fn default_support_alert_retries() -> u32 {
    6
}

fn default_hard_timeout_secs() -> u64 {
    24 * 60 * 60
}
