use std::fmt;
use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub github: GithubConfig,
    pub repository: RepositoryConfig,
    #[serde(default)]
    pub harvest: HarvestConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(".")
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Config::builder()
            .add_source(
                File::with_name(
                    path.as_ref()
                        .join("config/default")
                        .to_string_lossy()
                        .as_ref(),
                )
                .required(false),
            )
            .add_source(
                File::with_name(
                    path.as_ref()
                        .join("config/local")
                        .to_string_lossy()
                        .as_ref(),
                )
                .required(false),
            )
            .add_source(Environment::default().separator("__"))
            .build()?
            .try_deserialize()
    }
}

/// Bearer credential. Opaque to the pipeline and redacted from `Debug` output.
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubConfig {
    pub token: Secret,
    #[serde(default = "GithubConfig::default_user_agent")]
    pub user_agent: String,
    #[serde(default = "GithubConfig::default_api_base")]
    pub api_base: String,
    #[serde(default = "GithubConfig::default_graphql_url")]
    pub graphql_url: String,
}

impl GithubConfig {
    fn default_user_agent() -> String {
        "issue-harvest".to_string()
    }

    fn default_api_base() -> String {
        "https://api.github.com/".to_string()
    }

    fn default_graphql_url() -> String {
        "https://api.github.com/graphql".to_string()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryConfig {
    pub owner: String,
    pub name: String,
}

/// Which API variant feeds the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// REST issue listing; merge timestamps read from the embedded linkage.
    Rest,
    /// REST issue listing plus one pull-request lookup per PR.
    RestEnriched,
    #[default]
    Graphql,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Rest => "rest",
            Strategy::RestEnriched => "rest_enriched",
            Strategy::Graphql => "graphql",
        }
    }

    pub fn needs_enrichment(&self) -> bool {
        matches!(self, Strategy::RestEnriched)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HarvestConfig {
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default = "HarvestConfig::default_item_ceiling")]
    pub item_ceiling: usize,
    #[serde(default = "HarvestConfig::default_page_size")]
    pub page_size: u32,
    #[serde(default = "HarvestConfig::default_cooldown_seconds")]
    pub cooldown_seconds: u64,
    #[serde(default = "HarvestConfig::default_request_spacing_seconds")]
    pub request_spacing_seconds: f64,
    #[serde(default = "HarvestConfig::default_enrichment_concurrency")]
    pub enrichment_concurrency: usize,
    #[serde(default = "HarvestConfig::default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "HarvestConfig::default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "HarvestConfig::default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    #[serde(default = "HarvestConfig::default_jitter_frac")]
    pub jitter_frac: f32,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            item_ceiling: Self::default_item_ceiling(),
            page_size: Self::default_page_size(),
            cooldown_seconds: Self::default_cooldown_seconds(),
            request_spacing_seconds: Self::default_request_spacing_seconds(),
            enrichment_concurrency: Self::default_enrichment_concurrency(),
            max_retries: Self::default_max_retries(),
            backoff_base_ms: Self::default_backoff_base_ms(),
            backoff_max_ms: Self::default_backoff_max_ms(),
            jitter_frac: Self::default_jitter_frac(),
        }
    }
}

impl HarvestConfig {
    const fn default_item_ceiling() -> usize {
        1000
    }

    const fn default_page_size() -> u32 {
        100
    }

    const fn default_cooldown_seconds() -> u64 {
        60
    }

    const fn default_request_spacing_seconds() -> f64 {
        0.5
    }

    const fn default_enrichment_concurrency() -> usize {
        8
    }

    const fn default_max_retries() -> u32 {
        5
    }

    const fn default_backoff_base_ms() -> u64 {
        500
    }

    const fn default_backoff_max_ms() -> u64 {
        60_000
    }

    const fn default_jitter_frac() -> f32 {
        0.2
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }

    pub fn request_spacing(&self) -> Duration {
        Duration::try_from_secs_f64(self.request_spacing_seconds).unwrap_or_default()
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Csv,
    Jsonl,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "OutputConfig::default_path")]
    pub path: String,
    #[serde(default)]
    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: Self::default_path(),
            format: OutputFormat::default(),
        }
    }
}

impl OutputConfig {
    fn default_path() -> String {
        "github_issues.csv".to_string()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub metrics_path: Option<String>,
}
