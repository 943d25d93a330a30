//! Runtime configuration for the evaluator.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. Values in the TOML file passed on the command line
//! 2. Environment variable overrides (e.g. `ASCENT_SCOUT_MODEL`)
//! 3. Built-in defaults (three tiers on one local OpenAI-compatible endpoint)
//!
//! ## Tier roles
//!
//! | Tier    | Used for                                   | Default model        |
//! |---------|--------------------------------------------|----------------------|
//! | scout   | routine classification and note-taking     | qwen2.5-7b-instruct  |
//! | analyst | moderately tangled title pictures          | qwen2.5-32b-instruct |
//! | counsel | high-risk seniority questions, big money   | qwen2.5-72b-instruct |

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use pipeline::{DecisionConfig, RouteTier, RouterThresholds, TierBackends};

const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_BASE_URL: &str = "http://localhost:8080/v1";
const DEFAULT_SCOUT_MODEL: &str = "qwen2.5-7b-instruct";
const DEFAULT_ANALYST_MODEL: &str = "qwen2.5-32b-instruct";
const DEFAULT_COUNSEL_MODEL: &str = "qwen2.5-72b-instruct";
const DEFAULT_MAX_CONCURRENT_ITEMS: usize = 4;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_STAGE_TIMEOUT_SECS: u64 = 120;

const ENV_DATA_DIR: &str = "ASCENT_DATA_DIR";
const ENV_BASE_URL: &str = "ASCENT_BASE_URL";
const ENV_API_KEY: &str = "ASCENT_API_KEY";
const ENV_SCOUT_MODEL: &str = "ASCENT_SCOUT_MODEL";
const ENV_ANALYST_MODEL: &str = "ASCENT_ANALYST_MODEL";
const ENV_COUNSEL_MODEL: &str = "ASCENT_COUNSEL_MODEL";

/// One model endpoint the router can dispatch to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Unique name; the router's round-robin lists refer to endpoints by it.
    pub name: String,
    /// OpenAI-compatible base URL.
    pub url: String,
    pub model: String,
    pub tier: RouteTier,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(env::var(ENV_DATA_DIR).unwrap_or_else(|_| DEFAULT_DATA_DIR.to_string()))
}

fn default_api_key() -> String {
    env::var(ENV_API_KEY).unwrap_or_else(|_| "local".to_string())
}

fn default_endpoints() -> Vec<EndpointConfig> {
    let base_url = env::var(ENV_BASE_URL).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
    let tier = |name: &str, env_model: &str, default_model: &str, t: RouteTier| EndpointConfig {
        name: name.to_string(),
        url: base_url.clone(),
        model: env::var(env_model).unwrap_or_else(|_| default_model.to_string()),
        tier: t,
    };
    vec![
        tier("scout-local", ENV_SCOUT_MODEL, DEFAULT_SCOUT_MODEL, RouteTier::Scout),
        tier("analyst-local", ENV_ANALYST_MODEL, DEFAULT_ANALYST_MODEL, RouteTier::Analyst),
        tier("counsel-local", ENV_COUNSEL_MODEL, DEFAULT_COUNSEL_MODEL, RouteTier::Counsel),
    ]
}

fn default_max_concurrent_items() -> usize {
    DEFAULT_MAX_CONCURRENT_ITEMS
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_stage_timeout_secs() -> u64 {
    DEFAULT_STAGE_TIMEOUT_SECS
}

/// Retry and deadline policy for stage execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Additional attempts after the first, for transient failures only.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Per-attempt stage deadline.
    #[serde(default = "default_stage_timeout_secs")]
    pub stage_timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            stage_timeout_secs: default_stage_timeout_secs(),
        }
    }
}

/// Top-level configuration, loadable from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AscentConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Shared API key; most local servers accept any non-empty value.
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<EndpointConfig>,
    #[serde(default = "default_max_concurrent_items")]
    pub max_concurrent_items: usize,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub router: RouterThresholds,
    #[serde(default)]
    pub decision: DecisionConfig,
}

impl Default for AscentConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            api_key: default_api_key(),
            endpoints: default_endpoints(),
            max_concurrent_items: default_max_concurrent_items(),
            retry: RetryConfig::default(),
            router: RouterThresholds::default(),
            decision: DecisionConfig::default(),
        }
    }
}

impl AscentConfig {
    /// Load from an optional TOML file, falling back to defaults, then
    /// validate. Fields absent from the file pick up environment overrides
    /// through their serde defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config file {}", path.display()))?;
                toml::from_str(&raw)
                    .with_context(|| format!("parsing config file {}", path.display()))?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.endpoints.is_empty() {
            bail!("no endpoints configured");
        }
        let mut names: Vec<&str> = self.endpoints.iter().map(|e| e.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        if names.len() != self.endpoints.len() {
            bail!("endpoint names must be unique");
        }
        // Counsel work never degrades to a cheaper tier, so it must have
        // somewhere to go.
        if !self.endpoints.iter().any(|e| e.tier == RouteTier::Counsel) {
            bail!("no endpoint configured for tier 'counsel'");
        }
        if self.max_concurrent_items == 0 {
            bail!("max_concurrent_items must be at least 1");
        }
        if self.router.complex_lien_count > self.router.heavy_lien_count {
            bail!(
                "router.complex_lien_count ({}) must not exceed router.heavy_lien_count ({})",
                self.router.complex_lien_count,
                self.router.heavy_lien_count
            );
        }
        if self.decision.review_threshold_pct > self.decision.bid_threshold_pct {
            bail!(
                "decision.review_threshold_pct ({}) must not exceed decision.bid_threshold_pct ({})",
                self.decision.review_threshold_pct,
                self.decision.bid_threshold_pct
            );
        }
        if self.decision.max_bid_pct > 100 {
            bail!("decision.max_bid_pct must be a percentage of valuation (<= 100)");
        }
        Ok(())
    }

    /// Endpoint names grouped by tier, in configured order.
    pub fn tier_backends(&self) -> TierBackends {
        let mut backends = TierBackends::default();
        for endpoint in &self.endpoints {
            let pool = match endpoint.tier {
                RouteTier::Scout => &mut backends.scout,
                RouteTier::Analyst => &mut backends.analyst,
                RouteTier::Counsel => &mut backends.counsel,
            };
            pool.push(endpoint.name.clone());
        }
        backends
    }

    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.retry.stage_timeout_secs)
    }
}
