use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Engagement rate (percent) at or above which a post is a high performer.
pub const HIGH_ENGAGEMENT_THRESHOLD: f64 = 3.5;
/// Engagement rate (percent) at or below which a post is a low performer.
pub const LOW_ENGAGEMENT_THRESHOLD: f64 = 1.0;

pub const DEFAULT_TOP_TIME_BUCKETS: usize = 5;
pub const DEFAULT_TOP_HASHTAGS: usize = 10;
pub const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_GENERATION_MODEL: &str = "claude-sonnet-4-20250514";

/// Tier boundaries used by the performance classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationThresholds {
    pub high: f64,
    pub low: f64,
}

impl Default for ClassificationThresholds {
    fn default() -> Self {
        Self {
            high: HIGH_ENGAGEMENT_THRESHOLD,
            low: LOW_ENGAGEMENT_THRESHOLD,
        }
    }
}

/// How many entries the insight rankings keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsightLimits {
    pub time_buckets: usize,
    pub hashtags: usize,
}

impl Default for InsightLimits {
    fn default() -> Self {
        Self {
            time_buckets: DEFAULT_TOP_TIME_BUCKETS,
            hashtags: DEFAULT_TOP_HASHTAGS,
        }
    }
}

/// Settings for calls to the external generation capability.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub model: String,
    pub timeout: Duration,
    pub max_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_GENERATION_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_GENERATION_TIMEOUT_SECS),
            max_tokens: 8192,
        }
    }
}

/// Engine configuration loaded from environment variables.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    // Database
    pub database_url: Option<String>,

    // AI / LLM
    pub anthropic_api_key: Option<String>,
    pub generation: GenerationSettings,

    // Analytics
    pub thresholds: ClassificationThresholds,
    pub limits: InsightLimits,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        Self {
            database_url: env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            anthropic_api_key: env::var("ANTHROPIC_API_KEY").ok().filter(|s| !s.is_empty()),
            generation: GenerationSettings {
                model: env::var("GENERATION_MODEL").unwrap_or(defaults.generation.model),
                timeout: Duration::from_secs(parse_env(
                    "GENERATION_TIMEOUT_SECS",
                    DEFAULT_GENERATION_TIMEOUT_SECS,
                )),
                max_tokens: parse_env("GENERATION_MAX_TOKENS", defaults.generation.max_tokens),
            },
            thresholds: ClassificationThresholds {
                high: parse_env("HIGH_ENGAGEMENT_THRESHOLD", HIGH_ENGAGEMENT_THRESHOLD),
                low: parse_env("LOW_ENGAGEMENT_THRESHOLD", LOW_ENGAGEMENT_THRESHOLD),
            },
            limits: InsightLimits {
                time_buckets: parse_env("TOP_TIME_BUCKETS", DEFAULT_TOP_TIME_BUCKETS),
                hashtags: parse_env("TOP_HASHTAGS", DEFAULT_TOP_HASHTAGS),
            },
        }
    }

    /// Log the effective settings without secrets.
    pub fn log_redacted(&self) {
        tracing::info!(
            database = self.database_url.is_some(),
            anthropic_key = self.anthropic_api_key.is_some(),
            model = %self.generation.model,
            timeout_secs = self.generation.timeout.as_secs(),
            high_threshold = self.thresholds.high,
            low_threshold = self.thresholds.low,
            "Engine config loaded"
        );
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
