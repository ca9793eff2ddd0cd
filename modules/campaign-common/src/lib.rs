pub mod config;
pub mod error;
pub mod types;

pub use config::{
    ClassificationThresholds, EngineConfig, GenerationSettings, InsightLimits,
    HIGH_ENGAGEMENT_THRESHOLD, LOW_ENGAGEMENT_THRESHOLD,
};
pub use error::{CampaignError, CampaignResult};
pub use types::*;
