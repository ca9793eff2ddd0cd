use std::fmt::Display;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CampaignError {
    /// The top-level analytics payload matched none of the known shapes.
    #[error("Unparseable analytics input: {0}")]
    UnparseableAnalyticsInput(String),

    #[error("Generation timed out after {0:?}")]
    GenerationTimeout(Duration),

    #[error("Generation failed: {0}")]
    GenerationFailure(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A concurrent writer changed the row between read and commit.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl CampaignError {
    pub fn not_found(entity: &'static str, id: impl Display) -> Self {
        CampaignError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        CampaignError::Validation(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CampaignError::NotFound { .. })
    }
}

pub type CampaignResult<T> = std::result::Result<T, CampaignError>;
