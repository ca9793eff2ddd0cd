use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classifier;

/// Cross-platform performance record produced by the normalizer.
///
/// Only raw counters are stored; the engagement rate is always recomputed
/// from them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalPost {
    pub post_id: Option<String>,
    pub platform: String,
    pub post_type: String,
    pub content: String,
    pub hashtags: Vec<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub impressions: u64,
    pub reach: u64,
    pub likes: u64,
    pub comments: u64,
    pub shares: u64,
    pub saves: u64,
    pub clicks: u64,
}

impl CanonicalPost {
    pub fn total_engagement(&self) -> u64 {
        classifier::total_engagement(self)
    }

    pub fn engagement_rate(&self) -> f64 {
        classifier::engagement_rate(self)
    }
}

/// Why a single record was dropped from an otherwise valid batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    #[error("record is not an object")]
    NotAnObject,
    #[error("record has no content, id, or metric fields")]
    NoUsableFields,
    #[error("row has {found} cells, header has {expected}")]
    RowWidthMismatch { expected: usize, found: usize },
}

/// A record skipped during normalization (non-fatal).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRecord {
    pub index: usize,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    pub total_posts: usize,
    pub total_impressions: u64,
    pub total_reach: u64,
    pub total_engagement: u64,
    pub average_engagement_rate: f64,
    /// Numeric account-level values carried by the export itself.
    pub extras: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlatformTotals {
    pub post_count: usize,
    pub impressions: u64,
    pub reach: u64,
    pub engagement: u64,
    pub average_engagement_rate: f64,
}

/// Totals for one ISO week of dated posts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimePeriod {
    /// ISO week label, e.g. "2024-W10".
    pub period: String,
    pub starts_on: NaiveDate,
    pub post_count: usize,
    pub impressions: u64,
    pub engagement: u64,
}

/// Canonical ingestion output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedAnalytics {
    pub posts: Vec<CanonicalPost>,
    pub summary: AnalyticsSummary,
    pub platforms: BTreeMap<String, PlatformTotals>,
    pub time_periods: Vec<TimePeriod>,
    #[serde(default)]
    pub skipped: Vec<SkippedRecord>,
}
