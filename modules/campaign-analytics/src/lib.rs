//! Analytics ingestion: raw platform exports → canonical posts → classified
//! posts → immutable insight snapshots.

pub mod canonical;
pub mod classifier;
pub mod insights;
pub mod normalizer;
pub mod platforms;

pub use canonical::{
    AnalyticsSummary, CanonicalPost, NormalizedAnalytics, PlatformTotals, SkipReason,
    SkippedRecord, TimePeriod,
};
pub use classifier::{
    engagement_rate, total_engagement, ClassifiedPost, PerformanceClassifier, PerformanceTier,
};
pub use insights::{
    ContentTypeStats, HashtagScore, InsightExtractor, InsightSnapshot, PlatformStats,
    SnapshotMetrics, TimeBucket,
};
pub use normalizer::AnalyticsNormalizer;
pub use platforms::{AdapterRegistry, PlatformAdapter};
