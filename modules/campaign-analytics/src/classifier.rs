use serde::{Deserialize, Serialize};

use campaign_common::ClassificationThresholds;

use crate::canonical::CanonicalPost;

/// Saturates at `u64::MAX` rather than overflowing on absurd counters.
pub fn total_engagement(post: &CanonicalPost) -> u64 {
    saturating_sum([post.likes, post.comments, post.shares, post.saves, post.clicks])
}

pub(crate) fn saturating_sum(values: impl IntoIterator<Item = u64>) -> u64 {
    values.into_iter().fold(0, u64::saturating_add)
}

/// Engagement as a percentage of impressions, rounded to two decimals.
/// Zero impressions count as one so the rate stays finite.
pub fn engagement_rate(post: &CanonicalPost) -> f64 {
    let impressions = post.impressions.max(1) as f64;
    round2(total_engagement(post) as f64 / impressions * 100.0)
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceTier {
    High,
    Mid,
    Low,
}

impl PerformanceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PerformanceTier::High => "high",
            PerformanceTier::Mid => "mid",
            PerformanceTier::Low => "low",
        }
    }
}

impl std::fmt::Display for PerformanceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A canonical post with its computed rate and tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedPost {
    pub post: CanonicalPost,
    pub engagement_rate: f64,
    pub tier: PerformanceTier,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PerformanceClassifier {
    thresholds: ClassificationThresholds,
}

impl PerformanceClassifier {
    pub fn new(thresholds: ClassificationThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> ClassificationThresholds {
        self.thresholds
    }

    /// High wins when the bands overlap through misconfiguration.
    pub fn tier_for_rate(&self, rate: f64) -> PerformanceTier {
        if rate >= self.thresholds.high {
            PerformanceTier::High
        } else if rate <= self.thresholds.low {
            PerformanceTier::Low
        } else {
            PerformanceTier::Mid
        }
    }

    pub fn classify(&self, post: &CanonicalPost) -> ClassifiedPost {
        let rate = engagement_rate(post);
        ClassifiedPost {
            post: post.clone(),
            engagement_rate: rate,
            tier: self.tier_for_rate(rate),
        }
    }

    pub fn classify_all(&self, posts: &[CanonicalPost]) -> Vec<ClassifiedPost> {
        posts.iter().map(|p| self.classify(p)).collect()
    }
}
