//! Aggregate classified posts into an [`InsightSnapshot`].
//!
//! Hashtag and hour rankings sum raw engagement rates: a post carrying three
//! tags adds its full rate to each of them, and totals are not normalized by
//! frequency.

use std::collections::BTreeMap;

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use campaign_common::InsightLimits;

use crate::canonical::CanonicalPost;
use crate::classifier::{
    round2, saturating_sum, ClassifiedPost, PerformanceClassifier, PerformanceTier,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeBucket {
    /// Hour of day, UTC.
    pub hour: u32,
    pub total_engagement_rate: f64,
    pub post_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashtagScore {
    pub tag: String,
    pub total_engagement_rate: f64,
    pub post_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentTypeStats {
    pub post_count: usize,
    pub average_engagement_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformStats {
    pub post_count: usize,
    /// `sum(total_engagement) / post_count`.
    pub average_engagement: f64,
    /// Mean of per-post engagement rates; platforms rank by this.
    pub average_engagement_rate: f64,
    pub impressions: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetrics {
    pub post_count: usize,
    pub average_engagement_rate: f64,
    pub total_impressions: u64,
    pub total_engagement: u64,
    pub high_performer_count: usize,
    pub low_performer_count: usize,
}

/// Timestamped, read-only aggregate of one batch of posts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightSnapshot {
    id: Uuid,
    campaign_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    high_performers: Vec<ClassifiedPost>,
    low_performers: Vec<ClassifiedPost>,
    optimal_times: Vec<TimeBucket>,
    top_hashtags: Vec<HashtagScore>,
    content_types: BTreeMap<String, ContentTypeStats>,
    platforms: BTreeMap<String, PlatformStats>,
    metrics: SnapshotMetrics,
}

impl InsightSnapshot {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn campaign_id(&self) -> Option<Uuid> {
        self.campaign_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn high_performers(&self) -> &[ClassifiedPost] {
        &self.high_performers
    }

    pub fn low_performers(&self) -> &[ClassifiedPost] {
        &self.low_performers
    }

    /// Best hours first.
    pub fn optimal_times(&self) -> &[TimeBucket] {
        &self.optimal_times
    }

    pub fn top_hashtags(&self) -> &[HashtagScore] {
        &self.top_hashtags
    }

    pub fn content_types(&self) -> &BTreeMap<String, ContentTypeStats> {
        &self.content_types
    }

    pub fn platforms(&self) -> &BTreeMap<String, PlatformStats> {
        &self.platforms
    }

    pub fn metrics(&self) -> &SnapshotMetrics {
        &self.metrics
    }

    /// Content type with the highest mean rate; ties go to the name that
    /// sorts first.
    pub fn best_content_type(&self) -> Option<(&str, &ContentTypeStats)> {
        best_by(&self.content_types, |s| s.average_engagement_rate)
    }

    /// Platform with the highest mean engagement rate, not the highest
    /// `average_engagement`; ties go to the name that sorts first.
    pub fn best_platform(&self) -> Option<(&str, &PlatformStats)> {
        best_by(&self.platforms, |s| s.average_engagement_rate)
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.post_count == 0
    }
}

fn best_by<T>(map: &BTreeMap<String, T>, key: impl Fn(&T) -> f64) -> Option<(&str, &T)> {
    map.iter()
        .fold(None::<(&String, &T)>, |best, (name, stats)| match best {
            Some((_, b)) if key(b) >= key(stats) => best,
            _ => Some((name, stats)),
        })
        .map(|(name, stats)| (name.as_str(), stats))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InsightExtractor {
    classifier: PerformanceClassifier,
    limits: InsightLimits,
}

impl InsightExtractor {
    pub fn new(classifier: PerformanceClassifier, limits: InsightLimits) -> Self {
        Self { classifier, limits }
    }

    pub fn classifier(&self) -> &PerformanceClassifier {
        &self.classifier
    }

    /// Classify and aggregate canonical posts.
    pub fn extract(&self, campaign_id: Option<Uuid>, posts: &[CanonicalPost]) -> InsightSnapshot {
        let classified = self.classifier.classify_all(posts);
        self.extract_classified(campaign_id, &classified, Utc::now())
    }

    pub fn extract_classified(
        &self,
        campaign_id: Option<Uuid>,
        posts: &[ClassifiedPost],
        created_at: DateTime<Utc>,
    ) -> InsightSnapshot {
        let by_tier = |tier: PerformanceTier| -> Vec<ClassifiedPost> {
            posts.iter().filter(|p| p.tier == tier).cloned().collect()
        };
        let high_performers = by_tier(PerformanceTier::High);
        let low_performers = by_tier(PerformanceTier::Low);

        let metrics = SnapshotMetrics {
            post_count: posts.len(),
            average_engagement_rate: mean(posts.iter().map(|p| p.engagement_rate)),
            total_impressions: saturating_sum(posts.iter().map(|p| p.post.impressions)),
            total_engagement: saturating_sum(posts.iter().map(|p| p.post.total_engagement())),
            high_performer_count: high_performers.len(),
            low_performer_count: low_performers.len(),
        };

        tracing::debug!(
            posts = metrics.post_count,
            high = metrics.high_performer_count,
            low = metrics.low_performer_count,
            "Extracted insights"
        );

        InsightSnapshot {
            id: Uuid::new_v4(),
            campaign_id,
            created_at,
            optimal_times: self.optimal_times(posts),
            top_hashtags: self.top_hashtags(posts),
            content_types: content_types(posts),
            platforms: platforms(posts),
            high_performers,
            low_performers,
            metrics,
        }
    }

    fn optimal_times(&self, posts: &[ClassifiedPost]) -> Vec<TimeBucket> {
        let mut buckets: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
        for post in posts {
            if let Some(posted_at) = post.post.posted_at {
                let entry = buckets.entry(posted_at.hour()).or_default();
                entry.0 += post.engagement_rate;
                entry.1 += 1;
            }
        }
        let mut ranked: Vec<TimeBucket> = buckets
            .into_iter()
            .map(|(hour, (total, post_count))| TimeBucket {
                hour,
                total_engagement_rate: round2(total),
                post_count,
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.total_engagement_rate
                .total_cmp(&a.total_engagement_rate)
                .then(a.hour.cmp(&b.hour))
        });
        ranked.truncate(self.limits.time_buckets);
        ranked
    }

    fn top_hashtags(&self, posts: &[ClassifiedPost]) -> Vec<HashtagScore> {
        let mut totals: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
        for post in posts {
            for tag in &post.post.hashtags {
                let entry = totals.entry(tag.as_str()).or_default();
                entry.0 += post.engagement_rate;
                entry.1 += 1;
            }
        }
        let mut ranked: Vec<HashtagScore> = totals
            .into_iter()
            .map(|(tag, (total, post_count))| HashtagScore {
                tag: tag.to_string(),
                total_engagement_rate: round2(total),
                post_count,
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.total_engagement_rate
                .total_cmp(&a.total_engagement_rate)
                .then_with(|| a.tag.cmp(&b.tag))
        });
        ranked.truncate(self.limits.hashtags);
        ranked
    }
}

fn content_types(posts: &[ClassifiedPost]) -> BTreeMap<String, ContentTypeStats> {
    let mut grouped: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for post in posts {
        grouped
            .entry(post.post.post_type.as_str())
            .or_default()
            .push(post.engagement_rate);
    }
    grouped
        .into_iter()
        .map(|(post_type, rates)| {
            let stats = ContentTypeStats {
                post_count: rates.len(),
                average_engagement_rate: mean(rates.iter().copied()),
            };
            (post_type.to_string(), stats)
        })
        .collect()
}

fn platforms(posts: &[ClassifiedPost]) -> BTreeMap<String, PlatformStats> {
    let mut grouped: BTreeMap<&str, Vec<&ClassifiedPost>> = BTreeMap::new();
    for post in posts {
        grouped.entry(post.post.platform.as_str()).or_default().push(post);
    }
    grouped
        .into_iter()
        .map(|(platform, group)| {
            let engagement = saturating_sum(group.iter().map(|p| p.post.total_engagement()));
            let stats = PlatformStats {
                post_count: group.len(),
                average_engagement: round2(engagement as f64 / group.len() as f64),
                average_engagement_rate: mean(group.iter().map(|p| p.engagement_rate)),
                impressions: saturating_sum(group.iter().map(|p| p.post.impressions)),
            };
            (platform.to_string(), stats)
        })
        .collect()
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        round2(sum / count as f64)
    }
}
