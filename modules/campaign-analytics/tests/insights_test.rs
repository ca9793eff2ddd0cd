//! Insight extraction over normalized exports: normalize → classify → snapshot.

use campaign_analytics::{AnalyticsNormalizer, InsightExtractor, PerformanceClassifier, PerformanceTier};
use campaign_common::{ClassificationThresholds, InsightLimits};
use serde_json::json;
use uuid::Uuid;

fn export() -> serde_json::Value {
    json!({"posts": [
        {"platform": "instagram", "post_type": "reel", "caption": "Reel #brunch #local",
         "likes": 40, "comments": 5, "saves": 5, "impressions": 1000, "posted_at": "2024-03-05T18:10:00Z"},
        {"platform": "instagram", "post_type": "image", "caption": "Menu #brunch",
         "likes": 8, "impressions": 1000, "posted_at": "2024-03-06T09:00:00Z"},
        {"platform": "facebook", "post_type": "link", "message": "Blog post",
         "likes": 2, "impressions": 400, "posted_at": "2024-03-07T18:45:00Z"},
        {"platform": "twitter", "text": "Quick update #local",
         "likes": 3, "shares": 2, "impressions": 200}
    ]})
}

#[test]
fn snapshot_aggregates_normalized_export() {
    let normalized = AnalyticsNormalizer::default().normalize(&export()).unwrap();
    let campaign_id = Uuid::new_v4();

    let snapshot = InsightExtractor::default().extract(Some(campaign_id), &normalized.posts);

    assert_eq!(snapshot.campaign_id(), Some(campaign_id));
    let metrics = snapshot.metrics();
    assert_eq!(metrics.post_count, 4);
    // rates: 5.0, 0.8, 0.5, 2.5
    assert_eq!(metrics.average_engagement_rate, 2.2);
    assert_eq!(metrics.high_performer_count, 1);
    assert_eq!(metrics.low_performer_count, 2);
    assert_eq!(snapshot.high_performers()[0].post.post_type, "reel");

    // 18h: 5.0 + 0.5; 9h: 0.8; the undated tweet is ignored
    let hours: Vec<(u32, f64)> = snapshot
        .optimal_times()
        .iter()
        .map(|b| (b.hour, b.total_engagement_rate))
        .collect();
    assert_eq!(hours, vec![(18, 5.5), (9, 0.8)]);

    // #brunch: 5.0 + 0.8, #local: 5.0 + 2.5
    let tags: Vec<(&str, f64)> = snapshot
        .top_hashtags()
        .iter()
        .map(|t| (t.tag.as_str(), t.total_engagement_rate))
        .collect();
    assert_eq!(tags, vec![("#local", 7.5), ("#brunch", 5.8)]);

    assert_eq!(snapshot.best_content_type().map(|(t, _)| t), Some("reel"));
    assert_eq!(snapshot.platforms()["instagram"].average_engagement, 29.0);
    assert_eq!(snapshot.best_platform().map(|(p, _)| p), Some("instagram"));
}

#[test]
fn configured_thresholds_and_limits_flow_through() {
    let normalized = AnalyticsNormalizer::default().normalize(&export()).unwrap();
    let extractor = InsightExtractor::new(
        PerformanceClassifier::new(ClassificationThresholds { high: 2.0, low: 0.5 }),
        InsightLimits { time_buckets: 1, hashtags: 1 },
    );

    let snapshot = extractor.extract(None, &normalized.posts);

    assert_eq!(snapshot.metrics().high_performer_count, 2);
    assert_eq!(snapshot.metrics().low_performer_count, 1);
    assert_eq!(snapshot.optimal_times().len(), 1);
    assert_eq!(snapshot.top_hashtags().len(), 1);
    assert!(snapshot
        .low_performers()
        .iter()
        .all(|p| p.tier == PerformanceTier::Low));
}

#[test]
fn snapshot_survives_serialization() {
    let normalized = AnalyticsNormalizer::default().normalize(&export()).unwrap();
    let snapshot = InsightExtractor::default().extract(None, &normalized.posts);

    let json = serde_json::to_value(&snapshot).unwrap();
    let restored: campaign_analytics::InsightSnapshot = serde_json::from_value(json).unwrap();

    assert_eq!(restored, snapshot);
}
