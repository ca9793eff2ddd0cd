use campaign_analytics::InsightSnapshot;
use campaign_common::ClassificationThresholds;

use super::types::{
    EvolutionOptions, PerformanceComparison, Priority, Recommendation, RecommendationKind,
};

const CONTENT_TYPE_LIFT: f64 = 1.5;
const DOMINANT_RATIO: f64 = 2.0;
const HASHTAG_FOCUS_COUNT: usize = 3;

/// Derive recommendations from a snapshot, ordered by priority and then by
/// the order the rules run in.
pub fn recommend(
    snapshot: &InsightSnapshot,
    comparison: &PerformanceComparison,
    thresholds: ClassificationThresholds,
    target_weeks: &[u32],
    options: &EvolutionOptions,
) -> Vec<Recommendation> {
    if snapshot.is_empty() {
        return Vec::new();
    }
    let targets = || target_weeks.to_vec();
    let overall = snapshot.metrics().average_engagement_rate;
    let mut recommendations = Vec::new();

    if snapshot.content_types().len() > 1 {
        if let Some((post_type, stats)) = snapshot.best_content_type() {
            let priority = if stats.average_engagement_rate >= overall * CONTENT_TYPE_LIFT {
                Priority::High
            } else {
                Priority::Medium
            };
            recommendations.push(Recommendation::new(
                RecommendationKind::ContentTypeShift {
                    post_type: post_type.to_string(),
                },
                priority,
                format!(
                    "Shift the content mix toward {post_type} posts ({:.2}% average engagement vs {overall:.2}% overall)",
                    stats.average_engagement_rate
                ),
                targets(),
            ));
        }
    }

    if let Some(top) = snapshot.optimal_times().first() {
        let dominant = snapshot
            .optimal_times()
            .get(1)
            .is_some_and(|second| top.total_engagement_rate >= second.total_engagement_rate * DOMINANT_RATIO);
        recommendations.push(Recommendation::new(
            RecommendationKind::PostingTimeShift { hour: top.hour },
            if dominant { Priority::High } else { Priority::Medium },
            format!(
                "Shift posting time to {:02}:00 UTC, the best-performing hour",
                top.hour
            ),
            targets(),
        ));
    }

    // Platforms rank by their mean per-post engagement rate, not by the
    // count-weighted `average_engagement`, so a large audience does not win
    // on raw volume alone.
    if snapshot.platforms().len() > 1 {
        let by_rate = |a: &f64, b: &f64| a.total_cmp(b);
        let best = snapshot.best_platform();
        let worst = snapshot
            .platforms()
            .iter()
            .min_by(|a, b| by_rate(&a.1.average_engagement_rate, &b.1.average_engagement_rate));
        if let (Some((platform, best_stats)), Some((_, worst_stats))) = (best, worst) {
            let priority = if best_stats.average_engagement_rate
                >= worst_stats.average_engagement_rate * DOMINANT_RATIO
            {
                Priority::High
            } else {
                Priority::Medium
            };
            recommendations.push(Recommendation::new(
                RecommendationKind::PlatformReallocation {
                    platform: platform.to_string(),
                },
                priority,
                format!(
                    "Reallocate effort to {platform} ({:.2}% average engagement vs {:.2}% on the weakest platform)",
                    best_stats.average_engagement_rate, worst_stats.average_engagement_rate
                ),
                targets(),
            ));
        }
    }

    let rate_falling = comparison.engagement_rate_change().is_some_and(|c| c < 0.0);
    let cta_priority = if overall <= thresholds.low {
        Some(Priority::High)
    } else if rate_falling {
        Some(Priority::Medium)
    } else if overall < thresholds.high {
        Some(Priority::Low)
    } else {
        None
    };
    if let Some(priority) = cta_priority {
        recommendations.push(Recommendation::new(
            RecommendationKind::InteractiveCtas,
            priority,
            format!(
                "Increase interactive calls to action: average engagement is {overall:.2}%"
            ),
            targets(),
        ));
    }

    let tags: Vec<String> = snapshot
        .top_hashtags()
        .iter()
        .take(HASHTAG_FOCUS_COUNT)
        .map(|t| t.tag.clone())
        .collect();
    if !tags.is_empty() {
        recommendations.push(Recommendation::new(
            RecommendationKind::HashtagFocus { tags: tags.clone() },
            Priority::Low,
            format!("Focus hashtags on {}", tags.join(" ")),
            targets(),
        ));
    }

    recommendations.retain(|r| options.includes(r.focus_area));
    recommendations.sort_by_key(|r| r.priority);
    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evolver::types::FocusArea;
    use campaign_analytics::{CanonicalPost, InsightExtractor};
    use chrono::{TimeZone, Utc};

    fn post(platform: &str, post_type: &str, likes: u64, hour: u32, tags: &[&str]) -> CanonicalPost {
        CanonicalPost {
            platform: platform.to_string(),
            post_type: post_type.to_string(),
            likes,
            impressions: 1000,
            posted_at: Some(Utc.with_ymd_and_hms(2024, 3, 4, hour, 0, 0).unwrap()),
            hashtags: tags.iter().map(|t| t.to_string()).collect(),
            ..CanonicalPost::default()
        }
    }

    fn snapshot() -> InsightSnapshot {
        // rates: reel 6.0, image 1.0, link 0.5
        InsightExtractor::default().extract(
            None,
            &[
                post("instagram", "reel", 60, 18, &["#local", "#brunch"]),
                post("instagram", "image", 10, 9, &["#brunch"]),
                post("facebook", "link", 5, 12, &[]),
            ],
        )
    }

    #[test]
    fn empty_snapshot_yields_nothing() {
        let empty = InsightExtractor::default().extract(None, &[]);
        let comparison = PerformanceComparison::between(None, &empty);
        let recs = recommend(&empty, &comparison, ClassificationThresholds::default(), &[1], &EvolutionOptions::default());
        assert!(recs.is_empty());
    }

    #[test]
    fn rules_fire_and_sort_by_priority() {
        let snap = snapshot();
        let comparison = PerformanceComparison::between(None, &snap);
        let recs = recommend(&snap, &comparison, ClassificationThresholds::default(), &[1, 2], &EvolutionOptions::default());

        let kinds: Vec<(&RecommendationKind, Priority)> =
            recs.iter().map(|r| (&r.kind, r.priority)).collect();
        // overall 2.5; reel 6.0 >= 3.75; 18h 6.0 >= 2 * 1.0; instagram 3.5 >= 2 * 0.5
        assert_eq!(
            kinds,
            vec![
                (&RecommendationKind::ContentTypeShift { post_type: "reel".into() }, Priority::High),
                (&RecommendationKind::PostingTimeShift { hour: 18 }, Priority::High),
                (&RecommendationKind::PlatformReallocation { platform: "instagram".into() }, Priority::High),
                (&RecommendationKind::InteractiveCtas, Priority::Low),
                (&RecommendationKind::HashtagFocus { tags: vec!["#brunch".into(), "#local".into()] }, Priority::Low),
            ]
        );
        assert!(recs.iter().all(|r| r.target_weeks == vec![1, 2]));
        assert!(recs[1].description.contains("18:00"));
    }

    #[test]
    fn platform_ranking_uses_mean_rate_not_raw_engagement() {
        let reach = CanonicalPost {
            impressions: 100_000,
            ..post("facebook", "image", 300, 9, &[])
        };
        let snap = InsightExtractor::default()
            .extract(None, &[reach, post("instagram", "image", 20, 9, &[])]);
        assert!(
            snap.platforms()["facebook"].average_engagement
                > snap.platforms()["instagram"].average_engagement
        );
        let comparison = PerformanceComparison::between(None, &snap);
        let options = EvolutionOptions::default().focus([FocusArea::Platforms]);

        let recs = recommend(&snap, &comparison, ClassificationThresholds::default(), &[1], &options);

        assert_eq!(
            recs.iter().map(|r| &r.kind).collect::<Vec<_>>(),
            vec![&RecommendationKind::PlatformReallocation { platform: "instagram".into() }]
        );
    }

    #[test]
    fn focus_areas_filter() {
        let snap = snapshot();
        let comparison = PerformanceComparison::between(None, &snap);
        let options = EvolutionOptions::default().focus([FocusArea::Hashtags, FocusArea::Timing]);
        let recs = recommend(&snap, &comparison, ClassificationThresholds::default(), &[1], &options);

        let areas: Vec<FocusArea> = recs.iter().map(|r| r.focus_area).collect();
        assert_eq!(areas, vec![FocusArea::Timing, FocusArea::Hashtags]);
    }

    #[test]
    fn low_average_makes_ctas_high_priority() {
        let snap = InsightExtractor::default().extract(None, &[post("instagram", "image", 5, 9, &[])]);
        let comparison = PerformanceComparison::between(None, &snap);
        let recs = recommend(&snap, &comparison, ClassificationThresholds::default(), &[1], &EvolutionOptions::default());

        let cta = recs.iter().find(|r| r.kind == RecommendationKind::InteractiveCtas).unwrap();
        assert_eq!(cta.priority, Priority::High);
    }
}
