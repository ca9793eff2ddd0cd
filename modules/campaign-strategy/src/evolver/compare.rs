use std::collections::BTreeMap;

use campaign_analytics::{InsightSnapshot, SnapshotMetrics};

use super::types::{MetricDelta, PerformanceComparison};

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn delta(metric: &str, previous: Option<f64>, current: f64) -> MetricDelta {
    let change = previous.map(|p| round2(current - p));
    let percent_change = previous
        .filter(|p| *p != 0.0)
        .map(|p| round2((current - p) / p * 100.0));
    MetricDelta {
        metric: metric.to_string(),
        previous,
        current,
        change,
        percent_change,
    }
}

fn metric_values(metrics: &SnapshotMetrics) -> [(&'static str, f64); 6] {
    [
        ("post_count", metrics.post_count as f64),
        ("average_engagement_rate", metrics.average_engagement_rate),
        ("total_impressions", metrics.total_impressions as f64),
        ("total_engagement", metrics.total_engagement as f64),
        ("high_performer_count", metrics.high_performer_count as f64),
        ("low_performer_count", metrics.low_performer_count as f64),
    ]
}

impl PerformanceComparison {
    /// Compare `current` against the previous snapshot, when there is one.
    pub fn between(baseline: Option<&InsightSnapshot>, current: &InsightSnapshot) -> Self {
        let previous_metrics = baseline.map(|b| metric_values(b.metrics()));
        let metrics = metric_values(current.metrics())
            .iter()
            .enumerate()
            .map(|(idx, (name, value))| {
                delta(name, previous_metrics.as_ref().map(|p| p[idx].1), *value)
            })
            .collect();

        let platforms = current
            .platforms()
            .iter()
            .map(|(platform, stats)| {
                let previous = baseline
                    .and_then(|b| b.platforms().get(platform))
                    .map(|s| s.average_engagement_rate);
                (
                    platform.clone(),
                    delta("average_engagement_rate", previous, stats.average_engagement_rate),
                )
            })
            .collect::<BTreeMap<_, _>>();

        let content_types = current
            .content_types()
            .iter()
            .map(|(post_type, stats)| {
                let previous = baseline
                    .and_then(|b| b.content_types().get(post_type))
                    .map(|s| s.average_engagement_rate);
                (
                    post_type.clone(),
                    delta("average_engagement_rate", previous, stats.average_engagement_rate),
                )
            })
            .collect::<BTreeMap<_, _>>();

        Self {
            baseline_snapshot_id: baseline.map(InsightSnapshot::id),
            metrics,
            platforms,
            content_types,
        }
    }

    pub fn metric(&self, name: &str) -> Option<&MetricDelta> {
        self.metrics.iter().find(|m| m.metric == name)
    }

    /// Change in average engagement rate since the baseline.
    pub fn engagement_rate_change(&self) -> Option<f64> {
        self.metric("average_engagement_rate").and_then(|m| m.change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campaign_analytics::{CanonicalPost, InsightExtractor};

    fn post(platform: &str, likes: u64, impressions: u64) -> CanonicalPost {
        CanonicalPost {
            platform: platform.to_string(),
            post_type: "image".to_string(),
            likes,
            impressions,
            ..CanonicalPost::default()
        }
    }

    #[test]
    fn first_comparison_has_no_baseline() {
        let current = InsightExtractor::default().extract(None, &[post("instagram", 20, 1000)]);
        let comparison = PerformanceComparison::between(None, &current);

        assert_eq!(comparison.baseline_snapshot_id, None);
        let rate = comparison.metric("average_engagement_rate").unwrap();
        assert_eq!(rate.current, 2.0);
        assert_eq!(rate.previous, None);
        assert_eq!(comparison.engagement_rate_change(), None);
    }

    #[test]
    fn deltas_against_baseline() {
        let extractor = InsightExtractor::default();
        let baseline = extractor.extract(None, &[post("instagram", 20, 1000)]);
        let current = extractor.extract(
            None,
            &[post("instagram", 30, 1000), post("facebook", 10, 1000)],
        );
        let comparison = PerformanceComparison::between(Some(&baseline), &current);

        assert_eq!(comparison.baseline_snapshot_id, Some(baseline.id()));
        // 2.0 -> mean(3.0, 1.0) = 2.0
        let rate = comparison.metric("average_engagement_rate").unwrap();
        assert_eq!(rate.change, Some(0.0));
        let posts = comparison.metric("post_count").unwrap();
        assert_eq!(posts.percent_change, Some(100.0));

        let instagram = &comparison.platforms["instagram"];
        assert_eq!(instagram.previous, Some(2.0));
        assert_eq!(instagram.change, Some(1.0));
        assert_eq!(instagram.percent_change, Some(50.0));
        assert_eq!(comparison.platforms["facebook"].previous, None);
    }
}
