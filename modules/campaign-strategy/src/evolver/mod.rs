// StrategyEvolver: new analytics in, recommendations and week edits out.
//
// normalize → classify → snapshot → compare with the previous snapshot →
// recommend → (optionally) apply to editable weeks → one store commit.

mod apply;
mod compare;
mod recommend;
mod types;

pub use apply::{apply_recommendation, apply_to_weeks, is_interactive, INTERACTIVE_CTA};
pub use recommend::recommend;
pub use types::{
    EvolutionOptions, EvolutionRecord, FocusArea, MetricDelta, PerformanceComparison, Priority,
    Recommendation, RecommendationKind, WeekChange,
};

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use campaign_analytics::{AnalyticsNormalizer, InsightExtractor, InsightSnapshot};
use campaign_common::{CampaignResult, Week};

use crate::store::{CampaignStore, EvolutionCommit};

#[derive(Debug, Clone, Serialize)]
pub struct EvolutionOutcome {
    pub record: EvolutionRecord,
    pub snapshot: InsightSnapshot,
    /// Weeks as rewritten by this run.
    pub updated_weeks: Vec<Week>,
}

pub struct StrategyEvolver {
    store: Arc<dyn CampaignStore>,
    normalizer: AnalyticsNormalizer,
    extractor: InsightExtractor,
}

impl StrategyEvolver {
    pub fn new(
        store: Arc<dyn CampaignStore>,
        normalizer: AnalyticsNormalizer,
        extractor: InsightExtractor,
    ) -> Self {
        Self {
            store,
            normalizer,
            extractor,
        }
    }

    pub async fn evolve(
        &self,
        campaign_id: Uuid,
        raw_analytics: &Value,
        options: &EvolutionOptions,
    ) -> CampaignResult<EvolutionOutcome> {
        let campaign = self.store.get_campaign(campaign_id).await?;
        let normalized = self.normalizer.normalize(raw_analytics)?;
        let snapshot = self.extractor.extract(Some(campaign_id), &normalized.posts);
        let baseline = self.store.latest_insight_snapshot(campaign_id).await?;
        let comparison = PerformanceComparison::between(baseline.as_ref(), &snapshot);

        let weeks = self.store.list_weeks(campaign_id).await?;
        let target_weeks: Vec<u32> = weeks.iter().map(|w| w.week_number).collect();
        let recommendations = recommend(
            &snapshot,
            &comparison,
            self.extractor.classifier().thresholds(),
            &target_weeks,
            options,
        );

        let now = Utc::now();
        let (week_updates, applied_changes) = if options.auto_apply {
            apply_to_weeks(
                campaign_id,
                &weeks,
                &recommendations,
                options.preserve_scheduled,
                now,
            )
        } else {
            (Vec::new(), Vec::new())
        };
        let updated_weeks: Vec<Week> = week_updates.iter().map(|u| u.week.clone()).collect();

        let record = EvolutionRecord {
            id: Uuid::new_v4(),
            campaign_id,
            snapshot_id: snapshot.id(),
            baseline_snapshot_id: comparison.baseline_snapshot_id,
            comparison,
            recommendations,
            applied_changes,
            options: options.clone(),
            created_at: now,
        };

        self.store
            .commit_evolution(&EvolutionCommit {
                snapshot: snapshot.clone(),
                week_updates,
                record: record.clone(),
            })
            .await?;

        info!(
            campaign_id = %campaign.id,
            posts = normalized.posts.len(),
            skipped = normalized.skipped.len(),
            recommendations = record.recommendations.len(),
            changes = record.applied_changes.len(),
            weeks_updated = updated_weeks.len(),
            "Strategy evolved"
        );

        Ok(EvolutionOutcome {
            record,
            snapshot,
            updated_weeks,
        })
    }

    /// Evolution records for a campaign, oldest first.
    pub async fn evolutions(&self, campaign_id: Uuid) -> CampaignResult<Vec<EvolutionRecord>> {
        self.store.list_evolutions(campaign_id).await
    }

    /// Applied changes for a campaign, optionally for one week.
    pub async fn week_changes(
        &self,
        campaign_id: Uuid,
        week_number: Option<u32>,
    ) -> CampaignResult<Vec<WeekChange>> {
        self.store.list_week_changes(campaign_id, week_number).await
    }
}
