// CampaignStore: the persistence boundary for campaigns, weeks, history,
// insight snapshots, and evolution records.
//
// Every multi-row write is one method so implementations can make it a
// single transaction: write_strategy, commit_regeneration, commit_evolution.
// Week writes carry the version the caller read; a mismatch is a Conflict and
// nothing is written.
//
// Two implementations: InMemoryCampaignStore (tests, CLI without a database)
// and PostgresCampaignStore.

mod memory;
mod postgres;

pub use memory::InMemoryCampaignStore;
pub use postgres::PostgresCampaignStore;

use async_trait::async_trait;
use uuid::Uuid;

use campaign_analytics::InsightSnapshot;
use campaign_common::{
    Campaign, CampaignOverview, CampaignResult, CampaignStatus, HistoryQuery, PlannedWeek,
    RegenerationHistoryEntry, StrategySource, Week,
};

use crate::evolver::{EvolutionRecord, WeekChange};

/// A complete strategy, written in one unit.
#[derive(Debug, Clone)]
pub struct StrategyWrite {
    pub overview: CampaignOverview,
    pub weeks: Vec<PlannedWeek>,
    pub source: StrategySource,
}

/// A week rewrite guarded by the version it was read at.
#[derive(Debug, Clone)]
pub struct WeekUpdate {
    pub week: Week,
    pub expected_version: i64,
}

/// Everything one evolution run persists.
#[derive(Debug, Clone)]
pub struct EvolutionCommit {
    pub snapshot: InsightSnapshot,
    pub week_updates: Vec<WeekUpdate>,
    pub record: EvolutionRecord,
}

#[async_trait]
pub trait CampaignStore: Send + Sync {
    // --- Campaigns ---

    /// Insert a draft campaign; returns its id.
    async fn create_campaign(&self, campaign: &Campaign) -> CampaignResult<Uuid>;

    async fn get_campaign(&self, campaign_id: Uuid) -> CampaignResult<Campaign>;

    async fn update_campaign_status(
        &self,
        campaign_id: Uuid,
        status: CampaignStatus,
    ) -> CampaignResult<()>;

    /// Insert `campaign` unless it is already stored, then write overview,
    /// every week and every post, and activate it, all in one unit. Nothing
    /// is stored on failure, not even the campaign row. Fails with Conflict
    /// if the campaign already has weeks.
    async fn write_strategy(&self, campaign: &Campaign, strategy: &StrategyWrite)
        -> CampaignResult<()>;

    // --- Weeks ---

    /// Ordered by week number.
    async fn list_weeks(&self, campaign_id: Uuid) -> CampaignResult<Vec<Week>>;

    async fn get_week(&self, campaign_id: Uuid, week_number: u32) -> CampaignResult<Week>;

    /// Replace one week if it is still at `expected_version`.
    async fn replace_week(&self, week: &Week, expected_version: i64) -> CampaignResult<()>;

    // --- Regeneration history (append-only) ---

    async fn append_history(&self, entry: &RegenerationHistoryEntry) -> CampaignResult<()>;

    /// Replace the week and append its history entry together.
    async fn commit_regeneration(
        &self,
        week: &Week,
        expected_version: i64,
        entry: &RegenerationHistoryEntry,
    ) -> CampaignResult<()>;

    /// Oldest first.
    async fn list_history(
        &self,
        campaign_id: Uuid,
        query: &HistoryQuery,
    ) -> CampaignResult<Vec<RegenerationHistoryEntry>>;

    async fn get_history_entry(
        &self,
        campaign_id: Uuid,
        entry_id: Uuid,
    ) -> CampaignResult<RegenerationHistoryEntry>;

    // --- Insights and evolution (append-only) ---

    async fn latest_insight_snapshot(
        &self,
        campaign_id: Uuid,
    ) -> CampaignResult<Option<InsightSnapshot>>;

    async fn append_insight_snapshot(
        &self,
        campaign_id: Uuid,
        snapshot: &InsightSnapshot,
    ) -> CampaignResult<()>;

    /// Append the snapshot, rewrite the changed weeks, append the change log
    /// and the evolution record.
    async fn commit_evolution(&self, commit: &EvolutionCommit) -> CampaignResult<()>;

    /// Oldest first.
    async fn list_evolutions(&self, campaign_id: Uuid) -> CampaignResult<Vec<EvolutionRecord>>;

    /// Applied evolution changes, oldest first, optionally for one week.
    async fn list_week_changes(
        &self,
        campaign_id: Uuid,
        week_number: Option<u32>,
    ) -> CampaignResult<Vec<WeekChange>>;
}

/// Fresh week rows for a strategy write.
pub(crate) fn weeks_from_plan(
    campaign_id: Uuid,
    plan: &[PlannedWeek],
    now: chrono::DateTime<chrono::Utc>,
) -> Vec<Week> {
    plan.iter()
        .map(|planned| {
            let content = planned.content.clone().renumbered();
            Week {
                campaign_id,
                week_number: planned.week_number,
                theme: content.theme,
                objectives: content.objectives,
                key_messages: content.key_messages,
                status: campaign_common::WeekStatus::Draft,
                performance_score: None,
                posts: content.posts,
                version: 1,
                updated_at: now,
            }
        })
        .collect()
}
