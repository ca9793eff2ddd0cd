use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use campaign_analytics::InsightSnapshot;
use campaign_common::{
    validate_week_sequence, Campaign, CampaignError, CampaignResult, CampaignStatus,
    HistoryQuery, RegenerationHistoryEntry, Week,
};

use super::{weeks_from_plan, CampaignStore, EvolutionCommit, StrategyWrite};
use crate::evolver::{EvolutionRecord, WeekChange};

#[derive(Default)]
struct Inner {
    campaigns: HashMap<Uuid, Campaign>,
    weeks: HashMap<Uuid, BTreeMap<u32, Week>>,
    history: Vec<RegenerationHistoryEntry>,
    snapshots: HashMap<Uuid, Vec<InsightSnapshot>>,
    evolutions: Vec<EvolutionRecord>,
    week_changes: Vec<WeekChange>,
}

impl Inner {
    fn campaign(&self, campaign_id: Uuid) -> CampaignResult<&Campaign> {
        self.campaigns
            .get(&campaign_id)
            .ok_or_else(|| CampaignError::not_found("campaign", campaign_id))
    }

    fn week(&self, campaign_id: Uuid, week_number: u32) -> CampaignResult<&Week> {
        self.campaign(campaign_id)?;
        self.weeks
            .get(&campaign_id)
            .and_then(|weeks| weeks.get(&week_number))
            .ok_or_else(|| CampaignError::not_found("week", format!("{campaign_id}/{week_number}")))
    }

    fn check_version(&self, week: &Week, expected_version: i64) -> CampaignResult<()> {
        let current = self.week(week.campaign_id, week.week_number)?;
        if current.version != expected_version {
            return Err(CampaignError::Conflict(format!(
                "week {} of campaign {} is at version {}, expected {}",
                week.week_number, week.campaign_id, current.version, expected_version
            )));
        }
        Ok(())
    }

    fn put_week(&mut self, week: &Week) {
        self.weeks
            .entry(week.campaign_id)
            .or_default()
            .insert(week.week_number, week.clone());
    }
}

/// Process-local store. One mutex guards all state, so every method is a
/// single atomic step and same-week writers serialize on it.
#[derive(Default)]
pub struct InMemoryCampaignStore {
    inner: Mutex<Inner>,
}

impl InMemoryCampaignStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> CampaignResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| CampaignError::Storage("in-memory store mutex poisoned".to_string()))
    }

    /// Number of regeneration history entries across all campaigns.
    pub fn history_len(&self) -> usize {
        self.inner.lock().map(|i| i.history.len()).unwrap_or(0)
    }

    pub fn campaign_count(&self) -> usize {
        self.inner.lock().map(|i| i.campaigns.len()).unwrap_or(0)
    }

    pub fn snapshot_count(&self, campaign_id: Uuid) -> usize {
        self.inner
            .lock()
            .map(|i| i.snapshots.get(&campaign_id).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

#[async_trait]
impl CampaignStore for InMemoryCampaignStore {
    async fn create_campaign(&self, campaign: &Campaign) -> CampaignResult<Uuid> {
        let mut inner = self.lock()?;
        if inner.campaigns.contains_key(&campaign.id) {
            return Err(CampaignError::Conflict(format!(
                "campaign {} already exists",
                campaign.id
            )));
        }
        inner.campaigns.insert(campaign.id, campaign.clone());
        Ok(campaign.id)
    }

    async fn get_campaign(&self, campaign_id: Uuid) -> CampaignResult<Campaign> {
        self.lock()?.campaign(campaign_id).cloned()
    }

    async fn update_campaign_status(
        &self,
        campaign_id: Uuid,
        status: CampaignStatus,
    ) -> CampaignResult<()> {
        let mut inner = self.lock()?;
        let campaign = inner
            .campaigns
            .get_mut(&campaign_id)
            .ok_or_else(|| CampaignError::not_found("campaign", campaign_id))?;
        campaign.status = status;
        campaign.updated_at = Utc::now();
        Ok(())
    }

    async fn write_strategy(
        &self,
        campaign: &Campaign,
        strategy: &StrategyWrite,
    ) -> CampaignResult<()> {
        let mut inner = self.lock()?;
        let campaign_id = campaign.id;
        let mut stored = inner
            .campaigns
            .get(&campaign_id)
            .cloned()
            .unwrap_or_else(|| campaign.clone());
        if inner.weeks.get(&campaign_id).is_some_and(|w| !w.is_empty()) {
            return Err(CampaignError::Conflict(format!(
                "campaign {campaign_id} already has a strategy"
            )));
        }
        validate_week_sequence(strategy.weeks.iter().map(|w| w.week_number), stored.total_weeks)?;

        let now = Utc::now();
        let weeks: BTreeMap<u32, Week> = weeks_from_plan(campaign_id, &strategy.weeks, now)
            .into_iter()
            .map(|w| (w.week_number, w))
            .collect();
        inner.weeks.insert(campaign_id, weeks);

        stored.overview = Some(strategy.overview.clone());
        stored.strategy_source = Some(strategy.source);
        stored.degraded = strategy.source.is_degraded();
        stored.status = CampaignStatus::Active;
        stored.updated_at = now;
        inner.campaigns.insert(campaign_id, stored);
        Ok(())
    }

    async fn list_weeks(&self, campaign_id: Uuid) -> CampaignResult<Vec<Week>> {
        let inner = self.lock()?;
        inner.campaign(campaign_id)?;
        Ok(inner
            .weeks
            .get(&campaign_id)
            .map(|weeks| weeks.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_week(&self, campaign_id: Uuid, week_number: u32) -> CampaignResult<Week> {
        self.lock()?.week(campaign_id, week_number).cloned()
    }

    async fn replace_week(&self, week: &Week, expected_version: i64) -> CampaignResult<()> {
        let mut inner = self.lock()?;
        inner.check_version(week, expected_version)?;
        inner.put_week(week);
        Ok(())
    }

    async fn append_history(&self, entry: &RegenerationHistoryEntry) -> CampaignResult<()> {
        let mut inner = self.lock()?;
        inner.campaign(entry.campaign_id)?;
        inner.history.push(entry.clone());
        Ok(())
    }

    async fn commit_regeneration(
        &self,
        week: &Week,
        expected_version: i64,
        entry: &RegenerationHistoryEntry,
    ) -> CampaignResult<()> {
        let mut inner = self.lock()?;
        inner.check_version(week, expected_version)?;
        inner.put_week(week);
        inner.history.push(entry.clone());
        Ok(())
    }

    async fn list_history(
        &self,
        campaign_id: Uuid,
        query: &HistoryQuery,
    ) -> CampaignResult<Vec<RegenerationHistoryEntry>> {
        let inner = self.lock()?;
        inner.campaign(campaign_id)?;
        Ok(inner
            .history
            .iter()
            .filter(|e| e.campaign_id == campaign_id && query.matches(e))
            .cloned()
            .collect())
    }

    async fn get_history_entry(
        &self,
        campaign_id: Uuid,
        entry_id: Uuid,
    ) -> CampaignResult<RegenerationHistoryEntry> {
        self.lock()?
            .history
            .iter()
            .find(|e| e.campaign_id == campaign_id && e.id == entry_id)
            .cloned()
            .ok_or_else(|| CampaignError::not_found("history entry", entry_id))
    }

    async fn latest_insight_snapshot(
        &self,
        campaign_id: Uuid,
    ) -> CampaignResult<Option<InsightSnapshot>> {
        let inner = self.lock()?;
        inner.campaign(campaign_id)?;
        Ok(inner
            .snapshots
            .get(&campaign_id)
            .and_then(|s| s.last())
            .cloned())
    }

    async fn append_insight_snapshot(
        &self,
        campaign_id: Uuid,
        snapshot: &InsightSnapshot,
    ) -> CampaignResult<()> {
        let mut inner = self.lock()?;
        inner.campaign(campaign_id)?;
        inner
            .snapshots
            .entry(campaign_id)
            .or_default()
            .push(snapshot.clone());
        Ok(())
    }

    async fn commit_evolution(&self, commit: &EvolutionCommit) -> CampaignResult<()> {
        let mut inner = self.lock()?;
        let campaign_id = commit.record.campaign_id;
        inner.campaign(campaign_id)?;
        // Check every version before touching anything.
        for update in &commit.week_updates {
            inner.check_version(&update.week, update.expected_version)?;
        }

        inner
            .snapshots
            .entry(campaign_id)
            .or_default()
            .push(commit.snapshot.clone());
        for update in &commit.week_updates {
            inner.put_week(&update.week);
        }
        inner
            .week_changes
            .extend(commit.record.applied_changes.iter().cloned());
        inner.evolutions.push(commit.record.clone());
        Ok(())
    }

    async fn list_evolutions(&self, campaign_id: Uuid) -> CampaignResult<Vec<EvolutionRecord>> {
        let inner = self.lock()?;
        inner.campaign(campaign_id)?;
        Ok(inner
            .evolutions
            .iter()
            .filter(|r| r.campaign_id == campaign_id)
            .cloned()
            .collect())
    }

    async fn list_week_changes(
        &self,
        campaign_id: Uuid,
        week_number: Option<u32>,
    ) -> CampaignResult<Vec<WeekChange>> {
        let inner = self.lock()?;
        inner.campaign(campaign_id)?;
        Ok(inner
            .week_changes
            .iter()
            .filter(|c| c.campaign_id == campaign_id)
            .filter(|c| week_number.map_or(true, |n| c.week_number == n))
            .cloned()
            .collect())
    }
}
