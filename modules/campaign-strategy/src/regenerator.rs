use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use ai_client::TextGenerator;
use campaign_common::{
    CampaignError, CampaignResult, GenerationSettings, HistoryQuery, RegenerationHistoryEntry,
    Week, WeekContent,
};

use crate::generation::{call_generator, parse_week, week_prompt, WeekContext};
use crate::store::CampaignStore;

/// Caller input for rewriting one week.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegenerationOptions {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default)]
    pub preferences: BTreeMap<String, String>,
}

impl RegenerationOptions {
    pub fn with_reason(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            ..Self::default()
        }
    }

    pub fn feedback(mut self, feedback: impl Into<String>) -> Self {
        self.feedback = Some(feedback.into());
        self
    }

    pub fn preference(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.preferences.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RegenerationOutcome {
    pub week: Week,
    pub history_entry: RegenerationHistoryEntry,
}

/// Rewrites single weeks of a stored strategy.
///
/// Each rewrite is one store commit: the week and its history entry land
/// together or not at all. A failed generation, a rejected response or a
/// concurrent edit leaves the week untouched.
pub struct WeekRegenerator {
    store: Arc<dyn CampaignStore>,
    generator: Arc<dyn TextGenerator>,
    settings: GenerationSettings,
}

impl WeekRegenerator {
    pub fn new(
        store: Arc<dyn CampaignStore>,
        generator: Arc<dyn TextGenerator>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            store,
            generator,
            settings,
        }
    }

    pub async fn regenerate(
        &self,
        campaign_id: Uuid,
        week_number: u32,
        options: &RegenerationOptions,
    ) -> CampaignResult<RegenerationOutcome> {
        let campaign = self.store.get_campaign(campaign_id).await?;
        let weeks = self.store.list_weeks(campaign_id).await?;
        let find = |n: u32| weeks.iter().find(|w| w.week_number == n);

        let current = find(week_number).ok_or_else(|| {
            CampaignError::not_found("week", format!("{campaign_id}/{week_number}"))
        })?;
        let previous = week_number.checked_sub(1).and_then(find);
        let next = find(week_number + 1);
        let insights = self.store.latest_insight_snapshot(campaign_id).await?;

        info!(
            campaign_id = %campaign_id,
            week_number,
            version = current.version,
            reason = options.reason.as_str(),
            "Regenerating week"
        );

        let prompt = week_prompt(
            &WeekContext {
                campaign: &campaign,
                current,
                previous,
                next,
                options,
                insights: insights.as_ref(),
            },
            &self.settings,
        );
        let raw = call_generator(self.generator.as_ref(), &prompt, self.settings.timeout).await?;
        let content = parse_week(&raw)?;
        check_against_neighbors(&content, previous, next)?;

        let outcome =
            commit_week(self.store.as_ref(), current, content, options.reason.clone()).await?;
        info!(
            campaign_id = %campaign_id,
            week_number,
            version = outcome.week.version,
            posts = outcome.week.posts.len(),
            "Week regenerated"
        );
        Ok(outcome)
    }

    /// Regeneration history for a campaign, oldest first.
    pub async fn history(
        &self,
        campaign_id: Uuid,
        query: &HistoryQuery,
    ) -> CampaignResult<Vec<RegenerationHistoryEntry>> {
        self.store.list_history(campaign_id, query).await
    }

    /// Restore the week content an entry replaced. See [`rollback_week`].
    pub async fn rollback(
        &self,
        campaign_id: Uuid,
        entry_id: Uuid,
    ) -> CampaignResult<RegenerationOutcome> {
        rollback_week(self.store.as_ref(), campaign_id, entry_id).await
    }
}

/// Restore the week content a history entry replaced. The rollback itself
/// is recorded as a new entry. Needs only the store, never a generator.
pub async fn rollback_week(
    store: &dyn CampaignStore,
    campaign_id: Uuid,
    entry_id: Uuid,
) -> CampaignResult<RegenerationOutcome> {
    let entry = store.get_history_entry(campaign_id, entry_id).await?;
    let current = store.get_week(campaign_id, entry.week_number).await?;
    let outcome = commit_week(
        store,
        &current,
        entry.previous_week.content(),
        format!("rollback:{entry_id}"),
    )
    .await?;
    info!(
        campaign_id = %campaign_id,
        week_number = entry.week_number,
        entry_id = %entry_id,
        "Week rolled back"
    );
    Ok(outcome)
}

async fn commit_week(
    store: &dyn CampaignStore,
    current: &Week,
    content: WeekContent,
    reason: String,
) -> CampaignResult<RegenerationOutcome> {
    let now = Utc::now();
    let week = current.with_content(content, now);
    let history_entry = RegenerationHistoryEntry {
        id: Uuid::new_v4(),
        campaign_id: current.campaign_id,
        week_number: current.week_number,
        previous_week: current.clone(),
        new_week: week.clone(),
        reason,
        created_at: now,
    };
    store
        .commit_regeneration(&week, current.version, &history_entry)
        .await?;
    Ok(RegenerationOutcome {
        week,
        history_entry,
    })
}

fn same_theme(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

fn check_against_neighbors(
    content: &WeekContent,
    previous: Option<&Week>,
    next: Option<&Week>,
) -> CampaignResult<()> {
    if content.posts.is_empty() {
        return Err(CampaignError::validation("regenerated week has no posts"));
    }
    for neighbor in previous.into_iter().chain(next) {
        if same_theme(&content.theme, &neighbor.theme) {
            return Err(CampaignError::validation(format!(
                "theme \"{}\" repeats week {}",
                content.theme, neighbor.week_number
            )));
        }
    }
    Ok(())
}
