// Test mocks and fixtures for the strategy engine.
//
// - MockGenerator (TextGenerator): a queue of canned replies, failures and
//   stalls; records every prompt it receives
// - FailingWriteStore (CampaignStore): an in-memory store whose strategy
//   writes always fail
// - fixture builders for params, generator responses, seeded campaigns and
//   analytics exports

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use ai_client::{AiError, GenerationPrompt, TextGenerator};
use campaign_analytics::InsightSnapshot;
use campaign_common::{
    Campaign, CampaignError, CampaignOverview, CampaignParams, CampaignResult, CampaignStatus,
    HistoryQuery, PlannedWeek, Post, PostStatus, RegenerationHistoryEntry, StrategySource, Week,
    WeekContent, WeekStatus,
};

use crate::evolver::{EvolutionRecord, WeekChange};
use crate::store::{CampaignStore, EvolutionCommit, InMemoryCampaignStore, StrategyWrite};

// ---------------------------------------------------------------------------
// MockGenerator
// ---------------------------------------------------------------------------

enum MockReply {
    Text(String),
    Fail(AiError),
    Stall(Duration),
}

/// Replies are consumed in order; an exhausted queue answers with
/// `AiError::EmptyResponse`.
#[derive(Default)]
pub struct MockGenerator {
    replies: Mutex<VecDeque<MockReply>>,
    prompts: Mutex<Vec<GenerationPrompt>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, text: impl Into<String>) -> Self {
        self.push(MockReply::Text(text.into()))
    }

    pub fn fail(self, message: &str) -> Self {
        self.push(MockReply::Fail(AiError::Network(message.to_string())))
    }

    /// Report an upstream timeout.
    pub fn time_out(self) -> Self {
        self.push(MockReply::Fail(AiError::Timeout))
    }

    /// Sleep for `duration` before answering, to trip the caller's timeout.
    pub fn stall(self, duration: Duration) -> Self {
        self.push(MockReply::Stall(duration))
    }

    fn push(self, reply: MockReply) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<GenerationPrompt> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn last_prompt(&self) -> Option<GenerationPrompt> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, prompt: &GenerationPrompt) -> Result<String, AiError> {
        self.prompts.lock().unwrap().push(prompt.clone());
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(MockReply::Text(text)) => Ok(text),
            Some(MockReply::Fail(error)) => Err(error),
            Some(MockReply::Stall(duration)) => {
                tokio::time::sleep(duration).await;
                Ok("{}".to_string())
            }
            None => Err(AiError::EmptyResponse("mock".to_string())),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// FailingWriteStore
// ---------------------------------------------------------------------------

/// Delegates to an in-memory store, except that `write_strategy` reports a
/// storage failure without touching it.
#[derive(Default)]
pub struct FailingWriteStore {
    pub inner: InMemoryCampaignStore,
}

impl FailingWriteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CampaignStore for FailingWriteStore {
    async fn create_campaign(&self, campaign: &Campaign) -> CampaignResult<Uuid> {
        self.inner.create_campaign(campaign).await
    }

    async fn get_campaign(&self, campaign_id: Uuid) -> CampaignResult<Campaign> {
        self.inner.get_campaign(campaign_id).await
    }

    async fn update_campaign_status(
        &self,
        campaign_id: Uuid,
        status: CampaignStatus,
    ) -> CampaignResult<()> {
        self.inner.update_campaign_status(campaign_id, status).await
    }

    async fn write_strategy(&self, _: &Campaign, _: &StrategyWrite) -> CampaignResult<()> {
        Err(CampaignError::Storage("write refused".to_string()))
    }

    async fn list_weeks(&self, campaign_id: Uuid) -> CampaignResult<Vec<Week>> {
        self.inner.list_weeks(campaign_id).await
    }

    async fn get_week(&self, campaign_id: Uuid, week_number: u32) -> CampaignResult<Week> {
        self.inner.get_week(campaign_id, week_number).await
    }

    async fn replace_week(&self, week: &Week, expected_version: i64) -> CampaignResult<()> {
        self.inner.replace_week(week, expected_version).await
    }

    async fn append_history(&self, entry: &RegenerationHistoryEntry) -> CampaignResult<()> {
        self.inner.append_history(entry).await
    }

    async fn commit_regeneration(
        &self,
        week: &Week,
        expected_version: i64,
        entry: &RegenerationHistoryEntry,
    ) -> CampaignResult<()> {
        self.inner.commit_regeneration(week, expected_version, entry).await
    }

    async fn list_history(
        &self,
        campaign_id: Uuid,
        query: &HistoryQuery,
    ) -> CampaignResult<Vec<RegenerationHistoryEntry>> {
        self.inner.list_history(campaign_id, query).await
    }

    async fn get_history_entry(
        &self,
        campaign_id: Uuid,
        entry_id: Uuid,
    ) -> CampaignResult<RegenerationHistoryEntry> {
        self.inner.get_history_entry(campaign_id, entry_id).await
    }

    async fn latest_insight_snapshot(
        &self,
        campaign_id: Uuid,
    ) -> CampaignResult<Option<InsightSnapshot>> {
        self.inner.latest_insight_snapshot(campaign_id).await
    }

    async fn append_insight_snapshot(
        &self,
        campaign_id: Uuid,
        snapshot: &InsightSnapshot,
    ) -> CampaignResult<()> {
        self.inner.append_insight_snapshot(campaign_id, snapshot).await
    }

    async fn commit_evolution(&self, commit: &EvolutionCommit) -> CampaignResult<()> {
        self.inner.commit_evolution(commit).await
    }

    async fn list_evolutions(&self, campaign_id: Uuid) -> CampaignResult<Vec<EvolutionRecord>> {
        self.inner.list_evolutions(campaign_id).await
    }

    async fn list_week_changes(
        &self,
        campaign_id: Uuid,
        week_number: Option<u32>,
    ) -> CampaignResult<Vec<WeekChange>> {
        self.inner.list_week_changes(campaign_id, week_number).await
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn sample_params(total_weeks: u32) -> CampaignParams {
    CampaignParams::builder()
        .client_ref("client-42")
        .name("Spring at Hearth Bakery")
        .business_type("bakery")
        .primary_goal("weekday foot traffic")
        .target_audience("local families")
        .brand_voice("warm")
        .platforms(vec!["instagram".to_string(), "facebook".to_string()])
        .posts_per_week(2)
        .total_weeks(total_weeks)
        .build()
}

fn post_json(week: u32, idx: u32) -> Value {
    json!({
        "platform": if idx % 2 == 1 { "instagram" } else { "facebook" },
        "post_type": "image",
        "content": format!("Week {week} post {idx}"),
        "hashtags": "#bakery",
        "call_to_action": "Visit us",
        "content_pillar": "community",
        "visual_requirements": "storefront photo"
    })
}

/// A well-formed generator response.
pub fn strategy_json(weeks: u32, posts_per_week: u32) -> String {
    let weeks: Vec<Value> = (1..=weeks)
        .map(|n| {
            json!({
                "week_number": n,
                "theme": format!("Theme {n}"),
                "objectives": [format!("Objective {n}")],
                "key_messages": [format!("Message {n}")],
                "posts": (1..=posts_per_week).map(|i| post_json(n, i)).collect::<Vec<_>>()
            })
        })
        .collect();
    json!({
        "campaign_overview": {
            "strategy_summary": "Bring neighbors in on weekdays.",
            "success_metrics": ["foot traffic +10%"],
            "content_pillars": ["community", "craft"]
        },
        "weeks": weeks
    })
    .to_string()
}

/// A well-formed single-week response.
pub fn week_json(theme: &str, posts: u32) -> String {
    json!({
        "theme": theme,
        "objectives": ["Fresh objective"],
        "key_messages": ["Fresh message"],
        "posts": (1..=posts).map(|i| post_json(0, i)).collect::<Vec<_>>()
    })
    .to_string()
}

fn planned_post(week: u32, idx: u32) -> Post {
    Post {
        position: idx,
        platform: "instagram".to_string(),
        post_type: "image".to_string(),
        content: format!("Week {week} post {idx}"),
        hashtags: "#bakery".to_string(),
        call_to_action: "Visit us".to_string(),
        content_pillar: "community".to_string(),
        visual_requirements: String::new(),
        scheduled_hour: None,
        status: PostStatus::Planned,
    }
}

/// Store an active campaign with themes "Theme N" and two posts per week.
pub async fn seed_campaign(store: &dyn CampaignStore, total_weeks: u32) -> Uuid {
    let params = sample_params(total_weeks);
    let campaign = Campaign::draft(&params, Utc::now());
    let campaign_id = campaign.id;
    let weeks = (1..=total_weeks)
        .map(|n| PlannedWeek {
            week_number: n,
            content: WeekContent {
                theme: format!("Theme {n}"),
                objectives: vec![format!("Objective {n}")],
                key_messages: vec![format!("Message {n}")],
                posts: vec![planned_post(n, 1), planned_post(n, 2)],
            },
        })
        .collect();
    store
        .write_strategy(
            &campaign,
            &StrategyWrite {
                overview: CampaignOverview::default(),
                weeks,
                source: StrategySource::Strict,
            },
        )
        .await
        .unwrap();
    campaign_id
}

/// Move a stored week to `status`.
pub async fn mark_week(
    store: &dyn CampaignStore,
    campaign_id: Uuid,
    week_number: u32,
    status: WeekStatus,
) {
    let mut week = store.get_week(campaign_id, week_number).await.unwrap();
    let expected = week.version;
    week.status = status;
    week.version += 1;
    store.replace_week(&week, expected).await.unwrap();
}

/// An export where reels at 18:00 clearly beat everything else.
pub fn sample_analytics() -> Value {
    json!({"posts": [
        {"platform": "instagram", "post_type": "reel", "caption": "Dawn bake #bakery #local",
         "likes": 50, "comments": 6, "shares": 4, "impressions": 1000, "posted_at": "2024-03-05T18:05:00Z"},
        {"platform": "instagram", "post_type": "image", "caption": "Menu #bakery",
         "likes": 9, "impressions": 1000, "posted_at": "2024-03-06T09:00:00Z"},
        {"platform": "facebook", "post_type": "link", "message": "Blog",
         "likes": 2, "impressions": 500, "posted_at": "2024-03-07T12:30:00Z"}
    ]})
}
