use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;
use uuid::Uuid;

use crate::error::{CampaignError, CampaignResult};

pub const MAX_CAMPAIGN_WEEKS: u32 = 24;
pub const DEFAULT_CAMPAIGN_WEEKS: u32 = 12;
pub const DEFAULT_POSTS_PER_WEEK: u32 = 3;

// --- Status enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Active,
    Completed,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Active => "active",
            CampaignStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(CampaignStatus::Draft),
            "active" => Some(CampaignStatus::Active),
            "completed" => Some(CampaignStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeekStatus {
    Draft,
    Scheduled,
    Published,
}

impl WeekStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeekStatus::Draft => "draft",
            WeekStatus::Scheduled => "scheduled",
            WeekStatus::Published => "published",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(WeekStatus::Draft),
            "scheduled" => Some(WeekStatus::Scheduled),
            "published" => Some(WeekStatus::Published),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    #[default]
    Planned,
    Scheduled,
    Published,
}

/// Which step of the response parse chain produced a stored strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategySource {
    Strict,
    Recovered,
    Heuristic,
    Fallback,
}

impl StrategySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategySource::Strict => "strict",
            StrategySource::Recovered => "recovered",
            StrategySource::Heuristic => "heuristic",
            StrategySource::Fallback => "fallback",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "strict" => Some(StrategySource::Strict),
            "recovered" => Some(StrategySource::Recovered),
            "heuristic" => Some(StrategySource::Heuristic),
            "fallback" => Some(StrategySource::Fallback),
            _ => None,
        }
    }

    /// Fallback strategies carry no generated content.
    pub fn is_degraded(&self) -> bool {
        matches!(self, StrategySource::Fallback)
    }
}

// --- Campaign parameters ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDate {
    pub date: NaiveDate,
    pub label: String,
}

/// Inputs for generating a full strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TypedBuilder)]
pub struct CampaignParams {
    #[builder(setter(into))]
    pub client_ref: String,
    #[builder(default, setter(into))]
    #[serde(default)]
    pub name: String,
    #[builder(setter(into))]
    pub business_type: String,
    #[builder(setter(into))]
    pub primary_goal: String,
    #[builder(default, setter(into))]
    #[serde(default)]
    pub target_audience: String,
    #[builder(default, setter(into))]
    #[serde(default)]
    pub primary_offer: String,
    #[builder(default, setter(into))]
    #[serde(default)]
    pub brand_voice: String,
    #[builder(default)]
    #[serde(default)]
    pub platforms: Vec<String>,
    #[builder(default = DEFAULT_POSTS_PER_WEEK)]
    #[serde(default = "default_posts_per_week")]
    pub posts_per_week: u32,
    #[builder(default = DEFAULT_CAMPAIGN_WEEKS)]
    #[serde(default = "default_total_weeks")]
    pub total_weeks: u32,
    #[builder(default)]
    #[serde(default)]
    pub key_dates: Vec<KeyDate>,
    #[builder(default = Utc::now().date_naive())]
    #[serde(default = "today")]
    pub start_date: NaiveDate,
}

fn default_posts_per_week() -> u32 {
    DEFAULT_POSTS_PER_WEEK
}

fn default_total_weeks() -> u32 {
    DEFAULT_CAMPAIGN_WEEKS
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

impl CampaignParams {
    pub fn validate(&self) -> CampaignResult<()> {
        if self.client_ref.trim().is_empty() {
            return Err(CampaignError::validation("client_ref is required"));
        }
        if self.business_type.trim().is_empty() {
            return Err(CampaignError::validation("business_type is required"));
        }
        if self.primary_goal.trim().is_empty() {
            return Err(CampaignError::validation("primary_goal is required"));
        }
        if !(1..=MAX_CAMPAIGN_WEEKS).contains(&self.total_weeks) {
            return Err(CampaignError::validation(format!(
                "total_weeks must be between 1 and {MAX_CAMPAIGN_WEEKS}, got {}",
                self.total_weeks
            )));
        }
        if self.posts_per_week == 0 {
            return Err(CampaignError::validation("posts_per_week must be at least 1"));
        }
        if self.platforms.iter().all(|p| p.trim().is_empty()) {
            return Err(CampaignError::validation("at least one platform is required"));
        }
        Ok(())
    }

    /// Display name, falling back to business type and goal.
    pub fn display_name(&self) -> String {
        if self.name.trim().is_empty() {
            format!("{} - {}", self.business_type, self.primary_goal)
        } else {
            self.name.clone()
        }
    }
}

// --- Campaign ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CampaignOverview {
    pub strategy_summary: String,
    pub success_metrics: Vec<String>,
    pub content_pillars: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub client_ref: String,
    pub name: String,
    pub total_weeks: u32,
    pub start_date: NaiveDate,
    pub status: CampaignStatus,
    pub params: CampaignParams,
    pub overview: Option<CampaignOverview>,
    pub strategy_source: Option<StrategySource>,
    /// Set when the stored strategy is a fallback rather than generated content.
    pub degraded: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    /// A fresh draft campaign with no strategy yet.
    pub fn draft(params: &CampaignParams, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            client_ref: params.client_ref.clone(),
            name: params.display_name(),
            total_weeks: params.total_weeks,
            start_date: params.start_date,
            status: CampaignStatus::Draft,
            params: params.clone(),
            overview: None,
            strategy_source: None,
            degraded: false,
            created_at: now,
            updated_at: now,
        }
    }
}

// --- Weeks and posts ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Dense 1-based ordering within the week.
    pub position: u32,
    pub platform: String,
    pub post_type: String,
    pub content: String,
    #[serde(default)]
    pub hashtags: String,
    #[serde(default)]
    pub call_to_action: String,
    #[serde(default)]
    pub content_pillar: String,
    #[serde(default)]
    pub visual_requirements: String,
    /// Preferred posting hour (0-23), when evolution has picked one.
    #[serde(default)]
    pub scheduled_hour: Option<u32>,
    #[serde(default)]
    pub status: PostStatus,
}

/// The replaceable part of a week: everything a regeneration may rewrite.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeekContent {
    pub theme: String,
    pub objectives: Vec<String>,
    pub key_messages: Vec<String>,
    pub posts: Vec<Post>,
}

impl WeekContent {
    /// Re-number posts densely 1..M in their current order.
    pub fn renumbered(mut self) -> Self {
        for (idx, post) in self.posts.iter_mut().enumerate() {
            post.position = idx as u32 + 1;
        }
        self
    }
}

/// One week of a strategy to be written as part of a full strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedWeek {
    pub week_number: u32,
    pub content: WeekContent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Week {
    pub campaign_id: Uuid,
    pub week_number: u32,
    pub theme: String,
    pub objectives: Vec<String>,
    pub key_messages: Vec<String>,
    pub status: WeekStatus,
    pub performance_score: Option<f64>,
    pub posts: Vec<Post>,
    /// Optimistic concurrency token, bumped on every write.
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl Week {
    pub fn content(&self) -> WeekContent {
        WeekContent {
            theme: self.theme.clone(),
            objectives: self.objectives.clone(),
            key_messages: self.key_messages.clone(),
            posts: self.posts.clone(),
        }
    }

    /// This week with `content` swapped in; status and score are kept.
    pub fn with_content(&self, content: WeekContent, now: DateTime<Utc>) -> Self {
        let content = content.renumbered();
        Self {
            theme: content.theme,
            objectives: content.objectives,
            key_messages: content.key_messages,
            posts: content.posts,
            version: self.version + 1,
            updated_at: now,
            ..self.clone()
        }
    }

    /// Whether automated changes may touch this week.
    pub fn is_editable(&self, preserve_scheduled: bool) -> bool {
        match self.status {
            WeekStatus::Published => false,
            WeekStatus::Scheduled => !preserve_scheduled,
            WeekStatus::Draft => true,
        }
    }
}

/// Check that week numbers are exactly 1..=total_weeks, no gaps or duplicates.
pub fn validate_week_sequence(
    numbers: impl IntoIterator<Item = u32>,
    total_weeks: u32,
) -> CampaignResult<()> {
    let mut seen = HashSet::new();
    let mut count = 0u32;
    for n in numbers {
        if n == 0 || n > total_weeks {
            return Err(CampaignError::validation(format!(
                "week_number {n} outside 1..={total_weeks}"
            )));
        }
        if !seen.insert(n) {
            return Err(CampaignError::validation(format!("duplicate week_number {n}")));
        }
        count += 1;
    }
    if count != total_weeks {
        let missing: Vec<u32> = (1..=total_weeks).filter(|n| !seen.contains(n)).collect();
        return Err(CampaignError::validation(format!(
            "expected {total_weeks} weeks, got {count} (missing {missing:?})"
        )));
    }
    Ok(())
}

// --- Regeneration history ---

/// Append-only audit record of one week regeneration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegenerationHistoryEntry {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub week_number: u32,
    pub previous_week: Week,
    pub new_week: Week,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// Range filter over the regeneration history of one campaign.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryQuery {
    pub week_number: Option<u32>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl HistoryQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_week(week_number: u32) -> Self {
        Self {
            week_number: Some(week_number),
            ..Self::default()
        }
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn matches(&self, entry: &RegenerationHistoryEntry) -> bool {
        self.week_number.map_or(true, |n| entry.week_number == n)
            && self.since.map_or(true, |t| entry.created_at >= t)
            && self.until.map_or(true, |t| entry.created_at < t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> CampaignParams {
        CampaignParams::builder()
            .client_ref("client-1")
            .business_type("bakery")
            .primary_goal("foot traffic")
            .platforms(vec!["instagram".to_string()])
            .build()
    }

    #[test]
    fn builder_applies_defaults() {
        let p = params();
        assert_eq!(p.total_weeks, DEFAULT_CAMPAIGN_WEEKS);
        assert_eq!(p.posts_per_week, DEFAULT_POSTS_PER_WEEK);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn total_weeks_over_limit_is_rejected() {
        let mut p = params();
        p.total_weeks = 25;
        assert!(matches!(p.validate(), Err(CampaignError::Validation(_))));
        p.total_weeks = 0;
        assert!(p.validate().is_err());
    }

    #[test]
    fn missing_platforms_is_rejected() {
        let mut p = params();
        p.platforms = vec!["  ".to_string()];
        assert!(p.validate().is_err());
    }

    #[test]
    fn params_deserialize_with_defaults() {
        let json = r#"{"client_ref":"c","business_type":"gym","primary_goal":"signups","platforms":["tiktok"]}"#;
        let p: CampaignParams = serde_json::from_str(json).unwrap();
        assert_eq!(p.total_weeks, 12);
        assert_eq!(p.posts_per_week, 3);
    }

    #[test]
    fn week_sequence_detects_gaps_and_duplicates() {
        assert!(validate_week_sequence([1, 2, 3], 3).is_ok());
        assert!(validate_week_sequence([3, 1, 2], 3).is_ok());
        assert!(validate_week_sequence([1, 2, 2], 3).is_err());
        assert!(validate_week_sequence([1, 3], 3).is_err());
        assert!(validate_week_sequence([1, 2, 3, 4], 3).is_err());
        assert!(validate_week_sequence([0, 1, 2], 3).is_err());
    }

    #[test]
    fn published_weeks_are_never_editable() {
        let now = Utc::now();
        let mut week = Week {
            campaign_id: Uuid::new_v4(),
            week_number: 1,
            theme: "t".into(),
            objectives: vec![],
            key_messages: vec![],
            status: WeekStatus::Published,
            performance_score: None,
            posts: vec![],
            version: 1,
            updated_at: now,
        };
        assert!(!week.is_editable(false));
        week.status = WeekStatus::Scheduled;
        assert!(week.is_editable(false));
        assert!(!week.is_editable(true));
        week.status = WeekStatus::Draft;
        assert!(week.is_editable(true));
    }

    #[test]
    fn with_content_renumbers_and_bumps_version() {
        let now = Utc::now();
        let week = Week {
            campaign_id: Uuid::new_v4(),
            week_number: 4,
            theme: "old".into(),
            objectives: vec![],
            key_messages: vec![],
            status: WeekStatus::Draft,
            performance_score: Some(2.5),
            posts: vec![],
            version: 3,
            updated_at: now,
        };
        let post = |pos| Post {
            position: pos,
            platform: "instagram".into(),
            post_type: "reel".into(),
            content: "hi".into(),
            hashtags: String::new(),
            call_to_action: String::new(),
            content_pillar: String::new(),
            visual_requirements: String::new(),
            scheduled_hour: None,
            status: PostStatus::Planned,
        };
        let content = WeekContent {
            theme: "new".into(),
            objectives: vec!["o".into()],
            key_messages: vec![],
            posts: vec![post(9), post(7)],
        };
        let updated = week.with_content(content, now);
        assert_eq!(updated.theme, "new");
        assert_eq!(updated.version, 4);
        assert_eq!(updated.performance_score, Some(2.5));
        let positions: Vec<u32> = updated.posts.iter().map(|p| p.position).collect();
        assert_eq!(positions, vec![1, 2]);
    }
}
