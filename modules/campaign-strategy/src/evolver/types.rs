use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use campaign_common::WeekContent;

// --- Options ---

/// Which part of a strategy a recommendation concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusArea {
    ContentTypes,
    Timing,
    Platforms,
    Engagement,
    Hashtags,
}

impl FocusArea {
    pub fn as_str(&self) -> &'static str {
        match self {
            FocusArea::ContentTypes => "content_types",
            FocusArea::Timing => "timing",
            FocusArea::Platforms => "platforms",
            FocusArea::Engagement => "engagement",
            FocusArea::Hashtags => "hashtags",
        }
    }

    /// Accepts snake_case, kebab-case or spaced names.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "content_types" | "content_type" | "content" => Some(FocusArea::ContentTypes),
            "timing" | "time" | "posting_time" => Some(FocusArea::Timing),
            "platforms" | "platform" => Some(FocusArea::Platforms),
            "engagement" | "cta" | "ctas" => Some(FocusArea::Engagement),
            "hashtags" | "hashtag" | "tags" => Some(FocusArea::Hashtags),
            _ => None,
        }
    }

    /// Parse every name, dropping the ones that name no area.
    pub fn parse_all<S: AsRef<str>>(names: impl IntoIterator<Item = S>) -> Vec<Self> {
        let mut areas = Vec::new();
        for name in names {
            let name = name.as_ref();
            match Self::parse(name) {
                Some(area) if !areas.contains(&area) => areas.push(area),
                Some(_) => {}
                None => warn!(focus_area = name, "Ignoring unknown focus area"),
            }
        }
        areas
    }
}

impl fmt::Display for FocusArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionOptions {
    /// Apply recommendations to eligible weeks.
    #[serde(default)]
    pub auto_apply: bool,
    /// Keep only recommendations in these areas. Empty keeps all. Unknown
    /// names are dropped on input.
    #[serde(default, deserialize_with = "lenient_focus_areas")]
    pub focus_areas: Vec<FocusArea>,
    /// Treat scheduled weeks like published ones.
    #[serde(default = "default_preserve_scheduled")]
    pub preserve_scheduled: bool,
}

fn default_preserve_scheduled() -> bool {
    true
}

fn lenient_focus_areas<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<FocusArea>, D::Error> {
    let names = match Option::<Value>::deserialize(d)? {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                other => {
                    warn!(focus_area = %other, "Ignoring non-string focus area");
                    None
                }
            })
            .collect(),
        Some(Value::String(s)) => s.split(',').map(str::to_string).collect(),
        _ => Vec::new(),
    };
    Ok(FocusArea::parse_all(names))
}

impl Default for EvolutionOptions {
    fn default() -> Self {
        Self {
            auto_apply: false,
            focus_areas: Vec::new(),
            preserve_scheduled: default_preserve_scheduled(),
        }
    }
}

impl EvolutionOptions {
    pub fn applying() -> Self {
        Self {
            auto_apply: true,
            ..Self::default()
        }
    }

    pub fn focus(mut self, areas: impl IntoIterator<Item = FocusArea>) -> Self {
        self.focus_areas = areas.into_iter().collect();
        self
    }

    pub fn preserve_scheduled(mut self, preserve: bool) -> Self {
        self.preserve_scheduled = preserve;
        self
    }

    pub fn includes(&self, area: FocusArea) -> bool {
        self.focus_areas.is_empty() || self.focus_areas.contains(&area)
    }
}

// --- Recommendations ---

/// Declaration order is sort order: high first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecommendationKind {
    ContentTypeShift { post_type: String },
    PostingTimeShift { hour: u32 },
    PlatformReallocation { platform: String },
    InteractiveCtas,
    HashtagFocus { tags: Vec<String> },
}

impl RecommendationKind {
    pub fn focus_area(&self) -> FocusArea {
        match self {
            RecommendationKind::ContentTypeShift { .. } => FocusArea::ContentTypes,
            RecommendationKind::PostingTimeShift { .. } => FocusArea::Timing,
            RecommendationKind::PlatformReallocation { .. } => FocusArea::Platforms,
            RecommendationKind::InteractiveCtas => FocusArea::Engagement,
            RecommendationKind::HashtagFocus { .. } => FocusArea::Hashtags,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: Uuid,
    pub kind: RecommendationKind,
    pub priority: Priority,
    pub focus_area: FocusArea,
    pub description: String,
    pub target_weeks: Vec<u32>,
}

impl Recommendation {
    pub fn new(
        kind: RecommendationKind,
        priority: Priority,
        description: impl Into<String>,
        target_weeks: Vec<u32>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            focus_area: kind.focus_area(),
            kind,
            priority,
            description: description.into(),
            target_weeks,
        }
    }

    pub fn targets(&self, week_number: u32) -> bool {
        self.target_weeks.contains(&week_number)
    }
}

// --- Comparison ---

/// One metric measured in two snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDelta {
    pub metric: String,
    /// `None` when there is no earlier snapshot to compare against.
    pub previous: Option<f64>,
    pub current: f64,
    pub change: Option<f64>,
    /// `None` without a baseline or when the baseline value is zero.
    pub percent_change: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceComparison {
    pub baseline_snapshot_id: Option<Uuid>,
    pub metrics: Vec<MetricDelta>,
    /// Average engagement rate per platform.
    pub platforms: BTreeMap<String, MetricDelta>,
    /// Average engagement rate per content type.
    pub content_types: BTreeMap<String, MetricDelta>,
}

// --- Applied changes and records ---

/// One recommendation applied to one week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekChange {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub week_number: u32,
    pub recommendation_id: Uuid,
    pub description: String,
    pub previous: WeekContent,
    pub updated: WeekContent,
    pub applied_at: DateTime<Utc>,
}

/// Immutable result of one evolution run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionRecord {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub snapshot_id: Uuid,
    pub baseline_snapshot_id: Option<Uuid>,
    pub comparison: PerformanceComparison,
    pub recommendations: Vec<Recommendation>,
    pub applied_changes: Vec<WeekChange>,
    pub options: EvolutionOptions,
    pub created_at: DateTime<Utc>,
}
