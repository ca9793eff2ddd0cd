use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use campaign_common::{CampaignOverview, Post, PostStatus, WeekContent};

/// The full strategy the generator is asked to return.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct StrategyResponse {
    #[serde(default)]
    pub campaign_overview: OverviewResponse,
    /// One entry per campaign week, numbered from 1
    pub weeks: Vec<WeekResponse>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct OverviewResponse {
    /// One or two paragraphs describing the overall approach
    #[serde(default, deserialize_with = "lenient_string")]
    #[schemars(with = "String")]
    pub strategy_summary: String,
    #[serde(default, deserialize_with = "string_list")]
    #[schemars(with = "Vec<String>")]
    pub success_metrics: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    #[schemars(with = "Vec<String>")]
    pub content_pillars: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct WeekResponse {
    #[serde(default, deserialize_with = "lenient_u32")]
    #[schemars(with = "Option<u32>")]
    pub week_number: Option<u32>,
    #[serde(default, deserialize_with = "lenient_string")]
    #[schemars(with = "String")]
    pub theme: String,
    #[serde(default, deserialize_with = "string_list")]
    #[schemars(with = "Vec<String>")]
    pub objectives: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    #[schemars(with = "Vec<String>")]
    pub key_messages: Vec<String>,
    #[serde(default)]
    pub posts: Vec<PostResponse>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct PostResponse {
    /// Platform name, e.g. "instagram"
    #[serde(default, deserialize_with = "lenient_string")]
    #[schemars(with = "String")]
    pub platform: String,
    /// Format, e.g. "reel", "carousel", "story", "thread"
    #[serde(default, alias = "type", deserialize_with = "lenient_string")]
    #[schemars(with = "String")]
    pub post_type: String,
    /// The post copy
    #[serde(default, alias = "caption", deserialize_with = "lenient_string")]
    #[schemars(with = "String")]
    pub content: String,
    /// Space-separated hashtags
    #[serde(default, deserialize_with = "hashtag_string")]
    #[schemars(with = "String")]
    pub hashtags: String,
    #[serde(default, alias = "cta", deserialize_with = "lenient_string")]
    #[schemars(with = "String")]
    pub call_to_action: String,
    #[serde(default, deserialize_with = "lenient_string")]
    #[schemars(with = "String")]
    pub content_pillar: String,
    #[serde(default, deserialize_with = "lenient_string")]
    #[schemars(with = "String")]
    pub visual_requirements: String,
}

impl OverviewResponse {
    pub fn into_overview(self) -> CampaignOverview {
        CampaignOverview {
            strategy_summary: self.strategy_summary.trim().to_string(),
            success_metrics: trimmed(self.success_metrics),
            content_pillars: trimmed(self.content_pillars),
        }
    }
}

impl WeekResponse {
    /// Trim every field and drop empty list entries.
    pub fn repaired(self) -> Self {
        Self {
            week_number: self.week_number,
            theme: self.theme.trim().to_string(),
            objectives: trimmed(self.objectives),
            key_messages: trimmed(self.key_messages),
            posts: self.posts.into_iter().map(PostResponse::repaired).collect(),
        }
    }

    pub fn into_content(self) -> WeekContent {
        WeekContent {
            theme: self.theme,
            objectives: self.objectives,
            key_messages: self.key_messages,
            posts: self.posts.into_iter().map(PostResponse::into_post).collect(),
        }
        .renumbered()
    }
}

impl PostResponse {
    pub fn repaired(self) -> Self {
        Self {
            platform: self.platform.trim().to_lowercase(),
            post_type: self.post_type.trim().to_lowercase(),
            content: self.content.trim().to_string(),
            hashtags: self.hashtags.trim().to_string(),
            call_to_action: self.call_to_action.trim().to_string(),
            content_pillar: self.content_pillar.trim().to_string(),
            visual_requirements: self.visual_requirements.trim().to_string(),
        }
    }

    fn into_post(self) -> Post {
        Post {
            position: 0,
            platform: self.platform,
            post_type: self.post_type,
            content: self.content,
            hashtags: self.hashtags,
            call_to_action: self.call_to_action,
            content_pillar: self.content_pillar,
            visual_requirements: self.visual_requirements,
            scheduled_hour: None,
            status: PostStatus::Planned,
        }
    }
}

fn trimmed(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// ---------------------------------------------------------------------------
// Lenient field decoding
// ---------------------------------------------------------------------------

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(match value {
        Value::Array(items) => items
            .iter()
            .filter_map(scalar_to_string)
            .collect::<Vec<_>>()
            .join(" "),
        other => scalar_to_string(&other).unwrap_or_default(),
    })
}

/// Accepts a list, a single string (split on newlines, or commas when it has
/// no newlines), or null.
fn string_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(match value {
        Value::Array(items) => items.iter().filter_map(scalar_to_string).collect(),
        Value::String(s) => {
            let sep = if s.contains('\n') { '\n' } else { ',' };
            s.split(sep)
                .map(|part| part.trim().trim_start_matches(['-', '*', '•']).trim().to_string())
                .filter(|part| !part.is_empty())
                .collect()
        }
        other => scalar_to_string(&other).into_iter().collect(),
    })
}

/// Lists of tags are joined with spaces; a bare string is kept as is.
fn hashtag_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(match value {
        Value::Array(items) => items
            .iter()
            .filter_map(scalar_to_string)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        other => scalar_to_string(&other).unwrap_or_default(),
    })
}

/// `3`, `"3"`, `"Week 3"` and `3.0` all read as 3.
fn lenient_u32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect::<String>()
            .parse()
            .ok(),
        _ => None,
    })
}
