use ai_client::{truncate_to_char_boundary, GenerationPrompt};
use campaign_analytics::InsightSnapshot;
use campaign_common::{Campaign, CampaignParams, GenerationSettings, Week};
use schemars::schema_for;

use super::response::{StrategyResponse, WeekResponse};
use crate::regenerator::RegenerationOptions;

const STRATEGY_SYSTEM_PROMPT: &str = "You are a social media strategist planning multi-week content \
campaigns for small businesses. Respond only with one JSON object matching the schema you are given. \
Do not add commentary before or after the JSON.";

const WEEK_SYSTEM_PROMPT: &str = "You are a social media strategist rewriting one week of an existing \
content campaign. Respond only with one JSON object for that single week, matching the schema you \
are given.";

const MAX_EXCERPT_POSTS: usize = 3;
const MAX_EXCERPT_CHARS: usize = 160;

/// Campaign context for rewriting one week.
pub struct WeekContext<'a> {
    pub campaign: &'a Campaign,
    pub current: &'a Week,
    pub previous: Option<&'a Week>,
    pub next: Option<&'a Week>,
    pub options: &'a RegenerationOptions,
    pub insights: Option<&'a InsightSnapshot>,
}

fn schema_text<T: schemars::JsonSchema>() -> String {
    serde_json::to_string_pretty(&schema_for!(T)).unwrap_or_default()
}

fn describe_params(params: &CampaignParams) -> String {
    let key_dates = if params.key_dates.is_empty() {
        "none".to_string()
    } else {
        params
            .key_dates
            .iter()
            .map(|d| format!("{} ({})", d.date, d.label))
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "Business type: {business}\n\
         Primary goal: {goal}\n\
         Target audience: {audience}\n\
         Primary offer: {offer}\n\
         Brand voice: {voice}\n\
         Platforms: {platforms}\n\
         Posts per week: {posts}\n\
         Campaign length: {weeks} weeks starting {start}\n\
         Key dates: {key_dates}",
        business = params.business_type,
        goal = params.primary_goal,
        audience = or_unspecified(&params.target_audience),
        offer = or_unspecified(&params.primary_offer),
        voice = or_unspecified(&params.brand_voice),
        platforms = params.platforms.join(", "),
        posts = params.posts_per_week,
        weeks = params.total_weeks,
        start = params.start_date,
    )
}

fn or_unspecified(s: &str) -> &str {
    if s.trim().is_empty() {
        "unspecified"
    } else {
        s
    }
}

/// A short plain-text digest of what has worked so far.
pub fn insight_excerpt(snapshot: &InsightSnapshot) -> String {
    if snapshot.is_empty() {
        return String::new();
    }
    let metrics = snapshot.metrics();
    let mut lines = vec![format!(
        "Past performance: {} posts, average engagement rate {:.2}%.",
        metrics.post_count, metrics.average_engagement_rate
    )];

    if let Some((post_type, stats)) = snapshot.best_content_type() {
        lines.push(format!(
            "Best content type: {post_type} ({:.2}% average).",
            stats.average_engagement_rate
        ));
    }
    if let Some((platform, stats)) = snapshot.best_platform() {
        lines.push(format!(
            "Best platform: {platform} ({:.2}% average).",
            stats.average_engagement_rate
        ));
    }
    if !snapshot.optimal_times().is_empty() {
        let hours: Vec<String> = snapshot
            .optimal_times()
            .iter()
            .map(|b| format!("{:02}:00", b.hour))
            .collect();
        lines.push(format!("Best posting hours (UTC): {}.", hours.join(", ")));
    }
    if !snapshot.top_hashtags().is_empty() {
        let tags: Vec<&str> = snapshot.top_hashtags().iter().map(|t| t.tag.as_str()).collect();
        lines.push(format!("Top hashtags: {}.", tags.join(" ")));
    }
    for classified in snapshot.high_performers().iter().take(MAX_EXCERPT_POSTS) {
        let content = truncate_to_char_boundary(&classified.post.content, MAX_EXCERPT_CHARS);
        lines.push(format!(
            "- High performer on {} ({}, {:.2}%): {}",
            classified.post.platform, classified.post.post_type, classified.engagement_rate, content
        ));
    }
    lines.join("\n")
}

pub fn strategy_prompt(
    params: &CampaignParams,
    insights: Option<&InsightSnapshot>,
    settings: &GenerationSettings,
) -> GenerationPrompt {
    let insight_section = insights
        .map(insight_excerpt)
        .filter(|s| !s.is_empty())
        .map(|s| format!("\n\nWhat we know from previous analytics:\n{s}"))
        .unwrap_or_default();

    let user = format!(
        r#"Plan a {weeks}-week social media campaign.

{params}{insight_section}

Requirements:
1. campaign_overview: a strategy summary, measurable success metrics, and 3-5 content pillars.
2. weeks: exactly {weeks} entries, week_number 1 through {weeks}, each with a distinct theme.
3. Each week has {posts} posts spread across the listed platforms.
4. Every post needs a platform, a post_type, and the full post content.

Respond with JSON matching this schema:
{schema}"#,
        weeks = params.total_weeks,
        params = describe_params(params),
        posts = params.posts_per_week,
        schema = schema_text::<StrategyResponse>(),
    );

    GenerationPrompt::new(STRATEGY_SYSTEM_PROMPT, user).max_tokens(settings.max_tokens)
}

fn describe_neighbor(label: &str, week: Option<&Week>) -> String {
    match week {
        Some(w) => format!(
            "{label} (week {}): theme \"{}\"; objectives: {}",
            w.week_number,
            w.theme,
            w.objectives.join("; ")
        ),
        None => format!("{label}: none"),
    }
}

pub fn week_prompt(ctx: &WeekContext<'_>, settings: &GenerationSettings) -> GenerationPrompt {
    let current = ctx.current;
    let params = &ctx.campaign.params;

    let mut guidance = Vec::new();
    if !ctx.options.reason.trim().is_empty() {
        guidance.push(format!("Reason for the rewrite: {}", ctx.options.reason.trim()));
    }
    if let Some(feedback) = ctx.options.feedback.as_deref().filter(|f| !f.trim().is_empty()) {
        guidance.push(format!("Client feedback: {}", feedback.trim()));
    }
    for (key, value) in &ctx.options.preferences {
        guidance.push(format!("Preference {key}: {value}"));
    }
    if let Some(excerpt) = ctx.insights.map(insight_excerpt).filter(|s| !s.is_empty()) {
        guidance.push(excerpt);
    }

    let current_posts: Vec<String> = current
        .posts
        .iter()
        .map(|p| format!("- {} ({}): {}", p.platform, p.post_type, p.content))
        .collect();

    let user = format!(
        r#"Rewrite week {number} of the campaign "{name}".

Campaign goal: {goal}
Brand voice: {voice}
Platforms: {platforms}
Posts per week: {posts}

Current week {number}: theme "{theme}"
Current posts:
{current_posts}

{previous}
{next}

The new theme must differ from both neighboring themes. Replace every post; include at least one.
{guidance}

Respond with JSON for this single week matching this schema:
{schema}"#,
        number = current.week_number,
        name = ctx.campaign.name,
        goal = params.primary_goal,
        voice = or_unspecified(&params.brand_voice),
        platforms = params.platforms.join(", "),
        posts = params.posts_per_week,
        theme = current.theme,
        current_posts = current_posts.join("\n"),
        previous = describe_neighbor("Previous week", ctx.previous),
        next = describe_neighbor("Next week", ctx.next),
        guidance = guidance.join("\n"),
        schema = schema_text::<WeekResponse>(),
    );

    GenerationPrompt::new(WEEK_SYSTEM_PROMPT, user).max_tokens(settings.max_tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use campaign_analytics::{CanonicalPost, InsightExtractor};

    fn params() -> CampaignParams {
        CampaignParams::builder()
            .client_ref("c-1")
            .business_type("coffee shop")
            .primary_goal("weekday foot traffic")
            .platforms(vec!["instagram".to_string(), "facebook".to_string()])
            .total_weeks(4)
            .build()
    }

    #[test]
    fn strategy_prompt_embeds_params_and_schema() {
        let prompt = strategy_prompt(&params(), None, &GenerationSettings::default());
        assert!(prompt.user.contains("Plan a 4-week"));
        assert!(prompt.user.contains("coffee shop"));
        assert!(prompt.user.contains("instagram, facebook"));
        assert!(prompt.user.contains("\"campaign_overview\""));
        assert!(!prompt.user.contains("previous analytics"));
    }

    #[test]
    fn strategy_prompt_includes_insight_excerpt() {
        let post = CanonicalPost {
            platform: "instagram".into(),
            post_type: "reel".into(),
            content: "Latte art".into(),
            likes: 50,
            impressions: 1000,
            ..CanonicalPost::default()
        };
        let snapshot = InsightExtractor::default().extract(None, &[post]);
        let prompt = strategy_prompt(&params(), Some(&snapshot), &GenerationSettings::default());
        assert!(prompt.user.contains("previous analytics"));
        assert!(prompt.user.contains("Best content type: reel"));
        assert!(prompt.user.contains("Latte art"));
    }
}
