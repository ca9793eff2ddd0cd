// Parse chain for generator output.
//
// Full strategies: strict JSON, then bracket-scanned JSON candidates, then a
// heuristic read of "Week N: Theme" sections. When every step fails the
// caller substitutes `fallback_strategy`. Single weeks use the same steps but
// never fall back.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, warn};

use ai_client::{extract_fenced_block, strip_code_blocks};
use campaign_common::{
    validate_week_sequence, CampaignError, CampaignOverview, CampaignParams, CampaignResult,
    PlannedWeek, StrategySource, WeekContent,
};

use super::response::{PostResponse, StrategyResponse, WeekResponse};

/// A validated strategy and the parse step that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedStrategy {
    pub overview: CampaignOverview,
    pub weeks: Vec<PlannedWeek>,
    pub source: StrategySource,
}

static WEEK_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:#+\s*)?(?:\*\*)?\s*week\s+(\d+)\b\s*[:.\-]?\s*(.*?)(?:\*\*)?\s*$")
        .expect("valid week heading regex")
});

static SUBHEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:#+\s*)?(?:\*\*)?(theme|objectives?|goals?|key\s+messages?|messages?|posts?|content)(?:\*\*)?\s*(?::(?:\*\*)?\s*(.*))?$",
    )
    .expect("valid subheading regex")
});

static BULLET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[-*•]|\d+[.)])\s+(.+)$").expect("valid bullet regex")
});

static POST_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\*\*)?([A-Za-z][A-Za-z0-9 ]{0,30}?)(?:\*\*)?\s*(?:\(([^)]+)\))?\s*(?:\*\*)?\s*:\s*(.+)$")
        .expect("valid post line regex")
});

static INLINE_HASHTAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#\w+").expect("valid hashtag regex"));

// ---------------------------------------------------------------------------
// Full strategy
// ---------------------------------------------------------------------------

/// Run the parse chain. `None` means every step failed.
pub fn parse_strategy(raw: &str, total_weeks: u32) -> Option<ParsedStrategy> {
    match strict_object(raw) {
        Some(value) => match decode_strategy(&value, total_weeks) {
            Ok((overview, weeks)) => {
                info!(stage = "strict", weeks = weeks.len(), "Strategy response parsed");
                return Some(ParsedStrategy { overview, weeks, source: StrategySource::Strict });
            }
            Err(e) => warn!(stage = "strict", error = %e, "Strategy candidate rejected"),
        },
        None => debug!(stage = "strict", "Response is not a single JSON object"),
    }

    let candidates = json_candidates(raw);
    debug!(stage = "recovered", candidates = candidates.len(), "Scanning for JSON objects");
    for value in &candidates {
        match decode_strategy(value, total_weeks) {
            Ok((overview, weeks)) => {
                info!(stage = "recovered", weeks = weeks.len(), "Strategy response parsed");
                return Some(ParsedStrategy { overview, weeks, source: StrategySource::Recovered });
            }
            Err(e) => debug!(stage = "recovered", error = %e, "Strategy candidate rejected"),
        }
    }

    let (summary, weeks) = heuristic_weeks(raw, false);
    if weeks.is_empty() {
        warn!(stage = "heuristic", "No week sections found in response");
        return None;
    }
    match repair_weeks(weeks, total_weeks) {
        Ok(weeks) => {
            info!(stage = "heuristic", weeks = weeks.len(), "Strategy response parsed");
            Some(ParsedStrategy {
                overview: CampaignOverview {
                    strategy_summary: summary,
                    ..CampaignOverview::default()
                },
                weeks,
                source: StrategySource::Heuristic,
            })
        }
        Err(e) => {
            warn!(stage = "heuristic", error = %e, "Strategy candidate rejected");
            None
        }
    }
}

/// A minimal strategy with the right week count and no posts.
pub fn fallback_strategy(params: &CampaignParams) -> ParsedStrategy {
    let weeks = (1..=params.total_weeks)
        .map(|n| PlannedWeek {
            week_number: n,
            content: WeekContent {
                theme: format!("Week {n}"),
                objectives: vec![params.primary_goal.clone()],
                key_messages: Vec::new(),
                posts: Vec::new(),
            },
        })
        .collect();
    ParsedStrategy {
        overview: CampaignOverview {
            strategy_summary: format!(
                "{} campaign focused on {}.",
                params.business_type, params.primary_goal
            ),
            success_metrics: Vec::new(),
            content_pillars: Vec::new(),
        },
        weeks,
        source: StrategySource::Fallback,
    }
}

fn strategy_object(value: &Value) -> Option<&Value> {
    let object = value.as_object()?;
    if object.contains_key("weeks") {
        return Some(value);
    }
    object
        .values()
        .find(|v| v.as_object().is_some_and(|o| o.contains_key("weeks")))
}

fn decode_strategy(
    value: &Value,
    total_weeks: u32,
) -> CampaignResult<(CampaignOverview, Vec<PlannedWeek>)> {
    let object = strategy_object(value)
        .ok_or_else(|| CampaignError::validation("response has no weeks"))?;
    let response: StrategyResponse = serde_json::from_value(object.clone())
        .map_err(|e| CampaignError::validation(format!("response does not match schema: {e}")))?;
    let weeks = repair_weeks(response.weeks, total_weeks)?;
    Ok((response.campaign_overview.into_overview(), weeks))
}

/// Trim, number and sort weeks, then validate the sequence and every post.
pub(crate) fn repair_weeks(
    weeks: Vec<WeekResponse>,
    total_weeks: u32,
) -> CampaignResult<Vec<PlannedWeek>> {
    if weeks.is_empty() {
        return Err(CampaignError::validation("response contains no weeks"));
    }
    let mut weeks: Vec<WeekResponse> = weeks.into_iter().map(WeekResponse::repaired).collect();
    if weeks.iter().all(|w| w.week_number.is_none()) {
        for (idx, week) in weeks.iter_mut().enumerate() {
            week.week_number = Some(idx as u32 + 1);
        }
    }

    let mut numbered = Vec::with_capacity(weeks.len());
    for (idx, week) in weeks.into_iter().enumerate() {
        let number = week.week_number.ok_or_else(|| {
            CampaignError::validation(format!("week at index {idx} has no week_number"))
        })?;
        numbered.push((number, week));
    }
    numbered.sort_by_key(|(number, _)| *number);
    validate_week_sequence(numbered.iter().map(|(number, _)| *number), total_weeks)?;

    numbered
        .into_iter()
        .map(|(number, week)| {
            validate_posts(&week.posts, &format!("week {number}"))?;
            let mut content = week.into_content();
            if content.theme.is_empty() {
                content.theme = format!("Week {number}");
            }
            Ok(PlannedWeek { week_number: number, content })
        })
        .collect()
}

fn validate_posts(posts: &[PostResponse], label: &str) -> CampaignResult<()> {
    for (idx, post) in posts.iter().enumerate() {
        let missing = [
            ("platform", &post.platform),
            ("post_type", &post.post_type),
            ("content", &post.content),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty());
        if let Some((field, _)) = missing {
            return Err(CampaignError::validation(format!(
                "{label} post {} has an empty {field}",
                idx + 1
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Single week
// ---------------------------------------------------------------------------

/// Parse one regenerated week.
///
/// Fails with `GenerationFailure` when no week can be found at all and with
/// `Validation` when one is found but is unusable.
pub fn parse_week(raw: &str) -> CampaignResult<WeekContent> {
    let mut last_error = None;

    let candidates = strict_object(raw)
        .map(|v| ("strict", v))
        .into_iter()
        .chain(json_candidates(raw).into_iter().map(|v| ("recovered", v)));
    for (stage, value) in candidates {
        let Some(week) = week_object(&value) else {
            continue;
        };
        match serde_json::from_value::<WeekResponse>(week.clone())
            .map_err(|e| CampaignError::validation(format!("week does not match schema: {e}")))
            .and_then(validated_week)
        {
            Ok(content) => {
                info!(stage, posts = content.posts.len(), "Week response parsed");
                return Ok(content);
            }
            Err(e) => {
                warn!(stage, error = %e, "Week candidate rejected");
                last_error = Some(e);
            }
        }
    }

    let (_, weeks) = heuristic_weeks(raw, true);
    if let Some(week) = weeks.into_iter().next() {
        match validated_week(week) {
            Ok(content) => {
                info!(stage = "heuristic", posts = content.posts.len(), "Week response parsed");
                return Ok(content);
            }
            Err(e) => {
                warn!(stage = "heuristic", error = %e, "Week candidate rejected");
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        CampaignError::GenerationFailure("no week content found in response".to_string())
    }))
}

fn week_object(value: &Value) -> Option<&Value> {
    let object = value.as_object()?;
    if let Some(week) = object.get("week").filter(|w| w.is_object()) {
        return Some(week);
    }
    if let Some(first) = object.get("weeks").and_then(Value::as_array).and_then(|w| w.first()) {
        return Some(first);
    }
    (object.contains_key("theme") || object.contains_key("posts")).then_some(value)
}

fn validated_week(week: WeekResponse) -> CampaignResult<WeekContent> {
    let week = week.repaired();
    if week.theme.is_empty() {
        return Err(CampaignError::validation("regenerated week has no theme"));
    }
    validate_posts(&week.posts, "regenerated week")?;
    Ok(week.into_content())
}

// ---------------------------------------------------------------------------
// JSON extraction
// ---------------------------------------------------------------------------

/// The response as one JSON object, after stripping a wrapping or embedded
/// code fence.
fn strict_object(raw: &str) -> Option<Value> {
    let parse = |text: &str| {
        serde_json::from_str::<Value>(text)
            .ok()
            .filter(Value::is_object)
    };
    parse(strip_code_blocks(raw)).or_else(|| extract_fenced_block(raw).and_then(parse))
}

/// Every balanced top-level `{...}` span that parses as a JSON object, in
/// order of appearance. Braces inside string literals are ignored.
fn json_candidates(raw: &str) -> Vec<Value> {
    let mut candidates = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in raw.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(idx);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(begin) = start.take() {
                        if let Ok(value) = serde_json::from_str::<Value>(&raw[begin..=idx]) {
                            candidates.push(value);
                        }
                    }
                }
            }
            _ => {}
        }
    }
    candidates
}

// ---------------------------------------------------------------------------
// Heuristic sections
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq)]
enum Section {
    None,
    Objectives,
    Messages,
    Posts,
}

fn clean(text: &str) -> String {
    text.trim().trim_matches('*').trim().to_string()
}

fn split_inline(text: &str) -> Vec<String> {
    text.split([',', ';'])
        .map(clean)
        .filter(|s| !s.is_empty())
        .collect()
}

fn post_from_line(line: &str) -> Option<PostResponse> {
    let caps = POST_LINE.captures(line)?;
    let content = clean(&caps[3]);
    let hashtags = INLINE_HASHTAG
        .find_iter(&content)
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    Some(PostResponse {
        platform: clean(&caps[1]),
        post_type: caps
            .get(2)
            .map(|m| clean(m.as_str()))
            .unwrap_or_else(|| "post".to_string()),
        content,
        hashtags,
        ..PostResponse::default()
    })
}

/// Read `Week N: Theme` sections with objective, message and post bullets.
///
/// Returns the text before the first heading as a summary. With
/// `implicit_week` the text before any heading is read as a week instead.
fn heuristic_weeks(raw: &str, implicit_week: bool) -> (String, Vec<WeekResponse>) {
    let mut summary = Vec::new();
    let mut weeks = Vec::new();
    let mut current: Option<WeekResponse> = implicit_week.then(WeekResponse::default);
    let mut section = Section::None;

    let has_content = |w: &WeekResponse| {
        !w.theme.is_empty() || !w.posts.is_empty() || !w.objectives.is_empty()
    };

    for line in raw.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(caps) = WEEK_HEADING.captures(line) {
            if let Some(week) = current.take().filter(|w| has_content(w)) {
                weeks.push(week);
            }
            current = Some(WeekResponse {
                week_number: caps[1].parse().ok(),
                theme: clean(&caps[2]),
                ..WeekResponse::default()
            });
            section = Section::None;
            continue;
        }

        let Some(week) = current.as_mut() else {
            if !line.starts_with('{') {
                summary.push(line.trim_start_matches('#').trim().to_string());
            }
            continue;
        };

        if let Some(caps) = SUBHEADING.captures(line) {
            let name = caps[1].to_lowercase();
            let inline = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();
            section = if name == "theme" {
                if !inline.is_empty() {
                    week.theme = clean(inline);
                }
                Section::None
            } else if name.starts_with("objective") || name.starts_with("goal") {
                week.objectives.extend(split_inline(inline));
                Section::Objectives
            } else if name.contains("message") {
                week.key_messages.extend(split_inline(inline));
                Section::Messages
            } else {
                Section::Posts
            };
            continue;
        }

        let Some(caps) = BULLET.captures(line) else {
            continue;
        };
        let item = clean(&caps[1]);
        match section {
            Section::Objectives => week.objectives.push(item),
            Section::Messages => week.key_messages.push(item),
            Section::Posts => match post_from_line(&item) {
                Some(post) => week.posts.push(post),
                None => debug!(line = item.as_str(), "Unrecognized post line"),
            },
            Section::None => {}
        }
    }

    if let Some(week) = current.filter(|w| has_content(w)) {
        weeks.push(week);
    }
    (summary.join(" "), weeks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn strategy(weeks: u32) -> Value {
        let weeks: Vec<Value> = (1..=weeks)
            .map(|n| {
                json!({
                    "week_number": n,
                    "theme": format!("Theme {n}"),
                    "objectives": ["Grow"],
                    "key_messages": ["Fresh"],
                    "posts": [{"platform": "instagram", "post_type": "reel", "content": format!("Post {n}")}]
                })
            })
            .collect();
        json!({"campaign_overview": {"strategy_summary": "Plan", "success_metrics": [], "content_pillars": []},
               "weeks": weeks})
    }

    #[test]
    fn strict_json_parses() {
        let parsed = parse_strategy(&strategy(3).to_string(), 3).unwrap();
        assert_eq!(parsed.source, StrategySource::Strict);
        assert_eq!(parsed.weeks.len(), 3);
        assert_eq!(parsed.overview.strategy_summary, "Plan");
    }

    #[test]
    fn fenced_json_counts_as_strict() {
        let raw = format!("Here you go:\n```json\n{}\n```\nGood luck!", strategy(2));
        assert_eq!(parse_strategy(&raw, 2).unwrap().source, StrategySource::Strict);
    }

    #[test]
    fn prose_wrapped_json_is_recovered() {
        let raw = format!("Sure! {{not json}} Here it is: {} Let me know.", strategy(2));
        let parsed = parse_strategy(&raw, 2).unwrap();
        assert_eq!(parsed.source, StrategySource::Recovered);
        assert_eq!(parsed.weeks[1].content.theme, "Theme 2");
    }

    #[test]
    fn braces_inside_strings_do_not_split_candidates() {
        let mut value = strategy(1);
        value["weeks"][0]["theme"] = json!("Use {curly} braces }");
        let raw = format!("prefix {value} suffix");
        let parsed = parse_strategy(&raw, 1).unwrap();
        assert_eq!(parsed.weeks[0].content.theme, "Use {curly} braces }");
    }

    #[test]
    fn nested_strategy_object_is_unwrapped() {
        let raw = json!({"strategy": strategy(2)}).to_string();
        assert_eq!(parse_strategy(&raw, 2).unwrap().weeks.len(), 2);
    }

    #[test]
    fn unnumbered_weeks_are_numbered_in_order() {
        let mut value = strategy(3);
        for week in value["weeks"].as_array_mut().unwrap() {
            week.as_object_mut().unwrap().remove("week_number");
        }
        let parsed = parse_strategy(&value.to_string(), 3).unwrap();
        let numbers: Vec<u32> = parsed.weeks.iter().map(|w| w.week_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn shuffled_weeks_are_sorted() {
        let mut value = strategy(3);
        value["weeks"].as_array_mut().unwrap().reverse();
        let parsed = parse_strategy(&value.to_string(), 3).unwrap();
        assert_eq!(parsed.weeks[0].content.theme, "Theme 1");
        assert_eq!(parsed.weeks[2].content.theme, "Theme 3");
    }

    #[test]
    fn gap_in_numbering_falls_through_to_none() {
        let mut value = strategy(3);
        value["weeks"][2]["week_number"] = json!(5);
        assert!(parse_strategy(&value.to_string(), 3).is_none());
    }

    #[test]
    fn post_without_content_is_rejected() {
        let mut value = strategy(2);
        value["weeks"][0]["posts"][0]["content"] = json!("   ");
        assert!(parse_strategy(&value.to_string(), 2).is_none());
    }

    #[test]
    fn missing_weeks_key_yields_none() {
        let raw = json!({"campaign_overview": {"strategy_summary": "Plan"}}).to_string();
        assert!(parse_strategy(&raw, 4).is_none());
    }

    #[test]
    fn heuristic_sections_parse() {
        let raw = "A spring push for the bakery.\n\n\
                   ## Week 1: Grand Opening\n\
                   Objectives:\n- Build awareness\n- Collect emails\n\
                   Key messages: fresh bread, local flour\n\
                   Posts:\n- Instagram (reel): Ovens at dawn #bakery\n- Facebook: Opening day hours\n\n\
                   **Week 2 - Loyalty**\n\
                   Posts:\n1. Instagram (carousel): Meet the bakers\n";
        let parsed = parse_strategy(raw, 2).unwrap();

        assert_eq!(parsed.source, StrategySource::Heuristic);
        assert_eq!(parsed.overview.strategy_summary, "A spring push for the bakery.");
        let week1 = &parsed.weeks[0].content;
        assert_eq!(week1.theme, "Grand Opening");
        assert_eq!(week1.objectives, vec!["Build awareness", "Collect emails"]);
        assert_eq!(week1.key_messages, vec!["fresh bread", "local flour"]);
        assert_eq!(week1.posts.len(), 2);
        assert_eq!(week1.posts[0].platform, "instagram");
        assert_eq!(week1.posts[0].post_type, "reel");
        assert_eq!(week1.posts[0].hashtags, "#bakery");
        assert_eq!(week1.posts[1].post_type, "post");
        assert_eq!(week1.posts[1].position, 2);
        assert_eq!(parsed.weeks[1].content.theme, "Loyalty");
    }

    #[test]
    fn fallback_has_requested_week_count_and_no_posts() {
        let params = CampaignParams::builder()
            .client_ref("c")
            .business_type("gym")
            .primary_goal("signups")
            .platforms(vec!["tiktok".to_string()])
            .total_weeks(6)
            .build();
        let fallback = fallback_strategy(&params);
        assert_eq!(fallback.source, StrategySource::Fallback);
        assert_eq!(fallback.weeks.len(), 6);
        assert!(fallback.weeks.iter().all(|w| w.content.posts.is_empty()));
        assert_eq!(fallback.weeks[5].content.theme, "Week 6");
    }

    #[test]
    fn week_parses_bare_and_wrapped() {
        let bare = json!({"theme": "Refresh", "posts": [{"platform": "x", "post_type": "post", "content": "hi"}]});
        assert_eq!(parse_week(&bare.to_string()).unwrap().theme, "Refresh");

        let wrapped = format!("Here: {}", json!({"week": bare}));
        assert_eq!(parse_week(&wrapped).unwrap().posts.len(), 1);
    }

    #[test]
    fn week_without_json_or_sections_is_generation_failure() {
        let err = parse_week("I can't help with that.").unwrap_err();
        assert!(matches!(err, CampaignError::GenerationFailure(_)));
    }

    #[test]
    fn week_with_invalid_post_is_validation_error() {
        let raw = json!({"theme": "T", "posts": [{"platform": "instagram", "content": "hi"}]});
        let err = parse_week(&raw.to_string()).unwrap_err();
        assert!(matches!(err, CampaignError::Validation(_)));
    }

    #[test]
    fn week_heuristic_without_heading() {
        let raw = "Theme: Summer Kickoff\nPosts:\n- Instagram (story): Poll: iced or hot?";
        let week = parse_week(raw).unwrap();
        assert_eq!(week.theme, "Summer Kickoff");
        assert_eq!(week.posts[0].content, "Poll: iced or hot?");
    }
}
