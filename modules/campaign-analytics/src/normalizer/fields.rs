// Field resolution for raw records.
//
// Each canonical field has an ordered fallback chain of source keys. Keys are
// normalized to snake_case before lookup, and nested metric containers are
// flattened into the record first, so chains only name flat keys.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::platforms::RawRecord;

pub(crate) const IMPRESSIONS: &[&str] = &[
    "impressions",
    "impression_count",
    "total_impressions",
    "post_impressions",
    "reach",
    "views",
    "view_count",
    "video_views",
    "plays",
];
pub(crate) const REACH: &[&str] = &[
    "reach",
    "reach_count",
    "unique_impressions",
    "post_impressions_unique",
    "accounts_reached",
];
pub(crate) const LIKES: &[&str] = &[
    "likes",
    "like_count",
    "likes_count",
    "reactions",
    "reaction_count",
    "total_reactions",
    "favorites",
    "favorite_count",
    "favourites",
    "favourite_count",
];
pub(crate) const COMMENTS: &[&str] = &[
    "comments",
    "comment_count",
    "comments_count",
    "replies",
    "reply_count",
];
pub(crate) const SHARES: &[&str] = &[
    "shares",
    "share_count",
    "shares_count",
    "retweets",
    "retweet_count",
    "reposts",
    "repost_count",
];
pub(crate) const SAVES: &[&str] = &["saves", "saved", "save_count", "bookmarks", "bookmark_count"];
pub(crate) const CLICKS: &[&str] = &[
    "clicks",
    "click_count",
    "link_clicks",
    "url_clicks",
    "url_link_clicks",
    "post_clicks",
];
pub(crate) const CONTENT: &[&str] = &[
    "content",
    "text",
    "message",
    "caption",
    "commentary",
    "full_text",
    "body",
    "description",
    "title",
];
pub(crate) const POST_TYPE: &[&str] = &["post_type", "media_type", "content_type", "type", "format"];
pub(crate) const POSTED_AT: &[&str] = &[
    "posted_at",
    "published_at",
    "created_at",
    "created_time",
    "timestamp",
    "date",
    "publish_time",
    "post_date",
    "time",
];
pub(crate) const HASHTAGS: &[&str] = &["hashtags", "hash_tags", "tags"];
pub(crate) const PLATFORM: &[&str] = &["platform", "network", "social_network", "channel"];
pub(crate) const POST_ID: &[&str] = &["post_id", "id", "media_id", "tweet_id", "share_urn", "urn"];

/// Every metric chain, used to decide whether a record carries any metrics.
pub(crate) const METRIC_CHAINS: &[&[&str]] =
    &[IMPRESSIONS, REACH, LIKES, COMMENTS, SHARES, SAVES, CLICKS];

/// Keys whose object/array value holds more metrics to lift to the top level.
const METRIC_CONTAINERS: &[&str] = &[
    "public_metrics",
    "non_public_metrics",
    "organic_metrics",
    "metrics",
    "insights",
    "statistics",
    "total_share_statistics",
    "stats",
    "engagement_metrics",
];

static HASHTAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#([\p{L}\p{N}_]+)").expect("valid hashtag regex"));

/// `likeCount` → `like_count`, `Post Type` → `post_type`.
pub(crate) fn normalize_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    let mut prev_lower = false;
    for ch in key.trim().chars() {
        if ch.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
            prev_lower = false;
        } else if ch.is_alphanumeric() {
            out.push(ch);
            prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        } else if !out.ends_with('_') && !out.is_empty() {
            out.push('_');
            prev_lower = false;
        }
    }
    out.trim_end_matches('_').to_string()
}

/// Normalize keys and lift nested metric containers into one flat record.
/// Top-level values win over lifted ones.
pub(crate) fn flatten_record(record: &Map<String, Value>) -> RawRecord {
    let mut flat = RawRecord::new();
    let mut containers = Vec::new();

    for (key, value) in record {
        let key = normalize_key(key);
        if METRIC_CONTAINERS.contains(&key.as_str()) && (value.is_object() || value.is_array()) {
            containers.push(value);
        } else {
            flat.entry(key).or_insert_with(|| value.clone());
        }
    }

    for container in containers {
        for (key, value) in lift_container(container) {
            flat.entry(key).or_insert(value);
        }
    }

    flat
}

fn lift_container(container: &Value) -> Vec<(String, Value)> {
    match container {
        Value::Object(map) => match map.get("data") {
            Some(Value::Array(items)) => lift_named_metrics(items),
            _ => map
                .iter()
                .map(|(k, v)| (normalize_key(k), v.clone()))
                .collect(),
        },
        Value::Array(items) => lift_named_metrics(items),
        _ => Vec::new(),
    }
}

/// Graph-API style `[{"name": "impressions", "values": [{"value": 10}]}]`.
fn lift_named_metrics(items: &[Value]) -> Vec<(String, Value)> {
    items
        .iter()
        .filter_map(|item| {
            let name = item.get("name")?.as_str()?;
            let value = item
                .get("value")
                .or_else(|| item.get("values")?.as_array()?.first()?.get("value"))?;
            Some((normalize_key(name), value.clone()))
        })
        .collect()
}

/// Best-effort numeric coercion: numbers, numeric strings (`"1,204"`,
/// `"3.5%"`, `"1.2k"`), and counter objects (`{"summary": {"total_count": 4}}`).
pub(crate) fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_numeric_string(s),
        Value::Object(map) => ["count", "total_count", "value", "summary"]
            .iter()
            .find_map(|k| map.get(*k).and_then(coerce_number)),
        _ => None,
    }
}

fn parse_numeric_string(s: &str) -> Option<f64> {
    let cleaned: String = s
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '%' | '_' | ' '))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    let (digits, multiplier) = match cleaned.chars().last()? {
        'k' | 'K' => (&cleaned[..cleaned.len() - 1], 1_000.0),
        'm' | 'M' => (&cleaned[..cleaned.len() - 1], 1_000_000.0),
        _ => (cleaned.as_str(), 1.0),
    };
    digits
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .map(|n| n * multiplier)
}

/// Float-to-int casts saturate, so absurd values land on `u64::MAX`.
fn to_count(n: f64) -> u64 {
    if n.is_finite() && n > 0.0 {
        n.round() as u64
    } else {
        0
    }
}

/// First coercible value along the chain.
pub(crate) fn lookup_number(record: &RawRecord, chain: &[&str]) -> Option<u64> {
    chain
        .iter()
        .find_map(|key| record.get(*key).and_then(coerce_number))
        .map(to_count)
}

/// First non-empty string (or number rendered as string) along the chain.
pub(crate) fn lookup_string(record: &RawRecord, chain: &[&str]) -> Option<String> {
    chain.iter().find_map(|key| match record.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

pub(crate) fn lookup_value<'a>(record: &'a RawRecord, chain: &[&str]) -> Option<&'a Value> {
    chain
        .iter()
        .find_map(|key| record.get(*key).filter(|v| !v.is_null()))
}

pub(crate) fn has_metrics(record: &RawRecord) -> bool {
    METRIC_CHAINS
        .iter()
        .any(|chain| chain.iter().any(|k| record.get(*k).and_then(coerce_number).is_some()))
}

/// Lower-case, `#`-prefixed, de-duplicated in first-seen order.
pub(crate) fn normalize_hashtags<'a>(tags: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let bare = tag.trim().trim_start_matches('#').trim();
        if bare.is_empty() {
            continue;
        }
        let normalized = format!("#{}", bare.to_lowercase());
        if !out.contains(&normalized) {
            out.push(normalized);
        }
    }
    out
}

/// Hashtags from an explicit field (array or delimited string).
pub(crate) fn explicit_hashtags(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Array(items) => Some(normalize_hashtags(items.iter().filter_map(Value::as_str))),
        Value::String(s) => Some(normalize_hashtags(
            s.split(|c: char| c.is_whitespace() || c == ',' || c == ';'),
        )),
        _ => None,
    }
}

pub(crate) fn hashtags_from_content(content: &str) -> Vec<String> {
    normalize_hashtags(
        HASHTAG_RE
            .captures_iter(content)
            .filter_map(|c| c.get(1).map(|m| m.as_str())),
    )
}
