use serde_json::Value;

use super::{PlatformAdapter, RawRecord};

/// Twitter / X exports (`tweets`, or API v2 `data` with `public_metrics`).
pub struct TwitterAdapter;

impl PlatformAdapter for TwitterAdapter {
    fn platform(&self) -> &'static str {
        "twitter"
    }

    fn payload_keys(&self) -> &'static [&'static str] {
        &["tweets"]
    }

    fn id_fields(&self) -> &'static [&'static str] {
        &[
            "tweet_id",
            "id_str",
            "retweet_count",
            "quote_count",
            "favorite_count",
            "conversation_id",
        ]
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["x", "x.com", "twitter.com", "tweet"]
    }

    fn adapt(&self, record: &mut RawRecord) {
        // Quote tweets count as shares alongside retweets.
        if !record.contains_key("shares") {
            let retweets = count(record.get("retweet_count"));
            let quotes = count(record.get("quote_count"));
            if retweets.is_some() || quotes.is_some() {
                let total = retweets.unwrap_or(0).saturating_add(quotes.unwrap_or(0));
                record.insert("shares".into(), Value::from(total));
            }
        }
        if !record.contains_key("post_type") {
            let kind = if record.contains_key("in_reply_to_status_id")
                || record.contains_key("in_reply_to_user_id")
            {
                "reply"
            } else {
                "tweet"
            };
            record.insert("post_type".into(), Value::String(kind.into()));
        }
    }
}

fn count(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    }
}
