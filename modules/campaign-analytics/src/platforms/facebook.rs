use serde_json::Value;

use super::{default_post_type, PlatformAdapter, RawRecord};

/// Facebook Graph API page-post exports (`data`).
pub struct FacebookAdapter;

impl PlatformAdapter for FacebookAdapter {
    fn platform(&self) -> &'static str {
        "facebook"
    }

    fn payload_keys(&self) -> &'static [&'static str] {
        &["data", "page_posts"]
    }

    fn id_fields(&self) -> &'static [&'static str] {
        &["fb_post_id", "facebook_post_id", "page_id", "status_type"]
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["fb", "meta", "facebook.com"]
    }

    fn adapt(&self, record: &mut RawRecord) {
        if !record.contains_key("post_type") {
            if let Some(Value::String(status)) = record.get("status_type") {
                let kind = match status.as_str() {
                    "added_photos" => "image",
                    "added_video" => "video",
                    "shared_story" => "link",
                    "mobile_status_update" => "text",
                    other => other,
                };
                let kind = kind.to_string();
                record.insert("post_type".into(), Value::String(kind));
            }
        }
        // Graph insights report clicks under its own metric name.
        if !record.contains_key("clicks") {
            if let Some(clicks) = record.get("post_clicks").cloned() {
                record.insert("clicks".into(), clicks);
            }
        }
    }

    fn post_type(&self, raw: &str) -> String {
        match raw {
            "photo" => "image".to_string(),
            _ => default_post_type(raw),
        }
    }
}
