use serde_json::Value;

use super::{default_post_type, PlatformAdapter, RawRecord};

/// Instagram Graph API media exports (`media_insights`).
pub struct InstagramAdapter;

impl PlatformAdapter for InstagramAdapter {
    fn platform(&self) -> &'static str {
        "instagram"
    }

    fn payload_keys(&self) -> &'static [&'static str] {
        &["media_insights", "media"]
    }

    fn id_fields(&self) -> &'static [&'static str] {
        &["ig_id", "ig_media_id", "media_product_type", "shortcode", "media_type"]
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["ig", "insta"]
    }

    fn adapt(&self, record: &mut RawRecord) {
        // Reels are reported as VIDEO with a separate product type.
        if let Some(Value::String(product)) = record.get("media_product_type") {
            if product.eq_ignore_ascii_case("reels") && !record.contains_key("post_type") {
                record.insert("post_type".into(), Value::String("reel".into()));
            }
        }
        if !record.contains_key("impressions") {
            if let Some(plays) = record.get("plays").cloned() {
                record.insert("impressions".into(), plays);
            }
        }
    }

    fn post_type(&self, raw: &str) -> String {
        match raw.trim().to_uppercase().as_str() {
            "CAROUSEL_ALBUM" => "carousel".to_string(),
            "IMAGE" => "image".to_string(),
            "VIDEO" => "video".to_string(),
            "REELS" => "reel".to_string(),
            "STORY" => "story".to_string(),
            _ => default_post_type(raw),
        }
    }
}
