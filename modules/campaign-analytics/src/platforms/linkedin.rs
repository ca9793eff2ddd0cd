use serde_json::Value;

use super::{PlatformAdapter, RawRecord};

/// LinkedIn organization share statistics (`elements`).
pub struct LinkedInAdapter;

const URN_FIELDS: &[&str] = &["share", "ugc_post", "activity", "share_urn", "activity_urn"];

impl PlatformAdapter for LinkedInAdapter {
    fn platform(&self) -> &'static str {
        "linkedin"
    }

    fn payload_keys(&self) -> &'static [&'static str] {
        &["elements"]
    }

    fn id_fields(&self) -> &'static [&'static str] {
        &["share_urn", "activity_urn", "ugc_post", "organizational_entity"]
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["li", "linked_in", "linked in"]
    }

    fn recognizes(&self, record: &RawRecord) -> bool {
        self.id_fields().iter().any(|f| record.contains_key(*f))
            || record
                .values()
                .any(|v| v.as_str().is_some_and(|s| s.starts_with("urn:li:")))
    }

    fn adapt(&self, record: &mut RawRecord) {
        // `engagement` is a ratio on LinkedIn, not a count.
        record.remove("engagement");
        if !record.contains_key("post_id") {
            let urn = URN_FIELDS
                .iter()
                .find_map(|f| record.get(*f).and_then(Value::as_str).map(str::to_string));
            if let Some(urn) = urn {
                record.insert("post_id".into(), Value::String(urn));
            }
        }
        if !record.contains_key("post_type") {
            record.insert("post_type".into(), Value::String("update".into()));
        }
    }
}
