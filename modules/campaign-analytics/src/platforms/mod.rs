//! Platform adapters for export-specific field shapes.
//!
//! The set is closed: every supported platform is a concrete type registered
//! in [`AdapterRegistry::default`]. Lookup is by canonical name or alias,
//! never by constructing a type from a string.

mod facebook;
mod instagram;
mod linkedin;
mod twitter;

pub use facebook::FacebookAdapter;
pub use instagram::InstagramAdapter;
pub use linkedin::LinkedInAdapter;
pub use twitter::TwitterAdapter;

use serde_json::{Map, Value};

/// A single raw record, keys already normalized to snake_case.
pub type RawRecord = Map<String, Value>;

pub trait PlatformAdapter: Send + Sync {
    /// Canonical lower-case platform name.
    fn platform(&self) -> &'static str;

    /// Top-level payload keys this platform's exports put their posts under.
    fn payload_keys(&self) -> &'static [&'static str];

    /// Fields whose presence marks a record as coming from this platform.
    fn id_fields(&self) -> &'static [&'static str];

    /// Alternative labels users and tools write for this platform.
    fn aliases(&self) -> &'static [&'static str] {
        &[]
    }

    fn recognizes(&self, record: &RawRecord) -> bool {
        self.id_fields().iter().any(|f| record.contains_key(*f))
    }

    /// Platform-specific renames applied after generic flattening.
    fn adapt(&self, _record: &mut RawRecord) {}

    /// Map a raw post-type label to the canonical vocabulary.
    fn post_type(&self, raw: &str) -> String {
        default_post_type(raw)
    }
}

/// Generic post-type normalization shared by all platforms.
pub fn default_post_type(raw: &str) -> String {
    let label = raw.trim().to_lowercase().replace([' ', '-'], "_");
    match label.as_str() {
        "" => "post".to_string(),
        "photo" | "picture" | "img" => "image".to_string(),
        "carousel_album" | "album" | "multi_image" => "carousel".to_string(),
        "reels" => "reel".to_string(),
        "videos" | "native_video" => "video".to_string(),
        "stories" => "story".to_string(),
        "status" | "text_post" => "text".to_string(),
        _ => label,
    }
}

/// Ordered, explicit set of platform adapters.
pub struct AdapterRegistry {
    adapters: Vec<Box<dyn PlatformAdapter>>,
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::empty()
            .with(InstagramAdapter)
            .with(TwitterAdapter)
            .with(LinkedInAdapter)
            .with(FacebookAdapter)
    }
}

impl AdapterRegistry {
    pub fn empty() -> Self {
        Self {
            adapters: Vec::new(),
        }
    }

    pub fn with(mut self, adapter: impl PlatformAdapter + 'static) -> Self {
        self.adapters.push(Box::new(adapter));
        self
    }

    pub fn adapters(&self) -> impl Iterator<Item = &dyn PlatformAdapter> {
        self.adapters.iter().map(|a| a.as_ref())
    }

    /// Adapter for a canonical name or alias.
    pub fn get(&self, label: &str) -> Option<&dyn PlatformAdapter> {
        let label = label.trim().to_lowercase();
        self.adapters()
            .find(|a| a.platform() == label || a.aliases().iter().any(|alias| *alias == label))
    }

    /// Canonical platform name for a free-form label. Unregistered labels are
    /// kept lower-cased; blank labels yield `None`.
    pub fn canonical_name(&self, label: &str) -> Option<String> {
        let trimmed = label.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(
            self.get(trimmed)
                .map(|a| a.platform().to_string())
                .unwrap_or_else(|| trimmed.to_lowercase()),
        )
    }

    /// First adapter whose id fields appear on the record.
    pub fn recognize(&self, record: &RawRecord) -> Option<&dyn PlatformAdapter> {
        self.adapters().find(|a| a.recognizes(record))
    }

    /// First adapter claiming one of the payload's top-level collections,
    /// with the collection itself.
    pub fn for_payload<'a>(
        &self,
        root: &'a Map<String, Value>,
    ) -> Option<(&dyn PlatformAdapter, &'a Vec<Value>)> {
        for adapter in self.adapters() {
            for key in adapter.payload_keys() {
                if let Some(Value::Array(items)) = root.get(*key) {
                    return Some((adapter, items));
                }
            }
        }
        None
    }
}
