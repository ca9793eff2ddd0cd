//! Raw analytics → [`NormalizedAnalytics`].
//!
//! Accepts JSON values (generic `posts` lists, bare arrays, single records,
//! platform-shaped exports, reporting-tool `reports`) and text (JSON, CSV,
//! or `section:\nkey: value`). Individual malformed records are skipped and
//! reported; only an unrecognized top-level shape is an error.

mod csv;
mod dates;
mod fields;
mod sections;

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, Weekday};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use campaign_common::{CampaignError, CampaignResult};

use crate::canonical::{
    AnalyticsSummary, CanonicalPost, NormalizedAnalytics, PlatformTotals, SkipReason,
    SkippedRecord, TimePeriod,
};
use crate::classifier::{round2, saturating_sum};
use crate::platforms::{default_post_type, AdapterRegistry};

use fields::{
    coerce_number, explicit_hashtags, flatten_record, has_metrics, hashtags_from_content,
    lookup_number, lookup_string, lookup_value, normalize_key,
};

const UNKNOWN_PLATFORM: &str = "unknown";
const NESTED_REPORT_KEYS: &[&str] = &["posts", "rows", "data"];
const SUMMARY_SECTIONS: &[&str] = &["summary", "totals", "overview"];

/// One record awaiting canonicalization, with whatever platform context its
/// position in the payload supplies.
struct Candidate {
    record: Result<Map<String, Value>, SkipReason>,
    /// Platform named by the enclosing report, section, or payload root.
    context_platform: Option<String>,
    /// Platform implied by the payload key the record was found under.
    payload_platform: Option<&'static str>,
}

impl Candidate {
    fn from_value(value: &Value, context_platform: Option<String>) -> Self {
        Self {
            record: value.as_object().cloned().ok_or(SkipReason::NotAnObject),
            context_platform,
            payload_platform: None,
        }
    }
}

#[derive(Default)]
struct Batch {
    candidates: Vec<Candidate>,
    extras: BTreeMap<String, f64>,
}

impl Batch {
    fn absorb_summary(&mut self, summary: &Map<String, Value>) {
        for (key, value) in summary {
            if let Some(n) = coerce_number(value) {
                self.extras.insert(normalize_key(key), n);
            }
        }
    }
}

#[derive(Default)]
pub struct AnalyticsNormalizer {
    registry: AdapterRegistry,
}

impl AnalyticsNormalizer {
    pub fn new(registry: AdapterRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    /// Normalize a JSON payload. A string value is treated as raw text.
    pub fn normalize(&self, raw: &Value) -> CampaignResult<NormalizedAnalytics> {
        let batch = match raw {
            Value::String(text) => return self.normalize_text(text),
            Value::Array(items) => Batch {
                candidates: items.iter().map(|v| Candidate::from_value(v, None)).collect(),
                ..Default::default()
            },
            Value::Object(root) => self.batch_from_object(root)?,
            other => {
                return Err(CampaignError::UnparseableAnalyticsInput(format!(
                    "expected an object, array, or text, got {}",
                    json_kind(other)
                )))
            }
        };
        Ok(self.finish(batch))
    }

    /// Normalize text: JSON, sectioned `key: value` text, or CSV.
    pub fn normalize_text(&self, text: &str) -> CampaignResult<NormalizedAnalytics> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(CampaignError::UnparseableAnalyticsInput(
                "empty input".to_string(),
            ));
        }

        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            let value: Value = serde_json::from_str(trimmed).map_err(|e| {
                CampaignError::UnparseableAnalyticsInput(format!("invalid JSON: {e}"))
            })?;
            return self.normalize(&value);
        }

        if sections::looks_sectioned(trimmed) {
            if let Some(parsed) = sections::parse_sections(trimmed) {
                debug!(sections = parsed.len(), "Parsed sectioned analytics text");
                return Ok(self.finish(self.batch_from_sections(parsed)));
            }
        }

        if let Some(table) = csv::parse_table(trimmed) {
            debug!(
                columns = table.headers.len(),
                rows = table.rows.len(),
                "Parsed delimited analytics text"
            );
            return Ok(self.finish(batch_from_table(table)));
        }

        Err(CampaignError::UnparseableAnalyticsInput(
            "text is neither JSON, delimited rows, nor key/value sections".to_string(),
        ))
    }

    fn batch_from_object(&self, root: &Map<String, Value>) -> CampaignResult<Batch> {
        let mut batch = Batch::default();
        if let Some(Value::Object(summary)) = root.get("summary") {
            batch.absorb_summary(summary);
        }
        let root_platform = root
            .get("platform")
            .and_then(Value::as_str)
            .and_then(|p| self.registry.canonical_name(p));

        if let Some(Value::Array(posts)) = root.get("posts") {
            batch.candidates = posts
                .iter()
                .map(|v| Candidate::from_value(v, root_platform.clone()))
                .collect();
            return Ok(batch);
        }

        if let Some(Value::Array(reports)) = root.get("reports") {
            for report in reports {
                self.expand_report(report, &mut batch);
            }
            return Ok(batch);
        }

        if let Some((adapter, items)) = self.registry.for_payload(root) {
            debug!(platform = adapter.platform(), "Detected platform-shaped payload");
            batch.candidates = items
                .iter()
                .map(|v| Candidate {
                    payload_platform: Some(adapter.platform()),
                    ..Candidate::from_value(v, root_platform.clone())
                })
                .collect();
            return Ok(batch);
        }

        if has_metrics(&flatten_record(root)) {
            batch.candidates.push(Candidate::from_value(
                &Value::Object(root.clone()),
                None,
            ));
            return Ok(batch);
        }

        let mut keys: Vec<&str> = root.keys().map(String::as_str).collect();
        keys.truncate(8);
        Err(CampaignError::UnparseableAnalyticsInput(format!(
            "unrecognized object with keys [{}]",
            keys.join(", ")
        )))
    }

    /// A report either nests its own post list (inheriting the report's
    /// platform) or is itself a record.
    fn expand_report(&self, report: &Value, batch: &mut Batch) {
        let Some(obj) = report.as_object() else {
            batch.candidates.push(Candidate::from_value(report, None));
            return;
        };
        let platform = obj
            .get("platform")
            .and_then(Value::as_str)
            .and_then(|p| self.registry.canonical_name(p));

        let nested = NESTED_REPORT_KEYS.iter().find_map(|k| match obj.get(*k) {
            Some(Value::Array(items)) => Some(items),
            _ => None,
        });
        match nested {
            Some(items) => batch.candidates.extend(
                items
                    .iter()
                    .map(|v| Candidate::from_value(v, platform.clone())),
            ),
            None => batch.candidates.push(Candidate::from_value(report, None)),
        }
    }

    fn batch_from_sections(&self, parsed: Vec<sections::Section>) -> Batch {
        let mut batch = Batch::default();
        for section in parsed {
            let name = section.name.as_deref().map(normalize_key);
            let record: Map<String, Value> = section
                .entries
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect();

            if name
                .as_deref()
                .is_some_and(|n| SUMMARY_SECTIONS.contains(&n))
            {
                batch.absorb_summary(&record);
                continue;
            }

            let context_platform = name
                .as_deref()
                .and_then(|n| self.registry.get(n))
                .map(|a| a.platform().to_string());
            batch.candidates.push(Candidate {
                record: Ok(record),
                context_platform,
                payload_platform: None,
            });
        }
        batch
    }

    fn finish(&self, batch: Batch) -> NormalizedAnalytics {
        let mut posts = Vec::with_capacity(batch.candidates.len());
        let mut skipped = Vec::new();

        for (index, candidate) in batch.candidates.into_iter().enumerate() {
            match self.canonicalize(candidate) {
                Ok(post) => posts.push(post),
                Err(reason) => {
                    warn!(index, reason = %reason, "Skipping analytics record");
                    skipped.push(SkippedRecord { index, reason });
                }
            }
        }

        let summary = summarize(&posts, batch.extras);
        let platforms = platform_totals(&posts);
        let time_periods = time_periods(&posts);

        debug!(
            posts = posts.len(),
            skipped = skipped.len(),
            platforms = platforms.len(),
            "Analytics normalized"
        );

        NormalizedAnalytics {
            posts,
            summary,
            platforms,
            time_periods,
            skipped,
        }
    }

    fn canonicalize(&self, candidate: Candidate) -> Result<CanonicalPost, SkipReason> {
        let raw = candidate.record?;
        let mut record = flatten_record(&raw);

        let platform = lookup_string(&record, fields::PLATFORM)
            .and_then(|p| self.registry.canonical_name(&p))
            .or(candidate.context_platform)
            .or_else(|| {
                self.registry
                    .recognize(&record)
                    .map(|a| a.platform().to_string())
            })
            .or_else(|| candidate.payload_platform.map(str::to_string))
            .unwrap_or_else(|| UNKNOWN_PLATFORM.to_string());

        let adapter = self.registry.get(&platform);
        if let Some(adapter) = adapter {
            adapter.adapt(&mut record);
        }

        let content = lookup_string(&record, fields::CONTENT).unwrap_or_default();
        let post_id = lookup_string(&record, fields::POST_ID);
        if content.is_empty() && post_id.is_none() && !has_metrics(&record) {
            return Err(SkipReason::NoUsableFields);
        }

        let raw_type = lookup_string(&record, fields::POST_TYPE).unwrap_or_default();
        let post_type = match adapter {
            Some(adapter) => adapter.post_type(&raw_type),
            None => default_post_type(&raw_type),
        };

        let hashtags = lookup_value(&record, fields::HASHTAGS)
            .and_then(explicit_hashtags)
            .filter(|tags| !tags.is_empty())
            .unwrap_or_else(|| hashtags_from_content(&content));

        let posted_at = fields::POSTED_AT
            .iter()
            .find_map(|k| record.get(*k).and_then(dates::parse_timestamp));

        let count = |chain: &[&str]| lookup_number(&record, chain).unwrap_or(0);

        Ok(CanonicalPost {
            post_id,
            platform,
            post_type,
            hashtags,
            posted_at,
            impressions: count(fields::IMPRESSIONS),
            reach: count(fields::REACH),
            likes: count(fields::LIKES),
            comments: count(fields::COMMENTS),
            shares: count(fields::SHARES),
            saves: count(fields::SAVES),
            clicks: count(fields::CLICKS),
            content,
        })
    }
}

fn batch_from_table(table: csv::Table) -> Batch {
    let width = table.headers.len();
    let candidates = table
        .rows
        .into_iter()
        .map(|row| {
            let record = if row.len() == width {
                Ok(table
                    .headers
                    .iter()
                    .cloned()
                    .zip(row.into_iter().map(Value::String))
                    .collect())
            } else {
                Err(SkipReason::RowWidthMismatch {
                    expected: width,
                    found: row.len(),
                })
            };
            Candidate {
                record,
                context_platform: None,
                payload_platform: None,
            }
        })
        .collect();
    Batch {
        candidates,
        ..Default::default()
    }
}

fn mean_rate(posts: &[&CanonicalPost]) -> f64 {
    if posts.is_empty() {
        return 0.0;
    }
    let sum: f64 = posts.iter().map(|p| p.engagement_rate()).sum();
    round2(sum / posts.len() as f64)
}

fn summarize(posts: &[CanonicalPost], extras: BTreeMap<String, f64>) -> AnalyticsSummary {
    let all: Vec<&CanonicalPost> = posts.iter().collect();
    AnalyticsSummary {
        total_posts: posts.len(),
        total_impressions: saturating_sum(posts.iter().map(|p| p.impressions)),
        total_reach: saturating_sum(posts.iter().map(|p| p.reach)),
        total_engagement: saturating_sum(posts.iter().map(|p| p.total_engagement())),
        average_engagement_rate: mean_rate(&all),
        extras,
    }
}

fn platform_totals(posts: &[CanonicalPost]) -> BTreeMap<String, PlatformTotals> {
    let mut grouped: BTreeMap<&str, Vec<&CanonicalPost>> = BTreeMap::new();
    for post in posts {
        grouped.entry(post.platform.as_str()).or_default().push(post);
    }
    grouped
        .into_iter()
        .map(|(platform, group)| {
            let totals = PlatformTotals {
                post_count: group.len(),
                impressions: saturating_sum(group.iter().map(|p| p.impressions)),
                reach: saturating_sum(group.iter().map(|p| p.reach)),
                engagement: saturating_sum(group.iter().map(|p| p.total_engagement())),
                average_engagement_rate: mean_rate(&group),
            };
            (platform.to_string(), totals)
        })
        .collect()
}

fn time_periods(posts: &[CanonicalPost]) -> Vec<TimePeriod> {
    let mut weeks: BTreeMap<(i32, u32), (usize, u64, u64)> = BTreeMap::new();
    for post in posts {
        let Some(posted_at) = post.posted_at else {
            continue;
        };
        let iso = posted_at.iso_week();
        let entry = weeks.entry((iso.year(), iso.week())).or_default();
        entry.0 += 1;
        entry.1 = entry.1.saturating_add(post.impressions);
        entry.2 = entry.2.saturating_add(post.total_engagement());
    }
    weeks
        .into_iter()
        .filter_map(|((year, week), (post_count, impressions, engagement))| {
            Some(TimePeriod {
                period: format!("{year}-W{week:02}"),
                starts_on: NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)?,
                post_count,
                impressions,
                engagement,
            })
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn context_platform_beats_id_inference() {
        let normalizer = AnalyticsNormalizer::default();
        let raw = json!({"reports": [{"platform": "LinkedIn", "rows": [{"tweet_id": "1", "likes": 1}]}]});
        let out = normalizer.normalize(&raw).unwrap();
        assert_eq!(out.posts[0].platform, "linkedin");
    }

    #[test]
    fn explicit_platform_field_wins() {
        let normalizer = AnalyticsNormalizer::default();
        let raw = json!({"tweets": [{"platform": "x", "text": "hi", "like_count": 2}]});
        let out = normalizer.normalize(&raw).unwrap();
        assert_eq!(out.posts[0].platform, "twitter");
    }

    #[test]
    fn scalars_are_unparseable() {
        let normalizer = AnalyticsNormalizer::default();
        let err = normalizer.normalize(&json!(42)).unwrap_err();
        assert!(matches!(err, CampaignError::UnparseableAnalyticsInput(_)));
    }

    #[test]
    fn empty_post_list_is_valid() {
        let normalizer = AnalyticsNormalizer::default();
        let out = normalizer.normalize(&json!({"posts": []})).unwrap();
        assert!(out.posts.is_empty());
        assert_eq!(out.summary.average_engagement_rate, 0.0);
    }
}
