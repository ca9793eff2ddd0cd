//! Normalization tests: raw export → AnalyticsNormalizer → canonical output.
//!
//! Each test hand-crafts one payload shape and asserts on the canonical
//! posts, aggregates, and skipped records. No I/O.

use campaign_analytics::{
    total_engagement, AnalyticsNormalizer, InsightExtractor, PerformanceClassifier,
    PerformanceTier, SkipReason,
};
use campaign_common::CampaignError;
use chrono::Timelike;
use serde_json::json;

fn normalizer() -> AnalyticsNormalizer {
    AnalyticsNormalizer::default()
}

// ---------------------------------------------------------------------------
// Generic shapes
// ---------------------------------------------------------------------------

#[test]
fn generic_post_list_computes_rate_and_tier() {
    let raw = json!({"posts": [{
        "likes": 10, "comments": 5, "shares": 2, "saves": 3,
        "impressions": 500, "platform": "instagram", "hashtags": ["#a", "#b"]
    }]});

    let out = normalizer().normalize(&raw).unwrap();

    assert_eq!(out.posts.len(), 1);
    let post = &out.posts[0];
    assert_eq!(post.platform, "instagram");
    assert_eq!(post.hashtags, vec!["#a", "#b"]);
    assert_eq!(post.engagement_rate(), 4.0);
    assert_eq!(
        PerformanceClassifier::default().classify(post).tier,
        PerformanceTier::High
    );
    assert_eq!(out.summary.total_posts, 1);
    assert_eq!(out.summary.total_engagement, 20);
    assert_eq!(out.summary.average_engagement_rate, 4.0);
    assert_eq!(out.platforms["instagram"].post_count, 1);
}

#[test]
fn enormous_counters_saturate() {
    let raw = json!({"posts": [
        {"platform": "instagram", "likes": 1e30, "comments": 1, "impressions": 10,
         "posted_at": "2024-03-05T18:00:00Z"},
        {"platform": "instagram", "likes": "1e30", "shares": u64::MAX, "impressions": 10,
         "posted_at": "2024-03-06T19:00:00Z"},
        {"platform": "twitter", "retweet_count": u64::MAX, "quote_count": 5, "impressions": 10}
    ]});

    let out = normalizer().normalize(&raw).unwrap();

    assert_eq!(out.posts.len(), 3);
    let instagram: Vec<_> = out.posts.iter().filter(|p| p.platform == "instagram").collect();
    assert_eq!(instagram[0].likes, u64::MAX);
    assert_eq!(total_engagement(instagram[0]), u64::MAX);
    assert!(instagram[0].engagement_rate().is_finite());
    let tweet = out.posts.iter().find(|p| p.platform == "twitter").unwrap();
    assert_eq!(tweet.shares, u64::MAX);

    assert_eq!(out.summary.total_engagement, u64::MAX);
    assert_eq!(out.platforms["instagram"].engagement, u64::MAX);
    assert_eq!(out.time_periods[0].engagement, u64::MAX);

    let snapshot = InsightExtractor::default().extract(None, &out.posts);
    assert_eq!(snapshot.metrics().total_engagement, u64::MAX);
    assert!(snapshot.platforms()["instagram"].average_engagement.is_finite());
}

#[test]
fn same_input_normalizes_identically() {
    let raw = json!({
        "summary": {"followers": "1,200"},
        "posts": [
            {"text": "Launch day #Brunch", "likes": "12", "views": 400, "created_at": "2024-03-05T14:30:00Z"},
            {"tweet_id": "99", "public_metrics": {"like_count": 3, "retweet_count": 1, "impression_count": 80}},
            "junk",
        ]
    });

    let first = normalizer().normalize(&raw).unwrap();
    let second = normalizer().normalize(&raw).unwrap();

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn bare_array_is_a_post_list() {
    let raw = json!([
        {"caption": "one", "like_count": 4, "impressions": 100},
        {"caption": "two", "like_count": 1, "impressions": 100}
    ]);

    let out = normalizer().normalize(&raw).unwrap();

    assert_eq!(out.posts.len(), 2);
    assert_eq!(out.posts[0].content, "one");
    assert_eq!(out.posts[0].platform, "unknown");
    assert_eq!(out.summary.average_engagement_rate, 2.5);
}

#[test]
fn single_record_object_is_accepted() {
    let raw = json!({"platform": "fb", "message": "Hello", "reactions": 7, "reach": 70});

    let out = normalizer().normalize(&raw).unwrap();

    assert_eq!(out.posts.len(), 1);
    assert_eq!(out.posts[0].platform, "facebook");
    assert_eq!(out.posts[0].likes, 7);
    // reach stands in for missing impressions
    assert_eq!(out.posts[0].impressions, 70);
    assert_eq!(out.posts[0].reach, 70);
}

#[test]
fn summary_numbers_become_extras() {
    let raw = json!({"summary": {"followers": "1,200", "label": "Q1"}, "posts": []});

    let out = normalizer().normalize(&raw).unwrap();

    assert_eq!(out.summary.extras.get("followers"), Some(&1200.0));
    assert!(!out.summary.extras.contains_key("label"));
}

// ---------------------------------------------------------------------------
// Platform shapes
// ---------------------------------------------------------------------------

#[test]
fn instagram_media_insights() {
    let raw = json!({"media_insights": [{
        "id": "17890",
        "caption": "New drop #Summer",
        "media_type": "CAROUSEL_ALBUM",
        "timestamp": "2024-03-05T18:00:00+0000",
        "insights": {"data": [
            {"name": "impressions", "values": [{"value": 1000}]},
            {"name": "saved", "values": [{"value": 12}]}
        ]},
        "like_count": 40,
        "comments_count": 8
    }]});

    let out = normalizer().normalize(&raw).unwrap();
    let post = &out.posts[0];

    assert_eq!(post.platform, "instagram");
    assert_eq!(post.post_type, "carousel");
    assert_eq!(post.impressions, 1000);
    assert_eq!(post.saves, 12);
    assert_eq!(post.likes, 40);
    assert_eq!(post.comments, 8);
    assert_eq!(post.hashtags, vec!["#summer"]);
    assert_eq!(post.posted_at.map(|d| d.hour()), Some(18));
    assert_eq!(post.post_id.as_deref(), Some("17890"));
}

#[test]
fn twitter_tweets_with_public_metrics() {
    let raw = json!({"tweets": [{
        "id_str": "1",
        "full_text": "Big news",
        "created_at": "Wed Oct 10 20:19:24 +0000 2018",
        "public_metrics": {"like_count": 10, "retweet_count": 3, "quote_count": 2, "reply_count": 1, "impression_count": 800}
    }]});

    let out = normalizer().normalize(&raw).unwrap();
    let post = &out.posts[0];

    assert_eq!(post.platform, "twitter");
    assert_eq!(post.post_type, "tweet");
    assert_eq!(post.shares, 5);
    assert_eq!(post.comments, 1);
    assert_eq!(post.impressions, 800);
    assert_eq!(post.posted_at.map(|d| d.hour()), Some(20));
}

#[test]
fn linkedin_elements_use_share_statistics() {
    let raw = json!({"elements": [{
        "share": "urn:li:share:7",
        "totalShareStatistics": {"impressionCount": 300, "likeCount": 6, "commentCount": 2, "shareCount": 1, "clickCount": 3, "engagement": 0.04}
    }]});

    let out = normalizer().normalize(&raw).unwrap();
    let post = &out.posts[0];

    assert_eq!(post.platform, "linkedin");
    assert_eq!(post.post_id.as_deref(), Some("urn:li:share:7"));
    assert_eq!(post.post_type, "update");
    assert_eq!(post.impressions, 300);
    assert_eq!(post.total_engagement(), 12);
}

#[test]
fn facebook_data_with_summary_counters() {
    let raw = json!({"data": [{
        "id": "123_456",
        "message": "Visit us",
        "status_type": "added_photos",
        "created_time": "2024-03-05T09:00:00+0000",
        "reactions": {"summary": {"total_count": 25}},
        "comments": {"summary": {"total_count": 4}},
        "shares": {"count": 3},
        "post_impressions": 900
    }]});

    let out = normalizer().normalize(&raw).unwrap();
    let post = &out.posts[0];

    assert_eq!(post.platform, "facebook");
    assert_eq!(post.post_type, "image");
    assert_eq!(post.likes, 25);
    assert_eq!(post.comments, 4);
    assert_eq!(post.shares, 3);
    assert_eq!(post.impressions, 900);
}

#[test]
fn reports_inherit_report_platform() {
    let raw = json!({"reports": [
        {"platform": "Instagram", "posts": [{"caption": "a", "likes": 1, "impressions": 10}]},
        {"platform": "twitter", "rows": [{"text": "b", "likes": 2, "impressions": 10}]},
        {"platform": "linkedin", "content": "c", "likes": 3, "impressions": 10}
    ]});

    let out = normalizer().normalize(&raw).unwrap();
    let platforms: Vec<&str> = out.posts.iter().map(|p| p.platform.as_str()).collect();

    assert_eq!(platforms, vec!["instagram", "twitter", "linkedin"]);
    assert_eq!(out.platforms.len(), 3);
}

#[test]
fn id_fields_infer_platform_in_generic_lists() {
    let raw = json!({"posts": [
        {"tweet_id": "1", "text": "x", "likes": 1},
        {"ig_media_id": "2", "caption": "y", "likes": 1},
        {"message": "z", "likes": 1}
    ]});

    let out = normalizer().normalize(&raw).unwrap();
    let platforms: Vec<&str> = out.posts.iter().map(|p| p.platform.as_str()).collect();

    assert_eq!(platforms, vec!["twitter", "instagram", "unknown"]);
}

// ---------------------------------------------------------------------------
// Text shapes
// ---------------------------------------------------------------------------

#[test]
fn csv_text_rows_become_posts() {
    let text = "platform,content,likes,comments,impressions,posted_at\n\
                instagram,\"Hello, world #Fresh\",10,2,200,2024-03-05 14:00:00\n\
                twitter,short,1,0,100,2024-03-12 09:00:00\n";

    let out = normalizer().normalize_text(text).unwrap();

    assert_eq!(out.posts.len(), 2);
    assert_eq!(out.posts[0].content, "Hello, world #Fresh");
    assert_eq!(out.posts[0].hashtags, vec!["#fresh"]);
    assert_eq!(out.posts[0].engagement_rate(), 6.0);
    assert_eq!(out.time_periods.len(), 2);
    assert_eq!(out.time_periods[0].period, "2024-W10");
    assert_eq!(out.time_periods[1].period, "2024-W11");
}

#[test]
fn csv_row_with_wrong_width_is_skipped() {
    let text = "platform;likes;impressions\ninstagram;5;100\nbroken;row\n";

    let out = normalizer().normalize_text(text).unwrap();

    assert_eq!(out.posts.len(), 1);
    assert_eq!(out.skipped.len(), 1);
    assert_eq!(out.skipped[0].index, 1);
    assert_eq!(
        out.skipped[0].reason,
        SkipReason::RowWidthMismatch { expected: 3, found: 2 }
    );
}

#[test]
fn sectioned_text_uses_section_platform_and_summary() {
    let text = "instagram:\n  likes: 10\n  impressions: 500\n\
                twitter:\n  likes: 1\n  impressions: 100\n  text: hello\n\
                summary:\n  followers: 3400\n";

    let out = normalizer().normalize_text(text).unwrap();

    assert_eq!(out.posts.len(), 2);
    assert_eq!(out.posts[0].platform, "instagram");
    assert_eq!(out.posts[0].engagement_rate(), 2.0);
    assert_eq!(out.posts[1].platform, "twitter");
    assert_eq!(out.summary.extras.get("followers"), Some(&3400.0));
}

#[test]
fn json_text_and_string_values_are_parsed() {
    let text = r#"{"posts": [{"likes": 1, "impressions": 10}]}"#;
    let from_text = normalizer().normalize_text(text).unwrap();
    let from_value = normalizer().normalize(&json!(text)).unwrap();

    assert_eq!(from_text, from_value);
    assert_eq!(from_text.posts[0].engagement_rate(), 10.0);
}

// ---------------------------------------------------------------------------
// Failure handling
// ---------------------------------------------------------------------------

#[test]
fn malformed_records_are_skipped_not_fatal() {
    let raw = json!({"posts": [
        {"likes": 3, "impressions": 100},
        42,
        {"color": "blue"},
        {"content": "only text"}
    ]});

    let out = normalizer().normalize(&raw).unwrap();

    assert_eq!(out.posts.len(), 2);
    assert_eq!(out.skipped.len(), 2);
    assert_eq!(out.skipped[0].index, 1);
    assert_eq!(out.skipped[0].reason, SkipReason::NotAnObject);
    assert_eq!(out.skipped[1].index, 2);
    assert_eq!(out.skipped[1].reason, SkipReason::NoUsableFields);
}

#[test]
fn unrecognized_payloads_are_errors() {
    let cases = [
        normalizer().normalize(&json!({"foo": {"bar": 1}})),
        normalizer().normalize(&json!(null)),
        normalizer().normalize_text("   "),
        normalizer().normalize_text("{not json"),
        normalizer().normalize_text("just a sentence without structure"),
    ];

    for result in cases {
        assert!(matches!(
            result,
            Err(CampaignError::UnparseableAnalyticsInput(_))
        ));
    }
}

#[test]
fn numeric_strings_and_missing_metrics() {
    let raw = json!({"posts": [{"text": "t", "likes": "1.2k", "impressions": "24,000", "shares": "n/a"}]});

    let out = normalizer().normalize(&raw).unwrap();
    let post = &out.posts[0];

    assert_eq!(post.likes, 1200);
    assert_eq!(post.impressions, 24000);
    assert_eq!(post.shares, 0);
    assert_eq!(post.engagement_rate(), 5.0);
}
