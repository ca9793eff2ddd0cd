use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use campaign_common::{Week, WeekContent};

use super::types::{Recommendation, RecommendationKind, WeekChange};
use crate::store::WeekUpdate;

pub const INTERACTIVE_CTA: &str = "Tell us what you think in the comments!";

const INTERACTIVE_MARKERS: &[&str] = &[
    "comment", "tell us", "let us know", "share", "tag", "vote", "poll", "reply", "dm", "ask",
];

pub fn is_interactive(call_to_action: &str) -> bool {
    let lower = call_to_action.to_lowercase();
    lower.contains('?') || INTERACTIVE_MARKERS.iter().any(|m| lower.contains(m))
}

/// The week content with `recommendation` applied, or `None` when it would
/// not change anything.
pub fn apply_recommendation(
    recommendation: &Recommendation,
    content: &WeekContent,
) -> Option<WeekContent> {
    let mut next = content.clone();
    match &recommendation.kind {
        RecommendationKind::ContentTypeShift { post_type } => {
            if next.posts.iter().any(|p| p.post_type.eq_ignore_ascii_case(post_type)) {
                return None;
            }
            next.posts.first_mut()?.post_type = post_type.clone();
        }
        RecommendationKind::PostingTimeShift { hour } => {
            for post in &mut next.posts {
                post.scheduled_hour = Some(*hour);
            }
        }
        RecommendationKind::PlatformReallocation { platform } => {
            let objective = format!("Prioritize {platform} content");
            if !next.objectives.iter().any(|o| o.eq_ignore_ascii_case(&objective)) {
                next.objectives.push(objective);
            }
        }
        RecommendationKind::InteractiveCtas => {
            for post in next.posts.iter_mut().filter(|p| !is_interactive(&p.call_to_action)) {
                post.call_to_action = match post.call_to_action.trim() {
                    "" => INTERACTIVE_CTA.to_string(),
                    cta => format!("{cta} {INTERACTIVE_CTA}"),
                };
            }
        }
        RecommendationKind::HashtagFocus { tags } => {
            for post in &mut next.posts {
                let present: Vec<String> = post
                    .hashtags
                    .split_whitespace()
                    .map(str::to_lowercase)
                    .collect();
                let missing: Vec<&str> = tags
                    .iter()
                    .filter(|t| !present.contains(&t.to_lowercase()))
                    .map(String::as_str)
                    .collect();
                if missing.is_empty() {
                    continue;
                }
                let mut parts: Vec<&str> = post.hashtags.split_whitespace().collect();
                parts.extend(missing);
                post.hashtags = parts.join(" ");
            }
        }
    }
    (next != *content).then_some(next)
}

/// Apply every recommendation to every targeted, editable week.
///
/// Each week is rewritten at most once, with its changes chained in
/// recommendation order.
pub fn apply_to_weeks(
    campaign_id: Uuid,
    weeks: &[Week],
    recommendations: &[Recommendation],
    preserve_scheduled: bool,
    now: DateTime<Utc>,
) -> (Vec<WeekUpdate>, Vec<WeekChange>) {
    let mut updates = Vec::new();
    let mut changes = Vec::new();

    for week in weeks {
        if !week.is_editable(preserve_scheduled) {
            debug!(
                week_number = week.week_number,
                status = week.status.as_str(),
                "Skipping locked week"
            );
            continue;
        }

        let mut content = week.content();
        let mut changed = false;
        for recommendation in recommendations.iter().filter(|r| r.targets(week.week_number)) {
            let Some(updated) = apply_recommendation(recommendation, &content) else {
                continue;
            };
            changes.push(WeekChange {
                id: Uuid::new_v4(),
                campaign_id,
                week_number: week.week_number,
                recommendation_id: recommendation.id,
                description: recommendation.description.clone(),
                previous: content,
                updated: updated.clone(),
                applied_at: now,
            });
            content = updated;
            changed = true;
        }

        if changed {
            updates.push(WeekUpdate {
                week: week.with_content(content, now),
                expected_version: week.version,
            });
        }
    }
    (updates, changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evolver::types::Priority;
    use campaign_common::{Post, PostStatus, WeekStatus};

    fn post(post_type: &str, cta: &str, hashtags: &str) -> Post {
        Post {
            position: 1,
            platform: "instagram".into(),
            post_type: post_type.into(),
            content: "hello".into(),
            hashtags: hashtags.into(),
            call_to_action: cta.into(),
            content_pillar: String::new(),
            visual_requirements: String::new(),
            scheduled_hour: None,
            status: PostStatus::Planned,
        }
    }

    fn content(posts: Vec<Post>) -> WeekContent {
        WeekContent {
            theme: "Theme".into(),
            objectives: vec!["Grow".into()],
            key_messages: vec![],
            posts,
        }
        .renumbered()
    }

    fn rec(kind: RecommendationKind) -> Recommendation {
        Recommendation::new(kind, Priority::Medium, "test", vec![1, 2])
    }

    #[test]
    fn content_type_shift_touches_one_post_once() {
        let week = content(vec![post("image", "", ""), post("link", "", "")]);
        let shift = rec(RecommendationKind::ContentTypeShift { post_type: "reel".into() });

        let updated = apply_recommendation(&shift, &week).unwrap();
        assert_eq!(updated.posts[0].post_type, "reel");
        assert_eq!(updated.posts[1].post_type, "link");
        assert!(apply_recommendation(&shift, &updated).is_none());
    }

    #[test]
    fn interactive_cta_rewrites_only_flat_calls() {
        let week = content(vec![
            post("image", "Visit us today", ""),
            post("image", "Which is your favorite?", ""),
            post("image", "", ""),
        ]);
        let updated = apply_recommendation(&rec(RecommendationKind::InteractiveCtas), &week).unwrap();

        assert_eq!(updated.posts[0].call_to_action, format!("Visit us today {INTERACTIVE_CTA}"));
        assert_eq!(updated.posts[1].call_to_action, "Which is your favorite?");
        assert_eq!(updated.posts[2].call_to_action, INTERACTIVE_CTA);
    }

    #[test]
    fn hashtag_focus_appends_missing_tags() {
        let week = content(vec![post("image", "", "#Brunch #coffee")]);
        let focus = rec(RecommendationKind::HashtagFocus {
            tags: vec!["#brunch".into(), "#local".into()],
        });
        let updated = apply_recommendation(&focus, &week).unwrap();
        assert_eq!(updated.posts[0].hashtags, "#Brunch #coffee #local");
    }

    #[test]
    fn platform_objective_added_once() {
        let week = content(vec![]);
        let realloc = rec(RecommendationKind::PlatformReallocation { platform: "tiktok".into() });
        let updated = apply_recommendation(&realloc, &week).unwrap();
        assert_eq!(updated.objectives.last().unwrap(), "Prioritize tiktok content");
        assert!(apply_recommendation(&realloc, &updated).is_none());
    }

    #[test]
    fn locked_weeks_are_skipped_and_changes_chain() {
        let campaign_id = Uuid::new_v4();
        let now = Utc::now();
        let make = |n: u32, status: WeekStatus| Week {
            campaign_id,
            week_number: n,
            theme: format!("Week {n}"),
            objectives: vec![],
            key_messages: vec![],
            status,
            performance_score: None,
            posts: vec![post("image", "Buy now", "")],
            version: 3,
            updated_at: now,
        };
        let weeks = vec![make(1, WeekStatus::Published), make(2, WeekStatus::Draft)];
        let recs = vec![
            rec(RecommendationKind::PostingTimeShift { hour: 18 }),
            rec(RecommendationKind::InteractiveCtas),
        ];

        let (updates, changes) = apply_to_weeks(campaign_id, &weeks, &recs, true, now);

        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].week.week_number, 2);
        assert_eq!(updates[0].expected_version, 3);
        assert_eq!(updates[0].week.version, 4);
        assert_eq!(updates[0].week.posts[0].scheduled_hour, Some(18));
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[1].previous, changes[0].updated);
        assert_eq!(changes[0].recommendation_id, recs[0].id);
    }
}
