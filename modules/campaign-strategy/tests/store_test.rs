//! In-memory store contract: whole-strategy writes and all-or-nothing commits.

use chrono::Utc;
use uuid::Uuid;

use campaign_analytics::{AnalyticsNormalizer, InsightExtractor};
use campaign_common::{
    Campaign, CampaignError, CampaignOverview, CampaignStatus, PlannedWeek, StrategySource,
    WeekContent, WeekStatus,
};
use campaign_strategy::evolver::{
    apply_to_weeks, EvolutionOptions, EvolutionRecord, PerformanceComparison, Recommendation,
    Priority, RecommendationKind,
};
use campaign_strategy::store::{EvolutionCommit, StrategyWrite};
use campaign_strategy::testing::{mark_week, sample_analytics, sample_params, seed_campaign};
use campaign_strategy::{CampaignStore, InMemoryCampaignStore};

fn planned(numbers: &[u32]) -> Vec<PlannedWeek> {
    numbers
        .iter()
        .map(|&n| PlannedWeek {
            week_number: n,
            content: WeekContent {
                theme: format!("Week {n}"),
                objectives: vec![],
                key_messages: vec![],
                posts: vec![],
            },
        })
        .collect()
}

fn write(weeks: Vec<PlannedWeek>) -> StrategyWrite {
    StrategyWrite {
        overview: CampaignOverview::default(),
        weeks,
        source: StrategySource::Fallback,
    }
}

#[tokio::test]
async fn strategy_write_activates_and_flags_degraded() {
    let store = InMemoryCampaignStore::new();
    let campaign = Campaign::draft(&sample_params(3), Utc::now());
    let id = store.create_campaign(&campaign).await.unwrap();
    assert_eq!(store.get_campaign(id).await.unwrap().status, CampaignStatus::Draft);

    store.write_strategy(&campaign, &write(planned(&[1, 2, 3]))).await.unwrap();

    let stored = store.get_campaign(id).await.unwrap();
    assert_eq!(stored.status, CampaignStatus::Active);
    assert!(stored.degraded);
    let weeks = store.list_weeks(id).await.unwrap();
    assert_eq!(weeks.len(), 3);
    assert!(weeks.iter().all(|w| w.status == WeekStatus::Draft));
}

#[tokio::test]
async fn gapped_or_repeated_strategy_is_rejected() {
    let store = InMemoryCampaignStore::new();
    let campaign = Campaign::draft(&sample_params(3), Utc::now());
    let id = store.create_campaign(&campaign).await.unwrap();

    let err = store.write_strategy(&campaign, &write(planned(&[1, 3]))).await.unwrap_err();
    assert!(matches!(err, CampaignError::Validation(_)));
    let err = store
        .write_strategy(&campaign, &write(planned(&[1, 2, 2])))
        .await
        .unwrap_err();
    assert!(matches!(err, CampaignError::Validation(_)));

    assert!(store.list_weeks(id).await.unwrap().is_empty());
    assert_eq!(store.get_campaign(id).await.unwrap().status, CampaignStatus::Draft);
}

#[tokio::test]
async fn strategy_write_inserts_an_unsaved_campaign() {
    let store = InMemoryCampaignStore::new();
    let campaign = Campaign::draft(&sample_params(2), Utc::now());

    store.write_strategy(&campaign, &write(planned(&[1, 2]))).await.unwrap();

    let stored = store.get_campaign(campaign.id).await.unwrap();
    assert_eq!(stored.status, CampaignStatus::Active);
    assert_eq!(store.list_weeks(campaign.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn rejected_write_of_an_unsaved_campaign_stores_nothing() {
    let store = InMemoryCampaignStore::new();
    let campaign = Campaign::draft(&sample_params(3), Utc::now());

    let err = store.write_strategy(&campaign, &write(planned(&[1, 2]))).await.unwrap_err();

    assert!(matches!(err, CampaignError::Validation(_)));
    assert!(store.get_campaign(campaign.id).await.unwrap_err().is_not_found());
    assert_eq!(store.campaign_count(), 0);
}

#[tokio::test]
async fn second_strategy_write_conflicts() {
    let store = InMemoryCampaignStore::new();
    let id = seed_campaign(&store, 2).await;
    let campaign = store.get_campaign(id).await.unwrap();

    let err = store.write_strategy(&campaign, &write(planned(&[1, 2]))).await.unwrap_err();

    assert!(matches!(err, CampaignError::Conflict(_)));
    assert_eq!(store.get_week(id, 1).await.unwrap().theme, "Theme 1");
}

#[tokio::test]
async fn unknown_campaign_is_not_found() {
    let store = InMemoryCampaignStore::new();
    assert!(store.get_campaign(Uuid::new_v4()).await.unwrap_err().is_not_found());
    assert!(store.list_weeks(Uuid::new_v4()).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn stale_evolution_commit_writes_nothing() {
    let store = InMemoryCampaignStore::new();
    let id = seed_campaign(&store, 2).await;
    let weeks = store.list_weeks(id).await.unwrap();

    let now = Utc::now();
    let recommendations = vec![Recommendation::new(
        RecommendationKind::PostingTimeShift { hour: 18 },
        Priority::High,
        "Post at 18:00",
        vec![1, 2],
    )];
    let (week_updates, applied_changes) = apply_to_weeks(id, &weeks, &recommendations, true, now);
    assert_eq!(week_updates.len(), 2);

    // Someone else touches week 2 after it was read.
    mark_week(&store, id, 2, WeekStatus::Scheduled).await;
    let after_mark = store.list_weeks(id).await.unwrap();

    let normalized = AnalyticsNormalizer::default()
        .normalize(&sample_analytics())
        .unwrap();
    let snapshot = InsightExtractor::default().extract(Some(id), &normalized.posts);
    let record = EvolutionRecord {
        id: Uuid::new_v4(),
        campaign_id: id,
        snapshot_id: snapshot.id(),
        baseline_snapshot_id: None,
        comparison: PerformanceComparison::between(None, &snapshot),
        recommendations,
        applied_changes,
        options: EvolutionOptions::applying(),
        created_at: now,
    };

    let err = store
        .commit_evolution(&EvolutionCommit {
            snapshot,
            week_updates,
            record,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, CampaignError::Conflict(_)));
    assert_eq!(store.list_weeks(id).await.unwrap(), after_mark);
    assert_eq!(store.snapshot_count(id), 0);
    assert!(store.list_evolutions(id).await.unwrap().is_empty());
    assert!(store.list_week_changes(id, None).await.unwrap().is_empty());
}
