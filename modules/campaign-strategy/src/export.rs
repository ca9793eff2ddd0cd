use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use campaign_analytics::InsightSnapshot;
use campaign_common::{Campaign, CampaignResult, HistoryQuery, Week};

use crate::evolver::Recommendation;
use crate::store::CampaignStore;

/// Read-only view of a campaign for reporting collaborators.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyExport {
    pub campaign: Campaign,
    pub weeks: Vec<Week>,
    pub total_posts: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analytics: Option<AnalyticsExport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsExport {
    pub latest_snapshot: Option<InsightSnapshot>,
    pub evolution_count: usize,
    pub regeneration_count: usize,
    /// Recommendations from the most recent evolution run.
    pub latest_recommendations: Vec<Recommendation>,
}

pub async fn export_strategy(
    store: &dyn CampaignStore,
    campaign_id: Uuid,
    include_analytics: bool,
) -> CampaignResult<StrategyExport> {
    let campaign = store.get_campaign(campaign_id).await?;
    let weeks = store.list_weeks(campaign_id).await?;
    let total_posts: usize = weeks.iter().map(|w| w.posts.len()).sum();

    let analytics = if include_analytics {
        let evolutions = store.list_evolutions(campaign_id).await?;
        let history = store.list_history(campaign_id, &HistoryQuery::all()).await?;
        Some(AnalyticsExport {
            latest_snapshot: store.latest_insight_snapshot(campaign_id).await?,
            evolution_count: evolutions.len(),
            regeneration_count: history.len(),
            latest_recommendations: evolutions
                .last()
                .map(|r| r.recommendations.clone())
                .unwrap_or_default(),
        })
    } else {
        None
    };

    debug!(
        campaign_id = %campaign_id,
        weeks = weeks.len(),
        total_posts,
        include_analytics,
        "Exported strategy"
    );
    Ok(StrategyExport {
        campaign,
        weeks,
        total_posts,
        analytics,
    })
}
