use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use ai_client::TextGenerator;
use campaign_analytics::InsightSnapshot;
use campaign_common::{
    Campaign, CampaignParams, CampaignResult, GenerationSettings, StrategySource, Week,
};

use crate::generation::{call_generator, fallback_strategy, parse_strategy, strategy_prompt};
use crate::store::{CampaignStore, StrategyWrite};

/// A freshly generated and stored strategy.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedStrategy {
    pub campaign: Campaign,
    pub weeks: Vec<Week>,
    pub source: StrategySource,
}

impl GeneratedStrategy {
    pub fn is_degraded(&self) -> bool {
        self.campaign.degraded
    }
}

/// Builds a full multi-week strategy from campaign params.
///
/// Capability and parse problems never fail the call: the result degrades to
/// a fallback strategy instead. Only invalid params and store errors
/// propagate.
pub struct StrategyGenerator {
    store: Arc<dyn CampaignStore>,
    generator: Arc<dyn TextGenerator>,
    settings: GenerationSettings,
}

impl StrategyGenerator {
    pub fn new(
        store: Arc<dyn CampaignStore>,
        generator: Arc<dyn TextGenerator>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            store,
            generator,
            settings,
        }
    }

    pub async fn generate(
        &self,
        params: &CampaignParams,
        insights: Option<&InsightSnapshot>,
    ) -> CampaignResult<GeneratedStrategy> {
        params.validate()?;

        // Stored only together with its weeks, so an abandoned or failed run
        // leaves no empty draft behind.
        let campaign = Campaign::draft(params, Utc::now());
        let campaign_id = campaign.id;
        info!(
            campaign_id = %campaign_id,
            total_weeks = params.total_weeks,
            with_insights = insights.is_some(),
            "Generating strategy"
        );

        let prompt = strategy_prompt(params, insights, &self.settings);
        let parsed = match call_generator(self.generator.as_ref(), &prompt, self.settings.timeout)
            .await
        {
            Ok(raw) => parse_strategy(&raw, params.total_weeks),
            Err(e) => {
                warn!(campaign_id = %campaign_id, error = %e, "Generation unavailable");
                None
            }
        };
        let parsed = parsed.unwrap_or_else(|| {
            warn!(campaign_id = %campaign_id, stage = "fallback", "Using fallback strategy");
            fallback_strategy(params)
        });

        let source = parsed.source;
        self.store
            .write_strategy(
                &campaign,
                &StrategyWrite {
                    overview: parsed.overview,
                    weeks: parsed.weeks,
                    source,
                },
            )
            .await?;

        let campaign = self.store.get_campaign(campaign_id).await?;
        let weeks = self.store.list_weeks(campaign_id).await?;
        info!(
            campaign_id = %campaign_id,
            source = source.as_str(),
            degraded = campaign.degraded,
            posts = weeks.iter().map(|w| w.posts.len()).sum::<usize>(),
            "Strategy stored"
        );
        Ok(GeneratedStrategy {
            campaign,
            weeks,
            source,
        })
    }
}
