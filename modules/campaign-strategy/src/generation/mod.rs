pub mod parse;
pub mod prompt;
pub mod response;

pub use parse::{fallback_strategy, parse_strategy, parse_week, ParsedStrategy};
pub use prompt::{insight_excerpt, strategy_prompt, week_prompt, WeekContext};
pub use response::{OverviewResponse, PostResponse, StrategyResponse, WeekResponse};

use std::time::{Duration, Instant};

use ai_client::{GenerationPrompt, TextGenerator};
use campaign_common::{CampaignError, CampaignResult};
use tracing::{debug, warn};

/// Make the single generation call for an operation, bounded by `timeout`.
pub async fn call_generator(
    generator: &dyn TextGenerator,
    prompt: &GenerationPrompt,
    timeout: Duration,
) -> CampaignResult<String> {
    let started = Instant::now();
    let result = tokio::time::timeout(timeout, generator.generate(prompt)).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match result {
        Err(_) => {
            warn!(generator = generator.name(), elapsed_ms, "Generation timed out");
            Err(CampaignError::GenerationTimeout(timeout))
        }
        Ok(Err(e)) if e.is_timeout() => {
            warn!(generator = generator.name(), elapsed_ms, "Generation timed out upstream");
            Err(CampaignError::GenerationTimeout(timeout))
        }
        Ok(Err(e)) => {
            warn!(generator = generator.name(), error = %e, "Generation failed");
            Err(CampaignError::GenerationFailure(e.to_string()))
        }
        Ok(Ok(text)) if text.trim().is_empty() => Err(CampaignError::GenerationFailure(format!(
            "{} returned an empty response",
            generator.name()
        ))),
        Ok(Ok(text)) => {
            debug!(
                generator = generator.name(),
                elapsed_ms,
                chars = text.len(),
                "Generation complete"
            );
            Ok(text)
        }
    }
}
