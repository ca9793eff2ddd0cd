//! Campaign strategy engine: generate a multi-week strategy, rewrite single
//! weeks, and evolve the plan from fresh analytics.

pub mod evolver;
pub mod export;
pub mod generation;
pub mod generator;
pub mod regenerator;
pub mod store;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use evolver::{EvolutionOptions, EvolutionOutcome, EvolutionRecord, StrategyEvolver};
pub use export::{export_strategy, AnalyticsExport, StrategyExport};
pub use generator::{GeneratedStrategy, StrategyGenerator};
pub use regenerator::{rollback_week, RegenerationOptions, RegenerationOutcome, WeekRegenerator};
pub use store::{CampaignStore, InMemoryCampaignStore, PostgresCampaignStore};
