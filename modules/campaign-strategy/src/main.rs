use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use ai_client::{Claude, TextGenerator};
use campaign_analytics::{AnalyticsNormalizer, InsightExtractor, PerformanceClassifier};
use campaign_common::{CampaignParams, EngineConfig, HistoryQuery};
use campaign_strategy::evolver::FocusArea;
use campaign_strategy::{
    export_strategy, rollback_week, CampaignStore, EvolutionOptions, InMemoryCampaignStore,
    PostgresCampaignStore, RegenerationOptions, StrategyEvolver, StrategyGenerator,
    WeekRegenerator,
};

#[derive(Parser)]
#[command(name = "campaign-engine", about = "Campaign strategy and analytics engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Normalize an analytics export (JSON, CSV or sectioned text)
    Normalize { file: PathBuf },
    /// Normalize an export and print its insight snapshot
    Insights { file: PathBuf },
    /// Generate and store a full strategy
    Generate {
        #[arg(long)]
        params: PathBuf,
        #[arg(long)]
        analytics: Option<PathBuf>,
    },
    /// Rewrite one week of a stored campaign
    Regenerate {
        #[arg(long)]
        campaign: Uuid,
        #[arg(long)]
        week: u32,
        #[arg(long, default_value = "")]
        reason: String,
        #[arg(long)]
        feedback: Option<String>,
    },
    /// Restore the week a history entry replaced
    Rollback {
        #[arg(long)]
        campaign: Uuid,
        #[arg(long)]
        entry: Uuid,
    },
    /// List regeneration history
    History {
        #[arg(long)]
        campaign: Uuid,
        #[arg(long)]
        week: Option<u32>,
    },
    /// Evolve a campaign from a new analytics export
    Evolve {
        #[arg(long)]
        campaign: Uuid,
        #[arg(long)]
        analytics: PathBuf,
        /// Apply recommendations to editable weeks
        #[arg(long)]
        apply: bool,
        /// Comma-separated focus areas
        #[arg(long, value_delimiter = ',')]
        focus: Vec<String>,
        /// Allow changes to scheduled weeks
        #[arg(long)]
        include_scheduled: bool,
    },
    /// Print a stored campaign with its weeks
    Export {
        #[arg(long)]
        campaign: Uuid,
        #[arg(long)]
        analytics: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("campaign=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = EngineConfig::from_env();
    config.log_redacted();

    let normalizer = AnalyticsNormalizer::default();
    let extractor = InsightExtractor::new(
        PerformanceClassifier::new(config.thresholds),
        config.limits,
    );

    match cli.command {
        Command::Normalize { file } => {
            let normalized = normalizer.normalize(&read_analytics(&file)?)?;
            print_json(&normalized)
        }
        Command::Insights { file } => {
            let normalized = normalizer.normalize(&read_analytics(&file)?)?;
            print_json(&extractor.extract(None, &normalized.posts))
        }
        Command::Generate { params, analytics } => {
            let text = std::fs::read_to_string(&params)
                .with_context(|| format!("reading {}", params.display()))?;
            let params: CampaignParams = serde_json::from_str(&text)?;
            let insights = match analytics {
                Some(path) => {
                    let normalized = normalizer.normalize(&read_analytics(&path)?)?;
                    Some(extractor.extract(None, &normalized.posts))
                }
                None => None,
            };
            let generator = StrategyGenerator::new(
                open_store(&config, false).await?,
                text_generator(&config)?,
                config.generation.clone(),
            );
            print_json(&generator.generate(&params, insights.as_ref()).await?)
        }
        Command::Regenerate {
            campaign,
            week,
            reason,
            feedback,
        } => {
            let regenerator = WeekRegenerator::new(
                open_store(&config, true).await?,
                text_generator(&config)?,
                config.generation.clone(),
            );
            let mut options = RegenerationOptions::with_reason(reason);
            options.feedback = feedback;
            print_json(&regenerator.regenerate(campaign, week, &options).await?)
        }
        Command::Rollback { campaign, entry } => {
            let store = open_store(&config, true).await?;
            print_json(&rollback_week(store.as_ref(), campaign, entry).await?)
        }
        Command::History { campaign, week } => {
            let store = open_store(&config, true).await?;
            let query = match week {
                Some(n) => HistoryQuery::for_week(n),
                None => HistoryQuery::all(),
            };
            print_json(&store.list_history(campaign, &query).await?)
        }
        Command::Evolve {
            campaign,
            analytics,
            apply,
            focus,
            include_scheduled,
        } => {
            let options = EvolutionOptions {
                auto_apply: apply,
                focus_areas: FocusArea::parse_all(&focus),
                preserve_scheduled: !include_scheduled,
            };
            let evolver = StrategyEvolver::new(open_store(&config, true).await?, normalizer, extractor);
            print_json(&evolver.evolve(campaign, &read_analytics(&analytics)?, &options).await?)
        }
        Command::Export {
            campaign,
            analytics,
        } => {
            let store = open_store(&config, true).await?;
            print_json(&export_strategy(store.as_ref(), campaign, analytics).await?)
        }
    }
}

/// JSON files are parsed; anything else is passed through as text.
fn read_analytics(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}

async fn open_store(config: &EngineConfig, require_database: bool) -> Result<Arc<dyn CampaignStore>> {
    match &config.database_url {
        Some(url) => {
            let store = PostgresCampaignStore::connect(url).await?;
            store.migrate().await?;
            Ok(Arc::new(store))
        }
        None if require_database => bail!("DATABASE_URL is required for this command"),
        None => {
            warn!("DATABASE_URL not set, using an in-memory store; nothing will persist");
            Ok(Arc::new(InMemoryCampaignStore::new()))
        }
    }
}

fn text_generator(config: &EngineConfig) -> Result<Arc<dyn TextGenerator>> {
    let Some(api_key) = config.anthropic_api_key.as_deref() else {
        bail!("ANTHROPIC_API_KEY is required for generation");
    };
    info!(model = config.generation.model.as_str(), "Using Claude for generation");
    Ok(Arc::new(
        Claude::new(api_key, config.generation.model.as_str())
            .with_http_timeout(config.generation.timeout),
    ))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
