use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use skilltree::ledger::GemReason;
use skilltree::{
    Catalog, CompletionEvent, Config, Engine, EngineSettings, FileRepository, XpContext,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "skilltree")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Catalog file (defaults to the configured one)
    #[arg(short, long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the catalog is a valid prerequisite DAG
    Validate,
    /// Record a graded completion
    Complete {
        learner: String,
        node: String,
        /// Score percentage (0-100)
        score: u32,
        /// XP table to apply
        #[arg(long, value_enum)]
        context: Option<ContextArg>,
    },
    /// Mark a node as started
    Start { learner: String, node: String },
    /// Show a learner's progress
    Progress { learner: String },
    /// Show a learner's gem balance and history
    Gems {
        learner: String,
        /// Number of recent transactions to show
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Spend gems on an item
    Spend { learner: String, amount: u32, item: String },
    /// Claim today's login bonus
    ClaimDaily { learner: String },
    /// Claim a streak milestone bonus
    ClaimStreak { learner: String, days: u32 },
}

#[derive(Clone, Copy, ValueEnum)]
enum ContextArg {
    Module,
    Node,
}

impl From<ContextArg> for XpContext {
    fn from(arg: ContextArg) -> Self {
        match arg {
            ContextArg::Module => XpContext::ModuleCompletion,
            ContextArg::Node => XpContext::NodeQuiz,
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("Failed to serialize output")?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skilltree=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    let catalog_path = config.resolve_catalog_path(cli.catalog)?;
    let catalog = Catalog::load(&catalog_path)
        .with_context(|| format!("Refusing to start with catalog {:?}", catalog_path))?;

    let repository = FileRepository::new(Config::learners_dir()?);
    let engine = Engine::new(catalog, repository, EngineSettings::from(&config));
    let now = Utc::now();

    match cli.command {
        Commands::Validate => {
            let order: Vec<&str> = engine.catalog().topological().map(|n| n.id.as_str()).collect();
            let catalog = engine.catalog();
            println!("Catalog OK: {} nodes, {} edges", catalog.len(), catalog.edges().len());
            println!("Order: {}", order.join(" -> "));
        }
        Commands::Complete { learner, node, score, context } => {
            let mut event = CompletionEvent::new(learner, node, score, now.timestamp());
            if let Some(context) = context {
                event = event.with_context(context.into());
            }
            print_json(&engine.complete_node(&event).await?)?;
        }
        Commands::Start { learner, node } => {
            let status = engine.start_node(&learner, &node).await?;
            println!("{}: {}", node, status.label());
        }
        Commands::Progress { learner } => {
            let progress = engine.progress(&learner).await?;
            print_json(&serde_json::json!({
                "summary": progress.summary(),
                "nodes": progress,
                "edges": progress.edge_states(engine.catalog()),
            }))?;
        }
        Commands::Gems { learner, limit } => {
            let state = engine.snapshot(&learner).await?;
            print_json(&serde_json::json!({
                "summary": state.ledger.summary(),
                "recent": state.ledger.recent(limit),
            }))?;
        }
        Commands::Spend { learner, amount, item } => {
            let tx =
                engine.spend(&learner, amount, GemReason::purchase(&item), now.timestamp()).await?;
            print_json(&tx)?;
        }
        Commands::ClaimDaily { learner } => {
            let tx = engine.claim_daily_login(&learner, now.date_naive(), now.timestamp()).await?;
            print_json(&tx)?;
        }
        Commands::ClaimStreak { learner, days } => {
            let tx = engine
                .claim_streak_milestone(&learner, days, now.date_naive(), now.timestamp())
                .await?;
            print_json(&tx)?;
        }
    }

    Ok(())
}
