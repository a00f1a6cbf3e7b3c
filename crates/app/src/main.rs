use anyhow::{Context, Result};
use billview_core::Month;
use billview_import::{CategoryMatcher, MatcherState};
use billview_storage::{SqliteRuleStore, TransactionFilter};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

pub struct AppState {
    pub db: billview_storage::DbPool,
    pub matcher: Arc<CategoryMatcher>,
}

#[derive(Parser, Debug)]
#[command(name = "billview", version, about = "Import and browse Alipay / WeChat Pay bills")]
struct Cli {
    /// Config file (defaults to config.toml in the data directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import Alipay CSV and WeChat XLSX statements
    Import {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Parse and categorize without saving
        #[arg(long)]
        dry_run: bool,
    },

    /// List stored transactions, newest first
    List {
        /// Only this month (YYYY-MM)
        #[arg(long)]
        month: Option<Month>,

        #[arg(long)]
        category: Option<String>,

        #[arg(long, default_value_t = 50)]
        limit: i64,
    },

    /// Per-category totals
    Report {
        #[arg(long)]
        month: Option<Month>,
    },

    /// Manage keyword category rules
    Rules {
        #[command(subcommand)]
        command: RulesCommand,
    },

    /// Re-run keyword matching over every stored transaction
    Recategorize,

    /// Write stored transactions to a CSV file
    Export {
        out: PathBuf,

        #[arg(long)]
        month: Option<Month>,
    },
}

#[derive(Subcommand, Debug)]
enum RulesCommand {
    /// Print keyword -> category mappings in match order
    List,
    /// Rebuild the keyword index from the database
    Reload,
    /// Create or replace a category's keywords
    Set {
        category: String,
        #[arg(required = true)]
        keywords: Vec<String>,
    },
    /// Remove a category
    Delete { category: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load_config(cli.config.as_deref())?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .context("invalid log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let db_path = config.database_path()?;
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create {}", parent.display()))?;
    }
    let db = billview_storage::create_db(&db_path)
        .await
        .with_context(|| format!("open database {}", db_path.display()))?;
    tracing::info!("Database ready at {}", db_path.display());

    let matcher = Arc::new(CategoryMatcher::new(Arc::new(SqliteRuleStore::new(
        db.clone(),
    ))));
    // Imports categorize with whatever the matcher holds, so it must be loaded first.
    if matcher.load().await != MatcherState::Ready {
        tracing::warn!("Category rules unavailable; records will fall back to 其他");
    }

    let state = AppState { db, matcher };
    let mut out = std::io::stdout().lock();

    match cli.command {
        Command::Import { files, dry_run } => {
            commands::import(&state, &files, dry_run, &mut out).await?;
        }
        Command::List {
            month,
            category,
            limit,
        } => {
            let filter = TransactionFilter {
                month,
                category,
                kind: None,
                limit: Some(limit),
            };
            commands::list(&state, &filter, &mut out).await?;
        }
        Command::Report { month } => commands::report(&state, month, &mut out).await?,
        Command::Rules { command } => match command {
            RulesCommand::List => commands::list_rules(&state, &mut out)?,
            RulesCommand::Reload => commands::reload_rules(&state, &mut out).await?,
            RulesCommand::Set { category, keywords } => {
                commands::set_rule(&state, category, keywords, &mut out).await?
            }
            RulesCommand::Delete { category } => {
                commands::delete_rule(&state, &category, &mut out).await?
            }
        },
        Command::Recategorize => {
            commands::recategorize_all(&state, &mut out).await?;
        }
        Command::Export { out: path, month } => {
            commands::export(&state, &path, month, &mut out).await?
        }
    }

    state.db.close().await;
    Ok(())
}
