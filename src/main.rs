//! `parlay`: command-line access to the locally persisted parlays.
//!
//! Loads configuration, initialises structured logging, and runs one
//! subcommand against the file-backed store.

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use parlay_core::analysis::client::AnalysisClient;
use parlay_core::analysis::AnalysisService;
use parlay_core::config::AppConfig;
use parlay_core::engine::adjust::parse_line;
use parlay_core::engine::{LineAdjustmentCoordinator, ParlayWizard};
use parlay_core::slip::normalize::RawAnalysis;
use parlay_core::storage::{FileStore, KeyValueStore, ParlayRepository, Preferences};
use parlay_core::types::{IdentityKey, Parlay, ParlayResult, ParlayStatus, Sportsbook};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Parser)]
#[command(name = "parlay")]
#[command(about = "Build, track, and settle parlays stored on this machine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path (falls back to $PARLAY_CONFIG, then config.toml)
    #[arg(short, long)]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List saved parlays
    List {
        /// Only parlays with this status
        #[arg(short, long)]
        status: Option<ParlayStatus>,
        /// Show bets recorded as a guest instead
        #[arg(long)]
        guest: bool,
    },
    /// Show one parlay with its legs
    Show { id: String },
    /// Build a parlay from a JSON file of analysis results and save it
    Build {
        /// Parlay name
        #[arg(short, long)]
        name: String,
        /// Sportsbook (defaults to the preferred one)
        #[arg(short, long)]
        sportsbook: Option<Sportsbook>,
        #[arg(short, long, default_value = "1")]
        week: u32,
        /// JSON array of analysis results
        #[arg(long)]
        legs: String,
        /// Ask the analysis service for a grade before saving
        #[arg(long)]
        grade: bool,
        /// Save as already placed
        #[arg(long)]
        place: bool,
    },
    /// Move a leg of a saved draft to a new line
    Adjust {
        id: String,
        /// Player name as shown by `show`
        player: String,
        /// Stat type, e.g. "receiving yards"
        stat: String,
        /// New line
        line: String,
    },
    /// Mark a parlay as placed
    Place {
        id: String,
        /// Stake
        #[arg(short, long)]
        amount: Option<Decimal>,
    },
    /// Record the outcome of a placed parlay
    #[command(group(ArgGroup::new("outcome").required(true).args(["won", "lost"])))]
    Settle {
        id: String,
        #[arg(long)]
        won: bool,
        #[arg(long)]
        lost: bool,
        /// Number of legs that hit
        #[arg(long)]
        legs_hit: u32,
    },
    /// Delete a parlay
    Delete { id: String },
    /// Show free-tier usage
    Quota,
    /// Show or update preferences
    Prefs {
        /// Set the preferred sportsbook
        #[arg(long)]
        sportsbook: Option<Sportsbook>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cli = Cli::parse();
    init_logging();

    let config_path = cli
        .config
        .clone()
        .or_else(|| std::env::var("PARLAY_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let cfg = if Path::new(&config_path).exists() {
        AppConfig::load(&config_path)?
    } else {
        info!(path = %config_path, "No config file; using defaults");
        AppConfig::default()
    };

    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(&cfg.storage.data_dir));
    let repo = ParlayRepository::new(store.clone(), cfg.limits.free_tier_parlays);
    let prefs = Preferences::new(store.clone());

    match cli.command {
        Commands::List { status, guest } => {
            let repo = if guest { ParlayRepository::guest(store) } else { repo };
            list(&repo, status).await
        }
        Commands::Show { id } => show(&repo, &id).await,
        Commands::Build { name, sportsbook, week, legs, grade, place } => {
            let book = match sportsbook {
                Some(b) => b,
                None => prefs
                    .preferred_sportsbook()
                    .await?
                    .context("No sportsbook given and no preferred sportsbook set")?,
            };
            build(&cfg, &repo, &name, book, week, &legs, grade, place).await
        }
        Commands::Adjust { id, player, stat, line } => {
            let new_line = parse_line(&line)?;
            let client: Arc<dyn AnalysisService> = Arc::new(AnalysisClient::new(&cfg.service)?);
            let coordinator = LineAdjustmentCoordinator::from_config(client, &cfg.service);
            let key = IdentityKey::new(&player, &stat);
            let updated = coordinator.adjust_saved_leg(&repo, &id, &key, new_line).await?;
            print_parlay(&updated);
            Ok(())
        }
        Commands::Place { id, amount } => {
            if repo.mark_as_placed(&id, amount).await? {
                println!("Parlay {id} marked as placed");
            } else {
                println!("No parlay with id {id}");
            }
            Ok(())
        }
        Commands::Settle { id, won, lost: _, legs_hit } => settle(&repo, &id, won, legs_hit).await,
        Commands::Delete { id } => {
            if repo.delete_parlay(&id).await? {
                println!("Deleted {id}");
            } else {
                println!("No parlay with id {id}");
            }
            Ok(())
        }
        Commands::Quota => {
            let used = repo.count().await?;
            match repo.remaining_slots().await? {
                Some(left) => println!("{used} saved, {left} free slot(s) left"),
                None => println!("{used} saved, unlimited"),
            }
            Ok(())
        }
        Commands::Prefs { sportsbook } => {
            if let Some(book) = sportsbook {
                prefs.set_preferred_sportsbook(Some(book)).await?;
            }
            let current = prefs.load().await?;
            println!(
                "preferred sportsbook: {}",
                current
                    .preferred_sportsbook
                    .map(|b| b.to_string())
                    .unwrap_or_else(|| "none".to_string())
            );
            println!("onboarding complete:  {}", current.onboarding_complete);
            println!("tutorial seen:        {}", current.tutorial_seen);
            Ok(())
        }
    }
}

async fn list(repo: &ParlayRepository, status: Option<ParlayStatus>) -> Result<()> {
    let parlays = match status {
        Some(s) => repo.get_parlays_by_status(s).await?,
        None => repo.get_all_parlays().await?,
    };
    if parlays.is_empty() {
        println!("No parlays saved.");
        return Ok(());
    }
    for p in &parlays {
        println!("{p}");
    }
    Ok(())
}

async fn show(repo: &ParlayRepository, id: &str) -> Result<()> {
    let parlay = repo
        .get_parlay(id)
        .await?
        .with_context(|| format!("No parlay with id {id}"))?;
    print_parlay(&parlay);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn build(
    cfg: &AppConfig,
    repo: &ParlayRepository,
    name: &str,
    sportsbook: Sportsbook,
    week: u32,
    legs_path: &str,
    grade: bool,
    place: bool,
) -> Result<()> {
    let raw = std::fs::read_to_string(legs_path)
        .with_context(|| format!("Failed to read {legs_path}"))?;
    let analyses: Vec<RawAnalysis> =
        serde_json::from_str(&raw).with_context(|| format!("Invalid analysis file {legs_path}"))?;

    let mut wizard = ParlayWizard::new(&cfg.limits);
    wizard.set_name(name)?;
    wizard.set_week(week)?;
    wizard.set_sportsbook(sportsbook)?;
    wizard.advance()?;
    for analysis in &analyses {
        if let Err(e) = wizard.add_analysis(analysis) {
            warn!(player = %analysis.player_name, error = %e, "Skipping leg");
        }
    }
    wizard.advance()?;

    for warning in wizard.summary().warnings() {
        println!("warning: {warning}");
    }

    if grade {
        let client = AnalysisClient::new(&cfg.service)?;
        match wizard.request_grade(&client).await {
            Ok(g) => println!("grade: {} ({})", g.grade, g.recommendation),
            Err(e) => println!("grading unavailable: {e}"),
        }
    }

    let saved = wizard.save(repo, place).await?;
    print_parlay(&saved);
    Ok(())
}

async fn settle(repo: &ParlayRepository, id: &str, won: bool, legs_hit: u32) -> Result<()> {
    let parlay = repo
        .get_parlay(id)
        .await?
        .with_context(|| format!("No parlay with id {id}"))?;
    let legs_total = parlay.legs().len() as u32;
    if legs_hit > legs_total {
        anyhow::bail!("legs-hit {legs_hit} exceeds the parlay's {legs_total} legs");
    }
    let result = ParlayResult { won, legs_hit, legs_total };
    repo.record_result(id, result).await?;
    println!("Parlay {id}: {result}");
    Ok(())
}

fn print_parlay(p: &Parlay) {
    println!("{p}");
    println!("  id:         {}", p.id);
    println!("  week:       {}", p.week);
    if let Some(book) = p.sportsbook {
        println!("  sportsbook: {book}");
    }
    println!("  confidence: {}%", p.effective_confidence());
    println!("  risk:       {}", p.risk_level());
    if let Some(amount) = p.bet_amount {
        println!("  stake:      {amount}");
    }
    if let Some(result) = p.result {
        println!("  result:     {result}");
    }
    for leg in p.legs() {
        println!("    - {leg}");
    }
    for warning in p.summary().warnings() {
        println!("  warning: {warning}");
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("parlay_core=info"));

    let json_logging = std::env::var("PARLAY_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }
}
