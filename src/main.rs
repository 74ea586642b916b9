//! opinion-engine: a thin CLI driver over the engine library for scripting
//! and demonstration purposes. All of the actual work lives in the crate
//! root's modules; this binary just wires file I/O to them.

use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::{AppSettings, Parser, Subcommand, ValueHint};
use clap_verbosity_flag::Verbosity;

use opinion_engine::config::EngineConfig;
use opinion_engine::state::{ConversationState, VoteEvent};
use opinion_engine::vote::RawVote;

#[derive(Parser, Debug)]
#[clap(version, about)]
#[clap(global_setting(AppSettings::PropagateVersion))]
struct Cli {
    #[clap(flatten)]
    verbose: Verbosity,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest a batch of vote events (JSON array) and print the resulting snapshot.
    Ingest(IngestArgs),
    /// Run a small built-in demonstration conversation and print a summary.
    Demo,
}

#[derive(Parser, Debug)]
struct IngestArgs {
    /// Conversation identifier for a fresh snapshot (ignored when --resume-from is given).
    #[clap(long, default_value = "conversation")]
    conversation_id: String,

    /// JSON file containing an array of vote events.
    #[clap(value_hint = ValueHint::FilePath, parse(from_os_str))]
    events: PathBuf,

    /// Prior snapshot to resume from, as produced by a previous `ingest` run.
    #[clap(long, value_hint = ValueHint::FilePath, parse(from_os_str))]
    resume_from: Option<PathBuf>,

    /// Engine tuning parameters (TOML).
    #[clap(long, value_hint = ValueHint::FilePath, parse(from_os_str))]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    color_eyre::install().ok();
    let cli = Cli::parse();
    init_tracing(&cli.verbose);

    match cli.command {
        Command::Ingest(args) => run_ingest(args),
        Command::Demo => run_demo(),
    }
}

fn init_tracing(verbosity: &Verbosity) {
    let level = match verbosity.log_level_filter() {
        log::LevelFilter::Off => None,
        log::LevelFilter::Error => Some(tracing::Level::ERROR),
        log::LevelFilter::Warn => Some(tracing::Level::WARN),
        log::LevelFilter::Info => Some(tracing::Level::INFO),
        log::LevelFilter::Debug => Some(tracing::Level::DEBUG),
        log::LevelFilter::Trace => Some(tracing::Level::TRACE),
    };
    if let Some(level) = level {
        tracing_subscriber::fmt().with_max_level(level).init();
    }
}

fn run_ingest(args: IngestArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
            EngineConfig::from_toml_str(&text)?
        }
        None => EngineConfig::default(),
    };

    let state = match &args.resume_from {
        Some(path) => {
            let text = fs::read_to_string(path).with_context(|| format!("reading snapshot {}", path.display()))?;
            let value: serde_json::Value = serde_json::from_str(&text)?;
            ConversationState::from_dict(value)?
        }
        None => ConversationState::new(args.conversation_id.clone()).with_config(config),
    };

    let text = fs::read_to_string(&args.events)
        .with_context(|| format!("reading events {}", args.events.display()))?;
    let events: Vec<VoteEvent> = serde_json::from_str(&text).context("parsing vote events")?;

    tracing::info!(n = events.len(), "ingesting vote events");
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64;
    let state = state.update_votes(&events, true, now)?;

    let snapshot = state.to_dict()?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

fn run_demo() -> Result<()> {
    let events: Vec<VoteEvent> = [
        ("p1", "c1", 1.0),
        ("p2", "c1", 1.0),
        ("p3", "c1", 1.0),
        ("p4", "c1", -1.0),
        ("p5", "c1", -1.0),
        ("p6", "c1", -1.0),
        ("p1", "c2", 1.0),
        ("p2", "c2", -1.0),
        ("p3", "c2", 1.0),
        ("p4", "c2", 1.0),
        ("p5", "c2", -1.0),
        ("p6", "c2", -1.0),
    ]
    .into_iter()
    .map(|(p, c, v)| VoteEvent {
        participant_id: p.to_string(),
        comment_id: c.to_string(),
        value: Some(RawVote::Number(v)),
    })
    .collect();

    let state = ConversationState::new("demo").update_votes(&events, true, 0)?;

    println!(
        "{} participants, {} comments, {} groups",
        state.raw_mat.n_rows(),
        state.raw_mat.n_cols(),
        state.group_clusters.len()
    );
    for cluster in &state.group_clusters {
        println!("group {} ({} members): {:?}", cluster.id, cluster.members.len(), cluster.members);
        if let Some(stats) = state.repness.group_repness.get(&cluster.id) {
            for s in stats {
                println!("  {:?} comment {} (pa={:.2}, pd={:.2})", s.repful, s.comment_id, s.pa, s.pd);
            }
        }
    }
    for (pid, stat) in &state.ptpt_stats {
        println!("ptpt {} -> group {} (corr={:?})", pid, stat.group_id, stat.group_correlation);
    }
    Ok(())
}
