use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use sessionizer::{
    CompactTimeline, GapThreshold, HourglassConfig, HoursReport, InstantSet, SessionSpan,
    TimestampKeys, aggregate, compact, parse_document, sessions,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "hourglass",
    about = "Estimate active time from JSON or NDJSON event logs"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct InputArgs {
    /// JSON or NDJSON file to read (`-` for stdin)
    input: PathBuf,
    /// Idle minutes that end a session (default: $HOURGLASS_GAP_MINUTES or 30)
    #[arg(long)]
    gap_minutes: Option<i64>,
    /// Comma separated timestamp field names, replacing the defaults
    #[arg(long, value_delimiter = ',')]
    keys: Option<Vec<String>>,
    /// Maximum container nesting depth before the input is rejected
    #[arg(long)]
    max_depth: Option<usize>,
    /// Pretty-print the JSON output
    #[arg(long, default_value_t = false)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print total active hours, session count and first/last timestamps
    Summarize {
        #[command(flatten)]
        input: InputArgs,
        /// Also list every session
        #[arg(long, default_value_t = false)]
        sessions: bool,
    },
    /// Print the capped timestamp list used for delegated estimates
    Compact {
        #[command(flatten)]
        input: InputArgs,
        /// Maximum number of timestamps to keep (default: $HOURGLASS_SAMPLE_CAP or 1000)
        #[arg(long)]
        cap: Option<usize>,
    },
}

#[derive(Debug, Serialize)]
struct SummaryOutput {
    #[serde(flatten)]
    report: HoursReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    sessions: Option<Vec<SessionSpan>>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let base = HourglassConfig::from_env().context("read hourglass config")?;

    let (output, pretty) = match cli.command {
        Commands::Summarize { input, sessions } => (
            serde_json::to_value(summarize(&input, &base, sessions)?)?,
            input.pretty,
        ),
        Commands::Compact { input, cap } => (
            serde_json::to_value(compact_timeline(&input, &base, cap)?)?,
            input.pretty,
        ),
    };
    print_json(&output, pretty)
}

/// Flags override whatever the environment configured.
fn resolve_config(args: &InputArgs, base: &HourglassConfig) -> Result<HourglassConfig> {
    let mut config = base.clone();
    if let Some(minutes) = args.gap_minutes {
        config.gap = GapThreshold::from_minutes(minutes).context("invalid --gap-minutes")?;
    }
    if let Some(keys) = &args.keys {
        config.timestamp_keys = TimestampKeys::new(keys);
    }
    if let Some(depth) = args.max_depth {
        config.max_depth = depth;
    }
    Ok(config)
}

fn load_instants(args: &InputArgs, config: &HourglassConfig) -> Result<InstantSet> {
    let raw = read_input(&args.input)?;
    let document =
        parse_document(&raw).with_context(|| format!("parse {}", args.input.display()))?;
    let instants = config
        .extractor()
        .extract(&document)
        .with_context(|| format!("scan {}", args.input.display()))?;
    debug!(events = instants.len(), "loaded instants");
    Ok(instants)
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        return io::read_to_string(io::stdin()).context("read stdin");
    }
    std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}

fn summarize(
    args: &InputArgs,
    base: &HourglassConfig,
    list_sessions: bool,
) -> Result<SummaryOutput> {
    let config = resolve_config(args, base)?;
    let instants = load_instants(args, &config)?;
    let summary = aggregate(&instants, config.gap);
    Ok(SummaryOutput {
        report: summary.to_report(),
        sessions: list_sessions.then(|| sessions(&instants, config.gap).collect()),
    })
}

fn compact_timeline(
    args: &InputArgs,
    base: &HourglassConfig,
    cap: Option<usize>,
) -> Result<CompactTimeline> {
    let config = resolve_config(args, base)?;
    let instants = load_instants(args, &config)?;
    compact(&instants, config.gap, cap.unwrap_or(config.sample_cap)).context("invalid --cap")
}

fn print_json(value: &Value, pretty: bool) -> Result<()> {
    let mut stdout = io::stdout().lock();
    if pretty {
        serde_json::to_writer_pretty(&mut stdout, value)?;
    } else {
        serde_json::to_writer(&mut stdout, value)?;
    }
    writeln!(stdout)?;
    Ok(())
}
