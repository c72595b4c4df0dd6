mod backfill;
mod config;
mod error;
mod git;
mod ledger;
mod report;
mod reporters;
mod types;

use backfill::{Backfill, BackfillOptions, BackfillOutcome};
use chrono::{Local, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use config::TrendConfig;
use error::{Result, TrendError};
use git::repo::GitRepo;
use indicatif::{ProgressBar, ProgressStyle};
use ledger::hub::{HubStore, RepoType};
use ledger::{LedgerStore, LocalStore};
use report::cloc::{line_count_fields, Cloc};
use report::scanner::ScannerCommand;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_BRANCH: &str = "main";
const DEFAULT_SRC_SUBDIR: &str = "src";
const DEFAULT_REPORT_NAME: &str = "result.json";
const DEFAULT_HUB_FILE: &str = "metrics.csv";

#[derive(Parser, Debug)]
#[command(
    name = "quality-trend",
    about = "📈 Track code-quality metrics across a repository's history",
    version,
    long_about = "Summarizes a scanner's per-file quality report into one dated row of\n\
                  statistics, appends it to a CSV ledger, and can replay a branch's\n\
                  history month by month to backfill the whole series."
)]
struct Cli {
    /// YAML config file (defaults to .quality-trend.yml when present)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG still wins when set)
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Print an annotated config template, or write it to FILE, and exit
    #[arg(long, value_name = "FILE", num_args = 0..=1)]
    generate_config: Option<Option<PathBuf>>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Aggregate one report and print it or append it to a ledger
    Analyze(AnalyzeArgs),
    /// Sample a branch monthly, scan each snapshot and emit the time series
    Backfill(BackfillArgs),
}

#[derive(clap::Args, Debug)]
struct AnalyzeArgs {
    /// JSON report produced by the scanner
    #[arg(value_name = "REPORT")]
    report: PathBuf,

    /// Source directory passed to cloc for line counts
    #[arg(long, default_value = ".")]
    src_path: PathBuf,

    /// Date for the record, YYYY-MM-DD (default: today, UTC)
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Append to a local ledger CSV instead of printing
    #[arg(long, conflicts_with = "hub_repo")]
    ledger: Option<PathBuf>,

    #[command(flatten)]
    hub: HubArgs,
}

#[derive(clap::Args, Debug)]
struct HubArgs {
    /// Hub repository id, e.g. "owner/space-name"
    #[arg(long)]
    hub_repo: Option<String>,

    /// Path of the CSV inside the hub repository
    #[arg(long)]
    hub_file: Option<String>,

    /// Hub branch to read and commit to
    #[arg(long)]
    hub_branch: Option<String>,

    #[arg(long, value_enum)]
    hub_repo_type: Option<RepoType>,

    /// Access token (otherwise HF_TOKEN or the huggingface-cli token file)
    #[arg(long)]
    hub_token: Option<String>,
}

#[derive(clap::Args, Debug)]
struct BackfillArgs {
    /// Git repository to replay
    #[arg(long)]
    repo: PathBuf,

    #[arg(long)]
    branch: Option<String>,

    /// Directory inside the repository to scan
    #[arg(long)]
    src_subdir: Option<String>,

    /// Walk at most this many months back from the current month
    #[arg(long)]
    max_months: Option<usize>,

    /// File name the scanner writes each report to
    #[arg(long)]
    report_name: Option<String>,

    /// Scanner program (default: python)
    #[arg(long)]
    scanner: Option<String>,

    /// Scanner argument placed before the source path; repeatable (default: main.py)
    #[arg(long = "scanner-arg", allow_hyphen_values = true)]
    scanner_args: Vec<String>,

    /// Directory the scanner runs in (default: current directory)
    #[arg(long)]
    analyzer_dir: Option<PathBuf>,

    /// Kill the scanner after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Output file (stdout when omitted; ignored for terminal)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Also append the collected records to this ledger CSV
    #[arg(long)]
    ledger: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Csv,
    Json,
    Terminal,
}

impl OutputFormat {
    fn from_config(value: &str) -> Option<Self> {
        OutputFormat::from_str(value, true).ok()
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli) {
        error!(error = %err, "command failed");
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            error!(cause = %cause, "caused by");
            source = cause.source();
        }
        std::process::exit(err.exit_code());
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    if let Some(path) = &cli.generate_config {
        return config::print_template(path.as_deref());
    }

    let cfg = config::discover_config(cli.config.as_deref())?;
    match cli.command {
        Some(Command::Analyze(args)) => run_analyze(args, &cfg),
        Some(Command::Backfill(args)) => run_backfill(args, &cfg),
        None => Err(TrendError::Configuration(
            "no command given: use `analyze`, `backfill` or --generate-config (see --help)".into(),
        )),
    }
}

// ── Single report ──────────────────────────────────────────────────────────────

fn run_analyze(args: AnalyzeArgs, cfg: &TrendConfig) -> Result<()> {
    let rows = report::flatten::load_rows(&args.report)?;
    let date = args.date.unwrap_or_else(|| Utc::now().date_naive());
    let mut record = report::aggregate::aggregate(&rows, date)?;
    record.extend(line_count_fields(&cloc_from(cfg), &args.src_path));
    info!(report = %args.report.display(), rows = rows.len(), date = %date, "report aggregated");

    // An explicit --ledger beats a hub configured in the file.
    if args.ledger.is_none() {
        if let Some(store) = hub_store(&args.hub, cfg)? {
            let sha = ledger::append_record(&store, &record)?;
            println!("Updated {}. Commit: {sha}", store.describe());
            return Ok(());
        }
    }

    if let Some(path) = args.ledger.clone().or_else(|| cfg.ledger.as_ref().map(PathBuf::from)) {
        let store = LocalStore::new(path);
        ledger::append_record(&store, &record)?;
        eprintln!("✓ Appended {} to {}", record.date, store.describe());
        return Ok(());
    }

    reporters::csv::report_csv(std::slice::from_ref(&record), None)
}

fn hub_store(args: &HubArgs, cfg: &TrendConfig) -> Result<Option<HubStore>> {
    let hub_cfg = cfg.hub.as_ref();
    let Some(repo) = args.hub_repo.clone().or_else(|| hub_cfg.and_then(|h| h.repo.clone())) else {
        return Ok(None);
    };
    let file = args
        .hub_file
        .clone()
        .or_else(|| hub_cfg.and_then(|h| h.file.clone()))
        .unwrap_or_else(|| DEFAULT_HUB_FILE.to_string());
    let branch = args
        .hub_branch
        .clone()
        .or_else(|| hub_cfg.and_then(|h| h.branch.clone()))
        .unwrap_or_else(|| DEFAULT_BRANCH.to_string());
    let repo_type = args
        .hub_repo_type
        .or_else(|| hub_cfg.and_then(|h| h.repo_type))
        .unwrap_or_default();

    let mut store = HubStore::new(&repo, repo_type, &file, &branch)?
        .with_token(config::resolve_hub_token(args.hub_token.as_deref()));
    if let Some(endpoint) = hub_cfg.and_then(|h| h.endpoint.as_deref()) {
        store = store.with_endpoint(endpoint);
    }
    Ok(Some(store))
}

fn cloc_from(cfg: &TrendConfig) -> Cloc {
    let defaults = Cloc::default();
    let section = cfg.cloc.as_ref();
    Cloc {
        program: section.and_then(|c| c.program.clone()).unwrap_or(defaults.program),
        language: section.and_then(|c| c.language.clone()).unwrap_or(defaults.language),
    }
}

// ── History backfill ───────────────────────────────────────────────────────────

fn run_backfill(args: BackfillArgs, cfg: &TrendConfig) -> Result<()> {
    let total_start = Instant::now();

    let repo_root = std::fs::canonicalize(&args.repo).map_err(|e| {
        TrendError::Configuration(format!("repository path {}: {e}", args.repo.display()))
    })?;
    let repo = GitRepo::open(&repo_root)?;

    let scanner = scanner_from(&args, cfg);
    scanner.check()?;
    let cloc = cloc_from(cfg);

    let src_subdir = args
        .src_subdir
        .clone()
        .or_else(|| cfg.src_subdir.clone())
        .unwrap_or_else(|| DEFAULT_SRC_SUBDIR.to_string());
    let options = BackfillOptions {
        branch: args.branch.clone().or_else(|| cfg.branch.clone()).unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
        source_dir: repo.root().join(src_subdir),
        max_months: args.max_months.or(cfg.max_months),
        today: Local::now().date_naive(),
        report_name: args
            .report_name
            .clone()
            .or_else(|| cfg.report_name.clone())
            .unwrap_or_else(|| DEFAULT_REPORT_NAME.to_string()),
    };
    let format = args
        .format
        .or_else(|| cfg.format.as_deref().and_then(OutputFormat::from_config))
        .unwrap_or(OutputFormat::Csv);

    let BackfillOutcome { records, aborted } = Backfill::new(&repo, &scanner, &cloc)
        .with_progress(progress_bar())
        .run(&options)?;
    if aborted.is_some() {
        eprintln!("⚠ Backfill stopped early; keeping the {} snapshot(s) collected so far", records.len());
    }

    eprintln!(
        "✔ [{}] {} snapshot{} on {} ⏱ {}",
        repo_root.file_name().and_then(|n| n.to_str()).unwrap_or("repo"),
        records.len(),
        if records.len() != 1 { "s" } else { "" },
        options.branch,
        fmt_dur(total_start.elapsed()),
    );

    let output = args.output.as_deref();
    match format {
        OutputFormat::Csv => reporters::csv::report_csv(&records, output)?,
        OutputFormat::Json => reporters::json::report_json(&records, output)?,
        OutputFormat::Terminal => reporters::terminal::report_terminal(&records),
    }

    if let Some(path) = args.ledger.clone().or_else(|| cfg.ledger.as_ref().map(PathBuf::from)) {
        if !records.is_empty() {
            let store = LocalStore::new(path);
            let message = format!("Backfill {} snapshots on {}", records.len(), options.branch);
            ledger::append_records(&store, &records, &message)?;
            eprintln!("✓ Appended {} rows to {}", records.len(), store.describe());
        }
    }
    aborted.map_or(Ok(()), Err)
}

fn scanner_from(args: &BackfillArgs, cfg: &TrendConfig) -> ScannerCommand {
    let section = cfg.scanner.as_ref();
    let scanner_args = if args.scanner_args.is_empty() {
        section
            .and_then(|s| s.args.clone())
            .unwrap_or_else(|| vec!["main.py".to_string()])
    } else {
        args.scanner_args.clone()
    };
    ScannerCommand {
        program: args
            .scanner
            .clone()
            .or_else(|| section.and_then(|s| s.program.clone()))
            .unwrap_or_else(|| "python".to_string()),
        args: scanner_args,
        working_dir: Some(
            args.analyzer_dir
                .clone()
                .or_else(|| section.and_then(|s| s.working_dir.clone()))
                .unwrap_or_else(|| PathBuf::from(".")),
        ),
        timeout: args
            .timeout_secs
            .or_else(|| section.and_then(|s| s.timeout_secs))
            .map(Duration::from_secs),
    }
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    let style = ProgressStyle::with_template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
        .map(|s| s.progress_chars("█▉ "))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

// ── Duration formatting ────────────────────────────────────────────────────────

fn fmt_dur(d: Duration) -> String {
    let ms = d.as_millis();
    if ms >= 1000 { format!("{:.1}s", d.as_secs_f64()) } else { format!("{ms}ms") }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
