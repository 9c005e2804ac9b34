use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::PathBuf;
use tracing::Level;

use ytbulk::config::Config;
use ytbulk::engine::auditor::{self, LinkAuditor, LinkStatus};
use ytbulk::engine::ledger::BackupLedger;
use ytbulk::engine::matcher::{self, MatchResult};
use ytbulk::engine::mutator::{
    ApplyPlan, BulkMutator, BulkReport, MutationStatus, MutatorConfig, QuotaBudget,
};
use ytbulk::engine::pager::ResourcePager;
use ytbulk::youtube::client::YouTubeClient;

/// Bulk find/replace for YouTube video descriptions
#[derive(Parser, Debug)]
#[command(name = "ytbulk", version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off")]
    log_level: LogLevel,

    /// Backup ledger file (overrides the configured location)
    #[arg(long)]
    backup_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Preview which videos match a pattern and how they would change
    Search {
        /// Exact text to search for
        #[arg(long)]
        find: String,
        /// Replacement text
        #[arg(long, default_value = "")]
        replace: String,
        /// Match without ASCII case sensitivity
        #[arg(long)]
        ignore_case: bool,
        /// Print the full before/after text for each match
        #[arg(long)]
        preview: bool,
    },
    /// Apply the replacement to matching videos (backups are taken first)
    Apply {
        #[arg(long)]
        find: String,
        #[arg(long, default_value = "")]
        replace: String,
        #[arg(long)]
        ignore_case: bool,
        /// Restrict the run to these video ids (repeatable)
        #[arg(long = "video")]
        videos: Vec<String>,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Restore videos to their most recent backed-up description
    Restore {
        /// Video ids to restore
        video_ids: Vec<String>,
        #[arg(long)]
        yes: bool,
    },
    /// Show backed-up snapshots (all videos, or one video's history)
    History {
        video_id: Option<String>,
    },
    /// Delete every backup for a video
    Prune {
        video_id: String,
        #[arg(long)]
        yes: bool,
    },
    /// Probe every link in every description and report liveness
    Audit {
        /// Write the CSV report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .expect("Failed to open log file");

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("ytbulk started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("ytbulk").join("ytbulk.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".ytbulk").join("ytbulk.log");
    }
    PathBuf::from("ytbulk.log")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    let config = Config::load();
    let backup_path = config.effective_backup_file(args.backup_file.as_ref());

    match args.command {
        Command::Search {
            find,
            replace,
            ignore_case,
            preview,
        } => cmd_search(&find, &replace, !ignore_case, preview).await,
        Command::Apply {
            find,
            replace,
            ignore_case,
            videos,
            yes,
        } => cmd_apply(&config, &backup_path, &find, &replace, !ignore_case, &videos, yes).await,
        Command::Restore { video_ids, yes } => {
            cmd_restore(&config, &backup_path, &video_ids, yes).await
        }
        Command::History { video_id } => cmd_history(&backup_path, video_id.as_deref()),
        Command::Prune { video_id, yes } => cmd_prune(&backup_path, &video_id, yes),
        Command::Audit { output } => cmd_audit(&config, output.as_deref()).await,
    }
}

/// Fetch the channel listing and compute proposed changes
async fn find_channel_matches(
    find: &str,
    replace: &str,
    case_sensitive: bool,
) -> Result<(YouTubeClient, Vec<MatchResult>, usize)> {
    let client = YouTubeClient::new().await?;
    let pager = ResourcePager::new(client.clone());

    eprintln!("Fetching channel videos...");
    let videos = pager.fetch_all().await?;
    eprintln!(
        "Fetched {} videos ({} quota units for listing)",
        videos.len(),
        pager.units_consumed()
    );

    let matches = matcher::find_matches(&videos, find, replace, case_sensitive)?;
    Ok((client, matches, videos.len()))
}

async fn cmd_search(find: &str, replace: &str, case_sensitive: bool, preview: bool) -> Result<()> {
    let (_, matches, total) = find_channel_matches(find, replace, case_sensitive).await?;

    if matches.is_empty() {
        println!("No videos match the pattern (out of {total} scanned).");
        return Ok(());
    }

    println!("{} of {} videos match:", matches.len(), total);
    println!("{:<16} {:>7}  TITLE", "VIDEO ID", "MATCHES");
    for m in &matches {
        println!("{:<16} {:>7}  {}", m.video_id, m.match_count, m.title);
    }

    if preview {
        for m in &matches {
            println!("\n=== {} ({}) ===", m.title, m.video_id);
            println!("--- current ---\n{}", m.original_description);
            println!("--- proposed ---\n{}", m.proposed_description);
        }
    }

    Ok(())
}

async fn cmd_apply(
    config: &Config,
    backup_path: &std::path::Path,
    find: &str,
    replace: &str,
    case_sensitive: bool,
    only_videos: &[String],
    yes: bool,
) -> Result<()> {
    let (client, mut matches, total) = find_channel_matches(find, replace, case_sensitive).await?;

    if !only_videos.is_empty() {
        matches.retain(|m| only_videos.contains(&m.video_id));
    }

    if matches.is_empty() {
        println!("Nothing to apply (out of {total} videos scanned).");
        return Ok(());
    }

    println!("About to update {} video(s):", matches.len());
    for m in &matches {
        println!("  {:<16} {:>3} match(es)  {}", m.video_id, m.match_count, m.title);
    }

    if !yes && !confirm("Proceed? Backups are written before each update.")? {
        println!("Aborted.");
        return Ok(());
    }

    let ledger = BackupLedger::open(backup_path)?;
    let mutator_config = MutatorConfig {
        writes_per_minute: config.effective_writes_per_minute(),
        concurrency: config.effective_concurrency(),
        ..Default::default()
    };
    let mutator = BulkMutator::new(&client, &ledger, mutator_config);
    wire_ctrl_c(&mutator);

    let plan = ApplyPlan {
        pattern: find.to_string(),
        replacement: replace.to_string(),
        case_sensitive,
        selected: matches,
    };
    let budget = QuotaBudget::new(config.effective_quota_units());

    let report = mutator.apply(&plan, budget).await;
    print_report(&report);

    Ok(())
}

async fn cmd_restore(
    config: &Config,
    backup_path: &std::path::Path,
    video_ids: &[String],
    yes: bool,
) -> Result<()> {
    if video_ids.is_empty() {
        anyhow::bail!("no video ids given; run 'ytbulk history' to list backed-up videos");
    }

    if !yes && !confirm(&format!("Restore {} video(s) to their latest backup?", video_ids.len()))? {
        println!("Aborted.");
        return Ok(());
    }

    let client = YouTubeClient::new().await?;
    let ledger = BackupLedger::open(backup_path)?;
    let mutator_config = MutatorConfig {
        writes_per_minute: config.effective_writes_per_minute(),
        concurrency: config.effective_concurrency(),
        ..Default::default()
    };
    let mutator = BulkMutator::new(&client, &ledger, mutator_config);
    wire_ctrl_c(&mutator);

    let budget = QuotaBudget::new(config.effective_quota_units());
    let report = mutator.restore(video_ids, budget).await;
    print_report(&report);

    Ok(())
}

fn cmd_history(backup_path: &std::path::Path, video_id: Option<&str>) -> Result<()> {
    let ledger = BackupLedger::open(backup_path)?;

    match video_id {
        Some(id) => {
            let history = ledger.history(id);
            if history.is_empty() {
                println!("No backups recorded for {id}.");
                return Ok(());
            }
            println!("{} snapshot(s) for {id}, newest first:", history.len());
            for entry in history {
                println!(
                    "  {}  {}",
                    entry.timestamp.to_rfc3339(),
                    one_line_preview(&entry.description)
                );
            }
        }
        None => {
            let ids = ledger.video_ids();
            if ids.is_empty() {
                println!("No backups recorded.");
                return Ok(());
            }
            println!("{:<16} {:>9}  LAST BACKED UP", "VIDEO ID", "SNAPSHOTS");
            for id in ids {
                let history = ledger.history(&id);
                let latest = history.first().map(|e| e.timestamp.to_rfc3339());
                println!(
                    "{:<16} {:>9}  {}",
                    id,
                    history.len(),
                    latest.unwrap_or_default()
                );
            }
        }
    }

    Ok(())
}

fn cmd_prune(backup_path: &std::path::Path, video_id: &str, yes: bool) -> Result<()> {
    if !yes && !confirm(&format!("Delete ALL backups for {video_id}? This cannot be undone."))? {
        println!("Aborted.");
        return Ok(());
    }

    let ledger = BackupLedger::open(backup_path)?;
    let removed = ledger.prune(video_id)?;
    println!("Removed {removed} snapshot(s) for {video_id}.");
    Ok(())
}

async fn cmd_audit(config: &Config, output: Option<&std::path::Path>) -> Result<()> {
    let client = YouTubeClient::new().await?;
    let pager = ResourcePager::new(client);

    eprintln!("Fetching channel videos...");
    let videos = pager.fetch_all().await?;

    let auditor = LinkAuditor::with_timeout(
        config.effective_probe_timeout(),
        config.effective_concurrency().max(8),
    )?;
    eprintln!("Probing links in {} descriptions...", videos.len());
    let results = auditor.audit_all(&videos).await;

    let alive = results.iter().filter(|r| r.status == LinkStatus::Alive).count();
    let broken = results.iter().filter(|r| r.status == LinkStatus::Broken).count();
    let unknown = results.len() - alive - broken;
    eprintln!("{} link(s): {alive} alive, {broken} broken, {unknown} unknown", results.len());

    let csv = auditor::to_csv(&results);
    match output {
        Some(path) => {
            std::fs::write(path, csv)?;
            eprintln!("Report written to {}", path.display());
        }
        None => print!("{csv}"),
    }

    Ok(())
}

/// Cancel the run on Ctrl-C; in-flight items finish, the rest are skipped
fn wire_ctrl_c(mutator: &BulkMutator<'_>) {
    let cancel = mutator.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling... in-flight updates will finish.");
            cancel.cancel();
        }
    });
}

fn print_report(report: &BulkReport) {
    println!("\nRun {}:", report.run_id);
    for outcome in &report.outcomes {
        match outcome.status {
            MutationStatus::Applied => println!("  applied  {}", outcome.video_id),
            MutationStatus::Skipped => println!("  skipped  {}", outcome.video_id),
            MutationStatus::Failed => println!(
                "  FAILED   {}  ({})",
                outcome.video_id,
                outcome
                    .error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "unknown error".to_string())
            ),
        }
    }
    println!(
        "{} applied, {} failed, {} skipped; {} quota units left",
        report.count(MutationStatus::Applied),
        report.count(MutationStatus::Failed),
        report.count(MutationStatus::Skipped),
        report.budget.remaining()
    );
    if report.halted {
        println!("Run halted early; remaining items were skipped. Try again in a new session.");
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N] ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}

fn one_line_preview(text: &str) -> String {
    let flat: String = text.chars().map(|c| if c == '\n' { ' ' } else { c }).collect();
    if flat.chars().count() > 72 {
        let truncated: String = flat.chars().take(72).collect();
        format!("{truncated}...")
    } else {
        flat
    }
}
