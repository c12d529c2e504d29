//! # CLI Module
//!
//! Command-line interface for the gallery engine.
//!
//! ## Usage
//! ```bash
//! # Fingerprint a folder (only changed files are read again)
//! gallery-keeper scan ~/Pictures
//!
//! # Show duplicate groups
//! gallery-keeper groups --threshold 4
//!
//! # Soft-delete a photo, then bring it back
//! gallery-keeper quarantine ~/Pictures/IMG_0001.jpg
//! gallery-keeper restore ~/Pictures/IMG_0001.jpg
//!
//! # Drop expired backups
//! gallery-keeper purge
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use console::{style, Term};
use gallery_keeper::config::EngineConfig;
use gallery_keeper::core::grouping::{DuplicateGroup, DuplicateGrouper};
use gallery_keeper::core::media::{
    identifier_for, AutoConfirm, DeletionConfirmation, FsCollection, FsRestoreTarget,
    PromptConfirm,
};
use gallery_keeper::core::quarantine::{PurgeScheduler, QuarantineManager};
use gallery_keeper::core::scan::{CancellationToken, ScanDriver, ScanReport, ScanStatus};
use gallery_keeper::core::store::{AssetStore, GalleryStore, QuarantineStore, SqliteStore};
use gallery_keeper::error::{QuarantineError, Result};
use gallery_keeper::events::ScanEvent;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Gallery Keeper - find duplicates, delete without fear
#[derive(Parser, Debug)]
#[command(name = "gallery-keeper")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Database path
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Directory holding quarantined files
    #[arg(long, global = true)]
    backup_dir: Option<PathBuf>,

    /// JSON engine configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fingerprint every image under a directory
    Scan {
        root: PathBuf,

        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,
    },
    /// Show duplicate groups from the last scan
    Groups {
        /// Near-duplicate threshold (0-64, lower = stricter)
        #[arg(short, long)]
        threshold: Option<u32>,

        /// Include assets that matched nothing
        #[arg(long)]
        all: bool,

        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,
    },
    /// Back up a file and delete the original
    Quarantine {
        path: PathBuf,

        /// Delete without asking
        #[arg(short, long)]
        yes: bool,
    },
    /// Restore a quarantined file
    Restore {
        /// Path the file had before it was quarantined
        original: String,

        /// Directory to restore into (defaults to the original directory)
        #[arg(long)]
        to: Option<PathBuf>,
    },
    /// Delete expired quarantine backups
    Purge {
        /// Keep running and purge periodically until Enter is pressed
        #[arg(long)]
        watch: bool,
    },
    /// Show the most recently scanned assets
    Recent {
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Show store and quarantine counts
    Status,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
}

/// Everything a command needs
struct Context {
    config: EngineConfig,
    store: Arc<SqliteStore>,
    backup_dir: PathBuf,
    verbose: bool,
    term: Term,
}

impl Context {
    fn quarantine(&self) -> QuarantineManager<SqliteStore> {
        QuarantineManager::new(Arc::clone(&self.store), &self.backup_dir, &self.config)
    }
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    gallery_keeper::init_tracing_with_default(if cli.verbose { "debug" } else { "info" });

    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gallery-keeper");

    let config = EngineConfig::load_or_default(cli.config.as_deref())?;
    let db_path = cli.db.unwrap_or_else(|| data_dir.join("gallery.db"));
    let store = Arc::new(SqliteStore::open(&db_path)?);

    let ctx = Context {
        config,
        store,
        backup_dir: cli.backup_dir.unwrap_or_else(|| data_dir.join("quarantine")),
        verbose: cli.verbose,
        term: Term::stderr(),
    };

    match cli.command {
        Commands::Scan { root, output } => run_scan(&ctx, &root, output),
        Commands::Groups {
            threshold,
            all,
            output,
        } => run_groups(&ctx, threshold, all, output),
        Commands::Quarantine { path, yes } => run_quarantine(&ctx, &path, yes),
        Commands::Restore { original, to } => run_restore(&ctx, &original, to),
        Commands::Purge { watch } => run_purge(&ctx, watch),
        Commands::Recent { limit } => run_recent(&ctx, limit),
        Commands::Status => run_status(&ctx),
    }
}

fn run_scan(ctx: &Context, root: &Path, output: OutputFormat) -> Result<()> {
    let term = &ctx.term;
    if matches!(output, OutputFormat::Pretty) {
        term.write_line(&format!(
            "{} {}",
            style("Gallery Keeper").bold().cyan(),
            style(format!("v{}", env!("CARGO_PKG_VERSION"))).dim()
        ))
        .ok();
        term.write_line("").ok();
    }

    let collection = FsCollection::new(root);
    let driver = ScanDriver::builder(Arc::clone(&ctx.store))
        .config(ctx.config.clone())
        .build();

    let progress = matches!(output, OutputFormat::Pretty).then(|| {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .map(|s| s.progress_chars("█▓░"))
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        pb
    });

    let subscription = driver.broadcaster().subscribe();
    let progress_clone = progress.clone();
    let verbose = ctx.verbose;

    // Handle events in a separate thread
    let event_thread = thread::spawn(move || {
        for event in subscription.iter() {
            let Some(pb) = progress_clone.as_ref() else {
                continue;
            };
            match event {
                ScanEvent::Started { total } => pb.set_length(total as u64),
                ScanEvent::Item(outcome) => {
                    pb.set_position(outcome.index as u64);
                    if let Some(error) = &outcome.error {
                        pb.println(format!("{} {}", style("!").yellow(), error));
                    } else if verbose {
                        pb.set_message(format!(
                            "{} ({})",
                            outcome.display_name.as_deref().unwrap_or(&outcome.identifier),
                            outcome.decision
                        ));
                    }
                }
                ScanEvent::Completed(_) | ScanEvent::Cancelled(_) | ScanEvent::Failed { .. } => {
                    pb.finish_and_clear()
                }
            }
        }
    });

    let result = driver.run(&collection, &collection, &CancellationToken::new(), |_| {});

    // Close the broadcast to signal the event thread to finish
    driver.broadcaster().close();
    event_thread.join().ok();

    let report = result?;
    match output {
        OutputFormat::Pretty => print_scan_report(term, &report),
        OutputFormat::Json => print_json(&serde_json::json!({
            "status": report.status,
            "summary": report.summary,
        })),
    }
    Ok(())
}

fn print_scan_report(term: &Term, report: &ScanReport) {
    let summary = &report.summary;
    let headline = match report.status {
        ScanStatus::Completed => format!("{} Scan Complete", style("✓").green().bold()),
        ScanStatus::Cancelled => format!("{} Scan Cancelled", style("✗").yellow().bold()),
        ScanStatus::AlreadyRunning => format!("{} Scan already running", style("…").dim()),
    };

    term.write_line(&headline).ok();
    term.write_line("").ok();
    term.write_line(&format!(
        "  {} assets visited in {:.1}s",
        style(summary.visited).cyan(),
        summary.duration_ms as f64 / 1000.0
    ))
    .ok();
    term.write_line(&format!(
        "  {} fingerprinted, {} unchanged",
        style(summary.processed).cyan(),
        style(summary.reused).dim()
    ))
    .ok();
    if summary.failed > 0 {
        term.write_line(&format!(
            "  {} could not be read",
            style(summary.failed).yellow()
        ))
        .ok();
    }
    if summary.removed > 0 {
        term.write_line(&format!(
            "  {} records for deleted files removed",
            style(summary.removed).dim()
        ))
        .ok();
    }
}

fn run_groups(
    ctx: &Context,
    threshold: Option<u32>,
    all: bool,
    output: OutputFormat,
) -> Result<()> {
    let grouper = DuplicateGrouper::new(threshold.unwrap_or(ctx.config.near_duplicate_threshold));
    let groups: Vec<DuplicateGroup> = grouper
        .group(&ctx.store.all()?)
        .into_iter()
        .filter(|g| all || g.is_duplicate_set)
        .collect();

    match output {
        OutputFormat::Pretty => print_groups(&ctx.term, &groups),
        OutputFormat::Json => print_json(&groups),
    }
    Ok(())
}

fn print_groups(term: &Term, groups: &[DuplicateGroup]) {
    if groups.is_empty() {
        term.write_line(&format!("  {} No duplicates found!", style("🎉").green()))
            .ok();
        return;
    }

    let savings: u64 = groups.iter().map(DuplicateGroup::reclaimable_bytes).sum();
    term.write_line(&format!(
        "{} ({} groups, {} reclaimable)",
        style("Duplicate Groups:").bold().underlined(),
        groups.len(),
        style(format_bytes(savings)).yellow()
    ))
    .ok();
    term.write_line("").ok();

    for (i, group) in groups.iter().enumerate() {
        term.write_line(&format!(
            "  {} {} ({} assets, {})",
            style(format!("Group {}:", i + 1)).bold(),
            style(group.kind).yellow(),
            group.len(),
            format_bytes(group.reclaimable_bytes())
        ))
        .ok();

        for (idx, asset) in group.assets.iter().enumerate() {
            let marker = if idx == 0 {
                style("★").green().to_string()
            } else {
                style("○").dim().to_string()
            };
            let blurry = if asset.is_blurry == Some(true) {
                style(" (blurry)").dim().to_string()
            } else {
                String::new()
            };
            term.write_line(&format!(
                "    {} {}{}",
                marker,
                display_path(&asset.identifier),
                blurry
            ))
            .ok();
        }
        term.write_line("").ok();
    }

    term.write_line(&format!(
        "{}",
        style("Nothing was deleted. Use `quarantine` to remove a file safely.").dim()
    ))
    .ok();
}

fn run_quarantine(ctx: &Context, path: &Path, yes: bool) -> Result<()> {
    // Must match the identifier the scan stored
    let identifier = identifier_for(path)?;
    let resolved = Path::new(&identifier);
    let display_name = resolved
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| identifier.clone());
    let media = FsCollection::new(resolved.parent().unwrap_or_else(|| Path::new(".")));

    let confirmation: Box<dyn DeletionConfirmation> = if yes {
        Box::new(AutoConfirm)
    } else {
        Box::new(PromptConfirm::new())
    };

    let manager = ctx.quarantine();
    match manager.quarantine_with_confirmation(
        &media,
        confirmation.as_ref(),
        &identifier,
        &display_name,
    ) {
        Ok(record) => {
            ctx.term
                .write_line(&format!(
                    "{} Quarantined {} until {}",
                    style("✓").green().bold(),
                    display_path(&record.original_identifier),
                    format_millis(record.expires_at)
                ))
                .ok();
            Ok(())
        }
        Err(QuarantineError::ConfirmationDenied { .. }) => {
            ctx.term
                .write_line(&format!("{} Kept {}", style("○").dim(), display_path(&identifier)))
                .ok();
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn run_restore(ctx: &Context, original: &str, to: Option<PathBuf>) -> Result<()> {
    let original = identifier_for(Path::new(original))?;
    let original = original.as_str();
    let directory = to.unwrap_or_else(|| {
        Path::new(original)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    });

    let restored = ctx
        .quarantine()
        .restore(original, &FsRestoreTarget::new(directory))?;

    ctx.term
        .write_line(&format!(
            "{} Restored {}",
            style("✓").green().bold(),
            display_path(&restored)
        ))
        .ok();
    Ok(())
}

fn run_purge(ctx: &Context, watch: bool) -> Result<()> {
    let manager = Arc::new(ctx.quarantine());

    if watch {
        let interval = Duration::from_secs(ctx.config.purge_interval_secs);
        let scheduler = PurgeScheduler::start(Arc::clone(&manager), interval);
        ctx.term
            .write_line(&format!(
                "Purging every {}s. Press Enter to stop.",
                interval.as_secs()
            ))
            .ok();
        ctx.term.read_line().ok();
        scheduler.stop();
        return Ok(());
    }

    let report = manager.purge_expired(chrono::Utc::now().timestamp_millis())?;
    ctx.term
        .write_line(&format!(
            "{} Purged {} expired backups",
            style("✓").green().bold(),
            style(report.records_purged).cyan()
        ))
        .ok();
    if report.orphans_removed > 0 {
        ctx.term
            .write_line(&format!(
                "  {} orphaned files removed",
                style(report.orphans_removed).dim()
            ))
            .ok();
    }
    if report.files_failed > 0 {
        ctx.term
            .write_line(&format!(
                "  {} files could not be deleted and will be retried",
                style(report.files_failed).yellow()
            ))
            .ok();
    }
    Ok(())
}

fn run_recent(ctx: &Context, limit: usize) -> Result<()> {
    let records = ctx.store.recent(limit)?;
    if records.is_empty() {
        ctx.term.write_line("Nothing scanned yet.").ok();
        return Ok(());
    }

    for record in records {
        let sharpness = record
            .sharpness
            .map(|s| format!("{s:>8.1}"))
            .unwrap_or_else(|| format!("{:>8}", "-"));
        let marker = if record.is_blurry == Some(true) {
            style("blurry").yellow().to_string()
        } else {
            style("sharp ").dim().to_string()
        };
        println!(
            "{}  {}  {}  {}",
            style(format_millis(record.last_scanned_at)).dim(),
            sharpness,
            marker,
            display_path(&record.identifier)
        );
    }
    Ok(())
}

fn run_status(ctx: &Context) -> Result<()> {
    let stats = ctx.store.stats()?;
    let quarantined = ctx.store.list()?;
    let term = &ctx.term;

    term.write_line(&format!("{}", style("Gallery Keeper").bold().cyan()))
        .ok();
    term.write_line(&format!(
        "  database     {}",
        style(ctx.store.path().display()).dim()
    ))
    .ok();
    term.write_line(&format!(
        "  assets       {} ({} fingerprinted, {} blurry)",
        style(stats.total_assets).cyan(),
        stats.fingerprinted_assets,
        stats.blurry_assets
    ))
    .ok();
    if let Some(newest) = stats.newest_scan {
        term.write_line(&format!("  last scan    {}", format_millis(newest)))
            .ok();
    }
    term.write_line(&format!(
        "  quarantined  {}",
        style(stats.quarantined).cyan()
    ))
    .ok();

    if ctx.verbose {
        for record in quarantined {
            term.write_line(&format!(
                "    {} expires {}",
                display_path(&record.original_identifier),
                format_millis(record.expires_at)
            ))
            .ok();
        }
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => tracing::error!("Failed to serialize output: {}", e),
    }
}

/// Shorten paths under the home directory to `~/...`
fn display_path(identifier: &str) -> String {
    let path = Path::new(identifier);
    match dirs::home_dir().and_then(|home| path.strip_prefix(home).ok().map(Path::to_path_buf)) {
        Some(relative) => format!("~/{}", relative.display()),
        None => identifier.to_string(),
    }
}

fn format_millis(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|t| {
            t.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M")
                .to_string()
        })
        .unwrap_or_else(|| millis.to_string())
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
