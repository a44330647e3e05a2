use anyhow::{Context, bail};
use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use webfingerable_core::{Database, Progress, ResultSink, RunOptions, RunReport, execute_run};
use webfingerable_scanner::{ProbeConfig, ProbeJob, ProbeResult, Prober};

pub const DEFAULT_DATABASE: &str = "~/.config/webfingerable/webfingerable.db";

/// A century; larger windows are rejected by the argument parser.
pub const MAX_RECHECK_HOURS: u64 = 24 * 365 * 100;

/// Expand a leading `~` to the user's home directory
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_header(title: &str) {
    print_divider();
    println!("{}", format!("  {}", title).bright_white().bold());
    print_divider();
    println!();
}

fn database_path(args: &ArgMatches) -> PathBuf {
    let raw = args
        .get_one::<String>("database")
        .map(String::as_str)
        .unwrap_or(DEFAULT_DATABASE);
    expand_path(raw)
}

fn seconds(args: &ArgMatches, id: &str, default: u64) -> Duration {
    Duration::from_secs(args.get_one::<u64>(id).copied().unwrap_or(default))
}

fn recheck_window(args: &ArgMatches) -> Duration {
    let hours = args.get_one::<u64>("recheck-hours").copied().unwrap_or(24);
    Duration::from_secs(hours.saturating_mul(60 * 60))
}

/// Build run options from the `run` subcommand's arguments
pub fn run_options_from_args(args: &ArgMatches) -> RunOptions {
    let defaults = RunOptions::default();

    RunOptions {
        database: database_path(args),
        blocklist: args.get_one::<String>("blocklist").map(|p| expand_path(p)),
        page_size: args
            .get_one::<usize>("page-size")
            .copied()
            .unwrap_or(defaults.page_size),
        quota: args.get_one::<usize>("quota").copied(),
        concurrency: args
            .get_one::<usize>("concurrency")
            .copied()
            .unwrap_or(defaults.concurrency),
        recheck_after: recheck_window(args),
        request_timeout: seconds(args, "timeout", 30),
        ..defaults
    }
}

/// Create (or with `--force`, recreate) the database. Returns its path.
pub fn handle_init(args: &ArgMatches) -> anyhow::Result<PathBuf> {
    print_header("WEBFINGERABLE INITIALIZATION");

    let db_path = database_path(args);
    let force = args.get_flag("force");

    println!(
        "{} Target: {}",
        "→".blue(),
        db_path.display().to_string().bright_white()
    );

    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    if Database::exists(&db_path) {
        if force {
            println!("{} Deleting existing database (force mode)", "→".yellow().bold());
            Database::drop(&db_path)?;
        } else {
            println!(
                "{} Database already exists; keeping its data",
                "ℹ".blue()
            );
        }
    }

    Database::new(&db_path)?;

    println!("{} Database ready", "✓".green().bold());
    println!();
    Ok(db_path)
}

fn run_spinner() -> anyhow::Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(100));
    Ok(spinner)
}

pub async fn handle_run(args: &ArgMatches, quiet: bool) -> anyhow::Result<RunReport> {
    let options = run_options_from_args(args);

    if !quiet {
        print_header("WEBFINGERABLE RUN");
        println!(
            "{} Database: {}",
            "→".blue(),
            options.database.display().to_string().bright_white()
        );
        println!("{} Concurrency: {}", "→".blue(), options.concurrency);
        println!("{} Page size: {}", "→".blue(), options.page_size);
        if let Some(quota) = options.quota {
            println!("{} Quota: {}", "→".blue(), quota);
        }
        println!();
    }

    if !Database::exists(&options.database) {
        bail!(
            "No database at {}; run `webfingerable init` first",
            options.database.display()
        );
    }

    let progress = Arc::new(Progress::new());
    let spinner = if quiet { None } else { Some(run_spinner()?) };

    let ticker = spinner.clone().map(|spinner| {
        let progress = progress.clone();
        tokio::spawn(async move {
            loop {
                let snapshot = progress.snapshot();
                spinner.set_message(format!(
                    "{} in flight, {} completed, {} failed",
                    snapshot.in_flight(),
                    snapshot.completed,
                    snapshot.failed
                ));
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
        })
    });

    let outcome = execute_run(options, progress).await;

    if let Some(ticker) = ticker {
        ticker.abort();
    }
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    let report = outcome.context("Run aborted")?;
    if !quiet {
        print_report(&report);
    }
    Ok(report)
}

fn print_report(report: &RunReport) {
    println!("{} Run complete!", "✓".green().bold());
    println!();
    print_divider();
    println!("  Submitted: {}", report.progress.submitted.to_string().bright_white());
    println!("  Completed: {}", report.progress.completed.to_string().green());
    println!("  Failed:    {}", report.progress.failed.to_string().red());
    println!("  Blocked:   {}", report.skipped.to_string().yellow());
    println!("  Pages:     {}", report.pages_fetched);
    println!("  Pauses:    {} ({} resumed)", report.pauses, report.resumes);
    print_divider();
}

/// Probe one account now, ignoring when it was last checked, and store the result.
pub async fn probe_account(
    db: Database,
    domain: &str,
    username: &str,
    timeout: Duration,
) -> anyhow::Result<ProbeResult> {
    if db.ensure_account(username, domain)? {
        tracing::info!("Added account {}@{}", username, domain);
    }

    let prober = Prober::new(ProbeConfig::default().with_timeout(timeout), db.clone())?;
    let job = ProbeJob::new(domain, 0).with_username(username);

    let Some(result) = prober.run(job).await? else {
        bail!("No account to probe on {}", domain);
    };

    let id = ResultSink::new(db).persist_success(&result)?;
    tracing::debug!("Stored result {}", id);
    Ok(result)
}

pub async fn handle_probe(args: &ArgMatches) -> anyhow::Result<()> {
    let domain = args
        .get_one::<String>("DOMAIN")
        .context("A domain is required")?;
    let username = args
        .get_one::<String>("USERNAME")
        .context("A username is required")?;

    let db = Database::new(&database_path(args))?;
    let result = probe_account(db, domain, username, seconds(args, "timeout", 30)).await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
