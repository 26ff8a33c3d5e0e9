use anyhow::{Context, anyhow, bail};
use chainseek_core::report::{ReportFormat, generate_report};
use chainseek_core::search::{SearchOptions, execute_search};
use chainseek_core::store::{JsonStateStore, StateStore};
use chainseek_scanner::{DedupPolicy, HttpChainClient, Pacing, ScheduleMode};
use clap::ArgMatches;
use colored::Colorize;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// Helper functions for the search handler

/// Split a comma-separated keyword list, trimming entries and dropping blanks
pub fn parse_keywords(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(|k| k.to_string())
        .collect()
}

/// Strip surrounding whitespace and a leading '@' from a handle
pub fn normalize_handle(input: &str) -> String {
    input.trim().trim_start_matches('@').trim().to_string()
}

/// Load request headers from a flat JSON object file
pub fn load_headers(path: &Path) -> Result<HeaderMap, String> {
    let content = fs::read_to_string(path).map_err(|e| {
        format!(
            "Failed to read headers file {}: {}. Provide a JSON object of request headers.",
            path.display(),
            e
        )
    })?;

    let value: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| format!("Could not parse {}: {}. Ensure it's valid JSON.", path.display(), e))?;

    let object = value
        .as_object()
        .ok_or_else(|| format!("{} must contain a JSON object of headers", path.display()))?;

    let mut headers = HeaderMap::new();
    for (name, raw) in object {
        let text = match raw {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Bool(b) => b.to_string(),
            _ => return Err(format!("Header '{}' must be a string", name)),
        };
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| format!("Invalid header name '{}': {}", name, e))?;
        let header_value = HeaderValue::from_str(&text)
            .map_err(|e| format!("Invalid value for header '{}': {}", name, e))?;
        headers.insert(header_name, header_value);
    }

    Ok(headers)
}

/// Expand a leading '~' in a path argument
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_prompt(msg: &str) -> io::Result<String> {
    print!("{} ", msg.bright_cyan().bold());
    io::stdout().flush()?;
    let mut response = String::new();
    io::stdin().read_line(&mut response)?;
    Ok(response.trim().to_string())
}

fn seed_from_args(args: &ArgMatches) -> anyhow::Result<String> {
    let seed = match args.get_one::<String>("seed") {
        Some(seed) => seed.clone(),
        None => print_prompt("Enter the handle to start searching from:")?,
    };
    let seed = normalize_handle(&seed);
    if seed.is_empty() {
        bail!("No seed handle provided");
    }
    Ok(seed)
}

fn keywords_from_args(args: &ArgMatches) -> anyhow::Result<Vec<String>> {
    let raw = match args.get_one::<String>("keywords") {
        Some(raw) => raw.clone(),
        None => print_prompt("Enter keywords to search for (comma-separated, e.g. 'tech, john doe'):")?,
    };
    let keywords = parse_keywords(&raw);
    if keywords.is_empty() {
        bail!("No keywords provided");
    }
    Ok(keywords)
}

fn store_from_args(args: &ArgMatches) -> JsonStateStore {
    let state_dir = args
        .get_one::<String>("state-dir")
        .map(|p| expand_path(p))
        .unwrap_or_else(|| expand_path("~/.config/chainseek/state"));
    let results_dir = args
        .get_one::<String>("results-dir")
        .map(|p| expand_path(p))
        .unwrap_or_else(|| PathBuf::from("results"));
    JsonStateStore::new(state_dir, results_dir)
}

fn format_from_args(args: &ArgMatches) -> ReportFormat {
    args.get_one::<String>("format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Text)
}

fn emit_report(report: &str, output: Option<&PathBuf>) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            fs::write(path, report)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            println!(
                "{} Report saved to {}",
                "✓".green().bold(),
                path.display().to_string().bright_white()
            );
        }
        None => print!("{}", report),
    }
    Ok(())
}

pub async fn handle_search(args: &ArgMatches) -> anyhow::Result<()> {
    let seed = seed_from_args(args)?;
    let keywords = keywords_from_args(args)?;

    let max_depth = *args.get_one::<usize>("max-depth").unwrap_or(&2);
    let workers = *args.get_one::<usize>("workers").unwrap_or(&4);
    let min_delay = *args.get_one::<u64>("min-delay-ms").unwrap_or(&1000);
    let max_delay = *args.get_one::<u64>("max-delay-ms").unwrap_or(&2000);
    let timeout = *args.get_one::<u64>("timeout").unwrap_or(&20);
    let mode = args
        .get_one::<String>("mode")
        .and_then(|m| ScheduleMode::from_str(m))
        .unwrap_or_default();
    let dedup = args
        .get_one::<String>("dedup")
        .and_then(|d| DedupPolicy::from_str(d))
        .unwrap_or_default();
    let base_url = args
        .get_one::<String>("base-url")
        .map(String::as_str)
        .unwrap_or(chainseek_scanner::fetch::DEFAULT_BASE_URL);
    let headers_path = args
        .get_one::<String>("headers")
        .map(|p| expand_path(p))
        .unwrap_or_else(|| PathBuf::from("headers.json"));

    let pacing = Pacing::new(Duration::from_millis(min_delay), Duration::from_millis(max_delay))?;
    let headers = load_headers(&headers_path).map_err(|e| anyhow!(e))?;
    let client = Arc::new(
        HttpChainClient::with_options(base_url, headers, timeout)
            .context("Failed to build HTTP client")?,
    );

    let store = store_from_args(args);
    store.init().context("Failed to create state directories")?;

    print_divider();
    println!("{}", "  CHAIN SEARCH".bright_white().bold());
    print_divider();
    println!("{} Seed: @{}", "→".blue(), seed.bright_white());
    println!("{} Keywords: {}", "→".blue(), keywords.join(", ").bright_white());
    println!("{} Max depth: {}", "→".blue(), max_depth);
    println!("{} Mode: {:?} ({} workers)", "→".blue(), mode, workers);
    println!(
        "{} State: {}",
        "→".blue(),
        store.state_path(&seed).display().to_string().bright_white()
    );
    println!();

    let mut options = SearchOptions::new(seed, keywords);
    options.max_depth = max_depth;
    options.mode = mode;
    options.workers = workers;
    options.pacing = pacing;
    options.dedup = dedup;
    options.show_progress_bars = true;
    let keywords = options.keywords.clone();

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!(
                "\n{} Ctrl+C detected. Saving current state and exiting...",
                "■".red().bold()
            );
            signal_token.cancel();
        }
    });

    let result = execute_search(options, client.clone(), client, &store, cancel, None).await;
    signal_task.abort();
    let outcome = result.context("Search failed")?;

    println!();
    if let Some(ref path) = outcome.flush.state_path {
        println!(
            "{} Search state: {}",
            "✓".green().bold(),
            path.display().to_string().bright_white()
        );
    }
    for path in &outcome.flush.snapshots {
        println!(
            "{} Matches: {}",
            "✓".green().bold(),
            path.display().to_string().bright_white()
        );
    }
    println!();

    let report = generate_report(
        &outcome.state,
        Some(&outcome.summary),
        &keywords,
        format_from_args(args),
    );
    emit_report(&report, args.get_one::<PathBuf>("output"))
}

pub fn handle_status(args: &ArgMatches) -> anyhow::Result<()> {
    let seed = seed_from_args(args)?;
    let store = store_from_args(args);
    let keywords = args
        .get_one::<String>("keywords")
        .map(|k| parse_keywords(k))
        .unwrap_or_default();

    let path = store.state_path(&seed);
    if !path.exists() {
        println!(
            "{} No saved search for @{} at {}",
            "ℹ".blue(),
            seed,
            path.display().to_string().bright_white()
        );
        return Ok(());
    }

    let state = store.load(&seed);
    let report = generate_report(&state, None, &keywords, format_from_args(args));
    emit_report(&report, args.get_one::<PathBuf>("output"))
}

pub fn handle_reset(args: &ArgMatches) -> anyhow::Result<()> {
    let seed = seed_from_args(args)?;
    let store = store_from_args(args);
    let force = args.get_flag("force");
    let path = store.state_path(&seed);

    if !path.exists() {
        println!("{} Nothing to reset for @{}", "ℹ".blue(), seed);
        return Ok(());
    }

    if !force {
        println!("{}", "⚠ WARNING".yellow().bold());
        println!(
            "This deletes the saved progress at {}",
            path.display().to_string().bright_white()
        );
        let response = print_prompt("Do you want to continue? [y/N]:")?.to_lowercase();
        if response != "y" && response != "yes" {
            println!("{} Reset cancelled.", "✗".red().bold());
            return Ok(());
        }
    }

    if store
        .clear(&seed)
        .with_context(|| format!("Failed to delete {}", path.display()))?
    {
        println!("{} Saved search for @{} removed", "✓".green().bold(), seed);
    }
    Ok(())
}
