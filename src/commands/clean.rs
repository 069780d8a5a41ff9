//! Clean command implementation.

use anyhow::Result;
use humansize::{format_size, BINARY};
use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Write};
use std::sync::Arc;

use crate::cli::CleanArgs;
use crate::commands::scan::{cancel_on_interrupt, print_summary, scan};
use crate::commands::{display_name, resolve_plugins, truncate_left, with_spinner};
use crate::config::Config;
use crate::engine::{Engine, Progress, Session};
use crate::history::History;
use crate::plugin::{CleanResult, Finding, RiskLevel};

/// Exit code when some items could not be removed.
const EXIT_PARTIAL: i32 = 5;

/// Run the clean command.
pub fn run(args: CleanArgs, engine: &Engine, config: &Config, quiet: bool) -> Result<()> {
    let ids = resolve_plugins(engine.registry(), &args.plugins, None, args.allow_dangerous);
    let mut session = scan(engine, &ids, args.timeout, !quiet && !args.json);
    if session.state().is_terminal() {
        println!("Scan cancelled.");
        return Ok(());
    }

    for error in session.errors() {
        eprintln!("  Scan error in {}: {}", error.plugin_id, error.message);
    }

    let mut selection: Vec<Finding> = session.findings().cloned().collect();
    if selection.is_empty() {
        if args.json {
            println!("{}", serde_json::json!({ "status": "nothing_to_clean" }));
        } else {
            println!("Nothing to clean.");
        }
        return Ok(());
    }

    if args.json && args.dry_run {
        let output = serde_json::json!({ "status": "dry_run", "findings": selection });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if !args.json {
        print_summary(engine, &session);
        if args.dry_run || !quiet {
            print_findings_table(&selection);
        }
    }

    if args.dry_run {
        println!("\n[DRY RUN] Nothing was deleted.");
        return Ok(());
    }

    let dangerous: Vec<String> = dangerous_plugins(engine, &selection);
    if !dangerous.is_empty() {
        eprintln!(
            "\nWarning: {} may remove data you still need.",
            dangerous.join(", ")
        );
    }

    if !args.yes && !args.json {
        match prompt("\nClean all? [y/N/select] ")?.as_str() {
            "y" | "yes" => {}
            "s" | "select" => {
                let chosen = select_plugins(engine, &session)?;
                if chosen.is_empty() {
                    println!("Nothing selected.");
                    return Ok(());
                }
                selection.retain(|f| chosen.contains(&f.plugin_id));
            }
            _ => {
                println!("Aborted.");
                return Ok(());
            }
        }
    }

    let cancel = session.cancel_token();
    if cancel.is_cancelled() {
        println!("Aborted.");
        return Ok(());
    }
    let _guard = cancel_on_interrupt(&cancel);

    let privileged = selection.iter().filter(|f| f.requires_privilege).count();
    if privileged > 0 && !args.json {
        println!("\nRequesting elevated privileges for {} items...", privileged);
    }

    // a spinner would garble a terminal authentication prompt
    let show_progress = !quiet && !args.json && privileged == 0;
    let progress = Arc::new(Progress::default());
    let result = with_spinner(show_progress, "Cleaning", &progress, || {
        engine.clean_with_progress(&mut session, &selection, &progress)
    })?;

    if config.clean.record_history {
        match History::default_path() {
            Some(path) => {
                if let Err(e) = History::new(path).record(&result) {
                    tracing::warn!("Cannot record clean history: {}", e);
                }
            }
            None => tracing::warn!("No data directory, clean history not recorded"),
        }
    }

    if args.json {
        let output = serde_json::json!({ "status": "cleaned", "result": result });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_results(engine, &result);
    }

    if !result.is_complete() {
        std::process::exit(EXIT_PARTIAL);
    }

    Ok(())
}

/// Print `question` and read one trimmed, lowercased answer.
fn prompt(question: &str) -> Result<String> {
    print!("{}", question);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_lowercase())
}

/// Let the user pick plugins with findings by number.
fn select_plugins(engine: &Engine, session: &Session) -> Result<BTreeSet<String>> {
    let candidates: Vec<(&str, u64)> = session
        .results()
        .iter()
        .filter(|r| !r.result.findings().is_empty())
        .map(|r| (r.plugin_id.as_str(), r.result.total_size()))
        .collect();

    println!("\nSelect plugins to clean (numbers, comma-separated):\n");
    for (i, (plugin_id, size)) in candidates.iter().enumerate() {
        println!(
            "  [{}] {:<30} {:>10}",
            i + 1,
            display_name(engine, plugin_id),
            format_size(*size, BINARY)
        );
    }

    let answer = prompt("\nSelection: ")?;
    Ok(parse_selection(&answer, candidates.len())
        .into_iter()
        .map(|i| candidates[i].0.to_string())
        .collect())
}

/// Zero-based indices named by a `1,3` style answer. Out-of-range and
/// non-numeric parts are ignored.
fn parse_selection(answer: &str, count: usize) -> BTreeSet<usize> {
    answer
        .split(',')
        .filter_map(|part| part.trim().parse::<usize>().ok())
        .filter(|n| (1..=count).contains(n))
        .map(|n| n - 1)
        .collect()
}

fn dangerous_plugins(engine: &Engine, selection: &[Finding]) -> Vec<String> {
    let mut names: Vec<String> = selection
        .iter()
        .filter(|f| {
            engine
                .registry()
                .descriptor(&f.plugin_id)
                .is_some_and(|d| d.risk == RiskLevel::Dangerous)
        })
        .map(|f| display_name(engine, &f.plugin_id))
        .collect();
    names.dedup();
    names
}

fn print_findings_table(findings: &[Finding]) {
    println!("  {:<16} {:<50} {:>10}", "PLUGIN", "PATH", "SIZE");
    println!("  {}", "-".repeat(78));

    for finding in findings {
        let path = finding.path().display().to_string();
        println!(
            "  {:<16} {:<50} {:>10}{}",
            finding.plugin_id,
            truncate_left(&path, 48),
            format_size(finding.size, BINARY),
            if finding.requires_privilege { " *" } else { "" }
        );
    }
    if findings.iter().any(|f| f.requires_privilege) {
        println!("\n  * requires root");
    }
}

fn print_results(engine: &Engine, result: &CleanResult) {
    let mut per_plugin: BTreeMap<&str, (usize, u64)> = BTreeMap::new();
    for outcome in result.outcomes.iter().filter(|o| o.is_success()) {
        let entry = per_plugin
            .entry(outcome.finding().plugin_id.as_str())
            .or_default();
        entry.0 += 1;
        entry.1 += outcome.freed_bytes();
    }

    println!("\nResults:");
    for (plugin_id, (count, bytes)) in &per_plugin {
        println!(
            "  {:<30} {:>10} ({} item{})",
            display_name(engine, plugin_id),
            format_size(*bytes, BINARY),
            count,
            if *count == 1 { "" } else { "s" }
        );
    }
    println!(
        "  Cleaned: {} item{}",
        result.success_count(),
        if result.success_count() == 1 { "" } else { "s" }
    );
    if result.failed_count() > 0 {
        println!(
            "  Failed:  {} item{}",
            result.failed_count(),
            if result.failed_count() == 1 { "" } else { "s" }
        );
    }
    println!("  Freed:   {}", format_size(result.total_freed, BINARY));

    for outcome in result.failures() {
        if let Some(kind) = outcome.failure_kind() {
            eprintln!(
                "  Error cleaning {}: {} ({})",
                outcome.finding().path().display(),
                kind,
                outcome.message().unwrap_or_default()
            );
        }
    }
}
