//! Scan command implementation.

use anyhow::Result;
use humansize::{format_size, BINARY};
use std::sync::Arc;
use std::time::Duration;

use crate::cli::ScanArgs;
use crate::commands::{display_name, resolve_plugins, with_spinner};
use crate::engine::{Engine, PluginScan, Progress, ScanOptions, Session};
use crate::plugin::{CancellationToken, ScanResult};
use crate::signals;

/// Run the scan command.
pub fn run(args: ScanArgs, engine: &Engine, quiet: bool) -> Result<()> {
    let ids = resolve_plugins(engine.registry(), &args.plugins, args.category, true);
    let session = scan(engine, &ids, args.timeout, !quiet && !args.json);

    if args.json {
        print_json(&session)?;
    } else {
        print_summary(engine, &session);
    }
    Ok(())
}

/// Scan `ids`, cancelling on Ctrl-C.
pub(crate) fn scan(engine: &Engine, ids: &[String], timeout: Option<u64>, show_progress: bool) -> Session {
    let progress = Arc::new(Progress::default());
    let options = ScanOptions {
        timeout: timeout.map(Duration::from_secs),
        progress: Some(Arc::clone(&progress)),
        ..Default::default()
    };
    let _guard = cancel_on_interrupt(&options.cancel);

    tracing::info!("Scanning {} plugins", ids.len());
    with_spinner(show_progress, "Scanning", &progress, || engine.scan(ids, &options))
}

/// Route Ctrl-C to `token` while the returned guard lives.
pub(crate) fn cancel_on_interrupt(token: &CancellationToken) -> Option<signals::CancelGuard> {
    signals::install_cancel_handler(token.clone())
        .map_err(|e| tracing::warn!("Cannot install Ctrl-C handler: {}", e))
        .ok()
}

fn print_json(session: &Session) -> Result<()> {
    let output = serde_json::json!({
        "state": session.state(),
        "total_size": session.total_size(),
        "results": session.results(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

pub(crate) fn print_summary(engine: &Engine, session: &Session) {
    println!();
    for scan in session.results() {
        println!("  {}", summary_line(engine, scan));
    }
    println!(
        "\nTotal reclaimable: {}\n",
        format_size(session.total_size(), BINARY)
    );
}

fn summary_line(engine: &Engine, scan: &PluginScan) -> String {
    let name = display_name(engine, &scan.plugin_id);
    let root = if scan
        .result
        .findings()
        .iter()
        .any(|f| f.requires_privilege)
    {
        " [requires root]"
    } else {
        ""
    };

    match &scan.result {
        ScanResult::Failed { error } => format!("x {:<30} error: {}", name, error.message),
        ScanResult::Findings { findings } if findings.is_empty() => {
            format!(". {:<30} nothing to clean", name)
        }
        ScanResult::Findings { findings } => format!(
            "+ {:<30} {:>10} ({} item{}){}",
            name,
            format_size(scan.result.total_size(), BINARY),
            findings.len(),
            if findings.len() == 1 { "" } else { "s" },
            root
        ),
    }
}
