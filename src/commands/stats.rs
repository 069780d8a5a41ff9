//! Stats command implementation.

use anyhow::{Context, Result};
use humansize::{format_size, BINARY};

use crate::cli::StatsArgs;
use crate::history::History;

/// Run the stats command.
pub fn run(args: StatsArgs) -> Result<()> {
    let path = History::default_path().context("no data directory for clean history")?;
    let stats = History::new(path).stats(args.period)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("\nSpace freed ({}):", stats.period);
    println!("  Freed:    {}", format_size(stats.bytes_freed, BINARY));
    println!("  Items:    {}", stats.items_removed);
    println!("  Sessions: {}", stats.session_count);
    println!(
        "  Lifetime: {}",
        format_size(stats.lifetime_bytes_freed, BINARY)
    );

    if !stats.per_plugin.is_empty() {
        println!("\n  {:<20} {:>10} {:>8}", "PLUGIN", "FREED", "ITEMS");
        let mut plugins: Vec<_> = stats.per_plugin.iter().collect();
        plugins.sort_by(|a, b| b.1.bytes_freed.cmp(&a.1.bytes_freed).then_with(|| a.0.cmp(b.0)));
        for (plugin, totals) in plugins {
            println!(
                "  {:<20} {:>10} {:>8}",
                plugin,
                format_size(totals.bytes_freed, BINARY),
                totals.items_removed
            );
        }
    }
    println!();

    Ok(())
}
