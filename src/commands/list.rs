//! List command implementation.

use anyhow::Result;

use crate::cli::ListArgs;
use crate::engine::{Engine, PluginFilter};
use crate::plugin::{PluginDescriptor, RiskLevel};

/// Run the list command.
pub fn run(args: ListArgs, engine: &Engine) -> Result<()> {
    let filter = PluginFilter {
        category: args.category,
        max_risk: args.max_risk,
    };
    let plugins = engine.list_plugins(&filter);

    if args.json {
        let rows: Vec<serde_json::Value> = plugins
            .iter()
            .map(|d| {
                let unavailable = engine
                    .registry()
                    .get(&d.id)
                    .map(|p| p.unavailable_reason())
                    .ok()
                    .flatten();
                serde_json::json!({
                    "id": d.id,
                    "name": d.name,
                    "description": d.description,
                    "category": d.category,
                    "risk": d.risk,
                    "requires_privilege": d.requires_privilege,
                    "available": unavailable.is_none(),
                    "unavailable_reason": unavailable,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if plugins.is_empty() {
        println!("No plugins available.");
        return Ok(());
    }

    let mut current = None;
    for descriptor in &plugins {
        if current != Some(descriptor.category) {
            current = Some(descriptor.category);
            println!("\n  {}", descriptor.category);
        }
        println!("    {:<20} {}{}", descriptor.id, descriptor.name, tags(descriptor));
        if !descriptor.description.is_empty() {
            println!("    {:<20} {}", "", descriptor.description);
        }
    }
    println!();

    Ok(())
}

fn tags(descriptor: &PluginDescriptor) -> String {
    let mut tags = String::new();
    if descriptor.requires_privilege {
        tags.push_str(" [requires root]");
    }
    match descriptor.risk {
        RiskLevel::Safe => {}
        RiskLevel::Caution => tags.push_str(" [caution]"),
        RiskLevel::Dangerous => tags.push_str(" [dangerous]"),
    }
    tags
}
