//! Info command implementation.

use anyhow::Result;

use crate::cli::InfoArgs;
use crate::engine::Engine;
use crate::plugin::PluginDescriptor;

/// Run the info command.
pub fn run(args: InfoArgs, engine: &Engine) -> Result<()> {
    let plugin = engine.registry().get(&args.plugin)?;
    let unavailable = plugin.unavailable_reason();

    if args.json {
        let output = serde_json::json!({
            "descriptor": plugin.descriptor(),
            "available": unavailable.is_none(),
            "unavailable_reason": unavailable,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    print!("{}", render(plugin.descriptor(), unavailable.as_deref()));
    Ok(())
}

fn render(descriptor: &PluginDescriptor, unavailable: Option<&str>) -> String {
    let available = match unavailable {
        None => "yes".to_string(),
        Some(reason) => format!("no ({})", reason),
    };
    format!(
        "\n  {:<15} {}\n  {:<15} {}\n  {:<15} {}\n  {:<15} {}\n  {:<15} {}\n  {:<15} {}\n  {:<15} {}\n\n",
        "ID:",
        descriptor.id,
        "Name:",
        descriptor.name,
        "Category:",
        descriptor.category,
        "Description:",
        descriptor.description,
        "Risk level:",
        descriptor.risk,
        "Requires root:",
        if descriptor.requires_privilege { "yes" } else { "no" },
        "Available:",
        available
    )
}
