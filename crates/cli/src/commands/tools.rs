//! `reagent tools` — Show the tool catalog.

use reagent_config::AppConfig;
use reagent_core::tool::ToolRegistry;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let catalog = reagent_tools::default_catalog(&config.tools.disabled);

    println!();
    for id in catalog.ids() {
        let Some(tool) = catalog.get_tool(id).await? else {
            continue;
        };
        let status = if catalog.is_enabled(id).await { "enabled" } else { "disabled" };
        println!("  {} ({}) [{status}]", tool.name, tool.id);
        println!("    {}", tool.description);
        for param in &tool.parameters {
            let marker = if param.required { "*" } else { "" };
            println!("    - {}({}){marker}: {}", param.name, param.param_type, param.description);
        }
        println!();
    }
    Ok(())
}
