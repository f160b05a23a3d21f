//! `reagent config` — Configuration management commands.

use reagent_config::AppConfig;

/// Print the default configuration, ready to save as `config.toml`.
pub fn default_file() {
    println!("{}", AppConfig::default_toml());
}

pub fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let mut warnings = Vec::new();
            if config.completion.provider != "ollama" && !config.has_api_key() {
                warnings.push("No API key set (set REAGENT_API_KEY or OPENAI_API_KEY env var)");
            }
            if config.agent.execution_timeout_secs == 0 {
                warnings.push("agent.execution_timeout_secs = 0 disables the execution timeout");
            }

            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Provider:    {}", config.completion.provider);
            println!("   Endpoint:    {}", config.completion.base_url);
            println!("   Model:       {}", config.completion.model);
            println!("   Language:    {}", config.agent.language);
            println!("   Iterations:  {}", config.agent.max_iterations);
            println!("   Disabled:    {:?}", config.tools.disabled);
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub fn show() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    // Never echo secrets.
    if config.completion.api_key.is_some() {
        config.completion.api_key = Some("***".into());
    }
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub fn path() {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
}
