//! `vitalchat config`: configuration management.

use vitalchat_config::AppConfig;

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e.into());
        }
    };
    println!("   Config parsed successfully");

    let mut warnings = Vec::new();
    if !config.has_api_key() {
        warnings.push("No API key set (set VITALCHAT_API_KEY or OPENAI_API_KEY)".to_string());
    }
    for (name, path) in [
        ("records_path", &config.health.records_path),
        ("mobile_path", &config.health.mobile_path),
        ("tokenizer_path", &config.synthesis.tokenizer_path),
    ] {
        if let Some(path) = path {
            if !path.exists() {
                warnings.push(format!("{name} does not exist: {}", path.display()));
            }
        }
    }

    if warnings.is_empty() {
        println!("   All checks passed");
    } else {
        println!();
        for w in &warnings {
            println!("   warning: {w}");
        }
    }

    println!();
    println!("   Model:          {}", config.default_model);
    println!("   Classifier:     {}", config.classifier.model);
    println!("   Summary model:  {}", config.summary_model());
    println!(
        "   Search:         {}",
        if config.search.enabled { config.search.model.as_str() } else { "disabled" }
    );
    println!(
        "   Health budget:  {} tokens ({} workers, {}s deadline)",
        config.synthesis.health_token_budget,
        config.synthesis.summary_workers,
        config.synthesis.summary_deadline_secs
    );

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if config.api_key.is_some() {
        config.api_key = Some("***".into());
    }
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", AppConfig::config_path().display());
    Ok(())
}
