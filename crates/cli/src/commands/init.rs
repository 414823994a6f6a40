//! `vitalchat init`: first-time setup.

use vitalchat_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = AppConfig::config_path();

    println!("VitalChat setup");
    println!("===============\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("  Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if !config_path.exists() {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("  Created {}", config_path.display());
    } else {
        println!("  Config file exists: {}", config_path.display());
    }

    println!();
    println!("Next steps:");
    println!("  1. Set VITALCHAT_API_KEY (or OPENAI_API_KEY), or add api_key to the config");
    println!("  2. Optionally point [health] records_path at your EHR export");
    println!("  3. Process a HealthKit export:");
    println!("       vitalchat process-mobile --input <dir> --output <file>");
    println!("     then set [health] mobile_path to <file>");
    println!("  4. Ask something:");
    println!("       vitalchat ask \"How has my resting heart rate changed this month?\"");

    Ok(())
}
