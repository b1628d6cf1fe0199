//! Show the effective configuration.

use raytrack_common::config::{config_file_path, AppConfig};

pub fn run(config: &AppConfig, save: bool) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);

    if save {
        let path = config.save()?;
        println!();
        println!("Configuration saved to: {}", path.display());
    } else if !config_file_path().exists() {
        println!();
        println!("No config file at {} (defaults in use)", config_file_path().display());
    }

    Ok(())
}
