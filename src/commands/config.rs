//! Config command handler.

use anyhow::Context;
use marksearch::MarksearchConfig;

/// Config command.
///
/// Prints the effective configuration as TOML, after file and environment
/// overrides.
pub fn cmd_config(config: &MarksearchConfig) -> anyhow::Result<()> {
    println!("# Effective configuration");
    match MarksearchConfig::default_path() {
        Some(path) if path.exists() => println!("# Default file: {}", path.display()),
        Some(path) => println!("# Default file: {} (not present)", path.display()),
        None => println!("# Default file: (no config directory)"),
    }
    println!("# Database: {}", config.database_path().display());
    println!();
    let rendered = toml::to_string_pretty(config).context("failed to render configuration")?;
    print!("{rendered}");
    Ok(())
}
