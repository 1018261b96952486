mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./config.toml",
        "./docpress.toml",
        "~/.config/docpress/config.toml",
        "/etc/docpress/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    // The argument template must route both paths into the converter.
    if !config.converter.args.iter().any(|a| a.contains("{input}")) {
        anyhow::bail!("Converter args must reference {{input}}");
    }
    if !config.converter.args.iter().any(|a| a.contains("{outdir}")) {
        anyhow::bail!("Converter args must reference {{outdir}}");
    }

    if config.converter.output_extension.is_empty() {
        anyhow::bail!("Converter output extension cannot be empty");
    }

    if config.converter.kill_grace_secs == 0 {
        anyhow::bail!("Kill grace period must be at least 1 second");
    }

    if config.converter.max_deadline_secs < config.converter.deadline_secs {
        anyhow::bail!(
            "Maximum deadline ({}s) is below the default deadline ({}s)",
            config.converter.max_deadline_secs,
            config.converter.deadline_secs
        );
    }

    if config.queue.capacity == 0 {
        anyhow::bail!("Queue capacity cannot be 0");
    }

    Ok(())
}
