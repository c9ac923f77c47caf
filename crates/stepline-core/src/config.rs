//! Loader for `stepline.toml`.
//!
//! The lenient loader never fails: a missing file yields the defaults, and an
//! unreadable or malformed file is logged and also yields the defaults. The
//! strict loader surfaces those failures instead.

use std::path::Path;

use stepline_types::config::SteplineConfig;

use crate::pipeline::error::ConfigError;

/// Load configuration from `path`, falling back to defaults.
pub async fn load_config(path: &Path) -> SteplineConfig {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config found at {}, using defaults", path.display());
            return SteplineConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", path.display());
            return SteplineConfig::default();
        }
    };

    match toml::from_str::<SteplineConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", path.display());
            SteplineConfig::default()
        }
    }
}

/// Load configuration from `path`, failing on any I/O or parse error.
pub async fn load_config_strict(path: &Path) -> Result<SteplineConfig, ConfigError> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(toml::from_str(&content)?)
}
