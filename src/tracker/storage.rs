//! Configuration file persistence
//!
//! Reads and writes [`TrackerConfig`] as pretty JSON. Writes go through a
//! temp file and a rename so a crash never leaves a truncated config behind.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use super::TrackerConfig;
use super::error::{ConfigError, ConfigResult};

/// Load configuration from `path`; a missing file yields the defaults.
pub fn load_config(path: &Path) -> ConfigResult<TrackerConfig> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            tracing::debug!("No config at {:?}, using defaults", path);
            return Ok(TrackerConfig::default());
        }
        Err(err) => return Err(err.into()),
    };

    let config: TrackerConfig = serde_json::from_slice(&data)?;
    config.validate()?;
    Ok(config)
}

/// Write configuration to `path` atomically.
pub fn write_config(path: &Path, config: &TrackerConfig) -> ConfigResult<()> {
    config.validate()?;
    let json = serde_json::to_vec_pretty(config)?;
    write_atomic(path, &json)
}

fn write_atomic(path: &Path, data: &[u8]) -> ConfigResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&temp_path, path).map_err(ConfigError::from)
}
