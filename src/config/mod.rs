pub mod types;

use crate::error::{ConfigError, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub use types::{ChartsmithConfig, ExportConfig, OutputConfig};

const CONFIG_FILE_NAME: &str = ".chartsmith.toml";

/// Get the global config file path (~/.chartsmith.toml)
pub fn global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(CONFIG_FILE_NAME))
}

/// Get the local config file path (<manifest dir>/.chartsmith.toml)
pub fn local_config_path(manifest_dir: &Path) -> PathBuf {
    manifest_dir.join(CONFIG_FILE_NAME)
}

fn read_config(path: &Path) -> Option<ChartsmithConfig> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            log::warn!("Cannot read {}: {}", path.display(), e);
            return None;
        }
    };
    match toml::from_str(&content) {
        Ok(config) => {
            log::debug!("Loaded configuration from {}", path.display());
            Some(config)
        }
        Err(e) => {
            log::warn!("Ignoring invalid configuration {}: {}", path.display(), e);
            None
        }
    }
}

/// Load configuration from file or use defaults.
/// Checks the manifest directory first, then the home directory.
pub fn load_config(manifest_dir: Option<&Path>) -> ChartsmithConfig {
    if let Some(dir) = manifest_dir {
        let local = local_config_path(dir);
        if local.exists() {
            if let Some(config) = read_config(&local) {
                return config;
            }
        }
    }

    if let Some(global) = global_config_path() {
        if global.exists() {
            if let Some(config) = read_config(&global) {
                return config;
            }
        }
    }

    ChartsmithConfig::default()
}

/// Load an explicitly named config file. Unlike [`load_config`], a file the
/// user asked for must exist and parse.
pub fn load_config_file(path: &Path) -> Result<ChartsmithConfig> {
    let content = fs::read_to_string(path)?;
    let config = toml::from_str(&content).map_err(|e| ConfigError::ParsingFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_local_config_is_preferred() {
        let dir = TempDir::new().unwrap();
        fs::write(
            local_config_path(dir.path()),
            "[export]\norganization = \"local-org\"\n",
        )
        .unwrap();

        let config = load_config(Some(dir.path()));
        assert_eq!(config.export.organization, "local-org");
    }

    #[test]
    fn test_invalid_local_config_falls_back() {
        let dir = TempDir::new().unwrap();
        fs::write(local_config_path(dir.path()), "[export\n").unwrap();

        // Falls through to the global file or the defaults; never errors.
        let config = load_config(Some(dir.path()));
        assert_ne!(config.export.organization, "");
    }

    #[test]
    fn test_explicit_config_must_parse() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(&path, "[output]\noverwrite = \"yes\"\n").unwrap();

        let err = load_config_file(&path).unwrap_err();
        assert!(err.to_string().contains("custom.toml"));

        fs::write(&path, "[output]\noverwrite = true\n").unwrap();
        assert!(load_config_file(&path).unwrap().output.overwrite);
    }
}
