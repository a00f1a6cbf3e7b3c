use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Overrides `<data dir>/billview.db`.
    pub database_path: Option<PathBuf>,
    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            log_filter: "info".to_string(),
        }
    }
}

impl Config {
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join("billview.db")),
        }
    }
}

pub fn data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("com", "billview", "Billview")
        .context("no home directory to place application data in")?;
    Ok(dirs.data_dir().to_path_buf())
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(data_dir()?.join("config.toml"))
}

/// Reads the config at `path` (or the default location). A missing file
/// means defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => default_config_path()?,
    };
    if !path.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    parse_config(&s).with_context(|| format!("parse {}", path.display()))
}

fn parse_config(s: &str) -> Result<Config> {
    Ok(toml::from_str(s)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_default() {
        assert_eq!(parse_config("").unwrap(), Config::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let cfg = parse_config("database_path = \"/tmp/bills.db\"\n").unwrap();
        assert_eq!(cfg.database_path, Some(PathBuf::from("/tmp/bills.db")));
        assert_eq!(cfg.log_filter, "info");
        assert_eq!(cfg.database_path().unwrap(), PathBuf::from("/tmp/bills.db"));
    }

    #[test]
    fn bad_toml_is_an_error() {
        assert!(parse_config("log_filter = [").is_err());
    }

    #[test]
    fn missing_file_is_default() {
        let cfg = load_config(Some(Path::new("/nonexistent/billview/config.toml"))).unwrap();
        assert_eq!(cfg, Config::default());
    }
}
