// Runtime configuration read from the environment

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::models::DEFAULT_HISTORY_LIMIT;

pub const DEFAULT_DB_PATH: &str = "tcg.db";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_STATIC_DIR: &str = "static";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// SQLite file (`TCG_DB_PATH`)
    pub db_path: PathBuf,

    /// Web server listen address (`TCG_BIND_ADDR`)
    pub bind_addr: String,

    /// History entries shown per card (`TCG_HISTORY_LIMIT`)
    pub history_limit: usize,

    /// Directory served under `/static`, card images live in `cards/` (`TCG_STATIC_DIR`)
    pub static_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or blank keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Config::default();

        if let Some(path) = get("TCG_DB_PATH") {
            config.db_path = PathBuf::from(path);
        }
        if let Some(addr) = get("TCG_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(limit) = get("TCG_HISTORY_LIMIT") {
            config.history_limit = limit
                .trim()
                .parse()
                .with_context(|| format!("TCG_HISTORY_LIMIT must be a positive integer, got '{}'", limit))?;
            anyhow::ensure!(config.history_limit > 0, "TCG_HISTORY_LIMIT must be at least 1");
        }
        if let Some(dir) = get("TCG_STATIC_DIR") {
            config.static_dir = PathBuf::from(dir);
        }

        Ok(config)
    }
}
