//! Configuration management for the ledger node

use std::env;
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use log::info;
use serde::Deserialize;
use thiserror::Error;

use crate::blockchain::{Difficulty, MiningError, ProofOfWorkMiner};

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "LEDGER_CONFIG";

/// Config file used when [`CONFIG_PATH_ENV`] is unset
pub const DEFAULT_CONFIG_PATH: &str = "ledger.toml";

/// Timeout for mining over HTTP when none is configured
pub const DEFAULT_MINE_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid mining config: {0}")]
    Mining(#[from] MiningError),

    #[error("mining.workers must be at least 1")]
    NoWorkers,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub mining: MiningConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MiningConfig {
    #[serde(default = "default_difficulty")]
    pub difficulty: i64,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            difficulty: default_difficulty(),
            workers: default_workers(),
            timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Applies to `POST /mine` when `mining.timeout_ms` is unset
    #[serde(default = "default_mine_timeout_ms")]
    pub mine_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            mine_timeout_ms: default_mine_timeout_ms(),
        }
    }
}

fn default_difficulty() -> i64 {
    4
}

fn default_workers() -> usize {
    1
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_mine_timeout_ms() -> u64 {
    DEFAULT_MINE_TIMEOUT_MS
}

impl LedgerConfig {
    /// Parses and validates a TOML document
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let config: LedgerConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        Difficulty::try_from(self.mining.difficulty)?;

        if self.mining.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }

        Ok(())
    }

    /// Builds the miner described by the `[mining]` table
    pub fn miner(&self) -> Result<ProofOfWorkMiner, ConfigError> {
        let difficulty = Difficulty::try_from(self.mining.difficulty)?;
        let mut miner = ProofOfWorkMiner::new(difficulty).with_workers(self.mining.workers);

        if let Some(timeout_ms) = self.mining.timeout_ms {
            miner = miner.with_timeout(Duration::from_millis(timeout_ms));
        }

        Ok(miner)
    }

    /// Miner shared by the HTTP handlers, always bounded by a timeout
    pub fn server_miner(&self) -> Result<ProofOfWorkMiner, ConfigError> {
        let miner = self.miner()?;
        if miner.timeout().is_some() {
            return Ok(miner);
        }

        Ok(miner.with_timeout(Duration::from_millis(self.server.mine_timeout_ms)))
    }
}

/// Loads the config file named by `LEDGER_CONFIG`, falling back to defaults
pub fn load_config() -> Result<LedgerConfig, ConfigError> {
    let path = env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    load_config_from(path)
}

pub fn load_config_from<P: AsRef<Path>>(path: P) -> Result<LedgerConfig, ConfigError> {
    let path = path.as_ref();

    match fs::read_to_string(path) {
        Ok(source) => {
            info!("Loaded config from {}", path.display());
            LedgerConfig::from_toml(&source)
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            info!("No config file at {}, using defaults", path.display());
            Ok(LedgerConfig::default())
        }
        Err(source) => Err(ConfigError::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LedgerConfig::from_toml("").unwrap();

        assert_eq!(config.mining.difficulty, 4);
        assert_eq!(config.mining.workers, 1);
        assert_eq!(config.mining.timeout_ms, None);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.mine_timeout_ms, DEFAULT_MINE_TIMEOUT_MS);
    }

    #[test]
    fn test_server_miner_is_always_bounded() {
        let config = LedgerConfig::from_toml("[server]\nmine_timeout_ms = 250\n").unwrap();
        assert_eq!(config.miner().unwrap().timeout(), None);
        assert_eq!(
            config.server_miner().unwrap().timeout(),
            Some(Duration::from_millis(250))
        );

        let config = LedgerConfig::from_toml("[mining]\ntimeout_ms = 1500\n").unwrap();
        assert_eq!(
            config.server_miner().unwrap().timeout(),
            Some(Duration::from_millis(1500))
        );
    }

    #[test]
    fn test_parse_full_config() {
        let config = LedgerConfig::from_toml(
            r#"
            [mining]
            difficulty = 2
            workers = 4
            timeout_ms = 1500

            [server]
            host = "0.0.0.0"
            port = 9000
            "#,
        )
        .unwrap();

        let miner = config.miner().unwrap();
        assert_eq!(miner.difficulty().level(), 2);
        assert_eq!(miner.workers(), 4);
        assert_eq!(miner.timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn test_negative_difficulty_rejected() {
        let err = LedgerConfig::from_toml("[mining]\ndifficulty = -1\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Mining(MiningError::InvalidDifficulty(-1))
        ));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let err = LedgerConfig::from_toml("[mining]\nworkers = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::NoWorkers));
    }

    #[test]
    fn test_malformed_config() {
        let err = LedgerConfig::from_toml("[mining\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = load_config_from("does/not/exist/ledger.toml").unwrap();
        assert_eq!(config.mining.difficulty, 4);
    }
}
