//! Runtime configuration: where the store and wallet file live, and the
//! (fixed, but still named) mining constants.
//!
//! Trimmed from a larger node config to the fields this ledger's scope
//! actually uses — no network, RPC, or security sections, since this crate
//! has no peer-to-peer layer.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Number of leading zero bits a block hash must have (§4.3). Fixed by the
/// spec, but still threaded through `Config` the way a real node would
/// expose its consensus parameters.
pub const TARGET_BITS: u32 = 24;

/// Fixed miner subsidy, in base units, paid by every coinbase transaction.
pub const SUBSIDY: u64 = 10;

pub const ADDRESS_VERSION: u8 = 0x00;
pub const ADDRESS_CHECKSUM_LEN: usize = 4;

pub const BLOCKS_BUCKET: &str = "blocks";
pub const UTXO_BUCKET: &str = "chainstate";
pub const TIP_KEY: &[u8] = b"l";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Directory sled keeps its store under.
    pub data_dir: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("hojicoin.db"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MiningConfig {
    pub target_bits: u32,
    pub subsidy: u64,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            target_bits: TARGET_BITS,
            subsidy: SUBSIDY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalletConfig {
    pub wallet_file: PathBuf,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            wallet_file: PathBuf::from("wallet.dat"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub mining: MiningConfig,
    pub wallet: WalletConfig,
}

impl Config {
    /// Default config, rooted at the given data directory (used to lay out
    /// the store + wallet file together instead of in the current
    /// directory).
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        let wallet_file = data_dir.join("wallet.dat");
        Self {
            database: DatabaseConfig {
                data_dir: data_dir.join("hojicoin.db"),
            },
            mining: MiningConfig::default(),
            wallet: WalletConfig { wallet_file },
        }
    }

    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn to_file(&self, path: &PathBuf) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))
    }
}

/// Default config directory, following platform conventions via `dirs`.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hojicoin")
}

#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    Serialize(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "IO error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "parse error: {}", msg),
            ConfigError::Serialize(msg) => write!(f, "serialize error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn config_roundtrips_through_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = Config::with_data_dir(dir.path().to_path_buf());
        config.to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn defaults_match_fixed_constants() {
        let config = Config::default();
        assert_eq!(config.mining.target_bits, TARGET_BITS);
        assert_eq!(config.mining.subsidy, SUBSIDY);
    }
}
