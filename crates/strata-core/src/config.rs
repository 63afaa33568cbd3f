//! Chain and genesis configuration

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use strata_evm::ProtocolSchedule;
use strata_primitives::{Address, H256, U256};
use strata_state::{Repository, StateDb};
use strata_types::BlockHeader;

use crate::error::{ConfigError, ConfigResult};

/// Chain configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainConfig {
    /// Chain ID used for replay protection and CHAINID
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    /// Upgrade name to activation block
    #[serde(default = "default_forks")]
    pub forks: ProtocolSchedule,
    /// Stack size of the block execution thread in bytes
    #[serde(default = "default_execution_stack_size")]
    pub execution_stack_size: usize,
    /// Genesis configuration
    #[serde(default)]
    pub genesis: GenesisConfig,
}

fn default_chain_id() -> u64 {
    1
}

fn default_forks() -> ProtocolSchedule {
    ProtocolSchedule::mainnet()
}

fn default_execution_stack_size() -> usize {
    256 * 1024 * 1024
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: default_chain_id(),
            forks: default_forks(),
            execution_stack_size: default_execution_stack_size(),
            genesis: GenesisConfig::default(),
        }
    }
}

impl ChainConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Check the configuration for consistency
    pub fn validate(&self) -> ConfigResult<()> {
        if self.chain_id == 0 {
            return Err(ConfigError::ZeroChainId);
        }
        if !self.forks.is_ordered() {
            return Err(ConfigError::UnorderedForks);
        }
        for (address, account) in &self.genesis.alloc {
            account
                .parse_balance()
                .and(account.parse_code())
                .and(account.parse_storage())
                .map_err(|e| ConfigError::InvalidGenesis(format!("{address}: {e}")))?;
        }
        Ok(())
    }
}

/// Genesis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenesisConfig {
    /// Initial account allocations
    #[serde(default)]
    pub alloc: BTreeMap<Address, GenesisAccount>,
    /// Genesis timestamp
    #[serde(default)]
    pub timestamp: u64,
    /// Genesis beneficiary
    #[serde(default)]
    pub coinbase: Address,
    /// Initial difficulty
    #[serde(default = "default_difficulty")]
    pub difficulty: U256,
    /// Initial gas limit
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
}

fn default_difficulty() -> U256 {
    U256::one()
}

fn default_gas_limit() -> u64 {
    30_000_000
}

impl Default for GenesisConfig {
    fn default() -> Self {
        Self {
            alloc: BTreeMap::new(),
            timestamp: 0,
            coinbase: Address::ZERO,
            difficulty: default_difficulty(),
            gas_limit: default_gas_limit(),
        }
    }
}

impl GenesisConfig {
    /// Build the genesis state from the allocations
    pub fn build_state(&self) -> ConfigResult<StateDb> {
        let mut state = StateDb::new();
        for (address, account) in &self.alloc {
            let invalid = |e: String| ConfigError::InvalidGenesis(format!("{address}: {e}"));
            let balance = account.parse_balance().map_err(invalid)?;
            let code = account.parse_code().map_err(invalid)?;
            let storage = account.parse_storage().map_err(invalid)?;

            state.create_account(*address).map_err(state_error)?;
            state.add_balance(address, balance).map_err(state_error)?;
            state.set_nonce(address, account.nonce).map_err(state_error)?;
            if !code.is_empty() {
                state.save_code(address, code).map_err(state_error)?;
            }
            for (key, value) in storage {
                state.add_storage_row(address, key, value).map_err(state_error)?;
            }
        }
        tracing::info!(accounts = self.alloc.len(), root = %state.root_hash(), "genesis state built");
        Ok(state)
    }

    /// Genesis header committing to `state_root`
    pub fn header(&self, state_root: H256) -> BlockHeader {
        BlockHeader {
            coinbase: self.coinbase,
            state_root,
            difficulty: self.difficulty,
            number: 0,
            gas_limit: self.gas_limit,
            timestamp: self.timestamp,
            ..Default::default()
        }
    }
}

fn state_error(e: strata_state::StateError) -> ConfigError {
    ConfigError::InvalidGenesis(e.to_string())
}

/// Genesis account allocation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenesisAccount {
    /// Balance as a hex (`0x` prefixed) or decimal string
    #[serde(default)]
    pub balance: String,
    /// Account nonce
    #[serde(default)]
    pub nonce: u64,
    /// Contract code (hex string)
    #[serde(default)]
    pub code: Option<String>,
    /// Storage slot to value, both hex
    #[serde(default)]
    pub storage: BTreeMap<String, String>,
}

impl GenesisAccount {
    /// Account holding `balance` wei
    pub fn with_balance(balance: U256) -> Self {
        Self {
            balance: format!("{balance:#x}"),
            ..Default::default()
        }
    }

    /// Parse balance from hex or decimal string
    pub fn parse_balance(&self) -> Result<U256, String> {
        parse_quantity(&self.balance).map_err(|e| format!("invalid balance: {e}"))
    }

    /// Parse code from hex string
    pub fn parse_code(&self) -> Result<Vec<u8>, String> {
        let Some(code) = self.code.as_deref() else {
            return Ok(Vec::new());
        };
        let code = code.trim();
        hex::decode(code.strip_prefix("0x").unwrap_or(code))
            .map_err(|e| format!("invalid code: {e}"))
    }

    /// Parse storage entries; zero values are dropped
    pub fn parse_storage(&self) -> Result<BTreeMap<H256, H256>, String> {
        let mut storage = BTreeMap::new();
        for (key, value) in &self.storage {
            let slot = parse_quantity(key).map_err(|e| format!("invalid slot {key}: {e}"))?;
            let value =
                parse_quantity(value).map_err(|e| format!("invalid value at {key}: {e}"))?;
            if !value.is_zero() {
                storage.insert(u256_to_h256(slot), u256_to_h256(value));
            }
        }
        Ok(storage)
    }
}

fn parse_quantity(s: &str) -> Result<U256, String> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(U256::zero());
    }
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(digits) if digits.is_empty() => Ok(U256::zero()),
        Some(digits) => U256::from_str_radix(digits, 16).map_err(|e| format!("{e:?}")),
        None => U256::from_dec_str(s).map_err(|e| format!("{e:?}")),
    }
}

fn u256_to_h256(value: U256) -> H256 {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    H256::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_evm::Upgrade;

    const CONFIG: &str = r#"{
        "chainId": 61,
        "forks": { "homestead": 5, "byzantium": 10, "petersburg": 20 },
        "executionStackSize": 67108864,
        "genesis": {
            "gasLimit": 8000000,
            "timestamp": 42,
            "alloc": {
                "0x00000000000000000000000000000000000000aa": { "balance": "1000" },
                "0x00000000000000000000000000000000000000bb": {
                    "balance": "0x10",
                    "nonce": 1,
                    "code": "0x600160005500",
                    "storage": { "0x00": "0x2a", "0x01": "0x0" }
                }
            }
        }
    }"#;

    #[test]
    fn test_parse_chain_config() {
        let config = ChainConfig::from_json(CONFIG).unwrap();
        assert_eq!(config.chain_id, 61);
        assert_eq!(config.execution_stack_size, 64 * 1024 * 1024);
        assert_eq!(config.forks.upgrade_at(4), None);
        assert_eq!(config.forks.upgrade_at(5), Some(Upgrade::Homestead));
        assert_eq!(config.forks.upgrade_at(25), Some(Upgrade::Constantinople));
        assert_eq!(config.genesis.gas_limit, 8_000_000);
        assert_eq!(config.genesis.difficulty, U256::one());
    }

    #[test]
    fn test_defaults() {
        let config = ChainConfig::from_json("{}").unwrap();
        assert_eq!(config.chain_id, 1);
        assert_eq!(config.forks, ProtocolSchedule::mainnet());
        assert_eq!(config.execution_stack_size, 256 * 1024 * 1024);
        assert_eq!(config.genesis.gas_limit, 30_000_000);
        assert!(config.genesis.alloc.is_empty());
    }

    #[test]
    fn test_build_genesis_state() {
        let config = ChainConfig::from_json(CONFIG).unwrap();
        let state = config.genesis.build_state().unwrap();

        let plain = Address::from_low_u64_be(0xaa);
        let contract = Address::from_low_u64_be(0xbb);
        assert_eq!(state.get_balance(&plain).unwrap(), U256::from(1000u64));
        assert_eq!(state.get_balance(&contract).unwrap(), U256::from(16u64));
        assert_eq!(state.get_nonce(&contract).unwrap(), 1);
        assert_eq!(
            state.get_code(&contract).unwrap(),
            vec![0x60, 0x01, 0x60, 0x00, 0x55, 0x00]
        );
        assert_eq!(
            state
                .get_storage_value(&contract, &H256::from_low_u64_be(0))
                .unwrap(),
            H256::from_low_u64_be(0x2a)
        );

        let header = config.genesis.header(state.root_hash());
        assert!(header.is_genesis());
        assert_eq!(header.timestamp, 42);
    }

    #[test]
    fn test_rejects_invalid_config() {
        assert!(matches!(
            ChainConfig::from_json(r#"{ "chainId": 0 }"#),
            Err(ConfigError::ZeroChainId)
        ));
        assert!(matches!(
            ChainConfig::from_json(r#"{ "forks": { "byzantium": 5, "homestead": 10 } }"#),
            Err(ConfigError::UnorderedForks)
        ));
        assert!(matches!(
            ChainConfig::from_json(
                r#"{ "genesis": { "alloc": { "0x00000000000000000000000000000000000000aa": { "balance": "lots" } } } }"#
            ),
            Err(ConfigError::InvalidGenesis(_))
        ));
        assert!(matches!(
            ChainConfig::from_json("not json"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            ChainConfig::from_file("/nonexistent/strata-chain.json"),
            Err(ConfigError::Io(_))
        ));
    }
}
