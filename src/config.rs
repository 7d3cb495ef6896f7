use alloy::primitives::Address;
use serde::Deserialize;
use std::collections::HashSet;
use std::str::FromStr;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub chains: Vec<ChainConfig>,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

/// One network hosting a deployment of the payment contract.
#[derive(Debug, Deserialize, Clone)]
pub struct ChainConfig {
    /// Stable identifier used in pagination state and on every event.
    pub key: String,
    /// Human-readable network name. Display only.
    pub name: String,
    pub chain_id: u64,
    pub rpc_http: String,
    pub contract_address: String,
    pub deployment_block: u64,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_chunk_size() -> u64 {
    50_000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_max_retries() -> u32 {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaginationConfig {
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
    /// Upper bound on chunk queries per chain per page request.
    #[serde(default = "default_max_scan_iterations")]
    pub max_scan_iterations: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            max_scan_iterations: default_max_scan_iterations(),
        }
    }
}

fn default_page_size() -> usize {
    10
}

fn default_max_page_size() -> usize {
    100
}

fn default_max_scan_iterations() -> u32 {
    20
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_api_port")]
    pub port: u16,
    #[serde(default = "default_api_host")]
    pub host: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_api_port() -> u16 {
    3000
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

impl Config {
    pub fn load(path: &str) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre::eyre!("Failed to read config file '{}': {}", path, e))?;
        Self::from_toml(&content)
            .map_err(|e| eyre::eyre!("Invalid config file '{}': {}", path, e))
    }

    pub fn from_toml(content: &str) -> eyre::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> eyre::Result<()> {
        if self.chains.is_empty() {
            return Err(eyre::eyre!("At least one chain must be configured"));
        }

        let mut keys = HashSet::new();
        let mut chain_ids = HashSet::new();
        for chain in &self.chains {
            if chain.key.is_empty() {
                return Err(eyre::eyre!("Chain '{}' has an empty key", chain.name));
            }
            if !keys.insert(chain.key.as_str()) {
                return Err(eyre::eyre!("Duplicate chain key '{}'", chain.key));
            }
            if !chain_ids.insert(chain.chain_id) {
                return Err(eyre::eyre!("Duplicate chain id {}", chain.chain_id));
            }
            if !chain.contract_address.starts_with("0x") {
                return Err(eyre::eyre!(
                    "Contract address '{}' on chain '{}' must be 0x-prefixed",
                    chain.contract_address,
                    chain.key
                ));
            }
            Address::from_str(&chain.contract_address).map_err(|e| {
                eyre::eyre!(
                    "Invalid contract address '{}' on chain '{}': {}",
                    chain.contract_address,
                    chain.key,
                    e
                )
            })?;
            if chain.chunk_size == 0 {
                return Err(eyre::eyre!("Chain '{}' chunk_size must be > 0", chain.key));
            }
        }

        if self.pagination.default_page_size == 0
            || self.pagination.default_page_size > self.pagination.max_page_size
        {
            return Err(eyre::eyre!(
                "default_page_size must be between 1 and max_page_size ({})",
                self.pagination.max_page_size
            ));
        }
        if self.pagination.max_scan_iterations == 0 {
            return Err(eyre::eyre!("max_scan_iterations must be > 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[database]
url = "postgres://localhost/test"
max_connections = 5

[[chains]]
key = "sepolia"
name = "Ethereum Sepolia"
chain_id = 11155111
rpc_http = "http://localhost:8545"
contract_address = "0x624FcD0a1F9B5820c950FefD48087531d38387f4"
deployment_block = 6000000

[[chains]]
key = "mordor"
name = "Mordor Testnet"
chain_id = 63
rpc_http = "http://localhost:8546"
contract_address = "0xD4548F4b6d08852B56cdabC6be7Fd90953179d68"
deployment_block = 11501796
chunk_size = 10000
"#;

    fn chain(key: &str, chain_id: u64) -> ChainConfig {
        ChainConfig {
            key: key.to_string(),
            name: key.to_string(),
            chain_id,
            rpc_http: "http://localhost:8545".to_string(),
            contract_address: "0x624FcD0a1F9B5820c950FefD48087531d38387f4".to_string(),
            deployment_block: 0,
            chunk_size: 100,
            request_timeout_ms: 1000,
            max_retries: 0,
        }
    }

    fn config_with(chains: Vec<ChainConfig>) -> Config {
        Config {
            database: DatabaseConfig {
                url: "postgres://localhost/test".to_string(),
                max_connections: 5,
            },
            chains,
            pagination: PaginationConfig::default(),
            api: ApiConfig::default(),
        }
    }

    #[test]
    fn test_parse_config() {
        let config = Config::from_toml(SAMPLE).unwrap();
        assert_eq!(config.chains.len(), 2);
        assert_eq!(config.chains[0].key, "sepolia");
        assert_eq!(config.chains[0].deployment_block, 6_000_000);
        assert_eq!(config.chains[0].chunk_size, 50_000); // default
        assert_eq!(config.chains[0].max_retries, 2); // default
        assert_eq!(config.chains[1].chunk_size, 10_000);
        assert_eq!(config.pagination.default_page_size, 10);
        assert_eq!(config.pagination.max_scan_iterations, 20);
        assert_eq!(config.api.port, 3000);
    }

    #[test]
    fn test_validate_empty_chains() {
        assert!(config_with(vec![]).validate().is_err());
    }

    #[test]
    fn test_validate_bad_address() {
        let mut bad = chain("sepolia", 1);
        bad.contract_address = "not-an-address".to_string();
        assert!(config_with(vec![bad]).validate().is_err());
    }

    #[test]
    fn test_validate_non_hex_address() {
        // Right prefix and length, but not hex.
        let mut bad = chain("sepolia", 1);
        bad.contract_address = format!("0x{}", "zz".repeat(20));
        assert_eq!(bad.contract_address.len(), 42);
        let err = config_with(vec![bad]).validate().unwrap_err();
        assert!(err.to_string().contains("Invalid contract address"));

        let mut short = chain("sepolia", 1);
        short.contract_address = "0x1234".to_string();
        assert!(config_with(vec![short]).validate().is_err());
    }

    #[test]
    fn test_validate_duplicate_keys_and_ids() {
        assert!(config_with(vec![chain("a", 1), chain("a", 2)]).validate().is_err());
        assert!(config_with(vec![chain("a", 1), chain("b", 1)]).validate().is_err());
        assert!(config_with(vec![chain("a", 1), chain("b", 2)]).validate().is_ok());
    }

    #[test]
    fn test_validate_zero_chunk_size() {
        let mut bad = chain("a", 1);
        bad.chunk_size = 0;
        assert!(config_with(vec![bad]).validate().is_err());
    }

    #[test]
    fn test_validate_page_sizes() {
        let mut config = config_with(vec![chain("a", 1)]);
        config.pagination.default_page_size = 500;
        assert!(config.validate().is_err());
    }
}
