//! Per-run configuration, resolved once at startup and passed explicitly
//! into every component

use std::path::PathBuf;

use alloy::primitives::{Address, Bytes, U256};

use crate::{
    constants::{
        DEFAULT_DEPLOYMENTS_ROOT, DEFAULT_DISCOUNT_MINT_FEE, DEFAULT_FEE_RATE,
        DEFAULT_LOCAL_RPC_URL, DEFAULT_MINT_FEE, DEFAULT_NFT_NAME, DEFAULT_NFT_SYMBOL,
        DEFAULT_STORAGE_CHAIN_URL, DEFAULT_STORAGE_INDEXER_URL, DEFAULT_VERIFIER_TYPE,
        DEFAULT_VERIFY_DELAY, DEFAULT_VERIFY_PREFIX, DEFAULT_VERIFY_PROGRAM, HARDHAT_CHAIN_ID,
        HARDHAT_NETWORK, LOCALHOST_NETWORK, VERIFY_TIMEOUT, ZG_MAINNET_CHAIN_ID,
        ZG_MAINNET_NETWORK, ZG_TESTNET_CHAIN_ID, ZG_TESTNET_NETWORK,
    },
    errors::ScriptError,
    types::ContractName,
};

// -----------
// | Network |
// -----------

/// Pick the target network
///
/// An environment override wins, then an explicit `--network` flag, then
/// the positional argument.
pub fn resolve_network_name(
    env_override: Option<String>,
    flag: Option<String>,
    positional: Option<String>,
) -> Option<String> {
    [env_override, flag, positional]
        .into_iter()
        .flatten()
        .map(|n| n.trim().to_string())
        .find(|n| !n.is_empty())
}

/// Explicit overrides for network settings, typically from the CLI
#[derive(Clone, Debug, Default)]
pub struct NetworkOverrides {
    /// The RPC url to use instead of the network default
    pub rpc_url: Option<String>,
    /// The private key to use instead of the network default
    pub private_key: Option<String>,
    /// The deployments directory to use instead of the network default
    pub deployments_dir: Option<PathBuf>,
}

/// Everything needed to talk to, and keep records for, one network
#[derive(Clone, Debug)]
pub struct NetworkConfig {
    /// The network name, as used in deployment paths and verify commands
    pub name: String,
    /// The expected chain ID, if known
    pub chain_id: Option<u64>,
    /// The RPC url
    pub rpc_url: Option<String>,
    /// The deployer's private key
    pub private_key: Option<String>,
    /// The directory holding this network's deployment records
    pub deployments_dir: PathBuf,
}

impl NetworkConfig {
    /// Resolve the configuration of the named network
    ///
    /// `lookup` reads an environment variable; it is a parameter so the
    /// process environment is consulted in exactly one place.
    pub fn resolve(
        name: &str,
        overrides: NetworkOverrides,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ScriptError> {
        let prefix = env_prefix(name);
        let var = |suffix: &str| lookup(&format!("{prefix}_{suffix}")).filter(|v| !v.is_empty());

        let is_local = prefix == "LOCAL";
        let default_chain_id = match name {
            HARDHAT_NETWORK | LOCALHOST_NETWORK => Some(HARDHAT_CHAIN_ID),
            ZG_TESTNET_NETWORK => Some(ZG_TESTNET_CHAIN_ID),
            ZG_MAINNET_NETWORK => Some(ZG_MAINNET_CHAIN_ID),
            _ => None,
        };
        let chain_id = match var("CHAIN_ID") {
            Some(raw) => Some(raw.parse::<u64>().map_err(|e| {
                ScriptError::Config(format!("{prefix}_CHAIN_ID is not a number: {e}"))
            })?),
            None => default_chain_id,
        };

        let rpc_url = overrides.rpc_url.or_else(|| var("RPC_URL")).or_else(|| {
            is_local.then(|| DEFAULT_LOCAL_RPC_URL.to_string())
        });
        let private_key = overrides.private_key.or_else(|| {
            if is_local {
                lookup("ZG_AGENT_NFT_CREATOR_PRIVATE_KEY").filter(|v| !v.is_empty())
            } else {
                var("PRIVATE_KEY")
            }
        });
        let deployments_dir = overrides
            .deployments_dir
            .or_else(|| var("DEPLOYMENTS_PATH").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DEPLOYMENTS_ROOT).join(name));

        Ok(Self {
            name: name.to_string(),
            chain_id,
            rpc_url,
            private_key,
            deployments_dir,
        })
    }

    /// The RPC url, which must be configured for any chain interaction
    pub fn require_rpc_url(&self) -> Result<&str, ScriptError> {
        self.rpc_url.as_deref().ok_or_else(|| {
            ScriptError::Config(format!(
                "no RPC url for {}; set {}_RPC_URL or pass --rpc-url",
                self.name,
                env_prefix(&self.name)
            ))
        })
    }

    /// The private key, which must be configured for any transaction
    pub fn require_private_key(&self) -> Result<&str, ScriptError> {
        self.private_key.as_deref().ok_or_else(|| {
            ScriptError::Config(format!(
                "no private key for {}; set {}_PRIVATE_KEY or pass --private-key",
                self.name,
                env_prefix(&self.name)
            ))
        })
    }
}

/// The prefix of a network's environment variables
///
/// `zgTestnet` maps to `ZG_TESTNET`; local networks share `LOCAL`.
pub fn env_prefix(network: &str) -> String {
    if network == HARDHAT_NETWORK || network == LOCALHOST_NETWORK {
        return "LOCAL".to_string();
    }

    let mut prefix = String::with_capacity(network.len() + 4);
    for (i, c) in network.chars().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            prefix.push('_');
        }
        match c {
            '-' | '.' | ' ' => prefix.push('_'),
            c => prefix.push(c.to_ascii_uppercase()),
        }
    }
    prefix
}

/// Parse an enable flag, which is set only by the exact value `true`
pub fn parse_enabled_flag(raw: &str) -> Result<bool, String> {
    Ok(raw.trim() == crate::constants::ENABLED_FLAG_VALUE)
}

// -----------
// | Upgrade |
// -----------

/// The configuration of one upgrade run
#[derive(Clone, Debug)]
pub struct UpgradeConfig {
    /// The target network
    pub network: String,
    /// Whether to upgrade the TEEVerifier
    pub upgrade_tee_verifier: bool,
    /// Whether to upgrade the Verifier
    pub upgrade_verifier: bool,
    /// Whether to upgrade the AgentNFT
    pub upgrade_agent_nft: bool,
    /// Whether to upgrade the AgentMarket
    pub upgrade_agent_market: bool,
    /// Whether to run the pre-upgrade safety checks
    pub perform_safety_checks: bool,
}

impl UpgradeConfig {
    /// Whether the given contract should be upgraded
    pub fn is_enabled(&self, contract: ContractName) -> bool {
        match contract {
            ContractName::TeeVerifier => self.upgrade_tee_verifier,
            ContractName::Verifier => self.upgrade_verifier,
            ContractName::AgentNft => self.upgrade_agent_nft,
            ContractName::AgentMarket => self.upgrade_agent_market,
        }
    }

    /// The contracts to upgrade, dependencies first
    pub fn enabled_contracts(&self) -> Vec<ContractName> {
        ContractName::ALL
            .into_iter()
            .filter(|c| self.is_enabled(*c))
            .collect()
    }
}

// ----------
// | Deploy |
// ----------

/// The TDX measurements the TEEVerifier trusts
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrustedMeasurements {
    /// The TD measurement
    pub mrtd: Bytes,
    /// Runtime measurement register 0
    pub rtmr0: Bytes,
    /// Runtime measurement register 1
    pub rtmr1: Bytes,
    /// Runtime measurement register 2
    pub rtmr2: Bytes,
    /// Runtime measurement register 3
    pub rtmr3: Bytes,
}

impl Default for TrustedMeasurements {
    fn default() -> Self {
        let zero = Bytes::from(vec![0u8; 32]);
        Self {
            mrtd: zero.clone(),
            rtmr0: zero.clone(),
            rtmr1: zero.clone(),
            rtmr2: zero.clone(),
            rtmr3: zero,
        }
    }
}

/// The values wired into the contracts' initializers
#[derive(Clone, Debug)]
pub struct DeployParams {
    /// The TDX quote handed to the TEEVerifier
    pub tdx_quote: Bytes,
    /// The TDX measurements the TEEVerifier trusts
    pub trusted_measurements: TrustedMeasurements,
    /// An attestation contract to use instead of the deployed TEEVerifier
    pub attestation_contract: Option<Address>,
    /// The Verifier's attestation oracle type
    pub verifier_type: u8,
    /// The AgentNFT collection name
    pub nft_name: String,
    /// The AgentNFT collection symbol
    pub nft_symbol: String,
    /// The chain URL embedded in the AgentNFT storage info
    pub storage_chain_url: String,
    /// The indexer URL embedded in the AgentNFT storage info
    pub storage_indexer_url: String,
    /// The AgentMarket fee rate
    pub fee_rate: U256,
    /// The AgentMarket mint fee
    pub mint_fee: U256,
    /// The AgentMarket discounted mint fee
    pub discount_mint_fee: U256,
}

impl Default for DeployParams {
    fn default() -> Self {
        Self {
            tdx_quote: Bytes::from(vec![0u8]),
            trusted_measurements: TrustedMeasurements::default(),
            attestation_contract: None,
            verifier_type: DEFAULT_VERIFIER_TYPE,
            nft_name: DEFAULT_NFT_NAME.to_string(),
            nft_symbol: DEFAULT_NFT_SYMBOL.to_string(),
            storage_chain_url: DEFAULT_STORAGE_CHAIN_URL.to_string(),
            storage_indexer_url: DEFAULT_STORAGE_INDEXER_URL.to_string(),
            fee_rate: U256::from_str_radix(DEFAULT_FEE_RATE, 10).unwrap_or_default(),
            mint_fee: U256::from_str_radix(DEFAULT_MINT_FEE, 10).unwrap_or_default(),
            discount_mint_fee: U256::from_str_radix(DEFAULT_DISCOUNT_MINT_FEE, 10)
                .unwrap_or_default(),
        }
    }
}

/// The configuration of one deploy run
#[derive(Clone, Debug)]
pub struct DeployConfig {
    /// The target network
    pub network: String,
    /// The contracts requested, before dependency closure
    pub selected: Vec<ContractName>,
    /// The initializer values
    pub params: DeployParams,
}

// ----------
// | Verify |
// ----------

/// The configuration of one verification run
#[derive(Clone, Debug)]
pub struct VerifyConfig {
    /// The target network
    pub network: String,
    /// The names of the enabled contract groups' flags
    pub enabled_groups: Vec<&'static str>,
    /// The program running the verification backend
    pub program: String,
    /// The arguments preceding the per-contract arguments
    pub prefix_args: Vec<String>,
    /// The pause between verifications within a group
    pub delay: std::time::Duration,
    /// The timeout of a single verification
    pub timeout: std::time::Duration,
}

impl VerifyConfig {
    /// A configuration invoking `npx hardhat verify` with the default pacing
    pub fn new(network: impl Into<String>, enabled_groups: Vec<&'static str>) -> Self {
        Self {
            network: network.into(),
            enabled_groups,
            program: DEFAULT_VERIFY_PROGRAM.to_string(),
            prefix_args: DEFAULT_VERIFY_PREFIX.iter().map(|s| s.to_string()).collect(),
            delay: DEFAULT_VERIFY_DELAY,
            timeout: VERIFY_TIMEOUT,
        }
    }
}
