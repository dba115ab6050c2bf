//! Constants used in the deploy scripts

use std::time::Duration;

use alloy::primitives::{b256, B256};

/// The storage slot containing the beacon address in a beacon proxy.
///
/// This is specified in EIP1967: https://eips.ethereum.org/EIPS/eip-1967#beacon-contract-address
pub const BEACON_STORAGE_SLOT: B256 =
    b256!("0xa3f0ad74e5423aebfd80d3ef4346578335a9a72aeaee59ff6cb3582b35133d50");

/// The number of bytes stored in a single storage slot
pub const NUM_BYTES_STORAGE_SLOT: usize = 32;

/// The number of bytes in an Ethereum address
pub const NUM_BYTES_ADDRESS: usize = 20;

/// The current version of the deployment record schema
pub const RECORD_SCHEMA_VERSION: u32 = 1;

/// The file extension of deployment records
pub const RECORD_EXTENSION: &str = "json";

/// The suffix of the record tracking a contract's implementation
pub const IMPL_RECORD_SUFFIX: &str = "Impl";

/// The suffix of the record tracking a contract's beacon
pub const BEACON_RECORD_SUFFIX: &str = "Beacon";

/// The artifact name of the OpenZeppelin `UpgradeableBeacon` contract
pub const BEACON_ARTIFACT: &str = "UpgradeableBeacon";

/// The artifact name of the OpenZeppelin `BeaconProxy` contract
pub const BEACON_PROXY_ARTIFACT: &str = "BeaconProxy";

/// The default directory holding compiled Hardhat artifacts
pub const DEFAULT_ARTIFACTS_DIR: &str = "build/artifacts";

/// The default root under which per-network deployment records are stored
pub const DEFAULT_DEPLOYMENTS_ROOT: &str = "deployments";

/// The suffix of Hardhat debug artifacts, which carry no bytecode
pub const DEBUG_ARTIFACT_SUFFIX: &str = ".dbg.json";

// ---------------
// | Environment |
// ---------------

/// The environment override for the target network
pub const NETWORK_ENV_OVERRIDE: &str = "HARDHAT_NETWORK";

/// The value an enable flag must hold to be considered set
pub const ENABLED_FLAG_VALUE: &str = "true";

/// The env var enabling the TEEVerifier upgrade
pub const UPGRADE_TEE_VERIFIER_ENV: &str = "UPGRADE_TEE_VERIFIER";
/// The env var enabling the Verifier upgrade
pub const UPGRADE_VERIFIER_ENV: &str = "UPGRADE_VERIFIER";
/// The env var enabling the AgentNFT upgrade
pub const UPGRADE_AGENT_NFT_ENV: &str = "UPGRADE_AGENT_NFT";
/// The env var enabling the AgentMarket upgrade
pub const UPGRADE_AGENT_MARKET_ENV: &str = "UPGRADE_AGENT_MARKET";

/// The env var enabling verification of the TEEVerifier group
pub const VERIFY_TEE_VERIFIER_ENV: &str = "VERIFY_TEE_VERIFIER";
/// The env var enabling verification of the Verifier group
pub const VERIFY_VERIFIER_ENV: &str = "VERIFY_VERIFIER";
/// The env var enabling verification of the AgentNFT group
pub const VERIFY_AGENT_NFT_ENV: &str = "VERIFY_AGENT_NFT";
/// The env var enabling verification of the AgentMarket group
pub const VERIFY_AGENT_MARKET_ENV: &str = "VERIFY_AGENT_MARKET";

// ------------
// | Networks |
// ------------

/// The name of the local Hardhat network
pub const HARDHAT_NETWORK: &str = "hardhat";
/// The name of a locally running node
pub const LOCALHOST_NETWORK: &str = "localhost";
/// The name of the 0G testnet
pub const ZG_TESTNET_NETWORK: &str = "zgTestnet";
/// The name of the 0G mainnet
pub const ZG_MAINNET_NETWORK: &str = "zgMainnet";

/// The chain ID of a local Hardhat node
pub const HARDHAT_CHAIN_ID: u64 = 31337;
/// The default chain ID of the 0G testnet
pub const ZG_TESTNET_CHAIN_ID: u64 = 16602;
/// The default chain ID of the 0G mainnet
pub const ZG_MAINNET_CHAIN_ID: u64 = 16661;

/// The default RPC url of a local node
pub const DEFAULT_LOCAL_RPC_URL: &str = "http://127.0.0.1:8545";

// ----------------
// | Verification |
// ----------------

/// The default program used to run the verification backend
pub const DEFAULT_VERIFY_PROGRAM: &str = "npx";

/// The default arguments preceding the per-contract verify arguments
pub const DEFAULT_VERIFY_PREFIX: [&str; 2] = ["hardhat", "verify"];

/// The marker a backend emits for a contract that was verified earlier
pub const ALREADY_VERIFIED_MARKER: &str = "already verified";

/// How long a single verification may run before it is considered failed
pub const VERIFY_TIMEOUT: Duration = Duration::from_secs(60);

/// The pause between successive verifications within a group
pub const DEFAULT_VERIFY_DELAY: Duration = Duration::from_secs(3);

// ------------------------
// | Initializer defaults |
// ------------------------

/// The default TDX quote passed to the TEEVerifier
pub const DEFAULT_TDX_QUOTE: &str = "0x00";

/// The default trusted measurement, 32 zero bytes
pub const DEFAULT_TRUSTED_MEASUREMENT: &str =
    "0x0000000000000000000000000000000000000000000000000000000000000000";

/// The default attestation oracle type of the Verifier
pub const DEFAULT_VERIFIER_TYPE: u8 = 0;

/// The default AgentNFT collection name
pub const DEFAULT_NFT_NAME: &str = "0XDB Agent NFT";

/// The default AgentNFT collection symbol
pub const DEFAULT_NFT_SYMBOL: &str = "DB0GI";

/// The default chain URL embedded in the AgentNFT storage info
pub const DEFAULT_STORAGE_CHAIN_URL: &str = "https://evmrpc-testnet.0g.ai";

/// The default indexer URL embedded in the AgentNFT storage info
pub const DEFAULT_STORAGE_INDEXER_URL: &str = "https://indexer-storage-testnet-turbo.0g.ai";

/// The default AgentMarket fee rate
pub const DEFAULT_FEE_RATE: &str = "1000";

/// The default AgentMarket mint fee, 0.1 native token
pub const DEFAULT_MINT_FEE: &str = "100000000000000000";

/// The default AgentMarket discounted mint fee
pub const DEFAULT_DISCOUNT_MINT_FEE: &str = "0";

/// The default message whose EIP-191 hash is attached to a minted iNFT
pub const DEFAULT_MINT_MESSAGE: &str = "0xdb mint inft";

/// The default description attached to a minted iNFT
pub const DEFAULT_MINT_DESCRIPTION: &str = "minted inft";
