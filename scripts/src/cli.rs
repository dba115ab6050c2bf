//! Definitions of CLI arguments and commands for the deploy scripts

use std::path::PathBuf;

use alloy::primitives::{Address, Bytes, U256};
use clap::{ArgAction, Args, Parser, Subcommand};

use crate::{
    commands::{deploy, mint, upgrade, verify},
    config::{
        parse_enabled_flag, resolve_network_name, DeployParams, NetworkOverrides,
        TrustedMeasurements, UpgradeConfig,
    },
    constants::{
        DEFAULT_ARTIFACTS_DIR, DEFAULT_DISCOUNT_MINT_FEE, DEFAULT_FEE_RATE, DEFAULT_MINT_DESCRIPTION,
        DEFAULT_MINT_FEE, DEFAULT_MINT_MESSAGE, DEFAULT_NFT_NAME, DEFAULT_NFT_SYMBOL,
        DEFAULT_STORAGE_CHAIN_URL, DEFAULT_STORAGE_INDEXER_URL, DEFAULT_TDX_QUOTE,
        DEFAULT_TRUSTED_MEASUREMENT, DEFAULT_VERIFIER_TYPE, NETWORK_ENV_OVERRIDE,
        UPGRADE_AGENT_MARKET_ENV, UPGRADE_AGENT_NFT_ENV, UPGRADE_TEE_VERIFIER_ENV,
        UPGRADE_VERIFIER_ENV, VERIFY_AGENT_MARKET_ENV, VERIFY_AGENT_NFT_ENV,
        VERIFY_TEE_VERIFIER_ENV, VERIFY_VERIFIER_ENV,
    },
    errors::ScriptError,
    mint::MintRequest,
};

/// Deploy, upgrade and verify the agent NFT contracts
#[derive(Parser)]
#[command(name = "agent-nft-scripts")]
pub struct Cli {
    /// Options shared by every command
    #[command(flatten)]
    pub global: GlobalArgs,

    /// The command to run
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Run the selected command, returning whether every requested
    /// operation succeeded
    pub async fn run(self) -> Result<bool, ScriptError> {
        self.command.run(&self.global).await
    }
}

/// Options shared by every command
#[derive(Args, Clone, Debug)]
pub struct GlobalArgs {
    /// Network RPC URL, overriding the network's configured endpoint
    #[arg(short, long, global = true)]
    pub rpc_url: Option<String>,

    /// Private key of the deployer, overriding the network's configured key
    #[arg(short, long, global = true)]
    pub private_key: Option<String>,

    /// Directory holding the network's deployment records
    #[arg(long, global = true)]
    pub deployments_dir: Option<PathBuf>,

    /// Root of the compiled contract artifacts
    #[arg(long, global = true, default_value = DEFAULT_ARTIFACTS_DIR)]
    pub artifacts_dir: PathBuf,

    /// Network set by the surrounding hardhat environment, which takes
    /// precedence over any network argument
    #[arg(long, global = true, env = NETWORK_ENV_OVERRIDE, hide = true)]
    pub network_override: Option<String>,
}

impl GlobalArgs {
    /// The network settings given on the command line
    pub fn overrides(&self) -> NetworkOverrides {
        NetworkOverrides {
            rpc_url: self.rpc_url.clone(),
            private_key: self.private_key.clone(),
            deployments_dir: self.deployments_dir.clone(),
        }
    }
}

/// The network a command targets
#[derive(Args, Clone, Debug, Default)]
pub struct NetworkArgs {
    /// The target network, e.g. `zgTestnet`
    #[arg(value_name = "NETWORK")]
    pub positional: Option<String>,

    /// The target network, taking precedence over the positional argument
    #[arg(long = "network", value_name = "NETWORK")]
    pub flag: Option<String>,
}

impl NetworkArgs {
    /// Resolve the target network, failing with a usage message for
    /// `command` if none was given
    pub fn resolve(&self, global: &GlobalArgs, command: &str) -> Result<String, ScriptError> {
        resolve_network_name(
            global.network_override.clone(),
            self.flag.clone(),
            self.positional.clone(),
        )
        .ok_or_else(|| missing_network(command))
    }
}

/// The usage error for a command run without a network
fn missing_network(command: &str) -> ScriptError {
    ScriptError::Config(format!(
        "no network specified\nUsage: agent-nft-scripts {command} <NETWORK>\n\
         Example: agent-nft-scripts {command} zgTestnet"
    ))
}

/// The commands of the deploy scripts
#[derive(Subcommand)]
pub enum Command {
    /// Deploy the contracts behind beacon proxies, skipping recorded ones
    Deploy(DeployArgs),
    /// Upgrade the enabled contracts to freshly deployed implementations
    Upgrade(UpgradeArgs),
    /// Verify the source of the enabled contract groups
    Verify(VerifyArgs),
    /// Mint an iNFT from the deployed AgentNFT
    Mint(MintArgs),
}

impl Command {
    /// Dispatch to the command implementation
    pub async fn run(self, global: &GlobalArgs) -> Result<bool, ScriptError> {
        match self {
            Command::Deploy(args) => deploy(args, global).await,
            Command::Upgrade(args) => upgrade(args, global).await,
            Command::Verify(args) => verify(args, global).await,
            Command::Mint(args) => mint(args, global).await,
        }
    }
}

/// Deploy the contracts
#[derive(Args, Clone, Debug)]
pub struct DeployArgs {
    /// The target network
    #[command(flatten)]
    pub network: NetworkArgs,

    /// Only deploy the contracts carrying one of these tags, plus their
    /// dependencies
    #[arg(long, value_delimiter = ',')]
    pub tags: Vec<String>,

    /// The TDX quote handed to the TEEVerifier
    #[arg(long, env = "TDX_QUOTE", default_value = DEFAULT_TDX_QUOTE)]
    pub tdx_quote: Bytes,

    /// The trusted TD measurement
    #[arg(long, env = "TRUSTED_MRTD", default_value = DEFAULT_TRUSTED_MEASUREMENT)]
    pub trusted_mrtd: Bytes,

    /// The trusted runtime measurement register 0
    #[arg(long, env = "TRUSTED_RTMR0", default_value = DEFAULT_TRUSTED_MEASUREMENT)]
    pub trusted_rtmr0: Bytes,

    /// The trusted runtime measurement register 1
    #[arg(long, env = "TRUSTED_RTMR1", default_value = DEFAULT_TRUSTED_MEASUREMENT)]
    pub trusted_rtmr1: Bytes,

    /// The trusted runtime measurement register 2
    #[arg(long, env = "TRUSTED_RTMR2", default_value = DEFAULT_TRUSTED_MEASUREMENT)]
    pub trusted_rtmr2: Bytes,

    /// The trusted runtime measurement register 3
    #[arg(long, env = "TRUSTED_RTMR3", default_value = DEFAULT_TRUSTED_MEASUREMENT)]
    pub trusted_rtmr3: Bytes,

    /// An attestation contract for the Verifier to use instead of the
    /// deployed TEEVerifier
    #[arg(long, env = "ATTESTATION_CONTRACT")]
    pub attestation_contract: Option<Address>,

    /// The Verifier's attestation oracle type
    #[arg(long, env = "VERIFIER_TYPE", default_value_t = DEFAULT_VERIFIER_TYPE)]
    pub verifier_type: u8,

    /// The AgentNFT collection name
    #[arg(long, env = "ZG_iNFT_NAME", default_value = DEFAULT_NFT_NAME)]
    pub nft_name: String,

    /// The AgentNFT collection symbol
    #[arg(long, env = "ZG_iNFT_SYMBOL", default_value = DEFAULT_NFT_SYMBOL)]
    pub nft_symbol: String,

    /// The storage chain URL embedded in the AgentNFT
    #[arg(long, env = "ZG_RPC_URL", default_value = DEFAULT_STORAGE_CHAIN_URL)]
    pub storage_chain_url: String,

    /// The storage indexer URL embedded in the AgentNFT
    #[arg(long, env = "ZG_INDEXER_URL", default_value = DEFAULT_STORAGE_INDEXER_URL)]
    pub storage_indexer_url: String,

    /// The AgentMarket fee rate
    #[arg(long, env = "ZG_INITIAL_FEE_RATE", default_value = DEFAULT_FEE_RATE)]
    pub fee_rate: U256,

    /// The AgentMarket mint fee, in wei
    #[arg(long, env = "ZG_INITIAL_MINT_FEE", default_value = DEFAULT_MINT_FEE)]
    pub mint_fee: U256,

    /// The AgentMarket discounted mint fee, in wei
    #[arg(long, env = "INITIAL_DISCOUNT_MINT_FEE", default_value = DEFAULT_DISCOUNT_MINT_FEE)]
    pub discount_mint_fee: U256,
}

impl DeployArgs {
    /// The initializer values given on the command line
    pub fn params(&self) -> DeployParams {
        DeployParams {
            tdx_quote: self.tdx_quote.clone(),
            trusted_measurements: TrustedMeasurements {
                mrtd: self.trusted_mrtd.clone(),
                rtmr0: self.trusted_rtmr0.clone(),
                rtmr1: self.trusted_rtmr1.clone(),
                rtmr2: self.trusted_rtmr2.clone(),
                rtmr3: self.trusted_rtmr3.clone(),
            },
            attestation_contract: self.attestation_contract,
            verifier_type: self.verifier_type,
            nft_name: self.nft_name.clone(),
            nft_symbol: self.nft_symbol.clone(),
            storage_chain_url: self.storage_chain_url.clone(),
            storage_indexer_url: self.storage_indexer_url.clone(),
            fee_rate: self.fee_rate,
            mint_fee: self.mint_fee,
            discount_mint_fee: self.discount_mint_fee,
        }
    }
}

/// Upgrade the contracts. Each contract is enabled by setting its flag to
/// exactly `true`.
#[derive(Args, Clone, Debug)]
pub struct UpgradeArgs {
    /// The target network
    #[command(flatten)]
    pub network: NetworkArgs,

    /// Upgrade the TEEVerifier
    #[arg(
        long,
        env = UPGRADE_TEE_VERIFIER_ENV,
        value_parser = parse_enabled_flag,
        action = ArgAction::Set,
        default_value = "false"
    )]
    pub upgrade_tee_verifier: bool,

    /// Upgrade the Verifier
    #[arg(
        long,
        env = UPGRADE_VERIFIER_ENV,
        value_parser = parse_enabled_flag,
        action = ArgAction::Set,
        default_value = "false"
    )]
    pub upgrade_verifier: bool,

    /// Upgrade the AgentNFT
    #[arg(
        long,
        env = UPGRADE_AGENT_NFT_ENV,
        value_parser = parse_enabled_flag,
        action = ArgAction::Set,
        default_value = "false"
    )]
    pub upgrade_agent_nft: bool,

    /// Upgrade the AgentMarket
    #[arg(
        long,
        env = UPGRADE_AGENT_MARKET_ENV,
        value_parser = parse_enabled_flag,
        action = ArgAction::Set,
        default_value = "false"
    )]
    pub upgrade_agent_market: bool,

    /// Submit upgrades without checking that the proxy and the new
    /// implementation hold code
    #[arg(long)]
    pub skip_safety_checks: bool,
}

impl UpgradeArgs {
    /// The upgrade configuration for `network`
    pub fn config(&self, network: String) -> UpgradeConfig {
        UpgradeConfig {
            network,
            upgrade_tee_verifier: self.upgrade_tee_verifier,
            upgrade_verifier: self.upgrade_verifier,
            upgrade_agent_nft: self.upgrade_agent_nft,
            upgrade_agent_market: self.upgrade_agent_market,
            perform_safety_checks: !self.skip_safety_checks,
        }
    }
}

/// Verify contract sources. Each group is enabled by setting its flag to
/// exactly `true`.
#[derive(Args, Clone, Debug)]
pub struct VerifyArgs {
    /// The target network, e.g. `zgTestnet`
    #[arg(value_name = "NETWORK")]
    pub network: Option<String>,

    /// Verify the TEEVerifier proxy, beacon and implementation
    #[arg(
        long,
        env = VERIFY_TEE_VERIFIER_ENV,
        value_parser = parse_enabled_flag,
        action = ArgAction::Set,
        default_value = "false"
    )]
    pub verify_tee_verifier: bool,

    /// Verify the Verifier proxy, beacon and implementation
    #[arg(
        long,
        env = VERIFY_VERIFIER_ENV,
        value_parser = parse_enabled_flag,
        action = ArgAction::Set,
        default_value = "false"
    )]
    pub verify_verifier: bool,

    /// Verify the AgentNFT proxy, beacon and implementation
    #[arg(
        long,
        env = VERIFY_AGENT_NFT_ENV,
        value_parser = parse_enabled_flag,
        action = ArgAction::Set,
        default_value = "false"
    )]
    pub verify_agent_nft: bool,

    /// Verify the AgentMarket proxy, beacon and implementation
    #[arg(
        long,
        env = VERIFY_AGENT_MARKET_ENV,
        value_parser = parse_enabled_flag,
        action = ArgAction::Set,
        default_value = "false"
    )]
    pub verify_agent_market: bool,
}

impl VerifyArgs {
    /// The target network, which only the positional argument selects
    pub fn network_name(&self) -> Result<String, ScriptError> {
        self.network.clone().ok_or_else(|| missing_network("verify"))
    }

    /// The environment keys of the enabled groups
    pub fn enabled_groups(&self) -> Vec<&'static str> {
        [
            (self.verify_tee_verifier, VERIFY_TEE_VERIFIER_ENV),
            (self.verify_verifier, VERIFY_VERIFIER_ENV),
            (self.verify_agent_nft, VERIFY_AGENT_NFT_ENV),
            (self.verify_agent_market, VERIFY_AGENT_MARKET_ENV),
        ]
        .into_iter()
        .filter_map(|(enabled, key)| enabled.then_some(key))
        .collect()
    }
}

/// Mint an iNFT
#[derive(Args, Clone, Debug)]
pub struct MintArgs {
    /// The target network
    #[command(flatten)]
    pub network: NetworkArgs,

    /// The recipient, defaulting to the deployer
    #[arg(long)]
    pub to: Option<Address>,

    /// The description of the intelligent data
    #[arg(long, default_value = DEFAULT_MINT_DESCRIPTION)]
    pub description: String,

    /// The message whose EIP-191 hash becomes the data hash
    #[arg(long, default_value = DEFAULT_MINT_MESSAGE)]
    pub message: String,
}

impl MintArgs {
    /// The mint described on the command line
    pub fn request(&self) -> MintRequest {
        MintRequest {
            to: self.to,
            description: self.description.clone(),
            message: self.message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;
    use crate::types::ContractName;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("agent-nft-scripts").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_network_flag_beats_positional() {
        let cli = parse(&["deploy", "hardhat", "--network", "zgTestnet"]);
        let Command::Deploy(args) = &cli.command else {
            panic!("expected deploy");
        };
        let mut global = cli.global.clone();
        global.network_override = None;
        assert_eq!(args.network.resolve(&global, "deploy").unwrap(), "zgTestnet");

        global.network_override = Some("zgMainnet".to_string());
        assert_eq!(args.network.resolve(&global, "deploy").unwrap(), "zgMainnet");
    }

    #[test]
    fn test_missing_network_is_config_error() {
        let cli = parse(&["mint"]);
        let Command::Mint(args) = &cli.command else {
            panic!("expected mint");
        };
        let mut global = cli.global.clone();
        global.network_override = None;
        let err = args.network.resolve(&global, "mint").unwrap_err();
        assert!(matches!(err, ScriptError::Config(_)));
        assert!(err.to_string().contains("Usage"));
    }

    #[test]
    fn test_verify_takes_positional_network_only() {
        let args = ["agent-nft-scripts", "verify", "--network", "zgTestnet"];
        assert!(Cli::try_parse_from(args).is_err());

        let mut cli = parse(&["verify"]);
        cli.global.network_override = Some("zgMainnet".to_string());
        let Command::Verify(args) = &cli.command else {
            panic!("expected verify");
        };
        let err = args.network_name().unwrap_err();
        assert!(matches!(err, ScriptError::Config(_)));
        assert!(err.to_string().contains("agent-nft-scripts verify <NETWORK>"));

        let cli = parse(&["verify", "zgTestnet"]);
        let Command::Verify(args) = &cli.command else {
            panic!("expected verify");
        };
        assert_eq!(args.network_name().unwrap(), "zgTestnet");
    }

    #[test]
    fn test_upgrade_flags() {
        let cli = parse(&[
            "upgrade",
            "zgTestnet",
            "--upgrade-verifier",
            "true",
            "--upgrade-agent-nft",
            "yes",
            "--skip-safety-checks",
        ]);
        let Command::Upgrade(args) = cli.command else {
            panic!("expected upgrade");
        };
        let config = args.config("zgTestnet".to_string());
        // Only the exact value `true` enables a contract
        assert_eq!(config.enabled_contracts(), vec![ContractName::Verifier]);
        assert!(!config.perform_safety_checks);
    }

    #[test]
    fn test_deploy_tags_and_params() {
        let cli = parse(&[
            "--artifacts-dir",
            "out/artifacts",
            "deploy",
            "zgTestnet",
            "--tags",
            "agentNFT,agentMarket",
            "--mint-fee",
            "5",
            "--attestation-contract",
            "0x00000000000000000000000000000000000000aa",
        ]);
        assert_eq!(cli.global.artifacts_dir, PathBuf::from("out/artifacts"));
        let Command::Deploy(args) = cli.command else {
            panic!("expected deploy");
        };
        assert_eq!(args.tags, vec!["agentNFT", "agentMarket"]);

        let params = args.params();
        assert_eq!(params.mint_fee, U256::from(5));
        assert_eq!(
            params.attestation_contract,
            Some(Address::with_last_byte(0xaa))
        );
        assert_eq!(params.trusted_measurements.rtmr3.len(), 32);
    }

    #[test]
    fn test_verify_groups() {
        let cli = parse(&["verify", "zgMainnet", "--verify-agent-market", "true"]);
        let Command::Verify(args) = cli.command else {
            panic!("expected verify");
        };
        assert_eq!(args.enabled_groups(), vec![VERIFY_AGENT_MARKET_ENV]);
    }
}
