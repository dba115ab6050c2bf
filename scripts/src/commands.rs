//! Implementations of the various deploy scripts

use itertools::Itertools;
use tracing::{info, warn};

use crate::{
    artifacts::ArtifactStore,
    chain::{setup_client, Chain, RpcChain},
    cli::{DeployArgs, GlobalArgs, MintArgs, UpgradeArgs, VerifyArgs},
    config::{DeployConfig, NetworkConfig, VerifyConfig},
    constants::{
        UPGRADE_AGENT_MARKET_ENV, UPGRADE_AGENT_NFT_ENV, UPGRADE_TEE_VERIFIER_ENV,
        UPGRADE_VERIFIER_ENV,
    },
    deploy::run_pipeline,
    deployments::DeploymentRecordStore,
    errors::ScriptError,
    mint::mint as mint_inft,
    types::{select_by_tags, ContractName},
    upgrade::UpgradeOrchestrator,
    verify::{CommandBackend, VerificationDispatcher, CONTRACT_GROUPS},
};

/// Resolve the configuration of the named network from the command line
/// and the process environment
fn network_config(name: &str, global: &GlobalArgs) -> Result<NetworkConfig, ScriptError> {
    NetworkConfig::resolve(name, global.overrides(), |key| std::env::var(key).ok())
}

/// Connect to the network with its configured key
async fn connect(network: &NetworkConfig) -> Result<RpcChain, ScriptError> {
    let client = setup_client(
        network.require_private_key()?,
        network.require_rpc_url()?,
        network.chain_id,
    )
    .await?;
    info!(network = %network.name, deployer = %client.signer(), "connected");
    Ok(client)
}

/// Deploy the selected contracts and their dependencies
pub async fn deploy(args: DeployArgs, global: &GlobalArgs) -> Result<bool, ScriptError> {
    let name = args.network.resolve(global, "deploy")?;
    let network = network_config(&name, global)?;

    let selected = select_by_tags(&args.tags);
    if selected.is_empty() {
        warn!(tags = %args.tags.iter().join(","), "no contracts carry the requested tags");
        return Ok(true);
    }

    let client = connect(&network).await?;
    let store = DeploymentRecordStore::new(&network.deployments_dir);
    let artifacts = ArtifactStore::new(&global.artifacts_dir);
    let config = DeployConfig {
        network: name,
        selected,
        params: args.params(),
    };

    let summary = run_pipeline(&client, &store, &artifacts, &config).await?;
    summary.log();
    Ok(summary.overall_success())
}

/// Upgrade the enabled contracts
pub async fn upgrade(args: UpgradeArgs, global: &GlobalArgs) -> Result<bool, ScriptError> {
    let name = args.network.resolve(global, "upgrade")?;
    let network = network_config(&name, global)?;
    let config = args.config(name);

    let enabled = config.enabled_contracts();
    if enabled.is_empty() {
        info!("No contracts enabled for upgrade. Set environment variables to enable upgrades:");
        for contract in ContractName::ALL {
            info!("  {}=true", upgrade_env_key(contract));
        }
        return Ok(true);
    }
    info!(
        network = %config.network,
        contracts = %enabled.iter().join(", "),
        safety_checks = config.perform_safety_checks,
        "starting upgrade"
    );

    let client = connect(&network).await?;
    let store = DeploymentRecordStore::new(&network.deployments_dir);
    let artifacts = ArtifactStore::new(&global.artifacts_dir);

    let summary = UpgradeOrchestrator::new(&client, &store, &artifacts)
        .run(&config)
        .await;
    summary.log();
    Ok(summary.overall_success())
}

/// The environment variable enabling the upgrade of `contract`
fn upgrade_env_key(contract: ContractName) -> &'static str {
    match contract {
        ContractName::TeeVerifier => UPGRADE_TEE_VERIFIER_ENV,
        ContractName::Verifier => UPGRADE_VERIFIER_ENV,
        ContractName::AgentNft => UPGRADE_AGENT_NFT_ENV,
        ContractName::AgentMarket => UPGRADE_AGENT_MARKET_ENV,
    }
}

/// Verify the enabled contract groups
pub async fn verify(args: VerifyArgs, global: &GlobalArgs) -> Result<bool, ScriptError> {
    let name = args.network_name()?;
    let network = network_config(&name, global)?;
    let config = VerifyConfig::new(name, args.enabled_groups());

    if config.enabled_groups.is_empty() {
        info!("No contract groups enabled. Set environment variables to enable verification:");
        for group in &CONTRACT_GROUPS {
            info!("  {}=true", group.env_key);
        }
        return Ok(true);
    }
    info!("Enabled groups: {}", config.enabled_groups.iter().join(", "));

    let store = DeploymentRecordStore::new(&network.deployments_dir);
    let backend = CommandBackend::new(&config);
    let summary = VerificationDispatcher::new(&backend, &store, &config)
        .run()
        .await?;
    summary.log();
    Ok(summary.overall_success())
}

/// Mint an iNFT from the deployed AgentNFT
pub async fn mint(args: MintArgs, global: &GlobalArgs) -> Result<bool, ScriptError> {
    let name = args.network.resolve(global, "mint")?;
    let network = network_config(&name, global)?;

    let client = connect(&network).await?;
    let store = DeploymentRecordStore::new(&network.deployments_dir);
    mint_inft(&client, &store, &args.request()).await?;
    Ok(true)
}
