//! Idempotent deployment of the contracts behind beacon proxies

use alloy::{
    hex,
    primitives::{Address, Bytes, B256},
    sol_types::{SolCall, SolValue},
};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::{
    artifacts::{Artifact, ArtifactStore},
    chain::{Chain, DeployedContract},
    config::{DeployConfig, DeployParams},
    constants::{BEACON_ARTIFACT, BEACON_PROXY_ARTIFACT},
    deployments::{DeploymentRecord, DeploymentRecordStore},
    errors::ScriptError,
    solidity::{IAgentMarket, IAgentNFT, ITEEVerifier, IVerifier},
    types::{topological_order, ContractName},
};

/// The storage locations embedded in the AgentNFT
#[derive(Serialize)]
struct StorageInfo<'a> {
    /// The storage chain RPC endpoint
    #[serde(rename = "chainURL")]
    chain_url: &'a str,
    /// The storage indexer endpoint
    #[serde(rename = "indexerURL")]
    indexer_url: &'a str,
}

/// What deploying a contract did
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeployStatus {
    /// A record already existed; nothing was sent
    AlreadyDeployed(Address),
    /// A new proxy was deployed
    Deployed {
        /// The proxy
        proxy: Address,
        /// The beacon behind the proxy
        beacon: Address,
        /// The implementation behind the beacon
        implementation: Address,
        /// The proxy deployment transaction
        transaction_hash: B256,
    },
}

/// Deploys one contract at a time, skipping contracts that already have a
/// deployment record
pub struct IdempotentDeployer<'a, C> {
    /// The chain to deploy on
    chain: &'a C,
    /// The network's deployment records
    store: &'a DeploymentRecordStore,
    /// The compiled contracts
    artifacts: &'a ArtifactStore,
    /// The initializer values
    params: &'a DeployParams,
}

impl<'a, C: Chain> IdempotentDeployer<'a, C> {
    /// Constructor
    pub fn new(
        chain: &'a C,
        store: &'a DeploymentRecordStore,
        artifacts: &'a ArtifactStore,
        params: &'a DeployParams,
    ) -> Self {
        Self {
            chain,
            store,
            artifacts,
            params,
        }
    }

    /// Deploy `contract` behind a beacon proxy unless it is already recorded
    ///
    /// The dependencies' records are read before anything is sent, so a
    /// missing dependency fails with `RecordNotFound` and leaves both the
    /// chain and the records untouched.
    pub async fn deploy_contract(&self, contract: ContractName) -> Result<DeployStatus, ScriptError> {
        info!(%contract, deployer = %self.chain.signer(), "deploying");

        // An unreadable record fails here, before anything is sent
        if let Some(existing) = self.store.read(&contract.proxy_record())? {
            info!(%contract, address = %existing.address, "already deployed");
            return Ok(DeployStatus::AlreadyDeployed(existing.address));
        }

        let init_data = self.initializer(contract)?;
        let implementation_artifact = self.artifacts.load(contract.as_str())?;
        let beacon_artifact = self.artifacts.load(BEACON_ARTIFACT)?;
        let proxy_artifact = self.artifacts.load(BEACON_PROXY_ARTIFACT)?;

        let (implementation, fresh_implementation) =
            self.ensure_implementation(contract, &implementation_artifact).await?;
        let beacon = self
            .ensure_beacon(contract, &beacon_artifact, implementation, fresh_implementation)
            .await?;

        let constructor_args = (beacon, init_data.clone()).abi_encode_params();
        let proxy = self.chain.deploy(init_code(&proxy_artifact, &constructor_args)).await?;
        info!(%contract, address = %proxy.address, "deployed beacon proxy");

        self.store.persist(&contract.proxy_record(), |record| {
            record.address = proxy.address;
            record.args = vec![
                Value::String(beacon.to_string()),
                Value::String(hex::encode_prefixed(&init_data)),
            ];
            record.transaction_hash = Some(proxy.transaction_hash);
            record.abi = Some(implementation_artifact.abi.clone());
            record.implementation = Some(implementation);
        })?;

        if contract == ContractName::TeeVerifier {
            self.log_tee_status(proxy.address).await;
        }

        Ok(DeployStatus::Deployed {
            proxy: proxy.address,
            beacon,
            implementation,
            transaction_hash: proxy.transaction_hash,
        })
    }

    /// Build the initializer call of `contract` from its dependencies'
    /// records and the deploy parameters
    pub fn initializer(&self, contract: ContractName) -> Result<Bytes, ScriptError> {
        let admin = self.chain.signer();
        let params = self.params;

        let calldata = match contract {
            ContractName::TeeVerifier => {
                let m = &params.trusted_measurements;
                ITEEVerifier::initializeCall {
                    tdxQuote: params.tdx_quote.clone(),
                    measurements: ITEEVerifier::TrustedMeasurements {
                        mrtd: m.mrtd.clone(),
                        rtmr0: m.rtmr0.clone(),
                        rtmr1: m.rtmr1.clone(),
                        rtmr2: m.rtmr2.clone(),
                        rtmr3: m.rtmr3.clone(),
                    },
                }
                .abi_encode()
            }
            ContractName::Verifier => {
                let attestation = match params.attestation_contract {
                    Some(address) => {
                        info!(%address, "using attestation contract override");
                        address
                    }
                    None => self.dependency(ContractName::TeeVerifier)?,
                };
                IVerifier::initializeCall {
                    configs: vec![IVerifier::AttestationConfig {
                        oracleType: params.verifier_type,
                        contractAddress: attestation,
                    }],
                    admin,
                }
                .abi_encode()
            }
            ContractName::AgentNft => {
                let verifier = self.dependency(ContractName::Verifier)?;
                let storage_info = serde_json::to_string(&StorageInfo {
                    chain_url: &params.storage_chain_url,
                    indexer_url: &params.storage_indexer_url,
                })
                .map_err(|e| ScriptError::CalldataConstruction(e.to_string()))?;

                IAgentNFT::initializeCall {
                    name: params.nft_name.clone(),
                    symbol: params.nft_symbol.clone(),
                    storageInfo: storage_info,
                    verifier,
                    admin,
                }
                .abi_encode()
            }
            ContractName::AgentMarket => {
                let agent_nft = self.dependency(ContractName::AgentNft)?;
                IAgentMarket::initializeCall {
                    agentNFT: agent_nft,
                    feeRate: params.fee_rate,
                    admin,
                    mintFee: params.mint_fee,
                    discountMintFee: params.discount_mint_fee,
                }
                .abi_encode()
            }
        };

        Ok(calldata.into())
    }

    /// The proxy address of a dependency, which must be recorded
    fn dependency(&self, dependency: ContractName) -> Result<Address, ScriptError> {
        let address = self.store.get(&dependency.proxy_record())?.address;
        info!(%dependency, %address, "using dependency");
        Ok(address)
    }

    /// A record whose address holds live code
    async fn live_record(&self, name: &str) -> Result<Option<DeploymentRecord>, ScriptError> {
        let Some(record) = self.store.read(name)? else {
            return Ok(None);
        };
        if self.chain.get_code(record.address).await?.is_empty() {
            warn!(record = name, address = %record.address, "recorded contract has no code");
            return Ok(None);
        }
        Ok(Some(record))
    }

    /// Reuse the recorded implementation, or deploy and record a new one
    ///
    /// Returns the implementation and whether it was freshly deployed.
    async fn ensure_implementation(
        &self,
        contract: ContractName,
        artifact: &Artifact,
    ) -> Result<(Address, bool), ScriptError> {
        let name = contract.impl_record();
        if let Some(record) = self.live_record(&name).await? {
            info!(%contract, address = %record.address, "reusing implementation");
            return Ok((record.address, false));
        }

        let DeployedContract {
            address,
            transaction_hash,
        } = self.chain.deploy(artifact.bytecode.clone()).await?;
        info!(%contract, %address, "deployed implementation");

        self.store.persist(&name, |record| {
            record.address = address;
            record.args = Vec::new();
            record.transaction_hash = Some(transaction_hash);
            record.abi = Some(artifact.abi.clone());
        })?;
        Ok((address, true))
    }

    /// Reuse the recorded beacon, or deploy and record a new one pointing at
    /// `implementation`
    ///
    /// A beacon is only reused together with the implementation it was
    /// recorded against.
    async fn ensure_beacon(
        &self,
        contract: ContractName,
        artifact: &Artifact,
        implementation: Address,
        fresh_implementation: bool,
    ) -> Result<Address, ScriptError> {
        let name = contract.beacon_record();
        if !fresh_implementation {
            if let Some(record) = self.live_record(&name).await? {
                info!(%contract, address = %record.address, "reusing beacon");
                return Ok(record.address);
            }
        }

        let owner = self.chain.signer();
        let constructor_args = (implementation, owner).abi_encode_params();
        let DeployedContract {
            address,
            transaction_hash,
        } = self.chain.deploy(init_code(artifact, &constructor_args)).await?;
        info!(%contract, %address, "deployed beacon");

        self.store.persist(&name, |record| {
            record.address = address;
            record.args = vec![
                Value::String(implementation.to_string()),
                Value::String(owner.to_string()),
            ];
            record.transaction_hash = Some(transaction_hash);
            record.abi = Some(artifact.abi.clone());
        })?;
        Ok(address)
    }

    /// Log the attestation state of a fresh TEEVerifier
    async fn log_tee_status(&self, tee_verifier: Address) {
        match self.chain.tee_status(tee_verifier).await {
            Ok((verified, tee_address)) => info!(verified, %tee_address, "TEEVerifier status"),
            Err(e) => warn!("could not read TEEVerifier status: {e}"),
        }
    }
}

/// Append ABI-encoded constructor arguments to an artifact's bytecode
fn init_code(artifact: &Artifact, constructor_args: &[u8]) -> Bytes {
    let mut code = artifact.bytecode.to_vec();
    code.extend_from_slice(constructor_args);
    code.into()
}

// ------------
// | Pipeline |
// ------------

/// The result of deploying one contract
#[derive(Clone, Debug)]
pub struct DeployOutcome {
    /// The contract
    pub contract: ContractName,
    /// What was done, if the deployment succeeded
    pub status: Option<DeployStatus>,
    /// Why the deployment failed, if it did
    pub error: Option<ScriptError>,
}

impl DeployOutcome {
    /// Whether the contract is deployed after the run
    pub fn success(&self) -> bool {
        self.status.is_some()
    }
}

/// The results of a deploy run
#[derive(Clone, Debug, Default)]
pub struct DeploySummary {
    /// One outcome per contract, in deployment order
    pub outcomes: Vec<DeployOutcome>,
}

impl DeploySummary {
    /// The outcome for a contract, if it was part of the run
    pub fn outcome(&self, contract: ContractName) -> Option<&DeployOutcome> {
        self.outcomes.iter().find(|o| o.contract == contract)
    }

    /// Whether every contract in the run is deployed
    pub fn overall_success(&self) -> bool {
        self.outcomes.iter().all(DeployOutcome::success)
    }

    /// Log the per-contract and overall result
    pub fn log(&self) {
        info!("=== Deploy Summary ===");
        for outcome in &self.outcomes {
            let contract = outcome.contract;
            match (&outcome.status, &outcome.error) {
                (Some(DeployStatus::AlreadyDeployed(address)), _) => {
                    info!("{contract}: already deployed at {address}")
                }
                (Some(DeployStatus::Deployed { proxy, .. }), _) => {
                    info!("{contract}: deployed at {proxy}")
                }
                (None, Some(e)) => error!("{contract}: failed ({e})"),
                (None, None) => error!("{contract}: failed"),
            }
        }

        if self.overall_success() {
            info!("Overall deploy: Success");
        } else {
            error!("Overall deploy: Failed");
        }
    }
}

/// Deploy the selected contracts and their dependencies, dependencies first
///
/// A failed contract does not stop the run; its dependents then fail on
/// their missing dependency record.
pub async fn run_pipeline<C: Chain>(
    chain: &C,
    store: &DeploymentRecordStore,
    artifacts: &ArtifactStore,
    config: &DeployConfig,
) -> Result<DeploySummary, ScriptError> {
    let order = topological_order(&config.selected)?;
    info!(network = %config.network, order = ?order.iter().map(ContractName::as_str).collect::<Vec<_>>(), "deployment order");

    let deployer = IdempotentDeployer::new(chain, store, artifacts, &config.params);
    let mut summary = DeploySummary::default();
    for contract in order {
        let outcome = match deployer.deploy_contract(contract).await {
            Ok(status) => DeployOutcome {
                contract,
                status: Some(status),
                error: None,
            },
            Err(e) => {
                error!(%contract, "deployment failed: {e}");
                DeployOutcome {
                    contract,
                    status: None,
                    error: Some(e),
                }
            }
        };
        summary.outcomes.push(outcome);
    }

    Ok(summary)
}
