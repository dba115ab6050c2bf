//! The chain interactions the scripts perform, behind a trait so the
//! orchestration logic can run against an in-memory chain in tests

use std::str::FromStr;

use alloy::{
    network::{Ethereum, TransactionBuilder},
    primitives::{Address, Bytes, B256, U256},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::{TransactionReceipt, TransactionRequest},
    signers::local::PrivateKeySigner,
    transports::http::reqwest::Url,
};
use tracing::debug;

use crate::{
    errors::ScriptError,
    solidity::{IAgentNFT, ITEEVerifier, IUpgradeableBeacon, IVersioned},
};

/// The provider type used against live networks
pub type Wallet = DynProvider<Ethereum>;

/// A contract created by a deployment transaction
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeployedContract {
    /// The address of the new contract
    pub address: Address,
    /// The hash of the deployment transaction
    pub transaction_hash: B256,
}

/// The chain reads and writes performed by the scripts
///
/// Every write awaits inclusion of its transaction before returning; there
/// is no way to abandon a submitted transaction.
#[allow(async_fn_in_trait)]
pub trait Chain {
    /// The address transactions are sent from
    fn signer(&self) -> Address;

    /// Read a raw storage word
    async fn get_storage_at(&self, address: Address, slot: B256) -> Result<B256, ScriptError>;

    /// Read the runtime bytecode at an address
    async fn get_code(&self, address: Address) -> Result<Bytes, ScriptError>;

    /// Submit a contract creation transaction and await its receipt
    async fn deploy(&self, init_code: Bytes) -> Result<DeployedContract, ScriptError>;

    /// Read the implementation a beacon points at
    async fn beacon_implementation(&self, beacon: Address) -> Result<Address, ScriptError>;

    /// Read the owner of a beacon
    async fn beacon_owner(&self, beacon: Address) -> Result<Address, ScriptError>;

    /// Point a beacon at a new implementation, returning the transaction hash
    async fn upgrade_beacon(
        &self,
        beacon: Address,
        new_implementation: Address,
    ) -> Result<B256, ScriptError>;

    /// Read the `VERSION` constant of a managed contract
    async fn contract_version(&self, address: Address) -> Result<String, ScriptError>;

    /// Read whether a TEEVerifier has accepted its attestation, and the
    /// attested TEE address
    async fn tee_status(&self, tee_verifier: Address) -> Result<(bool, Address), ScriptError>;

    /// Mint an iNFT, returning the transaction hash
    async fn mint_agent(
        &self,
        agent_nft: Address,
        datas: Vec<IAgentNFT::IntelligentData>,
        to: Address,
    ) -> Result<B256, ScriptError>;
}

/// A [`Chain`] backed by a JSON-RPC endpoint and a local signer
#[derive(Clone)]
pub struct RpcChain {
    /// The signing provider
    provider: Wallet,
    /// The signer's address
    signer: Address,
}

/// Sets up the client with which to send transactions, checking the
/// chain ID of the endpoint if one is expected
pub async fn setup_client(
    priv_key: &str,
    rpc_url: &str,
    expected_chain_id: Option<u64>,
) -> Result<RpcChain, ScriptError> {
    let url = Url::parse(rpc_url).map_err(|e| ScriptError::ClientInitialization(e.to_string()))?;
    let signer = PrivateKeySigner::from_str(priv_key)
        .map_err(|e| ScriptError::ClientInitialization(e.to_string()))?;
    let signer_address = signer.address();

    let provider = ProviderBuilder::new().wallet(signer).connect_http(url);
    let provider = DynProvider::new(provider);

    let chain_id = provider
        .get_chain_id()
        .await
        .map_err(|e| ScriptError::ClientInitialization(e.to_string()))?;
    if let Some(expected) = expected_chain_id {
        if chain_id != expected {
            return Err(ScriptError::ClientInitialization(format!(
                "endpoint reports chain ID {chain_id}, expected {expected}"
            )));
        }
    }
    debug!(chain_id, signer = %signer_address, "client initialized");

    Ok(RpcChain {
        provider,
        signer: signer_address,
    })
}

/// Ensure a mined transaction did not revert
fn ensure_success(receipt: &TransactionReceipt, what: &str) -> Result<(), ScriptError> {
    if receipt.status() {
        Ok(())
    } else {
        Err(ScriptError::ContractInteraction(format!(
            "{what} reverted in tx {:#x}",
            receipt.transaction_hash
        )))
    }
}

impl Chain for RpcChain {
    fn signer(&self) -> Address {
        self.signer
    }

    async fn get_storage_at(&self, address: Address, slot: B256) -> Result<B256, ScriptError> {
        let word: U256 = self
            .provider
            .get_storage_at(address, U256::from_be_bytes(slot.0))
            .await
            .map_err(|e| ScriptError::StorageReadFailure(e.to_string()))?;
        Ok(B256::from(word.to_be_bytes::<32>()))
    }

    async fn get_code(&self, address: Address) -> Result<Bytes, ScriptError> {
        self.provider
            .get_code_at(address)
            .await
            .map_err(|e| ScriptError::ContractInteraction(e.to_string()))
    }

    async fn deploy(&self, init_code: Bytes) -> Result<DeployedContract, ScriptError> {
        let tx = TransactionRequest::default()
            .with_from(self.signer)
            .with_deploy_code(init_code);
        let receipt = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| ScriptError::ContractDeployment(e.to_string()))?
            .get_receipt()
            .await
            .map_err(|e| ScriptError::ContractDeployment(e.to_string()))?;

        if !receipt.status() {
            return Err(ScriptError::ContractDeployment(format!(
                "deployment reverted in tx {:#x}",
                receipt.transaction_hash
            )));
        }
        let address = receipt.contract_address.ok_or_else(|| {
            ScriptError::ContractDeployment("receipt has no contract address".to_string())
        })?;

        Ok(DeployedContract {
            address,
            transaction_hash: receipt.transaction_hash,
        })
    }

    async fn beacon_implementation(&self, beacon: Address) -> Result<Address, ScriptError> {
        IUpgradeableBeacon::new(beacon, &self.provider)
            .implementation()
            .call()
            .await
            .map_err(|e| ScriptError::ContractInteraction(e.to_string()))
    }

    async fn beacon_owner(&self, beacon: Address) -> Result<Address, ScriptError> {
        IUpgradeableBeacon::new(beacon, &self.provider)
            .owner()
            .call()
            .await
            .map_err(|e| ScriptError::ContractInteraction(e.to_string()))
    }

    async fn upgrade_beacon(
        &self,
        beacon: Address,
        new_implementation: Address,
    ) -> Result<B256, ScriptError> {
        let receipt = IUpgradeableBeacon::new(beacon, &self.provider)
            .upgradeTo(new_implementation)
            .send()
            .await
            .map_err(|e| ScriptError::ContractInteraction(e.to_string()))?
            .get_receipt()
            .await
            .map_err(|e| ScriptError::ContractInteraction(e.to_string()))?;

        ensure_success(&receipt, "upgradeTo")?;
        Ok(receipt.transaction_hash)
    }

    async fn contract_version(&self, address: Address) -> Result<String, ScriptError> {
        IVersioned::new(address, &self.provider)
            .VERSION()
            .call()
            .await
            .map_err(|e| ScriptError::ContractInteraction(e.to_string()))
    }

    async fn tee_status(&self, tee_verifier: Address) -> Result<(bool, Address), ScriptError> {
        let contract = ITEEVerifier::new(tee_verifier, &self.provider);
        let verified = contract
            .verified()
            .call()
            .await
            .map_err(|e| ScriptError::ContractInteraction(e.to_string()))?;
        let tee_address = contract
            .teeAddress()
            .call()
            .await
            .map_err(|e| ScriptError::ContractInteraction(e.to_string()))?;

        Ok((verified, tee_address))
    }

    async fn mint_agent(
        &self,
        agent_nft: Address,
        datas: Vec<IAgentNFT::IntelligentData>,
        to: Address,
    ) -> Result<B256, ScriptError> {
        let receipt = IAgentNFT::new(agent_nft, &self.provider)
            .mint(datas, to)
            .send()
            .await
            .map_err(|e| ScriptError::ContractInteraction(e.to_string()))?
            .get_receipt()
            .await
            .map_err(|e| ScriptError::ContractInteraction(e.to_string()))?;

        ensure_success(&receipt, "mint")?;
        Ok(receipt.transaction_hash)
    }
}
