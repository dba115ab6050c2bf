//! Minting of an iNFT from the deployed AgentNFT

use alloy::primitives::{eip191_hash_message, Address, B256};
use tracing::info;

use crate::{
    chain::Chain,
    constants::{DEFAULT_MINT_DESCRIPTION, DEFAULT_MINT_MESSAGE},
    deployments::DeploymentRecordStore,
    errors::ScriptError,
    solidity::IAgentNFT,
    types::ContractName,
};

/// The iNFT to mint
#[derive(Clone, Debug)]
pub struct MintRequest {
    /// The recipient, defaulting to the signer
    pub to: Option<Address>,
    /// The description of the intelligent data
    pub description: String,
    /// The message whose EIP-191 hash is the data hash
    pub message: String,
}

impl Default for MintRequest {
    fn default() -> Self {
        Self {
            to: None,
            description: DEFAULT_MINT_DESCRIPTION.to_string(),
            message: DEFAULT_MINT_MESSAGE.to_string(),
        }
    }
}

/// Mint an iNFT from the recorded AgentNFT, returning the transaction hash
pub async fn mint<C: Chain>(
    chain: &C,
    store: &DeploymentRecordStore,
    request: &MintRequest,
) -> Result<B256, ScriptError> {
    let agent_nft = store.get(&ContractName::AgentNft.proxy_record())?.address;
    info!(%agent_nft, "using AgentNFT");

    let to = request.to.unwrap_or_else(|| chain.signer());
    let data = IAgentNFT::IntelligentData {
        dataDescription: request.description.clone(),
        dataHash: eip191_hash_message(&request.message),
    };

    let tx_hash = chain.mint_agent(agent_nft, vec![data], to).await?;
    info!(%to, tx_hash = %format!("{tx_hash:#x}"), "minted iNFT");
    Ok(tx_hash)
}
