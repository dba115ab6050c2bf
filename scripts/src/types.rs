//! Type definitions used throughout the scripts

use std::{
    collections::{BTreeSet, HashMap, VecDeque},
    fmt::{self, Display},
};

use clap::ValueEnum;

use crate::{
    constants::{BEACON_RECORD_SUFFIX, IMPL_RECORD_SUFFIX},
    errors::ScriptError,
};

/// The upgradeable contracts managed by the scripts
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContractName {
    /// The TEE attestation verifier
    TeeVerifier,
    /// The ownership-proof verifier
    Verifier,
    /// The agent iNFT collection
    AgentNft,
    /// The agent marketplace
    AgentMarket,
}

impl ContractName {
    /// All contracts, in dependency order
    pub const ALL: [ContractName; 4] = [
        ContractName::TeeVerifier,
        ContractName::Verifier,
        ContractName::AgentNft,
        ContractName::AgentMarket,
    ];

    /// The contract name as it appears in artifacts and deployment records
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractName::TeeVerifier => "TEEVerifier",
            ContractName::Verifier => "Verifier",
            ContractName::AgentNft => "AgentNFT",
            ContractName::AgentMarket => "AgentMarket",
        }
    }

    /// The name of the record holding the proxy
    pub fn proxy_record(&self) -> String {
        self.as_str().to_string()
    }

    /// The name of the record holding the beacon
    pub fn beacon_record(&self) -> String {
        format!("{}{}", self.as_str(), BEACON_RECORD_SUFFIX)
    }

    /// The name of the record holding the implementation
    pub fn impl_record(&self) -> String {
        format!("{}{}", self.as_str(), IMPL_RECORD_SUFFIX)
    }

    /// The static identity of this contract
    pub fn identity(&self) -> &'static ContractIdentity {
        // `CONTRACTS` is indexed in the same order as `ALL`
        &CONTRACTS[*self as usize]
    }
}

impl Display for ContractName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node of the deployment dependency graph
#[derive(Debug)]
pub struct ContractIdentity {
    /// The contract
    pub name: ContractName,
    /// The contracts that must be deployed first
    pub dependencies: &'static [ContractName],
    /// The lifecycle tags the contract is deployed under
    pub tags: &'static [&'static str],
}

impl ContractIdentity {
    /// Whether the contract carries the given tag
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(&tag)
    }
}

/// The fixed dependency graph of the managed contracts
pub static CONTRACTS: [ContractIdentity; 4] = [
    ContractIdentity {
        name: ContractName::TeeVerifier,
        dependencies: &[],
        tags: &["tee-verifier", "core", "prod"],
    },
    ContractIdentity {
        name: ContractName::Verifier,
        dependencies: &[ContractName::TeeVerifier],
        tags: &["verifier", "core", "prod"],
    },
    ContractIdentity {
        name: ContractName::AgentNft,
        dependencies: &[ContractName::Verifier],
        tags: &["agentNFT", "core", "prod"],
    },
    ContractIdentity {
        name: ContractName::AgentMarket,
        dependencies: &[ContractName::AgentNft],
        tags: &["agentMarket", "core", "prod"],
    },
];

/// Select the contracts carrying any of the given tags, or every contract
/// if no tags are given
pub fn select_by_tags(tags: &[String]) -> Vec<ContractName> {
    CONTRACTS
        .iter()
        .filter(|c| tags.is_empty() || tags.iter().any(|t| c.has_tag(t)))
        .map(|c| c.name)
        .collect()
}

/// Order the selected contracts, plus their transitive dependencies, so
/// that every contract appears after all of its dependencies
pub fn topological_order(selected: &[ContractName]) -> Result<Vec<ContractName>, ScriptError> {
    // Close the selection over dependencies
    let mut closure = BTreeSet::new();
    let mut stack: Vec<ContractName> = selected.to_vec();
    while let Some(name) = stack.pop() {
        if closure.insert(name) {
            stack.extend(name.identity().dependencies);
        }
    }

    // Kahn's algorithm over the closed subgraph
    let mut in_degree: HashMap<ContractName, usize> = closure
        .iter()
        .map(|name| (*name, name.identity().dependencies.len()))
        .collect();
    let mut ready: VecDeque<ContractName> = closure
        .iter()
        .filter(|name| in_degree[*name] == 0)
        .copied()
        .collect();

    let mut order = Vec::with_capacity(closure.len());
    while let Some(name) = ready.pop_front() {
        order.push(name);
        for dependent in closure.iter() {
            if dependent.identity().dependencies.contains(&name) {
                let degree = in_degree.entry(*dependent).or_default();
                *degree -= 1;
                if *degree == 0 {
                    ready.push_back(*dependent);
                }
            }
        }
    }

    if order.len() != closure.len() {
        return Err(ScriptError::Config(
            "dependency cycle in contract graph".to_string(),
        ));
    }

    Ok(order)
}
