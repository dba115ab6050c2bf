//! Pre-upgrade validation that both ends of an upgrade are live code

use alloy::primitives::Address;
use tracing::{info, warn};

use crate::{chain::Chain, errors::ScriptError, types::ContractName};

/// The outcome of a passed safety check
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SafetyReport {
    /// The version reported by the proxy, if the probe succeeded
    pub version: Option<String>,
}

/// Check that an upgrade of `contract` from `proxy` to `new_implementation`
/// is safe to submit
///
/// Fails if either address holds no code. The version probe is
/// informational only: a failing probe is logged and does not fail the
/// check.
pub async fn run_safety_checks<C: Chain>(
    chain: &C,
    contract: ContractName,
    proxy: Address,
    new_implementation: Address,
) -> Result<SafetyReport, ScriptError> {
    let implementation_code = chain.get_code(new_implementation).await?;
    if implementation_code.is_empty() {
        return Err(ScriptError::ImplementationNotDeployed(format!(
            "{contract} implementation {new_implementation}"
        )));
    }
    info!(%contract, implementation = %new_implementation, "implementation contract has code");

    let proxy_code = chain.get_code(proxy).await?;
    if proxy_code.is_empty() {
        return Err(ScriptError::ProxyNotFound(format!("{contract} proxy {proxy}")));
    }
    info!(%contract, %proxy, "proxy contract exists");

    let version = match chain.contract_version(proxy).await {
        Ok(version) => {
            info!(%contract, %version, "contract version");
            Some(version)
        }
        Err(e) => {
            warn!(%contract, "could not read contract version: {e}");
            None
        }
    };

    Ok(SafetyReport { version })
}
