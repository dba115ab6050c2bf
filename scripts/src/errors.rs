//! Definitions of errors that can occur during the execution of the contract management scripts

use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

/// Errors that can occur during the execution of the contract management scripts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    /// A deployment record that a step depends on does not exist
    RecordNotFound(String),
    /// Error reading a deployment record file
    RecordRead(String),
    /// Error writing a deployment record file
    RecordWrite(String),
    /// A deployment record does not match the supported schema
    RecordSchema(String),
    /// The signer is not the owner of the beacon it is trying to upgrade
    Unauthorized(String),
    /// No code exists at the new implementation address
    ImplementationNotDeployed(String),
    /// No code exists at the proxy address
    ProxyNotFound(String),
    /// The proxy's beacon slot is unset
    BeaconNotConfigured(String),
    /// The beacon does not point at the implementation we upgraded to
    ImplementationMismatch(String),
    /// Error reading a raw storage slot
    StorageReadFailure(String),
    /// Error parsing a compilation artifact
    ArtifactParsing(String),
    /// Error initializing the RPC client
    ClientInitialization(String),
    /// Error constructing calldata for a contract method
    CalldataConstruction(String),
    /// Error deploying a contract
    ContractDeployment(String),
    /// Error calling a contract method
    ContractInteraction(String),
    /// Invalid or unresolvable configuration
    Config(String),
    /// The external verification backend failed
    VerificationBackend(String),
}

impl ScriptError {
    /// Whether this error fails only the safety check stage
    pub fn is_safety_check_failure(&self) -> bool {
        matches!(
            self,
            ScriptError::ImplementationNotDeployed(_) | ScriptError::ProxyNotFound(_)
        )
    }

    /// Whether this error must abort the whole run rather than just the
    /// contract being processed
    ///
    /// Everything that concerns a single contract is isolated; only errors
    /// that make every subsequent step meaningless are fatal.
    pub fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            ScriptError::ClientInitialization(_) | ScriptError::Config(_)
        )
    }
}

impl Display for ScriptError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ScriptError::RecordNotFound(s) => write!(f, "deployment record not found: {}", s),
            ScriptError::RecordRead(s) => write!(f, "error reading deployment record: {}", s),
            ScriptError::RecordWrite(s) => write!(f, "error writing deployment record: {}", s),
            ScriptError::RecordSchema(s) => write!(f, "invalid deployment record: {}", s),
            ScriptError::Unauthorized(s) => write!(f, "not authorized: {}", s),
            ScriptError::ImplementationNotDeployed(s) => {
                write!(f, "no code at implementation address: {}", s)
            }
            ScriptError::ProxyNotFound(s) => write!(f, "no code at proxy address: {}", s),
            ScriptError::BeaconNotConfigured(s) => write!(f, "no beacon configured: {}", s),
            ScriptError::ImplementationMismatch(s) => {
                write!(f, "implementation mismatch after upgrade: {}", s)
            }
            ScriptError::StorageReadFailure(s) => write!(f, "error reading storage: {}", s),
            ScriptError::ArtifactParsing(s) => write!(f, "error parsing artifact: {}", s),
            ScriptError::ClientInitialization(s) => write!(f, "error initializing client: {}", s),
            ScriptError::CalldataConstruction(s) => write!(f, "error constructing calldata: {}", s),
            ScriptError::ContractDeployment(s) => write!(f, "error deploying contract: {}", s),
            ScriptError::ContractInteraction(s) => {
                write!(f, "error interacting with contract: {}", s)
            }
            ScriptError::Config(s) => write!(f, "configuration error: {}", s),
            ScriptError::VerificationBackend(s) => write!(f, "verification failed: {}", s),
        }
    }
}

impl Error for ScriptError {}
