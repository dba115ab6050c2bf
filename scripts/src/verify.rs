//! Source verification of deployed contracts through an external backend

use std::fmt::{self, Display};

use alloy::primitives::Address;
use serde_json::Value;
use tokio::process::Command;
use tool_utils::{display_command, run_command};
use tracing::{error, info, warn};

use crate::{
    config::VerifyConfig,
    constants::{
        ALREADY_VERIFIED_MARKER, VERIFY_AGENT_MARKET_ENV, VERIFY_AGENT_NFT_ENV,
        VERIFY_TEE_VERIFIER_ENV, VERIFY_VERIFIER_ENV,
    },
    deployments::DeploymentRecordStore,
    errors::ScriptError,
};

/// A proxy and the beacon and implementation behind it, verified together
#[derive(Debug)]
pub struct ContractGroup {
    /// The environment variable enabling the group
    pub env_key: &'static str,
    /// The record names, in verification order
    pub contracts: [&'static str; 3],
    /// A human readable name for the group
    pub description: &'static str,
}

/// Every verifiable group
pub static CONTRACT_GROUPS: [ContractGroup; 4] = [
    ContractGroup {
        env_key: VERIFY_TEE_VERIFIER_ENV,
        contracts: ["TEEVerifier", "TEEVerifierBeacon", "TEEVerifierImpl"],
        description: "TEE Verifier contracts",
    },
    ContractGroup {
        env_key: VERIFY_VERIFIER_ENV,
        contracts: ["Verifier", "VerifierBeacon", "VerifierImpl"],
        description: "Verifier contracts",
    },
    ContractGroup {
        env_key: VERIFY_AGENT_NFT_ENV,
        contracts: ["AgentNFT", "AgentNFTBeacon", "AgentNFTImpl"],
        description: "Agent NFT contracts",
    },
    ContractGroup {
        env_key: VERIFY_AGENT_MARKET_ENV,
        contracts: ["AgentMarket", "AgentMarketBeacon", "AgentMarketImpl"],
        description: "Agent Market contracts",
    },
];

/// Render recorded constructor arguments as command line arguments
///
/// Hex strings and other strings pass through unchanged, numbers and
/// booleans use their textual form, and nested values are JSON encoded.
pub fn format_constructor_args(args: &[Value]) -> Vec<String> {
    args.iter()
        .map(|arg| match arg {
            Value::String(s) => s.clone(),
            Value::Object(_) | Value::Array(_) => arg.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null => "null".to_string(),
        })
        .collect()
}

/// Verifies the source of a single deployed contract
#[allow(async_fn_in_trait)]
pub trait VerifyBackend {
    /// Verify the contract at `address` on `network`, returning the
    /// backend's output on success
    async fn verify(
        &self,
        network: &str,
        address: Address,
        args: &[String],
    ) -> Result<String, ScriptError>;
}

/// A [`VerifyBackend`] running an external command, by default
/// `npx hardhat verify`
#[derive(Clone, Debug)]
pub struct CommandBackend {
    /// The program to run
    program: String,
    /// The arguments preceding `--network`
    prefix_args: Vec<String>,
    /// How long a single verification may take
    timeout: std::time::Duration,
}

impl CommandBackend {
    /// A backend running the command described by `config`
    pub fn new(config: &VerifyConfig) -> Self {
        Self {
            program: config.program.clone(),
            prefix_args: config.prefix_args.clone(),
            timeout: config.timeout,
        }
    }

    /// The full argument list for one verification
    fn command_args(&self, network: &str, address: Address, args: &[String]) -> Vec<String> {
        let mut command_args = self.prefix_args.clone();
        command_args.extend(["--network".to_string(), network.to_string(), address.to_string()]);
        command_args.extend(args.iter().cloned());
        command_args
    }
}

impl VerifyBackend for CommandBackend {
    async fn verify(
        &self,
        network: &str,
        address: Address,
        args: &[String],
    ) -> Result<String, ScriptError> {
        let command_args = self.command_args(network, address, args);
        info!("Command: {}", display_command(&self.program, &command_args));

        let mut cmd = Command::new(&self.program);
        cmd.args(&command_args);
        let output = run_command(cmd, self.timeout)
            .await
            .map_err(|e| ScriptError::VerificationBackend(e.to_string()))?;

        if output.success {
            Ok(output.stdout)
        } else if output.contains_ignore_case(ALREADY_VERIFIED_MARKER) {
            Ok(format!("{}{}", output.stdout, output.stderr))
        } else {
            Err(ScriptError::VerificationBackend(format!(
                "{output}\n{}",
                output.stdout.trim()
            )))
        }
    }
}

/// The result of verifying one contract
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationResult {
    /// The record name of the contract
    pub contract_name: String,
    /// Whether the contract is verified after the run
    pub success: bool,
    /// The contract address, if its record was found
    pub address: Option<Address>,
    /// Why verification failed, if it did
    pub error: Option<String>,
}

impl Display for VerificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let address = self
            .address
            .map(|a| a.to_string())
            .unwrap_or_else(|| "N/A".to_string());
        if self.success {
            write!(f, "SUCCESS: {} ({address})", self.contract_name)
        } else {
            write!(
                f,
                "FAILED: {} ({address}) - {}",
                self.contract_name,
                self.error.as_deref().unwrap_or("Unknown error")
            )
        }
    }
}

/// The aggregated results of a verification run
#[derive(Clone, Debug, Default)]
pub struct VerificationSummary {
    /// The number of verified contracts
    pub successful: usize,
    /// The number of contracts that failed verification
    pub failed: usize,
    /// Every result, in verification order
    pub results: Vec<VerificationResult>,
}

impl VerificationSummary {
    /// Add a result to the summary
    fn push(&mut self, result: VerificationResult) {
        if result.success {
            self.successful += 1;
        } else {
            self.failed += 1;
        }
        self.results.push(result);
    }

    /// Whether every contract verified
    pub fn overall_success(&self) -> bool {
        self.failed == 0
    }

    /// Log the final results
    pub fn log(&self) {
        info!("Final Verification Results:");
        info!("{}", "=".repeat(50));
        info!("Successful: {}", self.successful);
        for result in self.results.iter().filter(|r| r.success) {
            info!("  {result}");
        }
        if self.failed > 0 {
            error!("Failed: {}", self.failed);
            for result in self.results.iter().filter(|r| !r.success) {
                error!("  {result}");
            }
        }
        info!("Verification completed!");
    }
}

/// Verifies the enabled contract groups one contract at a time
pub struct VerificationDispatcher<'a, B> {
    /// The verification backend
    backend: &'a B,
    /// The network's deployment records
    store: &'a DeploymentRecordStore,
    /// The run configuration
    config: &'a VerifyConfig,
}

impl<'a, B: VerifyBackend> VerificationDispatcher<'a, B> {
    /// Constructor
    pub fn new(backend: &'a B, store: &'a DeploymentRecordStore, config: &'a VerifyConfig) -> Self {
        Self {
            backend,
            store,
            config,
        }
    }

    /// The groups enabled for this run
    pub fn enabled_groups(&self) -> Vec<&'static ContractGroup> {
        CONTRACT_GROUPS
            .iter()
            .filter(|g| self.config.enabled_groups.contains(&g.env_key))
            .collect()
    }

    /// Verify every contract of every enabled group
    ///
    /// Fails only if the deployments directory is missing; per-contract
    /// failures are collected into the summary.
    pub async fn run(&self) -> Result<VerificationSummary, ScriptError> {
        if !self.store.dir().is_dir() {
            return Err(ScriptError::Config(format!(
                "deployments directory not found: {}",
                self.store.dir().display()
            )));
        }

        info!("Starting contract verification...");
        info!("Network: {}", self.config.network);
        info!("Deployments path: {}", self.store.dir().display());

        let mut summary = VerificationSummary::default();
        for group in self.enabled_groups() {
            for result in self.verify_group(group).await {
                summary.push(result);
            }
        }

        Ok(summary)
    }

    /// Verify the contracts of one group, pausing between contracts
    async fn verify_group(&self, group: &ContractGroup) -> Vec<VerificationResult> {
        info!("Verifying {}...", group.description);

        let mut results = Vec::with_capacity(group.contracts.len());
        for (i, name) in group.contracts.iter().enumerate() {
            if i > 0 && !self.config.delay.is_zero() {
                info!("Waiting {} seconds...", self.config.delay.as_secs());
                tokio::time::sleep(self.config.delay).await;
            }
            results.push(self.verify_contract(name).await);
        }

        info!("{} Results:", group.description);
        for result in &results {
            let status = if result.success { "SUCCESS" } else { "FAILED" };
            info!("  {status}: {}", result.contract_name);
        }
        results
    }

    /// Verify the contract recorded under `name`
    pub async fn verify_contract(&self, name: &str) -> VerificationResult {
        info!("Verifying {name}...");

        let Some(record) = self.store.get_or_null(name) else {
            warn!(path = %self.store.record_path(name).display(), "deployment file not found");
            return VerificationResult {
                contract_name: name.to_string(),
                success: false,
                address: None,
                error: Some("Deployment file not found".to_string()),
            };
        };

        let args = format_constructor_args(&record.args);
        info!(address = %record.address, args = ?record.args, "verifying");

        let error = match self
            .backend
            .verify(&self.config.network, record.address, &args)
            .await
        {
            Ok(output) if is_already_verified(&output) => {
                info!("{name} is already verified.");
                None
            }
            Ok(output) => {
                info!("{name} verified successfully!");
                if !output.trim().is_empty() {
                    info!("Output: {}", output.trim());
                }
                None
            }
            Err(e) if is_already_verified(&e.to_string()) => {
                info!("{name} is already verified.");
                None
            }
            Err(e) => {
                error!("Failed to verify {name}: {e}");
                Some(e.to_string())
            }
        };

        VerificationResult {
            contract_name: name.to_string(),
            success: error.is_none(),
            address: Some(record.address),
            error,
        }
    }
}

/// Whether backend output reports the contract as already verified
fn is_already_verified(message: &str) -> bool {
    message.to_lowercase().contains(ALREADY_VERIFIED_MARKER)
}
