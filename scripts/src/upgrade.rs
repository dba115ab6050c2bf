//! Beacon upgrades of the deployed contracts
//!
//! Each contract moves through a fixed sequence of [`UpgradeStep`]s. Any
//! step may fail, which ends the upgrade of that contract without touching
//! its deployment records; the run then moves on to the next contract.
//! Progress is reported to an [`UpgradeObserver`] rather than logged inline.

use std::fmt::{self, Display};

use alloy::primitives::{Address, B256};
use tracing::{error, info, warn};

use crate::{
    artifacts::ArtifactStore,
    beacon::resolve_beacon,
    chain::Chain,
    config::UpgradeConfig,
    deployments::DeploymentRecordStore,
    errors::ScriptError,
    safety::run_safety_checks,
    types::ContractName,
};

/// The steps of a single contract upgrade, in order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpgradeStep {
    /// Read the proxy address from the deployment records
    LoadProxyRecord,
    /// Read the proxy's beacon from its storage
    ResolveBeacon,
    /// Read the implementation the beacon currently points at
    ReadCurrentImplementation,
    /// Ensure the signer owns the beacon
    CheckAuthorization,
    /// Deploy the new implementation
    DeployImplementation,
    /// Ensure both the proxy and the new implementation are live code
    RunSafetyChecks,
    /// Submit `upgradeTo` and await its inclusion
    SubmitUpgrade,
    /// Re-read the beacon and compare against the submitted implementation
    VerifyImplementationMatches,
    /// Record the upgrade in the deployment records
    PersistRecord,
}

impl Display for UpgradeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UpgradeStep::LoadProxyRecord => "load proxy record",
            UpgradeStep::ResolveBeacon => "resolve beacon",
            UpgradeStep::ReadCurrentImplementation => "read current implementation",
            UpgradeStep::CheckAuthorization => "check authorization",
            UpgradeStep::DeployImplementation => "deploy implementation",
            UpgradeStep::RunSafetyChecks => "safety checks",
            UpgradeStep::SubmitUpgrade => "submit upgrade",
            UpgradeStep::VerifyImplementationMatches => "verify implementation",
            UpgradeStep::PersistRecord => "persist record",
        };
        f.write_str(name)
    }
}

/// What a completed step produced
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpgradeEvent {
    /// The proxy address was found
    ProxyLoaded(Address),
    /// The beacon governing the proxy was found
    BeaconResolved(Address),
    /// The beacon's implementation before the upgrade
    CurrentImplementation(Address),
    /// The signer owns the beacon
    Authorized(Address),
    /// The new implementation was deployed
    ImplementationDeployed(Address),
    /// The safety checks passed, with the probed version if any
    SafetyChecksPassed(Option<String>),
    /// The safety checks were disabled for this run
    SafetyChecksSkipped,
    /// The upgrade transaction was mined
    UpgradeSubmitted(B256),
    /// The beacon points at the new implementation
    ImplementationVerified(Address),
    /// The deployment records were updated
    RecordPersisted,
}

/// Receives the progress of contract upgrades
pub trait UpgradeObserver {
    /// A step is about to run
    fn on_step(&self, contract: ContractName, step: UpgradeStep);

    /// A step completed
    fn on_event(&self, contract: ContractName, event: &UpgradeEvent);

    /// A step failed, ending the upgrade of `contract`
    fn on_failure(&self, contract: ContractName, step: UpgradeStep, error: &ScriptError);
}

/// An observer narrating upgrades through `tracing`
#[derive(Clone, Copy, Debug, Default)]
pub struct LogObserver;

impl UpgradeObserver for LogObserver {
    fn on_step(&self, contract: ContractName, step: UpgradeStep) {
        if step == UpgradeStep::LoadProxyRecord {
            info!("=== Upgrading {contract} ===");
        }
    }

    fn on_event(&self, contract: ContractName, event: &UpgradeEvent) {
        match event {
            UpgradeEvent::ProxyLoaded(proxy) => info!(%contract, %proxy, "proxy address"),
            UpgradeEvent::BeaconResolved(beacon) => info!(%contract, %beacon, "beacon address"),
            UpgradeEvent::CurrentImplementation(implementation) => {
                info!(%contract, %implementation, "current implementation")
            }
            UpgradeEvent::Authorized(owner) => info!(%contract, %owner, "signer owns beacon"),
            UpgradeEvent::ImplementationDeployed(implementation) => {
                info!(%contract, %implementation, "deployed new implementation")
            }
            UpgradeEvent::SafetyChecksPassed(_) => info!(%contract, "safety checks passed"),
            UpgradeEvent::SafetyChecksSkipped => warn!(%contract, "safety checks disabled"),
            UpgradeEvent::UpgradeSubmitted(tx_hash) => {
                info!(%contract, tx_hash = %format!("{tx_hash:#x}"), "upgrade mined")
            }
            UpgradeEvent::ImplementationVerified(implementation) => {
                info!(%contract, %implementation, "upgrade successful")
            }
            UpgradeEvent::RecordPersisted => info!(%contract, "deployment records updated"),
        }
    }

    fn on_failure(&self, contract: ContractName, step: UpgradeStep, error: &ScriptError) {
        if error.is_safety_check_failure() {
            error!(%contract, "safety checks failed, upgrade not submitted: {error}");
        } else {
            error!(%contract, %step, "upgrade failed: {error}");
        }
    }
}

/// The result of upgrading one contract
#[derive(Clone, Debug)]
pub struct UpgradeOutcome {
    /// The contract
    pub contract: ContractName,
    /// Whether the beacon now points at the new implementation
    pub success: bool,
    /// The upgrade transaction, if one was mined
    pub transaction_hash: Option<B256>,
    /// The implementation the contract was upgraded to
    pub new_implementation: Option<Address>,
    /// The step that failed, if any
    pub failed_step: Option<UpgradeStep>,
    /// Why the upgrade failed, if it did
    pub error: Option<ScriptError>,
    /// Why the records could not be updated after a successful upgrade
    pub record_error: Option<ScriptError>,
}

impl UpgradeOutcome {
    /// A failed upgrade
    fn failed(
        contract: ContractName,
        step: UpgradeStep,
        error: ScriptError,
        transaction_hash: Option<B256>,
    ) -> Self {
        Self {
            contract,
            success: false,
            transaction_hash,
            new_implementation: None,
            failed_step: Some(step),
            error: Some(error),
            record_error: None,
        }
    }
}

/// The results of an upgrade run
#[derive(Clone, Debug, Default)]
pub struct UpgradeSummary {
    /// One outcome per enabled contract, in upgrade order
    pub outcomes: Vec<UpgradeOutcome>,
}

impl UpgradeSummary {
    /// The outcome for a contract, if it was enabled
    pub fn outcome(&self, contract: ContractName) -> Option<&UpgradeOutcome> {
        self.outcomes.iter().find(|o| o.contract == contract)
    }

    /// Whether every enabled contract was upgraded
    pub fn overall_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.success)
    }

    /// Log the per-contract and overall result
    pub fn log(&self) {
        info!("=== Upgrade Summary ===");
        for contract in ContractName::ALL {
            match self.outcome(contract) {
                Some(o) if o.success => info!("{contract} upgrade: Success"),
                Some(o) => error!(
                    "{contract} upgrade: Failed ({})",
                    o.error.as_ref().map(|e| e.to_string()).unwrap_or_default()
                ),
                None => info!("{contract} upgrade: Skipped"),
            }
            if let Some(e) = self.outcome(contract).and_then(|o| o.record_error.as_ref()) {
                warn!("{contract} deployment records are stale: {e}");
            }
        }

        if self.overall_success() {
            info!("Overall upgrade: Success");
        } else {
            error!("Overall upgrade: Failed");
        }
    }
}

/// Drives beacon upgrades of the managed contracts
pub struct UpgradeOrchestrator<'a, C, O = LogObserver> {
    /// The chain to upgrade on
    chain: &'a C,
    /// The network's deployment records
    store: &'a DeploymentRecordStore,
    /// The compiled contracts
    artifacts: &'a ArtifactStore,
    /// Receives progress
    observer: O,
}

impl<'a, C: Chain> UpgradeOrchestrator<'a, C> {
    /// Create an orchestrator narrating through `tracing`
    pub fn new(
        chain: &'a C,
        store: &'a DeploymentRecordStore,
        artifacts: &'a ArtifactStore,
    ) -> Self {
        Self::with_observer(chain, store, artifacts, LogObserver)
    }
}

impl<'a, C: Chain, O: UpgradeObserver> UpgradeOrchestrator<'a, C, O> {
    /// Create an orchestrator reporting to the given observer
    pub fn with_observer(
        chain: &'a C,
        store: &'a DeploymentRecordStore,
        artifacts: &'a ArtifactStore,
        observer: O,
    ) -> Self {
        Self {
            chain,
            store,
            artifacts,
            observer,
        }
    }

    /// Upgrade every contract enabled in `config`, dependencies first
    ///
    /// A failed contract does not stop the run, and never rolls back the
    /// contracts upgraded before it.
    pub async fn run(&self, config: &UpgradeConfig) -> UpgradeSummary {
        let mut summary = UpgradeSummary::default();
        let enabled = config.enabled_contracts();

        for (i, contract) in enabled.iter().enumerate() {
            let outcome = self
                .upgrade_contract(*contract, config.perform_safety_checks)
                .await;
            let fatal = outcome.error.as_ref().is_some_and(ScriptError::is_run_fatal);
            summary.outcomes.push(outcome);

            if fatal {
                error!("aborting upgrade run");
                for skipped in &enabled[i + 1..] {
                    summary.outcomes.push(UpgradeOutcome::failed(
                        *skipped,
                        UpgradeStep::LoadProxyRecord,
                        ScriptError::Config("run aborted before this contract".to_string()),
                        None,
                    ));
                }
                break;
            }
        }

        self.final_verification(&enabled).await;
        summary
    }

    /// Upgrade a single contract to a freshly deployed implementation,
    /// checking the new implementation and the proxy first if
    /// `perform_safety_checks` is set
    pub async fn upgrade_contract(
        &self,
        contract: ContractName,
        perform_safety_checks: bool,
    ) -> UpgradeOutcome {
        let mut step = UpgradeStep::LoadProxyRecord;
        let mut transaction_hash = None;

        match self
            .try_upgrade(contract, perform_safety_checks, &mut step, &mut transaction_hash)
            .await
        {
            Ok((new_implementation, record_error)) => UpgradeOutcome {
                contract,
                success: true,
                transaction_hash,
                new_implementation: Some(new_implementation),
                failed_step: None,
                error: None,
                record_error,
            },
            Err(e) => {
                self.observer.on_failure(contract, step, &e);
                UpgradeOutcome::failed(contract, step, e, transaction_hash)
            }
        }
    }

    /// Enter a step
    fn enter(&self, contract: ContractName, current: &mut UpgradeStep, step: UpgradeStep) {
        *current = step;
        self.observer.on_step(contract, step);
    }

    /// Run the upgrade steps, tracking the current step and the upgrade
    /// transaction so a failure can be attributed
    ///
    /// Returns the new implementation and, if the records could not be
    /// updated, the reason.
    async fn try_upgrade(
        &self,
        contract: ContractName,
        perform_safety_checks: bool,
        step: &mut UpgradeStep,
        transaction_hash: &mut Option<B256>,
    ) -> Result<(Address, Option<ScriptError>), ScriptError> {
        let emit = |event: UpgradeEvent| self.observer.on_event(contract, &event);

        self.enter(contract, step, UpgradeStep::LoadProxyRecord);
        let proxy = self.store.get(&contract.proxy_record())?.address;
        emit(UpgradeEvent::ProxyLoaded(proxy));

        self.enter(contract, step, UpgradeStep::ResolveBeacon);
        let beacon = resolve_beacon(self.chain, proxy).await?;
        if beacon.is_zero() {
            return Err(ScriptError::BeaconNotConfigured(format!(
                "{contract} proxy {proxy}"
            )));
        }
        emit(UpgradeEvent::BeaconResolved(beacon));

        self.enter(contract, step, UpgradeStep::ReadCurrentImplementation);
        let previous_implementation = self.chain.beacon_implementation(beacon).await?;
        emit(UpgradeEvent::CurrentImplementation(previous_implementation));

        self.enter(contract, step, UpgradeStep::CheckAuthorization);
        let owner = self.chain.beacon_owner(beacon).await?;
        let signer = self.chain.signer();
        // Compared as addresses, so checksum casing is irrelevant
        if owner != signer {
            return Err(ScriptError::Unauthorized(format!(
                "cannot upgrade {contract}: beacon owner is {owner}, signer is {signer}"
            )));
        }
        emit(UpgradeEvent::Authorized(owner));

        self.enter(contract, step, UpgradeStep::DeployImplementation);
        let artifact = self.artifacts.load(contract.as_str())?;
        let new_implementation = self.chain.deploy(artifact.bytecode).await?.address;
        emit(UpgradeEvent::ImplementationDeployed(new_implementation));

        if perform_safety_checks {
            self.enter(contract, step, UpgradeStep::RunSafetyChecks);
            let report = run_safety_checks(self.chain, contract, proxy, new_implementation).await?;
            emit(UpgradeEvent::SafetyChecksPassed(report.version));
        } else {
            emit(UpgradeEvent::SafetyChecksSkipped);
        }

        self.enter(contract, step, UpgradeStep::SubmitUpgrade);
        let tx_hash = self.chain.upgrade_beacon(beacon, new_implementation).await?;
        *transaction_hash = Some(tx_hash);
        emit(UpgradeEvent::UpgradeSubmitted(tx_hash));

        self.enter(contract, step, UpgradeStep::VerifyImplementationMatches);
        let current = self.chain.beacon_implementation(beacon).await?;
        if current != new_implementation {
            return Err(ScriptError::ImplementationMismatch(format!(
                "{contract} beacon points at {current}, expected {new_implementation}"
            )));
        }
        emit(UpgradeEvent::ImplementationVerified(current));

        // The upgrade is final on-chain; a failed write is reported, not fatal
        self.enter(contract, step, UpgradeStep::PersistRecord);
        let record_error = match self.store.record_implementation_upgrade(
            contract.as_str(),
            new_implementation,
            tx_hash,
            Some(previous_implementation),
        ) {
            Ok(()) => {
                emit(UpgradeEvent::RecordPersisted);
                None
            }
            Err(e) => {
                self.observer.on_failure(contract, UpgradeStep::PersistRecord, &e);
                Some(e)
            }
        };

        Ok((new_implementation, record_error))
    }

    /// Probe the version of every enabled contract after the run
    async fn final_verification(&self, enabled: &[ContractName]) {
        if enabled.is_empty() {
            return;
        }

        info!("=== Final Verification ===");
        for contract in enabled {
            let Some(record) = self.store.get_or_null(&contract.proxy_record()) else {
                continue;
            };
            match self.chain.contract_version(record.address).await {
                Ok(version) => info!(%contract, %version, "version after upgrade"),
                Err(e) => warn!(%contract, "could not verify after upgrade: {e}"),
            }
        }
    }
}
