//! In-memory stand-ins for the chain and the verification backend

use std::{
    cell::RefCell,
    collections::{HashMap, VecDeque},
    fs,
    path::Path,
};

use alloy::{
    primitives::{Address, Bytes, B256},
    sol_types::SolValue,
};

use crate::{
    chain::{Chain, DeployedContract},
    constants::{BEACON_ARTIFACT, BEACON_PROXY_ARTIFACT, BEACON_STORAGE_SLOT},
    errors::ScriptError,
    solidity::IAgentNFT,
    types::ContractName,
    verify::VerifyBackend,
};

/// The artifact bytecode of the beacon in tests
pub const BEACON_CODE: [u8; 2] = [0xbe, 0xac];
/// The artifact bytecode of the beacon proxy in tests
pub const PROXY_CODE: [u8; 2] = [0x9b, 0x0c];
/// The version every mock contract reports
pub const MOCK_VERSION: &str = "2.0.0";

/// The default deployer of the mock chain
pub fn deployer() -> Address {
    Address::repeat_byte(0xd0)
}

/// A beacon living on the mock chain
#[derive(Clone, Debug)]
pub struct MockBeacon {
    /// The implementation the beacon points at
    pub implementation: Address,
    /// The beacon owner
    pub owner: Address,
}

/// The mutable state of the mock chain
#[derive(Default)]
struct MockState {
    /// Raw storage words
    storage: HashMap<(Address, B256), B256>,
    /// Runtime code
    code: HashMap<Address, Bytes>,
    /// Deployed beacons
    beacons: HashMap<Address, MockBeacon>,
    /// Initializer data each proxy was constructed with
    proxy_init: HashMap<Address, Bytes>,
    /// Every minted iNFT
    mints: Vec<(Address, Address)>,
    /// The number of addresses handed out
    nonce: u64,
    /// The number of transactions submitted
    writes: usize,
}

/// An in-memory [`Chain`]
///
/// Contract creation is interpreted: init code starting with
/// [`BEACON_CODE`] creates a beacon from `(implementation, owner)`
/// constructor arguments, init code starting with [`PROXY_CODE`] creates a
/// proxy whose beacon slot holds the `beacon` constructor argument, and
/// anything else becomes a plain contract.
pub struct MockChain {
    /// The signer
    signer: Address,
    /// The chain state
    state: RefCell<MockState>,
    /// Fail every storage read
    pub fail_storage_reads: bool,
    /// Fail every version probe
    pub fail_version_probe: bool,
    /// Accept upgrades without moving the beacon
    pub ignore_upgrades: bool,
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new(deployer())
    }
}

impl MockChain {
    /// Create an empty chain with the given signer
    pub fn new(signer: Address) -> Self {
        Self {
            signer,
            state: RefCell::default(),
            fail_storage_reads: false,
            fail_version_probe: false,
            ignore_upgrades: false,
        }
    }

    /// The number of transactions submitted so far
    pub fn writes(&self) -> usize {
        self.state.borrow().writes
    }

    /// Place code at an address
    pub fn set_code(&self, address: Address, code: &[u8]) {
        self.state
            .borrow_mut()
            .code
            .insert(address, Bytes::copy_from_slice(code));
    }

    /// Write a raw storage word
    pub fn set_storage(&self, address: Address, slot: B256, word: B256) {
        self.state.borrow_mut().storage.insert((address, slot), word);
    }

    /// Read a beacon's state
    pub fn beacon(&self, beacon: Address) -> Option<MockBeacon> {
        self.state.borrow().beacons.get(&beacon).cloned()
    }

    /// Create a live beacon proxy setup without going through a deployment,
    /// returning `(proxy, beacon, implementation)`
    pub fn install_beacon_proxy(&self, owner: Address) -> (Address, Address, Address) {
        let implementation = self.next_address();
        let beacon = self.next_address();
        let proxy = self.next_address();

        self.set_code(implementation, &[0x60, 0x80]);
        self.set_code(beacon, &BEACON_CODE);
        self.set_code(proxy, &PROXY_CODE);
        self.set_storage(proxy, BEACON_STORAGE_SLOT, beacon.into_word());
        self.state.borrow_mut().beacons.insert(
            beacon,
            MockBeacon {
                implementation,
                owner,
            },
        );

        (proxy, beacon, implementation)
    }

    /// The initializer data a proxy was constructed with
    pub fn proxy_init_data(&self, proxy: Address) -> Option<Bytes> {
        self.state.borrow().proxy_init.get(&proxy).cloned()
    }

    /// The `(nft, recipient)` pairs of every mint
    pub fn mints(&self) -> Vec<(Address, Address)> {
        self.state.borrow().mints.clone()
    }

    /// Hand out a fresh address
    fn next_address(&self) -> Address {
        let mut state = self.state.borrow_mut();
        state.nonce += 1;
        let mut bytes = [0u8; 20];
        bytes[0] = 0xc0;
        bytes[12..].copy_from_slice(&state.nonce.to_be_bytes());
        Address::from(bytes)
    }

    /// Record a submitted transaction and return its hash
    fn next_tx(&self) -> B256 {
        let mut state = self.state.borrow_mut();
        state.writes += 1;
        B256::left_padding_from(&(state.writes as u64).to_be_bytes())
    }
}

impl Chain for MockChain {
    fn signer(&self) -> Address {
        self.signer
    }

    async fn get_storage_at(&self, address: Address, slot: B256) -> Result<B256, ScriptError> {
        if self.fail_storage_reads {
            return Err(ScriptError::StorageReadFailure("connection refused".to_string()));
        }
        Ok(self
            .state
            .borrow()
            .storage
            .get(&(address, slot))
            .copied()
            .unwrap_or_default())
    }

    async fn get_code(&self, address: Address) -> Result<Bytes, ScriptError> {
        Ok(self
            .state
            .borrow()
            .code
            .get(&address)
            .cloned()
            .unwrap_or_default())
    }

    async fn deploy(&self, init_code: Bytes) -> Result<DeployedContract, ScriptError> {
        let transaction_hash = self.next_tx();
        let address = self.next_address();

        if let Some(args) = init_code.strip_prefix(BEACON_CODE.as_slice()) {
            let (implementation, owner) = <(Address, Address)>::abi_decode_params(args)
                .map_err(|e| ScriptError::ContractDeployment(e.to_string()))?;
            self.state.borrow_mut().beacons.insert(
                address,
                MockBeacon {
                    implementation,
                    owner,
                },
            );
            self.set_code(address, &BEACON_CODE);
        } else if let Some(args) = init_code.strip_prefix(PROXY_CODE.as_slice()) {
            let (beacon, data) = <(Address, Bytes)>::abi_decode_params(args)
                .map_err(|e| ScriptError::ContractDeployment(e.to_string()))?;
            self.set_storage(address, BEACON_STORAGE_SLOT, beacon.into_word());
            self.state.borrow_mut().proxy_init.insert(address, data);
            self.set_code(address, &PROXY_CODE);
        } else {
            self.set_code(address, &[0x60, 0x80]);
        }

        Ok(DeployedContract {
            address,
            transaction_hash,
        })
    }

    async fn beacon_implementation(&self, beacon: Address) -> Result<Address, ScriptError> {
        self.beacon(beacon)
            .map(|b| b.implementation)
            .ok_or_else(|| ScriptError::ContractInteraction(format!("{beacon} is not a beacon")))
    }

    async fn beacon_owner(&self, beacon: Address) -> Result<Address, ScriptError> {
        self.beacon(beacon)
            .map(|b| b.owner)
            .ok_or_else(|| ScriptError::ContractInteraction(format!("{beacon} is not a beacon")))
    }

    async fn upgrade_beacon(
        &self,
        beacon: Address,
        new_implementation: Address,
    ) -> Result<B256, ScriptError> {
        let current = self
            .beacon(beacon)
            .ok_or_else(|| ScriptError::ContractInteraction(format!("{beacon} is not a beacon")))?;
        if current.owner != self.signer {
            return Err(ScriptError::ContractInteraction(
                "OwnableUnauthorizedAccount".to_string(),
            ));
        }

        let tx = self.next_tx();
        if !self.ignore_upgrades {
            if let Some(b) = self.state.borrow_mut().beacons.get_mut(&beacon) {
                b.implementation = new_implementation;
            }
        }
        Ok(tx)
    }

    async fn contract_version(&self, _address: Address) -> Result<String, ScriptError> {
        if self.fail_version_probe {
            return Err(ScriptError::ContractInteraction("execution reverted".to_string()));
        }
        Ok(MOCK_VERSION.to_string())
    }

    async fn tee_status(&self, _tee_verifier: Address) -> Result<(bool, Address), ScriptError> {
        Ok((true, Address::repeat_byte(0x7e)))
    }

    async fn mint_agent(
        &self,
        agent_nft: Address,
        _datas: Vec<IAgentNFT::IntelligentData>,
        to: Address,
    ) -> Result<B256, ScriptError> {
        let tx = self.next_tx();
        self.state.borrow_mut().mints.push((agent_nft, to));
        Ok(tx)
    }
}

/// Write the artifacts of every contract the deployer needs below `root`
pub fn write_test_artifacts(root: &Path) {
    let mut artifacts: Vec<(String, Vec<u8>)> = vec![
        (BEACON_ARTIFACT.to_string(), BEACON_CODE.to_vec()),
        (BEACON_PROXY_ARTIFACT.to_string(), PROXY_CODE.to_vec()),
    ];
    for (i, name) in ContractName::ALL.iter().enumerate() {
        artifacts.push((name.to_string(), vec![0x60, 0x80, i as u8]));
    }

    for (name, code) in artifacts {
        let dir = root.join("contracts").join(format!("{name}.sol"));
        fs::create_dir_all(&dir).unwrap();
        let json = serde_json::json!({
            "contractName": name,
            "abi": [],
            "bytecode": Bytes::from(code),
        });
        fs::write(dir.join(format!("{name}.json")), json.to_string()).unwrap();
    }
}

/// A scripted verification backend
///
/// Responses are handed out in call order; once exhausted, every call
/// succeeds.
#[derive(Default)]
pub struct MockBackend {
    /// The queued responses
    responses: RefCell<VecDeque<Result<String, String>>>,
    /// The `(address, args)` of every call
    calls: RefCell<Vec<(Address, Vec<String>)>>,
}

impl MockBackend {
    /// Create a backend answering with the given responses
    pub fn with_responses(responses: Vec<Result<&str, &str>>) -> Self {
        let responses = responses
            .into_iter()
            .map(|r| r.map(str::to_string).map_err(str::to_string))
            .collect();
        Self {
            responses: RefCell::new(responses),
            calls: RefCell::default(),
        }
    }

    /// The calls made so far
    pub fn calls(&self) -> Vec<(Address, Vec<String>)> {
        self.calls.borrow().clone()
    }
}

impl VerifyBackend for MockBackend {
    async fn verify(
        &self,
        _network: &str,
        address: Address,
        args: &[String],
    ) -> Result<String, ScriptError> {
        self.calls.borrow_mut().push((address, args.to_vec()));
        match self.responses.borrow_mut().pop_front() {
            Some(Ok(output)) => Ok(output),
            Some(Err(message)) => Err(ScriptError::VerificationBackend(message)),
            None => Ok("Successfully verified".to_string()),
        }
    }
}
