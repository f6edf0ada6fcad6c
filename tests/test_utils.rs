#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use pairbridge::{
    Address, CallOutcome, ChainMetadata, ConnectOpts, GasOracle, GasPrices, GasTier, Method,
    NonceOracle, PairingUri, PeerMetadata, Role, SessionController, SessionSnapshot,
    SessionTransport, TransportError, TransportEvent, TransportFactory,
};
use serde_json::json;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;
use url::Url;

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_target(true)
            .with_level(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_env_filter(EnvFilter::from_default_env())
            .init();
    });
}

pub async fn yield_ms(ms: u64) {
    tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
}

pub const TEST_ACCOUNT: &str = "0x6e4d387c925a647844623762aB3C4a5B3acd9540";
pub const TEST_ACCOUNT_2: &str = "0xeF8fD2BDC6F6Be83F92054F8Ecd6B010f28CE7F4";

pub fn test_accounts() -> Vec<Address> {
    vec![Address::from(TEST_ACCOUNT), Address::from(TEST_ACCOUNT_2)]
}

pub fn test_peer() -> PeerMetadata {
    PeerMetadata {
        name: String::from("TestDapp"),
        description: String::from("demo peer"),
        url: String::from("https://example.com"),
        icons: vec![],
        secure: true,
    }
}

pub fn random_topic() -> String {
    let bytes: [u8; 16] = rand::random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

pub fn random_uri() -> PairingUri {
    let key: [u8; 32] = rand::random();
    let key: String = key.iter().map(|b| format!("{b:02x}")).collect();
    PairingUri::new(
        random_topic(),
        Url::parse("https://bridge.example.org/").unwrap(),
        key,
    )
}

/// Scriptable, inspectable state behind a [`MockTransport`].
pub struct MockState {
    pub connected: AtomicBool,
    pub chain_id: Mutex<Option<u64>>,
    pub accounts: Mutex<Vec<Address>>,
    pub peer: Mutex<Option<PeerMetadata>>,
    pub approved: Mutex<Option<(u64, Vec<Address>)>>,
    pub rejected: AtomicBool,
    pub killed: AtomicBool,
    pub updates: Mutex<Vec<(u64, Vec<Address>)>>,
    pub calls: Mutex<Vec<(Method, serde_json::Value)>>,
    pub call_outcome: Mutex<CallOutcome>,
    /// When set, `send_method_call` blocks until a permit is added.
    pub call_gate: Mutex<Option<Arc<tokio::sync::Semaphore>>>,
    pub fail_send: AtomicBool,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            connected: AtomicBool::new(false),
            chain_id: Mutex::new(None),
            accounts: Mutex::new(vec![]),
            peer: Mutex::new(None),
            approved: Mutex::new(None),
            rejected: AtomicBool::new(false),
            killed: AtomicBool::new(false),
            updates: Mutex::new(vec![]),
            calls: Mutex::new(vec![]),
            call_outcome: Mutex::new(CallOutcome::Success(json!("0xsigned"))),
            call_gate: Mutex::new(None),
            fail_send: AtomicBool::new(false),
        }
    }
}

pub struct MockTransport {
    pub uri: Option<PairingUri>,
    pub state: Arc<MockState>,
}

#[async_trait]
impl SessionTransport for MockTransport {
    fn connected(&self) -> bool {
        self.state.connected.load(Ordering::SeqCst)
    }

    fn chain_id(&self) -> Option<u64> {
        *self.state.chain_id.lock().unwrap()
    }

    fn accounts(&self) -> Vec<Address> {
        self.state.accounts.lock().unwrap().clone()
    }

    fn peer_metadata(&self) -> Option<PeerMetadata> {
        self.state.peer.lock().unwrap().clone()
    }

    fn pairing_uri(&self) -> Option<PairingUri> {
        self.uri.clone()
    }

    async fn approve_session(
        &self,
        chain_id: u64,
        accounts: Vec<Address>,
    ) -> Result<(), TransportError> {
        *self.state.approved.lock().unwrap() = Some((chain_id, accounts.clone()));
        *self.state.chain_id.lock().unwrap() = Some(chain_id);
        *self.state.accounts.lock().unwrap() = accounts;
        self.state.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn reject_session(&self) -> Result<(), TransportError> {
        self.state.rejected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn update_session(
        &self,
        chain_id: u64,
        accounts: Vec<Address>,
    ) -> Result<(), TransportError> {
        self.state.updates.lock().unwrap().push((chain_id, accounts));
        Ok(())
    }

    async fn kill_session(&self) -> Result<(), TransportError> {
        self.state.killed.store(true, Ordering::SeqCst);
        self.state.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn send_method_call(
        &self,
        method: Method,
        params: serde_json::Value,
    ) -> Result<CallOutcome, TransportError> {
        let gate = self.state.call_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let _permit = gate.acquire().await.unwrap();
        }
        if self.state.fail_send.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.state.calls.lock().unwrap().push((method, params));
        Ok(self.state.call_outcome.lock().unwrap().clone())
    }

    fn snapshot(&self) -> Option<SessionSnapshot> {
        if !self.connected() {
            return None;
        }
        Some(SessionSnapshot(json!({
            "connected": true,
            "chainId": self.chain_id(),
            "accounts": self.accounts(),
            "peerMeta": self.peer_metadata(),
        })))
    }
}

#[derive(Default)]
pub struct MockFactory {
    pub fail_next: AtomicBool,
    pub connects: AtomicUsize,
    last: Mutex<Option<Arc<MockState>>>,
}

impl MockFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// State behind the most recently connected transport.
    pub fn last_state(&self) -> Arc<MockState> {
        self.last.lock().unwrap().clone().expect("no transport connected yet")
    }
}

#[async_trait]
impl TransportFactory for MockFactory {
    async fn connect(
        &self,
        opts: ConnectOpts,
    ) -> Result<Arc<dyn SessionTransport>, TransportError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(TransportError::Unreachable(String::from(
                "bridge.example.org",
            )));
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        let state = Arc::new(MockState::default());
        let uri = match opts {
            ConnectOpts::Fresh => Some(random_uri()),
            ConnectOpts::Uri(uri) => Some(uri),
            ConnectOpts::Restored(snapshot) => {
                let blob = snapshot.0;
                state.connected.store(
                    blob["connected"].as_bool().unwrap_or(false),
                    Ordering::SeqCst,
                );
                *state.chain_id.lock().unwrap() = blob["chainId"].as_u64();
                *state.accounts.lock().unwrap() =
                    serde_json::from_value(blob["accounts"].clone()).unwrap_or_default();
                *state.peer.lock().unwrap() =
                    serde_json::from_value(blob["peerMeta"].clone()).unwrap_or_default();
                None
            }
        };
        *self.last.lock().unwrap() = Some(state.clone());
        Ok(Arc::new(MockTransport { uri, state }))
    }
}

/// Initiator controller driven to Connected with the standard test context.
pub async fn connected_initiator() -> anyhow::Result<(SessionController, Arc<MockFactory>)> {
    init_tracing();
    let factory = MockFactory::new();
    let controller = SessionController::initialize(Role::Initiator, factory.clone(), None).await?;
    let state = factory.last_state();
    *state.peer.lock().unwrap() = Some(test_peer());
    *state.chain_id.lock().unwrap() = Some(1);
    *state.accounts.lock().unwrap() = test_accounts();
    state.connected.store(true, Ordering::SeqCst);
    controller
        .handle_event(Ok(TransportEvent::Connect {
            chain_id: 1,
            accounts: test_accounts(),
        }))
        .await?;
    Ok((controller, factory))
}

pub struct FixedGasOracle(pub GasPrices);

impl FixedGasOracle {
    pub fn slow(price: &str) -> Self {
        Self(GasPrices {
            slow: GasTier {
                price: price.to_owned(),
            },
            average: GasTier {
                price: String::from("30"),
            },
            fast: GasTier {
                price: String::from("50"),
            },
        })
    }
}

#[async_trait]
impl GasOracle for FixedGasOracle {
    async fn gas_prices(&self) -> pairbridge::Result<GasPrices> {
        Ok(self.0.clone())
    }
}

pub struct FixedNonceOracle(pub u64);

#[async_trait]
impl NonceOracle for FixedNonceOracle {
    async fn nonce(&self, _address: &Address, _chain: &ChainMetadata) -> pairbridge::Result<u64> {
        Ok(self.0)
    }
}
