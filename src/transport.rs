//! The seam between the session state machine and whatever actually moves
//! bytes. Implementations live outside this crate; tests use an in-memory
//! mock.

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{
    Address, CallOutcome, Method, MethodCallRequest, PeerMetadata, SessionSnapshot,
};
use crate::pairing_uri::PairingUri;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("relay unreachable: {0}")]
    Unreachable(String),

    #[error("secure channel failed: {0}")]
    Channel(String),

    #[error("transport closed")]
    Closed,

    #[error("event error: {0}")]
    Event(String),
}

/// How a connection is opened, mirroring the reference client's
/// `{uri} | {session} | {node}` option object.
#[derive(Debug, Clone)]
pub enum ConnectOpts {
    /// New identity material; the pairing URI is available synchronously.
    Fresh,
    /// Pair against a URI scanned or pasted from the other peer.
    Uri(PairingUri),
    /// Resume a connected session without re-running the handshake.
    Restored(SessionSnapshot),
}

/// Closed set of lifecycle events a transport can emit.
///
/// Delivery items are `Result<TransportEvent, TransportError>`; an `Err`
/// item is fatal for that event and must not be partially applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    SessionRequest {
        peer: PeerMetadata,
    },
    SessionUpdate {
        chain_id: u64,
        accounts: Vec<Address>,
    },
    Connect {
        chain_id: u64,
        accounts: Vec<Address>,
    },
    CallRequest(MethodCallRequest),
    Disconnect,
}

impl Display for TransportEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::SessionRequest { .. } => "session_request",
            Self::SessionUpdate { .. } => "session_update",
            Self::Connect { .. } => "connect",
            Self::CallRequest(_) => "call_request",
            Self::Disconnect => "disconnect",
        })
    }
}

/// One live connection. The controller never constructs these directly;
/// it goes through a [`TransportFactory`].
#[async_trait]
pub trait SessionTransport: Send + Sync {
    fn connected(&self) -> bool;
    fn chain_id(&self) -> Option<u64>;
    fn accounts(&self) -> Vec<Address>;
    fn peer_metadata(&self) -> Option<PeerMetadata>;
    /// Derived from identity material at construction, no round trip.
    fn pairing_uri(&self) -> Option<PairingUri>;

    async fn approve_session(
        &self,
        chain_id: u64,
        accounts: Vec<Address>,
    ) -> Result<(), TransportError>;
    async fn reject_session(&self) -> Result<(), TransportError>;
    async fn update_session(
        &self,
        chain_id: u64,
        accounts: Vec<Address>,
    ) -> Result<(), TransportError>;
    async fn kill_session(&self) -> Result<(), TransportError>;

    /// Sends an outbound method call and waits for the peer's verdict.
    /// A peer rejection comes back as `Ok(CallOutcome::Rejected)`.
    async fn send_method_call(
        &self,
        method: Method,
        params: serde_json::Value,
    ) -> Result<CallOutcome, TransportError>;

    /// Opaque resume blob, available while connected.
    fn snapshot(&self) -> Option<SessionSnapshot>;
}

#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn connect(&self, opts: ConnectOpts)
        -> Result<Arc<dyn SessionTransport>, TransportError>;
}
