//! Reference client for pairing and request/response exchange between a
//! "dapp" peer and a "wallet" peer over a session-oriented relay.
//!
//! The crate owns the session lifecycle state machine
//! ([`SessionController`]), outbound payload construction ([`request`]) and
//! the static chain registry ([`chains`]). Transport, signing and rendering
//! are external collaborators behind traits.

pub mod chains;
mod controller;
mod domain;
mod error;
pub mod hex;
pub mod pairing_uri;
pub mod request;
pub mod transport;

pub use chains::ChainMetadata;
pub use controller::{Role, SessionController, SessionUpdate};
pub use domain::{
    Address, CallOutcome, Method, MethodCallRequest, MethodCallResult, PeerMetadata, Session,
    SessionPhase, SessionSnapshot,
};
pub use error::Error;
pub use pairing_uri::PairingUri;
pub use request::{GasOracle, GasPrices, GasTier, NonceOracle, Transaction};
pub use transport::{
    ConnectOpts, SessionTransport, TransportError, TransportEvent, TransportFactory,
};

pub type Result<T> = std::result::Result<T, Error>;
