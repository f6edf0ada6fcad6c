use crate::pairing_uri::ParseError;
use crate::transport::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("handshake failed: {0}")]
    Handshake(#[source] TransportError),

    #[error(transparent)]
    PairingParse(#[from] ParseError),

    #[error("precondition failed: {0}")]
    Precondition(&'static str),

    #[error("no chain registered for id {0}")]
    UnknownChain(u64),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    CorruptedPayload(#[from] serde_json::Error),

    #[error("oracle request failed: {0}")]
    Oracle(String),

    #[error("invalid decimal amount: {0}")]
    InvalidDecimal(String),

    #[error("failed to get mutex lock")]
    Lock,
}
