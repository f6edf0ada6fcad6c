//! Core session data model.

use std::collections::VecDeque;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::chains::ChainMetadata;
use crate::pairing_uri::PairingUri;

#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
#[serde(transparent)]
pub struct Address(pub String);

impl Address {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Metadata the remote peer announced during the handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerMetadata {
    pub name: String,
    pub description: String,
    pub url: String,
    pub icons: Vec<String>,
    pub secure: bool,
}

/// Outbound method-call kinds this client can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    #[serde(rename = "eth_sendTransaction")]
    SendTransaction,
    #[serde(rename = "eth_signTypedData")]
    SignTypedData,
    #[serde(rename = "eth_sign")]
    Sign,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SendTransaction => "eth_sendTransaction",
            Self::SignTypedData => "eth_signTypedData",
            Self::Sign => "eth_sign",
        }
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inbound method call from the peer.
///
/// Params are an opaque blob; parsing is deferred to whoever consumes the
/// request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodCallRequest {
    pub id: u64,
    pub method: String,
    pub params: serde_json::Value,
}

/// Peer response to an outbound call. A rejection is a value, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CallOutcome {
    Success(serde_json::Value),
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodCallResult {
    pub method: Method,
    pub outcome: CallOutcome,
}

impl MethodCallResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, CallOutcome::Success(_))
    }
}

/// Opaque blob the transport can resume a connected session from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionSnapshot(pub serde_json::Value);

/// Lifecycle state plus the payload that is only valid in that state.
///
/// Connected-without-peer or URI-while-connected cannot be represented.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionPhase {
    #[default]
    Unpaired,
    Pairing {
        uri: PairingUri,
    },
    AwaitingApproval {
        peer: PeerMetadata,
    },
    Connected {
        peer: PeerMetadata,
        chain_id: u64,
        accounts: Vec<Address>,
        chain: Option<&'static ChainMetadata>,
    },
}

impl Display for SessionPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Unpaired => "unpaired",
            Self::Pairing { .. } => "pairing",
            Self::AwaitingApproval { .. } => "awaiting-approval",
            Self::Connected { .. } => "connected",
        })
    }
}

/// The one session a controller owns at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub phase: SessionPhase,
    /// FIFO by arrival. Entries leave only on consumption or reset.
    pub pending_requests: VecDeque<MethodCallRequest>,
    /// Append-only log of outbound call outcomes.
    pub results: Vec<MethodCallResult>,
}

impl Session {
    pub fn connected(&self) -> bool {
        matches!(self.phase, SessionPhase::Connected { .. })
    }

    pub fn pairing_uri(&self) -> Option<&PairingUri> {
        match &self.phase {
            SessionPhase::Pairing { uri } => Some(uri),
            _ => None,
        }
    }

    pub fn peer(&self) -> Option<&PeerMetadata> {
        match &self.phase {
            SessionPhase::AwaitingApproval { peer } | SessionPhase::Connected { peer, .. } => {
                Some(peer)
            }
            _ => None,
        }
    }

    pub fn chain_id(&self) -> Option<u64> {
        match &self.phase {
            SessionPhase::Connected { chain_id, .. } => Some(*chain_id),
            _ => None,
        }
    }

    pub fn chain(&self) -> Option<&'static ChainMetadata> {
        match &self.phase {
            SessionPhase::Connected { chain, .. } => *chain,
            _ => None,
        }
    }

    pub fn accounts(&self) -> &[Address] {
        match &self.phase {
            SessionPhase::Connected { accounts, .. } => accounts,
            _ => &[],
        }
    }

    /// First account is the active one.
    pub fn active_address(&self) -> Option<&Address> {
        self.accounts().first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_session_has_no_context() {
        let session = Session::default();
        assert!(!session.connected());
        assert!(session.pairing_uri().is_none());
        assert!(session.peer().is_none());
        assert!(session.active_address().is_none());
        assert!(session.pending_requests.is_empty());
        assert!(session.results.is_empty());
    }

    #[test]
    fn active_address_is_first_account() {
        let session = Session {
            phase: SessionPhase::Connected {
                peer: PeerMetadata::default(),
                chain_id: 1,
                accounts: vec![Address::from("0xaaa"), Address::from("0xbbb")],
                chain: None,
            },
            ..Default::default()
        };
        assert_eq!(session.active_address().unwrap().as_str(), "0xaaa");
    }

    #[test]
    fn method_wire_names() {
        assert_eq!(Method::SendTransaction.to_string(), "eth_sendTransaction");
        assert_eq!(
            serde_json::to_string(&Method::Sign).unwrap(),
            "\"eth_sign\""
        );
    }
}
