//! Static registry of known chains and their display metadata.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use once_cell::sync::Lazy;
use serde::Serialize;

use crate::{Error, Result};

/// Chain the demo pairs against when nothing else is selected.
pub const DEFAULT_CHAIN_ID: u64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainMetadata {
    pub chain_id: u64,
    pub name: &'static str,
    pub rpc_url: &'static str,
}

impl Display for ChainMetadata {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.chain_id)
    }
}

static REGISTRY: Lazy<BTreeMap<u64, ChainMetadata>> = Lazy::new(|| {
    [
        ChainMetadata {
            chain_id: 1,
            name: "Ethereum Mainnet",
            rpc_url: "https://mainnet.infura.io/",
        },
        ChainMetadata {
            chain_id: 3,
            name: "Ethereum Ropsten",
            rpc_url: "https://ropsten.infura.io/",
        },
        ChainMetadata {
            chain_id: 4,
            name: "Ethereum Rinkeby",
            rpc_url: "https://rinkeby.infura.io/",
        },
        ChainMetadata {
            chain_id: 5,
            name: "Ethereum Görli",
            rpc_url: "https://goerli.infura.io/",
        },
        ChainMetadata {
            chain_id: 42,
            name: "Ethereum Kovan",
            rpc_url: "https://kovan.infura.io/",
        },
        ChainMetadata {
            chain_id: 100,
            name: "xDAI Chain",
            rpc_url: "https://dai.poa.network/",
        },
    ]
    .into_iter()
    .map(|c| (c.chain_id, c))
    .collect()
});

/// Looks up display metadata for `chain_id`.
///
/// An unknown id is recoverable: callers fall back to a "no chain data"
/// state rather than aborting the session.
pub fn lookup(chain_id: u64) -> Result<&'static ChainMetadata> {
    REGISTRY.get(&chain_id).ok_or(Error::UnknownChain(chain_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn known_chain() {
        let chain = lookup(1).unwrap();
        assert_eq!(chain.name, "Ethereum Mainnet");
        assert_eq!(chain.chain_id, 1);
    }

    #[test]
    fn unknown_chain_is_recoverable() {
        assert_matches!(lookup(31337), Err(Error::UnknownChain(31337)));
    }
}
