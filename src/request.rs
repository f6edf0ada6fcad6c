//! Builders for the three outbound method-call payloads.
//!
//! Construction is pure apart from the two oracle lookups; sending and
//! result bookkeeping happen in the controller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::chains::ChainMetadata;
use crate::domain::Address;
use crate::hex::{sanitize_hex, shift_decimal, to_sanitized_hex};
use crate::Result;

/// Fixed gas limit of a plain value transfer.
pub const TRANSFER_GAS_LIMIT: u64 = 21_000;
/// Gas prices are quoted in gwei, i.e. scaled by 10^9.
pub const GWEI_DECIMALS: u32 = 9;

const SIGN_MESSAGE: &str = "My email is john@doe.com - 1537836206101";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasTier {
    /// Decimal gwei string, e.g. `"20"` or `"1.5"`.
    pub price: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasPrices {
    pub slow: GasTier,
    pub average: GasTier,
    pub fast: GasTier,
}

#[async_trait]
pub trait GasOracle: Send + Sync {
    async fn gas_prices(&self) -> Result<GasPrices>;
}

#[async_trait]
pub trait NonceOracle: Send + Sync {
    async fn nonce(&self, address: &Address, chain: &ChainMetadata) -> Result<u64>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub from: Address,
    pub to: Address,
    pub nonce: String,
    pub gas_price: String,
    pub gas_limit: String,
    pub value: String,
    pub data: String,
}

/// Assembles a zero-value self-transfer priced at the slow gas tier.
pub async fn value_transfer(
    from: &Address,
    chain: &ChainMetadata,
    gas: &dyn GasOracle,
    nonces: &dyn NonceOracle,
) -> Result<Transaction> {
    let nonce = nonces.nonce(from, chain).await?;
    let prices = gas.gas_prices().await?;
    let gas_price_wei = shift_decimal(&prices.slow.price, GWEI_DECIMALS)?;
    Ok(Transaction {
        from: from.clone(),
        to: from.clone(),
        nonce: format!("0x{nonce:x}"),
        gas_price: to_sanitized_hex(gas_price_wei),
        gas_limit: sanitize_hex(&format!("{TRANSFER_GAS_LIMIT:x}")),
        value: String::from("0x00"),
        data: String::from("0x"),
    })
}

/// Demonstrative EIP-712 payload with `chain_id` and the active address
/// substituted into the domain and message sections.
pub fn typed_data(address: &Address, chain_id: u64) -> serde_json::Value {
    json!([
        address,
        {
            "types": {
                "EIP712Domain": [
                    { "name": "name", "type": "string" },
                    { "name": "version", "type": "string" },
                    { "name": "chainId", "type": "uint256" },
                    { "name": "verifyingContract", "type": "address" }
                ],
                "Person": [
                    { "name": "name", "type": "string" },
                    { "name": "account", "type": "address" }
                ],
                "Mail": [
                    { "name": "from", "type": "Person" },
                    { "name": "to", "type": "Person" },
                    { "name": "contents", "type": "string" }
                ]
            },
            "primaryType": "Mail",
            "domain": {
                "name": "Example Dapp",
                "version": "0.7.0",
                "chainId": chain_id,
                "verifyingContract": "0x0000000000000000000000000000000000000000"
            },
            "message": {
                "from": {
                    "name": "Alice",
                    "account": address
                },
                "to": {
                    "name": "Bob",
                    "account": "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"
                },
                "contents": "Hey, Bob!"
            }
        }
    ])
}

/// Pairs the active address with the fixed demo message.
pub fn message(address: &Address) -> serde_json::Value {
    json!([address, SIGN_MESSAGE])
}
