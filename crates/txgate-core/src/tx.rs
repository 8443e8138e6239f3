//! Transaction configuration
//!
//! The editable part of a transaction: gas limit, memo, fee and whatever
//! chain-specific fields the signer needs.

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::{Error, Result};

/// Gas limit, arbitrary precision
pub type Gas = U256;

/// Gas used for a plain bank send
pub const DEFAULT_SEND_GAS: u64 = 60_000;

/// Longest memo accepted, in characters
pub const MAX_MEMO_CHARS: usize = 256;

/// An amount in a denomination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    /// Amount in the smallest unit
    pub amount: U256,
    /// Denomination, e.g. `uatom`
    pub denom: String,
}

impl Coin {
    /// Create a coin
    pub fn new(amount: impl Into<U256>, denom: impl Into<String>) -> Self {
        Self {
            amount: amount.into(),
            denom: denom.into(),
        }
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// A transaction configuration under review
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TxConfig {
    /// Gas limit
    pub gas: Gas,
    /// Memo
    #[serde(default)]
    pub memo: String,
    /// Fee; unset until chosen
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<Coin>,
    /// Chain-specific fields passed through to the signer
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub payload: Map<String, Value>,
}

impl TxConfig {
    /// Create a config without fee
    pub fn new(gas: impl Into<Gas>, memo: impl Into<String>) -> Self {
        Self {
            gas: gas.into(),
            memo: memo.into(),
            fee: None,
            payload: Map::new(),
        }
    }

    /// Set the fee
    #[must_use]
    pub fn with_fee(mut self, fee: Coin) -> Self {
        self.fee = Some(fee);
        self
    }

    /// Merge a patch, last writer wins per field
    pub fn apply(&mut self, patch: TxConfigPatch) {
        if let Some(gas) = patch.gas {
            self.gas = gas;
        }
        if let Some(memo) = patch.memo {
            self.memo = memo;
        }
        if let Some(fee) = patch.fee {
            self.fee = Some(fee);
        }
        if let Some(payload) = patch.payload {
            self.payload.extend(payload);
        }
    }

    /// Check the config is fit for signing
    pub fn validate(&self) -> Result<()> {
        if self.gas.is_zero() {
            return Err(Error::config_invalid("gas", "gas must be greater than zero"));
        }
        if self.memo.chars().count() > MAX_MEMO_CHARS {
            return Err(Error::config_invalid(
                "memo",
                format!("memo is longer than {MAX_MEMO_CHARS} characters"),
            ));
        }
        match &self.fee {
            None => Err(Error::config_invalid("fee", "fee is required")),
            Some(fee) if fee.denom.is_empty() => {
                Err(Error::config_invalid("fee", "fee denomination is missing"))
            }
            Some(_) => Ok(()),
        }
    }
}

/// Partial update to a [`TxConfig`]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TxConfigPatch {
    /// New gas limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<Gas>,
    /// New memo
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    /// New fee
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<Coin>,
    /// Payload fields to merge
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Map<String, Value>>,
}

impl TxConfigPatch {
    /// Patch only the gas limit
    pub fn gas(gas: impl Into<Gas>) -> Self {
        Self {
            gas: Some(gas.into()),
            ..Self::default()
        }
    }

    /// Patch only the memo
    pub fn memo(memo: impl Into<String>) -> Self {
        Self {
            memo: Some(memo.into()),
            ..Self::default()
        }
    }

    /// Patch only the fee
    #[must_use]
    pub fn fee(fee: Coin) -> Self {
        Self {
            fee: Some(fee),
            ..Self::default()
        }
    }
}

/// Parse a user-entered gas limit, decimal or `0x`-prefixed hex
pub fn parse_gas(raw: &str) -> Result<Gas> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(Error::config_invalid("gas", "gas is required"));
    }
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) if !hex.is_empty() => U256::from_str_radix(hex, 16).ok(),
        Some(_) => None,
        None => U256::from_dec_str(raw).ok(),
    };
    parsed.ok_or_else(|| Error::config_invalid("gas", format!("'{raw}' is not a valid gas amount")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_merges_fields() {
        let mut config = TxConfig::new(0u64, "");
        config.apply(TxConfigPatch::gas(60_000u64));
        config.apply(TxConfigPatch::memo("hello"));

        assert_eq!(config.gas, U256::from(60_000u64));
        assert_eq!(config.memo, "hello");
        assert!(config.fee.is_none());
    }

    #[test]
    fn test_payload_merge_keeps_other_keys() {
        let mut config = TxConfig::new(1u64, "");
        config.payload.insert("chain_id".into(), Value::from("cosmoshub-4"));

        let mut extra = Map::new();
        extra.insert("account_number".into(), Value::from(7));
        config.apply(TxConfigPatch {
            payload: Some(extra),
            ..TxConfigPatch::default()
        });

        assert_eq!(config.payload.len(), 2);
    }

    #[test]
    fn test_validate() {
        let config = TxConfig::new(60_000u64, "");
        assert!(matches!(
            config.validate(),
            Err(Error::ConfigInvalid { ref field, .. }) if field == "fee"
        ));

        let config = config.with_fee(Coin::new(1000u64, "uatom"));
        assert!(config.validate().is_ok());

        let mut zero_gas = config.clone();
        zero_gas.gas = U256::zero();
        assert!(zero_gas.validate().is_err());

        let mut long_memo = config;
        long_memo.memo = "x".repeat(MAX_MEMO_CHARS + 1);
        assert!(long_memo.validate().is_err());
    }

    #[test]
    fn test_parse_gas() {
        assert_eq!(parse_gas(" 60000 ").unwrap(), U256::from(60_000u64));
        assert_eq!(
            parse_gas("340282366920938463463374607431768211456").unwrap(),
            U256::from(u128::MAX) + U256::one()
        );
        assert!(parse_gas("").is_err());
        assert!(parse_gas("12.5").is_err());
        assert!(parse_gas("-1").is_err());
    }

    #[test]
    fn test_parse_gas_hex() {
        assert_eq!(parse_gas("0xea60").unwrap(), U256::from(60_000u64));
        assert_eq!(parse_gas("0XEA60").unwrap(), U256::from(60_000u64));
        assert!(parse_gas("0x").is_err());
        assert!(parse_gas("0xzz").is_err());
    }

    #[test]
    fn test_config_wire_roundtrip_keeps_big_gas() {
        let mut config = TxConfig::new(U256::MAX, "memo").with_fee(Coin::new(1000u64, "uatom"));
        config.payload.insert("chain_id".into(), Value::from("cosmoshub-4"));

        let json = serde_json::to_string(&config).unwrap();
        let back: TxConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
