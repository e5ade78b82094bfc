// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::{fmt, num::ParseIntError, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// One ZIL is 10^12 Qa, the smallest unit of the native token.
pub const QA_PER_ZIL: u128 = 1_000_000_000_000;

/// One Li is 10^6 Qa. Gas prices are usually quoted in Li.
pub const QA_PER_LI: u128 = 1_000_000;

/// Converts a whole-ZIL amount into Qa.
pub fn zil_to_qa(zil: u128) -> u128 {
    zil * QA_PER_ZIL
}

#[derive(Error, Debug)]
pub enum ZilliqaQueryError {
    /// The id should be matching
    #[error("the response id should match the request id")]
    IdIsNotMatching,

    /// wrong jsonrpc version
    #[error("wrong jsonrpc version")]
    WrongJsonRpcVersion,

    #[error("the response carried neither a result nor an error")]
    MissingResult,
}

#[derive(Debug, Error)]
pub enum ZilliqaServiceError {
    /// The JSON-RPC envelope is not coherent
    #[error(transparent)]
    ZilliqaQueryError(#[from] ZilliqaQueryError),

    /// Missing or unreadable init data
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Parsing error
    #[error(transparent)]
    ParseIntError(#[from] ParseIntError),

    /// Hex parsing error
    #[error(transparent)]
    FromHexError(#[from] hex::FromHexError),

    /// `serde_json` error
    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    /// The endpoint refused the request
    #[error("the endpoint rejected the request: {message} (code {code})")]
    Rpc { code: i64, message: String },

    /// The endpoint never reported inclusion within the configured bound
    #[error("no receipt for transaction {id} within the configured deadline")]
    ReceiptTimeout { id: String },

    #[error("transition {transition} takes {expected} arguments, found {found}")]
    ArgumentCount {
        transition: String,
        expected: usize,
        found: usize,
    },

    #[error("transition {transition} expects argument {vname}: {expected_type}")]
    MalformedArgument {
        transition: String,
        vname: String,
        expected_type: String,
    },

    #[error("signing failed: {0}")]
    Signing(String),

    /// The contract silently no-ops on a taken username or address.
    #[error("username or address already used, please try another username")]
    AlreadyRegistered,

    #[error("failed to submit tweet: {0}")]
    SubmissionFailed(#[source] Box<ZilliqaServiceError>),

    #[error("the transaction failed on the ledger")]
    TransactionRejected,

    #[error("the transaction did not emit the expected {event} event")]
    EventMissing { event: String },

    #[error("tweet id '{expected}' does not match tweet id from transaction '{actual}'")]
    TweetIdMismatch { actual: String, expected: String },

    /// Reqwest error
    #[error(transparent)]
    ReqwestError(#[from] reqwest::Error),

    /// URL parsing error
    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),
}

/// A 20-byte account or contract identifier.
///
/// Rendered with the canonical `0x` prefix whenever it appears as a
/// contract argument value; parses from hex with or without the prefix.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address([u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0; 20]);

    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Address(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Hex without the `0x` prefix, as some endpoint methods expect.
    pub fn bare_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)?;
        let bytes: [u8; 20] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Address(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One typed argument of a contract call, in the endpoint's wire shape.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractParam {
    pub vname: String,
    #[serde(rename = "type")]
    pub scilla_type: String,
    pub value: String,
}

impl ContractParam {
    pub fn new(
        vname: impl Into<String>,
        scilla_type: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        ContractParam {
            vname: vname.into(),
            scilla_type: scilla_type.into(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_renders_with_canonical_prefix() {
        let address: Address = "6ac6e30b8cd822a4ea1985d66a565e25f88f1c04".parse().unwrap();
        assert_eq!(
            address.to_string(),
            "0x6ac6e30b8cd822a4ea1985d66a565e25f88f1c04"
        );
        assert_eq!(
            address.bare_hex(),
            "6ac6e30b8cd822a4ea1985d66a565e25f88f1c04"
        );
    }

    #[test]
    fn address_parses_with_or_without_prefix() {
        let bare: Address = "6ac6e30b8cd822a4ea1985d66a565e25f88f1c04".parse().unwrap();
        let prefixed: Address = "0x6ac6e30b8cd822a4ea1985d66a565e25f88f1c04"
            .parse()
            .unwrap();
        assert_eq!(bare, prefixed);
    }

    #[test]
    fn address_rejects_wrong_length() {
        assert!("0xabcd".parse::<Address>().is_err());
    }

    #[test]
    fn contract_param_wire_shape() {
        let param = ContractParam::new("tweet_id", "String", "abc123");
        let json = serde_json::to_value(&param).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "vname": "tweet_id",
                "type": "String",
                "value": "abc123",
            })
        );
    }

    #[test]
    fn unit_conversions() {
        assert_eq!(zil_to_qa(50), 50_000_000_000_000);
        assert_eq!(QA_PER_LI * 1_000_000, QA_PER_ZIL);
    }
}
