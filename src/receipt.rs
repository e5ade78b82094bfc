// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::common::ContractParam;

/// The outcome record of an included transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub success: bool,
    /// Absent when the transaction had no observable effect. The contract
    /// no-ops instead of raising when a username or address is already
    /// taken, so the registration path reads an absent list as "already
    /// registered". This convention is observed behavior, not part of the
    /// declared contract interface.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_logs: Option<Vec<EventLog>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cumulative_gas: Option<String>,
}

/// One event emitted by a transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    #[serde(rename = "_eventname")]
    pub event_name: String,
    pub params: Vec<ContractParam>,
}

/// The domain-level reading of a receipt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The receipt confirms the expected effect.
    Verified,
    /// The ledger included the transaction but it failed.
    Rejected,
    /// The transaction went through without any observable effect.
    NoEffect,
    /// The expected event, or one of its parameters, is absent.
    EventMissing,
    /// The event was found but a parameter value differs.
    Mismatch { actual: String, expected: String },
}

/// Decides the domain outcome for a receipt.
///
/// Pure: the same receipt and expectations always produce the same
/// outcome. With `expected_event` set to `None`, the mere presence of event
/// logs counts as verified and `expected_params` is not consulted.
pub fn interpret(
    receipt: &TransactionReceipt,
    expected_event: Option<&str>,
    expected_params: &[(&str, &str)],
) -> Outcome {
    if !receipt.success {
        return Outcome::Rejected;
    }
    let Some(event_logs) = &receipt.event_logs else {
        return Outcome::NoEffect;
    };
    let Some(event) = expected_event else {
        return Outcome::Verified;
    };
    let Some(record) = event_logs.iter().find(|log| log.event_name == event) else {
        return Outcome::EventMissing;
    };
    for (vname, expected) in expected_params {
        let Some(param) = record.params.iter().find(|param| param.vname == *vname) else {
            return Outcome::EventMissing;
        };
        if param.value != *expected {
            return Outcome::Mismatch {
                actual: param.value.clone(),
                expected: (*expected).to_string(),
            };
        }
    }
    Outcome::Verified
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verify_tweet_receipt(tweet_id: &str) -> TransactionReceipt {
        TransactionReceipt {
            success: true,
            event_logs: Some(vec![EventLog {
                event_name: "verify_tweet".to_owned(),
                params: vec![ContractParam::new("tweet_id", "String", tweet_id)],
            }]),
            cumulative_gas: None,
        }
    }

    #[test]
    fn failed_receipt_is_rejected() {
        let receipt = TransactionReceipt {
            success: false,
            event_logs: None,
            cumulative_gas: None,
        };
        assert_eq!(interpret(&receipt, None, &[]), Outcome::Rejected);
        assert_eq!(
            interpret(&receipt, Some("verify_tweet"), &[]),
            Outcome::Rejected
        );
    }

    #[test]
    fn absent_event_logs_is_no_effect() {
        let receipt = TransactionReceipt {
            success: true,
            event_logs: None,
            cumulative_gas: None,
        };
        assert_eq!(interpret(&receipt, None, &[]), Outcome::NoEffect);
    }

    #[test]
    fn any_event_counts_without_expectation() {
        let receipt = verify_tweet_receipt("abc123");
        assert_eq!(interpret(&receipt, None, &[]), Outcome::Verified);
    }

    #[test]
    fn missing_event_name() {
        let receipt = verify_tweet_receipt("abc123");
        assert_eq!(
            interpret(&receipt, Some("some_other_event"), &[]),
            Outcome::EventMissing
        );
    }

    #[test]
    fn missing_param_name() {
        let receipt = verify_tweet_receipt("abc123");
        assert_eq!(
            interpret(&receipt, Some("verify_tweet"), &[("user_address", "0x00")]),
            Outcome::EventMissing
        );
    }

    #[test]
    fn mismatch_names_both_values() {
        let receipt = verify_tweet_receipt("abc123");
        assert_eq!(
            interpret(&receipt, Some("verify_tweet"), &[("tweet_id", "xyz999")]),
            Outcome::Mismatch {
                actual: "abc123".to_owned(),
                expected: "xyz999".to_owned(),
            }
        );
    }

    #[test]
    fn matching_params_verify() {
        let receipt = verify_tweet_receipt("abc123");
        assert_eq!(
            interpret(&receipt, Some("verify_tweet"), &[("tweet_id", "abc123")]),
            Outcome::Verified
        );
    }

    #[test]
    fn interpretation_is_deterministic() {
        let receipt = verify_tweet_receipt("abc123");
        let checks = [("tweet_id", "abc123")];
        let first = interpret(&receipt, Some("verify_tweet"), &checks);
        let second = interpret(&receipt, Some("verify_tweet"), &checks);
        assert_eq!(first, second);
    }

    #[test]
    fn receipt_wire_shape() {
        let json = serde_json::json!({
            "success": true,
            "cumulative_gas": "562",
            "event_logs": [{
                "_eventname": "verify_tweet",
                "params": [
                    { "vname": "tweet_id", "type": "String", "value": "abc123" },
                ],
            }],
        });
        let receipt: TransactionReceipt = serde_json::from_value(json).unwrap();
        let mut expected = verify_tweet_receipt("abc123");
        expected.cumulative_gas = Some("562".to_owned());
        assert_eq!(receipt, expected);
    }
}
