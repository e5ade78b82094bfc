// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use serde_json::Value;

use crate::{
    client::{JsonRpcClient, LedgerQueries},
    common::{Address, ZilliqaServiceError},
};

/// A decoded contract state field: either a scalar rendered as a string or
/// a mapping from keys to further field values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldValue {
    Scalar(String),
    Mapping(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    /// Decodes one field from the loosely-typed snapshot JSON. Map fields
    /// come back as objects on the current state API and as `{key, val}`
    /// entry lists on the older one; both decode to [`FieldValue::Mapping`].
    pub fn from_json(value: &Value) -> FieldValue {
        match value {
            Value::Object(map) => FieldValue::Mapping(
                map.iter()
                    .map(|(key, val)| (key.clone(), FieldValue::from_json(val)))
                    .collect(),
            ),
            Value::Array(entries) => {
                let mut mapping = BTreeMap::new();
                for entry in entries {
                    let (Some(key), Some(val)) =
                        (entry.get("key").and_then(Value::as_str), entry.get("val"))
                    else {
                        return FieldValue::Scalar(value.to_string());
                    };
                    mapping.insert(key.to_owned(), FieldValue::from_json(val));
                }
                FieldValue::Mapping(mapping)
            }
            Value::String(s) => FieldValue::Scalar(s.clone()),
            other => FieldValue::Scalar(other.to_string()),
        }
    }

    /// Point lookup inside a mapping; `None` for scalars and absent keys.
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        match self {
            FieldValue::Mapping(mapping) => mapping.get(key),
            FieldValue::Scalar(_) => None,
        }
    }
}

/// A point-in-time copy of the contract's persistent fields.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StateSnapshot {
    fields: BTreeMap<String, FieldValue>,
}

impl StateSnapshot {
    /// Decodes both snapshot shapes the endpoint is known to produce: an
    /// object keyed by field name, or an array of `{vname, value}` records.
    pub fn from_json(value: Value) -> Self {
        let mut fields = BTreeMap::new();
        match value {
            Value::Object(map) => {
                for (name, val) in &map {
                    fields.insert(name.clone(), FieldValue::from_json(val));
                }
            }
            Value::Array(records) => {
                for record in &records {
                    let (Some(vname), Some(val)) = (
                        record.get("vname").and_then(Value::as_str),
                        record.get("value"),
                    ) else {
                        continue;
                    };
                    fields.insert(vname.to_owned(), FieldValue::from_json(val));
                }
            }
            _ => {}
        }
        StateSnapshot { fields }
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Point lookup; absent fields and keys are `None`, never an error.
    pub fn lookup(&self, field: &str, key: &str) -> Option<&FieldValue> {
        self.field(field)?.get(key)
    }
}

/// Fetches fresh contract state and answers point lookups.
///
/// Every call hits the endpoint anew; there is no cache, so two lookups can
/// observe different snapshots and a read racing a concurrent write gives
/// no consistency guarantee.
pub struct StateQuery<'a, C> {
    client: &'a C,
    contract: Address,
}

impl<'a, C: JsonRpcClient> StateQuery<'a, C> {
    pub fn new(client: &'a C, contract: Address) -> Self {
        StateQuery { client, contract }
    }

    pub async fn snapshot(&self) -> Result<StateSnapshot, ZilliqaServiceError> {
        let value = self.client.get_smart_contract_state(&self.contract).await?;
        Ok(StateSnapshot::from_json(value))
    }

    pub async fn fetch_field(
        &self,
        name: &str,
    ) -> Result<Option<FieldValue>, ZilliqaServiceError> {
        Ok(self.snapshot().await?.field(name).cloned())
    }

    pub async fn lookup(
        &self,
        field: &str,
        key: &str,
    ) -> Result<Option<FieldValue>, ZilliqaServiceError> {
        Ok(self.snapshot().await?.lookup(field, key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_object_shaped_snapshot() {
        let snapshot = StateSnapshot::from_json(json!({
            "_balance": "0",
            "used_usernames": {
                "alice": "0x6ac6e30b8cd822a4ea1985d66a565e25f88f1c04",
            },
        }));
        assert_eq!(
            snapshot.field("_balance"),
            Some(&FieldValue::Scalar("0".to_owned()))
        );
        assert_eq!(
            snapshot.lookup("used_usernames", "alice"),
            Some(&FieldValue::Scalar(
                "0x6ac6e30b8cd822a4ea1985d66a565e25f88f1c04".to_owned()
            ))
        );
    }

    #[test]
    fn decodes_legacy_array_snapshot() {
        let snapshot = StateSnapshot::from_json(json!([
            { "vname": "_balance", "type": "Uint128", "value": "0" },
            {
                "vname": "verifying_tweets",
                "type": "Map",
                "value": [
                    { "key": "abc123", "val": "0x6ac6e30b8cd822a4ea1985d66a565e25f88f1c04" },
                ],
            },
        ]));
        assert!(snapshot.lookup("verifying_tweets", "abc123").is_some());
        assert!(snapshot.lookup("verifying_tweets", "xyz999").is_none());
    }

    #[test]
    fn absent_fields_and_keys_are_not_found() {
        let snapshot = StateSnapshot::from_json(json!({ "used_usernames": {} }));
        assert!(snapshot.lookup("used_usernames", "alice").is_none());
        assert!(snapshot.lookup("no_such_field", "alice").is_none());
        assert!(snapshot.field("no_such_field").is_none());
    }

    #[test]
    fn scalar_fields_have_no_keys() {
        let snapshot = StateSnapshot::from_json(json!({ "_balance": "42" }));
        assert!(snapshot.lookup("_balance", "anything").is_none());
    }

    #[tokio::test]
    async fn fresh_fetch_per_query() {
        let ledger = crate::test_utils::MockLedger::new();
        let query = StateQuery::new(&ledger, Address::ZERO);
        assert_eq!(
            query.fetch_field("used_usernames").await.unwrap(),
            Some(FieldValue::Mapping(BTreeMap::new()))
        );
        assert_eq!(query.fetch_field("no_such_field").await.unwrap(), None);
        assert_eq!(
            query.lookup("used_usernames", "alice").await.unwrap(),
            None
        );
    }

    #[test]
    fn nested_mappings_decode_recursively() {
        let snapshot = StateSnapshot::from_json(json!({
            "verifying_tweets": {
                "abc123": { "owner": "0x6ac6e30b8cd822a4ea1985d66a565e25f88f1c04" },
            },
        }));
        let entry = snapshot.lookup("verifying_tweets", "abc123").unwrap();
        assert!(entry.get("owner").is_some());
        assert!(entry.get("oracle").is_none());
    }
}
