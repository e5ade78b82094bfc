// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeMap, BTreeSet};

use async_lock::Mutex;
use async_trait::async_trait;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::{
    client::JsonRpcClient,
    common::{Address, ZilliqaServiceError},
    signer::{Credential, TransactionSigner},
};

/// Derives an account address from a hex public key the way the ledger
/// does: the last 20 bytes of the key's SHA-256 digest.
pub fn address_from_public_key(public_key: &str) -> Option<Address> {
    let bytes = hex::decode(public_key).ok()?;
    let digest = Sha256::digest(&bytes);
    let mut address = [0_u8; 20];
    address.copy_from_slice(&digest[12..32]);
    Some(Address::from_bytes(address))
}

/// Deterministic signer for tests.
///
/// The public key is a digest of the secret and the signature a digest of
/// secret and message; no real cryptography is involved, which is all the
/// [`MockLedger`] asks for.
pub struct TestSigner {
    secret: String,
    public_key: String,
    address: Address,
}

impl TestSigner {
    pub fn new(credential: &Credential) -> Self {
        let secret = credential.expose_secret().to_owned();
        let public_key = hex::encode(Sha256::digest(format!("pub:{secret}").as_bytes()));
        let address = address_from_public_key(&public_key).expect("derived key is valid hex");
        TestSigner {
            secret,
            public_key,
            address,
        }
    }
}

impl TransactionSigner for TestSigner {
    fn address(&self) -> Address {
        self.address
    }

    fn public_key(&self) -> String {
        self.public_key.clone()
    }

    fn sign(&self, message: &[u8]) -> Result<String, ZilliqaServiceError> {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(message);
        Ok(hex::encode(hasher.finalize()))
    }
}

#[derive(Clone, Copy, Default)]
struct AccountState {
    balance: u128,
    nonce: u64,
}

#[derive(Default)]
struct LedgerState {
    accounts: BTreeMap<String, AccountState>,
    used_usernames: BTreeMap<String, String>,
    registered_addresses: BTreeSet<String>,
    verifying_tweets: BTreeMap<String, String>,
    transactions: BTreeMap<String, Value>,
    fail_next: bool,
    transaction_counter: u64,
}

/// In-process stand-in for the ledger endpoint.
///
/// Answers the five JSON-RPC methods the client uses and simulates the
/// contract's observable behavior: a duplicate registration no-ops without
/// event logs, and `new_tweet` immediately carries the oracle's
/// `verify_tweet` echo. The oracle's asynchronous round trip is collapsed
/// into the submitting transaction.
pub struct MockLedger {
    id: Mutex<u64>,
    state: Mutex<LedgerState>,
    min_gas_price: u128,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLedger {
    pub fn new() -> Self {
        MockLedger {
            id: Mutex::new(0),
            state: Mutex::new(LedgerState::default()),
            min_gas_price: 2_000_000_000,
        }
    }

    /// Seeds an account with `amount` Qa.
    pub async fn fund(&self, address: Address, amount: u128) {
        let mut state = self.state.lock().await;
        state.accounts.entry(address.bare_hex()).or_default().balance += amount;
    }

    pub async fn balance_of(&self, address: &Address) -> u128 {
        let state = self.state.lock().await;
        state
            .accounts
            .get(&address.bare_hex())
            .map(|account| account.balance)
            .unwrap_or(0)
    }

    /// Makes the next submitted transaction fail on the ledger.
    pub async fn fail_next_transaction(&self) {
        self.state.lock().await.fail_next = true;
    }

    fn handle(
        &self,
        state: &mut LedgerState,
        method: &str,
        params: &Value,
    ) -> Result<Value, (i64, String)> {
        match method {
            "GetBalance" => {
                let address = bare_address(first_str(params)?);
                let account = state
                    .accounts
                    .get(&address)
                    .ok_or((-5, "Account is not created".to_owned()))?;
                Ok(json!({
                    "balance": account.balance.to_string(),
                    "nonce": account.nonce,
                }))
            }
            "GetMinimumGasPrice" => Ok(Value::String(self.min_gas_price.to_string())),
            "GetTransaction" => {
                let id = first_str(params)?;
                state
                    .transactions
                    .get(id)
                    .cloned()
                    .ok_or((-20, "Txn Hash not Present".to_owned()))
            }
            "GetSmartContractState" => {
                let used_usernames: BTreeMap<_, _> = state
                    .used_usernames
                    .iter()
                    .map(|(username, address)| (username.clone(), format!("0x{address}")))
                    .collect();
                let verifying_tweets: BTreeMap<_, _> = state
                    .verifying_tweets
                    .iter()
                    .map(|(tweet_id, address)| (tweet_id.clone(), format!("0x{address}")))
                    .collect();
                Ok(json!({
                    "_balance": "0",
                    "used_usernames": used_usernames,
                    "verifying_tweets": verifying_tweets,
                }))
            }
            "CreateTransaction" => self.create_transaction(state, params),
            other => Err((-32601, format!("unknown method {other}"))),
        }
    }

    fn create_transaction(
        &self,
        state: &mut LedgerState,
        params: &Value,
    ) -> Result<Value, (i64, String)> {
        let payload = params
            .get(0)
            .and_then(Value::as_object)
            .ok_or((-1, "Invalid params".to_owned()))?;
        let field_str = |name: &str| -> Result<&str, (i64, String)> {
            payload
                .get(name)
                .and_then(Value::as_str)
                .ok_or((-1, format!("missing field {name}")))
        };
        let field_u128 = |name: &str| -> Result<u128, (i64, String)> {
            field_str(name)?
                .parse()
                .map_err(|_| (-1, format!("malformed field {name}")))
        };

        if field_str("signature")?.is_empty() {
            return Err((-26, "Unable to verify transaction".to_owned()));
        }
        let sender = address_from_public_key(field_str("pubKey")?)
            .ok_or((-26, "Invalid public key".to_owned()))?
            .bare_hex();
        let nonce = payload
            .get("nonce")
            .and_then(Value::as_u64)
            .ok_or((-1, "missing field nonce".to_owned()))?;
        let amount = field_u128("amount")?;
        let gas_price = field_u128("gasPrice")?;
        let gas_limit = field_u128("gasLimit")?;
        let to_addr = bare_address(field_str("toAddr")?);
        let code = field_str("code")?.to_owned();
        let data = field_str("data")?.to_owned();

        let account = state
            .accounts
            .get(&sender)
            .copied()
            .ok_or((-5, "Account is not created".to_owned()))?;
        if nonce != account.nonce + 1 {
            return Err((-25, "Invalid nonce".to_owned()));
        }
        let cost = amount + gas_price * gas_limit;
        if account.balance < cost {
            return Err((-8, "Insufficient balance".to_owned()));
        }

        let entry = state.accounts.entry(sender.clone()).or_default();
        entry.nonce += 1;
        entry.balance -= cost;
        let sender_nonce = entry.nonce;

        state.transaction_counter += 1;
        let id = hex::encode(Sha256::digest(
            format!("tx-{}", state.transaction_counter).as_bytes(),
        ));

        let mut contract_address = None;
        let receipt = if std::mem::take(&mut state.fail_next) {
            json!({ "success": false })
        } else if !code.is_empty() {
            let digest = Sha256::digest(format!("{sender}:{sender_nonce}").as_bytes());
            contract_address = Some(hex::encode(&digest[12..32]));
            json!({ "success": true })
        } else if !data.is_empty() {
            self.apply_call(state, &sender, &data)?
        } else {
            state.accounts.entry(to_addr).or_default().balance += amount;
            json!({ "success": true })
        };

        state
            .transactions
            .insert(id.clone(), json!({ "ID": id, "receipt": receipt }));

        let mut result = json!({ "TranID": id, "Info": "Txn processed" });
        if let Some(address) = contract_address {
            result["ContractAddress"] = Value::String(address);
        }
        Ok(result)
    }

    fn apply_call(
        &self,
        state: &mut LedgerState,
        sender: &str,
        data: &str,
    ) -> Result<Value, (i64, String)> {
        let call: Value =
            serde_json::from_str(data).map_err(|_| (-1, "malformed call data".to_owned()))?;
        let tag = call.get("_tag").and_then(Value::as_str).unwrap_or_default();
        let param = |vname: &str| -> Option<String> {
            call.get("params")?
                .as_array()?
                .iter()
                .find(|param| param.get("vname").and_then(Value::as_str) == Some(vname))?
                .get("value")?
                .as_str()
                .map(str::to_owned)
        };
        match tag {
            "register_user" => {
                let username =
                    param("twitter_username").ok_or((-1, "missing argument".to_owned()))?;
                let user_address = bare_address(
                    &param("user_address").ok_or((-1, "missing argument".to_owned()))?,
                );
                if state.used_usernames.contains_key(&username)
                    || state.registered_addresses.contains(&user_address)
                {
                    // The contract no-ops on duplicates: included, successful,
                    // no events.
                    return Ok(json!({ "success": true }));
                }
                state.used_usernames.insert(username.clone(), user_address.clone());
                state.registered_addresses.insert(user_address.clone());
                Ok(json!({
                    "success": true,
                    "event_logs": [{
                        "_eventname": "user_registered",
                        "params": [
                            { "vname": "user_address", "type": "ByStr20", "value": format!("0x{user_address}") },
                            { "vname": "twitter_username", "type": "String", "value": username },
                        ],
                    }],
                }))
            }
            "new_tweet" => {
                let tweet_id = param("tweet_id").ok_or((-1, "missing argument".to_owned()))?;
                state
                    .verifying_tweets
                    .insert(tweet_id.clone(), sender.to_owned());
                Ok(json!({
                    "success": true,
                    "event_logs": [{
                        "_eventname": "verify_tweet",
                        "params": [
                            { "vname": "tweet_id", "type": "String", "value": tweet_id },
                            { "vname": "user_address", "type": "ByStr20", "value": format!("0x{sender}") },
                        ],
                    }],
                }))
            }
            _ => Ok(json!({ "success": false })),
        }
    }
}

fn first_str(params: &Value) -> Result<&str, (i64, String)> {
    params
        .get(0)
        .and_then(Value::as_str)
        .ok_or((-1, "Invalid params".to_owned()))
}

fn bare_address(address: &str) -> String {
    address.strip_prefix("0x").unwrap_or(address).to_lowercase()
}

#[async_trait]
impl JsonRpcClient for MockLedger {
    async fn get_id(&self) -> u64 {
        let mut id = self.id.lock().await;
        *id += 1;
        *id
    }

    async fn request_inner(&self, payload: Vec<u8>) -> Result<Vec<u8>, ZilliqaServiceError> {
        let request: Value = serde_json::from_slice(&payload)?;
        let id = request.get("id").and_then(Value::as_u64).unwrap_or(0);
        let method = request
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        let params = request.get("params").cloned().unwrap_or(Value::Null);
        let mut state = self.state.lock().await;
        let response = match self.handle(&mut state, &method, &params) {
            Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
            Err((code, message)) => json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": code, "message": message },
            }),
        };
        Ok(serde_json::to_vec(&response)?)
    }
}
