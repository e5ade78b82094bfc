// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    client::{JsonRpcClient, LedgerQueries},
    common::{Address, ContractParam, ZilliqaServiceError},
    receipt::TransactionReceipt,
    signer::TransactionSigner,
};

/// Fee and value parameters accompanying one submitted request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionEnvelope {
    /// Packed chain id and message version.
    pub version: u32,
    /// Value transferred, in Qa.
    pub amount: u128,
    pub gas_price: u128,
    pub gas_limit: u64,
}

/// A declared contract entry point: name plus ordered `(vname, type)`
/// pairs.
#[derive(Clone, Copy, Debug)]
pub struct TransitionDecl {
    pub name: &'static str,
    pub params: &'static [(&'static str, &'static str)],
}

impl TransitionDecl {
    /// Checks `args` against the declaration and returns them in declared
    /// order. Surplus, missing, or wrongly typed arguments are rejected
    /// before anything reaches the network.
    pub fn check_args(
        &self,
        args: Vec<ContractParam>,
    ) -> Result<Vec<ContractParam>, ZilliqaServiceError> {
        if args.len() != self.params.len() {
            return Err(ZilliqaServiceError::ArgumentCount {
                transition: self.name.to_owned(),
                expected: self.params.len(),
                found: args.len(),
            });
        }
        let mut ordered = Vec::with_capacity(self.params.len());
        for (vname, scilla_type) in self.params {
            let arg = args
                .iter()
                .find(|arg| arg.vname == *vname && arg.scilla_type == *scilla_type)
                .ok_or_else(|| ZilliqaServiceError::MalformedArgument {
                    transition: self.name.to_owned(),
                    vname: (*vname).to_owned(),
                    expected_type: (*scilla_type).to_owned(),
                })?;
            ordered.push(arg.clone());
        }
        Ok(ordered)
    }
}

/// The `data` field of a contract call: transition tag plus arguments.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CallData {
    #[serde(rename = "_tag")]
    pub tag: String,
    pub params: Vec<ContractParam>,
}

/// A ready-to-sign request. Opaque to callers; building one performs no
/// network I/O.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    pub to_addr: Address,
    pub envelope: TransactionEnvelope,
    /// Scilla source for deployments, empty otherwise.
    pub code: String,
    /// JSON-encoded call data or init parameters, empty for transfers.
    pub data: String,
}

/// The signed transaction payload, in the shape `CreateTransaction`
/// expects.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPayload {
    pub version: u32,
    pub nonce: u64,
    pub to_addr: String,
    pub amount: String,
    pub pub_key: String,
    pub gas_price: String,
    pub gas_limit: String,
    pub code: String,
    pub data: String,
    pub signature: String,
}

/// Assembles well-formed outbound requests.
pub struct RequestBuilder {
    version: u32,
    gas_price: u128,
}

impl RequestBuilder {
    pub fn new(version: u32, gas_price: u128) -> Self {
        RequestBuilder { version, gas_price }
    }

    /// A transition call with zero value attached.
    pub fn call(
        &self,
        to: Address,
        transition: &TransitionDecl,
        args: Vec<ContractParam>,
        gas_limit: u64,
    ) -> Result<Request, ZilliqaServiceError> {
        let params = transition.check_args(args)?;
        let data = serde_json::to_string(&CallData {
            tag: transition.name.to_owned(),
            params,
        })?;
        Ok(Request {
            to_addr: to,
            envelope: TransactionEnvelope {
                version: self.version,
                amount: 0,
                gas_price: self.gas_price,
                gas_limit,
            },
            code: String::new(),
            data,
        })
    }

    /// A contract deployment carrying source code and init parameters.
    /// Every Scilla deployment needs `_scilla_version`; a missing one is a
    /// configuration failure, not a remote rejection.
    pub fn deploy(
        &self,
        code: String,
        init: Vec<ContractParam>,
        gas_limit: u64,
    ) -> Result<Request, ZilliqaServiceError> {
        if !init.iter().any(|param| param.vname == "_scilla_version") {
            return Err(ZilliqaServiceError::Configuration(
                "missing init parameter _scilla_version".to_owned(),
            ));
        }
        let data = serde_json::to_string(&init)?;
        Ok(Request {
            to_addr: Address::ZERO,
            envelope: TransactionEnvelope {
                version: self.version,
                amount: 0,
                gas_price: self.gas_price,
                gas_limit,
            },
            code,
            data,
        })
    }

    /// A plain value transfer: no operation name, only an amount and a
    /// destination.
    pub fn transfer(&self, to: Address, amount: u128) -> Request {
        Request {
            to_addr: to,
            envelope: TransactionEnvelope {
                version: self.version,
                amount,
                gas_price: self.gas_price,
                gas_limit: 1,
            },
            code: String::new(),
            data: String::new(),
        }
    }
}

/// Signs requests, posts them, and tracks their inclusion.
pub struct Submitter<'a, C> {
    client: &'a C,
    receipt_timeout: Duration,
    poll_interval: Duration,
}

impl<'a, C: JsonRpcClient> Submitter<'a, C> {
    pub fn new(client: &'a C, receipt_timeout: Duration, poll_interval: Duration) -> Self {
        Submitter {
            client,
            receipt_timeout,
            poll_interval,
        }
    }

    /// Signs and posts one request. The account must cover
    /// `amount + gas_price * gas_limit`, otherwise the endpoint rejects the
    /// submission. Once accepted, the transaction cannot be withdrawn.
    pub async fn submit(
        &self,
        request: &Request,
        signer: &dyn TransactionSigner,
    ) -> Result<PendingTransaction<'a, C>, ZilliqaServiceError> {
        let account = self.client.get_balance(&signer.address()).await?;
        let mut payload = TransactionPayload {
            version: request.envelope.version,
            nonce: account.nonce + 1,
            to_addr: request.to_addr.to_string(),
            amount: request.envelope.amount.to_string(),
            pub_key: signer.public_key(),
            gas_price: request.envelope.gas_price.to_string(),
            gas_limit: request.envelope.gas_limit.to_string(),
            code: request.code.clone(),
            data: request.data.clone(),
            signature: String::new(),
        };
        // The signer sees the canonical JSON payload without the signature
        // field filled in.
        let message = serde_json::to_vec(&payload)?;
        payload.signature = signer.sign(&message)?;
        debug!(to_addr = %request.to_addr, nonce = payload.nonce, "submitting transaction");
        let response = self.client.create_transaction(&payload).await?;
        Ok(PendingTransaction {
            client: self.client,
            id: response.tran_id,
            contract_address: response.contract_address,
            timeout: self.receipt_timeout,
            poll_interval: self.poll_interval,
        })
    }
}

/// A submitted transaction whose receipt has not arrived yet.
pub struct PendingTransaction<'a, C> {
    client: &'a C,
    pub id: String,
    /// Address of the newly created contract, on the deployment path.
    pub contract_address: Option<String>,
    timeout: Duration,
    poll_interval: Duration,
}

impl<C: JsonRpcClient> PendingTransaction<'_, C> {
    /// Polls the endpoint until it reports inclusion. The endpoint answers
    /// `GetTransaction` with an error until the transaction is in a block,
    /// so RPC errors keep the poll alive until the deadline.
    pub async fn wait(&self) -> Result<TransactionReceipt, ZilliqaServiceError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            match self.client.get_transaction(&self.id).await {
                Ok(transaction) => {
                    debug!(id = %self.id, success = transaction.receipt.success, "transaction included");
                    return Ok(transaction.receipt);
                }
                Err(ZilliqaServiceError::Rpc { .. }) if Instant::now() < deadline => {
                    tokio::time::sleep(self.poll_interval).await;
                }
                Err(ZilliqaServiceError::Rpc { .. }) => {
                    return Err(ZilliqaServiceError::ReceiptTimeout {
                        id: self.id.clone(),
                    });
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::*;
    use crate::social::{NEW_TWEET, REGISTER_USER};

    fn builder() -> RequestBuilder {
        RequestBuilder::new((333 << 16) | 1, 2_000_000_000)
    }

    #[test]
    fn call_arguments_follow_declared_order() {
        // Arguments supplied in reverse declaration order.
        let args = vec![
            ContractParam::new("twitter_username", "String", "alice"),
            ContractParam::new(
                "user_address",
                "ByStr20",
                "0x6ac6e30b8cd822a4ea1985d66a565e25f88f1c04",
            ),
        ];
        let request = builder()
            .call(Address::ZERO, &REGISTER_USER, args, 1000)
            .unwrap();
        let data: CallData = serde_json::from_str(&request.data).unwrap();
        assert_eq!(data.tag, "register_user");
        assert_eq!(data.params[0].vname, "user_address");
        assert_eq!(data.params[1].vname, "twitter_username");
    }

    #[test]
    fn call_rejects_wrong_argument_count() {
        let result = builder().call(Address::ZERO, &NEW_TWEET, Vec::new(), 1000);
        assert_matches!(result, Err(ZilliqaServiceError::ArgumentCount { .. }));
    }

    #[test]
    fn call_rejects_wrong_type_tag() {
        let args = vec![ContractParam::new("tweet_id", "Uint32", "42")];
        let result = builder().call(Address::ZERO, &NEW_TWEET, args, 1000);
        assert_matches!(
            result,
            Err(ZilliqaServiceError::MalformedArgument { ref vname, .. }) if vname == "tweet_id"
        );
    }

    #[test]
    fn deploy_requires_scilla_version() {
        let init = vec![ContractParam::new("hashtag", "String", "#BuiltWithZil")];
        let result = builder().deploy("contract code".to_owned(), init, 100_000);
        assert_matches!(result, Err(ZilliqaServiceError::Configuration(_)));
    }

    #[test]
    fn transfer_has_no_call_data_and_unit_gas() {
        let to: Address = "0x6ac6e30b8cd822a4ea1985d66a565e25f88f1c04"
            .parse()
            .unwrap();
        let request = builder().transfer(to, 50_000_000_000_000);
        assert!(request.code.is_empty());
        assert!(request.data.is_empty());
        assert_eq!(request.envelope.gas_limit, 1);
        assert_eq!(request.envelope.amount, 50_000_000_000_000);
    }

    /// An endpoint that never includes anything: every request is answered
    /// with the "not present" error.
    struct NeverIncluded;

    #[async_trait]
    impl JsonRpcClient for NeverIncluded {
        async fn get_id(&self) -> u64 {
            1
        }

        async fn request_inner(&self, payload: Vec<u8>) -> Result<Vec<u8>, ZilliqaServiceError> {
            let request: Value = serde_json::from_slice(&payload)?;
            let id = request.get("id").and_then(Value::as_u64).unwrap_or(0);
            let response = json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": -20, "message": "Txn Hash not Present" },
            });
            Ok(serde_json::to_vec(&response)?)
        }
    }

    #[tokio::test]
    async fn wait_is_bounded() {
        let client = NeverIncluded;
        let pending = PendingTransaction {
            client: &client,
            id: "deadbeef".to_owned(),
            contract_address: None,
            timeout: Duration::from_millis(20),
            poll_interval: Duration::from_millis(5),
        };
        let result = pending.wait().await;
        assert_matches!(
            result,
            Err(ZilliqaServiceError::ReceiptTimeout { ref id }) if id == "deadbeef"
        );
    }

    #[test]
    fn payload_wire_field_names() {
        let payload = TransactionPayload {
            version: (333 << 16) | 1,
            nonce: 1,
            to_addr: "0x6ac6e30b8cd822a4ea1985d66a565e25f88f1c04".to_owned(),
            amount: "0".to_owned(),
            pub_key: "aa".to_owned(),
            gas_price: "2000000000".to_owned(),
            gas_limit: "1000".to_owned(),
            code: String::new(),
            data: String::new(),
            signature: "bb".to_owned(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        for field in ["toAddr", "pubKey", "gasPrice", "gasLimit"] {
            assert!(json.get(field).is_some(), "missing field {field}");
        }
    }
}
