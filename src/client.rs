// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use async_lock::Mutex;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use url::Url;

use crate::{
    common::{Address, ZilliqaQueryError, ZilliqaServiceError},
    receipt::TransactionReceipt,
    transaction::TransactionPayload,
};

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a, T> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: T,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "R: DeserializeOwned"))]
struct JsonRpcResponse<R> {
    jsonrpc: String,
    id: u64,
    #[serde(default)]
    result: Option<R>,
    #[serde(default)]
    error: Option<JsonRpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorBody {
    code: i64,
    message: String,
}

/// Balance and nonce of an account, as reported by `GetBalance`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BalanceInfo {
    /// Balance in Qa, as a decimal string.
    pub balance: String,
    pub nonce: u64,
}

/// The endpoint's answer to `CreateTransaction`.
#[derive(Clone, Debug, Deserialize)]
pub struct CreateTransactionResponse {
    #[serde(rename = "TranID")]
    pub tran_id: String,
    #[serde(rename = "Info", default)]
    pub info: Option<String>,
    #[serde(rename = "ContractAddress", default)]
    pub contract_address: Option<String>,
}

/// The endpoint's answer to `GetTransaction` once the transaction is in a
/// block.
#[derive(Clone, Debug, Deserialize)]
pub struct GetTransactionResponse {
    #[serde(rename = "ID")]
    pub id: String,
    pub receipt: TransactionReceipt,
}

/// A JSON-RPC connection to the ledger endpoint.
#[async_trait]
pub trait JsonRpcClient: Send + Sync {
    /// Returns a fresh request id.
    async fn get_id(&self) -> u64;

    /// Posts one serialized request body and returns the raw response body.
    async fn request_inner(&self, payload: Vec<u8>) -> Result<Vec<u8>, ZilliqaServiceError>;

    /// Sends one request and decodes the typed result, after checking the
    /// response id and protocol version.
    async fn request<T, R>(&self, method: &str, params: T) -> Result<R, ZilliqaServiceError>
    where
        T: Serialize + Send + Sync,
        R: DeserializeOwned,
    {
        let id = self.get_id().await;
        let payload = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };
        let payload = serde_json::to_vec(&payload)?;
        let body = self.request_inner(payload).await?;
        let response: JsonRpcResponse<R> = serde_json::from_slice(&body)?;
        if response.jsonrpc != "2.0" {
            return Err(ZilliqaQueryError::WrongJsonRpcVersion.into());
        }
        if response.id != id {
            return Err(ZilliqaQueryError::IdIsNotMatching.into());
        }
        if let Some(error) = response.error {
            return Err(ZilliqaServiceError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        response
            .result
            .ok_or_else(|| ZilliqaQueryError::MissingResult.into())
    }
}

/// The queries the ledger endpoint must answer.
#[async_trait]
pub trait LedgerQueries: JsonRpcClient {
    async fn get_balance(&self, address: &Address) -> Result<BalanceInfo, ZilliqaServiceError> {
        self.request("GetBalance", [address.bare_hex()]).await
    }

    /// The minimum accepted gas price, in Qa.
    async fn get_minimum_gas_price(&self) -> Result<u128, ZilliqaServiceError> {
        let price: String = self.request("GetMinimumGasPrice", [""]).await?;
        Ok(price.parse()?)
    }

    async fn get_transaction(
        &self,
        id: &str,
    ) -> Result<GetTransactionResponse, ZilliqaServiceError> {
        self.request("GetTransaction", [id]).await
    }

    /// The contract's current state snapshot, in its raw wire shape.
    async fn get_smart_contract_state(
        &self,
        address: &Address,
    ) -> Result<serde_json::Value, ZilliqaServiceError> {
        self.request("GetSmartContractState", [address.bare_hex()])
            .await
    }

    async fn create_transaction(
        &self,
        payload: &TransactionPayload,
    ) -> Result<CreateTransactionResponse, ZilliqaServiceError> {
        self.request("CreateTransaction", [payload]).await
    }
}

impl<C: JsonRpcClient> LedgerQueries for C {}

/// A ledger endpoint reached over HTTP.
pub struct HttpClient {
    pub url: Url,
    id: Mutex<u64>,
    client: reqwest::Client,
}

impl HttpClient {
    /// Connects to an existing endpoint and creates an `HttpClient` if the
    /// URL is well-formed.
    pub fn new(url: &str) -> Result<Self, ZilliqaServiceError> {
        Ok(Self {
            url: Url::parse(url)?,
            id: Mutex::new(0),
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl JsonRpcClient for HttpClient {
    async fn get_id(&self) -> u64 {
        let mut id = self.id.lock().await;
        *id += 1;
        *id
    }

    async fn request_inner(&self, payload: Vec<u8>) -> Result<Vec<u8>, ZilliqaServiceError> {
        let response = self
            .client
            .post(self.url.clone())
            .body(payload)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await?;
        let body = response.bytes().await?;
        Ok(body.as_ref().to_vec())
    }
}
