// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::common::Address;

/// The developer testnet.
pub const DEV_CHAIN_ID: u16 = 333;
pub const DEV_ENDPOINT: &str = "https://dev-api.zilliqa.com";

pub const MSG_VERSION: u16 = 1;

/// Default gas price in Qa (2000 Li).
pub const DEFAULT_GAS_PRICE: u128 = 2_000_000_000;

/// Everything a [`crate::social::SocialContract`] needs to reach one
/// deployed contract instance.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    pub endpoint: String,
    pub chain_id: u16,
    pub msg_version: u16,
    pub contract_address: Address,
    /// Gas price in Qa attached to every submitted transaction.
    pub gas_price: u128,
    /// Path to the Scilla source, used by the deployment path only.
    pub contract_path: Option<PathBuf>,
    /// How long to wait for a submitted transaction to be included.
    pub receipt_timeout: Duration,
    /// Delay between two receipt polls.
    pub poll_interval: Duration,
}

impl ClientConfig {
    /// A configuration for the developer testnet with default fee
    /// parameters.
    pub fn new(contract_address: Address) -> Self {
        ClientConfig {
            endpoint: DEV_ENDPOINT.to_owned(),
            chain_id: DEV_CHAIN_ID,
            msg_version: MSG_VERSION,
            contract_address,
            gas_price: DEFAULT_GAS_PRICE,
            contract_path: None,
            receipt_timeout: Duration::from_secs(240),
            poll_interval: Duration::from_secs(5),
        }
    }

    /// The packed network/version tag: chain id in the high half-word,
    /// message version in the low one.
    pub fn version(&self) -> u32 {
        (u32::from(self.chain_id) << 16) | u32::from(self.msg_version)
    }
}
