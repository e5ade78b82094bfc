// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! This crate provides a typed client for the social verification contract
//! deployed on a Zilliqa network: user registration, tweet submission, and
//! verification of the oracle's on-chain confirmation.

pub mod client;
pub mod common;
pub mod config;
pub mod receipt;
pub mod signer;
pub mod social;
pub mod state;
pub mod transaction;

/// Helper types for tests.
pub mod test_utils;
