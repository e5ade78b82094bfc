// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use crate::common::{Address, ZilliqaServiceError};

/// Private signing material for one account.
///
/// The secret is opaque to this crate: it is handed to a
/// [`TransactionSigner`] implementation and never logged or persisted here.
#[derive(Clone)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Credential(secret.into())
    }

    /// Reads the credential for a named role from the process environment,
    /// e.g. `OWNER_PRIVATE_KEY` for the `owner` role.
    pub fn from_env(role: &str) -> Result<Self, ZilliqaServiceError> {
        let var = format!("{}_PRIVATE_KEY", role.to_uppercase());
        std::env::var(&var).map(Credential).map_err(|_| {
            ZilliqaServiceError::Configuration(format!(
                "missing credential in environment variable {var}"
            ))
        })
    }

    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Credential(..)")
    }
}

/// The signing capability needed to submit a transaction.
///
/// Key custody and the signature scheme live behind this trait; the client
/// only ever sees the account address, the public key, and signatures over
/// payload bytes.
pub trait TransactionSigner: Send + Sync {
    /// The account address derived from the signing key.
    fn address(&self) -> Address;

    /// Hex-encoded public key, as expected in the transaction payload.
    fn public_key(&self) -> String;

    /// Signs the canonical payload bytes and returns the hex signature.
    fn sign(&self, message: &[u8]) -> Result<String, ZilliqaServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_debug_is_redacted() {
        let credential = Credential::new("super-secret-key");
        assert_eq!(format!("{credential:?}"), "Credential(..)");
    }

    #[test]
    fn credential_from_env_by_role() {
        std::env::set_var("ORACLE_PRIVATE_KEY", "oracle-secret");
        let credential = Credential::from_env("oracle").unwrap();
        assert_eq!(credential.expose_secret(), "oracle-secret");
        assert!(Credential::from_env("absent_role").is_err());
    }
}
