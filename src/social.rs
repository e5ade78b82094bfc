// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use tracing::{debug, info};

use crate::{
    client::{BalanceInfo, JsonRpcClient, LedgerQueries},
    common::{Address, ContractParam, ZilliqaServiceError},
    config::ClientConfig,
    receipt::{interpret, Outcome, TransactionReceipt},
    signer::TransactionSigner,
    state::StateQuery,
    transaction::{RequestBuilder, Submitter, TransitionDecl},
};

/// `register_user(user_address: ByStr20, twitter_username: String)`.
pub const REGISTER_USER: TransitionDecl = TransitionDecl {
    name: "register_user",
    params: &[("user_address", "ByStr20"), ("twitter_username", "String")],
};

/// `new_tweet(tweet_id: String)`.
pub const NEW_TWEET: TransitionDecl = TransitionDecl {
    name: "new_tweet",
    params: &[("tweet_id", "String")],
};

/// Event emitted once the oracle confirms that a tweet carries the
/// hashtag.
pub const VERIFY_TWEET_EVENT: &str = "verify_tweet";

const USED_USERNAMES_FIELD: &str = "used_usernames";
const VERIFYING_TWEETS_FIELD: &str = "verifying_tweets";

const CALL_GAS_LIMIT: u64 = 1000;
const DEPLOY_GAS_LIMIT: u64 = 100_000;

/// The four constructor parameters the contract declares.
pub fn init_params(owner: Address, oracle_address: Address, hashtag: &str) -> Vec<ContractParam> {
    vec![
        ContractParam::new("_scilla_version", "Uint32", "0"),
        ContractParam::new("owner", "ByStr20", owner.to_string()),
        ContractParam::new("oracle_address", "ByStr20", oracle_address.to_string()),
        ContractParam::new("hashtag", "String", hashtag),
    ]
}

/// One deployed social verification contract, as seen from one endpoint.
///
/// This value replaces the module-level singletons of earlier clients: the
/// caller constructs it once and passes signing material per call. It holds
/// no mutable state of its own.
pub struct SocialContract<C> {
    client: C,
    config: ClientConfig,
}

impl<C: JsonRpcClient> SocialContract<C> {
    pub fn new(client: C, config: ClientConfig) -> Self {
        SocialContract { client, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    fn builder(&self) -> RequestBuilder {
        RequestBuilder::new(self.config.version(), self.config.gas_price)
    }

    fn submitter(&self) -> Submitter<'_, C> {
        Submitter::new(
            &self.client,
            self.config.receipt_timeout,
            self.config.poll_interval,
        )
    }

    fn state(&self) -> StateQuery<'_, C> {
        StateQuery::new(&self.client, self.config.contract_address)
    }

    /// Registers `username` for `user_address`.
    ///
    /// The contract no-ops when the username or the address is taken, so a
    /// successful receipt without event logs maps to
    /// [`ZilliqaServiceError::AlreadyRegistered`].
    pub async fn register_user(
        &self,
        signer: &dyn TransactionSigner,
        user_address: Address,
        username: &str,
    ) -> Result<TransactionReceipt, ZilliqaServiceError> {
        let args = vec![
            ContractParam::new("user_address", "ByStr20", user_address.to_string()),
            ContractParam::new("twitter_username", "String", username),
        ];
        let request = self.builder().call(
            self.config.contract_address,
            &REGISTER_USER,
            args,
            CALL_GAS_LIMIT,
        )?;
        let pending = self.submitter().submit(&request, signer).await?;
        let receipt = pending.wait().await?;
        match interpret(&receipt, None, &[]) {
            Outcome::Rejected => Err(ZilliqaServiceError::TransactionRejected),
            Outcome::NoEffect => Err(ZilliqaServiceError::AlreadyRegistered),
            _ => {
                info!(username, %user_address, "registered user");
                Ok(receipt)
            }
        }
    }

    /// Submits `tweet_id` for verification and returns the transaction id
    /// together with the receipt.
    ///
    /// Interpretation is deferred to [`SocialContract::verify_tweet`]; the
    /// oracle only emits its event once the tweet has been checked. Any
    /// error along the way is wrapped as
    /// [`ZilliqaServiceError::SubmissionFailed`].
    pub async fn submit_tweet(
        &self,
        signer: &dyn TransactionSigner,
        tweet_id: &str,
    ) -> Result<(String, TransactionReceipt), ZilliqaServiceError> {
        let result: Result<_, ZilliqaServiceError> = async {
            let args = vec![ContractParam::new("tweet_id", "String", tweet_id)];
            let request = self.builder().call(
                self.config.contract_address,
                &NEW_TWEET,
                args,
                CALL_GAS_LIMIT,
            )?;
            let pending = self.submitter().submit(&request, signer).await?;
            let id = pending.id.clone();
            let receipt = pending.wait().await?;
            Ok((id, receipt))
        }
        .await;
        match result {
            Ok((id, receipt)) => {
                debug!(tweet_id, id, "submitted tweet");
                Ok((id, receipt))
            }
            Err(error) => Err(ZilliqaServiceError::SubmissionFailed(Box::new(error))),
        }
    }

    /// Checks that transaction `id` carries the oracle's `verify_tweet`
    /// event for `tweet_id`.
    ///
    /// The tweet is matched to its transaction strictly by comparing the
    /// supplied id against the value echoed back in the emitted event,
    /// never by trusting client-side state.
    pub async fn verify_tweet(
        &self,
        id: &str,
        tweet_id: &str,
    ) -> Result<bool, ZilliqaServiceError> {
        let transaction = self.client.get_transaction(id).await?;
        match interpret(
            &transaction.receipt,
            Some(VERIFY_TWEET_EVENT),
            &[("tweet_id", tweet_id)],
        ) {
            Outcome::Verified => Ok(true),
            Outcome::Rejected => Err(ZilliqaServiceError::TransactionRejected),
            Outcome::NoEffect | Outcome::EventMissing => Err(ZilliqaServiceError::EventMissing {
                event: VERIFY_TWEET_EVENT.to_owned(),
            }),
            Outcome::Mismatch { actual, expected } => {
                Err(ZilliqaServiceError::TweetIdMismatch { actual, expected })
            }
        }
    }

    /// Whether `username` already appears in the contract's
    /// `used_usernames` field. Point-in-time answer; a concurrent
    /// registration can invalidate it immediately.
    pub async fn is_username_registered(
        &self,
        username: &str,
    ) -> Result<bool, ZilliqaServiceError> {
        Ok(self
            .state()
            .lookup(USED_USERNAMES_FIELD, username)
            .await?
            .is_some())
    }

    /// Whether `tweet_id` is already mid-verification.
    pub async fn is_tweet_registered(&self, tweet_id: &str) -> Result<bool, ZilliqaServiceError> {
        Ok(self
            .state()
            .lookup(VERIFYING_TWEETS_FIELD, tweet_id)
            .await?
            .is_some())
    }

    /// Reads the Scilla source from the configured path and deploys a new
    /// contract instance owned by the signer. Returns the new contract
    /// address together with the deployment receipt.
    pub async fn deploy(
        &self,
        signer: &dyn TransactionSigner,
        oracle_address: Address,
        hashtag: &str,
    ) -> Result<(Address, TransactionReceipt), ZilliqaServiceError> {
        let path = self.config.contract_path.as_ref().ok_or_else(|| {
            ZilliqaServiceError::Configuration("no contract source path configured".to_owned())
        })?;
        let code = tokio::fs::read_to_string(path).await.map_err(|error| {
            ZilliqaServiceError::Configuration(format!(
                "cannot read contract source {}: {error}",
                path.display()
            ))
        })?;
        let init = init_params(signer.address(), oracle_address, hashtag);
        let request = self.builder().deploy(code, init, DEPLOY_GAS_LIMIT)?;
        let pending = self.submitter().submit(&request, signer).await?;
        let contract_address: Address = pending
            .contract_address
            .clone()
            .ok_or_else(|| {
                ZilliqaServiceError::Configuration(
                    "endpoint did not report a contract address".to_owned(),
                )
            })?
            .parse()?;
        let receipt = pending.wait().await?;
        info!(%contract_address, "deployed contract");
        Ok((contract_address, receipt))
    }

    /// Transfers `amount` Qa to `to`. Same envelope and submission
    /// mechanics as a call, with no operation name attached.
    pub async fn fund_account(
        &self,
        signer: &dyn TransactionSigner,
        to: Address,
        amount: u128,
    ) -> Result<TransactionReceipt, ZilliqaServiceError> {
        let request = self.builder().transfer(to, amount);
        let pending = self.submitter().submit(&request, signer).await?;
        let receipt = pending.wait().await?;
        debug!(%to, amount, "funded account");
        Ok(receipt)
    }

    /// Balance and nonce of an account.
    pub async fn balance(&self, address: &Address) -> Result<BalanceInfo, ZilliqaServiceError> {
        self.client.get_balance(address).await
    }

    /// The minimum gas price the endpoint currently accepts, in Qa.
    pub async fn minimum_gas_price(&self) -> Result<u128, ZilliqaServiceError> {
        self.client.get_minimum_gas_price().await
    }
}
