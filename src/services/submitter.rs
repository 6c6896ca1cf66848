//! User-operation submission
//!
//! Sends signed operations through the account-abstraction provider and
//! waits for inclusion. A failed send or a dropped operation gets exactly
//! one drop-and-replace retry with bumped fees; if the replacement fails
//! too, the context carries the second error and no transaction hash.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Bytes, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;

use crate::models::operation::{UserOperation, UserOperationContext};
use crate::services::bundler::AccountAbstractionApi;

/// Fee bump applied to the replacement operation, in percent.
const REPLACEMENT_FEE_BUMP_PERCENT: u64 = 25;

pub struct OperationSubmitter {
    provider: Arc<dyn AccountAbstractionApi>,
    signer: PrivateKeySigner,
    chain_id: u64,
    /// Pacing between contexts, taken from the caller's profile.
    submit_delay: Duration,
}

impl OperationSubmitter {
    pub fn new(
        provider: Arc<dyn AccountAbstractionApi>,
        signer: PrivateKeySigner,
        chain_id: u64,
        submit_delay: Duration,
    ) -> Self {
        Self {
            provider,
            signer,
            chain_id,
            submit_delay,
        }
    }

    /// Submits each context in order. Contexts that already failed during
    /// building pass through untouched; the rest gain either a transaction
    /// hash or an error.
    pub async fn submit_operations(
        &self,
        contexts: Vec<UserOperationContext>,
    ) -> Vec<UserOperationContext> {
        let mut out = Vec::with_capacity(contexts.len());
        let mut first = true;
        for mut ctx in contexts {
            if ctx.error.is_some() || ctx.user_op.is_none() {
                out.push(ctx);
                continue;
            }
            if !first && !self.submit_delay.is_zero() {
                tokio::time::sleep(self.submit_delay).await;
            }
            first = false;
            self.submit_context(&mut ctx).await;
            out.push(ctx);
        }
        out
    }

    async fn submit_context(&self, ctx: &mut UserOperationContext) {
        let op = match ctx.user_op.clone() {
            Some(op) => op,
            None => return,
        };

        match self.send_and_wait(&op, ctx).await {
            Ok(tx_hash) => {
                ctx.tx_hash = Some(tx_hash);
                return;
            }
            Err(first_error) => {
                tracing::warn!(
                    sender = %ctx.sender,
                    error = %first_error,
                    "User operation failed, replacing with bumped fees"
                );
            }
        }

        match self.replace(&op, ctx).await {
            Ok(tx_hash) => ctx.tx_hash = Some(tx_hash),
            Err(second_error) => {
                ctx.error = Some(format!("Failed to submit operation: {}", second_error));
            }
        }
    }

    async fn send_and_wait(
        &self,
        op: &UserOperation,
        ctx: &UserOperationContext,
    ) -> Result<alloy::primitives::B256, String> {
        let op_hash = self
            .provider
            .send(op, ctx.entry_point)
            .await
            .map_err(|err| err.to_string())?;
        self.provider
            .wait_for_receipt(op_hash)
            .await
            .map_err(|err| err.to_string())
    }

    /// Drop-and-replace: same nonce and call data, fees bumped, fresh
    /// signature over the new hash.
    async fn replace(
        &self,
        original: &UserOperation,
        ctx: &mut UserOperationContext,
    ) -> Result<alloy::primitives::B256, String> {
        let mut replacement = original.clone();
        replacement.max_fee_per_gas = bump(original.max_fee_per_gas);
        replacement.max_priority_fee_per_gas = bump(original.max_priority_fee_per_gas);

        let hash = replacement.hash(ctx.entry_point, self.chain_id);
        let signature = self
            .signer
            .sign_hash_sync(&hash)
            .map_err(|err| format!("signing failed: {}", err))?;
        replacement.signature = Bytes::from(signature.as_bytes().to_vec());

        let result = self.send_and_wait(&replacement, ctx).await;
        if result.is_ok() {
            ctx.hash = Some(hash);
            ctx.user_op = Some(replacement);
        }
        result
    }
}

fn bump(fee: U256) -> U256 {
    fee + fee * U256::from(REPLACEMENT_FEE_BUMP_PERCENT) / U256::from(100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::bundler::{BundlerError, SponsoredFields};
    use alloy::primitives::{Address, B256};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct ScriptedProvider {
        // outcome per send attempt: Ok(op_hash) or the error message
        sends: Mutex<Vec<Result<B256, String>>>,
        send_count: Mutex<usize>,
        seen_fees: Mutex<Vec<U256>>,
    }

    impl ScriptedProvider {
        fn new(sends: Vec<Result<B256, String>>) -> Self {
            Self {
                sends: Mutex::new(sends),
                send_count: Mutex::new(0),
                seen_fees: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AccountAbstractionApi for ScriptedProvider {
        async fn next_nonce(&self, _: Address, _: Address) -> Result<U256, BundlerError> {
            Ok(U256::ZERO)
        }

        async fn sponsor(
            &self,
            _: &UserOperation,
            _: Address,
            _: Option<&str>,
        ) -> Result<SponsoredFields, BundlerError> {
            unreachable!("submitter never sponsors")
        }

        async fn send(&self, op: &UserOperation, _: Address) -> Result<B256, BundlerError> {
            *self.send_count.lock() += 1;
            self.seen_fees.lock().push(op.max_fee_per_gas);
            let mut sends = self.sends.lock();
            if sends.is_empty() {
                return Err(BundlerError::Rpc("no scripted outcome".into()));
            }
            sends.remove(0).map_err(BundlerError::Rpc)
        }

        async fn wait_for_receipt(&self, op_hash: B256) -> Result<B256, BundlerError> {
            // mined tx hash derived from the op hash so tests can tell
            // first and second submissions apart
            let mut tx = op_hash;
            tx.0[0] ^= 0xff;
            Ok(tx)
        }
    }

    fn signed_context(signer: &PrivateKeySigner) -> UserOperationContext {
        let entry_point = Address::repeat_byte(0x57);
        let mut op = UserOperation {
            sender: Address::repeat_byte(0x0a),
            nonce: U256::from(1),
            init_code: Bytes::new(),
            call_data: Bytes::from(vec![0x01, 0x02]),
            call_gas_limit: U256::from(200_000),
            verification_gas_limit: U256::from(120_000),
            pre_verification_gas: U256::from(21_000),
            max_fee_per_gas: U256::from(100),
            max_priority_fee_per_gas: U256::from(10),
            paymaster_and_data: Bytes::new(),
            signature: Bytes::new(),
        };
        let hash = op.hash(entry_point, 80002);
        op.signature = Bytes::from(signer.sign_hash_sync(&hash).unwrap().as_bytes().to_vec());
        UserOperationContext {
            sender: op.sender,
            entry_point,
            ids: vec!["op-1".into()],
            user_op: Some(op),
            hash: Some(hash),
            tx_hash: None,
            error: None,
        }
    }

    fn submitter(provider: Arc<ScriptedProvider>, signer: PrivateKeySigner) -> OperationSubmitter {
        OperationSubmitter::new(provider, signer, 80002, Duration::ZERO)
    }

    #[tokio::test]
    async fn first_attempt_success_needs_no_replacement() {
        let signer = PrivateKeySigner::random();
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(B256::repeat_byte(0x11))]));
        let contexts = submitter(provider.clone(), signer.clone())
            .submit_operations(vec![signed_context(&signer)])
            .await;

        assert_eq!(*provider.send_count.lock(), 1);
        assert!(contexts[0].error.is_none());
        assert!(contexts[0].tx_hash.is_some());
    }

    #[tokio::test]
    async fn failed_send_is_replaced_exactly_once_with_bumped_fees() {
        let signer = PrivateKeySigner::random();
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err("AA25 invalid account nonce".into()),
            Ok(B256::repeat_byte(0x22)),
        ]));
        let contexts = submitter(provider.clone(), signer.clone())
            .submit_operations(vec![signed_context(&signer)])
            .await;

        assert_eq!(*provider.send_count.lock(), 2);
        let fees = provider.seen_fees.lock();
        assert_eq!(fees[0], U256::from(100));
        assert_eq!(fees[1], U256::from(125));
        assert!(contexts[0].error.is_none());
        assert!(contexts[0].tx_hash.is_some());
        // the context now describes the replacement
        assert_eq!(
            contexts[0].user_op.as_ref().unwrap().max_fee_per_gas,
            U256::from(125)
        );
    }

    #[tokio::test]
    async fn second_failure_carries_second_error_and_no_tx_hash() {
        let signer = PrivateKeySigner::random();
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err("first failure".into()),
            Err("second failure".into()),
        ]));
        let contexts = submitter(provider.clone(), signer.clone())
            .submit_operations(vec![signed_context(&signer)])
            .await;

        assert_eq!(*provider.send_count.lock(), 2);
        assert!(contexts[0].tx_hash.is_none());
        let error = contexts[0].error.as_deref().unwrap();
        assert!(error.contains("second failure"));
        assert!(!error.contains("first failure"));
    }

    #[tokio::test]
    async fn build_failures_pass_through_without_submission() {
        let signer = PrivateKeySigner::random();
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(B256::repeat_byte(0x11))]));
        let failed = UserOperationContext::failed(
            Address::repeat_byte(0x0a),
            Address::repeat_byte(0x57),
            vec!["op-1".into()],
            "Failed to build operation: boom".into(),
        );
        let contexts = submitter(provider.clone(), signer)
            .submit_operations(vec![failed])
            .await;

        assert_eq!(*provider.send_count.lock(), 0);
        assert!(contexts[0].tx_hash.is_none());
        assert!(contexts[0].error.is_some());
    }
}
