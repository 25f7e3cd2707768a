use crate::{
    db_types::CreditRecord,
    traits::{ClaimResult, CreditClaim, StorageError},
};

/// The two transactional halves of exactly-once crediting.
///
/// [`claim_credit`](CreditLedger::claim_credit) runs before the external call. It checks the idempotency key and the
/// order and, if both allow it, leaves a `pending` row holding a claim token. After the external call either
/// [`finalize_credit`](CreditLedger::finalize_credit) or [`fail_credit`](CreditLedger::fail_credit) closes the claim.
/// Both re-check the key and token in the same transaction as their writes.
#[allow(async_fn_in_trait)]
pub trait CreditLedger {
    async fn claim_credit(&self, claim: &CreditClaim) -> Result<ClaimResult, StorageError>;

    /// Marks the credit `issued` and flips the order to `credited`, in one transaction. If either write does not
    /// apply, neither is kept.
    async fn finalize_credit(
        &self,
        idempotency_key: &str,
        claim_token: &str,
        external_ref: &str,
    ) -> Result<CreditRecord, StorageError>;

    /// Marks the credit `failed` and records the error on the order, in one transaction.
    async fn fail_credit(&self, idempotency_key: &str, claim_token: &str, error: &str) -> Result<(), StorageError>;

    async fn fetch_credit(&self, idempotency_key: &str) -> Result<Option<CreditRecord>, StorageError>;
}
