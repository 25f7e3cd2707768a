//! Exactly-once credit issuance.
//!
//! Every credit runs through the same three steps:
//! 1. **Claim.** A storage transaction checks the idempotency key and the order, and leaves a `pending` claim.
//!    An issued key or a credited order ends the attempt here with [`CreditOutcome::AlreadyCredited`]. A key that is
//!    already recorded against a different order fails it, and an order never has two live claims.
//! 2. **Deliver.** The store is asked to issue store credit or a gift card. No storage transaction is open.
//! 3. **Finalize or fail.** One transaction marks the credit `issued` and the order `credited`, or records the
//!    failure on both so that a later run can retry under the same key.
//!
//! Failures are local to one order; a batch always runs to the end.
use std::{fmt::Debug, future::Future, time::Duration as StdDuration};

use chrono::{Duration, Utc};
use credit_common::Amount;
use log::*;

use crate::{
    db_types::{credit_key, CreditMode, CreditStatus, OrderId, OrderRecord},
    engine_api::{
        credit_objects::{
            CreditCandidate,
            CreditOptions,
            CreditOutcome,
            CreditReport,
            CreditRequest,
            ManualCreditEntry,
            ManualCreditRequest,
            WinnersRequest,
        },
        eligibility_api::EligibilityApi,
        errors::CreditApiError,
    },
    events::{CreditIssuedEvent, EventProducers},
    traits::{
        ClaimResult,
        CreditClaim,
        CreditGateway,
        CreditLedger,
        EligibilityQueries,
        GatewayError,
        GiftCardIssue,
        OrderLedger,
        StoreCreditIssue,
    },
};

pub const DEFAULT_CLAIM_LEASE_MINS: i64 = 10;
pub const DEFAULT_EXTERNAL_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_GIFT_CARD_NOTE: &str = "SQWAD conditional credit";
const KEY_IN_USE: &str = "Idempotency key belongs to another order";

#[derive(Debug, Clone)]
pub struct CreditConfig {
    /// A pending claim younger than this is treated as in flight by other runs.
    pub claim_lease: Duration,
    /// Upper bound for each call to the store.
    pub external_timeout: StdDuration,
    pub gift_card_note: String,
}

impl Default for CreditConfig {
    fn default() -> Self {
        Self {
            claim_lease: Duration::minutes(DEFAULT_CLAIM_LEASE_MINS),
            external_timeout: StdDuration::from_secs(DEFAULT_EXTERNAL_TIMEOUT_SECS),
            gift_card_note: DEFAULT_GIFT_CARD_NOTE.to_string(),
        }
    }
}

pub struct CreditApi<B, G> {
    db: B,
    gateway: G,
    producers: EventProducers,
    config: CreditConfig,
}

impl<B, G> Debug for CreditApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CreditApi ({:?})", self.config)
    }
}

impl<B, G> CreditApi<B, G>
where
    B: CreditLedger + OrderLedger + EligibilityQueries,
    G: CreditGateway,
{
    pub fn new(db: B, gateway: G, producers: EventProducers) -> Self {
        Self { db, gateway, producers, config: CreditConfig::default() }
    }

    pub fn with_config(mut self, config: CreditConfig) -> Self {
        self.config = config;
        self
    }

    pub async fn process(&self, request: &CreditRequest) -> Result<CreditReport, CreditApiError> {
        match request {
            CreditRequest::Winners(req) => self.credit_winners(req).await,
            CreditRequest::Manual(req) => self.credit_manual(req).await,
        }
    }

    /// Credits every eligible order whose prediction won `event_id`.
    pub async fn credit_winners(&self, request: &WinnersRequest) -> Result<CreditReport, CreditApiError> {
        let event_id = request.event_id.trim();
        if event_id.is_empty() {
            return Err(CreditApiError::InvalidRequest("missing eventId".to_string()));
        }
        let options = &request.options;
        let shop_id = request.shop_id.as_str();
        let eligibility = EligibilityApi::new(self.db.clone());
        let mut report = CreditReport::new(options.dry_run);
        let winners = eligibility.winners(event_id).await?;
        if winners.is_empty() {
            report.reason = Some("no winners".to_string());
            return Ok(report);
        }
        let orders = eligibility.eligible_orders(shop_id, &winners).await?;
        report.total_eligible = Some(orders.len());
        info!("💳️ Crediting winners of {event_id} for {shop_id}: {} eligible orders", orders.len());
        let now = Utc::now();
        for order in orders {
            let order_id = order.order_id.to_string();
            if let Some(hours) = options.wait_hours.filter(|h| *h > 0.0) {
                let placed = order.order_created_at.unwrap_or(order.created_at);
                #[allow(clippy::cast_possible_truncation)]
                let window = Duration::milliseconds((hours * 3_600_000.0) as i64);
                if now - placed < window {
                    let reason = format!("Placed within the last {hours} hours");
                    report.push(&order_id, CreditOutcome::Skipped { reason });
                    continue;
                }
            }
            let amount = match options.amounts.apply(options.amounts.basis_of(&order)) {
                Ok(amount) => amount,
                Err(reason) => {
                    report.push(&order_id, CreditOutcome::Skipped { reason });
                    continue;
                },
            };
            let idempotency_key = credit_key(shop_id, &order.order_id);
            let candidate = CreditCandidate { order, amount, idempotency_key, require_eligible: true };
            let outcome = self.credit_order(candidate, options).await;
            report.push(&order_id, outcome);
        }
        log_report(shop_id, &report);
        Ok(report)
    }

    /// Credits operator-selected orders. The amount comes from each entry's subtotal.
    ///
    /// The order must already be in the ledger; gaps in the stored record are filled from the entry before
    /// crediting, without being written back. Eligibility is not required.
    pub async fn credit_manual(&self, request: &ManualCreditRequest) -> Result<CreditReport, CreditApiError> {
        if request.orders.is_empty() {
            return Err(CreditApiError::InvalidRequest("No orders supplied".to_string()));
        }
        let options = &request.options;
        let shop_id = request.shop_id.as_str();
        let mut report = CreditReport::new(options.dry_run);
        info!("💳️ Manual credit run for {shop_id}: {} orders", request.orders.len());
        for entry in &request.orders {
            let (label, outcome) = match self.manual_candidate(shop_id, entry, options).await? {
                Ok(candidate) => {
                    let label = candidate.order_id().to_string();
                    (label, self.credit_order(candidate, options).await)
                },
                Err((label, outcome)) => (label, outcome),
            };
            report.push(&label, outcome);
        }
        log_report(shop_id, &report);
        Ok(report)
    }

    /// Validates a manual entry and builds its candidate, or returns the entry's final outcome.
    async fn manual_candidate(
        &self,
        shop_id: &str,
        entry: &ManualCreditEntry,
        options: &CreditOptions,
    ) -> Result<ManualEntry, CreditApiError> {
        let raw_id = entry.order_id.as_deref().map(str::trim).unwrap_or_default();
        if raw_id.is_empty() {
            return failed("", "Missing order id");
        }
        let Ok(order_id) = raw_id.parse::<OrderId>() else {
            return failed(raw_id, "Invalid order id");
        };
        let label = order_id.to_string();
        let Some(email) = entry.email.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
            return failed(&label, "Missing customer email");
        };
        let Some(currency) = entry.currency_code.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
            return failed(&label, "Missing currency code");
        };
        let amount = match options.amounts.apply(entry.subtotal) {
            Ok(amount) => amount,
            Err(reason) => return Ok(Err((label, CreditOutcome::Skipped { reason }))),
        };
        let Some(mut order) = self.db.fetch_order(shop_id, &order_id).await? else {
            return failed(&label, "Order not found in database");
        };
        if order.credited {
            return Ok(Err((label, CreditOutcome::AlreadyCredited)));
        }
        fill_gaps(&mut order, email, currency, entry.subtotal);
        let idempotency_key = entry
            .idempotency_key
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .unwrap_or_else(|| credit_key(shop_id, &order_id));
        Ok(Ok(CreditCandidate { order, amount, idempotency_key, require_eligible: false }))
    }

    /// Runs one credit through claim, delivery and finalization.
    async fn credit_order(&self, candidate: CreditCandidate, options: &CreditOptions) -> CreditOutcome {
        let key = candidate.idempotency_key.as_str();
        if options.dry_run {
            return self.dry_run(&candidate).await;
        }
        let claim = CreditClaim {
            idempotency_key: key.to_string(),
            shop_id: candidate.order.shop_id.clone(),
            order_id: candidate.order.order_id.clone(),
            prediction_id: candidate.order.prediction_id.clone(),
            user_id: candidate.order.user_id.clone(),
            amount: candidate.amount,
            currency: candidate.order.currency.clone(),
            mode: options.mode,
            require_eligible: candidate.require_eligible,
            lease: self.config.claim_lease,
        };
        let (token, fresh) = match self.db.claim_credit(&claim).await {
            Ok(ClaimResult::Claimed { token, order }) => (token, order),
            Ok(ClaimResult::AlreadyIssued(record)) => {
                debug!("💳️ Credit {key} was already issued ({:?}). Skipping.", record.external_ref);
                return CreditOutcome::AlreadyCredited;
            },
            Ok(ClaimResult::OrderAlreadyCredited) => return CreditOutcome::AlreadyCredited,
            Ok(ClaimResult::InFlight { claimed_at }) => {
                let since = claimed_at.map(|t| t.to_rfc3339()).unwrap_or_default();
                return CreditOutcome::Skipped { reason: format!("Credit already in progress since {since}") };
            },
            Ok(ClaimResult::OrderMissing) => {
                return CreditOutcome::Failed { reason: "Order not found in database".to_string() }
            },
            Ok(ClaimResult::NotEligible) => {
                return CreditOutcome::Skipped { reason: "Order is no longer eligible".to_string() }
            },
            Ok(ClaimResult::KeyInUse { shop_id, order_id }) => {
                warn!("💳️ Credit key {key} is already recorded against order {shop_id}/{order_id}");
                return CreditOutcome::Failed { reason: KEY_IN_USE.to_string() };
            },
            Err(e) => {
                error!("💳️ Could not claim credit {key}: {e}");
                return CreditOutcome::Failed { reason: e.to_string() };
            },
        };
        let mut order = fresh;
        merge_supplied(&mut order, &candidate.order);
        let delivery = match options.mode {
            CreditMode::StoreCredit => self.issue_store_credit(&order, candidate.amount, options).await,
            CreditMode::GiftCard => self.issue_gift_card(&order, candidate.amount, key).await,
        };
        match delivery {
            Ok((currency, external_ref)) => {
                self.finalize(key, &token, &order, candidate.amount, currency, external_ref, options.mode).await
            },
            Err(reason) => {
                warn!("💳️ Credit {key} failed: {reason}");
                if let Err(e) = self.db.fail_credit(key, &token, &reason).await {
                    error!("💳️ Could not record the failure of credit {key}: {e}");
                }
                CreditOutcome::Failed { reason }
            },
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn finalize(
        &self,
        key: &str,
        token: &str,
        order: &OrderRecord,
        amount: Amount,
        currency: String,
        external_ref: String,
        mode: CreditMode,
    ) -> CreditOutcome {
        match self.db.finalize_credit(key, token, &external_ref).await {
            Ok(_) => {
                info!(
                    "💳️ Issued {amount} {currency} ({mode}) for order {}/{}. Ref: {external_ref}",
                    order.shop_id, order.order_id
                );
                let event = CreditIssuedEvent {
                    shop_id: order.shop_id.clone(),
                    order_id: order.order_id.clone(),
                    amount,
                    currency: currency.clone(),
                    mode,
                    external_ref: external_ref.clone(),
                };
                self.producers.publish_credit_issued(event).await;
                CreditOutcome::Issued { amount, currency, external_ref }
            },
            Err(e) => {
                // The store has issued the credit but the ledger does not know. The claim stays pending, which
                // keeps other runs off this key until the lease expires.
                error!(
                    "💳️ Credit {key} was ISSUED by the store as {external_ref} but could not be recorded: {e}. \
                     This needs manual reconciliation."
                );
                CreditOutcome::Failed { reason: format!("Issued as {external_ref} but not recorded: {e}") }
            },
        }
    }

    async fn dry_run(&self, candidate: &CreditCandidate) -> CreditOutcome {
        let key = candidate.idempotency_key.as_str();
        let order = &candidate.order;
        match self.db.fetch_credit(key).await {
            Ok(Some(record)) if (&record.shop_id, &record.order_id) != (&order.shop_id, &order.order_id) => {
                CreditOutcome::Failed { reason: KEY_IN_USE.to_string() }
            },
            Ok(Some(record)) if record.status == CreditStatus::Issued => CreditOutcome::AlreadyCredited,
            Ok(_) if candidate.order.credited => CreditOutcome::AlreadyCredited,
            Ok(_) => CreditOutcome::WouldIssue { amount: candidate.amount, currency: candidate.order.currency.clone() },
            Err(e) => CreditOutcome::Failed { reason: e.to_string() },
        }
    }

    async fn issue_store_credit(
        &self,
        order: &OrderRecord,
        amount: Amount,
        options: &CreditOptions,
    ) -> Result<(String, String), String> {
        let shop = order.shop_id.as_str();
        let currency = order.currency.clone().ok_or("Missing currency for store credit")?;
        let customer_id = match (&order.customer_id, &order.customer_email) {
            (Some(id), _) => id.clone(),
            (None, Some(email)) => match self.bounded(self.gateway.find_customer_by_email(shop, email)).await {
                Ok(Some(id)) => id,
                Ok(None) => self.bounded(self.gateway.create_customer(shop, email)).await.map_err(describe)?,
                Err(e) => return Err(describe(e)),
            },
            (None, None) => return Err("Missing customer email & id".to_string()),
        };
        let expires_at = options.expires_at.clone();
        let issue = StoreCreditIssue { customer_id, amount, currency: currency.clone(), expires_at };
        let reference = self.bounded(self.gateway.credit_store_account(shop, &issue)).await.map_err(describe)?;
        Ok((currency, reference))
    }

    async fn issue_gift_card(
        &self,
        order: &OrderRecord,
        amount: Amount,
        key: &str,
    ) -> Result<(String, String), String> {
        let shop = order.shop_id.as_str();
        let email = match (&order.customer_email, &order.customer_id) {
            (Some(email), _) => Some(email.clone()),
            (None, Some(id)) => self.bounded(self.gateway.customer_email(shop, id)).await.map_err(describe)?,
            (None, None) => None,
        };
        let email = email.ok_or("Missing customer email for gift card")?;
        let currency = order.currency.clone().ok_or("Missing currency for gift card")?;
        let issue = GiftCardIssue {
            amount,
            currency: currency.clone(),
            customer_email: email,
            note: self.config.gift_card_note.clone(),
            idempotency_key: key.to_string(),
        };
        let reference = self.bounded(self.gateway.create_gift_card(shop, &issue)).await.map_err(describe)?;
        Ok((currency, reference))
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, GatewayError>
    where F: Future<Output = Result<T, GatewayError>> {
        let limit = self.config.external_timeout;
        tokio::time::timeout(limit, call)
            .await
            .unwrap_or_else(|_| Err(GatewayError::Timeout(format!("no response after {}s", limit.as_secs()))))
    }
}

/// A manual entry is either ready to credit, or already settled with the given label and outcome.
type ManualEntry = Result<CreditCandidate, (String, CreditOutcome)>;

fn failed(label: &str, reason: &str) -> Result<ManualEntry, CreditApiError> {
    Ok(Err((label.to_string(), CreditOutcome::Failed { reason: reason.to_string() })))
}

fn describe(e: GatewayError) -> String {
    e.to_string()
}

/// Fills gaps in a stored order from an operator-supplied entry.
fn fill_gaps(order: &mut OrderRecord, email: &str, currency: &str, subtotal: Option<Amount>) {
    if order.customer_email.is_none() {
        order.customer_email = Some(email.to_string());
    }
    if order.currency.is_none() {
        order.currency = Some(currency.to_string());
    }
    if order.subtotal.is_none() {
        order.subtotal = subtotal;
    }
    if order.total.is_none() {
        order.total = subtotal;
    }
}

/// Carries gap-filled values from the candidate over to the copy read inside the claim transaction.
fn merge_supplied(fresh: &mut OrderRecord, supplied: &OrderRecord) {
    if fresh.customer_id.is_none() {
        fresh.customer_id = supplied.customer_id.clone();
    }
    if fresh.customer_email.is_none() {
        fresh.customer_email = supplied.customer_email.clone();
    }
    if fresh.currency.is_none() {
        fresh.currency = supplied.currency.clone();
    }
}

fn log_report(shop_id: &str, report: &CreditReport) {
    info!(
        "💳️ Credit run for {shop_id} done. Credited: {}, skipped: {}, already credited: {}, failed: {}{}",
        report.credited,
        report.skipped,
        report.already_credited,
        report.failures.len(),
        if report.dry_run { " (dry run)" } else { "" }
    );
}
