//! Webhook ingestion: from an authenticated delivery to a ledger write.
//!
//! Signature checks happen before this API is reached. [`WebhookApi::ingest`] guards the tenant, resolves the order
//! identity, and applies the topic's state transition:
//!
//! | topic              | ledger effect                                                                      |
//! |--------------------|------------------------------------------------------------------------------------|
//! | `orders/create`    | order details, filed under the active game. Eligibility is untouched.               |
//! | `orders/paid`      | details plus reward context. Eligible if opted in, in a game, and not cancelled.    |
//! | `orders/updated`   | status and cancellation. Eligibility cleared only for cancelled or terminal orders. |
//! | `orders/cancelled` | cancelled, not eligible, not registered.                                           |
//! | `refunds/create`   | refunded, not eligible, not registered.                                            |
use std::fmt::Debug;

use chrono::Utc;
use credit_common::helpers::{coalesce_bool, coalesce_string};
use log::*;
use serde::Serialize;
use serde_json::Value;

use crate::{
    db_types::{FinancialStatus, OrderId, OrderPatch, UpsertOutcome},
    engine_api::{errors::IngestError, tenant_guard::TenantGuardApi},
    traits::{AuthoritativeOrder, GameManagement, OrderLedger, OrderSource, OrphanAlerts, TenantManagement},
    webhooks::{OrderPayload, WebhookEvent, WebhookTopic},
};

pub const OPT_IN_METAFIELD: &str = "creditOptIn";
pub const PREDICTION_METAFIELD: &str = "predictionId";
pub const USER_METAFIELD: &str = "userId";
pub const OPT_IN_ATTRIBUTE: &str = "sqwad_credit_opt_in";
pub const PREDICTION_ATTRIBUTE: &str = "sqwad_predictionId";
pub const USER_ATTRIBUTE: &str = "sqwad_userId";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum IngestOutcome {
    #[serde(rename_all = "camelCase")]
    Recorded { order_id: String, outcome: UpsertOutcome },
    Ignored { reason: String },
}

impl IngestOutcome {
    fn ignored<S: Into<String>>(reason: S) -> Self {
        Self::Ignored { reason: reason.into() }
    }
}

/// The reward fields captured at checkout, read from order metafields first and checkout attributes second.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewardContext {
    pub opt_in: bool,
    pub prediction_id: Option<String>,
    pub user_id: Option<String>,
}

impl RewardContext {
    pub fn resolve(authoritative: Option<&AuthoritativeOrder>, payload: &OrderPayload) -> Self {
        let metafield = |k: &str| authoritative.and_then(|o| o.metafield(k)).map(String::from);
        let attribute = |k: &str| authoritative.and_then(|o| o.custom_attribute(k)).map(String::from);
        let note = |k: &str| payload.note_attribute(k);
        let pick = |meta: &str, attr: &str| [metafield(meta), attribute(attr), note(attr)];
        let opt_in = pick(OPT_IN_METAFIELD, OPT_IN_ATTRIBUTE);
        let prediction = pick(PREDICTION_METAFIELD, PREDICTION_ATTRIBUTE);
        let user = pick(USER_METAFIELD, USER_ATTRIBUTE);
        Self {
            opt_in: coalesce_bool(opt_in.iter().map(Option::as_deref)).unwrap_or(false),
            prediction_id: coalesce_string(prediction.iter().map(Option::as_deref)),
            user_id: coalesce_string(user.iter().map(Option::as_deref)),
        }
    }
}

pub struct WebhookApi<B, S> {
    db: B,
    guard: TenantGuardApi<B>,
    source: S,
}

impl<B, S> Debug for WebhookApi<B, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WebhookApi")
    }
}

impl<B, S> WebhookApi<B, S>
where
    B: OrderLedger + GameManagement + TenantManagement + OrphanAlerts,
    S: OrderSource,
{
    pub fn new(db: B, guard: TenantGuardApi<B>, source: S) -> Self {
        Self { db, guard, source }
    }

    /// Processes one authenticated delivery.
    pub async fn ingest(
        &self,
        shop_id: &str,
        topic: &str,
        body: &[u8],
        delivery_id: Option<&str>,
    ) -> Result<IngestOutcome, IngestError> {
        let topic = WebhookTopic::from(topic);
        let raw = serde_json::from_slice::<Value>(body).map_err(|e| IngestError::InvalidPayload(e.to_string()))?;
        self.guard.ensure_active(shop_id, &topic, &raw, delivery_id).await?;
        let event = WebhookEvent::from_value(&topic, raw).map_err(|e| {
            warn!("🛍️ Dropping {topic} delivery for {shop_id}: {e}");
            IngestError::from(e)
        })?;
        trace!("🛍️ {topic} for {shop_id}: {:?}", event.payload().map(|p| p.order_id()));
        match event {
            WebhookEvent::OrderCreated(p) => self.order_created(shop_id, &p).await,
            WebhookEvent::OrderPaid(p) => self.order_paid(shop_id, &p).await,
            WebhookEvent::OrderUpdated(p) => self.order_updated(shop_id, &p).await,
            WebhookEvent::OrderCancelled(p) => self.order_cancelled(shop_id, &p).await,
            WebhookEvent::RefundCreated(p) => self.refund_created(shop_id, &p).await,
            WebhookEvent::Ignored(name) => {
                debug!("🛍️ Ignoring {name} webhook for {shop_id}");
                Ok(IngestOutcome::ignored(format!("topic {name} is not handled")))
            },
        }
    }

    async fn order_created(&self, shop_id: &str, payload: &OrderPayload) -> Result<IngestOutcome, IngestError> {
        let order_id = payload.order_id();
        let authoritative = self.source.fetch_order(shop_id, order_id).await?;
        let context = RewardContext::resolve(authoritative.as_ref(), payload);
        let patch = details_patch(authoritative.as_ref(), payload).with_prediction(
            context.opt_in,
            context.prediction_id,
            context.user_id,
        );
        let outcome = self.record_in_active_game(shop_id, order_id, &patch).await?;
        Ok(recorded(order_id, outcome))
    }

    async fn order_paid(&self, shop_id: &str, payload: &OrderPayload) -> Result<IngestOutcome, IngestError> {
        let order_id = payload.order_id();
        let authoritative = self.source.fetch_order(shop_id, order_id).await?;
        let status = match &authoritative {
            Some(order) => order.financial_status.as_deref().map(FinancialStatus::from),
            None => payload.financial_status(),
        };
        if status.is_some_and(|s| s != FinancialStatus::Paid) {
            info!("🛍️ Order {shop_id}/{order_id} arrived on orders/paid with status {status:?}. Ignoring.");
            return Ok(IngestOutcome::ignored("order is not paid"));
        }
        let context = RewardContext::resolve(authoritative.as_ref(), payload);
        let game = self.db.fetch_active_game(shop_id).await?;
        let cancelled =
            authoritative.as_ref().and_then(|o| o.cancelled_at).or_else(|| payload.cancelled_at()).is_some();
        let eligible = context.opt_in && game.is_some() && !cancelled;
        debug!(
            "🛍️ Paid order {shop_id}/{order_id}: opt-in {}, game {:?}, cancelled {cancelled}. Eligible: {eligible}",
            context.opt_in,
            game.as_ref().map(|g| g.id.as_str())
        );
        let patch = details_patch(authoritative.as_ref(), payload)
            .with_prediction(context.opt_in, context.prediction_id, context.user_id)
            .with_eligible_pending(eligible);
        let game_id = game.as_ref().map(|g| g.id.as_str());
        let outcome = match game_id {
            Some(game_id) => self.db.upsert_order(shop_id, order_id, Some(game_id), &patch).await?,
            None => self.db.upsert_unfiled_order(shop_id, order_id, &patch).await?,
        };
        self.db.mark_registered(shop_id, order_id, true, false, game_id).await?;
        Ok(recorded(order_id, outcome))
    }

    async fn order_updated(&self, shop_id: &str, payload: &OrderPayload) -> Result<IngestOutcome, IngestError> {
        let order_id = payload.order_id();
        let status = payload.financial_status();
        let cancelled_at = payload.cancelled_at();
        let mut patch = OrderPatch { financial_status: status, cancelled_at, ..Default::default() };
        if cancelled_at.is_some() || status.is_some_and(|s| s.is_terminal()) {
            patch = patch.with_eligible_pending(false);
        }
        let outcome = self.db.upsert_order(shop_id, order_id, None, &patch).await?;
        Ok(recorded(order_id, outcome))
    }

    async fn order_cancelled(&self, shop_id: &str, payload: &OrderPayload) -> Result<IngestOutcome, IngestError> {
        let order_id = payload.order_id();
        let cancelled_at = payload.cancelled_at().unwrap_or_else(Utc::now);
        let patch = OrderPatch { cancelled_at: Some(cancelled_at), ..Default::default() }
            .with_financial_status(FinancialStatus::Cancelled);
        self.withdraw(shop_id, order_id, patch).await
    }

    async fn refund_created(&self, shop_id: &str, payload: &OrderPayload) -> Result<IngestOutcome, IngestError> {
        let patch = OrderPatch::default().with_financial_status(FinancialStatus::Refunded);
        self.withdraw(shop_id, payload.order_id(), patch).await
    }

    /// Takes an order out of the reward pool.
    async fn withdraw(
        &self,
        shop_id: &str,
        order_id: &OrderId,
        patch: OrderPatch,
    ) -> Result<IngestOutcome, IngestError> {
        let patch = patch.with_eligible_pending(false).with_registered(false);
        let outcome = self.db.upsert_order(shop_id, order_id, None, &patch).await?;
        self.db.mark_registered(shop_id, order_id, false, true, None).await?;
        info!("🛍️ Order {shop_id}/{order_id} withdrawn ({:?}): {outcome:?}", patch.financial_status);
        Ok(recorded(order_id, outcome))
    }

    async fn record_in_active_game(
        &self,
        shop_id: &str,
        order_id: &OrderId,
        patch: &OrderPatch,
    ) -> Result<UpsertOutcome, IngestError> {
        let outcome = match self.db.fetch_active_game(shop_id).await? {
            Some(game) => self.db.upsert_order(shop_id, order_id, Some(&game.id), patch).await?,
            None => {
                debug!("🎲️ {shop_id} has no active game. Order {order_id} is recorded without one.");
                self.db.upsert_unfiled_order(shop_id, order_id, patch).await?
            },
        };
        Ok(outcome)
    }
}

fn recorded(order_id: &OrderId, outcome: UpsertOutcome) -> IngestOutcome {
    IngestOutcome::Recorded { order_id: order_id.to_string(), outcome }
}

/// Order details from the store's copy of the order, with gaps filled from the webhook payload.
fn details_patch(authoritative: Option<&AuthoritativeOrder>, payload: &OrderPayload) -> OrderPatch {
    let from_payload = OrderPatch {
        order_name: payload.name(),
        customer_id: payload.customer_id(),
        customer_email: payload.email(),
        currency: payload.currency(),
        subtotal: payload.subtotal_price(),
        total: payload.total_price(),
        financial_status: payload.financial_status(),
        cancelled_at: payload.cancelled_at(),
        order_created_at: payload.created_at(),
        ..Default::default()
    };
    let Some(order) = authoritative else {
        return from_payload;
    };
    OrderPatch {
        order_name: order.name.clone(),
        customer_id: order.customer_id.clone(),
        customer_email: order.customer_email.clone(),
        currency: order.currency.clone(),
        subtotal: order.subtotal,
        total: order.total,
        financial_status: order.financial_status.as_deref().map(FinancialStatus::from),
        cancelled_at: order.cancelled_at,
        order_created_at: order.created_at,
        ..Default::default()
    }
    .or(from_payload)
}
