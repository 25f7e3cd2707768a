//! Connections to the outside world, and the event hooks that use them.
use std::time::Duration;

use credit_engine::events::{EventHandlers, EventHooks};
use futures::future::BoxFuture;
use log::*;

use crate::config::MailgunConfig;

pub mod mailgun;
pub mod shopify;

pub const EVENT_BUFFER_SIZE: usize = 25;

/// Builds the engine's event handlers.
///
/// * Orphaned orders are emailed through Mailgun when it is configured, and logged either way.
/// * Issued credits are logged.
pub fn create_event_handlers(mailgun: Option<MailgunConfig>, timeout: Duration) -> EventHandlers {
    let mut hooks = EventHooks::default();
    let notifier = mailgun.and_then(|config| {
        mailgun::MailgunNotifier::new(config, timeout)
            .map_err(|e| error!("📧️ Could not create the Mailgun client. Alerts will only be logged. {e}"))
            .ok()
    });
    hooks.on_orphan_order(move |ev| {
        warn!("👻️ Orphaned order {} on {} (first seen via {})", ev.order_id, ev.shop_id, ev.topic);
        let Some(notifier) = notifier.clone() else {
            return no_op();
        };
        Box::pin(async move {
            match notifier.send_orphan_alert(&ev).await {
                Ok(()) => info!("📧️ Orphan alert sent for {}/{}", ev.shop_id, ev.order_id),
                Err(e) => error!("📧️ Could not send orphan alert for {}/{}. {e}", ev.shop_id, ev.order_id),
            }
        })
    });
    hooks.on_credit_issued(|ev| {
        info!(
            "💳️ {} {} issued as {} for order {} on {}. Ref: {}",
            ev.amount, ev.currency, ev.mode, ev.order_id, ev.shop_id, ev.external_ref
        );
        no_op()
    });
    EventHandlers::new(EVENT_BUFFER_SIZE, hooks)
}

fn no_op() -> BoxFuture<'static, ()> {
    Box::pin(async {})
}
