//! Engine events and the hooks that react to them.
//!
//! Events are published after the storage transaction that produced them has committed. Handlers run on their own
//! tasks, so a slow or failing handler never delays or rolls back the operation that raised the event.
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
