use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{CreditIssuedEvent, EventHandler, EventProducer, Handler, OrphanOrderEvent};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub orphan_order_producer: Vec<EventProducer<OrphanOrderEvent>>,
    pub credit_issued_producer: Vec<EventProducer<CreditIssuedEvent>>,
}

impl EventProducers {
    pub async fn publish_orphan_order(&self, event: OrphanOrderEvent) {
        for producer in &self.orphan_order_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_credit_issued(&self, event: CreditIssuedEvent) {
        for producer in &self.credit_issued_producer {
            producer.publish_event(event.clone()).await;
        }
    }
}

pub struct EventHandlers {
    pub on_orphan_order: Option<EventHandler<OrphanOrderEvent>>,
    pub on_credit_issued: Option<EventHandler<CreditIssuedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_orphan_order = hooks.on_orphan_order.map(|f| EventHandler::new(buffer_size, f));
        let on_credit_issued = hooks.on_credit_issued.map(|f| EventHandler::new(buffer_size, f));
        Self { on_orphan_order, on_credit_issued }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_orphan_order {
            result.orphan_order_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_credit_issued {
            result.credit_issued_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_orphan_order {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_credit_issued {
            tokio::spawn(handler.start_handler());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_orphan_order: Option<Handler<OrphanOrderEvent>>,
    pub on_credit_issued: Option<Handler<CreditIssuedEvent>>,
}

impl EventHooks {
    pub fn on_orphan_order<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrphanOrderEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_orphan_order = Some(Arc::new(f));
        self
    }

    pub fn on_credit_issued<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(CreditIssuedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_credit_issued = Some(Arc::new(f));
        self
    }
}
