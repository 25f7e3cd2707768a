//! Simple stateless pub-sub event handler
//!
//! Components subscribe to engine events through this hook system and react to them. Handlers see only the event
//! itself, never the engine's internal state, and may be async.
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::{sync::mpsc, task::JoinSet};

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct EventHandler<E: Send + Sync + 'static> {
    listener: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size);
        Self { listener: receiver, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.sender.clone())
    }

    /// Runs until every producer has been dropped, then waits for in-flight handler jobs before returning.
    pub async fn start_handler(mut self) {
        debug!("📬️ Starting event handler");
        // Only producers keep the channel open from here on
        drop(self.sender);
        let mut jobs = JoinSet::new();
        while let Some(ev) = self.listener.recv().await {
            trace!("📬️ Handling event");
            let handler = Arc::clone(&self.handler);
            jobs.spawn(async move { (handler)(ev).await });
            while let Some(done) = jobs.try_join_next() {
                if let Err(e) = done {
                    warn!("📬️ An event handler job panicked: {e}");
                }
            }
        }
        while let Some(done) = jobs.join_next().await {
            if let Err(e) = done {
                warn!("📬️ An event handler job panicked: {e}");
            }
        }
        debug!("📬️ Event handler has shut down");
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(sender: mpsc::Sender<E>) -> Self {
        Self { sender }
    }

    /// Delivery is best-effort. A closed channel is logged, never returned to the publisher.
    pub async fn publish_event(&self, event: E) {
        if let Err(e) = self.sender.send(event).await {
            error!("📬️ Failed to send event: {e}");
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    };

    use super::*;

    #[tokio::test]
    async fn every_published_event_is_handled_before_shutdown() {
        let _ = env_logger::try_init();
        let count = Arc::new(AtomicU64::new(0));
        let c2 = count.clone();
        let handler: Handler<u64> = Arc::new(move |v| {
            let count = count.clone();
            Box::pin(async move {
                tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
                count.fetch_add(v, Ordering::SeqCst);
            })
        });
        let event_handler = EventHandler::new(1, handler);
        let producer_1 = event_handler.subscribe();
        let producer_2 = event_handler.subscribe();
        tokio::spawn(async move {
            for v in [1, 3, 5, 7, 9] {
                producer_1.publish_event(v).await;
            }
        });
        tokio::spawn(async move {
            for v in [0, 2, 4, 6, 8] {
                producer_2.publish_event(v).await;
            }
        });
        event_handler.start_handler().await;
        assert_eq!(c2.load(Ordering::SeqCst), 45);
    }

    #[tokio::test]
    async fn events_carry_their_payload() {
        let seen = Arc::new(Mutex::new(Vec::<String>::new()));
        let s2 = seen.clone();
        let handler: Handler<String> = Arc::new(move |v| {
            let seen = seen.clone();
            Box::pin(async move {
                seen.lock().unwrap().push(v);
            })
        });
        let event_handler = EventHandler::new(4, handler);
        let producer = event_handler.subscribe();
        producer.publish_event("shop-a/55".to_string()).await;
        drop(producer);
        event_handler.start_handler().await;
        assert_eq!(*s2.lock().unwrap(), vec!["shop-a/55".to_string()]);
    }
}
