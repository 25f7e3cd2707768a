use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use credit_engine::{
    credit_objects::CreditReport,
    events::{EventHandlers, EventHooks},
    test_utils::{
        fake_gateway::FakeGateway,
        prepare_env::{create_database, random_db_path, run_migrations},
    },
    CreditApi,
    OrphanApi,
    SqliteDatabase,
    TenantGuardApi,
    WebhookApi,
};
use cucumber::World;
use log::*;

#[derive(Default, Debug, World)]
pub struct CreditWorld {
    pub system: Option<CreditSystem>,
}

#[derive(Debug)]
pub struct CreditSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub gateway: FakeGateway,
    pub webhooks: WebhookApi<SqliteDatabase, FakeGateway>,
    pub credits: CreditApi<SqliteDatabase, FakeGateway>,
    pub orphans: OrphanApi<SqliteDatabase>,
    pub alerts_raised: Arc<AtomicUsize>,
    pub last_report: Option<CreditReport>,
}

impl CreditWorld {
    pub fn system(&self) -> &CreditSystem {
        self.system.as_ref().expect("System not initialised")
    }

    pub fn system_mut(&mut self) -> &mut CreditSystem {
        self.system.as_mut().expect("System not initialised")
    }
}

impl CreditSystem {
    pub async fn new() -> Self {
        let url = prepare_test_env().await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
        debug!("Created database: {url}");
        let alerts_raised = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&alerts_raised);
        let mut hooks = EventHooks::default();
        hooks.on_orphan_order(move |ev| {
            info!("👻️ Alert raised for {}/{}", ev.shop_id, ev.order_id);
            counter.fetch_add(1, Ordering::SeqCst);
            Box::pin(async {})
        });
        let handlers = EventHandlers::new(16, hooks);
        let producers = handlers.producers();
        handlers.start_handlers().await;
        let gateway = FakeGateway::new();
        let orphans = OrphanApi::new(db.clone(), producers.clone());
        let guard = TenantGuardApi::new(db.clone(), orphans.clone());
        let webhooks = WebhookApi::new(db.clone(), guard, gateway.clone());
        let credits = CreditApi::new(db.clone(), gateway.clone(), producers);
        Self { db_path: url, db, gateway, webhooks, credits, orphans, alerts_raised, last_report: None }
    }

    pub fn alerts_raised(&self) -> usize {
        self.alerts_raised.load(Ordering::SeqCst)
    }
}

pub async fn prepare_test_env() -> String {
    let path = random_db_path();
    create_database(&path).await;
    run_migrations(&path).await;
    path
}
