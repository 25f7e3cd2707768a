use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use credit_engine::{
    events::EventProducers,
    CreditApi,
    EligibilityApi,
    GameApi,
    LedgerApi,
    OrphanApi,
    SqliteDatabase,
    TenantApi,
    TenantGuardApi,
    WebhookApi,
};
use log::*;

use crate::{
    config::ServerConfig,
    errors::ServerError,
    integrations::{create_event_handlers, shopify::ShopifyGateway},
    middleware::{AdminTokenMiddlewareFactory, HmacMiddlewareFactory},
    prune_worker::start_prune_worker,
    routes::{
        health,
        ActiveGameRoute,
        GameRoute,
        IssueCreditsRoute,
        OrderRoute,
        OrphanRoute,
        PruneOrphansRoute,
        ShopifyWebhookRoute,
        TenantRoute,
        UpsertGameRoute,
        UpsertPredictionsRoute,
        UpsertTenantRoute,
    },
};

type Gateway = ShopifyGateway<SqliteDatabase>;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, config.db_max_connections)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    info!("🗃️ Database ready at {}", db.url());
    let handlers = create_event_handlers(config.mailgun.clone(), config.external_timeout);
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let _prune_worker = start_prune_worker(db.clone(), config.orphan_retention, config.orphan_prune_interval);
    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(ServerError::IOError)
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let (host, port) = (config.host.clone(), config.port);
    let srv = HttpServer::new(move || {
        let gateway = Gateway::new(db.clone(), &config.shopify_api_version, config.external_timeout);
        let orphan_api = OrphanApi::new(db.clone(), producers.clone()).with_retention(config.orphan_retention);
        let guard = TenantGuardApi::new(db.clone(), orphan_api.clone());
        let webhook_api = WebhookApi::new(db.clone(), guard, gateway.clone());
        let credit_api = CreditApi::new(db.clone(), gateway, producers.clone()).with_config(config.credit_config());
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("ocs::access_log"))
            .app_data(web::Data::new(webhook_api))
            .app_data(web::Data::new(credit_api))
            .app_data(web::Data::new(orphan_api))
            .app_data(web::Data::new(GameApi::new(db.clone())))
            .app_data(web::Data::new(TenantApi::new(db.clone())))
            .app_data(web::Data::new(EligibilityApi::new(db.clone())))
            .app_data(web::Data::new(LedgerApi::new(db.clone())));
        // Webhooks are signed with the shop's secret
        let shopify_scope = web::scope("/shopify")
            .wrap(HmacMiddlewareFactory::new(db.clone(), config.hmac_secret.clone(), config.hmac_checks))
            .service(ShopifyWebhookRoute::<SqliteDatabase, Gateway>::new());
        // Operator routes
        let admin_scope = web::scope("/api")
            .wrap(AdminTokenMiddlewareFactory::new(config.admin_token.clone()))
            .service(IssueCreditsRoute::<SqliteDatabase, Gateway>::new())
            .service(UpsertTenantRoute::<SqliteDatabase>::new())
            .service(TenantRoute::<SqliteDatabase>::new())
            .service(UpsertGameRoute::<SqliteDatabase>::new())
            .service(GameRoute::<SqliteDatabase>::new())
            .service(UpsertPredictionsRoute::<SqliteDatabase>::new())
            .service(OrderRoute::<SqliteDatabase>::new())
            .service(OrphanRoute::<SqliteDatabase>::new())
            .service(PruneOrphansRoute::<SqliteDatabase>::new());
        // The public active game route must be registered ahead of the admin scope, which would otherwise claim it
        app.service(health)
            .service(ActiveGameRoute::<SqliteDatabase>::new())
            .service(shopify_scope)
            .service(admin_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}
