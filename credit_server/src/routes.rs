//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Every handler here is async and awaits its storage and Shopify
//! calls, so a slow store never stalls a worker.
//!
//! Route groups:
//! * `/health`
//! * `/shopify/webhook` is wrapped by the HMAC middleware in the server.
//! * `/api/active-game` is public and answers CORS preflights.
//! * everything else under `/api` is wrapped by the admin token middleware in the server.
use std::marker::PhantomData;

use actix_web::{
    dev::{AppService, HttpServiceFactory},
    get,
    http::{
        header::{self, CacheControl, CacheDirective},
        Method,
    },
    web,
    HttpRequest,
    HttpResponse,
    Responder,
};
use credit_engine::{
    db_types::{GameRecord, NewTenant, OrderId},
    CreditApi,
    CreditGateway,
    CreditLedger,
    EligibilityApi,
    EligibilityQueries,
    GameApi,
    GameManagement,
    IngestError,
    LedgerApi,
    OrderLedger,
    OrderSource,
    OrphanAlerts,
    OrphanApi,
    TenantApi,
    TenantManagement,
    WebhookApi,
};
use log::*;
use serde_json::json;

use crate::{
    data_objects::{
        parse_credit_request,
        ActiveGameQuery,
        ActiveGameResponse,
        JsonResponse,
        PredictionUpload,
        PruneResult,
    },
    errors::ServerError,
    helpers::{header_value, normalize_shop},
    middleware::SHOP_HEADER,
};

pub const TOPIC_HEADER: &str = "X-Shopify-Topic";
pub const WEBHOOK_ID_HEADER: &str = "X-Shopify-Webhook-Id";
pub const ACTIVE_GAME_MAX_AGE_SECS: u32 = 30;

/// Everything webhook ingestion needs from storage.
pub trait WebhookBackend: OrderLedger + GameManagement + TenantManagement + OrphanAlerts {}
impl<T> WebhookBackend for T where T: OrderLedger + GameManagement + TenantManagement + OrphanAlerts {}

/// Everything a credit run needs from storage.
pub trait CreditBackend: CreditLedger + OrderLedger + EligibilityQueries {}
impl<T> CreditBackend for T where T: CreditLedger + OrderLedger + EligibilityQueries {}

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Shopify  ----------------------------------------------------
route!(shopify_webhook => Post "/webhook" impl WebhookBackend, OrderSource);
/// Receives every Shopify webhook topic. The HMAC has already been checked by the time this runs.
///
/// Deliveries that can never succeed (unreadable JSON, no order identity) are acknowledged with a failure body so that
/// Shopify stops redelivering them. Inactive shops get a 409. Storage and store outages are 500s, so Shopify retries.
pub async fn shopify_webhook<B: WebhookBackend, S: OrderSource>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<WebhookApi<B, S>>,
) -> Result<HttpResponse, ServerError> {
    let topic = header_value(&req, TOPIC_HEADER)
        .ok_or_else(|| ServerError::InvalidRequestHeader(format!("{TOPIC_HEADER} is required")))?;
    let shop = header_value(&req, SHOP_HEADER)
        .map(|s| normalize_shop(&s))
        .ok_or_else(|| ServerError::InvalidRequestHeader(format!("{SHOP_HEADER} is required")))?;
    let delivery_id = header_value(&req, WEBHOOK_ID_HEADER);
    debug!("🛍️ Received {topic} webhook for {shop}. Delivery id: {delivery_id:?}");
    match api.ingest(&shop, &topic, &body, delivery_id.as_deref()).await {
        Ok(outcome) => {
            trace!("🛍️ {topic} for {shop} handled: {outcome:?}");
            Ok(HttpResponse::Ok().json(outcome))
        },
        Err(e @ (IngestError::Identity(_) | IngestError::InvalidPayload(_))) => {
            error!("🛍️ Dropping {topic} delivery for {shop}. {e}");
            Ok(HttpResponse::Ok().json(JsonResponse::failure(e)))
        },
        Err(e) => {
            if e.is_retryable() {
                error!("🛍️ Could not process {topic} delivery for {shop}. Shopify will retry. {e}");
            }
            Err(e.into())
        },
    }
}

//----------------------------------------------   Active game  ------------------------------------------------
/// `/api/active-game` answers GET, and OPTIONS preflights. Other methods get a 405. Every response carries the CORS
/// header, since storefront scripts call this from the shop's own domain.
pub struct ActiveGameRoute<B>(PhantomData<fn() -> B>);

impl<B> ActiveGameRoute<B> {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<B> HttpServiceFactory for ActiveGameRoute<B>
where B: GameManagement + 'static
{
    fn register(self, config: &mut AppService) {
        let res = web::resource("/api/active-game")
            .name("active_game")
            .route(web::get().to(active_game::<B>))
            .route(web::method(Method::OPTIONS).to(active_game_preflight))
            .default_service(web::to(active_game_method_not_allowed));
        HttpServiceFactory::register(res, config);
    }
}

pub async fn active_game<B: GameManagement>(
    query: web::Query<ActiveGameQuery>,
    api: web::Data<GameApi<B>>,
) -> HttpResponse {
    let Some(shop) = query.shop.as_deref().map(normalize_shop).filter(|s| !s.is_empty()) else {
        return HttpResponse::BadRequest()
            .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
            .json(json!({ "error": "Missing shop parameter" }));
    };
    match api.active_game(&shop).await {
        Ok(game) => HttpResponse::Ok()
            .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
            .insert_header(CacheControl(vec![
                CacheDirective::Public,
                CacheDirective::MaxAge(ACTIVE_GAME_MAX_AGE_SECS),
            ]))
            .json(ActiveGameResponse::from(game)),
        Err(e) => {
            error!("🎲️ Could not look up the active game for {shop}. {e}");
            HttpResponse::InternalServerError()
                .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
                .json(json!({ "error": "Could not look up the active game" }))
        },
    }
}

pub async fn active_game_preflight() -> HttpResponse {
    HttpResponse::NoContent()
        .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .insert_header((header::ACCESS_CONTROL_ALLOW_METHODS, "GET, OPTIONS"))
        .insert_header((header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"))
        .finish()
}

pub async fn active_game_method_not_allowed() -> HttpResponse {
    HttpResponse::MethodNotAllowed()
        .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .insert_header((header::ALLOW, "GET, OPTIONS"))
        .json(json!({ "error": "Method not allowed" }))
}

//----------------------------------------------   Credits  ----------------------------------------------------
route!(issue_credits => Post "/credits" impl CreditBackend, CreditGateway);
/// Runs a winners or manual credit batch. The body is read by hand so that malformed requests get the itemized
/// rejection rather than actix's default JSON error.
pub async fn issue_credits<B: CreditBackend, G: CreditGateway>(
    body: web::Bytes,
    api: web::Data<CreditApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let request = parse_credit_request(&body)?;
    let report = api.process(&request).await?;
    Ok(HttpResponse::Ok().json(report))
}

//----------------------------------------------   Tenants  ----------------------------------------------------
route!(upsert_tenant => Post "/tenants" impl TenantManagement);
pub async fn upsert_tenant<B: TenantManagement>(
    body: web::Json<NewTenant>,
    api: web::Data<TenantApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let mut tenant = body.into_inner();
    tenant.shop_id = normalize_shop(&tenant.shop_id);
    if tenant.shop_id.is_empty() {
        return Err(ServerError::InvalidRequestBody("shopId is required".into()));
    }
    let tenant = api.upsert_tenant(&tenant).await?;
    Ok(HttpResponse::Ok().json(tenant))
}

route!(tenant => Get "/tenants/{shop}" impl TenantManagement);
pub async fn tenant<B: TenantManagement>(
    path: web::Path<String>,
    api: web::Data<TenantApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let shop = normalize_shop(&path.into_inner());
    let tenant = api.fetch_tenant(&shop).await?.ok_or_else(|| ServerError::NoRecordFound(shop))?;
    Ok(HttpResponse::Ok().json(tenant))
}

//----------------------------------------------   Games  ------------------------------------------------------
route!(upsert_game => Post "/games" impl GameManagement);
pub async fn upsert_game<B: GameManagement>(
    body: web::Json<GameRecord>,
    api: web::Data<GameApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let mut game = body.into_inner();
    game.shop_id = normalize_shop(&game.shop_id);
    if game.id.trim().is_empty() || game.shop_id.is_empty() {
        return Err(ServerError::InvalidRequestBody("A game needs an id and a shopId".into()));
    }
    let game = api.upsert_game(&game).await?;
    Ok(HttpResponse::Ok().json(game))
}

route!(game => Get "/games/{game_id}" impl GameManagement);
pub async fn game<B: GameManagement>(
    path: web::Path<String>,
    api: web::Data<GameApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let game_id = path.into_inner();
    let game = api.fetch_game(&game_id).await?.ok_or_else(|| ServerError::NoRecordFound(game_id))?;
    Ok(HttpResponse::Ok().json(game))
}

//----------------------------------------------   Predictions  ------------------------------------------------
route!(upsert_predictions => Post "/predictions" impl EligibilityQueries);
pub async fn upsert_predictions<B: EligibilityQueries>(
    body: web::Json<PredictionUpload>,
    api: web::Data<EligibilityApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let predictions = body.into_inner().into_vec();
    for prediction in &predictions {
        api.upsert_prediction(prediction).await?;
    }
    info!("🎲️ {} prediction(s) saved", predictions.len());
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("{} prediction(s) saved", predictions.len()))))
}

//----------------------------------------------   Orders  -----------------------------------------------------
route!(order => Get "/orders/{shop}/{order_id}" impl OrderLedger);
pub async fn order<B: OrderLedger>(
    path: web::Path<(String, String)>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let (shop, raw_id) = path.into_inner();
    let shop = normalize_shop(&shop);
    let order_id =
        raw_id.parse::<OrderId>().map_err(|e| ServerError::InvalidRequestBody(format!("{raw_id}: {e}")))?;
    let order = api
        .get(&shop, &order_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("order {order_id} for {shop}")))?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Orphans  ----------------------------------------------------
route!(orphan => Get "/orphans/{shop}/{order_id}" impl OrphanAlerts);
pub async fn orphan<B: OrphanAlerts>(
    path: web::Path<(String, String)>,
    api: web::Data<OrphanApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let (shop, order_id) = path.into_inner();
    let shop = normalize_shop(&shop);
    let record = api
        .fetch(&shop, &order_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("orphan {order_id} for {shop}")))?;
    Ok(HttpResponse::Ok().json(record))
}

route!(prune_orphans => Post "/orphans/prune" impl OrphanAlerts);
pub async fn prune_orphans<B: OrphanAlerts>(api: web::Data<OrphanApi<B>>) -> Result<HttpResponse, ServerError> {
    let removed = api.prune_expired().await?;
    Ok(HttpResponse::Ok().json(PruneResult { removed }))
}
