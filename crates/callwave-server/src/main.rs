use axum::{middleware, routing::get, Json, Router};
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use callwave::{ChangeFeed, ProviderGateway};

mod adapters;
mod application;
mod auth;
mod config;
mod models;
mod routes;

use adapters::{HttpProviderGateway, PgBatchRepository, PgCallRepository, PgChangeFeed};
use application::{
    BatchService, BatchTracker, CallLifecycle, Dispatcher, EmergencyStop, TranscriptService,
    Watchdog, WatchdogRegistry, WebhookProcessor,
};
use config::CallwaveConfig;

/// Type aliases for application services with concrete adapter implementations
pub type AppBatchService = BatchService<PgCallRepository, PgBatchRepository>;
pub type AppDispatcher = Dispatcher<PgCallRepository, PgBatchRepository, HttpProviderGateway>;
pub type AppWatchdogs = WatchdogRegistry<PgCallRepository, PgBatchRepository, HttpProviderGateway>;
pub type AppEmergencyStop = EmergencyStop<PgCallRepository, PgBatchRepository, HttpProviderGateway>;
pub type AppTranscriptService =
    TranscriptService<PgCallRepository, PgBatchRepository, HttpProviderGateway>;
pub type AppWebhookProcessor = WebhookProcessor<PgCallRepository, PgBatchRepository>;

/// Application state shared across all routes
#[derive(Clone)]
pub struct AppState {
    pub batch_service: Arc<AppBatchService>,
    pub dispatcher: AppDispatcher,
    pub watchdogs: AppWatchdogs,
    pub emergency_stop: Arc<AppEmergencyStop>,
    pub transcripts: Arc<AppTranscriptService>,
    pub webhooks: Arc<AppWebhookProcessor>,
    pub change_feed: Arc<dyn ChangeFeed>,
    pub api_key: Option<Arc<str>>,
    pub webhook_secret: Option<Arc<str>>,
}

#[derive(Serialize)]
struct HealthCheck {
    status: String,
    message: String,
    version: String,
}

async fn health_check() -> Json<HealthCheck> {
    Json(HealthCheck {
        status: "ok".to_string(),
        message: "Callwave API is running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[shuttle_runtime::main]
async fn main(
    #[shuttle_shared_db::Postgres] pool: PgPool,
    #[shuttle_runtime::Secrets] secrets: shuttle_runtime::SecretStore,
) -> shuttle_axum::ShuttleAxum {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();

    tracing::info!("📞 Callwave API initializing...");

    let config = CallwaveConfig::from_lookup(|key| secrets.get(key));

    if config.api_key.is_some() {
        tracing::info!("🔐 API key authentication enabled");
    } else {
        tracing::warn!("⚠️  No CALLWAVE_API_KEY set - authentication disabled");
    }
    if config.webhook_secret.is_some() {
        tracing::info!("🔏 Provider webhook signature verification enabled");
    } else {
        tracing::warn!("⚠️  No PROVIDER_WEBHOOK_SECRET set - webhook signatures not verified");
    }

    // Run migrations
    sqlx::migrate!()
        .run(&pool)
        .await
        .map_err(|e| shuttle_runtime::Error::Custom(e.into()))?;

    tracing::info!("✅ Database migrations completed");

    // Provider gateway
    let gateway = Arc::new(
        HttpProviderGateway::new(config.provider.clone())
            .map_err(|e| shuttle_runtime::Error::Custom(e.into()))?,
    );
    if gateway.is_configured() {
        tracing::info!("☎️  Provider gateway configured: {}", config.provider.base_url);
    } else {
        tracing::warn!("⚠️  Provider credentials missing - dispatch disabled");
    }

    // Change feed (client sync)
    let change_feed: Arc<dyn ChangeFeed> = match PgChangeFeed::start(&pool).await {
        Ok(feed) => {
            tracing::info!("📡 Change feed listening");
            Arc::new(feed)
        }
        Err(e) => {
            tracing::warn!("⚠️  Change feed unavailable: {}", e);
            Arc::new(PgChangeFeed::disabled())
        }
    };

    // Initialize application services
    let call_repo = Arc::new(PgCallRepository::new(pool.clone()));
    let batch_repo = Arc::new(PgBatchRepository::new(pool));
    let tracker = BatchTracker::new(call_repo.clone(), batch_repo.clone());
    let lifecycle = CallLifecycle::new(call_repo.clone(), tracker);

    let dispatcher = Dispatcher::new(
        call_repo.clone(),
        batch_repo.clone(),
        gateway.clone(),
        lifecycle.clone(),
        config.dispatch.clone(),
    );
    let watchdogs = WatchdogRegistry::new(
        Watchdog::new(
            call_repo.clone(),
            gateway.clone(),
            lifecycle.clone(),
            config.watchdog.clone(),
        ),
        batch_repo.clone(),
    );

    let state = AppState {
        batch_service: Arc::new(BatchService::new(call_repo.clone(), batch_repo.clone())),
        dispatcher: dispatcher.clone(),
        watchdogs: watchdogs.clone(),
        emergency_stop: Arc::new(EmergencyStop::new(
            call_repo.clone(),
            batch_repo,
            gateway.clone(),
            lifecycle.clone(),
        )),
        transcripts: Arc::new(TranscriptService::new(
            call_repo.clone(),
            gateway,
            lifecycle.clone(),
        )),
        webhooks: Arc::new(WebhookProcessor::new(call_repo, lifecycle)),
        change_feed,
        api_key: config.api_key.as_deref().map(Arc::from),
        webhook_secret: config.webhook_secret.as_deref().map(Arc::from),
    };

    // Resume batches interrupted by a restart
    match dispatcher.interrupted_batches().await {
        Ok(batches) => {
            for batch in batches {
                tracing::info!("🔁 Recovering batch {} ({})", batch.name, batch.id);
                let dispatch = dispatcher.spawn_resume(batch.id);
                watchdogs.start(batch.id, dispatch).await;
            }
        }
        Err(e) => tracing::warn!("⚠️  Failed to look up interrupted batches: {}", e),
    }

    // Protected routes (require authentication)
    let protected_routes = Router::new()
        .merge(routes::batch::router())
        .merge(routes::call::router())
        .merge(routes::watchdog::router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    // OpenAPI documentation
    let openapi = routes::swagger::ApiDoc::openapi();

    // Build router with shared state
    let router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
        .route("/health", get(health_check))
        .merge(routes::webhook::router())
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    tracing::info!("📚 Swagger UI: /swagger-ui");
    tracing::info!("✅ Callwave API ready");

    Ok(router.into())
}
