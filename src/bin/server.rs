//! Minimal demo façade for the gateway core.
//!
//! Exposes just enough HTTP surface to exercise `Validator::validate` —
//! `/validate` and `/healthz`. Tenant/policy CRUD, auth middleware, and
//! notification delivery are façade concerns left to a real deployment.

use std::sync::Arc;

use axum::error_handling::HandleErrorLayer;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower::{buffer::BufferLayer, limit::RateLimitLayer, BoxError, ServiceBuilder};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use policy_gate::cache::InMemoryCache;
use policy_gate::config::GateConfig;
use policy_gate::notify::NoopNotificationSink;
use policy_gate::rate_limit::RateLimiter;
use policy_gate::store::memory::InMemoryStore;
use policy_gate::{ActionRequest, Validator};

struct AppState {
    store: InMemoryStore,
    cache: InMemoryCache,
    rate_limiter: RateLimiter,
    notifier: NoopNotificationSink,
    config: GateConfig,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Deserialize)]
struct ValidateRequest {
    credential: String,
    principal_name: String,
    action_type: String,
    #[serde(default)]
    params: serde_json::Value,
    #[serde(default)]
    simulate: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = GateConfig::from_env().unwrap_or_default();
    let state = Arc::new(AppState {
        store: InMemoryStore::new(),
        cache: InMemoryCache::new(),
        rate_limiter: RateLimiter::with_capacity(config.rate_limit_table_cap),
        notifier: NoopNotificationSink,
        config,
    });

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/validate", post(validate))
        .layer(TraceLayer::new_for_http())
        // 100 requests per minute at the HTTP layer, independent of the
        // per-(principal, action) limits policies enforce internally.
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(|err: BoxError| async move {
                    (StatusCode::INTERNAL_SERVER_ERROR, format!("Unhandled internal error: {}", err))
                }))
                .layer(BufferLayer::new(1024))
                .layer(RateLimitLayer::new(100, std::time::Duration::from_secs(60))),
        )
        .with_state(state);

    let port = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let addr = format!("0.0.0.0:{port}");
    tracing::info!("gateway listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn validate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ValidateRequest>,
) -> Result<Json<policy_gate::Verdict>, StatusCode> {
    let validator = Validator {
        store: &state.store,
        cache: &state.cache,
        rate_limiter: &state.rate_limiter,
        notifier: &state.notifier,
        config: &state.config,
    };

    let verdict = validator
        .validate(ActionRequest {
            credential: &req.credential,
            principal_name: &req.principal_name,
            action_type: &req.action_type,
            params: req.params,
            simulate: req.simulate,
        })
        .await
        .map_err(|err| match err {
            policy_gate::GateError::Unauthorized => StatusCode::UNAUTHORIZED,
            policy_gate::GateError::TenantInactive { .. } => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        })?;

    Ok(Json(verdict))
}
