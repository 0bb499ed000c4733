use crate::{
    api::handlers::auth::{AuthConfig, AuthState},
    keys::ServerKeys,
    opaque::OpaqueEngine,
    totp::TotpService,
};
use anyhow::{Context, Result};
use axum::{
    Extension,
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{Span, error, info, info_span};
use ulid::Ulid;
use utoipa_axum::router::OpenApiRouter;

pub mod handlers;
// OpenAPI router wiring and route registration live in openapi.rs.
mod openapi;

pub use openapi::openapi;

/// Store-call deadline; no operation in the core blocks past it.
const STORE_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the API router with all documented routes registered.
#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

/// Start the server.
///
/// Loads nothing lazily: the pool, PAKE engine, TOTP service, and signing
/// keys all exist before the listener binds, so the first request never
/// races initialization.
///
/// # Errors
/// Returns an error if the database is unreachable or the listener cannot
/// bind.
pub async fn new(port: u16, dsn: String, config: AuthConfig, keys: ServerKeys) -> Result<()> {
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .acquire_timeout(STORE_ACQUIRE_TIMEOUT)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let (opaque_seed, totp_master, token_ring) = keys.into_parts();
    let engine = OpaqueEngine::from_seed(opaque_seed, config.opaque_server_id().to_string());
    let totp_service =
        TotpService::new(pool.clone(), totp_master, config.totp_issuer().to_string());

    let cleanup_interval = config.cleanup_interval_seconds();
    let auth_state = Arc::new(AuthState::new(config, engine, token_ring));

    // Background worker ages out usage-log rows on a timer.
    spawn_cleanup_worker(totp_service.clone(), cleanup_interval);

    let (router, _openapi) = router().split_for_parts();
    let app = router.layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(Extension(auth_state))
            .layer(Extension(totp_service))
            .layer(Extension(pool)),
    );

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn spawn_cleanup_worker(service: TotpService, interval_seconds: u64) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_seconds.max(1)));
        loop {
            ticker.tick().await;
            match service.cleanup_logs().await {
                Ok((totp, backup)) if totp > 0 || backup > 0 => {
                    info!("Usage-log cleanup removed {totp} TOTP rows, {backup} backup rows");
                }
                Ok(_) => {}
                Err(err) => error!("Usage-log cleanup failed: {err}"),
            }
        }
    });
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
