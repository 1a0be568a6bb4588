pub mod auth;
pub mod handlers;
pub mod response;
pub mod state;

use anyhow::Context;
use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post, put},
};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::config::GatewayConfig;
use state::AppState;

/// Build the HTTP router.
///
/// `/api/v1/health` is public; everything else under `/api/v1` needs a bearer token.
pub fn create_router(state: Arc<AppState>) -> Router {
    // ==========================================================================
    // Private Routes (auth required)
    // ==========================================================================
    let private_routes = Router::new()
        // Lots and inventory
        .route("/lots", post(handlers::create_lot))
        .route("/lots/{lot_id}", get(handlers::get_lot))
        .route("/inventory/{product_id}", get(handlers::get_inventory))
        .route("/units/{code}", get(handlers::get_unit))
        // Transfers
        .route("/shipments", post(handlers::create_shipment))
        .route("/shipments/{batch_id}/return", post(handlers::return_shipment))
        .route("/shipments/{batch_id}/recall", post(handlers::recall_shipment))
        .route("/treatments", post(handlers::create_treatment))
        .route(
            "/treatments/{treatment_id}/recall",
            post(handlers::recall_treatment),
        )
        .route("/disposals", post(handlers::create_disposal))
        // Reads
        .route("/history", get(handlers::query_history))
        .route("/alerts", get(handlers::list_alerts))
        .route("/alerts/{alert_id}/read", put(handlers::set_alert_read))
        .layer(from_fn_with_state(state.clone(), auth::jwt_auth_middleware));

    Router::new()
        .route("/api/v1/health", get(handlers::health_check))
        .nest("/api/v1", private_routes)
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn run_server(config: &GatewayConfig, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {} (port already in use?)", addr))?;

    tracing::info!("Gateway listening on http://{}", addr);
    tracing::info!("Public:  /api/v1/health");
    tracing::info!("Private: /api/v1/* (bearer token required)");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
