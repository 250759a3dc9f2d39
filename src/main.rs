//! Wedding Registry Payment Service - Main Application Entry Point
//!
//! This is a REST API server for funding wedding-registry gifts. Guests
//! contribute money toward gifts through an external payment gateway
//! (Mercado Pago); the service keeps each gift's funding ledger consistent
//! across the synchronous payment path and asynchronous webhook
//! notifications.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Authentication**: API key with SHA-256 hashing
//! - **Gateway**: one configured adapter instance shared by both payment paths
//! - **Format**: JSON requests/responses
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool
//! 3. Run database migrations
//! 4. Build the payment gateway adapter
//! 5. Build HTTP router with routes and middleware
//! 6. Start server on configured port

mod config;
mod db;
mod error;
mod gateway;
mod handlers;
mod middleware;
mod models;
mod services;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::db::DbPool;
use crate::gateway::PaymentGateway;
use crate::gateway::mercadopago::{MercadoPagoConfig, MercadoPagoGateway};

/// Shared application state available to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub pool: DbPool,

    /// Payment gateway adapter
    ///
    /// A single configured instance; the direct payment path and the
    /// webhook path must never talk to differently-configured gateways.
    pub gateway: Arc<dyn PaymentGateway>,

    /// Secret for webhook signature verification, when configured
    pub webhook_secret: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load configuration
    let config = config::Config::from_env()?;
    tracing::info!("Configuration loaded");

    // Create database pool
    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    // Run migrations
    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    // Build the payment gateway adapter
    let gateway: Arc<dyn PaymentGateway> = Arc::new(MercadoPagoGateway::new(MercadoPagoConfig {
        access_token: config.mp_access_token,
        base_url: config.mp_base_url,
        timeout_secs: config.mp_timeout_secs,
    })?);

    let state = AppState {
        pool,
        gateway,
        webhook_secret: config.mp_webhook_secret,
    };

    // Create authenticated routes (API endpoints)
    let authenticated_routes = Router::new()
        // Gift registry routes
        .route("/api/v1/gifts", post(handlers::gifts::create_gift))
        .route(
            "/api/v1/gifts/{id}/stats",
            get(handlers::gifts::get_gift_stats),
        )
        .route(
            "/api/v1/weddings/{wedding_id}/gifts",
            get(handlers::gifts::list_wedding_gifts),
        )
        // Payment routes
        .route("/api/v1/payments", post(handlers::payments::create_payment))
        .route(
            "/api/v1/payments/status/{payment_id}",
            get(handlers::payments::get_payment_status),
        )
        // Apply authentication middleware to all routes in this group
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    // Combine authenticated routes with public routes
    let app = Router::new()
        // Public routes (no authentication required)
        .route("/health", get(handlers::health::health_check))
        // The gateway posts notifications here; it authenticates by origin
        // marker and signature, not by API key
        .route(
            "/api/v1/payments/webhook",
            post(handlers::payments::gateway_webhook),
        )
        // Merge authenticated routes
        .merge(authenticated_routes)
        // Add distributed tracing middleware for observability
        .layer(TraceLayer::new_for_http())
        // Share state with all handlers via State extraction
        .with_state(state);

    // Bind to network address and start server
    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Start serving HTTP requests
    // This blocks forever, handling requests concurrently with tokio
    axum::serve(listener, app).await?;

    Ok(())
}
