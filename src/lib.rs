//! ORM vs SQL orders service
//!
//! Serves the ten most recent orders through two query strategies: a sea-orm
//! entity graph and a hand-written flat join.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod db;
pub mod dto;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod health;
pub mod middleware_helpers;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::Router;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::timeout::TimeoutLayer;

pub use dto::orders::QueryMode;
pub use errors::ServiceError;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub services: handlers::AppServices,
}

impl AppState {
    pub fn new(db: Arc<DatabaseConnection>, config: config::AppConfig) -> Self {
        let services = handlers::AppServices::new(db.clone());
        Self {
            db,
            config,
            services,
        }
    }
}

/// Full HTTP surface: the top-orders route at `/orders/top10` and
/// `/api/orders/top10`, health checks, optional Swagger UI, and the
/// timeout, tracing, and request-id layers.
pub fn app_router(state: AppState) -> Router {
    let request_timeout = state.config.request_timeout();
    let serve_swagger = state.config.serve_swagger();
    let db = state.db.clone();

    let mut app = Router::new()
        .merge(handlers::orders::orders_routes())
        .nest("/api", handlers::orders::orders_routes())
        .with_state(state)
        .nest("/health", health::health_routes(db));

    if serve_swagger {
        app = app.merge(openapi::swagger_ui());
    }

    app.layer(TimeoutLayer::new(request_timeout))
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
}
