pub mod config;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod mpesa;
pub mod services;
pub mod startup;
pub mod store;
pub mod validation;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::config::SharedMpesaConfig;
use crate::mpesa::MpesaClient;
use crate::store::TransactionStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TransactionStore>,
    pub mpesa: MpesaClient,
    pub mpesa_config: SharedMpesaConfig,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/payments", post(handlers::payments::initiate_payment))
        .route(
            "/payments/:correlation_id",
            get(handlers::payments::get_payment_status),
        )
        .route("/mpesa/callback", post(handlers::callback::mpesa_callback))
        .route("/admin/mpesa-config", post(handlers::admin::update_mpesa_config))
        .route("/diagnostics", get(handlers::admin::diagnostics))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
