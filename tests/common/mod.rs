use std::net::SocketAddr;
use std::sync::Arc;

use pesa_core::config::{Environment, MpesaConfig, SharedMpesaConfig};
use pesa_core::mpesa::MpesaClient;
use pesa_core::store::InMemoryStore;
use pesa_core::{create_app, AppState};

pub fn test_mpesa_config(base_url: String, enable_fallback: bool) -> MpesaConfig {
    MpesaConfig {
        consumer_key: "testkey123".to_string(),
        consumer_secret: "testsecret".to_string(),
        business_short_code: "174379".to_string(),
        passkey: "passkey".to_string(),
        environment: Environment::Sandbox,
        enable_fallback,
        callback_url: "https://example.com/mpesa/callback".to_string(),
        base_url_override: Some(base_url),
    }
}

pub struct TestApp {
    pub base_url: String,
    pub store: Arc<InMemoryStore>,
    pub mpesa_config: SharedMpesaConfig,
}

pub async fn spawn_app(mpesa_config: MpesaConfig) -> TestApp {
    let store = Arc::new(InMemoryStore::new());
    let shared_config = SharedMpesaConfig::new(mpesa_config);
    let state = AppState {
        store: store.clone(),
        mpesa: MpesaClient::new(),
        mpesa_config: shared_config.clone(),
    };
    let app = create_app(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], 0));
    let server = axum::Server::bind(&addr).serve(app.into_make_service());
    let actual_addr = server.local_addr();

    tokio::spawn(async move {
        server.await.unwrap();
    });

    TestApp {
        base_url: format!("http://{}", actual_addr),
        store,
        mpesa_config: shared_config,
    }
}
