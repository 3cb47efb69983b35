use std::env;
use std::sync::Arc;

use arc_swap::ArcSwap;
use dotenvy::dotenv;
use serde::Deserialize;

pub const SANDBOX_BASE_URL: &str = "https://sandbox.safaricom.co.ke";
pub const PRODUCTION_BASE_URL: &str = "https://api.safaricom.co.ke";

const DEFAULT_SHORT_CODE: &str = "174379";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Sandbox,
    Production,
}

impl Environment {
    fn parse(raw: &str) -> Self {
        match raw {
            "production" => Environment::Production,
            _ => Environment::Sandbox,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Sandbox => "sandbox",
            Environment::Production => "production",
        }
    }
}

/// One immutable snapshot of gateway credentials and endpoints. Handlers
/// load a snapshot once and use it for the whole request, so a concurrent
/// credential update can never hand them half-updated fields.
#[derive(Debug, Clone)]
pub struct MpesaConfig {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub business_short_code: String,
    pub passkey: String,
    pub environment: Environment,
    pub enable_fallback: bool,
    pub callback_url: String,
    pub base_url_override: Option<String>,
}

impl MpesaConfig {
    fn base_url(&self) -> String {
        if let Some(base) = &self.base_url_override {
            return base.trim_end_matches('/').to_string();
        }
        match self.environment {
            Environment::Sandbox => SANDBOX_BASE_URL.to_string(),
            Environment::Production => PRODUCTION_BASE_URL.to_string(),
        }
    }

    pub fn auth_url(&self) -> String {
        format!("{}/oauth/v1/generate", self.base_url())
    }

    pub fn stk_push_url(&self) -> String {
        format!("{}/mpesa/stkpush/v1/processrequest", self.base_url())
    }

    pub fn stk_query_url(&self) -> String {
        format!("{}/mpesa/stkpushquery/v1/query", self.base_url())
    }

    /// Consumer key with all but the first four characters masked, for
    /// diagnostics output.
    pub fn masked_consumer_key(&self) -> String {
        let visible: String = self.consumer_key.chars().take(4).collect();
        format!("{}...", visible)
    }
}

/// Shared handle to the current credential snapshot. `update` swaps in a
/// whole new snapshot; readers that already loaded the previous one are
/// unaffected.
#[derive(Clone)]
pub struct SharedMpesaConfig {
    inner: Arc<ArcSwap<MpesaConfig>>,
}

impl SharedMpesaConfig {
    pub fn new(config: MpesaConfig) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(config)),
        }
    }

    pub fn load(&self) -> Arc<MpesaConfig> {
        self.inner.load_full()
    }

    pub fn store(&self, config: MpesaConfig) {
        self.inner.store(Arc::new(config));
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub mpesa: MpesaConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        let environment =
            Environment::parse(&env::var("MPESA_ENVIRONMENT").unwrap_or_else(|_| "sandbox".into()));

        let mpesa = MpesaConfig {
            consumer_key: env::var("MPESA_CONSUMER_KEY")?,
            consumer_secret: env::var("MPESA_CONSUMER_SECRET")?,
            business_short_code: env::var("MPESA_SHORT_CODE")
                .unwrap_or_else(|_| DEFAULT_SHORT_CODE.to_string()),
            passkey: env::var("MPESA_PASSKEY")?,
            environment,
            enable_fallback: env::var("MPESA_ENABLE_FALLBACK")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            callback_url: env::var("MPESA_CALLBACK_URL")?,
            base_url_override: env::var("MPESA_BASE_URL").ok(),
        };

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            mpesa,
        })
    }
}
