use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::Config;

pub struct ValidationReport {
    pub environment: bool,
    pub gateway: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.environment && self.gateway
    }

    pub fn print(&self) {
        println!("\n=== Startup Validation Report ===");
        println!("Environment Variables: {}", status(self.environment));
        println!("Gateway Connectivity:  {}", status(self.gateway));

        if !self.errors.is_empty() {
            println!("\nErrors:");
            for error in &self.errors {
                println!("  ❌ {}", error);
            }
        }

        println!(
            "\nOverall Status: {}",
            if self.is_valid() { "✅ PASS" } else { "❌ FAIL" }
        );
        println!("=================================\n");
    }
}

fn status(ok: bool) -> &'static str {
    if ok { "✅ OK" } else { "❌ FAIL" }
}

pub async fn validate_environment(config: &Config) -> ValidationReport {
    let mut report = ValidationReport {
        environment: true,
        gateway: true,
        errors: Vec::new(),
    };

    if let Err(e) = validate_env_vars(config) {
        report.environment = false;
        report.errors.push(format!("Environment: {}", e));
    }

    if let Err(e) = validate_gateway(config).await {
        report.gateway = false;
        report.errors.push(format!("Gateway: {}", e));
    }

    report
}

fn validate_env_vars(config: &Config) -> Result<()> {
    if config.mpesa.consumer_key.is_empty() {
        anyhow::bail!("MPESA_CONSUMER_KEY is empty");
    }
    if config.mpesa.consumer_secret.is_empty() {
        anyhow::bail!("MPESA_CONSUMER_SECRET is empty");
    }
    if config.mpesa.passkey.is_empty() {
        anyhow::bail!("MPESA_PASSKEY is empty");
    }
    if config.server_port == 0 {
        anyhow::bail!("SERVER_PORT must be greater than 0");
    }

    // The gateway must be able to reach the callback URL, so it has to be
    // at least well-formed.
    url::Url::parse(&config.mpesa.callback_url)
        .context("MPESA_CALLBACK_URL is not a valid URL")?;

    Ok(())
}

async fn validate_gateway(config: &Config) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    let response = client
        .get(config.mpesa.auth_url())
        .send()
        .await
        .context("Failed to connect to payment gateway")?;

    // Without credentials the token endpoint answers 400/401; any HTTP
    // response at all proves reachability.
    let _ = response.status();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Environment, MpesaConfig};

    fn sample_config() -> Config {
        Config {
            server_port: 3000,
            mpesa: MpesaConfig {
                consumer_key: "key".to_string(),
                consumer_secret: "secret".to_string(),
                business_short_code: "174379".to_string(),
                passkey: "passkey".to_string(),
                environment: Environment::Sandbox,
                enable_fallback: false,
                callback_url: "https://example.com/mpesa/callback".to_string(),
                base_url_override: None,
            },
        }
    }

    #[test]
    fn test_validate_env_vars_ok() {
        assert!(validate_env_vars(&sample_config()).is_ok());
    }

    #[test]
    fn test_validate_env_vars_empty_consumer_key() {
        let mut config = sample_config();
        config.mpesa.consumer_key = String::new();
        assert!(validate_env_vars(&config).is_err());
    }

    #[test]
    fn test_validate_env_vars_invalid_callback_url() {
        let mut config = sample_config();
        config.mpesa.callback_url = "not-a-url".to_string();
        assert!(validate_env_vars(&config).is_err());
    }

    #[test]
    fn test_validate_env_vars_zero_port() {
        let mut config = sample_config();
        config.server_port = 0;
        assert!(validate_env_vars(&config).is_err());
    }
}
