use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub smtp: SmtpConfig,
    pub push: PushConfig,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
}

impl SmtpConfig {
    /// Missing SMTP credentials are a configuration error surfaced at
    /// startup, not per-send.
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() || self.username.is_empty() || self.password.is_empty() {
            return Err(AppError::Configuration(
                "SMTP_HOST, SMTP_USERNAME and SMTP_PASSWORD must be set".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    /// Push provider HTTP endpoint
    pub endpoint: String,
    pub api_key: String,
}

impl PushConfig {
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.is_empty() || self.api_key.is_empty() {
            return Err(AppError::Configuration(
                "PUSH_ENDPOINT and PUSH_API_KEY must be set".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between sweep passes over due pending records
    pub sweep_interval_secs: u64,
    /// Upper bound on records processed per sweep pass
    pub sweep_batch_size: i64,
    /// Seconds between cadence-table checks
    pub cadence_tick_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 60,
            sweep_batch_size: 100,
            cadence_tick_secs: 60,
        }
    }
}

impl Config {
    pub fn from_env() -> std::result::Result<Self, Box<dyn std::error::Error>> {
        Ok(Config {
            app: AppConfig {
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                port: std::env::var("APP_PORT")
                    .unwrap_or_else(|_| "8000".to_string())
                    .parse()?,
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")?,
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()?,
            },
            smtp: SmtpConfig {
                host: std::env::var("SMTP_HOST").unwrap_or_default(),
                port: std::env::var("SMTP_PORT")
                    .unwrap_or_else(|_| "587".to_string())
                    .parse()?,
                username: std::env::var("SMTP_USERNAME").unwrap_or_default(),
                password: std::env::var("SMTP_PASSWORD").unwrap_or_default(),
                from_email: std::env::var("FROM_EMAIL")
                    .unwrap_or_else(|_| "noreply@fintrack.app".to_string()),
                from_name: std::env::var("FROM_NAME")
                    .unwrap_or_else(|_| "FinTrack".to_string()),
            },
            push: PushConfig {
                endpoint: std::env::var("PUSH_ENDPOINT").unwrap_or_default(),
                api_key: std::env::var("PUSH_API_KEY").unwrap_or_default(),
            },
            scheduler: SchedulerConfig {
                sweep_interval_secs: std::env::var("SWEEP_INTERVAL_SECS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()?,
                sweep_batch_size: std::env::var("SWEEP_BATCH_SIZE")
                    .unwrap_or_else(|_| "100".to_string())
                    .parse()?,
                cadence_tick_secs: std::env::var("CADENCE_TICK_SECS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smtp_validate_rejects_missing_credentials() {
        let cfg = SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: String::new(),
            password: String::new(),
            from_email: "noreply@fintrack.app".to_string(),
            from_name: "FinTrack".to_string(),
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_scheduler_config_defaults() {
        let cfg = SchedulerConfig::default();
        assert_eq!(cfg.sweep_interval_secs, 60);
        assert_eq!(cfg.sweep_batch_size, 100);
    }
}
