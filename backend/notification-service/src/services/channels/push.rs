//! Push delivery to registered devices.
//!
//! Tokens are filtered to the provider's valid format, delivered in batches
//! through an abstract transport, and tokens the provider reports as
//! permanently invalid are deactivated in the preference store. That
//! deactivation is the one channel side effect reaching back into user
//! preference state, and it is a single-row field update.

use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::PushConfig;
use crate::error::{AppError, Result};
use crate::models::{DeviceToken, NotificationChannel, NotificationPreferences, NotificationRecord};
use crate::services::channels::{ChannelSender, DeliveryOutcome, RecipientOutcome};
use crate::store::PreferenceStore;

/// Provider receipt for one token.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushReceipt {
    pub message_id: Option<String>,
    pub error: Option<String>,
}

impl PushReceipt {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Abstract push-provider capability.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Per-token receipts (including invalid-token errors) come back as
    /// `Ok(receipt)`; only provider-unreachable conditions are `Err`.
    async fn push(
        &self,
        token: &str,
        title: &str,
        body: &str,
        data: Option<&serde_json::Value>,
    ) -> anyhow::Result<PushReceipt>;
}

/// HTTP push transport against the configured provider endpoint.
pub struct HttpPushTransport {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpPushTransport {
    pub fn from_config(config: &PushConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl PushTransport for HttpPushTransport {
    async fn push(
        &self,
        token: &str,
        title: &str,
        body: &str,
        data: Option<&serde_json::Value>,
    ) -> anyhow::Result<PushReceipt> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "to": token,
                "title": title,
                "body": body,
                "data": data,
            }))
            .send()
            .await
            .map_err(|e| anyhow!("push provider unreachable: {e}"))?;

        if response.status().is_server_error() {
            return Err(anyhow!("push provider error: {}", response.status()));
        }

        if !response.status().is_success() {
            // 4xx receipts are token-level failures, not transport failures
            return Ok(PushReceipt {
                message_id: None,
                error: Some(format!("HTTP {}", response.status())),
            });
        }

        response
            .json::<PushReceipt>()
            .await
            .map_err(|e| anyhow!("malformed push receipt: {e}"))
    }
}

/// Valid provider token format: printable ASCII, no whitespace, plausible length.
pub fn is_valid_token_format(token: &str) -> bool {
    token.len() >= 20
        && token.len() <= 4096
        && token
            .chars()
            .all(|c| c.is_ascii_graphic())
}

/// Provider receipts indicating the token is permanently invalid and should
/// be deactivated rather than retried.
pub fn is_permanent_token_error(error: &str) -> bool {
    let lower = error.to_lowercase();
    (lower.contains("invalid") && (lower.contains("token") || lower.contains("registration")))
        || lower.contains("unregistered")
        || lower.contains("notregistered")
        || lower.contains("expired")
        || lower.contains("baddevicetoken")
        || lower.contains("400")
        || lower.contains("404")
}

const PUSH_BATCH_SIZE: usize = 50;

/// Push channel sender.
pub struct PushSender {
    preferences: Arc<dyn PreferenceStore>,
    transport: Arc<dyn PushTransport>,
}

impl PushSender {
    pub fn new(preferences: Arc<dyn PreferenceStore>, transport: Arc<dyn PushTransport>) -> Self {
        Self {
            preferences,
            transport,
        }
    }

    async fn send_to_token(
        &self,
        record: &NotificationRecord,
        device: &DeviceToken,
    ) -> RecipientOutcome {
        let result = self
            .transport
            .push(
                &device.token,
                &record.title,
                &record.message,
                record.payload.as_ref(),
            )
            .await;

        match result {
            Ok(receipt) if receipt.is_success() => {
                if let Err(e) = self.preferences.touch_device_token(device.id, Utc::now()).await {
                    warn!(token_id = %device.id, error = %e, "failed to touch device token");
                }
                RecipientOutcome {
                    recipient: device.token.clone(),
                    success: true,
                    error: None,
                }
            }
            Ok(receipt) => {
                let error = receipt.error.unwrap_or_else(|| "unknown".to_string());
                if is_permanent_token_error(&error) {
                    debug!(token_id = %device.id, error = %error, "deactivating invalid device token");
                    if let Err(e) = self.preferences.deactivate_device_token(device.id).await {
                        warn!(token_id = %device.id, error = %e, "failed to deactivate device token");
                    }
                }
                RecipientOutcome {
                    recipient: device.token.clone(),
                    success: false,
                    error: Some(error),
                }
            }
            Err(e) => RecipientOutcome {
                recipient: device.token.clone(),
                success: false,
                error: Some(format!("transport: {e}")),
            },
        }
    }
}

#[async_trait]
impl ChannelSender for PushSender {
    fn channel(&self) -> NotificationChannel {
        NotificationChannel::Push
    }

    async fn deliver(
        &self,
        record: &NotificationRecord,
        _preferences: &NotificationPreferences,
    ) -> Result<DeliveryOutcome> {
        let devices: Vec<DeviceToken> = self
            .preferences
            .active_device_tokens(record.user_id)
            .await?
            .into_iter()
            .filter(|d| is_valid_token_format(&d.token))
            .collect();

        if devices.is_empty() {
            debug!(user_id = %record.user_id, "no active device tokens, nothing to push");
            return Ok(DeliveryOutcome::empty(NotificationChannel::Push));
        }

        let mut recipients = Vec::with_capacity(devices.len());
        for chunk in devices.chunks(PUSH_BATCH_SIZE) {
            let attempts = chunk.iter().map(|device| self.send_to_token(record, device));
            recipients.extend(join_all(attempts).await);
        }

        // Provider completely unreachable: surface it so the dispatcher's
        // per-channel catch leaves the flag unset for the next sweep.
        let all_transport_failures = recipients.iter().all(|r| {
            !r.success
                && r.error
                    .as_deref()
                    .map(|e| e.starts_with("transport:"))
                    .unwrap_or(false)
        });
        if all_transport_failures {
            return Err(AppError::ChannelDelivery {
                channel: "push",
                reason: format!("all {} push attempts failed at transport level", recipients.len()),
            });
        }

        Ok(DeliveryOutcome {
            channel: NotificationChannel::Push,
            recipients,
        })
    }
}
