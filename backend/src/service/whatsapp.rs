//! Delivery of TAC codes.
//!
//! `CodeSender` is the seam the TAC flow talks to. The Cloud API sender is
//! used when WhatsApp credentials are configured; otherwise codes are only
//! logged.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::WhatsAppConfig;
use crate::models::DeliveryReport;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("WhatsApp request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("WhatsApp API returned HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait CodeSender: Send + Sync {
    fn provider(&self) -> &str;

    async fn send_code(&self, whatsapp_number: &str, code: &str)
        -> Result<DeliveryReport, DeliveryError>;
}

/// Sends the code as a WhatsApp template message through the Cloud API.
pub struct WhatsAppCloudSender {
    client: reqwest::Client,
    endpoint: String,
    access_token: String,
    template_name: String,
}

impl WhatsAppCloudSender {
    pub fn new(
        api_base: &str,
        phone_id: &str,
        access_token: &str,
        template_name: &str,
    ) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/{}/messages", api_base.trim_end_matches('/'), phone_id),
            access_token: access_token.to_string(),
            template_name: template_name.to_string(),
        })
    }

    fn payload(&self, whatsapp_number: &str, code: &str) -> serde_json::Value {
        json!({
            "messaging_product": "whatsapp",
            "to": whatsapp_number,
            "type": "template",
            "template": {
                "name": self.template_name,
                "language": { "code": "en_US" },
                "components": [{
                    "type": "body",
                    "parameters": [{ "type": "text", "text": code }]
                }]
            }
        })
    }
}

#[async_trait]
impl CodeSender for WhatsAppCloudSender {
    fn provider(&self) -> &str {
        "whatsapp"
    }

    async fn send_code(
        &self,
        whatsapp_number: &str,
        code: &str,
    ) -> Result<DeliveryReport, DeliveryError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.access_token)
            .json(&self.payload(whatsapp_number, code))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "WhatsApp API rejected TAC message");
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        info!(to = %mask(whatsapp_number), "TAC sent via WhatsApp");
        Ok(DeliveryReport {
            provider: self.provider().to_string(),
            delivered: true,
            detail: "TAC sent to WhatsApp.".to_string(),
        })
    }
}

/// Development sender: nothing leaves the process.
pub struct LogCodeSender;

#[async_trait]
impl CodeSender for LogCodeSender {
    fn provider(&self) -> &str {
        "log"
    }

    async fn send_code(
        &self,
        whatsapp_number: &str,
        code: &str,
    ) -> Result<DeliveryReport, DeliveryError> {
        debug!(to = %whatsapp_number, code = %code, "TAC generated (not delivered)");
        Ok(DeliveryReport {
            provider: self.provider().to_string(),
            delivered: false,
            detail: "WhatsApp is not configured; TAC was not delivered.".to_string(),
        })
    }
}

pub fn sender_from_config(config: &WhatsAppConfig) -> Result<Arc<dyn CodeSender>, DeliveryError> {
    match (&config.phone_id, &config.access_token) {
        (Some(phone_id), Some(access_token)) => {
            info!("WhatsApp Cloud API delivery enabled");
            Ok(Arc::new(WhatsAppCloudSender::new(
                &config.api_base,
                phone_id,
                access_token,
                &config.template_name,
            )?))
        }
        _ => {
            warn!("WhatsApp credentials missing, TAC codes will only be logged");
            Ok(Arc::new(LogCodeSender))
        }
    }
}

/// `60123456789` -> `*******6789`
pub fn mask(whatsapp_number: &str) -> String {
    let keep = whatsapp_number.len().saturating_sub(4);
    whatsapp_number
        .char_indices()
        .map(|(i, c)| if i < keep { '*' } else { c })
        .collect()
}
