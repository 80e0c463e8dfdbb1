use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// What happened to a code after it was handed to a sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub provider: String,
    pub delivered: bool,
    pub detail: String,
}

impl DeliveryReport {
    pub fn failed(provider: &str, error: impl Display) -> Self {
        Self {
            provider: provider.to_string(),
            delivered: false,
            detail: error.to_string(),
        }
    }
}
