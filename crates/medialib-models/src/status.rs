//! Provider status values.
//!
//! The status is stored as a loosely-typed string so that providers can
//! record their own values. Anything outside the known set parses to
//! [`ProviderStatus::Custom`] and is treated as sticky by the lifecycle.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Processing status of a media as seen by its provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum ProviderStatus {
    /// Media is ready; derived files may be generated
    Ok,
    /// Binary content is being transferred
    Sending,
    /// Media has not been processed yet
    #[default]
    Pending,
    /// Processing failed
    Error,
    /// Media is being transcoded by an external service
    Encoding,
    /// Provider-specific value
    Custom(String),
}

impl ProviderStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &str {
        match self {
            ProviderStatus::Ok => "ok",
            ProviderStatus::Sending => "sending",
            ProviderStatus::Pending => "pending",
            ProviderStatus::Error => "error",
            ProviderStatus::Encoding => "encoding",
            ProviderStatus::Custom(value) => value,
        }
    }

    /// Sticky statuses survive re-saves: the default hooks never move a
    /// media out of them unless new binary content is supplied.
    pub fn is_sticky(&self) -> bool {
        matches!(self, ProviderStatus::Error | ProviderStatus::Custom(_))
    }

    /// Status a re-saved media settles on when no new content was uploaded.
    pub fn normalized_for_update(&self) -> ProviderStatus {
        match self {
            ProviderStatus::Pending | ProviderStatus::Sending => ProviderStatus::Ok,
            other => other.clone(),
        }
    }
}

impl From<&str> for ProviderStatus {
    fn from(value: &str) -> Self {
        match value {
            "ok" => ProviderStatus::Ok,
            "sending" => ProviderStatus::Sending,
            "pending" => ProviderStatus::Pending,
            "error" => ProviderStatus::Error,
            "encoding" => ProviderStatus::Encoding,
            other => ProviderStatus::Custom(other.to_string()),
        }
    }
}

impl From<String> for ProviderStatus {
    fn from(value: String) -> Self {
        ProviderStatus::from(value.as_str())
    }
}

impl From<ProviderStatus> for String {
    fn from(status: ProviderStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
