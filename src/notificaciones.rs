//! Outbound notification boundary.
//!
//! Delivery is best-effort: the engine commits its durable state first and
//! reports transport failures through the [`Warning`] channel so callers can
//! distinguish "state changed, notice failed" from "nothing happened".

use serde::{Deserialize, Serialize};

/// Attachment carried with a notification (e.g. the exemption certificate).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adjunto {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Adjunto {
    pub fn pdf(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: mime::APPLICATION_PDF.to_string(),
            bytes,
        }
    }
}

/// A single outbound notice to an applicant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notificacion {
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: Option<String>,
    pub attachment: Option<Adjunto>,
}

/// Transport abstraction (SMTP in production, a buffer in tests).
pub trait NotificationSender: Send + Sync {
    fn send(&self, notice: Notificacion) -> Result<(), NotificationError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Non-fatal outcomes of the side-effect phase of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Warning {
    NotificationDeliveryFailed { to: String, reason: String },
    ArtifactGenerationFailed { reason: String },
}

impl Warning {
    pub fn delivery_failed(to: &str, err: &NotificationError) -> Self {
        Warning::NotificationDeliveryFailed {
            to: to.to_string(),
            reason: err.to_string(),
        }
    }
}
