//! Response bodies for the HTTP service.

use serde::{Deserialize, Serialize};

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
}

/// Acknowledgement for deliveries that do not trigger a dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckResponse {
    pub ok: bool,
    pub message: String,
}

impl AckResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }
}

/// Reply to a `ping` delivery.
pub const PONG: &str = "pong";

/// Reply to a delivery that needs no action.
pub const EVENT_IGNORED: &str = "Event ignored";

/// Reply to an actionable review while auto-fix is switched off.
pub const AUTO_FIX_DISABLED: &str = "autoFix mode is disabled";
