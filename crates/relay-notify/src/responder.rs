//! Responder model and directory contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::NotifyError;

/// Online/offline state of a responder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponderStatus {
    Online,
    Offline,
}

/// A notification subscriber.
///
/// Identity is the registration token. Owned by the notification
/// subsystem; read-only from the pipeline's perspective except for
/// invalid-token flagging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Responder {
    /// Online/offline status.
    pub status: ResponderStatus,

    /// Device registration token, if one is set.
    #[serde(default)]
    pub notification_token: Option<String>,

    /// Set when a send reported the token invalid; cleared by cleanup.
    #[serde(default)]
    pub token_invalid: bool,
}

impl Responder {
    /// The usable registration token, if the responder has one.
    pub fn usable_token(&self) -> Option<&str> {
        self.notification_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }
}

/// Narrow capability over the responder directory.
#[async_trait]
pub trait ResponderDirectory: Send + Sync {
    /// Registration tokens of online responders, with optional extra
    /// equality filters on responder fields.
    ///
    /// Implementations strip blank tokens; callers deduplicate.
    async fn online_tokens(&self, filters: &[(String, String)]) -> Result<Vec<String>, NotifyError>;

    /// Flag the responder holding this token for cleanup, marking it
    /// offline.
    async fn flag_invalid(&self, token: &str) -> Result<(), NotifyError>;

    /// Clear all flagged responders. Explicit maintenance operation,
    /// never run automatically.
    async fn cleanup_flagged(&self) -> Result<usize, NotifyError>;
}
