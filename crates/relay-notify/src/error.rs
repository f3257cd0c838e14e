//! Error types for the notification subsystem.

use thiserror::Error;

/// Errors raised while fanning out notifications.
///
/// All of these are best-effort from the pipeline's perspective: the
/// caller logs them and the run continues.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The responder directory could not be read or updated.
    #[error("Responder directory error: {0}")]
    Directory(String),

    /// The push channel rejected the whole request.
    #[error("Push channel error: {0}")]
    Channel(String),
}
