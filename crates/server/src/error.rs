use crate::notifications::DispatchResult;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Delivery timed out after {0:?}")]
    Timeout(Duration),
    #[error("Delivery rejected: {0}")]
    Rejected(String),
    #[error("Invalid recipient address: {0}")]
    InvalidRecipient(String),
    #[error("Email template failed to render: {0}")]
    Render(#[from] askama::Error),
    /// Misconfiguration. Raised while building the mailer; fatal at startup.
    #[error("Mail configuration error: {0}")]
    Config(String),
}

impl DeliveryError {
    /// Whether the same message might go through on a later run.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DeliveryError::Timeout(_) | DeliveryError::Rejected(_))
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Notification ledger unavailable: {0}")]
    Unavailable(String),
    #[error("Notification ledger timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Error)]
pub enum FinderError {
    #[error("Due-assignment query failed: {0}")]
    Query(#[from] sea_orm::DbErr),
    #[error("Due-assignment query timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors that abort a whole dispatch run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("A dispatch run is already in progress")]
    AlreadyRunning,
    #[error(transparent)]
    DataQuery(#[from] FinderError),
    /// The ledger went away mid-run. `partial` holds what was done before the
    /// abort; events after the failing one were not touched.
    #[error("Run aborted: {source}")]
    LedgerUnavailable {
        #[source]
        source: LedgerError,
        partial: DispatchResult,
    },
}
