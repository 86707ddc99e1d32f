//! Durable at-most-once guard for notifications.

use crate::entity::notification_ledger;
use crate::error::LedgerError;
use crate::notifications::NotificationKind;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveValue, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QuerySelect,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;

/// Ledger backed by the shared `notification_ledger` table.
///
/// Reads and writes go straight to the database, so every instance and every
/// restart sees the same history.
#[derive(Clone, Debug)]
pub struct NotificationLedger {
    db: Arc<DatabaseConnection>,
    timeout: Duration,
}

impl NotificationLedger {
    pub fn new(db: Arc<DatabaseConnection>, timeout: Duration) -> Self {
        Self { db, timeout }
    }

    async fn bounded<T, F>(&self, op: F) -> Result<T, LedgerError>
    where
        F: Future<Output = Result<T, DbErr>>,
    {
        match tokio::time::timeout(self.timeout, op).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(LedgerError::Unavailable(e.to_string())),
            Err(_) => Err(LedgerError::Timeout(self.timeout)),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn already_sent(
        &self,
        event_id: i32,
        collaborator_id: i32,
        kind: NotificationKind,
    ) -> Result<bool, LedgerError> {
        let found = self
            .bounded(
                notification_ledger::Entity::find()
                    .select_only()
                    .column(notification_ledger::Column::Id)
                    .filter(notification_ledger::Column::EventId.eq(event_id))
                    .filter(notification_ledger::Column::CollaboratorId.eq(collaborator_id))
                    .filter(notification_ledger::Column::Kind.eq(kind.as_str()))
                    .into_tuple::<i32>()
                    .one(self.db.as_ref()),
            )
            .await?;
        Ok(found.is_some())
    }

    /// Records a delivered notification. Idempotent: a second call for the
    /// same triple leaves the existing row alone.
    #[tracing::instrument(skip(self))]
    pub async fn record_sent(
        &self,
        event_id: i32,
        collaborator_id: i32,
        kind: NotificationKind,
    ) -> Result<(), LedgerError> {
        let entry = notification_ledger::ActiveModel {
            id: ActiveValue::NotSet,
            event_id: ActiveValue::Set(event_id),
            collaborator_id: ActiveValue::Set(collaborator_id),
            kind: ActiveValue::Set(kind.as_str().to_string()),
            sent_at: ActiveValue::Set(OffsetDateTime::now_utc()),
        };

        let inserted = self
            .bounded(
                notification_ledger::Entity::insert(entry)
                    .on_conflict(
                        OnConflict::columns([
                            notification_ledger::Column::EventId,
                            notification_ledger::Column::CollaboratorId,
                            notification_ledger::Column::Kind,
                        ])
                        .do_nothing()
                        .to_owned(),
                    )
                    .exec_without_returning(self.db.as_ref()),
            )
            .await?;

        if inserted == 0 {
            tracing::debug!(
                name = "notifications.ledger.already_recorded",
                target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                event_id = event_id,
                collaborator_id = collaborator_id,
                kind = %kind,
                message = "Ledger entry already present"
            );
        }
        Ok(())
    }
}
