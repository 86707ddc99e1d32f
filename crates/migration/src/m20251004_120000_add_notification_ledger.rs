use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Append-only record of notifications that were delivered.
///
/// The unique index on (event_id, collaborator_id, kind) is what keeps the
/// scheduled reminder at most once per recipient and event, across restarts
/// and across concurrent writers.
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(NotificationLedger::Table)
                    .if_not_exists()
                    .col(pk_auto(NotificationLedger::Id))
                    .col(integer(NotificationLedger::EventId))
                    .col(integer(NotificationLedger::CollaboratorId))
                    .col(
                        ColumnDef::new(NotificationLedger::Kind)
                            .string()
                            .not_null()
                            .comment("Notification kind, e.g. 'weekly_alert'"),
                    )
                    .col(
                        timestamp_with_time_zone(NotificationLedger::SentAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_notification_ledger_unique")
                    .table(NotificationLedger::Table)
                    .col(NotificationLedger::EventId)
                    .col(NotificationLedger::CollaboratorId)
                    .col(NotificationLedger::Kind)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(NotificationLedger::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum NotificationLedger {
    Table,
    Id,
    EventId,
    CollaboratorId,
    Kind,
    SentAt,
}
