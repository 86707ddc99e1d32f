use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Collaborators, onboarding events and the assignments linking them.
///
/// These tables are owned by the CRUD layer; the alert pipeline only reads them.
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Collaborator::Table)
                    .if_not_exists()
                    .col(pk_auto(Collaborator::Id))
                    .col(string(Collaborator::FullName))
                    .col(string(Collaborator::Email))
                    .col(date(Collaborator::HireDate))
                    .col(boolean(Collaborator::WelcomeOnboardingDone).default(false))
                    .col(boolean(Collaborator::TechnicalOnboardingDone).default(false))
                    .col(date_null(Collaborator::TechnicalOnboardingDate))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OnboardingEvent::Table)
                    .if_not_exists()
                    .col(pk_auto(OnboardingEvent::Id))
                    .col(string(OnboardingEvent::Name))
                    // Event category, e.g. "technical" or "welcome".
                    .col(string(OnboardingEvent::Kind))
                    .col(text_null(OnboardingEvent::Description))
                    .col(date(OnboardingEvent::StartDate))
                    .col(date(OnboardingEvent::EndDate))
                    .col(boolean(OnboardingEvent::Active).default(true))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_onboarding_event_start_date")
                    .table(OnboardingEvent::Table)
                    .col(OnboardingEvent::StartDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Assignment::Table)
                    .if_not_exists()
                    .col(integer(Assignment::CollaboratorId))
                    .col(integer(Assignment::EventId))
                    .col(boolean(Assignment::Completed).default(false))
                    .col(timestamp_with_time_zone_null(Assignment::CompletedAt))
                    .col(
                        timestamp_with_time_zone(Assignment::AssignedAt)
                            .default(Expr::current_timestamp()),
                    )
                    // One assignment per (collaborator, event) pair.
                    .primary_key(
                        Index::create()
                            .col(Assignment::CollaboratorId)
                            .col(Assignment::EventId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_assignment_collaborator")
                            .from(Assignment::Table, Assignment::CollaboratorId)
                            .to(Collaborator::Table, Collaborator::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_assignment_event")
                            .from(Assignment::Table, Assignment::EventId)
                            .to(OnboardingEvent::Table, OnboardingEvent::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_assignment_event_pending")
                    .table(Assignment::Table)
                    .col(Assignment::EventId)
                    .col(Assignment::Completed)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Assignment::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OnboardingEvent::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Collaborator::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Collaborator {
    Table,
    Id,
    FullName,
    Email,
    HireDate,
    WelcomeOnboardingDone,
    TechnicalOnboardingDone,
    TechnicalOnboardingDate,
}

#[derive(Iden)]
pub enum OnboardingEvent {
    Table,
    Id,
    Name,
    Kind,
    Description,
    StartDate,
    EndDate,
    Active,
}

#[derive(Iden)]
pub enum Assignment {
    Table,
    CollaboratorId,
    EventId,
    Completed,
    CompletedAt,
    AssignedAt,
}
