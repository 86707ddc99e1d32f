//! Link between a collaborator and an event they must attend.
//!
//! The composite primary key enforces at most one assignment per pair.

use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "assignment")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub collaborator_id: i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub event_id: i32,
    pub completed: bool,
    pub completed_at: Option<OffsetDateTime>,
    pub assigned_at: OffsetDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::collaborator::Entity",
        from = "Column::CollaboratorId",
        to = "super::collaborator::Column::Id",
        on_delete = "Cascade"
    )]
    Collaborator,
    #[sea_orm(
        belongs_to = "super::onboarding_event::Entity",
        from = "Column::EventId",
        to = "super::onboarding_event::Column::Id",
        on_delete = "Cascade"
    )]
    OnboardingEvent,
}

impl Related<super::collaborator::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Collaborator.def()
    }
}

impl Related<super::onboarding_event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OnboardingEvent.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
