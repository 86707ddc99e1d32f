//! Append-only record of delivered notifications.
//!
//! One row per (event_id, collaborator_id, kind); the unique index lives in the
//! migration. Rows are written only after the mail transport accepted the
//! message, and are never updated or deleted by the pipeline.

use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "notification_ledger")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub event_id: i32,
    pub collaborator_id: i32,
    pub kind: String,
    pub sent_at: OffsetDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
