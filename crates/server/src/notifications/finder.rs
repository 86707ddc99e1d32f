//! Due-assignment query.

use crate::entity::{assignment, collaborator, onboarding_event};
use crate::error::FinderError;
use crate::notifications::{DateWindow, DueEvent, EventGroup, Recipient};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult, JoinType, QueryFilter,
    QueryOrder, QuerySelect, RelationTrait,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use time::Date;

#[derive(Debug, FromQueryResult)]
struct DueRow {
    event_id: i32,
    event_name: String,
    event_kind: String,
    event_description: Option<String>,
    start_date: Date,
    end_date: Date,
    collaborator_id: i32,
    full_name: String,
    email: String,
}

#[derive(Clone, Debug)]
pub struct DueAssignmentFinder {
    db: Arc<DatabaseConnection>,
    timeout: Duration,
}

impl DueAssignmentFinder {
    pub fn new(db: Arc<DatabaseConnection>, timeout: Duration) -> Self {
        Self { db, timeout }
    }

    /// Active events starting within `window` (inclusive) with every
    /// collaborator whose assignment is still incomplete.
    ///
    /// Groups come back by start date then name; recipients by name. Events
    /// with no pending collaborator are absent.
    #[tracing::instrument(skip(self))]
    pub async fn find_due_assignments(
        &self,
        window: DateWindow,
    ) -> Result<Vec<EventGroup>, FinderError> {
        let query = assignment::Entity::find()
            .select_only()
            .column_as(onboarding_event::Column::Id, "event_id")
            .column_as(onboarding_event::Column::Name, "event_name")
            .column_as(onboarding_event::Column::Kind, "event_kind")
            .column_as(onboarding_event::Column::Description, "event_description")
            .column_as(onboarding_event::Column::StartDate, "start_date")
            .column_as(onboarding_event::Column::EndDate, "end_date")
            .column_as(collaborator::Column::Id, "collaborator_id")
            .column_as(collaborator::Column::FullName, "full_name")
            .column_as(collaborator::Column::Email, "email")
            .join(JoinType::InnerJoin, assignment::Relation::OnboardingEvent.def())
            .join(JoinType::InnerJoin, assignment::Relation::Collaborator.def())
            .filter(onboarding_event::Column::Active.eq(true))
            .filter(onboarding_event::Column::StartDate.between(window.start, window.end))
            .filter(assignment::Column::Completed.eq(false))
            .order_by_asc(onboarding_event::Column::StartDate)
            .order_by_asc(onboarding_event::Column::Name)
            .order_by_asc(onboarding_event::Column::Id)
            .order_by_asc(collaborator::Column::FullName)
            .into_model::<DueRow>()
            .all(self.db.as_ref());

        let rows = tokio::time::timeout(self.timeout, query)
            .await
            .map_err(|_| FinderError::Timeout(self.timeout))??;

        let groups = group_by_event(rows);
        tracing::info!(
            name = "notifications.finder.completed",
            target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
            window_start = %window.start,
            window_end = %window.end,
            events = groups.len(),
            recipients = groups.iter().map(|g| g.recipients.len()).sum::<usize>(),
            message = "Due assignments loaded"
        );
        Ok(groups)
    }
}

fn group_by_event(rows: Vec<DueRow>) -> Vec<EventGroup> {
    let mut groups: Vec<EventGroup> = Vec::new();
    let mut index: HashMap<i32, usize> = HashMap::new();

    for row in rows {
        let recipient = Recipient {
            collaborator_id: row.collaborator_id,
            full_name: row.full_name,
            email: row.email,
        };
        match index.get(&row.event_id) {
            Some(&i) => groups[i].recipients.push(recipient),
            None => {
                index.insert(row.event_id, groups.len());
                groups.push(EventGroup {
                    event: DueEvent {
                        id: row.event_id,
                        name: row.event_name,
                        kind: row.event_kind,
                        description: row.event_description,
                        start_date: row.start_date,
                        end_date: row.end_date,
                    },
                    recipients: vec![recipient],
                });
            }
        }
    }

    groups
}
