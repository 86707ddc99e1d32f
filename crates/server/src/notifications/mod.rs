//! Onboarding reminder pipeline.
//!
//! This module handles:
//! - Finding collaborators with pending assignments to upcoming events
//! - At-most-once bookkeeping of delivered reminders
//! - Concurrent, failure-isolated delivery per event
//! - The daily trigger and its manual counterpart
//! - The confirmation email sent when an assignment is created
//!
//! ## Submodules
//!
//! - `delivery` - Mail transport abstraction with SMTP and HTTP API backends
//! - `ledger` - Durable record of sent notifications
//! - `finder` - Due-assignment query and grouping
//! - `dispatcher` - Per-event send/record loop
//! - `scheduler` - Daily trigger, manual trigger and overlap guard
//! - `hook` - Fire-and-forget assignment confirmation
//! - `test_email` - One-off probe email for operators

pub mod delivery;
pub mod dispatcher;
pub mod finder;
pub mod hook;
pub mod ledger;
pub mod scheduler;
pub mod test_email;

pub use delivery::{
    HttpApiMailTransport, MailTransport, Mailer, MessageId, OutgoingEmail, SmtpMailTransport,
};
pub use dispatcher::{AlertDispatcher, DispatchAbort};
pub use finder::DueAssignmentFinder;
pub use hook::AssignmentHook;
pub use ledger::NotificationLedger;
pub use scheduler::{AlertScheduler, SchedulerHandle, next_fire_after};
pub use test_email::send_test_email;

use crate::entity::{collaborator, onboarding_event};
use serde::{Deserialize, Serialize};
use std::fmt;
use time::{Date, Duration};
use utoipa::ToSchema;

/// Tag distinguishing reminder types. Part of the ledger key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Scheduled reminder ahead of an event. Deduplicated through the ledger.
    WeeklyAlert,
    /// Sent when an assignment is created. Never deduplicated.
    AssignmentConfirmation,
}

impl NotificationKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::WeeklyAlert => "weekly_alert",
            NotificationKind::AssignmentConfirmation => "assignment_confirmation",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive range of event start dates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateWindow {
    pub start: Date,
    pub end: Date,
}

impl DateWindow {
    pub fn new(start: Date, end: Date) -> Self {
        Self { start, end }
    }

    /// `[today, today + days]`, saturating at the calendar's end.
    pub fn looking_ahead(today: Date, days: u32) -> Self {
        let end = today
            .checked_add(Duration::days(i64::from(days)))
            .unwrap_or(Date::MAX);
        Self { start: today, end }
    }

    pub fn contains(&self, date: Date) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Event details carried into reminder emails.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DueEvent {
    pub id: i32,
    pub name: String,
    pub kind: String,
    pub description: Option<String>,
    pub start_date: Date,
    pub end_date: Date,
}

impl From<onboarding_event::Model> for DueEvent {
    fn from(event: onboarding_event::Model) -> Self {
        Self {
            id: event.id,
            name: event.name,
            kind: event.kind,
            description: event.description,
            start_date: event.start_date,
            end_date: event.end_date,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recipient {
    pub collaborator_id: i32,
    pub full_name: String,
    pub email: String,
}

impl Recipient {
    pub fn has_email(&self) -> bool {
        !self.email.trim().is_empty()
    }
}

impl From<collaborator::Model> for Recipient {
    fn from(collaborator: collaborator::Model) -> Self {
        Self {
            collaborator_id: collaborator.id,
            full_name: collaborator.full_name,
            email: collaborator.email,
        }
    }
}

/// One event together with every collaborator still pending on it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventGroup {
    pub event: DueEvent,
    pub recipients: Vec<Recipient>,
}

/// Counts for a single event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EventOutcome {
    pub event_id: i32,
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl EventOutcome {
    pub fn new(event_id: i32) -> Self {
        Self {
            event_id,
            ..Self::default()
        }
    }
}

/// Aggregate over one dispatch run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResult {
    pub events_processed: usize,
    pub notifications_sent: usize,
    pub notifications_skipped: usize,
    pub notifications_failed: usize,
}

impl DispatchResult {
    pub fn absorb(&mut self, outcome: &EventOutcome) {
        self.events_processed += 1;
        self.notifications_sent += outcome.sent;
        self.notifications_skipped += outcome.skipped;
        self.notifications_failed += outcome.failed;
    }
}
