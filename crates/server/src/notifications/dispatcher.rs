//! Per-event send/record loop.

use crate::email_templates::{AssignmentConfirmationTemplate, WeeklyAlertTemplate};
use crate::error::LedgerError;
use crate::notifications::{
    DueEvent, EventGroup, EventOutcome, Mailer, NotificationKind, NotificationLedger,
    OutgoingEmail, Recipient,
};
use futures::stream::{self, StreamExt};
use thiserror::Error;

/// The ledger failed while an event was being processed.
///
/// `outcome` holds the counts for that event at the point of failure.
#[derive(Debug, Error)]
#[error("Dispatch for event {} aborted: {source}", .outcome.event_id)]
pub struct DispatchAbort {
    pub outcome: EventOutcome,
    #[source]
    pub source: LedgerError,
}

enum RecipientResult {
    Sent,
    Failed,
    /// Delivered, but the ledger write failed afterwards.
    Unrecorded(LedgerError),
}

#[derive(Clone, Debug)]
pub struct AlertDispatcher {
    ledger: NotificationLedger,
    mailer: Mailer,
    max_concurrent_sends: usize,
}

impl AlertDispatcher {
    pub fn new(ledger: NotificationLedger, mailer: Mailer, max_concurrent_sends: usize) -> Self {
        Self {
            ledger,
            mailer,
            max_concurrent_sends: max_concurrent_sends.max(1),
        }
    }

    pub fn ledger(&self) -> &NotificationLedger {
        &self.ledger
    }

    /// Sends `kind` to every recipient of `group` that has not received it yet.
    ///
    /// A failing recipient only increments `failed`; the rest of the group is
    /// still attempted. Only ledger failures abort.
    #[tracing::instrument(
        skip(self, group),
        fields(event_id = group.event.id, recipients = group.recipients.len())
    )]
    pub async fn dispatch_for_event(
        &self,
        group: &EventGroup,
        kind: NotificationKind,
    ) -> Result<EventOutcome, DispatchAbort> {
        let event = &group.event;
        let mut outcome = EventOutcome::new(event.id);
        let mut pending: Vec<Recipient> = Vec::with_capacity(group.recipients.len());

        for recipient in &group.recipients {
            match self
                .ledger
                .already_sent(event.id, recipient.collaborator_id, kind)
                .await
            {
                Ok(true) => {
                    outcome.skipped += 1;
                    tracing::debug!(
                        name = "notifications.dispatcher.skipped",
                        target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                        event_id = event.id,
                        collaborator_id = recipient.collaborator_id,
                        kind = %kind,
                        message = "Notification already sent, skipping"
                    );
                }
                Ok(false) => pending.push(recipient.clone()),
                Err(source) => {
                    outcome.failed = group.recipients.len() - outcome.skipped;
                    tracing::error!(
                        name = "notifications.dispatcher.ledger_check_failed",
                        target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                        event_id = event.id,
                        error = %source,
                        failed = outcome.failed,
                        message = "Ledger check failed, aborting event"
                    );
                    return Err(DispatchAbort { outcome, source });
                }
            }
        }

        if pending.is_empty() {
            return Ok(outcome);
        }

        let results: Vec<RecipientResult> = stream::iter(pending)
            .map(move |recipient| async move { self.deliver_one(event, &recipient, kind).await })
            .buffer_unordered(self.max_concurrent_sends)
            .collect()
            .await;

        let mut ledger_failure = None;
        for result in results {
            match result {
                RecipientResult::Sent => outcome.sent += 1,
                RecipientResult::Failed => outcome.failed += 1,
                RecipientResult::Unrecorded(e) => {
                    outcome.failed += 1;
                    ledger_failure.get_or_insert(e);
                }
            }
        }

        tracing::info!(
            name = "notifications.dispatcher.event_completed",
            target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
            event_id = event.id,
            event_name = %event.name,
            sent = outcome.sent,
            skipped = outcome.skipped,
            failed = outcome.failed,
            message = "Event dispatch finished"
        );

        match ledger_failure {
            Some(source) => Err(DispatchAbort { outcome, source }),
            None => Ok(outcome),
        }
    }

    async fn deliver_one(
        &self,
        event: &DueEvent,
        recipient: &Recipient,
        kind: NotificationKind,
    ) -> RecipientResult {
        if !recipient.has_email() {
            tracing::warn!(
                name = "notifications.dispatcher.missing_email",
                target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                event_id = event.id,
                collaborator_id = recipient.collaborator_id,
                message = "Collaborator has no email address"
            );
            return RecipientResult::Failed;
        }

        let email = match render(kind, event, recipient, self.mailer.from_address()) {
            Ok(email) => email,
            Err(e) => {
                tracing::error!(
                    name = "notifications.dispatcher.render_failed",
                    target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                    event_id = event.id,
                    collaborator_id = recipient.collaborator_id,
                    kind = %kind,
                    error = %e,
                    message = "Email template failed to render"
                );
                return RecipientResult::Failed;
            }
        };
        match self.mailer.send(&email).await {
            Ok(message_id) => {
                tracing::info!(
                    name = "notifications.dispatcher.sent",
                    target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                    event_id = event.id,
                    collaborator_id = recipient.collaborator_id,
                    kind = %kind,
                    message_id = %message_id,
                    message = "Notification sent"
                );
            }
            Err(e) => {
                tracing::warn!(
                    name = "notifications.dispatcher.send_failed",
                    target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                    event_id = event.id,
                    collaborator_id = recipient.collaborator_id,
                    kind = %kind,
                    error = %e,
                    retryable = e.is_retryable(),
                    message = "Notification delivery failed"
                );
                return RecipientResult::Failed;
            }
        }

        match self
            .ledger
            .record_sent(event.id, recipient.collaborator_id, kind)
            .await
        {
            Ok(()) => RecipientResult::Sent,
            Err(e) => {
                tracing::error!(
                    name = "notifications.dispatcher.record_failed",
                    target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                    event_id = event.id,
                    collaborator_id = recipient.collaborator_id,
                    kind = %kind,
                    error = %e,
                    message = "Email delivered but not recorded; a later run may send it again"
                );
                RecipientResult::Unrecorded(e)
            }
        }
    }
}

fn render(
    kind: NotificationKind,
    event: &DueEvent,
    recipient: &Recipient,
    from: &str,
) -> Result<OutgoingEmail, askama::Error> {
    match kind {
        NotificationKind::WeeklyAlert => WeeklyAlertTemplate { recipient, event }.to_email(from),
        NotificationKind::AssignmentConfirmation => {
            AssignmentConfirmationTemplate { recipient, event }.to_email(from)
        }
    }
}
