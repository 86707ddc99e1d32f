//! Confirmation email on assignment creation.

use crate::email_templates::AssignmentConfirmationTemplate;
use crate::notifications::{DueEvent, Mailer, NotificationKind, Recipient};
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Fire-and-forget sender for [`NotificationKind::AssignmentConfirmation`].
///
/// There is no ledger check: every newly created assignment gets its own
/// confirmation.
#[derive(Clone, Debug)]
pub struct AssignmentHook {
    mailer: Mailer,
}

impl AssignmentHook {
    pub fn new(mailer: Mailer) -> Self {
        Self { mailer }
    }

    /// Spawns the send and returns immediately. Failures are only logged.
    pub fn notify_assignment_created(&self, recipient: Recipient, event: DueEvent) -> JoinHandle<()> {
        let mailer = self.mailer.clone();
        let span = tracing::info_span!(
            "assignment_confirmation",
            event_id = event.id,
            collaborator_id = recipient.collaborator_id
        );

        tokio::spawn(
            async move {
                if !recipient.has_email() {
                    tracing::warn!(
                        name = "notifications.hook.missing_email",
                        target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                        message = "Collaborator has no email address, confirmation not sent"
                    );
                    return;
                }

                let email = match (AssignmentConfirmationTemplate {
                    recipient: &recipient,
                    event: &event,
                })
                .to_email(mailer.from_address())
                {
                    Ok(email) => email,
                    Err(e) => {
                        tracing::error!(
                            name = "notifications.hook.render_failed",
                            target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                            error = %e,
                            message = "Assignment confirmation failed to render"
                        );
                        return;
                    }
                };

                match mailer.send(&email).await {
                    Ok(message_id) => tracing::info!(
                        name = "notifications.hook.sent",
                        target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                        kind = %NotificationKind::AssignmentConfirmation,
                        message_id = %message_id,
                        message = "Assignment confirmation sent"
                    ),
                    Err(e) => tracing::warn!(
                        name = "notifications.hook.send_failed",
                        target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                        kind = %NotificationKind::AssignmentConfirmation,
                        error = %e,
                        message = "Assignment confirmation failed"
                    ),
                }
            }
            .instrument(span),
        )
    }
}
