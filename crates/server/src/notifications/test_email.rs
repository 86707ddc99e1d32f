use crate::email_templates::TestEmailTemplate;
use crate::error::DeliveryError;
use crate::notifications::{Mailer, MessageId};

/// Sends the fixed "notification system is active" probe to `recipient`.
#[tracing::instrument(skip(mailer))]
pub async fn send_test_email(mailer: &Mailer, recipient: &str) -> Result<MessageId, DeliveryError> {
    let recipient = recipient.trim();
    if recipient.is_empty() {
        return Err(DeliveryError::InvalidRecipient("empty address".into()));
    }

    let email = TestEmailTemplate::to_email(mailer.from_address(), recipient)?;
    let message_id = mailer.send(&email).await?;
    tracing::info!(
        name = "notifications.test_email.sent",
        target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
        message_id = %message_id,
        message = "Test email sent"
    );
    Ok(message_id)
}
