//! Mail delivery behind a single bounded `send`.
//!
//! [`Mailer`] owns the overall timeout and the uniform error classification;
//! a [`MailTransport`] only knows how to hand a message to one kind of
//! backend. Two backends ship: SMTP via lettre and a generic JSON email API.

use crate::config::{EmailBackend, EmailConfig, HttpApiConfig, SmtpConfig};
use crate::error::DeliveryError;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Identifier the backend (or we, for SMTP) assigned to a sent message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageId(pub String);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html_body: String,
    /// Plain-text alternative; sent as multipart/alternative when present.
    pub text_body: Option<String>,
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    async fn deliver(&self, email: &OutgoingEmail) -> Result<MessageId, DeliveryError>;

    /// Cheap reachability probe used once at startup.
    async fn verify(&self) -> Result<(), DeliveryError> {
        Ok(())
    }
}

/// Cloneable handle used by the dispatcher, the assignment hook and the API.
#[derive(Clone)]
pub struct Mailer {
    transport: Arc<dyn MailTransport>,
    from: String,
    timeout: Duration,
}

impl fmt::Debug for Mailer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mailer")
            .field("transport", &self.transport.name())
            .field("from", &self.from)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Mailer {
    pub fn new(transport: Arc<dyn MailTransport>, from: impl Into<String>, timeout: Duration) -> Self {
        Self {
            transport,
            from: from.into(),
            timeout,
        }
    }

    /// Builds the configured backend. Missing credentials surface here as
    /// [`DeliveryError::Config`], before any message is attempted.
    pub fn from_config(config: &EmailConfig) -> Result<Self, DeliveryError> {
        if config.from.parse::<Mailbox>().is_err() {
            return Err(DeliveryError::Config(format!(
                "email.from '{}' is not a valid mailbox",
                config.from
            )));
        }

        let timeout = config.send_timeout();
        let transport: Arc<dyn MailTransport> = match config.backend {
            EmailBackend::Smtp => {
                let smtp = config.smtp.as_ref().ok_or_else(|| {
                    DeliveryError::Config("email.smtp section missing".into())
                })?;
                Arc::new(SmtpMailTransport::from_config(smtp, timeout)?)
            }
            EmailBackend::HttpApi => {
                let api = config.http_api.as_ref().ok_or_else(|| {
                    DeliveryError::Config("email.http_api section missing".into())
                })?;
                Arc::new(HttpApiMailTransport::from_config(api, timeout)?)
            }
        };

        Ok(Self::new(transport, config.from.clone(), timeout))
    }

    pub fn from_address(&self) -> &str {
        &self.from
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Sends one message, waiting at most the configured timeout.
    #[tracing::instrument(skip(self, email), fields(transport = self.transport.name()))]
    pub async fn send(&self, email: &OutgoingEmail) -> Result<MessageId, DeliveryError> {
        if email.to.trim().is_empty() {
            return Err(DeliveryError::InvalidRecipient("empty address".into()));
        }

        match tokio::time::timeout(self.timeout, self.transport.deliver(email)).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Timeout(self.timeout)),
        }
    }

    #[tracing::instrument(skip(self), fields(transport = self.transport.name()))]
    pub async fn verify(&self) -> Result<(), DeliveryError> {
        match tokio::time::timeout(self.timeout, self.transport.verify()).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Timeout(self.timeout)),
        }
    }
}

pub struct SmtpMailTransport {
    inner: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailTransport {
    pub fn from_config(config: &SmtpConfig, timeout: Duration) -> Result<Self, DeliveryError> {
        if config.username.is_empty() || config.password.is_empty() {
            return Err(DeliveryError::Config("SMTP credentials missing".into()));
        }

        let builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.server)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.server)
        }
        .map_err(|e| DeliveryError::Config(format!("SMTP relay '{}': {e}", config.server)))?;

        let creds = Credentials::new(config.username.clone(), config.password.clone());
        let inner = builder
            .port(config.port)
            .credentials(creds)
            .timeout(Some(timeout))
            .build();

        Ok(Self { inner })
    }

    /// Wraps an already built lettre transport.
    pub fn from_transport(inner: AsyncSmtpTransport<Tokio1Executor>) -> Self {
        Self { inner }
    }
}

/// Builds the MIME message with a generated `Message-ID` we can report back.
pub fn build_message(email: &OutgoingEmail) -> Result<(Message, MessageId), DeliveryError> {
    let from: Mailbox = email
        .from
        .parse()
        .map_err(|e| DeliveryError::Config(format!("sender '{}': {e}", email.from)))?;
    let to: Mailbox = email
        .to
        .parse()
        .map_err(|e| DeliveryError::InvalidRecipient(format!("'{}': {e}", email.to)))?;

    let message_id = MessageId(format!("<{}@{}>", Uuid::new_v4(), from.email.domain()));

    let builder = Message::builder()
        .from(from)
        .to(to)
        .subject(email.subject.clone())
        .header(lettre::message::header::MIME_VERSION_1_0)
        .message_id(Some(message_id.0.clone()));

    let message = match &email.text_body {
        Some(text) => builder.multipart(
            MultiPart::alternative()
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_PLAIN)
                        .body(text.clone()),
                )
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_HTML)
                        .body(email.html_body.clone()),
                ),
        ),
        None => builder
            .header(ContentType::TEXT_HTML)
            .body(email.html_body.clone()),
    }
    .map_err(|e| DeliveryError::Rejected(format!("could not build message: {e}")))?;

    Ok((message, message_id))
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    fn name(&self) -> &'static str {
        "smtp"
    }

    async fn deliver(&self, email: &OutgoingEmail) -> Result<MessageId, DeliveryError> {
        let (message, message_id) = build_message(email)?;
        self.inner
            .send(message)
            .await
            .map_err(|e| DeliveryError::Rejected(e.to_string()))?;
        Ok(message_id)
    }

    async fn verify(&self) -> Result<(), DeliveryError> {
        match self.inner.test_connection().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(DeliveryError::Rejected(
                "SMTP server did not accept the connection".into(),
            )),
            Err(e) => Err(DeliveryError::Rejected(e.to_string())),
        }
    }
}

#[derive(Serialize)]
struct ApiSendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
}

#[derive(Deserialize)]
struct ApiSendResponse {
    #[serde(alias = "messageId", alias = "message_id")]
    id: String,
}

/// JSON-over-HTTPS transactional email API authenticated with a bearer key.
///
/// Expects `POST {endpoint}` to answer 2xx with `{"id": ...}` (or
/// `messageId` / `message_id`).
pub struct HttpApiMailTransport {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    timeout: Duration,
}

impl HttpApiMailTransport {
    pub fn from_config(config: &HttpApiConfig, timeout: Duration) -> Result<Self, DeliveryError> {
        if config.api_key.is_empty() {
            return Err(DeliveryError::Config("email API key missing".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeliveryError::Config(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            timeout,
        })
    }
}

#[async_trait]
impl MailTransport for HttpApiMailTransport {
    fn name(&self) -> &'static str {
        "http_api"
    }

    async fn deliver(&self, email: &OutgoingEmail) -> Result<MessageId, DeliveryError> {
        let request = ApiSendRequest {
            from: &email.from,
            to: [&email.to],
            subject: &email.subject,
            html: &email.html_body,
            text: email.text_body.as_deref(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout(self.timeout)
                } else {
                    DeliveryError::Rejected(format!("email API unreachable: {e}"))
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(DeliveryError::Rejected(format!(
                "email API refused credentials (HTTP {status})"
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected(format!("HTTP {status}: {body}")));
        }

        let body: ApiSendResponse = response
            .json()
            .await
            .map_err(|e| DeliveryError::Rejected(format!("unreadable email API response: {e}")))?;
        Ok(MessageId(body.id))
    }
}
