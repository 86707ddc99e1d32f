//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use migration::{Migrator, MigratorTrait};
use onboarding_alerts::config::{
    AppConfig, DatabaseConfig, EmailBackend, EmailConfig, SchedulerConfig, SmtpConfig,
};
use onboarding_alerts::entity::{assignment, collaborator, onboarding_event};
use onboarding_alerts::error::DeliveryError;
use onboarding_alerts::notifications::{MailTransport, Mailer, MessageId, OutgoingEmail};
use sea_orm::{ActiveValue::Set, Database, DatabaseConnection, EntityTrait};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use time::{Date, OffsetDateTime};

/// In-memory SQLite with the real schema applied.
pub async fn create_test_db() -> Arc<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await.expect("connect");
    Migrator::up(&db, None).await.expect("migrations");
    Arc::new(db)
}

pub async fn insert_collaborator(db: &DatabaseConnection, id: i32, name: &str, email: &str) {
    collaborator::Entity::insert(collaborator::ActiveModel {
        id: Set(id),
        full_name: Set(name.to_string()),
        email: Set(email.to_string()),
        hire_date: Set(time::macros::date!(2026 - 10 - 01)),
        welcome_onboarding_done: Set(false),
        technical_onboarding_done: Set(false),
        technical_onboarding_date: Set(None),
    })
    .exec_without_returning(db)
    .await
    .expect("insert collaborator");
}

pub async fn insert_event(db: &DatabaseConnection, id: i32, name: &str, start: Date, active: bool) {
    onboarding_event::Entity::insert(onboarding_event::ActiveModel {
        id: Set(id),
        name: Set(name.to_string()),
        kind: Set("technical".to_string()),
        description: Set(Some("Sesión introductoria".to_string())),
        start_date: Set(start),
        end_date: Set(start.next_day().unwrap_or(start)),
        active: Set(active),
    })
    .exec_without_returning(db)
    .await
    .expect("insert event");
}

pub async fn assign(db: &DatabaseConnection, collaborator_id: i32, event_id: i32, completed: bool) {
    assignment::Entity::insert(assignment::ActiveModel {
        collaborator_id: Set(collaborator_id),
        event_id: Set(event_id),
        completed: Set(completed),
        completed_at: Set(completed.then(OffsetDateTime::now_utc)),
        assigned_at: Set(OffsetDateTime::now_utc()),
    })
    .exec_without_returning(db)
    .await
    .expect("insert assignment");
}

/// Records every message and fails for chosen addresses.
#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<OutgoingEmail>>,
    pub fail_for: HashSet<String>,
    pub delay: Option<Duration>,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl RecordingTransport {
    pub fn failing_for(addresses: &[&str]) -> Self {
        Self {
            fail_for: addresses.iter().map(|a| a.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn sent_to(&self) -> Vec<String> {
        let mut to: Vec<String> = self.sent.lock().unwrap().iter().map(|e| e.to.clone()).collect();
        to.sort();
        to
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl MailTransport for RecordingTransport {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn deliver(&self, email: &OutgoingEmail) -> Result<MessageId, DeliveryError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_for.contains(&email.to) {
            return Err(DeliveryError::Rejected(format!("mailbox {} unavailable", email.to)));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(email.clone());
        Ok(MessageId(format!("<test-{}@example.com>", sent.len())))
    }
}

pub fn mailer_with(transport: Arc<RecordingTransport>, timeout: Duration) -> Mailer {
    Mailer::new(transport, "Onboarding <onboarding@example.com>", timeout)
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database: DatabaseConfig {
            url: "sqlite::memory:".into(),
            run_migrations: false,
            statement_timeout_secs: 5,
        },
        email: EmailConfig {
            from: "Onboarding <onboarding@example.com>".into(),
            backend: EmailBackend::Smtp,
            send_timeout_secs: 5,
            smtp: Some(SmtpConfig {
                server: "localhost".into(),
                port: 25,
                username: "test".into(),
                password: "test".into(),
                starttls: false,
            }),
            http_api: None,
        },
        scheduler: SchedulerConfig {
            timezone: "UTC".into(),
            ..SchedulerConfig::default()
        },
        listen_addr: "127.0.0.1:0".into(),
    }
}
