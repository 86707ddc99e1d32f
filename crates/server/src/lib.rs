//! Onboarding notification service.
//!
//! Reminds collaborators of onboarding events they are assigned to, once per
//! event, and confirms new assignments by email.

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::config::{AppConfig, ConfigError};
use crate::notifications::{AlertScheduler, AssignmentHook, Mailer};

pub mod api;
pub mod config;
pub mod email_templates;
pub mod entity;
pub mod error;
pub mod notifications;

#[derive(Clone)]
pub struct AppResources {
    pub db: Arc<DatabaseConnection>,
    pub mailer: Mailer,
    pub config: Arc<AppConfig>,
    pub scheduler: Arc<AlertScheduler>,
    pub assignment_hook: AssignmentHook,
}

impl AppResources {
    /// Wires the pipeline components around an open connection and mailer.
    pub fn build(
        db: Arc<DatabaseConnection>,
        mailer: Mailer,
        config: Arc<AppConfig>,
    ) -> Result<Self, ConfigError> {
        let scheduler = Arc::new(AlertScheduler::from_config(
            db.clone(),
            mailer.clone(),
            &config,
        )?);
        Ok(Self {
            assignment_hook: AssignmentHook::new(mailer.clone()),
            db,
            mailer,
            config,
            scheduler,
        })
    }
}
