pub mod assignment;
pub mod collaborator;
pub mod notification_ledger;
pub mod onboarding_event;
