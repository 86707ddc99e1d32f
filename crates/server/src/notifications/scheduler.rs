//! Daily trigger and manual counterpart for dispatch runs.
//!
//! Both triggers end up in [`AlertScheduler::run_once`], which holds the
//! in-process overlap guard for the duration of the run.

use crate::config::{AppConfig, ConfigError};
use crate::error::RunError;
use crate::notifications::{
    AlertDispatcher, DateWindow, DispatchAbort, DispatchResult, DueAssignmentFinder, Mailer,
    NotificationKind, NotificationLedger,
};
use chrono::{DateTime, Datelike, Days, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use time::Date;
use tokio::task::JoinHandle;

pub struct AlertScheduler {
    finder: DueAssignmentFinder,
    dispatcher: AlertDispatcher,
    run_at: NaiveTime,
    timezone: Tz,
    lookahead_days: u32,
    running: AtomicBool,
}

/// Clears the running flag when the run ends, however it ends.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Stops the daily trigger loop. Runs already in flight finish on their own.
pub struct SchedulerHandle {
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn stop(self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl AlertScheduler {
    pub fn new(
        finder: DueAssignmentFinder,
        dispatcher: AlertDispatcher,
        run_at: NaiveTime,
        timezone: Tz,
        lookahead_days: u32,
    ) -> Self {
        Self {
            finder,
            dispatcher,
            run_at,
            timezone,
            lookahead_days,
            running: AtomicBool::new(false),
        }
    }

    pub fn from_config(
        db: Arc<DatabaseConnection>,
        mailer: Mailer,
        config: &AppConfig,
    ) -> Result<Self, ConfigError> {
        let scheduler = &config.scheduler;
        let timeout = config.database.statement_timeout();
        let ledger = NotificationLedger::new(db.clone(), timeout);
        Ok(Self::new(
            DueAssignmentFinder::new(db, timeout),
            AlertDispatcher::new(ledger, mailer, scheduler.max_concurrent_sends),
            scheduler.parsed_run_at()?,
            scheduler.parsed_timezone()?,
            scheduler.lookahead_days,
        ))
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Today's date in the configured timezone.
    pub fn today(&self) -> Date {
        local_date(Utc::now(), self.timezone)
    }

    /// `[today, today + lookahead_days]` in the configured timezone.
    pub fn standard_window(&self) -> DateWindow {
        DateWindow::looking_ahead(self.today(), self.lookahead_days)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn try_begin(&self) -> Option<RunGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard(&self.running))
    }

    /// One dispatch run over `window`: find, then dispatch event by event.
    ///
    /// Returns [`RunError::AlreadyRunning`] without doing anything if another
    /// run holds the guard.
    #[tracing::instrument(skip(self))]
    pub async fn run_once(&self, window: DateWindow) -> Result<DispatchResult, RunError> {
        let _guard = self.try_begin().ok_or(RunError::AlreadyRunning)?;

        let groups = self.finder.find_due_assignments(window).await?;
        let mut result = DispatchResult::default();

        for group in &groups {
            match self
                .dispatcher
                .dispatch_for_event(group, NotificationKind::WeeklyAlert)
                .await
            {
                Ok(outcome) => result.absorb(&outcome),
                Err(DispatchAbort { outcome, source }) => {
                    result.absorb(&outcome);
                    tracing::error!(
                        name = "notifications.scheduler.run_aborted",
                        target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                        event_id = outcome.event_id,
                        error = %source,
                        events_processed = result.events_processed,
                        events_remaining = groups.len() - result.events_processed,
                        message = "Ledger unavailable, aborting dispatch run"
                    );
                    return Err(RunError::LedgerUnavailable {
                        source,
                        partial: result,
                    });
                }
            }
        }

        tracing::info!(
            name = "notifications.scheduler.run_completed",
            target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
            window_start = %window.start,
            window_end = %window.end,
            events_processed = result.events_processed,
            sent = result.notifications_sent,
            skipped = result.notifications_skipped,
            failed = result.notifications_failed,
            message = "Dispatch run finished"
        );
        Ok(result)
    }

    /// Operator-triggered run over the standard window.
    pub async fn run_manually(&self) -> Result<DispatchResult, RunError> {
        self.run_once(self.standard_window()).await
    }

    async fn scheduled_run(&self) {
        match self.run_once(self.standard_window()).await {
            Ok(_) => {}
            Err(RunError::AlreadyRunning) => {
                tracing::warn!(
                    name = "notifications.scheduler.firing_skipped",
                    target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                    message = "Previous run still in progress, skipping scheduled firing"
                );
            }
            Err(e) => {
                tracing::error!(
                    name = "notifications.scheduler.run_failed",
                    target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                    error = %e,
                    message = "Scheduled dispatch run failed"
                );
            }
        }
    }

    /// Arms the daily trigger at `run_at` local time.
    ///
    /// Each firing is spawned separately, so a slow run never delays the
    /// timer; the overlap guard decides whether the firing does anything.
    pub fn start(self: &Arc<Self>) -> SchedulerHandle {
        let scheduler = Arc::clone(self);
        let task = tokio::spawn(async move {
            let mut after = Utc::now();
            loop {
                let now = Utc::now();
                let next = next_fire_after(after.max(now), scheduler.run_at, scheduler.timezone);
                tracing::info!(
                    name = "notifications.scheduler.next_run",
                    target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                    next_run = %next.with_timezone(&scheduler.timezone),
                    message = "Next dispatch run scheduled"
                );

                tokio::time::sleep((next - now).to_std().unwrap_or_default()).await;
                after = next;

                let runner = Arc::clone(&scheduler);
                tokio::spawn(async move { runner.scheduled_run().await });
            }
        });
        SchedulerHandle { task }
    }
}

/// The first instant strictly after `now` at which the wall clock in `tz`
/// reads `at`.
///
/// A time skipped by a DST jump fires one hour later that day; a time that
/// occurs twice fires on the first occurrence.
pub fn next_fire_after(now: DateTime<Utc>, at: NaiveTime, tz: Tz) -> DateTime<Utc> {
    let today = now.with_timezone(&tz).date_naive();
    for offset in 0..3 {
        let Some(date) = today.checked_add_days(Days::new(offset)) else {
            break;
        };
        if let Some(candidate) = resolve_local(tz, date.and_time(at)) {
            if candidate > now {
                return candidate;
            }
        }
    }
    now + TimeDelta::days(1)
}

fn resolve_local(tz: Tz, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&local)
        .earliest()
        .or_else(|| {
            tz.from_local_datetime(&(local + TimeDelta::hours(1)))
                .earliest()
        })
        .map(|dt| dt.with_timezone(&Utc))
}

/// Calendar date of `now` as seen in `tz`.
pub fn local_date(now: DateTime<Utc>, tz: Tz) -> Date {
    let local = now.with_timezone(&tz).date_naive();
    u16::try_from(local.ordinal())
        .ok()
        .and_then(|ordinal| Date::from_ordinal_date(local.year(), ordinal).ok())
        .unwrap_or(Date::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn nine() -> NaiveTime {
        NaiveTime::from_hms_opt(9, 0, 0).unwrap()
    }

    #[test]
    fn fires_later_the_same_day() {
        let next = next_fire_after(utc("2026-10-14T13:00:00Z"), nine(), chrono_tz::America::Bogota);
        assert_eq!(next, utc("2026-10-14T14:00:00Z"));
    }

    #[test]
    fn exact_firing_instant_rolls_to_next_day() {
        let next = next_fire_after(utc("2026-10-14T14:00:00Z"), nine(), chrono_tz::America::Bogota);
        assert_eq!(next, utc("2026-10-15T14:00:00Z"));
    }

    #[test]
    fn local_day_differs_from_utc_day() {
        // 02:00 UTC on the 15th is still the evening of the 14th in Bogota.
        let next = next_fire_after(utc("2026-10-15T02:00:00Z"), nine(), chrono_tz::America::Bogota);
        assert_eq!(next, utc("2026-10-15T14:00:00Z"));
    }

    #[test]
    fn time_skipped_by_dst_fires_an_hour_later() {
        let at = NaiveTime::from_hms_opt(2, 30, 0).unwrap();
        let next = next_fire_after(utc("2026-03-08T05:00:00Z"), at, chrono_tz::America::New_York);
        assert_eq!(next, utc("2026-03-08T07:30:00Z"));
    }

    #[test]
    fn repeated_time_fires_on_first_occurrence() {
        let at = NaiveTime::from_hms_opt(1, 30, 0).unwrap();
        let next = next_fire_after(utc("2026-11-01T04:00:00Z"), at, chrono_tz::America::New_York);
        assert_eq!(next, utc("2026-11-01T05:30:00Z"));
    }

    #[test]
    fn today_follows_the_configured_timezone() {
        let now = utc("2026-10-15T03:00:00Z");
        assert_eq!(local_date(now, chrono_tz::America::Bogota), date!(2026 - 10 - 14));
        assert_eq!(local_date(now, chrono_tz::UTC), date!(2026 - 10 - 15));
    }
}
