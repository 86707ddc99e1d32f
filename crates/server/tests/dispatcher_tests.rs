//! Alert dispatcher tests: isolation, skip filter and ledger failures.

mod common;

use common::{RecordingTransport, create_test_db, mailer_with};
use onboarding_alerts::notifications::{
    AlertDispatcher, DueEvent, EventGroup, NotificationKind, NotificationLedger, Recipient,
};
use sea_orm::ConnectionTrait;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use time::macros::date;

fn group(recipients: &[(i32, &str)]) -> EventGroup {
    EventGroup {
        event: DueEvent {
            id: 42,
            name: "Onboarding Técnico".into(),
            kind: "technical".into(),
            description: None,
            start_date: date!(2026 - 10 - 20),
            end_date: date!(2026 - 10 - 21),
        },
        recipients: recipients
            .iter()
            .map(|(id, email)| Recipient {
                collaborator_id: *id,
                full_name: format!("Colaborador {id}"),
                email: email.to_string(),
            })
            .collect(),
    }
}

fn five() -> EventGroup {
    group(&[
        (1, "uno@example.com"),
        (2, "dos@example.com"),
        (3, "tres@example.com"),
        (4, "cuatro@example.com"),
        (5, "cinco@example.com"),
    ])
}

#[tokio::test]
async fn one_failing_recipient_does_not_affect_the_others() {
    let db = create_test_db().await;
    let ledger = NotificationLedger::new(db.clone(), Duration::from_secs(5));
    let transport = Arc::new(RecordingTransport::failing_for(&["tres@example.com"]));
    let dispatcher = AlertDispatcher::new(
        ledger.clone(),
        mailer_with(transport.clone(), Duration::from_secs(5)),
        5,
    );

    let outcome = dispatcher
        .dispatch_for_event(&five(), NotificationKind::WeeklyAlert)
        .await
        .unwrap();

    assert_eq!(outcome.sent, 4);
    assert_eq!(outcome.failed, 1);
    assert_eq!(outcome.skipped, 0);
    assert_eq!(transport.sent_count(), 4);

    // The failed recipient has no ledger entry and is retried next time.
    assert!(!ledger.already_sent(42, 3, NotificationKind::WeeklyAlert).await.unwrap());
    assert!(ledger.already_sent(42, 1, NotificationKind::WeeklyAlert).await.unwrap());
}

#[tokio::test]
async fn timeout_is_a_local_failure() {
    let db = create_test_db().await;
    let ledger = NotificationLedger::new(db.clone(), Duration::from_secs(5));
    let transport = Arc::new(RecordingTransport::slow(Duration::from_millis(300)));
    let dispatcher = AlertDispatcher::new(
        ledger.clone(),
        mailer_with(transport.clone(), Duration::from_millis(50)),
        5,
    );

    let outcome = dispatcher
        .dispatch_for_event(&group(&[(1, "uno@example.com")]), NotificationKind::WeeklyAlert)
        .await
        .unwrap();

    assert_eq!(outcome.sent, 0);
    assert_eq!(outcome.failed, 1);
    assert!(!ledger.already_sent(42, 1, NotificationKind::WeeklyAlert).await.unwrap());
}

#[tokio::test]
async fn already_notified_recipients_are_skipped() {
    let db = create_test_db().await;
    let ledger = NotificationLedger::new(db.clone(), Duration::from_secs(5));
    ledger.record_sent(42, 1, NotificationKind::WeeklyAlert).await.unwrap();
    ledger.record_sent(42, 2, NotificationKind::WeeklyAlert).await.unwrap();

    let transport = Arc::new(RecordingTransport::default());
    let dispatcher = AlertDispatcher::new(
        ledger,
        mailer_with(transport.clone(), Duration::from_secs(5)),
        5,
    );

    let outcome = dispatcher
        .dispatch_for_event(&five(), NotificationKind::WeeklyAlert)
        .await
        .unwrap();

    assert_eq!(outcome.skipped, 2);
    assert_eq!(outcome.sent, 3);
    assert_eq!(
        transport.sent_to(),
        vec!["cinco@example.com", "cuatro@example.com", "tres@example.com"]
    );
}

#[tokio::test]
async fn nothing_left_after_skip_filter_sends_nothing() {
    let db = create_test_db().await;
    let ledger = NotificationLedger::new(db.clone(), Duration::from_secs(5));
    ledger.record_sent(42, 1, NotificationKind::WeeklyAlert).await.unwrap();

    let transport = Arc::new(RecordingTransport::default());
    let dispatcher = AlertDispatcher::new(
        ledger,
        mailer_with(transport.clone(), Duration::from_secs(5)),
        5,
    );

    let outcome = dispatcher
        .dispatch_for_event(&group(&[(1, "uno@example.com")]), NotificationKind::WeeklyAlert)
        .await
        .unwrap();

    assert_eq!((outcome.sent, outcome.skipped, outcome.failed), (0, 1, 0));
    assert_eq!(transport.sent_count(), 0);
}

#[tokio::test]
async fn missing_email_counts_as_failed() {
    let db = create_test_db().await;
    let ledger = NotificationLedger::new(db.clone(), Duration::from_secs(5));
    let transport = Arc::new(RecordingTransport::default());
    let dispatcher = AlertDispatcher::new(
        ledger,
        mailer_with(transport.clone(), Duration::from_secs(5)),
        5,
    );

    let outcome = dispatcher
        .dispatch_for_event(
            &group(&[(1, "uno@example.com"), (2, "  ")]),
            NotificationKind::WeeklyAlert,
        )
        .await
        .unwrap();

    assert_eq!(outcome.sent, 1);
    assert_eq!(outcome.failed, 1);
    assert_eq!(transport.sent_to(), vec!["uno@example.com"]);
}

#[tokio::test]
async fn concurrency_stays_within_the_bound() {
    let db = create_test_db().await;
    let ledger = NotificationLedger::new(db.clone(), Duration::from_secs(5));
    let transport = Arc::new(RecordingTransport::slow(Duration::from_millis(30)));
    let dispatcher = AlertDispatcher::new(
        ledger,
        mailer_with(transport.clone(), Duration::from_secs(5)),
        2,
    );

    let outcome = dispatcher
        .dispatch_for_event(&five(), NotificationKind::WeeklyAlert)
        .await
        .unwrap();

    assert_eq!(outcome.sent, 5);
    assert!(transport.max_in_flight.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn ledger_outage_aborts_the_event() {
    let db = create_test_db().await;
    db.execute_unprepared("DROP TABLE notification_ledger")
        .await
        .unwrap();
    let ledger = NotificationLedger::new(db.clone(), Duration::from_secs(5));
    let transport = Arc::new(RecordingTransport::default());
    let dispatcher = AlertDispatcher::new(
        ledger,
        mailer_with(transport.clone(), Duration::from_secs(5)),
        5,
    );

    let abort = dispatcher
        .dispatch_for_event(&five(), NotificationKind::WeeklyAlert)
        .await
        .unwrap_err();

    assert_eq!(abort.outcome.event_id, 42);
    assert_eq!(abort.outcome.failed, 5);
    assert_eq!(abort.outcome.sent, 0);
    assert_eq!(transport.sent_count(), 0);
}

#[tokio::test]
async fn record_failure_after_send_counts_failed() {
    let db = create_test_db().await;
    db.execute_unprepared(
        "CREATE TRIGGER reject_ledger_writes BEFORE INSERT ON notification_ledger \
         BEGIN SELECT RAISE(ABORT, 'ledger is read-only'); END",
    )
    .await
    .unwrap();
    let ledger = NotificationLedger::new(db.clone(), Duration::from_secs(5));
    let transport = Arc::new(RecordingTransport::default());
    let dispatcher = AlertDispatcher::new(
        ledger.clone(),
        mailer_with(transport.clone(), Duration::from_secs(5)),
        5,
    );
    let group = group(&[(1, "uno@example.com"), (2, "dos@example.com")]);

    let abort = dispatcher
        .dispatch_for_event(&group, NotificationKind::WeeklyAlert)
        .await
        .unwrap_err();

    // Both emails went out before the ledger refused the writes.
    assert_eq!(transport.sent_count(), 2);
    assert_eq!(abort.outcome.sent, 0);
    assert_eq!(abort.outcome.skipped, 0);
    assert_eq!(abort.outcome.failed, 2);
    assert!(
        !ledger
            .already_sent(42, 1, NotificationKind::WeeklyAlert)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn dispatch_can_run_on_a_spawned_task() {
    let db = create_test_db().await;
    let ledger = NotificationLedger::new(db.clone(), Duration::from_secs(5));
    let transport = Arc::new(RecordingTransport::default());
    let dispatcher = AlertDispatcher::new(
        ledger,
        mailer_with(transport.clone(), Duration::from_secs(5)),
        2,
    );

    let outcome = tokio::spawn(async move {
        dispatcher
            .dispatch_for_event(&five(), NotificationKind::WeeklyAlert)
            .await
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(outcome.sent, 5);
    assert_eq!(transport.sent_count(), 5);
}
