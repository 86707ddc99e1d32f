//! Due-assignment finder tests.

mod common;

use common::{assign, create_test_db, insert_collaborator, insert_event};
use onboarding_alerts::notifications::{DateWindow, DueAssignmentFinder};
use std::time::Duration;
use time::macros::date;

fn window() -> DateWindow {
    DateWindow::looking_ahead(date!(2026 - 10 - 14), 7)
}

#[tokio::test]
async fn window_edges_are_inclusive() {
    let db = create_test_db().await;
    insert_collaborator(&db, 1, "Ana", "ana@example.com").await;
    insert_event(&db, 1, "Hoy", date!(2026 - 10 - 14), true).await;
    insert_event(&db, 2, "Último día", date!(2026 - 10 - 21), true).await;
    insert_event(&db, 3, "Fuera", date!(2026 - 10 - 22), true).await;
    insert_event(&db, 4, "Pasado", date!(2026 - 10 - 13), true).await;
    for event in 1..=4 {
        assign(&db, 1, event, false).await;
    }

    let finder = DueAssignmentFinder::new(db.clone(), Duration::from_secs(5));
    let groups = finder.find_due_assignments(window()).await.unwrap();

    let ids: Vec<i32> = groups.iter().map(|g| g.event.id).collect();
    assert_eq!(ids, vec![1, 2]);
}

#[tokio::test]
async fn completed_and_inactive_are_excluded() {
    let db = create_test_db().await;
    insert_collaborator(&db, 1, "Ana", "ana@example.com").await;
    insert_collaborator(&db, 2, "Bruno", "bruno@example.com").await;
    insert_event(&db, 1, "Activo", date!(2026 - 10 - 16), true).await;
    insert_event(&db, 2, "Inactivo", date!(2026 - 10 - 16), false).await;
    assign(&db, 1, 1, false).await;
    assign(&db, 2, 1, true).await;
    assign(&db, 1, 2, false).await;

    let finder = DueAssignmentFinder::new(db.clone(), Duration::from_secs(5));
    let groups = finder.find_due_assignments(window()).await.unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].event.id, 1);
    assert_eq!(groups[0].recipients.len(), 1);
    assert_eq!(groups[0].recipients[0].collaborator_id, 1);
}

#[tokio::test]
async fn recipients_are_grouped_under_their_event() {
    let db = create_test_db().await;
    insert_collaborator(&db, 1, "Carla", "carla@example.com").await;
    insert_collaborator(&db, 2, "Ana", "ana@example.com").await;
    insert_event(&db, 1, "Técnico", date!(2026 - 10 - 18), true).await;
    insert_event(&db, 2, "Bienvenida", date!(2026 - 10 - 15), true).await;
    assign(&db, 1, 1, false).await;
    assign(&db, 2, 1, false).await;
    assign(&db, 2, 2, false).await;

    let finder = DueAssignmentFinder::new(db.clone(), Duration::from_secs(5));
    let groups = finder.find_due_assignments(window()).await.unwrap();

    assert_eq!(groups.len(), 2);
    // Earliest start first.
    assert_eq!(groups[0].event.name, "Bienvenida");
    assert_eq!(groups[1].event.name, "Técnico");
    let names: Vec<&str> = groups[1]
        .recipients
        .iter()
        .map(|r| r.full_name.as_str())
        .collect();
    assert_eq!(names, vec!["Ana", "Carla"]);
    assert_eq!(groups[1].event.description.as_deref(), Some("Sesión introductoria"));
}

#[tokio::test]
async fn nothing_due_returns_empty() {
    let db = create_test_db().await;
    let finder = DueAssignmentFinder::new(db.clone(), Duration::from_secs(5));
    assert!(finder.find_due_assignments(window()).await.unwrap().is_empty());
}
