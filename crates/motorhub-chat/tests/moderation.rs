mod common;

use std::sync::Arc;

use common::{BrokenReports, Harness};
use motorhub_chat::ChatError;
use motorhub_types::{Participant, ThreadKey};

#[tokio::test]
async fn test_report_freezes_last_five_messages() {
    let h = Harness::new().await;
    let (buyer, seller) = (Participant::user("A"), Participant::user("B"));
    let thread = ThreadKey::direct("B", "car42", "A").unwrap();

    for i in 0..7 {
        let body = format!("message {}", i);
        let from = if i % 2 == 0 { &seller } else { &buyer };
        h.coordinator.send_text(&thread, from, &body).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }

    let report = h
        .reports
        .report(&buyer, &seller, &thread, Some("rude replies".into()))
        .await
        .unwrap();
    let bodies: Vec<_> = report.messages.iter().map(|m| m.content.clone().unwrap()).collect();
    assert_eq!(bodies, (2..7).map(|i| format!("message {}", i)).collect::<Vec<_>>());

    // Later edits of the live thread leave the filed report alone
    h.coordinator.clear_thread(&thread, &buyer).await.unwrap();
    h.coordinator.clear_thread(&thread, &seller).await.unwrap();
    let stored = h.reports.get(report.id).await.unwrap();
    assert_eq!(stored.messages, report.messages);
    assert!(stored.messages.iter().all(|m| m.deleted_for.is_empty()));

    h.reports.mark_revised(report.id).await.unwrap();
    let revised = h.reports.get(report.id).await.unwrap();
    assert!(revised.revised);
    assert_eq!(revised.messages, report.messages);
    assert_eq!(h.reports.list().await.unwrap().len(), 1);
    h.cleanup().await;
}

#[tokio::test]
async fn test_report_requires_membership_and_a_counterpart() {
    let h = Harness::new().await;
    let thread = ThreadKey::direct("B", "car42", "A").unwrap();

    assert!(matches!(
        h.reports.report(&Participant::user("Z"), &Participant::user("B"), &thread, None).await,
        Err(ChatError::PermissionDenied(_))
    ));
    assert!(matches!(
        h.reports.report(&Participant::user("A"), &Participant::user("A"), &thread, None).await,
        Err(ChatError::InvalidInput(_))
    ));
    assert!(matches!(
        h.reports.mark_revised(uuid::Uuid::new_v4()).await,
        Err(ChatError::NotFound { .. })
    ));
    h.cleanup().await;
}

#[tokio::test]
async fn test_report_write_failure_is_counted_not_raised() {
    let h = Harness::with_report_repo(Arc::new(BrokenReports)).await;
    let thread = ThreadKey::direct("B", "car42", "A").unwrap();
    h.coordinator
        .send_text(&thread, &Participant::user("B"), "spam link")
        .await
        .unwrap();

    let report = h
        .reports
        .report(&Participant::user("A"), &Participant::user("B"), &thread, None)
        .await
        .unwrap();
    assert_eq!(report.messages.len(), 1);

    let stats = h.stats.snapshot();
    assert_eq!((stats.reports_filed, stats.report_write_failures), (0, 1));
    h.cleanup().await;
}
