//! Entry verification: at-most-once admission per ticket.

mod common;

use common::{student, Harness};
use eventhub_server::models::{Caller, TicketCode, TicketStatus};
use eventhub_server::store::{AttendanceLedger, TicketStore};
use eventhub_server::utils::error::AppError;
use futures::future::join_all;
use uuid::Uuid;

#[tokio::test]
async fn test_register_verify_and_rescan() {
    let h = Harness::new();
    let event = h.published_event(50).await;
    let alice = student();

    let registration = h.state.registration.register(event.id, &alice).await.unwrap();
    assert_eq!(h.event(event.id).await.registered_count, 1);

    let admission = h
        .state
        .verification
        .verify(&registration.ticket.code, event.id, &h.organizer)
        .await
        .unwrap();
    assert_eq!(admission.ticket.status, TicketStatus::Used);
    assert_eq!(admission.attendance.event_id, event.id);
    assert_eq!(admission.attendance.user_id, alice.id);
    assert_eq!(admission.attendance.ticket_code, registration.ticket.code);
    assert_eq!(admission.attendance.verified_by, h.organizer.id);
    let used_at = admission.ticket.used_at.unwrap();
    assert_eq!(admission.attendance.entered_at, used_at);

    let err = h
        .state
        .verification
        .verify(&registration.ticket.code, event.id, &h.organizer)
        .await
        .unwrap_err();
    match err {
        AppError::AlreadyUsed { used_at: reported } => assert_eq!(reported, used_at),
        other => panic!("expected AlreadyUsed, got {other:?}"),
    }

    let attendance = h.store.list_attendance(event.id).await.unwrap();
    assert_eq!(attendance.len(), 1);
}

#[tokio::test]
async fn test_unknown_code() {
    let h = Harness::new();
    let event = h.published_event(5).await;
    let err = h
        .state
        .verification
        .verify(&TicketCode::from("TKT-NOPE000000"), event.id, &h.organizer)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::TicketNotFound(_)));
}

#[tokio::test]
async fn test_ticket_for_another_event() {
    let h = Harness::new();
    let concert = h.published_event(5).await;
    let lecture = h.published_event(5).await;
    let registration = h
        .state
        .registration
        .register(concert.id, &student())
        .await
        .unwrap();

    let err = h
        .state
        .verification
        .verify(&registration.ticket.code, lecture.id, &h.organizer)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::WrongEvent));
}

#[tokio::test]
async fn test_only_owning_organizer_verifies() {
    let h = Harness::new();
    let event = h.published_event(5).await;
    let registration = h
        .state
        .registration
        .register(event.id, &student())
        .await
        .unwrap();

    let other_organizer = Caller::organizer(Uuid::new_v4());
    let err = h
        .state
        .verification
        .verify(&registration.ticket.code, event.id, &other_organizer)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    // A student cannot self-admit either.
    let holder = Caller::student(registration.ticket.user_id, None);
    let err = h
        .state
        .verification
        .verify(&registration.ticket.code, event.id, &holder)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let ticket = h
        .state
        .tickets
        .get(&registration.ticket.code, &h.organizer)
        .await
        .unwrap();
    assert_eq!(ticket.status, TicketStatus::Unused);
}

#[tokio::test]
async fn test_cancelled_ticket_is_refused() {
    let h = Harness::new();
    let event = h.published_event(5).await;
    let alice = student();
    let registration = h.state.registration.register(event.id, &alice).await.unwrap();
    h.state
        .tickets
        .cancel(&registration.ticket.code, &h.organizer)
        .await
        .unwrap();

    let err = h
        .state
        .verification
        .verify(&registration.ticket.code, event.id, &h.organizer)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::TicketCancelled));
    assert!(h.store.list_attendance(event.id).await.unwrap().is_empty());
}

/// Several door devices scan the same ticket at once.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_scans_admit_once() {
    let h = Harness::new();
    let event_id = h.published_event(5).await.id;
    let alice = student();
    let code = h
        .state
        .registration
        .register(event_id, &alice)
        .await
        .unwrap()
        .ticket
        .code;

    let scans = (0..20).map(|_| {
        let state = h.state.clone();
        let organizer = h.organizer.clone();
        let code = code.clone();
        tokio::spawn(async move { state.verification.verify(&code, event_id, &organizer).await })
    });
    let results: Vec<_> = join_all(scans)
        .await
        .into_iter()
        .map(|r| r.expect("task panicked"))
        .collect();

    let admitted: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(admitted.len(), 1);
    let used_at = admitted[0].ticket.used_at.unwrap();
    for result in results.iter().filter(|r| r.is_err()) {
        match result {
            Err(AppError::AlreadyUsed { used_at: reported }) => assert_eq!(*reported, used_at),
            other => panic!("expected AlreadyUsed, got {other:?}"),
        }
    }

    let attendance = h.store.list_attendance(event_id).await.unwrap();
    assert_eq!(attendance.len(), 1);
    assert_eq!(attendance[0].user_id, alice.id);
}

/// A cancel and a scan race; whichever lands first decides, never both.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_and_scan_race() {
    let h = Harness::new();
    let event_id = h.published_event(5).await.id;
    let alice = student();
    let code = h
        .state
        .registration
        .register(event_id, &alice)
        .await
        .unwrap()
        .ticket
        .code;

    let scan = {
        let state = h.state.clone();
        let organizer = h.organizer.clone();
        let code = code.clone();
        tokio::spawn(async move { state.verification.verify(&code, event_id, &organizer).await })
    };
    let cancel = {
        let state = h.state.clone();
        let holder = alice.clone();
        let code = code.clone();
        tokio::spawn(async move { state.tickets.cancel(&code, &holder).await })
    };
    let scan = scan.await.unwrap();
    let cancel = cancel.await.unwrap();

    let ticket = h.state.tickets.get(&code, &alice).await.unwrap();
    let attendance = h.store.list_attendance(event_id).await.unwrap();
    match ticket.status {
        TicketStatus::Used => {
            assert!(scan.is_ok());
            assert!(matches!(cancel, Err(AppError::InvalidTransition(_))));
            assert_eq!(attendance.len(), 1);
            assert_eq!(h.event(event_id).await.registered_count, 1);
        }
        TicketStatus::Cancelled => {
            assert!(cancel.is_ok());
            assert!(matches!(scan, Err(AppError::TicketCancelled)));
            assert!(attendance.is_empty());
            assert_eq!(h.event(event_id).await.registered_count, 0);
        }
        TicketStatus::Unused => panic!("one of the two operations must have applied"),
    }
}

#[tokio::test]
async fn test_failed_attendance_write_reverts_admission() {
    let (h, faults) = Harness::with_faults();
    let event = h.published_event(10).await;
    let alice = student();
    let registration = h.state.registration.register(event.id, &alice).await.unwrap();
    let code = registration.ticket.code;

    faults.fail_attendance_write(true);
    let err = h
        .state
        .verification
        .verify(&code, event.id, &h.organizer)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Store(_)));

    let ticket = h.store.get_ticket(&code).await.unwrap().unwrap();
    assert_eq!(ticket.status, TicketStatus::Unused);
    assert_eq!(ticket.used_at, None);
    assert!(h.store.list_attendance(event.id).await.unwrap().is_empty());

    faults.fail_attendance_write(false);
    let admission = h
        .state
        .verification
        .verify(&code, event.id, &h.organizer)
        .await
        .unwrap();
    assert_eq!(admission.ticket.status, TicketStatus::Used);
    assert_eq!(admission.attendance.user_id, alice.id);
    assert_eq!(h.store.list_attendance(event.id).await.unwrap().len(), 1);
}
