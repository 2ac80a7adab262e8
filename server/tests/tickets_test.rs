//! Ticket state machine: cancellation and lookups.

mod common;

use common::{student, Harness};
use eventhub_server::models::{Caller, TicketCode, TicketStatus};
use eventhub_server::utils::error::AppError;
use uuid::Uuid;

#[tokio::test]
async fn test_cancel_before_use() {
    let h = Harness::new();
    let event = h.published_event(5).await;
    let alice = student();
    let code = h
        .state
        .registration
        .register(event.id, &alice)
        .await
        .unwrap()
        .ticket
        .code;

    let cancelled = h.state.tickets.cancel(&code, &h.organizer).await.unwrap();
    assert_eq!(cancelled.status, TicketStatus::Cancelled);
    assert_eq!(h.event(event.id).await.registered_count, 0);

    let err = h
        .state
        .verification
        .verify(&code, event.id, &h.organizer)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::TicketCancelled));

    let again = h.state.tickets.cancel(&code, &h.organizer).await.unwrap();
    assert_eq!(again, cancelled);
    // The repeat must not release a second seat.
    assert_eq!(h.event(event.id).await.registered_count, 0);
}

#[tokio::test]
async fn test_holder_can_cancel_own_ticket() {
    let h = Harness::new();
    let event = h.published_event(5).await;
    let alice = student();
    let code = h
        .state
        .registration
        .register(event.id, &alice)
        .await
        .unwrap()
        .ticket
        .code;

    let cancelled = h.state.tickets.cancel(&code, &alice).await.unwrap();
    assert_eq!(cancelled.status, TicketStatus::Cancelled);
}

#[tokio::test]
async fn test_used_ticket_cannot_be_cancelled() {
    let h = Harness::new();
    let event = h.published_event(5).await;
    let code = h
        .state
        .registration
        .register(event.id, &student())
        .await
        .unwrap()
        .ticket
        .code;
    h.state
        .verification
        .verify(&code, event.id, &h.organizer)
        .await
        .unwrap();

    let err = h.state.tickets.cancel(&code, &h.organizer).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition(_)));

    let ticket = h.state.tickets.get(&code, &h.organizer).await.unwrap();
    assert_eq!(ticket.status, TicketStatus::Used);
    assert_eq!(h.event(event.id).await.registered_count, 1);
}

#[tokio::test]
async fn test_strangers_cannot_touch_tickets() {
    let h = Harness::new();
    let event = h.published_event(5).await;
    let code = h
        .state
        .registration
        .register(event.id, &student())
        .await
        .unwrap()
        .ticket
        .code;

    let classmate = student();
    let other_organizer = Caller::organizer(Uuid::new_v4());
    for stranger in [&classmate, &other_organizer] {
        let err = h.state.tickets.cancel(&code, stranger).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        let err = h.state.tickets.get(&code, stranger).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }
}

#[tokio::test]
async fn test_cancel_unknown_ticket() {
    let h = Harness::new();
    let err = h
        .state
        .tickets
        .cancel(&TicketCode::from("TKT-MISSING000"), &h.organizer)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::TicketNotFound(_)));
}

#[tokio::test]
async fn test_list_my_tickets() {
    let h = Harness::new();
    let first = h.published_event(5).await;
    let second = h.published_event(5).await;
    let alice = student();

    h.state.registration.register(first.id, &alice).await.unwrap();
    h.state.registration.register(second.id, &alice).await.unwrap();
    h.state
        .registration
        .register(first.id, &student())
        .await
        .unwrap();

    let tickets = h.state.tickets.list_for(&alice).await.unwrap();
    assert_eq!(tickets.len(), 2);
    assert!(tickets.iter().all(|t| t.user_id == alice.id));
}
