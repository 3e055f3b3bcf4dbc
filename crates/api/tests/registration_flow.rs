//! Integration tests for the registration ledger: weighted capacity,
//! supervisor token resolution and the approval expiry sweep.

mod common;

use chrono::{Duration, Utc};
use domain::models::{ApprovalDecision, ApprovalStatus, Degree, RegisterOutcome};
use domain::ServiceError;
use persistence::repositories::RegistrationRepository;
use uuid::Uuid;

#[tokio::test]
async fn test_register_with_free_capacity() {
    let Some(pool) = common::try_test_pool().await else {
        return;
    };
    let config = common::test_config("unused");
    let services = common::registry(pool.clone(), config);

    let slot = common::create_slot(&pool, 4).await;
    let presenter = common::unique_presenter("reg");

    let outcome = services
        .registrations
        .register(
            slot.id,
            common::register_request(&presenter, Degree::Msc),
            true,
        )
        .await
        .unwrap();

    let registration_id = match outcome {
        RegisterOutcome::Registered { registration_id } => registration_id,
        other => panic!("Expected Registered, got {:?}", other),
    };

    let registration = services
        .registrations
        .find(registration_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(registration.approval_status, ApprovalStatus::Pending);
    assert_eq!(registration.presenter_username, presenter);
    assert!(registration.approval_token_expires_at > Utc::now());
}

#[tokio::test]
async fn test_weighted_capacity_fills_then_waitlists() {
    let Some(pool) = common::try_test_pool().await else {
        return;
    };
    let config = common::test_config("unused");
    let services = common::registry(pool.clone(), config);

    // Capacity 4: one PhD (weight 2) plus two MSc (weight 1 each) fill it.
    let slot = common::create_slot(&pool, 4).await;

    let phd = common::unique_presenter("phd");
    let outcome = services
        .registrations
        .register(slot.id, common::register_request(&phd, Degree::Phd), true)
        .await
        .unwrap();
    assert!(matches!(outcome, RegisterOutcome::Registered { .. }));

    for i in 0..2 {
        let msc = common::unique_presenter(&format!("msc{}", i));
        let outcome = services
            .registrations
            .register(slot.id, common::register_request(&msc, Degree::Msc), true)
            .await
            .unwrap();
        assert!(matches!(outcome, RegisterOutcome::Registered { .. }));
    }

    assert_eq!(services.capacity.available(slot.id).await.unwrap(), 0);
    assert!(services.capacity.is_full(slot.id).await.unwrap());

    let late = common::unique_presenter("late");
    let outcome = services
        .registrations
        .register(slot.id, common::register_request(&late, Degree::Msc), true)
        .await
        .unwrap();
    assert!(matches!(outcome, RegisterOutcome::Waitlisted { position: 1 }));
}

#[tokio::test]
async fn test_full_slot_without_waitlist_fallback() {
    let Some(pool) = common::try_test_pool().await else {
        return;
    };
    let config = common::test_config("unused");
    let services = common::registry(pool.clone(), config);

    let slot = common::create_slot(&pool, 1).await;
    let first = common::unique_presenter("first");
    services
        .registrations
        .register(slot.id, common::register_request(&first, Degree::Msc), true)
        .await
        .unwrap();

    let second = common::unique_presenter("second");
    let result = services
        .registrations
        .register(
            slot.id,
            common::register_request(&second, Degree::Msc),
            false,
        )
        .await;
    assert!(matches!(result, Err(ServiceError::SlotFull)));
}

#[tokio::test]
async fn test_phd_needs_two_free_seats() {
    let Some(pool) = common::try_test_pool().await else {
        return;
    };
    let config = common::test_config("unused");
    let services = common::registry(pool.clone(), config);

    // Capacity 3 with one PhD leaves one seat, not enough for another PhD.
    let slot = common::create_slot(&pool, 3).await;
    let first = common::unique_presenter("phd-a");
    services
        .registrations
        .register(slot.id, common::register_request(&first, Degree::Phd), true)
        .await
        .unwrap();

    let second = common::unique_presenter("phd-b");
    let result = services
        .registrations
        .register(
            slot.id,
            common::register_request(&second, Degree::Phd),
            false,
        )
        .await;
    assert!(matches!(result, Err(ServiceError::SlotFull)));

    // An MSc still fits in the remaining seat.
    let msc = common::unique_presenter("msc");
    let outcome = services
        .registrations
        .register(slot.id, common::register_request(&msc, Degree::Msc), false)
        .await
        .unwrap();
    assert!(matches!(outcome, RegisterOutcome::Registered { .. }));
}

#[tokio::test]
async fn test_duplicate_registration_rejected() {
    let Some(pool) = common::try_test_pool().await else {
        return;
    };
    let config = common::test_config("unused");
    let services = common::registry(pool.clone(), config);

    let slot = common::create_slot(&pool, 4).await;
    let presenter = common::unique_presenter("dup");
    services
        .registrations
        .register(
            slot.id,
            common::register_request(&presenter, Degree::Msc),
            true,
        )
        .await
        .unwrap();

    let result = services
        .registrations
        .register(
            slot.id,
            common::register_request(&presenter, Degree::Msc),
            true,
        )
        .await;
    assert!(matches!(result, Err(ServiceError::DuplicateRegistration)));

    // Single active registration policy applies across slots too.
    let other_slot = common::create_slot(&pool, 4).await;
    let result = services
        .registrations
        .register(
            other_slot.id,
            common::register_request(&presenter, Degree::Msc),
            true,
        )
        .await;
    assert!(matches!(result, Err(ServiceError::DuplicateRegistration)));
}

#[tokio::test]
async fn test_invalid_request_rejected() {
    let Some(pool) = common::try_test_pool().await else {
        return;
    };
    let config = common::test_config("unused");
    let services = common::registry(pool.clone(), config);

    let slot = common::create_slot(&pool, 4).await;
    let mut request = common::register_request(&common::unique_presenter("bad"), Degree::Msc);
    request.supervisor_email = "not-an-email".to_string();

    let result = services.registrations.register(slot.id, request, true).await;
    assert!(matches!(result, Err(ServiceError::Validation(_))));
}

#[tokio::test]
async fn test_unknown_slot() {
    let Some(pool) = common::try_test_pool().await else {
        return;
    };
    let config = common::test_config("unused");
    let services = common::registry(pool.clone(), config);

    let result = services
        .registrations
        .register(
            Uuid::new_v4(),
            common::register_request(&common::unique_presenter("ghost"), Degree::Msc),
            true,
        )
        .await;
    assert!(matches!(result, Err(ServiceError::SlotNotFound)));
}

#[tokio::test]
async fn test_concurrent_registrations_for_last_seat() {
    let Some(pool) = common::try_test_pool().await else {
        return;
    };
    let config = common::test_config("unused");
    let services = common::registry(pool.clone(), config);

    let slot = common::create_slot(&pool, 1).await;
    let first = common::unique_presenter("race-a");
    let second = common::unique_presenter("race-b");

    let a = services.registrations.register(
        slot.id,
        common::register_request(&first, Degree::Msc),
        false,
    );
    let b = services.registrations.register(
        slot.id,
        common::register_request(&second, Degree::Msc),
        false,
    );
    let (result_a, result_b) = tokio::join!(a, b);

    // The slot lock serializes the two attempts: exactly one wins.
    let registered = [&result_a, &result_b]
        .iter()
        .filter(|r| matches!(r, Ok(RegisterOutcome::Registered { .. })))
        .count();
    let full = [&result_a, &result_b]
        .iter()
        .filter(|r| matches!(r, Err(ServiceError::SlotFull)))
        .count();
    assert_eq!(registered, 1);
    assert_eq!(full, 1);
}

#[tokio::test]
async fn test_approval_token_resolution_is_idempotent() {
    let Some(pool) = common::try_test_pool().await else {
        return;
    };
    let config = common::test_config("unused");
    let services = common::registry(pool.clone(), config);
    let registrations = RegistrationRepository::new(pool.clone());

    let slot = common::create_slot(&pool, 4).await;
    let presenter = common::unique_presenter("approve");
    let outcome = services
        .registrations
        .register(
            slot.id,
            common::register_request(&presenter, Degree::Msc),
            true,
        )
        .await
        .unwrap();
    let registration_id = match outcome {
        RegisterOutcome::Registered { registration_id } => registration_id,
        other => panic!("Expected Registered, got {:?}", other),
    };

    let token = registrations
        .find_by_id(registration_id)
        .await
        .unwrap()
        .unwrap()
        .approval_token;

    let resolved = services
        .registrations
        .resolve_by_token(&token, ApprovalDecision::Approve)
        .await
        .unwrap();
    assert_eq!(resolved.approval_status, ApprovalStatus::Approved);

    // Repeated clicks map to a stable outcome, not a lookup miss.
    let again = services
        .registrations
        .resolve_by_token(&token, ApprovalDecision::Approve)
        .await;
    assert!(matches!(again, Err(ServiceError::AlreadyResolved)));

    let flipped = services
        .registrations
        .resolve_by_token(&token, ApprovalDecision::Decline)
        .await;
    assert!(matches!(flipped, Err(ServiceError::AlreadyResolved)));

    let missing = services
        .registrations
        .resolve_by_token("no-such-token", ApprovalDecision::Approve)
        .await;
    assert!(matches!(missing, Err(ServiceError::TokenNotFound)));
}

#[tokio::test]
async fn test_expired_token_rejected_and_row_expired() {
    let Some(pool) = common::try_test_pool().await else {
        return;
    };
    let config = common::test_config("unused");
    let services = common::registry(pool.clone(), config);
    let registrations = RegistrationRepository::new(pool.clone());

    let slot = common::create_slot(&pool, 4).await;
    let presenter = common::unique_presenter("stale");
    let outcome = services
        .registrations
        .register(
            slot.id,
            common::register_request(&presenter, Degree::Msc),
            true,
        )
        .await
        .unwrap();
    let registration_id = match outcome {
        RegisterOutcome::Registered { registration_id } => registration_id,
        other => panic!("Expected Registered, got {:?}", other),
    };

    sqlx::query("UPDATE slot_registrations SET approval_token_expires_at = $2 WHERE id = $1")
        .bind(registration_id)
        .bind(Utc::now() - Duration::hours(1))
        .execute(&pool)
        .await
        .unwrap();

    let token = registrations
        .find_by_id(registration_id)
        .await
        .unwrap()
        .unwrap()
        .approval_token;

    let result = services
        .registrations
        .resolve_by_token(&token, ApprovalDecision::Approve)
        .await;
    assert!(matches!(result, Err(ServiceError::TokenExpired)));

    let registration = services
        .registrations
        .find(registration_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(registration.approval_status, ApprovalStatus::Expired);
}

#[tokio::test]
async fn test_expiry_sweep_frees_seat_for_waiting_list() {
    let Some(pool) = common::try_test_pool().await else {
        return;
    };
    let config = common::test_config("unused");
    let services = common::registry(pool.clone(), config);

    let slot = common::create_slot(&pool, 1).await;
    let holder = common::unique_presenter("holder");
    let outcome = services
        .registrations
        .register(slot.id, common::register_request(&holder, Degree::Msc), true)
        .await
        .unwrap();
    let registration_id = match outcome {
        RegisterOutcome::Registered { registration_id } => registration_id,
        other => panic!("Expected Registered, got {:?}", other),
    };

    let waiter = common::unique_presenter("waiter");
    let outcome = services
        .registrations
        .register(slot.id, common::register_request(&waiter, Degree::Msc), true)
        .await
        .unwrap();
    assert!(matches!(outcome, RegisterOutcome::Waitlisted { position: 1 }));

    sqlx::query("UPDATE slot_registrations SET approval_token_expires_at = $2 WHERE id = $1")
        .bind(registration_id)
        .bind(Utc::now() - Duration::minutes(1))
        .execute(&pool)
        .await
        .unwrap();

    let expired = services.registrations.expire_due().await.unwrap();
    assert!(expired >= 1);

    let registration = services
        .registrations
        .find(registration_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(registration.approval_status, ApprovalStatus::Expired);

    // The freed seat went to the waiter as a promotion offer.
    let token: Option<String> = sqlx::query_scalar(
        "SELECT promotion_token FROM waiting_list_entries \
         WHERE slot_id = $1 AND presenter_username = $2",
    )
    .bind(slot.id)
    .bind(&waiter)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert!(token.is_some());
}

#[tokio::test]
async fn test_decline_frees_seat_and_offer_can_be_accepted() {
    let Some(pool) = common::try_test_pool().await else {
        return;
    };
    let config = common::test_config("unused");
    let services = common::registry(pool.clone(), config);
    let registrations = RegistrationRepository::new(pool.clone());

    let slot = common::create_slot(&pool, 1).await;
    let holder = common::unique_presenter("holder");
    let outcome = services
        .registrations
        .register(slot.id, common::register_request(&holder, Degree::Msc), true)
        .await
        .unwrap();
    let registration_id = match outcome {
        RegisterOutcome::Registered { registration_id } => registration_id,
        other => panic!("Expected Registered, got {:?}", other),
    };

    let waiter = common::unique_presenter("waiter");
    services
        .registrations
        .register(slot.id, common::register_request(&waiter, Degree::Msc), true)
        .await
        .unwrap();

    let token = registrations
        .find_by_id(registration_id)
        .await
        .unwrap()
        .unwrap()
        .approval_token;
    services
        .registrations
        .resolve_by_token(&token, ApprovalDecision::Decline)
        .await
        .unwrap();

    let offer_token: Option<String> = sqlx::query_scalar(
        "SELECT promotion_token FROM waiting_list_entries \
         WHERE slot_id = $1 AND presenter_username = $2",
    )
    .bind(slot.id)
    .bind(&waiter)
    .fetch_one(&pool)
    .await
    .unwrap();
    let offer_token = offer_token.expect("Declined seat should trigger a promotion offer");

    // Default policy auto-approves promoted registrations.
    let promoted = services.waiting_list.accept_offer(&offer_token).await.unwrap();
    assert_eq!(promoted.presenter_username, waiter);
    assert_eq!(promoted.approval_status, ApprovalStatus::Approved);

    let still_waiting = services
        .waiting_list
        .position(slot.id, &waiter)
        .await
        .unwrap();
    assert_eq!(still_waiting, None);
}

#[tokio::test]
async fn test_cancel_frees_seat() {
    let Some(pool) = common::try_test_pool().await else {
        return;
    };
    let config = common::test_config("unused");
    let services = common::registry(pool.clone(), config);

    let slot = common::create_slot(&pool, 1).await;
    let presenter = common::unique_presenter("cancel");
    services
        .registrations
        .register(
            slot.id,
            common::register_request(&presenter, Degree::Msc),
            true,
        )
        .await
        .unwrap();

    services
        .registrations
        .cancel(slot.id, &presenter)
        .await
        .unwrap();

    let again = services.registrations.cancel(slot.id, &presenter).await;
    assert!(matches!(again, Err(ServiceError::RegistrationNotFound)));

    // The seat is free again.
    let next = common::unique_presenter("next");
    let outcome = services
        .registrations
        .register(slot.id, common::register_request(&next, Degree::Msc), false)
        .await
        .unwrap();
    assert!(matches!(outcome, RegisterOutcome::Registered { .. }));
}

#[tokio::test]
async fn test_reminder_sweep_marks_quiet_registrations() {
    let Some(pool) = common::try_test_pool().await else {
        return;
    };
    let config = common::test_config("unused");
    let services = common::registry(pool.clone(), config);
    let registrations = RegistrationRepository::new(pool.clone());

    let slot = common::create_slot(&pool, 4).await;
    let presenter = common::unique_presenter("quiet");
    let outcome = services
        .registrations
        .register(
            slot.id,
            common::register_request(&presenter, Degree::Msc),
            true,
        )
        .await
        .unwrap();
    let registration_id = match outcome {
        RegisterOutcome::Registered { registration_id } => registration_id,
        other => panic!("Expected Registered, got {:?}", other),
    };

    // Backdate creation past the reminder interval; keep the token live.
    sqlx::query("UPDATE slot_registrations SET created_at = $2 WHERE id = $1")
        .bind(registration_id)
        .bind(Utc::now() - Duration::hours(72))
        .execute(&pool)
        .await
        .unwrap();

    let sent = services.registrations.send_reminders().await.unwrap();
    assert!(sent >= 1);

    let row = registrations
        .find_by_id(registration_id)
        .await
        .unwrap()
        .unwrap();
    assert!(row.last_reminder_sent_at.is_some());

    // The same row is not picked up again until another interval passes.
    let _ = services.registrations.send_reminders().await.unwrap();
    let reminder_emails: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM email_queue \
         WHERE registration_id = $1 AND email_type = 'supervisor_reminder'",
    )
    .bind(registration_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(reminder_emails, 1);
}
