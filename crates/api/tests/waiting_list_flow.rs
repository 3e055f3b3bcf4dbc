//! Integration tests for the waiting list: ordering, position compaction,
//! promotion offers and the offer expiry sweep.

mod common;

use chrono::{Duration, Utc};
use domain::models::Degree;
use domain::ServiceError;
use uuid::Uuid;

/// Fill a capacity-1 slot and return the holder's username.
async fn fill_slot(
    services: &seminar_registration_api::services::ServiceRegistry,
    slot_id: Uuid,
) -> String {
    let holder = common::unique_presenter("holder");
    services
        .registrations
        .register(
            slot_id,
            common::register_request(&holder, Degree::Msc),
            false,
        )
        .await
        .unwrap();
    holder
}

#[tokio::test]
async fn test_positions_are_dense_and_ordered() {
    let Some(pool) = common::try_test_pool().await else {
        return;
    };
    let config = common::test_config("unused");
    let services = common::registry(pool.clone(), config);

    let slot = common::create_slot(&pool, 1).await;
    fill_slot(&services, slot.id).await;

    let mut waiters = Vec::new();
    for i in 0..3 {
        let waiter = common::unique_presenter(&format!("w{}", i));
        let position = services
            .waiting_list
            .enqueue(slot.id, &common::register_request(&waiter, Degree::Msc))
            .await
            .unwrap();
        assert_eq!(position, i + 1);
        waiters.push(waiter);
    }

    // Removing the middle entry closes the gap behind it.
    services
        .waiting_list
        .withdraw(slot.id, &waiters[1])
        .await
        .unwrap();

    assert_eq!(
        services
            .waiting_list
            .position(slot.id, &waiters[0])
            .await
            .unwrap(),
        Some(1)
    );
    assert_eq!(
        services
            .waiting_list
            .position(slot.id, &waiters[1])
            .await
            .unwrap(),
        None
    );
    assert_eq!(
        services
            .waiting_list
            .position(slot.id, &waiters[2])
            .await
            .unwrap(),
        Some(2)
    );
}

#[tokio::test]
async fn test_single_waiting_entry_policy() {
    let Some(pool) = common::try_test_pool().await else {
        return;
    };
    let config = common::test_config("unused");
    let services = common::registry(pool.clone(), config);

    let slot = common::create_slot(&pool, 1).await;
    fill_slot(&services, slot.id).await;

    let waiter = common::unique_presenter("once");
    services
        .waiting_list
        .enqueue(slot.id, &common::register_request(&waiter, Degree::Msc))
        .await
        .unwrap();

    let again = services
        .waiting_list
        .enqueue(slot.id, &common::register_request(&waiter, Degree::Msc))
        .await;
    assert!(matches!(again, Err(ServiceError::AlreadyWaiting)));

    // One waiting entry per presenter across all slots.
    let other_slot = common::create_slot(&pool, 1).await;
    fill_slot(&services, other_slot.id).await;
    let elsewhere = services
        .waiting_list
        .enqueue(
            other_slot.id,
            &common::register_request(&waiter, Degree::Msc),
        )
        .await;
    assert!(matches!(elsewhere, Err(ServiceError::AlreadyWaiting)));
}

#[tokio::test]
async fn test_withdraw_requires_membership() {
    let Some(pool) = common::try_test_pool().await else {
        return;
    };
    let config = common::test_config("unused");
    let services = common::registry(pool.clone(), config);

    let slot = common::create_slot(&pool, 1).await;
    let result = services
        .waiting_list
        .withdraw(slot.id, "nobody-here")
        .await;
    assert!(matches!(result, Err(ServiceError::NotWaiting)));
}

#[tokio::test]
async fn test_offer_goes_to_head_of_list() {
    let Some(pool) = common::try_test_pool().await else {
        return;
    };
    let config = common::test_config("unused");
    let services = common::registry(pool.clone(), config);

    let slot = common::create_slot(&pool, 1).await;
    let holder = fill_slot(&services, slot.id).await;

    let first = common::unique_presenter("first");
    let second = common::unique_presenter("second");
    for waiter in [&first, &second] {
        services
            .waiting_list
            .enqueue(slot.id, &common::register_request(waiter, Degree::Msc))
            .await
            .unwrap();
    }

    services
        .registrations
        .cancel(slot.id, &holder)
        .await
        .unwrap();

    let first_token: Option<String> = sqlx::query_scalar(
        "SELECT promotion_token FROM waiting_list_entries \
         WHERE slot_id = $1 AND presenter_username = $2",
    )
    .bind(slot.id)
    .bind(&first)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert!(first_token.is_some());

    let second_token: Option<String> = sqlx::query_scalar(
        "SELECT promotion_token FROM waiting_list_entries \
         WHERE slot_id = $1 AND presenter_username = $2",
    )
    .bind(slot.id)
    .bind(&second)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert!(second_token.is_none());
}

#[tokio::test]
async fn test_offer_withheld_when_freed_capacity_too_small() {
    let Some(pool) = common::try_test_pool().await else {
        return;
    };
    let config = common::test_config("unused");
    let services = common::registry(pool.clone(), config);

    // Capacity 3: PhD (2) + MSc (1) fill it. A PhD waits at the head.
    let slot = common::create_slot(&pool, 3).await;
    let phd = common::unique_presenter("phd");
    services
        .registrations
        .register(slot.id, common::register_request(&phd, Degree::Phd), false)
        .await
        .unwrap();
    let msc = common::unique_presenter("msc");
    services
        .registrations
        .register(slot.id, common::register_request(&msc, Degree::Msc), false)
        .await
        .unwrap();

    let waiting_phd = common::unique_presenter("wphd");
    services
        .waiting_list
        .enqueue(
            slot.id,
            &common::register_request(&waiting_phd, Degree::Phd),
        )
        .await
        .unwrap();

    // The MSc cancellation frees one seat; the waiting PhD needs two, so no
    // offer goes out and the head keeps its place.
    services.registrations.cancel(slot.id, &msc).await.unwrap();

    let token: Option<String> = sqlx::query_scalar(
        "SELECT promotion_token FROM waiting_list_entries \
         WHERE slot_id = $1 AND presenter_username = $2",
    )
    .bind(slot.id)
    .bind(&waiting_phd)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert!(token.is_none());

    // The PhD cancellation frees enough for the waiting PhD.
    services.registrations.cancel(slot.id, &phd).await.unwrap();
    let token: Option<String> = sqlx::query_scalar(
        "SELECT promotion_token FROM waiting_list_entries \
         WHERE slot_id = $1 AND presenter_username = $2",
    )
    .bind(slot.id)
    .bind(&waiting_phd)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert!(token.is_some());
}

#[tokio::test]
async fn test_accept_offer_is_idempotent() {
    let Some(pool) = common::try_test_pool().await else {
        return;
    };
    let config = common::test_config("unused");
    let services = common::registry(pool.clone(), config);

    let slot = common::create_slot(&pool, 1).await;
    let holder = fill_slot(&services, slot.id).await;
    let waiter = common::unique_presenter("accept");
    services
        .waiting_list
        .enqueue(slot.id, &common::register_request(&waiter, Degree::Msc))
        .await
        .unwrap();

    services
        .registrations
        .cancel(slot.id, &holder)
        .await
        .unwrap();

    let token: String = sqlx::query_scalar(
        "SELECT promotion_token FROM waiting_list_entries \
         WHERE slot_id = $1 AND presenter_username = $2",
    )
    .bind(slot.id)
    .bind(&waiter)
    .fetch_one(&pool)
    .await
    .unwrap();

    let registration = services.waiting_list.accept_offer(&token).await.unwrap();
    assert_eq!(registration.presenter_username, waiter);

    let again = services.waiting_list.accept_offer(&token).await;
    assert!(matches!(again, Err(ServiceError::AlreadyResolved)));

    let missing = services.waiting_list.accept_offer("no-such-token").await;
    assert!(matches!(missing, Err(ServiceError::TokenNotFound)));
}

#[tokio::test]
async fn test_lapsed_offer_forfeits_and_passes_seat_on() {
    let Some(pool) = common::try_test_pool().await else {
        return;
    };
    let config = common::test_config("unused");
    let services = common::registry(pool.clone(), config);

    let slot = common::create_slot(&pool, 1).await;
    let holder = fill_slot(&services, slot.id).await;

    let first = common::unique_presenter("lapsed");
    let second = common::unique_presenter("next-up");
    for waiter in [&first, &second] {
        services
            .waiting_list
            .enqueue(slot.id, &common::register_request(waiter, Degree::Msc))
            .await
            .unwrap();
    }

    services
        .registrations
        .cancel(slot.id, &holder)
        .await
        .unwrap();

    let token: String = sqlx::query_scalar(
        "SELECT promotion_token FROM waiting_list_entries \
         WHERE slot_id = $1 AND presenter_username = $2",
    )
    .bind(slot.id)
    .bind(&first)
    .fetch_one(&pool)
    .await
    .unwrap();

    // Backdate the offer past its window.
    let past = Utc::now() - Duration::minutes(1);
    sqlx::query("UPDATE waiting_list_promotions SET expires_at = $2 WHERE promotion_token = $1")
        .bind(&token)
        .bind(past)
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query(
        "UPDATE waiting_list_entries SET promotion_token_expires_at = $2 \
         WHERE promotion_token = $1",
    )
    .bind(&token)
    .bind(past)
    .execute(&pool)
    .await
    .unwrap();

    let expired = services.waiting_list.expire_due_offers().await.unwrap();
    assert!(expired >= 1);

    // The forfeiting entry is gone and the seat moved to the next waiter.
    assert_eq!(
        services
            .waiting_list
            .position(slot.id, &first)
            .await
            .unwrap(),
        None
    );
    let next_token: Option<String> = sqlx::query_scalar(
        "SELECT promotion_token FROM waiting_list_entries \
         WHERE slot_id = $1 AND presenter_username = $2",
    )
    .bind(slot.id)
    .bind(&second)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert!(next_token.is_some());

    // A late click on the expired token reports the expiry.
    let late = services.waiting_list.accept_offer(&token).await;
    assert!(matches!(late, Err(ServiceError::OfferExpired)));
}

#[tokio::test]
async fn test_withdraw_with_live_offer_passes_seat_on() {
    let Some(pool) = common::try_test_pool().await else {
        return;
    };
    let config = common::test_config("unused");
    let services = common::registry(pool.clone(), config);

    let slot = common::create_slot(&pool, 1).await;
    let holder = fill_slot(&services, slot.id).await;

    let first = common::unique_presenter("leaver");
    let second = common::unique_presenter("stayer");
    for waiter in [&first, &second] {
        services
            .waiting_list
            .enqueue(slot.id, &common::register_request(waiter, Degree::Msc))
            .await
            .unwrap();
    }

    services
        .registrations
        .cancel(slot.id, &holder)
        .await
        .unwrap();

    // The head withdraws while holding a live offer; the seat moves on.
    services
        .waiting_list
        .withdraw(slot.id, &first)
        .await
        .unwrap();

    let token: Option<String> = sqlx::query_scalar(
        "SELECT promotion_token FROM waiting_list_entries \
         WHERE slot_id = $1 AND presenter_username = $2",
    )
    .bind(slot.id)
    .bind(&second)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert!(token.is_some());

    assert_eq!(
        services
            .waiting_list
            .position(slot.id, &second)
            .await
            .unwrap(),
        Some(1)
    );
}
