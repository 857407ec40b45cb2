//! End-to-end tests for the sale lifecycle: pending → completed | cancelled,
//! including the atomic ownership transfer on completion.

mod common;

use assert_matches::assert_matches;
use common::{cash_request, financing_request, TestApp};
use rust_decimal_macros::dec;
use sea_orm::{EntityTrait, TransactionTrait};
use std::time::Duration;
use uuid::Uuid;
use vehicle_market::{
    entities::vehicle,
    errors::ServiceError,
    events::Event,
    models::{TransactionStatus, VehicleStatus},
    services::transactions::{
        CancelTransactionRequest, CompleteTransactionRequest, UpdateTransactionRequest,
    },
};

fn complete_request(reference: &str) -> CompleteTransactionRequest {
    CompleteTransactionRequest {
        transaction_reference: reference.to_string(),
        notes: None,
    }
}

#[tokio::test]
async fn financed_sale_completes_and_transfers_vehicle() {
    let mut app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let buyer = Uuid::new_v4();

    let vehicle = app.seed_vehicle(seller).await;
    let created = app
        .transactions()
        .create_transaction(
            seller,
            financing_request(vehicle.id, buyer, dec!(30000), dec!(10000), 60, dec!(3.5)),
        )
        .await
        .unwrap();

    assert_eq!(created.status, TransactionStatus::Pending);
    assert_eq!(created.seller_id, seller);
    assert_eq!(created.buyer_id, buyer);
    assert_eq!(created.version, 1);
    assert_eq!(created.payment_details.financed_amount, Some(dec!(20000)));
    let monthly = created.payment_details.monthly_payment.unwrap();
    assert!(monthly > dec!(363.80) && monthly < dec!(363.90), "monthly = {}", monthly);

    let completed = app
        .transactions()
        .complete_transaction(
            created.id,
            seller,
            CompleteTransactionRequest {
                transaction_reference: "BANK-REF-123".into(),
                notes: Some("keys handed over".into()),
            },
        )
        .await
        .unwrap();

    assert_eq!(completed.status, TransactionStatus::Completed);
    assert!(completed.completed_at.is_some());
    assert!(completed.payment_details.paid_at.is_some());
    assert_eq!(
        completed.payment_details.transaction_reference.as_deref(),
        Some("BANK-REF-123")
    );
    assert_eq!(completed.notes.as_deref(), Some("keys handed over"));
    assert_eq!(completed.version, 2);

    let sold = app.vehicles().get_vehicle(vehicle.id).await.unwrap();
    assert_eq!(sold.owner_id, buyer);
    assert_eq!(sold.status, VehicleStatus::Sold);

    let events = app.drain_events();
    assert!(events.contains(&Event::TransactionCompleted {
        transaction_id: created.id,
        vehicle_id: vehicle.id,
        buyer_id: buyer,
    }));
}

#[tokio::test]
async fn only_the_seller_can_complete() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let buyer = Uuid::new_v4();
    let (vehicle, transaction) = app.seed_cash_sale(seller, buyer).await;

    for caller in [buyer, Uuid::new_v4()] {
        let err = app
            .transactions()
            .complete_transaction(transaction.id, caller, complete_request("REF"))
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::Forbidden(_));
    }

    let unchanged = app.transactions().get_transaction(transaction.id).await.unwrap();
    assert_eq!(unchanged.status, TransactionStatus::Pending);
    let vehicle = app.vehicles().get_vehicle(vehicle.id).await.unwrap();
    assert_eq!(vehicle.owner_id, seller);
    assert_eq!(vehicle.status, VehicleStatus::Active);
}

#[tokio::test]
async fn completion_requires_reference() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let (_, transaction) = app.seed_cash_sale(seller, Uuid::new_v4()).await;

    let err = app
        .transactions()
        .complete_transaction(transaction.id, seller, complete_request(""))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn completing_unknown_transaction_is_not_found() {
    let app = TestApp::new().await;
    let err = app
        .transactions()
        .complete_transaction(Uuid::new_v4(), Uuid::new_v4(), complete_request("REF"))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn terminal_transactions_reject_transitions() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let buyer = Uuid::new_v4();

    let (_, completed) = app.seed_cash_sale(seller, buyer).await;
    app.transactions()
        .complete_transaction(completed.id, seller, complete_request("REF-1"))
        .await
        .unwrap();

    let (cancelled_vehicle, cancelled) = app.seed_cash_sale(seller, buyer).await;
    app.transactions()
        .cancel_transaction(cancelled.id, buyer, CancelTransactionRequest::default())
        .await
        .unwrap();

    for id in [completed.id, cancelled.id] {
        let before = app.transactions().get_transaction(id).await.unwrap();

        let err = app
            .transactions()
            .complete_transaction(id, seller, complete_request("REF-2"))
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::InvalidState(_));

        let err = app
            .transactions()
            .cancel_transaction(id, seller, CancelTransactionRequest::default())
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::InvalidState(_));

        let after = app.transactions().get_transaction(id).await.unwrap();
        assert_eq!(before, after);
    }

    // A failed completion on a cancelled sale leaves the vehicle alone.
    let vehicle = app.vehicles().get_vehicle(cancelled_vehicle.id).await.unwrap();
    assert_eq!(vehicle.owner_id, seller);
    assert_eq!(vehicle.status, VehicleStatus::Active);
}

#[tokio::test]
async fn either_party_can_cancel_pending() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let buyer = Uuid::new_v4();

    for caller in [seller, buyer] {
        let (vehicle, transaction) = app.seed_cash_sale(seller, buyer).await;
        let cancelled = app
            .transactions()
            .cancel_transaction(
                transaction.id,
                caller,
                CancelTransactionRequest {
                    notes: Some("changed my mind".into()),
                },
            )
            .await
            .unwrap();

        assert_eq!(cancelled.status, TransactionStatus::Cancelled);
        assert!(cancelled.cancelled_at.is_some());
        assert!(cancelled.completed_at.is_none());
        assert_eq!(cancelled.notes.as_deref(), Some("changed my mind"));

        let vehicle = app.vehicles().get_vehicle(vehicle.id).await.unwrap();
        assert_eq!(vehicle.owner_id, seller);
        assert_eq!(vehicle.status, VehicleStatus::Active);
    }
}

#[tokio::test]
async fn outsiders_cannot_cancel() {
    let app = TestApp::new().await;
    let (_, transaction) = app.seed_cash_sale(Uuid::new_v4(), Uuid::new_v4()).await;

    let err = app
        .transactions()
        .cancel_transaction(transaction.id, Uuid::new_v4(), CancelTransactionRequest::default())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Forbidden(_));
}

#[tokio::test]
async fn missing_vehicle_rolls_back_completion() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let (vehicle, transaction) = app.seed_cash_sale(seller, Uuid::new_v4()).await;

    vehicle::Entity::delete_by_id(vehicle.id)
        .exec(&*app.db)
        .await
        .unwrap();

    let err = app
        .transactions()
        .complete_transaction(transaction.id, seller, complete_request("REF"))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));

    let after = app.transactions().get_transaction(transaction.id).await.unwrap();
    assert_eq!(after.status, TransactionStatus::Pending);
    assert!(after.completed_at.is_none());
    assert!(after.payment_details.transaction_reference.is_none());
    assert_eq!(after.version, transaction.version);
}

#[tokio::test]
async fn vehicle_is_sold_at_most_once() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let first_buyer = Uuid::new_v4();
    let second_buyer = Uuid::new_v4();

    let vehicle = app.seed_vehicle(seller).await;
    let first = app
        .transactions()
        .create_transaction(seller, cash_request(vehicle.id, first_buyer, dec!(30000)))
        .await
        .unwrap();
    let second = app
        .transactions()
        .create_transaction(seller, cash_request(vehicle.id, second_buyer, dec!(31000)))
        .await
        .unwrap();

    app.transactions()
        .complete_transaction(first.id, seller, complete_request("REF-A"))
        .await
        .unwrap();

    let err = app
        .transactions()
        .complete_transaction(second.id, seller, complete_request("REF-B"))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidState(_));

    let second = app.transactions().get_transaction(second.id).await.unwrap();
    assert_eq!(second.status, TransactionStatus::Pending);

    let vehicle = app.vehicles().get_vehicle(vehicle.id).await.unwrap();
    assert_eq!(vehicle.owner_id, first_buyer);
    assert_eq!(vehicle.status, VehicleStatus::Sold);
}

#[tokio::test]
async fn archiving_during_pending_sale_blocks_completion() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let buyer = Uuid::new_v4();
    let (vehicle, transaction) = app.seed_cash_sale(seller, buyer).await;

    app.vehicles()
        .set_status(vehicle.id, seller, VehicleStatus::Archived)
        .await
        .unwrap();

    let err = app
        .transactions()
        .complete_transaction(transaction.id, seller, complete_request("REF-ARCH"))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidState(ref m) if m.contains("archived"));

    let transaction = app.transactions().get_transaction(transaction.id).await.unwrap();
    assert_eq!(transaction.status, TransactionStatus::Pending);
    assert!(transaction.payment_details.transaction_reference.is_none());

    let vehicle = app.vehicles().get_vehicle(vehicle.id).await.unwrap();
    assert_eq!(vehicle.owner_id, seller);
    assert_eq!(vehicle.status, VehicleStatus::Archived);

    // Relisting makes the pending sale completable again.
    app.vehicles()
        .set_status(vehicle.id, seller, VehicleStatus::Active)
        .await
        .unwrap();
    let completed = app
        .transactions()
        .complete_transaction(transaction.id, seller, complete_request("REF-ARCH"))
        .await
        .unwrap();
    assert_eq!(completed.status, TransactionStatus::Completed);
}

#[tokio::test]
async fn update_cannot_set_payment_reference() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let buyer = Uuid::new_v4();
    let (_, transaction) = app.seed_cash_sale(seller, buyer).await;

    let updated = app
        .transactions()
        .update_transaction(
            transaction.id,
            buyer,
            UpdateTransactionRequest {
                payment_details: Some(vehicle_market::models::PaymentDetails {
                    transaction_reference: Some("WIRE-PAID-123".into()),
                    ..Default::default()
                }),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.status, TransactionStatus::Pending);
    assert!(updated.payment_details.transaction_reference.is_none());
    assert!(updated.payment_details.paid_at.is_none());

    let stored = app.transactions().get_transaction(transaction.id).await.unwrap();
    assert!(stored.payment_details.transaction_reference.is_none());
}

#[tokio::test]
async fn concurrent_completions_yield_one_success() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let buyer = Uuid::new_v4();
    let (vehicle, transaction) = app.seed_cash_sale(seller, buyer).await;

    let service_a = app.transactions().clone();
    let service_b = app.transactions().clone();
    let (a, b) = tokio::join!(
        service_a.complete_transaction(transaction.id, seller, complete_request("REF-A")),
        service_b.complete_transaction(transaction.id, seller, complete_request("REF-B")),
    );

    let outcomes = [a, b];
    let successes = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);
    let failure = outcomes.into_iter().find_map(Result::err).unwrap();
    assert_matches!(failure, ServiceError::InvalidState(_));

    let vehicle = app.vehicles().get_vehicle(vehicle.id).await.unwrap();
    assert_eq!(vehicle.owner_id, buyer);
    assert_eq!(vehicle.status, VehicleStatus::Sold);
}

#[tokio::test]
async fn update_routes_status_through_transitions() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let buyer = Uuid::new_v4();
    let (_, transaction) = app.seed_cash_sale(seller, buyer).await;

    let err = app
        .transactions()
        .update_transaction(
            transaction.id,
            seller,
            UpdateTransactionRequest {
                status: Some(TransactionStatus::Completed),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let err = app
        .transactions()
        .update_transaction(
            transaction.id,
            seller,
            UpdateTransactionRequest {
                status: Some(TransactionStatus::Failed),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidState(_));

    let unchanged = app
        .transactions()
        .update_transaction(
            transaction.id,
            buyer,
            UpdateTransactionRequest {
                status: Some(TransactionStatus::Pending),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(unchanged.status, TransactionStatus::Pending);
    assert_eq!(unchanged.version, transaction.version);

    let cancelled = app
        .transactions()
        .update_transaction(
            transaction.id,
            buyer,
            UpdateTransactionRequest {
                status: Some(TransactionStatus::Cancelled),
                notes: Some("found another car".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(cancelled.status, TransactionStatus::Cancelled);
    assert!(cancelled.cancelled_at.is_some());

    let err = app
        .transactions()
        .update_transaction(
            transaction.id,
            buyer,
            UpdateTransactionRequest {
                status: Some(TransactionStatus::Pending),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidState(_));
}

#[tokio::test]
async fn update_edits_notes_and_payment_details() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let buyer = Uuid::new_v4();
    let vehicle = app.seed_vehicle(seller).await;
    let transaction = app
        .transactions()
        .create_transaction(
            seller,
            financing_request(vehicle.id, buyer, dec!(30000), dec!(10000), 60, dec!(0)),
        )
        .await
        .unwrap();

    let err = app
        .transactions()
        .update_transaction(
            transaction.id,
            Uuid::new_v4(),
            UpdateTransactionRequest {
                notes: Some("hijack".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Forbidden(_));

    let updated = app
        .transactions()
        .update_transaction(
            transaction.id,
            buyer,
            UpdateTransactionRequest {
                payment_details: Some(vehicle_market::models::PaymentDetails {
                    financing_term_months: Some(40),
                    ..Default::default()
                }),
                notes: Some("longer term".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.version, transaction.version + 1);
    assert_eq!(updated.notes.as_deref(), Some("longer term"));
    assert_eq!(updated.payment_details.financing_term_months, Some(40));
    assert_eq!(updated.payment_details.down_payment, Some(dec!(10000)));
    assert_eq!(updated.payment_details.monthly_payment, Some(dec!(500)));

    app.transactions()
        .complete_transaction(transaction.id, seller, complete_request("REF"))
        .await
        .unwrap();

    let err = app
        .transactions()
        .update_transaction(
            transaction.id,
            buyer,
            UpdateTransactionRequest {
                payment_details: Some(vehicle_market::models::PaymentDetails {
                    financing_term_months: Some(12),
                    ..Default::default()
                }),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidState(_));

    let noted = app
        .transactions()
        .update_transaction(
            transaction.id,
            seller,
            UpdateTransactionRequest {
                notes: Some("title transferred".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(noted.status, TransactionStatus::Completed);
    assert_eq!(noted.notes.as_deref(), Some("title transferred"));
}

#[tokio::test]
async fn slow_persistence_times_out() {
    let app = TestApp::with_timeout(Duration::from_millis(200)).await;
    let (_, transaction) = app.seed_cash_sale(Uuid::new_v4(), Uuid::new_v4()).await;

    // Holding the only pooled connection starves the service.
    let blocker = app.db.begin().await.unwrap();
    let err = app
        .transactions()
        .get_transaction(transaction.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Timeout(_));
    assert!(err.is_retryable());
    blocker.rollback().await.unwrap();

    let found = app.transactions().get_transaction(transaction.id).await.unwrap();
    assert_eq!(found.id, transaction.id);
}
