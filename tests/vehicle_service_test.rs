mod common;

use assert_matches::assert_matches;
use common::{vehicle_request, TestApp};
use rust_decimal_macros::dec;
use uuid::Uuid;
use vehicle_market::{
    errors::ServiceError,
    events::Event,
    models::VehicleStatus,
    services::{transactions::CompleteTransactionRequest, vehicles::VehicleFilter},
};

#[tokio::test]
async fn register_and_fetch() {
    let mut app = TestApp::new().await;
    let owner = Uuid::new_v4();

    let registered = app
        .vehicles()
        .register_vehicle(owner, vehicle_request("  Honda ", dec!(18000)))
        .await
        .unwrap();
    assert_eq!(registered.owner_id, owner);
    assert_eq!(registered.make, "Honda");
    assert_eq!(registered.model, "Model X1");
    assert_eq!(registered.status, VehicleStatus::Active);

    let fetched = app.vehicles().get_vehicle(registered.id).await.unwrap();
    assert_eq!(fetched.id, registered.id);
    assert_eq!(fetched.price, dec!(18000));
    assert_eq!(fetched.city, "Denver");

    assert_eq!(
        app.drain_events(),
        vec![Event::VehicleRegistered {
            vehicle_id: registered.id,
            owner_id: owner,
        }]
    );
}

#[tokio::test]
async fn invalid_registration_is_rejected() {
    let app = TestApp::new().await;
    let mut request = vehicle_request("Ford", dec!(9000));
    request.year = 1850;

    let err = app
        .vehicles()
        .register_vehicle(Uuid::new_v4(), request)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn missing_vehicle_is_not_found() {
    let app = TestApp::new().await;
    let err = app.vehicles().get_vehicle(Uuid::new_v4()).await.unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn listing_filters_combine() {
    let app = TestApp::new().await;
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    for (owner, make, price) in [
        (alice, "Toyota", dec!(12000)),
        (alice, "Toyota", dec!(25000)),
        (alice, "Mazda", dec!(15000)),
        (bob, "Toyota", dec!(40000)),
    ] {
        app.vehicles()
            .register_vehicle(owner, vehicle_request(make, price))
            .await
            .unwrap();
    }

    let toyotas = app
        .vehicles()
        .list_vehicles(VehicleFilter {
            make: Some("Toyota".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(toyotas.total, 3);

    let affordable = app
        .vehicles()
        .list_vehicles(VehicleFilter {
            owner_id: Some(alice),
            min_price: Some(dec!(13000)),
            max_price: Some(dec!(30000)),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(affordable.total, 2);
    assert!(affordable.items.iter().all(|v| v.owner_id == alice));

    let paged = app
        .vehicles()
        .list_vehicles(VehicleFilter {
            limit: Some(3),
            page: Some(2),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(paged.total, 4);
    assert_eq!(paged.total_pages, 2);
    assert_eq!(paged.items.len(), 1);
}

#[tokio::test]
async fn owner_archives_and_relists() {
    let mut app = TestApp::new().await;
    let owner = Uuid::new_v4();
    let vehicle = app.seed_vehicle(owner).await;
    app.drain_events();

    let archived = app
        .vehicles()
        .set_status(vehicle.id, owner, VehicleStatus::Archived)
        .await
        .unwrap();
    assert_eq!(archived.status, VehicleStatus::Archived);

    let active = app
        .vehicles()
        .list_vehicles(VehicleFilter {
            status: Some(VehicleStatus::Active),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(active.total, 0);

    // Same status twice is a no-op.
    app.vehicles()
        .set_status(vehicle.id, owner, VehicleStatus::Archived)
        .await
        .unwrap();

    let relisted = app
        .vehicles()
        .set_status(vehicle.id, owner, VehicleStatus::Active)
        .await
        .unwrap();
    assert_eq!(relisted.status, VehicleStatus::Active);

    assert_eq!(
        app.drain_events(),
        vec![
            Event::VehicleStatusChanged {
                vehicle_id: vehicle.id,
                old_status: VehicleStatus::Active,
                new_status: VehicleStatus::Archived,
            },
            Event::VehicleStatusChanged {
                vehicle_id: vehicle.id,
                old_status: VehicleStatus::Archived,
                new_status: VehicleStatus::Active,
            },
        ]
    );
}

#[tokio::test]
async fn status_changes_are_guarded() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let buyer = Uuid::new_v4();
    let (vehicle, transaction) = app.seed_cash_sale(seller, buyer).await;

    let err = app
        .vehicles()
        .set_status(vehicle.id, Uuid::new_v4(), VehicleStatus::Archived)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Forbidden(_));

    let err = app
        .vehicles()
        .set_status(vehicle.id, seller, VehicleStatus::Sold)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    app.transactions()
        .complete_transaction(
            transaction.id,
            seller,
            CompleteTransactionRequest {
                transaction_reference: "REF".into(),
                notes: None,
            },
        )
        .await
        .unwrap();

    // The former owner lost control of the listing.
    let err = app
        .vehicles()
        .set_status(vehicle.id, seller, VehicleStatus::Archived)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Forbidden(_));

    let err = app
        .vehicles()
        .set_status(vehicle.id, buyer, VehicleStatus::Active)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidState(_));
}

#[tokio::test]
async fn page_past_the_end_is_empty() {
    let app = TestApp::new().await;
    app.seed_vehicle(Uuid::new_v4()).await;
    app.seed_vehicle(Uuid::new_v4()).await;

    for page in [3, u64::MAX] {
        let listed = app
            .vehicles()
            .list_vehicles(VehicleFilter {
                page: Some(page),
                limit: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(listed.items.is_empty());
        assert_eq!(listed.total, 2);
        assert_eq!(listed.page, page);
    }
}
