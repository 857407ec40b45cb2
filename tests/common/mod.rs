#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::mpsc;
use uuid::Uuid;
use vehicle_market::{
    config::AppConfig,
    db::{self, DbPool},
    events::{self, Event},
    models::{InspectionIssue, InspectionReport, IssueSeverity, PaymentDetails, PaymentMethod, VehicleCondition},
    services::{
        inspections::{InspectionResponse, InspectionService, ScheduleInspectionRequest},
        transactions::{CreateTransactionRequest, TransactionResponse, TransactionService},
        vehicles::{RegisterVehicleRequest, VehicleResponse, VehicleService},
        AppServices, ServiceSettings,
    },
};

pub const TEST_JWT_SECRET: &str =
    "t4Kx8Qm1Zr6Wn3Lb9Vc2Hs7Jp5Fd0Gy-integration-test-signing-key-0123-xyz";

/// Application services backed by a fresh in-memory SQLite database.
pub struct TestApp {
    pub db: Arc<DbPool>,
    pub services: AppServices,
    pub config: AppConfig,
    events: mpsc::Receiver<Event>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_timeout(Duration::from_secs(5)).await
    }

    pub async fn with_timeout(db_operation_timeout: Duration) -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            TEST_JWT_SECRET.to_string(),
            "test".to_string(),
        );
        // One connection keeps the in-memory database alive and shared.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.db_operation_timeout_secs = db_operation_timeout.as_secs().max(1);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations");
        let db = Arc::new(pool);

        let (sender, events) = events::channel(256);
        let mut settings = ServiceSettings::from(&cfg);
        settings.db_operation_timeout = db_operation_timeout;
        let services = AppServices::new(db.clone(), Some(Arc::new(sender)), settings);

        Self {
            db,
            services,
            config: cfg,
            events,
        }
    }

    pub fn transactions(&self) -> &TransactionService {
        &self.services.transactions
    }

    pub fn vehicles(&self) -> &VehicleService {
        &self.services.vehicles
    }

    pub fn inspections(&self) -> &InspectionService {
        &self.services.inspections
    }

    /// Events published so far, in order.
    pub fn drain_events(&mut self) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    pub async fn seed_vehicle(&self, owner: Uuid) -> VehicleResponse {
        self.vehicles()
            .register_vehicle(owner, vehicle_request("Toyota", dec!(30000)))
            .await
            .expect("failed to seed vehicle")
    }

    pub async fn seed_cash_sale(&self, seller: Uuid, buyer: Uuid) -> (VehicleResponse, TransactionResponse) {
        let vehicle = self.seed_vehicle(seller).await;
        let transaction = self
            .transactions()
            .create_transaction(seller, cash_request(vehicle.id, buyer, dec!(30000)))
            .await
            .expect("failed to seed transaction");
        (vehicle, transaction)
    }
}

impl TestApp {
    /// Books an inspection of `vehicle_id` two days out.
    pub async fn seed_inspection(&self, inspector: Uuid, vehicle_id: Uuid) -> InspectionResponse {
        self.inspections()
            .schedule_inspection(inspector, schedule_request(vehicle_id, 48))
            .await
            .expect("failed to seed inspection")
    }
}

pub fn schedule_request(vehicle_id: Uuid, hours_ahead: i64) -> ScheduleInspectionRequest {
    ScheduleInspectionRequest {
        vehicle_id,
        scheduled_at: Utc::now() + chrono::Duration::hours(hours_ahead),
        notes: None,
    }
}

pub fn sample_report() -> InspectionReport {
    InspectionReport {
        overall_condition: VehicleCondition::Good,
        mechanical_score: 85,
        exterior_score: 78,
        interior_score: 90,
        issues: vec![InspectionIssue {
            category: "brakes".to_string(),
            severity: IssueSeverity::Major,
            description: "front pads below 3mm".to_string(),
            location: Some("front axle".to_string()),
        }],
        recommendations: vec!["replace front brake pads".to_string()],
        estimated_repairs: dec!(320),
    }
}

pub fn vehicle_request(make: &str, price: Decimal) -> RegisterVehicleRequest {
    RegisterVehicleRequest {
        make: make.to_string(),
        model: "Model X1".to_string(),
        year: 2020,
        price,
        mileage: 25_000,
        city: "Denver".to_string(),
        state: "CO".to_string(),
        country: "US".to_string(),
    }
}

pub fn cash_request(vehicle_id: Uuid, buyer_id: Uuid, amount: Decimal) -> CreateTransactionRequest {
    CreateTransactionRequest {
        vehicle_id,
        buyer_id,
        amount,
        currency: Some("USD".to_string()),
        payment_method: PaymentMethod::Cash,
        payment_details: None,
        inspection_id: None,
        notes: None,
    }
}

pub fn financing_request(
    vehicle_id: Uuid,
    buyer_id: Uuid,
    amount: Decimal,
    down_payment: Decimal,
    term: u32,
    rate: Decimal,
) -> CreateTransactionRequest {
    CreateTransactionRequest {
        payment_method: PaymentMethod::Financing,
        payment_details: Some(PaymentDetails {
            down_payment: Some(down_payment),
            financing_term_months: Some(term),
            interest_rate: Some(rate),
            ..Default::default()
        }),
        ..cash_request(vehicle_id, buyer_id, amount)
    }
}
