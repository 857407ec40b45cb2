// Sale transactions: state machine, atomic completion and queries
pub mod transactions;

// Vehicle listings owned by sellers
pub mod vehicles;

// Inspections booked against listed vehicles
pub mod inspections;

// Pure loan arithmetic
pub mod financing;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tracing::error;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::events::EventSender;

/// Tuning shared by the services.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// Bound on every persistence step, including the whole completion unit
    pub db_operation_timeout: Duration,
    pub default_currency: String,
    pub default_page_size: u64,
    pub max_page_size: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            db_operation_timeout: Duration::from_secs(5),
            default_currency: "USD".to_string(),
            default_page_size: 10,
            max_page_size: 100,
        }
    }
}

impl From<&AppConfig> for ServiceSettings {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            db_operation_timeout: cfg.db_operation_timeout(),
            default_currency: cfg.default_currency.to_ascii_uppercase(),
            default_page_size: cfg.api_default_page_size,
            max_page_size: cfg.api_max_page_size,
        }
    }
}

/// Services wired to one pool and one event channel.
#[derive(Clone)]
pub struct AppServices {
    pub transactions: transactions::TransactionService,
    pub vehicles: vehicles::VehicleService,
    pub inspections: inspections::InspectionService,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Option<Arc<EventSender>>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            transactions: transactions::TransactionService::new(
                db_pool.clone(),
                event_sender.clone(),
                settings.clone(),
            ),
            vehicles: vehicles::VehicleService::new(
                db_pool.clone(),
                event_sender.clone(),
                settings.clone(),
            ),
            inspections: inspections::InspectionService::new(db_pool, event_sender, settings),
        }
    }
}

/// Runs `fut` under `limit`; elapsed time becomes [`ServiceError::Timeout`].
///
/// Dropping the future on timeout also drops any open database transaction
/// it holds, which rolls it back.
pub(crate) async fn bounded<T, F>(
    limit: Duration,
    operation: &'static str,
    fut: F,
) -> Result<T, ServiceError>
where
    F: Future<Output = Result<T, ServiceError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            error!(operation, timeout_ms = limit.as_millis() as u64, "Persistence operation timed out");
            counter!("vehicle_market.db_timeouts", 1, "operation" => operation);
            Err(ServiceError::Timeout(format!(
                "{} did not finish within {:?}",
                operation, limit
            )))
        }
    }
}

/// Logs a failed database call and wraps it.
pub(crate) fn db_failure(operation: &'static str) -> impl FnOnce(sea_orm::DbErr) -> ServiceError {
    move |e| {
        error!(operation, error = %e, "Database operation failed");
        ServiceError::DatabaseError(e)
    }
}
