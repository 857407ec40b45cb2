use crate::{
    db::DbPool,
    entities::vehicle::{ActiveModel as VehicleActiveModel, Column, Model as VehicleModel},
    errors::ServiceError,
    events::{Event, EventSender},
    models::VehicleStatus,
    repositories::{vehicle_repository, PageRequest},
    services::{bounded, db_failure, ServiceSettings},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveValue::Set, ColumnTrait, Condition};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterVehicleRequest {
    #[validate(length(min = 1, max = 64, message = "make is required"))]
    pub make: String,
    #[validate(length(min = 1, max = 64, message = "model is required"))]
    pub model: String,
    #[validate(range(min = 1900, max = 2100, message = "year must be between 1900 and 2100"))]
    pub year: i32,
    #[validate(custom = "validate_price")]
    pub price: Decimal,
    #[validate(range(min = 0, message = "mileage cannot be negative"))]
    pub mileage: i32,
    #[validate(length(min = 1, message = "city is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "state is required"))]
    pub state: String,
    #[validate(length(min = 1, message = "country is required"))]
    pub country: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleFilter {
    pub status: Option<VehicleStatus>,
    pub make: Option<String>,
    pub owner_id: Option<Uuid>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleResponse {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub price: Decimal,
    pub mileage: i32,
    pub city: String,
    pub state: String,
    pub country: String,
    pub status: VehicleStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<VehicleModel> for VehicleResponse {
    fn from(model: VehicleModel) -> Self {
        Self {
            id: model.id,
            owner_id: model.owner_id,
            make: model.make,
            model: model.model_name,
            year: model.year,
            price: model.price,
            mileage: model.mileage,
            city: model.city,
            state: model.state,
            country: model.country,
            status: model.status,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehiclePage {
    pub items: Vec<VehicleResponse>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() && !price.is_zero() {
        let mut err = ValidationError::new("price");
        err.message = Some("price cannot be negative".into());
        return Err(err);
    }
    Ok(())
}

/// Vehicle listings. Ownership and the `sold` status only change through a
/// completed transaction.
#[derive(Clone)]
pub struct VehicleService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
    settings: ServiceSettings,
}

impl VehicleService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Option<Arc<EventSender>>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            settings,
        }
    }

    #[instrument(skip(self, request), fields(owner_id = %owner_id, make = %request.make))]
    pub async fn register_vehicle(
        &self,
        owner_id: Uuid,
        request: RegisterVehicleRequest,
    ) -> Result<VehicleResponse, ServiceError> {
        request.validate()?;

        let now = Utc::now();
        let model = VehicleActiveModel {
            id: Set(Uuid::new_v4()),
            owner_id: Set(owner_id),
            make: Set(request.make.trim().to_string()),
            model_name: Set(request.model.trim().to_string()),
            year: Set(request.year),
            price: Set(request.price),
            mileage: Set(request.mileage),
            city: Set(request.city),
            state: Set(request.state),
            country: Set(request.country),
            status: Set(VehicleStatus::Active),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let db = &*self.db_pool;
        let vehicle = bounded(self.settings.db_operation_timeout, "insert_vehicle", async {
            vehicle_repository::insert(db, model)
                .await
                .map_err(db_failure("insert_vehicle"))
        })
        .await?;

        info!(vehicle_id = %vehicle.id, "Vehicle registered");
        self.publish(Event::VehicleRegistered {
            vehicle_id: vehicle.id,
            owner_id,
        })
        .await;

        Ok(vehicle.into())
    }

    #[instrument(skip(self))]
    pub async fn get_vehicle(&self, id: Uuid) -> Result<VehicleResponse, ServiceError> {
        let db = &*self.db_pool;
        bounded(self.settings.db_operation_timeout, "get_vehicle", async {
            vehicle_repository::find_by_id(db, id)
                .await
                .map_err(db_failure("get_vehicle"))
        })
        .await?
        .map(Into::into)
        .ok_or_else(|| ServiceError::NotFound("vehicle not found".to_string()))
    }

    #[instrument(skip(self))]
    pub async fn list_vehicles(&self, filter: VehicleFilter) -> Result<VehiclePage, ServiceError> {
        let page = PageRequest::new(
            filter.page,
            filter.limit,
            self.settings.default_page_size,
            self.settings.max_page_size,
        );

        let mut condition = Condition::all();
        if let Some(status) = filter.status {
            condition = condition.add(Column::Status.eq(status));
        }
        if let Some(make) = filter.make.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
            condition = condition.add(Column::Make.eq(make));
        }
        if let Some(owner_id) = filter.owner_id {
            condition = condition.add(Column::OwnerId.eq(owner_id));
        }
        if let Some(min_price) = filter.min_price {
            condition = condition.add(Column::Price.gte(min_price));
        }
        if let Some(max_price) = filter.max_price {
            condition = condition.add(Column::Price.lte(max_price));
        }

        let db = &*self.db_pool;
        let (items, total) = bounded(self.settings.db_operation_timeout, "list_vehicles", async {
            vehicle_repository::find_page(db, condition, page)
                .await
                .map_err(db_failure("list_vehicles"))
        })
        .await?;

        Ok(VehiclePage {
            items: items.into_iter().map(Into::into).collect(),
            total,
            page: page.page,
            limit: page.limit,
            total_pages: page.total_pages(total),
        })
    }

    /// Archives or re-activates a listing on behalf of its owner.
    #[instrument(skip(self), fields(vehicle_id = %id, caller = %caller, status = %status))]
    pub async fn set_status(
        &self,
        id: Uuid,
        caller: Uuid,
        status: VehicleStatus,
    ) -> Result<VehicleResponse, ServiceError> {
        if status == VehicleStatus::Sold {
            return Err(ServiceError::ValidationError(
                "a vehicle is marked sold only by completing a transaction".to_string(),
            ));
        }

        let db = &*self.db_pool;
        let (old_status, vehicle) = bounded(self.settings.db_operation_timeout, "set_vehicle_status", async {
            let current = vehicle_repository::find_by_id(db, id)
                .await
                .map_err(db_failure("load_vehicle"))?
                .ok_or_else(|| ServiceError::NotFound("vehicle not found".to_string()))?;

            if current.owner_id != caller {
                return Err(ServiceError::Forbidden(
                    "you are not the owner of this vehicle".to_string(),
                ));
            }
            if current.status == VehicleStatus::Sold {
                return Err(ServiceError::InvalidState(
                    "a sold vehicle cannot be relisted or archived".to_string(),
                ));
            }
            if current.status == status {
                return Ok((current.status, current));
            }

            let changed = vehicle_repository::update_status(db, id, current.status, status, Utc::now())
                .await
                .map_err(db_failure("set_vehicle_status"))?;
            if changed == 0 {
                return Err(ServiceError::ConcurrentModification(id));
            }

            let updated = vehicle_repository::find_by_id(db, id)
                .await
                .map_err(db_failure("reload_vehicle"))?
                .ok_or_else(|| ServiceError::NotFound("vehicle not found".to_string()))?;
            Ok((current.status, updated))
        })
        .await?;

        if old_status != vehicle.status {
            info!(old_status = %old_status, "Vehicle status changed");
            self.publish(Event::VehicleStatusChanged {
                vehicle_id: id,
                old_status,
                new_status: vehicle.status,
            })
            .await;
        }

        Ok(vehicle.into())
    }

    async fn publish(&self, event: Event) {
        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, "Failed to publish vehicle event");
            }
        }
    }
}
