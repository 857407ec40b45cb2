use crate::{
    db::DbPool,
    entities::transaction::{ActiveModel as TransactionActiveModel, Column, Model as TransactionModel},
    errors::ServiceError,
    events::{Event, EventSender},
    models::{InspectionStatus, PaymentDetails, PaymentMethod, TransactionKind, TransactionStatus},
    repositories::{inspection_repository, transaction_repository, vehicle_repository, PageRequest},
    services::{bounded, db_failure, financing, ServiceSettings},
};
use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{ActiveValue::Set, ColumnTrait, Condition, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Request/Response types for the transaction service
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionRequest {
    pub vehicle_id: Uuid,
    pub buyer_id: Uuid,
    #[validate(custom = "validate_positive_amount")]
    pub amount: Decimal,
    /// Falls back to the configured default currency
    #[serde(default)]
    #[validate(custom = "crate::config::validate_currency")]
    pub currency: Option<String>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub payment_details: Option<PaymentDetails>,
    #[serde(default)]
    pub inspection_id: Option<Uuid>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CompleteTransactionRequest {
    #[validate(custom = "validate_reference")]
    pub transaction_reference: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelTransactionRequest {
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTransactionRequest {
    #[serde(default)]
    pub status: Option<TransactionStatus>,
    #[serde(default)]
    pub payment_details: Option<PaymentDetails>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionFilter {
    pub status: Option<TransactionStatus>,
    pub seller_id: Option<Uuid>,
    pub buyer_id: Option<Uuid>,
    pub vehicle_id: Option<Uuid>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub seller_id: Uuid,
    pub buyer_id: Uuid,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub amount: Decimal,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub payment_details: PaymentDetails,
    pub inspection_id: Option<Uuid>,
    pub notes: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i32,
}

impl From<TransactionModel> for TransactionResponse {
    fn from(model: TransactionModel) -> Self {
        let payment_details = model.payment_details();
        Self {
            id: model.id,
            vehicle_id: model.vehicle_id,
            seller_id: model.seller_id,
            buyer_id: model.buyer_id,
            kind: model.kind,
            status: model.status,
            amount: model.amount,
            currency: model.currency,
            payment_method: model.payment_method,
            payment_details,
            inspection_id: model.inspection_id,
            notes: model.notes,
            completed_at: model.completed_at,
            cancelled_at: model.cancelled_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
            version: model.version,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPage {
    pub items: Vec<TransactionResponse>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

fn validate_positive_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if *amount > Decimal::ZERO {
        Ok(())
    } else {
        let mut err = ValidationError::new("amount");
        err.message = Some("amount must be greater than zero".into());
        Err(err)
    }
}

fn validate_reference(reference: &str) -> Result<(), ValidationError> {
    if reference.trim().is_empty() {
        let mut err = ValidationError::new("transaction_reference");
        err.message = Some("transactionReference is required".into());
        Err(err)
    } else {
        Ok(())
    }
}

fn not_found(id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("transaction {} not found", id))
}

/// Owns the transaction lifecycle. Every operation takes the caller's user id
/// explicitly and authorizes against it.
#[derive(Clone)]
pub struct TransactionService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
    settings: ServiceSettings,
}

impl TransactionService {
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

    /// Proposes the sale of one of the caller's vehicles to `request.buyer_id`.
    #[instrument(skip(self, request), fields(seller_id = %seller_id, vehicle_id = %request.vehicle_id))]
    pub async fn create_transaction(
        &self,
        seller_id: Uuid,
        request: CreateTransactionRequest,
    ) -> Result<TransactionResponse, ServiceError> {
        request.validate()?;

        let db = &*self.db_pool;
        let vehicle = bounded(self.settings.db_operation_timeout, "load_vehicle", async {
            vehicle_repository::find_by_id(db, request.vehicle_id)
                .await
                .map_err(db_failure("load_vehicle"))
        })
        .await?
        .ok_or_else(|| ServiceError::NotFound("vehicle not found".to_string()))?;

        if vehicle.owner_id != seller_id {
            return Err(ServiceError::Forbidden(
                "you are not the owner of this vehicle".to_string(),
            ));
        }
        if !vehicle.status.is_available() {
            return Err(ServiceError::ValidationError(
                "vehicle is not available for sale".to_string(),
            ));
        }
        if request.buyer_id == seller_id {
            return Err(ServiceError::ValidationError(
                "cannot create transaction with yourself".to_string(),
            ));
        }
        if let Some(inspection_id) = request.inspection_id {
            self.check_inspection(inspection_id, request.vehicle_id).await?;
        }

        let mut details = request.payment_details.clone().unwrap_or_default();
        details.transaction_reference = None;
        details.paid_at = None;
        details.validate_for(request.payment_method, request.amount)?;

        if request.payment_method == PaymentMethod::Financing {
            let quote = financing::quote_for(&details, request.amount)?;
            details.financed_amount = Some(quote.financed_amount);
            details.monthly_payment = Some(quote.monthly_payment);
        } else {
            details.financed_amount = None;
            details.monthly_payment = None;
        }

        let now = Utc::now();
        let transaction_id = Uuid::new_v4();
        let currency = request
            .currency
            .as_deref()
            .unwrap_or(&self.settings.default_currency)
            .to_ascii_uppercase();

        let mut model = TransactionActiveModel {
            id: Set(transaction_id),
            vehicle_id: Set(request.vehicle_id),
            seller_id: Set(seller_id),
            buyer_id: Set(request.buyer_id),
            kind: Set(TransactionKind::Sale),
            status: Set(TransactionStatus::Pending),
            amount: Set(request.amount),
            currency: Set(currency),
            payment_method: Set(request.payment_method),
            inspection_id: Set(request.inspection_id),
            notes: Set(request.notes.clone()),
            completed_at: Set(None),
            cancelled_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            version: Set(1),
            ..Default::default()
        };
        model.set_payment_details(&details);

        let created = bounded(self.settings.db_operation_timeout, "insert_transaction", async {
            transaction_repository::insert(db, model)
                .await
                .map_err(db_failure("insert_transaction"))
        })
        .await?;

        info!(
            transaction_id = %created.id,
            buyer_id = %created.buyer_id,
            amount = %created.amount,
            payment_method = %created.payment_method,
            "Transaction created"
        );
        counter!("vehicle_market.transactions.created", 1);

        self.publish(Event::TransactionCreated {
            transaction_id: created.id,
            vehicle_id: created.vehicle_id,
            seller_id: created.seller_id,
            buyer_id: created.buyer_id,
        })
        .await;

        Ok(created.into())
    }

    /// Completes a pending sale and hands the vehicle to the buyer.
    ///
    /// Both row changes commit together or not at all.
    #[instrument(skip(self, request), fields(transaction_id = %id, caller = %caller))]
    pub async fn complete_transaction(
        &self,
        id: Uuid,
        caller: Uuid,
        request: CompleteTransactionRequest,
    ) -> Result<TransactionResponse, ServiceError> {
        request.validate()?;

        let result = bounded(
            self.settings.db_operation_timeout,
            "complete_transaction",
            self.complete_in_unit(id, caller, &request),
        )
        .await;

        let completed = match result {
            Ok(completed) => completed,
            Err(e) => {
                warn!(error = %e, "Transaction completion rolled back");
                counter!("vehicle_market.transactions.completion_rollbacks", 1);
                return Err(e);
            }
        };

        info!(
            vehicle_id = %completed.vehicle_id,
            buyer_id = %completed.buyer_id,
            "Transaction completed and vehicle transferred"
        );
        counter!("vehicle_market.transactions.completed", 1);

        self.publish(Event::TransactionCompleted {
            transaction_id: completed.id,
            vehicle_id: completed.vehicle_id,
            buyer_id: completed.buyer_id,
        })
        .await;

        Ok(completed.into())
    }

    async fn complete_in_unit(
        &self,
        id: Uuid,
        caller: Uuid,
        request: &CompleteTransactionRequest,
    ) -> Result<TransactionModel, ServiceError> {
        let db = &*self.db_pool;
        // Dropping `txn` on any early return rolls back both updates.
        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start completion transaction");
            ServiceError::DatabaseError(e)
        })?;

        let current = transaction_repository::find_by_id(&txn, id)
            .await
            .map_err(db_failure("load_transaction"))?
            .ok_or_else(|| not_found(id))?;

        if current.seller_id != caller {
            return Err(ServiceError::Forbidden(
                "only the seller can complete this transaction".to_string(),
            ));
        }
        current.status.complete()?;

        let now = Utc::now();
        let changed = transaction_repository::complete_pending(
            &txn,
            id,
            request.transaction_reference.trim(),
            request.notes.clone(),
            now,
        )
        .await
        .map_err(db_failure("complete_transaction"))?;
        if changed == 0 {
            return Err(ServiceError::InvalidState(
                "transaction is not pending".to_string(),
            ));
        }

        let moved = vehicle_repository::transfer_to_buyer(
            &txn,
            current.vehicle_id,
            current.seller_id,
            current.buyer_id,
            now,
        )
        .await
        .map_err(db_failure("transfer_vehicle"))?;
        if moved == 0 {
            let vehicle = vehicle_repository::find_by_id(&txn, current.vehicle_id)
                .await
                .map_err(db_failure("load_vehicle"))?;
            return Err(match vehicle {
                None => ServiceError::NotFound("vehicle not found".to_string()),
                Some(vehicle) => ServiceError::InvalidState(format!(
                    "vehicle {} can no longer be sold by this seller (status: {})",
                    vehicle.id, vehicle.status
                )),
            });
        }

        let completed = transaction_repository::find_by_id(&txn, id)
            .await
            .map_err(db_failure("reload_transaction"))?
            .ok_or_else(|| not_found(id))?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit completion transaction");
            ServiceError::DatabaseError(e)
        })?;

        Ok(completed)
    }

    /// Cancels a pending transaction on behalf of its seller or buyer.
    /// The vehicle is left untouched.
    #[instrument(skip(self, request), fields(transaction_id = %id, caller = %caller))]
    pub async fn cancel_transaction(
        &self,
        id: Uuid,
        caller: Uuid,
        request: CancelTransactionRequest,
    ) -> Result<TransactionResponse, ServiceError> {
        let cancelled = bounded(
            self.settings.db_operation_timeout,
            "cancel_transaction",
            self.cancel_pending(id, caller, request.notes),
        )
        .await?;

        info!("Transaction cancelled");
        counter!("vehicle_market.transactions.cancelled", 1);

        self.publish(Event::TransactionCancelled {
            transaction_id: cancelled.id,
            cancelled_by: caller,
        })
        .await;

        Ok(cancelled.into())
    }

    async fn cancel_pending(
        &self,
        id: Uuid,
        caller: Uuid,
        notes: Option<String>,
    ) -> Result<TransactionModel, ServiceError> {
        let db = &*self.db_pool;
        let current = transaction_repository::find_by_id(db, id)
            .await
            .map_err(db_failure("load_transaction"))?
            .ok_or_else(|| not_found(id))?;

        if !current.is_party(caller) {
            return Err(ServiceError::Forbidden(
                "you are not authorized to cancel this transaction".to_string(),
            ));
        }
        current.status.cancel()?;

        let changed = transaction_repository::cancel_pending(db, id, notes, Utc::now())
            .await
            .map_err(db_failure("cancel_transaction"))?;
        if changed == 0 {
            return Err(ServiceError::InvalidState(
                "only pending transactions can be cancelled".to_string(),
            ));
        }

        transaction_repository::find_by_id(db, id)
            .await
            .map_err(db_failure("reload_transaction"))?
            .ok_or_else(|| not_found(id))
    }

    /// Edits notes and payment details.
    ///
    /// A requested status goes through the guarded transitions: `cancelled`
    /// cancels, `completed` is refused because completion needs a payment
    /// reference, `pending` on a pending transaction changes nothing.
    #[instrument(skip(self, request), fields(transaction_id = %id, caller = %caller))]
    pub async fn update_transaction(
        &self,
        id: Uuid,
        caller: Uuid,
        request: UpdateTransactionRequest,
    ) -> Result<TransactionResponse, ServiceError> {
        let db = &*self.db_pool;
        let current = bounded(self.settings.db_operation_timeout, "load_transaction", async {
            transaction_repository::find_by_id(db, id)
                .await
                .map_err(db_failure("load_transaction"))
        })
        .await?
        .ok_or_else(|| not_found(id))?;

        if !current.is_party(caller) {
            return Err(ServiceError::Forbidden(
                "you are not authorized to update this transaction".to_string(),
            ));
        }

        match request.status {
            None => {}
            Some(TransactionStatus::Pending) if current.status == TransactionStatus::Pending => {}
            Some(TransactionStatus::Cancelled) => {
                if request.payment_details.is_some() {
                    return Err(ServiceError::ValidationError(
                        "payment details cannot be changed while cancelling".to_string(),
                    ));
                }
                return self
                    .cancel_transaction(id, caller, CancelTransactionRequest { notes: request.notes })
                    .await;
            }
            Some(TransactionStatus::Completed) => {
                return Err(ServiceError::ValidationError(
                    "completion requires a transactionReference; use the complete operation"
                        .to_string(),
                ));
            }
            Some(requested) => {
                return Err(ServiceError::InvalidState(format!(
                    "cannot move transaction from {} to {}",
                    current.status, requested
                )));
            }
        }

        if request.payment_details.is_none() && request.notes.is_none() {
            return Ok(current.into());
        }

        let mut changes = TransactionActiveModel {
            updated_at: Set(Utc::now()),
            ..Default::default()
        };

        if let Some(mut incoming) = request.payment_details {
            if current.status.is_terminal() {
                return Err(ServiceError::InvalidState(format!(
                    "payment details cannot change once a transaction is {}",
                    current.status
                )));
            }
            incoming.transaction_reference = None;
            incoming.paid_at = None;
            incoming.financed_amount = None;
            incoming.monthly_payment = None;

            let mut details = current.payment_details();
            details.merge(incoming);
            details.validate_for(current.payment_method, current.amount)?;
            if current.payment_method == PaymentMethod::Financing {
                let quote = financing::quote_for(&details, current.amount)?;
                details.financed_amount = Some(quote.financed_amount);
                details.monthly_payment = Some(quote.monthly_payment);
            }
            changes.set_payment_details(&details);
        }

        if let Some(notes) = request.notes {
            changes.notes = Set(Some(notes));
        }

        let updated = bounded(self.settings.db_operation_timeout, "update_transaction", async {
            let changed = transaction_repository::update_if_version(db, id, current.version, changes)
                .await
                .map_err(db_failure("update_transaction"))?;
            if changed == 0 {
                return Err(ServiceError::ConcurrentModification(id));
            }
            transaction_repository::find_by_id(db, id)
                .await
                .map_err(db_failure("reload_transaction"))?
                .ok_or_else(|| not_found(id))
        })
        .await?;

        info!(version = updated.version, "Transaction updated");
        self.publish(Event::TransactionUpdated(id)).await;

        Ok(updated.into())
    }

    #[instrument(skip(self))]
    pub async fn get_transaction(&self, id: Uuid) -> Result<TransactionResponse, ServiceError> {
        let db = &*self.db_pool;
        bounded(self.settings.db_operation_timeout, "get_transaction", async {
            transaction_repository::find_by_id(db, id)
                .await
                .map_err(db_failure("get_transaction"))
        })
        .await?
        .map(Into::into)
        .ok_or_else(|| not_found(id))
    }

    /// Transactions where `user_id` is seller or buyer, newest first.
    #[instrument(skip(self))]
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<TransactionResponse>, ServiceError> {
        self.find_all(transaction_repository::party_condition(user_id)).await
    }

    /// Every transaction for one vehicle, newest first.
    #[instrument(skip(self))]
    pub async fn list_for_vehicle(
        &self,
        vehicle_id: Uuid,
    ) -> Result<Vec<TransactionResponse>, ServiceError> {
        self.find_all(Condition::all().add(Column::VehicleId.eq(vehicle_id)))
            .await
    }

    #[instrument(skip(self))]
    pub async fn list_transactions(
        &self,
        filter: TransactionFilter,
    ) -> Result<TransactionPage, ServiceError> {
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
        if let Some(seller_id) = filter.seller_id {
            condition = condition.add(Column::SellerId.eq(seller_id));
        }
        if let Some(buyer_id) = filter.buyer_id {
            condition = condition.add(Column::BuyerId.eq(buyer_id));
        }
        if let Some(vehicle_id) = filter.vehicle_id {
            condition = condition.add(Column::VehicleId.eq(vehicle_id));
        }

        let db = &*self.db_pool;
        let (items, total) = bounded(self.settings.db_operation_timeout, "list_transactions", async {
            transaction_repository::find_page(db, condition, page)
                .await
                .map_err(db_failure("list_transactions"))
        })
        .await?;

        Ok(TransactionPage {
            items: items.into_iter().map(Into::into).collect(),
            total,
            page: page.page,
            limit: page.limit,
            total_pages: page.total_pages(total),
        })
    }

    async fn find_all(&self, condition: Condition) -> Result<Vec<TransactionResponse>, ServiceError> {
        let db = &*self.db_pool;
        let models = bounded(self.settings.db_operation_timeout, "list_transactions", async {
            transaction_repository::find_all(db, condition)
                .await
                .map_err(db_failure("list_transactions"))
        })
        .await?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    /// A cited inspection must exist, concern the same vehicle and not be
    /// cancelled.
    async fn check_inspection(&self, inspection_id: Uuid, vehicle_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let inspection = bounded(self.settings.db_operation_timeout, "load_inspection", async {
            inspection_repository::find_by_id(db, inspection_id)
                .await
                .map_err(db_failure("load_inspection"))
        })
        .await?
        .ok_or_else(|| ServiceError::NotFound("inspection not found".to_string()))?;

        if inspection.vehicle_id != vehicle_id {
            return Err(ServiceError::ValidationError(
                "inspection does not belong to this vehicle".to_string(),
            ));
        }
        if inspection.status == InspectionStatus::Cancelled {
            return Err(ServiceError::ValidationError(
                "inspection has been cancelled".to_string(),
            ));
        }
        Ok(())
    }

    async fn publish(&self, event: Event) {
        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, "Failed to publish transaction event");
            }
        }
    }
}
