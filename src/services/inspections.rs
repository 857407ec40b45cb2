use crate::{
    db::DbPool,
    entities::inspection::{ActiveModel as InspectionActiveModel, Column, Model as InspectionModel},
    errors::ServiceError,
    events::{Event, EventSender},
    models::{InspectionReport, InspectionStatus},
    repositories::{inspection_repository, transaction_repository, vehicle_repository, PageRequest},
    services::{bounded, db_failure, ServiceSettings},
};
use chrono::{DateTime, Utc};
use metrics::counter;
use sea_orm::{ActiveValue::Set, ColumnTrait, Condition};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleInspectionRequest {
    pub vehicle_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInspectionRequest {
    #[serde(default)]
    pub status: Option<InspectionStatus>,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub report: Option<InspectionReport>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CompleteInspectionRequest {
    #[validate]
    pub report: InspectionReport,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelInspectionRequest {
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectionFilter {
    pub status: Option<InspectionStatus>,
    pub vehicle_id: Option<Uuid>,
    pub inspector_id: Option<Uuid>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectionResponse {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub inspector_id: Uuid,
    pub status: InspectionStatus,
    pub scheduled_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub report: Option<InspectionReport>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<InspectionModel> for InspectionResponse {
    fn from(model: InspectionModel) -> Self {
        let report = model.report();
        Self {
            id: model.id,
            vehicle_id: model.vehicle_id,
            inspector_id: model.inspector_id,
            status: model.status,
            scheduled_at: model.scheduled_at,
            completed_at: model.completed_at,
            report,
            notes: model.notes,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectionPage {
    pub items: Vec<InspectionResponse>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

fn not_found() -> ServiceError {
    ServiceError::NotFound("inspection not found".to_string())
}

fn ensure_future(scheduled_at: DateTime<Utc>) -> Result<(), ServiceError> {
    if scheduled_at <= Utc::now() {
        return Err(ServiceError::ValidationError(
            "scheduledAt cannot be in the past".to_string(),
        ));
    }
    Ok(())
}

fn report_json(report: &InspectionReport) -> Result<serde_json::Value, ServiceError> {
    serde_json::to_value(report)
        .map_err(|e| ServiceError::InternalError(format!("failed to encode inspection report: {}", e)))
}

/// Inspections booked by an inspector against a listed vehicle. Only the
/// inspector who booked one may change it.
#[derive(Clone)]
pub struct InspectionService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
    settings: ServiceSettings,
}

impl InspectionService {
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

    /// Books an inspection of an existing vehicle at a future time.
    #[instrument(skip(self, request), fields(inspector_id = %inspector_id, vehicle_id = %request.vehicle_id))]
    pub async fn schedule_inspection(
        &self,
        inspector_id: Uuid,
        request: ScheduleInspectionRequest,
    ) -> Result<InspectionResponse, ServiceError> {
        ensure_future(request.scheduled_at)?;

        let db = &*self.db_pool;
        let created = bounded(self.settings.db_operation_timeout, "schedule_inspection", async {
            vehicle_repository::find_by_id(db, request.vehicle_id)
                .await
                .map_err(db_failure("load_vehicle"))?
                .ok_or_else(|| ServiceError::NotFound("vehicle not found".to_string()))?;

            let now = Utc::now();
            let model = InspectionActiveModel {
                id: Set(Uuid::new_v4()),
                vehicle_id: Set(request.vehicle_id),
                inspector_id: Set(inspector_id),
                status: Set(InspectionStatus::Scheduled),
                scheduled_at: Set(request.scheduled_at),
                completed_at: Set(None),
                report: Set(None),
                notes: Set(request.notes.clone()),
                created_at: Set(now),
                updated_at: Set(now),
            };
            inspection_repository::insert(db, model)
                .await
                .map_err(db_failure("insert_inspection"))
        })
        .await?;

        info!(inspection_id = %created.id, scheduled_at = %created.scheduled_at, "Inspection scheduled");
        counter!("vehicle_market.inspections.scheduled", 1);

        self.publish(Event::InspectionScheduled {
            inspection_id: created.id,
            vehicle_id: created.vehicle_id,
            inspector_id: created.inspector_id,
        })
        .await;

        Ok(created.into())
    }

    #[instrument(skip(self))]
    pub async fn get_inspection(&self, id: Uuid) -> Result<InspectionResponse, ServiceError> {
        self.load(id).await.map(Into::into)
    }

    /// Every inspection of one vehicle, most recently booked first.
    #[instrument(skip(self))]
    pub async fn list_for_vehicle(
        &self,
        vehicle_id: Uuid,
    ) -> Result<Vec<InspectionResponse>, ServiceError> {
        self.find_all(
            Condition::all().add(Column::VehicleId.eq(vehicle_id)),
            Column::CreatedAt,
        )
        .await
    }

    /// An inspector's appointments, latest first.
    #[instrument(skip(self))]
    pub async fn list_for_inspector(
        &self,
        inspector_id: Uuid,
    ) -> Result<Vec<InspectionResponse>, ServiceError> {
        self.find_all(
            Condition::all().add(Column::InspectorId.eq(inspector_id)),
            Column::ScheduledAt,
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn list_inspections(
        &self,
        filter: InspectionFilter,
    ) -> Result<InspectionPage, ServiceError> {
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
        if let Some(vehicle_id) = filter.vehicle_id {
            condition = condition.add(Column::VehicleId.eq(vehicle_id));
        }
        if let Some(inspector_id) = filter.inspector_id {
            condition = condition.add(Column::InspectorId.eq(inspector_id));
        }

        let db = &*self.db_pool;
        let (items, total) = bounded(self.settings.db_operation_timeout, "list_inspections", async {
            inspection_repository::find_page(db, condition, page)
                .await
                .map_err(db_failure("list_inspections"))
        })
        .await?;

        Ok(InspectionPage {
            items: items.into_iter().map(Into::into).collect(),
            total,
            page: page.page,
            limit: page.limit,
            total_pages: page.total_pages(total),
        })
    }

    /// Reschedules, drafts a report or edits notes.
    ///
    /// A requested status goes through the guarded transitions: `completed`
    /// files the given (or previously drafted) report, `cancelled` cancels,
    /// and `pending` may move to `scheduled`. Closed inspections only accept
    /// notes.
    #[instrument(skip(self, request), fields(inspection_id = %id, caller = %caller))]
    pub async fn update_inspection(
        &self,
        id: Uuid,
        caller: Uuid,
        request: UpdateInspectionRequest,
    ) -> Result<InspectionResponse, ServiceError> {
        if let Some(report) = &request.report {
            report.validate()?;
        }

        let current = self.load_for_inspector(id, caller).await?;

        match request.status {
            None => {}
            Some(requested) if requested == current.status => {}
            Some(InspectionStatus::Completed) => {
                if request.scheduled_at.is_some() {
                    return Err(ServiceError::ValidationError(
                        "scheduledAt cannot change while completing".to_string(),
                    ));
                }
                let report = request.report.or_else(|| current.report()).ok_or_else(|| {
                    ServiceError::ValidationError(
                        "a report is required to complete an inspection".to_string(),
                    )
                })?;
                return self
                    .complete_inspection(
                        id,
                        caller,
                        CompleteInspectionRequest {
                            report,
                            notes: request.notes,
                        },
                    )
                    .await;
            }
            Some(InspectionStatus::Cancelled) => {
                if request.scheduled_at.is_some() || request.report.is_some() {
                    return Err(ServiceError::ValidationError(
                        "only notes can accompany a cancellation".to_string(),
                    ));
                }
                return self
                    .cancel_inspection(id, caller, CancelInspectionRequest { notes: request.notes })
                    .await;
            }
            Some(InspectionStatus::Scheduled) if current.status == InspectionStatus::Pending => {}
            Some(requested) => {
                return Err(ServiceError::InvalidState(format!(
                    "cannot move inspection from {} to {}",
                    current.status, requested
                )));
            }
        }

        if !current.status.is_open() && (request.scheduled_at.is_some() || request.report.is_some())
        {
            return Err(ServiceError::InvalidState(format!(
                "a {} inspection only accepts notes",
                current.status
            )));
        }

        let mut changes = InspectionActiveModel {
            updated_at: Set(Utc::now()),
            ..Default::default()
        };
        if let Some(status) = request.status {
            changes.status = Set(status);
        }
        if let Some(scheduled_at) = request.scheduled_at {
            ensure_future(scheduled_at)?;
            changes.scheduled_at = Set(scheduled_at);
        }
        if let Some(report) = &request.report {
            changes.report = Set(Some(report_json(report)?));
        }
        if let Some(notes) = request.notes {
            changes.notes = Set(Some(notes));
        }

        let db = &*self.db_pool;
        let updated = bounded(self.settings.db_operation_timeout, "update_inspection", async {
            let changed = inspection_repository::update_if_status(db, id, current.status, changes)
                .await
                .map_err(db_failure("update_inspection"))?;
            if changed == 0 {
                return Err(ServiceError::ConcurrentModification(id));
            }
            inspection_repository::find_by_id(db, id)
                .await
                .map_err(db_failure("reload_inspection"))?
                .ok_or_else(not_found)
        })
        .await?;

        info!(status = %updated.status, "Inspection updated");
        Ok(updated.into())
    }

    /// Files the report and closes an open inspection.
    #[instrument(skip(self, request), fields(inspection_id = %id, caller = %caller))]
    pub async fn complete_inspection(
        &self,
        id: Uuid,
        caller: Uuid,
        request: CompleteInspectionRequest,
    ) -> Result<InspectionResponse, ServiceError> {
        request.validate()?;
        let report = report_json(&request.report)?;
        let critical_issues = request.report.has_critical_issues();

        let current = self.load_for_inspector(id, caller).await?;
        current.status.complete()?;

        let db = &*self.db_pool;
        let completed = bounded(self.settings.db_operation_timeout, "complete_inspection", async {
            let changed =
                inspection_repository::complete_open(db, id, report, request.notes, Utc::now())
                    .await
                    .map_err(db_failure("complete_inspection"))?;
            if changed == 0 {
                return Err(ServiceError::InvalidState(
                    "inspection is no longer open".to_string(),
                ));
            }
            inspection_repository::find_by_id(db, id)
                .await
                .map_err(db_failure("reload_inspection"))?
                .ok_or_else(not_found)
        })
        .await?;

        info!(critical_issues, "Inspection completed");
        counter!("vehicle_market.inspections.completed", 1);

        self.publish(Event::InspectionCompleted {
            inspection_id: completed.id,
            vehicle_id: completed.vehicle_id,
        })
        .await;

        Ok(completed.into())
    }

    #[instrument(skip(self, request), fields(inspection_id = %id, caller = %caller))]
    pub async fn cancel_inspection(
        &self,
        id: Uuid,
        caller: Uuid,
        request: CancelInspectionRequest,
    ) -> Result<InspectionResponse, ServiceError> {
        let current = self.load_for_inspector(id, caller).await?;
        current.status.cancel()?;

        let db = &*self.db_pool;
        let cancelled = bounded(self.settings.db_operation_timeout, "cancel_inspection", async {
            let changed = inspection_repository::cancel_open(db, id, request.notes, Utc::now())
                .await
                .map_err(db_failure("cancel_inspection"))?;
            if changed == 0 {
                return Err(ServiceError::InvalidState(
                    "inspection is no longer open".to_string(),
                ));
            }
            inspection_repository::find_by_id(db, id)
                .await
                .map_err(db_failure("reload_inspection"))?
                .ok_or_else(not_found)
        })
        .await?;

        info!("Inspection cancelled");
        counter!("vehicle_market.inspections.cancelled", 1);

        self.publish(Event::InspectionCancelled { inspection_id: id }).await;

        Ok(cancelled.into())
    }

    /// Removes an inspection that no transaction refers to.
    #[instrument(skip(self), fields(inspection_id = %id, caller = %caller))]
    pub async fn delete_inspection(&self, id: Uuid, caller: Uuid) -> Result<(), ServiceError> {
        self.load_for_inspector(id, caller).await?;

        let db = &*self.db_pool;
        bounded(self.settings.db_operation_timeout, "delete_inspection", async {
            let references = transaction_repository::count_for_inspection(db, id)
                .await
                .map_err(db_failure("count_inspection_references"))?;
            if references > 0 {
                return Err(ServiceError::InvalidState(format!(
                    "inspection is referenced by {} transaction(s)",
                    references
                )));
            }
            let removed = inspection_repository::delete(db, id)
                .await
                .map_err(db_failure("delete_inspection"))?;
            if removed == 0 {
                return Err(not_found());
            }
            Ok(())
        })
        .await?;

        info!("Inspection deleted");
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<InspectionModel, ServiceError> {
        let db = &*self.db_pool;
        bounded(self.settings.db_operation_timeout, "load_inspection", async {
            inspection_repository::find_by_id(db, id)
                .await
                .map_err(db_failure("load_inspection"))
        })
        .await?
        .ok_or_else(not_found)
    }

    async fn load_for_inspector(&self, id: Uuid, caller: Uuid) -> Result<InspectionModel, ServiceError> {
        let current = self.load(id).await?;
        if current.inspector_id != caller {
            return Err(ServiceError::Forbidden(
                "only the assigned inspector can change this inspection".to_string(),
            ));
        }
        Ok(current)
    }

    async fn find_all(
        &self,
        condition: Condition,
        order_by: Column,
    ) -> Result<Vec<InspectionResponse>, ServiceError> {
        let db = &*self.db_pool;
        let models = bounded(self.settings.db_operation_timeout, "list_inspections", async {
            inspection_repository::find_all(db, condition, order_by)
                .await
                .map_err(db_failure("list_inspections"))
        })
        .await?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn publish(&self, event: Event) {
        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, "Failed to publish inspection event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn past_appointments_are_rejected() {
        let err = ensure_future(Utc::now() - Duration::minutes(1)).unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(ref m) if m == "scheduledAt cannot be in the past"));
        assert!(ensure_future(Utc::now() + Duration::hours(1)).is_ok());
    }

    #[test]
    fn complete_request_accepts_camel_case_json() {
        let json = r#"{"report":{"overallCondition":"fair","mechanicalScore":60,"exteriorScore":70,
            "interiorScore":65,"issues":[{"category":"engine","severity":"critical",
            "description":"oil leak"}],"estimatedRepairs":"1200.50"},"notes":"see photos"}"#;
        let request: CompleteInspectionRequest = serde_json::from_str(json).unwrap();
        assert!(request.validate().is_ok());
        assert!(request.report.has_critical_issues());
        assert!(request.report.recommendations.is_empty());
        assert_eq!(request.notes.as_deref(), Some("see photos"));
    }

    #[test]
    fn nested_report_errors_surface() {
        let json = r#"{"report":{"overallCondition":"poor","mechanicalScore":140,"exteriorScore":70,
            "interiorScore":65,"estimatedRepairs":"0"}}"#;
        let request: CompleteInspectionRequest = serde_json::from_str(json).unwrap();
        let err: ServiceError = request.validate().unwrap_err().into();
        assert!(matches!(err, ServiceError::ValidationError(ref m) if m.contains("mechanicalScore must be between 0 and 100")));
    }
}
