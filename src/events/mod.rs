use metrics::counter;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{TransactionStatus, VehicleStatus};

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Creates a bounded event channel.
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (EventSender::new(tx), rx)
}

/// Domain events published after a successful commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    TransactionCreated {
        transaction_id: Uuid,
        vehicle_id: Uuid,
        seller_id: Uuid,
        buyer_id: Uuid,
    },
    TransactionUpdated(Uuid),
    TransactionCompleted {
        transaction_id: Uuid,
        vehicle_id: Uuid,
        buyer_id: Uuid,
    },
    TransactionCancelled {
        transaction_id: Uuid,
        cancelled_by: Uuid,
    },
    VehicleRegistered {
        vehicle_id: Uuid,
        owner_id: Uuid,
    },
    VehicleStatusChanged {
        vehicle_id: Uuid,
        old_status: VehicleStatus,
        new_status: VehicleStatus,
    },
    InspectionScheduled {
        inspection_id: Uuid,
        vehicle_id: Uuid,
        inspector_id: Uuid,
    },
    InspectionCompleted {
        inspection_id: Uuid,
        vehicle_id: Uuid,
    },
    InspectionCancelled {
        inspection_id: Uuid,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::TransactionCreated { .. } => "transaction_created",
            Event::TransactionUpdated(_) => "transaction_updated",
            Event::TransactionCompleted { .. } => "transaction_completed",
            Event::TransactionCancelled { .. } => "transaction_cancelled",
            Event::VehicleRegistered { .. } => "vehicle_registered",
            Event::VehicleStatusChanged { .. } => "vehicle_status_changed",
            Event::InspectionScheduled { .. } => "inspection_scheduled",
            Event::InspectionCompleted { .. } => "inspection_completed",
            Event::InspectionCancelled { .. } => "inspection_cancelled",
        }
    }

    /// Transaction status implied by the event, if any.
    pub fn transaction_status(&self) -> Option<TransactionStatus> {
        match self {
            Event::TransactionCreated { .. } => Some(TransactionStatus::Pending),
            Event::TransactionCompleted { .. } => Some(TransactionStatus::Completed),
            Event::TransactionCancelled { .. } => Some(TransactionStatus::Cancelled),
            _ => None,
        }
    }
}

/// Drains the channel, logging each event until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        counter!("vehicle_market.events", 1, "event" => event.name());

        match &event {
            Event::TransactionCompleted {
                transaction_id,
                vehicle_id,
                buyer_id,
            } => {
                info!(
                    transaction_id = %transaction_id,
                    vehicle_id = %vehicle_id,
                    buyer_id = %buyer_id,
                    "Vehicle ownership transferred"
                );
            }
            Event::VehicleStatusChanged {
                vehicle_id,
                old_status,
                new_status,
            } => {
                info!(
                    vehicle_id = %vehicle_id,
                    old_status = %old_status,
                    new_status = %new_status,
                    "Vehicle status changed"
                );
            }
            Event::InspectionCompleted {
                inspection_id,
                vehicle_id,
            } => {
                info!(
                    inspection_id = %inspection_id,
                    vehicle_id = %vehicle_id,
                    "Inspection report filed"
                );
            }
            other => debug!(event = other.name(), "Received event: {:?}", other),
        }
    }

    info!("Event processing loop stopped");
}
