use metrics::counter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::manufacturing::stock_ledger_entry::MovementType;

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

    /// Sends an event after the owning transaction committed; a closed channel is only logged.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "Dropping domain event");
        }
    }
}

/// Domain events emitted once a business operation has been committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    MaterialCreated(Uuid),
    StockMoved {
        material_id: Uuid,
        movement: MovementType,
        quantity: Decimal,
        reference: String,
    },
    LowStock {
        material_id: Uuid,
        available: Decimal,
        reorder_level: Decimal,
    },

    WorkCenterCreated(Uuid),

    BomCreated(Uuid),
    BomApproved(Uuid),
    BomObsoleted(Uuid),

    ManufacturingOrderCreated(Uuid),
    ManufacturingOrderStatusChanged {
        mo_id: Uuid,
        old_status: String,
        new_status: String,
    },
    WorkOrdersGenerated {
        mo_id: Uuid,
        count: usize,
    },
    MaterialsReserved(Uuid),
    ManufacturingOrderCompleted(Uuid),

    WorkOrderStarted(Uuid),
    WorkOrderPaused(Uuid),
    WorkOrderCompleted(Uuid),
    WorkOrderCancelled(Uuid),
}

impl Event {
    /// Stable name used for logging and metrics labels.
    pub fn name(&self) -> &'static str {
        match self {
            Event::MaterialCreated(_) => "material_created",
            Event::StockMoved { .. } => "stock_moved",
            Event::LowStock { .. } => "low_stock",
            Event::WorkCenterCreated(_) => "work_center_created",
            Event::BomCreated(_) => "bom_created",
            Event::BomApproved(_) => "bom_approved",
            Event::BomObsoleted(_) => "bom_obsoleted",
            Event::ManufacturingOrderCreated(_) => "manufacturing_order_created",
            Event::ManufacturingOrderStatusChanged { .. } => "manufacturing_order_status_changed",
            Event::WorkOrdersGenerated { .. } => "work_orders_generated",
            Event::MaterialsReserved(_) => "materials_reserved",
            Event::ManufacturingOrderCompleted(_) => "manufacturing_order_completed",
            Event::WorkOrderStarted(_) => "work_order_started",
            Event::WorkOrderPaused(_) => "work_order_paused",
            Event::WorkOrderCompleted(_) => "work_order_completed",
            Event::WorkOrderCancelled(_) => "work_order_cancelled",
        }
    }
}

// Drains the channel and logs every event until all senders are dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        counter!("shopfloor.events.processed", 1, "event" => event.name());

        match &event {
            Event::LowStock {
                material_id,
                available,
                reorder_level,
            } => {
                warn!(
                    %material_id,
                    %available,
                    %reorder_level,
                    "Material at or below reorder level"
                );
            }
            Event::ManufacturingOrderStatusChanged {
                mo_id,
                old_status,
                new_status,
            } => {
                info!(%mo_id, %old_status, %new_status, "Manufacturing order status changed");
            }
            other => {
                info!(event = other.name(), payload = ?other, "Domain event");
            }
        }
    }

    warn!("Event processing loop has ended");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_or_log_tolerates_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        assert!(sender.send(Event::BomApproved(Uuid::nil())).await.is_err());
        sender.send_or_log(Event::BomApproved(Uuid::nil())).await;
    }

    #[tokio::test]
    async fn process_events_stops_when_senders_drop() {
        let (tx, rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        sender
            .send(Event::WorkOrdersGenerated {
                mo_id: Uuid::new_v4(),
                count: 2,
            })
            .await
            .unwrap();
        drop(sender);

        process_events(rx).await;
    }
}
