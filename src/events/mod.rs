//! Audit event stream.
//!
//! Every state transition (complete, cancel, stock adjustment, allocation
//! write/release, cost-history append) emits an [`Event`]. The stream is
//! purely observational: consumers log and fan out, they never feed back
//! into the ledger.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

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

/// Events emitted by the ledger core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Catalog events
    ProductCreated(Uuid),
    ProductUpdated(Uuid),
    ProductDeleted(Uuid),
    StockAdjusted {
        product_id: Uuid,
        delta: Decimal,
        new_stock: Decimal,
    },
    LowStock {
        product_id: Uuid,
        stock: Decimal,
        min_stock: Decimal,
    },

    // Purchase events
    PurchaseCreated { purchase_id: Uuid, folio: String },
    PurchaseCompleted(Uuid),
    PurchaseCancelled(Uuid),
    PurchaseItemWritten {
        purchase_id: Uuid,
        product_id: Uuid,
        quantity_delta: Decimal,
    },
    PurchaseItemDeleted {
        purchase_id: Uuid,
        product_id: Uuid,
    },

    // Sale events
    SaleCreated { sale_id: Uuid, folio: String },
    SaleCompleted(Uuid),
    SaleCancelled(Uuid),
    SaleItemWritten {
        sale_id: Uuid,
        product_id: Uuid,
        quantity_delta: Decimal,
    },
    SaleItemDeleted {
        sale_id: Uuid,
        product_id: Uuid,
    },
    SalePaymentStatusChanged {
        sale_id: Uuid,
        old_status: String,
        new_status: String,
    },

    // Payment events
    PaymentRecorded { payment_id: Uuid, amount: Decimal },
    PaymentDeleted(Uuid),
    PaymentAllocated {
        payment_id: Uuid,
        sale_id: Uuid,
        amount: Decimal,
    },
    AllocationReleased {
        payment_id: Uuid,
        sale_id: Uuid,
        amount: Decimal,
    },

    // Cost history events
    CostHistoryRecorded {
        product_id: Uuid,
        cost: Decimal,
        date: NaiveDate,
    },
}

/// Consumes the event stream and logs each event.
///
/// Spawn once per process; the channel closing ends the loop.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::StockAdjusted {
                product_id,
                delta,
                new_stock,
            } => {
                info!(%product_id, %delta, %new_stock, "Stock adjusted");
            }
            Event::SalePaymentStatusChanged {
                sale_id,
                old_status,
                new_status,
            } => {
                info!(%sale_id, %old_status, %new_status, "Sale payment status changed");
            }
            other => {
                info!(event = ?other, "Ledger event");
            }
        }
    }

    info!("Event processing loop stopped");
}
