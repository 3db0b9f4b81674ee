//! Service layer. One service per aggregate; all state transitions run
//! inside database transactions and emit audit events on commit.

use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::events::EventSender;
use chrono::{NaiveDate, Utc};
use std::sync::Arc;

pub mod clients;
pub mod cost_history;
pub mod payments;
pub mod products;
pub mod purchases;
pub mod sales;
pub mod suppliers;

pub use clients::ClientService;
pub use cost_history::CostHistoryService;
pub use payments::PaymentService;
pub use products::ProductService;
pub use purchases::PurchaseService;
pub use sales::SaleService;
pub use suppliers::SupplierService;

/// Rejects document and payment dates set in the future.
pub(crate) fn ensure_not_future(date: NaiveDate, label: &str) -> Result<(), ServiceError> {
    if date > Utc::now().date_naive() {
        return Err(ServiceError::ValidationError(format!(
            "{} cannot be in the future",
            label
        )));
    }
    Ok(())
}

/// All services wired to one pool and one event stream.
#[derive(Clone)]
pub struct AppServices {
    pub products: ProductService,
    pub purchases: PurchaseService,
    pub sales: SaleService,
    pub payments: PaymentService,
    pub cost_history: CostHistoryService,
    pub suppliers: SupplierService,
    pub clients: ClientService,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            products: ProductService::new(db_pool.clone(), event_sender.clone()),
            purchases: PurchaseService::new(db_pool.clone(), event_sender.clone()),
            sales: SaleService::new(db_pool.clone(), event_sender.clone()),
            payments: PaymentService::new(db_pool.clone(), event_sender.clone()),
            cost_history: CostHistoryService::new(db_pool.clone(), event_sender),
            suppliers: SupplierService::new(db_pool.clone()),
            clients: ClientService::new(db_pool),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn future_dates_are_rejected() {
        let tomorrow = Utc::now().date_naive() + Duration::days(1);
        assert!(ensure_not_future(tomorrow, "Date").is_err());
        assert!(ensure_not_future(Utc::now().date_naive(), "Date").is_ok());
    }
}
