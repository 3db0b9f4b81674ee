//! SeaORM entities for the ledger core.

pub mod client;
pub mod payment;
pub mod payment_allocation;
pub mod product;
pub mod product_cost_history;
pub mod purchase;
pub mod purchase_expense;
pub mod purchase_item;
pub mod sale;
pub mod sale_expense;
pub mod sale_item;
pub mod supplier;
