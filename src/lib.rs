//! Ledger core for a small-business inventory and receivables system.
//!
//! Products carry an on-hand stock quantity mutated only through purchase
//! and sale documents; client payments are allocated against sales to derive
//! each sale's payment status. Every mutation runs inside a database
//! transaction so stock, documents and allocations never drift apart.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod folio;
pub mod logging;
pub mod migrator;
pub mod money;
pub mod services;

pub use errors::ServiceError;
pub use services::AppServices;
