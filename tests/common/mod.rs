#![allow(dead_code)]

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use comercio_api::{
    config::AppConfig,
    db::{self, DbConfig, DbPool},
    events::{self, EventSender},
    services::{
        clients::CreateClientRequest,
        products::CreateProductRequest,
        purchases::{CreatePurchaseRequest, PurchaseItemRequest},
        sales::{CreateSaleRequest, SaleItemRequest},
        suppliers::CreateSupplierRequest,
        AppServices,
    },
};
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Harness wiring all services to a fresh in-memory SQLite database.
///
/// A single pool connection keeps the in-memory database shared across the
/// whole test.
pub struct TestApp {
    pub services: AppServices,
    pub db: Arc<DbPool>,
    #[allow(dead_code)]
    event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_database_url("sqlite::memory:").await
    }

    pub async fn with_database_url(url: &str) -> Self {
        let cfg = AppConfig::new(url.to_string(), "test".to_string());

        let db_cfg = DbConfig {
            url: cfg.database_url.clone(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        };
        let pool = db::establish_connection_with_config(&db_cfg)
            .await
            .expect("failed to connect to test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations");

        let (tx, rx) = mpsc::channel(cfg.event_buffer);
        let event_task = tokio::spawn(events::process_events(rx));

        let db = Arc::new(pool);
        let services = AppServices::new(db.clone(), Some(Arc::new(EventSender::new(tx))));

        Self {
            services,
            db,
            event_task,
        }
    }
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub async fn seed_supplier(app: &TestApp, name: &str) -> Uuid {
    app.services
        .suppliers
        .create_supplier(CreateSupplierRequest {
            name: name.to_string(),
            contact_info: None,
        })
        .await
        .expect("failed to create supplier")
        .id
}

pub async fn seed_client(app: &TestApp, name: &str) -> Uuid {
    app.services
        .clients
        .create_client(CreateClientRequest {
            name: name.to_string(),
            contact_info: None,
        })
        .await
        .expect("failed to create client")
        .id
}

pub async fn seed_product(app: &TestApp, name: &str, initial_stock: Decimal) -> Uuid {
    let product = app
        .services
        .products
        .create_product(CreateProductRequest {
            name: name.to_string(),
            description: None,
            unit_type: comercio_api::entities::product::UnitType::Unit,
            reference_price: Decimal::new(1000, 2),
            min_stock: Decimal::ZERO,
        })
        .await
        .expect("failed to create product");

    if !initial_stock.is_zero() {
        app.services
            .products
            .adjust_stock(product.id, initial_stock)
            .await
            .expect("failed to seed stock");
    }

    product.id
}

/// Creates a Pending purchase for `supplier_id` dated today.
pub async fn seed_purchase(app: &TestApp, supplier_id: Uuid) -> Uuid {
    app.services
        .purchases
        .create_purchase(CreatePurchaseRequest {
            supplier_id,
            date: today(),
            notes: None,
        })
        .await
        .expect("failed to create purchase")
        .id
}

pub async fn add_purchase_item(
    app: &TestApp,
    purchase_id: Uuid,
    product_id: Uuid,
    quantity: Decimal,
    unit_price: Decimal,
) -> Uuid {
    app.services
        .purchases
        .add_item(
            purchase_id,
            PurchaseItemRequest {
                product_id,
                quantity,
                unit_price,
            },
        )
        .await
        .expect("failed to add purchase item")
        .id
}

/// Creates a Pending sale for `client_id` dated today.
pub async fn seed_sale(app: &TestApp, client_id: Uuid) -> Uuid {
    app.services
        .sales
        .create_sale(CreateSaleRequest {
            client_id,
            date: today(),
            due_date: None,
            notes: None,
        })
        .await
        .expect("failed to create sale")
        .id
}

pub async fn add_sale_item(
    app: &TestApp,
    sale_id: Uuid,
    product_id: Uuid,
    quantity: Decimal,
    unit_price: Decimal,
) -> Uuid {
    app.services
        .sales
        .add_item(
            sale_id,
            SaleItemRequest {
                product_id,
                quantity,
                unit_price,
            },
        )
        .await
        .expect("failed to add sale item")
        .id
}
