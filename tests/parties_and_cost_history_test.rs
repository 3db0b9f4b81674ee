mod common;

use chrono::Duration;
use common::*;
use comercio_api::{
    entities::product_cost_history::CostSource,
    services::{
        clients::UpdateClientRequest,
        suppliers::{CreateSupplierRequest, UpdateSupplierRequest},
    },
    ServiceError,
};
use rust_decimal_macros::dec;

#[tokio::test]
async fn supplier_crud_roundtrip() {
    let app = TestApp::new().await;

    let supplier = app
        .services
        .suppliers
        .create_supplier(CreateSupplierRequest {
            name: "Acme Wholesale".to_string(),
            contact_info: Some("acme@example.com".to_string()),
        })
        .await
        .unwrap();
    assert!(supplier.active);

    let updated = app
        .services
        .suppliers
        .update_supplier(
            supplier.id,
            UpdateSupplierRequest {
                name: None,
                contact_info: None,
                active: Some(false),
            },
        )
        .await
        .unwrap();
    assert!(!updated.active);

    let (listed, total) = app.services.suppliers.list_suppliers(1, 10).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(listed[0].id, supplier.id);

    app.services
        .suppliers
        .delete_supplier(supplier.id)
        .await
        .unwrap();
    let err = app
        .services
        .suppliers
        .get_supplier(supplier.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn supplier_with_purchases_cannot_be_deleted() {
    let app = TestApp::new().await;
    let supplier_id = seed_supplier(&app, "Acme Wholesale").await;
    seed_purchase(&app, supplier_id).await;

    let err = app
        .services
        .suppliers
        .delete_supplier(supplier_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[tokio::test]
async fn client_with_documents_cannot_be_deleted() {
    let app = TestApp::new().await;
    let client_id = seed_client(&app, "Corner Store").await;
    seed_sale(&app, client_id).await;

    let err = app
        .services
        .clients
        .delete_client(client_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    app.services
        .clients
        .update_client(
            client_id,
            UpdateClientRequest {
                name: Some("Corner Store SA".to_string()),
                contact_info: None,
                active: None,
            },
        )
        .await
        .unwrap();
    let client = app.services.clients.get_client(client_id).await.unwrap();
    assert_eq!(client.name, "Corner Store SA");
}

#[tokio::test]
async fn empty_validation_is_rejected() {
    let app = TestApp::new().await;

    let err = app
        .services
        .suppliers
        .create_supplier(CreateSupplierRequest {
            name: String::new(),
            contact_info: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn manual_cost_entries_interleave_with_purchase_entries() {
    let app = TestApp::new().await;
    let supplier_id = seed_supplier(&app, "Acme Wholesale").await;
    let product_id = seed_product(&app, "Rice 1kg", dec!(0)).await;

    let purchase_id = seed_purchase(&app, supplier_id).await;
    app.services
        .purchases
        .complete_purchase(purchase_id)
        .await
        .unwrap();
    add_purchase_item(&app, purchase_id, product_id, dec!(10), dec!(4.80)).await;

    app.services
        .cost_history
        .add_manual_entry(product_id, dec!(5.10), today())
        .await
        .unwrap();

    let history = app
        .services
        .cost_history
        .history_for_product(product_id)
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().any(|h| h.source == CostSource::Manual));
    assert!(history.iter().any(|h| h.source == CostSource::Purchase));

    let latest = app
        .services
        .cost_history
        .latest_cost(product_id)
        .await
        .unwrap();
    assert!(latest.is_some());
}

#[tokio::test]
async fn manual_cost_entries_reject_bad_input() {
    let app = TestApp::new().await;
    let product_id = seed_product(&app, "Beans", dec!(0)).await;

    let err = app
        .services
        .cost_history
        .add_manual_entry(product_id, dec!(-1.00), today())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));

    let err = app
        .services
        .cost_history
        .add_manual_entry(product_id, dec!(1.00), today() + Duration::days(1))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn file_backed_database_runs_the_same_flows() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("comercio_test.db");
    let url = format!("sqlite://{}?mode=rwc", db_path.display());

    let app = TestApp::with_database_url(&url).await;
    let supplier_id = seed_supplier(&app, "Acme Wholesale").await;
    let product_id = seed_product(&app, "Rice 1kg", dec!(0)).await;
    let purchase_id = seed_purchase(&app, supplier_id).await;
    add_purchase_item(&app, purchase_id, product_id, dec!(5), dec!(2.00)).await;

    let product = app.services.products.get_product(product_id).await.unwrap();
    assert_eq!(product.stock, dec!(5));
}
