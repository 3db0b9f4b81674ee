mod common;

use common::*;
use comercio_api::{
    entities::{product_cost_history::CostSource, purchase::PurchaseStatus},
    services::purchases::{PurchaseExpenseRequest, PurchaseItemRequest},
    ServiceError,
};
use rust_decimal_macros::dec;

#[tokio::test]
async fn folios_are_sequential_per_day() {
    let app = TestApp::new().await;
    let supplier_id = seed_supplier(&app, "Acme Wholesale").await;

    let first_id = seed_purchase(&app, supplier_id).await;
    let second_id = seed_purchase(&app, supplier_id).await;
    let first = app.services.purchases.get_purchase(first_id).await.unwrap();
    let second = app.services.purchases.get_purchase(second_id).await.unwrap();

    let day = today().format("%Y%m%d").to_string();
    assert_eq!(first.folio, format!("PURCHASE-{}-00001", day));
    assert_eq!(second.folio, format!("PURCHASE-{}-00002", day));
}

#[tokio::test]
async fn receiving_items_increments_stock_and_totals() {
    let app = TestApp::new().await;
    let supplier_id = seed_supplier(&app, "Acme Wholesale").await;
    let product_id = seed_product(&app, "Rice 1kg", dec!(0)).await;
    let purchase_id = seed_purchase(&app, supplier_id).await;

    add_purchase_item(&app, purchase_id, product_id, dec!(10), dec!(5.00)).await;
    app.services
        .purchases
        .add_expense(
            purchase_id,
            PurchaseExpenseRequest {
                description: "Freight".to_string(),
                amount: dec!(5.00),
            },
        )
        .await
        .unwrap();

    let product = app.services.products.get_product(product_id).await.unwrap();
    assert_eq!(product.stock, dec!(10));

    let details = app
        .services
        .purchases
        .get_purchase_with_details(purchase_id)
        .await
        .unwrap();
    assert_eq!(details.total_items, dec!(50.00));
    assert_eq!(details.total_expenses, dec!(5.00));
    assert_eq!(details.total, dec!(55.00));
}

#[tokio::test]
async fn item_update_applies_quantity_delta() {
    let app = TestApp::new().await;
    let supplier_id = seed_supplier(&app, "Acme Wholesale").await;
    let product_id = seed_product(&app, "Beans", dec!(0)).await;
    let purchase_id = seed_purchase(&app, supplier_id).await;
    let item_id = add_purchase_item(&app, purchase_id, product_id, dec!(10), dec!(5.00)).await;

    app.services
        .purchases
        .update_item(
            item_id,
            PurchaseItemRequest {
                product_id,
                quantity: dec!(7),
                unit_price: dec!(5.00),
            },
        )
        .await
        .unwrap();

    let product = app.services.products.get_product(product_id).await.unwrap();
    assert_eq!(product.stock, dec!(7));

    app.services.purchases.delete_item(item_id).await.unwrap();
    let product = app.services.products.get_product(product_id).await.unwrap();
    assert_eq!(product.stock, dec!(0));
}

#[tokio::test]
async fn completion_is_idempotent() {
    let app = TestApp::new().await;
    let supplier_id = seed_supplier(&app, "Acme Wholesale").await;
    let purchase_id = seed_purchase(&app, supplier_id).await;

    let first = app
        .services
        .purchases
        .complete_purchase(purchase_id)
        .await
        .unwrap();
    assert_eq!(first.status, PurchaseStatus::Completed);

    let second = app
        .services
        .purchases
        .complete_purchase(purchase_id)
        .await
        .unwrap();
    assert_eq!(second.status, PurchaseStatus::Completed);
}

#[tokio::test]
async fn item_on_completed_purchase_records_cost_history() {
    let app = TestApp::new().await;
    let supplier_id = seed_supplier(&app, "Acme Wholesale").await;
    let product_id = seed_product(&app, "Oil 1L", dec!(0)).await;
    let purchase_id = seed_purchase(&app, supplier_id).await;

    app.services
        .purchases
        .complete_purchase(purchase_id)
        .await
        .unwrap();
    add_purchase_item(&app, purchase_id, product_id, dec!(12), dec!(3.45)).await;

    let history = app
        .services
        .cost_history
        .history_for_product(product_id)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].cost, dec!(3.45));
    assert_eq!(history[0].source, CostSource::Purchase);
}

#[tokio::test]
async fn pending_purchase_items_record_no_cost_history() {
    let app = TestApp::new().await;
    let supplier_id = seed_supplier(&app, "Acme Wholesale").await;
    let product_id = seed_product(&app, "Flour", dec!(0)).await;
    let purchase_id = seed_purchase(&app, supplier_id).await;

    add_purchase_item(&app, purchase_id, product_id, dec!(12), dec!(3.45)).await;

    let history = app
        .services
        .cost_history
        .history_for_product(product_id)
        .await
        .unwrap();
    assert!(history.is_empty());
}

#[tokio::test]
async fn cancellation_reverts_stock_and_freezes_items() {
    let app = TestApp::new().await;
    let supplier_id = seed_supplier(&app, "Acme Wholesale").await;
    let product_id = seed_product(&app, "Sugar", dec!(0)).await;
    let purchase_id = seed_purchase(&app, supplier_id).await;
    add_purchase_item(&app, purchase_id, product_id, dec!(10), dec!(2.00)).await;

    let cancelled = app
        .services
        .purchases
        .cancel_purchase(purchase_id)
        .await
        .unwrap();
    assert_eq!(cancelled.status, PurchaseStatus::Cancelled);

    let product = app.services.products.get_product(product_id).await.unwrap();
    assert_eq!(product.stock, dec!(0));

    // Cancelling again is a no-op.
    app.services
        .purchases
        .cancel_purchase(purchase_id)
        .await
        .unwrap();

    let err = app
        .services
        .purchases
        .add_item(
            purchase_id,
            PurchaseItemRequest {
                product_id,
                quantity: dec!(1),
                unit_price: dec!(2.00),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[tokio::test]
async fn cancellation_fails_when_received_stock_was_consumed() {
    let app = TestApp::new().await;
    let supplier_id = seed_supplier(&app, "Acme Wholesale").await;
    let client_id = seed_client(&app, "Corner Store").await;
    let product_id = seed_product(&app, "Salt", dec!(0)).await;

    let purchase_id = seed_purchase(&app, supplier_id).await;
    add_purchase_item(&app, purchase_id, product_id, dec!(10), dec!(1.00)).await;
    app.services
        .purchases
        .complete_purchase(purchase_id)
        .await
        .unwrap();

    // Sell 8 of the 10 received units.
    let sale_id = seed_sale(&app, client_id).await;
    add_sale_item(&app, sale_id, product_id, dec!(8), dec!(1.50)).await;

    let err = app
        .services
        .purchases
        .cancel_purchase(purchase_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NegativeStock(_)));

    // Nothing committed: status and stock are untouched.
    let purchase = app
        .services
        .purchases
        .get_purchase(purchase_id)
        .await
        .unwrap();
    assert_eq!(purchase.status, PurchaseStatus::Completed);
    let product = app.services.products.get_product(product_id).await.unwrap();
    assert_eq!(product.stock, dec!(2));
}

#[tokio::test]
async fn deletion_requires_unwound_stock() {
    let app = TestApp::new().await;
    let supplier_id = seed_supplier(&app, "Acme Wholesale").await;
    let product_id = seed_product(&app, "Rice 1kg", dec!(0)).await;
    let purchase_id = seed_purchase(&app, supplier_id).await;
    add_purchase_item(&app, purchase_id, product_id, dec!(3), dec!(5.00)).await;

    let err = app
        .services
        .purchases
        .delete_purchase(purchase_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    app.services
        .purchases
        .cancel_purchase(purchase_id)
        .await
        .unwrap();
    app.services
        .purchases
        .delete_purchase(purchase_id)
        .await
        .unwrap();

    let err = app
        .services
        .purchases
        .get_purchase(purchase_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn duplicate_product_on_one_purchase_is_rejected() {
    let app = TestApp::new().await;
    let supplier_id = seed_supplier(&app, "Acme Wholesale").await;
    let product_id = seed_product(&app, "Beans", dec!(0)).await;
    let purchase_id = seed_purchase(&app, supplier_id).await;
    add_purchase_item(&app, purchase_id, product_id, dec!(2), dec!(1.00)).await;

    let err = app
        .services
        .purchases
        .add_item(
            purchase_id,
            PurchaseItemRequest {
                product_id,
                quantity: dec!(3),
                unit_price: dec!(1.00),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    // The failed insert left stock untouched.
    let product = app.services.products.get_product(product_id).await.unwrap();
    assert_eq!(product.stock, dec!(2));
}
