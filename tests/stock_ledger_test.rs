mod common;

use common::*;
use comercio_api::{
    entities::product::UnitType, services::products::CreateProductRequest, ServiceError,
};
use rust_decimal_macros::dec;

#[tokio::test]
async fn stock_adjustments_accumulate() {
    let app = TestApp::new().await;
    let product_id = seed_product(&app, "Rice 1kg", dec!(0)).await;

    let stock = app
        .services
        .products
        .adjust_stock(product_id, dec!(10))
        .await
        .unwrap();
    assert_eq!(stock, dec!(10));

    let stock = app
        .services
        .products
        .adjust_stock(product_id, dec!(-4.5))
        .await
        .unwrap();
    assert_eq!(stock, dec!(5.5));
}

#[tokio::test]
async fn decrement_below_zero_is_rejected_and_stock_unchanged() {
    let app = TestApp::new().await;
    let product_id = seed_product(&app, "Beans", dec!(3)).await;

    let err = app
        .services
        .products
        .adjust_stock(product_id, dec!(-5))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NegativeStock(_)));

    let product = app.services.products.get_product(product_id).await.unwrap();
    assert_eq!(product.stock, dec!(3));
}

#[tokio::test]
async fn zero_delta_is_a_noop() {
    let app = TestApp::new().await;
    let product_id = seed_product(&app, "Flour", dec!(7)).await;

    let stock = app
        .services
        .products
        .adjust_stock(product_id, dec!(0))
        .await
        .unwrap();
    assert_eq!(stock, dec!(7));
}

#[tokio::test]
async fn low_stock_flag_tracks_threshold() {
    let app = TestApp::new().await;
    let product = app
        .services
        .products
        .create_product(CreateProductRequest {
            name: "Oil 1L".to_string(),
            description: None,
            unit_type: UnitType::Unit,
            reference_price: dec!(3.50),
            min_stock: dec!(5),
        })
        .await
        .unwrap();

    assert!(app.services.products.is_low_stock(product.id).await.unwrap());

    app.services
        .products
        .adjust_stock(product.id, dec!(6))
        .await
        .unwrap();
    assert!(!app.services.products.is_low_stock(product.id).await.unwrap());
}

#[tokio::test]
async fn referenced_product_cannot_be_deleted() {
    let app = TestApp::new().await;
    let supplier_id = seed_supplier(&app, "Acme Wholesale").await;
    let product_id = seed_product(&app, "Sugar", dec!(0)).await;
    let purchase_id = seed_purchase(&app, supplier_id).await;
    add_purchase_item(&app, purchase_id, product_id, dec!(2), dec!(1.25)).await;

    let err = app
        .services
        .products
        .delete_product(product_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[tokio::test]
async fn unreferenced_product_can_be_deleted() {
    let app = TestApp::new().await;
    let product_id = seed_product(&app, "Ephemeral", dec!(0)).await;

    app.services.products.delete_product(product_id).await.unwrap();

    let err = app
        .services
        .products
        .get_product(product_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn last_purchase_cost_ignores_pending_and_cancelled() {
    let app = TestApp::new().await;
    let supplier_id = seed_supplier(&app, "Acme Wholesale").await;
    let product_id = seed_product(&app, "Salt", dec!(0)).await;

    // Pending purchase does not count.
    let pending = seed_purchase(&app, supplier_id).await;
    add_purchase_item(&app, pending, product_id, dec!(5), dec!(0.80)).await;
    assert_eq!(
        app.services
            .products
            .last_purchase_cost(product_id)
            .await
            .unwrap(),
        dec!(0)
    );

    let completed = seed_purchase(&app, supplier_id).await;
    add_purchase_item(&app, completed, product_id, dec!(5), dec!(0.95)).await;
    app.services
        .purchases
        .complete_purchase(completed)
        .await
        .unwrap();

    assert_eq!(
        app.services
            .products
            .last_purchase_cost(product_id)
            .await
            .unwrap(),
        dec!(0.95)
    );
}
