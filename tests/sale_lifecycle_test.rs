mod common;

use chrono::Duration;
use common::*;
use comercio_api::{
    entities::sale::{PaymentStatus, SaleStatus},
    services::{
        payments::RecordPaymentRequest,
        sales::{CreateSaleRequest, SaleItemRequest},
    },
    ServiceError,
};
use rust_decimal_macros::dec;

#[tokio::test]
async fn sale_folios_are_sequential_and_independent_of_purchases() {
    let app = TestApp::new().await;
    let supplier_id = seed_supplier(&app, "Acme Wholesale").await;
    let client_id = seed_client(&app, "Corner Store").await;

    seed_purchase(&app, supplier_id).await;
    let sale_id = seed_sale(&app, client_id).await;

    let sale = app.services.sales.get_sale(sale_id).await.unwrap();
    let day = today().format("%Y%m%d").to_string();
    assert_eq!(sale.folio, format!("SALE-{}-00001", day));
}

#[tokio::test]
async fn selling_consumes_stock() {
    let app = TestApp::new().await;
    let client_id = seed_client(&app, "Corner Store").await;
    let product_id = seed_product(&app, "Rice 1kg", dec!(10)).await;
    let sale_id = seed_sale(&app, client_id).await;

    add_sale_item(&app, sale_id, product_id, dec!(4), dec!(7.50)).await;

    let product = app.services.products.get_product(product_id).await.unwrap();
    assert_eq!(product.stock, dec!(6));

    let details = app
        .services
        .sales
        .get_sale_with_details(sale_id)
        .await
        .unwrap();
    assert_eq!(details.total, dec!(30.00));
    assert_eq!(details.balance, dec!(30.00));
    assert_eq!(details.amount_paid, dec!(0));
}

#[tokio::test]
async fn overselling_is_rejected_and_nothing_commits() {
    let app = TestApp::new().await;
    let client_id = seed_client(&app, "Corner Store").await;
    let product_id = seed_product(&app, "Beans", dec!(3)).await;
    let sale_id = seed_sale(&app, client_id).await;

    let err = app
        .services
        .sales
        .add_item(
            sale_id,
            SaleItemRequest {
                product_id,
                quantity: dec!(5),
                unit_price: dec!(2.00),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InsufficientStock(_)));

    // The item row rolled back along with the stock write.
    let details = app
        .services
        .sales
        .get_sale_with_details(sale_id)
        .await
        .unwrap();
    assert!(details.items.is_empty());
    let product = app.services.products.get_product(product_id).await.unwrap();
    assert_eq!(product.stock, dec!(3));
}

#[tokio::test]
async fn item_delete_restores_stock() {
    let app = TestApp::new().await;
    let client_id = seed_client(&app, "Corner Store").await;
    let product_id = seed_product(&app, "Flour", dec!(10)).await;
    let sale_id = seed_sale(&app, client_id).await;
    let item_id = add_sale_item(&app, sale_id, product_id, dec!(4), dec!(1.00)).await;

    app.services.sales.delete_item(item_id).await.unwrap();

    let product = app.services.products.get_product(product_id).await.unwrap();
    assert_eq!(product.stock, dec!(10));
}

#[tokio::test]
async fn item_update_moves_stock_by_the_difference() {
    let app = TestApp::new().await;
    let client_id = seed_client(&app, "Corner Store").await;
    let product_id = seed_product(&app, "Sugar", dec!(10)).await;
    let sale_id = seed_sale(&app, client_id).await;
    let item_id = add_sale_item(&app, sale_id, product_id, dec!(4), dec!(1.00)).await;

    // Grow the line: 4 -> 7 consumes 3 more.
    app.services
        .sales
        .update_item(
            item_id,
            SaleItemRequest {
                product_id,
                quantity: dec!(7),
                unit_price: dec!(1.00),
            },
        )
        .await
        .unwrap();
    let product = app.services.products.get_product(product_id).await.unwrap();
    assert_eq!(product.stock, dec!(3));

    // Shrink it back: 7 -> 2 restores 5.
    app.services
        .sales
        .update_item(
            item_id,
            SaleItemRequest {
                product_id,
                quantity: dec!(2),
                unit_price: dec!(1.00),
            },
        )
        .await
        .unwrap();
    let product = app.services.products.get_product(product_id).await.unwrap();
    assert_eq!(product.stock, dec!(8));
}

#[tokio::test]
async fn cancellation_restores_stock_and_cancels_payment_status() {
    let app = TestApp::new().await;
    let client_id = seed_client(&app, "Corner Store").await;
    let product_id = seed_product(&app, "Oil 1L", dec!(10)).await;
    let sale_id = seed_sale(&app, client_id).await;
    add_sale_item(&app, sale_id, product_id, dec!(4), dec!(3.00)).await;

    let cancelled = app.services.sales.cancel_sale(sale_id).await.unwrap();
    assert_eq!(cancelled.status, SaleStatus::Cancelled);
    assert_eq!(cancelled.payment_status, PaymentStatus::Cancelled);

    let product = app.services.products.get_product(product_id).await.unwrap();
    assert_eq!(product.stock, dec!(10));

    // Frozen after cancellation.
    let err = app
        .services
        .sales
        .add_item(
            sale_id,
            SaleItemRequest {
                product_id,
                quantity: dec!(1),
                unit_price: dec!(3.00),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::SaleCancelled(_)));

    let err = app.services.sales.complete_sale(sale_id).await.unwrap_err();
    assert!(matches!(err, ServiceError::SaleCancelled(_)));
}

#[tokio::test]
async fn sale_with_allocated_payments_cannot_be_cancelled() {
    let app = TestApp::new().await;
    let client_id = seed_client(&app, "Corner Store").await;
    let product_id = seed_product(&app, "Salt", dec!(10)).await;
    let sale_id = seed_sale(&app, client_id).await;
    add_sale_item(&app, sale_id, product_id, dec!(4), dec!(5.00)).await;

    let payment = app
        .services
        .payments
        .record_payment(RecordPaymentRequest {
            client_id,
            date: today(),
            amount: dec!(20.00),
            notes: None,
        })
        .await
        .unwrap();
    app.services
        .payments
        .allocate(payment.id, sale_id, dec!(20.00))
        .await
        .unwrap();

    let err = app.services.sales.cancel_sale(sale_id).await.unwrap_err();
    assert!(matches!(err, ServiceError::PaidSaleCancellation(_)));

    // Releasing the allocation unblocks cancellation.
    app.services.payments.delete_payment(payment.id).await.unwrap();
    let cancelled = app.services.sales.cancel_sale(sale_id).await.unwrap();
    assert_eq!(cancelled.status, SaleStatus::Cancelled);
}

#[tokio::test]
async fn sale_cannot_shrink_below_the_amount_already_paid() {
    let app = TestApp::new().await;
    let client_id = seed_client(&app, "Corner Store").await;
    let product_id = seed_product(&app, "Rice 1kg", dec!(10)).await;
    let sale_id = seed_sale(&app, client_id).await;
    let item_id = add_sale_item(&app, sale_id, product_id, dec!(2), dec!(10.00)).await;

    let payment = app
        .services
        .payments
        .record_payment(RecordPaymentRequest {
            client_id,
            date: today(),
            amount: dec!(20.00),
            notes: None,
        })
        .await
        .unwrap();
    app.services
        .payments
        .allocate(payment.id, sale_id, dec!(20.00))
        .await
        .unwrap();

    // Dropping the line to 10.00 would leave the sale over-paid.
    let err = app
        .services
        .sales
        .update_item(
            item_id,
            SaleItemRequest {
                product_id,
                quantity: dec!(1),
                unit_price: dec!(10.00),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ExceedsSaleBalance(_)));

    // Removing it entirely is rejected the same way.
    let err = app.services.sales.delete_item(item_id).await.unwrap_err();
    assert!(matches!(err, ServiceError::ExceedsSaleBalance(_)));

    // Everything rolled back: line, stock and balance are untouched.
    let details = app
        .services
        .sales
        .get_sale_with_details(sale_id)
        .await
        .unwrap();
    assert_eq!(details.items.len(), 1);
    assert_eq!(details.items[0].quantity, dec!(2));
    assert_eq!(details.balance, dec!(0));
    let product = app.services.products.get_product(product_id).await.unwrap();
    assert_eq!(product.stock, dec!(8));
}

#[tokio::test]
async fn overdue_tracking_uses_due_date_and_credit_status() {
    let app = TestApp::new().await;
    let client_id = seed_client(&app, "Corner Store").await;
    let product_id = seed_product(&app, "Rice 1kg", dec!(10)).await;

    let sale = app
        .services
        .sales
        .create_sale(CreateSaleRequest {
            client_id,
            date: today() - Duration::days(10),
            due_date: Some(today() - Duration::days(1)),
            notes: None,
        })
        .await
        .unwrap();
    add_sale_item(&app, sale.id, product_id, dec!(2), dec!(4.00)).await;

    let details = app
        .services
        .sales
        .get_sale_with_details(sale.id)
        .await
        .unwrap();
    assert!(details.is_overdue);

    let overdue = app.services.sales.list_overdue_sales().await.unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].id, sale.id);
}

#[tokio::test]
async fn due_date_cannot_precede_sale_date() {
    let app = TestApp::new().await;
    let client_id = seed_client(&app, "Corner Store").await;

    let err = app
        .services
        .sales
        .create_sale(CreateSaleRequest {
            client_id,
            date: today(),
            due_date: Some(today() - Duration::days(1)),
            notes: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn future_dated_sales_are_rejected() {
    let app = TestApp::new().await;
    let client_id = seed_client(&app, "Corner Store").await;

    let err = app
        .services
        .sales
        .create_sale(CreateSaleRequest {
            client_id,
            date: today() + Duration::days(1),
            due_date: None,
            notes: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));
}
