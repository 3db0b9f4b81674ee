use crate::{
    db::DbPool,
    entities::{
        product::{self, Entity as ProductEntity, UnitType},
        purchase::{self, PurchaseStatus},
        purchase_item::{self, Entity as PurchaseItemEntity},
        sale_item::{self, Entity as SaleItemEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    money,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, JoinType,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 255, message = "Product name must be 1-255 characters"))]
    pub name: String,
    pub description: Option<String>,
    pub unit_type: UnitType,
    pub reference_price: Decimal,
    pub min_stock: Decimal,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 255, message = "Product name must be 1-255 characters"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub unit_type: Option<UnitType>,
    pub reference_price: Option<Decimal>,
    pub min_stock: Option<Decimal>,
    pub active: Option<bool>,
}

/// Applies a signed quantity delta to a product's on-hand stock.
///
/// The mutation is a single conditional UPDATE: for a decrement the row is
/// only touched while `stock + delta >= 0`, so a concurrent writer observes
/// either the pre- or post-adjustment value, never a partial update. Returns
/// the new stock level.
pub(crate) async fn apply_stock_delta<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    delta: Decimal,
) -> Result<Decimal, ServiceError> {
    let delta = money::round_quantity(delta);

    if delta.is_zero() {
        let product = find_product(conn, product_id).await?;
        return Ok(product.stock);
    }

    let mut update = ProductEntity::update_many()
        .col_expr(
            product::Column::Stock,
            Expr::col(product::Column::Stock).add(delta),
        )
        .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(product::Column::Id.eq(product_id));

    if delta.is_sign_negative() {
        update = update.filter(product::Column::Stock.gte(-delta));
    }

    let result = update.exec(conn).await?;

    if result.rows_affected == 0 {
        // Either the product is gone or the guard rejected the decrement.
        let product = find_product(conn, product_id).await?;
        return Err(ServiceError::NegativeStock(format!(
            "adjusting '{}' by {} would leave stock negative (on hand: {})",
            product.name, delta, product.stock
        )));
    }

    let product = find_product(conn, product_id).await?;
    Ok(product.stock)
}

/// Unconditionally increments a product's stock.
///
/// Used for stock reversal paths that are symmetric with an earlier
/// decrement (sale item delete, sale cancellation) and therefore cannot go
/// negative.
pub(crate) async fn restore_stock<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    quantity: Decimal,
) -> Result<Decimal, ServiceError> {
    let quantity = money::round_quantity(quantity);

    let result = ProductEntity::update_many()
        .col_expr(
            product::Column::Stock,
            Expr::col(product::Column::Stock).add(quantity),
        )
        .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(product::Column::Id.eq(product_id))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(ServiceError::NotFound(format!(
            "Product {} not found",
            product_id
        )));
    }

    let product = find_product(conn, product_id).await?;
    Ok(product.stock)
}

pub(crate) async fn find_product<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
) -> Result<product::Model, ServiceError> {
    ProductEntity::find_by_id(product_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
}

/// Product catalog and stock ledger.
#[derive(Clone)]
pub struct ProductService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl ProductService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    async fn emit(&self, event: Event) {
        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, "Failed to send audit event");
            }
        }
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_product(
        &self,
        request: CreateProductRequest,
    ) -> Result<product::Model, ServiceError> {
        request.validate()?;

        if request.reference_price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Reference price cannot be negative".into(),
            ));
        }
        if request.min_stock < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Minimum stock cannot be negative".into(),
            ));
        }

        let db = &*self.db_pool;
        let now = Utc::now();

        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            description: Set(request.description),
            stock: Set(Decimal::ZERO),
            unit_type: Set(request.unit_type),
            reference_price: Set(money::round_money(request.reference_price)),
            min_stock: Set(money::round_quantity(request.min_stock)),
            active: Set(true),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(db)
        .await?;

        info!(product_id = %model.id, "Product created");
        self.emit(Event::ProductCreated(model.id)).await;

        Ok(model)
    }

    #[instrument(skip(self, request))]
    pub async fn update_product(
        &self,
        product_id: Uuid,
        request: UpdateProductRequest,
    ) -> Result<product::Model, ServiceError> {
        request.validate()?;

        if matches!(&request.reference_price, Some(p) if *p < Decimal::ZERO) {
            return Err(ServiceError::ValidationError(
                "Reference price cannot be negative".into(),
            ));
        }
        if matches!(&request.min_stock, Some(m) if *m < Decimal::ZERO) {
            return Err(ServiceError::ValidationError(
                "Minimum stock cannot be negative".into(),
            ));
        }

        let db = &*self.db_pool;
        let existing = find_product(db, product_id).await?;

        let mut active: product::ActiveModel = existing.into();
        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(description) = request.description {
            active.description = Set(Some(description));
        }
        if let Some(unit_type) = request.unit_type {
            active.unit_type = Set(unit_type);
        }
        if let Some(price) = request.reference_price {
            active.reference_price = Set(money::round_money(price));
        }
        if let Some(min_stock) = request.min_stock {
            active.min_stock = Set(money::round_quantity(min_stock));
        }
        if let Some(is_active) = request.active {
            active.active = Set(is_active);
        }
        active.updated_at = Set(Some(Utc::now()));

        let model = active.update(db).await?;

        self.emit(Event::ProductUpdated(product_id)).await;

        Ok(model)
    }

    pub async fn get_product(&self, product_id: Uuid) -> Result<product::Model, ServiceError> {
        find_product(&*self.db_pool, product_id).await
    }

    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<product::Model>, u64), ServiceError> {
        let db = &*self.db_pool;

        let paginator = ProductEntity::find()
            .order_by_asc(product::Column::Name)
            .paginate(db, per_page.max(1));

        let total = paginator.num_items().await?;
        let products = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((products, total))
    }

    /// Deletes a product. Rejected while any purchase or sale item still
    /// references it (protect semantics).
    #[instrument(skip(self))]
    pub async fn delete_product(&self, product_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let product = find_product(db, product_id).await?;

        let purchase_refs = PurchaseItemEntity::find()
            .filter(purchase_item::Column::ProductId.eq(product_id))
            .count(db)
            .await?;
        let sale_refs = SaleItemEntity::find()
            .filter(sale_item::Column::ProductId.eq(product_id))
            .count(db)
            .await?;

        if purchase_refs + sale_refs > 0 {
            return Err(ServiceError::Conflict(format!(
                "Product '{}' is referenced by {} document item(s) and cannot be deleted",
                product.name,
                purchase_refs + sale_refs
            )));
        }

        ProductEntity::delete_by_id(product_id).exec(db).await?;

        info!(%product_id, "Product deleted");
        self.emit(Event::ProductDeleted(product_id)).await;

        Ok(())
    }

    /// Adjusts stock by a signed delta under the ledger guard.
    ///
    /// Returns the new stock level; fails with `NegativeStock` when the
    /// delta would leave the product below zero.
    #[instrument(skip(self))]
    pub async fn adjust_stock(
        &self,
        product_id: Uuid,
        delta: Decimal,
    ) -> Result<Decimal, ServiceError> {
        let db = &*self.db_pool;

        let new_stock = db
            .transaction::<_, Decimal, ServiceError>(move |txn| {
                Box::pin(async move { apply_stock_delta(txn, product_id, delta).await })
            })
            .await
            .map_err(ServiceError::from)?;

        self.emit(Event::StockAdjusted {
            product_id,
            delta,
            new_stock,
        })
        .await;
        self.check_low_stock(product_id).await?;

        Ok(new_stock)
    }

    /// Whether the product's stock has fallen below its minimum threshold.
    pub async fn is_low_stock(&self, product_id: Uuid) -> Result<bool, ServiceError> {
        let product = find_product(&*self.db_pool, product_id).await?;
        Ok(product.is_low_stock())
    }

    /// Unit price of the most recent item belonging to a Completed purchase,
    /// or zero when the product was never purchased.
    #[instrument(skip(self))]
    pub async fn last_purchase_cost(&self, product_id: Uuid) -> Result<Decimal, ServiceError> {
        let db = &*self.db_pool;

        let last_item = PurchaseItemEntity::find()
            .filter(purchase_item::Column::ProductId.eq(product_id))
            .join(JoinType::InnerJoin, purchase_item::Relation::Purchase.def())
            .filter(purchase::Column::Status.eq(PurchaseStatus::Completed))
            .order_by_desc(purchase::Column::Date)
            .one(db)
            .await?;

        Ok(last_item
            .map(|item| item.unit_price)
            .unwrap_or(Decimal::ZERO))
    }

    async fn check_low_stock(&self, product_id: Uuid) -> Result<(), ServiceError> {
        let product = find_product(&*self.db_pool, product_id).await?;
        if product.is_low_stock() {
            warn!(
                product_id = %product.id,
                stock = %product.stock,
                min_stock = %product.min_stock,
                "Product below minimum stock"
            );
            self.emit(Event::LowStock {
                product_id: product.id,
                stock: product.stock,
                min_stock: product.min_stock,
            })
            .await;
        }
        Ok(())
    }
}
