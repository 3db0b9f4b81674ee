use crate::{
    db::DbPool,
    entities::{
        purchase::{self, Entity as PurchaseEntity, PurchaseStatus},
        purchase_expense::{self, Entity as PurchaseExpenseEntity},
        purchase_item::{self, Entity as PurchaseItemEntity},
        supplier::Entity as SupplierEntity,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    folio::{self, DocumentType},
    money,
    services::{cost_history, ensure_not_future, products},
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Attempts before giving up on a folio collision under concurrent creation.
const FOLIO_INSERT_ATTEMPTS: usize = 3;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreatePurchaseRequest {
    pub supplier_id: Uuid,
    pub date: NaiveDate,
    #[validate(length(max = 2000, message = "Notes cannot exceed 2000 characters"))]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PurchaseItemRequest {
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct PurchaseExpenseRequest {
    #[validate(length(min = 1, max = 255, message = "Description must be 1-255 characters"))]
    pub description: String,
    pub amount: Decimal,
}

/// Purchase header with its lines, expenses and derived totals.
#[derive(Debug, Serialize)]
pub struct PurchaseDetails {
    pub purchase: purchase::Model,
    pub items: Vec<purchase_item::Model>,
    pub expenses: Vec<purchase_expense::Model>,
    pub total_items: Decimal,
    pub total_expenses: Decimal,
    pub total: Decimal,
}

fn validate_item_request(request: &PurchaseItemRequest) -> Result<(), ServiceError> {
    if request.quantity <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Quantity must be greater than 0".into(),
        ));
    }
    if request.unit_price < Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Unit price cannot be negative".into(),
        ));
    }
    Ok(())
}

/// Purchase aggregate: document lifecycle, line items and expenses.
///
/// Item mutations increment the referenced product's stock inside the same
/// transaction as the row write; cancellation reverts every item atomically.
#[derive(Clone)]
pub struct PurchaseService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl PurchaseService {
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

    #[instrument(skip(self, request), fields(supplier_id = %request.supplier_id))]
    pub async fn create_purchase(
        &self,
        request: CreatePurchaseRequest,
    ) -> Result<purchase::Model, ServiceError> {
        request.validate()?;
        ensure_not_future(request.date, "Purchase date")?;

        let db = &*self.db_pool;

        SupplierEntity::find_by_id(request.supplier_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Supplier {} not found", request.supplier_id))
            })?;

        let today = Utc::now().date_naive();
        let mut last_err = None;

        // The unique folio constraint serializes concurrent creation for the
        // same (type, day); collisions are retried with a fresh sequence.
        for _ in 0..FOLIO_INSERT_ATTEMPTS {
            let txn = db.begin().await?;
            let folio = folio::next_folio(&txn, DocumentType::Purchase, today).await?;

            let now = Utc::now();
            let insert = purchase::ActiveModel {
                id: Set(Uuid::new_v4()),
                folio: Set(folio.clone()),
                date: Set(request.date),
                status: Set(PurchaseStatus::Pending),
                notes: Set(request.notes.clone()),
                supplier_id: Set(request.supplier_id),
                created_at: Set(now),
                updated_at: Set(Some(now)),
            }
            .insert(&txn)
            .await;

            match insert {
                Ok(model) => {
                    txn.commit().await?;
                    info!(purchase_id = %model.id, folio = %model.folio, "Purchase created");
                    self.emit(Event::PurchaseCreated {
                        purchase_id: model.id,
                        folio: model.folio.clone(),
                    })
                    .await;
                    return Ok(model);
                }
                Err(e) => {
                    txn.rollback().await?;
                    let err = ServiceError::from(e);
                    if err.is_unique_violation() {
                        last_err = Some(err);
                        continue;
                    }
                    return Err(err);
                }
            }
        }

        Err(ServiceError::FolioGeneration(format!(
            "could not allocate a unique purchase folio after {} attempts: {}",
            FOLIO_INSERT_ATTEMPTS,
            last_err.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    pub async fn get_purchase(&self, purchase_id: Uuid) -> Result<purchase::Model, ServiceError> {
        find_purchase(&*self.db_pool, purchase_id).await
    }

    /// Loads the purchase with its items, expenses and rounded totals.
    #[instrument(skip(self))]
    pub async fn get_purchase_with_details(
        &self,
        purchase_id: Uuid,
    ) -> Result<PurchaseDetails, ServiceError> {
        let db = &*self.db_pool;
        let purchase = find_purchase(db, purchase_id).await?;

        let items = PurchaseItemEntity::find()
            .filter(purchase_item::Column::PurchaseId.eq(purchase_id))
            .all(db)
            .await?;
        let expenses = PurchaseExpenseEntity::find()
            .filter(purchase_expense::Column::PurchaseId.eq(purchase_id))
            .all(db)
            .await?;

        let total_items = money::round_money(
            items
                .iter()
                .map(|i| i.quantity * i.unit_price)
                .sum::<Decimal>(),
        );
        let total_expenses =
            money::round_money(expenses.iter().map(|e| e.amount).sum::<Decimal>());
        let total = money::round_money(total_items + total_expenses);

        Ok(PurchaseDetails {
            purchase,
            items,
            expenses,
            total_items,
            total_expenses,
            total,
        })
    }

    #[instrument(skip(self))]
    pub async fn list_purchases(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<purchase::Model>, u64), ServiceError> {
        let db = &*self.db_pool;

        let paginator = PurchaseEntity::find()
            .order_by_desc(purchase::Column::Date)
            .order_by_desc(purchase::Column::CreatedAt)
            .paginate(db, per_page.max(1));

        let total = paginator.num_items().await?;
        let purchases = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((purchases, total))
    }

    /// Marks the purchase as Completed. No-op when already Completed.
    #[instrument(skip(self))]
    pub async fn complete_purchase(
        &self,
        purchase_id: Uuid,
    ) -> Result<purchase::Model, ServiceError> {
        let db = &*self.db_pool;
        let purchase = find_purchase(db, purchase_id).await?;

        match purchase.status {
            PurchaseStatus::Completed => return Ok(purchase),
            PurchaseStatus::Cancelled => {
                return Err(ServiceError::Conflict(format!(
                    "Purchase {} is cancelled and cannot be completed",
                    purchase.folio
                )))
            }
            PurchaseStatus::Pending => {}
        }

        let folio = purchase.folio.clone();
        let mut active: purchase::ActiveModel = purchase.into();
        active.status = Set(PurchaseStatus::Completed);
        active.updated_at = Set(Some(Utc::now()));
        let model = active.update(db).await?;

        info!(%purchase_id, %folio, "Purchase completed");
        self.emit(Event::PurchaseCompleted(purchase_id)).await;

        Ok(model)
    }

    /// Cancels the purchase, reverting every item's stock effect in one
    /// transaction. No-op when already Cancelled; fails with
    /// `NegativeStock` when the received stock was already consumed
    /// elsewhere, committing nothing.
    #[instrument(skip(self))]
    pub async fn cancel_purchase(
        &self,
        purchase_id: Uuid,
    ) -> Result<purchase::Model, ServiceError> {
        let db = &*self.db_pool;
        let purchase = find_purchase(db, purchase_id).await?;

        if purchase.status == PurchaseStatus::Cancelled {
            return Ok(purchase);
        }

        let folio = purchase.folio.clone();
        let model = db
            .transaction::<_, purchase::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let mut items = PurchaseItemEntity::find()
                        .filter(purchase_item::Column::PurchaseId.eq(purchase_id))
                        .all(txn)
                        .await?;

                    // Consistent lock order across multi-product operations.
                    items.sort_by_key(|item| item.product_id);

                    for item in &items {
                        products::apply_stock_delta(txn, item.product_id, -item.quantity).await?;
                    }

                    let mut active: purchase::ActiveModel = purchase.into();
                    active.status = Set(PurchaseStatus::Cancelled);
                    active.updated_at = Set(Some(Utc::now()));
                    Ok(active.update(txn).await?)
                })
            })
            .await
            .map_err(ServiceError::from)?;

        info!(%purchase_id, %folio, "Purchase cancelled and stock reverted");
        self.emit(Event::PurchaseCancelled(purchase_id)).await;

        Ok(model)
    }

    /// Deletes a purchase document. Only permitted once its stock effects
    /// are unwound: the purchase must be Cancelled or have no items.
    #[instrument(skip(self))]
    pub async fn delete_purchase(&self, purchase_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let purchase = find_purchase(db, purchase_id).await?;

        if purchase.status != PurchaseStatus::Cancelled {
            let item_count = PurchaseItemEntity::find()
                .filter(purchase_item::Column::PurchaseId.eq(purchase_id))
                .count(db)
                .await?;
            if item_count > 0 {
                return Err(ServiceError::Conflict(format!(
                    "Purchase {} still has stock effects; cancel it before deleting",
                    purchase.folio
                )));
            }
        }

        PurchaseEntity::delete_by_id(purchase_id).exec(db).await?;
        Ok(())
    }

    /// Adds a line item, incrementing the product's stock in the same
    /// transaction. Under a Completed purchase the unit cost is appended to
    /// the product's cost history.
    #[instrument(skip(self, request), fields(product_id = %request.product_id))]
    pub async fn add_item(
        &self,
        purchase_id: Uuid,
        request: PurchaseItemRequest,
    ) -> Result<purchase_item::Model, ServiceError> {
        validate_item_request(&request)?;

        let db = &*self.db_pool;
        let quantity = money::round_quantity(request.quantity);
        let unit_price = money::round_money(request.unit_price);
        let product_id = request.product_id;

        let item = db
            .transaction::<_, purchase_item::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let purchase = find_purchase(txn, purchase_id).await?;
                    ensure_mutable(&purchase)?;

                    let item = purchase_item::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        purchase_id: Set(purchase_id),
                        product_id: Set(product_id),
                        quantity: Set(quantity),
                        unit_price: Set(unit_price),
                    }
                    .insert(txn)
                    .await
                    .map_err(|e| {
                        let err = ServiceError::from(e);
                        if err.is_unique_violation() {
                            ServiceError::Conflict(format!(
                                "Product {} is already on purchase {}",
                                product_id, purchase.folio
                            ))
                        } else {
                            err
                        }
                    })?;

                    products::apply_stock_delta(txn, product_id, quantity).await?;

                    if purchase.status == PurchaseStatus::Completed {
                        cost_history::record_purchase_cost(
                            txn,
                            product_id,
                            unit_price,
                            purchase.date,
                        )
                        .await?;
                    }

                    Ok(item)
                })
            })
            .await
            .map_err(ServiceError::from)?;

        self.emit(Event::PurchaseItemWritten {
            purchase_id,
            product_id,
            quantity_delta: quantity,
        })
        .await;

        Ok(item)
    }

    /// Rewrites an item's quantity/price, applying the quantity delta to
    /// stock in the same transaction.
    #[instrument(skip(self, request))]
    pub async fn update_item(
        &self,
        item_id: Uuid,
        request: PurchaseItemRequest,
    ) -> Result<purchase_item::Model, ServiceError> {
        validate_item_request(&request)?;

        let db = &*self.db_pool;
        let quantity = money::round_quantity(request.quantity);
        let unit_price = money::round_money(request.unit_price);

        let (item, purchase_id, product_id, delta) = db
            .transaction::<_, (purchase_item::Model, Uuid, Uuid, Decimal), ServiceError>(
                move |txn| {
                    Box::pin(async move {
                        let existing = find_item(txn, item_id).await?;
                        let purchase = find_purchase(txn, existing.purchase_id).await?;
                        ensure_mutable(&purchase)?;

                        if request.product_id != existing.product_id {
                            return Err(ServiceError::ValidationError(
                                "An item's product cannot be changed; delete and re-add".into(),
                            ));
                        }

                        let delta = quantity - existing.quantity;
                        let purchase_id = existing.purchase_id;
                        let product_id = existing.product_id;

                        let mut active: purchase_item::ActiveModel = existing.into();
                        active.quantity = Set(quantity);
                        active.unit_price = Set(unit_price);
                        let item = active.update(txn).await?;

                        if !delta.is_zero() {
                            products::apply_stock_delta(txn, product_id, delta).await?;
                        }

                        Ok((item, purchase_id, product_id, delta))
                    })
                },
            )
            .await
            .map_err(ServiceError::from)?;

        if !delta.is_zero() {
            self.emit(Event::PurchaseItemWritten {
                purchase_id,
                product_id,
                quantity_delta: delta,
            })
            .await;
        }

        Ok(item)
    }

    /// Removes an item, reverting its stock effect. Fails with
    /// `NegativeStock` (and keeps the row) when the stock was already
    /// consumed elsewhere.
    #[instrument(skip(self))]
    pub async fn delete_item(&self, item_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;

        let (purchase_id, product_id) = db
            .transaction::<_, (Uuid, Uuid), ServiceError>(move |txn| {
                Box::pin(async move {
                    let item = find_item(txn, item_id).await?;
                    let purchase = find_purchase(txn, item.purchase_id).await?;
                    ensure_mutable(&purchase)?;

                    products::apply_stock_delta(txn, item.product_id, -item.quantity).await?;

                    let ids = (item.purchase_id, item.product_id);
                    PurchaseItemEntity::delete_by_id(item.id).exec(txn).await?;
                    Ok(ids)
                })
            })
            .await
            .map_err(ServiceError::from)?;

        self.emit(Event::PurchaseItemDeleted {
            purchase_id,
            product_id,
        })
        .await;

        Ok(())
    }

    #[instrument(skip(self, request))]
    pub async fn add_expense(
        &self,
        purchase_id: Uuid,
        request: PurchaseExpenseRequest,
    ) -> Result<purchase_expense::Model, ServiceError> {
        request.validate()?;
        if request.amount < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Expense amount cannot be negative".into(),
            ));
        }

        let db = &*self.db_pool;
        let purchase = find_purchase(db, purchase_id).await?;
        ensure_mutable(&purchase)?;

        let expense = purchase_expense::ActiveModel {
            id: Set(Uuid::new_v4()),
            purchase_id: Set(purchase_id),
            description: Set(request.description),
            amount: Set(money::round_money(request.amount)),
        }
        .insert(db)
        .await?;

        Ok(expense)
    }

    #[instrument(skip(self))]
    pub async fn delete_expense(&self, expense_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;

        let expense = PurchaseExpenseEntity::find_by_id(expense_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Purchase expense {} not found", expense_id))
            })?;

        let purchase = find_purchase(db, expense.purchase_id).await?;
        ensure_mutable(&purchase)?;

        PurchaseExpenseEntity::delete_by_id(expense_id)
            .exec(db)
            .await?;
        Ok(())
    }
}

fn ensure_mutable(purchase: &purchase::Model) -> Result<(), ServiceError> {
    if purchase.status == PurchaseStatus::Cancelled {
        return Err(ServiceError::Conflict(format!(
            "Purchase {} is cancelled; its items are frozen",
            purchase.folio
        )));
    }
    Ok(())
}

async fn find_purchase<C: sea_orm::ConnectionTrait>(
    conn: &C,
    purchase_id: Uuid,
) -> Result<purchase::Model, ServiceError> {
    PurchaseEntity::find_by_id(purchase_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Purchase {} not found", purchase_id)))
}

async fn find_item<C: sea_orm::ConnectionTrait>(
    conn: &C,
    item_id: Uuid,
) -> Result<purchase_item::Model, ServiceError> {
    PurchaseItemEntity::find_by_id(item_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Purchase item {} not found", item_id)))
}
