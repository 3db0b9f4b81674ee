use crate::{
    db::DbPool,
    entities::{
        client::Entity as ClientEntity,
        payment_allocation::{self, Entity as PaymentAllocationEntity},
        sale::{self, Entity as SaleEntity, PaymentStatus, SaleStatus},
        sale_expense::{self, Entity as SaleExpenseEntity},
        sale_item::{self, Entity as SaleItemEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    folio::{self, DocumentType},
    money,
    services::{ensure_not_future, products},
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

const FOLIO_INSERT_ATTEMPTS: usize = 3;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateSaleRequest {
    pub client_id: Uuid,
    pub date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    #[validate(length(max = 2000, message = "Notes cannot exceed 2000 characters"))]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SaleItemRequest {
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct SaleExpenseRequest {
    #[validate(length(min = 1, max = 255, message = "Description must be 1-255 characters"))]
    pub description: String,
    pub amount: Decimal,
}

/// Sale header with its lines, expenses and derived monetary state.
#[derive(Debug, Serialize)]
pub struct SaleDetails {
    pub sale: sale::Model,
    pub items: Vec<sale_item::Model>,
    pub expenses: Vec<sale_expense::Model>,
    pub total_items: Decimal,
    pub total_expenses: Decimal,
    pub total: Decimal,
    pub amount_paid: Decimal,
    pub balance: Decimal,
    pub is_overdue: bool,
}

fn validate_item_request(request: &SaleItemRequest) -> Result<(), ServiceError> {
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

/// Total of a sale's items plus expenses, rounded to money precision.
pub(crate) async fn sale_total<C: ConnectionTrait>(
    conn: &C,
    sale_id: Uuid,
) -> Result<Decimal, ServiceError> {
    let items = SaleItemEntity::find()
        .filter(sale_item::Column::SaleId.eq(sale_id))
        .all(conn)
        .await?;
    let expenses = SaleExpenseEntity::find()
        .filter(sale_expense::Column::SaleId.eq(sale_id))
        .all(conn)
        .await?;

    let total_items = items
        .iter()
        .map(|i| i.quantity * i.unit_price)
        .sum::<Decimal>();
    let total_expenses = expenses.iter().map(|e| e.amount).sum::<Decimal>();

    Ok(money::round_money(total_items + total_expenses))
}

/// Sum of all payment allocations against a sale, rounded.
pub(crate) async fn amount_paid<C: ConnectionTrait>(
    conn: &C,
    sale_id: Uuid,
) -> Result<Decimal, ServiceError> {
    let allocations = PaymentAllocationEntity::find()
        .filter(payment_allocation::Column::SaleId.eq(sale_id))
        .all(conn)
        .await?;

    Ok(money::round_money(
        allocations.iter().map(|a| a.amount).sum::<Decimal>(),
    ))
}

/// Re-derives a sale's payment status from its allocations and persists it
/// when it changed. Returns `(old, new)` when a transition happened.
///
/// Paid requires a positive total fully covered by allocations; anything
/// else outstanding is Credit. A cancelled sale always reads Cancelled.
pub(crate) async fn recompute_payment_status<C: ConnectionTrait>(
    conn: &C,
    sale_id: Uuid,
) -> Result<Option<(PaymentStatus, PaymentStatus)>, ServiceError> {
    let sale = find_sale(conn, sale_id).await?;

    let new_status = if sale.status == SaleStatus::Cancelled {
        PaymentStatus::Cancelled
    } else {
        let total = sale_total(conn, sale_id).await?;
        let paid = amount_paid(conn, sale_id).await?;
        if total > Decimal::ZERO && paid >= total {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Credit
        }
    };

    if new_status == sale.payment_status {
        return Ok(None);
    }

    let old_status = sale.payment_status;
    let mut active: sale::ActiveModel = sale.into();
    active.payment_status = Set(new_status);
    active.updated_at = Set(Some(Utc::now()));
    active.update(conn).await?;

    Ok(Some((old_status, new_status)))
}

pub(crate) async fn find_sale<C: ConnectionTrait>(
    conn: &C,
    sale_id: Uuid,
) -> Result<sale::Model, ServiceError> {
    SaleEntity::find_by_id(sale_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Sale {} not found", sale_id)))
}

async fn find_item<C: ConnectionTrait>(
    conn: &C,
    item_id: Uuid,
) -> Result<sale_item::Model, ServiceError> {
    SaleItemEntity::find_by_id(item_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Sale item {} not found", item_id)))
}

fn ensure_mutable(sale: &sale::Model) -> Result<(), ServiceError> {
    if sale.status == SaleStatus::Cancelled {
        return Err(ServiceError::SaleCancelled(format!(
            "Sale {} is cancelled; its items are frozen",
            sale.folio
        )));
    }
    Ok(())
}

/// Rejects shrinking a sale's total below what clients already paid.
async fn ensure_covers_allocations<C: ConnectionTrait>(
    conn: &C,
    sale: &sale::Model,
) -> Result<(), ServiceError> {
    let paid = amount_paid(conn, sale.id).await?;
    if paid.is_zero() {
        return Ok(());
    }
    let total = sale_total(conn, sale.id).await?;
    if total < paid {
        return Err(ServiceError::ExceedsSaleBalance(format!(
            "sale {} has {} already allocated; its total cannot drop to {}",
            sale.folio, paid, total
        )));
    }
    Ok(())
}

/// Sale aggregate: document lifecycle, line items, expenses and derived
/// payment state.
///
/// Item creation consumes product stock inside the row-write transaction;
/// cancellation restores every item and freezes the document.
#[derive(Clone)]
pub struct SaleService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl SaleService {
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

    async fn emit_status_change(
        &self,
        sale_id: Uuid,
        transition: Option<(PaymentStatus, PaymentStatus)>,
    ) {
        if let Some((old, new)) = transition {
            self.emit(Event::SalePaymentStatusChanged {
                sale_id,
                old_status: format!("{:?}", old),
                new_status: format!("{:?}", new),
            })
            .await;
        }
    }

    #[instrument(skip(self, request), fields(client_id = %request.client_id))]
    pub async fn create_sale(
        &self,
        request: CreateSaleRequest,
    ) -> Result<sale::Model, ServiceError> {
        request.validate()?;
        ensure_not_future(request.date, "Sale date")?;

        if let Some(due) = request.due_date {
            if due < request.date {
                return Err(ServiceError::ValidationError(
                    "Due date cannot precede the sale date".into(),
                ));
            }
        }

        let db = &*self.db_pool;

        ClientEntity::find_by_id(request.client_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Client {} not found", request.client_id))
            })?;

        let today = Utc::now().date_naive();
        let mut last_err = None;

        for _ in 0..FOLIO_INSERT_ATTEMPTS {
            let txn = db.begin().await?;
            let folio = folio::next_folio(&txn, DocumentType::Sale, today).await?;

            let now = Utc::now();
            let insert = sale::ActiveModel {
                id: Set(Uuid::new_v4()),
                folio: Set(folio.clone()),
                date: Set(request.date),
                status: Set(SaleStatus::Pending),
                payment_status: Set(PaymentStatus::Credit),
                due_date: Set(request.due_date),
                notes: Set(request.notes.clone()),
                client_id: Set(request.client_id),
                created_at: Set(now),
                updated_at: Set(Some(now)),
            }
            .insert(&txn)
            .await;

            match insert {
                Ok(model) => {
                    txn.commit().await?;
                    info!(sale_id = %model.id, folio = %model.folio, "Sale created");
                    self.emit(Event::SaleCreated {
                        sale_id: model.id,
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
            "could not allocate a unique sale folio after {} attempts: {}",
            FOLIO_INSERT_ATTEMPTS,
            last_err.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    pub async fn get_sale(&self, sale_id: Uuid) -> Result<sale::Model, ServiceError> {
        find_sale(&*self.db_pool, sale_id).await
    }

    /// Loads the sale with its lines, expenses and derived monetary state.
    #[instrument(skip(self))]
    pub async fn get_sale_with_details(&self, sale_id: Uuid) -> Result<SaleDetails, ServiceError> {
        let db = &*self.db_pool;
        let sale = find_sale(db, sale_id).await?;

        let items = SaleItemEntity::find()
            .filter(sale_item::Column::SaleId.eq(sale_id))
            .all(db)
            .await?;
        let expenses = SaleExpenseEntity::find()
            .filter(sale_expense::Column::SaleId.eq(sale_id))
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
        let paid = amount_paid(db, sale_id).await?;
        let balance = money::round_money(total - paid);
        let is_overdue = sale.is_overdue(Utc::now().date_naive());

        Ok(SaleDetails {
            sale,
            items,
            expenses,
            total_items,
            total_expenses,
            total,
            amount_paid: paid,
            balance,
            is_overdue,
        })
    }

    #[instrument(skip(self))]
    pub async fn list_sales(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<sale::Model>, u64), ServiceError> {
        let db = &*self.db_pool;

        let paginator = SaleEntity::find()
            .order_by_desc(sale::Column::Date)
            .order_by_desc(sale::Column::CreatedAt)
            .paginate(db, per_page.max(1));

        let total = paginator.num_items().await?;
        let sales = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((sales, total))
    }

    /// Sales on credit whose due date has passed.
    #[instrument(skip(self))]
    pub async fn list_overdue_sales(&self) -> Result<Vec<sale::Model>, ServiceError> {
        let db = &*self.db_pool;
        let today = Utc::now().date_naive();

        let sales = SaleEntity::find()
            .filter(sale::Column::PaymentStatus.eq(PaymentStatus::Credit))
            .filter(sale::Column::DueDate.lt(today))
            .order_by_asc(sale::Column::DueDate)
            .all(db)
            .await?;

        Ok(sales)
    }

    /// Marks the sale as Completed. No-op when already Completed.
    #[instrument(skip(self))]
    pub async fn complete_sale(&self, sale_id: Uuid) -> Result<sale::Model, ServiceError> {
        let db = &*self.db_pool;
        let sale = find_sale(db, sale_id).await?;

        match sale.status {
            SaleStatus::Completed => return Ok(sale),
            SaleStatus::Cancelled => {
                return Err(ServiceError::SaleCancelled(format!(
                    "Sale {} is cancelled and cannot be completed",
                    sale.folio
                )))
            }
            SaleStatus::Pending => {}
        }

        let folio = sale.folio.clone();
        let mut active: sale::ActiveModel = sale.into();
        active.status = Set(SaleStatus::Completed);
        active.updated_at = Set(Some(Utc::now()));
        let model = active.update(db).await?;

        info!(%sale_id, %folio, "Sale completed");
        self.emit(Event::SaleCompleted(sale_id)).await;

        Ok(model)
    }

    /// Cancels the sale, restoring every item's stock in one transaction and
    /// freezing the document. Rejected while any payment allocation exists;
    /// release or delete the payments first.
    #[instrument(skip(self))]
    pub async fn cancel_sale(&self, sale_id: Uuid) -> Result<sale::Model, ServiceError> {
        let db = &*self.db_pool;
        let sale = find_sale(db, sale_id).await?;

        if sale.status == SaleStatus::Cancelled {
            return Ok(sale);
        }

        let folio = sale.folio.clone();
        let model = db
            .transaction::<_, sale::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let allocated = amount_paid(txn, sale_id).await?;
                    if !allocated.is_zero() {
                        return Err(ServiceError::PaidSaleCancellation(sale_id));
                    }

                    let mut items = SaleItemEntity::find()
                        .filter(sale_item::Column::SaleId.eq(sale_id))
                        .all(txn)
                        .await?;

                    // Consistent lock order across multi-product operations.
                    items.sort_by_key(|item| item.product_id);

                    for item in &items {
                        products::restore_stock(txn, item.product_id, item.quantity).await?;
                    }

                    let mut active: sale::ActiveModel = sale.into();
                    active.status = Set(SaleStatus::Cancelled);
                    active.payment_status = Set(PaymentStatus::Cancelled);
                    active.updated_at = Set(Some(Utc::now()));
                    Ok(active.update(txn).await?)
                })
            })
            .await
            .map_err(ServiceError::from)?;

        info!(%sale_id, %folio, "Sale cancelled and stock restored");
        self.emit(Event::SaleCancelled(sale_id)).await;

        Ok(model)
    }

    /// Deletes a sale document. Only permitted once its stock effects are
    /// unwound: the sale must be Cancelled or have no items, and it may not
    /// have allocations.
    #[instrument(skip(self))]
    pub async fn delete_sale(&self, sale_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let sale = find_sale(db, sale_id).await?;

        let allocated = amount_paid(db, sale_id).await?;
        if !allocated.is_zero() {
            return Err(ServiceError::Conflict(format!(
                "Sale {} has payment allocations and cannot be deleted",
                sale.folio
            )));
        }

        if sale.status != SaleStatus::Cancelled {
            let item_count = SaleItemEntity::find()
                .filter(sale_item::Column::SaleId.eq(sale_id))
                .count(db)
                .await?;
            if item_count > 0 {
                return Err(ServiceError::Conflict(format!(
                    "Sale {} still has stock effects; cancel it before deleting",
                    sale.folio
                )));
            }
        }

        SaleEntity::delete_by_id(sale_id).exec(db).await?;
        Ok(())
    }

    /// Adds a line item, consuming product stock in the same transaction.
    /// Fails with `InsufficientStock` when less than the requested quantity
    /// is on hand, committing nothing.
    #[instrument(skip(self, request), fields(product_id = %request.product_id))]
    pub async fn add_item(
        &self,
        sale_id: Uuid,
        request: SaleItemRequest,
    ) -> Result<sale_item::Model, ServiceError> {
        validate_item_request(&request)?;

        let db = &*self.db_pool;
        let quantity = money::round_quantity(request.quantity);
        let unit_price = money::round_money(request.unit_price);
        let product_id = request.product_id;

        let (item, transition) = db
            .transaction::<_, (sale_item::Model, Option<(PaymentStatus, PaymentStatus)>), ServiceError>(
                move |txn| {
                    Box::pin(async move {
                        let sale = find_sale(txn, sale_id).await?;
                        ensure_mutable(&sale)?;

                        let item = sale_item::ActiveModel {
                            id: Set(Uuid::new_v4()),
                            sale_id: Set(sale_id),
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
                                    "Product {} is already on sale {}",
                                    product_id, sale.folio
                                ))
                            } else {
                                err
                            }
                        })?;

                        consume_stock(txn, product_id, quantity).await?;

                        let transition = recompute_payment_status(txn, sale_id).await?;
                        Ok((item, transition))
                    })
                },
            )
            .await
            .map_err(ServiceError::from)?;

        self.emit(Event::SaleItemWritten {
            sale_id,
            product_id,
            quantity_delta: quantity,
        })
        .await;
        self.emit_status_change(sale_id, transition).await;

        Ok(item)
    }

    /// Rewrites an item's quantity/price, applying the stock difference in
    /// the same transaction.
    #[instrument(skip(self, request))]
    pub async fn update_item(
        &self,
        item_id: Uuid,
        request: SaleItemRequest,
    ) -> Result<sale_item::Model, ServiceError> {
        validate_item_request(&request)?;

        let db = &*self.db_pool;
        let quantity = money::round_quantity(request.quantity);
        let unit_price = money::round_money(request.unit_price);

        let (item, sale_id, product_id, delta, transition) = db
            .transaction::<_,
                (
                    sale_item::Model,
                    Uuid,
                    Uuid,
                    Decimal,
                    Option<(PaymentStatus, PaymentStatus)>,
                ),
                ServiceError,
            >(move |txn| {
                Box::pin(async move {
                    let existing = find_item(txn, item_id).await?;
                    let sale = find_sale(txn, existing.sale_id).await?;
                    ensure_mutable(&sale)?;

                    if request.product_id != existing.product_id {
                        return Err(ServiceError::ValidationError(
                            "An item's product cannot be changed; delete and re-add".into(),
                        ));
                    }

                    let delta = quantity - existing.quantity;
                    let sale_id = existing.sale_id;
                    let product_id = existing.product_id;

                    let mut active: sale_item::ActiveModel = existing.into();
                    active.quantity = Set(quantity);
                    active.unit_price = Set(unit_price);
                    let item = active.update(txn).await?;

                    if delta > Decimal::ZERO {
                        consume_stock(txn, product_id, delta).await?;
                    } else if delta < Decimal::ZERO {
                        products::restore_stock(txn, product_id, -delta).await?;
                    }

                    ensure_covers_allocations(txn, &sale).await?;
                    let transition = recompute_payment_status(txn, sale_id).await?;

                    Ok((item, sale_id, product_id, delta, transition))
                })
            })
            .await
            .map_err(ServiceError::from)?;

        if !delta.is_zero() {
            self.emit(Event::SaleItemWritten {
                sale_id,
                product_id,
                quantity_delta: delta,
            })
            .await;
        }
        self.emit_status_change(sale_id, transition).await;

        Ok(item)
    }

    /// Removes an item, restoring its quantity to stock.
    #[instrument(skip(self))]
    pub async fn delete_item(&self, item_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;

        let (sale_id, product_id, transition) = db
            .transaction::<_, (Uuid, Uuid, Option<(PaymentStatus, PaymentStatus)>), ServiceError>(
                move |txn| {
                    Box::pin(async move {
                        let item = find_item(txn, item_id).await?;
                        let sale = find_sale(txn, item.sale_id).await?;
                        ensure_mutable(&sale)?;

                        products::restore_stock(txn, item.product_id, item.quantity).await?;

                        let ids = (item.sale_id, item.product_id);
                        SaleItemEntity::delete_by_id(item.id).exec(txn).await?;

                        ensure_covers_allocations(txn, &sale).await?;
                        let transition = recompute_payment_status(txn, ids.0).await?;
                        Ok((ids.0, ids.1, transition))
                    })
                },
            )
            .await
            .map_err(ServiceError::from)?;

        self.emit(Event::SaleItemDeleted {
            sale_id,
            product_id,
        })
        .await;
        self.emit_status_change(sale_id, transition).await;

        Ok(())
    }

    #[instrument(skip(self, request))]
    pub async fn add_expense(
        &self,
        sale_id: Uuid,
        request: SaleExpenseRequest,
    ) -> Result<sale_expense::Model, ServiceError> {
        request.validate()?;
        if request.amount < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Expense amount cannot be negative".into(),
            ));
        }

        let db = &*self.db_pool;
        let amount = money::round_money(request.amount);
        let description = request.description;

        let (expense, transition) = db
            .transaction::<_, (sale_expense::Model, Option<(PaymentStatus, PaymentStatus)>), ServiceError>(
                move |txn| {
                    Box::pin(async move {
                        let sale = find_sale(txn, sale_id).await?;
                        ensure_mutable(&sale)?;

                        let expense = sale_expense::ActiveModel {
                            id: Set(Uuid::new_v4()),
                            sale_id: Set(sale_id),
                            description: Set(description),
                            amount: Set(amount),
                        }
                        .insert(txn)
                        .await?;

                        let transition = recompute_payment_status(txn, sale_id).await?;
                        Ok((expense, transition))
                    })
                },
            )
            .await
            .map_err(ServiceError::from)?;

        self.emit_status_change(sale_id, transition).await;

        Ok(expense)
    }

    #[instrument(skip(self))]
    pub async fn delete_expense(&self, expense_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;

        let (sale_id, transition) = db
            .transaction::<_, (Uuid, Option<(PaymentStatus, PaymentStatus)>), ServiceError>(
                move |txn| {
                    Box::pin(async move {
                        let expense = SaleExpenseEntity::find_by_id(expense_id)
                            .one(txn)
                            .await?
                            .ok_or_else(|| {
                                ServiceError::NotFound(format!(
                                    "Sale expense {} not found",
                                    expense_id
                                ))
                            })?;

                        let sale = find_sale(txn, expense.sale_id).await?;
                        ensure_mutable(&sale)?;

                        let sale_id = expense.sale_id;
                        SaleExpenseEntity::delete_by_id(expense_id).exec(txn).await?;

                        ensure_covers_allocations(txn, &sale).await?;
                        let transition = recompute_payment_status(txn, sale_id).await?;
                        Ok((sale_id, transition))
                    })
                },
            )
            .await
            .map_err(ServiceError::from)?;

        self.emit_status_change(sale_id, transition).await;

        Ok(())
    }
}

/// Decrements stock for a sale, mapping the ledger guard to the
/// sale-specific insufficient-stock error.
async fn consume_stock<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    quantity: Decimal,
) -> Result<Decimal, ServiceError> {
    match products::apply_stock_delta(conn, product_id, -quantity).await {
        Err(ServiceError::NegativeStock(msg)) => Err(ServiceError::InsufficientStock(msg)),
        other => other,
    }
}
