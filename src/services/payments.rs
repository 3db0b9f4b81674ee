use crate::{
    db::DbPool,
    entities::{
        client::Entity as ClientEntity,
        payment::{self, Entity as PaymentEntity},
        payment_allocation::{self, Entity as PaymentAllocationEntity},
        sale::{PaymentStatus, SaleStatus},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    money,
    services::{ensure_not_future, sales},
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

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RecordPaymentRequest {
    pub client_id: Uuid,
    pub date: NaiveDate,
    pub amount: Decimal,
    #[validate(length(max = 2000, message = "Notes cannot exceed 2000 characters"))]
    pub notes: Option<String>,
}

/// Payment with its allocations and remaining unallocated amount.
#[derive(Debug, Serialize)]
pub struct PaymentDetails {
    pub payment: payment::Model,
    pub allocations: Vec<payment_allocation::Model>,
    pub allocated: Decimal,
    pub unallocated: Decimal,
}

/// Sum of a payment's allocations, rounded.
async fn allocated_amount<C: ConnectionTrait>(
    conn: &C,
    payment_id: Uuid,
) -> Result<Decimal, ServiceError> {
    let allocations = PaymentAllocationEntity::find()
        .filter(payment_allocation::Column::PaymentId.eq(payment_id))
        .all(conn)
        .await?;

    Ok(money::round_money(
        allocations.iter().map(|a| a.amount).sum::<Decimal>(),
    ))
}

async fn find_payment<C: ConnectionTrait>(
    conn: &C,
    payment_id: Uuid,
) -> Result<payment::Model, ServiceError> {
    PaymentEntity::find_by_id(payment_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Payment {} not found", payment_id)))
}

async fn find_allocation<C: ConnectionTrait>(
    conn: &C,
    allocation_id: Uuid,
) -> Result<payment_allocation::Model, ServiceError> {
    PaymentAllocationEntity::find_by_id(allocation_id)
        .one(conn)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("Payment allocation {} not found", allocation_id))
        })
}

/// Validates an allocation amount against both sides of the ledger.
///
/// `reclaimed` is the amount an existing allocation already holds; resizing
/// adds it back to the payment's unallocated amount and to the sale's
/// balance before checking, so shrinking an allocation always passes.
async fn check_allocation_fits<C: ConnectionTrait>(
    conn: &C,
    payment: &payment::Model,
    sale_id: Uuid,
    amount: Decimal,
    reclaimed: Decimal,
) -> Result<(), ServiceError> {
    let sale = sales::find_sale(conn, sale_id).await?;

    if sale.status == SaleStatus::Cancelled {
        return Err(ServiceError::SaleCancelled(format!(
            "Sale {} is cancelled and cannot receive payments",
            sale.folio
        )));
    }
    if sale.client_id != payment.client_id {
        return Err(ServiceError::ValidationError(format!(
            "Sale {} belongs to a different client than the payment",
            sale.folio
        )));
    }

    let allocated = allocated_amount(conn, payment.id).await?;
    let unallocated = money::round_money(payment.amount - allocated + reclaimed);
    if amount > unallocated {
        return Err(ServiceError::OverAllocation(format!(
            "allocation of {} exceeds the payment's unallocated amount {}",
            amount, unallocated
        )));
    }

    let total = sales::sale_total(conn, sale_id).await?;
    let paid = sales::amount_paid(conn, sale_id).await?;
    let balance = money::round_money(total - paid + reclaimed);
    if amount > balance {
        return Err(ServiceError::ExceedsSaleBalance(format!(
            "allocation of {} exceeds the outstanding balance {} of sale {}",
            amount, balance, sale.folio
        )));
    }

    Ok(())
}

/// Client payments and their allocation to sales.
///
/// Every allocation write recomputes the target sale's payment status
/// inside the same transaction.
#[derive(Clone)]
pub struct PaymentService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl PaymentService {
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
    pub async fn record_payment(
        &self,
        request: RecordPaymentRequest,
    ) -> Result<payment::Model, ServiceError> {
        request.validate()?;
        ensure_not_future(request.date, "Payment date")?;

        if request.amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Payment amount must be greater than 0".into(),
            ));
        }

        let db = &*self.db_pool;

        ClientEntity::find_by_id(request.client_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Client {} not found", request.client_id))
            })?;

        let amount = money::round_money(request.amount);
        let model = payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            client_id: Set(request.client_id),
            date: Set(request.date),
            amount: Set(amount),
            notes: Set(request.notes),
            created_at: Set(Utc::now()),
        }
        .insert(db)
        .await?;

        info!(payment_id = %model.id, %amount, "Payment recorded");
        self.emit(Event::PaymentRecorded {
            payment_id: model.id,
            amount,
        })
        .await;

        Ok(model)
    }

    pub async fn get_payment(&self, payment_id: Uuid) -> Result<payment::Model, ServiceError> {
        find_payment(&*self.db_pool, payment_id).await
    }

    /// Loads the payment with its allocations and unallocated remainder.
    #[instrument(skip(self))]
    pub async fn get_payment_with_details(
        &self,
        payment_id: Uuid,
    ) -> Result<PaymentDetails, ServiceError> {
        let db = &*self.db_pool;
        let payment = find_payment(db, payment_id).await?;

        let allocations = PaymentAllocationEntity::find()
            .filter(payment_allocation::Column::PaymentId.eq(payment_id))
            .all(db)
            .await?;

        let allocated =
            money::round_money(allocations.iter().map(|a| a.amount).sum::<Decimal>());
        let unallocated = money::round_money(payment.amount - allocated);

        Ok(PaymentDetails {
            payment,
            allocations,
            allocated,
            unallocated,
        })
    }

    #[instrument(skip(self))]
    pub async fn list_payments_for_client(
        &self,
        client_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<payment::Model>, u64), ServiceError> {
        let db = &*self.db_pool;

        let paginator = PaymentEntity::find()
            .filter(payment::Column::ClientId.eq(client_id))
            .order_by_desc(payment::Column::Date)
            .order_by_desc(payment::Column::CreatedAt)
            .paginate(db, per_page.max(1));

        let total = paginator.num_items().await?;
        let payments = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((payments, total))
    }

    /// Applies part of a payment to a sale.
    ///
    /// The amount must fit both the payment's unallocated remainder and the
    /// sale's outstanding balance; the sale's payment status is re-derived
    /// in the same transaction.
    #[instrument(skip(self))]
    pub async fn allocate(
        &self,
        payment_id: Uuid,
        sale_id: Uuid,
        amount: Decimal,
    ) -> Result<payment_allocation::Model, ServiceError> {
        let amount = money::round_money(amount);
        if amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Allocation amount must be greater than 0".into(),
            ));
        }

        let db = &*self.db_pool;
        let (allocation, transition) = db
            .transaction::<_, (payment_allocation::Model, Option<(PaymentStatus, PaymentStatus)>), ServiceError>(
                move |txn| {
                    Box::pin(async move {
                        let payment = find_payment(txn, payment_id).await?;
                        check_allocation_fits(txn, &payment, sale_id, amount, Decimal::ZERO)
                            .await?;

                        let allocation = payment_allocation::ActiveModel {
                            id: Set(Uuid::new_v4()),
                            payment_id: Set(payment_id),
                            sale_id: Set(sale_id),
                            amount: Set(amount),
                            created_at: Set(Utc::now()),
                        }
                        .insert(txn)
                        .await
                        .map_err(|e| {
                            let err = ServiceError::from(e);
                            if err.is_unique_violation() {
                                ServiceError::Conflict(format!(
                                    "Payment {} already has an allocation to sale {}; resize it instead",
                                    payment_id, sale_id
                                ))
                            } else {
                                err
                            }
                        })?;

                        let transition = sales::recompute_payment_status(txn, sale_id).await?;
                        Ok((allocation, transition))
                    })
                },
            )
            .await
            .map_err(ServiceError::from)?;

        info!(%payment_id, %sale_id, %amount, "Payment allocated");
        self.emit(Event::PaymentAllocated {
            payment_id,
            sale_id,
            amount,
        })
        .await;
        self.emit_status_change(sale_id, transition).await;

        Ok(allocation)
    }

    /// Resizes an existing allocation.
    ///
    /// The old amount is added back to both the payment's unallocated
    /// remainder and the sale's balance before the limits are checked, so
    /// shrinking always succeeds.
    #[instrument(skip(self))]
    pub async fn update_allocation(
        &self,
        allocation_id: Uuid,
        amount: Decimal,
    ) -> Result<payment_allocation::Model, ServiceError> {
        let amount = money::round_money(amount);
        if amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Allocation amount must be greater than 0".into(),
            ));
        }

        let db = &*self.db_pool;
        let (allocation, sale_id, transition) = db
            .transaction::<_,
                (
                    payment_allocation::Model,
                    Uuid,
                    Option<(PaymentStatus, PaymentStatus)>,
                ),
                ServiceError,
            >(move |txn| {
                Box::pin(async move {
                    let existing = find_allocation(txn, allocation_id).await?;
                    let payment = find_payment(txn, existing.payment_id).await?;

                    check_allocation_fits(
                        txn,
                        &payment,
                        existing.sale_id,
                        amount,
                        existing.amount,
                    )
                    .await?;

                    let sale_id = existing.sale_id;
                    let mut active: payment_allocation::ActiveModel = existing.into();
                    active.amount = Set(amount);
                    let allocation = active.update(txn).await?;

                    let transition = sales::recompute_payment_status(txn, sale_id).await?;
                    Ok((allocation, sale_id, transition))
                })
            })
            .await
            .map_err(ServiceError::from)?;

        self.emit(Event::PaymentAllocated {
            payment_id: allocation.payment_id,
            sale_id,
            amount,
        })
        .await;
        self.emit_status_change(sale_id, transition).await;

        Ok(allocation)
    }

    /// Removes an allocation, returning its amount to the payment's
    /// unallocated remainder and re-deriving the sale's payment status.
    #[instrument(skip(self))]
    pub async fn release_allocation(&self, allocation_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;

        let (payment_id, sale_id, amount, transition) = db
            .transaction::<_,
                (
                    Uuid,
                    Uuid,
                    Decimal,
                    Option<(PaymentStatus, PaymentStatus)>,
                ),
                ServiceError,
            >(move |txn| {
                Box::pin(async move {
                    let allocation = find_allocation(txn, allocation_id).await?;
                    let released = (allocation.payment_id, allocation.sale_id, allocation.amount);

                    PaymentAllocationEntity::delete_by_id(allocation_id)
                        .exec(txn)
                        .await?;

                    let transition = sales::recompute_payment_status(txn, released.1).await?;
                    Ok((released.0, released.1, released.2, transition))
                })
            })
            .await
            .map_err(ServiceError::from)?;

        info!(%payment_id, %sale_id, %amount, "Allocation released");
        self.emit(Event::AllocationReleased {
            payment_id,
            sale_id,
            amount,
        })
        .await;
        self.emit_status_change(sale_id, transition).await;

        Ok(())
    }

    /// Deletes a payment, releasing each of its allocations first so every
    /// affected sale's payment status is re-derived in the same transaction.
    #[instrument(skip(self))]
    pub async fn delete_payment(&self, payment_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;

        let transitions = db
            .transaction::<_, Vec<(Uuid, Option<(PaymentStatus, PaymentStatus)>)>, ServiceError>(
                move |txn| {
                    Box::pin(async move {
                        find_payment(txn, payment_id).await?;

                        let allocations = PaymentAllocationEntity::find()
                            .filter(payment_allocation::Column::PaymentId.eq(payment_id))
                            .all(txn)
                            .await?;

                        let mut transitions = Vec::with_capacity(allocations.len());
                        for allocation in allocations {
                            let sale_id = allocation.sale_id;
                            PaymentAllocationEntity::delete_by_id(allocation.id)
                                .exec(txn)
                                .await?;
                            let transition =
                                sales::recompute_payment_status(txn, sale_id).await?;
                            transitions.push((sale_id, transition));
                        }

                        PaymentEntity::delete_by_id(payment_id).exec(txn).await?;
                        Ok(transitions)
                    })
                },
            )
            .await
            .map_err(ServiceError::from)?;

        info!(%payment_id, "Payment deleted");
        self.emit(Event::PaymentDeleted(payment_id)).await;
        for (sale_id, transition) in transitions {
            self.emit_status_change(sale_id, transition).await;
        }

        Ok(())
    }

    /// The payment's amount not yet applied to any sale.
    pub async fn unallocated_amount(&self, payment_id: Uuid) -> Result<Decimal, ServiceError> {
        let db = &*self.db_pool;
        let payment = find_payment(db, payment_id).await?;
        let allocated = allocated_amount(db, payment_id).await?;
        Ok(money::round_money(payment.amount - allocated))
    }
}
