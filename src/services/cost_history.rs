use crate::{
    db::DbPool,
    entities::product_cost_history::{self, CostSource, Entity as CostHistoryEntity},
    errors::ServiceError,
    events::{Event, EventSender},
    money,
    services::{ensure_not_future, products},
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use tracing::{instrument, warn};
use uuid::Uuid;

/// Appends a purchase-sourced cost row for a product.
///
/// Called from inside the purchase-item transaction, once per item added to
/// a Completed purchase. Rows are append-only.
pub(crate) async fn record_purchase_cost<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    cost: Decimal,
    date: NaiveDate,
) -> Result<product_cost_history::Model, ServiceError> {
    let model = product_cost_history::ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(product_id),
        cost: Set(money::round_money(cost)),
        date: Set(date),
        source: Set(CostSource::Purchase),
        created_at: Set(Utc::now()),
    }
    .insert(conn)
    .await?;

    Ok(model)
}

/// Append-only cost trail per product.
#[derive(Clone)]
pub struct CostHistoryService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl CostHistoryService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Records a manually observed cost (stock count, supplier quote).
    #[instrument(skip(self))]
    pub async fn add_manual_entry(
        &self,
        product_id: Uuid,
        cost: Decimal,
        date: NaiveDate,
    ) -> Result<product_cost_history::Model, ServiceError> {
        if cost < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Cost cannot be negative".into(),
            ));
        }
        ensure_not_future(date, "Cost date")?;

        let db = &*self.db_pool;
        products::find_product(db, product_id).await?;

        let cost = money::round_money(cost);
        let model = product_cost_history::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            cost: Set(cost),
            date: Set(date),
            source: Set(CostSource::Manual),
            created_at: Set(Utc::now()),
        }
        .insert(db)
        .await?;

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::CostHistoryRecorded {
                    product_id,
                    cost,
                    date,
                })
                .await
            {
                warn!(error = %e, "Failed to send audit event");
            }
        }

        Ok(model)
    }

    /// Cost rows for a product, most recent first.
    #[instrument(skip(self))]
    pub async fn history_for_product(
        &self,
        product_id: Uuid,
    ) -> Result<Vec<product_cost_history::Model>, ServiceError> {
        let db = &*self.db_pool;
        products::find_product(db, product_id).await?;

        let rows = CostHistoryEntity::find()
            .filter(product_cost_history::Column::ProductId.eq(product_id))
            .order_by_desc(product_cost_history::Column::Date)
            .order_by_desc(product_cost_history::Column::CreatedAt)
            .all(db)
            .await?;

        Ok(rows)
    }

    /// The most recently recorded cost for a product, if any.
    pub async fn latest_cost(&self, product_id: Uuid) -> Result<Option<Decimal>, ServiceError> {
        let db = &*self.db_pool;

        let row = CostHistoryEntity::find()
            .filter(product_cost_history::Column::ProductId.eq(product_id))
            .order_by_desc(product_cost_history::Column::Date)
            .order_by_desc(product_cost_history::Column::CreatedAt)
            .one(db)
            .await?;

        Ok(row.map(|r| r.cost))
    }
}
