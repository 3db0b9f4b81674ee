use crate::{
    db::DbPool,
    entities::{
        client::{self, Entity as ClientEntity},
        payment::{self, Entity as PaymentEntity},
        sale::{self, Entity as SaleEntity, PaymentStatus, SaleStatus},
    },
    errors::ServiceError,
    money,
    services::sales,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateClientRequest {
    #[validate(length(min = 1, max = 255, message = "Client name must be 1-255 characters"))]
    pub name: String,
    pub contact_info: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct UpdateClientRequest {
    #[validate(length(min = 1, max = 255, message = "Client name must be 1-255 characters"))]
    pub name: Option<String>,
    pub contact_info: Option<String>,
    pub active: Option<bool>,
}

#[derive(Clone)]
pub struct ClientService {
    db_pool: Arc<DbPool>,
}

impl ClientService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_client(
        &self,
        request: CreateClientRequest,
    ) -> Result<client::Model, ServiceError> {
        request.validate()?;

        let db = &*self.db_pool;
        let now = Utc::now();

        let model = client::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            contact_info: Set(request.contact_info),
            active: Set(true),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(db)
        .await?;

        info!(client_id = %model.id, "Client created");
        Ok(model)
    }

    #[instrument(skip(self, request))]
    pub async fn update_client(
        &self,
        client_id: Uuid,
        request: UpdateClientRequest,
    ) -> Result<client::Model, ServiceError> {
        request.validate()?;

        let db = &*self.db_pool;
        let existing = self.get_client(client_id).await?;

        let mut active: client::ActiveModel = existing.into();
        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(contact_info) = request.contact_info {
            active.contact_info = Set(Some(contact_info));
        }
        if let Some(is_active) = request.active {
            active.active = Set(is_active);
        }
        active.updated_at = Set(Some(Utc::now()));

        Ok(active.update(db).await?)
    }

    pub async fn get_client(&self, client_id: Uuid) -> Result<client::Model, ServiceError> {
        ClientEntity::find_by_id(client_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Client {} not found", client_id)))
    }

    #[instrument(skip(self))]
    pub async fn list_clients(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<client::Model>, u64), ServiceError> {
        let db = &*self.db_pool;

        let paginator = ClientEntity::find()
            .order_by_asc(client::Column::Name)
            .paginate(db, per_page.max(1));

        let total = paginator.num_items().await?;
        let clients = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((clients, total))
    }

    /// Deletes a client. Rejected while any sale or payment references it.
    #[instrument(skip(self))]
    pub async fn delete_client(&self, client_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let client = self.get_client(client_id).await?;

        let sale_refs = SaleEntity::find()
            .filter(sale::Column::ClientId.eq(client_id))
            .count(db)
            .await?;
        let payment_refs = PaymentEntity::find()
            .filter(payment::Column::ClientId.eq(client_id))
            .count(db)
            .await?;

        if sale_refs + payment_refs > 0 {
            return Err(ServiceError::Conflict(format!(
                "Client '{}' is referenced by {} document(s) and cannot be deleted",
                client.name,
                sale_refs + payment_refs
            )));
        }

        ClientEntity::delete_by_id(client_id).exec(db).await?;
        info!(%client_id, "Client deleted");
        Ok(())
    }

    /// Outstanding debt: the summed balance of the client's Completed sales
    /// that are still on credit. Pending sales are not yet owed.
    #[instrument(skip(self))]
    pub async fn total_debt(&self, client_id: Uuid) -> Result<Decimal, ServiceError> {
        let db = &*self.db_pool;
        self.get_client(client_id).await?;

        let credit_sales = SaleEntity::find()
            .filter(sale::Column::ClientId.eq(client_id))
            .filter(sale::Column::Status.eq(SaleStatus::Completed))
            .filter(sale::Column::PaymentStatus.eq(PaymentStatus::Credit))
            .all(db)
            .await?;

        let mut debt = Decimal::ZERO;
        for s in &credit_sales {
            let total = sales::sale_total(db, s.id).await?;
            let paid = sales::amount_paid(db, s.id).await?;
            debt += total - paid;
        }

        Ok(money::round_money(debt))
    }
}
