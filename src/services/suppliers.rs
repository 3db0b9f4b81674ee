use crate::{
    db::DbPool,
    entities::{
        purchase::{self, Entity as PurchaseEntity},
        supplier::{self, Entity as SupplierEntity},
    },
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateSupplierRequest {
    #[validate(length(min = 1, max = 255, message = "Supplier name must be 1-255 characters"))]
    pub name: String,
    pub contact_info: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct UpdateSupplierRequest {
    #[validate(length(min = 1, max = 255, message = "Supplier name must be 1-255 characters"))]
    pub name: Option<String>,
    pub contact_info: Option<String>,
    pub active: Option<bool>,
}

#[derive(Clone)]
pub struct SupplierService {
    db_pool: Arc<DbPool>,
}

impl SupplierService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_supplier(
        &self,
        request: CreateSupplierRequest,
    ) -> Result<supplier::Model, ServiceError> {
        request.validate()?;

        let db = &*self.db_pool;
        let now = Utc::now();

        let model = supplier::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            contact_info: Set(request.contact_info),
            active: Set(true),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(db)
        .await?;

        info!(supplier_id = %model.id, "Supplier created");
        Ok(model)
    }

    #[instrument(skip(self, request))]
    pub async fn update_supplier(
        &self,
        supplier_id: Uuid,
        request: UpdateSupplierRequest,
    ) -> Result<supplier::Model, ServiceError> {
        request.validate()?;

        let db = &*self.db_pool;
        let existing = self.get_supplier(supplier_id).await?;

        let mut active: supplier::ActiveModel = existing.into();
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

    pub async fn get_supplier(&self, supplier_id: Uuid) -> Result<supplier::Model, ServiceError> {
        SupplierEntity::find_by_id(supplier_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Supplier {} not found", supplier_id)))
    }

    #[instrument(skip(self))]
    pub async fn list_suppliers(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<supplier::Model>, u64), ServiceError> {
        let db = &*self.db_pool;

        let paginator = SupplierEntity::find()
            .order_by_asc(supplier::Column::Name)
            .paginate(db, per_page.max(1));

        let total = paginator.num_items().await?;
        let suppliers = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((suppliers, total))
    }

    /// Deletes a supplier. Rejected while any purchase references it.
    #[instrument(skip(self))]
    pub async fn delete_supplier(&self, supplier_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let supplier = self.get_supplier(supplier_id).await?;

        let refs = PurchaseEntity::find()
            .filter(purchase::Column::SupplierId.eq(supplier_id))
            .count(db)
            .await?;
        if refs > 0 {
            return Err(ServiceError::Conflict(format!(
                "Supplier '{}' is referenced by {} purchase(s) and cannot be deleted",
                supplier.name, refs
            )));
        }

        SupplierEntity::delete_by_id(supplier_id).exec(db).await?;
        info!(%supplier_id, "Supplier deleted");
        Ok(())
    }
}
