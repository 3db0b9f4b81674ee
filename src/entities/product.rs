use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Native unit a product's stock is counted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum UnitType {
    #[sea_orm(string_value = "KG")]
    Kg,
    #[sea_orm(string_value = "UNIT")]
    Unit,
    #[sea_orm(string_value = "BOX")]
    Box,
    #[sea_orm(string_value = "BULTO")]
    Bulto,
}

/// Product entity.
///
/// `stock` is the on-hand quantity and is only ever mutated through the
/// stock ledger paths (item create/update/delete, document cancellation);
/// callers never write it directly.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Display name, unique across the catalog
    #[sea_orm(unique)]
    pub name: String,

    pub description: Option<String>,

    /// On-hand quantity, 3 decimal places, never negative
    #[sea_orm(column_type = "Decimal(Some((14, 3)))")]
    pub stock: Decimal,

    pub unit_type: UnitType,

    /// Reference sale price
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub reference_price: Decimal,

    /// Threshold for low-stock alerts
    #[sea_orm(column_type = "Decimal(Some((14, 3)))")]
    pub min_stock: Decimal,

    pub active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::purchase_item::Entity")]
    PurchaseItems,
    #[sea_orm(has_many = "super::sale_item::Entity")]
    SaleItems,
    #[sea_orm(has_many = "super::product_cost_history::Entity")]
    CostHistory,
}

impl Related<super::purchase_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PurchaseItems.def()
    }
}

impl Related<super::sale_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SaleItems.def()
    }
}

impl Related<super::product_cost_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CostHistory.def()
    }
}

impl Model {
    /// Whether on-hand stock has fallen below the alert threshold.
    pub fn is_low_stock(&self) -> bool {
        self.stock < self.min_stock
    }
}

impl ActiveModelBehavior for ActiveModel {}
