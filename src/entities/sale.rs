use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Sale document status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum SaleStatus {
    #[sea_orm(string_value = "PENDING")]
    Pending,
    #[sea_orm(string_value = "COMPLETED")]
    Completed,
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
}

/// Payment status derived from allocations: Paid when the balance reaches
/// exactly zero, Credit while something is outstanding, Cancelled when the
/// sale itself is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum PaymentStatus {
    #[sea_orm(string_value = "PAID")]
    Paid,
    #[sea_orm(string_value = "CREDIT")]
    Credit,
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
}

/// Sale document header. Owns its items, expenses and payment allocations.
///
/// `total` and `balance` are derived from line items, expenses and
/// allocations on demand; they are never stored.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sales")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    pub folio: String,

    /// Document date; never in the future
    pub date: Date,

    pub status: SaleStatus,

    pub payment_status: PaymentStatus,

    /// Optional credit due date
    pub due_date: Option<Date>,

    pub notes: Option<String>,

    pub client_id: Uuid,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::client::Entity",
        from = "Column::ClientId",
        to = "super::client::Column::Id"
    )]
    Client,
    #[sea_orm(has_many = "super::sale_item::Entity")]
    Items,
    #[sea_orm(has_many = "super::sale_expense::Entity")]
    Expenses,
    #[sea_orm(has_many = "super::payment_allocation::Entity")]
    Allocations,
}

impl Related<super::client::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Client.def()
    }
}

impl Related<super::sale_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl Related<super::sale_expense::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expenses.def()
    }
}

impl Related<super::payment_allocation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Allocations.def()
    }
}

impl Model {
    /// A sale is overdue when it is still on credit past its due date.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.payment_status == PaymentStatus::Credit
            && self.due_date.map(|due| due < today).unwrap_or(false)
    }
}

impl ActiveModelBehavior for ActiveModel {}
