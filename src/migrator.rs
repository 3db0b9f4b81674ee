use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_parties_tables::Migration),
            Box::new(m20240101_000002_create_products_table::Migration),
            Box::new(m20240101_000003_create_purchase_tables::Migration),
            Box::new(m20240101_000004_create_sale_tables::Migration),
            Box::new(m20240101_000005_create_payment_tables::Migration),
            Box::new(m20240101_000006_create_cost_history_table::Migration),
        ]
    }
}

// Migration implementations

mod m20240101_000001_create_parties_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_parties_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Suppliers::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Suppliers::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Suppliers::Name).string_len(255).not_null())
                        .col(ColumnDef::new(Suppliers::ContactInfo).text())
                        .col(ColumnDef::new(Suppliers::Active).boolean().not_null().default(true))
                        .col(
                            ColumnDef::new(Suppliers::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Suppliers::UpdatedAt).timestamp_with_time_zone())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Clients::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Clients::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Clients::Name).string_len(255).not_null())
                        .col(ColumnDef::new(Clients::ContactInfo).text())
                        .col(ColumnDef::new(Clients::Active).boolean().not_null().default(true))
                        .col(
                            ColumnDef::new(Clients::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Clients::UpdatedAt).timestamp_with_time_zone())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_suppliers_name")
                        .table(Suppliers::Table)
                        .col(Suppliers::Name)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_clients_name")
                        .table(Clients::Table)
                        .col(Clients::Name)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Clients::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Suppliers::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Suppliers {
        Table,
        Id,
        Name,
        ContactInfo,
        Active,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub enum Clients {
        Table,
        Id,
        Name,
        ContactInfo,
        Active,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000002_create_products_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_products_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Products::Name)
                                .string_len(255)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Products::Description).text())
                        .col(
                            ColumnDef::new(Products::Stock)
                                .decimal_len(14, 3)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Products::UnitType).string_len(16).not_null())
                        .col(
                            ColumnDef::new(Products::ReferencePrice)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::MinStock)
                                .decimal_len(14, 3)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Products::Active).boolean().not_null().default(true))
                        .col(
                            ColumnDef::new(Products::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Products::UpdatedAt).timestamp_with_time_zone())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_products_stock")
                        .table(Products::Table)
                        .col(Products::Stock)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_products_active")
                        .table(Products::Table)
                        .col(Products::Active)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Products {
        Table,
        Id,
        Name,
        Description,
        Stock,
        UnitType,
        ReferencePrice,
        MinStock,
        Active,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000003_create_purchase_tables {
    use sea_orm_migration::prelude::*;

    use super::m20240101_000001_create_parties_tables::Suppliers;
    use super::m20240101_000002_create_products_table::Products;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_purchase_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Purchases::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Purchases::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Purchases::Folio)
                                .string_len(64)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Purchases::Date).date().not_null())
                        .col(ColumnDef::new(Purchases::Status).string_len(16).not_null())
                        .col(ColumnDef::new(Purchases::Notes).text())
                        .col(ColumnDef::new(Purchases::SupplierId).uuid().not_null())
                        .col(
                            ColumnDef::new(Purchases::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Purchases::UpdatedAt).timestamp_with_time_zone())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchases_supplier")
                                .from(Purchases::Table, Purchases::SupplierId)
                                .to(Suppliers::Table, Suppliers::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PurchaseItems::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(PurchaseItems::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(PurchaseItems::PurchaseId).uuid().not_null())
                        .col(ColumnDef::new(PurchaseItems::ProductId).uuid().not_null())
                        .col(
                            ColumnDef::new(PurchaseItems::Quantity)
                                .decimal_len(14, 3)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseItems::UnitPrice)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_items_purchase")
                                .from(PurchaseItems::Table, PurchaseItems::PurchaseId)
                                .to(Purchases::Table, Purchases::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_items_product")
                                .from(PurchaseItems::Table, PurchaseItems::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PurchaseExpenses::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseExpenses::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseExpenses::PurchaseId).uuid().not_null())
                        .col(
                            ColumnDef::new(PurchaseExpenses::Description)
                                .string_len(255)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseExpenses::Amount)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_expenses_purchase")
                                .from(PurchaseExpenses::Table, PurchaseExpenses::PurchaseId)
                                .to(Purchases::Table, Purchases::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("uq_purchase_items_purchase_product")
                        .table(PurchaseItems::Table)
                        .col(PurchaseItems::PurchaseId)
                        .col(PurchaseItems::ProductId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_purchases_date_status")
                        .table(Purchases::Table)
                        .col(Purchases::Date)
                        .col(Purchases::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_purchases_supplier_date")
                        .table(Purchases::Table)
                        .col(Purchases::SupplierId)
                        .col(Purchases::Date)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PurchaseExpenses::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PurchaseItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Purchases::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Purchases {
        Table,
        Id,
        Folio,
        Date,
        Status,
        Notes,
        SupplierId,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub enum PurchaseItems {
        Table,
        Id,
        PurchaseId,
        ProductId,
        Quantity,
        UnitPrice,
    }

    #[derive(DeriveIden)]
    pub enum PurchaseExpenses {
        Table,
        Id,
        PurchaseId,
        Description,
        Amount,
    }
}

mod m20240101_000004_create_sale_tables {
    use sea_orm_migration::prelude::*;

    use super::m20240101_000001_create_parties_tables::Clients;
    use super::m20240101_000002_create_products_table::Products;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_sale_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Sales::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Sales::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Sales::Folio)
                                .string_len(64)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Sales::Date).date().not_null())
                        .col(ColumnDef::new(Sales::Status).string_len(16).not_null())
                        .col(ColumnDef::new(Sales::PaymentStatus).string_len(16).not_null())
                        .col(ColumnDef::new(Sales::DueDate).date())
                        .col(ColumnDef::new(Sales::Notes).text())
                        .col(ColumnDef::new(Sales::ClientId).uuid().not_null())
                        .col(
                            ColumnDef::new(Sales::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Sales::UpdatedAt).timestamp_with_time_zone())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_sales_client")
                                .from(Sales::Table, Sales::ClientId)
                                .to(Clients::Table, Clients::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(SaleItems::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(SaleItems::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(SaleItems::SaleId).uuid().not_null())
                        .col(ColumnDef::new(SaleItems::ProductId).uuid().not_null())
                        .col(ColumnDef::new(SaleItems::Quantity).decimal_len(14, 3).not_null())
                        .col(ColumnDef::new(SaleItems::UnitPrice).decimal_len(12, 2).not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_sale_items_sale")
                                .from(SaleItems::Table, SaleItems::SaleId)
                                .to(Sales::Table, Sales::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_sale_items_product")
                                .from(SaleItems::Table, SaleItems::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(SaleExpenses::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(SaleExpenses::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(SaleExpenses::SaleId).uuid().not_null())
                        .col(
                            ColumnDef::new(SaleExpenses::Description)
                                .string_len(255)
                                .not_null(),
                        )
                        .col(ColumnDef::new(SaleExpenses::Amount).decimal_len(12, 2).not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_sale_expenses_sale")
                                .from(SaleExpenses::Table, SaleExpenses::SaleId)
                                .to(Sales::Table, Sales::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("uq_sale_items_sale_product")
                        .table(SaleItems::Table)
                        .col(SaleItems::SaleId)
                        .col(SaleItems::ProductId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_sales_date_status")
                        .table(Sales::Table)
                        .col(Sales::Date)
                        .col(Sales::Status)
                        .col(Sales::PaymentStatus)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_sales_client_date")
                        .table(Sales::Table)
                        .col(Sales::ClientId)
                        .col(Sales::Date)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_sales_due_date")
                        .table(Sales::Table)
                        .col(Sales::DueDate)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(SaleExpenses::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(SaleItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Sales::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Sales {
        Table,
        Id,
        Folio,
        Date,
        Status,
        PaymentStatus,
        DueDate,
        Notes,
        ClientId,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub enum SaleItems {
        Table,
        Id,
        SaleId,
        ProductId,
        Quantity,
        UnitPrice,
    }

    #[derive(DeriveIden)]
    pub enum SaleExpenses {
        Table,
        Id,
        SaleId,
        Description,
        Amount,
    }
}

mod m20240101_000005_create_payment_tables {
    use sea_orm_migration::prelude::*;

    use super::m20240101_000001_create_parties_tables::Clients;
    use super::m20240101_000004_create_sale_tables::Sales;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_payment_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Payments::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Payments::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Payments::ClientId).uuid().not_null())
                        .col(ColumnDef::new(Payments::Date).date().not_null())
                        .col(ColumnDef::new(Payments::Amount).decimal_len(12, 2).not_null())
                        .col(ColumnDef::new(Payments::Notes).text())
                        .col(
                            ColumnDef::new(Payments::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_payments_client")
                                .from(Payments::Table, Payments::ClientId)
                                .to(Clients::Table, Clients::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PaymentAllocations::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PaymentAllocations::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PaymentAllocations::PaymentId).uuid().not_null())
                        .col(ColumnDef::new(PaymentAllocations::SaleId).uuid().not_null())
                        .col(
                            ColumnDef::new(PaymentAllocations::Amount)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentAllocations::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_payment_allocations_payment")
                                .from(PaymentAllocations::Table, PaymentAllocations::PaymentId)
                                .to(Payments::Table, Payments::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_payment_allocations_sale")
                                .from(PaymentAllocations::Table, PaymentAllocations::SaleId)
                                .to(Sales::Table, Sales::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("uq_payment_allocations_payment_sale")
                        .table(PaymentAllocations::Table)
                        .col(PaymentAllocations::PaymentId)
                        .col(PaymentAllocations::SaleId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_payments_client_date")
                        .table(Payments::Table)
                        .col(Payments::ClientId)
                        .col(Payments::Date)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_payment_allocations_sale")
                        .table(PaymentAllocations::Table)
                        .col(PaymentAllocations::SaleId)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PaymentAllocations::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Payments::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Payments {
        Table,
        Id,
        ClientId,
        Date,
        Amount,
        Notes,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub enum PaymentAllocations {
        Table,
        Id,
        PaymentId,
        SaleId,
        Amount,
        CreatedAt,
    }
}

mod m20240101_000006_create_cost_history_table {
    use sea_orm_migration::prelude::*;

    use super::m20240101_000002_create_products_table::Products;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000006_create_cost_history_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ProductCostHistory::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductCostHistory::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductCostHistory::ProductId).uuid().not_null())
                        .col(
                            ColumnDef::new(ProductCostHistory::Cost)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductCostHistory::Date).date().not_null())
                        .col(ColumnDef::new(ProductCostHistory::Source).string_len(16).not_null())
                        .col(
                            ColumnDef::new(ProductCostHistory::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_product_cost_history_product")
                                .from(ProductCostHistory::Table, ProductCostHistory::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_product_cost_history_product_date")
                        .table(ProductCostHistory::Table)
                        .col(ProductCostHistory::ProductId)
                        .col(ProductCostHistory::Date)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ProductCostHistory::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum ProductCostHistory {
        Table,
        Id,
        ProductId,
        Cost,
        Date,
        Source,
        CreatedAt,
    }
}
