use anyhow::Result;
use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::prelude::*;
use std::time::Duration;
use tracing::{error, info};

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260101_000001_create_inventory_tables::Migration),
            Box::new(m20260101_000002_create_bom_tables::Migration),
            Box::new(m20260101_000003_create_production_tables::Migration),
        ]
    }
}

// Migration implementations

mod m20260101_000001_create_inventory_tables {

    use sea_orm::DatabaseBackend;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260101_000001_create_inventory_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Materials::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Materials::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Materials::Code)
                                .string_len(64)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Materials::Name).string().not_null())
                        .col(ColumnDef::new(Materials::Unit).string_len(16).not_null())
                        .col(
                            ColumnDef::new(Materials::OnHand)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Materials::Reserved)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Materials::ReorderLevel)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Materials::AverageCost)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Materials::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(Materials::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Materials::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(WorkCenters::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(WorkCenters::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WorkCenters::Code)
                                .string_len(64)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(WorkCenters::Name).string().not_null())
                        .col(ColumnDef::new(WorkCenters::Status).string_len(32).not_null())
                        .col(
                            ColumnDef::new(WorkCenters::CostPerHour)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(WorkCenters::CapacityPerHour)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(WorkCenters::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WorkCenters::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // SQLite only autoincrements an INTEGER PRIMARY KEY
            let mut ledger_id = ColumnDef::new(StockLedgerEntries::Id);
            match manager.get_database_backend() {
                DatabaseBackend::Sqlite => ledger_id.integer(),
                _ => ledger_id.big_integer(),
            };
            ledger_id.primary_key().auto_increment().not_null();

            manager
                .create_table(
                    Table::create()
                        .table(StockLedgerEntries::Table)
                        .if_not_exists()
                        .col(&mut ledger_id)
                        .col(
                            ColumnDef::new(StockLedgerEntries::MaterialId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockLedgerEntries::MovementType)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockLedgerEntries::Quantity)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockLedgerEntries::Reference)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockLedgerEntries::ReferenceType)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockLedgerEntries::Note).string().null())
                        .col(
                            ColumnDef::new(StockLedgerEntries::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stock_ledger_entries_material_id")
                                .from(StockLedgerEntries::Table, StockLedgerEntries::MaterialId)
                                .to(Materials::Table, Materials::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_ledger_entries_material_id")
                        .table(StockLedgerEntries::Table)
                        .col(StockLedgerEntries::MaterialId)
                        .col(StockLedgerEntries::Id)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockLedgerEntries::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(WorkCenters::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Materials::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Materials {
        Table,
        Id,
        Code,
        Name,
        Unit,
        OnHand,
        Reserved,
        ReorderLevel,
        AverageCost,
        Version,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum WorkCenters {
        Table,
        Id,
        Code,
        Name,
        Status,
        CostPerHour,
        CapacityPerHour,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum StockLedgerEntries {
        Table,
        Id,
        MaterialId,
        MovementType,
        Quantity,
        Reference,
        ReferenceType,
        Note,
        CreatedAt,
    }
}

mod m20260101_000002_create_bom_tables {

    use super::m20260101_000001_create_inventory_tables::{Materials, WorkCenters};
    use sea_orm::ConnectionTrait;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260101_000002_create_bom_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ManufacturingBoms::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ManufacturingBoms::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ManufacturingBoms::ProductId).uuid().not_null())
                        .col(ColumnDef::new(ManufacturingBoms::Name).string().not_null())
                        .col(ColumnDef::new(ManufacturingBoms::Version).integer().not_null())
                        .col(
                            ColumnDef::new(ManufacturingBoms::Status)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingBoms::EstimatedCost)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(ManufacturingBoms::Notes).text().null())
                        .col(
                            ColumnDef::new(ManufacturingBoms::ApprovedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingBoms::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingBoms::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_manufacturing_boms_product_id")
                                .from(ManufacturingBoms::Table, ManufacturingBoms::ProductId)
                                .to(Materials::Table, Materials::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_manufacturing_boms_product_version")
                        .table(ManufacturingBoms::Table)
                        .col(ManufacturingBoms::ProductId)
                        .col(ManufacturingBoms::Version)
                        .unique()
                        .to_owned(),
                )
                .await?;

            // at most one active revision per product
            manager
                .get_connection()
                .execute_unprepared(
                    "CREATE UNIQUE INDEX IF NOT EXISTS idx_manufacturing_boms_one_active \
                     ON manufacturing_boms (product_id) WHERE status = 'active'",
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ManufacturingBomComponents::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ManufacturingBomComponents::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingBomComponents::BomId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingBomComponents::MaterialId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingBomComponents::Quantity)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingBomComponents::Unit)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingBomComponents::WastePercent)
                                .decimal_len(8, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ManufacturingBomComponents::UnitCost)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingBomComponents::Position)
                                .integer()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_manufacturing_bom_components_bom_id")
                                .from(
                                    ManufacturingBomComponents::Table,
                                    ManufacturingBomComponents::BomId,
                                )
                                .to(ManufacturingBoms::Table, ManufacturingBoms::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_manufacturing_bom_components_material_id")
                                .from(
                                    ManufacturingBomComponents::Table,
                                    ManufacturingBomComponents::MaterialId,
                                )
                                .to(Materials::Table, Materials::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ManufacturingBomOperations::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ManufacturingBomOperations::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingBomOperations::BomId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingBomOperations::Sequence)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingBomOperations::Name)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingBomOperations::WorkCenterId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingBomOperations::DurationMinutes)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingBomOperations::SetupMinutes)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ManufacturingBomOperations::TeardownMinutes)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ManufacturingBomOperations::QualityCheckRequired)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_manufacturing_bom_operations_bom_id")
                                .from(
                                    ManufacturingBomOperations::Table,
                                    ManufacturingBomOperations::BomId,
                                )
                                .to(ManufacturingBoms::Table, ManufacturingBoms::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_manufacturing_bom_operations_work_center_id")
                                .from(
                                    ManufacturingBomOperations::Table,
                                    ManufacturingBomOperations::WorkCenterId,
                                )
                                .to(WorkCenters::Table, WorkCenters::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_manufacturing_bom_operations_sequence")
                        .table(ManufacturingBomOperations::Table)
                        .col(ManufacturingBomOperations::BomId)
                        .col(ManufacturingBomOperations::Sequence)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(
                    Table::drop()
                        .table(ManufacturingBomOperations::Table)
                        .to_owned(),
                )
                .await?;
            manager
                .drop_table(
                    Table::drop()
                        .table(ManufacturingBomComponents::Table)
                        .to_owned(),
                )
                .await?;
            manager
                .drop_table(Table::drop().table(ManufacturingBoms::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum ManufacturingBoms {
        Table,
        Id,
        ProductId,
        Name,
        Version,
        Status,
        EstimatedCost,
        Notes,
        ApprovedAt,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum ManufacturingBomComponents {
        Table,
        Id,
        BomId,
        MaterialId,
        Quantity,
        Unit,
        WastePercent,
        UnitCost,
        Position,
    }

    #[derive(DeriveIden)]
    enum ManufacturingBomOperations {
        Table,
        Id,
        BomId,
        Sequence,
        Name,
        WorkCenterId,
        DurationMinutes,
        SetupMinutes,
        TeardownMinutes,
        QualityCheckRequired,
    }
}

mod m20260101_000003_create_production_tables {

    use super::m20260101_000001_create_inventory_tables::{Materials, WorkCenters};
    use super::m20260101_000002_create_bom_tables::ManufacturingBoms;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260101_000003_create_production_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ManufacturingOrders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ManufacturingOrders::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingOrders::Reference)
                                .string_len(32)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(ManufacturingOrders::BomId).uuid().not_null())
                        .col(
                            ColumnDef::new(ManufacturingOrders::ProductId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingOrders::Quantity)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingOrders::Status)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingOrders::Progress)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(ManufacturingOrders::Assignee).string().null())
                        .col(
                            ColumnDef::new(ManufacturingOrders::ScheduledStart)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingOrders::DueDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingOrders::ActualStart)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingOrders::ActualEnd)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingOrders::MaterialsReserved)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(ManufacturingOrders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingOrders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_manufacturing_orders_bom_id")
                                .from(ManufacturingOrders::Table, ManufacturingOrders::BomId)
                                .to(ManufacturingBoms::Table, ManufacturingBoms::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_manufacturing_orders_status")
                        .table(ManufacturingOrders::Table)
                        .col(ManufacturingOrders::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ManufacturingOrderComponents::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ManufacturingOrderComponents::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingOrderComponents::ManufacturingOrderId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingOrderComponents::MaterialId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingOrderComponents::QuantityPerUnit)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingOrderComponents::RequiredQuantity)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingOrderComponents::Unit)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingOrderComponents::UnitCost)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingOrderComponents::Position)
                                .integer()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_manufacturing_order_components_mo_id")
                                .from(
                                    ManufacturingOrderComponents::Table,
                                    ManufacturingOrderComponents::ManufacturingOrderId,
                                )
                                .to(ManufacturingOrders::Table, ManufacturingOrders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_manufacturing_order_components_material_id")
                                .from(
                                    ManufacturingOrderComponents::Table,
                                    ManufacturingOrderComponents::MaterialId,
                                )
                                .to(Materials::Table, Materials::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ManufacturingWorkOrders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ManufacturingWorkOrders::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingWorkOrders::Reference)
                                .string_len(48)
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingWorkOrders::ManufacturingOrderId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingWorkOrders::OperationName)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingWorkOrders::WorkCenterId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingWorkOrders::Sequence)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingWorkOrders::ExpectedDurationMinutes)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingWorkOrders::RealDurationMinutes)
                                .integer()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingWorkOrders::Status)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingWorkOrders::QualityCheckRequired)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(ManufacturingWorkOrders::StartTime)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingWorkOrders::EndTime)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingWorkOrders::LastResumedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingWorkOrders::PausedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingWorkOrders::ActiveSeconds)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ManufacturingWorkOrders::PausedSeconds)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ManufacturingWorkOrders::QcPassed)
                                .boolean()
                                .null(),
                        )
                        .col(ColumnDef::new(ManufacturingWorkOrders::QcNotes).text().null())
                        .col(
                            ColumnDef::new(ManufacturingWorkOrders::QcInspector)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingWorkOrders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingWorkOrders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_manufacturing_work_orders_mo_id")
                                .from(
                                    ManufacturingWorkOrders::Table,
                                    ManufacturingWorkOrders::ManufacturingOrderId,
                                )
                                .to(ManufacturingOrders::Table, ManufacturingOrders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_manufacturing_work_orders_work_center_id")
                                .from(
                                    ManufacturingWorkOrders::Table,
                                    ManufacturingWorkOrders::WorkCenterId,
                                )
                                .to(WorkCenters::Table, WorkCenters::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_manufacturing_work_orders_mo_sequence")
                        .table(ManufacturingWorkOrders::Table)
                        .col(ManufacturingWorkOrders::ManufacturingOrderId)
                        .col(ManufacturingWorkOrders::Sequence)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ManufacturingWorkOrderComments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ManufacturingWorkOrderComments::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingWorkOrderComments::WorkOrderId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingWorkOrderComments::Author)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingWorkOrderComments::Text)
                                .text()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ManufacturingWorkOrderComments::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_manufacturing_work_order_comments_wo_id")
                                .from(
                                    ManufacturingWorkOrderComments::Table,
                                    ManufacturingWorkOrderComments::WorkOrderId,
                                )
                                .to(ManufacturingWorkOrders::Table, ManufacturingWorkOrders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(
                    Table::drop()
                        .table(ManufacturingWorkOrderComments::Table)
                        .to_owned(),
                )
                .await?;
            manager
                .drop_table(Table::drop().table(ManufacturingWorkOrders::Table).to_owned())
                .await?;
            manager
                .drop_table(
                    Table::drop()
                        .table(ManufacturingOrderComponents::Table)
                        .to_owned(),
                )
                .await?;
            manager
                .drop_table(Table::drop().table(ManufacturingOrders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ManufacturingOrders {
        Table,
        Id,
        Reference,
        BomId,
        ProductId,
        Quantity,
        Status,
        Progress,
        Assignee,
        ScheduledStart,
        DueDate,
        ActualStart,
        ActualEnd,
        MaterialsReserved,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum ManufacturingOrderComponents {
        Table,
        Id,
        ManufacturingOrderId,
        MaterialId,
        QuantityPerUnit,
        RequiredQuantity,
        Unit,
        UnitCost,
        Position,
    }

    #[derive(DeriveIden)]
    enum ManufacturingWorkOrders {
        Table,
        Id,
        Reference,
        ManufacturingOrderId,
        OperationName,
        WorkCenterId,
        Sequence,
        ExpectedDurationMinutes,
        RealDurationMinutes,
        Status,
        QualityCheckRequired,
        StartTime,
        EndTime,
        LastResumedAt,
        PausedAt,
        ActiveSeconds,
        PausedSeconds,
        QcPassed,
        QcNotes,
        QcInspector,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum ManufacturingWorkOrderComments {
        Table,
        Id,
        WorkOrderId,
        Author,
        Text,
        CreatedAt,
    }
}

// Database migration CLI runner
pub async fn run_migration(db_url: &str) -> Result<()> {
    info!("Setting up database connection for migrations");

    let mut opt = ConnectOptions::new(db_url);
    opt.max_connections(4)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .sqlx_logging(true);

    let db = Database::connect(opt).await?;

    info!("Running database migrations");

    match Migrator::up(&db, None).await {
        Ok(_) => {
            info!("Migrations completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Migration failed: {}", e);
            Err(e.into())
        }
    }
}
