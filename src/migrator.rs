use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_vehicles_table::Migration),
            Box::new(m20240301_000002_create_transactions_table::Migration),
            Box::new(m20240301_000003_create_inspections_table::Migration),
        ]
    }
}

mod m20240301_000001_create_vehicles_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_vehicles_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Vehicles::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Vehicles::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Vehicles::OwnerId).uuid().not_null())
                        .col(ColumnDef::new(Vehicles::Make).string().not_null())
                        .col(ColumnDef::new(Vehicles::ModelName).string().not_null())
                        .col(ColumnDef::new(Vehicles::Year).integer().not_null())
                        .col(
                            ColumnDef::new(Vehicles::Price)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Vehicles::Mileage)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Vehicles::City).string().not_null())
                        .col(ColumnDef::new(Vehicles::State).string().not_null())
                        .col(ColumnDef::new(Vehicles::Country).string().not_null())
                        .col(ColumnDef::new(Vehicles::Status).string_len(32).not_null())
                        .col(
                            ColumnDef::new(Vehicles::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Vehicles::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_vehicles_owner_id")
                        .table(Vehicles::Table)
                        .col(Vehicles::OwnerId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_vehicles_status")
                        .table(Vehicles::Table)
                        .col(Vehicles::Status)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Vehicles::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Vehicles {
        Table,
        Id,
        OwnerId,
        Make,
        ModelName,
        Year,
        Price,
        Mileage,
        City,
        State,
        Country,
        Status,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000002_create_transactions_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_transactions_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Vehicles are owned by another collaborator, so vehicle_id carries no FK.
            manager
                .create_table(
                    Table::create()
                        .table(Transactions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Transactions::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Transactions::VehicleId).uuid().not_null())
                        .col(ColumnDef::new(Transactions::SellerId).uuid().not_null())
                        .col(ColumnDef::new(Transactions::BuyerId).uuid().not_null())
                        .col(ColumnDef::new(Transactions::Kind).string_len(16).not_null())
                        .col(
                            ColumnDef::new(Transactions::Status)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Transactions::Amount)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Transactions::Currency)
                                .string_len(3)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Transactions::PaymentMethod)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Transactions::TransactionReference)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Transactions::PaidAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Transactions::DownPayment)
                                .decimal_len(16, 4)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Transactions::FinancedAmount)
                                .decimal_len(16, 4)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Transactions::MonthlyPayment)
                                .decimal_len(16, 4)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Transactions::FinancingTermMonths)
                                .integer()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Transactions::InterestRate)
                                .decimal_len(8, 4)
                                .null(),
                        )
                        .col(ColumnDef::new(Transactions::BankName).string().null())
                        .col(ColumnDef::new(Transactions::AccountNumber).string().null())
                        .col(ColumnDef::new(Transactions::CardLast4).string_len(4).null())
                        .col(ColumnDef::new(Transactions::CardBrand).string().null())
                        .col(ColumnDef::new(Transactions::InspectionId).uuid().null())
                        .col(ColumnDef::new(Transactions::Notes).text().null())
                        .col(
                            ColumnDef::new(Transactions::CompletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Transactions::CancelledAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Transactions::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Transactions::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Transactions::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .to_owned(),
                )
                .await?;

            for (name, column) in [
                ("idx_transactions_vehicle_id", Transactions::VehicleId),
                ("idx_transactions_seller_id", Transactions::SellerId),
                ("idx_transactions_buyer_id", Transactions::BuyerId),
                ("idx_transactions_status", Transactions::Status),
                ("idx_transactions_created_at", Transactions::CreatedAt),
            ] {
                manager
                    .create_index(
                        Index::create()
                            .if_not_exists()
                            .name(name)
                            .table(Transactions::Table)
                            .col(column)
                            .to_owned(),
                    )
                    .await?;
            }

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Transactions::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Transactions {
        Table,
        Id,
        VehicleId,
        SellerId,
        BuyerId,
        Kind,
        Status,
        Amount,
        Currency,
        PaymentMethod,
        TransactionReference,
        PaidAt,
        DownPayment,
        FinancedAmount,
        MonthlyPayment,
        FinancingTermMonths,
        InterestRate,
        BankName,
        AccountNumber,
        CardLast4,
        CardBrand,
        InspectionId,
        Notes,
        CompletedAt,
        CancelledAt,
        CreatedAt,
        UpdatedAt,
        Version,
    }
}

mod m20240301_000003_create_inspections_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_inspections_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Inspections::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Inspections::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Inspections::VehicleId).uuid().not_null())
                        .col(ColumnDef::new(Inspections::InspectorId).uuid().not_null())
                        .col(
                            ColumnDef::new(Inspections::Status)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Inspections::ScheduledAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Inspections::CompletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Inspections::Report).json().null())
                        .col(ColumnDef::new(Inspections::Notes).text().null())
                        .col(
                            ColumnDef::new(Inspections::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Inspections::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            for (name, column) in [
                ("idx_inspections_vehicle_id", Inspections::VehicleId),
                ("idx_inspections_inspector_id", Inspections::InspectorId),
                ("idx_inspections_status", Inspections::Status),
                ("idx_inspections_scheduled_at", Inspections::ScheduledAt),
            ] {
                manager
                    .create_index(
                        Index::create()
                            .if_not_exists()
                            .name(name)
                            .table(Inspections::Table)
                            .col(column)
                            .to_owned(),
                    )
                    .await?;
            }

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Inspections::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Inspections {
        Table,
        Id,
        VehicleId,
        InspectorId,
        Status,
        ScheduledAt,
        CompletedAt,
        Report,
        Notes,
        CreatedAt,
        UpdatedAt,
    }
}
