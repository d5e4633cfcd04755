use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_users_table::Migration),
            Box::new(m20250101_000002_create_partners_table::Migration),
            Box::new(m20250101_000003_create_disciplines_table::Migration),
            Box::new(m20250101_000004_create_works_table::Migration),
            Box::new(m20250101_000005_create_orders_table::Migration),
            Box::new(m20250101_000006_create_order_items_table::Migration),
            Box::new(m20250101_000007_create_stock_movements_table::Migration),
            Box::new(m20250101_000008_create_royalties_table::Migration),
            Box::new(m20250101_000009_create_commissions_table::Migration),
            Box::new(m20250101_000010_create_notification_reads_table::Migration),
        ]
    }
}

// Migration implementations

mod m20250101_000001_create_users_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000001_create_users_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Users::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Users::Email)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Users::Name).string().not_null())
                        .col(ColumnDef::new(Users::Role).string_len(32).not_null())
                        .col(
                            ColumnDef::new(Users::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Users::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Users::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_users_role")
                        .table(Users::Table)
                        .col(Users::Role)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Users {
        Table,
        Id,
        Email,
        Name,
        Role,
        Active,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250101_000002_create_partners_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000002_create_partners_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Partners::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Partners::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Partners::UserId)
                                .uuid()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Partners::Name).string().not_null())
                        .col(ColumnDef::new(Partners::ContactEmail).string().null())
                        .col(ColumnDef::new(Partners::Phone).string().null())
                        .col(ColumnDef::new(Partners::City).string().null())
                        .col(ColumnDef::new(Partners::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Partners::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Partners {
        Table,
        Id,
        UserId,
        Name,
        ContactEmail,
        Phone,
        City,
        CreatedAt,
    }
}

mod m20250101_000003_create_disciplines_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000003_create_disciplines_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Disciplines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Disciplines::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Disciplines::Name)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Disciplines::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Disciplines::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Disciplines {
        Table,
        Id,
        Name,
        CreatedAt,
    }
}

mod m20250101_000004_create_works_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000004_create_works_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Works::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Works::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Works::Title).string().not_null())
                        .col(ColumnDef::new(Works::Isbn).string().null().unique_key())
                        .col(
                            ColumnDef::new(Works::Price)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Works::Stock).integer().not_null().default(0))
                        .col(
                            ColumnDef::new(Works::MinStock)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Works::MaxStock)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Works::Status).string_len(32).not_null())
                        .col(ColumnDef::new(Works::DisciplineId).uuid().not_null())
                        .col(ColumnDef::new(Works::AuthorId).uuid().null())
                        .col(ColumnDef::new(Works::DesignerId).uuid().null())
                        .col(ColumnDef::new(Works::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Works::UpdatedAt).timestamp().null())
                        .col(ColumnDef::new(Works::Version).integer().not_null().default(1))
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_works_status")
                        .table(Works::Table)
                        .col(Works::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_works_discipline_id")
                        .table(Works::Table)
                        .col(Works::DisciplineId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Works::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Works {
        Table,
        Id,
        Title,
        Isbn,
        Price,
        Stock,
        MinStock,
        MaxStock,
        Status,
        DisciplineId,
        AuthorId,
        DesignerId,
        CreatedAt,
        UpdatedAt,
        Version,
    }
}

mod m20250101_000005_create_orders_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000005_create_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Orders::OrderNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Orders::CustomerId).uuid().not_null())
                        .col(ColumnDef::new(Orders::PartnerId).uuid().null())
                        .col(ColumnDef::new(Orders::RepresentativeId).uuid().null())
                        .col(ColumnDef::new(Orders::Status).string_len(32).not_null())
                        .col(
                            ColumnDef::new(Orders::TotalAmount)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Orders::Currency).string().not_null())
                        .col(ColumnDef::new(Orders::Notes).string().null())
                        .col(ColumnDef::new(Orders::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Orders::UpdatedAt).timestamp().null())
                        .col(
                            ColumnDef::new(Orders::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_customer_id")
                        .table(Orders::Table)
                        .col(Orders::CustomerId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_status")
                        .table(Orders::Table)
                        .col(Orders::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_created_at")
                        .table(Orders::Table)
                        .col(Orders::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Orders {
        Table,
        Id,
        OrderNumber,
        CustomerId,
        PartnerId,
        RepresentativeId,
        Status,
        TotalAmount,
        Currency,
        Notes,
        CreatedAt,
        UpdatedAt,
        Version,
    }
}

mod m20250101_000006_create_order_items_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000006_create_order_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderItems::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::WorkId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::Title).string().not_null())
                        .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(OrderItems::UnitPrice)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderItems::LineTotal)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderItems::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_items_order_id")
                        .table(OrderItems::Table)
                        .col(OrderItems::OrderId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_items_work_id")
                        .table(OrderItems::Table)
                        .col(OrderItems::WorkId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderItems::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum OrderItems {
        Table,
        Id,
        OrderId,
        WorkId,
        Title,
        Quantity,
        UnitPrice,
        LineTotal,
        CreatedAt,
    }
}

mod m20250101_000007_create_stock_movements_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000007_create_stock_movements_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockMovements::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockMovements::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockMovements::WorkId).uuid().not_null())
                        .col(
                            ColumnDef::new(StockMovements::MovementType)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::Quantity)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockMovements::Reason).string().null())
                        .col(ColumnDef::new(StockMovements::Reference).string().null())
                        .col(ColumnDef::new(StockMovements::PerformedBy).uuid().not_null())
                        .col(
                            ColumnDef::new(StockMovements::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_movements_work_id")
                        .table(StockMovements::Table)
                        .col(StockMovements::WorkId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_movements_created_at")
                        .table(StockMovements::Table)
                        .col(StockMovements::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockMovements::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum StockMovements {
        Table,
        Id,
        WorkId,
        MovementType,
        Quantity,
        Reason,
        Reference,
        PerformedBy,
        CreatedAt,
    }
}

mod m20250101_000008_create_royalties_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000008_create_royalties_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Royalties::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Royalties::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Royalties::WorkId).uuid().not_null())
                        .col(ColumnDef::new(Royalties::OrderItemId).uuid().not_null())
                        .col(ColumnDef::new(Royalties::BeneficiaryId).uuid().not_null())
                        .col(
                            ColumnDef::new(Royalties::Amount)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Royalties::Rate).decimal_len(6, 4).not_null())
                        .col(
                            ColumnDef::new(Royalties::Paid)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Royalties::PaidAt).timestamp().null())
                        .col(ColumnDef::new(Royalties::PaymentMethod).string().null())
                        .col(ColumnDef::new(Royalties::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            // At most one royalty per sold line
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_royalties_order_item_id")
                        .table(Royalties::Table)
                        .col(Royalties::OrderItemId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_royalties_beneficiary_id")
                        .table(Royalties::Table)
                        .col(Royalties::BeneficiaryId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Royalties::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Royalties {
        Table,
        Id,
        WorkId,
        OrderItemId,
        BeneficiaryId,
        Amount,
        Rate,
        Paid,
        PaidAt,
        PaymentMethod,
        CreatedAt,
    }
}

mod m20250101_000009_create_commissions_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000009_create_commissions_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Commissions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Commissions::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Commissions::OrderId)
                                .uuid()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Commissions::RepresentativeId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Commissions::Amount)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Commissions::Rate)
                                .decimal_len(6, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Commissions::Paid)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Commissions::PaidAt).timestamp().null())
                        .col(ColumnDef::new(Commissions::PaymentMethod).string().null())
                        .col(
                            ColumnDef::new(Commissions::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_commissions_representative_id")
                        .table(Commissions::Table)
                        .col(Commissions::RepresentativeId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Commissions::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Commissions {
        Table,
        Id,
        OrderId,
        RepresentativeId,
        Amount,
        Rate,
        Paid,
        PaidAt,
        PaymentMethod,
        CreatedAt,
    }
}

mod m20250101_000010_create_notification_reads_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000010_create_notification_reads_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(NotificationReads::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(NotificationReads::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(NotificationReads::UserId).uuid().not_null())
                        .col(
                            ColumnDef::new(NotificationReads::NotificationKey)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(NotificationReads::ReadAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_notification_reads_user_key")
                        .table(NotificationReads::Table)
                        .col(NotificationReads::UserId)
                        .col(NotificationReads::NotificationKey)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(NotificationReads::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum NotificationReads {
        Table,
        Id,
        UserId,
        NotificationKey,
        ReadAt,
    }
}
