use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20240501_000001_create_storefront_tables::Migration)]
    }
}

mod m20240501_000001_create_storefront_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240501_000001_create_storefront_tables"
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
                        .col(ColumnDef::new(Products::Id).string().not_null().primary_key())
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(ColumnDef::new(Products::Category).string().not_null())
                        .col(ColumnDef::new(Products::Price).decimal().not_null())
                        .col(
                            ColumnDef::new(Products::Image1)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Products::Image2)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Products::Image3)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Products::CreatedAt).big_integer().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::UserId).string().not_null())
                        .col(ColumnDef::new(Orders::Intent).string().not_null())
                        .col(ColumnDef::new(Orders::LineItems).json().not_null())
                        .col(ColumnDef::new(Orders::Amount).decimal().not_null().default(0))
                        .col(ColumnDef::new(Orders::Status).string().not_null())
                        .col(ColumnDef::new(Orders::Location).json().null())
                        .col(ColumnDef::new(Orders::Logs).string().not_null().default("-"))
                        .col(ColumnDef::new(Orders::CreatedAt).big_integer().not_null())
                        .primary_key(
                            Index::create()
                                .name("pk_orders_user_intent")
                                .col(Orders::UserId)
                                .col(Orders::Intent),
                        )
                        .to_owned(),
                )
                .await?;

            // History reads are newest-first per user
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_user_created_at")
                        .table(Orders::Table)
                        .col(Orders::UserId)
                        .col(Orders::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Products {
        Table,
        Id,
        Name,
        Category,
        Price,
        Image1,
        Image2,
        Image3,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        UserId,
        Intent,
        LineItems,
        Amount,
        Status,
        Location,
        Logs,
        CreatedAt,
    }
}
