use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Meals::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Meals::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Meals::ProviderId).uuid().not_null())
                    .col(ColumnDef::new(Meals::Name).string().not_null())
                    .col(ColumnDef::new(Meals::Description).string())
                    .col(ColumnDef::new(Meals::MealType).small_integer().not_null())
                    .col(ColumnDef::new(Meals::TotalQuantity).integer().not_null())
                    .col(
                        ColumnDef::new(Meals::RemainingQuantity)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Meals::ServingAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Meals::PickupAddress).string().not_null())
                    .col(ColumnDef::new(Meals::Latitude).double().not_null())
                    .col(ColumnDef::new(Meals::Longitude).double().not_null())
                    .col(ColumnDef::new(Meals::RadiusKm).double().not_null())
                    .col(
                        ColumnDef::new(Meals::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Meals::Expired)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Meals::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Meals::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Meals::Table, Meals::ProviderId)
                            .to(Accounts::Table, Accounts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(Meals::Table)
                    .col(Meals::ProviderId)
                    .name("idx_meals_provider_id")
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(Meals::Table)
                    .col(Meals::ServingAt)
                    .name("idx_meals_serving_at")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Meals::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Meals {
    Table,
    Id,
    ProviderId,
    Name,
    Description,
    MealType,
    TotalQuantity,
    RemainingQuantity,
    ServingAt,
    PickupAddress,
    Latitude,
    Longitude,
    RadiusKm,
    Active,
    Expired,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Accounts {
    Table,
    Id,
}
