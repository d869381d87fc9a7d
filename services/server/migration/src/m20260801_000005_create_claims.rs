use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Claims::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Claims::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Claims::MealId).uuid().not_null())
                    .col(ColumnDef::new(Claims::BeneficiaryId).uuid().not_null())
                    .col(ColumnDef::new(Claims::Quantity).integer().not_null())
                    .col(ColumnDef::new(Claims::Status).small_integer().not_null())
                    .col(
                        ColumnDef::new(Claims::ConfirmationCode)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Claims::CollectedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Claims::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Claims::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Claims::Table, Claims::MealId)
                            .to(Meals::Table, Meals::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Claims::Table, Claims::BeneficiaryId)
                            .to(Accounts::Table, Accounts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(Claims::Table)
                    .col(Claims::MealId)
                    .name("idx_claims_meal_id")
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(Claims::Table)
                    .col(Claims::BeneficiaryId)
                    .name("idx_claims_beneficiary_id")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Claims::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Claims {
    Table,
    Id,
    MealId,
    BeneficiaryId,
    Quantity,
    Status,
    ConfirmationCode,
    CollectedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Meals {
    Table,
    Id,
}

#[derive(Iden)]
enum Accounts {
    Table,
    Id,
}
