use sea_orm::entity::prelude::*;

/// Reservation of meal quantity by a beneficiary.
/// The confirmation code is globally unique and consumed exactly once
/// when the provider verifies collection.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "claims")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub meal_id: Uuid,
    pub beneficiary_id: Uuid,
    pub quantity: i32,
    pub status: i16,
    #[sea_orm(unique)]
    pub confirmation_code: String,
    pub collected_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::meals::Entity",
        from = "Column::MealId",
        to = "super::meals::Column::Id"
    )]
    Meal,
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::BeneficiaryId",
        to = "super::accounts::Column::Id"
    )]
    Beneficiary,
}

impl Related<super::meals::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Meal.def()
    }
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Beneficiary.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
