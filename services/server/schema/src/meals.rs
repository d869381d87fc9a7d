use sea_orm::entity::prelude::*;

/// Surplus meal posted by a provider.
/// `active` is the provider's switch; `expired` is flipped by the sweep
/// once the serving time passes or the remaining quantity hits zero.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "meals")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub provider_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub meal_type: i16,
    pub total_quantity: i32,
    pub remaining_quantity: i32,
    pub serving_at: chrono::DateTime<chrono::Utc>,
    pub pickup_address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: f64,
    pub active: bool,
    pub expired: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::ProviderId",
        to = "super::accounts::Column::Id"
    )]
    Provider,
    #[sea_orm(has_many = "super::claims::Entity")]
    Claims,
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Provider.def()
    }
}

impl Related<super::claims::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Claims.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
