use sea_orm::entity::prelude::*;

/// One row per series holding the last value handed out.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "sequence_counter")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub series_id: String,

    pub last_value: i64,

    /// Last successful write (Unix epoch in milliseconds)
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
