use sea_orm::entity::prelude::*;

/// Feed rows reference their subject polymorphically via
/// (`entity_type`, `entity_id`) and survive the subject's deletion.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "activity")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub entity_type: String,
    #[sea_orm(indexed)]
    pub entity_id: Uuid,
    pub kind: Kind,
    pub subject: Option<String>,
    pub body_md: Option<String>,
    pub meta_json: Json,
    pub created_at: DateTimeWithTimeZone,
    pub created_by: Option<Uuid>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::app_user::Entity",
        from = "Column::CreatedBy",
        to = "super::app_user::Column::Id",
        on_delete = "SetNull"
    )]
    CreatedByUser,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq)]
#[sea_orm(rs_type = "String", db_type = "String(Some(32))")]
pub enum Kind {
    #[sea_orm(string_value = "created")]
    Created,
    #[sea_orm(string_value = "stage_change")]
    StageChange,
    #[sea_orm(string_value = "converted")]
    Converted,
    #[sea_orm(string_value = "deleted")]
    Deleted,
}

impl ActiveModelBehavior for ActiveModel {}
