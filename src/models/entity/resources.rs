use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "resources")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    pub description: String,
    pub file_url: String,
    pub file_type: String,
    pub file_size: i64,
    pub category: String,
    pub subject: String,
    pub grade_level: Option<String>,
    pub uploaded_by: i32,
    // 标签以 JSON 数组存储
    #[sea_orm(column_type = "Json")]
    pub tags: JsonValue,
    pub download_count: i64,
    pub is_approved: bool,
    pub approved_by: Option<i32>,
    pub is_public: bool,
    pub access_level: String,
    #[sea_orm(column_type = "TimestampWithTimeZone")]
    pub created_at: DateTime<Utc>,
    #[sea_orm(column_type = "TimestampWithTimeZone")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UploadedBy",
        to = "super::users::Column::Id",
        on_delete = "Cascade"
    )]
    Uploader,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::ApprovedBy",
        to = "super::users::Column::Id",
        on_delete = "SetNull"
    )]
    Approver,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Uploader.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn tag_list(&self) -> Vec<String> {
        match &self.tags {
            JsonValue::Array(items) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }
}
