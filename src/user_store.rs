use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, NotSet, QueryFilter, Set};

use crate::error::AppError;
use crate::models::entity::users;
use crate::models::{CreateUserRequest, UserSummary};
use crate::validation::validate_new_user;

#[derive(Clone)]
pub struct UserStore {
    db: DatabaseConnection,
}

impl UserStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create_user(&self, input: &CreateUserRequest) -> Result<users::Model, AppError> {
        let new_user = validate_new_user(input).map_err(AppError::Validation)?;

        let existing = users::Entity::find()
            .filter(users::Column::Email.eq(new_user.email.as_str()))
            .one(&self.db)
            .await?;
        if existing.is_some() {
            return Err(AppError::validation("email", "Email is already registered"));
        }

        let now = Utc::now();
        let model = users::ActiveModel {
            id: NotSet,
            name: Set(new_user.name),
            email: Set(new_user.email),
            role: Set(new_user.role.as_str().to_string()),
            is_premium: Set(new_user.is_premium),
            created_at: Set(now),
            updated_at: Set(now),
        };
        Ok(model.insert(&self.db).await?)
    }

    pub async fn find_user(&self, id: i32) -> Result<Option<users::Model>, AppError> {
        Ok(users::Entity::find_by_id(id).one(&self.db).await?)
    }

    /// 公开投影：只暴露 id、姓名与邮箱
    pub async fn summary(&self, id: i32) -> Result<UserSummary, AppError> {
        self.find_user(id)
            .await?
            .map(|user| UserSummary::from(&user))
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
    }
}
