use chrono::Utc;
use sea_orm::sea_query::{Expr, Func, LikeExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, NotSet,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde_json::Value as JsonValue;
use std::sync::Arc;

use crate::access_policy::{AccessPolicy, Requester};
use crate::error::AppError;
use crate::models::entity::{resources, users};
use crate::models::{
    CreateResourceRequest, ResourceFilter, ResourceListResponse, ResourceResponse,
    UpdateResourceRequest,
};
use crate::validation::{validate_new_resource, validate_resource_patch};

/// 数据库以 i64 绑定 LIMIT / OFFSET，超出部分按上限截断
pub const MAX_PAGE_BOUND: u64 = i64::MAX as u64;

/// 资源实体的持久化操作。
///
/// 每次写入前都同步执行校验；下载计数与审核都是单条件更新，
/// 由数据库保证并发安全。本层不打日志、不重试，错误原样返回给调用方。
#[derive(Clone)]
pub struct ResourceStore {
    db: DatabaseConnection,
    policy: Arc<AccessPolicy>,
}

impl ResourceStore {
    pub fn new(db: DatabaseConnection, policy: Arc<AccessPolicy>) -> Self {
        Self { db, policy }
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// 创建资源，初始状态为待审核，下载计数为 0
    pub async fn create(
        &self,
        input: &CreateResourceRequest,
        uploaded_by: i32,
    ) -> Result<resources::Model, AppError> {
        let new_resource = validate_new_resource(input).map_err(AppError::Validation)?;

        let uploader = users::Entity::find_by_id(uploaded_by).one(&self.db).await?;
        if uploader.is_none() {
            return Err(AppError::validation("uploaded_by", "Uploader does not exist"));
        }

        let now = Utc::now();
        let model = resources::ActiveModel {
            id: NotSet,
            title: Set(new_resource.title),
            description: Set(new_resource.description),
            file_url: Set(new_resource.file_url),
            file_type: Set(new_resource.file_type.as_str().to_string()),
            file_size: Set(new_resource.file_size),
            category: Set(new_resource.category.as_str().to_string()),
            subject: Set(new_resource.subject),
            grade_level: Set(new_resource.grade_level.map(|level| level.as_str().to_string())),
            uploaded_by: Set(uploaded_by),
            tags: Set(JsonValue::from(new_resource.tags)),
            download_count: Set(0),
            is_approved: Set(false),
            approved_by: Set(None),
            is_public: Set(new_resource.is_public),
            access_level: Set(new_resource.access_level.as_str().to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        };
        Ok(model.insert(&self.db).await?)
    }

    pub async fn find_model(&self, id: i32) -> Result<resources::Model, AppError> {
        resources::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| not_found(id))
    }

    /// 按 id 读取；对请求者不可见的资源同样按不存在处理
    pub async fn find_by_id(&self, id: i32, requester: &Requester) -> Result<ResourceResponse, AppError> {
        let (resource, uploader) = resources::Entity::find_by_id(id)
            .find_also_related(users::Entity)
            .one(&self.db)
            .await?
            .ok_or_else(|| not_found(id))?;

        if !self.policy.can_view(&resource, requester) {
            return Err(not_found(id));
        }
        Ok(ResourceResponse::new(resource, uploader.as_ref()))
    }

    /// 部分更新：只校验出现的字段，字段级后写覆盖先写。空更新原样返回当前记录
    pub async fn update(&self, id: i32, input: &UpdateResourceRequest) -> Result<resources::Model, AppError> {
        let current = self.find_model(id).await?;
        if input.is_empty() {
            return Ok(current);
        }
        let patch = validate_resource_patch(&current, input).map_err(AppError::Validation)?;

        let mut active: resources::ActiveModel = current.into();
        if let Some(title) = patch.title {
            active.title = Set(title);
        }
        if let Some(description) = patch.description {
            active.description = Set(description);
        }
        if let Some(file_url) = patch.file_url {
            active.file_url = Set(file_url);
        }
        if let Some(file_type) = patch.file_type {
            active.file_type = Set(file_type.as_str().to_string());
        }
        if let Some(file_size) = patch.file_size {
            active.file_size = Set(file_size);
        }
        if let Some(category) = patch.category {
            active.category = Set(category.as_str().to_string());
        }
        if let Some(subject) = patch.subject {
            active.subject = Set(subject);
        }
        if let Some(grade_level) = patch.grade_level {
            active.grade_level = Set(grade_level.map(|level| level.as_str().to_string()));
        }
        if let Some(tags) = patch.tags {
            active.tags = Set(JsonValue::from(tags));
        }
        if let Some(is_public) = patch.is_public {
            active.is_public = Set(is_public);
        }
        if let Some(access_level) = patch.access_level {
            active.access_level = Set(access_level.as_str().to_string());
        }
        active.updated_at = Set(Utc::now());

        Ok(active.update(&self.db).await?)
    }

    /// 硬删除
    pub async fn delete(&self, id: i32) -> Result<(), AppError> {
        let result = resources::Entity::delete_by_id(id).exec(&self.db).await?;
        if result.rows_affected == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }

    /// 原子自增：单条 `SET download_count = download_count + 1`，并发调用不会丢失更新
    pub async fn increment_download_count(&self, id: i32) -> Result<resources::Model, AppError> {
        let result = resources::Entity::update_many()
            .col_expr(
                resources::Column::DownloadCount,
                Expr::col(resources::Column::DownloadCount).add(1),
            )
            .filter(resources::Column::Id.eq(id))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(not_found(id));
        }
        self.find_model(id).await
    }

    /// 审核通过：只有待审核状态下的条件更新才会命中，
    /// 两个并发审核中恰好一个成功，另一个得到 InvalidState
    pub async fn approve(&self, id: i32, approver_id: i32) -> Result<resources::Model, AppError> {
        let result = resources::Entity::update_many()
            .col_expr(resources::Column::IsApproved, Expr::value(true))
            .col_expr(resources::Column::ApprovedBy, Expr::value(approver_id))
            .col_expr(resources::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(resources::Column::Id.eq(id))
            .filter(resources::Column::IsApproved.eq(false))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            let current = self.find_model(id).await?;
            return Err(AppError::InvalidState(format!(
                "Resource {} is already approved by user {}",
                current.id,
                current
                    .approved_by
                    .map_or_else(|| "unknown".to_string(), |approver| approver.to_string())
            )));
        }
        self.find_model(id).await
    }

    /// 过滤条件与可见性策略取交集，按创建时间倒序分页
    pub async fn find_visible(
        &self,
        filter: &ResourceFilter,
        requester: &Requester,
        limit: u64,
        offset: u64,
    ) -> Result<ResourceListResponse, AppError> {
        let limit = limit.min(MAX_PAGE_BOUND);
        let offset = offset.min(MAX_PAGE_BOUND);
        let condition = Condition::all()
            .add(filter_condition(filter))
            .add(self.policy.visibility_condition(requester));

        let total = resources::Entity::find()
            .filter(condition.clone())
            .count(&self.db)
            .await?;

        let rows: Vec<(resources::Model, Option<users::Model>)> = resources::Entity::find()
            .find_also_related(users::Entity)
            .filter(condition)
            .order_by_desc(resources::Column::CreatedAt)
            .order_by_desc(resources::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(&self.db)
            .await?;

        let results = rows
            .into_iter()
            .map(|(resource, uploader)| ResourceResponse::new(resource, uploader.as_ref()))
            .collect();

        Ok(ResourceListResponse {
            results,
            total,
            limit,
            offset,
        })
    }
}

fn not_found(id: i32) -> AppError {
    AppError::NotFound(format!("Resource {} not found", id))
}

fn filter_condition(filter: &ResourceFilter) -> Condition {
    let mut condition = Condition::all();
    if let Some(subject) = filter.subject.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        // 学科按子串匹配，忽略大小写
        let pattern = format!("%{}%", escape_like(&subject.to_lowercase()));
        condition = condition.add(
            Expr::expr(Func::lower(Expr::col((resources::Entity, resources::Column::Subject))))
                .like(LikeExpr::new(pattern).escape('\\')),
        );
    }
    if let Some(category) = filter.category {
        condition = condition.add(resources::Column::Category.eq(category.as_str()));
    }
    if let Some(uploaded_by) = filter.uploaded_by {
        condition = condition.add(resources::Column::UploadedBy.eq(uploaded_by));
    }
    condition
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
