pub mod entity;
pub mod types;

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use entity::{resources, users};
pub use types::{AccessLevel, Category, FileType, GradeLevel, Role, UnknownVariant};

const BYTES_PER_MB: f64 = 1_048_576.0;

/// 派生字段：文件大小（MB），保留两位小数，只在读取时计算
pub fn file_size_mb(file_size: i64) -> String {
    if file_size <= 0 {
        return "0.00".to_string();
    }
    format!("{:.2}", file_size as f64 / BYTES_PER_MB)
}

/// 上传者的公开投影，只包含姓名与邮箱
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i32,
    pub name: String,
    pub email: String,
}

impl From<&users::Model> for UserSummary {
    fn from(user: &users::Model) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

/// 创建资源请求；字段均为可选，缺失字段由校验逻辑报告
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateResourceRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub file_url: Option<String>,
    pub file_type: Option<String>,
    pub file_size: Option<i64>,
    pub category: Option<String>,
    pub subject: Option<String>,
    pub grade_level: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub is_public: Option<bool>,
    pub access_level: Option<String>,
}

/// 部分更新请求；只有出现的字段会被重新校验
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateResourceRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub file_url: Option<String>,
    pub file_type: Option<String>,
    pub file_size: Option<i64>,
    pub category: Option<String>,
    pub subject: Option<String>,
    pub grade_level: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_public: Option<bool>,
    pub access_level: Option<String>,
}

impl UpdateResourceRequest {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.file_url.is_none()
            && self.file_type.is_none()
            && self.file_size.is_none()
            && self.category.is_none()
            && self.subject.is_none()
            && self.grade_level.is_none()
            && self.tags.is_none()
            && self.is_public.is_none()
            && self.access_level.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceResponse {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub file_url: String,
    pub file_type: String,
    pub file_size: i64,
    pub file_size_mb: String,
    pub category: String,
    pub subject: String,
    pub grade_level: Option<String>,
    pub uploaded_by: Option<UserSummary>,
    pub uploaded_by_id: i32,
    pub tags: Vec<String>,
    pub download_count: i64,
    pub is_approved: bool,
    pub approved_by: Option<i32>,
    pub is_public: bool,
    pub access_level: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResourceResponse {
    pub fn new(resource: resources::Model, uploader: Option<&users::Model>) -> Self {
        let tags = resource.tag_list();
        Self {
            id: resource.id,
            file_size_mb: file_size_mb(resource.file_size),
            title: resource.title,
            description: resource.description,
            file_url: resource.file_url,
            file_type: resource.file_type,
            file_size: resource.file_size,
            category: resource.category,
            subject: resource.subject,
            grade_level: resource.grade_level,
            uploaded_by: uploader.map(UserSummary::from),
            uploaded_by_id: resource.uploaded_by,
            tags,
            download_count: resource.download_count,
            is_approved: resource.is_approved,
            approved_by: resource.approved_by,
            is_public: resource.is_public,
            access_level: resource.access_level,
            created_at: resource.created_at,
            updated_at: resource.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceListResponse {
    pub results: Vec<ResourceResponse>,
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadResponse {
    pub id: i32,
    pub file_url: String,
    pub download_count: i64,
}

/// 资源列表过滤条件
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceFilter {
    pub subject: Option<String>,
    pub category: Option<Category>,
    pub uploaded_by: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    #[serde(default)]
    pub is_premium: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub time: DateTime<Utc>,
}
