use crate::access_policy::{AccessPolicy, Requester};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::{
    Category, CreateResourceRequest, CreateUserRequest, DownloadResponse, HealthResponse,
    ResourceFilter, ResourceListResponse, ResourceResponse, UpdateResourceRequest, UserSummary,
};
use crate::resource_store::{ResourceStore, MAX_PAGE_BOUND};
use crate::user_store::UserStore;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequestParts, Path, Query, State,
    },
    http::{request::Parts, StatusCode},
    routing::{get, post},
    Json, Router,
};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// 身份服务注入的请求者 id 请求头
pub const USER_ID_HEADER: &str = "x-user-id";

const DEFAULT_PAGE_SIZE: u64 = 20;

#[derive(Clone)]
pub struct AppState {
    resources: ResourceStore,
    users: UserStore,
    max_page_size: u64,
}

impl AppState {
    pub fn new(db: DatabaseConnection, policy: AccessPolicy, max_page_size: u64) -> Self {
        Self {
            resources: ResourceStore::new(db.clone(), Arc::new(policy)),
            users: UserStore::new(db),
            max_page_size: max_page_size.max(1),
        }
    }
}

#[derive(Deserialize)]
pub struct ResourceQuery {
    subject: Option<String>,
    category: Option<String>,
    uploaded_by: Option<i32>,
    limit: Option<u64>,
    offset: Option<u64>,
}

/// 没有请求头视为匿名；请求头无法解析或用户不存在时返回 401
impl FromRequestParts<AppState> for Requester {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(USER_ID_HEADER) else {
            return Ok(Requester::anonymous());
        };
        let user_id = value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<i32>().ok())
            .ok_or_else(|| AppError::Unauthenticated(format!("Invalid {} header", USER_ID_HEADER)))?;
        let user = state
            .users
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::Unauthenticated(format!("Unknown user {}", user_id)))?;
        Ok(Requester::from(&user))
    }
}

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/users", post(create_user_handler))
        .route("/api/users/{id}", get(get_user_handler))
        .route(
            "/api/resources",
            get(list_resources_handler).post(create_resource_handler),
        )
        .route(
            "/api/resources/{id}",
            get(get_resource_handler)
                .patch(update_resource_handler)
                .delete(delete_resource_handler),
        )
        .route("/api/resources/{id}/download", post(download_resource_handler))
        .route("/api/resources/{id}/approve", post(approve_resource_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive())
        .with_state(app_state)
}

pub async fn start_server(db: DatabaseConnection, config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let app_state = AppState::new(db, config.access_policy.clone(), config.max_page_size);

    info!("创建路由...");
    let app = create_router(app_state);
    debug!("路由创建完成");

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    info!("🚀 Web服务器正在启动，监听地址: {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        time: chrono::Utc::now(),
    })
}

async fn create_user_handler(
    State(app_state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserSummary>), AppError> {
    let Json(request) = payload?;
    let user = app_state.users.create_user(&request).await?;
    info!("用户已创建: id={} role={}", user.id, user.role);
    Ok((StatusCode::CREATED, Json(UserSummary::from(&user))))
}

async fn get_user_handler(
    State(app_state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<UserSummary>, AppError> {
    Ok(Json(app_state.users.summary(id).await?))
}

async fn list_resources_handler(
    State(app_state): State<AppState>,
    requester: Requester,
    query: Result<Query<ResourceQuery>, QueryRejection>,
) -> Result<Json<ResourceListResponse>, AppError> {
    let Query(params) = query?;
    let category = match params.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(category) => Some(category.parse::<Category>().map_err(|_| {
            AppError::validation("category", format!("Category '{}' is not supported", category))
        })?),
        None => None,
    };
    let filter = ResourceFilter {
        subject: params.subject,
        category,
        uploaded_by: params.uploaded_by,
    };
    let limit = params
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, app_state.max_page_size);
    let offset = params.offset.unwrap_or(0);
    if offset > MAX_PAGE_BOUND {
        return Err(AppError::validation(
            "offset",
            format!("Offset cannot exceed {}", MAX_PAGE_BOUND),
        ));
    }

    let results = app_state
        .resources
        .find_visible(&filter, &requester, limit, offset)
        .await?;
    Ok(Json(results))
}

async fn create_resource_handler(
    State(app_state): State<AppState>,
    requester: Requester,
    payload: Result<Json<CreateResourceRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ResourceResponse>), AppError> {
    let user_id = require_user(&requester)?;
    if !requester.is_elevated() {
        warn!("用户 {} 无权上传资源", user_id);
        return Err(AppError::Permission(
            "Only tutors and admins can upload resources".to_string(),
        ));
    }

    let Json(request) = payload?;
    let created = app_state.resources.create(&request, user_id).await?;
    info!("资源已创建: id={} uploaded_by={}", created.id, user_id);
    let response = app_state.resources.find_by_id(created.id, &requester).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn get_resource_handler(
    State(app_state): State<AppState>,
    requester: Requester,
    Path(id): Path<i32>,
) -> Result<Json<ResourceResponse>, AppError> {
    Ok(Json(app_state.resources.find_by_id(id, &requester).await?))
}

async fn update_resource_handler(
    State(app_state): State<AppState>,
    requester: Requester,
    Path(id): Path<i32>,
    payload: Result<Json<UpdateResourceRequest>, JsonRejection>,
) -> Result<Json<ResourceResponse>, AppError> {
    ensure_can_modify(&app_state, &requester, id).await?;
    let Json(request) = payload?;
    app_state.resources.update(id, &request).await?;
    info!("资源已更新: id={}", id);
    Ok(Json(app_state.resources.find_by_id(id, &requester).await?))
}

async fn delete_resource_handler(
    State(app_state): State<AppState>,
    requester: Requester,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    ensure_can_modify(&app_state, &requester, id).await?;
    app_state.resources.delete(id).await?;
    info!("资源已删除: id={}", id);
    Ok(StatusCode::NO_CONTENT)
}

async fn download_resource_handler(
    State(app_state): State<AppState>,
    requester: Requester,
    Path(id): Path<i32>,
) -> Result<Json<DownloadResponse>, AppError> {
    // 不可见的资源按不存在处理
    app_state.resources.find_by_id(id, &requester).await?;
    let resource = app_state.resources.increment_download_count(id).await?;
    Ok(Json(DownloadResponse {
        id: resource.id,
        file_url: resource.file_url,
        download_count: resource.download_count,
    }))
}

async fn approve_resource_handler(
    State(app_state): State<AppState>,
    requester: Requester,
    Path(id): Path<i32>,
) -> Result<Json<ResourceResponse>, AppError> {
    let user_id = require_user(&requester)?;
    if !requester.is_admin() {
        warn!("用户 {} 无权审核资源 {}", user_id, id);
        return Err(AppError::Permission("Only admins can approve resources".to_string()));
    }

    let approved = app_state.resources.approve(id, user_id).await?;
    info!("资源已审核通过: id={} approved_by={}", approved.id, user_id);
    Ok(Json(app_state.resources.find_by_id(id, &requester).await?))
}

fn require_user(requester: &Requester) -> Result<i32, AppError> {
    requester
        .user_id
        .ok_or_else(|| AppError::Unauthenticated("Authentication required".to_string()))
}

/// 上传者本人或管理员才能修改、删除资源
async fn ensure_can_modify(app_state: &AppState, requester: &Requester, id: i32) -> Result<(), AppError> {
    let user_id = require_user(requester)?;
    let resource = app_state.resources.find_model(id).await?;
    if requester.is_admin() || requester.is_owner_of(&resource) {
        Ok(())
    } else if !app_state.resources.policy().can_view(&resource, requester) {
        Err(AppError::NotFound(format!("Resource {} not found", id)))
    } else {
        warn!("用户 {} 无权修改资源 {}", user_id, id);
        Err(AppError::Permission(
            "Only the uploader or an admin can modify this resource".to_string(),
        ))
    }
}
