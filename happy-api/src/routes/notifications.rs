use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use happy_shared::clients::db::get_conn;
use happy_shared::errors::{AppError, AppResult, ErrorCode};
use happy_shared::extract::{AppPath, AppQuery};
use happy_shared::types::auth::AuthUser;
use happy_shared::types::pagination::{PaginationParams, Paginated};
use happy_shared::types::ApiResponse;

use crate::models::{Notification, NotificationView};
use crate::policy::{self, Action};
use crate::repositories::notification_repo;
use crate::AppState;

const DEFAULT_LIMIT: u64 = 20;

#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    pub updated: usize,
}

/// GET /notifications
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    AppQuery(query): AppQuery<NotificationQuery>,
) -> AppResult<Json<ApiResponse<Paginated<NotificationView>>>> {
    let page = PaginationParams {
        page: query.page,
        limit: query.limit,
    }
    .resolve(DEFAULT_LIMIT);

    let mut conn = get_conn(&state.db)?;
    let paginated = notification_repo::list(&mut conn, auth_user.id, query.unread_only, page)?;

    Ok(Json(ApiResponse::ok(paginated)))
}

/// GET /notifications/unread-count
pub async fn unread_count(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
) -> AppResult<Json<ApiResponse<UnreadCountResponse>>> {
    let mut conn = get_conn(&state.db)?;
    let count = notification_repo::count_unread(&mut conn, auth_user.id)?;

    Ok(Json(ApiResponse::ok(UnreadCountResponse { count })))
}

/// PUT /notifications/read-all
pub async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
) -> AppResult<Json<ApiResponse<MarkAllReadResponse>>> {
    let mut conn = get_conn(&state.db)?;
    let updated = notification_repo::mark_all_read(&mut conn, auth_user.id)?;

    tracing::debug!(user_id = %auth_user.id, updated, "notifications marked read");

    Ok(Json(ApiResponse::ok(MarkAllReadResponse { updated })))
}

/// PUT /notifications/:id/read
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Notification>>> {
    let not_found = || AppError::new(ErrorCode::NotificationNotFound, "notification not found");

    let mut conn = get_conn(&state.db)?;
    let notification = notification_repo::find_by_id(&mut conn, id)?.ok_or_else(not_found)?;
    policy::authorize(&auth_user, Action::ReadNotification, notification.user_id)?;

    let notification = notification_repo::mark_read(&mut conn, id)?.ok_or_else(not_found)?;

    Ok(Json(ApiResponse::ok(notification)))
}
