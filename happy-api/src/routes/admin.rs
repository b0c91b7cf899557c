use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use happy_shared::clients::db::get_conn;
use happy_shared::errors::{AppError, AppResult, ErrorCode};
use happy_shared::extract::{AppJson, AppPath, AppQuery};
use happy_shared::middleware::AdminUser;
use happy_shared::types::auth::UserRole;
use happy_shared::types::pagination::{PaginationParams, Paginated};
use happy_shared::types::ApiResponse;

use crate::models::{DashboardStats, ReviewStatus, ReviewView, UserProfile, UserStats};
use crate::policy::{self, Action};
use crate::repositories::review_repo::{self, ReviewScope};
use crate::repositories::user_repo::{self, UserFilters};
use crate::repositories::{favorite_repo, menu_repo, restaurant_repo};
use crate::routes::reviews::{review_not_found, ReviewQuery};
use crate::routes::{non_blank, parse_field};
use crate::AppState;

const DEFAULT_USER_LIMIT: u64 = 20;

#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub search: Option<String>,
    pub role: Option<String>,
    pub is_blocked: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: String,
}

fn user_not_found() -> AppError {
    AppError::new(ErrorCode::UserNotFound, "user not found")
}

/// GET /admin/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    AppQuery(query): AppQuery<UserQuery>,
) -> AppResult<Json<ApiResponse<Paginated<UserProfile>>>> {
    let filters = UserFilters {
        search: query.search.clone(),
        role: non_blank(query.role.clone())
            .map(|r| parse_field::<UserRole>("role", &r))
            .transpose()?,
        is_blocked: query.is_blocked,
    };
    let page = PaginationParams {
        page: query.page,
        limit: query.limit,
    }
    .resolve(DEFAULT_USER_LIMIT);

    let mut conn = get_conn(&state.db)?;
    let users = user_repo::find_all(&mut conn, &filters, page)?.map(UserProfile::from);

    Ok(Json(ApiResponse::ok(users)))
}

/// GET /admin/users/:id
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<UserProfile>>> {
    let mut conn = get_conn(&state.db)?;
    let user = user_repo::find_by_id(&mut conn, id)?.ok_or_else(user_not_found)?;

    Ok(Json(ApiResponse::ok(user.into())))
}

/// PUT /admin/users/:id/block
pub async fn block_user(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<UserProfile>>> {
    policy::authorize(&admin, Action::BlockAccount, id)?;

    let mut conn = get_conn(&state.db)?;
    let user = user_repo::set_blocked(&mut conn, id, true)?.ok_or_else(user_not_found)?;

    tracing::info!(user_id = %id, admin_id = %admin.id, "user blocked");

    Ok(Json(ApiResponse::ok_with_message(user.into(), "user blocked")))
}

/// PUT /admin/users/:id/unblock
pub async fn unblock_user(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<UserProfile>>> {
    let mut conn = get_conn(&state.db)?;
    let user = user_repo::set_blocked(&mut conn, id, false)?.ok_or_else(user_not_found)?;

    tracing::info!(user_id = %id, admin_id = %admin.id, "user unblocked");

    Ok(Json(ApiResponse::ok_with_message(user.into(), "user unblocked")))
}

/// PUT /admin/users/:id/role
pub async fn change_role(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<ChangeRoleRequest>,
) -> AppResult<Json<ApiResponse<UserProfile>>> {
    let role: UserRole = parse_field("role", &req.role)?;
    policy::authorize(&admin, Action::ChangeRole, id)?;

    let mut conn = get_conn(&state.db)?;
    let user = user_repo::set_role(&mut conn, id, role)?.ok_or_else(user_not_found)?;

    tracing::info!(user_id = %id, admin_id = %admin.id, role = %role, "user role changed");

    Ok(Json(ApiResponse::ok_with_message(user.into(), "role updated")))
}

/// DELETE /admin/users/:id
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    policy::authorize(&admin, Action::DeleteAccount, id)?;

    let mut conn = get_conn(&state.db)?;
    if !user_repo::delete(&mut conn, id)? {
        return Err(user_not_found());
    }

    tracing::info!(user_id = %id, admin_id = %admin.id, "user deleted");

    Ok(Json(ApiResponse::message("user deleted")))
}

/// GET /admin/stats
pub async fn dashboard_stats(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
) -> AppResult<Json<ApiResponse<DashboardStats>>> {
    let mut conn = get_conn(&state.db)?;

    let stats = DashboardStats {
        users: user_repo::stats(&mut conn)?,
        reviews: review_repo::stats(&mut conn)?,
        menu: menu_repo::stats(&mut conn)?,
        favorites: favorite_repo::stats(&mut conn)?,
    };

    Ok(Json(ApiResponse::ok(stats)))
}

/// GET /admin/stats/users
pub async fn user_stats(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
) -> AppResult<Json<ApiResponse<UserStats>>> {
    let mut conn = get_conn(&state.db)?;
    let stats = user_repo::stats(&mut conn)?;

    Ok(Json(ApiResponse::ok(stats)))
}

/// GET /admin/reviews
/// Moderation view: every status unless one is requested.
pub async fn list_reviews(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    AppQuery(query): AppQuery<ReviewQuery>,
) -> AppResult<Json<ApiResponse<Paginated<ReviewView>>>> {
    let filters = query.filters()?;

    let mut conn = get_conn(&state.db)?;
    let result = review_repo::find_all(&mut conn, &filters, ReviewScope::Moderation, query.page())?;

    Ok(Json(ApiResponse::ok(result)))
}

/// PUT /admin/reviews/:id/status
pub async fn change_review_status(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<ChangeStatusRequest>,
) -> AppResult<Json<ApiResponse<ReviewView>>> {
    let status: ReviewStatus = parse_field("status", &req.status)?;

    let mut conn = get_conn(&state.db)?;
    let review = review_repo::set_status(&mut conn, id, status)?.ok_or_else(review_not_found)?;
    restaurant_repo::refresh_rating(&mut conn, review.restaurant_id)?;

    tracing::info!(review_id = %id, admin_id = %admin.id, status = status.as_str(), "review status changed");

    let view = review_repo::load_views(&mut conn, vec![review], None)?
        .pop()
        .ok_or_else(review_not_found)?;
    Ok(Json(ApiResponse::ok_with_message(view, "review status updated")))
}

/// DELETE /admin/reviews/:id
pub async fn delete_review(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let mut conn = get_conn(&state.db)?;
    let review = review_repo::delete(&mut conn, id)?.ok_or_else(review_not_found)?;
    restaurant_repo::refresh_rating(&mut conn, review.restaurant_id)?;

    tracing::info!(review_id = %id, admin_id = %admin.id, "review deleted by admin");

    Ok(Json(ApiResponse::message("review deleted")))
}
