use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use happy_shared::clients::db::get_conn;
use happy_shared::errors::{AppError, AppResult, ErrorCode};
use happy_shared::extract::{AppJson, AppPath, AppQuery};
use happy_shared::types::auth::AuthUser;
use happy_shared::types::pagination::{PaginationParams, Paginated};
use happy_shared::types::ApiResponse;

use crate::models::FavoriteView;
use crate::repositories::favorite_repo::{self, FavoriteOutcome};
use crate::repositories::restaurant_repo;
use crate::AppState;

const DEFAULT_LIMIT: u64 = 20;

#[derive(Debug, Deserialize)]
pub struct AddFavoriteRequest {
    pub restaurant_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct FavoriteCheck {
    pub restaurant_id: Uuid,
    pub is_favorite: bool,
}

/// GET /favorites
pub async fn list_favorites(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    AppQuery(params): AppQuery<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<FavoriteView>>>> {
    let mut conn = get_conn(&state.db)?;
    let favorites = favorite_repo::find_by_user(&mut conn, auth_user.id, params.resolve(DEFAULT_LIMIT))?;

    Ok(Json(ApiResponse::ok(favorites)))
}

/// POST /favorites
pub async fn add_favorite(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    AppJson(req): AppJson<AddFavoriteRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<FavoriteCheck>>)> {
    let mut conn = get_conn(&state.db)?;
    if !restaurant_repo::exists(&mut conn, req.restaurant_id)? {
        return Err(AppError::new(ErrorCode::RestaurantNotFound, "restaurant not found"));
    }

    match favorite_repo::add(&mut conn, auth_user.id, req.restaurant_id)? {
        FavoriteOutcome::AlreadyExists => Err(AppError::new(
            ErrorCode::AlreadyFavorited,
            "restaurant is already in favorites",
        )),
        FavoriteOutcome::Added => {
            tracing::info!(user_id = %auth_user.id, restaurant_id = %req.restaurant_id, "favorite added");
            Ok((
                StatusCode::CREATED,
                Json(ApiResponse::ok_with_message(
                    FavoriteCheck {
                        restaurant_id: req.restaurant_id,
                        is_favorite: true,
                    },
                    "added to favorites",
                )),
            ))
        }
    }
}

/// DELETE /favorites/:restaurant_id
pub async fn remove_favorite(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    AppPath(restaurant_id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<FavoriteCheck>>> {
    let mut conn = get_conn(&state.db)?;
    if !favorite_repo::remove(&mut conn, auth_user.id, restaurant_id)? {
        return Err(AppError::new(ErrorCode::FavoriteNotFound, "favorite not found"));
    }

    tracing::info!(user_id = %auth_user.id, restaurant_id = %restaurant_id, "favorite removed");

    Ok(Json(ApiResponse::ok_with_message(
        FavoriteCheck {
            restaurant_id,
            is_favorite: false,
        },
        "removed from favorites",
    )))
}

/// GET /favorites/check/:restaurant_id
pub async fn check_favorite(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    AppPath(restaurant_id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<FavoriteCheck>>> {
    let mut conn = get_conn(&state.db)?;
    let is_favorite = favorite_repo::is_favorite(&mut conn, auth_user.id, restaurant_id)?;

    Ok(Json(ApiResponse::ok(FavoriteCheck {
        restaurant_id,
        is_favorite,
    })))
}
