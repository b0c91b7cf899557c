use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use happy_shared::clients::db::get_conn;
use happy_shared::errors::{AppError, AppResult, ErrorCode};
use happy_shared::extract::{AppJson, AppPath, AppQuery};
use happy_shared::middleware::OptionalAuthUser;
use happy_shared::types::auth::AuthUser;
use happy_shared::types::pagination::{PaginationParams, Paginated};
use happy_shared::types::ApiResponse;

use crate::models::{NewReview, Review, ReviewChanges, ReviewStatus, ReviewView};
use crate::policy::{self, Action};
use crate::repositories::review_repo::{self, LikeOutcome, ReviewFilters, ReviewScope};
use crate::repositories::restaurant_repo;
use crate::routes::{non_blank, parse_field};
use crate::services::notification_service;
use crate::AppState;

pub(crate) const DEFAULT_LIMIT: u64 = 10;

#[derive(Debug, Default, Deserialize)]
pub struct ReviewQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub search: Option<String>,
    pub restaurant_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub status: Option<String>,
}

impl ReviewQuery {
    pub(crate) fn filters(&self) -> AppResult<ReviewFilters> {
        Ok(ReviewFilters {
            search: self.search.clone(),
            restaurant_id: self.restaurant_id,
            user_id: self.user_id,
            status: non_blank(self.status.clone())
                .map(|s| parse_field::<ReviewStatus>("status", &s))
                .transpose()?,
        })
    }

    pub(crate) fn page(&self) -> happy_shared::types::pagination::PageRequest {
        PaginationParams {
            page: self.page,
            limit: self.limit,
        }
        .resolve(DEFAULT_LIMIT)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReviewRequest {
    pub restaurant_id: Uuid,
    #[validate(range(min = 1, max = 5, message = "rating must be between 1 and 5"))]
    pub rating: i32,
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub dish_names: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateReviewRequest {
    #[validate(range(min = 1, max = 5, message = "rating must be between 1 and 5"))]
    pub rating: Option<i32>,
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
    pub image_urls: Option<Vec<String>>,
    pub dish_names: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct LikeResponse {
    pub review_id: Uuid,
    pub like_count: i64,
    pub liked: bool,
}

pub(crate) fn review_not_found() -> AppError {
    AppError::new(ErrorCode::ReviewNotFound, "review not found")
}

fn clean_list(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

fn single_view(
    conn: &mut diesel::PgConnection,
    review: Review,
    viewer: Uuid,
) -> AppResult<ReviewView> {
    review_repo::load_views(conn, vec![review], Some(viewer))?
        .pop()
        .ok_or_else(review_not_found)
}

/// GET /reviews
pub async fn list_reviews(
    State(state): State<Arc<AppState>>,
    viewer: OptionalAuthUser,
    AppQuery(query): AppQuery<ReviewQuery>,
) -> AppResult<Json<ApiResponse<Paginated<ReviewView>>>> {
    let filters = query.filters()?;
    let scope = ReviewScope::Public { viewer: viewer.id() };

    let mut conn = get_conn(&state.db)?;
    let result = review_repo::find_all(&mut conn, &filters, scope, query.page())?;

    Ok(Json(ApiResponse::ok(result)))
}

/// GET /reviews/:id
pub async fn get_review(
    State(state): State<Arc<AppState>>,
    viewer: OptionalAuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<ReviewView>>> {
    let mut conn = get_conn(&state.db)?;
    let review = review_repo::find_by_id(&mut conn, id, viewer.0.as_ref())?
        .ok_or_else(review_not_found)?;

    Ok(Json(ApiResponse::ok(review)))
}

/// POST /reviews
/// New reviews wait for moderation.
pub async fn create_review(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    AppJson(req): AppJson<CreateReviewRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<ReviewView>>)> {
    req.validate()?;

    let mut conn = get_conn(&state.db)?;
    if !restaurant_repo::exists(&mut conn, req.restaurant_id)? {
        return Err(AppError::new(ErrorCode::RestaurantNotFound, "restaurant not found"));
    }

    let review = review_repo::create(
        &mut conn,
        &NewReview {
            id: Uuid::now_v7(),
            user_id: auth_user.id,
            restaurant_id: req.restaurant_id,
            rating: req.rating,
            comment: non_blank(req.comment),
            image_urls: clean_list(req.image_urls),
            dish_names: clean_list(req.dish_names),
            status: ReviewStatus::Pending.as_str().to_string(),
        },
    )?;
    restaurant_repo::refresh_rating(&mut conn, review.restaurant_id)?;

    tracing::info!(
        review_id = %review.id,
        user_id = %auth_user.id,
        restaurant_id = %review.restaurant_id,
        "review created"
    );

    let view = single_view(&mut conn, review, auth_user.id)?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(view, "review submitted for moderation")),
    ))
}

/// PUT /reviews/:id
pub async fn update_review(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<UpdateReviewRequest>,
) -> AppResult<Json<ApiResponse<ReviewView>>> {
    req.validate()?;

    let mut conn = get_conn(&state.db)?;
    let owner = review_repo::owner_of(&mut conn, id)?.ok_or_else(review_not_found)?;
    policy::authorize(&auth_user, Action::EditReview, owner)?;

    let changes = ReviewChanges {
        rating: req.rating,
        comment: req.comment,
        image_urls: req.image_urls.map(clean_list),
        dish_names: req.dish_names.map(clean_list),
        updated_at: None,
    };
    let review = review_repo::update(&mut conn, id, changes)?.ok_or_else(review_not_found)?;
    restaurant_repo::refresh_rating(&mut conn, review.restaurant_id)?;

    tracing::info!(review_id = %id, user_id = %auth_user.id, "review updated");

    let view = single_view(&mut conn, review, auth_user.id)?;
    Ok(Json(ApiResponse::ok_with_message(view, "review updated")))
}

/// DELETE /reviews/:id
pub async fn delete_review(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let mut conn = get_conn(&state.db)?;
    let owner = review_repo::owner_of(&mut conn, id)?.ok_or_else(review_not_found)?;
    policy::authorize(&auth_user, Action::DeleteReview, owner)?;

    let review = review_repo::delete(&mut conn, id)?.ok_or_else(review_not_found)?;
    restaurant_repo::refresh_rating(&mut conn, review.restaurant_id)?;

    tracing::info!(review_id = %id, user_id = %auth_user.id, "review deleted");

    Ok(Json(ApiResponse::message("review deleted")))
}

/// POST /reviews/:id/like
/// The like is kept even when the notification cannot be written.
pub async fn like_review(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<LikeResponse>>> {
    let mut conn = get_conn(&state.db)?;
    let review = review_repo::find_row(&mut conn, id)?
        .filter(|r| review_repo::is_visible_to(r, Some(&auth_user)))
        .ok_or_else(review_not_found)?;

    if review_repo::like(&mut conn, id, auth_user.id)? == LikeOutcome::AlreadyLiked {
        return Err(AppError::new(ErrorCode::AlreadyLiked, "you already liked this review"));
    }
    tracing::info!(review_id = %id, user_id = %auth_user.id, "review liked");

    notification_service::notify_review_liked(&state, &mut conn, &review, auth_user.id)?;

    let like_count = review_repo::like_count(&mut conn, id)?;
    Ok(Json(ApiResponse::ok(LikeResponse {
        review_id: id,
        like_count,
        liked: true,
    })))
}

/// DELETE /reviews/:id/unlike
pub async fn unlike_review(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<LikeResponse>>> {
    let mut conn = get_conn(&state.db)?;
    if !review_repo::unlike(&mut conn, id, auth_user.id)? {
        return Err(AppError::new(ErrorCode::LikeNotFound, "you have not liked this review"));
    }
    tracing::info!(review_id = %id, user_id = %auth_user.id, "review unliked");

    let like_count = review_repo::like_count(&mut conn, id)?;
    Ok(Json(ApiResponse::ok(LikeResponse {
        review_id: id,
        like_count,
        liked: false,
    })))
}
