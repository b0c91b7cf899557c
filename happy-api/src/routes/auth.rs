use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use happy_shared::clients::db::get_conn;
use happy_shared::errors::{AppError, AppResult, ErrorCode};
use happy_shared::extract::AppJson;
use happy_shared::types::auth::{AuthUser, UserRole};
use happy_shared::types::ApiResponse;

use crate::models::{AccountType, NewUser, ProfileChanges, User, UserProfile};
use crate::repositories::user_repo;
use crate::routes::{clearable, non_blank, url_or_blank};
use crate::services::{auth_service, token_service};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "invalid email format"))]
    pub email: String,
    pub password: String,
    #[validate(length(min = 1, max = 100, message = "name is required"))]
    pub name: String,
    #[serde(default)]
    pub account_type: Option<AccountType>,
    #[validate(length(max = 255))]
    pub address: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100, message = "name cannot be empty"))]
    pub name: Option<String>,
    #[validate(custom = "url_or_blank")]
    pub avatar_url: Option<String>,
    #[validate(length(max = 1000))]
    pub intro: Option<String>,
    #[validate(length(max = 255))]
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthPayload {
    pub token: String,
    pub user: UserProfile,
}

fn blocked(user: &User) -> AppResult<()> {
    if user.is_blocked {
        return Err(AppError::new(ErrorCode::AccountBlocked, "this account has been blocked"));
    }
    Ok(())
}

/// POST /auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<AuthPayload>>)> {
    req.validate()?;
    auth_service::validate_password(&req.password)?;

    let password_hash = auth_service::hash_password(&req.password)?;
    let mut conn = get_conn(&state.db)?;

    let new_user = NewUser {
        id: Uuid::now_v7(),
        email: user_repo::normalize_email(&req.email),
        password_hash,
        name: req.name.trim().to_string(),
        address: non_blank(req.address),
        role: UserRole::User.as_str().to_string(),
        account_type: req
            .account_type
            .unwrap_or(AccountType::Personal)
            .as_str()
            .to_string(),
    };

    let user = user_repo::create(&mut conn, &new_user)?
        .ok_or_else(|| AppError::new(ErrorCode::EmailAlreadyExists, "email already registered"))?;

    let token = token_service::issue_token(&state.jwt_secret, &user, state.config.jwt_ttl_secs)?;

    tracing::info!(user_id = %user.id, email = %user.email, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(
            AuthPayload {
                token,
                user: user.into(),
            },
            "registration successful",
        )),
    ))
}

/// POST /auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<LoginRequest>,
) -> AppResult<Json<ApiResponse<AuthPayload>>> {
    req.validate()?;

    let mut conn = get_conn(&state.db)?;

    let invalid = || AppError::new(ErrorCode::InvalidCredentials, "invalid email or password");
    let user = user_repo::find_by_email(&mut conn, &req.email)?.ok_or_else(invalid)?;

    if !auth_service::verify_password(&req.password, &user.password_hash)? {
        tracing::debug!(user_id = %user.id, "login rejected: wrong password");
        return Err(invalid());
    }
    blocked(&user)?;

    user_repo::touch_last_active(&mut conn, user.id)?;
    let token = token_service::issue_token(&state.jwt_secret, &user, state.config.jwt_ttl_secs)?;

    tracing::info!(user_id = %user.id, "user logged in");

    Ok(Json(ApiResponse::ok(AuthPayload {
        token,
        user: user.into(),
    })))
}

/// GET /auth/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
) -> AppResult<Json<ApiResponse<UserProfile>>> {
    let mut conn = get_conn(&state.db)?;

    let user = user_repo::find_by_id(&mut conn, auth_user.id)?
        .ok_or_else(|| AppError::new(ErrorCode::UserNotFound, "user not found"))?;
    user_repo::touch_last_active(&mut conn, user.id)?;

    Ok(Json(ApiResponse::ok(user.into())))
}

/// PUT /auth/profile
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    AppJson(req): AppJson<UpdateProfileRequest>,
) -> AppResult<Json<ApiResponse<UserProfile>>> {
    req.validate()?;

    let changes = ProfileChanges {
        name: req.name.map(|n| n.trim().to_string()),
        avatar_url: clearable(req.avatar_url),
        intro: clearable(req.intro),
        address: clearable(req.address),
        updated_at: None,
    };

    let mut conn = get_conn(&state.db)?;
    let user = user_repo::update_profile(&mut conn, auth_user.id, changes)?
        .ok_or_else(|| AppError::new(ErrorCode::UserNotFound, "user not found"))?;

    tracing::info!(user_id = %user.id, "profile updated");

    Ok(Json(ApiResponse::ok_with_message(user.into(), "profile updated")))
}

/// PUT /auth/change-password
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    AppJson(req): AppJson<ChangePasswordRequest>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    auth_service::validate_password(&req.new_password)?;

    let mut conn = get_conn(&state.db)?;
    let user = user_repo::find_by_id(&mut conn, auth_user.id)?
        .ok_or_else(|| AppError::new(ErrorCode::UserNotFound, "user not found"))?;

    if !auth_service::verify_password(&req.current_password, &user.password_hash)? {
        return Err(AppError::new(
            ErrorCode::InvalidCredentials,
            "current password is incorrect",
        ));
    }

    let password_hash = auth_service::hash_password(&req.new_password)?;
    user_repo::update_password(&mut conn, user.id, &password_hash)?;

    tracing::info!(user_id = %user.id, "password changed");

    Ok(Json(ApiResponse::message("password changed")))
}
