//! Menu item administration, mounted under `/admin/menu-items`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use happy_shared::clients::db::get_conn;
use happy_shared::errors::{AppError, AppResult, ErrorCode};
use happy_shared::extract::{AppJson, AppPath, AppQuery};
use happy_shared::middleware::AdminUser;
use happy_shared::types::pagination::{PaginationParams, Paginated};
use happy_shared::types::ApiResponse;

use crate::models::{MenuItem, MenuItemChanges, MenuItemView, NewMenuItem};
use crate::repositories::menu_repo::{self, MenuFilters};
use crate::repositories::restaurant_repo;
use crate::routes::{clearable, url_or_blank};
use crate::AppState;

const DEFAULT_LIMIT: u64 = 50;

#[derive(Debug, Default, Deserialize)]
pub struct MenuQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub search: Option<String>,
    pub restaurant_id: Option<Uuid>,
}

/// Exclusive upper bound of a `NUMERIC(10,2)` price.
const PRICE_CEILING: i64 = 100_000_000;

/// Prices are stored rounded to two places, so the bound applies after rounding.
fn valid_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(ValidationError::new("price must not be negative"));
    }
    if price.round_dp(2) >= Decimal::new(PRICE_CEILING, 0) {
        return Err(ValidationError::new("price must be below 100000000"));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateMenuItemRequest {
    pub restaurant_id: Uuid,
    #[validate(length(min = 1, max = 255, message = "name is required"))]
    pub name: String,
    pub description: Option<String>,
    #[validate(custom = "valid_price")]
    pub price: Decimal,
    #[validate(url(message = "image_url must be a URL"))]
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMenuItemRequest {
    #[validate(length(min = 1, max = 255, message = "name cannot be empty"))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(custom = "valid_price")]
    pub price: Option<Decimal>,
    #[validate(custom = "url_or_blank")]
    pub image_url: Option<String>,
}

fn menu_item_not_found() -> AppError {
    AppError::new(ErrorCode::MenuItemNotFound, "menu item not found")
}

/// GET /admin/menu-items
pub async fn list_menu_items(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    AppQuery(query): AppQuery<MenuQuery>,
) -> AppResult<Json<ApiResponse<Paginated<MenuItemView>>>> {
    let filters = MenuFilters {
        search: query.search.clone(),
        restaurant_id: query.restaurant_id,
    };
    let page = PaginationParams {
        page: query.page,
        limit: query.limit,
    }
    .resolve(DEFAULT_LIMIT);

    let mut conn = get_conn(&state.db)?;
    let result = menu_repo::find_all(&mut conn, &filters, page)?;

    Ok(Json(ApiResponse::ok(result)))
}

/// GET /admin/menu-items/:id
pub async fn get_menu_item(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<MenuItemView>>> {
    let mut conn = get_conn(&state.db)?;
    let item = menu_repo::find_by_id(&mut conn, id)?.ok_or_else(menu_item_not_found)?;

    Ok(Json(ApiResponse::ok(item)))
}

/// POST /admin/menu-items
pub async fn create_menu_item(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    AppJson(req): AppJson<CreateMenuItemRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<MenuItem>>)> {
    req.validate()?;

    let mut conn = get_conn(&state.db)?;
    if !restaurant_repo::exists(&mut conn, req.restaurant_id)? {
        return Err(AppError::new(ErrorCode::RestaurantNotFound, "restaurant not found"));
    }

    let item = menu_repo::create(
        &mut conn,
        &NewMenuItem {
            id: Uuid::now_v7(),
            restaurant_id: req.restaurant_id,
            name: req.name.trim().to_string(),
            description: req.description,
            price: req.price.round_dp(2),
            image_url: req.image_url,
        },
    )?;

    tracing::info!(menu_item_id = %item.id, restaurant_id = %item.restaurant_id, admin_id = %admin.id, "menu item created");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(item, "menu item created")),
    ))
}

/// PUT /admin/menu-items/:id
pub async fn update_menu_item(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<UpdateMenuItemRequest>,
) -> AppResult<Json<ApiResponse<MenuItem>>> {
    req.validate()?;

    let changes = MenuItemChanges {
        name: req.name.map(|n| n.trim().to_string()),
        description: clearable(req.description),
        price: req.price.map(|p| p.round_dp(2)),
        image_url: clearable(req.image_url),
        updated_at: None,
    };

    let mut conn = get_conn(&state.db)?;
    let item = menu_repo::update(&mut conn, id, changes)?.ok_or_else(menu_item_not_found)?;

    tracing::info!(menu_item_id = %id, admin_id = %admin.id, "menu item updated");

    Ok(Json(ApiResponse::ok_with_message(item, "menu item updated")))
}

/// DELETE /admin/menu-items/:id
pub async fn delete_menu_item(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let mut conn = get_conn(&state.db)?;
    if !menu_repo::delete(&mut conn, id)? {
        return Err(menu_item_not_found());
    }

    tracing::info!(menu_item_id = %id, admin_id = %admin.id, "menu item deleted");

    Ok(Json(ApiResponse::message("menu item deleted")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn request(price: &str) -> CreateMenuItemRequest {
        CreateMenuItemRequest {
            restaurant_id: Uuid::now_v7(),
            name: "Pho bo".into(),
            description: None,
            price: Decimal::from_str(price).unwrap(),
            image_url: None,
        }
    }

    #[test]
    fn price_must_be_non_negative_and_fit_the_column() {
        assert!(request("45000").validate().is_ok());
        assert!(request("0").validate().is_ok());
        assert!(request("99999999.99").validate().is_ok());
        assert!(request("-1.50").validate().is_err());
        assert!(request("100000000").validate().is_err());
        assert!(request("12345678901").validate().is_err());
        // Rounds up to the ceiling
        assert!(request("99999999.999").validate().is_err());
    }

    #[test]
    fn price_accepts_json_numbers() {
        let req: CreateMenuItemRequest = serde_json::from_value(serde_json::json!({
            "restaurant_id": Uuid::now_v7(),
            "name": "Banh mi",
            "price": 3.5
        }))
        .unwrap();
        assert_eq!(req.price, Decimal::from_str("3.5").unwrap());
    }
}
