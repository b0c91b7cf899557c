use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use happy_shared::clients::db::get_conn;
use happy_shared::errors::{AppError, AppResult, ErrorCode};
use happy_shared::extract::{AppJson, AppPath, AppQuery};
use happy_shared::middleware::{AdminUser, OptionalAuthUser};
use happy_shared::types::pagination::{PaginationParams, Paginated};
use happy_shared::types::ApiResponse;

use crate::geo::GeoPoint;
use crate::hours::Period;
use crate::models::{MenuItem, NewRestaurant, Restaurant, RestaurantChanges, RestaurantDetail};
use crate::repositories::restaurant_repo::{self, NearFilter, RestaurantFilters};
use crate::repositories::menu_repo;
use crate::routes::{clearable, non_blank, parse_field, url_or_blank};
use crate::AppState;

const DEFAULT_LIMIT: u64 = 20;
const DEFAULT_RADIUS_KM: f64 = 5.0;

#[derive(Debug, Default, Deserialize)]
pub struct RestaurantQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub search: Option<String>,
    pub cuisine: Option<String>,
    pub min_rating: Option<f64>,
    pub open_during: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub radius_km: Option<f64>,
}

impl RestaurantQuery {
    fn filters(&self) -> AppResult<RestaurantFilters> {
        let open_during = non_blank(self.open_during.clone())
            .map(|p| parse_field::<Period>("open_during", &p))
            .transpose()?;

        let near = match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => {
                let origin = GeoPoint::new(lat, lng).ok_or_else(|| {
                    AppError::new(ErrorCode::ValidationError, "lat/lng out of range")
                })?;
                let radius_km = self.radius_km.unwrap_or(DEFAULT_RADIUS_KM);
                if !(radius_km > 0.0) {
                    return Err(AppError::new(
                        ErrorCode::ValidationError,
                        "radius_km must be positive",
                    ));
                }
                Some(NearFilter { origin, radius_km })
            }
            (None, None) => None,
            _ => {
                return Err(AppError::new(
                    ErrorCode::BadRequest,
                    "lat and lng must be given together",
                ))
            }
        };

        Ok(RestaurantFilters {
            search: self.search.clone(),
            cuisine: self.cuisine.clone(),
            min_rating: self.min_rating,
            open_during,
            near,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRestaurantRequest {
    #[validate(length(min = 1, max = 255, message = "name is required"))]
    pub name: String,
    #[validate(length(min = 1, max = 255, message = "address is required"))]
    pub address: String,
    #[validate(length(max = 100))]
    pub cuisine_type: Option<String>,
    pub description: Option<String>,
    #[validate(url(message = "image_url must be a URL"))]
    pub image_url: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    #[validate(length(max = 255))]
    pub opening_hours: Option<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateRestaurantRequest {
    #[validate(length(min = 1, max = 255, message = "name cannot be empty"))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 255, message = "address cannot be empty"))]
    pub address: Option<String>,
    #[validate(length(max = 100))]
    pub cuisine_type: Option<String>,
    pub description: Option<String>,
    #[validate(custom = "url_or_blank")]
    pub image_url: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    #[validate(length(max = 255))]
    pub opening_hours: Option<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
}

fn restaurant_not_found() -> AppError {
    AppError::new(ErrorCode::RestaurantNotFound, "restaurant not found")
}

/// GET /restaurants
pub async fn list_restaurants(
    State(state): State<Arc<AppState>>,
    viewer: OptionalAuthUser,
    AppQuery(query): AppQuery<RestaurantQuery>,
) -> AppResult<Json<ApiResponse<Paginated<RestaurantDetail>>>> {
    let filters = query.filters()?;
    let page = PaginationParams {
        page: query.page,
        limit: query.limit,
    }
    .resolve(DEFAULT_LIMIT);

    let mut conn = get_conn(&state.db)?;
    let result = restaurant_repo::find_all(&mut conn, &filters, page, viewer.id())?;

    Ok(Json(ApiResponse::ok(result)))
}

/// GET /restaurants/:id
pub async fn get_restaurant(
    State(state): State<Arc<AppState>>,
    viewer: OptionalAuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<RestaurantDetail>>> {
    let mut conn = get_conn(&state.db)?;
    let restaurant = restaurant_repo::find_by_id(&mut conn, id, viewer.id())?
        .ok_or_else(restaurant_not_found)?;

    Ok(Json(ApiResponse::ok(restaurant)))
}

/// GET /restaurants/:id/menu
pub async fn restaurant_menu(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<MenuItem>>>> {
    let mut conn = get_conn(&state.db)?;
    if !restaurant_repo::exists(&mut conn, id)? {
        return Err(restaurant_not_found());
    }
    let items = menu_repo::find_by_restaurant(&mut conn, id)?;

    Ok(Json(ApiResponse::ok(items)))
}

/// POST /restaurants
pub async fn create_restaurant(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    AppJson(req): AppJson<CreateRestaurantRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Restaurant>>)> {
    req.validate()?;

    let new_restaurant = NewRestaurant {
        id: Uuid::now_v7(),
        name: req.name.trim().to_string(),
        address: req.address.trim().to_string(),
        cuisine_type: non_blank(req.cuisine_type),
        description: req.description,
        image_url: req.image_url,
        phone: non_blank(req.phone),
        opening_hours: non_blank(req.opening_hours),
        latitude: req.latitude,
        longitude: req.longitude,
    };

    let mut conn = get_conn(&state.db)?;
    let restaurant = restaurant_repo::create(&mut conn, &new_restaurant)?;

    tracing::info!(restaurant_id = %restaurant.id, admin_id = %admin.id, "restaurant created");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(restaurant, "restaurant created")),
    ))
}

/// PUT /restaurants/:id
pub async fn update_restaurant(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<UpdateRestaurantRequest>,
) -> AppResult<Json<ApiResponse<Restaurant>>> {
    req.validate()?;

    let changes = RestaurantChanges {
        name: req.name.map(|n| n.trim().to_string()),
        address: req.address.map(|a| a.trim().to_string()),
        cuisine_type: clearable(req.cuisine_type),
        description: clearable(req.description),
        image_url: clearable(req.image_url),
        phone: clearable(req.phone),
        opening_hours: clearable(req.opening_hours),
        latitude: req.latitude,
        longitude: req.longitude,
        updated_at: None,
    };

    let mut conn = get_conn(&state.db)?;
    let restaurant = restaurant_repo::update(&mut conn, id, changes)?
        .ok_or_else(restaurant_not_found)?;

    tracing::info!(restaurant_id = %id, admin_id = %admin.id, "restaurant updated");

    Ok(Json(ApiResponse::ok_with_message(restaurant, "restaurant updated")))
}

/// DELETE /restaurants/:id
pub async fn delete_restaurant(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let mut conn = get_conn(&state.db)?;
    if !restaurant_repo::delete(&mut conn, id)? {
        return Err(restaurant_not_found());
    }

    tracing::info!(restaurant_id = %id, admin_id = %admin.id, "restaurant deleted");

    Ok(Json(ApiResponse::message("restaurant deleted")))
}
