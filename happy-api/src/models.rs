use chrono::{DateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use happy_shared::types::auth::UserRole;

use crate::schema::{favorites, menu_items, notifications, restaurants, review_likes, reviews, users};

// --- Accounts ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Personal,
    Family,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Personal => "personal",
            AccountType::Family => "family",
        }
    }
}

impl std::str::FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "personal" => Ok(AccountType::Personal),
            "family" => Ok(AccountType::Family),
            _ => Err(format!("unknown account type: {s}")),
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub intro: Option<String>,
    pub address: Option<String>,
    pub role: String,
    pub account_type: String,
    pub is_blocked: bool,
    pub last_active_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn user_role(&self) -> UserRole {
        self.role.parse().unwrap_or(UserRole::User)
    }
}

/// Account as exposed over the API. The password hash never leaves the server.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub intro: Option<String>,
    pub address: Option<String>,
    pub role: String,
    pub account_type: String,
    pub is_blocked: bool,
    pub last_active_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            avatar_url: user.avatar_url,
            intro: user.intro,
            address: user.address,
            role: user.role,
            account_type: user.account_type,
            is_blocked: user.is_blocked,
            last_active_at: user.last_active_at,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub address: Option<String>,
    pub role: String,
    pub account_type: String,
}

/// `None` leaves a column alone; `Some(None)` clears a nullable one.
#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = users)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub avatar_url: Option<Option<String>>,
    pub intro: Option<Option<String>>,
    pub address: Option<Option<String>>,
    pub updated_at: Option<DateTime<Utc>>,
}

// --- Restaurants ---

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = restaurants)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Restaurant {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub cuisine_type: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub phone: Option<String>,
    pub opening_hours: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub rating: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = restaurants)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RestaurantSummary {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = restaurants)]
pub struct NewRestaurant {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub cuisine_type: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub phone: Option<String>,
    pub opening_hours: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = restaurants)]
pub struct RestaurantChanges {
    pub name: Option<String>,
    pub address: Option<String>,
    pub cuisine_type: Option<Option<String>>,
    pub description: Option<Option<String>>,
    pub image_url: Option<Option<String>>,
    pub phone: Option<Option<String>>,
    pub opening_hours: Option<Option<String>>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Restaurant with its menu and approved reviews.
#[derive(Debug, Serialize)]
pub struct RestaurantDetail {
    #[serde(flatten)]
    pub restaurant: Restaurant,
    pub menu_items: Vec<MenuItem>,
    pub reviews: Vec<ReviewView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

// --- Menu ---

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = menu_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MenuItem {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = restaurants)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RestaurantRef {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct MenuItemView {
    #[serde(flatten)]
    pub item: MenuItem,
    pub restaurant: RestaurantRef,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = menu_items)]
pub struct NewMenuItem {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub image_url: Option<String>,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = menu_items)]
pub struct MenuItemChanges {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub price: Option<Decimal>,
    pub image_url: Option<Option<String>>,
    pub updated_at: Option<DateTime<Utc>>,
}

// --- Reviews ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for ReviewStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReviewStatus::Pending),
            "approved" => Ok(ReviewStatus::Approved),
            "rejected" => Ok(ReviewStatus::Rejected),
            _ => Err(format!("unknown review status: {s}")),
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = reviews)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Review {
    pub id: Uuid,
    pub user_id: Uuid,
    pub restaurant_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
    pub image_urls: Vec<String>,
    pub dish_names: Vec<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Review {
    pub fn is_approved(&self) -> bool {
        self.status == ReviewStatus::Approved.as_str()
    }
}

/// Review annotated with its author, restaurant and like information.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewView {
    #[serde(flatten)]
    pub review: Review,
    pub user: Option<UserSummary>,
    pub restaurant: Option<RestaurantSummary>,
    pub like_count: i64,
    pub liked_by_viewer: bool,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = reviews)]
pub struct NewReview {
    pub id: Uuid,
    pub user_id: Uuid,
    pub restaurant_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
    pub image_urls: Vec<String>,
    pub dish_names: Vec<String>,
    pub status: String,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = reviews)]
pub struct ReviewChanges {
    pub rating: Option<i32>,
    pub comment: Option<String>,
    pub image_urls: Option<Vec<String>>,
    pub dish_names: Option<Vec<String>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = review_likes)]
pub struct NewReviewLike {
    pub id: Uuid,
    pub review_id: Uuid,
    pub user_id: Uuid,
}

// --- Favorites ---

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = favorites)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Favorite {
    pub user_id: Uuid,
    pub restaurant_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = favorites)]
pub struct NewFavorite {
    pub user_id: Uuid,
    pub restaurant_id: Uuid,
}

/// A favorited restaurant with a preview of its menu.
#[derive(Debug, Serialize)]
pub struct FavoriteView {
    pub restaurant_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub restaurant: Restaurant,
    pub menu_items: Vec<MenuItem>,
}

// --- Notifications ---

pub const NOTIFICATION_LIKE_REVIEW: &str = "like_review";

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = notifications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub notification_type: String,
    pub reference_id: Option<Uuid>,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationView {
    #[serde(flatten)]
    pub notification: Notification,
    pub restaurant: Option<RestaurantRef>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = notifications)]
pub struct NewNotification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub notification_type: String,
    pub reference_id: Option<Uuid>,
    pub message: String,
}

// --- Statistics ---

#[derive(Debug, Serialize)]
pub struct UserStats {
    pub total: i64,
    pub active: i64,
    pub blocked: i64,
    pub admins: i64,
}

#[derive(Debug, Serialize)]
pub struct ReviewStats {
    pub total: i64,
    pub total_likes: i64,
    pub average_rating: f64,
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
}

#[derive(Debug, Serialize)]
pub struct RestaurantCount {
    pub restaurant_id: Uuid,
    pub name: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct MenuStats {
    pub total: i64,
    pub average_price: Decimal,
    pub top_restaurants: Vec<RestaurantCount>,
}

#[derive(Debug, Serialize)]
pub struct FavoriteStats {
    pub total: i64,
    pub top_restaurants: Vec<RestaurantCount>,
}

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub users: UserStats,
    pub reviews: ReviewStats,
    pub menu: MenuStats,
    pub favorites: FavoriteStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::now_v7(),
            email: "alice@example.com".into(),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".into(),
            name: "Alice".into(),
            avatar_url: None,
            intro: None,
            address: Some("1 Lunch Street".into()),
            role: "admin".into(),
            account_type: "family".into(),
            is_blocked: false,
            last_active_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn profile_never_serializes_password_hash() {
        let value = serde_json::to_value(UserProfile::from(sample_user())).unwrap();
        assert!(value.get("password_hash").is_none());
        assert_eq!(value["email"], "alice@example.com");
        assert_eq!(value["account_type"], "family");
    }

    #[test]
    fn role_falls_back_to_user() {
        let mut user = sample_user();
        assert_eq!(user.user_role(), UserRole::Admin);
        user.role = "superuser".into();
        assert_eq!(user.user_role(), UserRole::User);
    }

    #[test]
    fn review_status_round_trips_through_text() {
        for status in [ReviewStatus::Pending, ReviewStatus::Approved, ReviewStatus::Rejected] {
            assert_eq!(status.as_str().parse::<ReviewStatus>().unwrap(), status);
        }
        assert!("hidden".parse::<ReviewStatus>().is_err());
    }

    #[test]
    fn notification_type_is_serialized_as_type() {
        let notification = Notification {
            id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            notification_type: NOTIFICATION_LIKE_REVIEW.into(),
            reference_id: None,
            message: "liked".into(),
            is_read: false,
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&notification).unwrap();
        assert_eq!(value["type"], "like_review");
        assert_eq!(value["is_read"], false);
    }
}
