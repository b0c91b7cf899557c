use std::collections::HashMap;

use diesel::prelude::*;
use uuid::Uuid;

use happy_shared::errors::AppResult;
use happy_shared::types::pagination::{PageRequest, Paginated};

use crate::models::{NewNotification, Notification, NotificationView, RestaurantRef};
use crate::schema::{notifications, restaurants, reviews};

/// Insert a new notification.
pub fn create(conn: &mut PgConnection, new_notification: &NewNotification) -> AppResult<Notification> {
    let notification = diesel::insert_into(notifications::table)
        .values(new_notification)
        .returning(Notification::as_returning())
        .get_result(conn)?;

    tracing::debug!(
        notification_id = %notification.id,
        user_id = %notification.user_id,
        notification_type = %notification.notification_type,
        "notification created"
    );

    Ok(notification)
}

/// List a recipient's notifications, newest first, each with the restaurant
/// of the review it refers to.
pub fn list(
    conn: &mut PgConnection,
    user_id: Uuid,
    unread_only: bool,
    page: PageRequest,
) -> AppResult<Paginated<NotificationView>> {
    let mut count_query = notifications::table
        .filter(notifications::user_id.eq(user_id))
        .into_boxed();
    let mut items_query = notifications::table
        .filter(notifications::user_id.eq(user_id))
        .into_boxed();
    if unread_only {
        count_query = count_query.filter(notifications::is_read.eq(false));
        items_query = items_query.filter(notifications::is_read.eq(false));
    }

    let total: i64 = count_query.count().get_result(conn)?;

    let rows = items_query
        .order(notifications::created_at.desc())
        .limit(page.limit as i64)
        .offset(page.offset() as i64)
        .select(Notification::as_select())
        .load(conn)?;

    let items = with_restaurants(conn, rows)?;
    Ok(Paginated::new(items, total as u64, page))
}

/// Resolves `reference_id` (a review) to the review's restaurant.
pub fn with_restaurants(
    conn: &mut PgConnection,
    rows: Vec<Notification>,
) -> AppResult<Vec<NotificationView>> {
    let review_ids: Vec<Uuid> = rows.iter().filter_map(|n| n.reference_id).collect();

    let places: HashMap<Uuid, RestaurantRef> = if review_ids.is_empty() {
        HashMap::new()
    } else {
        reviews::table
            .inner_join(restaurants::table)
            .filter(reviews::id.eq_any(review_ids))
            .select((reviews::id, RestaurantRef::as_select()))
            .load::<(Uuid, RestaurantRef)>(conn)?
            .into_iter()
            .collect()
    };

    Ok(rows
        .into_iter()
        .map(|notification| NotificationView {
            restaurant: notification
                .reference_id
                .and_then(|id| places.get(&id).cloned()),
            notification,
        })
        .collect())
}

pub fn find_by_id(conn: &mut PgConnection, id: Uuid) -> AppResult<Option<Notification>> {
    let notification = notifications::table
        .find(id)
        .select(Notification::as_select())
        .first(conn)
        .optional()?;
    Ok(notification)
}

/// Count unread notifications for a user.
pub fn count_unread(conn: &mut PgConnection, user_id: Uuid) -> AppResult<i64> {
    let count: i64 = notifications::table
        .filter(notifications::user_id.eq(user_id))
        .filter(notifications::is_read.eq(false))
        .count()
        .get_result(conn)?;

    Ok(count)
}

/// Mark all unread notifications as read for a user.
pub fn mark_all_read(conn: &mut PgConnection, user_id: Uuid) -> AppResult<usize> {
    let updated = diesel::update(
        notifications::table
            .filter(notifications::user_id.eq(user_id))
            .filter(notifications::is_read.eq(false)),
    )
    .set(notifications::is_read.eq(true))
    .execute(conn)?;

    Ok(updated)
}

pub fn mark_read(conn: &mut PgConnection, id: Uuid) -> AppResult<Option<Notification>> {
    let notification = diesel::update(notifications::table.find(id))
        .set(notifications::is_read.eq(true))
        .returning(Notification::as_returning())
        .get_result(conn)
        .optional()?;
    Ok(notification)
}
