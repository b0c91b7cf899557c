use std::collections::HashMap;

use diesel::dsl::count;
use diesel::prelude::*;
use uuid::Uuid;

use happy_shared::errors::AppResult;
use happy_shared::types::pagination::{PageRequest, Paginated};

use crate::models::{
    Favorite, FavoriteStats, FavoriteView, MenuItem, NewFavorite, Restaurant, RestaurantCount,
};
use crate::repositories::menu_repo;
use crate::schema::{favorites, restaurants};

/// Menu items shown with each favorite.
const MENU_PREVIEW: usize = 3;
const TOP_RESTAURANTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FavoriteOutcome {
    Added,
    AlreadyExists,
}

/// The account's favorites, most recently added first.
pub fn find_by_user(
    conn: &mut PgConnection,
    user_id: Uuid,
    page: PageRequest,
) -> AppResult<Paginated<FavoriteView>> {
    let total: i64 = favorites::table
        .filter(favorites::user_id.eq(user_id))
        .count()
        .get_result(conn)?;

    let rows: Vec<(Favorite, Restaurant)> = favorites::table
        .inner_join(restaurants::table)
        .filter(favorites::user_id.eq(user_id))
        .order(favorites::created_at.desc())
        .limit(page.limit as i64)
        .offset(page.offset() as i64)
        .select((Favorite::as_select(), Restaurant::as_select()))
        .load(conn)?;

    let ids: Vec<Uuid> = rows.iter().map(|(f, _)| f.restaurant_id).collect();
    let mut menus: HashMap<Uuid, Vec<MenuItem>> = HashMap::new();
    for item in menu_repo::find_for_restaurants(conn, ids)? {
        let preview = menus.entry(item.restaurant_id).or_default();
        if preview.len() < MENU_PREVIEW {
            preview.push(item);
        }
    }

    let items = rows
        .into_iter()
        .map(|(favorite, restaurant)| FavoriteView {
            restaurant_id: favorite.restaurant_id,
            created_at: favorite.created_at,
            menu_items: menus.remove(&restaurant.id).unwrap_or_default(),
            restaurant,
        })
        .collect();

    Ok(Paginated::new(items, total as u64, page))
}

pub fn add(conn: &mut PgConnection, user_id: Uuid, restaurant_id: Uuid) -> AppResult<FavoriteOutcome> {
    let inserted = diesel::insert_into(favorites::table)
        .values(&NewFavorite { user_id, restaurant_id })
        .on_conflict((favorites::user_id, favorites::restaurant_id))
        .do_nothing()
        .execute(conn)?;

    Ok(if inserted == 0 {
        FavoriteOutcome::AlreadyExists
    } else {
        FavoriteOutcome::Added
    })
}

/// `false` when the restaurant was not a favorite.
pub fn remove(conn: &mut PgConnection, user_id: Uuid, restaurant_id: Uuid) -> AppResult<bool> {
    let deleted = diesel::delete(favorites::table.find((user_id, restaurant_id))).execute(conn)?;
    Ok(deleted > 0)
}

pub fn is_favorite(conn: &mut PgConnection, user_id: Uuid, restaurant_id: Uuid) -> AppResult<bool> {
    let found = diesel::select(diesel::dsl::exists(
        favorites::table.find((user_id, restaurant_id)),
    ))
    .get_result(conn)?;
    Ok(found)
}

pub fn stats(conn: &mut PgConnection) -> AppResult<FavoriteStats> {
    let total: i64 = favorites::table.count().get_result(conn)?;

    let per_restaurant: Vec<(Uuid, String, i64)> = favorites::table
        .inner_join(restaurants::table)
        .group_by((restaurants::id, restaurants::name))
        .select((restaurants::id, restaurants::name, count(favorites::user_id)))
        .load(conn)?;

    let counts = per_restaurant
        .into_iter()
        .map(|(restaurant_id, name, count)| RestaurantCount {
            restaurant_id,
            name,
            count,
        })
        .collect();

    Ok(FavoriteStats {
        total,
        top_restaurants: menu_repo::top_counts(counts, TOP_RESTAURANTS),
    })
}
