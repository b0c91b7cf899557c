use chrono::Utc;
use diesel::dsl::{avg, count};
use diesel::pg::Pg;
use diesel::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

use happy_shared::errors::AppResult;
use happy_shared::types::pagination::{PageRequest, Paginated};

use crate::models::{
    MenuItem, MenuItemChanges, MenuItemView, MenuStats, NewMenuItem, RestaurantCount, RestaurantRef,
};
use crate::repositories::search_term;
use crate::schema::{menu_items, restaurants};

const TOP_RESTAURANTS: usize = 5;

#[derive(Debug, Default, Clone)]
pub struct MenuFilters {
    pub search: Option<String>,
    pub restaurant_id: Option<Uuid>,
}

fn filtered(filters: &MenuFilters) -> menu_items::BoxedQuery<'static, Pg> {
    let mut query = menu_items::table.into_boxed();

    if let Some(pattern) = search_term(filters.search.as_deref()) {
        query = query.filter(
            menu_items::name
                .ilike(pattern.clone())
                .or(menu_items::description.ilike(pattern).assume_not_null()),
        );
    }
    if let Some(restaurant_id) = filters.restaurant_id {
        query = query.filter(menu_items::restaurant_id.eq(restaurant_id));
    }

    query
}

pub fn find_all(
    conn: &mut PgConnection,
    filters: &MenuFilters,
    page: PageRequest,
) -> AppResult<Paginated<MenuItemView>> {
    let total: i64 = filtered(filters).count().get_result(conn)?;

    let ids: Vec<Uuid> = filtered(filters)
        .order((menu_items::restaurant_id.asc(), menu_items::created_at.desc()))
        .limit(page.limit as i64)
        .offset(page.offset() as i64)
        .select(menu_items::id)
        .load(conn)?;

    let rows: Vec<(MenuItem, RestaurantRef)> = menu_items::table
        .inner_join(restaurants::table)
        .filter(menu_items::id.eq_any(ids))
        .order((menu_items::restaurant_id.asc(), menu_items::created_at.desc()))
        .select((MenuItem::as_select(), RestaurantRef::as_select()))
        .load(conn)?;

    let items = rows
        .into_iter()
        .map(|(item, restaurant)| MenuItemView { item, restaurant })
        .collect();
    Ok(Paginated::new(items, total as u64, page))
}

pub fn find_by_id(conn: &mut PgConnection, id: Uuid) -> AppResult<Option<MenuItemView>> {
    let row: Option<(MenuItem, RestaurantRef)> = menu_items::table
        .inner_join(restaurants::table)
        .filter(menu_items::id.eq(id))
        .select((MenuItem::as_select(), RestaurantRef::as_select()))
        .first(conn)
        .optional()?;
    Ok(row.map(|(item, restaurant)| MenuItemView { item, restaurant }))
}

pub fn find_by_restaurant(conn: &mut PgConnection, restaurant_id: Uuid) -> AppResult<Vec<MenuItem>> {
    find_for_restaurants(conn, vec![restaurant_id])
}

pub fn find_for_restaurants(
    conn: &mut PgConnection,
    restaurant_ids: Vec<Uuid>,
) -> AppResult<Vec<MenuItem>> {
    if restaurant_ids.is_empty() {
        return Ok(Vec::new());
    }
    let items = menu_items::table
        .filter(menu_items::restaurant_id.eq_any(restaurant_ids))
        .order(menu_items::created_at.asc())
        .select(MenuItem::as_select())
        .load(conn)?;
    Ok(items)
}

pub fn create(conn: &mut PgConnection, new_item: &NewMenuItem) -> AppResult<MenuItem> {
    let item = diesel::insert_into(menu_items::table)
        .values(new_item)
        .returning(MenuItem::as_returning())
        .get_result(conn)?;
    Ok(item)
}

pub fn update(
    conn: &mut PgConnection,
    id: Uuid,
    mut changes: MenuItemChanges,
) -> AppResult<Option<MenuItem>> {
    changes.updated_at = Some(Utc::now());
    let item = diesel::update(menu_items::table.find(id))
        .set(&changes)
        .returning(MenuItem::as_returning())
        .get_result(conn)
        .optional()?;
    Ok(item)
}

pub fn delete(conn: &mut PgConnection, id: Uuid) -> AppResult<bool> {
    let deleted = diesel::delete(menu_items::table.find(id)).execute(conn)?;
    Ok(deleted > 0)
}

/// Highest counts first, ties broken by name.
pub fn top_counts(mut counts: Vec<RestaurantCount>, limit: usize) -> Vec<RestaurantCount> {
    counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    counts.truncate(limit);
    counts
}

pub fn stats(conn: &mut PgConnection) -> AppResult<MenuStats> {
    let total: i64 = menu_items::table.count().get_result(conn)?;
    let average_price: Option<Decimal> = menu_items::table
        .select(avg(menu_items::price))
        .first(conn)?;

    let per_restaurant: Vec<(Uuid, String, i64)> = menu_items::table
        .inner_join(restaurants::table)
        .group_by((restaurants::id, restaurants::name))
        .select((restaurants::id, restaurants::name, count(menu_items::id)))
        .load(conn)?;

    let counts = per_restaurant
        .into_iter()
        .map(|(restaurant_id, name, count)| RestaurantCount {
            restaurant_id,
            name,
            count,
        })
        .collect();

    Ok(MenuStats {
        total,
        average_price: average_price.map(|p| p.round_dp(2)).unwrap_or_default(),
        top_restaurants: top_counts(counts, TOP_RESTAURANTS),
    })
}
