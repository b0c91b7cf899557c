use std::collections::HashMap;

use chrono::Utc;
use diesel::pg::Pg;
use diesel::prelude::*;
use uuid::Uuid;

use happy_shared::errors::AppResult;
use happy_shared::types::pagination::{PageRequest, Paginated};

use crate::geo::{self, GeoPoint};
use crate::hours::{self, Period};
use crate::models::{MenuItem, NewRestaurant, Restaurant, RestaurantChanges, RestaurantDetail, ReviewView};
use crate::repositories::{menu_repo, review_repo, search_term};
use crate::schema::restaurants;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearFilter {
    pub origin: GeoPoint,
    pub radius_km: f64,
}

#[derive(Debug, Default, Clone)]
pub struct RestaurantFilters {
    pub search: Option<String>,
    pub cuisine: Option<String>,
    pub min_rating: Option<f64>,
    pub open_during: Option<Period>,
    pub near: Option<NearFilter>,
}

impl RestaurantFilters {
    /// Opening hours and distance are evaluated in memory after the SQL filters.
    fn needs_post_filter(&self) -> bool {
        self.open_during.is_some() || self.near.is_some()
    }
}

fn filtered(filters: &RestaurantFilters) -> restaurants::BoxedQuery<'static, Pg> {
    let mut query = restaurants::table.into_boxed();

    if let Some(pattern) = search_term(filters.search.as_deref()) {
        query = query.filter(
            restaurants::name
                .ilike(pattern.clone())
                .or(restaurants::address.ilike(pattern.clone()))
                .or(restaurants::cuisine_type.ilike(pattern).assume_not_null()),
        );
    }
    if let Some(pattern) = search_term(filters.cuisine.as_deref()) {
        query = query.filter(restaurants::cuisine_type.ilike(pattern));
    }
    if let Some(min_rating) = filters.min_rating {
        query = query.filter(restaurants::rating.ge(min_rating));
    }

    query
}

/// Applies the in-memory filters and returns each kept restaurant with its
/// distance from the origin, nearest first when a distance filter is set.
pub fn post_filter(
    rows: Vec<Restaurant>,
    filters: &RestaurantFilters,
) -> Vec<(Restaurant, Option<f64>)> {
    let mut kept: Vec<(Restaurant, Option<f64>)> = rows
        .into_iter()
        .filter(|r| match filters.open_during {
            Some(period) => r
                .opening_hours
                .as_deref()
                .is_some_and(|h| hours::is_open_during(h, period)),
            None => true,
        })
        .filter_map(|r| match filters.near {
            Some(near) => {
                let here = GeoPoint::new(r.latitude?, r.longitude?)?;
                let distance = geo::distance_km(near.origin, here);
                (distance <= near.radius_km).then_some((r, Some(distance)))
            }
            None => Some((r, None)),
        })
        .collect();

    if filters.near.is_some() {
        kept.sort_by(|a, b| a.1.unwrap_or(f64::MAX).total_cmp(&b.1.unwrap_or(f64::MAX)));
    }
    kept
}

pub fn find_all(
    conn: &mut PgConnection,
    filters: &RestaurantFilters,
    page: PageRequest,
    viewer: Option<Uuid>,
) -> AppResult<Paginated<RestaurantDetail>> {
    let (rows, total) = if filters.needs_post_filter() {
        let candidates = filtered(filters)
            .order(restaurants::created_at.desc())
            .select(Restaurant::as_select())
            .load(conn)?;
        let kept = post_filter(candidates, filters);
        let total = kept.len() as u64;
        (page.slice(kept), total)
    } else {
        let total: i64 = filtered(filters).count().get_result(conn)?;
        let rows = filtered(filters)
            .order(restaurants::created_at.desc())
            .limit(page.limit as i64)
            .offset(page.offset() as i64)
            .select(Restaurant::as_select())
            .load(conn)?;
        (rows.into_iter().map(|r| (r, None)).collect(), total as u64)
    };

    let items = attach_relations(conn, rows, viewer)?;
    Ok(Paginated::new(items, total, page))
}

fn attach_relations(
    conn: &mut PgConnection,
    rows: Vec<(Restaurant, Option<f64>)>,
    viewer: Option<Uuid>,
) -> AppResult<Vec<RestaurantDetail>> {
    let ids: Vec<Uuid> = rows.iter().map(|(r, _)| r.id).collect();

    let mut menus: HashMap<Uuid, Vec<MenuItem>> = HashMap::new();
    for item in menu_repo::find_for_restaurants(conn, ids.clone())? {
        menus.entry(item.restaurant_id).or_default().push(item);
    }

    let mut reviews: HashMap<Uuid, Vec<ReviewView>> = HashMap::new();
    for view in review_repo::find_approved_for_restaurants(conn, ids, viewer)? {
        reviews.entry(view.review.restaurant_id).or_default().push(view);
    }

    Ok(rows
        .into_iter()
        .map(|(restaurant, distance_km)| RestaurantDetail {
            menu_items: menus.remove(&restaurant.id).unwrap_or_default(),
            reviews: reviews.remove(&restaurant.id).unwrap_or_default(),
            restaurant,
            distance_km,
        })
        .collect())
}

/// Restaurant with its menu and approved reviews, like flags for `viewer`.
pub fn find_by_id(
    conn: &mut PgConnection,
    id: Uuid,
    viewer: Option<Uuid>,
) -> AppResult<Option<RestaurantDetail>> {
    let Some(restaurant) = find_row(conn, id)? else {
        return Ok(None);
    };
    let mut details = attach_relations(conn, vec![(restaurant, None)], viewer)?;
    Ok(details.pop())
}

pub fn find_row(conn: &mut PgConnection, id: Uuid) -> AppResult<Option<Restaurant>> {
    let restaurant = restaurants::table
        .find(id)
        .select(Restaurant::as_select())
        .first(conn)
        .optional()?;
    Ok(restaurant)
}

pub fn exists(conn: &mut PgConnection, id: Uuid) -> AppResult<bool> {
    let found = diesel::select(diesel::dsl::exists(restaurants::table.find(id))).get_result(conn)?;
    Ok(found)
}

pub fn create(conn: &mut PgConnection, new_restaurant: &NewRestaurant) -> AppResult<Restaurant> {
    let restaurant = diesel::insert_into(restaurants::table)
        .values(new_restaurant)
        .returning(Restaurant::as_returning())
        .get_result(conn)?;
    Ok(restaurant)
}

pub fn update(
    conn: &mut PgConnection,
    id: Uuid,
    mut changes: RestaurantChanges,
) -> AppResult<Option<Restaurant>> {
    changes.updated_at = Some(Utc::now());
    let restaurant = diesel::update(restaurants::table.find(id))
        .set(&changes)
        .returning(Restaurant::as_returning())
        .get_result(conn)
        .optional()?;
    Ok(restaurant)
}

/// Menu items, reviews and favorites are removed with the restaurant.
pub fn delete(conn: &mut PgConnection, id: Uuid) -> AppResult<bool> {
    let deleted = diesel::delete(restaurants::table.find(id)).execute(conn)?;
    Ok(deleted > 0)
}

/// Recomputes the stored rating from the approved reviews.
pub fn refresh_rating(conn: &mut PgConnection, id: Uuid) -> AppResult<f64> {
    let ratings = review_repo::approved_ratings(conn, id)?;
    let rating = review_repo::average_rating(&ratings);

    diesel::update(restaurants::table.find(id))
        .set(restaurants::rating.eq(rating))
        .execute(conn)?;

    tracing::debug!(restaurant_id = %id, rating, reviews = ratings.len(), "restaurant rating refreshed");
    Ok(rating)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn restaurant(name: &str, hours: Option<&str>, at: Option<(f64, f64)>) -> Restaurant {
        let now = Utc::now();
        Restaurant {
            id: Uuid::now_v7(),
            name: name.into(),
            address: "somewhere".into(),
            cuisine_type: Some("Vietnamese".into()),
            description: None,
            image_url: None,
            phone: None,
            opening_hours: hours.map(Into::into),
            latitude: at.map(|p| p.0),
            longitude: at.map(|p| p.1),
            rating: 0.0,
            created_at: now,
            updated_at: now,
        }
    }

    fn names(kept: &[(Restaurant, Option<f64>)]) -> Vec<&str> {
        kept.iter().map(|(r, _)| r.name.as_str()).collect()
    }

    #[test]
    fn opening_period_filter() {
        let rows = vec![
            restaurant("breakfast", Some("06:30 - 10:00"), None),
            restaurant("dinner", Some("17:00 - 22:00"), None),
            restaurant("unknown", None, None),
        ];
        let filters = RestaurantFilters {
            open_during: Some(Period::Evening),
            ..Default::default()
        };
        assert_eq!(names(&post_filter(rows, &filters)), vec!["dinner"]);
    }

    #[test]
    fn near_filter_sorts_by_distance() {
        let origin = GeoPoint::new(10.7769, 106.7009).unwrap();
        let rows = vec![
            restaurant("two-km", None, Some((10.7949, 106.7009))),
            restaurant("next-door", None, Some((10.7772, 106.7010))),
            restaurant("far-away", None, Some((21.0278, 105.8342))),
            restaurant("no-coordinates", None, None),
        ];
        let filters = RestaurantFilters {
            near: Some(NearFilter { origin, radius_km: 3.0 }),
            ..Default::default()
        };

        let kept = post_filter(rows, &filters);
        assert_eq!(names(&kept), vec!["next-door", "two-km"]);
        assert!(kept.iter().all(|(_, d)| d.is_some_and(|d| d <= 3.0)));
    }

    #[test]
    fn sql_filters_render() {
        let filters = RestaurantFilters {
            search: Some("pho".into()),
            min_rating: Some(4.0),
            ..Default::default()
        };
        let sql = diesel::debug_query::<Pg, _>(&filtered(&filters)).to_string();
        assert!(sql.contains("\"restaurants\".\"name\" ILIKE $"));
        assert!(sql.contains("\"restaurants\".\"rating\" >= $"));
        assert!(!filters.needs_post_filter());
    }
}
