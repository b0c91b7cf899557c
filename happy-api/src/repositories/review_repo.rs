use std::collections::{HashMap, HashSet};

use chrono::Utc;
use diesel::dsl::{avg, count};
use diesel::pg::Pg;
use diesel::prelude::*;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use uuid::Uuid;

use happy_shared::errors::AppResult;
use happy_shared::types::auth::AuthUser;
use happy_shared::types::pagination::{PageRequest, Paginated};

use crate::models::{
    NewReview, NewReviewLike, RestaurantSummary, Review, ReviewChanges, ReviewStats, ReviewStatus,
    ReviewView, UserSummary,
};
use crate::repositories::search_term;
use crate::schema::{restaurants, review_likes, reviews, users};

#[derive(Debug, Default, Clone)]
pub struct ReviewFilters {
    pub search: Option<String>,
    pub restaurant_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub status: Option<ReviewStatus>,
}

/// Who is listing: the public (optionally signed in) or the moderation panel.
#[derive(Debug, Clone, Copy)]
pub enum ReviewScope {
    Public { viewer: Option<Uuid> },
    Moderation,
}

impl ReviewScope {
    fn viewer(&self) -> Option<Uuid> {
        match self {
            ReviewScope::Public { viewer } => *viewer,
            ReviewScope::Moderation => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusConstraint {
    Any,
    Only(ReviewStatus),
}

/// Public listings only show approved reviews, except when a viewer lists
/// their own reviews.
pub fn status_constraint(scope: ReviewScope, filters: &ReviewFilters) -> StatusConstraint {
    let requested = filters
        .status
        .map(StatusConstraint::Only)
        .unwrap_or(StatusConstraint::Any);

    match scope {
        ReviewScope::Moderation => requested,
        ReviewScope::Public { viewer: Some(viewer) } if filters.user_id == Some(viewer) => requested,
        ReviewScope::Public { .. } => StatusConstraint::Only(ReviewStatus::Approved),
    }
}

/// A non-approved review is only visible to its author and to admins.
pub fn is_visible_to(review: &Review, viewer: Option<&AuthUser>) -> bool {
    review.is_approved()
        || viewer.is_some_and(|v| v.id == review.user_id || v.is_admin())
}

fn filtered(filters: &ReviewFilters, constraint: StatusConstraint) -> reviews::BoxedQuery<'static, Pg> {
    let mut query = reviews::table.into_boxed();

    if let Some(pattern) = search_term(filters.search.as_deref()) {
        query = query.filter(reviews::comment.ilike(pattern));
    }
    if let Some(restaurant_id) = filters.restaurant_id {
        query = query.filter(reviews::restaurant_id.eq(restaurant_id));
    }
    if let Some(user_id) = filters.user_id {
        query = query.filter(reviews::user_id.eq(user_id));
    }
    if let StatusConstraint::Only(status) = constraint {
        query = query.filter(reviews::status.eq(status.as_str()));
    }

    query
}

pub fn find_all(
    conn: &mut PgConnection,
    filters: &ReviewFilters,
    scope: ReviewScope,
    page: PageRequest,
) -> AppResult<Paginated<ReviewView>> {
    let constraint = status_constraint(scope, filters);
    let total: i64 = filtered(filters, constraint).count().get_result(conn)?;

    let rows = filtered(filters, constraint)
        .order(reviews::created_at.desc())
        .limit(page.limit as i64)
        .offset(page.offset() as i64)
        .select(Review::as_select())
        .load(conn)?;

    let items = load_views(conn, rows, scope.viewer())?;
    Ok(Paginated::new(items, total as u64, page))
}

/// Approved reviews of the given restaurants, newest first.
pub fn find_approved_for_restaurants(
    conn: &mut PgConnection,
    restaurant_ids: Vec<Uuid>,
    viewer: Option<Uuid>,
) -> AppResult<Vec<ReviewView>> {
    if restaurant_ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = reviews::table
        .filter(reviews::restaurant_id.eq_any(restaurant_ids))
        .filter(reviews::status.eq(ReviewStatus::Approved.as_str()))
        .order(reviews::created_at.desc())
        .select(Review::as_select())
        .load(conn)?;

    load_views(conn, rows, viewer)
}

/// Attaches authors, restaurants and like information in three batched reads.
pub fn load_views(
    conn: &mut PgConnection,
    rows: Vec<Review>,
    viewer: Option<Uuid>,
) -> AppResult<Vec<ReviewView>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let review_ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let user_ids: Vec<Uuid> = rows
        .iter()
        .map(|r| r.user_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let restaurant_ids: Vec<Uuid> = rows
        .iter()
        .map(|r| r.restaurant_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let authors: HashMap<Uuid, UserSummary> = users::table
        .filter(users::id.eq_any(user_ids))
        .select(UserSummary::as_select())
        .load(conn)?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    let places: HashMap<Uuid, RestaurantSummary> = restaurants::table
        .filter(restaurants::id.eq_any(restaurant_ids))
        .select(RestaurantSummary::as_select())
        .load(conn)?
        .into_iter()
        .map(|r| (r.id, r))
        .collect();

    let likes: Vec<(Uuid, Uuid)> = review_likes::table
        .filter(review_likes::review_id.eq_any(review_ids))
        .select((review_likes::review_id, review_likes::user_id))
        .load(conn)?;

    let mut like_counts: HashMap<Uuid, i64> = HashMap::new();
    let mut liked_by_viewer: HashSet<Uuid> = HashSet::new();
    for (review_id, user_id) in likes {
        *like_counts.entry(review_id).or_default() += 1;
        if viewer == Some(user_id) {
            liked_by_viewer.insert(review_id);
        }
    }

    let views = rows
        .into_iter()
        .map(|review| ReviewView {
            user: authors.get(&review.user_id).cloned(),
            restaurant: places.get(&review.restaurant_id).cloned(),
            like_count: like_counts.get(&review.id).copied().unwrap_or(0),
            liked_by_viewer: liked_by_viewer.contains(&review.id),
            review,
        })
        .collect();

    Ok(views)
}

pub fn find_row(conn: &mut PgConnection, id: Uuid) -> AppResult<Option<Review>> {
    let review = reviews::table
        .find(id)
        .select(Review::as_select())
        .first(conn)
        .optional()?;
    Ok(review)
}

/// Review by id, hidden (`None`) when the viewer may not see it.
pub fn find_by_id(
    conn: &mut PgConnection,
    id: Uuid,
    viewer: Option<&AuthUser>,
) -> AppResult<Option<ReviewView>> {
    let Some(review) = find_row(conn, id)? else {
        return Ok(None);
    };
    if !is_visible_to(&review, viewer) {
        return Ok(None);
    }

    let mut views = load_views(conn, vec![review], viewer.map(|v| v.id))?;
    Ok(views.pop())
}

/// Ownership read used before mutating a review; `None` when it does not exist.
pub fn owner_of(conn: &mut PgConnection, review_id: Uuid) -> AppResult<Option<Uuid>> {
    let owner = reviews::table
        .find(review_id)
        .select(reviews::user_id)
        .first(conn)
        .optional()?;
    Ok(owner)
}

pub fn create(conn: &mut PgConnection, new_review: &NewReview) -> AppResult<Review> {
    let review = diesel::insert_into(reviews::table)
        .values(new_review)
        .returning(Review::as_returning())
        .get_result(conn)?;
    Ok(review)
}

pub fn update(
    conn: &mut PgConnection,
    id: Uuid,
    mut changes: ReviewChanges,
) -> AppResult<Option<Review>> {
    changes.updated_at = Some(Utc::now());
    let review = diesel::update(reviews::table.find(id))
        .set(&changes)
        .returning(Review::as_returning())
        .get_result(conn)
        .optional()?;
    Ok(review)
}

pub fn set_status(
    conn: &mut PgConnection,
    id: Uuid,
    status: ReviewStatus,
) -> AppResult<Option<Review>> {
    let review = diesel::update(reviews::table.find(id))
        .set((reviews::status.eq(status.as_str()), reviews::updated_at.eq(Utc::now())))
        .returning(Review::as_returning())
        .get_result(conn)
        .optional()?;
    Ok(review)
}

/// Returns the deleted row so callers can refresh the restaurant's rating.
pub fn delete(conn: &mut PgConnection, id: Uuid) -> AppResult<Option<Review>> {
    let review = diesel::delete(reviews::table.find(id))
        .returning(Review::as_returning())
        .get_result(conn)
        .optional()?;
    Ok(review)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeOutcome {
    Liked,
    AlreadyLiked,
}

/// The (review, user) unique constraint decides between concurrent likes.
pub fn like(conn: &mut PgConnection, review_id: Uuid, user_id: Uuid) -> AppResult<LikeOutcome> {
    let inserted = diesel::insert_into(review_likes::table)
        .values(&NewReviewLike {
            id: Uuid::now_v7(),
            review_id,
            user_id,
        })
        .on_conflict((review_likes::review_id, review_likes::user_id))
        .do_nothing()
        .execute(conn)?;

    Ok(if inserted == 0 {
        LikeOutcome::AlreadyLiked
    } else {
        LikeOutcome::Liked
    })
}

/// `false` when there was no like to remove.
pub fn unlike(conn: &mut PgConnection, review_id: Uuid, user_id: Uuid) -> AppResult<bool> {
    let deleted = diesel::delete(
        review_likes::table
            .filter(review_likes::review_id.eq(review_id))
            .filter(review_likes::user_id.eq(user_id)),
    )
    .execute(conn)?;
    Ok(deleted > 0)
}

pub fn like_count(conn: &mut PgConnection, review_id: Uuid) -> AppResult<i64> {
    let count: i64 = review_likes::table
        .filter(review_likes::review_id.eq(review_id))
        .count()
        .get_result(conn)?;
    Ok(count)
}

/// Mean rating rounded to one decimal, 0 for no ratings.
pub fn average_rating(ratings: &[i32]) -> f64 {
    if ratings.is_empty() {
        return 0.0;
    }
    let sum: i64 = ratings.iter().map(|&r| i64::from(r)).sum();
    let mean = sum as f64 / ratings.len() as f64;
    (mean * 10.0).round() / 10.0
}

pub fn approved_ratings(conn: &mut PgConnection, restaurant_id: Uuid) -> AppResult<Vec<i32>> {
    let ratings = reviews::table
        .filter(reviews::restaurant_id.eq(restaurant_id))
        .filter(reviews::status.eq(ReviewStatus::Approved.as_str()))
        .select(reviews::rating)
        .load(conn)?;
    Ok(ratings)
}

pub fn stats(conn: &mut PgConnection) -> AppResult<ReviewStats> {
    let total: i64 = reviews::table.count().get_result(conn)?;
    let total_likes: i64 = review_likes::table.count().get_result(conn)?;
    let mean: Option<Decimal> = reviews::table.select(avg(reviews::rating)).first(conn)?;

    let per_status: Vec<(String, i64)> = reviews::table
        .group_by(reviews::status)
        .select((reviews::status, count(reviews::id)))
        .load(conn)?;
    let count_of = |status: ReviewStatus| {
        per_status
            .iter()
            .find(|(s, _)| s == status.as_str())
            .map(|(_, n)| *n)
            .unwrap_or(0)
    };

    Ok(ReviewStats {
        total,
        total_likes,
        average_rating: mean
            .map(|m| m.round_dp(2))
            .and_then(|m| m.to_f64())
            .unwrap_or(0.0),
        pending: count_of(ReviewStatus::Pending),
        approved: count_of(ReviewStatus::Approved),
        rejected: count_of(ReviewStatus::Rejected),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use happy_shared::types::auth::UserRole;

    fn review(status: ReviewStatus, author: Uuid) -> Review {
        let now = Utc::now();
        Review {
            id: Uuid::now_v7(),
            user_id: author,
            restaurant_id: Uuid::now_v7(),
            rating: 4,
            comment: Some("tasty".into()),
            image_urls: vec![],
            dish_names: vec!["pho bo".into()],
            status: status.as_str().into(),
            created_at: now,
            updated_at: now,
        }
    }

    fn viewer(id: Uuid, role: UserRole) -> AuthUser {
        AuthUser {
            id,
            email: "viewer@example.com".into(),
            role,
            token_id: Uuid::now_v7(),
        }
    }

    #[test]
    fn public_listing_is_approved_only() {
        let filters = ReviewFilters {
            status: Some(ReviewStatus::Pending),
            ..Default::default()
        };
        assert_eq!(
            status_constraint(ReviewScope::Public { viewer: None }, &filters),
            StatusConstraint::Only(ReviewStatus::Approved)
        );
    }

    #[test]
    fn own_listing_shows_every_status() {
        let me = Uuid::now_v7();
        let mine = ReviewFilters {
            user_id: Some(me),
            ..Default::default()
        };
        assert_eq!(
            status_constraint(ReviewScope::Public { viewer: Some(me) }, &mine),
            StatusConstraint::Any
        );

        let someone_else = ReviewFilters {
            user_id: Some(Uuid::now_v7()),
            ..Default::default()
        };
        assert_eq!(
            status_constraint(ReviewScope::Public { viewer: Some(me) }, &someone_else),
            StatusConstraint::Only(ReviewStatus::Approved)
        );
    }

    #[test]
    fn moderation_honours_requested_status() {
        let filters = ReviewFilters {
            status: Some(ReviewStatus::Rejected),
            ..Default::default()
        };
        assert_eq!(
            status_constraint(ReviewScope::Moderation, &filters),
            StatusConstraint::Only(ReviewStatus::Rejected)
        );
        assert_eq!(
            status_constraint(ReviewScope::Moderation, &ReviewFilters::default()),
            StatusConstraint::Any
        );
    }

    #[test]
    fn pending_review_visibility() {
        let author = Uuid::now_v7();
        let pending = review(ReviewStatus::Pending, author);

        assert!(!is_visible_to(&pending, None));
        assert!(!is_visible_to(&pending, Some(&viewer(Uuid::now_v7(), UserRole::User))));
        assert!(is_visible_to(&pending, Some(&viewer(author, UserRole::User))));
        assert!(is_visible_to(&pending, Some(&viewer(Uuid::now_v7(), UserRole::Admin))));
        assert!(is_visible_to(&review(ReviewStatus::Approved, author), None));
    }

    #[test]
    fn average_is_rounded_to_one_decimal() {
        assert_eq!(average_rating(&[]), 0.0);
        assert_eq!(average_rating(&[5]), 5.0);
        assert_eq!(average_rating(&[4, 5, 5]), 4.7);
        assert_eq!(average_rating(&[1, 2]), 1.5);
    }

    #[test]
    fn filters_render_sql() {
        let filters = ReviewFilters {
            search: Some("noodle".into()),
            restaurant_id: Some(Uuid::now_v7()),
            ..Default::default()
        };
        let query = filtered(&filters, StatusConstraint::Only(ReviewStatus::Approved));
        let sql = diesel::debug_query::<Pg, _>(&query).to_string();
        assert!(sql.contains("\"reviews\".\"comment\" ILIKE $"));
        assert!(sql.contains("\"reviews\".\"status\" = $"));
        assert!(!sql.contains("\"reviews\".\"user_id\" = $"));
    }
}
