use chrono::Utc;
use diesel::pg::Pg;
use diesel::prelude::*;
use uuid::Uuid;

use happy_shared::errors::AppResult;
use happy_shared::types::auth::UserRole;
use happy_shared::types::pagination::{PageRequest, Paginated};

use crate::models::{NewUser, ProfileChanges, User, UserStats};
use crate::repositories::search_term;
use crate::schema::users;

#[derive(Debug, Default, Clone)]
pub struct UserFilters {
    pub search: Option<String>,
    pub role: Option<UserRole>,
    pub is_blocked: Option<bool>,
}

fn filtered(filters: &UserFilters) -> users::BoxedQuery<'static, Pg> {
    let mut query = users::table.into_boxed();

    if let Some(pattern) = search_term(filters.search.as_deref()) {
        query = query.filter(users::name.ilike(pattern.clone()).or(users::email.ilike(pattern)));
    }
    if let Some(role) = filters.role {
        query = query.filter(users::role.eq(role.as_str()));
    }
    if let Some(blocked) = filters.is_blocked {
        query = query.filter(users::is_blocked.eq(blocked));
    }

    query
}

pub fn find_all(
    conn: &mut PgConnection,
    filters: &UserFilters,
    page: PageRequest,
) -> AppResult<Paginated<User>> {
    let total: i64 = filtered(filters).count().get_result(conn)?;

    let items = filtered(filters)
        .order(users::created_at.desc())
        .limit(page.limit as i64)
        .offset(page.offset() as i64)
        .select(User::as_select())
        .load(conn)?;

    Ok(Paginated::new(items, total as u64, page))
}

pub fn find_by_id(conn: &mut PgConnection, id: Uuid) -> AppResult<Option<User>> {
    let user = users::table
        .find(id)
        .select(User::as_select())
        .first(conn)
        .optional()?;
    Ok(user)
}

pub fn find_by_email(conn: &mut PgConnection, email: &str) -> AppResult<Option<User>> {
    let user = users::table
        .filter(users::email.eq(normalize_email(email)))
        .select(User::as_select())
        .first(conn)
        .optional()?;
    Ok(user)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Inserts the account. `None` means the email is already registered; the
/// unique index decides, so concurrent registrations cannot both succeed.
pub fn create(conn: &mut PgConnection, new_user: &NewUser) -> AppResult<Option<User>> {
    let user = diesel::insert_into(users::table)
        .values(new_user)
        .on_conflict(users::email)
        .do_nothing()
        .returning(User::as_returning())
        .get_result(conn)
        .optional()?;
    Ok(user)
}

pub fn update_profile(
    conn: &mut PgConnection,
    id: Uuid,
    mut changes: ProfileChanges,
) -> AppResult<Option<User>> {
    changes.updated_at = Some(Utc::now());
    let user = diesel::update(users::table.find(id))
        .set(&changes)
        .returning(User::as_returning())
        .get_result(conn)
        .optional()?;
    Ok(user)
}

pub fn update_password(conn: &mut PgConnection, id: Uuid, password_hash: &str) -> AppResult<bool> {
    let updated = diesel::update(users::table.find(id))
        .set((
            users::password_hash.eq(password_hash),
            users::updated_at.eq(Utc::now()),
        ))
        .execute(conn)?;
    Ok(updated > 0)
}

pub fn set_blocked(conn: &mut PgConnection, id: Uuid, blocked: bool) -> AppResult<Option<User>> {
    let user = diesel::update(users::table.find(id))
        .set((users::is_blocked.eq(blocked), users::updated_at.eq(Utc::now())))
        .returning(User::as_returning())
        .get_result(conn)
        .optional()?;
    Ok(user)
}

pub fn set_role(conn: &mut PgConnection, id: Uuid, role: UserRole) -> AppResult<Option<User>> {
    let user = diesel::update(users::table.find(id))
        .set((users::role.eq(role.as_str()), users::updated_at.eq(Utc::now())))
        .returning(User::as_returning())
        .get_result(conn)
        .optional()?;
    Ok(user)
}

pub fn touch_last_active(conn: &mut PgConnection, id: Uuid) -> AppResult<()> {
    diesel::update(users::table.find(id))
        .set(users::last_active_at.eq(Some(Utc::now())))
        .execute(conn)?;
    Ok(())
}

/// Reviews, likes, favorites and notifications go with the account.
pub fn delete(conn: &mut PgConnection, id: Uuid) -> AppResult<bool> {
    let deleted = diesel::delete(users::table.find(id)).execute(conn)?;
    Ok(deleted > 0)
}

pub fn stats(conn: &mut PgConnection) -> AppResult<UserStats> {
    let total: i64 = users::table.count().get_result(conn)?;
    let blocked: i64 = users::table
        .filter(users::is_blocked.eq(true))
        .count()
        .get_result(conn)?;
    let admins: i64 = users::table
        .filter(users::role.eq(UserRole::Admin.as_str()))
        .count()
        .get_result(conn)?;

    Ok(UserStats {
        total,
        active: total - blocked,
        blocked,
        admins,
    })
}
