use happy_shared::errors::AppError;
use happy_shared::middleware::JwtSecret;
use happy_shared::types::auth::Claims;

use crate::models::User;

/// Signs an access token for the account. There is no refresh token; the
/// client signs in again once it expires.
pub fn issue_token(secret: &JwtSecret, user: &User, ttl_secs: i64) -> Result<String, AppError> {
    let claims = Claims::new(user.id, user.email.clone(), user.user_role(), ttl_secs);
    secret.sign(&claims)
}
