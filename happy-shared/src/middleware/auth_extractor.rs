use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::errors::{AppError, ErrorCode};
use crate::types::auth::{AuthUser, Claims};

/// HMAC secret used to sign and verify tokens. Handlers obtain it from the
/// router state through `FromRef`.
#[derive(Clone)]
pub struct JwtSecret(Arc<str>);

impl JwtSecret {
    pub fn new(secret: impl AsRef<str>) -> Self {
        Self(Arc::from(secret.as_ref()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, AppError> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(self.as_bytes()),
        )
        .map_err(|e| AppError::internal(format!("JWT encoding failed: {e}")))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                AppError::new(ErrorCode::TokenExpired, "token has expired")
            }
            _ => AppError::new(ErrorCode::TokenInvalid, format!("invalid token: {e}")),
        })?;

        if token_data.claims.is_expired() {
            return Err(AppError::new(ErrorCode::TokenExpired, "token has expired"));
        }

        Ok(token_data.claims)
    }
}

impl std::fmt::Debug for JwtSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JwtSecret(..)")
    }
}

/// Application state that owns the signing secret. Routers whose state is
/// `Arc<T>` get `JwtSecret: FromRef` for free.
pub trait JwtSecretSource {
    fn jwt_secret(&self) -> &JwtSecret;
}

impl<T: JwtSecretSource> FromRef<Arc<T>> for JwtSecret {
    fn from_ref(state: &Arc<T>) -> Self {
        state.jwt_secret().clone()
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    JwtSecret: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)?;
        let secret = JwtSecret::from_ref(state);
        let claims = secret.verify(&token)?;

        Ok(AuthUser::from(claims))
    }
}

fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let auth_header = headers
        .get("Authorization")
        .ok_or_else(|| AppError::new(ErrorCode::Unauthorized, "missing authorization header"))?
        .to_str()
        .map_err(|_| AppError::new(ErrorCode::Unauthorized, "invalid authorization header"))?;

    match auth_header.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        Some(_) => Err(AppError::new(ErrorCode::Unauthorized, "missing bearer token")),
        None => Err(AppError::new(
            ErrorCode::Unauthorized,
            "authorization header must use Bearer scheme",
        )),
    }
}

/// Optional auth extractor, never rejects
pub struct OptionalAuthUser(pub Option<AuthUser>);

impl OptionalAuthUser {
    pub fn id(&self) -> Option<uuid::Uuid> {
        self.0.as_ref().map(|u| u.id)
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for OptionalAuthUser
where
    JwtSecret: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match AuthUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(Self(Some(user))),
            Err(_) => Ok(Self(None)),
        }
    }
}

/// Require Admin role
pub struct AdminUser(pub AuthUser);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    JwtSecret: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(AppError::new(ErrorCode::Forbidden, "admin access required"));
        }
        Ok(Self(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::auth::UserRole;
    use axum::http::Request;
    use uuid::Uuid;

    #[derive(Clone)]
    struct TestState {
        secret: JwtSecret,
    }

    impl FromRef<TestState> for JwtSecret {
        fn from_ref(state: &TestState) -> Self {
            state.secret.clone()
        }
    }

    fn state() -> TestState {
        TestState { secret: JwtSecret::new("test-secret") }
    }

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/auth/me");
        if let Some(value) = header {
            builder = builder.header("Authorization", value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    fn token_for(role: UserRole, ttl: i64) -> String {
        let claims = Claims::new(Uuid::now_v7(), "alice@example.com", role, ttl);
        state().secret.sign(&claims).unwrap()
    }

    #[tokio::test]
    async fn valid_token_yields_identity() {
        let token = token_for(UserRole::User, 3600);
        let mut parts = parts_with(Some(&format!("Bearer {token}")));

        let user = AuthUser::from_request_parts(&mut parts, &state()).await.unwrap();
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.role, UserRole::User);
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        let mut parts = parts_with(None);
        let err = AuthUser::from_request_parts(&mut parts, &state()).await.unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::Unauthorized);
    }

    #[tokio::test]
    async fn wrong_scheme_is_unauthorized() {
        let mut parts = parts_with(Some("Basic YWxpY2U6cHc="));
        let err = AuthUser::from_request_parts(&mut parts, &state()).await.unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::Unauthorized);
    }

    #[tokio::test]
    async fn expired_token_is_reported() {
        let token = token_for(UserRole::User, -120);
        let mut parts = parts_with(Some(&format!("Bearer {token}")));
        let err = AuthUser::from_request_parts(&mut parts, &state()).await.unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::TokenExpired);
    }

    #[tokio::test]
    async fn foreign_signature_is_invalid() {
        let claims = Claims::new(Uuid::now_v7(), "eve@example.com", UserRole::Admin, 3600);
        let forged = JwtSecret::new("other-secret").sign(&claims).unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {forged}")));
        let err = AuthUser::from_request_parts(&mut parts, &state()).await.unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::TokenInvalid);
    }

    #[tokio::test]
    async fn optional_never_rejects() {
        let mut parts = parts_with(Some("Bearer garbage"));
        let viewer = OptionalAuthUser::from_request_parts(&mut parts, &state()).await.unwrap();
        assert!(viewer.0.is_none());

        let token = token_for(UserRole::User, 3600);
        let mut parts = parts_with(Some(&format!("Bearer {token}")));
        let viewer = OptionalAuthUser::from_request_parts(&mut parts, &state()).await.unwrap();
        assert!(viewer.id().is_some());
    }

    struct SharedState {
        secret: JwtSecret,
    }

    impl JwtSecretSource for SharedState {
        fn jwt_secret(&self) -> &JwtSecret {
            &self.secret
        }
    }

    #[tokio::test]
    async fn arc_state_provides_secret() {
        let shared = Arc::new(SharedState { secret: state().secret });
        let token = token_for(UserRole::User, 3600);
        let mut parts = parts_with(Some(&format!("Bearer {token}")));

        let user = AuthUser::from_request_parts(&mut parts, &shared).await.unwrap();
        assert_eq!(user.email, "alice@example.com");
    }

    #[tokio::test]
    async fn admin_guard_requires_role() {
        let token = token_for(UserRole::User, 3600);
        let mut parts = parts_with(Some(&format!("Bearer {token}")));
        let err = AdminUser::from_request_parts(&mut parts, &state()).await.err().unwrap();
        assert_eq!(err.error_code(), ErrorCode::Forbidden);

        let token = token_for(UserRole::Admin, 3600);
        let mut parts = parts_with(Some(&format!("Bearer {token}")));
        let AdminUser(admin) = AdminUser::from_request_parts(&mut parts, &state()).await.ok().unwrap();
        assert!(admin.is_admin());
    }
}
