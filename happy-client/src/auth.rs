use std::path::PathBuf;

use crate::error::{ClientError, ClientResult};
use crate::http::HttpClient;
use crate::store::{AuthState, AuthStore};
use crate::types::{
    AuthPayload, ChangePasswordRequest, LoginRequest, ProfileUpdate, RegisterInput, UserProfile,
};

/// Authentication actions backed by the persisted [`AuthStore`].
///
/// Failed calls return the server's error and leave the stored session as
/// it was.
pub struct AuthClient {
    http: HttpClient,
    store: AuthStore,
}

impl AuthClient {
    pub fn new(base_url: impl Into<String>, store_path: impl Into<PathBuf>) -> ClientResult<Self> {
        let store = AuthStore::open(store_path)?;
        let mut http = HttpClient::new(base_url)?;
        http.set_token(store.token().map(str::to_string));
        Ok(Self { http, store })
    }

    pub fn state(&self) -> &AuthState {
        self.store.state()
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.state().is_authenticated()
    }

    /// The underlying HTTP client, carrying the current token.
    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    pub async fn register(&mut self, input: &RegisterInput) -> ClientResult<UserProfile> {
        let payload: AuthPayload = self.http.post("/api/auth/register", input).await?;
        self.start_session(payload)
    }

    pub async fn login(&mut self, email: &str, password: &str) -> ClientResult<UserProfile> {
        let payload: AuthPayload = self
            .http
            .post("/api/auth/login", &LoginRequest { email, password })
            .await?;
        self.start_session(payload)
    }

    /// Local only; tokens are stateless on the server.
    pub fn logout(&mut self) -> ClientResult<()> {
        self.http.set_token(None);
        self.store.clear()?;
        tracing::info!("signed out");
        Ok(())
    }

    pub async fn current_user(&mut self) -> ClientResult<UserProfile> {
        self.require_token()?;
        let user: UserProfile = self.http.get("/api/auth/me").await?;
        self.store.set_user(user.clone())?;
        Ok(user)
    }

    pub async fn update_profile(&mut self, update: &ProfileUpdate) -> ClientResult<UserProfile> {
        self.require_token()?;
        let user: UserProfile = self.http.put("/api/auth/profile", update).await?;
        self.store.set_user(user.clone())?;
        Ok(user)
    }

    pub async fn change_password(&self, current: &str, new: &str) -> ClientResult<()> {
        self.require_token()?;
        let request = ChangePasswordRequest {
            current_password: current,
            new_password: new,
        };
        let _: () = self.http.put("/api/auth/change-password", &request).await?;
        Ok(())
    }

    fn start_session(&mut self, payload: AuthPayload) -> ClientResult<UserProfile> {
        self.store
            .set_session(payload.token.clone(), payload.user.clone())?;
        self.http.set_token(Some(payload.token));
        tracing::info!(user_id = %payload.user.id, "signed in");
        Ok(payload.user)
    }

    fn require_token(&self) -> ClientResult<()> {
        match self.http.token() {
            Some(_) => Ok(()),
            None => Err(ClientError::NotAuthenticated),
        }
    }
}
