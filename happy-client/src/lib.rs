//! Client side of Happy Lunch: a typed HTTP client for the REST API and the
//! persisted authentication store the UI reads its session from.

pub mod auth;
pub mod error;
pub mod http;
pub mod store;
pub mod types;

pub use auth::AuthClient;
pub use error::{ClientError, ClientResult};
pub use http::HttpClient;
pub use store::{AuthState, AuthStore};
pub use types::*;
