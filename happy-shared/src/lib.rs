pub mod clients;
pub mod errors;
pub mod extract;
pub mod middleware;
pub mod types;

pub use errors::{AppError, AppResult, ErrorCode};
pub use types::*;
