use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with its error envelope.
    #[error("{message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("not signed in")]
    NotAuthenticated,

    #[error("auth store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    /// The `E....` code reported by the server, if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            ClientError::Api { code, .. } => Some(code),
            _ => None,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
