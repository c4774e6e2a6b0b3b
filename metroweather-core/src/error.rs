use thiserror::Error;

/// Errors surfaced by the core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A required parameter was missing or out of range.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// The requested record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The weather provider call failed or returned nothing usable.
    #[error("Failed to fetch weather for city {city_id}: {source}")]
    Upstream {
        city_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("HTTP client error")]
    Http(#[from] reqwest::Error),

    #[error("Store IO error")]
    Io(#[from] std::io::Error),

    #[error("Store serialization error")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn upstream(city_id: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Upstream { city_id: city_id.into(), source }
    }

    /// Client errors are the caller's fault and are never retried.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::NotFound(_))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
