/// Result alias used across the crate.
pub type ForgeResult<T> = Result<T, ForgeError>;

/// Error taxonomy of the compositing engine.
///
/// Only [`ForgeError::InvalidDimensions`] and [`ForgeError::Encode`] escape a render call. The
/// remaining variants are produced by inner stages and absorbed by their callers (blank
/// background, skipped field, cache miss).
#[derive(thiserror::Error, Debug)]
pub enum ForgeError {
    /// Background bytes could not be obtained or decoded.
    #[error("background unavailable: {0}")]
    BackgroundUnavailable(String),

    /// Requested output width/height is not strictly positive.
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions {
        /// Requested width.
        width: i64,
        /// Requested height.
        height: i64,
    },

    /// A single field could not be drawn.
    #[error("field '{field}' failed to render: {message}")]
    FieldRender {
        /// Field name.
        field: String,
        /// Failure description.
        message: String,
    },

    /// Encoding failed, including the raw retry.
    #[error("encode error: {0}")]
    Encode(String),

    /// Cache backend failure.
    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),

    /// Font loading or lookup failure.
    #[error("font error: {0}")]
    Font(String),

    /// Image source fetch failure (including timeouts).
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Input validation failure.
    #[error("validation error: {0}")]
    Validation(String),

    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Anything else.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ForgeError {
    /// Build a [`ForgeError::BackgroundUnavailable`].
    pub fn background(msg: impl Into<String>) -> Self {
        Self::BackgroundUnavailable(msg.into())
    }

    /// Build a [`ForgeError::InvalidDimensions`].
    pub fn invalid_dimensions(width: i64, height: i64) -> Self {
        Self::InvalidDimensions { width, height }
    }

    /// Build a [`ForgeError::FieldRender`].
    pub fn field(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::FieldRender {
            field: field.into(),
            message: msg.into(),
        }
    }

    /// Build a [`ForgeError::Encode`].
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Build a [`ForgeError::CacheUnavailable`].
    pub fn cache(msg: impl Into<String>) -> Self {
        Self::CacheUnavailable(msg.into())
    }

    /// Build a [`ForgeError::Font`].
    pub fn font(msg: impl Into<String>) -> Self {
        Self::Font(msg.into())
    }

    /// Build a [`ForgeError::Fetch`].
    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    /// Build a [`ForgeError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`ForgeError::Serde`].
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

impl From<serde_json::Error> for ForgeError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serde(e.to_string())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
