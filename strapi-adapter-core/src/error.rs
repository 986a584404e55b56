//! # error: the adapter's single error taxonomy
//!
//! Every boundary operation in this crate returns [`StandardResult`]. `Ok` carries
//! the data, `Err` carries a [`StrapiError`] which can always be reduced to the
//! wire-friendly [`ErrorBody`] (`{message, code}`) with [`StrapiError::body`].
//!
//! Nothing in this crate panics across a component boundary: transport failures,
//! empty payloads and payloads of the wrong shape are all represented here.

use serde::Serialize;
use thiserror::Error;

use crate::query::QueryError;

/// Message used whenever a fetch succeeded at the transport level but returned nothing.
pub const EMPTY_PAYLOAD_MESSAGE: &str = "No data returned from Strapi";

/// Result type used by every public operation of the adapter.
pub type StandardResult<T> = Result<T, StrapiError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StrapiError {
    /// The injected transport reported a failure (network, HTTP status, decoding).
    #[error("transport error ({code}): {message}")]
    Transport { message: String, code: u16 },

    #[error("{}", EMPTY_PAYLOAD_MESSAGE)]
    EmptyPayload,

    /// The payload was present but did not look like an entry or a collection.
    #[error("Error parsing entry {collection}/{}: {reason}", .id.as_deref().unwrap_or("undefined"))]
    ShapeMismatch {
        collection: String,
        id: Option<String>,
        reason: String,
    },

    /// One or more non-first pages could not be retrieved during a full-collection fetch.
    #[error("incomplete collection {collection}: missing pages {missing_pages:?}")]
    PartialAggregation {
        collection: String,
        missing_pages: Vec<u32>,
    },

    #[error("{message}")]
    NotFound { message: String },

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("invalid adapter configuration: {0}")]
    Config(String),
}

/// The `{message, code}` pair the CMS and callers agree on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub message: String,
    pub code: u16,
}

impl StrapiError {
    pub fn transport(message: impl Into<String>, code: u16) -> Self {
        StrapiError::Transport {
            message: message.into(),
            code,
        }
    }

    pub fn shape_mismatch(
        collection: impl Into<String>,
        id: Option<&str>,
        reason: impl Into<String>,
    ) -> Self {
        StrapiError::ShapeMismatch {
            collection: collection.into(),
            id: id.map(str::to_string),
            reason: reason.into(),
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            StrapiError::Transport { code, .. } => *code,
            StrapiError::NotFound { .. } => 404,
            StrapiError::EmptyPayload
            | StrapiError::ShapeMismatch { .. }
            | StrapiError::PartialAggregation { .. }
            | StrapiError::Query(_)
            | StrapiError::Config(_) => 500,
        }
    }

    pub fn message(&self) -> String {
        match self {
            StrapiError::Transport { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            message: self.message(),
            code: self.code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_uses_the_standard_message_and_code() {
        let body = StrapiError::EmptyPayload.body();
        assert_eq!(body.message, "No data returned from Strapi");
        assert_eq!(body.code, 500);
    }

    #[test]
    fn transport_errors_keep_the_collaborator_code() {
        let body = StrapiError::transport("Forbidden", 403).body();
        assert_eq!(
            body,
            ErrorBody {
                message: "Forbidden".into(),
                code: 403
            }
        );
    }

    #[test]
    fn shape_mismatch_mentions_collection_and_id() {
        let err = StrapiError::shape_mismatch("articles", Some("7"), "data is not an object");
        assert_eq!(
            err.to_string(),
            "Error parsing entry articles/7: data is not an object"
        );
        assert_eq!(err.code(), 500);
    }
}
