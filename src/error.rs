//! # Error Module
//!
//! A single error taxonomy for the dispatch core. Every variant knows the HTTP status it
//! maps to and renders as a [`Status`] object, so that every abort path produces exactly one
//! structured error body.
//!
//! Errors that happen after a backend accepted a mutation travel as `Status` objects inside the
//! operation result instead (see [`crate::storage::RestResult::from_error`]); their embedded
//! code then drives the final response status.

use crate::runtime::{Status, StatusDetails, StatusPhase, StatusReason};

/// Errors produced while dispatching a request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// No (verb, path arity) entry and no registered storage matched the request.
    #[error("not found: {path}")]
    RouteNotFound { path: String },

    /// The classifier could not derive a resource and namespace from the path.
    #[error("unable to resolve request {path}: {reason}")]
    NotResolvable { path: String, reason: String },

    /// The storage for `kind` does not implement the capability `action` needs.
    #[error("{action} is not supported on resources of kind {kind:?}")]
    MethodNotSupported { kind: String, action: String },

    /// A label or field selector could not be parsed.
    #[error("invalid selector {selector:?}: can't understand {term:?}")]
    InvalidSelector { selector: String, term: String },

    /// The request body could not be decoded into the target kind.
    #[error("unable to decode request body: {0}")]
    Decode(String),

    /// The response object could not be encoded.
    #[error("unable to encode object: {0}")]
    Encode(String),

    /// Namespace, name or link lookup failed while rewriting a self link.
    #[error("unable to set self link: {0}")]
    SelfLink(String),

    /// Admission or policy rejection.
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("{kind} {name:?} not found")]
    NotFound { kind: String, name: String },

    #[error("{kind} {name:?} already exists")]
    AlreadyExists { kind: String, name: String },

    #[error("{kind} {name:?} cannot be updated: {message}")]
    Conflict {
        kind: String,
        name: String,
        message: String,
    },

    #[error("{kind} {name:?} is invalid: {message}")]
    Invalid {
        kind: String,
        name: String,
        message: String,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn route_not_found(path: impl Into<String>) -> Self {
        ApiError::RouteNotFound { path: path.into() }
    }

    pub fn method_not_supported(kind: impl Into<String>, action: impl Into<String>) -> Self {
        ApiError::MethodNotSupported {
            kind: kind.into(),
            action: action.into(),
        }
    }

    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        ApiError::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub fn already_exists(kind: impl Into<String>, name: impl Into<String>) -> Self {
        ApiError::AlreadyExists {
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub fn invalid(
        kind: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ApiError::Invalid {
            kind: kind.into(),
            name: name.into(),
            message: message.into(),
        }
    }

    /// HTTP status code the error is reported with.
    #[must_use]
    pub fn code(&self) -> u16 {
        match self {
            ApiError::RouteNotFound { .. } | ApiError::NotResolvable { .. } => 404,
            ApiError::NotFound { .. } => 404,
            ApiError::MethodNotSupported { .. } => 405,
            ApiError::InvalidSelector { .. } | ApiError::Decode(_) | ApiError::SelfLink(_) => 400,
            ApiError::Forbidden(_) => 403,
            ApiError::AlreadyExists { .. } | ApiError::Conflict { .. } => 409,
            ApiError::Invalid { .. } => 422,
            ApiError::Encode(_) | ApiError::Internal(_) => 500,
        }
    }

    #[must_use]
    pub fn reason(&self) -> StatusReason {
        match self {
            ApiError::RouteNotFound { .. }
            | ApiError::NotResolvable { .. }
            | ApiError::NotFound { .. } => StatusReason::NotFound,
            ApiError::MethodNotSupported { .. } => StatusReason::MethodNotAllowed,
            ApiError::InvalidSelector { .. } | ApiError::Decode(_) | ApiError::SelfLink(_) => {
                StatusReason::BadRequest
            }
            ApiError::Forbidden(_) => StatusReason::Forbidden,
            ApiError::AlreadyExists { .. } => StatusReason::AlreadyExists,
            ApiError::Conflict { .. } => StatusReason::Conflict,
            ApiError::Invalid { .. } => StatusReason::Invalid,
            ApiError::Encode(_) | ApiError::Internal(_) => StatusReason::InternalError,
        }
    }

    fn details(&self) -> Option<StatusDetails> {
        match self {
            ApiError::MethodNotSupported { kind, .. } => Some(StatusDetails {
                kind: kind.clone(),
                ..StatusDetails::default()
            }),
            ApiError::NotFound { kind, name }
            | ApiError::AlreadyExists { kind, name }
            | ApiError::Conflict { kind, name, .. }
            | ApiError::Invalid { kind, name, .. } => Some(StatusDetails {
                kind: kind.clone(),
                name: name.clone(),
                ..StatusDetails::default()
            }),
            _ => None,
        }
    }

    /// Render the error as the `Status` object sent to the caller.
    #[must_use]
    pub fn to_status(&self) -> Status {
        Status {
            status: StatusPhase::Failure,
            code: self.code(),
            reason: self.reason(),
            message: self.to_string(),
            details: self.details(),
        }
    }
}

impl From<&ApiError> for Status {
    fn from(err: &ApiError) -> Self {
        err.to_status()
    }
}
