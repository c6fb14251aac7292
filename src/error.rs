//! Error types for the shield
//!
//! Provides unified error handling using thiserror. The cache never fails;
//! only key derivation, batch delivery and the admin surface have errors.

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Key Error ==
/// A payload could not be turned into a cache or batch key.
#[derive(Error, Debug)]
#[error("Key derivation failed: {0}")]
pub struct KeyError(#[from] pub serde_json::Error);

// == Batch Error ==
/// Why a submitted waiter did not receive a result.
#[derive(Error, Debug)]
pub enum BatchError<E> {
    /// The processor failed for the whole group; every waiter of the group
    /// holds the same shared error.
    #[error("Batch processor failed: {0}")]
    Processor(Arc<E>),

    /// The processor returned fewer results than the group had waiters.
    #[error("Missing batch result for position {index} (processor returned {returned})")]
    MissingResult { index: usize, returned: usize },

    /// The group was torn down before a result was delivered.
    #[error("Batch abandoned before a result was delivered")]
    Abandoned,
}

impl<E> Clone for BatchError<E> {
    fn clone(&self) -> Self {
        match self {
            BatchError::Processor(err) => BatchError::Processor(Arc::clone(err)),
            BatchError::MissingResult { index, returned } => BatchError::MissingResult {
                index: *index,
                returned: *returned,
            },
            BatchError::Abandoned => BatchError::Abandoned,
        }
    }
}

// == Admin Error ==
/// Errors surfaced by the admin HTTP routes.
#[derive(Error, Debug)]
pub enum AdminError {
    /// No cache is registered under the requested name
    #[error("Unknown cache: {0}")]
    UnknownCache(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = match &self {
            AdminError::UnknownCache(_) => StatusCode::NOT_FOUND,
        };

        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the admin routes.
pub type Result<T> = std::result::Result<T, AdminError>;
