//! Error types shared by every putlink operation.
//!
//! Two families matter to callers:
//! - [`PutlinkError::InvalidInput`] is raised synchronously, before anything reaches the network.
//! - [`PutlinkError::RemoteFault`] comes back from the [`Session`](crate::contract::Session)
//!   and always carries the resource, operation and params of the call that produced it.
//!
//! Per-locator dispatch failures inside a successful fetch are *not* errors; see [`crate::job`].

use crate::contract::Params;
use thiserror::Error;

/// A failure reported by the remote service or by the transport underneath it.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("remote fault on {resource}/{operation}: {message}")]
pub struct RemoteFault {
    pub resource: String,
    pub operation: String,
    pub params: Params,
    pub message: String,
}

impl RemoteFault {
    pub fn new(
        resource: impl Into<String>,
        operation: impl Into<String>,
        params: Params,
        message: impl Into<String>,
    ) -> Self {
        Self {
            resource: resource.into(),
            operation: operation.into(),
            params,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PutlinkError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    RemoteFault(#[from] RemoteFault),

    /// The call succeeded but a returned record did not have the expected shape.
    #[error("could not decode {resource}/{operation} response: {message}")]
    Decode {
        resource: String,
        operation: String,
        message: String,
    },
}

impl PutlinkError {
    pub(crate) fn decode(resource: &str, operation: &str, message: impl ToString) -> Self {
        PutlinkError::Decode {
            resource: resource.to_string(),
            operation: operation.to_string(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PutlinkError>;
