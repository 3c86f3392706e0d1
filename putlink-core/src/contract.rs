//! # contract: the remote call primitive every putlink operation is built on
//!
//! This module defines a single trait ([`Session`]) through which the core talks to the
//! remote file-hosting service. The core never performs I/O itself: bucket analysis, fetch
//! dispatch and the file/subscription collaborators all reduce to `Session::invoke` calls.
//!
//! ## Interface & Extensibility
//! - Implement [`Session`] to create new transports (HTTP, recorded fixtures, in-memory fakes).
//! - Both methods are async and return [`RemoteFault`] on any service or transport error.
//! - Records come back as loosely-typed JSON values; each caller decodes the shape it expects.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall` so consumers get a `MockSession` in tests
//!   (exported behind the default `test-export-mocks` feature).
//!
//! ## Token refresh
//! - `refresh_token` is fire-and-forget from the core's point of view. Implementations decide
//!   when to call it; the HTTP session in the `putlink` crate does so after analyze/list calls.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use mockall::automock;

use crate::error::{PutlinkError, RemoteFault};

/// Named parameters of a remote call.
pub type Params = serde_json::Map<String, Value>;

/// Build a [`Params`] map from `(name, value)` pairs.
pub fn params<I, K>(pairs: I) -> Params
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

/// Trait for invoking operations on the remote service.
///
/// The implementor owns credentials and the access token. The trait is `Send + Sync`
/// and intended for sharing behind an `Arc` across the bucket and collaborators.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Session: Send + Sync {
    /// Invoke `operation` on `resource` and return the result records.
    async fn invoke(
        &self,
        resource: &str,
        operation: &str,
        params: Params,
    ) -> Result<Vec<Value>, RemoteFault>;

    /// Obtain a fresh access token.
    async fn refresh_token(&self) -> Result<String, RemoteFault>;
}

/// Decode every record of a response into `T`.
pub(crate) fn decode_records<T: DeserializeOwned>(
    resource: &str,
    operation: &str,
    records: Vec<Value>,
) -> Result<Vec<T>, PutlinkError> {
    records
        .into_iter()
        .map(|record| {
            serde_json::from_value(record).map_err(|e| {
                tracing::error!(error = ?e, resource, operation, "Failed to decode response record");
                PutlinkError::decode(resource, operation, e)
            })
        })
        .collect()
}

/// Decode the first record of a response into `T`; an empty response is a decode error.
pub(crate) fn decode_first<T: DeserializeOwned>(
    resource: &str,
    operation: &str,
    records: Vec<Value>,
) -> Result<T, PutlinkError> {
    let first = records.into_iter().next().ok_or_else(|| {
        tracing::error!(resource, operation, "Response carried no records");
        PutlinkError::decode(resource, operation, "response carried no records")
    })?;
    serde_json::from_value(first).map_err(|e| {
        tracing::error!(error = ?e, resource, operation, "Failed to decode response record");
        PutlinkError::decode(resource, operation, e)
    })
}

/// Serde helpers for numeric fields the service reports either as numbers or numeric strings.
pub(crate) mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn to_u64(value: &Value) -> Option<u64> {
        match value {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        }
    }

    pub fn opt_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.as_ref().and_then(to_u64))
    }

    pub fn u64_or_zero<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(opt_u64(deserializer)?.unwrap_or(0))
    }

    pub fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::Bool(b)) => b,
            Some(Value::Number(n)) => n.as_u64().unwrap_or(0) != 0,
            Some(Value::String(s)) => matches!(s.trim(), "1" | "true" | "True" | "yes"),
            _ => false,
        })
    }
}
