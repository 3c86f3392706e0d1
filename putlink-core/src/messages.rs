//! Dashboard messages.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use crate::contract::{decode_records, lenient, params, Params, Session};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(deserialize_with = "lenient::u64_or_zero", default)]
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "lenient::u64_or_zero")]
    pub importance: u64,
}

pub async fn list<S: Session + ?Sized>(session: &S) -> Result<Vec<Message>> {
    let (resource, operation) = ("messages", "list");
    info!(resource, operation, "Listing messages");
    let records = session
        .invoke(resource, operation, Params::new())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to list messages");
            e
        })?;
    decode_records(resource, operation, records)
}

pub async fn delete<S: Session + ?Sized>(session: &S, id: u64) -> Result<()> {
    info!(message_id = id, "Deleting message");
    session
        .invoke("messages", "delete", params([("id", json!(id))]))
        .await
        .map_err(|e| {
            error!(error = %e, message_id = id, "Failed to delete message");
            e
        })?;
    Ok(())
}
