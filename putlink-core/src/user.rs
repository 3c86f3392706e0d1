//! Account details and quota.

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::contract::{decode_first, lenient, Params, Session};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, rename = "disk_quota", deserialize_with = "lenient::opt_u64")]
    pub disk_quota_bytes: Option<u64>,
    #[serde(default, rename = "disk_quota_available", deserialize_with = "lenient::opt_u64")]
    pub disk_available_bytes: Option<u64>,
    #[serde(default, rename = "bw_quota", deserialize_with = "lenient::opt_u64")]
    pub bandwidth_quota_bytes: Option<u64>,
    #[serde(default, rename = "bw_quota_available", deserialize_with = "lenient::opt_u64")]
    pub bandwidth_available_bytes: Option<u64>,
}

pub async fn info<S: Session + ?Sized>(session: &S) -> Result<AccountInfo> {
    let (resource, operation) = ("user", "info");
    info!(resource, operation, "Fetching account info");
    let records = session
        .invoke(resource, operation, Params::new())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to fetch account info");
            e
        })?;
    decode_first(resource, operation, records)
}
