//! Locators: typed references to remote-fetchable resources.
//!
//! A [`Locator`] is either created straight from a raw URL (unclassified, treated as
//! [`LocatorKind::Single`]) or produced by [`classify`] from a record the remote service
//! returned during analysis. Locators are values: nothing mutates one after classification,
//! re-analysis simply produces new ones.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::contract::lenient;

/// Classification reported by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocatorKind {
    Single,
    Torrent,
    MultipartPart,
    ErrorLocator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Locator {
    kind: LocatorKind,
    source_url: String,
    name: Option<String>,
    size_bytes: Option<u64>,
    human_size: Option<String>,
    billed_bandwidth_bytes: Option<u64>,
    requires_password: bool,
    fault_detail: Option<String>,
}

impl Locator {
    /// An unclassified locator for a raw URL.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            kind: LocatorKind::Single,
            source_url: url.into(),
            name: None,
            size_bytes: None,
            human_size: None,
            billed_bandwidth_bytes: None,
            requires_password: false,
            fault_detail: None,
        }
    }

    pub fn kind(&self) -> LocatorKind {
        self.kind
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    /// The canonical URL handed to the transport when the locator is dispatched.
    pub fn to_source_url(&self) -> String {
        self.source_url.trim().to_string()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn size_bytes(&self) -> Option<u64> {
        self.size_bytes
    }

    /// Display size: the service's own string when it sent one, otherwise derived from the byte count.
    pub fn human_size(&self) -> Option<String> {
        self.human_size
            .clone()
            .or_else(|| self.size_bytes.map(format_bytes))
    }

    pub fn billed_bandwidth_bytes(&self) -> Option<u64> {
        self.billed_bandwidth_bytes
    }

    /// Only ever true for multipart parts.
    pub fn requires_password(&self) -> bool {
        self.kind == LocatorKind::MultipartPart && self.requires_password
    }

    pub fn fault_detail(&self) -> Option<&str> {
        self.fault_detail.as_deref()
    }

    pub fn is_error(&self) -> bool {
        self.kind == LocatorKind::ErrorLocator
    }
}

/// A classified record as the remote service reports it in an analysis response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocatorRecord {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_u64", skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub human_size: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_u64", skip_serializing_if = "Option::is_none")]
    pub paid_bw: Option<u64>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub need_pass: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Anything else the service sent; kept so unknown records can be reported verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Map a remote record onto one of the four locator variants.
///
/// Unknown tags are kept as [`LocatorKind::ErrorLocator`] with the serialised record in
/// `fault_detail`, so nothing the service reports is dropped.
pub fn classify(record: LocatorRecord) -> Locator {
    let tag = record.kind.as_deref().unwrap_or("").trim().to_ascii_lowercase();
    let kind = match tag.as_str() {
        "singleurl" | "single" => Some(LocatorKind::Single),
        "torrent" => Some(LocatorKind::Torrent),
        "multiparturl" | "multipart" => Some(LocatorKind::MultipartPart),
        "error" => Some(LocatorKind::ErrorLocator),
        _ => None,
    };

    let fault_detail = match kind {
        Some(LocatorKind::ErrorLocator) => Some(
            record
                .error
                .clone()
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| payload_text(&record)),
        ),
        Some(_) => None,
        None => {
            warn!(tag = %tag, url = %record.url, "Unknown locator kind, keeping as error locator");
            Some(payload_text(&record))
        }
    };

    Locator {
        kind: kind.unwrap_or(LocatorKind::ErrorLocator),
        source_url: record.url.trim().to_string(),
        name: record.name,
        size_bytes: record.size,
        human_size: record.human_size,
        billed_bandwidth_bytes: record.paid_bw,
        requires_password: record.need_pass,
        fault_detail,
    }
}

fn payload_text(record: &LocatorRecord) -> String {
    serde_json::to_string(record).unwrap_or_else(|_| format!("{record:?}"))
}

/// Binary-unit byte formatting, e.g. `1536` -> `"1.50 KB"`.
pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;
    const TB: f64 = GB * 1024.0;

    let b = bytes as f64;
    if b >= TB {
        format!("{:.2} TB", b / TB)
    } else if b >= GB {
        format!("{:.2} GB", b / GB)
    } else if b >= MB {
        format!("{:.2} MB", b / MB)
    } else if b >= KB {
        format!("{:.2} KB", b / KB)
    } else {
        format!("{bytes} B")
    }
}
