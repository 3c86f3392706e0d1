//! The bucket: stage locators, have the remote service analyze them, dispatch them as jobs.
//!
//! A [`Bucket`] is pure client-side staging state between two remote calls:
//!   - [`Bucket::analyze`] submits everything staged (plus optional extra candidates) in a
//!     single `urls/analyze` call and *replaces* the four partitions with the remote
//!     classification. Anything staged but absent from the response is gone; callers re-add
//!     what they want analyzed again.
//!   - [`Bucket::fetch`] dispatches every non-error locator in one `transfers/add` call and
//!     returns one [`Job`] per returned record.
//!
//! # Aggregates
//! The quota fields are `None` until the first successful analysis and afterwards reflect only
//! the most recent one. `add` and `fetch` never touch them.
//!
//! # Concurrency
//! Mutating methods take `&mut self`; sharing a bucket across tasks needs a caller-side lock.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, info};

use crate::contract::{decode_first, decode_records, lenient, params, Session};
use crate::error::{PutlinkError, Result};
use crate::job::{Job, JobRecord};
use crate::locator::{classify, Locator, LocatorKind, LocatorRecord};

/// Locators grouped by classification, each group in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Partitions {
    pub single: Vec<Locator>,
    pub torrent: Vec<Locator>,
    pub multipart: Vec<Locator>,
    pub error: Vec<Locator>,
}

impl Partitions {
    /// Append a locator to the partition matching its kind.
    pub fn push(&mut self, locator: Locator) {
        match locator.kind() {
            LocatorKind::Single => self.single.push(locator),
            LocatorKind::Torrent => self.torrent.push(locator),
            LocatorKind::MultipartPart => self.multipart.push(locator),
            LocatorKind::ErrorLocator => self.error.push(locator),
        }
    }

    pub fn extend(&mut self, other: Partitions) {
        self.single.extend(other.single);
        self.torrent.extend(other.torrent);
        self.multipart.extend(other.multipart);
        self.error.extend(other.error);
    }

    /// Non-error locators in dispatch order: single, torrent, multipart.
    pub fn dispatchable(&self) -> impl Iterator<Item = &Locator> {
        self.single
            .iter()
            .chain(self.torrent.iter())
            .chain(self.multipart.iter())
    }

    pub fn len(&self) -> usize {
        self.single.len() + self.torrent.len() + self.multipart.len() + self.error.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Anything [`Bucket::add`] accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum LocatorInput {
    Url(String),
    Urls(Vec<String>),
    Locator(Locator),
    Partitions(Partitions),
}

impl From<&str> for LocatorInput {
    fn from(url: &str) -> Self {
        LocatorInput::Url(url.to_string())
    }
}

impl From<String> for LocatorInput {
    fn from(url: String) -> Self {
        LocatorInput::Url(url)
    }
}

impl From<Vec<String>> for LocatorInput {
    fn from(urls: Vec<String>) -> Self {
        LocatorInput::Urls(urls)
    }
}

impl From<Vec<&str>> for LocatorInput {
    fn from(urls: Vec<&str>) -> Self {
        LocatorInput::Urls(urls.into_iter().map(str::to_string).collect())
    }
}

impl From<Locator> for LocatorInput {
    fn from(locator: Locator) -> Self {
        LocatorInput::Locator(locator)
    }
}

impl From<Partitions> for LocatorInput {
    fn from(partitions: Partitions) -> Self {
        LocatorInput::Partitions(partitions)
    }
}

impl TryFrom<Value> for LocatorInput {
    type Error = PutlinkError;

    /// Accepts a JSON string or an array of strings.
    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::String(url) => Ok(LocatorInput::Url(url)),
            Value::Array(_) => Ok(LocatorInput::Urls(url_sequence(value)?)),
            other => Err(PutlinkError::InvalidInput(format!(
                "expected a URL string or a sequence of URL strings, got {}",
                json_kind(&other)
            ))),
        }
    }
}

fn url_sequence(value: Value) -> Result<Vec<String>> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(url) => Ok(url),
                other => Err(PutlinkError::InvalidInput(format!(
                    "sequence entries must be URL strings, got {}",
                    json_kind(&other)
                ))),
            })
            .collect(),
        other => Err(PutlinkError::InvalidInput(format!(
            "expected a sequence of URL strings, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a record",
    }
}

/// Immutable snapshot returned by [`Bucket::report`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketReport {
    pub required_space_bytes: Option<u64>,
    pub paid_bandwidth_bytes: Option<u64>,
    pub disk_available_bytes: Option<u64>,
    pub bandwidth_available_bytes: Option<u64>,
    pub partitions: Partitions,
}

/// Shape of the single record an analysis call returns.
#[derive(Debug, Deserialize)]
struct AnalysisRecord {
    #[serde(default)]
    items: serde_json::Map<String, Value>,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    disk_avail: Option<u64>,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    bw_avail: Option<u64>,
}

/// Shape of one link returned by text extraction; the service sends bare strings or records.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExtractedLink {
    Bare(String),
    Record { url: String },
}

pub struct Bucket<S: Session + ?Sized> {
    session: Arc<S>,
    partitions: Partitions,
    required_space_bytes: Option<u64>,
    paid_bandwidth_bytes: Option<u64>,
    disk_available_bytes: Option<u64>,
    bandwidth_available_bytes: Option<u64>,
}

impl<S: Session + ?Sized> Bucket<S> {
    pub fn new(session: Arc<S>) -> Self {
        Self {
            session,
            partitions: Partitions::default(),
            required_space_bytes: None,
            paid_bandwidth_bytes: None,
            disk_available_bytes: None,
            bandwidth_available_bytes: None,
        }
    }

    /// A bucket pre-seeded with three locator groups.
    pub fn seeded(
        session: Arc<S>,
        single: Vec<Locator>,
        torrent: Vec<Locator>,
        multipart: Vec<Locator>,
    ) -> Self {
        let mut bucket = Self::new(session);
        bucket.partitions = Partitions {
            single,
            torrent,
            multipart,
            error: Vec::new(),
        };
        bucket
    }

    pub fn partitions(&self) -> &Partitions {
        &self.partitions
    }

    /// Stage locators. Raw URLs go to `single`; classified locators go to their own partition.
    pub fn add(&mut self, input: impl Into<LocatorInput>) -> &mut Self {
        match input.into() {
            LocatorInput::Url(url) => self.partitions.single.push(Locator::from_url(url)),
            LocatorInput::Urls(urls) => self
                .partitions
                .single
                .extend(urls.into_iter().map(Locator::from_url)),
            LocatorInput::Locator(locator) => self.partitions.push(locator),
            LocatorInput::Partitions(partitions) => self.partitions.extend(partitions),
        }
        debug!(staged = self.partitions.len(), "Staged locators in bucket");
        self
    }

    /// Stage locators from loosely-typed input; fails with `InvalidInput` unless it is a
    /// string or a sequence of strings.
    pub fn add_value(&mut self, value: Value) -> Result<&mut Self> {
        let input = LocatorInput::try_from(value).map_err(|e| {
            error!(error = %e, "Rejected bucket input");
            e
        })?;
        Ok(self.add(input))
    }

    /// Ask the service to pull links out of free text and stage each one. Returns how many were added.
    pub async fn extract(&mut self, text: &str) -> Result<usize> {
        let (resource, operation) = ("urls", "extracturls");
        info!(resource, operation, text_len = text.len(), "Extracting links from text");
        let records = self
            .session
            .invoke(resource, operation, params([("txt", json!(text))]))
            .await
            .map_err(|e| {
                error!(error = %e, "Link extraction failed");
                e
            })?;
        let links: Vec<ExtractedLink> = decode_records(resource, operation, records)?;
        let count = links.len();
        for link in links {
            let url = match link {
                ExtractedLink::Bare(url) | ExtractedLink::Record { url } => url,
            };
            self.partitions.single.push(Locator::from_url(url));
        }
        info!(count, "Extracted links staged");
        Ok(count)
    }

    /// Submit staged non-error locators plus `candidates` for remote analysis and replace the
    /// partitions with the result.
    pub async fn analyze(&mut self, candidates: Option<Vec<String>>) -> Result<&mut Self> {
        let (resource, operation) = ("urls", "analyze");
        let mut links: Vec<String> = self
            .partitions
            .dispatchable()
            .map(Locator::to_source_url)
            .collect();
        links.extend(candidates.unwrap_or_default());

        info!(resource, operation, links = links.len(), "Submitting bucket for analysis");
        let records = self
            .session
            .invoke(resource, operation, params([("links", json!(links))]))
            .await
            .map_err(|e| {
                error!(error = %e, "Bucket analysis failed");
                e
            })?;

        let analysis: AnalysisRecord = decode_first(resource, operation, records)?;
        let partitions = partitions_from_analysis(analysis.items)
            .map_err(|message| PutlinkError::decode(resource, operation, message))?;

        // Sizes come from the service; saturate rather than overflow.
        let required_space = partitions
            .dispatchable()
            .map(|l| l.size_bytes().unwrap_or(0))
            .fold(0u64, u64::saturating_add);
        let paid_bandwidth = partitions
            .dispatchable()
            .map(|l| l.billed_bandwidth_bytes().unwrap_or(0))
            .fold(0u64, u64::saturating_add);

        self.partitions = partitions;
        self.required_space_bytes = Some(required_space);
        self.paid_bandwidth_bytes = Some(paid_bandwidth);
        self.disk_available_bytes = analysis.disk_avail;
        self.bandwidth_available_bytes = analysis.bw_avail;

        info!(
            single = self.partitions.single.len(),
            torrent = self.partitions.torrent.len(),
            multipart = self.partitions.multipart.len(),
            error = self.partitions.error.len(),
            required_space_bytes = required_space,
            paid_bandwidth_bytes = paid_bandwidth,
            "Bucket analysis complete"
        );
        Ok(self)
    }

    /// [`Bucket::analyze`] with loosely-typed candidates; anything but a sequence of strings is
    /// rejected before the network is touched.
    pub async fn analyze_value(&mut self, candidates: Option<Value>) -> Result<&mut Self> {
        let candidates = candidates.map(url_sequence).transpose().map_err(|e| {
            error!(error = %e, "Rejected analysis candidates");
            e
        })?;
        self.analyze(candidates).await
    }

    /// Dispatch every non-error locator as a job in one remote call.
    ///
    /// Per-link failures come back as job statuses; only a transport/service fault fails the call.
    pub async fn fetch(&self) -> Result<Vec<Job>> {
        let (resource, operation) = ("transfers", "add");
        let links: Vec<String> = self
            .partitions
            .dispatchable()
            .map(Locator::to_source_url)
            .collect();

        info!(resource, operation, links = links.len(), "Dispatching bucket");
        let records = self
            .session
            .invoke(resource, operation, params([("links", json!(links))]))
            .await
            .map_err(|e| {
                error!(error = %e, "Bucket dispatch failed");
                e
            })?;

        let jobs: Vec<Job> = decode_records::<JobRecord>(resource, operation, records)?
            .into_iter()
            .map(Job::from)
            .collect();
        let failed = jobs.iter().filter(|j| j.status().is_failure()).count();
        info!(jobs = jobs.len(), failed, "Bucket dispatched");
        Ok(jobs)
    }

    pub fn report(&self) -> BucketReport {
        BucketReport {
            required_space_bytes: self.required_space_bytes,
            paid_bandwidth_bytes: self.paid_bandwidth_bytes,
            disk_available_bytes: self.disk_available_bytes,
            bandwidth_available_bytes: self.bandwidth_available_bytes,
            partitions: self.partitions.clone(),
        }
    }
}

/// Rebuild partitions from the `items` map of an analysis record. Group keys double as the
/// kind tag for records that do not carry their own; nested arrays are multipart parts.
/// Groups are visited in response order (serde_json `preserve_order`), so records tagged
/// with the same kind under different groups keep the order the service sent them in.
fn partitions_from_analysis(
    items: serde_json::Map<String, Value>,
) -> std::result::Result<Partitions, String> {
    let mut partitions = Partitions::default();
    for (group, records) in items {
        let records = match records {
            Value::Array(records) => records,
            Value::Null => continue,
            other => {
                return Err(format!(
                    "group '{group}' should be a sequence, got {}",
                    json_kind(&other)
                ))
            }
        };
        for record in records {
            let parts = match record {
                Value::Array(parts) => parts,
                single => vec![single],
            };
            for part in parts {
                let mut record: LocatorRecord = serde_json::from_value(part)
                    .map_err(|e| format!("bad record in group '{group}': {e}"))?;
                if record.kind.is_none() {
                    record.kind = Some(group.clone());
                }
                partitions.push(classify(record));
            }
        }
    }
    Ok(partitions)
}
