#![doc = "putlink-core: core logic library for putlink."]

//! This crate holds the link-staging, analysis and fetch-dispatch pipeline (the bucket) and the
//! thin account collaborators built on the same remote call primitive.
//! It performs no I/O itself: every remote interaction goes through [`contract::Session`].
//!
//! # Usage
//! Implement (or mock) a [`contract::Session`], wrap it in [`client::Putio`], and work from there:
//! `putio.bucket()` to stage/analyze/fetch links, `putio.files()` for file CRUD, and so on.

pub mod bucket;
pub mod client;
pub mod contract;
pub mod error;
pub mod files;
pub mod filter_list;
pub mod job;
pub mod locator;
pub mod messages;
pub mod subscription;
pub mod user;

pub use bucket::{Bucket, BucketReport, LocatorInput, Partitions};
pub use client::Putio;
pub use contract::{Params, Session};
pub use error::{PutlinkError, RemoteFault, Result};
pub use filter_list::FilterList;
pub use job::{Job, JobStatus};
pub use locator::{Locator, LocatorKind};
