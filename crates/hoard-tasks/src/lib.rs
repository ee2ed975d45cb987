//! Per-feed tasks for Hoard.
//!
//! A [`Session`] bundles one feed's configuration with its local download
//! store, local archive store and (optionally) its replicated remote store.
//! Every task takes a session:
//!
//! - [`Downloader`] -- poll the feed and store new payloads as DFiles
//! - [`pack_once`] -- pack each hour of DFiles into a local AFile
//! - [`merge_once`] -- merge each local hour into one AFile
//! - [`upload_once`] -- copy local AFiles to every replica, then merge remotely
//! - [`audit_once`] -- find and fix divergence between replicas
//! - [`retrieve`] -- copy remote data back to local disk
//! - [`vacate`] -- pack and upload everything local
//!
//! [`Collector`] runs download, pack, upload and audit as periodic loops for
//! every configured feed.
//!
//! # Design Rules
//!
//! 1. A failing task is logged and recorded in the session's
//!    [`MetricsSink`]; it never stops the process.
//! 2. Tasks over independent units (hours, archives) attempt every unit and
//!    report all failures together.
//! 3. Local data is deleted only after its replacement is stored.

pub mod audit;
pub mod collector;
pub mod config;
pub mod download;
pub mod error;
pub mod merge;
pub mod metrics;
pub mod pack;
pub mod periodic;
pub mod retrieve;
pub mod session;
pub mod upload;
pub mod vacate;

pub use audit::{audit_once, AuditOptions};
pub use collector::Collector;
pub use config::{Config, FeedConfig};
pub use download::{Downloader, FeedSource, HttpFeedSource};
pub use error::{TaskError, TaskResult};
pub use merge::merge_once;
pub use metrics::{CountingMetrics, MetricsSink, NoopMetrics, TaskKind, TracingMetrics};
pub use pack::pack_once;
pub use periodic::{run_periodically, Schedule};
pub use retrieve::{retrieve, RetrieveOptions, RetrieveSummary};
pub use session::Session;
pub use upload::upload_once;
pub use vacate::{remove_local_data, vacate};
