//! Backfilling of irregular counter increments
//!
//! Increments arrive with their own timestamps and are stored per series as
//! a growing history of running totals. The history is rendered as one
//! sample per series per resolution step, forward-filling between updates,
//! in the line format `<identity> <value> <unix seconds>` accepted by
//! Prometheus-style bulk importers.
//!
//! # Examples
//!
//! ```no_run
//! use tgstat::backfill::{Metrics, Resolution};
//!
//! let metrics = Metrics::new();
//! let at = chrono::Utc::now();
//! metrics.with("sender", "alice").metric("tg_messages_total").inc(1, at);
//!
//! let mut out = Vec::new();
//! metrics.render(&mut out, Resolution::from_secs(3600)?)?;
//! # Ok::<(), tgstat::backfill::BackfillError>(())
//! ```

pub mod error;
pub mod labels;
pub mod metrics;
pub mod recorder;

pub use error::BackfillError;
pub use labels::{Label, Labels};
pub use metrics::{Metric, Metrics};
pub use recorder::{ChainRecorder, Point, Recorder, Resample, Resolution, Sample, Step};
