//! Time-sliced aggregation of detailed cloud billing records.
//!
//! Line items are bucketed into [`Slice`]s by their usage period. Each slice
//! carries one [`Metric`] per schema entry, summing costs by a pipe-joined
//! dimension key. A [`SuperSlice`] owns every slice of a run and answers
//! window queries relative to a fixed reference instant.

pub mod billreader;
pub mod config;
pub mod error;
pub mod ingest;
pub mod metric;
pub mod record;
pub mod report;
pub mod slice;
pub mod superslice;
pub mod timestamp;

pub use error::{Error, Result};
pub use metric::{Metric, MetricKind};
pub use record::Record;
pub use slice::Slice;
pub use superslice::{LoadStats, SuperSlice, WindowLabel};
pub use timestamp::{Interval, NaiveTz};
