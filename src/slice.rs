use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::metric::{Metric, MetricKind};
use crate::record::Record;
use crate::timestamp::Interval;

/// All metrics accumulated for one exact billing interval.
///
/// A slice without an interval holds an item that is not time-bound
/// (credits, refunds, statement totals).
#[derive(Debug, Clone, Serialize)]
pub struct Slice {
    interval: Option<Interval>,
    metrics: Vec<Metric>,
    #[serde(skip)]
    retain_lineitems: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    lineitems: Vec<Record>,
}

impl Slice {
    /// A slice carrying every metric in [`MetricKind::ALL`].
    pub fn new(interval: Option<Interval>) -> Self {
        Self::with_schema(interval, &MetricKind::ALL)
    }

    pub fn with_schema(interval: Option<Interval>, schema: &[MetricKind]) -> Self {
        Self {
            interval,
            metrics: schema.iter().copied().map(Metric::new).collect(),
            retain_lineitems: false,
            lineitems: Vec::new(),
        }
    }

    /// Keep every record added to this slice.
    pub fn retaining(mut self, retain: bool) -> Self {
        self.retain_lineitems = retain;
        self
    }

    pub fn interval(&self) -> Option<&Interval> {
        self.interval.as_ref()
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.interval.map(|i| i.start)
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.interval.map(|i| i.end)
    }

    /// Bucket key of the interval; `None` for non-time-bound slices.
    pub fn key(&self) -> Option<String> {
        self.interval.map(|i| i.key())
    }

    pub fn schema(&self) -> Vec<MetricKind> {
        self.metrics.iter().map(Metric::kind).collect()
    }

    /// Feed one record to every metric.
    ///
    /// Keys, cost and new sums are resolved for all metrics before any of
    /// them is touched, so a record that fails leaves the slice unchanged.
    pub fn add_lineitem(&mut self, record: Record) -> Result<()> {
        let mut pending: Vec<(usize, String, Decimal)> = Vec::with_capacity(self.metrics.len());
        let mut cost = None;
        for (idx, metric) in self.metrics.iter().enumerate() {
            let Some(key) = metric.kind().key(&record)? else {
                continue;
            };
            let value = match cost {
                Some(c) => c,
                None => {
                    let c = record.cost(metric.name())?;
                    cost = Some(c);
                    c
                }
            };
            let sum = metric.sum_with(&key, value)?;
            pending.push((idx, key, sum));
        }

        for (idx, key, sum) in pending {
            self.metrics[idx].store([(key, sum)]);
        }
        if self.retain_lineitems {
            self.lineitems.push(record);
        }
        Ok(())
    }

    /// Merge `other`'s metrics into this slice, index by index.
    pub fn merge(&mut self, other: &Slice) -> Result<()> {
        self.check_schema(other)?;
        self.accumulate(other)
    }

    pub(crate) fn check_schema(&self, other: &Slice) -> Result<()> {
        let ours = self.schema();
        let theirs = other.schema();
        if ours != theirs {
            return Err(Error::SchemaMismatch {
                expected: schema_label(&ours),
                found: schema_label(&theirs),
            });
        }
        Ok(())
    }

    /// Merge without the schema check; callers guarantee equal schemas.
    /// Nothing changes if any cell would overflow.
    pub(crate) fn accumulate(&mut self, other: &Slice) -> Result<()> {
        let merged = self
            .metrics
            .iter()
            .zip(&other.metrics)
            .map(|(ours, theirs)| ours.merged_cells(theirs))
            .collect::<Result<Vec<_>>>()?;
        for (ours, cells) in self.metrics.iter_mut().zip(merged) {
            ours.store(cells);
        }
        if self.retain_lineitems {
            self.lineitems.extend(other.lineitems.iter().cloned());
        }
        Ok(())
    }

    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    pub fn metric(&self, kind: MetricKind) -> Option<&Metric> {
        self.metrics.iter().find(|m| m.kind() == kind)
    }

    /// Records retained while building this slice (empty unless retention
    /// was enabled).
    pub fn lineitems(&self) -> &[Record] {
        &self.lineitems
    }
}

pub(crate) fn schema_label(schema: &[MetricKind]) -> String {
    let names: Vec<&str> = schema.iter().map(|k| k.name()).collect();
    format!("[{}]", names.join(", "))
}
