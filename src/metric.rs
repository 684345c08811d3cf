use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::record::{
    Record, LINKED_ACCOUNT_ID, PRODUCT_NAME, RESERVED_INSTANCE, SUBSCRIPTION_ID, USAGE_TYPE,
};

/// Joins dimension components into a key. Reserved: values never contain it.
pub const KEY_SEPARATOR: char = '|';

/// Instance size AWS bills for a bare `BoxUsage` usage type.
pub const DEFAULT_INSTANCE_TYPE: &str = "m1.small";

/// Transfer direction recorded when the usage type leaves it blank.
pub const NO_DIRECTION: &str = "none";

/// Long product names as they appear in billing reports, and the short
/// names used in dimension keys. Lookup is case-sensitive; anything not
/// listed passes through unchanged.
pub const SERVICE_ABBREVIATIONS: &[(&str, &str)] = &[
    ("AWS Data Pipeline", "DataPipeline"),
    ("Amazon DynamoDB", "DynamoDB"),
    ("Amazon ElastiCache", "ElastiCache"),
    ("Amazon Elastic Compute Cloud", "EC2"),
    ("Amazon Elastic MapReduce", "EMR"),
    ("Amazon Kinesis", "Kinesis"),
    ("Amazon RDS Service", "RDS"),
    ("Amazon Redshift", "Redshift"),
    ("Amazon Route 53", "Route53"),
    ("Amazon Simple Notification Service", "SNS"),
    ("Amazon Simple Queue Service", "SQS"),
    ("Amazon Simple Storage Service", "S3"),
    ("Amazon SimpleDB", "SimpleDB"),
    ("AWS Key Management Service", "KMS"),
];

pub fn abbreviate_service(product_name: &str) -> &str {
    SERVICE_ABBREVIATIONS
        .iter()
        .find(|(long, _)| *long == product_name)
        .map(|(_, short)| *short)
        .unwrap_or(product_name)
}

/// Sum costs exactly, failing with [`Error::CostOverflow`] named after
/// `what` when the result does not fit.
pub fn checked_sum<I>(values: I, what: &str) -> Result<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    values.into_iter().try_fold(Decimal::ZERO, |acc, value| {
        acc.checked_add(value).ok_or_else(|| Error::CostOverflow {
            key: what.to_string(),
        })
    })
}

/// Whether a charge recurs with usage or was billed once up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChargeType {
    Usage,
    #[serde(rename = "onetime")]
    OneTime,
}

impl ChargeType {
    /// A reserved-instance line without a subscription id is the upfront
    /// reservation fee.
    pub fn of(record: &Record) -> Self {
        let reserved = record.get(RESERVED_INSTANCE).map(str::trim) == Some("Y");
        let subscribed = record
            .get(SUBSCRIPTION_ID)
            .is_some_and(|s| !s.trim().is_empty());
        if reserved && !subscribed {
            ChargeType::OneTime
        } else {
            ChargeType::Usage
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChargeType::Usage => "usage",
            ChargeType::OneTime => "onetime",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "usage" => Some(ChargeType::Usage),
            "onetime" => Some(ChargeType::OneTime),
            _ => None,
        }
    }
}

/// How one dimension component is pulled out of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extractor {
    /// The field's value, verbatim.
    Field(&'static str),
    /// The field's value shortened through [`SERVICE_ABBREVIATIONS`].
    Service(&'static str),
    /// For values starting with `prefix`: the text after `delimiter`, or
    /// `default` when there is none. Other values opt the record out.
    AfterDelimiter {
        field: &'static str,
        prefix: &'static str,
        delimiter: char,
        default: &'static str,
    },
    /// For values starting with `prefix`: the `index`-th piece when split on
    /// `delimiter`, or `default` when that piece is empty or missing. Other
    /// values opt the record out.
    Segment {
        field: &'static str,
        prefix: &'static str,
        delimiter: char,
        index: usize,
        default: &'static str,
    },
    /// `usage` or `onetime`, see [`ChargeType::of`].
    ChargeType,
}

impl Extractor {
    /// `Ok(None)` means the record does not take part in this metric.
    ///
    /// A component containing [`KEY_SEPARATOR`] is rejected, since it would
    /// shift every later component of the key.
    pub fn extract(&self, record: &Record, metric: &'static str) -> Result<Option<String>> {
        let (field, part) = match *self {
            Extractor::Field(field) => (field, record.require(field, metric)?),
            Extractor::Service(field) => (field, abbreviate_service(record.require(field, metric)?)),
            Extractor::AfterDelimiter {
                field,
                prefix,
                delimiter,
                default,
            } => {
                let value = record.require(field, metric)?;
                if !value.starts_with(prefix) {
                    return Ok(None);
                }
                let part = match value.split_once(delimiter) {
                    Some((_, rest)) if !rest.is_empty() => rest,
                    _ => default,
                };
                (field, part)
            }
            Extractor::Segment {
                field,
                prefix,
                delimiter,
                index,
                default,
            } => {
                let value = record.require(field, metric)?;
                if !value.starts_with(prefix) {
                    return Ok(None);
                }
                let part = value
                    .split(delimiter)
                    .nth(index)
                    .filter(|s| !s.is_empty())
                    .unwrap_or(default);
                (field, part)
            }
            Extractor::ChargeType => {
                return Ok(Some(ChargeType::of(record).as_str().to_string()))
            }
        };
        if part.contains(KEY_SEPARATOR) {
            return Err(Error::SeparatorInValue {
                field,
                metric,
                value: part.to_string(),
            });
        }
        Ok(Some(part.to_string()))
    }
}

/// A named axis of a metric's key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimension {
    pub name: &'static str,
    pub extractor: Extractor,
}

const ACCOUNT: Dimension = Dimension {
    name: "account",
    extractor: Extractor::Field(LINKED_ACCOUNT_ID),
};

const SERVICE: Dimension = Dimension {
    name: "service",
    extractor: Extractor::Service(PRODUCT_NAME),
};

const TOTAL_USAGE_DIMENSIONS: &[Dimension] = &[
    ACCOUNT,
    SERVICE,
    Dimension {
        name: "type",
        extractor: Extractor::ChargeType,
    },
];

const INSTANCE_COST_DIMENSIONS: &[Dimension] = &[
    ACCOUNT,
    SERVICE,
    Dimension {
        name: "instance_type",
        extractor: Extractor::AfterDelimiter {
            field: USAGE_TYPE,
            prefix: "BoxUsage",
            delimiter: ':',
            default: DEFAULT_INSTANCE_TYPE,
        },
    },
];

const DATA_TRANSFER_DIMENSIONS: &[Dimension] = &[
    ACCOUNT,
    SERVICE,
    Dimension {
        name: "direction",
        extractor: Extractor::Segment {
            field: USAGE_TYPE,
            prefix: "DataTransfer",
            delimiter: '-',
            index: 1,
            default: NO_DIRECTION,
        },
    },
];

/// The fixed set of metric schemas a slice can carry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum MetricKind {
    /// Every charge, by account, service and charge type.
    TotalUsage,
    /// Instance-hour charges, by account, service and instance type.
    InstanceCost,
    /// Data-transfer charges, by account, service and direction.
    DataTransfer,
}

impl MetricKind {
    /// Default schema, in slice order.
    pub const ALL: [MetricKind; 3] = [
        MetricKind::TotalUsage,
        MetricKind::InstanceCost,
        MetricKind::DataTransfer,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MetricKind::TotalUsage => "TotalUsage",
            MetricKind::InstanceCost => "InstanceCost",
            MetricKind::DataTransfer => "DataTransfer",
        }
    }

    pub fn dimensions(self) -> &'static [Dimension] {
        match self {
            MetricKind::TotalUsage => TOTAL_USAGE_DIMENSIONS,
            MetricKind::InstanceCost => INSTANCE_COST_DIMENSIONS,
            MetricKind::DataTransfer => DATA_TRANSFER_DIMENSIONS,
        }
    }

    pub fn dimension_names(self) -> impl Iterator<Item = &'static str> {
        self.dimensions().iter().map(|d| d.name)
    }

    /// Composite key for `record`, or `None` if any dimension opts it out.
    pub fn key(self, record: &Record) -> Result<Option<String>> {
        let mut parts = Vec::with_capacity(self.dimensions().len());
        for dim in self.dimensions() {
            match dim.extractor.extract(record, self.name())? {
                Some(part) => parts.push(part),
                None => return Ok(None),
            }
        }
        Ok(Some(parts.join(&KEY_SEPARATOR.to_string())))
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Additive cost accumulator keyed by a metric's composite dimension key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    kind: MetricKind,
    data: BTreeMap<String, Decimal>,
}

impl Metric {
    pub fn new(kind: MetricKind) -> Self {
        Self {
            kind,
            data: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Add the record's cost under its key. Records this metric does not
    /// cover are ignored.
    pub fn add(&mut self, record: &Record) -> Result<()> {
        if let Some(key) = self.kind.key(record)? {
            let cost = record.cost(self.name())?;
            self.add_cost(key, cost)?;
        }
        Ok(())
    }

    pub(crate) fn add_cost(&mut self, key: String, cost: Decimal) -> Result<()> {
        let sum = self.sum_with(&key, cost)?;
        self.data.insert(key, sum);
        Ok(())
    }

    /// What the cell for `key` would hold after adding `cost`.
    pub(crate) fn sum_with(&self, key: &str, cost: Decimal) -> Result<Decimal> {
        self.data
            .get(key)
            .copied()
            .unwrap_or(Decimal::ZERO)
            .checked_add(cost)
            .ok_or_else(|| Error::CostOverflow {
                key: key.to_string(),
            })
    }

    /// Sum `other` into this metric, key by key. Absent keys count as zero.
    /// On overflow the metric is left as it was.
    pub fn merge(&mut self, other: &Metric) -> Result<()> {
        if self.kind != other.kind {
            return Err(Error::SchemaMismatch {
                expected: self.name().to_string(),
                found: other.name().to_string(),
            });
        }
        self.accumulate(other)
    }

    pub(crate) fn accumulate(&mut self, other: &Metric) -> Result<()> {
        let sums = self.merged_cells(other)?;
        self.store(sums);
        Ok(())
    }

    /// The cells `other` would change, with their summed values.
    pub(crate) fn merged_cells(&self, other: &Metric) -> Result<Vec<(String, Decimal)>> {
        other
            .data
            .iter()
            .map(|(key, value)| Ok((key.clone(), self.sum_with(key, *value)?)))
            .collect()
    }

    pub(crate) fn store(&mut self, cells: impl IntoIterator<Item = (String, Decimal)>) {
        self.data.extend(cells);
    }

    /// Cells whose key matches the given per-dimension patterns.
    ///
    /// Patterns are regular expressions matched against the whole
    /// component; dimensions without a filter match anything.
    pub fn query<I, K, V>(&self, filters: I) -> Result<BTreeMap<String, Decimal>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let re = self.query_pattern(filters)?;
        Ok(self
            .data
            .iter()
            .filter(|(key, _)| re.is_match(key))
            .map(|(key, value)| (key.clone(), *value))
            .collect())
    }

    fn query_pattern<I, K, V>(&self, filters: I) -> Result<Regex>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let dims = self.kind.dimensions();
        let mut patterns: Vec<Option<String>> = vec![None; dims.len()];
        for (name, pattern) in filters {
            let name = name.as_ref();
            let idx = dims
                .iter()
                .position(|d| d.name == name)
                .ok_or_else(|| Error::UnknownDimension {
                    dimension: name.to_string(),
                    metric: self.name(),
                })?;
            patterns[idx] = Some(pattern.as_ref().to_string());
        }

        let joined = patterns
            .iter()
            .map(|p| format!("(?:{})", p.as_deref().unwrap_or(".*")))
            .collect::<Vec<_>>()
            .join(&regex::escape(&KEY_SEPARATOR.to_string()));
        Ok(Regex::new(&format!("^(?:{joined})$"))?)
    }

    /// Distinct values seen at each dimension position.
    pub fn dimensions(&self) -> BTreeMap<&'static str, BTreeSet<String>> {
        let mut out: BTreeMap<&'static str, BTreeSet<String>> =
            self.kind.dimension_names().map(|n| (n, BTreeSet::new())).collect();
        let names: Vec<&'static str> = self.kind.dimension_names().collect();
        for key in self.data.keys() {
            for (name, part) in names.iter().zip(key.split(KEY_SEPARATOR)) {
                if let Some(values) = out.get_mut(name) {
                    values.insert(part.to_string());
                }
            }
        }
        out
    }

    pub fn get(&self, key: &str) -> Option<Decimal> {
        self.data.get(key).copied()
    }

    pub fn total(&self) -> Result<Decimal> {
        checked_sum(self.data.values().copied(), self.name())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Decimal)> {
        self.data.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
