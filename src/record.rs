use std::collections::HashMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::timestamp::{parse_timestamp, Interval, NaiveTz};

pub const LINKED_ACCOUNT_ID: &str = "LinkedAccountId";
pub const PRODUCT_NAME: &str = "ProductName";
pub const USAGE_TYPE: &str = "UsageType";
pub const UNBLENDED_COST: &str = "UnBlendedCost";
pub const USAGE_START_DATE: &str = "UsageStartDate";
pub const USAGE_END_DATE: &str = "UsageEndDate";
pub const RESERVED_INSTANCE: &str = "ReservedInstance";
pub const SUBSCRIPTION_ID: &str = "SubscriptionId";

/// One billing line item, as read from the source.
///
/// Values stay as strings; cost and usage period are parsed on demand so a
/// malformed column only fails the record when something actually needs it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    position: usize,
    fields: HashMap<String, String>,
}

impl Record {
    /// `position` is the 1-based index of the record within its stream.
    pub fn new(position: usize) -> Self {
        Self {
            position,
            fields: HashMap::new(),
        }
    }

    pub(crate) fn from_pairs<I, K, V>(position: usize, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            position,
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Look up a field that `metric` cannot do without.
    pub fn require(&self, field: &'static str, metric: &'static str) -> Result<&str> {
        self.get(field).ok_or(Error::MissingField { field, metric })
    }

    /// The unblended cost as an exact decimal.
    pub fn cost(&self, metric: &'static str) -> Result<Decimal> {
        let raw = self.require(UNBLENDED_COST, metric)?.trim();
        Decimal::from_str(raw)
            .or_else(|_| Decimal::from_scientific(raw))
            .map_err(|_| Error::MalformedCost {
                value: raw.to_string(),
            })
    }

    /// The usage period, or `None` for items that are not time-bound
    /// (both period fields empty or absent).
    pub fn interval(&self, naive_tz: NaiveTz) -> Result<Option<Interval>> {
        let start = self.get(USAGE_START_DATE).unwrap_or("").trim();
        let end = self.get(USAGE_END_DATE).unwrap_or("").trim();
        match (start.is_empty(), end.is_empty()) {
            (true, true) => Ok(None),
            (true, false) => Err(Error::InvalidTimestamp {
                field: USAGE_START_DATE,
                value: String::new(),
            }),
            (false, true) => Err(Error::InvalidTimestamp {
                field: USAGE_END_DATE,
                value: String::new(),
            }),
            (false, false) => Ok(Some(Interval::new(
                parse_timestamp(USAGE_START_DATE, start, naive_tz)?,
                parse_timestamp(USAGE_END_DATE, end, naive_tz)?,
            ))),
        }
    }
}
