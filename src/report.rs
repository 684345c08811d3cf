//! Per-account cost comparisons built on top of a [`SuperSlice`].
//!
//! Every named window is aggregated once; the `TotalUsage` cells of each
//! window are then folded into [`Account`]s, split by charge type. The
//! rows produced here are plain numbers for a renderer to lay out.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::warn;

use crate::error::{Error, Result};
use crate::metric::{checked_sum, ChargeType, MetricKind, KEY_SEPARATOR};
use crate::slice::Slice;
use crate::superslice::{month_interval, SuperSlice, WindowLabel};

/// Synthetic account summing every linked account.
pub const ALL_ACCOUNTS: &str = "AllAccounts";

/// Bucket for services too small to list on their own.
pub const OTHER_SERVICES: &str = "Other";

type ServiceCosts = BTreeMap<String, Decimal>;

#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub usage: BTreeMap<WindowLabel, ServiceCosts>,
    pub one_time: BTreeMap<WindowLabel, ServiceCosts>,
}

impl Account {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            usage: BTreeMap::new(),
            one_time: BTreeMap::new(),
        }
    }

    pub fn add(
        &mut self,
        label: WindowLabel,
        service: &str,
        charge: ChargeType,
        value: Decimal,
    ) -> Result<()> {
        let bucket = match charge {
            ChargeType::Usage => &mut self.usage,
            ChargeType::OneTime => &mut self.one_time,
        };
        let cell = bucket
            .entry(label)
            .or_default()
            .entry(service.to_string())
            .or_insert(Decimal::ZERO);
        *cell = cell.checked_add(value).ok_or_else(|| Error::CostOverflow {
            key: format!("{}|{service}", self.id),
        })?;
        Ok(())
    }

    /// Usage cost of one service in a window; zero when unseen.
    pub fn service_cost(&self, label: WindowLabel, service: &str) -> Decimal {
        self.usage
            .get(&label)
            .and_then(|s| s.get(service))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    pub fn total(&self, label: WindowLabel) -> Result<Decimal> {
        window_total(&self.usage, label, &self.id)
    }

    pub fn one_time_total(&self, label: WindowLabel) -> Result<Decimal> {
        window_total(&self.one_time, label, &self.id)
    }

    /// Services by descending usage cost in `label`.
    pub fn sort_label(&self, label: WindowLabel) -> Vec<(String, Decimal)> {
        let Some(services) = self.usage.get(&label) else {
            return Vec::new();
        };
        let mut costs: Vec<(String, Decimal)> =
            services.iter().map(|(k, v)| (k.clone(), *v)).collect();
        costs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        costs
    }

    /// Latest-day service rows with their earlier comparison points.
    /// Services below `min_cost` are folded into a trailing
    /// [`OTHER_SERVICES`] row.
    pub fn service_rows(&self, min_cost: Decimal) -> Result<Vec<ComparisonRow>> {
        let mut rows = Vec::new();
        let mut other = ComparisonRow::new(OTHER_SERVICES);
        for (service, amount) in self.sort_label(WindowLabel::Latest) {
            let row = ComparisonRow {
                label: service.clone(),
                current: amount,
                one_day_ago: self.service_cost(WindowLabel::OneDayAgo, &service),
                one_week_ago: self.service_cost(WindowLabel::OneWeekAgo, &service),
                one_month_ago: self.service_cost(WindowLabel::OneMonthAgo, &service),
            };
            if amount >= min_cost {
                rows.push(row);
            } else {
                other.accumulate(&row)?;
            }
        }
        rows.push(other);
        Ok(rows)
    }
}

fn window_total(
    windows: &BTreeMap<WindowLabel, ServiceCosts>,
    label: WindowLabel,
    account: &str,
) -> Result<Decimal> {
    match windows.get(&label) {
        Some(services) => checked_sum(services.values().copied(), account),
        None => Ok(Decimal::ZERO),
    }
}

/// A cost now, next to the same cost one day, one week and one month back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub label: String,
    pub current: Decimal,
    pub one_day_ago: Decimal,
    pub one_week_ago: Decimal,
    pub one_month_ago: Decimal,
}

impl ComparisonRow {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            current: Decimal::ZERO,
            one_day_ago: Decimal::ZERO,
            one_week_ago: Decimal::ZERO,
            one_month_ago: Decimal::ZERO,
        }
    }

    /// Add `other` column by column; unchanged on overflow.
    pub fn accumulate(&mut self, other: &ComparisonRow) -> Result<()> {
        let add = |a: Decimal, b: Decimal| checked_sum([a, b], &self.label);
        let current = add(self.current, other.current)?;
        let one_day_ago = add(self.one_day_ago, other.one_day_ago)?;
        let one_week_ago = add(self.one_week_ago, other.one_week_ago)?;
        let one_month_ago = add(self.one_month_ago, other.one_month_ago)?;
        self.current = current;
        self.one_day_ago = one_day_ago;
        self.one_week_ago = one_week_ago;
        self.one_month_ago = one_month_ago;
        Ok(())
    }

    pub fn comparisons(&self) -> Result<[Comparison; 3]> {
        Ok([
            Comparison::between(self.current, self.one_day_ago)?,
            Comparison::between(self.current, self.one_week_ago)?,
            Comparison::between(self.current, self.one_month_ago)?,
        ])
    }
}

/// Change from a prior cost. `ratio` is `None` when the prior was zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Comparison {
    pub prior: Decimal,
    pub delta: Decimal,
    pub ratio: Option<Decimal>,
}

impl Comparison {
    pub fn between(current: Decimal, prior: Decimal) -> Result<Self> {
        let delta = current
            .checked_sub(prior)
            .ok_or_else(|| Error::CostOverflow {
                key: "change from prior".to_string(),
            })?;
        Ok(Self {
            prior,
            delta,
            ratio: delta.checked_div(prior),
        })
    }
}

/// Month-level totals for one account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyTotals {
    pub month_so_far: Decimal,
    pub last_month_to_date: Decimal,
    pub last_month: Decimal,
    /// Month so far scaled up to the whole month; `None` at the very
    /// start of the month.
    pub estimate: Option<Decimal>,
}

impl MonthlyTotals {
    pub fn compute(account: &Account, now: DateTime<Utc>) -> Result<Self> {
        let month_so_far = account.total(WindowLabel::ThisMonth)?;
        let month = month_interval(now.year(), now.month())?;
        let elapsed = Decimal::from((now - month.start).num_seconds());
        let length = Decimal::from((month.end - month.start).num_seconds());
        let estimate = month_so_far
            .checked_mul(length)
            .and_then(|scaled| scaled.checked_div(elapsed));
        Ok(Self {
            month_so_far,
            last_month_to_date: account.total(WindowLabel::LastMonthToDate)?,
            last_month: account.total(WindowLabel::LastMonth)?,
            estimate,
        })
    }
}

/// Every window of a SuperSlice, broken down by account.
#[derive(Debug, Clone)]
pub struct AccountCollection {
    now: DateTime<Utc>,
    windows: BTreeMap<WindowLabel, Slice>,
    accounts: BTreeMap<String, Account>,
}

impl AccountCollection {
    /// `names` maps linked account ids to display names; unnamed accounts
    /// are shown by id.
    pub fn build(superslice: &SuperSlice, names: &BTreeMap<String, String>) -> Result<Self> {
        let mut windows = BTreeMap::new();
        for label in WindowLabel::ALL {
            windows.insert(label, superslice.window(label)?);
        }

        let mut accounts = BTreeMap::new();
        accounts.insert(
            ALL_ACCOUNTS.to_string(),
            Account::new(ALL_ACCOUNTS, ALL_ACCOUNTS),
        );

        for (label, slice) in &windows {
            let Some(metric) = slice.metric(MetricKind::TotalUsage) else {
                continue;
            };
            for (key, value) in metric.iter() {
                let mut parts = key.splitn(3, KEY_SEPARATOR);
                let (Some(account_id), Some(service), Some(charge)) =
                    (parts.next(), parts.next(), parts.next())
                else {
                    warn!(key, "malformed TotalUsage key");
                    continue;
                };
                let Some(charge) = ChargeType::parse(charge) else {
                    warn!(key, "unknown charge type");
                    continue;
                };

                accounts
                    .entry(account_id.to_string())
                    .or_insert_with(|| {
                        let name = names.get(account_id).map_or(account_id, String::as_str);
                        Account::new(account_id, name)
                    })
                    .add(*label, service, charge, value)?;
                if let Some(all) = accounts.get_mut(ALL_ACCOUNTS) {
                    all.add(*label, service, charge, value)?;
                }
            }
        }

        Ok(Self {
            now: superslice.now(),
            windows,
            accounts,
        })
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn account(&self, id: &str) -> Option<&Account> {
        self.accounts.get(id)
    }

    /// Linked accounts in id order, followed by [`ALL_ACCOUNTS`].
    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts
            .values()
            .filter(|a| a.id != ALL_ACCOUNTS)
            .chain(self.accounts.get(ALL_ACCOUNTS))
    }

    /// One row per linked account, highest latest-day spend first.
    ///
    /// Totals include one-time charges, and are read straight from each
    /// window's `TotalUsage` metric through an account query.
    pub fn summary_rows(&self) -> Result<Vec<ComparisonRow>> {
        let mut rows: BTreeMap<String, ComparisonRow> = BTreeMap::new();
        let columns = [
            WindowLabel::Latest,
            WindowLabel::OneDayAgo,
            WindowLabel::OneWeekAgo,
            WindowLabel::OneMonthAgo,
        ];
        for label in columns {
            let Some(metric) = self
                .windows
                .get(&label)
                .and_then(|s| s.metric(MetricKind::TotalUsage))
            else {
                continue;
            };
            let Some(ids) = metric.dimensions().remove("account") else {
                continue;
            };
            for id in ids {
                let cells = metric.query([("account", regex::escape(&id))])?;
                let total = checked_sum(cells.values().copied(), &id)?;
                let name = self.accounts.get(&id).map_or(id.as_str(), |a| a.name.as_str());
                let row = rows
                    .entry(id.clone())
                    .or_insert_with(|| ComparisonRow::new(name));
                match label {
                    WindowLabel::Latest => row.current = total,
                    WindowLabel::OneDayAgo => row.one_day_ago = total,
                    WindowLabel::OneWeekAgo => row.one_week_ago = total,
                    _ => row.one_month_ago = total,
                }
            }
        }

        let mut rows: Vec<ComparisonRow> = rows.into_values().collect();
        rows.sort_by(|a, b| b.current.cmp(&a.current).then_with(|| a.label.cmp(&b.label)));
        Ok(rows)
    }

    /// Accounts worth a detailed page: latest-day usage of at least `min_cost`.
    pub fn detailed_accounts(&self, min_cost: Decimal) -> Result<Vec<&Account>> {
        let mut out = Vec::new();
        for account in self.accounts() {
            if account.total(WindowLabel::Latest)? >= min_cost {
                out.push(account);
            }
        }
        Ok(out)
    }
}
