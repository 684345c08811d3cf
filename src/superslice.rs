use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, Timelike, Utc};
use serde::Serialize;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::metric::MetricKind;
use crate::record::Record;
use crate::slice::{schema_label, Slice};
use crate::timestamp::{Interval, NaiveTz};

/// Named aggregation windows, all relative to the reference instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum WindowLabel {
    Latest,
    OneDayAgo,
    OneWeekAgo,
    OneMonthAgo,
    ThisMonth,
    LastMonth,
    LastMonthToDate,
}

impl WindowLabel {
    pub const ALL: [WindowLabel; 7] = [
        WindowLabel::Latest,
        WindowLabel::OneDayAgo,
        WindowLabel::OneWeekAgo,
        WindowLabel::OneMonthAgo,
        WindowLabel::ThisMonth,
        WindowLabel::LastMonth,
        WindowLabel::LastMonthToDate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            WindowLabel::Latest => "latest",
            WindowLabel::OneDayAgo => "one_day_ago",
            WindowLabel::OneWeekAgo => "one_week_ago",
            WindowLabel::OneMonthAgo => "one_month_ago",
            WindowLabel::ThisMonth => "this_month",
            WindowLabel::LastMonth => "last_month",
            WindowLabel::LastMonthToDate => "last_month_to_date",
        }
    }
}

impl fmt::Display for WindowLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters for one [`SuperSlice::load`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    /// Records consumed without error.
    pub records: usize,
    /// Interval slices opened; several may land in the same bucket.
    pub slices_opened: usize,
    /// Records routed to `non_lineitems`.
    pub non_lineitems: usize,
}

enum LoadState {
    Idle,
    Open(Slice),
}

/// Every slice seen during an aggregation run, keyed by billing interval.
#[derive(Debug, Clone)]
pub struct SuperSlice {
    slices: BTreeMap<String, Slice>,
    non_lineitems: Vec<Slice>,
    onetime_charges: Vec<Slice>,
    bounds: Option<Interval>,
    now: DateTime<Utc>,
    schema: Vec<MetricKind>,
    retain_lineitems: bool,
    naive_tz: NaiveTz,
}

impl SuperSlice {
    /// `now` anchors every relative window (`latest`, `this_month`, ...).
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            slices: BTreeMap::new(),
            non_lineitems: Vec::new(),
            onetime_charges: Vec::new(),
            bounds: None,
            now,
            schema: MetricKind::ALL.to_vec(),
            retain_lineitems: false,
            naive_tz: NaiveTz::default(),
        }
    }

    /// Metric kinds every slice carries, in order. Defaults to
    /// [`MetricKind::ALL`].
    pub fn schema(mut self, schema: Vec<MetricKind>) -> Self {
        self.schema = schema;
        self
    }

    pub fn retain_lineitems(mut self, retain: bool) -> Self {
        self.retain_lineitems = retain;
        self
    }

    pub fn naive_timezone(mut self, tz: NaiveTz) -> Self {
        self.naive_tz = tz;
        self
    }

    fn new_slice(&self, interval: Option<Interval>) -> Slice {
        Slice::with_schema(interval, &self.schema).retaining(self.retain_lineitems)
    }

    /// Consume a record stream, bucketing consecutive records that share a
    /// usage period into one slice.
    ///
    /// Stops at the first bad record. Everything before it, including the
    /// slice that was open, stays merged in.
    pub fn load<I>(&mut self, records: I) -> Result<LoadStats>
    where
        I: IntoIterator<Item = Result<Record>>,
    {
        let mut stats = LoadStats::default();
        let mut state = LoadState::Idle;

        for (idx, item) in records.into_iter().enumerate() {
            let step = match item {
                Ok(record) => {
                    let position = record.position();
                    self.step(&mut state, record, &mut stats)
                        .map_err(|e| e.at_record(position))
                }
                Err(e) => Err(e.at_record(idx + 1)),
            };
            if let Err(e) = step {
                self.close(state)?;
                debug!(records = stats.records, error = %e, "load aborted");
                return Err(e);
            }
        }
        self.close(state)?;

        debug!(
            records = stats.records,
            slices_opened = stats.slices_opened,
            non_lineitems = stats.non_lineitems,
            buckets = self.slices.len(),
            "load finished"
        );
        Ok(stats)
    }

    fn step(&mut self, state: &mut LoadState, record: Record, stats: &mut LoadStats) -> Result<()> {
        let Some(interval) = record.interval(self.naive_tz)? else {
            let mut item = self.new_slice(None);
            item.add_lineitem(record)?;
            self.non_lineitems.push(item);
            stats.non_lineitems += 1;
            stats.records += 1;
            return Ok(());
        };

        if let LoadState::Open(open) = state {
            if open.interval() == Some(&interval) {
                open.add_lineitem(record)?;
                stats.records += 1;
                return Ok(());
            }
        }

        // a new slice is only opened once the record is in it
        let mut fresh = self.new_slice(Some(interval));
        fresh.add_lineitem(record)?;
        stats.slices_opened += 1;
        stats.records += 1;
        if let LoadState::Open(done) = std::mem::replace(state, LoadState::Open(fresh)) {
            self.add(done)?;
        }
        Ok(())
    }

    fn close(&mut self, state: LoadState) -> Result<()> {
        match state {
            LoadState::Open(slice) => self.add(slice),
            LoadState::Idle => Ok(()),
        }
    }

    /// Install a slice, merging it into any existing slice for the same
    /// interval. Slices without an interval go to `non_lineitems`.
    pub fn add(&mut self, slice: Slice) -> Result<()> {
        let schema = slice.schema();
        if schema != self.schema {
            return Err(Error::SchemaMismatch {
                expected: schema_label(&self.schema),
                found: schema_label(&schema),
            });
        }

        let Some(interval) = slice.interval().copied() else {
            self.non_lineitems.push(slice);
            return Ok(());
        };

        self.bounds = Some(match self.bounds {
            Some(mut bounds) => {
                bounds.widen(&interval);
                bounds
            }
            None => interval,
        });

        match self.slices.entry(interval.key()) {
            Entry::Occupied(mut existing) => {
                trace!(key = %existing.key(), "merging into existing slice");
                existing.get_mut().accumulate(&slice)?;
            }
            Entry::Vacant(vacant) => {
                vacant.insert(slice);
            }
        }
        Ok(())
    }

    /// Fold another run's slices into this one.
    pub fn absorb(&mut self, other: SuperSlice) -> Result<()> {
        for slice in other.slices.into_values() {
            self.add(slice)?;
        }
        for slice in other.non_lineitems {
            self.add(slice)?;
        }
        self.onetime_charges.extend(other.onetime_charges);
        Ok(())
    }

    /// Sum every stored slice whose interval lies entirely within
    /// `[start, end]`. Slices straddling either edge are left out.
    pub fn aggregate(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Slice> {
        let window = Interval::new(start, end);
        let mut out = self.new_slice(Some(window));
        for slice in self.slices.values() {
            if slice.interval().is_some_and(|i| window.contains(i)) {
                out.accumulate(slice)?;
            }
        }
        Ok(out)
    }

    /// Aggregate over everything loaded so far; `None` when empty.
    pub fn all(&self) -> Result<Option<Slice>> {
        self.bounds
            .map(|b| self.aggregate(b.start, b.end))
            .transpose()
    }

    /// The UTC calendar day containing `now - days_back`.
    fn day_interval(&self, days_back: i64) -> Interval {
        let day = (self.now - Duration::days(days_back)).date_naive();
        let start = midnight(day);
        Interval::new(start, start + Duration::days(1))
    }

    pub fn latest(&self) -> Result<Slice> {
        self.aggregate_interval(self.day_interval(1))
    }

    pub fn one_day_ago(&self) -> Result<Slice> {
        self.aggregate_interval(self.day_interval(2))
    }

    pub fn one_week_ago(&self) -> Result<Slice> {
        self.aggregate_interval(self.day_interval(8))
    }

    pub fn one_month_ago(&self) -> Result<Slice> {
        self.aggregate_interval(self.day_interval(29))
    }

    /// Calendar month `month` of `year`, UTC.
    pub fn month(&self, year: i32, month: u32) -> Result<Slice> {
        self.aggregate_interval(month_interval(year, month)?)
    }

    pub fn this_month(&self) -> Result<Slice> {
        self.month(self.now.year(), self.now.month())
    }

    pub fn last_month(&self) -> Result<Slice> {
        let then = self.previous_month_anchor();
        self.month(then.year(), then.month())
    }

    /// Last month from its first day up to the same day-of-month and time
    /// as `now`, clamped to the month's length.
    pub fn last_month_to_date(&self) -> Result<Slice> {
        self.aggregate_interval(self.window_interval(WindowLabel::LastMonthToDate)?)
    }

    /// The absolute interval a named window resolves to.
    pub fn window_interval(&self, label: WindowLabel) -> Result<Interval> {
        match label {
            WindowLabel::Latest => Ok(self.day_interval(1)),
            WindowLabel::OneDayAgo => Ok(self.day_interval(2)),
            WindowLabel::OneWeekAgo => Ok(self.day_interval(8)),
            WindowLabel::OneMonthAgo => Ok(self.day_interval(29)),
            WindowLabel::ThisMonth => month_interval(self.now.year(), self.now.month()),
            WindowLabel::LastMonth => {
                let then = self.previous_month_anchor();
                month_interval(then.year(), then.month())
            }
            WindowLabel::LastMonthToDate => {
                let then = self.previous_month_anchor();
                let month = month_interval(then.year(), then.month())?;
                let days = (month.end - month.start).num_days() as u32;
                let day = self.now.day().min(days);
                let end = NaiveDate::from_ymd_opt(then.year(), then.month(), day)
                    .and_then(|d| d.and_hms_opt(self.now.hour(), self.now.minute(), 0))
                    .ok_or_else(|| {
                        Error::InvalidWindow(format!("{}-{:02}-{day:02}", then.year(), then.month()))
                    })?
                    .and_utc();
                Ok(Interval::new(month.start, end))
            }
        }
    }

    /// Aggregate a named window.
    pub fn window(&self, label: WindowLabel) -> Result<Slice> {
        self.aggregate_interval(self.window_interval(label)?)
    }

    fn aggregate_interval(&self, interval: Interval) -> Result<Slice> {
        self.aggregate(interval.start, interval.end)
    }

    /// A day inside the previous calendar month.
    fn previous_month_anchor(&self) -> DateTime<Utc> {
        self.now - Duration::days(i64::from(self.now.day()) + 1)
    }

    pub fn slice(&self, key: &str) -> Option<&Slice> {
        self.slices.get(key)
    }

    /// Stored slices in key order, which is also chronological order.
    pub fn slices(&self) -> impl Iterator<Item = (&str, &Slice)> {
        self.slices.iter().map(|(k, s)| (k.as_str(), s))
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    pub fn non_lineitems(&self) -> &[Slice] {
        &self.non_lineitems
    }

    /// Reserved for upfront charges; aggregation never fills it.
    pub fn onetime_charges(&self) -> &[Slice] {
        &self.onetime_charges
    }

    /// Earliest start and latest end across all added slices.
    pub fn bounds(&self) -> Option<Interval> {
        self.bounds
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn metric_kinds(&self) -> &[MetricKind] {
        &self.schema
    }
}

fn midnight(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

/// `[first of month, first of next month]`, rolling December into January.
pub fn month_interval(year: i32, month: u32) -> Result<Interval> {
    let invalid = || Error::InvalidWindow(format!("{year}-{month:02}"));
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let next = first
        .checked_add_months(Months::new(1))
        .ok_or_else(invalid)?;
    Ok(Interval::new(midnight(first), midnight(next)))
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::TimeZone;
    use rust_decimal::Decimal;

    use super::*;
    use crate::record::{
        LINKED_ACCOUNT_ID, PRODUCT_NAME, UNBLENDED_COST, USAGE_END_DATE, USAGE_START_DATE,
        USAGE_TYPE,
    };

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn item(pos: usize, start: &str, end: &str, cost: &str) -> Result<Record> {
        Ok(Record::new(pos)
            .with(LINKED_ACCOUNT_ID, "111")
            .with(PRODUCT_NAME, "Amazon Simple Queue Service")
            .with(USAGE_TYPE, "Requests-Tier1")
            .with(UNBLENDED_COST, cost)
            .with(USAGE_START_DATE, start)
            .with(USAGE_END_DATE, end))
    }

    fn hourly(day: u32, hour: u32, cost: &str) -> Result<Record> {
        let start = format!("2015-03-{day:02} {hour:02}:00:00");
        let end = if hour == 23 {
            format!("2015-03-{:02} 00:00:00", day + 1)
        } else {
            format!("2015-03-{day:02} {:02}:00:00", hour + 1)
        };
        item(0, &start, &end, cost)
    }

    fn total(slice: &Slice) -> Decimal {
        slice.metric(MetricKind::TotalUsage).unwrap().total().unwrap()
    }

    #[test]
    fn consecutive_records_share_a_slice() {
        let mut ss = SuperSlice::new(at(2015, 3, 10, 0));
        let stats = ss
            .load(vec![hourly(1, 0, "1"), hourly(1, 0, "2"), hourly(1, 1, "4")])
            .unwrap();
        assert_eq!(stats.records, 3);
        assert_eq!(stats.slices_opened, 2);
        assert_eq!(ss.len(), 2);
        let first = ss.slice("2015-03-01 00:00:00+00:00-2015-03-01 01:00:00+00:00").unwrap();
        assert_eq!(total(first), d("3"));
    }

    #[test]
    fn revisited_interval_merges_into_same_bucket() {
        let mut ss = SuperSlice::new(at(2015, 3, 10, 0));
        ss.load(vec![hourly(1, 0, "1"), hourly(1, 1, "2"), hourly(1, 0, "3")])
            .unwrap();
        ss.load(vec![hourly(1, 1, "10")]).unwrap();
        assert_eq!(ss.len(), 2);
        let slices: Vec<Decimal> = ss.slices().map(|(_, s)| total(s)).collect();
        assert_eq!(slices, vec![d("4"), d("12")]);
    }

    #[test]
    fn undated_records_become_non_lineitems() {
        let mut ss = SuperSlice::new(at(2015, 3, 10, 0));
        let stats = ss
            .load(vec![hourly(1, 0, "1"), item(2, "", "", "-5"), hourly(1, 0, "2")])
            .unwrap();
        assert_eq!(stats.non_lineitems, 1);
        assert_eq!(stats.slices_opened, 1);
        assert_eq!(ss.len(), 1);
        assert_eq!(ss.non_lineitems().len(), 1);
        assert_eq!(total(&ss.non_lineitems()[0]), d("-5"));
        assert!(ss.onetime_charges().is_empty());
    }

    #[test]
    fn bad_record_aborts_but_keeps_prior_work() {
        let mut ss = SuperSlice::new(at(2015, 3, 10, 0));
        let err = ss
            .load(vec![
                hourly(1, 0, "1").map(|r| r.with("x", "1")),
                item(2, "2015-03-01 00:00:00", "2015-03-01 01:00:00", "2"),
                item(3, "2015-03-01 01:00:00", "2015-03-01 02:00:00", "oops"),
                hourly(1, 3, "100"),
            ])
            .unwrap_err();
        assert!(matches!(err, Error::Record { position: 3, .. }));
        assert!(matches!(err.root(), Error::MalformedCost { .. }));
        assert_eq!(ss.len(), 1);
        assert_eq!(total(ss.slices().next().unwrap().1), d("3"));
    }

    #[test]
    fn stream_error_is_positioned() {
        let mut ss = SuperSlice::new(at(2015, 3, 10, 0));
        let err = ss
            .load(vec![
                hourly(1, 0, "1"),
                Err(Error::InvalidWindow("broken source".into())),
            ])
            .unwrap_err();
        assert!(matches!(err, Error::Record { position: 2, .. }));
        assert_eq!(ss.len(), 1);
    }

    #[test]
    fn bounds_track_extremes() {
        let mut ss = SuperSlice::new(at(2015, 3, 10, 0));
        assert_eq!(ss.bounds(), None);
        ss.load(vec![hourly(2, 5, "1"), hourly(1, 3, "1"), hourly(3, 23, "1")])
            .unwrap();
        assert_eq!(ss.bounds(), Some(Interval::new(at(2015, 3, 1, 3), at(2015, 3, 4, 0))));
    }

    #[test]
    fn aggregate_uses_full_containment() {
        let mut ss = SuperSlice::new(at(2015, 3, 10, 0));
        ss.load(vec![hourly(1, 0, "1"), hourly(1, 23, "2"), hourly(2, 0, "4")])
            .unwrap();

        let day = ss.aggregate(at(2015, 3, 1, 0), at(2015, 3, 2, 0)).unwrap();
        assert_eq!(total(&day), d("3"));
        assert_eq!(day.interval(), Some(&Interval::new(at(2015, 3, 1, 0), at(2015, 3, 2, 0))));

        // a window ending mid-hour drops that whole hour
        let cut = ss
            .aggregate(at(2015, 3, 1, 0), at(2015, 3, 1, 23) + Duration::minutes(30))
            .unwrap();
        assert_eq!(total(&cut), d("1"));

        let empty = ss.aggregate(at(2015, 4, 1, 0), at(2015, 4, 2, 0)).unwrap();
        assert_eq!(total(&empty), Decimal::ZERO);
    }

    #[test]
    fn aggregate_is_repeatable() {
        let mut ss = SuperSlice::new(at(2015, 3, 10, 0));
        ss.load(vec![hourly(1, 0, "0.1"), hourly(1, 1, "0.2")]).unwrap();
        let a = ss.aggregate(at(2015, 3, 1, 0), at(2015, 3, 2, 0)).unwrap();
        let b = ss.aggregate(at(2015, 3, 1, 0), at(2015, 3, 2, 0)).unwrap();
        assert_eq!(a.metrics(), b.metrics());
        assert_eq!(total(&a), d("0.3"));
    }

    #[test]
    fn day_windows_follow_reference_instant() {
        let mut ss = SuperSlice::new(at(2015, 3, 10, 15));
        ss.load(vec![
            hourly(9, 4, "1"),
            hourly(8, 4, "2"),
            hourly(2, 4, "4"),
            hourly(9, 23, "8"),
        ])
        .unwrap();
        assert_eq!(total(&ss.latest().unwrap()), d("9"));
        assert_eq!(total(&ss.one_day_ago().unwrap()), d("2"));
        assert_eq!(total(&ss.one_week_ago().unwrap()), d("4"));
        assert_eq!(total(&ss.one_month_ago().unwrap()), Decimal::ZERO);
        assert_eq!(
            ss.window_interval(WindowLabel::OneMonthAgo).unwrap(),
            Interval::new(at(2015, 2, 9, 0), at(2015, 2, 10, 0))
        );
    }

    #[test]
    fn month_windows() {
        let ss = SuperSlice::new(at(2015, 3, 31, 14) + Duration::minutes(25));
        assert_eq!(
            ss.window_interval(WindowLabel::ThisMonth).unwrap(),
            Interval::new(at(2015, 3, 1, 0), at(2015, 4, 1, 0))
        );
        assert_eq!(
            ss.window_interval(WindowLabel::LastMonth).unwrap(),
            Interval::new(at(2015, 2, 1, 0), at(2015, 3, 1, 0))
        );
        assert_eq!(
            ss.window_interval(WindowLabel::LastMonthToDate).unwrap(),
            Interval::new(at(2015, 2, 1, 0), at(2015, 2, 28, 14) + Duration::minutes(25))
        );
    }

    #[test]
    fn december_rolls_over() {
        assert_eq!(
            month_interval(2014, 12).unwrap(),
            Interval::new(at(2014, 12, 1, 0), at(2015, 1, 1, 0))
        );
        let ss = SuperSlice::new(at(2015, 1, 5, 0));
        assert_eq!(
            ss.window_interval(WindowLabel::LastMonth).unwrap(),
            Interval::new(at(2014, 12, 1, 0), at(2015, 1, 1, 0))
        );
        assert!(matches!(ss.month(2015, 13), Err(Error::InvalidWindow(_))));
    }

    #[test]
    fn month_aggregate_sums_contained_slices() {
        let mut ss = SuperSlice::new(at(2015, 3, 10, 0));
        ss.load(vec![hourly(1, 0, "1"), hourly(9, 12, "2")]).unwrap();
        assert_eq!(total(&ss.this_month().unwrap()), d("3"));
        assert_eq!(total(&ss.last_month().unwrap()), Decimal::ZERO);
        assert_eq!(total(&ss.all().unwrap().unwrap()), d("3"));
    }

    #[test]
    fn add_rejects_foreign_schema() {
        let mut ss = SuperSlice::new(at(2015, 3, 10, 0));
        let foreign = Slice::with_schema(
            Some(Interval::new(at(2015, 3, 1, 0), at(2015, 3, 1, 1))),
            &[MetricKind::TotalUsage],
        );
        assert!(matches!(ss.add(foreign), Err(Error::SchemaMismatch { .. })));
        assert!(ss.is_empty());
    }

    #[test]
    fn absorb_merges_runs() {
        let mut a = SuperSlice::new(at(2015, 3, 10, 0));
        a.load(vec![hourly(1, 0, "1")]).unwrap();
        let mut b = SuperSlice::new(at(2015, 3, 10, 0));
        b.load(vec![hourly(1, 0, "2"), hourly(2, 0, "5"), item(3, "", "", "1")])
            .unwrap();

        a.absorb(b).unwrap();
        assert_eq!(a.len(), 2);
        assert_eq!(a.non_lineitems().len(), 1);
        assert_eq!(total(&a.all().unwrap().unwrap()), d("8"));
        assert_eq!(a.bounds(), Some(Interval::new(at(2015, 3, 1, 0), at(2015, 3, 2, 1))));
    }

    #[test]
    fn retention_follows_records_into_buckets() {
        let mut ss = SuperSlice::new(at(2015, 3, 10, 0)).retain_lineitems(true);
        ss.load(vec![hourly(1, 0, "1"), hourly(1, 1, "1"), hourly(1, 0, "1")])
            .unwrap();
        let first = ss.slices().next().unwrap().1;
        assert_eq!(first.lineitems().len(), 2);
    }

    #[test]
    fn cost_overflow_aborts_load_with_position() {
        let max = Decimal::MAX.to_string();
        let mut ss = SuperSlice::new(at(2015, 3, 10, 0));
        let err = ss
            .load(vec![
                item(1, "2015-03-01 00:00:00", "2015-03-01 01:00:00", &max),
                item(2, "2015-03-01 00:00:00", "2015-03-01 01:00:00", &max),
            ])
            .unwrap_err();
        assert!(matches!(err, Error::Record { position: 2, .. }));
        assert!(matches!(err.root(), Error::CostOverflow { .. }));
        assert_eq!(total(ss.slices().next().unwrap().1), Decimal::MAX);

        // each hour fits on its own; only summing them overflows
        let mut ss = SuperSlice::new(at(2015, 3, 10, 0));
        ss.load(vec![hourly(1, 0, &max), hourly(1, 1, &max)]).unwrap();
        assert_eq!(ss.len(), 2);
        assert!(matches!(ss.all(), Err(Error::CostOverflow { .. })));
        assert!(ss.latest().is_ok());
    }

    #[test]
    fn custom_schema_shapes_every_slice() {
        let mut ss = SuperSlice::new(at(2015, 3, 10, 0))
            .schema(vec![MetricKind::DataTransfer, MetricKind::TotalUsage]);
        ss.load(vec![hourly(1, 0, "1"), item(2, "", "", "2")]).unwrap();
        assert_eq!(
            ss.metric_kinds(),
            [MetricKind::DataTransfer, MetricKind::TotalUsage]
        );
        let (_, slice) = ss.slices().next().unwrap();
        assert_eq!(slice.schema(), ss.metric_kinds());
        assert!(slice.metric(MetricKind::InstanceCost).is_none());
        assert_eq!(total(slice), d("1"));
        assert_eq!(ss.non_lineitems()[0].schema(), ss.metric_kinds());

        let day = ss.aggregate(at(2015, 3, 1, 0), at(2015, 3, 2, 0)).unwrap();
        assert_eq!(day.schema(), ss.metric_kinds());
        assert!(matches!(
            ss.add(Slice::new(Some(Interval::new(at(2015, 3, 1, 0), at(2015, 3, 1, 1))))),
            Err(Error::SchemaMismatch { .. })
        ));
    }
}
