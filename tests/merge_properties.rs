use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;

use costslice::record::{
    LINKED_ACCOUNT_ID, PRODUCT_NAME, UNBLENDED_COST, USAGE_END_DATE, USAGE_START_DATE, USAGE_TYPE,
};
use costslice::{Metric, MetricKind, Record, Result, SuperSlice};

const ACCOUNTS: &[&str] = &["012345678901", "234567890123", "345678901234"];
const PRODUCTS: &[&str] = &[
    "Amazon Elastic Compute Cloud",
    "Amazon Simple Queue Service",
    "Amazon DynamoDB",
    "Amazon CloudFront",
];
const USAGE_TYPES: &[&str] = &[
    "BoxUsage",
    "BoxUsage:m3.large",
    "DataTransfer-Out-Bytes",
    "DataTransfer-In-Bytes",
    "Requests-Tier1",
];

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2015, 3, 1, 0, 0, 0).unwrap()
}

#[derive(Debug, Clone)]
struct Item {
    account: usize,
    product: usize,
    usage_type: usize,
    hour: i64,
    cost: i64,
}

impl Item {
    fn cost(&self) -> Decimal {
        Decimal::new(self.cost, 4)
    }

    fn record(&self, position: usize) -> Record {
        let start = base() + Duration::hours(self.hour);
        let end = start + Duration::hours(1);
        Record::new(position)
            .with(LINKED_ACCOUNT_ID, ACCOUNTS[self.account])
            .with(PRODUCT_NAME, PRODUCTS[self.product])
            .with(USAGE_TYPE, USAGE_TYPES[self.usage_type])
            .with(UNBLENDED_COST, self.cost().to_string())
            .with(USAGE_START_DATE, start.format("%Y-%m-%d %H:%M:%S").to_string())
            .with(USAGE_END_DATE, end.format("%Y-%m-%d %H:%M:%S").to_string())
    }
}

fn item() -> impl Strategy<Value = Item> {
    (
        0..ACCOUNTS.len(),
        0..PRODUCTS.len(),
        0..USAGE_TYPES.len(),
        0i64..48,
        -1_000_000i64..1_000_000,
    )
        .prop_map(|(account, product, usage_type, hour, cost)| Item {
            account,
            product,
            usage_type,
            hour,
            cost,
        })
}

fn records(items: &[Item]) -> Vec<Result<Record>> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| Ok(item.record(i + 1)))
        .collect()
}

fn metric(kind: MetricKind, items: &[Item]) -> Metric {
    let mut m = Metric::new(kind);
    for (i, item) in items.iter().enumerate() {
        m.add(&item.record(i + 1)).unwrap();
    }
    m
}

fn superslice(items: &[Item]) -> SuperSlice {
    let mut ss = SuperSlice::new(base() + Duration::days(3));
    ss.load(records(items)).unwrap();
    ss
}

proptest! {
    #[test]
    fn merge_is_commutative(
        a in prop::collection::vec(item(), 0..30),
        b in prop::collection::vec(item(), 0..30),
    ) {
        for kind in MetricKind::ALL {
            let mut ab = metric(kind, &a);
            ab.merge(&metric(kind, &b)).unwrap();
            let mut ba = metric(kind, &b);
            ba.merge(&metric(kind, &a)).unwrap();
            prop_assert_eq!(ab, ba);
        }
    }

    #[test]
    fn merging_empty_is_identity(a in prop::collection::vec(item(), 0..30)) {
        let original = metric(MetricKind::TotalUsage, &a);
        let mut merged = original.clone();
        merged.merge(&Metric::new(MetricKind::TotalUsage)).unwrap();
        prop_assert_eq!(merged, original);
    }

    #[test]
    fn merge_matches_adding_everything(
        a in prop::collection::vec(item(), 0..30),
        b in prop::collection::vec(item(), 0..30),
    ) {
        let mut merged = metric(MetricKind::TotalUsage, &a);
        merged.merge(&metric(MetricKind::TotalUsage, &b)).unwrap();
        let all: Vec<Item> = a.iter().chain(b.iter()).cloned().collect();
        prop_assert_eq!(merged, metric(MetricKind::TotalUsage, &all));
    }

    #[test]
    fn total_usage_sees_every_cost(items in prop::collection::vec(item(), 1..40)) {
        let ss = superslice(&items);
        let expected: Decimal = items.iter().map(Item::cost).sum();
        let all = ss.all().unwrap().unwrap();
        prop_assert_eq!(all.metric(MetricKind::TotalUsage).unwrap().total().unwrap(), expected);
    }

    #[test]
    fn load_order_does_not_matter(items in prop::collection::vec(item(), 0..40)) {
        let forward = superslice(&items);
        let reversed: Vec<Item> = items.iter().rev().cloned().collect();
        let backward = superslice(&reversed);

        prop_assert_eq!(forward.len(), backward.len());
        for ((ka, a), (kb, b)) in forward.slices().zip(backward.slices()) {
            prop_assert_eq!(ka, kb);
            prop_assert_eq!(a.metrics(), b.metrics());
        }
    }

    #[test]
    fn aggregate_is_additive_over_disjoint_windows(
        items in prop::collection::vec(item(), 0..40),
        split in 0i64..=48,
    ) {
        let ss = superslice(&items);
        let start = base();
        let middle = base() + Duration::hours(split);
        let end = base() + Duration::hours(48);

        let mut halves = ss.aggregate(start, middle).unwrap();
        halves.merge(&ss.aggregate(middle, end).unwrap()).unwrap();
        let whole = ss.aggregate(start, end).unwrap();
        prop_assert_eq!(halves.metrics(), whole.metrics());
    }
}
