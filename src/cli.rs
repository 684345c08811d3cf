use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;

use costslice::{MetricKind, NaiveTz, WindowLabel};

#[derive(Parser, Debug)]
#[command(
    name = "costslice",
    about = "Time-sliced cost aggregation for cloud billing reports"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Bill CSV file or directory (repeatable; defaults to bill_dir from config)
    #[arg(long, short = 'p', global = true)]
    pub path: Vec<PathBuf>,

    /// Output format: table (default), json
    #[arg(long, global = true, default_value = "table")]
    pub format: OutputFormat,

    /// Reference instant for relative windows (RFC 3339, default: now)
    #[arg(long, global = true)]
    pub now: Option<DateTime<Utc>>,

    /// Keep every line item alongside the aggregates
    #[arg(long, global = true)]
    pub retain: bool,

    /// Zone assumed for timestamps without an offset
    #[arg(long, global = true)]
    pub naive_tz: Option<NaiveTz>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Per-account comparison and monthly totals (default)
    Summary {
        /// Add a service breakdown page per account
        #[arg(long)]
        accounts: bool,
        /// Skip account pages below this latest-day spend
        #[arg(long, default_value = "30")]
        min_account_cost: Decimal,
        /// Fold services below this latest-day spend into "Other"
        #[arg(long, default_value = "15")]
        min_service_cost: Decimal,
    },
    /// One row per stored slice
    Slices,
    /// Filter a metric's cells by dimension patterns (regular expressions)
    Query {
        #[arg(long, default_value = "total-usage")]
        metric: MetricKind,
        /// Named window to query; conflicts with --from/--to
        #[arg(long, conflicts_with_all = ["from", "to"])]
        window: Option<WindowLabel>,
        /// Window start (RFC 3339, default: earliest slice)
        #[arg(long)]
        from: Option<DateTime<Utc>>,
        /// Window end (RFC 3339, default: latest slice)
        #[arg(long)]
        to: Option<DateTime<Utc>>,
        #[arg(long)]
        account: Option<String>,
        #[arg(long)]
        service: Option<String>,
        /// Charge type: usage or onetime (TotalUsage only)
        #[arg(long = "type")]
        charge_type: Option<String>,
        /// InstanceCost only
        #[arg(long)]
        instance_type: Option<String>,
        /// DataTransfer only
        #[arg(long)]
        direction: Option<String>,
    },
    /// Distinct values of each dimension of a metric
    Dimensions {
        #[arg(long, default_value = "total-usage")]
        metric: MetricKind,
        /// Named window (default: everything loaded)
        #[arg(long)]
        window: Option<WindowLabel>,
    },
}

#[derive(ValueEnum, Debug, Clone, PartialEq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl Command {
    /// Dimension filters given on a `query` command, by dimension name.
    pub fn filters(&self) -> Vec<(&'static str, String)> {
        let Command::Query {
            account,
            service,
            charge_type,
            instance_type,
            direction,
            ..
        } = self
        else {
            return Vec::new();
        };
        [
            ("account", account),
            ("service", service),
            ("type", charge_type),
            ("instance_type", instance_type),
            ("direction", direction),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.clone().map(|v| (name, v)))
        .collect()
    }
}

impl Cli {
    pub fn effective_command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Summary {
            accounts: false,
            min_account_cost: Decimal::from(30),
            min_service_cost: Decimal::from(15),
        })
    }
}
