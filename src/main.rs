mod cli;
mod output;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command, OutputFormat};
use costslice::config::{self, Config};
use costslice::ingest::{self, LoadOptions};
use costslice::report::{AccountCollection, ComparisonRow, MonthlyTotals, ALL_ACCOUNTS};
use costslice::{Slice, SuperSlice};

#[derive(Serialize)]
struct AccountPage<'a> {
    id: &'a str,
    name: &'a str,
    services: Vec<ComparisonRow>,
    monthly: MonthlyTotals,
}

#[derive(Serialize)]
struct Summary<'a> {
    now: chrono::DateTime<Utc>,
    accounts: Vec<ComparisonRow>,
    monthly: MonthlyTotals,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pages: Vec<AccountPage<'a>>,
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_options(cli: &Cli, config: &Config) -> LoadOptions {
    let mut options = LoadOptions::new(cli.now.unwrap_or_else(Utc::now));
    options.retain_lineitems = cli.retain || config.retain_lineitems.unwrap_or(false);
    options.naive_tz = cli
        .naive_tz
        .or(config.naive_timezone)
        .unwrap_or_default();
    options
}

fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let mode = cli.effective_command();
    let config = config::load_config();

    let roots = if cli.path.is_empty() {
        match &config.bill_dir {
            Some(dir) => vec![dir.clone()],
            None => bail!(
                "no bill paths given; pass --path or set bill_dir in {}",
                config::config_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "the config file".to_string())
            ),
        }
    } else {
        cli.path.clone()
    };

    let files = ingest::discover_bill_files(&roots);
    if files.is_empty() {
        eprintln!("No bill files found.");
        return Ok(());
    }
    eprintln!("Loading {} bill files...", files.len());

    let options = load_options(&cli, &config);
    let superslice = ingest::load_files(&files, &options).context("failed to load bills")?;

    if superslice.is_empty() && superslice.non_lineitems().is_empty() {
        eprintln!("No billing records found.");
        return Ok(());
    }
    eprintln!("Found {} billing intervals.", superslice.len());

    match mode {
        Command::Summary {
            accounts,
            min_account_cost,
            min_service_cost,
        } => {
            let collection = AccountCollection::build(&superslice, &config.account_names())
                .context("failed to evaluate windows")?;
            let rows = collection.summary_rows()?;
            let Some(all) = collection.account(ALL_ACCOUNTS) else {
                bail!("no aggregate account");
            };
            let monthly = MonthlyTotals::compute(all, collection.now())?;

            let mut pages = Vec::new();
            if accounts {
                for account in collection.detailed_accounts(min_account_cost)? {
                    pages.push(AccountPage {
                        id: &account.id,
                        name: &account.name,
                        services: account.service_rows(min_service_cost)?,
                        monthly: MonthlyTotals::compute(account, collection.now())?,
                    });
                }
            }

            match cli.format {
                OutputFormat::Json => output::print_json(&Summary {
                    now: collection.now(),
                    accounts: rows,
                    monthly,
                    pages,
                })?,
                OutputFormat::Table => {
                    output::print_summary(&rows, &monthly)?;
                    for page in &pages {
                        if let Some(account) = collection.account(page.id) {
                            output::print_account(account, &page.services, &page.monthly)?;
                        }
                    }
                }
            }
        }
        Command::Slices => match cli.format {
            OutputFormat::Json => {
                let slices: Vec<&Slice> = superslice.slices().map(|(_, s)| s).collect();
                output::print_json(&slices)?;
            }
            OutputFormat::Table => output::print_slices(&superslice)?,
        },
        Command::Query {
            metric,
            window,
            from,
            to,
            ..
        } => {
            let slice = select(&superslice, window, from, to)?;
            let Some(m) = slice.metric(metric) else {
                bail!("{metric} is not part of the loaded schema");
            };
            let cells = m.query(mode.filters())?;
            match cli.format {
                OutputFormat::Json => output::print_json(&cells)?,
                OutputFormat::Table => output::print_cells(metric, &cells)?,
            }
        }
        Command::Dimensions { metric, window } => {
            let slice = select(&superslice, window, None, None)?;
            let Some(m) = slice.metric(metric) else {
                bail!("{metric} is not part of the loaded schema");
            };
            let dimensions = m.dimensions();
            match cli.format {
                OutputFormat::Json => output::print_json(&dimensions)?,
                OutputFormat::Table => output::print_dimensions(&dimensions),
            }
        }
    }

    Ok(())
}

/// Aggregate a named window, or an explicit range whose open ends default
/// to the loaded bounds.
fn select(
    superslice: &SuperSlice,
    window: Option<costslice::WindowLabel>,
    from: Option<chrono::DateTime<Utc>>,
    to: Option<chrono::DateTime<Utc>>,
) -> Result<Slice> {
    if let Some(label) = window {
        return Ok(superslice.window(label)?);
    }
    let Some(bounds) = superslice.bounds() else {
        bail!("no dated line items loaded");
    };
    Ok(superslice.aggregate(from.unwrap_or(bounds.start), to.unwrap_or(bounds.end))?)
}
