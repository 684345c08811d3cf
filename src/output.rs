use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, CellAlignment, ContentArrangement, Table};
use rust_decimal::Decimal;
use serde::Serialize;

use costslice::metric::{checked_sum, KEY_SEPARATOR};
use costslice::report::{Account, Comparison, ComparisonRow, MonthlyTotals};
use costslice::{MetricKind, SuperSlice};

fn format_cost(cost: Decimal) -> String {
    format!("${:.2}", cost)
}

fn format_comparison(c: &Comparison) -> String {
    match c.ratio.and_then(|r| r.checked_mul(Decimal::ONE_HUNDRED)) {
        Some(pct) => {
            let sign = if pct.is_sign_negative() { "" } else { "+" };
            format!("{} ({sign}{:.1}%)", format_cost(c.prior), pct)
        }
        None => format!("{} (N/A)", format_cost(c.prior)),
    }
}

fn money_cell(cost: Decimal) -> Cell {
    Cell::new(format_cost(cost)).set_alignment(CellAlignment::Right)
}

fn new_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn comparison_table(first_column: &str, rows: &[ComparisonRow]) -> Result<Table> {
    let mut table = new_table();
    table.set_header(vec![
        Cell::new(first_column),
        Cell::new("Latest"),
        Cell::new("1 Day Ago"),
        Cell::new("1 Week Ago"),
        Cell::new("1 Month Ago"),
    ]);

    let mut totals = ComparisonRow::new("TOTAL");
    for row in rows {
        table.add_row(comparison_cells(row)?);
        totals.accumulate(row)?;
    }
    table.add_row(comparison_cells(&totals)?);
    Ok(table)
}

fn comparison_cells(row: &ComparisonRow) -> Result<Vec<Cell>> {
    let mut cells = vec![Cell::new(&row.label), money_cell(row.current)];
    cells.extend(
        row.comparisons()?
            .iter()
            .map(|c| Cell::new(format_comparison(c)).set_alignment(CellAlignment::Right)),
    );
    Ok(cells)
}

fn monthly_table(totals: &MonthlyTotals) -> Table {
    let mut table = new_table();
    table.set_header(vec![
        Cell::new("Month So Far"),
        Cell::new("Last Month To Date"),
        Cell::new("Last Month"),
        Cell::new("Estimate"),
    ]);
    table.add_row(vec![
        money_cell(totals.month_so_far),
        money_cell(totals.last_month_to_date),
        money_cell(totals.last_month),
        totals
            .estimate
            .map_or_else(|| Cell::new("N/A"), money_cell),
    ]);
    table
}

pub fn print_summary(rows: &[ComparisonRow], totals: &MonthlyTotals) -> Result<()> {
    println!("{}", comparison_table("Account", rows)?);
    println!("{}", monthly_table(totals));
    Ok(())
}

pub fn print_account(
    account: &Account,
    rows: &[ComparisonRow],
    totals: &MonthlyTotals,
) -> Result<()> {
    println!();
    println!("{} ({})", account.name, account.id);
    println!("{}", comparison_table("Service", rows)?);
    println!("{}", monthly_table(totals));
    Ok(())
}

fn slices_table(superslice: &SuperSlice) -> Result<Table> {
    let kinds = superslice.metric_kinds();

    let mut table = new_table();
    let mut header = vec![Cell::new("Interval")];
    header.extend(kinds.iter().map(|k| Cell::new(k.name())));
    table.set_header(header);

    for (key, slice) in superslice.slices() {
        let mut row = vec![Cell::new(key)];
        for kind in kinds {
            let total = match slice.metric(*kind) {
                Some(m) => m.total()?,
                None => Decimal::ZERO,
            };
            row.push(money_cell(total));
        }
        table.add_row(row);
    }
    Ok(table)
}

pub fn print_slices(superslice: &SuperSlice) -> Result<()> {
    println!("{}", slices_table(superslice)?);

    let undated = superslice.non_lineitems().len();
    if undated > 0 {
        eprintln!("{undated} line items had no usage period and are not in any slice.");
    }
    Ok(())
}

pub fn print_cells(kind: MetricKind, cells: &BTreeMap<String, Decimal>) -> Result<()> {
    let mut table = new_table();
    let mut header: Vec<Cell> = kind.dimension_names().map(Cell::new).collect();
    header.push(Cell::new("Cost"));
    table.set_header(header);

    for (key, cost) in cells {
        let mut row: Vec<Cell> = key.split(KEY_SEPARATOR).map(Cell::new).collect();
        row.push(money_cell(*cost));
        table.add_row(row);
    }

    let mut total_row: Vec<Cell> = kind.dimension_names().map(|_| Cell::new("")).collect();
    total_row[0] = Cell::new("TOTAL");
    total_row.push(money_cell(checked_sum(cells.values().copied(), "query")?));
    table.add_row(total_row);

    println!("{table}");
    Ok(())
}

pub fn print_dimensions(dimensions: &BTreeMap<&'static str, BTreeSet<String>>) {
    let mut table = new_table();
    table.set_header(vec![Cell::new("Dimension"), Cell::new("Values")]);
    for (name, values) in dimensions {
        let values: Vec<&str> = values.iter().map(String::as_str).collect();
        table.add_row(vec![Cell::new(name), Cell::new(values.join(", "))]);
    }
    println!("{table}");
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("JSON serialization failed")?;
    println!("{json}");
    Ok(())
}
