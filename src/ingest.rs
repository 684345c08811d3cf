use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::billreader::BillReader;
use crate::error::Result;
use crate::superslice::{LoadStats, SuperSlice};
use crate::timestamp::NaiveTz;

pub const BILL_EXTENSION: &str = "csv";

/// Settings shared by every SuperSlice built for one run.
#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    pub now: DateTime<Utc>,
    pub retain_lineitems: bool,
    pub naive_tz: NaiveTz,
}

impl LoadOptions {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            retain_lineitems: false,
            naive_tz: NaiveTz::default(),
        }
    }

    pub fn superslice(&self) -> SuperSlice {
        SuperSlice::new(self.now)
            .retain_lineitems(self.retain_lineitems)
            .naive_timezone(self.naive_tz)
    }
}

/// Expand the given paths into bill files: files are taken as-is,
/// directories are walked for `*.csv`. Result is sorted and deduplicated.
pub fn discover_bill_files(roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for root in roots {
        if root.is_file() {
            files.push(root.clone());
            continue;
        }
        if !root.exists() {
            warn!(path = %root.display(), "bill path does not exist, skipping");
            continue;
        }
        for entry in WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .is_some_and(|ext| ext == BILL_EXTENSION)
            {
                files.push(entry.into_path());
            }
        }
    }

    files.sort();
    files.dedup();
    files
}

/// Load one bill file into a fresh SuperSlice.
pub fn load_file(path: &Path, options: &LoadOptions) -> Result<(SuperSlice, LoadStats)> {
    let mut ss = options.superslice();
    let stats = BillReader::from_path(path)
        .and_then(|reader| ss.load(reader))
        .map_err(|e| e.in_file(path))?;
    Ok((ss, stats))
}

/// Load every file into its own SuperSlice in parallel, then fold them
/// together in path order.
pub fn load_files(files: &[PathBuf], options: &LoadOptions) -> Result<SuperSlice> {
    let results: Vec<_> = files
        .par_iter()
        .map(|path| (path, load_file(path, options)))
        .collect();

    let mut combined = options.superslice();
    for (path, result) in results {
        let (ss, stats) = result?;
        info!(
            path = %path.display(),
            records = stats.records,
            buckets = ss.len(),
            non_lineitems = stats.non_lineitems,
            "loaded bill file"
        );
        combined.absorb(ss)?;
    }
    Ok(combined)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::TimeZone;

    use super::*;
    use crate::error::Error;

    const HEADER: &str = "LinkedAccountId,ProductName,UsageType,UnBlendedCost,UsageStartDate,UsageEndDate\n";

    fn write(path: &Path, rows: &[&str]) {
        let mut body = HEADER.to_string();
        for row in rows {
            body.push_str(row);
            body.push('\n');
        }
        fs::write(path, body).unwrap();
    }

    fn options() -> LoadOptions {
        LoadOptions::new(Utc.with_ymd_and_hms(2015, 3, 10, 0, 0, 0).unwrap())
    }

    #[test]
    fn discovers_csv_files_recursively() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("2015-03")).unwrap();
        fs::write(dir.path().join("2015-03").join("a.csv"), "").unwrap();
        fs::write(dir.path().join("b.csv"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        let single = dir.path().join("b.csv");

        let files = discover_bill_files(&[
            dir.path().to_path_buf(),
            single.clone(),
            dir.path().join("missing"),
        ]);
        assert_eq!(files.len(), 2);
        assert!(files.contains(&single));
        assert!(files.iter().all(|f| f.extension().unwrap() == "csv"));
    }

    #[test]
    fn files_merge_into_one_superslice() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.csv");
        let b = dir.path().join("b.csv");
        write(
            &a,
            &["111,Amazon SimpleDB,Requests,1.5,2015-03-01 00:00:00,2015-03-01 01:00:00"],
        );
        write(
            &b,
            &[
                "222,Amazon SimpleDB,Requests,2.5,2015-03-01 00:00:00,2015-03-01 01:00:00",
                "222,Amazon SimpleDB,Requests,1,2015-03-02 00:00:00,2015-03-02 01:00:00",
            ],
        );

        let ss = load_files(&[a, b], &options()).unwrap();
        assert_eq!(ss.len(), 2);
        let total = ss.all().unwrap().unwrap();
        let metric = total.metric(crate::metric::MetricKind::TotalUsage).unwrap();
        assert_eq!(metric.len(), 2);
        assert_eq!(metric.total().unwrap(), rust_decimal::Decimal::from(5));
    }

    #[test]
    fn errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.csv");
        write(
            &bad,
            &["111,Amazon SimpleDB,Requests,abc,2015-03-01 00:00:00,2015-03-01 01:00:00"],
        );
        let err = load_files(&[bad.clone()], &options()).unwrap_err();
        match &err {
            Error::File { path, source } => {
                assert_eq!(path, &bad);
                assert!(matches!(**source, Error::Record { position: 1, .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(err.root(), Error::MalformedCost { .. }));
    }
}
