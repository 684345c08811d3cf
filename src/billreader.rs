use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::Result;
use crate::record::Record;

/// Streams line items out of a detailed billing report CSV.
///
/// The header row supplies field names. Rows shorter than the header just
/// lack the trailing fields; the metrics report them if they are needed.
pub struct BillReader<R: Read> {
    reader: csv::Reader<R>,
    headers: csv::StringRecord,
    position: usize,
}

impl BillReader<File> {
    pub fn from_path(path: &Path) -> Result<Self> {
        Self::from_reader(File::open(path)?)
    }
}

impl<R: Read> BillReader<R> {
    pub fn from_reader(rdr: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(rdr);
        let headers = reader.headers()?.clone();
        Ok(Self {
            reader,
            headers,
            position: 0,
        })
    }
}

impl<R: Read> Iterator for BillReader<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut row = csv::StringRecord::new();
        match self.reader.read_record(&mut row) {
            Ok(false) => None,
            Ok(true) => {
                self.position += 1;
                Some(Ok(Record::from_pairs(
                    self.position,
                    self.headers.iter().zip(row.iter()),
                )))
            }
            Err(e) => {
                self.position += 1;
                Some(Err(e.into()))
            }
        }
    }
}
