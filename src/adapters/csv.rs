//! CSV export of prediction records.
//!
//! Header is the table's column list; fields are quoted only when they
//! contain a delimiter, quote or line break, with embedded quotes doubled.

use std::io::{self, Write};

use super::sqlite::COLUMNS;
use crate::domain::PredictionRecord;

fn write_field<W: Write>(out: &mut W, field: &str) -> io::Result<()> {
    if field.contains([',', '"', '\n', '\r']) {
        write!(out, "\"{}\"", field.replace('"', "\"\""))
    } else {
        out.write_all(field.as_bytes())
    }
}

fn write_row<W: Write>(out: &mut W, fields: &[String]) -> io::Result<()> {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.write_all(b",")?;
        }
        write_field(out, field)?;
    }
    out.write_all(b"\n")
}

/// Write a header row and one row per record.
///
/// # Errors
/// Returns any error from the underlying writer.
pub fn write_records<W: Write>(mut out: W, records: &[PredictionRecord]) -> io::Result<()> {
    let header: Vec<String> = COLUMNS.iter().map(|c| (*c).to_string()).collect();
    write_row(&mut out, &header)?;

    for r in records {
        write_row(
            &mut out,
            &[
                r.id.to_string(),
                r.age.to_string(),
                r.sex.to_string(),
                r.bmi.to_string(),
                r.children.to_string(),
                r.smoker.to_string(),
                r.region.to_string(),
                format!("{:.2}", r.predicted_cost),
                r.date_time.clone(),
            ],
        )?;
    }
    out.flush()
}

/// Render records as a CSV document.
///
/// # Errors
/// Returns an error if a record renders to invalid UTF-8.
pub fn to_csv_string(records: &[PredictionRecord]) -> io::Result<String> {
    let mut buf = Vec::new();
    write_records(&mut buf, records)?;
    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
