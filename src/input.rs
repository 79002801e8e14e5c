use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim};
use log::{debug, info};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::usage::{RawUsageRow, DATE_TIME, KWH};

pub fn load_tariff(path: &Path) -> Result<Value> {
    info!("load_tariff: loading JSON file {}", path.display());
    let file = File::open(path).with_context(|| format!("cannot open tariff file {}", path.display()))?;
    let tariff: Value = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("tariff file {} is not valid JSON", path.display()))?;
    debug!("load_tariff: {}", tariff);
    Ok(tariff)
}

/// Read raw usage rows from a `.json` array of records, or otherwise from CSV with a header row.
pub fn load_usage(path: &Path) -> Result<Vec<RawUsageRow>> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => load_usage_json(path),
        _ => load_usage_csv(path),
    }
}

// Absent columns leave the field empty; the normalizer reports it against the row
fn load_usage_csv(path: &Path) -> Result<Vec<RawUsageRow>> {
    info!("load_usage: loading CSV file {}", path.display());
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_path(path)
        .with_context(|| format!("cannot open usage file {}", path.display()))?;

    let headers = reader.headers()?.clone();
    let column = |name: &str| headers.iter().position(|h| h == name);
    let (date_time_col, kwh_col) = (column(DATE_TIME), column(KWH));
    debug!("load_usage: headers {:?}, {} at {:?}, {} at {:?}", headers, DATE_TIME, date_time_col, KWH, kwh_col);

    reader
        .records()
        .enumerate()
        .map(|(i, record)| -> Result<RawUsageRow> {
            let r = record.with_context(|| format!("usage file {} line {}", path.display(), i + 2))?;
            debug!("load_usage: record: {:?}", r);
            let field = |col: Option<usize>| col.and_then(|c| r.get(c)).map(str::to_string);
            Ok(RawUsageRow {
                date_time: field(date_time_col),
                kwh: field(kwh_col),
            })
        })
        .collect() // 1st error, or the vector
}

fn text_field(record: &Map<String, Value>, name: &str) -> Option<String> {
    match record.get(name)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn load_usage_json(path: &Path) -> Result<Vec<RawUsageRow>> {
    info!("load_usage: loading JSON file {}", path.display());
    let file = File::open(path).with_context(|| format!("cannot open usage file {}", path.display()))?;
    let records: Vec<Map<String, Value>> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("usage file {} is not a JSON array of records", path.display()))?;

    Ok(records
        .iter()
        .map(|record| {
            debug!("load_usage: record: {:?}", record);
            RawUsageRow {
                date_time: text_field(record, DATE_TIME),
                kwh: text_field(record, KWH),
            }
        })
        .collect())
}
