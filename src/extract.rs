//! Multi-strategy result extraction.
//!
//! Each strategy is an independent routine that collects raw, string-keyed
//! rows from the loaded results area. Strategies run strictly in priority
//! order and the first non-empty output wins; later strategies are never
//! merged in. Rows stay untyped here — conversion into the strict record
//! shape happens immediately at the call site, never further downstream.

use serde_json::Value;
use tracing::{info, warn};

use crate::driver::PageDriver;
use crate::error::ScrapeError;

/// One raw row as collected from the page: string keys, untyped values.
pub type RawRecord = serde_json::Map<String, Value>;

/// Where a strategy's data comes from.
pub enum ExtractionSource {
    /// Script evaluated in the page. Must produce an array of objects, or a
    /// JSON string encoding one — CDP returns large objects by reference, so
    /// scripts typically `JSON.stringify` their result.
    InPage(&'static str),
    /// Rust-side parse of the rendered HTML.
    Document(fn(&str) -> Vec<RawRecord>),
}

/// A named, ordered in-page data-collection routine.
pub struct ExtractionStrategy {
    pub name: &'static str,
    pub source: ExtractionSource,
}

impl ExtractionStrategy {
    fn run(&self, driver: &dyn PageDriver) -> anyhow::Result<Vec<RawRecord>> {
        match &self.source {
            ExtractionSource::InPage(script) => Ok(rows_from_value(driver.evaluate(script)?)),
            ExtractionSource::Document(parse) => Ok(parse(&driver.content()?)),
        }
    }
}

/// Decode an evaluation result into raw rows. Anything that is not an array
/// of objects (including a failed stringify round-trip) yields no rows.
fn rows_from_value(value: Value) -> Vec<RawRecord> {
    let value = match value {
        Value::String(encoded) => serde_json::from_str(&encoded).unwrap_or(Value::Null),
        other => other,
    };
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Run strategies in order; first non-empty output wins.
///
/// A strategy that errors is treated like one that found nothing — the next
/// one still gets its chance. Only after every strategy comes back empty is
/// [`ScrapeError::NoDataExtracted`] returned.
pub fn extract_first(
    driver: &dyn PageDriver,
    strategies: &[ExtractionStrategy],
) -> Result<(Vec<RawRecord>, &'static str), ScrapeError> {
    for strategy in strategies {
        match strategy.run(driver) {
            Ok(rows) if !rows.is_empty() => {
                info!(strategy = strategy.name, rows = rows.len(), "extraction succeeded");
                return Ok((rows, strategy.name));
            }
            Ok(_) => {
                info!(strategy = strategy.name, "extraction strategy found nothing");
            }
            Err(e) => {
                warn!(strategy = strategy.name, "extraction strategy failed: {e}");
            }
        }
    }
    Err(ScrapeError::NoDataExtracted {
        tried: strategies.len(),
    })
}

/// Read a string field from a raw row. Values of any other shape are treated
/// as absent rather than failing the whole row.
pub fn raw_str<'a>(record: &'a RawRecord, key: &str) -> &'a str {
    record.get(key).and_then(Value::as_str).unwrap_or("").trim()
}
