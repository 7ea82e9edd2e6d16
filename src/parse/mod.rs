//! Structured parsing of command output
//!
//! A [`ResponseParser`] turns raw device output into a list of records,
//! each a map from lowercase field name to value. [`extract_field`] then
//! picks the designated field out of the first record.

pub mod inventory;
pub mod keyvalue;

use crate::config::DeviceType;
use crate::error::ParseError;
use std::collections::BTreeMap;
use std::sync::Arc;

pub use inventory::InventoryParser;
pub use keyvalue::KeyValueParser;

/// One parsed element of a response
pub type StructuredRecord = BTreeMap<String, String>;

/// Pure function from raw response to structured records
pub trait ResponseParser: Send + Sync {
    /// Parse raw command output; unrecognised text yields no records
    fn parse(&self, raw: &str) -> Vec<StructuredRecord>;
}

/// Pick `field` from the first record of a parsed response
pub fn extract_field(records: &[StructuredRecord], field: &str) -> Result<String, ParseError> {
    let first = records.first().ok_or(ParseError::NoRecords)?;

    let value = first
        .get(field)
        .ok_or_else(|| ParseError::MissingField {
            field: field.to_string(),
        })?
        .trim();

    if value.is_empty() {
        return Err(ParseError::EmptyField {
            field: field.to_string(),
        });
    }

    Ok(value.to_string())
}

/// Default parser for a device type
pub fn parser_for(device_type: DeviceType) -> Arc<dyn ResponseParser> {
    match device_type {
        DeviceType::Linux => Arc::new(KeyValueParser),
        _ => Arc::new(InventoryParser),
    }
}
