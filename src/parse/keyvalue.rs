//! Parser for `Key: Value` listings
//!
//! Used for hosts whose inventory command prints labelled lines, such as
//! `dmidecode -t system`. Blank lines separate records. Keys are
//! lowercased with runs of non-alphanumerics collapsed to `_`, so
//! `Serial Number` becomes `serial_number`.

use super::{ResponseParser, StructuredRecord};

/// Labelled-line parser
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyValueParser;

fn normalize_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for c in key.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}

impl ResponseParser for KeyValueParser {
    fn parse(&self, raw: &str) -> Vec<StructuredRecord> {
        let mut records = Vec::new();
        let mut current = StructuredRecord::new();

        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() {
                if !current.is_empty() {
                    records.push(std::mem::take(&mut current));
                }
                continue;
            }

            if let Some((key, value)) = line.split_once(':') {
                let key = normalize_key(key);
                if !key.is_empty() {
                    current.entry(key).or_insert_with(|| value.trim().to_string());
                }
            }
        }

        if !current.is_empty() {
            records.push(current);
        }
        records
    }
}
