//! Parser for `show inventory` output
//!
//! Cisco platforms print one stanza per component:
//!
//! ```text
//! Name: "Chassis", DESCR: "ASA 5516-X with FirePOWER services, 8GE, AC, DES"
//! PID: ASA5516           , VID: V05     , SN: JAD12345678
//! ```
//!
//! Each `PID` line closes a record carrying the most recent `NAME`/`DESCR`.
//! Keys are `name`, `descr`, `pid`, `vid` and `sn`. Prompts, echoed
//! commands and banners around the stanzas are ignored.

use super::{ResponseParser, StructuredRecord};
use regex::Regex;
use std::sync::LazyLock;

static NAME_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^\s*NAME:\s*"(?P<name>[^"]*)"\s*,\s*DESCR:\s*"(?P<descr>[^"]*)""#)
        .expect("Invalid NAME line regex")
});

static PID_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*PID:\s*(?P<pid>[^,]*?)\s*,\s*VID:\s*(?P<vid>[^,]*?)\s*,\s*SN:\s*(?P<sn>\S*)\s*$",
    )
    .expect("Invalid PID line regex")
});

/// `show inventory` parser
#[derive(Debug, Default, Clone, Copy)]
pub struct InventoryParser;

impl ResponseParser for InventoryParser {
    fn parse(&self, raw: &str) -> Vec<StructuredRecord> {
        let mut records = Vec::new();
        let mut name = String::new();
        let mut descr = String::new();

        for line in raw.lines() {
            let line = line.trim_end_matches('\r');

            if let Some(caps) = NAME_LINE.captures(line) {
                name = caps["name"].trim().to_string();
                descr = caps["descr"].trim().to_string();
                continue;
            }

            if let Some(caps) = PID_LINE.captures(line) {
                let mut record = StructuredRecord::new();
                record.insert("name".into(), std::mem::take(&mut name));
                record.insert("descr".into(), std::mem::take(&mut descr));
                record.insert("pid".into(), caps["pid"].trim().to_string());
                record.insert("vid".into(), caps["vid"].trim().to_string());
                record.insert("sn".into(), caps["sn"].trim().to_string());
                records.push(record);
            }
        }

        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ASA_OUTPUT: &str = "\
fw01# terminal pager 0
fw01# show inventory
Name: \"Chassis\", DESCR: \"ASA 5516-X with FirePOWER services, 8GE, AC, DES\"
PID: ASA5516           , VID: V05     , SN: JAD12345678

Name: \"Storage Device 1\", DESCR: \"ASA 5516-X SSD\"
PID: N/A               , VID: N/A     , SN: MSA1234567A
fw01# exit
";

    #[test]
    fn test_parse_asa_inventory() {
        let records = InventoryParser.parse(ASA_OUTPUT);
        assert_eq!(records.len(), 2);

        let chassis = &records[0];
        assert_eq!(chassis["name"], "Chassis");
        assert_eq!(chassis["descr"], "ASA 5516-X with FirePOWER services, 8GE, AC, DES");
        assert_eq!(chassis["pid"], "ASA5516");
        assert_eq!(chassis["vid"], "V05");
        assert_eq!(chassis["sn"], "JAD12345678");

        assert_eq!(records[1]["name"], "Storage Device 1");
        assert_eq!(records[1]["sn"], "MSA1234567A");
    }

    #[test]
    fn test_pid_line_without_name() {
        let records = InventoryParser.parse("PID: WS-C3850-24T , VID: V02 , SN: FOC1111X0AB\r\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["name"], "");
        assert_eq!(records[0]["sn"], "FOC1111X0AB");
    }

    #[test]
    fn test_blank_serial_is_kept_empty() {
        let records = InventoryParser.parse("NAME: \"Fan\", DESCR: \"Fan tray\"\nPID: FAN , VID: , SN:\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["sn"], "");
        assert_eq!(records[0]["vid"], "");
    }

    #[test]
    fn test_unrecognised_output() {
        assert!(InventoryParser.parse("% Invalid input detected at '^' marker.").is_empty());
        assert!(InventoryParser.parse("").is_empty());
    }
}
