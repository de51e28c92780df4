use std::io::{BufRead, BufReader};

use chrono::{Datelike, NaiveDate, TimeZone, Utc};
use lazy_static::lazy_static;
use log::debug;
use regex::{Captures, Regex};

use crate::containers::schema::AttributeKind;
use crate::containers::{AttributeContainer, AttributeValue, ContainerSchema};
use crate::parsers::{Parser, ParserContext, ParserError};
use crate::sources::SourceFile;

pub const WIFI_LOG_LINE: &str = "mac:wifilog:line";

/// Lines between abort checks
const ABORT_CHECK_INTERVAL: usize = 1000;

/// Bytes of the first line inspected by the signature check
const HEADER_PROBE_LENGTH: usize = 256;

lazy_static! {
    static ref WIFI_HEADER: Regex =
        Regex::new(r"^\w{3}\s+\w{3}\s+\d{1,2}\s+\d{2}:\d{2}:\d{2}\.\d{3}\s+\*\*\*Starting Up\*\*\*").unwrap();

    static ref WIFI_LINE: Regex = Regex::new(
        r"^\w{3}\s+(?P<month>\w{3})\s+(?P<day>\d{1,2})\s+(?P<hour>\d{2}):(?P<minute>\d{2}):(?P<second>\d{2})\.(?P<millisecond>\d{3})\s+<(?P<agent>[^>]*)>\s*(?P<function>[^:]*):\s*(?P<text>.*)$"
    ).unwrap();

    static ref RE_CONNECTED: Regex = Regex::new(r"^Already\sassociated\sto\s(.*)\.\sBailing").unwrap();

    static ref RE_WIFI_PARAMETERS: Regex =
        Regex::new(r"\[ssid=(.*?), bssid=(.*?), security=(.*?), rssi=").unwrap();
}

fn month_number(name: &str) -> Option<u32> {
    let month = match name.to_ascii_lowercase().as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// Human readable summary of well known airportd actions
fn known_action(agent: &str, function: &str, text: &str) -> String {
    if !agent.starts_with("airportd") {
        return text.to_string();
    }

    if function.contains("airportdProcessDLILEvent") {
        let interface = text.split_whitespace().next().unwrap_or_default();
        return format!("Interface {} turn up.", interface);
    }

    if function.contains("doAutoJoin") {
        let ssid = RE_CONNECTED
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| strip_quotes(m.as_str()))
            .unwrap_or_else(|| "Unknown".to_string());
        return format!("Wifi connected to SSID {}", ssid);
    }

    if function.contains("processSystemPSKAssoc") {
        if let Some(parameters) = RE_WIFI_PARAMETERS.captures(text) {
            let value = |index: usize| match parameters.get(index).map(|m| m.as_str()) {
                Some(v) if !v.is_empty() => v.to_string(),
                _ => "Unknown".to_string(),
            };
            return format!(
                "New wifi configured. BSSID: {}, SSID: {}, Security: {}.",
                value(2),
                value(1),
                value(3)
            );
        }
    }

    text.to_string()
}

/// Drop the first and last character, the quotes around an SSID
fn strip_quotes(value: &str) -> String {
    let mut chars = value.chars();
    chars.next();
    chars.next_back();
    chars.as_str().to_string()
}

/// Parser for the Mac OS X `wifi.log` text file.
///
/// Lines carry month and day only. The year comes from the preprocess
/// object, else from the earliest known timestamp of the file, else the
/// current year, and is incremented whenever the month goes backwards.
pub struct MacWifiLogParser;

impl MacWifiLogParser {
    pub fn new() -> Self {
        Self
    }

    fn initial_year(context: &ParserContext<'_>, file: &SourceFile) -> i32 {
        if let Some(year) = context.preprocess.year {
            return year;
        }
        match file.stat().earliest_known_time() {
            Some(time) => time.year(),
            None => {
                debug!(
                    "Unable to determine the year of {}, using the current year",
                    file.display_name()
                );
                Utc::now().year()
            }
        }
    }
}

impl Default for MacWifiLogParser {
    fn default() -> Self {
        Self::new()
    }
}

struct YearTracker {
    year: i32,
    last_month: Option<u32>,
}

impl YearTracker {
    /// Year of a line in `month`, rolling over when the month goes backwards
    fn year_for(&mut self, month: u32) -> i32 {
        let last_month = *self.last_month.get_or_insert(month);
        if month < last_month {
            self.year += 1;
        }
        self.year
    }

    fn accept(&mut self, month: u32) {
        self.last_month = Some(month);
    }
}

fn parse_number<T: std::str::FromStr>(captures: &Captures<'_>, name: &str) -> Option<T> {
    captures.name(name)?.as_str().parse().ok()
}

impl Parser for MacWifiLogParser {
    fn name(&self) -> &'static str {
        "macwifi"
    }

    fn description(&self) -> &'static str {
        "Mac OS X wifi.log lines"
    }

    fn container_schemas(&self) -> Vec<ContainerSchema> {
        vec![ContainerSchema::event(WIFI_LOG_LINE)
            .attribute("agent", AttributeKind::String)
            .attribute("function", AttributeKind::String)
            .attribute("text", AttributeKind::String)
            .attribute("action", AttributeKind::String)]
    }

    fn supports(&self, file: &SourceFile) -> bool {
        match file.first_line(HEADER_PROBE_LENGTH) {
            Ok(Some(line)) => WIFI_HEADER.is_match(&line),
            _ => false,
        }
    }

    fn extract(&self, context: &ParserContext<'_>, file: &SourceFile) -> Result<Vec<AttributeContainer>, ParserError> {
        let location = file.display_name();
        let source = file.descriptor().to_string();
        let mut reader = BufReader::new(file.open()?);
        let mut years = YearTracker {
            year: Self::initial_year(context, file),
            last_month: None,
        };

        let mut containers = Vec::new();
        let mut buffer = Vec::new();
        let mut line_number = 0usize;

        loop {
            buffer.clear();
            let read = reader.read_until(b'\n', &mut buffer).map_err(|e| ParserError::Io {
                location: location.clone(),
                source: e,
            })?;
            if read == 0 {
                break;
            }
            line_number += 1;
            if line_number % ABORT_CHECK_INTERVAL == 0 && context.is_aborted() {
                return Err(ParserError::Aborted);
            }

            let line = String::from_utf8_lossy(&buffer);
            let line = line.trim_end_matches(['\r', '\n']);
            if WIFI_HEADER.is_match(line) {
                continue;
            }
            let captures = match WIFI_LINE.captures(line) {
                Some(captures) => captures,
                None => {
                    debug!("{}:{} is not a wifi.log line", location, line_number);
                    continue;
                }
            };

            let month = match captures.name("month").and_then(|m| month_number(m.as_str())) {
                Some(month) => month,
                None => {
                    debug!("{}:{} has an unknown month", location, line_number);
                    continue;
                }
            };
            let year = years.year_for(month);

            let timestamp = parse_number::<u32>(&captures, "day")
                .zip(parse_number::<u32>(&captures, "hour"))
                .zip(parse_number::<u32>(&captures, "minute"))
                .zip(parse_number::<u32>(&captures, "second"))
                .zip(parse_number::<u32>(&captures, "millisecond"))
                .and_then(|((((day, hour), minute), second), millisecond)| {
                    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_micro_opt(
                        hour,
                        minute,
                        second,
                        millisecond * 1000,
                    )
                })
                .map(|naive| Utc.from_utc_datetime(&naive));
            let timestamp = match timestamp {
                Some(timestamp) => timestamp,
                None => {
                    debug!("{}:{} has an invalid timestamp", location, line_number);
                    continue;
                }
            };
            years.accept(month);

            let agent = captures.name("agent").map_or("", |m| m.as_str());
            let function = captures.name("function").map_or("", |m| m.as_str().trim());
            let text = captures.name("text").map_or("", |m| m.as_str().trim_end());
            let action = known_action(agent, function, text);

            containers.push(
                AttributeContainer::new(context.registry, WIFI_LOG_LINE)?
                    .with("timestamp", AttributeValue::timestamp(timestamp))
                    .with("timestamp_desc", AttributeValue::string("Added Time"))
                    .with("parser", AttributeValue::string(self.name()))
                    .with("source", AttributeValue::string(source.as_str()))
                    .with("agent", AttributeValue::string(agent))
                    .with("function", AttributeValue::string(function))
                    .with("text", AttributeValue::string(text))
                    .with("action", AttributeValue::String(action)),
            );
        }

        debug!("macwifi produced {} events for {}", containers.len(), location);
        Ok(containers)
    }
}
