// File: wlroot-ingest/src/lib.rs
//! Whitelist CSV ingestion.
//!
//! Each record is `address,onboardingTime`. The onboarding time is either epoch
//! seconds, a calendar date (midnight UTC) or an RFC 3339 date-time. Header rows
//! may appear anywhere and are skipped.
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::{fs::File, io::Read, path::Path};
use thiserror::Error;
use tracing::debug;
use wlroot_leaf::{Address, EncodingError, Entry};

pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

const HEADER_FIELDS: [&str; 2] = ["address", "onboardingTime"];
const RECORD_FIELDS: usize = 2;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimeParseError {
    #[error("empty value")]
    Empty,
    #[error("{value:?} matches neither {format:?} nor RFC 3339")]
    Unrecognized { value: String, format: String },
    #[error("{0} is before the Unix epoch")]
    BeforeEpoch(i64),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to open whitelist: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("record {record}: expected {expected} fields, found {found}")]
    FieldCount { record: usize, expected: usize, found: usize },
    #[error("record {record}: missing {field} field")]
    MissingField { record: usize, field: &'static str },
    #[error("record {record}: invalid onboarding time: {source}")]
    Time { record: usize, #[source] source: TimeParseError },
    #[error("record {record}: {source}")]
    Encoding { record: usize, #[source] source: EncodingError },
}

#[derive(Clone, Debug)]
pub struct IngestOptions {
    /// chrono format string for calendar dates
    pub date_format: String,
}

impl Default for IngestOptions {
    fn default() -> Self { Self { date_format: DEFAULT_DATE_FORMAT.to_string() } }
}

/// Convert an onboarding time to seconds since the Unix epoch.
///
/// `date_format` is tried first, so digit-only formats such as `%Y%m%d` win over
/// the epoch-seconds reading of the same string.
pub fn parse_onboarding_time(value: &str, date_format: &str) -> Result<u64, TimeParseError> {
    let v = value.trim();
    if v.is_empty() {
        return Err(TimeParseError::Empty);
    }
    let secs = if let Ok(date) = NaiveDate::parse_from_str(v, date_format) {
        match date.and_hms_opt(0, 0, 0) {
            Some(midnight) => Utc.from_utc_datetime(&midnight).timestamp(),
            None => return Err(unrecognized(v, date_format)),
        }
    } else if v.bytes().all(|c| c.is_ascii_digit()) {
        return v.parse::<u64>().map_err(|_| unrecognized(v, date_format));
    } else if let Ok(dt) = DateTime::parse_from_rfc3339(v) {
        dt.timestamp()
    } else {
        return Err(unrecognized(v, date_format));
    };
    u64::try_from(secs).map_err(|_| TimeParseError::BeforeEpoch(secs))
}

fn unrecognized(value: &str, format: &str) -> TimeParseError {
    TimeParseError::Unrecognized { value: value.to_string(), format: format.to_string() }
}

fn is_header(record: &csv::StringRecord) -> bool {
    record.iter().any(|f| HEADER_FIELDS.contains(&f))
}

/// Read whitelist entries in file order.
pub fn read_whitelist<R: Read>(reader: R, opts: &IngestOptions) -> Result<Vec<Entry>, IngestError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut entries = Vec::new();
    for (i, row) in rdr.records().enumerate() {
        let record = i + 1;
        let row = row?;
        if row.iter().all(str::is_empty) {
            continue;
        }
        if is_header(&row) {
            debug!(record, "skipping header row");
            continue;
        }
        // trailing empty cells are tolerated, extra data is not
        let found = row.iter().collect::<Vec<_>>().into_iter().rposition(|f| !f.is_empty()).map_or(0, |i| i + 1);
        if found > RECORD_FIELDS {
            return Err(IngestError::FieldCount { record, expected: RECORD_FIELDS, found });
        }
        let address = row.get(0).ok_or(IngestError::MissingField { record, field: "address" })?;
        let time = row
            .get(1)
            .filter(|s| !s.is_empty())
            .ok_or(IngestError::MissingField { record, field: "onboardingTime" })?;
        let address: Address = address.parse().map_err(|source| IngestError::Encoding { record, source })?;
        let timestamp = parse_onboarding_time(time, &opts.date_format)
            .map_err(|source| IngestError::Time { record, source })?;
        entries.push(Entry::new(address, timestamp));
    }
    debug!(entries = entries.len(), "read whitelist");
    Ok(entries)
}

pub fn read_whitelist_file<P: AsRef<Path>>(path: P, opts: &IngestOptions) -> Result<Vec<Entry>, IngestError> {
    let f = File::open(path.as_ref())?;
    debug!(path = %path.as_ref().display(), "opened whitelist");
    read_whitelist(f, opts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const A: &str = "0x5B38Da6a701c568545dCfcB03FcB875f56beddC4";
    const B: &str = "0xAb8483F64d9C6d1EcF9b849Ae677dD3315835cb2";

    #[test]
    fn dates_convert_to_midnight_utc() {
        assert_eq!(parse_onboarding_time("2022-10-1", DEFAULT_DATE_FORMAT), Ok(1_664_582_400));
        assert_eq!(parse_onboarding_time("2022-01-01", DEFAULT_DATE_FORMAT), Ok(1_640_995_200));
        assert_eq!(parse_onboarding_time("1970-1-1", DEFAULT_DATE_FORMAT), Ok(0));
        assert_eq!(parse_onboarding_time("1664582400", DEFAULT_DATE_FORMAT), Ok(1_664_582_400));
        assert_eq!(
            parse_onboarding_time("2022-10-01T12:00:00+02:00", DEFAULT_DATE_FORMAT),
            Ok(1_664_618_400)
        );
        assert_eq!(parse_onboarding_time("01/10/2022", "%d/%m/%Y"), Ok(1_664_582_400));
    }

    #[test]
    fn digit_only_date_format_takes_precedence_over_epoch_seconds() {
        assert_eq!(parse_onboarding_time("20221001", "%Y%m%d"), Ok(1_664_582_400));
        // not a valid date under the format, so it is read as epoch seconds
        assert_eq!(parse_onboarding_time("1664582400", "%Y%m%d"), Ok(1_664_582_400));
        let csv = format!("{A},20221001\n");
        let opts = IngestOptions { date_format: "%Y%m%d".to_string() };
        let entries = read_whitelist(csv.as_bytes(), &opts).unwrap();
        assert_eq!(entries, vec![Entry::new(A.parse().unwrap(), 1_664_582_400)]);
    }

    #[test]
    fn bad_dates_are_rejected() {
        assert_eq!(parse_onboarding_time("  ", DEFAULT_DATE_FORMAT), Err(TimeParseError::Empty));
        assert!(matches!(
            parse_onboarding_time("yesterday", DEFAULT_DATE_FORMAT),
            Err(TimeParseError::Unrecognized { .. })
        ));
        assert_eq!(
            parse_onboarding_time("1969-12-31", DEFAULT_DATE_FORMAT),
            Err(TimeParseError::BeforeEpoch(-86_400))
        );
    }

    #[test]
    fn reads_rows_and_skips_headers() {
        let csv = format!("address,onboardingTime\n{A},2022-10-1\n\n{B}, 1633046400 \n");
        let entries = read_whitelist(csv.as_bytes(), &IngestOptions::default()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], Entry::new(A.parse().unwrap(), 1_664_582_400));
        assert_eq!(entries[1], Entry::new(B.parse().unwrap(), 1_633_046_400));
    }

    #[test]
    fn errors_carry_record_numbers() {
        let opts = IngestOptions::default();
        let csv = format!("{A},2022-10-1\n{B}\n");
        match read_whitelist(csv.as_bytes(), &opts) {
            Err(IngestError::MissingField { record: 2, field: "onboardingTime" }) => {}
            other => panic!("unexpected {other:?}"),
        }
        let csv = format!("{A},2022-10-1\n0x1234,2022-10-1\n");
        assert!(matches!(
            read_whitelist(csv.as_bytes(), &opts),
            Err(IngestError::Encoding { record: 2, .. })
        ));
        let csv = format!("{A},2022-10-1\n{B},2022-10-1,garbage\n");
        match read_whitelist(csv.as_bytes(), &opts) {
            Err(IngestError::FieldCount { record: 2, expected: 2, found: 3 }) => {}
            other => panic!("unexpected {other:?}"),
        }
        let csv = format!("{A},2022-10-1,,\n");
        assert_eq!(read_whitelist(csv.as_bytes(), &opts).unwrap().len(), 1);
        let csv = format!("{A},someday\n");
        assert!(matches!(read_whitelist(csv.as_bytes(), &opts), Err(IngestError::Time { record: 1, .. })));
    }

    #[test]
    fn reads_from_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "address,onboardingTime").unwrap();
        writeln!(f, "{A},2021-10-1").unwrap();
        let entries = read_whitelist_file(f.path(), &IngestOptions::default()).unwrap();
        assert_eq!(entries, vec![Entry::new(A.parse().unwrap(), 1_633_046_400)]);
        assert!(matches!(
            read_whitelist_file("/definitely/not/here.csv", &IngestOptions::default()),
            Err(IngestError::Io(_))
        ));
    }
}
