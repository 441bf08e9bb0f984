use chrono::{Duration, NaiveDateTime};

/// The platform's "unset" marker for date columns. Not a representable
/// timestamp, which is why date columns are TEXT.
pub const ZERO_DATE: &str = "0000-00-00 00:00:00";

const STORAGE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const WIRE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub fn parse_storage(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, STORAGE_FORMAT).ok()
}

pub fn to_storage(dt: NaiveDateTime) -> String {
    dt.format(STORAGE_FORMAT).to_string()
}

/// Parses an inbound ISO-style date-time. Anything past the wall-clock
/// seconds (fractional seconds, zone suffix) is tolerated and ignored,
/// matching the platform's handling.
pub fn parse_wire(s: &str) -> Option<NaiveDateTime> {
    let head = s.get(..19).unwrap_or(s);
    NaiveDateTime::parse_from_str(head, WIRE_FORMAT).ok()
}

/// Storage format to wire format; the zero-date sentinel becomes None.
pub fn storage_to_wire(s: &str) -> Option<String> {
    if s == ZERO_DATE {
        return None;
    }
    parse_storage(s).map(|dt| dt.format(WIRE_FORMAT).to_string())
}

fn offset_duration(offset_hours: f64) -> Duration {
    Duration::seconds((offset_hours * 3600.0).round() as i64)
}

pub fn local_to_gmt(local: NaiveDateTime, offset_hours: f64) -> NaiveDateTime {
    local - offset_duration(offset_hours)
}

pub fn gmt_to_local(gmt: NaiveDateTime, offset_hours: f64) -> NaiveDateTime {
    gmt + offset_duration(offset_hours)
}

/// Outcome of applying the patch's date/date_gmt pair.
#[derive(Debug, Clone, PartialEq)]
pub enum DatePatch {
    /// Both columns set to the given storage-format values.
    Set { local: String, gmt: String },
    /// Both columns reset to the zero-date sentinel.
    Reset,
}

/// Resolves the tri-state date fields into a column pair. `date` wins
/// over `date_gmt` when both are present; an explicit null on either
/// resets both columns. Returns the offending field name on a value
/// that does not parse.
pub fn resolve_dates(
    date: Option<Option<&str>>,
    date_gmt: Option<Option<&str>>,
    offset_hours: f64,
) -> Result<Option<DatePatch>, &'static str> {
    match date {
        Some(None) => return Ok(Some(DatePatch::Reset)),
        Some(Some(raw)) => {
            let local = parse_wire(raw).ok_or("date")?;
            let gmt = local_to_gmt(local, offset_hours);
            return Ok(Some(DatePatch::Set {
                local: to_storage(local),
                gmt: to_storage(gmt),
            }));
        }
        None => {}
    }
    match date_gmt {
        Some(None) => Ok(Some(DatePatch::Reset)),
        Some(Some(raw)) => {
            let gmt = parse_wire(raw).ok_or("date_gmt")?;
            let local = gmt_to_local(gmt, offset_hours);
            Ok(Some(DatePatch::Set {
                local: to_storage(local),
                gmt: to_storage(gmt),
            }))
        }
        None => Ok(None),
    }
}
