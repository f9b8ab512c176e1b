//! Wall-clock timestamps for records and comments.
//!
//! Records carry RFC 3339 UTC timestamps at second precision with a `Z`
//! suffix, e.g. `2026-08-06T12:30:00Z`.

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Current UTC time as an RFC 3339 string, truncated to whole seconds.
pub fn now_utc_iso() -> String {
    format_utc_iso(OffsetDateTime::now_utc())
}

fn format_utc_iso(at: OffsetDateTime) -> String {
    let truncated = at.replace_nanosecond(0).unwrap_or(at);
    truncated
        .format(&Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
