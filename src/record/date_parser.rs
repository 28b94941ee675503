use chrono::{NaiveDate, NaiveDateTime};

/// Layout of the `data` column in the provinces feed.
pub const SOURCE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Fast parse of `"YYYY-MM-DD HH:MM:SS"` → naive timestamp.
///
/// The feed has no zone information, so the value is kept naive.
pub fn parse_source_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    // exact length + separators check
    if s.len() != 19
        || !s.is_ascii()
        || &s[4..5] != "-"
        || &s[7..8] != "-"
        || &s[10..11] != " "
        || &s[13..14] != ":"
        || &s[16..17] != ":"
    {
        return None;
    }
    let year: i32 = digits(&s[0..4])?;
    let month: u32 = digits(&s[5..7])?;
    let day: u32 = digits(&s[8..10])?;
    let hour: u32 = digits(&s[11..13])?;
    let min: u32 = digits(&s[14..16])?;
    let sec: u32 = digits(&s[17..19])?;

    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, min, sec)
}

/// Render a timestamp back in the feed's own layout.
pub fn format_source_datetime(dt: &NaiveDateTime) -> String {
    dt.format(SOURCE_FORMAT).to_string()
}

// `str::parse` accepts a leading '+', the feed never has one
fn digits<T: std::str::FromStr>(s: &str) -> Option<T> {
    if s.bytes().all(|b| b.is_ascii_digit()) {
        s.parse().ok()
    } else {
        None
    }
}
