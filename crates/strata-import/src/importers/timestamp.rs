//! Parsing of the loose period strings found in statistical releases.

use chrono::{NaiveDate, NaiveDateTime};

/// Parse a period label into the timestamp values are recorded at.
///
/// Periods resolve to their last second: `"2013"` is 2013-12-31T23:59:59, and
/// financial or academic years such as `"2013 - 14"`, `"2013/2014"` or
/// `"2014/15"` resolve to the end of the second year. Full ISO date-times are
/// taken as-is and plain dates resolve to midnight.
pub fn parse_timestamp_string(input: &str) -> Option<NaiveDateTime> {
  let s = input.trim();

  if let Some(year) = parse_year(s) {
    return end_of_year(year);
  }

  if let Some((first, second)) = s.split_once(['-', '/']) {
    let (first, second) = (first.trim(), second.trim());
    if let Some(first) = parse_year(first) {
      let second = match second.len() {
        4 => parse_year(second),
        2 => second.parse::<i32>().ok().map(|yy| {
          let year = first - first % 100 + yy;
          if year < first { year + 100 } else { year }
        }),
        _ => None,
      };
      if let Some(second) = second {
        return end_of_year(second);
      }
    }
  }

  for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
    if let Ok(ts) = NaiveDateTime::parse_from_str(s, format) {
      return Some(ts);
    }
  }

  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .ok()
    .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn parse_year(s: &str) -> Option<i32> {
  (s.len() == 4 && s.bytes().all(|b| b.is_ascii_digit()))
    .then(|| s.parse().ok())
    .flatten()
}

fn end_of_year(year: i32) -> Option<NaiveDateTime> {
  NaiveDate::from_ymd_opt(year, 12, 31)?.and_hms_opt(23, 59, 59)
}
