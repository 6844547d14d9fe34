use chrono::format::strftime::StrftimeItems;
use chrono::{DateTime, NaiveDateTime, Utc};

pub fn format_rfc822(datetime: DateTime<Utc>) -> String {
    let format = StrftimeItems::new("%a, %d %b %Y %H:%M:%S %z");
    datetime.format_with_items(format).to_string()
}

/// Parses NewsAPI `publishedAt` values.
///
/// The API normally sends `2024-05-01T08:30:00Z`, but some sources leak
/// fractional seconds or explicit offsets through, so RFC 3339 is accepted too.
pub fn parse_published(date_str: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    let date_str = date_str.trim();

    match NaiveDateTime::parse_from_str(date_str, "%Y-%m-%dT%H:%M:%SZ") {
        Ok(naive) => Ok(naive.and_utc()),
        Err(_) => DateTime::parse_from_rfc3339(date_str).map(|dt| dt.with_timezone(&Utc)),
    }
}
