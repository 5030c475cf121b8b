use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};

/// Stored timestamp format: RFC 3339 truncated to whole seconds, UTC.
pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field} '{value}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn instants_are_truncated_to_seconds() {
        let instant = Utc
            .with_ymd_and_hms(2024, 5, 1, 12, 0, 30)
            .unwrap()
            .checked_add_signed(chrono::Duration::milliseconds(750))
            .unwrap();
        let formatted = format_instant(instant);
        assert_eq!(formatted, "2024-05-01T12:00:30Z");

        let parsed = parse_datetime(&formatted, "timestamp").unwrap();
        assert_eq!(parsed.timestamp(), instant.timestamp());
    }

    #[test]
    fn bad_timestamp_string_fails() {
        assert!(parse_datetime("yesterday", "timestamp").is_err());
    }
}
