//! SQLite stores timestamps as TEXT, and databases written by earlier
//! revisions of this service carry more than one encoding. Reads try a fixed
//! list of layouts in order and take the first that parses.

use time::format_description::well_known::Rfc3339;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;

use super::StoreError;

// Legacy layouts, e.g. "2024-03-01 09:30:00.123456+00:00" and the same
// without fractional seconds.
const LEGACY_WITH_SUBSECOND: &[FormatItem<'static>] = format_description!(
    "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond][offset_hour sign:mandatory]:[offset_minute]"
);
const LEGACY_WHOLE_SECOND: &[FormatItem<'static>] = format_description!(
    "[year]-[month]-[day] [hour]:[minute]:[second][offset_hour sign:mandatory]:[offset_minute]"
);

/// Parses a persisted timestamp, trying RFC 3339 first and then the legacy
/// layouts. Returns `StoreError::MalformedTimestamp` when nothing matches.
pub fn parse_any(column: &'static str, value: &str) -> Result<OffsetDateTime, StoreError> {
    OffsetDateTime::parse(value, &Rfc3339)
        .or_else(|_| OffsetDateTime::parse(value, &LEGACY_WITH_SUBSECOND))
        .or_else(|_| OffsetDateTime::parse(value, &LEGACY_WHOLE_SECOND))
        .map_err(|_| StoreError::MalformedTimestamp {
            column,
            value: value.to_string(),
        })
}

/// Same as [`parse_any`] for nullable columns.
pub fn parse_any_opt(
    column: &'static str,
    value: Option<&str>,
) -> Result<Option<OffsetDateTime>, StoreError> {
    value.map(|v| parse_any(column, v)).transpose()
}

/// The canonical encoding for writes: RFC 3339.
pub fn to_text(ts: OffsetDateTime) -> Result<String, StoreError> {
    ts.format(&Rfc3339)
        .map_err(|e| StoreError::Corrupt(format!("unformattable timestamp: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn parses_rfc3339() {
        let ts = parse_any("created_at", "2024-03-01T09:30:00Z").unwrap();
        assert_eq!(ts, datetime!(2024-03-01 09:30:00 UTC));
    }

    #[test]
    fn parses_legacy_with_subseconds() {
        let ts = parse_any("created_at", "2024-03-01 09:30:00.123456+00:00").unwrap();
        assert_eq!(ts.unix_timestamp(), datetime!(2024-03-01 09:30:00 UTC).unix_timestamp());
        assert_eq!(ts.microsecond(), 123_456);
    }

    #[test]
    fn parses_legacy_whole_seconds_with_offset() {
        let ts = parse_any("updated_at", "2024-03-01 10:30:00+01:00").unwrap();
        assert_eq!(
            ts.unix_timestamp(),
            datetime!(2024-03-01 09:30:00 UTC).unix_timestamp()
        );
    }

    #[test]
    fn first_matching_layout_wins() {
        // Valid under RFC 3339; must not be re-interpreted by a later layout.
        let ts = parse_any("created_at", "2024-03-01T09:30:00.5Z").unwrap();
        assert_eq!(ts.millisecond(), 500);
    }

    #[test]
    fn rejects_garbage() {
        let err = parse_any("created_at", "not-a-timestamp").unwrap_err();
        match err {
            StoreError::MalformedTimestamp { column, value } => {
                assert_eq!(column, "created_at");
                assert_eq!(value, "not-a-timestamp");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn nullable_column_passes_none_through() {
        assert!(parse_any_opt("current_period_end", None).unwrap().is_none());
        assert!(parse_any_opt("current_period_end", Some("2024-03-01T09:30:00Z"))
            .unwrap()
            .is_some());
    }

    #[test]
    fn write_encoding_round_trips() {
        let ts = datetime!(2024-03-01 09:30:00.250 UTC);
        let text = to_text(ts).unwrap();
        assert_eq!(parse_any("created_at", &text).unwrap(), ts);
    }
}
