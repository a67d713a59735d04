//! # Time Expressions
//!
//! Resolves user-typed time bounds into RFC 3339 instants. Accepts either
//! an absolute RFC 3339 timestamp or a relative `<n>[smhd]` look-back
//! (`15m`, `24h`, `7d`).

use chrono::{DateTime, Duration, SecondsFormat, Utc};

use crate::TimeRange;

/// Parse an absolute or relative expression against `now`.
pub fn parse_time_expr(raw: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    let (number, unit) = split_unit(value)?;
    let amount: i64 = number.parse().ok()?;
    let duration = match unit {
        's' => Duration::try_seconds(amount)?,
        'm' => Duration::try_minutes(amount)?,
        'h' => Duration::try_hours(amount)?,
        'd' => Duration::try_days(amount)?,
        _ => return None,
    };
    now.checked_sub_signed(duration)
}

/// Build a [`TimeRange`] from optional `since` / `until` expressions.
pub fn resolve_range(
    since: Option<&str>,
    until: Option<&str>,
    now: DateTime<Utc>,
) -> Result<TimeRange, String> {
    let resolve = |raw: Option<&str>| -> Result<Option<String>, String> {
        match raw {
            None => Ok(None),
            Some(expr) => parse_time_expr(expr, now)
                .map(|dt| Some(dt.to_rfc3339_opts(SecondsFormat::Secs, true)))
                .ok_or_else(|| format!("invalid time expression '{}'", expr)),
        }
    };
    Ok(TimeRange::new(resolve(since)?, resolve(until)?))
}

/// `^\d+[smhd]$`, the interval syntax of the timeline endpoint.
pub fn is_valid_interval(interval: &str) -> bool {
    let Some((digits, unit)) = split_unit(interval) else {
        return false;
    };
    !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit())
        && matches!(unit, 's' | 'm' | 'h' | 'd')
}

fn split_unit(value: &str) -> Option<(&str, char)> {
    let mut chars = value.chars();
    let unit = chars.next_back()?;
    Some((chars.as_str(), unit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_relative_expressions() {
        assert_eq!(
            parse_time_expr("15m", now()),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 11, 45, 0).unwrap())
        );
        assert_eq!(
            parse_time_expr("1d", now()),
            Some(Utc.with_ymd_and_hms(2024, 4, 30, 12, 0, 0).unwrap())
        );
        assert_eq!(parse_time_expr("5w", now()), None);
        assert_eq!(parse_time_expr("", now()), None);
    }

    #[test]
    fn test_resolve_range() {
        let range = resolve_range(Some("1h"), Some("2024-05-01T12:00:00+02:00"), now()).unwrap();
        assert_eq!(range.gte.as_deref(), Some("2024-05-01T11:00:00Z"));
        assert_eq!(range.lte.as_deref(), Some("2024-05-01T10:00:00Z"));
        assert!(resolve_range(Some("yesterday"), None, now()).is_err());
        assert!(resolve_range(None, None, now()).unwrap().is_empty());
    }

    #[test]
    fn test_interval_syntax() {
        assert!(is_valid_interval("1h"));
        assert!(is_valid_interval("30s"));
        assert!(!is_valid_interval("h"));
        assert!(!is_valid_interval("1w"));
        assert!(!is_valid_interval(""));
        assert!(!is_valid_interval("1.5h"));
    }
}
