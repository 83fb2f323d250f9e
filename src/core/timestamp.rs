// LogSift - core/timestamp.rs
//
// Best-effort timestamp extraction from raw log lines.
// Attached to signal and exception results so reports can place them in time.

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;

/// A sniff candidate: a regex that finds a timestamp substring, plus a
/// parser converting the matched text to `DateTime<Utc>`.
struct Sniffer {
    re: Regex,
    parse: fn(&str) -> Option<DateTime<Utc>>,
}

fn naive(s: &str, formats: &[&str]) -> Option<DateTime<Utc>> {
    formats
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .map(|ndt| ndt.and_utc())
}

fn sniffers() -> &'static [Sniffer] {
    static SNIFFERS: OnceLock<Vec<Sniffer>> = OnceLock::new();

    SNIFFERS.get_or_init(|| {
        let table: [(&str, fn(&str) -> Option<DateTime<Utc>>); 5] = [
            // RFC 3339 with explicit zone: 2024-01-15T14:30:22.123+05:30
            (
                r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:\d{2})",
                |s| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.into()),
            ),
            // log4j comma millis: 2024-01-15 14:30:22,123
            (r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2},\d+", |s| {
                let s = s.replace(',', ".").replace('T', " ");
                naive(&s, &["%Y-%m-%d %H:%M:%S%.f"])
            }),
            // ISO without zone: 2024-01-15 14:30:22[.123]
            (r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(?:\.\d+)?", |s| {
                let s = s.replace('T', " ");
                naive(&s, &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"])
            }),
            // Slash year-first: 2024/01/15 14:30:22
            (r"\d{4}/\d{2}/\d{2}[ T]\d{2}:\d{2}:\d{2}(?:\.\d+)?", |s| {
                let s = s.replace('/', "-").replace('T', " ");
                naive(&s, &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"])
            }),
            // Dot day-first: 26.02.2026 22:07:56.535
            (r"\d{2}\.\d{2}\.\d{4} \d{2}:\d{2}:\d{2}(?:\.\d+)?", |s| {
                naive(s, &["%d.%m.%Y %H:%M:%S%.f", "%d.%m.%Y %H:%M:%S"])
            }),
        ];

        table
            .into_iter()
            .filter_map(|(pattern, parse)| match Regex::new(pattern) {
                Ok(re) => Some(Sniffer { re, parse }),
                Err(e) => {
                    tracing::error!(pattern, error = %e, "Invalid built-in timestamp pattern");
                    None
                }
            })
            .collect()
    })
}

/// Find and parse the first recognisable timestamp in `raw_line`.
///
/// Patterns are tried from most to least precise; the first one that both
/// matches and parses wins.
pub fn sniff_timestamp(raw_line: &str) -> Option<DateTime<Utc>> {
    sniffers()
        .iter()
        .find_map(|s| s.re.find(raw_line).and_then(|m| (s.parse)(m.as_str())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sniff(s: &str) -> String {
        sniff_timestamp(s)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "<none>".to_string())
    }

    #[test]
    fn test_sniff_rfc3339_offset() {
        assert_eq!(sniff("at 2024-01-15T14:30:22+02:00 ok"), "2024-01-15 12:30:22");
    }

    #[test]
    fn test_sniff_log4j_comma_millis() {
        assert_eq!(sniff("2024-01-15 14:30:22,123 INFO x"), "2024-01-15 14:30:22");
    }

    #[test]
    fn test_sniff_iso_without_zone() {
        assert_eq!(sniff("[2024-01-15T14:30:22.5] x"), "2024-01-15 14:30:22");
    }

    #[test]
    fn test_sniff_slash_year_first() {
        assert_eq!(sniff("2024/01/15 14:30:22 boot"), "2024-01-15 14:30:22");
    }

    #[test]
    fn test_sniff_dot_day_first() {
        assert_eq!(sniff("26.02.2026 22:07:56.535 Job"), "2026-02-26 22:07:56");
    }

    #[test]
    fn test_sniff_no_timestamp_returns_none() {
        assert_eq!(sniff("INFO value=5"), "<none>");
    }
}
