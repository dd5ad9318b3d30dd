//! Display formatting shared by the CLI and the landing page

use chrono::{DateTime, Utc};

/// Format a byte count with comma-separated digit groups
pub fn pretty_size(size: u64) -> String {
    let digits = size.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Timestamp format used everywhere an operator reads one
pub fn display_time(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Activation column for listings: the instant, or `never`
pub fn display_activation(at: Option<DateTime<Utc>>) -> String {
    match at {
        Some(at) => display_time(at),
        None => "never".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_pretty_size_groups_digits() {
        assert_eq!(pretty_size(0), "0");
        assert_eq!(pretty_size(999), "999");
        assert_eq!(pretty_size(1_000), "1,000");
        assert_eq!(pretty_size(654_321), "654,321");
        assert_eq!(pretty_size(10_000_000), "10,000,000");
        assert_eq!(pretty_size(1_234_567_890), "1,234,567,890");
    }

    #[test]
    fn test_display_time() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 17, 5, 42).unwrap();
        assert_eq!(display_time(at), "2024-03-09 17:05:42 UTC");
    }

    #[test]
    fn test_display_activation() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 17, 5, 42).unwrap();
        assert_eq!(display_activation(Some(at)), "2024-03-09 17:05:42 UTC");
        assert_eq!(display_activation(None), "never");
    }
}
