//! Human readable renderings shared by front ends.

use chrono::{DateTime, TimeZone};

use crate::status::Severity;

/// `Oct 17, 2026`.
pub fn format_date<Tz: TimeZone>(date: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    date.format("%b %-d, %Y").to_string()
}

pub fn describe_overdue(days: i64) -> String {
    match days {
        d if d <= 0 => "Not overdue".to_string(),
        1 => "1 day overdue".to_string(),
        d => format!("{d} days overdue"),
    }
}

pub fn describe_age(days: i64) -> String {
    if days == 1 {
        "1 day old".to_string()
    } else {
        format!("{days} days old")
    }
}

pub fn check_in_badge(state: Severity) -> &'static str {
    match state {
        Severity::Ontime => "On time",
        other => other.as_str(),
    }
}

pub fn task_badge(state: Severity) -> &'static str {
    match state {
        Severity::Completed => "Completed",
        Severity::Ontime => "Recent",
        Severity::Yellow => "1 week+",
        Severity::Red => "2 weeks+",
    }
}

/// File name for an export taken at `now`, e.g. `checkin-data-Oct-17,-2026.json`.
pub fn export_file_name<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let stamp = format_date(now).split_whitespace().collect::<Vec<_>>().join("-");
    format!("checkin-data-{stamp}.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn formats_short_dates() {
        let date = Utc.with_ymd_and_hms(2026, 10, 7, 13, 0, 0).unwrap();
        assert_eq!(format_date(&date), "Oct 7, 2026");
        assert_eq!(export_file_name(&date), "checkin-data-Oct-7,-2026.json");
    }

    #[test]
    fn pluralizes_day_counts() {
        assert_eq!(describe_overdue(0), "Not overdue");
        assert_eq!(describe_overdue(1), "1 day overdue");
        assert_eq!(describe_overdue(12), "12 days overdue");
        assert_eq!(describe_age(1), "1 day old");
        assert_eq!(describe_age(0), "0 days old");
    }

    #[test]
    fn badges_match_severity() {
        assert_eq!(check_in_badge(Severity::Ontime), "On time");
        assert_eq!(check_in_badge(Severity::Red), "red");
        assert_eq!(task_badge(Severity::Yellow), "1 week+");
        assert_eq!(task_badge(Severity::Completed), "Completed");
    }
}
