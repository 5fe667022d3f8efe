use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

use chrono::{DateTime, Days, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

use crate::model::{CheckIn, Task};
use crate::status::Severity;

/// Common surface the view pipeline needs from a tracked record.
pub trait Tracked {
    fn title(&self) -> &str;
    fn labels(&self) -> &[String];
    fn severity<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Severity;
    /// Calendar date the time window filter is checked against. `None` means the
    /// window does not apply to this kind of record.
    fn window_date<Tz: TimeZone>(&self, tz: &Tz) -> Option<NaiveDate>;
    /// Tie-break between two records of equal severity.
    fn secondary_cmp(&self, other: &Self) -> Ordering;

    fn has_label(&self, label: &str) -> bool {
        self.labels().iter().any(|candidate| candidate == label)
    }
}

impl Tracked for CheckIn {
    fn title(&self) -> &str {
        &self.title
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn severity<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Severity {
        self.status(now).state
    }

    fn window_date<Tz: TimeZone>(&self, tz: &Tz) -> Option<NaiveDate> {
        Some(self.due_date_in(tz))
    }

    fn secondary_cmp(&self, other: &Self) -> Ordering {
        self.next_due_date.cmp(&other.next_due_date)
    }
}

impl Tracked for Task {
    fn title(&self) -> &str {
        &self.title
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn severity<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Severity {
        self.status(now).state
    }

    fn window_date<Tz: TimeZone>(&self, _tz: &Tz) -> Option<NaiveDate> {
        None
    }

    fn secondary_cmp(&self, other: &Self) -> Ordering {
        match (self.completed, other.completed) {
            (true, true) => other.completed_date.cmp(&self.completed_date),
            (false, false) => self.created_date.cmp(&other.created_date),
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    Ontime,
    Yellow,
    Red,
    Completed,
    /// Anything not yet completed.
    Pending,
}

impl StatusFilter {
    pub fn matches(self, severity: Severity) -> bool {
        match self {
            StatusFilter::Ontime => severity == Severity::Ontime,
            StatusFilter::Yellow => severity == Severity::Yellow,
            StatusFilter::Red => severity == Severity::Red,
            StatusFilter::Completed => severity == Severity::Completed,
            StatusFilter::Pending => severity != Severity::Completed,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ontime" | "on-time" => Ok(StatusFilter::Ontime),
            "yellow" => Ok(StatusFilter::Yellow),
            "red" => Ok(StatusFilter::Red),
            "completed" | "done" => Ok(StatusFilter::Completed),
            "pending" => Ok(StatusFilter::Pending),
            other => Err(format!("unknown status `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    Today,
    Week,
    Month,
}

impl TimeWindow {
    pub fn span_days(self) -> u64 {
        match self {
            TimeWindow::Today => 0,
            TimeWindow::Week => 7,
            TimeWindow::Month => 30,
        }
    }

    /// Whether `date` falls in `[today, today + span]`.
    pub fn contains(self, today: NaiveDate, date: NaiveDate) -> bool {
        let end = today
            .checked_add_days(Days::new(self.span_days()))
            .unwrap_or(NaiveDate::MAX);
        date >= today && date <= end
    }
}

impl FromStr for TimeWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "today" => Ok(TimeWindow::Today),
            "week" => Ok(TimeWindow::Week),
            "month" => Ok(TimeWindow::Month),
            other => Err(format!("unknown time window `{other}`")),
        }
    }
}

/// Optional view filters. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewFilters {
    pub status: Option<StatusFilter>,
    pub label: Option<String>,
    pub search: Option<String>,
    pub window: Option<TimeWindow>,
}

impl ViewFilters {
    pub fn with_status(mut self, status: StatusFilter) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = Some(window);
        self
    }
}

/// Filters and orders `items` for display: most severe first, then by the
/// record's own tie-break. Equal records keep their relative order.
pub fn view<'a, T, Tz>(items: &'a [T], filters: &ViewFilters, now: &DateTime<Tz>) -> Vec<&'a T>
where
    T: Tracked,
    Tz: TimeZone,
{
    let today = now.date_naive();
    let tz = now.timezone();
    let needle = filters
        .search
        .as_deref()
        .filter(|term| !term.is_empty())
        .map(str::to_lowercase);

    let selected = items.iter().filter_map(|item| {
        if let Some(needle) = &needle {
            if !item.title().to_lowercase().contains(needle.as_str()) {
                return None;
            }
        }
        if let Some(label) = &filters.label {
            if !item.has_label(label) {
                return None;
            }
        }
        if let Some(window) = filters.window {
            if let Some(date) = item.window_date(&tz) {
                if !window.contains(today, date) {
                    return None;
                }
            }
        }
        let severity = item.severity(now);
        if let Some(status) = filters.status {
            if !status.matches(severity) {
                return None;
            }
        }
        Some((severity, item))
    });

    sort_by_priority(selected.collect())
}

/// Swim lane: records carrying any of `selection`, in priority order. An empty
/// selection is an empty lane.
pub fn lane<'a, T, Tz>(items: &'a [T], selection: &[String], now: &DateTime<Tz>) -> Vec<&'a T>
where
    T: Tracked,
    Tz: TimeZone,
{
    if selection.is_empty() {
        return Vec::new();
    }
    let selected = items
        .iter()
        .filter(|item| selection.iter().any(|label| item.has_label(label)))
        .map(|item| (item.severity(now), item))
        .collect();
    sort_by_priority(selected)
}

fn sort_by_priority<T: Tracked>(mut decorated: Vec<(Severity, &T)>) -> Vec<&T> {
    decorated.sort_by(|(left_state, left), (right_state, right)| {
        left_state
            .priority()
            .cmp(&right_state.priority())
            .then_with(|| left.secondary_cmp(right))
    });
    decorated.into_iter().map(|(_, item)| item).collect()
}

/// All distinct labels, sorted.
pub fn unique_labels<T: Tracked>(items: &[T]) -> Vec<String> {
    items
        .iter()
        .flat_map(|item| item.labels().iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// The `count` most used labels. Ties keep first-seen order.
pub fn top_labels<T: Tracked>(items: &[T], count: usize) -> Vec<String> {
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for label in items.iter().flat_map(|item| item.labels()) {
        let entry = counts.entry(label.as_str()).or_insert_with(|| {
            order.push(label.as_str());
            0
        });
        *entry += 1;
    }
    order.sort_by(|a, b| counts[b].cmp(&counts[a]));
    order.into_iter().take(count).map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FrequencyUnit;
    use chrono::{Duration, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 24, 12, 0, 0).unwrap()
    }

    fn check_in(title: &str, due_offset_days: i64, labels: &[&str]) -> CheckIn {
        CheckIn::new(
            title,
            1,
            FrequencyUnit::Weeks,
            now() + Duration::days(due_offset_days),
        )
        .with_thresholds(3, 10)
        .with_labels(labels.iter().copied())
    }

    fn titles<T: Tracked>(items: &[&T]) -> Vec<String> {
        items.iter().map(|item| item.title().to_string()).collect()
    }

    #[test]
    fn sorts_by_severity_then_due_date() {
        let items = vec![
            check_in("future", 5, &[]),
            check_in("slightly late", -2, &[]),
            check_in("very late", -20, &[]),
            check_in("today", 0, &[]),
            check_in("late", -15, &[]),
        ];
        let out = view(&items, &ViewFilters::default(), &now());
        assert_eq!(
            titles(&out),
            vec!["very late", "late", "slightly late", "today", "future"]
        );
    }

    #[test]
    fn ties_keep_insertion_order() {
        let due = now() + Duration::days(3);
        let mut first = check_in("first", 0, &[]);
        let mut second = check_in("second", 0, &[]);
        let mut third = check_in("third", 0, &[]);
        first.next_due_date = due;
        second.next_due_date = due;
        third.next_due_date = due;
        let items = vec![first, second, third];
        let out = view(&items, &ViewFilters::default(), &now());
        assert_eq!(titles(&out), vec!["first", "second", "third"]);
    }

    #[test]
    fn filters_combine() {
        let items = vec![
            check_in("Call Mom", -1, &["family"]),
            check_in("Call plumber", -1, &["home"]),
            check_in("Mow lawn", -1, &["home"]),
            check_in("Call Dad", 2, &["family"]),
        ];
        let filters = ViewFilters::default()
            .with_search("CALL")
            .with_label("family")
            .with_status(StatusFilter::Yellow);
        let out = view(&items, &filters, &now());
        assert_eq!(titles(&out), vec!["Call Mom"]);
        assert_eq!(items.len(), 4);
    }

    #[test]
    fn search_matches_the_term_as_typed() {
        let items = vec![check_in("Call Mom", 0, &[]), check_in("Mommy visit", 0, &[])];
        let out = view(&items, &ViewFilters::default().with_search(" mom"), &now());
        assert_eq!(titles(&out), vec!["Call Mom"]);

        let out = view(&items, &ViewFilters::default().with_search("  "), &now());
        assert!(out.is_empty());

        let out = view(&items, &ViewFilters::default().with_search(""), &now());
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn time_window_bounds_are_inclusive() {
        let items = vec![
            check_in("yesterday", -1, &[]),
            check_in("today", 0, &[]),
            check_in("in a week", 7, &[]),
            check_in("in eight days", 8, &[]),
            check_in("in a month", 30, &[]),
        ];
        let today = view(&items, &ViewFilters::default().with_window(TimeWindow::Today), &now());
        assert_eq!(titles(&today), vec!["today"]);

        let week = view(&items, &ViewFilters::default().with_window(TimeWindow::Week), &now());
        assert_eq!(titles(&week), vec!["today", "in a week"]);

        let month = view(&items, &ViewFilters::default().with_window(TimeWindow::Month), &now());
        assert_eq!(
            titles(&month),
            vec!["today", "in a week", "in eight days", "in a month"]
        );
    }

    #[test]
    fn tasks_sort_open_oldest_first_and_completed_newest_first() {
        let mut done_early = Task::new("done early", now() - Duration::days(20));
        done_early.completed = true;
        done_early.completed_date = Some(now() - Duration::days(5));
        let mut done_late = Task::new("done late", now() - Duration::days(20));
        done_late.completed = true;
        done_late.completed_date = Some(now() - Duration::days(1));
        let items = vec![
            done_early,
            Task::new("new", now() - Duration::days(1)),
            done_late,
            Task::new("old", now() - Duration::days(15)),
            Task::new("week", now() - Duration::days(8)),
            Task::new("older new", now() - Duration::days(2)),
        ];
        let out = view(&items, &ViewFilters::default(), &now());
        assert_eq!(
            titles(&out),
            vec!["old", "week", "older new", "new", "done late", "done early"]
        );

        let pending = view(&items, &ViewFilters::default().with_status(StatusFilter::Pending), &now());
        assert_eq!(pending.len(), 4);

        // The window only narrows check-ins.
        let windowed = view(&items, &ViewFilters::default().with_window(TimeWindow::Today), &now());
        assert_eq!(windowed.len(), items.len());
    }

    #[test]
    fn lane_matches_any_selected_label() {
        let items = vec![
            check_in("gym", 0, &["health"]),
            check_in("dentist", -20, &["health", "appointments"]),
            check_in("rent", 0, &["money"]),
            check_in("bare", 0, &[]),
        ];
        let selection = vec!["health".to_string(), "money".to_string()];
        let out = lane(&items, &selection, &now());
        assert_eq!(titles(&out), vec!["dentist", "gym", "rent"]);
        assert!(lane(&items, &[], &now()).is_empty());
    }

    #[test]
    fn label_inventories() {
        let items = vec![
            check_in("a", 0, &["work", "home"]),
            check_in("b", 0, &["garden", "home"]),
            check_in("c", 0, &["garden", "home"]),
            check_in("d", 0, &["work"]),
        ];
        assert_eq!(unique_labels(&items), vec!["garden", "home", "work"]);
        assert_eq!(top_labels(&items, 2), vec!["home", "work"]);
        assert_eq!(top_labels(&items, 10).len(), 3);
    }

    #[test]
    fn parses_filter_keywords() {
        assert_eq!("Pending".parse::<StatusFilter>(), Ok(StatusFilter::Pending));
        assert_eq!("week".parse::<TimeWindow>(), Ok(TimeWindow::Week));
        assert!("soon".parse::<TimeWindow>().is_err());
    }
}
