use std::fmt;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{CheckIn, Task};

/// Tasks turn yellow after a week and red after two.
pub const TASK_YELLOW_AGE_DAYS: i64 = 7;
pub const TASK_RED_AGE_DAYS: i64 = 14;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Ontime,
    Yellow,
    Red,
    Completed,
}

impl Severity {
    /// Sort rank, most urgent first.
    pub fn priority(self) -> u8 {
        match self {
            Severity::Red => 0,
            Severity::Yellow => 1,
            Severity::Ontime => 2,
            Severity::Completed => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Ontime => "ontime",
            Severity::Yellow => "yellow",
            Severity::Red => "red",
            Severity::Completed => "completed",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckInStatus {
    pub state: Severity,
    pub overdue_days: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskStatus {
    pub state: Severity,
    pub days_old: i64,
}

/// Severity of a check-in due on `next_due` as seen from `now`.
///
/// Both instants are reduced to calendar dates in `now`'s time zone before
/// counting. The branch order matters at the threshold boundaries: anything
/// overdue but not past the red threshold and not within the yellow one is red.
pub fn check_in_status<Tz: TimeZone>(
    next_due: &DateTime<Utc>,
    yellow_threshold_days: u32,
    red_threshold_days: u32,
    now: &DateTime<Tz>,
) -> CheckInStatus {
    let today = now.date_naive();
    let due_day = local_date(next_due, &now.timezone());
    let overdue_days = (today - due_day).num_days().max(0);

    let state = if overdue_days == 0 {
        Severity::Ontime
    } else if overdue_days > i64::from(red_threshold_days) {
        Severity::Red
    } else if overdue_days <= i64::from(yellow_threshold_days) {
        Severity::Yellow
    } else {
        Severity::Red
    };

    CheckInStatus {
        state,
        overdue_days,
    }
}

/// Severity of a task by age. Age uses the full timestamp difference, floored
/// to whole days, not calendar dates.
pub fn task_status<Tz: TimeZone>(task: &Task, now: &DateTime<Tz>) -> TaskStatus {
    if task.completed {
        return TaskStatus {
            state: Severity::Completed,
            days_old: 0,
        };
    }

    let elapsed = now.with_timezone(&Utc) - task.created_date;
    let days_old = elapsed.num_milliseconds().div_euclid(MILLIS_PER_DAY);

    let state = if days_old >= TASK_RED_AGE_DAYS {
        Severity::Red
    } else if days_old >= TASK_YELLOW_AGE_DAYS {
        Severity::Yellow
    } else {
        Severity::Ontime
    };

    TaskStatus { state, days_old }
}

impl CheckIn {
    pub fn status<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> CheckInStatus {
        check_in_status(
            &self.next_due_date,
            self.yellow_threshold_days,
            self.red_threshold_days,
            now,
        )
    }

    /// Due date as a calendar date in `tz`.
    pub fn due_date_in<Tz: TimeZone>(&self, tz: &Tz) -> NaiveDate {
        local_date(&self.next_due_date, tz)
    }
}

impl Task {
    pub fn status<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> TaskStatus {
        task_status(self, now)
    }
}

pub(crate) fn local_date<Tz: TimeZone>(instant: &DateTime<Utc>, tz: &Tz) -> NaiveDate {
    instant.with_timezone(tz).date_naive()
}
