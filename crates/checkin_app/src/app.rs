use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use checkin_core::{
    format::{check_in_badge, describe_age, describe_overdue, export_file_name, format_date, task_badge},
    model::{DEFAULT_FREQUENCY_VALUE, DEFAULT_RED_THRESHOLD_DAYS, DEFAULT_YELLOW_THRESHOLD_DAYS},
    parse_labels,
    storage::FileStorage,
    store::RemovedItem,
    undo::DEFAULT_UNDO_CAPACITY,
    view::{self, StatusFilter, TimeWindow, ViewFilters},
    CheckIn, FrequencyUnit, ItemStore, Mutation, Task,
};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info, warn, Level};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub(crate) data_dir: PathBuf,
    pub(crate) undo_capacity: usize,
    pub(crate) persist_undo: bool,
    pub(crate) log_level: Level,
    /// Settings that were present but unusable, reported once logging is up.
    pub(crate) rejected: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self::from_lookup(|key| std::env::var(key).ok()))
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(dir) = lookup("CHECKIN_DATA_DIR") {
            if !dir.trim().is_empty() {
                config.data_dir = PathBuf::from(dir.trim());
            }
        }
        if let Some(capacity) = lookup("CHECKIN_UNDO_CAPACITY") {
            match capacity.trim().parse::<usize>() {
                Ok(value) if value > 0 => config.undo_capacity = value,
                _ => config.reject("CHECKIN_UNDO_CAPACITY", &capacity),
            }
        }
        if let Some(flag) = lookup("CHECKIN_PERSIST_UNDO") {
            match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => config.persist_undo = true,
                "0" | "false" | "no" | "off" => config.persist_undo = false,
                _ => config.reject("CHECKIN_PERSIST_UNDO", &flag),
            }
        }
        if let Some(level) = lookup("CHECKIN_LOG") {
            match level.trim().parse::<Level>() {
                Ok(value) => config.log_level = value,
                Err(_) => config.reject("CHECKIN_LOG", &level),
            }
        }
        config
    }

    pub fn log_level(&self) -> Level {
        self.log_level
    }

    fn reject(&mut self, key: &str, value: &str) {
        self.rejected.push(format!("{key}={value}"));
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".checkin"),
            undo_capacity: DEFAULT_UNDO_CAPACITY,
            persist_undo: true,
            log_level: Level::WARN,
            rejected: Vec::new(),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "checkin", about = "Track recurring check-ins and one-off tasks")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Add a recurring check-in
    AddCheckin {
        title: String,
        /// Repeat every N units
        #[arg(long, default_value_t = DEFAULT_FREQUENCY_VALUE)]
        every: u32,
        /// days, weeks or months
        #[arg(long, default_value = "months")]
        unit: FrequencyUnit,
        /// First due date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        first_due: Option<NaiveDate>,
        #[arg(long, default_value_t = DEFAULT_YELLOW_THRESHOLD_DAYS)]
        yellow: u32,
        #[arg(long, default_value_t = DEFAULT_RED_THRESHOLD_DAYS)]
        red: u32,
        /// Comma separated labels
        #[arg(long, default_value = "")]
        labels: String,
    },
    /// Add a one-off task
    AddTask {
        title: String,
        #[arg(long, default_value = "")]
        labels: String,
    },
    /// Check in now and schedule the next occurrence
    CheckIn { id: String },
    /// Mark a task completed
    Complete { id: String },
    /// Delete a check-in or task
    Remove { id: String },
    /// Show check-ins, most overdue first
    ListCheckins {
        #[command(flatten)]
        filters: FilterArgs,
        /// today, week or month
        #[arg(long)]
        window: Option<TimeWindow>,
    },
    /// Show tasks, oldest open task first
    ListTasks {
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Show check-ins carrying any of the given labels
    Lane { labels: String },
    /// List labels in use
    Labels {
        /// Only the N most used labels per collection
        #[arg(long)]
        top: Option<usize>,
    },
    /// Reverse the last change
    Undo,
    /// Write all data to a JSON file
    Export {
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Replace data from an exported JSON file
    Import { path: PathBuf },
}

#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    /// ontime, yellow, red, completed or pending
    #[arg(long)]
    pub status: Option<StatusFilter>,
    #[arg(long)]
    pub label: Option<String>,
    /// Case-insensitive title search
    #[arg(long)]
    pub search: Option<String>,
}

impl FilterArgs {
    fn into_filters(self) -> ViewFilters {
        ViewFilters {
            status: self.status,
            label: self.label,
            search: self.search,
            window: None,
        }
    }
}

pub fn run(config: AppConfig, cli: Cli, out: &mut impl Write) -> Result<()> {
    for setting in &config.rejected {
        warn!(%setting, "ignoring invalid setting");
    }
    let storage = FileStorage::new(&config.data_dir);
    info!(data_dir = %storage.root().display(), "opening store");
    let (mut store, load_errors) = ItemStore::builder()
        .with_storage(Box::new(storage))
        .undo_capacity(config.undo_capacity)
        .persist_history(config.persist_undo)
        .build();
    for err in &load_errors {
        warn!(%err, "stored data could not be read; starting that collection empty");
        writeln!(out, "warning: {err}")?;
    }

    let now = Local::now();
    match cli.command {
        Command::AddCheckin {
            title,
            every,
            unit,
            first_due,
            yellow,
            red,
            labels,
        } => {
            let first_due = match first_due {
                Some(date) => local_midnight(date)?,
                None => local_midnight(now.date_naive())?,
            };
            let record = CheckIn::new(title, every, unit, first_due.with_timezone(&Utc))
                .with_thresholds(yellow, red)
                .with_labels(parse_labels(&labels));
            let id = saved(store.add_check_in(record)?)?;
            writeln!(out, "added check-in {id}")?;
        }
        Command::AddTask { title, labels } => {
            let record = Task::new(title, now.with_timezone(&Utc)).with_labels(parse_labels(&labels));
            let id = saved(store.add_task(record)?)?;
            writeln!(out, "added task {id}")?;
        }
        Command::CheckIn { id } => {
            let updated = saved(store.check_in(&id, &now)?)?;
            writeln!(
                out,
                "checked in {}; next due {}",
                updated.title,
                format_date(&updated.next_due_date.with_timezone(&Local))
            )?;
        }
        Command::Complete { id } => {
            let task = saved(store.complete(&id, &now)?)?;
            writeln!(out, "completed {}", task.title)?;
        }
        Command::Remove { id } => {
            let title = match saved(store.remove(&id)?)? {
                RemovedItem::CheckIn(record) => record.title,
                RemovedItem::Task(record) => record.title,
            };
            writeln!(out, "removed {title}")?;
        }
        Command::ListCheckins { filters, window } => {
            let filters = ViewFilters {
                window,
                ..filters.into_filters()
            };
            let items = store.view_check_ins(&filters, &now);
            if items.is_empty() {
                let message = if store.check_ins().is_empty() {
                    "No check-ins yet. Add your first check-in."
                } else {
                    "No check-ins match the current filters."
                };
                writeln!(out, "{message}")?;
            }
            for item in items {
                write_check_in(out, item, &now)?;
            }
        }
        Command::ListTasks { filters } => {
            let items = store.view_tasks(&filters.into_filters(), &now);
            if items.is_empty() {
                let message = if store.tasks().is_empty() {
                    "No tasks yet. Add your first task."
                } else {
                    "No tasks match the current filters."
                };
                writeln!(out, "{message}")?;
            }
            for item in items {
                write_task(out, item, &now)?;
            }
        }
        Command::Lane { labels } => {
            let selection = parse_labels(&labels);
            let items = view::lane(store.check_ins(), &selection, &now);
            if items.is_empty() {
                writeln!(out, "No check-ins match selected labels")?;
            }
            for item in items {
                write_check_in(out, item, &now)?;
            }
        }
        Command::Labels { top } => match top {
            Some(count) => {
                let check_ins = view::top_labels(store.check_ins(), count);
                let tasks = view::top_labels(store.tasks(), count);
                writeln!(out, "check-ins: {}", check_ins.join(", "))?;
                writeln!(out, "tasks: {}", tasks.join(", "))?;
            }
            None => {
                let all: BTreeSet<String> = view::unique_labels(store.check_ins())
                    .into_iter()
                    .chain(view::unique_labels(store.tasks()))
                    .collect();
                for label in all {
                    writeln!(out, "{label}")?;
                }
            }
        },
        Command::Undo => match store.undo() {
            Some(mutation) => {
                let entry = saved(mutation)?;
                writeln!(out, "undid {}", entry.describe())?;
            }
            None => writeln!(out, "nothing to undo")?,
        },
        Command::Export { output } => {
            let path = output.unwrap_or_else(|| PathBuf::from(export_file_name(&now)));
            let json = store.export_snapshot(&now).to_json_pretty()?;
            fs::write(&path, json)
                .with_context(|| format!("failed to write export to {}", path.display()))?;
            writeln!(out, "exported to {}", path.display())?;
        }
        Command::Import { path } => {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let summary = saved(
                store
                    .import_snapshot(&raw)
                    .context("failed to import data; check the file format")?,
            )?;
            for note in &summary.skipped {
                writeln!(out, "skipped {note}")?;
            }
            writeln!(
                out,
                "imported {} check-ins, {} tasks",
                describe_count(summary.check_ins),
                describe_count(summary.tasks)
            )?;
        }
    }
    debug!("command finished");
    Ok(())
}

// Each command runs in its own process, so a change that was not written is lost.
fn saved<T>(mutation: Mutation<T>) -> Result<T> {
    mutation
        .into_persisted()
        .context("change applied but could not be saved; storage may be full or unavailable")
}

fn local_midnight(date: NaiveDate) -> Result<DateTime<Local>> {
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow!("invalid date {date}"))?;
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .ok_or_else(|| anyhow!("{date} has no local midnight"))
}

fn describe_count(count: Option<usize>) -> String {
    count.map_or_else(|| "unchanged".to_string(), |n| n.to_string())
}

fn write_check_in(out: &mut impl Write, item: &CheckIn, now: &DateTime<Local>) -> Result<()> {
    let status = item.status(now);
    let last = item
        .last_check_in_date
        .map(|date| format!("last check-in {}", format_date(&date.with_timezone(&Local))))
        .unwrap_or_else(|| "no check-ins yet".to_string());
    writeln!(
        out,
        "[{}] {} ({}; next due {}; {}; {}){} {}",
        check_in_badge(status.state),
        item.title,
        item.frequency_label(),
        format_date(&item.next_due_date.with_timezone(&Local)),
        describe_overdue(status.overdue_days),
        last,
        label_suffix(&item.labels),
        item.id
    )?;
    Ok(())
}

fn write_task(out: &mut impl Write, item: &Task, now: &DateTime<Local>) -> Result<()> {
    let status = item.status(now);
    let detail = match item.completed_date {
        Some(date) if item.completed => {
            format!("completed on {}", format_date(&date.with_timezone(&Local)))
        }
        _ => describe_age(status.days_old),
    };
    writeln!(
        out,
        "[{}] {} (created {}; {}){} {}",
        task_badge(status.state),
        item.title,
        format_date(&item.created_date.with_timezone(&Local)),
        detail,
        label_suffix(&item.labels),
        item.id
    )?;
    Ok(())
}

fn label_suffix(labels: &[String]) -> String {
    if labels.is_empty() {
        String::new()
    } else {
        format!(" #{}", labels.join(" #"))
    }
}
