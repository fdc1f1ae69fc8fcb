//! `agenda` CLI — query and edit a local calendar store from the command line.
//!
//! The store is a JSON file holding calendars, events and recurrence rules.
//! Read commands print pretty JSON; mutating commands write the store back.
//!
//! ## Usage
//!
//! ```sh
//! # List CalDAV calendars
//! agenda --store cal.json calendars --kind caldav
//!
//! # Occurrences in a window (recurring events expanded)
//! agenda --store cal.json events --from 2026-03-02T00:00:00 --to 2026-03-09T00:00:00
//!
//! # Search attendee emails
//! agenda --store cal.json search @acme.com --field attendee_email \
//!     --from 2026-03-01T00:00:00Z --to 2026-04-01T00:00:00Z
//!
//! # Free 30-minute slots in a workday
//! agenda --store cal.json free --from 2026-03-02T09:00:00 --to 2026-03-02T17:00:00 --min 30
//!
//! # Add a weekly event, then move one occurrence
//! agenda --store cal.json add gym "Gym" --start 2026-03-03T18:00:00 --end 2026-03-03T19:00:00 \
//!     --repeat weekly --count 10 --alarm 15
//! agenda --store cal.json update gym --date 2026-03-10T18:00:00 --span this \
//!     --start 2026-03-11T18:00:00
//!
//! # Delete the rest of a series
//! agenda --store cal.json delete gym --date 2026-03-17T18:00:00 --span future
//! ```

use std::io::{self, Read};
use std::path::Path;

use agenda_engine::{
    Agenda, Alarm, Availability, EditSpan, Event, EventStatus, EventUpdate, Frequency, Interval,
    MemoryStore, RecurrenceRule, SearchOptions,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDateTime, Utc, Weekday};
use clap::{Args, Parser, Subcommand};
use flexi_logger::Logger;
use log::{debug, info};
use serde_json::json;

#[derive(Parser)]
#[command(name = "agenda", version, about = "Query and edit a local calendar store")]
struct Cli {
    /// Store file (JSON). Created on first write if missing.
    #[arg(long, env = "AGENDA_STORE", global = true, default_value = "agenda.json")]
    store: String,

    /// Log level written to stderr (error, warn, info, debug, trace)
    #[arg(long, env = "AGENDA_LOG", global = true, default_value = "warn")]
    log_level: String,

    /// Output file for read commands (writes to stdout if omitted)
    #[arg(short, long, global = true)]
    output: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct WindowArgs {
    /// Window start (RFC 3339, or YYYY-MM-DDTHH:MM:SS in UTC)
    #[arg(long, value_parser = parse_datetime)]
    from: DateTime<Utc>,
    /// Window end, exclusive
    #[arg(long, value_parser = parse_datetime)]
    to: DateTime<Utc>,
    /// Only include these calendars (by title, repeatable)
    #[arg(long = "calendar")]
    calendars: Vec<String>,
}

impl WindowArgs {
    fn window(&self) -> Result<Interval> {
        Interval::new(self.from, self.to).context("Invalid window")
    }

    fn calendar_filter(&self) -> Option<Vec<&str>> {
        (!self.calendars.is_empty()).then(|| self.calendars.iter().map(String::as_str).collect())
    }
}

#[derive(Args)]
struct TargetArgs {
    /// Event id (the series id for recurring events)
    event_id: String,
    /// Occurrence to target; required for recurring events
    #[arg(long, value_parser = parse_datetime)]
    date: Option<DateTime<Utc>>,
    /// Which occurrences to change: "this" or "future"
    #[arg(long, default_value = "this")]
    span: EditSpan,
}

#[derive(Subcommand)]
enum Commands {
    /// List calendars
    Calendars {
        /// Only calendars of this kind (local, caldav, exchange, subscription, birthday)
        #[arg(long)]
        kind: Option<String>,
        /// Only calendars whose source contains this text
        #[arg(long)]
        source: Option<String>,
    },
    /// List occurrences in a window
    Events {
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Search occurrences in a window
    Search {
        /// Text to look for (case-insensitive unless --case-sensitive)
        query: String,
        #[command(flatten)]
        window: WindowArgs,
        /// Fields to search (repeatable); all fields if omitted
        #[arg(long = "field")]
        fields: Vec<String>,
        #[arg(long)]
        case_sensitive: bool,
    },
    /// Find free time slots in a window
    Free {
        #[command(flatten)]
        window: WindowArgs,
        /// Minimum slot length in minutes
        #[arg(long = "min", default_value_t = 30)]
        min_minutes: i64,
        /// Print only the earliest slot
        #[arg(long)]
        first: bool,
    },
    /// Add an event
    Add {
        event_id: String,
        title: String,
        #[arg(long, value_parser = parse_datetime)]
        start: DateTime<Utc>,
        #[arg(long, value_parser = parse_datetime)]
        end: DateTime<Utc>,
        /// Calendar title
        #[arg(long)]
        calendar: Option<String>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        url: Option<String>,
        /// IANA timezone that recurring occurrences keep their wall-clock time in
        #[arg(long)]
        time_zone: Option<String>,
        #[arg(long)]
        all_day: bool,
        #[arg(long, value_parser = parse_availability)]
        availability: Option<Availability>,
        /// confirmed, tentative or canceled
        #[arg(long)]
        status: Option<EventStatus>,
        /// Reminder: minutes before the start, or a datetime (repeatable)
        #[arg(long = "alarm", value_parser = parse_alarm)]
        alarms: Vec<Alarm>,
        /// Repeat: daily, weekly, monthly or yearly
        #[arg(long)]
        repeat: Option<Frequency>,
        #[arg(long, default_value_t = 1)]
        interval: u32,
        #[arg(long, requires = "repeat", conflicts_with = "until")]
        count: Option<u32>,
        #[arg(long, requires = "repeat", value_parser = parse_datetime)]
        until: Option<DateTime<Utc>>,
        /// Weekdays for the rule (e.g. mo,we,fr)
        #[arg(long = "on", requires = "repeat", value_delimiter = ',', value_parser = parse_weekday)]
        days: Vec<Weekday>,
    },
    /// Update an event or some of its occurrences
    Update {
        #[command(flatten)]
        target: TargetArgs,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, value_parser = parse_datetime)]
        start: Option<DateTime<Utc>>,
        #[arg(long, value_parser = parse_datetime)]
        end: Option<DateTime<Utc>>,
        /// New location; an empty string clears it
        #[arg(long)]
        location: Option<String>,
        /// New notes; an empty string clears them
        #[arg(long)]
        notes: Option<String>,
        /// New URL; an empty string clears it
        #[arg(long)]
        url: Option<String>,
        #[arg(long, value_parser = parse_availability)]
        availability: Option<Availability>,
        /// New status; an empty string clears it
        #[arg(long)]
        status: Option<String>,
        /// Replace the reminders: minutes before the start, or a datetime (repeatable)
        #[arg(long = "alarm", value_parser = parse_alarm, conflicts_with = "no_alarms")]
        alarms: Vec<Alarm>,
        /// Remove every reminder
        #[arg(long)]
        no_alarms: bool,
    },
    /// Delete an event or some of its occurrences
    Delete {
        #[command(flatten)]
        target: TargetArgs,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let _logger = Logger::try_with_str(&cli.log_level)
        .with_context(|| format!("Invalid log level: {}", cli.log_level))?
        .log_to_stderr()
        .start()
        .context("Failed to start logger")?;

    let mut agenda = Agenda::new(load_store(&cli.store)?);
    let output = cli.output.as_deref();

    match cli.command {
        Commands::Calendars { kind, source } => {
            let calendars = agenda.list_calendars(kind.as_deref(), source.as_deref())?;
            write_json(output, &calendars)?;
        }
        Commands::Events { window } => {
            let calendars = window.calendar_filter();
            let occurrences = agenda.events(&window.window()?, calendars.as_deref())?;
            write_json(output, &occurrences)?;
        }
        Commands::Search {
            query,
            window,
            fields,
            case_sensitive,
        } => {
            let mut options = if fields.is_empty() {
                SearchOptions::default()
            } else {
                let names: Vec<&str> = fields.iter().map(String::as_str).collect();
                SearchOptions::with_field_names(&names)?
            };
            options.case_sensitive = case_sensitive;

            let calendars = window.calendar_filter();
            let found = agenda.find_events(&query, &window.window()?, &options, calendars.as_deref())?;
            write_json(output, &found)?;
        }
        Commands::Free {
            window,
            min_minutes,
            first,
        } => {
            let calendars = window.calendar_filter();
            let min_duration = Duration::try_minutes(min_minutes)
                .with_context(|| format!("--min out of range: {} minutes", min_minutes))?;
            if first {
                let slot = agenda.find_first_free_slot(
                    &window.window()?,
                    min_duration,
                    calendars.as_deref(),
                )?;
                write_json(output, &slot)?;
            } else {
                let slots =
                    agenda.find_free_time(&window.window()?, min_duration, calendars.as_deref())?;
                write_json(output, &slots)?;
            }
        }
        Commands::Add {
            event_id,
            title,
            start,
            end,
            calendar,
            location,
            notes,
            url,
            time_zone,
            all_day,
            availability,
            status,
            alarms,
            repeat,
            interval,
            count,
            until,
            days,
        } => {
            let mut event = Event::new(event_id, title, start, end);
            if let Some(name) = calendar {
                event.calendar = agenda.resolve_calendar(&name)?;
            }
            event.location = location;
            event.notes = notes;
            event.url = url;
            event.time_zone = time_zone;
            event.is_all_day = all_day;
            event.availability = availability.unwrap_or_default();
            event.status = status;
            event.alarms = alarms;

            let rule = repeat.map(|frequency| {
                let mut rule = RecurrenceRule::new(frequency).every(interval).on_days(&days);
                if let Some(count) = count {
                    rule = rule.count(count);
                }
                if let Some(until) = until {
                    rule = rule.until(until);
                }
                rule
            });

            let created = agenda.add_event(event, rule)?;
            save_store(&cli.store, agenda.store())?;
            write_json(None, &created)?;
        }
        Commands::Update {
            target,
            title,
            start,
            end,
            location,
            notes,
            url,
            availability,
            status,
            alarms,
            no_alarms,
        } => {
            let status = match status.map(clearable) {
                Some(Some(name)) => Some(Some(name.parse::<EventStatus>()?)),
                Some(None) => Some(None),
                None => None,
            };
            let alarms = if no_alarms {
                Some(Vec::new())
            } else {
                (!alarms.is_empty()).then_some(alarms)
            };
            let update = EventUpdate {
                title,
                start,
                end,
                location: location.map(clearable),
                notes: notes.map(clearable),
                url: url.map(clearable),
                is_all_day: None,
                availability,
                status,
                alarms,
            };
            agenda.update_event(&target.event_id, update, target.span, target.date)?;
            save_store(&cli.store, agenda.store())?;
            info!("updated '{}'", target.event_id);
            write_json(None, &mutation_report("updated", &target))?;
        }
        Commands::Delete { target } => {
            agenda.delete_event(&target.event_id, target.span, target.date)?;
            save_store(&cli.store, agenda.store())?;
            info!("deleted '{}'", target.event_id);
            write_json(None, &mutation_report("deleted", &target))?;
        }
    }

    Ok(())
}

fn mutation_report(status: &str, target: &TargetArgs) -> serde_json::Value {
    json!({
        "status": status,
        "event_id": target.event_id,
        "span": target.span,
        "occurrence_date": target.date,
    })
}

/// Empty strings clear a field.
fn clearable(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

fn load_store(path: &str) -> Result<MemoryStore> {
    if path == "-" {
        return MemoryStore::from_json(&read_input(None)?).context("Failed to parse store");
    }
    if !Path::new(path).exists() {
        debug!("store {} does not exist yet, starting empty", path);
        return Ok(MemoryStore::new());
    }
    let json = read_input(Some(path))?;
    MemoryStore::from_json(&json).with_context(|| format!("Failed to parse store: {}", path))
}

fn save_store(path: &str, store: &MemoryStore) -> Result<()> {
    anyhow::ensure!(path != "-", "Cannot save changes to a store read from stdin");
    let json = store.to_json()?;
    std::fs::write(path, json).with_context(|| format!("Failed to write store: {}", path))
}

fn read_input(path: Option<&str>) -> Result<String> {
    match path {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path))
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            Ok(buf)
        }
    }
}

fn write_json<T: serde::Serialize + ?Sized>(path: Option<&str>, value: &T) -> Result<()> {
    let mut content = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    content.push('\n');
    match path {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write file: {}", path))?;
        }
        None => {
            print!("{}", content);
        }
    }
    Ok(())
}

/// Parse an RFC 3339 datetime, or a naive `YYYY-MM-DDTHH:MM:SS` taken as UTC.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|e| format!("Invalid datetime '{}': {}", s, e))
}

fn parse_weekday(s: &str) -> Result<Weekday, String> {
    let code = s.trim().to_ascii_lowercase();
    match code.get(..2) {
        Some("mo") => Ok(Weekday::Mon),
        Some("tu") => Ok(Weekday::Tue),
        Some("we") => Ok(Weekday::Wed),
        Some("th") => Ok(Weekday::Thu),
        Some("fr") => Ok(Weekday::Fri),
        Some("sa") => Ok(Weekday::Sat),
        Some("su") => Ok(Weekday::Sun),
        _ => Err(format!("Invalid weekday '{}'", s)),
    }
}

/// Whole minutes before the start, otherwise an absolute datetime.
fn parse_alarm(s: &str) -> Result<Alarm, String> {
    if let Ok(minutes) = s.parse::<u32>() {
        return Ok(Alarm::minutes_before(minutes));
    }
    parse_datetime(s)
        .map(Alarm::at)
        .map_err(|_| format!("Invalid alarm '{}': expected minutes or a datetime", s))
}

fn parse_availability(s: &str) -> Result<Availability, String> {
    match s.to_ascii_lowercase().as_str() {
        "busy" => Ok(Availability::Busy),
        "free" => Ok(Availability::Free),
        "tentative" => Ok(Availability::Tentative),
        "unavailable" => Ok(Availability::Unavailable),
        _ => Err(format!(
            "Invalid availability '{}'. Valid values: busy, free, tentative, unavailable",
            s
        )),
    }
}
