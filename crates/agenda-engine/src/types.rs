//! Data model shared by the expander, search engine, planner and stores.
//!
//! [`Event`] is what a calendar store persists (a master event or a standalone
//! event). [`Occurrence`] is a derived, per-query value: one dated instance of
//! an event, never stored.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{AgendaError, Result};
use crate::interval::Interval;

/// Whether an event blocks time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    #[default]
    Busy,
    Free,
    Tentative,
    Unavailable,
}

/// Confirmation state of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Confirmed,
    Tentative,
    Canceled,
}

impl FromStr for EventStatus {
    type Err = AgendaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "confirmed" => Ok(EventStatus::Confirmed),
            "tentative" => Ok(EventStatus::Tentative),
            "canceled" | "cancelled" => Ok(EventStatus::Canceled),
            _ => Err(AgendaError::InvalidEvent(format!("unknown event status '{}'", s))),
        }
    }
}

/// Where a calendar lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarKind {
    #[default]
    Local,
    CalDav,
    Exchange,
    Subscription,
    Birthday,
}

impl CalendarKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalendarKind::Local => "local",
            CalendarKind::CalDav => "caldav",
            CalendarKind::Exchange => "exchange",
            CalendarKind::Subscription => "subscription",
            CalendarKind::Birthday => "birthday",
        }
    }
}

impl FromStr for CalendarKind {
    type Err = AgendaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(CalendarKind::Local),
            "caldav" => Ok(CalendarKind::CalDav),
            "exchange" => Ok(CalendarKind::Exchange),
            "subscription" => Ok(CalendarKind::Subscription),
            "birthday" => Ok(CalendarKind::Birthday),
            _ => Err(AgendaError::UnknownCalendarKind(s.to_string())),
        }
    }
}

/// A calendar as listed by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calendar {
    pub calendar_id: String,
    pub title: String,
    #[serde(default)]
    pub kind: CalendarKind,
    #[serde(default)]
    pub color: Option<String>,
    /// Account the calendar belongs to (e.g. "iCloud").
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub is_immutable: bool,
    #[serde(default = "default_true")]
    pub allows_modifications: bool,
}

fn default_true() -> bool {
    true
}

/// Reference from an event to its owning calendar.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CalendarRef {
    pub calendar_id: String,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    Required,
    Optional,
    Chair,
    NonParticipant,
}

/// An attendee's reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    Pending,
    Accepted,
    Declined,
    Tentative,
    Delegated,
    Completed,
    InProcess,
}

/// Organizer or attendee.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Participant {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<ParticipantRole>,
    #[serde(default)]
    pub status: Option<ParticipantStatus>,
}

impl Participant {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            email: Some(email.into()),
            role: None,
            status: None,
        }
    }

    pub fn with_role(mut self, role: ParticipantRole) -> Self {
        self.role = Some(role);
        self
    }

    pub fn with_status(mut self, status: ParticipantStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// A reminder attached to an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Alarm {
    /// Fires a number of minutes before each occurrence starts.
    Relative { minutes_before: u32 },
    /// Fires once at a fixed instant.
    Absolute { at: DateTime<Utc> },
}

impl Alarm {
    pub fn minutes_before(minutes: u32) -> Self {
        Alarm::Relative {
            minutes_before: minutes,
        }
    }

    pub fn at(at: DateTime<Utc>) -> Self {
        Alarm::Absolute { at }
    }

    /// When this alarm fires for an occurrence starting at `start`.
    pub fn fires_at(&self, start: DateTime<Utc>) -> DateTime<Utc> {
        match *self {
            Alarm::Relative { minutes_before } => {
                start - Duration::minutes(i64::from(minutes_before))
            }
            Alarm::Absolute { at } => at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    #[default]
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    /// RFC 5545 `FREQ` value.
    pub fn as_rrule(&self) -> &'static str {
        match self {
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Yearly => "YEARLY",
        }
    }
}

impl FromStr for Frequency {
    type Err = AgendaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            "yearly" => Ok(Frequency::Yearly),
            _ => Err(AgendaError::InvalidRecurrence(format!(
                "unknown frequency '{}'",
                s
            ))),
        }
    }
}

/// When a recurrence stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceEnd {
    /// Total number of occurrences, counted from the series start.
    Count(u32),
    /// Last instant an occurrence may start at (inclusive).
    Until(DateTime<Utc>),
}

/// Recurrence pattern attached to a master event.
///
/// The store owns rules; the engine reads them and proposes replacements
/// through an [`EditPlan`](crate::planner::EditPlan).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    #[serde(default = "default_interval")]
    pub interval: u32,
    #[serde(default)]
    pub end: Option<RecurrenceEnd>,
    #[serde(default)]
    pub days_of_week: Vec<Weekday>,
    /// 1..=31, or -31..=-1 counting from the end of the month.
    #[serde(default)]
    pub days_of_month: Vec<i8>,
    #[serde(default)]
    pub months_of_year: Vec<u8>,
    #[serde(default)]
    pub weeks_of_year: Vec<i8>,
    #[serde(default)]
    pub days_of_year: Vec<i16>,
    #[serde(default)]
    pub set_positions: Vec<i16>,
    /// Nominal starts removed from the series.
    #[serde(default)]
    pub exception_dates: Vec<DateTime<Utc>>,
}

fn default_interval() -> u32 {
    1
}

impl RecurrenceRule {
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            interval: 1,
            end: None,
            days_of_week: Vec::new(),
            days_of_month: Vec::new(),
            months_of_year: Vec::new(),
            weeks_of_year: Vec::new(),
            days_of_year: Vec::new(),
            set_positions: Vec::new(),
            exception_dates: Vec::new(),
        }
    }

    pub fn daily() -> Self {
        Self::new(Frequency::Daily)
    }

    pub fn weekly() -> Self {
        Self::new(Frequency::Weekly)
    }

    pub fn monthly() -> Self {
        Self::new(Frequency::Monthly)
    }

    pub fn yearly() -> Self {
        Self::new(Frequency::Yearly)
    }

    pub fn every(mut self, interval: u32) -> Self {
        self.interval = interval;
        self
    }

    pub fn count(mut self, count: u32) -> Self {
        self.end = Some(RecurrenceEnd::Count(count));
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.end = Some(RecurrenceEnd::Until(until));
        self
    }

    pub fn on_days(mut self, days: &[Weekday]) -> Self {
        self.days_of_week = days.to_vec();
        self
    }

    pub fn on_month_days(mut self, days: &[i8]) -> Self {
        self.days_of_month = days.to_vec();
        self
    }

    pub fn except(mut self, date: DateTime<Utc>) -> Self {
        self.exception_dates.push(date);
        self
    }
}

/// Marks a standalone event that replaces one occurrence of a series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detachment {
    pub series_id: String,
    pub occurrence_date: DateTime<Utc>,
}

/// A stored event: either the master of a recurring series or a standalone event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub is_all_day: bool,
    #[serde(default)]
    pub calendar: CalendarRef,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    /// IANA zone used to keep wall-clock time stable across occurrences. UTC when absent.
    #[serde(default)]
    pub time_zone: Option<String>,
    #[serde(default)]
    pub availability: Availability,
    #[serde(default)]
    pub status: Option<EventStatus>,
    #[serde(default)]
    pub organizer: Option<Participant>,
    #[serde(default)]
    pub attendees: Vec<Participant>,
    #[serde(default)]
    pub alarms: Vec<Alarm>,
    #[serde(default)]
    pub detached_from: Option<Detachment>,
}

impl Event {
    pub fn new(
        event_id: impl Into<String>,
        title: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            title: title.into(),
            start,
            end,
            is_all_day: false,
            calendar: CalendarRef::default(),
            location: None,
            notes: None,
            url: None,
            time_zone: None,
            availability: Availability::default(),
            status: None,
            organizer: None,
            attendees: Vec::new(),
            alarms: Vec::new(),
            detached_from: None,
        }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Reject events that end before they start.
    pub fn validate(&self) -> Result<()> {
        if self.end < self.start {
            return Err(AgendaError::InvalidEvent(format!(
                "event '{}' ends ({}) before it starts ({})",
                self.event_id, self.end, self.start
            )));
        }
        Ok(())
    }
}

/// One concrete dated instance of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    /// Series identifier, shared by every occurrence of a recurring event.
    pub event_id: String,
    /// Nominal start of this instance. For a detached event, the nominal
    /// start of the series occurrence it replaces. `None` for non-recurring events.
    pub occurrence_date: Option<DateTime<Utc>>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub title: String,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub url: Option<String>,
    pub organizer: Option<Participant>,
    pub attendees: Vec<Participant>,
    pub calendar: CalendarRef,
    pub is_all_day: bool,
    pub availability: Availability,
    pub status: Option<EventStatus>,
    pub alarms: Vec<Alarm>,
    pub is_recurring: bool,
    pub is_detached: bool,
}

impl Occurrence {
    /// Instantiate `event` at `start`, keeping its duration.
    pub fn at(event: &Event, start: DateTime<Utc>, occurrence_date: Option<DateTime<Utc>>) -> Self {
        Self {
            event_id: event.event_id.clone(),
            occurrence_date,
            start,
            end: start + event.duration(),
            title: event.title.clone(),
            location: event.location.clone(),
            notes: event.notes.clone(),
            url: event.url.clone(),
            organizer: event.organizer.clone(),
            attendees: event.attendees.clone(),
            calendar: event.calendar.clone(),
            is_all_day: event.is_all_day,
            availability: event.availability,
            status: event.status,
            alarms: event.alarms.clone(),
            is_recurring: occurrence_date.is_some(),
            is_detached: event.detached_from.is_some(),
        }
    }

    /// The busy interval this occurrence covers.
    pub fn interval(&self) -> Interval {
        Interval {
            start: self.start,
            end: self.end,
        }
    }
}

impl fmt::Display for Occurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.start.format("%Y-%m-%d %H:%M"), self.title)
    }
}
