//! Error types for agenda-engine operations.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgendaError {
    /// Malformed or non-terminating recurrence rule.
    #[error("Invalid recurrence: {0}")]
    InvalidRecurrence(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    /// Unknown search field name.
    #[error("Unknown search field '{field}'. Valid fields: {valid}")]
    InvalidField { field: String, valid: String },

    /// A span-scoped mutation on a recurring event without a disambiguating date.
    #[error(
        "This is a recurring event. An occurrence date and span (\"this\" or \"future\") \
         are required to say which occurrences to change"
    )]
    MissingOccurrenceDate,

    #[error("No occurrence of event '{event_id}' at {occurrence_date}")]
    OccurrenceNotFound {
        event_id: String,
        occurrence_date: String,
    },

    /// Non-positive minimum duration or an empty/negative window.
    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    #[error("span must be 'this' or 'future', got '{0}'")]
    InvalidSpan(String),

    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("Unknown calendar kind '{0}'. Valid kinds: local, caldav, exchange, subscription, birthday")]
    UnknownCalendarKind(String),

    #[error("Calendar '{0}' not found")]
    CalendarNotFound(String),

    #[error("Event '{0}' not found")]
    EventNotFound(String),

    /// Failure reported by the calendar store, passed through unchanged.
    #[error("Store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, AgendaError>;
