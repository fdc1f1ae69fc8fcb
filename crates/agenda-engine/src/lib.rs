//! # agenda-engine
//!
//! Query and mutation logic over local calendar data.
//!
//! The engine sits between a calendar store and its callers. It expands
//! recurring events into dated occurrences, searches them, finds free time,
//! and turns "this occurrence" / "future occurrences" edits into store
//! mutations. Every component is a pure function over its inputs; the store
//! is reached only through the [`CalendarStore`] trait.
//!
//! ## Modules
//!
//! - [`interval`] — Half-open interval overlap, clamp, merge and gaps
//! - [`expander`] — Master event + recurrence rule → occurrences in a window
//! - [`search`] — Case-insensitive multi-field text search over occurrences
//! - [`freebusy`] — Free slots from busy intervals
//! - [`planner`] — Edit/delete requests on a series → [`EditPlan`]
//! - [`store`] — The [`CalendarStore`] seam and the in-memory [`MemoryStore`]
//! - [`agenda`] — [`Agenda`] facade wiring the above to a store
//! - [`types`] — Events, occurrences, rules, calendars
//! - [`error`] — Error types

pub mod agenda;
pub mod error;
pub mod expander;
pub mod freebusy;
pub mod interval;
pub mod planner;
pub mod search;
pub mod store;
pub mod types;

pub use agenda::Agenda;
pub use error::{AgendaError, Result};
pub use expander::expand;
pub use freebusy::{find_free_time, FreeSlot};
pub use interval::Interval;
pub use planner::{
    plan_detached_delete, plan_edit, plan_edit_with_detached, EditPlan, EditSpan, EventUpdate,
    Mutation, PlanOptions, PlanStep,
};
pub use search::{search, search_with, SearchField, SearchOptions};
pub use store::{CalendarStore, MemoryStore};
pub use types::{
    Alarm, Availability, Calendar, CalendarKind, CalendarRef, Detachment, Event, EventStatus,
    Frequency, Occurrence, Participant, ParticipantRole, ParticipantStatus, RecurrenceEnd,
    RecurrenceRule,
};
