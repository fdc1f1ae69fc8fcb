//! The calendar store seam and an in-memory implementation.
//!
//! The engine never persists anything itself. Everything it reads comes from
//! a [`CalendarStore`], and every change it makes is an [`EditPlan`] handed
//! back to that store.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{AgendaError, Result};
use crate::interval::Interval;
use crate::planner::{EditPlan, PlanOptions, PlanStep};
use crate::types::{Calendar, Event, RecurrenceRule};

/// A calendar provider: the source of truth for calendars, events and rules.
pub trait CalendarStore {
    fn list_calendars(&self) -> Result<Vec<Calendar>>;

    /// Events that may have occurrences in `window`, with their rules.
    ///
    /// Must include every detached event whose replaced occurrence date falls
    /// before `window.end`. Implementations may return more than needed;
    /// callers expand and filter.
    fn fetch_master_events(&self, window: &Interval) -> Result<Vec<(Event, Option<RecurrenceRule>)>>;

    fn fetch_event(&self, event_id: &str) -> Result<Option<(Event, Option<RecurrenceRule>)>>;

    /// Events whose `detached_from` names `series_id`.
    fn fetch_detached(&self, series_id: &str) -> Result<Vec<Event>>;

    /// Apply every step of `plan` in order. Errors are reported as
    /// [`AgendaError::Store`].
    fn apply_plan(&mut self, plan: &EditPlan) -> Result<()>;

    /// What kinds of plans this store can apply.
    fn capabilities(&self) -> PlanOptions {
        PlanOptions::default()
    }
}

/// An event record as kept by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event: Event,
    #[serde(default)]
    pub rule: Option<RecurrenceRule>,
}

/// Calendars and events held in memory, serializable as JSON.
///
/// Plans are applied all-or-nothing: a failing step leaves the store as it
/// was before the plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStore {
    #[serde(default)]
    pub calendars: Vec<Calendar>,
    #[serde(default)]
    events: Vec<StoredEvent>,
    #[serde(default)]
    capabilities: PlanOptions,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that cannot exclude single dates from a rule.
    pub fn without_exception_dates() -> Self {
        Self {
            capabilities: PlanOptions {
                exception_dates: false,
            },
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| AgendaError::Store(format!("invalid store file: {}", e)))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| AgendaError::Store(e.to_string()))
    }

    pub fn add_calendar(&mut self, calendar: Calendar) {
        self.calendars.push(calendar);
    }

    /// Insert or replace an event by id.
    pub fn insert(&mut self, event: Event, rule: Option<RecurrenceRule>) {
        match self.position(&event.event_id) {
            Some(i) => self.events[i] = StoredEvent { event, rule },
            None => self.events.push(StoredEvent { event, rule }),
        }
    }

    pub fn events(&self) -> &[StoredEvent] {
        &self.events
    }

    fn position(&self, event_id: &str) -> Option<usize> {
        self.events.iter().position(|s| s.event.event_id == event_id)
    }

    fn apply_step(&mut self, step: &PlanStep) -> Result<()> {
        match step {
            PlanStep::DeleteEvent { event_id } => {
                let i = self.require(event_id)?;
                self.events.remove(i);
            }
            PlanStep::ReplaceRule { event_id, rule } => {
                let i = self.require(event_id)?;
                self.events[i].rule = Some(rule.clone());
            }
            PlanStep::UpdateEvent { event } => {
                let i = self.require(&event.event_id)?;
                self.events[i].event = event.clone();
            }
            PlanStep::CreateEvent { event, rule } => self.insert(event.clone(), rule.clone()),
        }
        Ok(())
    }

    fn require(&self, event_id: &str) -> Result<usize> {
        self.position(event_id)
            .ok_or_else(|| AgendaError::Store(format!("event '{}' does not exist", event_id)))
    }
}

impl CalendarStore for MemoryStore {
    fn list_calendars(&self) -> Result<Vec<Calendar>> {
        Ok(self.calendars.clone())
    }

    fn fetch_master_events(&self, window: &Interval) -> Result<Vec<(Event, Option<RecurrenceRule>)>> {
        Ok(self
            .events
            .iter()
            .filter(|s| {
                // Detached events are returned whenever the occurrence they
                // replace could be in the window, even if they were moved out of it.
                let replaces_visible = s
                    .event
                    .detached_from
                    .as_ref()
                    .is_some_and(|d| d.occurrence_date < window.end);
                let may_overlap = s.event.start < window.end
                    && (s.rule.is_some() || s.event.end >= window.start);
                replaces_visible || may_overlap
            })
            .map(|s| (s.event.clone(), s.rule.clone()))
            .collect())
    }

    fn fetch_event(&self, event_id: &str) -> Result<Option<(Event, Option<RecurrenceRule>)>> {
        Ok(self
            .position(event_id)
            .map(|i| (self.events[i].event.clone(), self.events[i].rule.clone())))
    }

    fn fetch_detached(&self, series_id: &str) -> Result<Vec<Event>> {
        Ok(self
            .events
            .iter()
            .filter(|s| {
                s.event
                    .detached_from
                    .as_ref()
                    .is_some_and(|d| d.series_id == series_id)
            })
            .map(|s| s.event.clone())
            .collect())
    }

    fn apply_plan(&mut self, plan: &EditPlan) -> Result<()> {
        let backup = self.events.clone();
        for step in plan.steps() {
            if let Err(e) = self.apply_step(step) {
                self.events = backup;
                return Err(e);
            }
        }
        debug!("applied {} plan step(s)", plan.steps().len());
        Ok(())
    }

    fn capabilities(&self) -> PlanOptions {
        self.capabilities
    }
}
