//! The [`Agenda`] facade: the engine's components wired to a calendar store.
//!
//! Every query re-reads the store and re-expands recurring events; nothing is
//! cached between calls because the store may change underneath.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use log::info;

use crate::error::{AgendaError, Result};
use crate::expander::{self, expand};
use crate::freebusy::{self, FreeSlot};
use crate::interval::Interval;
use crate::planner::{
    plan_detached_delete, plan_edit_with_detached, EditPlan, EditSpan, EventUpdate, Mutation,
};
use crate::search::{search_with, SearchOptions};
use crate::store::CalendarStore;
use crate::types::{Availability, Calendar, CalendarKind, CalendarRef, Event, Occurrence, RecurrenceRule};

/// Query and mutation entry point over a [`CalendarStore`].
#[derive(Debug)]
pub struct Agenda<S: CalendarStore> {
    store: S,
}

impl<S: CalendarStore> Agenda<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// List calendars, optionally filtered by kind name and by a
    /// case-insensitive substring of the source.
    ///
    /// # Errors
    /// `UnknownCalendarKind` when `kind` is not a known kind name.
    pub fn list_calendars(&self, kind: Option<&str>, source: Option<&str>) -> Result<Vec<Calendar>> {
        let kind = kind.map(str::parse::<CalendarKind>).transpose()?;
        let source = source.map(str::to_lowercase);

        Ok(self
            .store
            .list_calendars()?
            .into_iter()
            .filter(|c| kind.map_or(true, |k| c.kind == k))
            .filter(|c| match &source {
                Some(wanted) => c
                    .source
                    .as_ref()
                    .is_some_and(|s| s.to_lowercase().contains(wanted)),
                None => true,
            })
            .collect())
    }

    /// Look up a calendar by title (case-insensitive).
    pub fn resolve_calendar(&self, title: &str) -> Result<CalendarRef> {
        let wanted = title.to_lowercase();
        self.store
            .list_calendars()?
            .into_iter()
            .find(|c| c.title.to_lowercase() == wanted)
            .map(|c| CalendarRef {
                calendar_id: c.calendar_id,
                title: c.title,
            })
            .ok_or_else(|| AgendaError::CalendarNotFound(title.to_string()))
    }

    /// All occurrences in `window`, sorted by start.
    ///
    /// Recurring events are expanded. A series occurrence replaced by a
    /// detached event is hidden; the detached event shows instead.
    /// `calendars` restricts results to calendars with these titles.
    pub fn events(&self, window: &Interval, calendars: Option<&[&str]>) -> Result<Vec<Occurrence>> {
        window.ensure_window()?;
        let records = self.store.fetch_master_events(window)?;
        let wanted: Option<Vec<String>> =
            calendars.map(|names| names.iter().map(|n| n.to_lowercase()).collect());

        let replaced: HashSet<(String, DateTime<Utc>)> = records
            .iter()
            .filter_map(|(event, _)| event.detached_from.as_ref())
            .map(|d| (d.series_id.clone(), d.occurrence_date))
            .collect();

        let mut occurrences = Vec::new();
        for (event, rule) in &records {
            if let Some(wanted) = &wanted {
                if !wanted.contains(&event.calendar.title.to_lowercase()) {
                    continue;
                }
            }
            for occ in expand(event, rule.as_ref(), window)? {
                let hidden = occ
                    .occurrence_date
                    .is_some_and(|d| replaced.contains(&(occ.event_id.clone(), d)));
                if !hidden {
                    occurrences.push(occ);
                }
            }
        }

        occurrences.sort_by(|a, b| (a.start, &a.event_id).cmp(&(b.start, &b.event_id)));
        Ok(occurrences)
    }

    /// Occurrences in `window` matching `query`.
    pub fn find_events(
        &self,
        query: &str,
        window: &Interval,
        options: &SearchOptions,
        calendars: Option<&[&str]>,
    ) -> Result<Vec<Occurrence>> {
        let occurrences = self.events(window, calendars)?;
        Ok(search_with(&occurrences, query, options))
    }

    /// Free slots of at least `min_duration` in `window`.
    ///
    /// Occurrences marked [`Availability::Free`] do not block time.
    pub fn find_free_time(
        &self,
        window: &Interval,
        min_duration: Duration,
        calendars: Option<&[&str]>,
    ) -> Result<Vec<FreeSlot>> {
        freebusy::validate_request(window, min_duration)?;
        let busy = self.busy_intervals(window, calendars)?;
        freebusy::find_free_time(&busy, window, min_duration)
    }

    /// The earliest free slot of at least `min_duration` in `window`.
    pub fn find_first_free_slot(
        &self,
        window: &Interval,
        min_duration: Duration,
        calendars: Option<&[&str]>,
    ) -> Result<Option<FreeSlot>> {
        freebusy::validate_request(window, min_duration)?;
        let busy = self.busy_intervals(window, calendars)?;
        freebusy::find_first_free_slot(&busy, window, min_duration)
    }

    fn busy_intervals(&self, window: &Interval, calendars: Option<&[&str]>) -> Result<Vec<Interval>> {
        Ok(self
            .events(window, calendars)?
            .iter()
            .filter(|occ| occ.availability != Availability::Free)
            .map(Occurrence::interval)
            .collect())
    }

    /// Create a new event, optionally recurring.
    ///
    /// # Errors
    /// `InvalidEvent` when the event ends before it starts or its id is taken;
    /// rule and timezone errors from the expander.
    pub fn add_event(&mut self, event: Event, rule: Option<RecurrenceRule>) -> Result<Event> {
        event.validate()?;
        expander::timezone_of(&event)?;
        if let Some(rule) = &rule {
            expander::validate_rule(&event, rule)?;
        }
        if self.store.fetch_event(&event.event_id)?.is_some() {
            return Err(AgendaError::InvalidEvent(format!(
                "an event with id '{}' already exists",
                event.event_id
            )));
        }

        info!("adding event '{}'", event.event_id);
        self.store.apply_plan(&EditPlan::create(event.clone(), rule))?;
        Ok(event)
    }

    /// Update an event. Recurring events need `occurrence_date` and `span`.
    pub fn update_event(
        &mut self,
        event_id: &str,
        update: EventUpdate,
        span: EditSpan,
        occurrence_date: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.mutate(event_id, span, occurrence_date, Mutation::Update(update))
    }

    /// Delete an event. Recurring events need `occurrence_date` and `span`.
    ///
    /// Deleting a detached event also removes the series occurrence it
    /// replaced, so the original does not come back.
    pub fn delete_event(
        &mut self,
        event_id: &str,
        span: EditSpan,
        occurrence_date: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.mutate(event_id, span, occurrence_date, Mutation::Delete)
    }

    fn mutate(
        &mut self,
        event_id: &str,
        span: EditSpan,
        occurrence_date: Option<DateTime<Utc>>,
        mutation: Mutation,
    ) -> Result<()> {
        let (event, rule) = self
            .store
            .fetch_event(event_id)?
            .ok_or_else(|| AgendaError::EventNotFound(event_id.to_string()))?;
        let options = self.store.capabilities();

        let plan = match (&event.detached_from, &mutation) {
            (Some(detachment), Mutation::Delete) => {
                let series = self.store.fetch_event(&detachment.series_id)?;
                let siblings = self.store.fetch_detached(&detachment.series_id)?;
                plan_detached_delete(
                    &event,
                    series.as_ref().map(|(master, rule)| (master, rule.as_ref())),
                    &siblings,
                    options,
                )?
            }
            _ => {
                let detached = match rule {
                    Some(_) => self.store.fetch_detached(event_id)?,
                    None => Vec::new(),
                };
                plan_edit_with_detached(
                    &event,
                    rule.as_ref(),
                    occurrence_date,
                    span,
                    &mutation,
                    options,
                    &detached,
                )?
            }
        };

        info!(
            "applying {} step(s) to '{}' (span={})",
            plan.steps().len(),
            event_id,
            span
        );
        self.store.apply_plan(&plan)
    }
}
