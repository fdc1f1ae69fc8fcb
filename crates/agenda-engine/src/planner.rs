//! Translate "this occurrence" / "future occurrences" edits into store mutations.
//!
//! The planner never touches a store. It returns an [`EditPlan`]: an ordered
//! list of steps that a [`CalendarStore`](crate::store::CalendarStore) applies.
//! Steps that remove or truncate always come before steps that create, so a
//! plan interrupted halfway can leave a series short but never duplicated.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, TimeZone, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{AgendaError, Result};
use crate::expander::{self, next_occurrence_after, validate_rule};
use crate::types::{
    Alarm, Availability, Detachment, Event, EventStatus, RecurrenceEnd, RecurrenceRule,
};

/// Which occurrences of a recurring series an edit applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditSpan {
    /// Only the occurrence at the given date.
    #[default]
    This,
    /// The occurrence at the given date and every later one.
    Future,
}

impl FromStr for EditSpan {
    type Err = AgendaError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "this" => Ok(EditSpan::This),
            "future" => Ok(EditSpan::Future),
            other => Err(AgendaError::InvalidSpan(other.to_string())),
        }
    }
}

impl fmt::Display for EditSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EditSpan::This => "this",
            EditSpan::Future => "future",
        })
    }
}

/// Field-level changes to an event.
///
/// Clearable fields are `Option<Option<_>>`: `None` leaves the field alone,
/// `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventUpdate {
    #[serde(default)]
    pub title: Option<String>,
    /// New start. Without a new `end`, the event keeps its duration.
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location: Option<Option<String>>,
    #[serde(default)]
    pub notes: Option<Option<String>>,
    #[serde(default)]
    pub url: Option<Option<String>>,
    #[serde(default)]
    pub is_all_day: Option<bool>,
    #[serde(default)]
    pub availability: Option<Availability>,
    #[serde(default)]
    pub status: Option<Option<EventStatus>>,
    /// Replaces the whole alarm list.
    #[serde(default)]
    pub alarms: Option<Vec<Alarm>>,
}

impl EventUpdate {
    pub fn apply_to(&self, event: &mut Event) {
        if let Some(title) = &self.title {
            event.title = title.clone();
        }
        match (self.start, self.end) {
            (Some(start), Some(end)) => {
                event.start = start;
                event.end = end;
            }
            (Some(start), None) => {
                let duration = event.duration();
                event.start = start;
                event.end = start + duration;
            }
            (None, Some(end)) => event.end = end,
            (None, None) => {}
        }
        if let Some(location) = &self.location {
            event.location = location.clone();
        }
        if let Some(notes) = &self.notes {
            event.notes = notes.clone();
        }
        if let Some(url) = &self.url {
            event.url = url.clone();
        }
        if let Some(all_day) = self.is_all_day {
            event.is_all_day = all_day;
        }
        if let Some(availability) = self.availability {
            event.availability = availability;
        }
        if let Some(status) = self.status {
            event.status = status;
        }
        if let Some(alarms) = &self.alarms {
            event.alarms = alarms.clone();
        }
    }
}

/// What to do to the targeted occurrences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Update(EventUpdate),
    Delete,
}

/// Capabilities of the store a plan is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanOptions {
    /// Whether the store can exclude single dates from a rule. Without it,
    /// deleting one occurrence splits the series in two.
    pub exception_dates: bool,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            exception_dates: true,
        }
    }
}

/// One mutation against the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PlanStep {
    /// Remove an event (and with it its whole series).
    DeleteEvent { event_id: String },
    /// Replace the recurrence rule of an existing master.
    ReplaceRule {
        event_id: String,
        rule: RecurrenceRule,
    },
    /// Overwrite an existing event's fields.
    UpdateEvent { event: Event },
    /// Insert an event, replacing any event with the same id.
    CreateEvent {
        event: Event,
        rule: Option<RecurrenceRule>,
    },
}

impl PlanStep {
    /// 0 for removal/truncation, 1 for writes of new content.
    fn phase(&self) -> u8 {
        match self {
            PlanStep::DeleteEvent { .. } | PlanStep::ReplaceRule { .. } => 0,
            PlanStep::UpdateEvent { .. } | PlanStep::CreateEvent { .. } => 1,
        }
    }
}

/// Ordered store mutations produced by [`plan_edit`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EditPlan {
    steps: Vec<PlanStep>,
}

impl EditPlan {
    /// Build a plan; steps are reordered so removals precede creations.
    pub fn new(mut steps: Vec<PlanStep>) -> Self {
        steps.sort_by_key(PlanStep::phase);
        Self { steps }
    }

    /// A plan that inserts one event.
    pub fn create(event: Event, rule: Option<RecurrenceRule>) -> Self {
        Self::new(vec![PlanStep::CreateEvent { event, rule }])
    }

    /// Steps in the order they must be applied.
    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Ids of events the plan removes.
    pub fn deleted_events(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter_map(|s| match s {
                PlanStep::DeleteEvent { event_id } => Some(event_id.as_str()),
                _ => None,
            })
            .collect()
    }

    /// The rule written back to the original master, if any.
    pub fn replacement_rule(&self) -> Option<&RecurrenceRule> {
        self.steps.iter().find_map(|s| match s {
            PlanStep::ReplaceRule { rule, .. } => Some(rule),
            _ => None,
        })
    }

    /// The event the plan creates (detached occurrence or new master), if any.
    pub fn created_event(&self) -> Option<(&Event, Option<&RecurrenceRule>)> {
        self.steps.iter().find_map(|s| match s {
            PlanStep::CreateEvent { event, rule } => Some((event, rule.as_ref())),
            _ => None,
        })
    }

    pub fn updated_event(&self) -> Option<&Event> {
        self.steps.iter().find_map(|s| match s {
            PlanStep::UpdateEvent { event } => Some(event),
            _ => None,
        })
    }
}

/// Plan an edit or delete of `master`.
///
/// For a non-recurring master (`rule` is `None`) `span` and `occurrence_date`
/// are ignored and the event itself is updated or deleted.
///
/// For a recurring master:
/// - `This` + update: a standalone event replacing the occurrence, rule untouched.
/// - `This` + delete: the date is added to the rule's exception dates, or the
///   series is split around it when the store has no exception dates.
/// - `Future`: the rule is truncated to end the day before the date; an update
///   also creates a new master at the date carrying the rest of the series.
///
/// # Errors
/// - `MissingOccurrenceDate` for a recurring master without `occurrence_date`.
/// - `OccurrenceNotFound` when the date is not (or no longer) in the series.
/// - `InvalidEvent` when the update would end an event before it starts.
/// - Any rule error from the expander.
pub fn plan_edit(
    master: &Event,
    rule: Option<&RecurrenceRule>,
    occurrence_date: Option<DateTime<Utc>>,
    span: EditSpan,
    mutation: &Mutation,
    options: PlanOptions,
) -> Result<EditPlan> {
    plan_edit_with_detached(master, rule, occurrence_date, span, mutation, options, &[])
}

/// [`plan_edit`] for a series that already has detached events.
///
/// When the plan moves the rest of the series to a new master, every event in
/// `detached` that replaces one of the moved dates is re-pointed at the new
/// master, so it keeps hiding the occurrence it replaces. Events detached from
/// other series are ignored.
pub fn plan_edit_with_detached(
    master: &Event,
    rule: Option<&RecurrenceRule>,
    occurrence_date: Option<DateTime<Utc>>,
    span: EditSpan,
    mutation: &Mutation,
    options: PlanOptions,
    detached: &[Event],
) -> Result<EditPlan> {
    let rule = match rule {
        Some(rule) => rule,
        None => return plan_single(master, mutation),
    };
    let date = occurrence_date.ok_or(AgendaError::MissingOccurrenceDate)?;

    if !expander::is_occurrence(master, rule, date)? {
        return Err(AgendaError::OccurrenceNotFound {
            event_id: master.event_id.clone(),
            occurrence_date: date.to_rfc3339(),
        });
    }
    let has_earlier = expander::has_occurrence_before(master, rule, date)?;

    let steps = match (span, mutation) {
        (EditSpan::This, Mutation::Update(update)) => {
            let id = derived_id(&master.event_id, '@', date);
            let mut replacement = instance_of(master, date, id);
            replacement.detached_from = Some(Detachment {
                series_id: master.event_id.clone(),
                occurrence_date: date,
            });
            update.apply_to(&mut replacement);
            replacement.validate()?;
            vec![PlanStep::CreateEvent {
                event: replacement,
                rule: None,
            }]
        }
        (EditSpan::This, Mutation::Delete) if options.exception_dates => {
            vec![PlanStep::ReplaceRule {
                event_id: master.event_id.clone(),
                rule: rule.clone().except(date),
            }]
        }
        (EditSpan::This, Mutation::Delete) => {
            let mut steps = vec![truncate(master, rule, date, has_earlier)?];
            if let Some(next) = next_occurrence_after(master, rule, date)? {
                let remainder = instance_of(master, next, derived_id(&master.event_id, '+', next));
                let remainder_rule = shifted_rule(master, rule, next, next)?;
                steps.extend(relink(master, detached, &remainder.event_id, next, Duration::zero()));
                steps.push(PlanStep::CreateEvent {
                    event: remainder,
                    rule: Some(remainder_rule),
                });
            }
            steps
        }
        (EditSpan::Future, Mutation::Update(update)) => {
            let truncation = truncate(master, rule, date, has_earlier)?;
            let mut successor = instance_of(master, date, derived_id(&master.event_id, '+', date));
            update.apply_to(&mut successor);
            successor.validate()?;
            let successor_rule = shifted_rule(master, rule, date, successor.start)?;
            validate_rule(&successor, &successor_rule)?;

            let mut steps = vec![truncation];
            steps.extend(relink(
                master,
                detached,
                &successor.event_id,
                date,
                successor.start - date,
            ));
            steps.push(PlanStep::CreateEvent {
                event: successor,
                rule: Some(successor_rule),
            });
            steps
        }
        (EditSpan::Future, Mutation::Delete) => vec![truncate(master, rule, date, has_earlier)?],
    };

    let plan = EditPlan::new(steps);
    debug!(
        "planned {} step(s) for '{}' at {} (span={})",
        plan.steps().len(),
        master.event_id,
        date,
        span
    );
    Ok(plan)
}

/// Plan the deletion of a detached event.
///
/// The series occurrence it replaced is removed as well (exception date, or a
/// split when the store has none); otherwise the series would show that date
/// again. `series` is the master named by `detached_from`, if it still exists,
/// and `siblings` the other events detached from it.
pub fn plan_detached_delete(
    event: &Event,
    series: Option<(&Event, Option<&RecurrenceRule>)>,
    siblings: &[Event],
    options: PlanOptions,
) -> Result<EditPlan> {
    let mut steps = vec![PlanStep::DeleteEvent {
        event_id: event.event_id.clone(),
    }];

    if let (Some(detachment), Some((master, Some(rule)))) = (&event.detached_from, series) {
        let others: Vec<Event> = siblings
            .iter()
            .filter(|e| e.event_id != event.event_id)
            .cloned()
            .collect();
        match plan_edit_with_detached(
            master,
            Some(rule),
            Some(detachment.occurrence_date),
            EditSpan::This,
            &Mutation::Delete,
            options,
            &others,
        ) {
            Ok(series_plan) => steps.extend(series_plan.steps),
            // Already gone from the series (truncated or excluded).
            Err(AgendaError::OccurrenceNotFound { .. }) => {}
            Err(e) => return Err(e),
        }
    }

    Ok(EditPlan::new(steps))
}

fn plan_single(event: &Event, mutation: &Mutation) -> Result<EditPlan> {
    let step = match mutation {
        Mutation::Update(update) => {
            let mut updated = event.clone();
            update.apply_to(&mut updated);
            updated.validate()?;
            PlanStep::UpdateEvent { event: updated }
        }
        Mutation::Delete => PlanStep::DeleteEvent {
            event_id: event.event_id.clone(),
        },
    };
    Ok(EditPlan::new(vec![step]))
}

/// Point events detached from `master` at dates from `from` on at
/// `successor_id`, moving the replaced date by `offset`.
fn relink(
    master: &Event,
    detached: &[Event],
    successor_id: &str,
    from: DateTime<Utc>,
    offset: Duration,
) -> Vec<PlanStep> {
    detached
        .iter()
        .filter_map(|event| {
            let detachment = event.detached_from.as_ref()?;
            if detachment.series_id != master.event_id || detachment.occurrence_date < from {
                return None;
            }
            let mut moved = event.clone();
            moved.detached_from = Some(Detachment {
                series_id: successor_id.to_string(),
                occurrence_date: detachment.occurrence_date + offset,
            });
            Some(PlanStep::UpdateEvent { event: moved })
        })
        .collect()
}

/// End the series before `date`, or delete it when nothing would remain.
fn truncate(
    master: &Event,
    rule: &RecurrenceRule,
    date: DateTime<Utc>,
    has_earlier: bool,
) -> Result<PlanStep> {
    let until = end_of_previous_day(master, date)?;
    if !has_earlier || until < master.start {
        return Ok(PlanStep::DeleteEvent {
            event_id: master.event_id.clone(),
        });
    }

    let mut truncated = rule.clone();
    truncated.end = Some(RecurrenceEnd::Until(until));
    truncated.exception_dates.retain(|d| *d <= until);
    Ok(PlanStep::ReplaceRule {
        event_id: master.event_id.clone(),
        rule: truncated,
    })
}

/// Last second of the local day before `date`, in the master's timezone.
fn end_of_previous_day(master: &Event, date: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let tz = expander::timezone_of(master)?;
    let midnight = date
        .with_timezone(&tz)
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|m| tz.from_local_datetime(&m).earliest())
        .map(|m| m.with_timezone(&Utc))
        .unwrap_or(date);
    Ok(midnight - Duration::seconds(1))
}

/// Copy of `rule` for a series that starts at `from` (nominal) and is
/// anchored at `new_start`.
///
/// A count keeps only the occurrences not yet used before `from`. Exception
/// dates from `from` onwards are kept and moved with the anchor.
fn shifted_rule(
    master: &Event,
    rule: &RecurrenceRule,
    from: DateTime<Utc>,
    new_start: DateTime<Utc>,
) -> Result<RecurrenceRule> {
    let mut shifted = rule.clone();
    if let Some(RecurrenceEnd::Count(count)) = rule.end {
        let used = expander::count_before(master, rule, from)?;
        let remaining = count.saturating_sub(used).max(1);
        shifted.end = Some(RecurrenceEnd::Count(remaining));
    }
    let offset = new_start - from;
    shifted.exception_dates = rule
        .exception_dates
        .iter()
        .filter(|d| **d >= from)
        .map(|d| *d + offset)
        .collect();
    Ok(shifted)
}

/// `master` as a standalone copy at `start`, keeping its duration.
fn instance_of(master: &Event, start: DateTime<Utc>, event_id: String) -> Event {
    let mut event = master.clone();
    event.event_id = event_id;
    event.start = start;
    event.end = start + master.duration();
    event.detached_from = None;
    event
}

/// Deterministic id for an event split off `series_id` at `date`, so that
/// re-applying the same plan overwrites rather than duplicates.
fn derived_id(series_id: &str, separator: char, date: DateTime<Utc>) -> String {
    format!("{}{}{}", series_id, separator, date.format("%Y%m%dT%H%M%SZ"))
}
