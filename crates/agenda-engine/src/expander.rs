//! Recurrence expansion -- turns a master event and its rule into dated occurrences.
//!
//! Wraps the `rrule` crate and `chrono-tz`. The structured [`RecurrenceRule`] is
//! rendered into RFC 5545 text anchored at the master's local start time, so
//! wall-clock time of day survives DST changes in the master's timezone.
//!
//! Expansion is a pure function of its inputs: the same master, rule and
//! window always produce the same ordered output.

use chrono::{DateTime, Duration, Utc, Weekday};
use chrono_tz::Tz;
use log::{debug, warn};
use rrule::RRuleSet;

use crate::error::{AgendaError, Result};
use crate::interval::{overlaps, Interval};
use crate::types::{Event, Occurrence, RecurrenceEnd, RecurrenceRule};

/// Upper bound on instances produced by a single expansion.
const MAX_INSTANCES: u16 = 5000;

/// Expand `master` into the occurrences visible in `window`, ascending by start.
///
/// Without a rule the master is a single occurrence. Occurrences that only
/// partially overlap the window are kept. Zero-length events are kept when
/// they start inside the window.
///
/// # Errors
/// - `InvalidRecurrence` for a zero interval or count, an until-date before
///   the master's start, out-of-range constraints, or a rule the RFC 5545
///   engine rejects.
/// - `InvalidTimezone` when the master's timezone is not an IANA name.
/// - `InvalidDuration` when the window is empty.
/// - `InvalidEvent` when the master ends before it starts.
pub fn expand(
    master: &Event,
    rule: Option<&RecurrenceRule>,
    window: &Interval,
) -> Result<Vec<Occurrence>> {
    window.ensure_window()?;
    master.validate()?;

    let rule = match rule {
        Some(rule) => rule,
        None => {
            let replaced = master.detached_from.as_ref().map(|d| d.occurrence_date);
            let single = Occurrence::at(master, master.start, replaced);
            return Ok(if visible_in(&single.interval(), window) {
                vec![single]
            } else {
                Vec::new()
            });
        }
    };

    validate_rule(master, rule)?;

    // Anything starting at or before this instant ends before the window opens.
    let after = window.start - master.duration() - Duration::seconds(1);
    let dates = collect_dates(master, rule, Some(after), Some(window.end), true, MAX_INSTANCES)?;

    let occurrences: Vec<Occurrence> = dates
        .into_iter()
        .map(|date| Occurrence::at(master, date, Some(date)))
        .filter(|occ| visible_in(&occ.interval(), window))
        .collect();

    debug!(
        "expanded {} occurrences of '{}' in [{}, {})",
        occurrences.len(),
        master.event_id,
        window.start,
        window.end
    );

    Ok(occurrences)
}

/// Nominal start of every occurrence from the series start through `through`
/// (inclusive), exception dates removed. At most 5000 dates are returned.
pub fn occurrence_dates(
    master: &Event,
    rule: &RecurrenceRule,
    through: DateTime<Utc>,
) -> Result<Vec<DateTime<Utc>>> {
    validate_rule(master, rule)?;
    collect_dates(
        master,
        rule,
        None,
        Some(through + Duration::seconds(1)),
        true,
        MAX_INSTANCES,
    )
}

/// The first occurrence strictly after `instant`, if the series has one.
pub fn next_occurrence_after(
    master: &Event,
    rule: &RecurrenceRule,
    instant: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>> {
    validate_rule(master, rule)?;
    // The engine's `after` bound may be inclusive; ask for two and filter.
    let dates = collect_dates(master, rule, Some(instant), None, true, 2)?;
    Ok(dates.into_iter().next())
}

/// Whether `date` is the nominal start of a (not excluded) occurrence.
pub(crate) fn is_occurrence(
    master: &Event,
    rule: &RecurrenceRule,
    date: DateTime<Utc>,
) -> Result<bool> {
    validate_rule(master, rule)?;
    let around = collect_dates(
        master,
        rule,
        Some(date - Duration::seconds(1)),
        Some(date + Duration::seconds(1)),
        true,
        2,
    )?;
    Ok(around.contains(&date))
}

/// Whether any (not excluded) occurrence starts before `date`.
pub(crate) fn has_occurrence_before(
    master: &Event,
    rule: &RecurrenceRule,
    date: DateTime<Utc>,
) -> Result<bool> {
    validate_rule(master, rule)?;
    Ok(!collect_dates(master, rule, None, Some(date), true, 1)?.is_empty())
}

/// Number of nominal starts before `instant`, exception dates included.
///
/// This is the part of a `COUNT` already used up at `instant`. Not capped:
/// a count rule bounds the walk by itself.
pub(crate) fn count_before(
    master: &Event,
    rule: &RecurrenceRule,
    instant: DateTime<Utc>,
) -> Result<u32> {
    validate_rule(master, rule)?;
    let rrule_set = rule_set(master, rule, false)?.limit();
    let utc: rrule::Tz = Utc.into();
    let bound = instant.with_timezone(&utc);
    let used = (&rrule_set).into_iter().take_while(|dt| *dt < bound).count();
    Ok(u32::try_from(used).unwrap_or(u32::MAX))
}

/// Reject rules that are malformed or could never terminate.
pub(crate) fn validate_rule(master: &Event, rule: &RecurrenceRule) -> Result<()> {
    if rule.interval == 0 {
        return Err(invalid("interval must be at least 1"));
    }
    match rule.end {
        Some(RecurrenceEnd::Count(0)) => {
            return Err(invalid("count must be at least 1"));
        }
        Some(RecurrenceEnd::Until(until)) if until < master.start => {
            return Err(invalid(format!(
                "until {} is before the series start {}",
                until, master.start
            )));
        }
        _ => {}
    }
    if let Some(day) = rule
        .days_of_month
        .iter()
        .find(|d| **d == 0 || !(-31..=31).contains(*d))
    {
        return Err(invalid(format!("day of month {} out of range", day)));
    }
    if let Some(month) = rule.months_of_year.iter().find(|m| !(1..=12).contains(*m)) {
        return Err(invalid(format!("month {} out of range", month)));
    }
    if let Some(week) = rule
        .weeks_of_year
        .iter()
        .find(|w| **w == 0 || !(-53..=53).contains(*w))
    {
        return Err(invalid(format!("week of year {} out of range", week)));
    }
    if let Some(day) = rule
        .days_of_year
        .iter()
        .find(|d| **d == 0 || !(-366..=366).contains(*d))
    {
        return Err(invalid(format!("day of year {} out of range", day)));
    }
    if rule.set_positions.contains(&0) {
        return Err(invalid("set position 0 is not allowed"));
    }
    Ok(())
}

/// Parse the master's timezone, defaulting to UTC.
pub(crate) fn timezone_of(master: &Event) -> Result<Tz> {
    let name = master.time_zone.as_deref().unwrap_or("UTC");
    name.parse::<Tz>()
        .map_err(|_| AgendaError::InvalidTimezone(name.to_string()))
}

/// Run the RFC 5545 engine and return nominal starts in UTC.
///
/// Results are strictly after `after`, strictly before `before`, never past
/// the rule's until-date, and at most `limit` long.
fn collect_dates(
    master: &Event,
    rule: &RecurrenceRule,
    after: Option<DateTime<Utc>>,
    before: Option<DateTime<Utc>>,
    without_exceptions: bool,
    limit: u16,
) -> Result<Vec<DateTime<Utc>>> {
    let mut rrule_set = rule_set(master, rule, without_exceptions)?;

    let until = match rule.end {
        Some(RecurrenceEnd::Until(until)) => Some(until),
        _ => None,
    };

    // The engine's bounds may be inclusive or exclusive depending on version;
    // pad them and filter exactly below.
    let utc: rrule::Tz = Utc.into();
    let upper = match (before, until) {
        (Some(b), Some(u)) => Some(b.min(u + Duration::seconds(1))),
        (Some(b), None) => Some(b),
        (None, Some(u)) => Some(u + Duration::seconds(1)),
        (None, None) => None,
    };
    if let Some(upper) = upper {
        rrule_set = rrule_set.before(upper.with_timezone(&utc));
    }
    if let Some(after) = after {
        rrule_set = rrule_set.after(after.with_timezone(&utc));
    }

    let result = rrule_set.all(limit);
    if result.limited && limit == MAX_INSTANCES {
        warn!(
            "expansion of '{}' stopped at {} instances",
            master.event_id, MAX_INSTANCES
        );
    }

    Ok(result
        .dates
        .into_iter()
        .map(|dt| dt.with_timezone(&Utc))
        .filter(|dt| after.map_or(true, |a| *dt > a))
        .filter(|dt| before.map_or(true, |b| *dt < b))
        .filter(|dt| until.map_or(true, |u| *dt <= u))
        .collect())
}

fn rule_set(master: &Event, rule: &RecurrenceRule, without_exceptions: bool) -> Result<RRuleSet> {
    let tz = timezone_of(master)?;
    build_rrule_text(master, rule, &tz, without_exceptions)
        .parse()
        .map_err(|e| AgendaError::InvalidRecurrence(format!("{}", e)))
}

/// Render DTSTART / RRULE / EXDATE lines for the `rrule` parser.
///
/// DTSTART and EXDATE are written as local time with a TZID so the engine
/// keeps the wall-clock hour fixed across DST transitions. UNTIL is not
/// written; it is applied as a bound in [`collect_dates`].
fn build_rrule_text(
    master: &Event,
    rule: &RecurrenceRule,
    tz: &Tz,
    without_exceptions: bool,
) -> String {
    let local = |dt: &DateTime<Utc>| dt.with_timezone(tz).format("%Y%m%dT%H%M%S").to_string();

    let mut parts = vec![
        format!("FREQ={}", rule.frequency.as_rrule()),
        format!("INTERVAL={}", rule.interval),
    ];
    if let Some(RecurrenceEnd::Count(count)) = rule.end {
        parts.push(format!("COUNT={}", count));
    }
    if !rule.days_of_week.is_empty() {
        let days: Vec<&str> = rule.days_of_week.iter().map(weekday_code).collect();
        parts.push(format!("BYDAY={}", days.join(",")));
    }
    push_list(&mut parts, "BYMONTHDAY", &rule.days_of_month);
    push_list(&mut parts, "BYMONTH", &rule.months_of_year);
    push_list(&mut parts, "BYWEEKNO", &rule.weeks_of_year);
    push_list(&mut parts, "BYYEARDAY", &rule.days_of_year);
    push_list(&mut parts, "BYSETPOS", &rule.set_positions);

    let mut text = format!(
        "DTSTART;TZID={}:{}\nRRULE:{}",
        tz.name(),
        local(&master.start),
        parts.join(";")
    );

    if without_exceptions && !rule.exception_dates.is_empty() {
        let exdates: Vec<String> = rule.exception_dates.iter().map(local).collect();
        text.push_str(&format!("\nEXDATE;TZID={}:{}", tz.name(), exdates.join(",")));
    }

    text
}

fn push_list<T: ToString>(parts: &mut Vec<String>, key: &str, values: &[T]) {
    if !values.is_empty() {
        let joined: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        parts.push(format!("{}={}", key, joined.join(",")));
    }
}

fn weekday_code(day: &Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

fn visible_in(occurrence: &Interval, window: &Interval) -> bool {
    if occurrence.is_empty() {
        return window.start <= occurrence.start && occurrence.start < window.end;
    }
    overlaps(occurrence, window)
}

fn invalid(message: impl Into<String>) -> AgendaError {
    AgendaError::InvalidRecurrence(message.into())
}
