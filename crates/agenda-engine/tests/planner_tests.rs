//! Tests for turning span-scoped edits into store plans.

use agenda_engine::{
    plan_detached_delete, plan_edit, plan_edit_with_detached, Alarm, AgendaError, Detachment,
    EditPlan, EditSpan, Event, EventStatus, EventUpdate, Mutation, PlanOptions, PlanStep,
    RecurrenceEnd, RecurrenceRule,
};
use chrono::{DateTime, Duration, TimeZone, Utc};

fn at(day: u32, hour: u32, min: u32, sec: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, day, hour, min, sec).unwrap()
}

/// Daily 09:00-09:30 UTC standup, ten occurrences from Monday 2026-03-02.
fn standup() -> (Event, RecurrenceRule) {
    let event = Event::new("standup", "Standup", at(2, 9, 0, 0), at(2, 9, 30, 0));
    (event, RecurrenceRule::daily().count(10))
}

fn retitle(title: &str) -> Mutation {
    Mutation::Update(EventUpdate {
        title: Some(title.to_string()),
        ..EventUpdate::default()
    })
}

fn with_exceptions() -> PlanOptions {
    PlanOptions::default()
}

fn without_exceptions() -> PlanOptions {
    PlanOptions {
        exception_dates: false,
    }
}

// ---------------------------------------------------------------------------
// Non-recurring events
// ---------------------------------------------------------------------------

#[test]
fn single_event_update_ignores_span() {
    let event = Event::new("lunch", "Lunch", at(2, 12, 0, 0), at(2, 13, 0, 0));
    let plan = plan_edit(
        &event,
        None,
        None,
        EditSpan::Future,
        &retitle("Team lunch"),
        with_exceptions(),
    )
    .unwrap();

    assert_eq!(plan.steps().len(), 1);
    let updated = plan.updated_event().unwrap();
    assert_eq!(updated.event_id, "lunch");
    assert_eq!(updated.title, "Team lunch");
}

#[test]
fn single_event_delete() {
    let event = Event::new("lunch", "Lunch", at(2, 12, 0, 0), at(2, 13, 0, 0));
    let plan = plan_edit(&event, None, None, EditSpan::This, &Mutation::Delete, with_exceptions())
        .unwrap();
    assert_eq!(plan.deleted_events(), vec!["lunch"]);
}

#[test]
fn moving_start_keeps_duration() {
    let event = Event::new("lunch", "Lunch", at(2, 12, 0, 0), at(2, 13, 0, 0));
    let update = Mutation::Update(EventUpdate {
        start: Some(at(2, 14, 0, 0)),
        ..EventUpdate::default()
    });
    let plan = plan_edit(&event, None, None, EditSpan::This, &update, with_exceptions()).unwrap();
    let updated = plan.updated_event().unwrap();
    assert_eq!(updated.start, at(2, 14, 0, 0));
    assert_eq!(updated.end, at(2, 15, 0, 0));
}

#[test]
fn update_ending_before_start_is_rejected() {
    let event = Event::new("lunch", "Lunch", at(2, 12, 0, 0), at(2, 13, 0, 0));
    let update = Mutation::Update(EventUpdate {
        end: Some(at(2, 11, 0, 0)),
        ..EventUpdate::default()
    });
    let err = plan_edit(&event, None, None, EditSpan::This, &update, with_exceptions()).unwrap_err();
    assert!(matches!(err, AgendaError::InvalidEvent(_)));
}

// ---------------------------------------------------------------------------
// Recurring: disambiguation
// ---------------------------------------------------------------------------

#[test]
fn recurring_without_date_is_rejected() {
    let (event, rule) = standup();
    let err = plan_edit(
        &event,
        Some(&rule),
        None,
        EditSpan::This,
        &retitle("x"),
        with_exceptions(),
    )
    .unwrap_err();
    assert_eq!(err, AgendaError::MissingOccurrenceDate);
}

#[test]
fn date_not_in_series_is_rejected() {
    let (event, rule) = standup();
    let err = plan_edit(
        &event,
        Some(&rule),
        Some(at(4, 10, 0, 0)),
        EditSpan::This,
        &Mutation::Delete,
        with_exceptions(),
    )
    .unwrap_err();
    assert!(matches!(err, AgendaError::OccurrenceNotFound { .. }));
}

#[test]
fn date_past_count_is_rejected() {
    let (event, rule) = standup();
    let err = plan_edit(
        &event,
        Some(&rule),
        Some(at(20, 9, 0, 0)),
        EditSpan::Future,
        &Mutation::Delete,
        with_exceptions(),
    )
    .unwrap_err();
    assert!(matches!(err, AgendaError::OccurrenceNotFound { .. }));
}

#[test]
fn excluded_date_is_rejected() {
    let (event, rule) = standup();
    let rule = rule.except(at(4, 9, 0, 0));
    let err = plan_edit(
        &event,
        Some(&rule),
        Some(at(4, 9, 0, 0)),
        EditSpan::This,
        &retitle("x"),
        with_exceptions(),
    )
    .unwrap_err();
    assert!(matches!(err, AgendaError::OccurrenceNotFound { .. }));
}

// ---------------------------------------------------------------------------
// Recurring: span = this
// ---------------------------------------------------------------------------

#[test]
fn this_update_detaches_one_occurrence() {
    let (event, rule) = standup();
    let plan = plan_edit(
        &event,
        Some(&rule),
        Some(at(4, 9, 0, 0)),
        EditSpan::This,
        &retitle("Standup (moved room)"),
        with_exceptions(),
    )
    .unwrap();

    assert_eq!(plan.steps().len(), 1);
    assert!(plan.replacement_rule().is_none(), "series rule is untouched");

    let (detached, detached_rule) = plan.created_event().unwrap();
    assert!(detached_rule.is_none());
    assert_eq!(detached.event_id, "standup@20260304T090000Z");
    assert_eq!(detached.title, "Standup (moved room)");
    assert_eq!(detached.start, at(4, 9, 0, 0));
    assert_eq!(detached.end, at(4, 9, 30, 0));

    let origin = detached.detached_from.as_ref().unwrap();
    assert_eq!(origin.series_id, "standup");
    assert_eq!(origin.occurrence_date, at(4, 9, 0, 0));
}

#[test]
fn this_delete_adds_exception_date() {
    let (event, rule) = standup();
    let plan = plan_edit(
        &event,
        Some(&rule),
        Some(at(4, 9, 0, 0)),
        EditSpan::This,
        &Mutation::Delete,
        with_exceptions(),
    )
    .unwrap();

    assert_eq!(plan.steps().len(), 1);
    let new_rule = plan.replacement_rule().unwrap();
    assert_eq!(new_rule.exception_dates, vec![at(4, 9, 0, 0)]);
    assert_eq!(new_rule.end, Some(RecurrenceEnd::Count(10)));
}

#[test]
fn this_delete_without_exception_support_splits_series() {
    let (event, rule) = standup();
    let plan = plan_edit(
        &event,
        Some(&rule),
        Some(at(4, 9, 0, 0)),
        EditSpan::This,
        &Mutation::Delete,
        without_exceptions(),
    )
    .unwrap();

    assert_eq!(plan.steps().len(), 2);
    match &plan.steps()[0] {
        PlanStep::ReplaceRule { event_id, rule } => {
            assert_eq!(event_id, "standup");
            assert_eq!(rule.end, Some(RecurrenceEnd::Until(at(3, 23, 59, 59))));
        }
        other => panic!("expected ReplaceRule first, got {:?}", other),
    }

    let (remainder, remainder_rule) = plan.created_event().unwrap();
    assert_eq!(remainder.event_id, "standup+20260305T090000Z");
    assert_eq!(remainder.start, at(5, 9, 0, 0));
    // 10 total, 3 used before the 5th (2nd, 3rd, 4th).
    assert_eq!(remainder_rule.unwrap().end, Some(RecurrenceEnd::Count(7)));
}

#[test]
fn this_delete_of_last_without_exception_support_only_truncates() {
    let (event, rule) = standup();
    let plan = plan_edit(
        &event,
        Some(&rule),
        Some(at(11, 9, 0, 0)),
        EditSpan::This,
        &Mutation::Delete,
        without_exceptions(),
    )
    .unwrap();

    assert_eq!(plan.steps().len(), 1);
    assert!(plan.replacement_rule().is_some());
    assert!(plan.created_event().is_none());
}

// ---------------------------------------------------------------------------
// Recurring: span = future
// ---------------------------------------------------------------------------

#[test]
fn future_delete_truncates_before_the_date() {
    let (event, rule) = standup();
    let plan = plan_edit(
        &event,
        Some(&rule),
        Some(at(5, 9, 0, 0)),
        EditSpan::Future,
        &Mutation::Delete,
        with_exceptions(),
    )
    .unwrap();

    assert_eq!(plan.steps().len(), 1);
    let truncated = plan.replacement_rule().unwrap();
    assert_eq!(truncated.end, Some(RecurrenceEnd::Until(at(4, 23, 59, 59))));
}

#[test]
fn future_delete_from_first_occurrence_deletes_series() {
    let (event, rule) = standup();
    let plan = plan_edit(
        &event,
        Some(&rule),
        Some(at(2, 9, 0, 0)),
        EditSpan::Future,
        &Mutation::Delete,
        with_exceptions(),
    )
    .unwrap();
    assert_eq!(plan.deleted_events(), vec!["standup"]);
    assert_eq!(plan.steps().len(), 1);
}

#[test]
fn future_update_splits_into_new_series() {
    let (event, rule) = standup();
    let update = Mutation::Update(EventUpdate {
        title: Some("Late standup".to_string()),
        start: Some(at(5, 10, 0, 0)),
        ..EventUpdate::default()
    });
    let plan = plan_edit(
        &event,
        Some(&rule),
        Some(at(5, 9, 0, 0)),
        EditSpan::Future,
        &update,
        with_exceptions(),
    )
    .unwrap();

    assert_eq!(plan.steps().len(), 2);
    assert!(matches!(plan.steps()[0], PlanStep::ReplaceRule { .. }));
    assert!(matches!(plan.steps()[1], PlanStep::CreateEvent { .. }));

    let (successor, successor_rule) = plan.created_event().unwrap();
    assert_eq!(successor.event_id, "standup+20260305T090000Z");
    assert_eq!(successor.title, "Late standup");
    assert_eq!(successor.start, at(5, 10, 0, 0));
    assert_eq!(successor.end, at(5, 10, 30, 0));
    assert!(successor.detached_from.is_none());
    assert_eq!(successor_rule.unwrap().end, Some(RecurrenceEnd::Count(7)));
}

#[test]
fn future_update_from_first_occurrence_replaces_series() {
    let (event, rule) = standup();
    let plan = plan_edit(
        &event,
        Some(&rule),
        Some(at(2, 9, 0, 0)),
        EditSpan::Future,
        &retitle("Renamed"),
        with_exceptions(),
    )
    .unwrap();

    assert_eq!(plan.deleted_events(), vec!["standup"]);
    let (successor, successor_rule) = plan.created_event().unwrap();
    assert_eq!(successor.title, "Renamed");
    assert_eq!(successor_rule.unwrap().end, Some(RecurrenceEnd::Count(10)));
}

#[test]
fn future_update_moves_later_exceptions_with_series() {
    let (event, rule) = standup();
    let rule = rule.except(at(3, 9, 0, 0)).except(at(8, 9, 0, 0));
    let update = Mutation::Update(EventUpdate {
        start: Some(at(5, 11, 0, 0)),
        ..EventUpdate::default()
    });
    let plan = plan_edit(
        &event,
        Some(&rule),
        Some(at(5, 9, 0, 0)),
        EditSpan::Future,
        &update,
        with_exceptions(),
    )
    .unwrap();

    let truncated = plan.replacement_rule().unwrap();
    assert_eq!(truncated.exception_dates, vec![at(3, 9, 0, 0)]);

    let (_, successor_rule) = plan.created_event().unwrap();
    assert_eq!(successor_rule.unwrap().exception_dates, vec![at(8, 11, 0, 0)]);
}

#[test]
fn future_truncation_uses_local_midnight() {
    // 09:00 America/New_York daily; after DST (EDT, UTC-4).
    let mut event = Event::new("walk", "Walk", at(9, 13, 0, 0), at(9, 14, 0, 0));
    event.time_zone = Some("America/New_York".to_string());
    let rule = RecurrenceRule::daily();

    let plan = plan_edit(
        &event,
        Some(&rule),
        Some(at(12, 13, 0, 0)),
        EditSpan::Future,
        &Mutation::Delete,
        with_exceptions(),
    )
    .unwrap();

    let truncated = plan.replacement_rule().unwrap();
    assert_eq!(truncated.end, Some(RecurrenceEnd::Until(at(12, 3, 59, 59))));
}

// ---------------------------------------------------------------------------
// Plan ordering
// ---------------------------------------------------------------------------

#[test]
fn removals_are_ordered_before_creations() {
    let (event, rule) = standup();
    let plan = EditPlan::new(vec![
        PlanStep::CreateEvent {
            event: event.clone(),
            rule: Some(rule.clone()),
        },
        PlanStep::DeleteEvent {
            event_id: "old".to_string(),
        },
        PlanStep::ReplaceRule {
            event_id: "standup".to_string(),
            rule,
        },
    ]);

    assert!(matches!(plan.steps()[0], PlanStep::DeleteEvent { .. }));
    assert!(matches!(plan.steps()[1], PlanStep::ReplaceRule { .. }));
    assert!(matches!(plan.steps()[2], PlanStep::CreateEvent { .. }));
}

// ---------------------------------------------------------------------------
// Long-running series
// ---------------------------------------------------------------------------

/// Daily 09:00 UTC series started on Monday 2010-01-04.
fn since_2010(rule: RecurrenceRule) -> (Event, RecurrenceRule) {
    let start = Utc.with_ymd_and_hms(2010, 1, 4, 9, 0, 0).unwrap();
    (Event::new("daily", "Daily", start, start + Duration::minutes(15)), rule)
}

#[test]
fn occurrence_sixteen_years_into_series_can_be_deleted() {
    // More than 5000 occurrences precede the target date.
    let (event, rule) = since_2010(RecurrenceRule::daily());
    let plan = plan_edit(
        &event,
        Some(&rule),
        Some(at(2, 9, 0, 0)),
        EditSpan::This,
        &Mutation::Delete,
        with_exceptions(),
    )
    .unwrap();
    assert_eq!(
        plan.replacement_rule().unwrap().exception_dates,
        vec![at(2, 9, 0, 0)]
    );
}

#[test]
fn remaining_count_is_exact_past_five_thousand_occurrences() {
    // 2010-01-04 to 2026-03-02 is 5901 days.
    let (event, rule) = since_2010(RecurrenceRule::daily().count(7000));
    let plan = plan_edit(
        &event,
        Some(&rule),
        Some(at(2, 9, 0, 0)),
        EditSpan::Future,
        &retitle("Daily v2"),
        with_exceptions(),
    )
    .unwrap();
    let (_, successor_rule) = plan.created_event().unwrap();
    assert_eq!(successor_rule.unwrap().end, Some(RecurrenceEnd::Count(1099)));
}

// ---------------------------------------------------------------------------
// Series with detached occurrences
// ---------------------------------------------------------------------------

/// The standup's 2026-03-08 occurrence, detached and renamed.
fn offsite() -> Event {
    let mut event = Event::new(
        "standup@20260308T090000Z",
        "Offsite",
        at(8, 9, 0, 0),
        at(8, 9, 30, 0),
    );
    event.detached_from = Some(Detachment {
        series_id: "standup".to_string(),
        occurrence_date: at(8, 9, 0, 0),
    });
    event
}

fn relinked(plan: &EditPlan) -> Vec<&Event> {
    plan.steps()
        .iter()
        .filter_map(|s| match s {
            PlanStep::UpdateEvent { event } => Some(event),
            _ => None,
        })
        .collect()
}

#[test]
fn future_update_points_later_detached_events_at_successor() {
    let (event, rule) = standup();
    let update = Mutation::Update(EventUpdate {
        start: Some(at(6, 10, 0, 0)),
        ..EventUpdate::default()
    });
    let plan = plan_edit_with_detached(
        &event,
        Some(&rule),
        Some(at(6, 9, 0, 0)),
        EditSpan::Future,
        &update,
        with_exceptions(),
        &[offsite()],
    )
    .unwrap();

    let moved = relinked(&plan);
    assert_eq!(moved.len(), 1);
    assert_eq!(moved[0].event_id, "standup@20260308T090000Z");
    assert_eq!(
        moved[0].detached_from,
        Some(Detachment {
            series_id: "standup+20260306T090000Z".to_string(),
            occurrence_date: at(8, 10, 0, 0),
        })
    );
    assert!(matches!(plan.steps()[0], PlanStep::ReplaceRule { .. }));
}

#[test]
fn earlier_detached_events_stay_with_truncated_series() {
    let (event, rule) = standup();
    let plan = plan_edit_with_detached(
        &event,
        Some(&rule),
        Some(at(10, 9, 0, 0)),
        EditSpan::Future,
        &retitle("Late"),
        with_exceptions(),
        &[offsite()],
    )
    .unwrap();
    assert!(relinked(&plan).is_empty());
}

#[test]
fn split_points_later_detached_events_at_remainder() {
    let (event, rule) = standup();
    let plan = plan_edit_with_detached(
        &event,
        Some(&rule),
        Some(at(5, 9, 0, 0)),
        EditSpan::This,
        &Mutation::Delete,
        without_exceptions(),
        &[offsite()],
    )
    .unwrap();

    let moved = relinked(&plan);
    assert_eq!(moved.len(), 1);
    let detachment = moved[0].detached_from.as_ref().unwrap();
    assert_eq!(detachment.series_id, "standup+20260306T090000Z");
    assert_eq!(detachment.occurrence_date, at(8, 9, 0, 0));
}

#[test]
fn deleting_detached_event_excludes_its_date_from_series() {
    let (event, rule) = standup();
    let plan = plan_detached_delete(
        &offsite(),
        Some((&event, Some(&rule))),
        &[offsite()],
        with_exceptions(),
    )
    .unwrap();

    assert_eq!(plan.deleted_events(), vec!["standup@20260308T090000Z"]);
    assert_eq!(
        plan.replacement_rule().unwrap().exception_dates,
        vec![at(8, 9, 0, 0)]
    );
    assert!(relinked(&plan).is_empty());
}

#[test]
fn deleting_detached_event_of_truncated_series_deletes_only_it() {
    let (event, _) = standup();
    let truncated = RecurrenceRule::daily().until(at(5, 23, 59, 59));
    let plan = plan_detached_delete(
        &offsite(),
        Some((&event, Some(&truncated))),
        &[],
        with_exceptions(),
    )
    .unwrap();
    assert_eq!(plan.steps().len(), 1);
    assert_eq!(plan.deleted_events(), vec!["standup@20260308T090000Z"]);
}

#[test]
fn deleting_detached_event_of_removed_series_deletes_only_it() {
    let plan = plan_detached_delete(&offsite(), None, &[], with_exceptions()).unwrap();
    assert_eq!(plan.deleted_events(), vec!["standup@20260308T090000Z"]);
    assert_eq!(plan.steps().len(), 1);
}

// ---------------------------------------------------------------------------
// Status and alarms
// ---------------------------------------------------------------------------

#[test]
fn update_sets_status_and_replaces_alarms() {
    let mut event = Event::new("lunch", "Lunch", at(2, 12, 0, 0), at(2, 13, 0, 0));
    event.alarms = vec![Alarm::minutes_before(30)];
    let update = Mutation::Update(EventUpdate {
        status: Some(Some(EventStatus::Canceled)),
        alarms: Some(vec![Alarm::minutes_before(5), Alarm::at(at(2, 8, 0, 0))]),
        ..EventUpdate::default()
    });

    let plan = plan_edit(&event, None, None, EditSpan::This, &update, with_exceptions()).unwrap();
    let updated = plan.updated_event().unwrap();
    assert_eq!(updated.status, Some(EventStatus::Canceled));
    assert_eq!(
        updated.alarms,
        vec![Alarm::minutes_before(5), Alarm::at(at(2, 8, 0, 0))]
    );
}

#[test]
fn update_can_clear_status() {
    let mut event = Event::new("lunch", "Lunch", at(2, 12, 0, 0), at(2, 13, 0, 0));
    event.status = Some(EventStatus::Tentative);
    let update = Mutation::Update(EventUpdate {
        status: Some(None),
        ..EventUpdate::default()
    });
    let plan = plan_edit(&event, None, None, EditSpan::This, &update, with_exceptions()).unwrap();
    assert_eq!(plan.updated_event().unwrap().status, None);
}

#[test]
fn span_parses_from_text() {
    assert_eq!("this".parse::<EditSpan>().unwrap(), EditSpan::This);
    assert_eq!("future".parse::<EditSpan>().unwrap(), EditSpan::Future);
    assert!(matches!(
        "all".parse::<EditSpan>().unwrap_err(),
        AgendaError::InvalidSpan(_)
    ));
}
