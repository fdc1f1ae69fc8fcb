//! Tests for multi-field occurrence search.

use agenda_engine::{
    search, search_with, AgendaError, CalendarRef, Event, Occurrence, Participant, SearchField,
    SearchOptions,
};
use chrono::{Duration, TimeZone, Utc};

fn occurrence(id: &str, title: &str) -> Occurrence {
    let start = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
    let event = Event::new(id, title, start, start + Duration::minutes(30));
    Occurrence::at(&event, start, None)
}

fn sample() -> Vec<Occurrence> {
    let mut planning = occurrence("a", "Quarterly planning");
    planning.location = Some("Room 4B".to_string());
    planning.organizer = Some(Participant::new("Ada Lovelace", "ada@example.org"));
    planning.attendees = vec![
        Participant::new("Guido", "Guido@ACME.com"),
        Participant::new("Grace", "grace@example.org"),
    ];

    let mut dentist = occurrence("b", "Dentist");
    dentist.notes = Some("Bring insurance card".to_string());
    dentist.calendar = CalendarRef {
        calendar_id: "cal-home".to_string(),
        title: "Home".to_string(),
    };

    let mut review = occurrence("c", "Design review");
    review.url = Some("https://meet.example.org/design".to_string());

    vec![planning, dentist, review]
}

fn ids(found: &[Occurrence]) -> Vec<&str> {
    found.iter().map(|o| o.event_id.as_str()).collect()
}

#[test]
fn matches_title_case_insensitively() {
    let found = search(&sample(), "PLANNING", None).unwrap();
    assert_eq!(ids(&found), vec!["a"]);
}

#[test]
fn matches_attendee_email_domain() {
    let found = search(&sample(), "@acme.com", Some(&["attendee_email"])).unwrap();
    assert_eq!(ids(&found), vec!["a"]);
}

#[test]
fn restricting_fields_excludes_other_matches() {
    // "design" is in c's title and url, but not in a location.
    let found = search(&sample(), "design", Some(&["location"])).unwrap();
    assert!(found.is_empty());
}

#[test]
fn searches_every_field_by_default() {
    assert_eq!(ids(&search(&sample(), "insurance", None).unwrap()), vec!["b"]);
    assert_eq!(ids(&search(&sample(), "room 4b", None).unwrap()), vec!["a"]);
    assert_eq!(ids(&search(&sample(), "meet.example", None).unwrap()), vec!["c"]);
    assert_eq!(ids(&search(&sample(), "home", None).unwrap()), vec!["b"]);
    assert_eq!(ids(&search(&sample(), "lovelace", None).unwrap()), vec!["a"]);
    assert_eq!(ids(&search(&sample(), "grace", None).unwrap()), vec!["a"]);
}

#[test]
fn query_matching_several_fields_returns_occurrence_once() {
    let found = search(&sample(), "example.org", None).unwrap();
    assert_eq!(ids(&found), vec!["a", "c"]);
}

#[test]
fn empty_query_returns_everything_in_order() {
    let found = search(&sample(), "", None).unwrap();
    assert_eq!(ids(&found), vec!["a", "b", "c"]);
}

#[test]
fn unknown_field_is_rejected() {
    let err = search(&sample(), "x", Some(&["title", "colour"])).unwrap_err();
    match err {
        AgendaError::InvalidField { field, valid } => {
            assert_eq!(field, "colour");
            assert!(valid.contains("attendee_email"));
        }
        other => panic!("expected InvalidField, got {:?}", other),
    }
}

#[test]
fn unknown_field_fails_even_without_occurrences() {
    assert!(search(&[], "x", Some(&["colour"])).is_err());
}

#[test]
fn case_sensitive_option() {
    let options = SearchOptions {
        fields: Some(vec![SearchField::Title]),
        case_sensitive: true,
    };
    assert!(search_with(&sample(), "dentist", &options).is_empty());
    assert_eq!(ids(&search_with(&sample(), "Dentist", &options)), vec!["b"]);
}

#[test]
fn field_names_round_trip() {
    for field in SearchField::ALL {
        assert_eq!(field.as_str().parse::<SearchField>().unwrap(), field);
    }
}
