//! Multi-field text search over expanded occurrences.
//!
//! Field names are resolved to [`SearchField`] before any occurrence is
//! scanned, so an unknown field fails the whole call up front.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AgendaError, Result};
use crate::types::{Occurrence, Participant};

/// A searchable occurrence field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchField {
    Title,
    Location,
    Notes,
    Url,
    /// Title of the owning calendar.
    Calendar,
    OrganizerName,
    OrganizerEmail,
    AttendeeName,
    AttendeeEmail,
}

impl SearchField {
    /// Every field, in the order they are checked.
    pub const ALL: [SearchField; 9] = [
        SearchField::Title,
        SearchField::Location,
        SearchField::Notes,
        SearchField::Url,
        SearchField::Calendar,
        SearchField::OrganizerName,
        SearchField::OrganizerEmail,
        SearchField::AttendeeName,
        SearchField::AttendeeEmail,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchField::Title => "title",
            SearchField::Location => "location",
            SearchField::Notes => "notes",
            SearchField::Url => "url",
            SearchField::Calendar => "calendar",
            SearchField::OrganizerName => "organizer_name",
            SearchField::OrganizerEmail => "organizer_email",
            SearchField::AttendeeName => "attendee_name",
            SearchField::AttendeeEmail => "attendee_email",
        }
    }

    /// The text values this field holds on `occ`. Attendee fields yield one
    /// value per attendee.
    fn values<'a>(&self, occ: &'a Occurrence) -> Vec<&'a str> {
        let email = |p: &'a Participant| p.email.as_deref();
        let name = |p: &'a Participant| p.name.as_deref();
        match self {
            SearchField::Title => vec![occ.title.as_str()],
            SearchField::Location => occ.location.as_deref().into_iter().collect(),
            SearchField::Notes => occ.notes.as_deref().into_iter().collect(),
            SearchField::Url => occ.url.as_deref().into_iter().collect(),
            SearchField::Calendar => vec![occ.calendar.title.as_str()],
            SearchField::OrganizerName => occ.organizer.as_ref().and_then(name).into_iter().collect(),
            SearchField::OrganizerEmail => {
                occ.organizer.as_ref().and_then(email).into_iter().collect()
            }
            SearchField::AttendeeName => occ.attendees.iter().filter_map(name).collect(),
            SearchField::AttendeeEmail => occ.attendees.iter().filter_map(email).collect(),
        }
    }
}

impl FromStr for SearchField {
    type Err = AgendaError;

    fn from_str(s: &str) -> Result<Self> {
        SearchField::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| AgendaError::InvalidField {
                field: s.to_string(),
                valid: SearchField::ALL.map(|f| f.as_str()).join(", "),
            })
    }
}

impl fmt::Display for SearchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for [`search_with`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOptions {
    /// Fields to search. `None` searches every field.
    pub fields: Option<Vec<SearchField>>,
    pub case_sensitive: bool,
}

impl SearchOptions {
    /// Resolve field names, failing on the first unknown one.
    pub fn with_field_names(names: &[&str]) -> Result<Self> {
        let fields = names
            .iter()
            .map(|n| n.parse())
            .collect::<Result<Vec<SearchField>>>()?;
        Ok(Self {
            fields: Some(fields),
            case_sensitive: false,
        })
    }
}

/// Case-insensitive substring search across `fields` (all fields when `None`).
///
/// Returns matching occurrences in input order. An empty query matches
/// everything.
///
/// # Errors
/// `InvalidField` when a field name is not one of [`SearchField::ALL`].
pub fn search(
    occurrences: &[Occurrence],
    query: &str,
    fields: Option<&[&str]>,
) -> Result<Vec<Occurrence>> {
    let options = match fields {
        Some(names) => SearchOptions::with_field_names(names)?,
        None => SearchOptions::default(),
    };
    Ok(search_with(occurrences, query, &options))
}

/// Search with already-resolved options.
pub fn search_with(occurrences: &[Occurrence], query: &str, options: &SearchOptions) -> Vec<Occurrence> {
    if query.is_empty() {
        return occurrences.to_vec();
    }

    let fields: &[SearchField] = options.fields.as_deref().unwrap_or(&SearchField::ALL);
    let needle = if options.case_sensitive {
        query.to_string()
    } else {
        query.to_lowercase()
    };

    occurrences
        .iter()
        .filter(|occ| matches(occ, &needle, fields, options.case_sensitive))
        .cloned()
        .collect()
}

fn matches(occ: &Occurrence, needle: &str, fields: &[SearchField], case_sensitive: bool) -> bool {
    fields.iter().any(|field| {
        field.values(occ).into_iter().any(|value| {
            if case_sensitive {
                value.contains(needle)
            } else {
                value.to_lowercase().contains(needle)
            }
        })
    })
}
