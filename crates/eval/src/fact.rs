//! Fact provider trait and the life-event backed [`Animal`] record.
//!
//! The evaluator only needs two facts about a record: its species
//! identifier and its date of birth. Where those come from is up to the
//! surrounding application.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

use crate::error::FactError;

// ──────────────────────────────────────────────
// Trait
// ──────────────────────────────────────────────

/// Supplies the facts a script is evaluated against.
pub trait FactProvider {
    fn species_id(&self) -> i32;

    /// Fails if the record has no usable date of birth.
    fn date_of_birth(&self) -> Result<OffsetDateTime, FactError>;
}

impl<T: FactProvider + ?Sized> FactProvider for &T {
    fn species_id(&self) -> i32 {
        (**self).species_id()
    }

    fn date_of_birth(&self) -> Result<OffsetDateTime, FactError> {
        (**self).date_of_birth()
    }
}

// ──────────────────────────────────────────────
// Animal
// ──────────────────────────────────────────────

/// Life event that records a birth.
pub const BORN_EVENT: &str = "Born";
/// Field of [`BORN_EVENT`] holding the date.
pub const DATE_FIELD: &str = "date";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifeEvent {
    pub name: String,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl LifeEvent {
    pub fn new(name: impl Into<String>) -> Self {
        LifeEvent {
            name: name.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }
}

/// An animal record with its life-event history.
///
/// The date of birth is the `date` field of the first `Born` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Animal {
    pub species_id: i32,
    #[serde(default)]
    pub life_events: Vec<LifeEvent>,
}

impl Animal {
    pub fn new(species_id: i32) -> Self {
        Animal {
            species_id,
            life_events: Vec::new(),
        }
    }

    /// Shorthand for an animal with a single `Born` event on `date`.
    pub fn born_on(species_id: i32, date: Date) -> Self {
        let born = LifeEvent::new(BORN_EVENT).with_field(DATE_FIELD, date.to_string());
        Animal::new(species_id).with_event(born)
    }

    pub fn with_event(mut self, event: LifeEvent) -> Self {
        self.life_events.push(event);
        self
    }
}

impl FactProvider for Animal {
    fn species_id(&self) -> i32 {
        self.species_id
    }

    fn date_of_birth(&self) -> Result<OffsetDateTime, FactError> {
        let event = self
            .life_events
            .iter()
            .find(|e| e.name == BORN_EVENT)
            .ok_or_else(|| FactError::MissingEvent {
                event: BORN_EVENT.to_owned(),
            })?;
        let raw = event
            .fields
            .get(DATE_FIELD)
            .ok_or_else(|| FactError::MissingField {
                event: BORN_EVENT.to_owned(),
                field: DATE_FIELD.to_owned(),
            })?;
        parse_instant(raw).ok_or_else(|| FactError::InvalidValue {
            event: BORN_EVENT.to_owned(),
            field: DATE_FIELD.to_owned(),
            value: raw.clone(),
        })
    }
}

/// RFC 3339 date-time, or a `YYYY-MM-DD` date taken as midnight UTC.
pub(crate) fn parse_instant(text: &str) -> Option<OffsetDateTime> {
    if let Ok(at) = OffsetDateTime::parse(text, &Rfc3339) {
        return Some(at);
    }
    Date::parse(text, format_description!("[year]-[month]-[day]"))
        .ok()
        .map(|d| d.midnight().assume_utc())
}
