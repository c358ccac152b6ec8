//! Typed projections from store pages to timeline values.
//!
//! Each entity kind has exactly one conversion from the property bag. The
//! conversions are pure: relation ids are carried out as raw ids on the
//! intermediate records and resolved by the caller.

use crate::error::ResolveError;
use crate::schema::{Biome, Event, EventType, Location, Polity, MAX_IMPORTANCE};
use notion::Page;
use tracing::warn;

/// Property names of the timeline, location and polity databases.
pub mod props {
    pub const NAME: &str = "Name";
    pub const START_YEAR: &str = "Start Year";
    pub const END_YEAR: &str = "End Year";
    pub const EVENT_TYPE: &str = "Event Type";
    pub const IMPORTANCE: &str = "Importance";
    pub const DESCRIPTION: &str = "Description";
    pub const EXCERPT: &str = "Excerpt";
    pub const LOCATION: &str = "Location";
    pub const POLITY: &str = "Polity";
    pub const BIOME: &str = "Biome";
    pub const NEAR: &str = "Near";
    pub const TYPE: &str = "Type";
}

/// An event page with its scalar fields projected and its relations still raw.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub id: String,
    pub name: String,
    pub start_year: i64,
    pub end_year: Option<i64>,
    pub event_type: Option<EventType>,
    pub importance: Option<u8>,
    pub description: Option<String>,
    pub excerpt: Option<String>,
    pub location_id: Option<String>,
    pub polity_ids: Vec<String>,
}

impl EventRecord {
    pub fn from_page(page: &Page) -> Result<Self, ResolveError> {
        let name = required_name(page)?;
        let start_year = year(page, props::START_YEAR)?.ok_or_else(|| {
            ResolveError::MalformedRecord {
                id: page.id.clone(),
                property: props::START_YEAR.to_string(),
            }
        })?;

        Ok(Self {
            id: page.id.clone(),
            name,
            start_year,
            end_year: year(page, props::END_YEAR)?,
            event_type: select_enum(page, props::EVENT_TYPE),
            importance: importance(page),
            description: page.rich_text(props::DESCRIPTION),
            excerpt: page.rich_text(props::EXCERPT),
            location_id: page.first_relation_id(props::LOCATION),
            polity_ids: page.relation_ids(props::POLITY),
        })
    }

    /// Last year of the event; punctual events end the year they start.
    pub fn effective_end_year(&self) -> i64 {
        self.end_year.unwrap_or(self.start_year)
    }

    /// Attach the resolved relations, producing the flattened event.
    pub fn into_event(self, location: Option<Location>, polities: Vec<Polity>) -> Event {
        Event {
            name: self.name,
            start_year: self.start_year,
            end_year: self.end_year,
            event_type: self.event_type,
            importance: self.importance,
            description: self.description,
            excerpt: self.excerpt,
            location,
            polities,
        }
    }
}

/// A location page with its adjacency still as raw ids.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationRecord {
    pub id: String,
    pub name: String,
    pub biome: Option<Biome>,
    pub near_ids: Vec<String>,
}

impl LocationRecord {
    pub fn from_page(page: &Page) -> Result<Self, ResolveError> {
        Ok(Self {
            id: page.id.clone(),
            name: required_name(page)?,
            biome: select_enum(page, props::BIOME),
            near_ids: page.relation_ids(props::NEAR),
        })
    }

    pub fn into_location(self, near: Vec<String>) -> Location {
        Location {
            name: self.name,
            biome: self.biome,
            near,
        }
    }
}

/// Project a polity page. The polity's own relations are not followed.
pub fn polity_from_page(page: &Page) -> Result<Polity, ResolveError> {
    Ok(Polity {
        name: required_name(page)?,
        polity_type: page.select(props::TYPE).map(str::to_string),
        start_year: year(page, props::START_YEAR)?,
        end_year: year(page, props::END_YEAR)?,
    })
}

/// The display name of any page, if it has one.
pub fn display_name(page: &Page) -> Option<String> {
    page.title(props::NAME)
}

fn required_name(page: &Page) -> Result<String, ResolveError> {
    display_name(page).ok_or_else(|| ResolveError::MalformedRecord {
        id: page.id.clone(),
        property: props::NAME.to_string(),
    })
}

/// Read a year. Zero is a valid year; only an empty number is absent.
fn year(page: &Page, property: &str) -> Result<Option<i64>, ResolveError> {
    match page.number(property) {
        None => Ok(None),
        Some(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => Ok(Some(n as i64)),
        Some(_) => Err(ResolveError::MalformedRecord {
            id: page.id.clone(),
            property: property.to_string(),
        }),
    }
}

fn importance(page: &Page) -> Option<u8> {
    let n = page.number(props::IMPORTANCE)?;
    if n.fract() == 0.0 && (0.0..=f64::from(MAX_IMPORTANCE)).contains(&n) {
        Some(n as u8)
    } else {
        warn!(page = %page.id, value = n, "importance outside 0..=10, ignoring");
        None
    }
}

fn select_enum<T: std::str::FromStr>(page: &Page, property: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    let label = page.select(property)?;
    match label.parse() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(page = %page.id, property, error = %e, "unrecognized select option, ignoring");
            None
        }
    }
}
