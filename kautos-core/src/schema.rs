//! Timeline schema: events, locations, polities.
//!
//! These are the flattened values the resolver produces and the shape the
//! generative backend is forced to return. Store-side data is often
//! incomplete (that is what "complete event" is for), so every field the
//! store may leave empty is an `Option`; [`Event::validate_generated`] is
//! the stricter check applied to model output.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

/// Highest importance rating an event can carry.
pub const MAX_IMPORTANCE: u8 = 10;

/// Classification of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "Technological advancement")]
    TechnologicalAdvancement,
    #[serde(rename = "Political event")]
    PoliticalEvent,
    #[serde(rename = "Population migration")]
    PopulationMigration,
    #[serde(rename = "Military action")]
    MilitaryAction,
    #[serde(rename = "Construction")]
    Construction,
    #[serde(rename = "Colonization")]
    Colonization,
    #[serde(rename = "Economic event")]
    EconomicEvent,
    #[serde(rename = "Civil action")]
    CivilAction,
    #[serde(rename = "Personal event")]
    PersonalEvent,
    #[serde(rename = "Religious event")]
    ReligiousEvent,
}

impl EventType {
    pub const ALL: [EventType; 10] = [
        EventType::TechnologicalAdvancement,
        EventType::PoliticalEvent,
        EventType::PopulationMigration,
        EventType::MilitaryAction,
        EventType::Construction,
        EventType::Colonization,
        EventType::EconomicEvent,
        EventType::CivilAction,
        EventType::PersonalEvent,
        EventType::ReligiousEvent,
    ];

    /// The label used both in the store's select options and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::TechnologicalAdvancement => "Technological advancement",
            EventType::PoliticalEvent => "Political event",
            EventType::PopulationMigration => "Population migration",
            EventType::MilitaryAction => "Military action",
            EventType::Construction => "Construction",
            EventType::Colonization => "Colonization",
            EventType::EconomicEvent => "Economic event",
            EventType::CivilAction => "Civil action",
            EventType::PersonalEvent => "Personal event",
            EventType::ReligiousEvent => "Religious event",
        }
    }
}

/// Predominant climate of a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Biome {
    #[serde(rename = "Cold Desert")]
    ColdDesert,
    #[serde(rename = "Hot Desert")]
    HotDesert,
    #[serde(rename = "Cold Steppe")]
    ColdSteppe,
    #[serde(rename = "Hot Steppe")]
    HotSteppe,
    #[serde(rename = "Maritime")]
    Maritime,
    #[serde(rename = "Mediterranean")]
    Mediterranean,
    #[serde(rename = "Temperate Monsoon")]
    TemperateMonsoon,
    #[serde(rename = "Tropical Rainforest")]
    TropicalRainforest,
    #[serde(rename = "Savanna")]
    Savanna,
    #[serde(rename = "Continental")]
    Continental,
    #[serde(rename = "Taiga")]
    Taiga,
    #[serde(rename = "Tundra")]
    Tundra,
}

impl Biome {
    pub const ALL: [Biome; 12] = [
        Biome::ColdDesert,
        Biome::HotDesert,
        Biome::ColdSteppe,
        Biome::HotSteppe,
        Biome::Maritime,
        Biome::Mediterranean,
        Biome::TemperateMonsoon,
        Biome::TropicalRainforest,
        Biome::Savanna,
        Biome::Continental,
        Biome::Taiga,
        Biome::Tundra,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Biome::ColdDesert => "Cold Desert",
            Biome::HotDesert => "Hot Desert",
            Biome::ColdSteppe => "Cold Steppe",
            Biome::HotSteppe => "Hot Steppe",
            Biome::Maritime => "Maritime",
            Biome::Mediterranean => "Mediterranean",
            Biome::TemperateMonsoon => "Temperate Monsoon",
            Biome::TropicalRainforest => "Tropical Rainforest",
            Biome::Savanna => "Savanna",
            Biome::Continental => "Continental",
            Biome::Taiga => "Taiga",
            Biome::Tundra => "Tundra",
        }
    }
}

/// Returned when a label matches none of an enum's values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl FromStr for EventType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "event type",
                value: s.to_string(),
            })
    }
}

impl FromStr for Biome {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Biome::ALL
            .into_iter()
            .find(|b| b.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "biome",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Biome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A geographical location, embedded by value in an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub biome: Option<Biome>,
    /// Names of adjacent locations.
    #[serde(default)]
    pub near: Vec<String>,
}

/// Minimal projection of a political entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polity {
    pub name: String,
    #[serde(rename = "type")]
    pub polity_type: Option<String>,
    pub start_year: Option<i64>,
    pub end_year: Option<i64>,
}

/// A historical event of the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    pub start_year: i64,
    /// `None` for punctual events.
    pub end_year: Option<i64>,
    pub event_type: Option<EventType>,
    pub importance: Option<u8>,
    pub description: Option<String>,
    pub excerpt: Option<String>,
    pub location: Option<Location>,
    #[serde(default)]
    pub polities: Vec<Polity>,
}

impl Event {
    /// Last year of the event; punctual events end the year they start.
    pub fn effective_end_year(&self) -> i64 {
        self.end_year.unwrap_or(self.start_year)
    }

    pub fn location_name(&self) -> Option<&str> {
        self.location.as_ref().map(|l| l.name.as_str())
    }

    /// Check a model-produced event against the full output contract.
    ///
    /// Returns every violation found, not just the first.
    pub fn validate_generated(&self) -> Result<(), Vec<SchemaViolation>> {
        let mut violations = Vec::new();

        if self.name.trim().is_empty() {
            violations.push(SchemaViolation::new("name", "must not be empty"));
        }
        if let Some(end) = self.end_year {
            if end < self.start_year {
                violations.push(SchemaViolation::new(
                    "end_year",
                    format!("{end} is before start_year {}", self.start_year),
                ));
            }
        }
        if self.event_type.is_none() {
            violations.push(SchemaViolation::missing("event_type"));
        }
        match self.importance {
            None => violations.push(SchemaViolation::missing("importance")),
            Some(i) if i > MAX_IMPORTANCE => violations.push(SchemaViolation::new(
                "importance",
                format!("{i} is outside 0..={MAX_IMPORTANCE}"),
            )),
            Some(_) => {}
        }
        if self.description.as_deref().map_or(true, |d| d.trim().is_empty()) {
            violations.push(SchemaViolation::missing("description"));
        }
        if self.excerpt.as_deref().map_or(true, |e| e.trim().is_empty()) {
            violations.push(SchemaViolation::missing("excerpt"));
        }
        match &self.location {
            None => violations.push(SchemaViolation::missing("location")),
            Some(location) => {
                if location.name.trim().is_empty() {
                    violations.push(SchemaViolation::new("location.name", "must not be empty"));
                }
                if location.biome.is_none() {
                    violations.push(SchemaViolation::missing("location.biome"));
                }
            }
        }
        for (i, polity) in self.polities.iter().enumerate() {
            let field = |name: &str| format!("polities[{i}].{name}");
            if polity.polity_type.is_none() {
                violations.push(SchemaViolation::missing(field("type")));
            }
            match (polity.start_year, polity.end_year) {
                (Some(start), Some(end)) if end < start => violations.push(SchemaViolation::new(
                    field("end_year"),
                    format!("{end} is before start_year {start}"),
                )),
                (Some(_), Some(_)) => {}
                (None, _) => violations.push(SchemaViolation::missing(field("start_year"))),
                (_, None) => violations.push(SchemaViolation::missing(field("end_year"))),
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

/// One way in which a value breaks the output contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    pub field: String,
    pub problem: String,
}

impl SchemaViolation {
    pub fn new(field: impl Into<String>, problem: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            problem: problem.into(),
        }
    }

    fn missing(field: impl Into<String>) -> Self {
        Self::new(field, "is required")
    }
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.problem)
    }
}

// ============================================================================
// JSON schemas handed to the generative backend
// ============================================================================

/// JSON schema of [`Polity`].
pub fn polity_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "name": {
                "type": "string",
                "description": "Unique name of the polity."
            },
            "type": {
                "type": "string",
                "description": "Political structure or classification (e.g., Empire, Kingdom, Tribal Confederation)."
            },
            "start_year": {
                "type": "integer",
                "description": "Founding year or year of emergence of the polity."
            },
            "end_year": {
                "type": "integer",
                "description": "Year of the polity's dissolution, conquest, or significant transformation."
            }
        },
        "required": ["name", "type", "start_year", "end_year"]
    })
}

/// JSON schema of [`Location`].
pub fn location_schema() -> Value {
    let biomes: Vec<&str> = Biome::ALL.iter().map(|b| b.as_str()).collect();
    json!({
        "type": "object",
        "properties": {
            "name": {
                "type": "string",
                "description": "Unique name of the geographical location."
            },
            "biome": {
                "type": "string",
                "enum": biomes,
                "description": "Predominant biome of the location."
            },
            "near": {
                "type": "array",
                "items": {"type": "string"},
                "description": "Names of locations adjacent to this one."
            }
        },
        "required": ["name", "biome", "near"]
    })
}

/// JSON schema of [`Event`], the shape every generation call must return.
pub fn event_schema() -> Value {
    let event_types: Vec<&str> = EventType::ALL.iter().map(|t| t.as_str()).collect();
    json!({
        "type": "object",
        "properties": {
            "name": {
                "type": "string",
                "description": "A concise and unique title for the event, distinct from other event names."
            },
            "start_year": {
                "type": "integer",
                "description": "Year the event began."
            },
            "end_year": {
                "type": ["integer", "null"],
                "description": "Year the event concluded. Null if the event is punctual."
            },
            "event_type": {
                "type": "string",
                "enum": event_types,
                "description": "Primary classification of the event."
            },
            "importance": {
                "type": "integer",
                "minimum": 0,
                "maximum": MAX_IMPORTANCE,
                "description": "Impact rating: 10 era-defining, 8 major widespread, 6 significant regional, 4 notable local, 0-2 minor."
            },
            "description": {
                "type": "string",
                "description": "Narrative of the event: causes, key occurrences, factions or characters involved, and outcomes. Two to three paragraphs."
            },
            "excerpt": {
                "type": "string",
                "description": "One or two sentence summary suitable for a timeline entry."
            },
            "location": location_schema(),
            "polities": {
                "type": "array",
                "items": polity_schema(),
                "description": "Polities directly involved in or significantly affected by the event."
            }
        },
        "required": [
            "name", "start_year", "end_year", "event_type", "importance",
            "description", "excerpt", "location", "polities"
        ]
    })
}
