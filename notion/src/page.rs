//! Pages and their typed property values.
//!
//! A page is a property bag keyed by the human-readable property name. Each
//! value is tagged with its `type`; only the kinds needed to read timeline
//! databases are modelled, everything else deserializes as `Unsupported`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A database row (or standalone page).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: String,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
}

/// A single property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PropertyValue {
    Title {
        #[serde(default)]
        title: Vec<RichText>,
    },
    RichText {
        #[serde(default)]
        rich_text: Vec<RichText>,
    },
    Number {
        #[serde(default)]
        number: Option<f64>,
    },
    Select {
        #[serde(default)]
        select: Option<SelectOption>,
    },
    Relation {
        #[serde(default)]
        relation: Vec<RelationRef>,
    },
    #[serde(other)]
    Unsupported,
}

/// One span of rich text. Formatting is dropped; only the plain text is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RichText {
    #[serde(default)]
    pub plain_text: String,
}

impl RichText {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            plain_text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub name: String,
}

/// Reference to another page through a relation property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationRef {
    pub id: String,
}

fn join_spans(spans: &[RichText]) -> Option<String> {
    let text: String = spans.iter().map(|s| s.plain_text.as_str()).collect();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

impl Page {
    /// Create an empty page with the given id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    /// Concatenated plain text of a title property, `None` when absent or empty.
    pub fn title(&self, name: &str) -> Option<String> {
        match self.property(name)? {
            PropertyValue::Title { title } => join_spans(title),
            _ => None,
        }
    }

    /// Concatenated plain text of a rich text property, `None` when absent or empty.
    pub fn rich_text(&self, name: &str) -> Option<String> {
        match self.property(name)? {
            PropertyValue::RichText { rich_text } => join_spans(rich_text),
            _ => None,
        }
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        match self.property(name)? {
            PropertyValue::Number { number } => *number,
            _ => None,
        }
    }

    /// Name of the selected option, if any.
    pub fn select(&self, name: &str) -> Option<&str> {
        match self.property(name)? {
            PropertyValue::Select { select } => select.as_ref().map(|s| s.name.as_str()),
            _ => None,
        }
    }

    /// Ids of every page referenced by a relation property, in order.
    pub fn relation_ids(&self, name: &str) -> Vec<String> {
        match self.property(name) {
            Some(PropertyValue::Relation { relation }) => {
                relation.iter().map(|r| r.id.clone()).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Id of the first page referenced by a relation property.
    pub fn first_relation_id(&self, name: &str) -> Option<String> {
        match self.property(name)? {
            PropertyValue::Relation { relation } => relation.first().map(|r| r.id.clone()),
            _ => None,
        }
    }

    // Builders, mostly useful for fixtures.

    pub fn with_title(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.properties.insert(
            name.into(),
            PropertyValue::Title {
                title: vec![RichText::plain(text)],
            },
        );
        self
    }

    pub fn with_rich_text(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.properties.insert(
            name.into(),
            PropertyValue::RichText {
                rich_text: vec![RichText::plain(text)],
            },
        );
        self
    }

    pub fn with_number(mut self, name: impl Into<String>, number: Option<f64>) -> Self {
        self.properties
            .insert(name.into(), PropertyValue::Number { number });
        self
    }

    pub fn with_select(mut self, name: impl Into<String>, option: Option<&str>) -> Self {
        self.properties.insert(
            name.into(),
            PropertyValue::Select {
                select: option.map(|o| SelectOption {
                    name: o.to_string(),
                }),
            },
        );
        self
    }

    pub fn with_relation<I, S>(mut self, name: impl Into<String>, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let relation = ids
            .into_iter()
            .map(|id| RelationRef { id: id.into() })
            .collect();
        self.properties
            .insert(name.into(), PropertyValue::Relation { relation });
        self
    }
}
