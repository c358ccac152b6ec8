//! Database query filters.
//!
//! Serializes to the compound filter shape of the databases query endpoint:
//! `{"and": [...]}`, `{"or": [...]}` or a single property predicate such as
//! `{"property": "Start Year", "number": {"greater_than_or_equal_to": -1200}}`.

use crate::page::Page;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Filter {
    And { and: Vec<Filter> },
    Or { or: Vec<Filter> },
    Property(PropertyFilter),
}

/// A predicate on one named property.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyFilter {
    pub property: String,
    #[serde(flatten)]
    pub condition: Condition,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Title(TextCondition),
    Number(NumberCondition),
    Relation(RelationCondition),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextCondition {
    Equals(String),
    DoesNotEqual(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberCondition {
    Equals(f64),
    GreaterThanOrEqualTo(f64),
    LessThanOrEqualTo(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationCondition {
    Contains(String),
}

impl Filter {
    fn property(name: impl Into<String>, condition: Condition) -> Self {
        Filter::Property(PropertyFilter {
            property: name.into(),
            condition,
        })
    }

    pub fn title_equals(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self::property(property, Condition::Title(TextCondition::Equals(value.into())))
    }

    pub fn title_does_not_equal(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self::property(
            property,
            Condition::Title(TextCondition::DoesNotEqual(value.into())),
        )
    }

    pub fn number_at_least(property: impl Into<String>, value: f64) -> Self {
        Self::property(
            property,
            Condition::Number(NumberCondition::GreaterThanOrEqualTo(value)),
        )
    }

    pub fn number_at_most(property: impl Into<String>, value: f64) -> Self {
        Self::property(
            property,
            Condition::Number(NumberCondition::LessThanOrEqualTo(value)),
        )
    }

    pub fn relation_contains(property: impl Into<String>, page_id: impl Into<String>) -> Self {
        Self::property(
            property,
            Condition::Relation(RelationCondition::Contains(page_id.into())),
        )
    }

    pub fn and(filters: Vec<Filter>) -> Self {
        Filter::And { and: filters }
    }

    pub fn or(filters: Vec<Filter>) -> Self {
        Filter::Or { or: filters }
    }

    /// Evaluate the filter against a page locally.
    ///
    /// Follows the server's semantics for the predicates modelled here: a
    /// number predicate on an empty number never matches, `does_not_equal`
    /// matches an empty title.
    pub fn matches(&self, page: &Page) -> bool {
        match self {
            Filter::And { and } => and.iter().all(|f| f.matches(page)),
            Filter::Or { or } => or.iter().any(|f| f.matches(page)),
            Filter::Property(p) => p.matches(page),
        }
    }
}

impl PropertyFilter {
    fn matches(&self, page: &Page) -> bool {
        match &self.condition {
            Condition::Title(TextCondition::Equals(v)) => {
                page.title(&self.property).as_deref() == Some(v.as_str())
            }
            Condition::Title(TextCondition::DoesNotEqual(v)) => {
                page.title(&self.property).as_deref() != Some(v.as_str())
            }
            Condition::Number(cond) => match page.number(&self.property) {
                None => false,
                Some(n) => match cond {
                    NumberCondition::Equals(v) => n == *v,
                    NumberCondition::GreaterThanOrEqualTo(v) => n >= *v,
                    NumberCondition::LessThanOrEqualTo(v) => n <= *v,
                },
            },
            Condition::Relation(RelationCondition::Contains(id)) => {
                page.relation_ids(&self.property).iter().any(|r| r == id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_property_predicates_serialize() {
        assert_eq!(
            serde_json::to_value(Filter::title_equals("Name", "Kautos")).unwrap(),
            json!({"property": "Name", "title": {"equals": "Kautos"}})
        );
        assert_eq!(
            serde_json::to_value(Filter::title_does_not_equal("Name", "Kautos")).unwrap(),
            json!({"property": "Name", "title": {"does_not_equal": "Kautos"}})
        );
        assert_eq!(
            serde_json::to_value(Filter::number_at_least("Start Year", -1200.0)).unwrap(),
            json!({"property": "Start Year", "number": {"greater_than_or_equal_to": -1200.0}})
        );
        assert_eq!(
            serde_json::to_value(Filter::number_at_most("Start Year", 5.0)).unwrap(),
            json!({"property": "Start Year", "number": {"less_than_or_equal_to": 5.0}})
        );
        assert_eq!(
            serde_json::to_value(Filter::relation_contains("Location", "loc-1")).unwrap(),
            json!({"property": "Location", "relation": {"contains": "loc-1"}})
        );
    }

    #[test]
    fn test_compound_filters_serialize() {
        let filter = Filter::and(vec![
            Filter::number_at_least("Start Year", 0.0),
            Filter::or(vec![
                Filter::relation_contains("Location", "a"),
                Filter::relation_contains("Location", "b"),
            ]),
        ]);
        assert_eq!(
            serde_json::to_value(&filter).unwrap(),
            json!({"and": [
                {"property": "Start Year", "number": {"greater_than_or_equal_to": 0.0}},
                {"or": [
                    {"property": "Location", "relation": {"contains": "a"}},
                    {"property": "Location", "relation": {"contains": "b"}}
                ]}
            ]})
        );
    }

    #[test]
    fn test_local_evaluation() {
        let page = Page::new("e")
            .with_title("Name", "Siege of Antiya")
            .with_number("Start Year", Some(-650.0))
            .with_relation("Location", ["loc-2"]);

        assert!(Filter::number_at_least("Start Year", -700.0).matches(&page));
        assert!(!Filter::number_at_most("Start Year", -700.0).matches(&page));
        assert!(Filter::title_does_not_equal("Name", "Other").matches(&page));
        assert!(!Filter::title_does_not_equal("Name", "Siege of Antiya").matches(&page));
        assert!(Filter::or(vec![
            Filter::relation_contains("Location", "loc-1"),
            Filter::relation_contains("Location", "loc-2"),
        ])
        .matches(&page));
        assert!(!Filter::and(vec![
            Filter::title_equals("Name", "Siege of Antiya"),
            Filter::relation_contains("Location", "loc-1"),
        ])
        .matches(&page));
    }

    #[test]
    fn test_number_predicate_on_empty_number() {
        let page = Page::new("e").with_number("Start Year", None);
        assert!(!Filter::number_at_least("Start Year", -1e9).matches(&page));
    }
}
