//! Property tests for windows, location sets and lossless projection.

use kautos_core::projection::{props, EventRecord};
use kautos_core::resolver::location_ids;
use kautos_core::testing::{sample_world, LOCATION_DB, TIMELINE_DB};
use kautos_core::{ContextResolver, Event, EventType, YearRange};
use notion::Page;
use proptest::prelude::*;
use std::collections::HashSet;

// ============================================================================
// Strategies
// ============================================================================

fn event_type_strategy() -> impl Strategy<Value = EventType> {
    proptest::sample::select(EventType::ALL.to_vec())
}

fn year_strategy() -> impl Strategy<Value = i64> {
    -5000i64..5000
}

/// Events as the resolver produces them without relations.
fn unrelated_event_strategy() -> impl Strategy<Value = Event> {
    (
        "[A-Z][a-z]{2,15}( [A-Z][a-z]{2,10})?",
        year_strategy(),
        proptest::option::of(0i64..300),
        proptest::option::of(event_type_strategy()),
        proptest::option::of(0u8..=10),
        proptest::option::of("[a-z ]{1,40}[a-z]"),
        proptest::option::of("[a-z ]{1,20}[a-z]"),
    )
        .prop_map(|(name, start, length, event_type, importance, description, excerpt)| Event {
            name,
            start_year: start,
            end_year: length.map(|l| start + l),
            event_type,
            importance,
            description,
            excerpt,
            location: None,
            polities: Vec::new(),
        })
}

fn to_page(event: &Event) -> Page {
    Page::new("evt")
        .with_title(props::NAME, event.name.clone())
        .with_number(props::START_YEAR, Some(event.start_year as f64))
        .with_number(props::END_YEAR, event.end_year.map(|y| y as f64))
        .with_select(props::EVENT_TYPE, event.event_type.map(|t| t.as_str()))
        .with_number(props::IMPORTANCE, event.importance.map(f64::from))
        .with_rich_text(props::DESCRIPTION, event.description.clone().unwrap_or_default())
        .with_rich_text(props::EXCERPT, event.excerpt.clone().unwrap_or_default())
}

// ============================================================================
// Search windows
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn window_always_covers_the_seed(
        start in year_strategy(),
        length in proptest::option::of(0i64..300),
        delta in 0u32..1000,
        symmetric in any::<bool>(),
    ) {
        let end = length.map(|l| start + l);
        let window = YearRange::around(start, end, delta, symmetric);
        let effective_end = end.unwrap_or(start);

        prop_assert_eq!(window.start, start - i64::from(delta));
        prop_assert!(window.contains(start));
        prop_assert!(window.contains(effective_end));
        if symmetric {
            prop_assert_eq!(window.end, effective_end + i64::from(delta));
        } else {
            prop_assert_eq!(window.end, effective_end);
        }
    }

    #[test]
    fn location_set_has_no_duplicates(
        near in proptest::collection::vec(prop_oneof![Just("self"), Just("a"), Just("b"), Just("c")], 0..8),
    ) {
        let location = Page::new("self").with_relation(props::NEAR, near.clone());
        let ids = location_ids(&location, true);

        prop_assert_eq!(ids[0].as_str(), "self");
        let unique: HashSet<&String> = ids.iter().collect();
        prop_assert_eq!(unique.len(), ids.len());

        let mut expected: HashSet<&str> = near.into_iter().collect();
        expected.insert("self");
        prop_assert_eq!(ids.iter().map(String::as_str).collect::<HashSet<_>>(), expected);
    }
}

// ============================================================================
// Lossless projection
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn projection_preserves_every_field(event in unrelated_event_strategy()) {
        let projected = EventRecord::from_page(&to_page(&event))
            .unwrap()
            .into_event(None, Vec::new());
        prop_assert_eq!(&projected, &event);

        let wire = serde_json::to_value(&projected).unwrap();
        let back: Event = serde_json::from_value(wire).unwrap();
        prop_assert_eq!(back, event);
    }
}

// ============================================================================
// Similar events
// ============================================================================

const SAMPLE_EVENTS: [&str; 6] = [
    "Apollonian Migration",
    "Veskar Compact",
    "Raising of Tirlarli Harbor",
    "Hadrani Raids",
    "Schism of the Lamps",
    "Founding of Merkuna",
];

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn similar_events_never_include_the_seed(
        seed in proptest::sample::select(SAMPLE_EVENTS.to_vec()),
        delta in 0u32..2000,
        symmetric in any::<bool>(),
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let resolver = ContextResolver::new(sample_world(), TIMELINE_DB, LOCATION_DB);
        let (found, similar) = runtime
            .block_on(resolver.resolve_similar_to_event(seed, delta, true, symmetric))
            .unwrap();

        prop_assert_eq!(found.name.as_str(), seed);
        prop_assert!(similar.iter().all(|e| e.name != seed));
    }
}
