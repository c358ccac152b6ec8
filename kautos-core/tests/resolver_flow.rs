//! Resolver flows against the in-memory sample world.

use kautos_core::error::{RecordKind, ResolveError};
use kautos_core::projection::props;
use kautos_core::resolver::{FETCH_FAILED_NAME, UNKNOWN_NAME};
use kautos_core::testing::{event_page, sample_world, InMemoryStore, LOCATION_DB, TIMELINE_DB};
use kautos_core::{Biome, ContextResolver, EventType, RangeQuery, RelationPolicy};
use notion::{Filter, Page};

fn resolver(store: InMemoryStore) -> ContextResolver<InMemoryStore> {
    ContextResolver::new(store, TIMELINE_DB, LOCATION_DB)
}

fn names(events: &[kautos_core::Event]) -> Vec<&str> {
    events.iter().map(|e| e.name.as_str()).collect()
}

/// Filter of the most recent timeline query.
fn last_timeline_filter(store: &InMemoryStore) -> Option<Filter> {
    store
        .queries()
        .into_iter()
        .rev()
        .find(|(db, _)| db == TIMELINE_DB)
        .and_then(|(_, filter)| filter)
}

// =============================================================================
// LOOKUP BY NAME
// =============================================================================

#[tokio::test]
async fn test_resolve_by_name_flattens_relations() {
    let resolver = resolver(sample_world());
    let event = resolver.resolve_by_name("Founding of Merkuna").await.unwrap();

    assert_eq!(event.name, "Founding of Merkuna");
    assert_eq!(event.start_year, -700);
    assert_eq!(event.end_year, Some(-690));
    assert_eq!(event.event_type, Some(EventType::Construction));

    let location = event.location.unwrap();
    assert_eq!(location.name, "Lower Antiyan Basin");
    assert_eq!(location.biome, Some(Biome::Savanna));
    assert_eq!(location.near, vec!["Tirlarli Littoral", "Lower Antiyan Basin"]);

    let polities: Vec<&str> = event.polities.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(polities, vec!["Sîdanêgi Empire", "Antiyan League"]);
    assert_eq!(event.polities[1].end_year, None);
}

#[tokio::test]
async fn test_unknown_name_is_not_found() {
    let resolver = resolver(sample_world());
    let err = resolver.resolve_by_name("Fall of Merkuna").await.unwrap_err();
    assert!(matches!(
        err,
        ResolveError::NotFound { kind: RecordKind::Event, ref name } if name == "Fall of Merkuna"
    ));
}

#[tokio::test]
async fn test_duplicate_names_take_the_first_match() {
    let store = sample_world().with_page(
        TIMELINE_DB,
        event_page("evt-raids-2", "Hadrani Raids", -400, None, EventType::MilitaryAction, None, &[]),
    );
    let event = resolver(store).resolve_by_name("Hadrani Raids").await.unwrap();
    assert_eq!(event.start_year, -1050);
}

#[tokio::test]
async fn test_failed_polity_fetch_propagates() {
    let resolver = resolver(sample_world().failing_on("pol-antiya"));
    let err = resolver.resolve_by_name("Apollonian Migration").await.unwrap_err();
    assert!(matches!(
        err,
        ResolveError::RelationResolution { kind: RecordKind::Polity, ref id, .. } if id == "pol-antiya"
    ));
}

#[tokio::test]
async fn test_failed_location_fetch_propagates() {
    let resolver = resolver(sample_world().failing_on("loc-steppe"));
    let err = resolver.resolve_by_name("Hadrani Raids").await.unwrap_err();
    assert!(matches!(
        err,
        ResolveError::RelationResolution { kind: RecordKind::Location, .. }
    ));
}

#[tokio::test]
async fn test_failed_near_name_degrades() {
    let resolver = resolver(sample_world().failing_on("loc-littoral"));
    let event = resolver.resolve_by_name("Founding of Merkuna").await.unwrap();
    assert_eq!(
        event.location.unwrap().near,
        vec![FETCH_FAILED_NAME, "Lower Antiyan Basin"]
    );
}

#[tokio::test]
async fn test_missing_near_page_degrades() {
    let resolver = resolver(sample_world());
    let event = resolver.resolve_by_name("Veskar Compact").await.unwrap();
    assert_eq!(event.location.unwrap().near, vec![FETCH_FAILED_NAME]);
}

#[tokio::test]
async fn test_relation_name_policies() {
    let store = sample_world()
        .with_page(LOCATION_DB, Page::new("loc-unnamed"))
        .failing_on("loc-littoral");
    let resolver = resolver(store);
    let ids = vec!["loc-unnamed".to_string(), "loc-littoral".to_string()];

    let degraded = resolver
        .relation_names(RecordKind::Location, &ids, RelationPolicy::DegradeWithPlaceholder)
        .await
        .unwrap();
    assert_eq!(degraded, vec![UNKNOWN_NAME, FETCH_FAILED_NAME]);

    let err = resolver
        .relation_names(RecordKind::Location, &ids, RelationPolicy::Propagate)
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::RelationResolution { ref id, .. } if id == "loc-littoral"));
}

// =============================================================================
// SIMILAR EVENTS
// =============================================================================

#[tokio::test]
async fn test_similar_events_near_and_symmetric() {
    let resolver = resolver(sample_world());
    let (seed, similar) = resolver
        .resolve_similar_to_event("Raising of Tirlarli Harbor", 50, true, true)
        .await
        .unwrap();

    assert_eq!(seed.name, "Raising of Tirlarli Harbor");
    assert_eq!(names(&similar), vec!["Apollonian Migration"]);

    let expected = Filter::and(vec![
        Filter::number_at_least(props::START_YEAR, -1150.0),
        Filter::number_at_most(props::START_YEAR, -1030.0),
        Filter::title_does_not_equal(props::NAME, "Raising of Tirlarli Harbor"),
        Filter::or(vec![
            Filter::relation_contains(props::LOCATION, "loc-littoral"),
            Filter::relation_contains(props::LOCATION, "loc-basin"),
        ]),
    ]);
    assert_eq!(last_timeline_filter(resolver.store()), Some(expected));
}

#[tokio::test]
async fn test_similar_events_without_near_exclude_the_seed() {
    let resolver = resolver(sample_world());
    let (_, similar) = resolver
        .resolve_similar_to_event("Raising of Tirlarli Harbor", 50, false, true)
        .await
        .unwrap();
    assert!(similar.is_empty());
}

#[tokio::test]
async fn test_asymmetric_window_does_not_look_forward() {
    let resolver = resolver(sample_world());
    resolver
        .resolve_similar_to_event("Apollonian Migration", 50, true, false)
        .await
        .unwrap();

    let filter = last_timeline_filter(resolver.store()).unwrap();
    let Filter::And { and } = filter else {
        panic!("expected a conjunction");
    };
    assert_eq!(and[0], Filter::number_at_least(props::START_YEAR, -1200.0));
    assert_eq!(and[1], Filter::number_at_most(props::START_YEAR, -1150.0));
}

#[tokio::test]
async fn test_self_adjacent_location_is_listed_once() {
    let resolver = resolver(sample_world());
    resolver
        .resolve_similar_to_event("Founding of Merkuna", 10, true, true)
        .await
        .unwrap();

    let filter = last_timeline_filter(resolver.store()).unwrap();
    let Filter::And { and } = filter else {
        panic!("expected a conjunction");
    };
    assert_eq!(
        and[3],
        Filter::or(vec![
            Filter::relation_contains(props::LOCATION, "loc-basin"),
            Filter::relation_contains(props::LOCATION, "loc-littoral"),
        ])
    );
}

#[tokio::test]
async fn test_seed_without_location_searches_everywhere() {
    let resolver = resolver(sample_world());
    let (seed, similar) = resolver
        .resolve_similar_to_event("Schism of the Lamps", 100, true, true)
        .await
        .unwrap();

    assert!(seed.location.is_none());
    assert_eq!(names(&similar), vec!["Raising of Tirlarli Harbor", "Hadrani Raids"]);
}

// =============================================================================
// RANGE QUERIES
// =============================================================================

#[tokio::test]
async fn test_unknown_location_drops_the_constraint() {
    let resolver = resolver(sample_world());
    let query = RangeQuery::starting_from(-1200)
        .until(-1000)
        .at_location("Nowhereland")
        .near(true);
    let events = resolver.resolve_in_range(&query).await.unwrap();

    assert_eq!(
        names(&events),
        vec![
            "Apollonian Migration",
            "Veskar Compact",
            "Raising of Tirlarli Harbor",
            "Hadrani Raids",
            "Schism of the Lamps",
        ]
    );
}

#[tokio::test]
async fn test_location_without_near_matches_only_itself() {
    let resolver = resolver(sample_world());
    let query = RangeQuery::starting_from(-1200)
        .until(-600)
        .at_location("Lower Antiyan Basin");
    let events = resolver.resolve_in_range(&query).await.unwrap();
    assert_eq!(names(&events), vec!["Apollonian Migration", "Founding of Merkuna"]);
}

#[tokio::test]
async fn test_open_ended_range() {
    let resolver = resolver(sample_world());
    let events = resolver
        .resolve_in_range(&RangeQuery::starting_from(-1000))
        .await
        .unwrap();
    assert_eq!(names(&events), vec!["Schism of the Lamps", "Founding of Merkuna"]);
}

#[tokio::test]
async fn test_range_queries_follow_cursors_up_to_the_cap() {
    let query = RangeQuery::starting_from(-1200).until(-1000);

    let all = resolver(sample_world().with_page_size(2))
        .resolve_in_range(&query)
        .await
        .unwrap();
    assert_eq!(all.len(), 5);

    let capped = resolver(sample_world().with_page_size(2))
        .with_max_query_pages(2)
        .resolve_in_range(&query)
        .await
        .unwrap();
    assert_eq!(capped.len(), 4);
}

#[tokio::test]
async fn test_malformed_record_in_range_fails_the_query() {
    let broken = Page::new("evt-broken")
        .with_title(props::NAME, "Half-Remembered Siege")
        .with_number(props::START_YEAR, Some(-1010.5));
    let resolver = resolver(sample_world().with_page(TIMELINE_DB, broken));

    let err = resolver
        .resolve_in_range(&RangeQuery::starting_from(-1200).until(-1000))
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::MalformedRecord { ref id, .. } if id == "evt-broken"));
}
