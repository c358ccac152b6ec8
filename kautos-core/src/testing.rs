//! Test doubles for the store and the generative backend.
//!
//! - [`InMemoryStore`] evaluates filters locally and pages results like the
//!   remote store does
//! - [`MockBackend`] returns scripted structured outputs and records requests
//! - [`sample_world`] is a small timeline used across the test suites

use crate::projection::props;
use crate::requester::{StructuredBackend, StructuredRequest};
use crate::schema::{Biome, Event, EventType, Location, Polity};
use async_trait::async_trait;
use notion::{DatabaseQuery, Filter, Page, QueryResponse};
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use crate::store::RecordStore;

/// Database id of the sample timeline.
pub const TIMELINE_DB: &str = "timeline-db";
/// Database id of the sample locations.
pub const LOCATION_DB: &str = "location-db";
/// Database id of the sample polities.
pub const POLITY_DB: &str = "polity-db";

const DEFAULT_PAGE_SIZE: usize = 100;

/// An in-memory [`RecordStore`].
///
/// Pages keep their insertion order within a database. Every page added to
/// a database can also be retrieved by id.
pub struct InMemoryStore {
    databases: HashMap<String, Vec<Page>>,
    failing: HashSet<String>,
    page_size: usize,
    queries: Mutex<Vec<(String, Option<Filter>)>>,
    retrievals: Mutex<Vec<String>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            databases: HashMap::new(),
            failing: HashSet::new(),
            page_size: DEFAULT_PAGE_SIZE,
            queries: Mutex::new(Vec::new()),
            retrievals: Mutex::new(Vec::new()),
        }
    }

    /// Add (or replace) a database with the given pages.
    pub fn with_database(mut self, database_id: impl Into<String>, pages: Vec<Page>) -> Self {
        self.databases.insert(database_id.into(), pages);
        self
    }

    /// Append one page to a database, creating the database if needed.
    pub fn with_page(mut self, database_id: impl Into<String>, page: Page) -> Self {
        self.databases.entry(database_id.into()).or_default().push(page);
        self
    }

    /// Results returned per query page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Make retrieval of `page_id` fail with a network error.
    pub fn failing_on(mut self, page_id: impl Into<String>) -> Self {
        self.failing.insert(page_id.into());
        self
    }

    /// Number of query pages served so far.
    pub fn query_count(&self) -> usize {
        self.queries.lock().map(|q| q.len()).unwrap_or(0)
    }

    /// Database ids and filters of every query page served, in order.
    pub fn queries(&self) -> Vec<(String, Option<Filter>)> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }

    /// Ids of every page retrieval attempted, in order.
    pub fn retrievals(&self) -> Vec<String> {
        self.retrievals.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn find_page(&self, page_id: &str) -> Option<&Page> {
        self.databases
            .values()
            .flat_map(|pages| pages.iter())
            .find(|page| page.id == page_id)
    }
}

fn not_found(what: &str) -> notion::Error {
    notion::Error::Api {
        status: 404,
        code: "object_not_found".to_string(),
        message: format!("Could not find {what}"),
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn query(
        &self,
        database_id: &str,
        query: &DatabaseQuery,
    ) -> Result<QueryResponse, notion::Error> {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push((database_id.to_string(), query.filter.clone()));
        }

        let pages = self
            .databases
            .get(database_id)
            .ok_or_else(|| not_found(&format!("database {database_id}")))?;

        let matching: Vec<&Page> = pages
            .iter()
            .filter(|page| query.filter.as_ref().map_or(true, |f| f.matches(page)))
            .collect();

        let offset = match &query.start_cursor {
            None => 0,
            Some(cursor) => cursor.parse::<usize>().map_err(|_| notion::Error::Api {
                status: 400,
                code: "validation_error".to_string(),
                message: format!("Invalid start_cursor {cursor}"),
            })?,
        };
        let page_size = query
            .page_size
            .map_or(self.page_size, |n| (n as usize).min(self.page_size));
        let end = (offset + page_size).min(matching.len());
        let has_more = end < matching.len();

        Ok(QueryResponse {
            results: matching
                .get(offset..end)
                .unwrap_or_default()
                .iter()
                .map(|page| (*page).clone())
                .collect(),
            has_more,
            next_cursor: has_more.then(|| end.to_string()),
        })
    }

    async fn retrieve(&self, page_id: &str) -> Result<Page, notion::Error> {
        if let Ok(mut retrievals) = self.retrievals.lock() {
            retrievals.push(page_id.to_string());
        }
        if self.failing.contains(page_id) {
            return Err(notion::Error::Network(format!(
                "connection reset while fetching {page_id}"
            )));
        }
        self.find_page(page_id)
            .cloned()
            .ok_or_else(|| not_found(&format!("page {page_id}")))
    }
}

/// A scripted [`StructuredBackend`].
///
/// Outputs are returned in the order they were scripted. Once the script
/// runs out, calls fail with [`claude::Error::MissingToolUse`].
#[derive(Default)]
pub struct MockBackend {
    outputs: Mutex<VecDeque<Result<Value, claude::Error>>>,
    requests: Mutex<Vec<StructuredRequest>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a successful tool call with `value` as its input.
    pub fn respond_with(self, value: Value) -> Self {
        if let Ok(mut outputs) = self.outputs.lock() {
            outputs.push_back(Ok(value));
        }
        self
    }

    /// Script a failed call.
    pub fn fail_with(self, error: claude::Error) -> Self {
        if let Ok(mut outputs) = self.outputs.lock() {
            outputs.push_back(Err(error));
        }
        self
    }

    /// Every request the backend has seen.
    pub fn requests(&self) -> Vec<StructuredRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl StructuredBackend for MockBackend {
    async fn generate(&self, request: StructuredRequest) -> Result<Value, claude::Error> {
        let tool_name = request.tool.name.clone();
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        self.outputs
            .lock()
            .ok()
            .and_then(|mut outputs| outputs.pop_front())
            .unwrap_or(Err(claude::Error::MissingToolUse { name: tool_name }))
    }
}

// ============================================================================
// Sample world
// ============================================================================

fn location_page(id: &str, name: &str, biome: Biome, near: &[&str]) -> Page {
    Page::new(id)
        .with_title(props::NAME, name)
        .with_select(props::BIOME, Some(biome.as_str()))
        .with_relation(props::NEAR, near.iter().copied())
}

fn polity_page(id: &str, name: &str, kind: &str, start: i64, end: Option<i64>) -> Page {
    Page::new(id)
        .with_title(props::NAME, name)
        .with_select(props::TYPE, Some(kind))
        .with_number(props::START_YEAR, Some(start as f64))
        .with_number(props::END_YEAR, end.map(|y| y as f64))
}

/// An event page as it is stored in the timeline database.
pub fn event_page(
    id: &str,
    name: &str,
    start: i64,
    end: Option<i64>,
    event_type: EventType,
    location_id: Option<&str>,
    polity_ids: &[&str],
) -> Page {
    Page::new(id)
        .with_title(props::NAME, name)
        .with_number(props::START_YEAR, Some(start as f64))
        .with_number(props::END_YEAR, end.map(|y| y as f64))
        .with_select(props::EVENT_TYPE, Some(event_type.as_str()))
        .with_number(props::IMPORTANCE, Some(5.0))
        .with_rich_text(props::DESCRIPTION, format!("What is known of {name}."))
        .with_relation(props::LOCATION, location_id)
        .with_relation(props::POLITY, polity_ids.iter().copied())
}

/// A small timeline of Kautos.
///
/// Locations: the Lower Antiyan Basin (near the Tirlarli Littoral and,
/// degenerately, itself), the Tirlarli Littoral (near the basin), the Hadrani
/// Steppe (near nothing) and the Veskar Isles (near a page that no longer
/// exists).
///
/// Events, by start year:
///
/// | id               | name                      | years       | location |
/// |------------------|---------------------------|-------------|----------|
/// | `evt-migration`  | Apollonian Migration      | -1150       | basin    |
/// | `evt-isles`      | Veskar Compact            | -1120       | isles    |
/// | `evt-harbor`     | Raising of Tirlarli Harbor| -1100..-1080| littoral |
/// | `evt-raids`      | Hadrani Raids             | -1050       | steppe   |
/// | `evt-schism`     | Schism of the Lamps       | -1000       | none     |
/// | `evt-founding`   | Founding of Merkuna       | -700..-690  | basin    |
pub fn sample_world() -> InMemoryStore {
    let locations = vec![
        location_page(
            "loc-basin",
            "Lower Antiyan Basin",
            Biome::Savanna,
            &["loc-littoral", "loc-basin"],
        ),
        location_page("loc-littoral", "Tirlarli Littoral", Biome::Mediterranean, &["loc-basin"]),
        location_page("loc-steppe", "Hadrani Steppe", Biome::ColdSteppe, &[]),
        location_page("loc-isles", "Veskar Isles", Biome::Maritime, &["loc-sunken"]),
    ];

    let polities = vec![
        polity_page("pol-sidanegi", "Sîdanêgi Empire", "Empire", -900, Some(-400)),
        polity_page("pol-antiya", "Antiyan League", "League", -1300, None),
    ];

    let events = vec![
        event_page(
            "evt-migration",
            "Apollonian Migration",
            -1150,
            None,
            EventType::PopulationMigration,
            Some("loc-basin"),
            &["pol-antiya"],
        ),
        event_page(
            "evt-isles",
            "Veskar Compact",
            -1120,
            None,
            EventType::PoliticalEvent,
            Some("loc-isles"),
            &[],
        ),
        event_page(
            "evt-harbor",
            "Raising of Tirlarli Harbor",
            -1100,
            Some(-1080),
            EventType::Construction,
            Some("loc-littoral"),
            &[],
        ),
        event_page(
            "evt-raids",
            "Hadrani Raids",
            -1050,
            None,
            EventType::MilitaryAction,
            Some("loc-steppe"),
            &["pol-antiya"],
        ),
        event_page(
            "evt-schism",
            "Schism of the Lamps",
            -1000,
            None,
            EventType::ReligiousEvent,
            None,
            &[],
        ),
        event_page(
            "evt-founding",
            "Founding of Merkuna",
            -700,
            Some(-690),
            EventType::Construction,
            Some("loc-basin"),
            &["pol-sidanegi", "pol-antiya"],
        ),
    ];

    InMemoryStore::new()
        .with_database(LOCATION_DB, locations)
        .with_database(POLITY_DB, polities)
        .with_database(TIMELINE_DB, events)
}

/// An event that satisfies the full generated-output contract.
pub fn sample_generated_event() -> Event {
    Event {
        name: "Drowning of the Lamp Quarter".to_string(),
        start_year: -1090,
        end_year: Some(-1085),
        event_type: Some(EventType::ReligiousEvent),
        importance: Some(4),
        description: Some(
            "Floodwaters took the lamp-keepers' quarter and with it their shrines.".to_string(),
        ),
        excerpt: Some("A flood ends the lamp-keepers' rites in the basin.".to_string()),
        location: Some(Location {
            name: "Lower Antiyan Basin".to_string(),
            biome: Some(Biome::Savanna),
            near: vec!["Tirlarli Littoral".to_string()],
        }),
        polities: vec![Polity {
            name: "Antiyan League".to_string(),
            polity_type: Some("League".to_string()),
            start_year: Some(-1300),
            end_year: Some(-600),
        }],
    }
}
