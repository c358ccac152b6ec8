//! Context resolution: from an event name or a time/place range to a
//! bounded list of flattened events.
//!
//! Filters are built in the store's filter language and run once per query;
//! every result is then flattened by following its location (and that
//! location's adjacency list) and its polities.

use crate::config::Config;
use crate::error::{RecordKind, ResolveError};
use crate::projection::{
    display_name, polity_from_page, props, EventRecord, LocationRecord,
};
use crate::schema::{Event, Location, Polity};
use crate::store::{query_all, query_first, RecordStore};
use futures::future::{join_all, try_join_all};
use notion::{Filter, Page};
use tracing::{debug, info, instrument, warn};

/// Name listed for a related page that could not be fetched.
pub const FETCH_FAILED_NAME: &str = "ErrorFetchingName";

/// Name listed for a related page that has no title.
pub const UNKNOWN_NAME: &str = "Unknown";

/// How a failed lookup of a related page is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationPolicy {
    /// The failure aborts the whole resolution.
    Propagate,
    /// The failed item is replaced with [`FETCH_FAILED_NAME`].
    DegradeWithPlaceholder,
}

/// An inclusive span of years.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearRange {
    pub start: i64,
    pub end: i64,
}

impl YearRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Search window around an event.
    ///
    /// A punctual event (no end year) ends the year it starts. The window
    /// always widens backwards by `delta_years`; it widens forwards too when
    /// `symmetric` is set.
    pub fn around(start_year: i64, end_year: Option<i64>, delta_years: u32, symmetric: bool) -> Self {
        let end_year = end_year.unwrap_or(start_year);
        let delta = i64::from(delta_years);
        Self {
            start: start_year - delta,
            end: if symmetric { end_year + delta } else { end_year },
        }
    }

    pub fn contains(&self, year: i64) -> bool {
        (self.start..=self.end).contains(&year)
    }
}

/// Parameters of a range query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeQuery {
    pub start_year: i64,
    pub end_year: Option<i64>,
    pub location: Option<String>,
    /// Widen the location constraint to adjacent locations.
    pub near: bool,
    /// Keep an event with this exact name out of the results.
    pub exclude_name: Option<String>,
}

impl RangeQuery {
    /// Events starting in `start_year` or later.
    pub fn starting_from(start_year: i64) -> Self {
        Self {
            start_year,
            ..Default::default()
        }
    }

    /// Events starting inside `range`.
    pub fn within(range: YearRange) -> Self {
        Self::starting_from(range.start).until(range.end)
    }

    pub fn until(mut self, end_year: i64) -> Self {
        self.end_year = Some(end_year);
        self
    }

    pub fn at_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn near(mut self, near: bool) -> Self {
        self.near = near;
        self
    }

    pub fn excluding(mut self, name: impl Into<String>) -> Self {
        self.exclude_name = Some(name.into());
        self
    }

    /// The year and exclusion predicates, without any location constraint.
    pub fn base_filters(&self) -> Vec<Filter> {
        let mut filters = vec![Filter::number_at_least(
            props::START_YEAR,
            self.start_year as f64,
        )];
        if let Some(end) = self.end_year {
            filters.push(Filter::number_at_most(props::START_YEAR, end as f64));
        }
        if let Some(name) = &self.exclude_name {
            filters.push(Filter::title_does_not_equal(props::NAME, name.clone()));
        }
        filters
    }
}

/// Location ids an event may reference to count as "at" a location: the
/// location itself, then (when `near`) its adjacent locations, deduplicated
/// in first-seen order.
pub fn location_ids(location: &Page, near: bool) -> Vec<String> {
    let mut ids = vec![location.id.clone()];
    if near {
        for id in location.relation_ids(props::NEAR) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    ids
}

/// "Event is at any of these locations". A single id is emitted as a bare
/// predicate; an empty set yields no constraint.
pub fn any_location_filter(ids: &[String]) -> Option<Filter> {
    let mut predicates: Vec<Filter> = ids
        .iter()
        .map(|id| Filter::relation_contains(props::LOCATION, id.clone()))
        .collect();
    match predicates.len() {
        0 => None,
        1 => predicates.pop(),
        _ => Some(Filter::or(predicates)),
    }
}

/// Resolves events and their context from the timeline databases.
pub struct ContextResolver<S> {
    store: S,
    timeline_database_id: String,
    location_database_id: String,
    max_query_pages: usize,
}

impl<S: RecordStore> ContextResolver<S> {
    /// Create a resolver over the given timeline and location databases.
    pub fn new(
        store: S,
        timeline_database_id: impl Into<String>,
        location_database_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            timeline_database_id: timeline_database_id.into(),
            location_database_id: location_database_id.into(),
            max_query_pages: crate::config::DEFAULT_MAX_QUERY_PAGES,
        }
    }

    pub fn from_config(store: S, config: &Config) -> Self {
        Self::new(
            store,
            config.timeline_database_id.clone(),
            config.location_database_id.clone(),
        )
        .with_max_query_pages(config.max_query_pages)
    }

    /// Cap on result pages fetched per range query.
    pub fn with_max_query_pages(mut self, max_pages: usize) -> Self {
        self.max_query_pages = max_pages.max(1);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Look up one event by exact name and flatten it.
    #[instrument(level = "info", skip(self))]
    pub async fn resolve_by_name(&self, event_name: &str) -> Result<Event, ResolveError> {
        let record = self.find_event_record(event_name).await?;
        self.flatten(record).await
    }

    /// Resolve a seed event and the events near it in time and place.
    ///
    /// The seed itself is always excluded from the returned list.
    #[instrument(level = "info", skip(self))]
    pub async fn resolve_similar_to_event(
        &self,
        event_name: &str,
        delta_years: u32,
        near: bool,
        symmetric: bool,
    ) -> Result<(Event, Vec<Event>), ResolveError> {
        let record = self.find_event_record(event_name).await?;
        let window = YearRange::around(record.start_year, record.end_year, delta_years, symmetric);
        let seed = self.flatten(record).await?;

        debug!(start = window.start, end = window.end, "search window");

        let mut query = RangeQuery::within(window)
            .near(near)
            .excluding(seed.name.clone());
        if let Some(location) = seed.location_name() {
            query = query.at_location(location);
        }

        let similar = self.resolve_in_range(&query).await?;
        Ok((seed, similar))
    }

    /// All events matching a range query, flattened.
    ///
    /// An unknown location drops the location constraint rather than failing.
    #[instrument(level = "info", skip(self), fields(start = query.start_year, end = ?query.end_year))]
    pub async fn resolve_in_range(&self, query: &RangeQuery) -> Result<Vec<Event>, ResolveError> {
        let filter = self.build_range_filter(query).await?;
        let pages = query_all(
            &self.store,
            &self.timeline_database_id,
            Some(filter),
            self.max_query_pages,
        )
        .await?;

        let mut events = Vec::with_capacity(pages.len());
        for page in &pages {
            events.push(self.flatten(EventRecord::from_page(page)?).await?);
        }

        info!(count = events.len(), "resolved events in range");
        Ok(events)
    }

    /// The full filter of a range query, including the location constraint.
    pub async fn build_range_filter(&self, query: &RangeQuery) -> Result<Filter, ResolveError> {
        let mut filters = query.base_filters();
        if let Some(name) = &query.location {
            if let Some(location) = self.location_filter(name, query.near).await? {
                filters.push(location);
            }
        }
        Ok(Filter::and(filters))
    }

    async fn location_filter(&self, name: &str, near: bool) -> Result<Option<Filter>, ResolveError> {
        let found = query_first(
            &self.store,
            &self.location_database_id,
            Filter::title_equals(props::NAME, name),
        )
        .await?;

        match found {
            Some((page, _)) => Ok(any_location_filter(&location_ids(&page, near))),
            None => {
                warn!(location = name, "location not found, dropping location constraint");
                Ok(None)
            }
        }
    }

    async fn find_event_record(&self, event_name: &str) -> Result<EventRecord, ResolveError> {
        let found = query_first(
            &self.store,
            &self.timeline_database_id,
            Filter::title_equals(props::NAME, event_name),
        )
        .await?;

        let (page, matches) = found.ok_or_else(|| ResolveError::NotFound {
            kind: RecordKind::Event,
            name: event_name.to_string(),
        })?;
        if matches > 1 {
            warn!(event = event_name, matches, "event name is not unique, using the first match");
        }
        EventRecord::from_page(&page)
    }

    /// Follow an event's relations and produce the self-contained value.
    async fn flatten(&self, record: EventRecord) -> Result<Event, ResolveError> {
        let location = match &record.location_id {
            Some(id) => Some(self.resolve_location(id).await?),
            None => None,
        };
        let polities = try_join_all(record.polity_ids.iter().map(|id| self.resolve_polity(id))).await?;
        Ok(record.into_event(location, polities))
    }

    async fn resolve_location(&self, id: &str) -> Result<Location, ResolveError> {
        let page = self.fetch_related(RecordKind::Location, id).await?;
        let record = LocationRecord::from_page(&page)?;
        let near = self
            .relation_names(
                RecordKind::Location,
                &record.near_ids,
                RelationPolicy::DegradeWithPlaceholder,
            )
            .await?;
        Ok(record.into_location(near))
    }

    async fn resolve_polity(&self, id: &str) -> Result<Polity, ResolveError> {
        let page = self.fetch_related(RecordKind::Polity, id).await?;
        polity_from_page(&page)
    }

    async fn fetch_related(&self, kind: RecordKind, id: &str) -> Result<Page, ResolveError> {
        self.store
            .retrieve(id)
            .await
            .map_err(|source| ResolveError::RelationResolution {
                kind,
                id: id.to_string(),
                source,
            })
    }

    /// Names of related pages, for display-only listings.
    ///
    /// Pages without a title are listed as [`UNKNOWN_NAME`]. Fetch failures
    /// follow `policy`.
    pub async fn relation_names(
        &self,
        kind: RecordKind,
        ids: &[String],
        policy: RelationPolicy,
    ) -> Result<Vec<String>, ResolveError> {
        let fetched = join_all(ids.iter().map(|id| self.store.retrieve(id))).await;

        fetched
            .into_iter()
            .zip(ids)
            .map(|(result, id)| match result {
                Ok(page) => Ok(display_name(&page).unwrap_or_else(|| UNKNOWN_NAME.to_string())),
                Err(source) => match policy {
                    RelationPolicy::DegradeWithPlaceholder => {
                        warn!(%kind, id = %id, error = %source, "failed to fetch related name");
                        Ok(FETCH_FAILED_NAME.to_string())
                    }
                    RelationPolicy::Propagate => Err(ResolveError::RelationResolution {
                        kind,
                        id: id.clone(),
                        source,
                    }),
                },
            })
            .collect()
    }
}
