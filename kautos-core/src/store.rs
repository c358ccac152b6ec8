//! The record store capability the resolver queries.
//!
//! [`RecordStore`] is implemented for the Notion client; tests use
//! [`crate::testing::InMemoryStore`].

use async_trait::async_trait;
use notion::{DatabaseQuery, Filter, Notion, Page, QueryResponse};
use tracing::warn;

/// Read access to a document store of property-bag pages.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Run one page of a database query.
    async fn query(
        &self,
        database_id: &str,
        query: &DatabaseQuery,
    ) -> Result<QueryResponse, notion::Error>;

    /// Retrieve one page by id.
    async fn retrieve(&self, page_id: &str) -> Result<Page, notion::Error>;
}

#[async_trait]
impl RecordStore for Notion {
    async fn query(
        &self,
        database_id: &str,
        query: &DatabaseQuery,
    ) -> Result<QueryResponse, notion::Error> {
        self.query_database(database_id, query).await
    }

    async fn retrieve(&self, page_id: &str) -> Result<Page, notion::Error> {
        self.retrieve_page(page_id).await
    }
}

/// First page matching `filter`, in the store's native order.
///
/// Returns the number of matches seen on the first result page alongside it
/// so callers can flag duplicates of supposedly unique keys.
pub async fn query_first<S: RecordStore + ?Sized>(
    store: &S,
    database_id: &str,
    filter: Filter,
) -> Result<Option<(Page, usize)>, notion::Error> {
    let response = store
        .query(database_id, &DatabaseQuery::new(Some(filter)))
        .await?;
    let count = response.results.len();
    Ok(response.results.into_iter().next().map(|page| (page, count)))
}

/// Every page matching `filter`, following cursors for at most `max_pages`
/// result pages. Hitting the cap truncates the result and logs a warning.
pub async fn query_all<S: RecordStore + ?Sized>(
    store: &S,
    database_id: &str,
    filter: Option<Filter>,
    max_pages: usize,
) -> Result<Vec<Page>, notion::Error> {
    let mut pages = Vec::new();
    let mut cursor: Option<String> = None;
    let mut fetched = 0;

    loop {
        let query = DatabaseQuery::new(filter.clone()).with_start_cursor(cursor.take());
        let response = store.query(database_id, &query).await?;
        fetched += 1;
        pages.extend(response.results);

        if !response.has_more {
            break;
        }
        if fetched >= max_pages {
            warn!(
                database_id,
                max_pages,
                kept = pages.len(),
                "query has more results than the page cap allows, truncating"
            );
            break;
        }
        match response.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    Ok(pages)
}
