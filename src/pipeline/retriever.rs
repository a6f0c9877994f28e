//! Context retrieval: a thin, order-preserving wrapper over store search.

use tracing::info;

use crate::models::{DocumentRecord, SEARCH_COLUMNS};
use crate::storage::{DocumentStore, StoreResult};

/// Fetches the top-`limit` records for a query with all nine columns.
#[derive(Debug, Clone, Copy)]
pub struct ContextRetriever {
    limit: usize,
}

impl ContextRetriever {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    /// Records in the order the store ranked them; never re-ranked or filtered.
    ///
    /// # Errors
    /// Returns the store's error unchanged
    pub async fn retrieve<S>(&self, store: &S, query: &str) -> StoreResult<Vec<DocumentRecord>>
    where
        S: DocumentStore + ?Sized,
    {
        if self.limit == 0 {
            return Ok(Vec::new());
        }

        let mut documents = store.search(query, &SEARCH_COLUMNS, self.limit).await?;
        // a store that ignores the limit must not widen the context
        documents.truncate(self.limit);

        info!(store = store.name(), retrieved = documents.len(), "Retrieved context");
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{paper, MockStore};

    #[tokio::test]
    async fn test_requests_all_columns_with_limit_and_keeps_order() {
        let store = MockStore::with_results(vec![paper("c"), paper("a"), paper("b"), paper("d")]);

        let docs = ContextRetriever::new(3).retrieve(&store, "battery recycling").await.unwrap();

        let titles: Vec<_> = docs.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, vec!["c title", "a title", "b title"]);

        let calls = store.searches();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].query, "battery recycling");
        assert_eq!(calls[0].limit, 3);
        assert_eq!(calls[0].columns, SEARCH_COLUMNS.to_vec());
    }

    #[tokio::test]
    async fn test_zero_limit_skips_store() {
        let store = MockStore::with_results(vec![paper("a")]);
        let docs = ContextRetriever::new(0).retrieve(&store, "q").await.unwrap();
        assert!(docs.is_empty());
        assert!(store.searches().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_store_reply_is_cut_to_limit() {
        let store = MockStore::ignoring_limit(vec![paper("c"), paper("a"), paper("b"), paper("d")]);

        let docs = ContextRetriever::new(2).retrieve(&store, "q").await.unwrap();

        let titles: Vec<_> = docs.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, vec!["c title", "a title"]);
        assert_eq!(store.searches()[0].limit, 2);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let store = MockStore::failing_search();
        assert!(ContextRetriever::new(5).retrieve(&store, "q").await.is_err());
    }
}
