//! Runtime-selected store backend.
//!
//! The binaries pick a backend from a command-line flag; these enums let the
//! generic pipeline run over whichever one was chosen.

use std::path::PathBuf;

use async_trait::async_trait;

use super::cortex::{CortexConnector, CortexStore};
use super::local::{LocalConnector, LocalStore};
use super::{DocumentStore, StoreConnector, StoreResult};
use crate::config::StoreSettings;
use crate::embedding::fastembed::FastEmbedProvider;
use crate::models::{DocumentRecord, EmbeddedDocument};

/// Wrapper enum for store connectors to allow dynamic dispatch
#[derive(Clone)]
pub enum AnyConnector {
    Cortex(CortexConnector),
    Local(LocalConnector<FastEmbedProvider>),
}

impl AnyConnector {
    pub fn cortex(settings: StoreSettings) -> Self {
        AnyConnector::Cortex(CortexConnector::new(settings))
    }

    pub fn local(corpus: impl Into<PathBuf>, embedder: FastEmbedProvider) -> Self {
        AnyConnector::Local(LocalConnector::new(corpus, embedder))
    }

    pub fn name(&self) -> &'static str {
        match self {
            AnyConnector::Cortex(_) => "cortex",
            AnyConnector::Local(_) => "local",
        }
    }
}

/// Session opened by an [`AnyConnector`]
pub enum AnyStore {
    Cortex(CortexStore),
    Local(LocalStore<FastEmbedProvider>),
}

#[async_trait]
impl StoreConnector for AnyConnector {
    type Store = AnyStore;

    async fn connect(&self) -> StoreResult<AnyStore> {
        match self {
            AnyConnector::Cortex(c) => c.connect().await.map(AnyStore::Cortex),
            AnyConnector::Local(c) => c.connect().await.map(AnyStore::Local),
        }
    }
}

#[async_trait]
impl DocumentStore for AnyStore {
    async fn search(
        &self,
        query: &str,
        columns: &[&str],
        limit: usize,
    ) -> StoreResult<Vec<DocumentRecord>> {
        match self {
            AnyStore::Cortex(s) => s.search(query, columns, limit).await,
            AnyStore::Local(s) => s.search(query, columns, limit).await,
        }
    }

    async fn upsert(&self, documents: &[EmbeddedDocument]) -> StoreResult<usize> {
        match self {
            AnyStore::Cortex(s) => s.upsert(documents).await,
            AnyStore::Local(s) => s.upsert(documents).await,
        }
    }

    fn name(&self) -> &str {
        match self {
            AnyStore::Cortex(s) => s.name(),
            AnyStore::Local(s) => s.name(),
        }
    }
}
