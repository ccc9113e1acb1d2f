use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};

use super::{Graph, UnknownEvent};
use crate::algorithm::event::{Event, Hash};
use crate::algorithm::{InsertOutcome, PushError};
use crate::Config;

/// [`Graph`] shared between threads. Insertions are exclusive, queries run
/// concurrently with each other.
#[derive(Clone, Default)]
pub struct SharedGraph {
    inner: Arc<RwLock<Graph>>,
}

impl SharedGraph {
    pub fn new(graph: Graph) -> Self {
        Self {
            inner: Arc::new(RwLock::new(graph)),
        }
    }

    pub fn with_config(config: &Config) -> Self {
        Self::new(Graph::with_config(config))
    }

    pub fn insert(&self, event: Event) -> Result<InsertOutcome, PushError> {
        self.inner.write().insert(event)
    }

    /// Guard for running several queries on the same state.
    pub fn read(&self) -> RwLockReadGuard<'_, Graph> {
        self.inner.read()
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.inner.read().contains(hash)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn ancestor(&self, observer: &Hash, target: &Hash) -> Result<bool, UnknownEvent> {
        self.inner.read().ancestor(observer, target)
    }

    pub fn self_ancestor(&self, observer: &Hash, target: &Hash) -> Result<bool, UnknownEvent> {
        self.inner.read().self_ancestor(observer, target)
    }

    pub fn detect_fork(&self, observer: &Hash, target: &Hash) -> Result<bool, UnknownEvent> {
        self.inner.read().detect_fork(observer, target)
    }

    pub fn see(&self, observer: &Hash, target: &Hash) -> Result<bool, UnknownEvent> {
        self.inner.read().see(observer, target)
    }
}
