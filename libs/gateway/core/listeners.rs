//! Listener registries
//!
//! Each registry maps a key (opcode or event name) to an ordered list of
//! callbacks. Registration appends; iteration takes a snapshot under a read
//! lock, so registering or removing while a frame is being routed never
//! disturbs the routing in progress.

use crate::protocol::Frame;
use crate::traits::Result;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Frame callback
///
/// Invoked in its own task for every matching frame. Errors are logged by
/// the router and never reach other listeners or the receive loop.
pub type Listener = Arc<dyn Fn(Arc<Frame>) -> Result<()> + Send + Sync>;

/// Identifies one registration, for removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

impl ListenerId {
    fn next() -> Self {
        ListenerId(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Key → ordered callbacks
pub(crate) struct Registry<K> {
    entries: RwLock<HashMap<K, Vec<(ListenerId, Listener)>>>,
}

impl<K> Registry<K>
where
    K: Hash + Eq,
{
    pub(crate) fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) fn register(&self, key: K, listener: Listener) -> ListenerId {
        let id = ListenerId::next();
        self.entries.write().entry(key).or_default().push((id, listener));
        id
    }

    /// Returns whether the listener was registered under `key`
    pub(crate) fn remove<Q>(&self, key: &Q, id: ListenerId) -> bool
    where
        K: std::borrow::Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut entries = self.entries.write();
        let Some(listeners) = entries.get_mut(key) else {
            return false;
        };

        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        let removed = listeners.len() != before;

        if listeners.is_empty() {
            entries.remove(key);
        }
        removed
    }

    /// Callbacks for `key` in registration order
    pub(crate) fn snapshot<Q>(&self, key: &Q) -> Vec<Listener>
    where
        K: std::borrow::Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries
            .read()
            .get(key)
            .map(|listeners| listeners.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default()
    }

    pub(crate) fn count<Q>(&self, key: &Q) -> usize
    where
        K: std::borrow::Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.read().get(key).map(Vec::len).unwrap_or(0)
    }
}
