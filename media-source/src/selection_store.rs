//! In-memory, list-backed selection store

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::collaborator::{ListenerId, SelectionListener, SelectionStore};
use crate::error::{EngineError, Result};
use crate::model::{MediaSourceHandle, PackageName};

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(ListenerId, SelectionListener)>,
}

#[derive(Default)]
struct Selection {
    sources: Vec<MediaSourceHandle>,
    selected: Option<MediaSourceHandle>,
}

/// Selection store holding the list of available sources and the selection
///
/// Sources are identified by package name. Clones share the same state.
/// Listeners run on the thread that changed the selection, after the
/// internal lock has been released; they must not register new listeners.
#[derive(Clone, Default)]
pub struct InMemorySelectionStore {
    state: Arc<RwLock<Selection>>,
    listeners: Arc<RwLock<Listeners>>,
}

impl InMemorySelectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sources(sources: Vec<MediaSourceHandle>) -> Self {
        let store = Self::new();
        store.state.write().sources = sources;
        store
    }

    pub fn sources(&self) -> Vec<MediaSourceHandle> {
        self.state.read().sources.clone()
    }

    pub fn find(&self, package: &PackageName) -> Option<MediaSourceHandle> {
        self.state
            .read()
            .sources
            .iter()
            .find(|source| &source.package == package)
            .cloned()
    }

    /// Replace the available sources
    ///
    /// A selection whose package is no longer listed is cleared.
    pub fn set_sources(&self, sources: Vec<MediaSourceHandle>) {
        let cleared = {
            let mut state = self.state.write();
            state.sources = sources;
            let still_listed = match &state.selected {
                Some(selected) => state
                    .sources
                    .iter()
                    .any(|source| source.package == selected.package),
                None => true,
            };
            if !still_listed {
                state.selected = None;
            }
            !still_listed
        };

        if cleared {
            debug!("Selected source no longer available, selection cleared");
            self.notify();
        }
    }

    pub fn clear_selection(&self) {
        let changed = self.state.write().selected.take().is_some();
        if changed {
            self.notify();
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().entries.len()
    }

    fn notify(&self) {
        for (_, listener) in self.listeners.read().entries.iter() {
            listener();
        }
    }
}

impl SelectionStore for InMemorySelectionStore {
    fn current(&self) -> Option<MediaSourceHandle> {
        self.state.read().selected.clone()
    }

    fn on_change(&self, listener: SelectionListener) -> ListenerId {
        let mut listeners = self.listeners.write();
        let id = ListenerId::new(listeners.next_id);
        listeners.next_id += 1;
        listeners.entries.push((id, listener));
        id
    }

    fn remove_listener(&self, id: ListenerId) {
        self.listeners.write().entries.retain(|(existing, _)| *existing != id);
    }

    fn select(&self, source: &MediaSourceHandle) -> Result<()> {
        let changed = {
            let mut state = self.state.write();
            let listed = state
                .sources
                .iter()
                .find(|candidate| candidate.package == source.package)
                .cloned()
                .ok_or_else(|| EngineError::UnknownSource(source.package.clone()))?;

            if state.selected.as_ref() == Some(&listed) {
                false
            } else {
                state.selected = Some(listed);
                true
            }
        };

        if changed {
            debug!(package = %source.package, "Selected media source");
            self.notify();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn radio() -> MediaSourceHandle {
        MediaSourceHandle::browsable("com.example.radio", "com.example.radio/.Browse")
    }

    fn podcasts() -> MediaSourceHandle {
        MediaSourceHandle::new("com.example.podcasts")
    }

    fn counting(store: &InMemorySelectionStore) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        store.on_change(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        count
    }

    #[test]
    fn test_select_listed_source() {
        let store = InMemorySelectionStore::with_sources(vec![radio(), podcasts()]);
        let notifications = counting(&store);

        store.select(&radio()).unwrap();

        assert_eq!(store.current(), Some(radio()));
        assert_eq!(notifications.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_select_unknown_source_fails() {
        let store = InMemorySelectionStore::with_sources(vec![radio()]);

        let result = store.select(&podcasts());

        assert!(matches!(result, Err(EngineError::UnknownSource(_))));
        assert_eq!(store.current(), None);
    }

    #[test]
    fn test_reselect_does_not_notify() {
        let store = InMemorySelectionStore::with_sources(vec![radio()]);
        let notifications = counting(&store);

        store.select(&radio()).unwrap();
        store.select(&radio()).unwrap();

        assert_eq!(notifications.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_select_stores_listed_handle() {
        let store = InMemorySelectionStore::with_sources(vec![radio().with_display_name("Radio")]);

        store.select(&MediaSourceHandle::new("com.example.radio")).unwrap();

        assert_eq!(
            store.current().and_then(|s| s.display_name),
            Some("Radio".to_string())
        );
    }

    #[test]
    fn test_set_sources_clears_missing_selection() {
        let store = InMemorySelectionStore::with_sources(vec![radio(), podcasts()]);
        store.select(&radio()).unwrap();
        let notifications = counting(&store);

        store.set_sources(vec![podcasts()]);

        assert_eq!(store.current(), None);
        assert_eq!(notifications.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clone_shares_state() {
        let store = InMemorySelectionStore::with_sources(vec![radio()]);
        let cloned = store.clone();

        store.select(&radio()).unwrap();

        assert_eq!(cloned.current(), Some(radio()));
    }

    #[test]
    fn test_removed_listener_is_not_notified() {
        let store = InMemorySelectionStore::with_sources(vec![radio(), podcasts()]);
        let kept = counting(&store);
        let removed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&removed);
        let id = store.on_change(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        store.remove_listener(id);
        store.select(&radio()).unwrap();

        assert_eq!(store.listener_count(), 1);
        assert_eq!(kept.load(Ordering::SeqCst), 1);
        assert_eq!(removed.load(Ordering::SeqCst), 0);
    }
}
