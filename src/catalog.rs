use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::api::EventsApi;
use crate::error::SyncResult;
use crate::models::{Event, EventId};

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct CatalogSnapshot {
    pub events: Vec<Event>,
    pub loading: bool,
    pub error: Option<String>,
}

struct CatalogState {
    events: Vec<Event>,
    loading: bool,
    error: Option<String>,
}

/// The identity-independent event catalog.
pub struct CatalogStore<B> {
    backend: Arc<B>,
    state: Mutex<CatalogState>,
}

impl<B: EventsApi> CatalogStore<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            // Loading until the first fetch settles.
            state: Mutex::new(CatalogState {
                events: Vec::new(),
                loading: true,
                error: None,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, CatalogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetches the whole catalog, replacing the held events on success.
    ///
    /// A failure keeps the previous events and records a message in
    /// [`CatalogStore::error`]. Nothing retries; call `load` again to reload.
    #[instrument(name = "catalog_load", skip(self))]
    pub async fn load(&self) {
        self.state().loading = true;

        let result = self.backend.fetch_events().await;

        let mut state = self.state();
        state.loading = false;
        match result {
            Ok(events) => {
                info!(count = events.len(), "catalog loaded");
                state.events = events;
                state.error = None;
            }
            Err(err) => {
                warn!(error = %err, "catalog load failed");
                state.error = Some(err.to_string());
            }
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.state().events.clone()
    }

    pub fn loading(&self) -> bool {
        self.state().loading
    }

    pub fn error(&self) -> Option<String> {
        self.state().error.clone()
    }

    pub fn snapshot(&self) -> CatalogSnapshot {
        let state = self.state();
        CatalogSnapshot {
            events: state.events.clone(),
            loading: state.loading,
            error: state.error.clone(),
        }
    }

    pub fn get_by_id(&self, id: &EventId) -> Option<Event> {
        find_event(&self.state().events, id).cloned()
    }

    /// The catalog entry for `id`, or a one-off fetch when the catalog lacks it.
    /// Fetched events are not added to the catalog.
    #[instrument(skip(self))]
    pub async fn resolve(&self, id: &EventId) -> SyncResult<Event> {
        if let Some(event) = self.get_by_id(id) {
            return Ok(event);
        }
        self.backend.fetch_event(id).await
    }
}

/// Lookup by stringified id.
pub fn find_event<'a>(events: &'a [Event], id: &EventId) -> Option<&'a Event> {
    events.iter().find(|event| event.id.as_str() == id.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::testing::{event, Endpoint, FakeBackend};

    fn catalog() -> Vec<Event> {
        vec![
            event(1, "AI Summit", "Tech", "2999-01-01"),
            event(2, "Jazz Night", "Music", "2000-01-01"),
        ]
    }

    #[tokio::test]
    async fn starts_loading_and_empty() {
        let store = CatalogStore::new(Arc::new(FakeBackend::default()));
        let snapshot = store.snapshot();
        assert!(snapshot.loading);
        assert!(snapshot.events.is_empty());
        assert_eq!(snapshot.error, None);
    }

    #[tokio::test]
    async fn load_populates_events_in_backend_order() {
        let store = CatalogStore::new(Arc::new(FakeBackend::with_events(catalog())));
        store.load().await;

        assert!(!store.loading());
        assert_eq!(store.error(), None);
        let titles: Vec<String> = store.events().into_iter().map(|e| e.title).collect();
        assert_eq!(titles, vec!["AI Summit", "Jazz Night"]);
    }

    #[tokio::test]
    async fn failed_first_load_leaves_catalog_empty_with_error() {
        let backend = Arc::new(FakeBackend::with_events(catalog()));
        backend.fail(Endpoint::Events, SyncError::Network("connection refused".into()));
        let store = CatalogStore::new(backend.clone());

        store.load().await;

        assert!(!store.loading());
        assert!(store.events().is_empty());
        assert_eq!(
            store.error().as_deref(),
            Some("network error: connection refused")
        );
        assert_eq!(backend.calls(Endpoint::Events), 1);
    }

    #[tokio::test]
    async fn failed_reload_keeps_previous_events_and_success_clears_error() {
        let backend = Arc::new(FakeBackend::with_events(catalog()));
        let store = CatalogStore::new(backend.clone());
        store.load().await;

        backend.fail(Endpoint::Events, SyncError::Rejected("maintenance".into()));
        store.load().await;
        assert_eq!(store.events().len(), 2);
        assert!(store.error().is_some());

        backend.recover(Endpoint::Events);
        backend.set_events(vec![event(9, "Replacement", "Art", "2999-01-01")]);
        store.load().await;
        assert_eq!(store.error(), None);
        assert_eq!(store.events().len(), 1);
        assert_eq!(store.events()[0].id, EventId::from(9));
    }

    #[tokio::test]
    async fn lookup_uses_string_form_of_id() {
        let store = CatalogStore::new(Arc::new(FakeBackend::with_events(catalog())));
        store.load().await;

        assert_eq!(store.get_by_id(&EventId::from("2")).map(|e| e.title), Some("Jazz Night".into()));
        assert_eq!(store.get_by_id(&EventId::from(2)).map(|e| e.title), Some("Jazz Night".into()));
        assert!(store.get_by_id(&EventId::from(3)).is_none());
    }

    #[tokio::test]
    async fn resolve_prefers_catalog_and_does_not_patch_it() {
        let backend = Arc::new(FakeBackend::with_events(catalog()));
        let store = CatalogStore::new(backend.clone());
        store.load().await;

        let cached = store.resolve(&EventId::from(1)).await.unwrap();
        assert_eq!(cached.title, "AI Summit");
        assert_eq!(backend.calls(Endpoint::Event), 0);

        backend.set_events(vec![event(5, "Late Addition", "Art", "2999-01-01")]);
        let fetched = store.resolve(&EventId::from(5)).await.unwrap();
        assert_eq!(fetched.title, "Late Addition");
        assert_eq!(backend.calls(Endpoint::Event), 1);
        assert!(store.get_by_id(&EventId::from(5)).is_none());

        assert!(store.resolve(&EventId::from(42)).await.is_err());
    }
}
