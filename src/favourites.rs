use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, instrument, warn};

use crate::api::EventsApi;
use crate::error::{SyncError, SyncResult};
use crate::identity::{EpochToken, IdentityEpoch, SyncPhase};
use crate::models::{EventId, FavouriteChange, UserId};

struct FavouritesState {
    phase: SyncPhase,
    ids: Vec<EventId>,
}

/// Favourite marks of the signed-in user, mirrored from the backend.
pub struct FavouritesStore<B> {
    backend: Arc<B>,
    epoch: Arc<IdentityEpoch>,
    state: Mutex<FavouritesState>,
}

impl<B: EventsApi> FavouritesStore<B> {
    pub fn new(backend: Arc<B>, epoch: Arc<IdentityEpoch>) -> Self {
        Self {
            backend,
            epoch,
            state: Mutex::new(FavouritesState {
                phase: SyncPhase::Uninitialized,
                ids: Vec::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, FavouritesState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn require_identity(&self) -> SyncResult<UserId> {
        self.epoch.uid().ok_or(SyncError::NotAuthenticated)
    }

    /// Drops every mark held for the previous identity.
    pub fn reset(&self) {
        let mut state = self.state();
        state.phase = SyncPhase::Uninitialized;
        state.ids.clear();
    }

    /// Fetches the marks for the identity `token` was issued to.
    ///
    /// The result is dropped if the identity changed while the request was
    /// in flight.
    #[instrument(name = "favourites_load", skip(self, token), fields(generation = token.generation()))]
    pub async fn load(&self, token: &EpochToken) {
        let Some(uid) = token.uid() else {
            return;
        };
        if !self.epoch.is_current(token) {
            return;
        }
        self.state().phase = SyncPhase::Loading;

        let result = self.backend.fetch_favourites(uid).await;

        if !self.epoch.is_current(token) {
            debug!(uid = %uid, "discarding favourites for a previous identity");
            return;
        }
        let mut state = self.state();
        match result {
            Ok(ids) => {
                info!(uid = %uid, count = ids.len(), "favourites loaded");
                state.ids.clear();
                for id in ids {
                    if !state.ids.contains(&id) {
                        state.ids.push(id);
                    }
                }
                state.phase = SyncPhase::Ready;
            }
            Err(err) => {
                warn!(uid = %uid, error = %err, "favourites load failed");
                state.ids.clear();
                state.phase = SyncPhase::Uninitialized;
            }
        }
    }

    pub fn phase(&self) -> SyncPhase {
        self.state().phase
    }

    pub fn ids(&self) -> Vec<EventId> {
        if self.epoch.uid().is_none() {
            return Vec::new();
        }
        self.state().ids.clone()
    }

    pub fn is_favourite(&self, event_id: &EventId) -> bool {
        if self.epoch.uid().is_none() {
            return false;
        }
        self.state().ids.contains(event_id)
    }

    /// Asks the backend to flip the mark and applies whatever it reports.
    ///
    /// Returns `None` without an identity, on failure, or when the identity
    /// changed before the answer came back; local marks are untouched then.
    #[instrument(name = "favourites_toggle", skip(self))]
    pub async fn toggle(&self, event_id: &EventId) -> Option<FavouriteChange> {
        let token = self.epoch.current();
        let uid = match self.require_identity() {
            Ok(uid) => uid,
            Err(err) => {
                debug!(error = %err, "ignoring favourite toggle");
                return None;
            }
        };

        let removed = match self.backend.toggle_favourite(&uid, event_id).await {
            Ok(removed) => removed,
            Err(err) => {
                warn!(uid = %uid, error = %err, "favourite toggle failed");
                return None;
            }
        };

        if !self.epoch.is_current(&token) {
            debug!(uid = %uid, "discarding favourite toggle for a previous identity");
            return None;
        }

        let change = FavouriteChange::from_removed(removed);
        let mut state = self.state();
        match change {
            FavouriteChange::Removed => state.ids.retain(|id| id != event_id),
            FavouriteChange::Added => {
                if !state.ids.contains(event_id) {
                    state.ids.push(event_id.clone());
                }
            }
        }
        debug!(uid = %uid, ?change, "favourite toggled");
        Some(change)
    }
}
