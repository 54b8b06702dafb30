use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, instrument, warn};

use crate::api::{EventsApi, RegistrationDraft};
use crate::error::{SyncError, SyncResult};
use crate::identity::{EpochToken, IdentityEpoch, SyncPhase};
use crate::models::{Registration, RegistrationId, UserId};

struct RegistrationsState {
    phase: SyncPhase,
    registrations: Vec<Registration>,
}

/// Registrations of the signed-in user, most recent first.
pub struct RegistrationsStore<B> {
    backend: Arc<B>,
    epoch: Arc<IdentityEpoch>,
    state: Mutex<RegistrationsState>,
}

impl<B: EventsApi> RegistrationsStore<B> {
    pub fn new(backend: Arc<B>, epoch: Arc<IdentityEpoch>) -> Self {
        Self {
            backend,
            epoch,
            state: Mutex::new(RegistrationsState {
                phase: SyncPhase::Uninitialized,
                registrations: Vec::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, RegistrationsState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn require_identity(&self) -> SyncResult<(EpochToken, UserId)> {
        let token = self.epoch.current();
        let uid = token.uid().cloned().ok_or(SyncError::NotAuthenticated)?;
        Ok((token, uid))
    }

    pub fn reset(&self) {
        let mut state = self.state();
        state.phase = SyncPhase::Uninitialized;
        state.registrations.clear();
    }

    #[instrument(name = "registrations_load", skip(self, token), fields(generation = token.generation()))]
    pub async fn load(&self, token: &EpochToken) {
        let Some(uid) = token.uid() else {
            return;
        };
        if !self.epoch.is_current(token) {
            return;
        }
        self.state().phase = SyncPhase::Loading;

        let result = self.backend.fetch_registrations(uid).await;

        if !self.epoch.is_current(token) {
            debug!(uid = %uid, "discarding registrations for a previous identity");
            return;
        }
        let mut state = self.state();
        match result {
            Ok(registrations) => {
                info!(uid = %uid, count = registrations.len(), "registrations loaded");
                state.registrations = registrations;
                state.phase = SyncPhase::Ready;
            }
            Err(err) => {
                warn!(uid = %uid, error = %err, "registrations load failed");
                state.registrations.clear();
                state.phase = SyncPhase::Uninitialized;
            }
        }
    }

    pub fn phase(&self) -> SyncPhase {
        self.state().phase
    }

    pub fn registrations(&self) -> Vec<Registration> {
        if self.epoch.uid().is_none() {
            return Vec::new();
        }
        self.state().registrations.clone()
    }

    /// Creates a registration and prepends the backend's copy of it.
    ///
    /// The draft is sent as given. `None` means no identity, a failed
    /// request, or an identity change while the request was in flight.
    #[instrument(name = "registrations_register", skip(self, draft), fields(event_id = %draft.event_id))]
    pub async fn register(&self, draft: RegistrationDraft) -> Option<Registration> {
        let (token, uid) = match self.require_identity() {
            Ok(identity) => identity,
            Err(err) => {
                debug!(error = %err, "ignoring registration");
                return None;
            }
        };

        let registration = match self.backend.create_registration(&uid, &draft).await {
            Ok(registration) => registration,
            Err(err) => {
                warn!(uid = %uid, error = %err, "registration failed");
                return None;
            }
        };

        if !self.epoch.is_current(&token) {
            debug!(uid = %uid, "discarding registration for a previous identity");
            return None;
        }

        info!(uid = %uid, registration_id = %registration.registration_id, "registered");
        self.state().registrations.insert(0, registration.clone());
        Some(registration)
    }

    /// Deletes a registration, removing it locally once the backend confirms.
    ///
    /// Failures are logged and leave the list as it was; returning does not
    /// imply the registration is gone.
    #[instrument(name = "registrations_cancel", skip(self))]
    pub async fn cancel(&self, registration_id: &RegistrationId) {
        let (token, uid) = match self.require_identity() {
            Ok(identity) => identity,
            Err(err) => {
                debug!(error = %err, "ignoring cancellation");
                return;
            }
        };

        if let Err(err) = self.backend.delete_registration(&uid, registration_id).await {
            warn!(uid = %uid, error = %err, "cancellation failed");
            return;
        }

        if !self.epoch.is_current(&token) {
            debug!(uid = %uid, "discarding cancellation for a previous identity");
            return;
        }

        let mut state = self.state();
        let before = state.registrations.len();
        state
            .registrations
            .retain(|r| &r.registration_id != registration_id);
        if state.registrations.len() < before {
            info!(uid = %uid, "registration cancelled");
        }
    }
}
