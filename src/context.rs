use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::api::{EventsApi, HttpBackend, RegistrationDraft};
use crate::catalog::CatalogStore;
use crate::config::ClientConfig;
use crate::error::SyncResult;
use crate::favourites::FavouritesStore;
use crate::filter::{category_options, filter_events_now, EventFilter};
use crate::identity::{EpochToken, IdentityEpoch, IdentitySignal, SyncPhase};
use crate::models::{
    Event, EventId, FavouriteChange, Registration, RegistrationId, RegistrationWithEvent, UserId,
};
use crate::registrations::RegistrationsStore;
use crate::views::{self, CategoryBreakdown};

/// Derived state for a dashboard screen, computed in one pass.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct DashboardView {
    pub registrations: Vec<RegistrationWithEvent>,
    pub breakdown: CategoryBreakdown,
    pub favourites: Vec<Event>,
}

/// Owns the catalog, the identity-scoped stores and the backend handle.
///
/// Construct one per application session and pass it by reference;
/// dropping it tears everything down.
pub struct EventsContext<B> {
    epoch: Arc<IdentityEpoch>,
    catalog: CatalogStore<B>,
    favourites: FavouritesStore<B>,
    registrations: RegistrationsStore<B>,
}

impl EventsContext<HttpBackend> {
    pub fn from_config(config: &ClientConfig) -> SyncResult<Self> {
        Ok(Self::new(HttpBackend::from_config(config)?))
    }
}

impl<B: EventsApi> EventsContext<B> {
    pub fn new(backend: B) -> Self {
        Self::with_shared_backend(Arc::new(backend))
    }

    pub fn with_shared_backend(backend: Arc<B>) -> Self {
        let epoch = Arc::new(IdentityEpoch::default());
        Self {
            catalog: CatalogStore::new(backend.clone()),
            favourites: FavouritesStore::new(backend.clone(), epoch.clone()),
            registrations: RegistrationsStore::new(backend, epoch.clone()),
            epoch,
        }
    }

    pub fn catalog(&self) -> &CatalogStore<B> {
        &self.catalog
    }

    pub fn favourites(&self) -> &FavouritesStore<B> {
        &self.favourites
    }

    pub fn registrations(&self) -> &RegistrationsStore<B> {
        &self.registrations
    }

    pub fn current_user(&self) -> Option<UserId> {
        self.epoch.uid()
    }

    /// Switches identity, clearing identity-scoped state before returning.
    ///
    /// Returns the new epoch's token, or `None` when `uid` is already current.
    pub fn set_identity(&self, uid: Option<UserId>) -> Option<EpochToken> {
        let token = self.epoch.advance(uid)?;
        self.favourites.reset();
        self.registrations.reset();
        match token.uid() {
            Some(uid) => info!(uid = %uid, generation = token.generation(), "identity changed"),
            None => info!(generation = token.generation(), "signed out"),
        }
        Some(token)
    }

    /// Loads favourites and registrations for `token`'s identity concurrently.
    #[instrument(skip(self, token), fields(generation = token.generation()))]
    pub async fn refresh_user_data(&self, token: &EpochToken) {
        if token.uid().is_none() {
            return;
        }
        tokio::join!(self.favourites.load(token), self.registrations.load(token));
    }

    /// Applies every identity published on `signal` until its publisher is dropped.
    ///
    /// A refresh still in flight when the next identity arrives is dropped;
    /// if the identity turns out unchanged the refresh starts over.
    pub async fn follow_identity(&self, mut signal: IdentitySignal) {
        let mut pending: Option<EpochToken> = None;
        loop {
            if let Some(token) = self.set_identity(signal.current()) {
                pending = Some(token);
            }

            let Some(token) = pending.take() else {
                if signal.changed().await.is_err() {
                    return;
                }
                continue;
            };

            tokio::select! {
                changed = signal.changed() => {
                    if changed.is_err() {
                        // Publisher gone; finish loading the last identity.
                        self.refresh_user_data(&token).await;
                        return;
                    }
                    debug!(generation = token.generation(), "identity published during refresh");
                    pending = Some(token);
                }
                _ = self.refresh_user_data(&token) => {}
            }
        }
    }

    /// Whether both identity-scoped stores finished loading for this epoch.
    pub fn user_data_ready(&self) -> bool {
        self.epoch.uid().is_some()
            && self.favourites.phase() == SyncPhase::Ready
            && self.registrations.phase() == SyncPhase::Ready
    }

    pub fn is_favourite(&self, event_id: &EventId) -> bool {
        self.favourites.is_favourite(event_id)
    }

    pub async fn toggle_favourite(&self, event_id: &EventId) -> Option<FavouriteChange> {
        self.favourites.toggle(event_id).await
    }

    pub async fn register(&self, draft: RegistrationDraft) -> Option<Registration> {
        self.registrations.register(draft).await
    }

    pub async fn cancel_registration(&self, registration_id: &RegistrationId) {
        self.registrations.cancel(registration_id).await
    }

    pub fn get_event(&self, id: &EventId) -> Option<Event> {
        self.catalog.get_by_id(id)
    }

    pub fn favourite_events(&self) -> Vec<Event> {
        views::favourite_events(&self.catalog.events(), &self.favourites.ids())
    }

    pub fn registrations_with_event(&self) -> Vec<RegistrationWithEvent> {
        views::registrations_with_event(&self.registrations.registrations(), &self.catalog.events())
    }

    pub fn category_breakdown(&self) -> CategoryBreakdown {
        views::category_aggregates(&self.registrations_with_event())
    }

    pub fn dashboard(&self) -> DashboardView {
        let events = self.catalog.events();
        let registrations =
            views::registrations_with_event(&self.registrations.registrations(), &events);
        DashboardView {
            breakdown: views::category_aggregates(&registrations),
            favourites: views::favourite_events(&events, &self.favourites.ids()),
            registrations,
        }
    }

    pub fn filtered_events(&self, filter: &EventFilter) -> Vec<Event> {
        filter_events_now(&self.catalog.events(), filter)
    }

    pub fn category_options(&self) -> Vec<String> {
        category_options(&self.catalog.events())
    }
}
