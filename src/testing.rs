//! In-memory `EventsApi` for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;

use crate::api::{EventsApi, RegistrationDraft};
use crate::error::{SyncError, SyncResult};
use crate::models::{Event, EventId, Registration, RegistrationId, UserId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Events,
    Event,
    Favourites,
    ToggleFavourite,
    Registrations,
    CreateRegistration,
    DeleteRegistration,
}

#[derive(Default)]
struct FakeState {
    events: Vec<Event>,
    favourites: HashMap<UserId, Vec<EventId>>,
    registrations: HashMap<UserId, Vec<Registration>>,
    failing: HashMap<Endpoint, SyncError>,
    gates: HashMap<Endpoint, Arc<Notify>>,
    calls: Vec<Endpoint>,
    next_registration: u64,
}

#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<FakeState>,
}

pub fn event(id: u64, title: &str, category: &str, date_time: &str) -> Event {
    Event {
        id: EventId::from(id),
        title: title.to_string(),
        description: format!("{title} description"),
        category: category.to_string(),
        date_time: date_time.to_string(),
        venue: "Main Hall".to_string(),
        registration_deadline: None,
        image_url: None,
        venue_type: None,
    }
}

pub fn draft(event_id: u64, name: &str) -> RegistrationDraft {
    RegistrationDraft {
        event_id: EventId::from(event_id),
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        phone: "+1 (555) 010-0000".to_string(),
    }
}

impl FakeBackend {
    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn with_events(events: Vec<Event>) -> Self {
        let backend = Self::default();
        backend.state().events = events;
        backend
    }

    pub fn set_events(&self, events: Vec<Event>) {
        self.state().events = events;
    }

    pub fn seed_favourites(&self, uid: &str, ids: &[u64]) {
        self.state().favourites.insert(
            UserId::from(uid),
            ids.iter().map(|id| EventId::from(*id)).collect(),
        );
    }

    pub fn seed_registration(&self, uid: &str, registration_id: &str, event_id: u64) {
        let registration = Registration {
            registration_id: RegistrationId::from(registration_id),
            event_id: EventId::from(event_id),
            name: "Seeded".to_string(),
            email: "seeded@example.com".to_string(),
            phone: "555".to_string(),
            created_at: Some("2025-01-01T00:00:00Z".to_string()),
        };
        self.state()
            .registrations
            .entry(UserId::from(uid))
            .or_default()
            .insert(0, registration);
    }

    pub fn server_favourites(&self, uid: &str) -> HashSet<EventId> {
        self.state()
            .favourites
            .get(&UserId::from(uid))
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn fail(&self, endpoint: Endpoint, error: SyncError) {
        self.state().failing.insert(endpoint, error);
    }

    pub fn recover(&self, endpoint: Endpoint) {
        self.state().failing.remove(&endpoint);
    }

    /// Holds every `endpoint` response until the returned handle is notified.
    pub fn hold(&self, endpoint: Endpoint) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.state().gates.insert(endpoint, gate.clone());
        gate
    }

    /// Lets every held and future `endpoint` call through.
    pub fn release(&self, endpoint: Endpoint) {
        if let Some(gate) = self.state().gates.remove(&endpoint) {
            gate.notify_waiters();
            gate.notify_one();
        }
    }

    pub fn calls(&self, endpoint: Endpoint) -> usize {
        self.state().calls.iter().filter(|c| **c == endpoint).count()
    }

    pub fn total_calls(&self) -> usize {
        self.state().calls.len()
    }

    async fn enter(&self, endpoint: Endpoint) -> SyncResult<()> {
        let gate = {
            let mut state = self.state();
            state.calls.push(endpoint);
            state.gates.get(&endpoint).cloned()
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }
        match self.state().failing.get(&endpoint) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

impl EventsApi for FakeBackend {
    async fn fetch_events(&self) -> SyncResult<Vec<Event>> {
        self.enter(Endpoint::Events).await?;
        Ok(self.state().events.clone())
    }

    async fn fetch_event(&self, id: &EventId) -> SyncResult<Event> {
        self.enter(Endpoint::Event).await?;
        self.state()
            .events
            .iter()
            .find(|event| &event.id == id)
            .cloned()
            .ok_or_else(|| SyncError::Rejected("Event not found".to_string()))
    }

    async fn fetch_favourites(&self, uid: &UserId) -> SyncResult<Vec<EventId>> {
        self.enter(Endpoint::Favourites).await?;
        Ok(self
            .state()
            .favourites
            .get(uid)
            .cloned()
            .unwrap_or_default())
    }

    async fn toggle_favourite(&self, uid: &UserId, event_id: &EventId) -> SyncResult<bool> {
        self.enter(Endpoint::ToggleFavourite).await?;
        let mut state = self.state();
        let marks = state.favourites.entry(uid.clone()).or_default();
        if let Some(position) = marks.iter().position(|id| id == event_id) {
            marks.remove(position);
            Ok(true)
        } else {
            marks.push(event_id.clone());
            Ok(false)
        }
    }

    async fn fetch_registrations(&self, uid: &UserId) -> SyncResult<Vec<Registration>> {
        self.enter(Endpoint::Registrations).await?;
        Ok(self
            .state()
            .registrations
            .get(uid)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_registration(
        &self,
        uid: &UserId,
        draft: &RegistrationDraft,
    ) -> SyncResult<Registration> {
        self.enter(Endpoint::CreateRegistration).await?;
        let mut state = self.state();
        state.next_registration += 1;
        let registration = Registration {
            registration_id: RegistrationId::new(format!("reg-{}", state.next_registration)),
            event_id: draft.event_id.clone(),
            name: draft.name.clone(),
            email: draft.email.clone(),
            phone: draft.phone.clone(),
            created_at: Some("2025-06-01T12:00:00Z".to_string()),
        };
        state
            .registrations
            .entry(uid.clone())
            .or_default()
            .insert(0, registration.clone());
        Ok(registration)
    }

    async fn delete_registration(
        &self,
        uid: &UserId,
        registration_id: &RegistrationId,
    ) -> SyncResult<()> {
        self.enter(Endpoint::DeleteRegistration).await?;
        if let Some(list) = self.state().registrations.get_mut(uid) {
            list.retain(|r| &r.registration_id != registration_id);
        }
        Ok(())
    }
}
