use std::future::Future;

use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::ClientConfig;
use crate::error::{SyncError, SyncResult};
use crate::models::{Event, EventId, Registration, RegistrationId, UserId};

/// Payload of a new registration, as submitted by the registration form.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationDraft {
    pub event_id: EventId,
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// Everything the synchronization layer needs from the backend.
pub trait EventsApi: Send + Sync {
    fn fetch_events(&self) -> impl Future<Output = SyncResult<Vec<Event>>> + Send;

    fn fetch_event(&self, id: &EventId) -> impl Future<Output = SyncResult<Event>> + Send;

    fn fetch_favourites(
        &self,
        uid: &UserId,
    ) -> impl Future<Output = SyncResult<Vec<EventId>>> + Send;

    /// Flips the favourite mark server-side; `Ok(true)` means it was removed.
    fn toggle_favourite(
        &self,
        uid: &UserId,
        event_id: &EventId,
    ) -> impl Future<Output = SyncResult<bool>> + Send;

    fn fetch_registrations(
        &self,
        uid: &UserId,
    ) -> impl Future<Output = SyncResult<Vec<Registration>>> + Send;

    fn create_registration(
        &self,
        uid: &UserId,
        draft: &RegistrationDraft,
    ) -> impl Future<Output = SyncResult<Registration>> + Send;

    fn delete_registration(
        &self,
        uid: &UserId,
        registration_id: &RegistrationId,
    ) -> impl Future<Output = SyncResult<()>> + Send;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventListPayload {
    event_details: Vec<Event>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventPayload {
    event_details: Event,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FavouriteItem {
    event_id: EventId,
}

#[derive(Debug, Deserialize)]
struct FavouritesPayload {
    #[serde(default)]
    favourites: Vec<FavouriteItem>,
}

#[derive(Debug, Deserialize)]
struct TogglePayload {
    #[serde(default)]
    removed: bool,
}

#[derive(Debug, Deserialize)]
struct RegistrationsPayload {
    #[serde(default)]
    registrations: Vec<Registration>,
}

#[derive(Debug, Deserialize)]
struct RegistrationPayload {
    registration: Registration,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToggleBody<'a> {
    event_id: &'a EventId,
}

/// `EventsApi` over HTTP+JSON.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn from_config(config: &ClientConfig) -> SyncResult<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|err| SyncError::Network(err.to_string()))?;
        Self::with_client(client, &config.api_base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> SyncResult<Self> {
        let base_url = Url::parse(base_url.trim())
            .map_err(|err| SyncError::Rejected(format!("invalid base url {base_url}: {err}")))?;
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> SyncResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SyncError::Rejected(format!("base url {} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn read<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> SyncResult<T> {
        let response = request
            .send()
            .await
            .map_err(|err| SyncError::Network(err.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| SyncError::Network(err.to_string()))?;
        decode_envelope(status, &body)
    }
}

/// Decodes a `{success, ...}` envelope into the endpoint payload.
pub(crate) fn decode_envelope<T: DeserializeOwned>(status: StatusCode, body: &str) -> SyncResult<T> {
    let value: Value = serde_json::from_str(body).map_err(|err| {
        if status.is_success() {
            SyncError::Rejected(format!("malformed response: {err}"))
        } else {
            SyncError::Rejected(format!("status {status}: {body}"))
        }
    })?;

    let success = value
        .get("success")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    if !status.is_success() || !success {
        let message = value
            .get("error")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("status {status}"));
        return Err(SyncError::Rejected(message));
    }

    serde_json::from_value(value).map_err(|err| SyncError::Rejected(format!("malformed response: {err}")))
}

impl EventsApi for HttpBackend {
    #[instrument(skip(self))]
    async fn fetch_events(&self) -> SyncResult<Vec<Event>> {
        let url = self.endpoint(&["eventDetails"])?;
        let payload: EventListPayload = self.read(self.client.get(url)).await?;
        debug!(count = payload.event_details.len(), "fetched catalog");
        Ok(payload.event_details)
    }

    #[instrument(skip(self))]
    async fn fetch_event(&self, id: &EventId) -> SyncResult<Event> {
        let url = self.endpoint(&["eventDetails", id.as_str()])?;
        let payload: EventPayload = self.read(self.client.get(url)).await?;
        Ok(payload.event_details)
    }

    #[instrument(skip(self))]
    async fn fetch_favourites(&self, uid: &UserId) -> SyncResult<Vec<EventId>> {
        let url = self.endpoint(&["users", uid.as_str(), "favourites"])?;
        let payload: FavouritesPayload = self.read(self.client.get(url)).await?;
        Ok(payload
            .favourites
            .into_iter()
            .map(|item| item.event_id)
            .collect())
    }

    #[instrument(skip(self))]
    async fn toggle_favourite(&self, uid: &UserId, event_id: &EventId) -> SyncResult<bool> {
        let url = self.endpoint(&["users", uid.as_str(), "favourites"])?;
        let request = self.client.post(url).json(&ToggleBody { event_id });
        let payload: TogglePayload = self.read(request).await?;
        Ok(payload.removed)
    }

    #[instrument(skip(self))]
    async fn fetch_registrations(&self, uid: &UserId) -> SyncResult<Vec<Registration>> {
        let url = self.endpoint(&["users", uid.as_str(), "registrations"])?;
        let payload: RegistrationsPayload = self.read(self.client.get(url)).await?;
        Ok(payload.registrations)
    }

    #[instrument(skip(self, draft), fields(event_id = %draft.event_id))]
    async fn create_registration(
        &self,
        uid: &UserId,
        draft: &RegistrationDraft,
    ) -> SyncResult<Registration> {
        let url = self.endpoint(&["users", uid.as_str(), "registrations"])?;
        let payload: RegistrationPayload = self.read(self.client.post(url).json(draft)).await?;
        Ok(payload.registration)
    }

    #[instrument(skip(self))]
    async fn delete_registration(
        &self,
        uid: &UserId,
        registration_id: &RegistrationId,
    ) -> SyncResult<()> {
        let url = self.endpoint(&[
            "users",
            uid.as_str(),
            "registrations",
            registration_id.as_str(),
        ])?;
        let response = self
            .client
            .delete(url)
            .send()
            .await
            .map_err(|err| SyncError::Network(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Rejected(format!("status {status}: {body}")));
        }
        Ok(())
    }
}
