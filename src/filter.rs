use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};

use crate::lifecycle::{classify, LifecycleStatus};
use crate::models::Event;

pub const ALL_CATEGORIES: &str = "All";

/// Search, category and status criteria for the events list.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct EventFilter {
    pub query: String,
    pub category: String,
    /// `None` accepts every status.
    pub status: Option<LifecycleStatus>,
}

impl Default for EventFilter {
    fn default() -> Self {
        Self {
            query: String::new(),
            category: ALL_CATEGORIES.to_string(),
            status: Some(LifecycleStatus::Upcoming),
        }
    }
}

impl EventFilter {
    pub fn new(
        query: impl Into<String>,
        category: impl Into<String>,
        status: Option<LifecycleStatus>,
    ) -> Self {
        Self {
            query: query.into(),
            category: category.into(),
            status,
        }
    }

    fn matches<Tz: TimeZone>(&self, event: &Event, needle: &str, now: &DateTime<Tz>) -> bool {
        let title_hit = event.title.to_lowercase().contains(needle);
        let category_hit = self.category == ALL_CATEGORIES || event.category == self.category;
        let status_hit = self
            .status
            .map_or(true, |wanted| classify(&event.date_time, now) == wanted);
        title_hit && category_hit && status_hit
    }
}

/// Returns the events matching `filter`, in catalog order.
pub fn filter_events<Tz: TimeZone>(
    events: &[Event],
    filter: &EventFilter,
    now: &DateTime<Tz>,
) -> Vec<Event> {
    let needle = filter.query.to_lowercase();
    events
        .iter()
        .filter(|event| filter.matches(event, &needle, now))
        .cloned()
        .collect()
}

/// [`filter_events`] against the local wall clock.
pub fn filter_events_now(events: &[Event], filter: &EventFilter) -> Vec<Event> {
    filter_events(events, filter, &Local::now())
}

/// `All` followed by each distinct category in first-seen order.
pub fn category_options(events: &[Event]) -> Vec<String> {
    let mut options = vec![ALL_CATEGORIES.to_string()];
    for event in events {
        if !options.iter().any(|existing| existing == &event.category) {
            options.push(event.category.clone());
        }
    }
    options
}
