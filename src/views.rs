use serde::Serialize;

use crate::catalog::find_event;
use crate::models::{Event, EventId, Registration, RegistrationWithEvent};

/// Label for registrations whose event is not in the catalog.
pub const UNKNOWN_CATEGORY: &str = "Other";

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct CategoryAggregate {
    pub category: String,
    pub count: usize,
    pub percentage: u32,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct CategoryBreakdown {
    pub total: usize,
    pub categories: Vec<CategoryAggregate>,
}

impl CategoryBreakdown {
    pub fn get(&self, category: &str) -> Option<&CategoryAggregate> {
        self.categories.iter().find(|agg| agg.category == category)
    }

    /// Registrations in the busiest category.
    pub fn top_count(&self) -> usize {
        self.categories.iter().map(|agg| agg.count).max().unwrap_or(0)
    }

    /// Rounded mean of the per-category percentages.
    pub fn average_percentage(&self) -> u32 {
        if self.categories.is_empty() {
            return 0;
        }
        let sum: u32 = self.categories.iter().map(|agg| agg.percentage).sum();
        rounded_ratio(sum as usize, self.categories.len(), 1)
    }
}

/// Catalog events the user marked, in catalog order.
pub fn favourite_events(events: &[Event], favourite_ids: &[EventId]) -> Vec<Event> {
    events
        .iter()
        .filter(|event| favourite_ids.iter().any(|id| id.as_str() == event.id.as_str()))
        .cloned()
        .collect()
}

pub fn registrations_with_event(
    registrations: &[Registration],
    events: &[Event],
) -> Vec<RegistrationWithEvent> {
    registrations
        .iter()
        .map(|registration| RegistrationWithEvent {
            registration: registration.clone(),
            event: find_event(events, &registration.event_id).cloned(),
        })
        .collect()
}

/// Registration counts per event category, in first-seen order.
pub fn category_aggregates(joined: &[RegistrationWithEvent]) -> CategoryBreakdown {
    let total = joined.len();
    let mut counts: Vec<(String, usize)> = Vec::new();

    for record in joined {
        let category = record
            .event
            .as_ref()
            .map(|event| event.category.as_str())
            .filter(|category| !category.is_empty())
            .unwrap_or(UNKNOWN_CATEGORY);
        match counts.iter_mut().find(|(name, _)| name == category) {
            Some((_, count)) => *count += 1,
            None => counts.push((category.to_string(), 1)),
        }
    }

    let categories = counts
        .into_iter()
        .map(|(category, count)| CategoryAggregate {
            category,
            count,
            percentage: rounded_ratio(count, total, 100),
        })
        .collect();

    CategoryBreakdown { total, categories }
}

/// `round(part / whole * scale)`, halves rounding up, 0 for an empty whole.
fn rounded_ratio(part: usize, whole: usize, scale: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    ((part * scale * 2 + whole) / (whole * 2)) as u32
}
