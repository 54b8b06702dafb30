pub mod api;
pub mod catalog;
pub mod config;
pub mod context;
pub mod error;
pub mod favourites;
pub mod filter;
pub mod identity;
pub mod lifecycle;
pub mod models;
pub mod registrations;
pub mod utils;
pub mod validation;
pub mod views;

#[cfg(test)]
mod testing;

use anyhow::Context as _;
use tracing::{info, warn};

pub use api::{EventsApi, HttpBackend, RegistrationDraft};
pub use config::ClientConfig;
pub use context::{DashboardView, EventsContext};
pub use error::{SyncError, SyncResult};
pub use filter::EventFilter;
pub use identity::{IdentityPublisher, IdentitySignal, SyncPhase};
pub use lifecycle::LifecycleStatus;
pub use models::{Event, EventId, Registration, RegistrationId, RegistrationWithEvent, UserId};

/// Loads the catalog and, when configured, one user's data, then logs a summary.
pub async fn run() -> anyhow::Result<()> {
    utils::init_tracing();

    let config = ClientConfig::load().context("loading client config")?;
    info!(base_url = %config.api_base_url, "starting event sync");

    let ctx = EventsContext::from_config(&config).context("building http backend")?;
    ctx.catalog().load().await;
    if let Some(err) = ctx.catalog().error() {
        warn!(error = %err, "catalog unavailable");
    }

    let upcoming = ctx.filtered_events(&EventFilter::default());
    info!(
        total = ctx.catalog().events().len(),
        upcoming = upcoming.len(),
        categories = ?ctx.category_options(),
        "catalog summary"
    );

    let Some(token) = ctx.set_identity(config.identity()) else {
        info!("no user configured; skipping favourites and registrations");
        return Ok(());
    };
    ctx.refresh_user_data(&token).await;

    let dashboard = ctx.dashboard();
    info!(
        favourites = dashboard.favourites.len(),
        registrations = dashboard.registrations.len(),
        ready = ctx.user_data_ready(),
        "user summary"
    );
    for aggregate in &dashboard.breakdown.categories {
        info!(
            category = %aggregate.category,
            count = aggregate.count,
            percentage = aggregate.percentage,
            "registrations by category"
        );
    }

    Ok(())
}
