use dirs::data_dir;
use once_cell::sync::Lazy;
use std::path::PathBuf;

static DATA_ROOT: Lazy<PathBuf> = Lazy::new(|| {
    let base = data_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    base.join("event-sync")
});

pub fn data_root() -> PathBuf {
    DATA_ROOT.clone()
}

pub fn config_path() -> PathBuf {
    data_root().join("config.json")
}

/// Installs the global `tracing` subscriber. `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // A second call (tests, embedding apps) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .compact()
        .try_init();
}
