use std::env;
use tracing_subscriber::{filter::Targets, layer::SubscriberExt, util::SubscriberInitExt};

fn default_filter() -> Targets {
    if cfg!(debug_assertions) {
        "warn,playsession=debug,playsession_core=debug"
    } else {
        "warn,playsession=info,playsession_core=info"
    }
    .parse()
    .expect("valid filter")
}

/// Installs the process-wide tracing subscriber, honoring `RUST_LOG` if set.
pub fn init() {
    let filter = env::var("RUST_LOG").ok().and_then(|f| f.parse::<Targets>().ok()).unwrap_or_else(default_filter);
    let registry = tracing_subscriber::registry().with(filter).with(tracing_subscriber::fmt::layer());
    if let Err(err) = registry.try_init() {
        eprintln!("setting tracing default failed: {err:?}");
    }
}
