//! Tracing subscriber setup.

use tracing_subscriber::{
    fmt::format::Format, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

const DEFAULT_FILTER: &str =
    "tessera=debug,tessera_api=debug,tessera_services=debug,tessera_db=info,tower_http=debug";

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
///
/// Development gets a compact console format; production emits one JSON object per event.
pub fn init_telemetry(json: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init()?;
    } else {
        let console_fmt = tracing_subscriber::fmt::layer().event_format(
            Format::default()
                .compact()
                .with_target(false)
                .without_time(),
        );
        tracing_subscriber::registry()
            .with(filter)
            .with(console_fmt)
            .try_init()?;
    }

    Ok(())
}
