//! Tracing initialisation.
//!
//! | Variable             | Effect                                        |
//! |----------------------|-----------------------------------------------|
//! | `NAVGRID_LOG`        | Log filter, e.g. `debug` or `navgrid=trace`.  |
//! | `NAVGRID_LOG_FORMAT` | `json` switches to newline-delimited JSON.    |

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber.
///
/// Safe to call more than once; later calls leave the first subscriber in
/// place.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("NAVGRID_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("NAVGRID_LOG_FORMAT").as_deref() == Ok("json");

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().compact())
            .try_init()
    };
    let _ = result;
}
