//! Builds the tracing dispatcher handed to the receiver.
//!
//! Nothing here installs a global subscriber; callers decide where the
//! dispatcher is in effect.

use tracing::Dispatch;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter};

/// `RUST_LOG` wins when set and valid, otherwise `default_directives` applies.
pub fn dispatch(default_directives: &str) -> Dispatch {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directives))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    Dispatch::new(tracing_subscriber::registry().with(filter).with(fmt_layer))
}
