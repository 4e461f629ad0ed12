//! Browser console logging

use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{Layer, layer::SubscriberExt, util::SubscriberInitExt};
use tracing_web::MakeWebConsoleWriter;

/// Route `tracing` output to the browser console.
///
/// Only the first call installs a subscriber; later calls are ignored.
pub fn init_logging(level: Level) {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .without_time()
        .with_writer(MakeWebConsoleWriter::new())
        .with_filter(LevelFilter::from_level(level));

    let _ = tracing_subscriber::registry().with(console_layer).try_init();
}
