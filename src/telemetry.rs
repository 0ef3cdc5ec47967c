use crate::config::AppConfig;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise the crate logs at the configured level
/// and sqlx only at `warn`. Production output is JSON.
pub fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("paisasplit_backend={},sqlx=warn", config.log_level).into()
    });

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    // try_init: tests may install a subscriber more than once
    let result = if config.is_production() {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if let Err(e) = result {
        eprintln!("Tracing subscriber already installed: {}", e);
    }
}
