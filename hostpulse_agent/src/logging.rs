use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "hostpulse=info,hostpulse_agent=info";

/// Logs go to stderr; stdout carries only snapshot JSON.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    if let Err(err) = fmt()
        .compact()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
    {
        eprintln!("initializing tracing failed: {err:?}");
    }
}
