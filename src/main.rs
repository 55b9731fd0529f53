//! resp-loop: a single-threaded RESP server
//!
//! Supported commands:
//! - PING: replies `+PONG`
//! - ECHO <message>: replies with the message as a bulk string
//!
//! Anything else gets an `ERR unknown command` error reply. Malformed
//! requests close the offending connection only.

use resp_loop::config::Config;
use resp_loop::runtime;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        listen = %config.listen,
        max_connections = config.max_connections,
        events_capacity = config.events_capacity,
        read_buffer_kb = config.read_buffer_size / 1024,
        max_frame_mb = config.max_frame_size / 1024 / 1024,
        "Starting resp-loop server"
    );

    runtime::run(&config)?;
    Ok(())
}
