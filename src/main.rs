//! Provider binary entry point.
//!
//! Prints the handshake on stdout and serves the gRPC protocol until a
//! shutdown signal arrives. Logs go to stderr so they never corrupt the
//! handshake.

use hemmer_provider_pagerduty::{init_logging, serve, PagerDutyProvider};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    serve(PagerDutyProvider::new()).await
}
