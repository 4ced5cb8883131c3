pub mod config;
pub mod monitor;
pub mod position;
pub mod server;

use std::sync::Arc;

use config::Config;
use monitor::Monitor;
use server::Server;

/// Opened so integration tests can start a real server without going
/// through `main`.
pub async fn server_main(config: Arc<Config>) -> anyhow::Result<()> {
    let monitor = Monitor::new();
    let server = Server::bind(config, monitor).await?;
    server::demo::register(&server)?;
    server.run().await
}
