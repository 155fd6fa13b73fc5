use crate::config::PlaygroundConfig;
use crate::error::Result;
use crate::server;

/// Execute the `serve` command: start the relay server.
pub async fn execute(host: Option<String>, port: Option<u16>) -> Result<()> {
    let mut config = PlaygroundConfig::load()?;

    // Command-line flags win over the config file
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }

    println!("A3S Playground relay starting...");
    println!("Listening on http://{}", config.bind_address());
    println!("Forwarding to {} ({})", config.upstream.base_url, config.upstream.model);
    println!("Press Ctrl+C to stop");

    server::start(config).await
}
