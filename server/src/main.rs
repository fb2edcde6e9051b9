use clap::Parser;
use log::{error, info};
use server::config::{Args, ServerConfig};
use server::network::{Server, ServerEvent};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = ServerConfig::from_args(&args)?;
    info!(
        "Starting server on {} at {} Hz with {} colliders",
        config.address,
        args.tick_rate,
        config.colliders.len()
    );

    let mut server = Server::bind(config).await?;

    let events = server.event_sender();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, shutting down gracefully...");
                let _ = events.send(ServerEvent::Shutdown);
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    server.run().await
}
