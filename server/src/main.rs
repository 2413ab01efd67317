use clap::Parser;
use log::{error, info};
use server::config::{ServerConfig, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_WS_PATH};
use server::network::Server;
use shared::WorldConfig;
use std::time::Duration;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, env = "APP_IP", default_value = DEFAULT_HOST)]
    host: String,
    /// Server port to listen on
    #[clap(short, long, env = "APP_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,
    /// WebSocket upgrade path
    #[clap(long, default_value = DEFAULT_WS_PATH)]
    path: String,
    /// Simulation ticks per second
    #[clap(short, long, default_value_t = shared::TICK_RATE)]
    tick_rate: u32,
    /// Milliseconds between position snapshots (0 disables them)
    #[clap(long, default_value_t = 1000)]
    sync_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();

    let config = ServerConfig {
        host: args.host,
        port: args.port,
        ws_path: args.path,
        world: WorldConfig {
            tick_rate: args.tick_rate.max(1),
            ..WorldConfig::default()
        },
        sync_interval: Duration::from_millis(args.sync_ms),
        ..ServerConfig::default()
    };

    info!("Starting server on {}{}", config.address(), config.ws_path);

    let server = match Server::bind(config).await {
        Ok(server) => server,
        Err(e) => {
            error!("{}", e);
            return Err(e.into());
        }
    };

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
