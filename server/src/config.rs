use shared::WorldConfig;
use std::time::Duration;

// Runtime/server settings (not gameplay tuning, which lives in `WorldConfig`).

pub const DEFAULT_HOST: &str = "127.0.4.22";
pub const DEFAULT_PORT: u16 = 53803;
pub const DEFAULT_WS_PATH: &str = "/ws";
pub const OUTBOUND_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Only upgrade requests on this path are accepted.
    pub ws_path: String,
    pub world: WorldConfig,
    /// Per-connection outbound queue size; a peer that fills it is dropped.
    pub outbound_capacity: usize,
    /// How often an idle outbound pump sends a ping.
    pub ping_period: Duration,
    /// Deadline for a single frame write.
    pub write_timeout: Duration,
    /// A peer that sends nothing (pongs included) for this long is dropped.
    pub idle_timeout: Duration,
    /// Interval for authoritative position snapshots; zero disables them.
    pub sync_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            ws_path: DEFAULT_WS_PATH.to_string(),
            world: WorldConfig::default(),
            outbound_capacity: OUTBOUND_CAPACITY,
            ping_period: Duration::from_secs(10),
            write_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(30),
            sync_interval: Duration::from_secs(1),
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
