use clap::Parser;
use shared::{
    Coordinate, AI_TICK_MS, COMBAT_TICK_MS, POSITION_TTL_SECS, RANGE_TOLERANCE, SPAWN_POSITION,
};
use std::time::Duration;

/// Command line configuration of the combat server.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct ServerConfig {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    pub host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    pub port: u16,

    /// Combat tick period in milliseconds
    #[arg(long, default_value_t = COMBAT_TICK_MS)]
    pub combat_tick_ms: u64,

    /// Enemy AI tick period in milliseconds
    #[arg(long, default_value_t = AI_TICK_MS)]
    pub ai_tick_ms: u64,

    /// Maximum number of concurrent clients
    #[arg(short, long, default_value = "32")]
    pub max_clients: usize,

    /// Seconds of silence before a client is dropped
    #[arg(long, default_value = "5")]
    pub client_timeout_secs: u64,

    /// Seed for combat and AI randomness (random when omitted)
    #[arg(long)]
    pub seed: Option<u64>,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn simulation(&self) -> SimulationConfig {
        SimulationConfig {
            combat_tick: Duration::from_millis(self.combat_tick_ms.max(1)),
            ai_tick: Duration::from_millis(self.ai_tick_ms.max(1)),
            seed: self.seed,
            ..SimulationConfig::default()
        }
    }
}

/// Knobs of the simulation core itself.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub combat_tick: Duration,
    pub ai_tick: Duration,
    /// Subtracted from attack range when telling a client how close to get.
    pub range_tolerance: f32,
    pub position_ttl: Duration,
    pub spawn_point: Coordinate,
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            combat_tick: Duration::from_millis(COMBAT_TICK_MS),
            ai_tick: Duration::from_millis(AI_TICK_MS),
            range_tolerance: RANGE_TOLERANCE,
            position_ttl: Duration::from_secs(POSITION_TTL_SECS),
            spawn_point: SPAWN_POSITION,
            seed: None,
        }
    }
}
