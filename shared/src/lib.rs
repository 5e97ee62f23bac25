use serde::{Deserialize, Serialize};

pub mod protocol;
pub mod stats;

pub use protocol::{
    AttackTarget, ChatChannel, ClientIntent, LootDrop, LostReason, Packet, ServerEvent, StopReason,
    TargetKind,
};
pub use stats::{
    attack_interval_ms, derive_stats, effective_attributes, final_aspd, Attributes, BaseStats,
    DerivedStats, EquipmentBonuses, StatKind,
};

pub const PROTOCOL_VERSION: u32 = 1;

pub const COMBAT_TICK_MS: u64 = 50;
pub const AI_TICK_MS: u64 = 500;

pub const ASPD_CAP: i32 = 195;
pub const ASPD_MIN_INTERVAL_MS: u64 = 217;
pub const MAX_BASE_ATTRIBUTE: i32 = 99;

pub const DEFAULT_ATTACK_RANGE: f32 = 150.0;
pub const RANGE_TOLERANCE: f32 = 50.0;

pub const POSITION_TTL_SECS: u64 = 300;
pub const SYSTEM_SENDER_NAME: &str = "SYSTEM";
pub const SPAWN_POSITION: Coordinate = Coordinate {
    x: 0.0,
    y: 0.0,
    z: 300.0,
};

pub const ENEMY_WANDER_SPEED: f32 = 60.0;
pub const WANDER_STEP_MIN: f32 = 100.0;
pub const WANDER_STEP_MAX: f32 = 300.0;
pub const WANDER_ARRIVAL_DISTANCE: f32 = 10.0;
pub const WANDER_PAUSE_MIN_MS: u64 = 3_000;
pub const WANDER_PAUSE_MAX_MS: u64 = 8_000;
pub const ENEMY_MOVE_BROADCAST_MS: u64 = 200;

/// World-space position. Range checks only look at the ground plane (x, y).
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct Coordinate {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Coordinate {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn planar_distance(&self, other: &Coordinate) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}
