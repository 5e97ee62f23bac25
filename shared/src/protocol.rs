//! Wire protocol between game clients and the combat server.
//!
//! Everything travels as a bincode-encoded [`Packet`]. Session management
//! stays at the top level of the enum; gameplay flows through
//! [`ClientIntent`] (client to server) and [`ServerEvent`] (server to client).

use crate::stats::{BaseStats, DerivedStats};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    Connect { client_version: u32 },
    Heartbeat,
    Intent(ClientIntent),
    Disconnect,

    Connected { client_id: u32 },
    Event(ServerEvent),
    Disconnected { reason: String },
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TargetKind {
    Player,
    Enemy,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::Player => f.write_str("player"),
            TargetKind::Enemy => f.write_str("enemy"),
        }
    }
}

/// Something an auto-attack can be aimed at. Player and enemy ids live in
/// separate namespaces, so the kind is part of the identity.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttackTarget {
    Player(u32),
    Enemy(u32),
}

impl AttackTarget {
    pub fn id(&self) -> u32 {
        match self {
            AttackTarget::Player(id) | AttackTarget::Enemy(id) => *id,
        }
    }

    pub fn kind(&self) -> TargetKind {
        match self {
            AttackTarget::Player(_) => TargetKind::Player,
            AttackTarget::Enemy(_) => TargetKind::Enemy,
        }
    }
}

impl fmt::Display for AttackTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.id())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum ClientIntent {
    Join {
        character_id: u32,
        display_name: String,
    },
    Position {
        character_id: u32,
        x: f32,
        y: f32,
        z: f32,
    },
    Attack {
        attacker_id: u32,
        target: AttackTarget,
    },
    StopAttack {
        attacker_id: u32,
    },
    Respawn {
        character_id: u32,
    },
    AllocateStat {
        character_id: u32,
        stat: String,
        amount: i32,
    },
    Equip {
        character_id: u32,
        inventory_id: u32,
        equip: bool,
    },
    Chat {
        character_id: u32,
        message: String,
    },
}

impl ClientIntent {
    /// The character the intent is issued on behalf of.
    pub fn character_id(&self) -> u32 {
        match self {
            ClientIntent::Join { character_id, .. }
            | ClientIntent::Position { character_id, .. }
            | ClientIntent::Respawn { character_id }
            | ClientIntent::AllocateStat { character_id, .. }
            | ClientIntent::Equip { character_id, .. }
            | ClientIntent::Chat { character_id, .. } => *character_id,
            ClientIntent::Attack { attacker_id, .. } | ClientIntent::StopAttack { attacker_id } => {
                *attacker_id
            }
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Stopped,
    Switched,
    Died,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum LostReason {
    Died,
    Disconnected,
    Missing,
}

/// Players speak on `Global`; `Combat` carries server announcements.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum ChatChannel {
    Global,
    Combat,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct LootDrop {
    pub item_id: u32,
    pub name: String,
    pub quantity: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum ServerEvent {
    Joined {
        character_id: u32,
    },
    Error {
        message: String,
    },
    AutoAttackStarted {
        target_id: u32,
        target_kind: TargetKind,
        attack_range: f32,
        aspd: i32,
        interval_ms: u64,
    },
    AutoAttackStopped {
        reason: StopReason,
        old_target_id: Option<u32>,
        old_target_kind: Option<TargetKind>,
    },
    TargetLost {
        target_id: u32,
        target_kind: TargetKind,
        reason: LostReason,
    },
    OutOfRange {
        target_id: u32,
        target_kind: TargetKind,
        target_x: f32,
        target_y: f32,
        target_z: f32,
        required_range: f32,
    },
    Damage {
        attacker_id: u32,
        target_id: u32,
        target_kind: TargetKind,
        damage: i32,
        is_critical: bool,
        target_health: i32,
        target_max_health: i32,
    },
    Death {
        killed_id: u32,
        killer_id: u32,
        target_kind: TargetKind,
        exp: u32,
        loot: Vec<LootDrop>,
    },
    HealthUpdate {
        character_id: u32,
        health: i32,
        max_health: i32,
        mana: i32,
        max_mana: i32,
    },
    Stats {
        character_id: u32,
        base: BaseStats,
        derived: DerivedStats,
    },
    PlayerMoved {
        character_id: u32,
        display_name: String,
        x: f32,
        y: f32,
        z: f32,
    },
    PlayerLeft {
        character_id: u32,
        display_name: String,
    },
    Respawned {
        character_id: u32,
        health: i32,
        max_health: i32,
        mana: i32,
        max_mana: i32,
        x: f32,
        y: f32,
        z: f32,
    },
    EnemySpawn {
        enemy_id: u32,
        template_id: u32,
        name: String,
        level: i32,
        health: i32,
        max_health: i32,
        x: f32,
        y: f32,
        z: f32,
    },
    EnemyMove {
        enemy_id: u32,
        x: f32,
        y: f32,
        z: f32,
        is_moving: bool,
    },
    EnemyHealthUpdate {
        enemy_id: u32,
        health: i32,
        max_health: i32,
    },
    /// `sender_id` is `None` for messages from the server itself.
    ChatMessage {
        channel: ChatChannel,
        sender_id: Option<u32>,
        sender_name: String,
        message: String,
    },
}
