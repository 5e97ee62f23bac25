//! Damage resolution for a single auto-attack hit.
//!
//! Order of operations: variance, soft defense, hard defense, critical.
//! Every stage floors and keeps the hit at one damage minimum.

use rand::Rng;

pub const VARIANCE_MIN: f64 = 0.8;
pub const VARIANCE_MAX: f64 = 1.2;
pub const CRITICAL_MULTIPLIER: f64 = 1.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttackerProfile {
    pub status_atk: i32,
    pub weapon_atk: i32,
    /// Critical chance in percent.
    pub critical: i32,
}

impl AttackerProfile {
    pub fn total_atk(&self) -> i32 {
        self.status_atk + self.weapon_atk
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefenderProfile {
    pub soft_def: i32,
    /// Percentage reduction applied after soft defense.
    pub hard_def: i32,
}

/// The random draws a hit consumes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageRolls {
    /// In `[VARIANCE_MIN, VARIANCE_MAX]`.
    pub variance: f64,
    /// In `[0, 100)`.
    pub critical: f64,
}

impl DamageRolls {
    pub fn sample<R: Rng>(rng: &mut R) -> Self {
        Self {
            variance: rng.gen_range(VARIANCE_MIN..=VARIANCE_MAX),
            critical: rng.gen_range(0.0..100.0),
        }
    }

    /// Average hit, never critical.
    pub fn flat() -> Self {
        Self {
            variance: 1.0,
            critical: 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageOutcome {
    pub damage: i32,
    pub is_critical: bool,
}

pub fn resolve_damage(
    attacker: &AttackerProfile,
    defender: &DefenderProfile,
    rolls: DamageRolls,
) -> DamageOutcome {
    let total_atk = attacker.total_atk().max(0) as f64;
    let raw = (total_atk * rolls.variance).floor() as i32;

    let after_soft = (raw - defender.soft_def.max(0)).max(1);

    let after_hard = if defender.hard_def > 0 {
        let reduction = 1.0 - defender.hard_def as f64 / 100.0;
        ((after_soft as f64 * reduction).floor() as i32).max(1)
    } else {
        after_soft
    };

    let is_critical = rolls.critical < attacker.critical as f64;
    let damage = if is_critical {
        ((after_hard as f64 * CRITICAL_MULTIPLIER).floor() as i32).max(1)
    } else {
        after_hard
    };

    DamageOutcome { damage, is_critical }
}
