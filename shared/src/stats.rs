//! Stat model shared by server and client.
//!
//! Everything here is a pure function of base attributes and equipment
//! bonuses. All arithmetic is integer with floor truncation, so a client that
//! runs the same functions shows exactly the numbers the server resolves
//! combat with.

use crate::{ASPD_CAP, ASPD_MIN_INTERVAL_MS};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The six primary attributes.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct Attributes {
    pub strength: i32,
    pub agility: i32,
    pub vitality: i32,
    pub intellect: i32,
    pub dexterity: i32,
    pub luck: i32,
}

impl Attributes {
    pub fn uniform(value: i32) -> Self {
        Self {
            strength: value,
            agility: value,
            vitality: value,
            intellect: value,
            dexterity: value,
            luck: value,
        }
    }

    pub fn get(&self, kind: StatKind) -> i32 {
        match kind {
            StatKind::Strength => self.strength,
            StatKind::Agility => self.agility,
            StatKind::Vitality => self.vitality,
            StatKind::Intellect => self.intellect,
            StatKind::Dexterity => self.dexterity,
            StatKind::Luck => self.luck,
        }
    }

    pub fn get_mut(&mut self, kind: StatKind) -> &mut i32 {
        match kind {
            StatKind::Strength => &mut self.strength,
            StatKind::Agility => &mut self.agility,
            StatKind::Vitality => &mut self.vitality,
            StatKind::Intellect => &mut self.intellect,
            StatKind::Dexterity => &mut self.dexterity,
            StatKind::Luck => &mut self.luck,
        }
    }

    /// Component-wise sum.
    pub fn plus(&self, other: &Attributes) -> Attributes {
        Attributes {
            strength: self.strength + other.strength,
            agility: self.agility + other.agility,
            vitality: self.vitality + other.vitality,
            intellect: self.intellect + other.intellect,
            dexterity: self.dexterity + other.dexterity,
            luck: self.luck + other.luck,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatKind {
    Strength,
    Agility,
    Vitality,
    Intellect,
    Dexterity,
    Luck,
}

impl StatKind {
    pub const ALL: [StatKind; 6] = [
        StatKind::Strength,
        StatKind::Agility,
        StatKind::Vitality,
        StatKind::Intellect,
        StatKind::Dexterity,
        StatKind::Luck,
    ];

    pub fn short_name(&self) -> &'static str {
        match self {
            StatKind::Strength => "str",
            StatKind::Agility => "agi",
            StatKind::Vitality => "vit",
            StatKind::Intellect => "int",
            StatKind::Dexterity => "dex",
            StatKind::Luck => "luk",
        }
    }
}

impl fmt::Display for StatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

impl FromStr for StatKind {
    type Err = String;

    /// Accepts the three-letter names clients send as well as the long forms.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "str" | "strength" => Ok(StatKind::Strength),
            "agi" | "agility" => Ok(StatKind::Agility),
            "vit" | "vitality" => Ok(StatKind::Vitality),
            "int" | "intellect" | "intelligence" => Ok(StatKind::Intellect),
            "dex" | "dexterity" => Ok(StatKind::Dexterity),
            "luk" | "luck" => Ok(StatKind::Luck),
            _ => Err(s.to_string()),
        }
    }
}

/// Persisted character progression.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct BaseStats {
    pub attributes: Attributes,
    pub level: i32,
    pub stat_points: i32,
}

impl Default for BaseStats {
    fn default() -> Self {
        Self {
            attributes: Attributes::uniform(1),
            level: 1,
            stat_points: 48,
        }
    }
}

/// Aggregated bonuses of everything a character has equipped.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct EquipmentBonuses {
    pub attributes: Attributes,
    pub hit: i32,
    pub flee: i32,
    pub critical: i32,
    pub max_hp: i32,
    pub max_sp: i32,
}

impl EquipmentBonuses {
    pub fn plus(&self, other: &EquipmentBonuses) -> EquipmentBonuses {
        EquipmentBonuses {
            attributes: self.attributes.plus(&other.attributes),
            hit: self.hit + other.hit,
            flee: self.flee + other.flee,
            critical: self.critical + other.critical,
            max_hp: self.max_hp + other.max_hp,
            max_sp: self.max_sp + other.max_sp,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct DerivedStats {
    pub status_atk: i32,
    pub status_matk: i32,
    pub hit: i32,
    pub flee: i32,
    pub soft_def: i32,
    pub soft_mdef: i32,
    pub critical: i32,
    pub aspd: i32,
    pub max_hp: i32,
    pub max_sp: i32,
}

/// Base attributes with equipment attribute bonuses folded in. Never written
/// back onto the character.
pub fn effective_attributes(base: &Attributes, bonuses: &EquipmentBonuses) -> Attributes {
    base.plus(&bonuses.attributes)
}

pub fn derive_stats(base: &BaseStats, bonuses: &EquipmentBonuses) -> DerivedStats {
    let eff = effective_attributes(&base.attributes, bonuses);
    let str = eff.strength.max(0);
    let agi = eff.agility.max(0);
    let vit = eff.vitality.max(0);
    let int = eff.intellect.max(0);
    let dex = eff.dexterity.max(0);
    let luk = eff.luck.max(0);
    let level = base.level;

    let str_bonus = str / 10;
    let int_bonus = int / 7;

    let soft_def = (vit as f64 * 0.5 + (vit * vit) as f64 / 150.0).floor() as i32;

    let agi_speed = ((agi as f64).sqrt() * 1.2).floor() as i32;
    let dex_speed = ((dex as f64).sqrt() * 0.6).floor() as i32;
    let aspd = (170 + agi_speed + dex_speed).min(ASPD_CAP);

    DerivedStats {
        status_atk: str + str_bonus * str_bonus + dex / 5 + luk / 3,
        status_matk: int + int_bonus * int_bonus,
        hit: level + dex + bonuses.hit,
        flee: level + agi + bonuses.flee,
        soft_def,
        soft_mdef: int / 2,
        critical: luk * 3 / 10 + bonuses.critical,
        aspd,
        max_hp: 100 + vit * 8 + level * 10 + bonuses.max_hp,
        max_sp: 50 + int * 5 + level * 5 + bonuses.max_sp,
    }
}

/// ASPD actually used for scheduling: the weapon modifier lands after the
/// attribute clamp and the sum is clamped again.
pub fn final_aspd(derived_aspd: i32, weapon_modifier: i32) -> i32 {
    (derived_aspd.min(ASPD_CAP) + weapon_modifier).clamp(0, ASPD_CAP)
}

/// Milliseconds between automatic attacks for a given ASPD.
///
/// Up to the cap every point is worth 50 ms. Past the cap the gain decays
/// exponentially and bottoms out at `ASPD_MIN_INTERVAL_MS`.
pub fn attack_interval_ms(aspd: i32) -> u64 {
    if aspd <= ASPD_CAP {
        let steps = (200 - aspd as i64).max(0);
        return (steps * 50) as u64;
    }

    let excess = (aspd - ASPD_CAP).min(9) as f64;
    let decay = (-excess * 0.35).exp();
    let bonus = (130.0 * (1.0 - decay)).floor() as i64;
    (250 - bonus).max(ASPD_MIN_INTERVAL_MS as i64) as u64
}
