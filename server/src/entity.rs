use crate::damage::{AttackerProfile, DefenderProfile};
use crate::events::ConnectionId;
use crate::persistence::{EquipSlot, ItemRecord};
use shared::{
    derive_stats, final_aspd, BaseStats, Coordinate, DerivedStats, EquipmentBonuses,
    DEFAULT_ATTACK_RANGE,
};
use std::collections::{BTreeMap, BTreeSet};

/// Attack, reach and speed of whatever the player is holding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeaponProfile {
    pub attack: i32,
    pub range: f32,
    pub aspd_modifier: i32,
}

impl Default for WeaponProfile {
    /// Bare hands.
    fn default() -> Self {
        Self {
            attack: 0,
            range: DEFAULT_ATTACK_RANGE,
            aspd_modifier: 0,
        }
    }
}

/// Equipped items, one per slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Loadout {
    items: BTreeMap<EquipSlot, ItemRecord>,
}

impl Loadout {
    pub fn from_items(items: impl IntoIterator<Item = ItemRecord>) -> Self {
        let mut loadout = Self::default();
        for item in items {
            loadout.equip(item);
        }
        loadout
    }

    /// Puts the item in its slot and returns whatever it displaced. Items
    /// without a slot are ignored.
    pub fn equip(&mut self, item: ItemRecord) -> Option<ItemRecord> {
        let slot = item.slot?;
        self.items.insert(slot, item)
    }

    pub fn unequip(&mut self, inventory_id: u32) -> Option<ItemRecord> {
        let slot = self
            .items
            .iter()
            .find(|(_, item)| item.inventory_id == inventory_id)
            .map(|(slot, _)| *slot)?;
        self.items.remove(&slot)
    }

    pub fn contains(&self, inventory_id: u32) -> bool {
        self.items.values().any(|item| item.inventory_id == inventory_id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn bonuses(&self) -> EquipmentBonuses {
        self.items
            .values()
            .fold(EquipmentBonuses::default(), |acc, item| acc.plus(&item.bonuses))
    }

    /// Hard defense percentage, capped below full immunity.
    pub fn hard_defense(&self) -> i32 {
        self.items
            .values()
            .map(|item| item.hard_defense)
            .sum::<i32>()
            .clamp(0, 99)
    }

    pub fn weapon(&self) -> WeaponProfile {
        match self.items.get(&EquipSlot::Weapon) {
            Some(item) => WeaponProfile {
                attack: item.attack,
                range: item.weapon_range.unwrap_or(DEFAULT_ATTACK_RANGE),
                aspd_modifier: item.aspd_modifier,
            },
            None => WeaponProfile::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlayerEntity {
    pub id: u32,
    pub name: String,
    pub connection: ConnectionId,
    pub health: i32,
    pub max_health: i32,
    pub mana: i32,
    pub max_mana: i32,
    pub alive: bool,
    pub base: BaseStats,
    pub loadout: Loadout,
    pub bonuses: EquipmentBonuses,
    pub hard_defense: i32,
    pub weapon: WeaponProfile,
    pub derived: DerivedStats,
    /// Scheduling ASPD: derived ASPD plus weapon modifier, clamped.
    pub aspd: i32,
    pub last_attack_at: Option<u64>,
}

impl PlayerEntity {
    pub fn new(
        id: u32,
        name: &str,
        connection: ConnectionId,
        base: BaseStats,
        loadout: Loadout,
    ) -> Self {
        let mut player = Self {
            id,
            name: name.to_string(),
            connection,
            health: 0,
            max_health: 0,
            mana: 0,
            max_mana: 0,
            alive: true,
            base,
            loadout,
            bonuses: EquipmentBonuses::default(),
            hard_defense: 0,
            weapon: WeaponProfile::default(),
            derived: DerivedStats::default(),
            aspd: 0,
            last_attack_at: None,
        };
        player.recompute();
        player.health = player.max_health;
        player.mana = player.max_mana;
        player
    }

    /// Re-derives everything that depends on base stats or equipment and
    /// clamps HP/SP into the new maxima.
    pub fn recompute(&mut self) {
        self.bonuses = self.loadout.bonuses();
        self.hard_defense = self.loadout.hard_defense();
        self.weapon = self.loadout.weapon();
        self.derived = derive_stats(&self.base, &self.bonuses);
        self.aspd = final_aspd(self.derived.aspd, self.weapon.aspd_modifier);
        self.max_health = self.derived.max_hp.max(1);
        self.max_mana = self.derived.max_sp.max(0);
        self.set_health(self.health);
        self.set_mana(self.mana);
    }

    pub fn set_health(&mut self, health: i32) {
        self.health = health.clamp(0, self.max_health);
    }

    pub fn set_mana(&mut self, mana: i32) {
        self.mana = mana.clamp(0, self.max_mana);
    }

    /// Applies damage and returns the remaining health.
    pub fn take_damage(&mut self, damage: i32) -> i32 {
        self.set_health(self.health - damage.max(0));
        self.health
    }

    pub fn restore(&mut self) {
        self.health = self.max_health;
        self.mana = self.max_mana;
        self.alive = true;
    }

    pub fn attacker_profile(&self) -> AttackerProfile {
        AttackerProfile {
            status_atk: self.derived.status_atk,
            weapon_atk: self.weapon.attack,
            critical: self.derived.critical,
        }
    }

    pub fn defender_profile(&self) -> DefenderProfile {
        DefenderProfile {
            soft_def: self.derived.soft_def,
            hard_def: self.hard_defense,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropEntry {
    pub item_id: u32,
    pub name: String,
    /// Chance out of 10 000.
    pub rate: u32,
}

#[derive(Debug, Clone)]
pub struct EnemyTemplate {
    pub id: u32,
    pub name: String,
    pub level: i32,
    pub max_health: i32,
    pub soft_def: i32,
    pub hard_def: i32,
    pub exp: u32,
    pub wander_radius: f32,
    pub respawn_ms: u64,
    pub drops: Vec<DropEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WanderState {
    Resting { until: u64 },
    Wandering { target: Coordinate },
}

#[derive(Debug, Clone)]
pub struct EnemyEntity {
    pub id: u32,
    pub template_id: u32,
    pub name: String,
    pub level: i32,
    pub health: i32,
    pub max_health: i32,
    pub soft_def: i32,
    pub hard_def: i32,
    pub exp: u32,
    pub spawn: Coordinate,
    pub position: Coordinate,
    pub wander_radius: f32,
    pub wander: WanderState,
    pub last_move_broadcast: Option<u64>,
    pub alive: bool,
    pub engaged_by: BTreeSet<u32>,
    pub drops: Vec<DropEntry>,
    pub respawn_ms: u64,
    pub respawn_at: Option<u64>,
}

impl EnemyEntity {
    pub fn new(id: u32, template: &EnemyTemplate, spawn: Coordinate, first_wander_at: u64) -> Self {
        Self {
            id,
            template_id: template.id,
            name: template.name.clone(),
            level: template.level,
            health: template.max_health,
            max_health: template.max_health,
            soft_def: template.soft_def,
            hard_def: template.hard_def,
            exp: template.exp,
            spawn,
            position: spawn,
            wander_radius: template.wander_radius,
            wander: WanderState::Resting {
                until: first_wander_at,
            },
            last_move_broadcast: None,
            alive: true,
            engaged_by: BTreeSet::new(),
            drops: template.drops.clone(),
            respawn_ms: template.respawn_ms,
            respawn_at: None,
        }
    }

    pub fn take_damage(&mut self, damage: i32) -> i32 {
        self.health = (self.health - damage.max(0)).clamp(0, self.max_health);
        self.health
    }

    /// Marks the enemy dead and hidden until `respawn_at`.
    pub fn kill(&mut self, now: u64) {
        self.alive = false;
        self.health = 0;
        self.engaged_by.clear();
        self.respawn_at = Some(now + self.respawn_ms);
    }

    /// Brings the enemy back at its spawn point with the same identity.
    pub fn revive(&mut self, next_wander_at: u64) {
        self.alive = true;
        self.health = self.max_health;
        self.position = self.spawn;
        self.wander = WanderState::Resting {
            until: next_wander_at,
        };
        self.last_move_broadcast = None;
        self.engaged_by.clear();
        self.respawn_at = None;
    }

    pub fn defender_profile(&self) -> DefenderProfile {
        DefenderProfile {
            soft_def: self.soft_def,
            hard_def: self.hard_def,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Attributes;

    fn template() -> EnemyTemplate {
        EnemyTemplate {
            id: 1,
            name: "Gloop".to_string(),
            level: 1,
            max_health: 50,
            soft_def: 0,
            hard_def: 0,
            exp: 6,
            wander_radius: 300.0,
            respawn_ms: 5_000,
            drops: vec![],
        }
    }

    #[test]
    fn test_player_creation_fills_pools() {
        let player = PlayerEntity::new(1, "Ayla", 7, BaseStats::default(), Loadout::default());
        assert_eq!(player.max_health, 100 + 8 + 10);
        assert_eq!(player.health, player.max_health);
        assert_eq!(player.mana, player.max_mana);
        assert_eq!(player.weapon, WeaponProfile::default());
        assert!(player.alive);
    }

    #[test]
    fn test_player_damage_clamps_at_zero() {
        let mut player = PlayerEntity::new(1, "Ayla", 7, BaseStats::default(), Loadout::default());
        assert_eq!(player.take_damage(30), player.max_health - 30);
        assert_eq!(player.take_damage(10_000), 0);
        assert_eq!(player.take_damage(-5), 0);
    }

    #[test]
    fn test_recompute_clamps_health_to_new_max() {
        let mut base = BaseStats::default();
        base.attributes.vitality = 20;
        let mut player = PlayerEntity::new(1, "Ayla", 7, base, Loadout::default());
        let before = player.max_health;

        player.base.attributes.vitality = 1;
        player.recompute();

        assert!(player.max_health < before);
        assert_eq!(player.health, player.max_health);
    }

    #[test]
    fn test_loadout_aggregation() {
        let dagger = ItemRecord::weapon(1, 3001, "Rustic Shiv", 10, 150.0, 5);
        let mut armor = ItemRecord::armor(2, 4001, "Quilted Vest", EquipSlot::Armor, 4);
        armor.bonuses.attributes = Attributes {
            vitality: 2,
            ..Attributes::default()
        };
        armor.bonuses.max_hp = 20;
        let shield = ItemRecord::armor(3, 4501, "Buckler", EquipSlot::Shield, 3);

        let loadout = Loadout::from_items(vec![dagger, armor, shield]);

        assert_eq!(loadout.len(), 3);
        assert_eq!(loadout.hard_defense(), 7);
        assert_eq!(loadout.bonuses().attributes.vitality, 2);
        assert_eq!(loadout.bonuses().max_hp, 20);
        assert_eq!(
            loadout.weapon(),
            WeaponProfile {
                attack: 10,
                range: 150.0,
                aspd_modifier: 5
            }
        );
    }

    #[test]
    fn test_loadout_equip_replaces_slot() {
        let mut loadout = Loadout::default();
        assert!(loadout.equip(ItemRecord::weapon(1, 3001, "Rustic Shiv", 10, 150.0, 5)).is_none());
        let displaced = loadout.equip(ItemRecord::weapon(2, 3004, "Iron Cleaver", 25, 150.0, 0));

        assert_eq!(displaced.map(|item| item.inventory_id), Some(1));
        assert!(loadout.contains(2));
        assert!(!loadout.contains(1));
        assert_eq!(loadout.unequip(2).map(|item| item.item_id), Some(3004));
        assert!(loadout.is_empty());
    }

    #[test]
    fn test_equipment_changes_player_stats() {
        let base = BaseStats::default();
        let mut bow = ItemRecord::weapon(1, 3101, "Hunter Bow", 30, 800.0, -3);
        bow.bonuses.attributes.dexterity = 5;
        let naked = PlayerEntity::new(1, "Ayla", 7, base, Loadout::default());
        let armed = PlayerEntity::new(1, "Ayla", 7, base, Loadout::from_items(vec![bow]));

        assert_eq!(armed.weapon.range, 800.0);
        assert_eq!(armed.attacker_profile().weapon_atk, 30);
        assert_eq!(armed.aspd, final_aspd(armed.derived.aspd, -3));
        assert!(armed.derived.hit > naked.derived.hit);
        assert_eq!(armed.base, naked.base);
    }

    #[test]
    fn test_enemy_kill_and_revive_keep_identity() {
        let spawn = Coordinate::new(100.0, 100.0, 0.0);
        let mut enemy = EnemyEntity::new(42, &template(), spawn, 0);
        enemy.position = Coordinate::new(150.0, 120.0, 0.0);
        enemy.engaged_by.insert(3);

        enemy.kill(1_000);
        assert!(!enemy.alive);
        assert!(enemy.engaged_by.is_empty());
        assert_eq!(enemy.respawn_at, Some(6_000));

        enemy.revive(9_000);
        assert_eq!(enemy.id, 42);
        assert!(enemy.alive);
        assert_eq!(enemy.health, enemy.max_health);
        assert_eq!(enemy.position, spawn);
        assert_eq!(enemy.wander, WanderState::Resting { until: 9_000 });
    }

    #[test]
    fn test_enemy_damage_clamps() {
        let mut enemy = EnemyEntity::new(1, &template(), Coordinate::default(), 0);
        assert_eq!(enemy.take_damage(20), 30);
        assert_eq!(enemy.take_damage(100), 0);
    }
}
