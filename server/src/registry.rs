//! Authoritative store of every live player and enemy.
//!
//! The registry is owned by the world and mutated only from the simulation
//! task, so it needs no interior locking. Players are keyed by character id;
//! enemies by a server-assigned id that survives death and respawn.

use crate::entity::{EnemyEntity, EnemyTemplate, PlayerEntity};
use crate::events::ConnectionId;
use log::info;
use shared::{AttackTarget, Coordinate};
use std::collections::{BTreeMap, HashMap};

/// Liveness of an attack target as the registry sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetStatus {
    Alive,
    Dead,
    Missing,
}

#[derive(Debug, Default)]
pub struct EntityRegistry {
    players: HashMap<u32, PlayerEntity>,
    enemies: BTreeMap<u32, EnemyEntity>,
    next_enemy_id: u32,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self {
            players: HashMap::new(),
            enemies: BTreeMap::new(),
            next_enemy_id: 1,
        }
    }

    /// Inserts a player, replacing any previous entry for the same character.
    /// Returns the replaced entry.
    pub fn insert_player(&mut self, player: PlayerEntity) -> Option<PlayerEntity> {
        info!(
            "Registered player {} ({}) on connection {}",
            player.name, player.id, player.connection
        );
        self.players.insert(player.id, player)
    }

    pub fn remove_player(&mut self, character_id: u32) -> Option<PlayerEntity> {
        let removed = self.players.remove(&character_id);
        if let Some(player) = &removed {
            info!("Removed player {} ({})", player.name, player.id);
        }
        removed
    }

    pub fn player(&self, character_id: u32) -> Option<&PlayerEntity> {
        self.players.get(&character_id)
    }

    pub fn player_mut(&mut self, character_id: u32) -> Option<&mut PlayerEntity> {
        self.players.get_mut(&character_id)
    }

    pub fn player_by_connection(&self, connection: ConnectionId) -> Option<&PlayerEntity> {
        self.players.values().find(|player| player.connection == connection)
    }

    pub fn connection_of(&self, character_id: u32) -> Option<ConnectionId> {
        self.players.get(&character_id).map(|player| player.connection)
    }

    pub fn players(&self) -> impl Iterator<Item = &PlayerEntity> {
        self.players.values()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Places a fresh enemy from a template and returns its id.
    pub fn spawn_enemy(
        &mut self,
        template: &EnemyTemplate,
        at: Coordinate,
        first_wander_at: u64,
    ) -> u32 {
        let id = self.next_enemy_id;
        self.next_enemy_id += 1;
        self.enemies.insert(id, EnemyEntity::new(id, template, at, first_wander_at));
        id
    }

    pub fn enemy(&self, enemy_id: u32) -> Option<&EnemyEntity> {
        self.enemies.get(&enemy_id)
    }

    pub fn enemy_mut(&mut self, enemy_id: u32) -> Option<&mut EnemyEntity> {
        self.enemies.get_mut(&enemy_id)
    }

    /// Enemies in ascending id order.
    pub fn enemies(&self) -> impl Iterator<Item = &EnemyEntity> {
        self.enemies.values()
    }

    pub fn enemies_mut(&mut self) -> impl Iterator<Item = &mut EnemyEntity> {
        self.enemies.values_mut()
    }

    pub fn enemy_count(&self) -> usize {
        self.enemies.len()
    }

    pub fn target_status(&self, target: AttackTarget) -> TargetStatus {
        let alive = match target {
            AttackTarget::Player(id) => self.players.get(&id).map(|player| player.alive),
            AttackTarget::Enemy(id) => self.enemies.get(&id).map(|enemy| enemy.alive),
        };
        match alive {
            Some(true) => TargetStatus::Alive,
            Some(false) => TargetStatus::Dead,
            None => TargetStatus::Missing,
        }
    }

    /// Current and maximum health of a target.
    pub fn target_health(&self, target: AttackTarget) -> Option<(i32, i32)> {
        match target {
            AttackTarget::Player(id) => self.players.get(&id).map(|p| (p.health, p.max_health)),
            AttackTarget::Enemy(id) => self.enemies.get(&id).map(|e| (e.health, e.max_health)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Loadout;
    use shared::BaseStats;

    fn player(id: u32, connection: ConnectionId) -> PlayerEntity {
        PlayerEntity::new(
            id,
            &format!("Player{}", id),
            connection,
            BaseStats::default(),
            Loadout::default(),
        )
    }

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
    fn test_registry_creation() {
        let registry = EntityRegistry::new();
        assert_eq!(registry.player_count(), 0);
        assert_eq!(registry.enemy_count(), 0);
    }

    #[test]
    fn test_insert_and_lookup_player() {
        let mut registry = EntityRegistry::new();
        assert!(registry.insert_player(player(10, 1)).is_none());
        assert!(registry.insert_player(player(11, 2)).is_none());

        assert_eq!(registry.player_count(), 2);
        assert_eq!(registry.player(10).map(|p| p.connection), Some(1));
        assert_eq!(registry.player_by_connection(2).map(|p| p.id), Some(11));
        assert_eq!(registry.connection_of(11), Some(2));
        assert!(registry.player_by_connection(3).is_none());
    }

    #[test]
    fn test_reinsert_replaces_player() {
        let mut registry = EntityRegistry::new();
        registry.insert_player(player(10, 1));
        let replaced = registry.insert_player(player(10, 5));

        assert_eq!(replaced.map(|p| p.connection), Some(1));
        assert_eq!(registry.player_count(), 1);
        assert_eq!(registry.connection_of(10), Some(5));
    }

    #[test]
    fn test_remove_player() {
        let mut registry = EntityRegistry::new();
        registry.insert_player(player(10, 1));

        assert!(registry.remove_player(10).is_some());
        assert!(registry.remove_player(10).is_none());
        assert_eq!(registry.player_count(), 0);
    }

    #[test]
    fn test_spawn_enemy_assigns_sequential_ids() {
        let mut registry = EntityRegistry::new();
        let first = registry.spawn_enemy(&template(), Coordinate::default(), 0);
        let second = registry.spawn_enemy(&template(), Coordinate::new(500.0, 0.0, 0.0), 0);

        assert_eq!((first, second), (1, 2));
        let ids: Vec<u32> = registry.enemies().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_target_status() {
        let mut registry = EntityRegistry::new();
        registry.insert_player(player(10, 1));
        let enemy = registry.spawn_enemy(&template(), Coordinate::default(), 0);

        assert_eq!(registry.target_status(AttackTarget::Player(10)), TargetStatus::Alive);
        assert_eq!(registry.target_status(AttackTarget::Enemy(enemy)), TargetStatus::Alive);
        assert_eq!(registry.target_status(AttackTarget::Player(99)), TargetStatus::Missing);

        if let Some(e) = registry.enemy_mut(enemy) {
            e.kill(0);
        }
        assert_eq!(registry.target_status(AttackTarget::Enemy(enemy)), TargetStatus::Dead);
        assert_eq!(registry.target_health(AttackTarget::Enemy(enemy)), Some((0, 50)));
    }
}
