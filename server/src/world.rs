//! The single owner of simulation state.
//!
//! [`World`] holds the entity registry, the auto-attack coordinator, the
//! collaborators and the random source. Every intent and both periodic ticks
//! go through `&mut World`, so nothing inside needs a lock. Handlers return an
//! [`Outbox`]; they never talk to the network.
//!
//! Combat lives in `combat.rs` and enemy behaviour in `ai.rs`, both as further
//! `impl World` blocks.

use crate::auto_attack::AutoAttackCoordinator;
use crate::cache::PositionCache;
use crate::config::SimulationConfig;
use crate::entity::{EnemyTemplate, Loadout, PlayerEntity};
use crate::error::{CoreError, CoreResult, Missing, ValidationError};
use crate::events::{ConnectionId, Outbox};
use crate::persistence::{PersistCommand, PersistHandle, PersistenceStore};
use crate::registry::EntityRegistry;
use crate::spawns::SpawnPoint;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{
    AttackTarget, ChatChannel, ClientIntent, Coordinate, LostReason, ServerEvent, StatKind,
    MAX_BASE_ATTRIBUTE, WANDER_PAUSE_MAX_MS, WANDER_PAUSE_MIN_MS,
};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::sync::Arc;

pub struct World {
    pub(crate) registry: EntityRegistry,
    pub(crate) attacks: AutoAttackCoordinator,
    pub(crate) cache: Arc<dyn PositionCache>,
    pub(crate) store: Arc<dyn PersistenceStore>,
    pub(crate) persist: PersistHandle,
    pub(crate) rng: StdRng,
    pub(crate) config: SimulationConfig,
    templates: HashMap<u32, EnemyTemplate>,
}

impl World {
    pub fn new(
        config: SimulationConfig,
        cache: Arc<dyn PositionCache>,
        store: Arc<dyn PersistenceStore>,
        persist: PersistHandle,
    ) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            registry: EntityRegistry::new(),
            attacks: AutoAttackCoordinator::new(),
            cache,
            store,
            persist,
            rng,
            config,
            templates: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn attacks(&self) -> &AutoAttackCoordinator {
        &self.attacks
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn add_template(&mut self, template: EnemyTemplate) {
        self.templates.insert(template.id, template);
    }

    /// Places one enemy of a known template. Returns `None` for an unknown
    /// template id.
    pub fn spawn_enemy(&mut self, template_id: u32, at: Coordinate, now: u64) -> Option<u32> {
        let Some(template) = self.templates.get(&template_id) else {
            warn!("Cannot spawn unknown enemy template {}", template_id);
            return None;
        };
        let first_wander_at = now + self.rng.gen_range(WANDER_PAUSE_MIN_MS..=WANDER_PAUSE_MAX_MS);
        let id = self.registry.spawn_enemy(template, at, first_wander_at);
        debug!("Spawned {} ({}) at ({}, {})", template.name, id, at.x, at.y);
        Some(id)
    }

    /// Registers the templates and fills the map from a spawn table.
    pub fn populate(&mut self, templates: Vec<EnemyTemplate>, points: &[SpawnPoint], now: u64) {
        for template in templates {
            self.add_template(template);
        }
        let spawned = points
            .iter()
            .filter_map(|point| self.spawn_enemy(point.template_id, point.position, now))
            .count();
        info!("Populated world with {} enemies", spawned);
    }

    /// Runs one intent and maps any failure to its outward behaviour:
    /// validation errors become a unicast `Error`, everything else is logged.
    pub fn handle_intent(
        &mut self,
        connection: ConnectionId,
        intent: ClientIntent,
        now: u64,
    ) -> Outbox {
        let mut out = Outbox::new();
        let character_id = intent.character_id();

        if let Err(e) = self.dispatch(connection, intent, now, &mut out) {
            match e {
                CoreError::Validation(reason) => {
                    info!("Rejected intent from character {}: {}", character_id, reason);
                    out.unicast(
                        connection,
                        ServerEvent::Error {
                            message: reason.to_string(),
                        },
                    );
                }
                CoreError::NotFound(missing) => {
                    debug!("Dropped intent from connection {}: {} not found", connection, missing);
                }
                CoreError::Cache(e) => {
                    warn!("Intent from character {} hit a cache error: {}", character_id, e)
                }
                CoreError::Store(e) => {
                    warn!("Intent from character {} hit a store error: {}", character_id, e)
                }
            }
        }
        out
    }

    fn dispatch(
        &mut self,
        connection: ConnectionId,
        intent: ClientIntent,
        now: u64,
        out: &mut Outbox,
    ) -> CoreResult<()> {
        match intent {
            ClientIntent::Join {
                character_id,
                display_name,
            } => self.join(connection, character_id, &display_name, out),
            ClientIntent::Position { character_id, x, y, z } => {
                self.ensure_bound(connection, character_id)?;
                self.update_position(character_id, Coordinate::new(x, y, z), out)
            }
            ClientIntent::Attack { attacker_id, target } => {
                self.ensure_bound(connection, attacker_id)?;
                self.start_attack(attacker_id, target, now, out)
            }
            ClientIntent::StopAttack { attacker_id } => {
                self.ensure_bound(connection, attacker_id)?;
                self.stop_attack(attacker_id, out)
            }
            ClientIntent::Respawn { character_id } => {
                self.ensure_bound(connection, character_id)?;
                self.respawn_player(character_id, out)
            }
            ClientIntent::AllocateStat {
                character_id,
                stat,
                amount,
            } => {
                self.ensure_bound(connection, character_id)?;
                self.allocate_stat(character_id, &stat, amount, out)
            }
            ClientIntent::Equip {
                character_id,
                inventory_id,
                equip,
            } => {
                self.ensure_bound(connection, character_id)?;
                self.set_equipped(character_id, inventory_id, equip, out)
            }
            ClientIntent::Chat {
                character_id,
                message,
            } => {
                self.ensure_bound(connection, character_id)?;
                self.chat(character_id, &message, out)
            }
        }
    }

    /// A connection may only act for the character it joined as.
    fn ensure_bound(&self, connection: ConnectionId, character_id: u32) -> CoreResult<()> {
        match self.registry.connection_of(character_id) {
            Some(bound) if bound == connection => Ok(()),
            _ => Err(CoreError::NotFound(Missing::Character(character_id))),
        }
    }

    /// Hydrates a character and binds it to `connection`. A connection holds
    /// at most one character and a character at most one connection, so any
    /// earlier binding on either side is left first.
    pub fn join(
        &mut self,
        connection: ConnectionId,
        character_id: u32,
        display_name: &str,
        out: &mut Outbox,
    ) -> CoreResult<()> {
        let previous = self
            .registry
            .player_by_connection(connection)
            .map(|player| player.id)
            .filter(|&id| id != character_id);
        if let Some(previous) = previous {
            info!(
                "Connection {} switched from character {} to {}",
                connection, previous, character_id
            );
            self.leave(previous, out);
        }
        if self.registry.player(character_id).is_some() {
            info!("Character {} joined again, replacing the previous session", character_id);
            self.leave(character_id, out);
        }

        let record = match self.store.load_character(character_id) {
            Ok(record) => record,
            Err(e) => {
                warn!("Could not load character {}, using defaults: {}", character_id, e);
                None
            }
        };
        let equipped = match self.store.load_equipment_bonuses(character_id) {
            Ok(items) => items,
            Err(e) => {
                warn!("Could not load equipment of character {}: {}", character_id, e);
                Vec::new()
            }
        };

        let base = record.as_ref().map(|r| r.base).unwrap_or_default();
        let loadout = Loadout::from_items(equipped);
        let mut player = PlayerEntity::new(character_id, display_name, connection, base, loadout);
        let position = match &record {
            Some(record) => {
                player.set_health(record.health);
                player.set_mana(record.mana);
                player.alive = player.health > 0;
                record.position
            }
            None => self.config.spawn_point,
        };

        if let Err(e) = self.cache.set(character_id, position, self.config.position_ttl) {
            warn!("Could not cache join position of character {}: {}", character_id, e);
        }

        out.unicast(connection, ServerEvent::Joined { character_id });
        out.unicast(connection, health_update(&player));
        out.unicast(connection, stats_event(&player));
        out.broadcast_except(connection, health_update(&player));
        out.broadcast_except(
            connection,
            ServerEvent::PlayerMoved {
                character_id,
                display_name: player.name.clone(),
                x: position.x,
                y: position.y,
                z: position.z,
            },
        );

        for other in self.registry.players() {
            out.unicast(connection, health_update(other));
        }
        for enemy in self.registry.enemies().filter(|enemy| enemy.alive) {
            out.unicast(
                connection,
                ServerEvent::EnemySpawn {
                    enemy_id: enemy.id,
                    template_id: enemy.template_id,
                    name: enemy.name.clone(),
                    level: enemy.level,
                    health: enemy.health,
                    max_health: enemy.max_health,
                    x: enemy.position.x,
                    y: enemy.position.y,
                    z: enemy.position.z,
                },
            );
        }

        self.registry.insert_player(player);
        Ok(())
    }

    pub fn update_position(
        &mut self,
        character_id: u32,
        position: Coordinate,
        out: &mut Outbox,
    ) -> CoreResult<()> {
        let player = self
            .registry
            .player(character_id)
            .ok_or(CoreError::NotFound(Missing::Character(character_id)))?;

        self.cache.set(character_id, position, self.config.position_ttl)?;
        out.broadcast_except(
            player.connection,
            ServerEvent::PlayerMoved {
                character_id,
                display_name: player.name.clone(),
                x: position.x,
                y: position.y,
                z: position.z,
            },
        );
        Ok(())
    }

    pub fn respawn_player(&mut self, character_id: u32, out: &mut Outbox) -> CoreResult<()> {
        let spawn = self.config.spawn_point;
        let player = self
            .registry
            .player_mut(character_id)
            .ok_or(CoreError::NotFound(Missing::Character(character_id)))?;
        if player.alive {
            return Err(ValidationError::NotDead.into());
        }

        player.restore();
        player.last_attack_at = None;
        let (health, mana) = (player.health, player.mana);
        let (max_health, max_mana) = (player.max_health, player.max_mana);
        info!("Player {} ({}) respawned", player.name, character_id);

        if let Err(e) = self.cache.set(character_id, spawn, self.config.position_ttl) {
            warn!("Could not cache respawn position of character {}: {}", character_id, e);
        }
        self.persist.submit(PersistCommand::SaveHealthMana {
            character_id,
            health,
            mana,
        });
        out.broadcast(ServerEvent::Respawned {
            character_id,
            health,
            max_health,
            mana,
            max_mana,
            x: spawn.x,
            y: spawn.y,
            z: spawn.z,
        });
        Ok(())
    }

    pub fn allocate_stat(
        &mut self,
        character_id: u32,
        stat: &str,
        amount: i32,
        out: &mut Outbox,
    ) -> CoreResult<()> {
        let kind =
            StatKind::from_str(stat).map_err(|_| ValidationError::UnknownStat(stat.to_string()))?;
        if amount <= 0 {
            return Err(ValidationError::InvalidAmount(amount).into());
        }

        let player = self
            .registry
            .player_mut(character_id)
            .ok_or(CoreError::NotFound(Missing::Character(character_id)))?;

        let available = player.base.stat_points;
        if available < amount {
            return Err(ValidationError::InsufficientStatPoints {
                available,
                required: amount,
            }
            .into());
        }
        if player.base.attributes.get(kind) + amount > MAX_BASE_ATTRIBUTE {
            return Err(ValidationError::AttributeCapped {
                stat: kind,
                max: MAX_BASE_ATTRIBUTE,
            }
            .into());
        }

        *player.base.attributes.get_mut(kind) += amount;
        player.base.stat_points -= amount;
        player.recompute();
        info!(
            "Player {} ({}) raised {} by {}, {} points left",
            player.name, character_id, kind, amount, player.base.stat_points
        );

        let base = player.base;
        self.persist.submit(PersistCommand::SaveStats { character_id, base });
        self.emit_stat_change(character_id, out);
        Ok(())
    }

    pub fn set_equipped(
        &mut self,
        character_id: u32,
        inventory_id: u32,
        equip: bool,
        out: &mut Outbox,
    ) -> CoreResult<()> {
        let player = self
            .registry
            .player(character_id)
            .ok_or(CoreError::NotFound(Missing::Character(character_id)))?;

        if equip {
            let item = self
                .store
                .load_inventory_item(character_id, inventory_id)?
                .ok_or(ValidationError::UnknownItem)?;
            if item.slot.is_none() {
                return Err(ValidationError::NotEquippable.into());
            }
            if player.base.level < item.required_level {
                return Err(ValidationError::LevelRequirement {
                    required: item.required_level,
                    current: player.base.level,
                }
                .into());
            }

            let player = self
                .registry
                .player_mut(character_id)
                .ok_or(CoreError::NotFound(Missing::Character(character_id)))?;
            info!("Player {} ({}) equipped {}", player.name, character_id, item.name);
            if let Some(displaced) = player.loadout.equip(item) {
                debug!("{} went back to the inventory of {}", displaced.name, character_id);
            }
            player.recompute();
        } else {
            if !player.loadout.contains(inventory_id) {
                return Err(ValidationError::NotEquipped.into());
            }
            let player = self
                .registry
                .player_mut(character_id)
                .ok_or(CoreError::NotFound(Missing::Character(character_id)))?;
            if let Some(item) = player.loadout.unequip(inventory_id) {
                info!("Player {} ({}) unequipped {}", player.name, character_id, item.name);
            }
            player.recompute();
        }

        self.persist.submit(PersistCommand::SetEquipped {
            character_id,
            inventory_id,
            equipped: equip,
        });
        self.emit_stat_change(character_id, out);
        Ok(())
    }

    /// Relays a trimmed message to everyone on the global channel. Blank
    /// messages are dropped without a reply.
    pub fn chat(&self, character_id: u32, message: &str, out: &mut Outbox) -> CoreResult<()> {
        let player = self
            .registry
            .player(character_id)
            .ok_or(CoreError::NotFound(Missing::Character(character_id)))?;

        let message = message.trim();
        if message.is_empty() {
            return Ok(());
        }
        info!("[chat] {}: {}", player.name, message);
        out.broadcast(ServerEvent::ChatMessage {
            channel: ChatChannel::Global,
            sender_id: Some(character_id),
            sender_name: player.name.clone(),
            message: message.to_string(),
        });
        Ok(())
    }

    /// Drops whichever character is bound to `connection`.
    pub fn disconnect(&mut self, connection: ConnectionId) -> Outbox {
        let mut out = Outbox::new();
        match self.registry.player_by_connection(connection).map(|player| player.id) {
            Some(character_id) => self.leave(character_id, &mut out),
            None => debug!("Connection {} left without a character", connection),
        }
        out
    }

    /// Removes a player from the simulation and notifies everyone affected.
    pub fn leave(&mut self, character_id: u32, out: &mut Outbox) {
        self.release_attacker(character_id);
        let target = AttackTarget::Player(character_id);
        for attacker in self.release_target(target) {
            if let Some(connection) = self.registry.connection_of(attacker) {
                out.unicast(
                    connection,
                    ServerEvent::TargetLost {
                        target_id: character_id,
                        target_kind: target.kind(),
                        reason: LostReason::Disconnected,
                    },
                );
            }
        }

        let Some(player) = self.registry.remove_player(character_id) else {
            return;
        };
        self.persist.submit(PersistCommand::SaveHealthMana {
            character_id,
            health: player.health,
            mana: player.mana,
        });
        self.persist.submit(PersistCommand::SaveStats {
            character_id,
            base: player.base,
        });
        if let Err(e) = self.cache.remove(character_id) {
            warn!("Could not drop cached position of character {}: {}", character_id, e);
        }
        out.broadcast_except(
            player.connection,
            ServerEvent::PlayerLeft {
                character_id,
                display_name: player.name,
            },
        );
    }

    fn emit_stat_change(&self, character_id: u32, out: &mut Outbox) {
        if let Some(player) = self.registry.player(character_id) {
            out.unicast(player.connection, stats_event(player));
            out.broadcast(health_update(player));
        }
    }

    /// Enemies whose engaged set disagrees with the live auto-attack entries,
    /// paired with the set the entries imply.
    pub fn engagement_mismatches(&self) -> Vec<(u32, Vec<u32>)> {
        let mut live: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
        for (attacker, entry) in self.attacks.iter() {
            if let AttackTarget::Enemy(enemy_id) = entry.target {
                live.entry(enemy_id).or_default().push(attacker);
            }
        }

        self.registry
            .enemies()
            .filter_map(|enemy| {
                let mut expected = live.remove(&enemy.id).unwrap_or_default();
                expected.sort_unstable();
                let recorded: Vec<u32> = enemy.engaged_by.iter().copied().collect();
                (recorded != expected).then_some((enemy.id, expected))
            })
            .collect()
    }
}

pub(crate) fn health_update(player: &PlayerEntity) -> ServerEvent {
    ServerEvent::HealthUpdate {
        character_id: player.id,
        health: player.health,
        max_health: player.max_health,
        mana: player.mana,
        max_mana: player.max_mana,
    }
}

fn stats_event(player: &PlayerEntity) -> ServerEvent {
    ServerEvent::Stats {
        character_id: player.id,
        base: player.base,
        derived: player.derived,
    }
}
