//! Auto-attack handlers and the combat tick.
//!
//! `start_attack` and `stop_attack` only move an attacker between Idle and
//! Engaged. `combat_tick` walks every slot once per period and resolves the
//! ones whose attack interval has elapsed.
//!
//! A kill is announced exactly once: every slot on the victim is released
//! silently and a single `Death` broadcast replaces any per-attacker
//! `TargetLost`. It is followed by a system line on the combat chat channel.

use crate::auto_attack::{AutoAttackEntry, Engagement};
use crate::damage::{resolve_damage, DamageRolls};
use crate::entity::DropEntry;
use crate::error::{CoreError, CoreResult, Missing, ValidationError};
use crate::events::Outbox;
use crate::persistence::PersistCommand;
use crate::registry::TargetStatus;
use crate::world::{health_update, World};
use log::{debug, info, warn};
use rand::Rng;
use shared::{
    attack_interval_ms, AttackTarget, ChatChannel, Coordinate, LootDrop, LostReason, ServerEvent,
    StopReason, SYSTEM_SENDER_NAME,
};
use std::collections::HashMap;

/// Cached player positions for one tick. A player whose lookup failed is
/// absent; a cache miss is `Some(None)`.
type PositionSnapshot = HashMap<u32, Option<Coordinate>>;

impl World {
    pub fn start_attack(
        &mut self,
        attacker_id: u32,
        target: AttackTarget,
        now: u64,
        out: &mut Outbox,
    ) -> CoreResult<()> {
        let attacker = self
            .registry
            .player(attacker_id)
            .ok_or(CoreError::NotFound(Missing::Character(attacker_id)))?;
        if !attacker.alive {
            return Err(ValidationError::AttackerDead.into());
        }
        if target == AttackTarget::Player(attacker_id) {
            return Err(ValidationError::SelfTarget.into());
        }
        match self.registry.target_status(target) {
            TargetStatus::Missing => return Err(ValidationError::UnknownTarget.into()),
            TargetStatus::Dead => return Err(ValidationError::TargetDead.into()),
            TargetStatus::Alive => {}
        }

        let connection = attacker.connection;
        let attack_range = attacker.weapon.range;
        let aspd = attacker.aspd;

        if let Engagement::Switched { previous } = self.engage(attacker_id, target, now) {
            info!("Player {} switched from {} to {}", attacker_id, previous.target, target);
            out.unicast(
                connection,
                ServerEvent::AutoAttackStopped {
                    reason: StopReason::Switched,
                    old_target_id: Some(previous.target.id()),
                    old_target_kind: Some(previous.target.kind()),
                },
            );
        } else {
            info!("Player {} started attacking {}", attacker_id, target);
        }

        if let Some(enemy_id) = enemy_id(target) {
            self.halt_wander(enemy_id, now, out);
        }

        out.unicast(
            connection,
            ServerEvent::AutoAttackStarted {
                target_id: target.id(),
                target_kind: target.kind(),
                attack_range,
                aspd,
                interval_ms: attack_interval_ms(aspd),
            },
        );
        Ok(())
    }

    /// Idempotent: stopping while Idle succeeds silently.
    pub fn stop_attack(&mut self, attacker_id: u32, out: &mut Outbox) -> CoreResult<()> {
        let connection = self
            .registry
            .connection_of(attacker_id)
            .ok_or(CoreError::NotFound(Missing::Character(attacker_id)))?;

        if let Some(previous) = self.release_attacker(attacker_id) {
            info!("Player {} stopped attacking {}", attacker_id, previous.target);
            out.unicast(
                connection,
                ServerEvent::AutoAttackStopped {
                    reason: StopReason::Stopped,
                    old_target_id: Some(previous.target.id()),
                    old_target_kind: Some(previous.target.kind()),
                },
            );
        }
        Ok(())
    }

    /// One pass over every auto-attack slot.
    pub fn combat_tick(&mut self, now: u64) -> Outbox {
        let mut out = Outbox::new();
        let attackers = self.attacks.attacker_ids();
        if attackers.is_empty() {
            return out;
        }

        let positions = self.prefetch_positions(&attackers);
        for attacker_id in attackers {
            self.resolve_entry(attacker_id, now, &positions, &mut out);
        }
        out
    }

    fn prefetch_positions(&self, attackers: &[u32]) -> PositionSnapshot {
        let mut wanted: Vec<u32> = attackers.to_vec();
        wanted.extend(self.attacks.iter().filter_map(|(_, entry)| match entry.target {
            AttackTarget::Player(id) => Some(id),
            AttackTarget::Enemy(_) => None,
        }));
        wanted.sort_unstable();
        wanted.dedup();

        let mut positions = PositionSnapshot::with_capacity(wanted.len());
        for character_id in wanted {
            match self.cache.get(character_id) {
                Ok(position) => {
                    positions.insert(character_id, position);
                }
                Err(e) => warn!("Skipping character {} this tick: {}", character_id, e),
            }
        }
        positions
    }

    fn resolve_entry(
        &mut self,
        attacker_id: u32,
        now: u64,
        positions: &PositionSnapshot,
        out: &mut Outbox,
    ) {
        // Released earlier in this pass, e.g. by a kill.
        let Some(entry) = self.attacks.entry(attacker_id).copied() else {
            return;
        };
        let target = entry.target;

        let Some(attacker) = self.registry.player(attacker_id) else {
            debug!("Attacker {} vanished, dropping its slot", attacker_id);
            self.release_attacker(attacker_id);
            return;
        };
        let connection = attacker.connection;

        if !attacker.alive {
            self.release_attacker(attacker_id);
            out.unicast(
                connection,
                ServerEvent::AutoAttackStopped {
                    reason: StopReason::Died,
                    old_target_id: Some(target.id()),
                    old_target_kind: Some(target.kind()),
                },
            );
            return;
        }

        let lost = match self.registry.target_status(target) {
            TargetStatus::Alive => None,
            TargetStatus::Dead => Some(LostReason::Died),
            TargetStatus::Missing => Some(LostReason::Missing),
        };
        if let Some(reason) = lost {
            debug!("Player {} lost {} ({:?})", attacker_id, target, reason);
            self.release_attacker(attacker_id);
            out.unicast(
                connection,
                ServerEvent::TargetLost {
                    target_id: target.id(),
                    target_kind: target.kind(),
                    reason,
                },
            );
            return;
        }

        let interval = attack_interval_ms(attacker.aspd);
        if let Some(last) = attacker.last_attack_at {
            if now.saturating_sub(last) < interval {
                return;
            }
        }

        let Some(attacker_position) = snapshot_position(positions, attacker_id) else {
            return;
        };
        let target_position = match target {
            AttackTarget::Player(id) => snapshot_position(positions, id),
            AttackTarget::Enemy(id) => self.registry.enemy(id).map(|enemy| enemy.position),
        };
        let Some(target_position) = target_position else {
            return;
        };

        let range = attacker.weapon.range;
        if attacker_position.planar_distance(&target_position) > range {
            out.unicast(
                connection,
                ServerEvent::OutOfRange {
                    target_id: target.id(),
                    target_kind: target.kind(),
                    target_x: target_position.x,
                    target_y: target_position.y,
                    target_z: target_position.z,
                    required_range: (range - self.config.range_tolerance).max(0.0),
                },
            );
            return;
        }

        self.land_hit(attacker_id, target, now, out);
    }

    fn land_hit(&mut self, attacker_id: u32, target: AttackTarget, now: u64, out: &mut Outbox) {
        let Some(attacker) = self.registry.player_mut(attacker_id) else {
            return;
        };
        attacker.last_attack_at = Some(now);
        let profile = attacker.attacker_profile();

        let defender = match target {
            AttackTarget::Player(id) => self.registry.player(id).map(|p| p.defender_profile()),
            AttackTarget::Enemy(id) => self.registry.enemy(id).map(|e| e.defender_profile()),
        };
        let Some(defender) = defender else {
            return;
        };

        let outcome = resolve_damage(&profile, &defender, DamageRolls::sample(&mut self.rng));

        let remaining = match target {
            AttackTarget::Player(id) => {
                self.registry.player_mut(id).map(|p| p.take_damage(outcome.damage))
            }
            AttackTarget::Enemy(id) => {
                self.registry.enemy_mut(id).map(|e| e.take_damage(outcome.damage))
            }
        };
        let Some((health, max_health)) = remaining.and(self.registry.target_health(target)) else {
            return;
        };

        info!(
            "Player {} hit {} for {}{} ({}/{})",
            attacker_id,
            target,
            outcome.damage,
            if outcome.is_critical { " (critical)" } else { "" },
            health,
            max_health
        );
        out.broadcast(ServerEvent::Damage {
            attacker_id,
            target_id: target.id(),
            target_kind: target.kind(),
            damage: outcome.damage,
            is_critical: outcome.is_critical,
            target_health: health,
            target_max_health: max_health,
        });
        match target {
            AttackTarget::Enemy(enemy_id) => out.broadcast(ServerEvent::EnemyHealthUpdate {
                enemy_id,
                health,
                max_health,
            }),
            AttackTarget::Player(id) => {
                if let Some(victim) = self.registry.player(id) {
                    out.broadcast(health_update(victim));
                }
            }
        }

        if health == 0 {
            self.resolve_kill(attacker_id, target, now, out);
        }
    }

    fn resolve_kill(&mut self, killer_id: u32, target: AttackTarget, now: u64, out: &mut Outbox) {
        let released = self.release_target(target);

        match target {
            AttackTarget::Enemy(enemy_id) => {
                let Some(enemy) = self.registry.enemy_mut(enemy_id) else {
                    return;
                };
                enemy.kill(now);
                let loot = roll_loot(&enemy.drops, &mut self.rng);
                let (exp, victim_name) = (enemy.exp, enemy.name.clone());
                info!(
                    "{} ({}) killed by player {}, {} attackers released, {} drops",
                    enemy.name,
                    enemy_id,
                    killer_id,
                    released.len(),
                    loot.len()
                );

                if !loot.is_empty() {
                    self.persist.submit(PersistCommand::GrantLoot {
                        character_id: killer_id,
                        loot: loot.clone(),
                    });
                }
                out.broadcast(ServerEvent::Death {
                    killed_id: enemy_id,
                    killer_id,
                    target_kind: target.kind(),
                    exp,
                    loot,
                });
                self.announce_kill(killer_id, &victim_name, out);
            }
            AttackTarget::Player(victim_id) => {
                let Some(victim) = self.registry.player_mut(victim_id) else {
                    return;
                };
                victim.alive = false;
                victim.set_health(0);
                let (connection, mana) = (victim.connection, victim.mana);
                let victim_name = victim.name.clone();
                info!(
                    "Player {} killed by player {}, {} attackers released",
                    victim_id,
                    killer_id,
                    released.len()
                );

                self.persist.submit(PersistCommand::SaveHealthMana {
                    character_id: victim_id,
                    health: 0,
                    mana,
                });
                out.broadcast(ServerEvent::Death {
                    killed_id: victim_id,
                    killer_id,
                    target_kind: target.kind(),
                    exp: 0,
                    loot: Vec::new(),
                });
                self.announce_kill(killer_id, &victim_name, out);

                if let Some(previous) = self.release_attacker(victim_id) {
                    out.unicast(
                        connection,
                        ServerEvent::AutoAttackStopped {
                            reason: StopReason::Died,
                            old_target_id: Some(previous.target.id()),
                            old_target_kind: Some(previous.target.kind()),
                        },
                    );
                }
            }
        }
    }

    fn announce_kill(&self, killer_id: u32, victim_name: &str, out: &mut Outbox) {
        let killer = self
            .registry
            .player(killer_id)
            .map_or("Someone", |player| player.name.as_str());
        out.broadcast(ServerEvent::ChatMessage {
            channel: ChatChannel::Combat,
            sender_id: None,
            sender_name: SYSTEM_SENDER_NAME.to_string(),
            message: format!("{} has slain {}!", killer, victim_name),
        });
    }

    /// Puts an attacker on a target and keeps the enemy engaged sets in step.
    pub(crate) fn engage(
        &mut self,
        attacker_id: u32,
        target: AttackTarget,
        now: u64,
    ) -> Engagement {
        let engagement = self.attacks.engage(attacker_id, target, now);
        if let Engagement::Switched { previous } = engagement {
            self.unmark_engaged(attacker_id, previous.target);
        }
        if let Some(enemy) = enemy_id(target).and_then(|id| self.registry.enemy_mut(id)) {
            enemy.engaged_by.insert(attacker_id);
        }
        engagement
    }

    /// Returns an attacker to Idle. No event is emitted here.
    pub(crate) fn release_attacker(&mut self, attacker_id: u32) -> Option<AutoAttackEntry> {
        let entry = self.attacks.disengage(attacker_id)?;
        self.unmark_engaged(attacker_id, entry.target);
        Some(entry)
    }

    /// Returns every attacker of `target` to Idle. No event is emitted here.
    pub(crate) fn release_target(&mut self, target: AttackTarget) -> Vec<u32> {
        let released = self.attacks.release_target(target);
        if let Some(enemy) = enemy_id(target).and_then(|id| self.registry.enemy_mut(id)) {
            for attacker in &released {
                enemy.engaged_by.remove(attacker);
            }
        }
        released
    }

    fn unmark_engaged(&mut self, attacker_id: u32, target: AttackTarget) {
        if let Some(enemy) = enemy_id(target).and_then(|id| self.registry.enemy_mut(id)) {
            enemy.engaged_by.remove(&attacker_id);
        }
    }
}

fn enemy_id(target: AttackTarget) -> Option<u32> {
    match target {
        AttackTarget::Enemy(id) => Some(id),
        AttackTarget::Player(_) => None,
    }
}

fn snapshot_position(positions: &PositionSnapshot, character_id: u32) -> Option<Coordinate> {
    positions.get(&character_id).copied().flatten()
}

/// Rolls each drop independently against its rate out of 10 000.
pub fn roll_loot<R: Rng>(drops: &[DropEntry], rng: &mut R) -> Vec<LootDrop> {
    drops
        .iter()
        .filter(|entry| rng.gen_range(0..10_000) < entry.rate)
        .map(|entry| LootDrop {
            item_id: entry.item_id,
            name: entry.name.clone(),
            quantity: 1,
        })
        .collect()
}
