//! Enemy behaviour: respawn timers and idle wandering.
//!
//! Runs on its own period, slower than combat. Each tick first audits the
//! engaged sets against the live auto-attack slots, then brings back enemies
//! whose respawn timer elapsed, then advances every free enemy's wander.

use crate::entity::WanderState;
use crate::events::Outbox;
use crate::world::World;
use log::{debug, error, info};
use rand::Rng;
use shared::{
    Coordinate, ServerEvent, ENEMY_MOVE_BROADCAST_MS, ENEMY_WANDER_SPEED, WANDER_ARRIVAL_DISTANCE,
    WANDER_PAUSE_MAX_MS, WANDER_PAUSE_MIN_MS, WANDER_STEP_MAX, WANDER_STEP_MIN,
};

impl World {
    pub fn ai_tick(&mut self, now: u64) -> Outbox {
        let mut out = Outbox::new();
        self.audit_engagement();
        self.process_respawns(now, &mut out);

        let step = ENEMY_WANDER_SPEED * self.config.ai_tick.as_secs_f32();
        let ids: Vec<u32> = self.registry.enemies().map(|enemy| enemy.id).collect();
        for enemy_id in ids {
            self.advance_wander(enemy_id, now, step, &mut out);
        }
        out
    }

    /// Rebuilds any engaged set that drifted from the auto-attack slots.
    /// Returns how many enemies needed repair.
    pub fn audit_engagement(&mut self) -> usize {
        let mismatches = self.engagement_mismatches();
        for (enemy_id, live) in &mismatches {
            let Some(enemy) = self.registry.enemy_mut(*enemy_id) else {
                continue;
            };
            error!(
                "Engaged set of enemy {} out of sync: recorded {:?}, live {:?}; rebuilding",
                enemy_id, enemy.engaged_by, live
            );
            enemy.engaged_by = live.iter().copied().collect();
        }
        mismatches.len()
    }

    fn process_respawns(&mut self, now: u64, out: &mut Outbox) {
        let due: Vec<u32> = self
            .registry
            .enemies()
            .filter(|enemy| !enemy.alive && enemy.respawn_at.is_some_and(|at| at <= now))
            .map(|enemy| enemy.id)
            .collect();

        for enemy_id in due {
            let next_wander_at = now + rest_pause(&mut self.rng);
            let Some(enemy) = self.registry.enemy_mut(enemy_id) else {
                continue;
            };
            enemy.revive(next_wander_at);
            info!("{} ({}) respawned", enemy.name, enemy_id);
            out.broadcast(ServerEvent::EnemySpawn {
                enemy_id,
                template_id: enemy.template_id,
                name: enemy.name.clone(),
                level: enemy.level,
                health: enemy.health,
                max_health: enemy.max_health,
                x: enemy.position.x,
                y: enemy.position.y,
                z: enemy.position.z,
            });
        }
    }

    /// Stops a wandering enemy where it stands. No-op while Resting.
    pub(crate) fn halt_wander(&mut self, enemy_id: u32, now: u64, out: &mut Outbox) {
        let pause = rest_pause(&mut self.rng);
        let Some(enemy) = self.registry.enemy_mut(enemy_id) else {
            return;
        };
        if let WanderState::Wandering { .. } = enemy.wander {
            enemy.wander = WanderState::Resting { until: now + pause };
            enemy.last_move_broadcast = Some(now);
            debug!("{} ({}) stopped wandering to fight", enemy.name, enemy_id);
            out.broadcast(enemy_move(enemy_id, enemy.position, false));
        }
    }

    fn advance_wander(&mut self, enemy_id: u32, now: u64, step: f32, out: &mut Outbox) {
        let Some(enemy) = self.registry.enemy(enemy_id) else {
            return;
        };
        if !enemy.alive {
            return;
        }
        if !enemy.engaged_by.is_empty() {
            self.halt_wander(enemy_id, now, out);
            return;
        }

        let target = match enemy.wander {
            WanderState::Resting { until } if now < until => return,
            WanderState::Resting { .. } => {
                let target = pick_wander_target(
                    &mut self.rng,
                    enemy.position,
                    enemy.spawn,
                    enemy.wander_radius,
                );
                debug!(
                    "{} ({}) wandering to ({:.0}, {:.0})",
                    enemy.name, enemy_id, target.x, target.y
                );
                target
            }
            WanderState::Wandering { target } => target,
        };

        let pause = rest_pause(&mut self.rng);
        let Some(enemy) = self.registry.enemy_mut(enemy_id) else {
            return;
        };
        enemy.wander = WanderState::Wandering { target };

        let remaining = enemy.position.planar_distance(&target);
        if remaining >= WANDER_ARRIVAL_DISTANCE {
            let travel = step.min(remaining);
            let ratio = travel / remaining;
            enemy.position.x += (target.x - enemy.position.x) * ratio;
            enemy.position.y += (target.y - enemy.position.y) * ratio;
        }

        if enemy.position.planar_distance(&target) < WANDER_ARRIVAL_DISTANCE {
            enemy.wander = WanderState::Resting { until: now + pause };
            enemy.last_move_broadcast = Some(now);
            out.broadcast(enemy_move(enemy_id, enemy.position, false));
            return;
        }

        let due = enemy
            .last_move_broadcast
            .map_or(true, |last| now.saturating_sub(last) >= ENEMY_MOVE_BROADCAST_MS);
        if due {
            enemy.last_move_broadcast = Some(now);
            out.broadcast(enemy_move(enemy_id, enemy.position, true));
        }
    }
}

fn enemy_move(enemy_id: u32, position: Coordinate, is_moving: bool) -> ServerEvent {
    ServerEvent::EnemyMove {
        enemy_id,
        x: position.x,
        y: position.y,
        z: position.z,
        is_moving,
    }
}

fn rest_pause<R: Rng>(rng: &mut R) -> u64 {
    rng.gen_range(WANDER_PAUSE_MIN_MS..=WANDER_PAUSE_MAX_MS)
}

/// Picks the next wander destination: a random offset on each axis from the
/// current position, pulled back inside the leash around `spawn`.
pub fn pick_wander_target<R: Rng>(
    rng: &mut R,
    from: Coordinate,
    spawn: Coordinate,
    radius: f32,
) -> Coordinate {
    let mut offset = || {
        let magnitude = rng.gen_range(WANDER_STEP_MIN..=WANDER_STEP_MAX);
        if rng.gen_bool(0.5) {
            magnitude
        } else {
            -magnitude
        }
    };
    let dx = offset();
    let dy = offset();
    clamp_to_radius(Coordinate::new(from.x + dx, from.y + dy, from.z), spawn, radius)
}

/// Pulls `point` back along the spawn-to-point line onto the leash if it lies
/// outside it. Height is left alone.
pub fn clamp_to_radius(point: Coordinate, spawn: Coordinate, radius: f32) -> Coordinate {
    let distance = spawn.planar_distance(&point);
    if distance <= radius || distance == 0.0 {
        return point;
    }
    let scale = radius / distance;
    Coordinate::new(
        spawn.x + (point.x - spawn.x) * scale,
        spawn.y + (point.y - spawn.y) * scale,
        point.z,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;
    use crate::world::tests::{gloop, Harness};
    use assert_approx_eq::assert_approx_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use shared::{AttackTarget, ClientIntent};

    fn moves(out: &Outbox) -> Vec<(u32, bool)> {
        out.iter()
            .filter_map(|m| match m.event {
                ServerEvent::EnemyMove {
                    enemy_id, is_moving, ..
                } => Some((enemy_id, is_moving)),
                _ => None,
            })
            .collect()
    }

    fn start_wandering(harness: &mut Harness, enemy_id: u32) {
        if let Some(enemy) = harness.world.registry.enemy_mut(enemy_id) {
            enemy.wander = WanderState::Resting { until: 0 };
        }
    }

    #[test]
    fn test_clamp_to_radius() {
        let spawn = Coordinate::new(100.0, 100.0, 5.0);
        let inside = Coordinate::new(150.0, 100.0, 5.0);
        assert_eq!(clamp_to_radius(inside, spawn, 300.0), inside);

        let clamped = clamp_to_radius(Coordinate::new(700.0, 100.0, 9.0), spawn, 300.0);
        assert_approx_eq!(clamped.x, 400.0, 1e-3);
        assert_approx_eq!(clamped.y, 100.0, 1e-3);
        assert_eq!(clamped.z, 9.0);
    }

    #[test]
    fn test_wander_target_within_radius() {
        let mut rng = StdRng::seed_from_u64(99);
        let spawn = Coordinate::new(0.0, 0.0, 0.0);
        let mut position = spawn;
        for _ in 0..1_000 {
            let target = pick_wander_target(&mut rng, position, spawn, 250.0);
            assert!(spawn.planar_distance(&target) <= 250.0 + 1e-2);
            position = target;
        }
    }

    #[test]
    fn test_wander_offsets_in_step_range() {
        let mut rng = StdRng::seed_from_u64(5);
        let spawn = Coordinate::default();
        for _ in 0..500 {
            let target = pick_wander_target(&mut rng, spawn, spawn, 10_000.0);
            assert!((WANDER_STEP_MIN..=WANDER_STEP_MAX).contains(&target.x.abs()));
            assert!((WANDER_STEP_MIN..=WANDER_STEP_MAX).contains(&target.y.abs()));
        }
    }

    #[test]
    fn test_resting_enemy_waits() {
        let mut harness = Harness::new(MemoryStore::new());
        let enemy = harness.spawn_gloop(Coordinate::default());
        if let Some(e) = harness.world.registry.enemy_mut(enemy) {
            e.wander = WanderState::Resting { until: 10_000 };
        }

        assert!(harness.world.ai_tick(9_999).is_empty());
        assert_eq!(harness.world.registry().enemy(enemy).unwrap().position, Coordinate::default());
    }

    #[test]
    fn test_wander_moves_at_speed_and_arrives() {
        let mut harness = Harness::new(MemoryStore::new());
        let enemy = harness.spawn_gloop(Coordinate::default());
        start_wandering(&mut harness, enemy);

        let out = harness.world.ai_tick(0);
        assert_eq!(moves(&out), vec![(enemy, true)]);
        let state = harness.world.registry().enemy(enemy).unwrap();
        assert_approx_eq!(state.position.planar_distance(&Coordinate::default()), 30.0, 1e-3);
        let WanderState::Wandering { target } = state.wander else {
            panic!("expected to be wandering");
        };

        let mut now = 0;
        let mut arrived = false;
        while now < 60_000 {
            now += 500;
            let out = harness.world.ai_tick(now);
            if moves(&out).contains(&(enemy, false)) {
                arrived = true;
                break;
            }
        }
        assert!(arrived);
        let state = harness.world.registry().enemy(enemy).unwrap();
        assert!(state.position.planar_distance(&target) < WANDER_ARRIVAL_DISTANCE);
        match state.wander {
            WanderState::Resting { until } => {
                assert!((now + WANDER_PAUSE_MIN_MS..=now + WANDER_PAUSE_MAX_MS).contains(&until))
            }
            other => panic!("expected rest after arrival, got {:?}", other),
        }
        assert!(state.spawn.planar_distance(&state.position) <= gloop().wander_radius + 1e-2);
    }

    #[test]
    fn test_move_broadcasts_are_throttled() {
        let mut harness = Harness::new(MemoryStore::new());
        harness.world.config.ai_tick = std::time::Duration::from_millis(50);
        let enemy = harness.spawn_gloop(Coordinate::default());
        start_wandering(&mut harness, enemy);

        let mut broadcasts = 0;
        for now in (0..=150).step_by(50) {
            broadcasts += moves(&harness.world.ai_tick(now)).len();
        }
        // Ticks at 0, 50, 100, 150 all move; only the one at 0 is sent.
        assert_eq!(broadcasts, 1);
        assert_eq!(moves(&harness.world.ai_tick(200)).len(), 1);
    }

    #[test]
    fn test_engaged_enemy_halts_once() {
        let mut harness = Harness::new(MemoryStore::new());
        harness.join_at(1, Coordinate::new(5_000.0, 0.0, 0.0));
        let enemy = harness.spawn_gloop(Coordinate::default());
        start_wandering(&mut harness, enemy);
        harness.world.ai_tick(0);

        let out = harness.world.handle_intent(
            1,
            ClientIntent::Attack {
                attacker_id: 1,
                target: AttackTarget::Enemy(enemy),
            },
            100,
        );
        assert_eq!(moves(&out), vec![(enemy, false)]);
        let frozen = harness.world.registry().enemy(enemy).unwrap().position;

        for now in [600, 1_100, 20_000] {
            assert!(moves(&harness.world.ai_tick(now)).is_empty());
        }
        assert_eq!(harness.world.registry().enemy(enemy).unwrap().position, frozen);
    }

    #[test]
    fn test_dead_enemy_respawns_on_timer() {
        let mut harness = Harness::new(MemoryStore::new());
        let enemy = harness.spawn_gloop(Coordinate::new(10.0, 10.0, 0.0));
        if let Some(e) = harness.world.registry.enemy_mut(enemy) {
            e.position = Coordinate::new(90.0, 10.0, 0.0);
            e.take_damage(50);
            e.kill(1_000);
        }

        assert!(harness.world.ai_tick(5_999).is_empty());

        let out = harness.world.ai_tick(6_000);
        let spawned: Vec<u32> = out
            .iter()
            .filter_map(|m| match m.event {
                ServerEvent::EnemySpawn { enemy_id, .. } => Some(enemy_id),
                _ => None,
            })
            .collect();
        assert_eq!(spawned, vec![enemy]);

        let state = harness.world.registry().enemy(enemy).unwrap();
        assert!(state.alive);
        assert_eq!(state.health, state.max_health);
        assert_eq!(state.position, Coordinate::new(10.0, 10.0, 0.0));
    }

    #[test]
    fn test_audit_repairs_drifted_engaged_set() {
        let mut harness = Harness::new(MemoryStore::new());
        harness.join_at(1, Coordinate::default());
        let enemy = harness.spawn_gloop(Coordinate::default());
        harness.world.handle_intent(
            1,
            ClientIntent::Attack {
                attacker_id: 1,
                target: AttackTarget::Enemy(enemy),
            },
            0,
        );

        if let Some(e) = harness.world.registry.enemy_mut(enemy) {
            e.engaged_by.clear();
            e.engaged_by.insert(77);
        }
        assert_eq!(harness.world.engagement_mismatches().len(), 1);

        assert_eq!(harness.world.audit_engagement(), 1);
        assert!(harness.world.engagement_mismatches().is_empty());
        let engaged: Vec<u32> = harness
            .world
            .registry()
            .enemy(enemy)
            .unwrap()
            .engaged_by
            .iter()
            .copied()
            .collect();
        assert_eq!(engaged, vec![1]);
        assert_eq!(harness.world.audit_engagement(), 0);
    }
}
