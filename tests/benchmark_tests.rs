//! Performance benchmarks for critical combat systems

use server::cache::MemoryPositionCache;
use server::config::SimulationConfig;
use server::damage::{resolve_damage, AttackerProfile, DamageRolls, DefenderProfile};
use server::persistence::{MemoryStore, PersistCommand, PersistHandle};
use server::spawns::{default_spawn_points, default_templates, SpawnPoint};
use server::world::World;
use shared::{derive_stats, AttackTarget, BaseStats, ClientIntent, Coordinate, EquipmentBonuses};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedReceiver;

/// The write queue receiver is returned so submits keep succeeding.
fn bench_world() -> (World, UnboundedReceiver<PersistCommand>) {
    let (persist, writes) = PersistHandle::new();
    let config = SimulationConfig {
        seed: Some(99),
        ..SimulationConfig::default()
    };
    let world = World::new(
        config,
        Arc::new(MemoryPositionCache::new()),
        Arc::new(MemoryStore::new()),
        persist,
    );
    (world, writes)
}

/// Benchmarks the derived stat formulas
#[test]
fn benchmark_derive_stats() {
    let base = BaseStats::default();
    let bonuses = EquipmentBonuses::default();

    let iterations = 100_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let _ = derive_stats(&base, &bonuses);
    }

    let duration = start.elapsed();
    println!(
        "Derive stats: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    // Should complete in under 1 second even in debug builds
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks damage resolution with real random rolls
#[test]
fn benchmark_damage_resolution() {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    let mut rng = StdRng::seed_from_u64(1);
    let attacker = AttackerProfile {
        status_atk: 60,
        weapon_atk: 40,
        critical: 20,
    };
    let defender = DefenderProfile {
        soft_def: 15,
        hard_def: 10,
    };

    let iterations = 100_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let outcome = resolve_damage(&attacker, &defender, DamageRolls::sample(&mut rng));
        assert!(outcome.damage >= 1);
    }

    let duration = start.elapsed();
    println!(
        "Damage resolution: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 1000);
}

/// Benchmarks the combat tick with a full server of attackers
#[test]
fn benchmark_combat_tick() {
    let (mut world, _writes) = bench_world();
    world.populate(default_templates(), &default_spawn_points(), 0);
    let enemies: Vec<u32> = world.registry().enemies().map(|e| e.id).collect();

    for id in 1..=32u32 {
        world.handle_intent(
            id,
            ClientIntent::Join {
                character_id: id,
                display_name: format!("Bench{}", id),
            },
            0,
        );
        let target = enemies[id as usize % enemies.len()];
        world.handle_intent(
            id,
            ClientIntent::Attack {
                attacker_id: id,
                target: AttackTarget::Enemy(target),
            },
            0,
        );
    }

    let iterations = 1000u64;
    let start = Instant::now();

    for tick in 0..iterations {
        let _ = world.combat_tick(tick * 50);
    }

    let duration = start.elapsed();
    println!(
        "Combat tick: 32 attackers × {} ticks in {:?} ({:.2} μs/tick)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 5000);
    assert!(world.engagement_mismatches().is_empty());
}

/// Benchmarks enemy wandering with a crowded map
#[test]
fn benchmark_ai_tick() {
    let (mut world, _writes) = bench_world();
    let points: Vec<SpawnPoint> = (0..200)
        .map(|i| SpawnPoint {
            template_id: (i % 4) + 1,
            position: Coordinate::new((i % 20) as f32 * 500.0, (i / 20) as f32 * 500.0, 300.0),
        })
        .collect();
    world.populate(default_templates(), &points, 0);
    assert_eq!(world.registry().enemy_count(), 200);

    let iterations = 1000u64;
    let start = Instant::now();

    for tick in 0..iterations {
        let _ = world.ai_tick(tick * 500);
    }

    let duration = start.elapsed();
    println!(
        "AI tick: 200 enemies × {} ticks in {:?} ({:.2} μs/tick)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 5000);
}

/// Benchmarks event packet serialization
#[test]
fn benchmark_packet_serialization() {
    use bincode::{deserialize, serialize};
    use shared::{LootDrop, Packet, ServerEvent, TargetKind};

    let packet = Packet::Event(ServerEvent::Death {
        killed_id: 17,
        killer_id: 3,
        target_kind: TargetKind::Enemy,
        exp: 40,
        loot: (0..5)
            .map(|i| LootDrop {
                item_id: 2000 + i,
                name: format!("Drop {}", i),
                quantity: 1,
            })
            .collect(),
    });

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let bytes = serialize(&packet).unwrap();
        let _: Packet = deserialize(&bytes).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Packet serialization: {} round trips in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 1000);
}
