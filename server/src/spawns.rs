//! Enemy templates and where they stand when the server starts.

use crate::entity::{DropEntry, EnemyTemplate};
use shared::Coordinate;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnPoint {
    pub template_id: u32,
    pub position: Coordinate,
}

fn drop_entry(item_id: u32, name: &str, rate: u32) -> DropEntry {
    DropEntry {
        item_id,
        name: name.to_string(),
        rate,
    }
}

pub fn default_templates() -> Vec<EnemyTemplate> {
    vec![
        EnemyTemplate {
            id: 1,
            name: "Gloop".to_string(),
            level: 1,
            max_health: 50,
            soft_def: 0,
            hard_def: 0,
            exp: 6,
            wander_radius: 400.0,
            respawn_ms: 5_000,
            drops: vec![
                drop_entry(2001, "Gloopy Residue", 7_000),
                drop_entry(2002, "Viscous Slime", 1_500),
                drop_entry(1001, "Crimson Vial", 500),
            ],
        },
        EnemyTemplate {
            id: 2,
            name: "Plumewing".to_string(),
            level: 3,
            max_health: 90,
            soft_def: 2,
            hard_def: 0,
            exp: 12,
            wander_radius: 500.0,
            respawn_ms: 7_000,
            drops: vec![
                drop_entry(2004, "Downy Plume", 6_000),
                drop_entry(2007, "Verdant Leaf", 1_000),
            ],
        },
        EnemyTemplate {
            id: 3,
            name: "Thornback".to_string(),
            level: 4,
            max_health: 120,
            soft_def: 5,
            hard_def: 5,
            exp: 18,
            wander_radius: 350.0,
            respawn_ms: 8_000,
            drops: vec![
                drop_entry(2003, "Chitin Shard", 5_000),
                drop_entry(2006, "Barbed Limb", 2_000),
            ],
        },
        EnemyTemplate {
            id: 4,
            name: "Sporeling".to_string(),
            level: 5,
            max_health: 160,
            soft_def: 8,
            hard_def: 10,
            exp: 25,
            wander_radius: 250.0,
            respawn_ms: 10_000,
            drops: vec![
                drop_entry(2005, "Spore Cluster", 5_500),
                drop_entry(2008, "Silken Tuft", 2_500),
                drop_entry(1002, "Amber Elixir", 300),
            ],
        },
    ]
}

pub fn default_spawn_points() -> Vec<SpawnPoint> {
    let at = |template_id, x, y| SpawnPoint {
        template_id,
        position: Coordinate::new(x, y, 300.0),
    };
    vec![
        at(1, 500.0, 500.0),
        at(1, -600.0, 400.0),
        at(1, 800.0, -300.0),
        at(2, -1_200.0, -900.0),
        at(2, 1_500.0, 1_100.0),
        at(3, 2_000.0, -1_500.0),
        at(3, -2_200.0, 1_800.0),
        at(4, 3_000.0, 0.0),
    ]
}
