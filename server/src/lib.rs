//! # Combat Server Library
//!
//! This library provides the authoritative combat and AI simulation for a
//! multiplayer game server. Clients only send intents; every hit, death,
//! respawn and enemy step is decided here and pushed back out as events.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Combat
//! Auto-attacks are resolved on a fixed combat tick. Each attacker holds at
//! most one target, hits when its attack interval has elapsed and it is in
//! range, and stops on its own when the target dies, leaves or disappears.
//! A kill produces exactly one death event and loot for the killing blow.
//!
//! ### Enemy AI
//! Enemies wander around their spawn point on a slower AI tick, halt while
//! anyone is attacking them and come back after a respawn delay when killed.
//!
//! ### Character Progression
//! Stat allocation and equipment changes are validated, applied to the live
//! character, recomputed into derived stats and written behind to storage.
//!
//! ## Architecture Design
//!
//! ### Single-Owner Simulation
//! [`world::World`] owns every entity and is driven from one task. Handlers
//! take the current time in milliseconds and return an [`events::Outbox`];
//! they never touch sockets. That keeps the core deterministic for a fixed
//! seed and lets tests drive it without a runtime.
//!
//! ### Collaborators at the Edges
//! Positions live in a [`cache::PositionCache`] and character data in a
//! [`persistence::PersistenceStore`]. Writes are queued on a
//! [`persistence::PersistHandle`] and drained by a background task, so a
//! slow store never stalls a tick.
//!
//! ### UDP-Based Communication
//! The [`network`] module speaks bincode over UDP, tracks connections with
//! [`client_manager::ClientManager`] and fans outbox entries out to the
//! right addresses.
//!
//! ## Module Organization
//!
//! - `world`: the simulation root, sessions and progression intents
//! - `combat`: auto-attack start/stop, the combat tick and kills
//! - `ai`: wandering, respawn timers and the engagement audit
//! - `auto_attack`: one slot per attacker
//! - `damage`: the damage formula
//! - `entity` and `registry`: live players and enemies
//! - `spawns`: built-in enemy templates and spawn points
//! - `events`: recipients and the outbox
//! - `cache` and `persistence`: external collaborators
//! - `client_manager` and `network`: connections and transport
//! - `config` and `error`: command line options and error types
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use clap::Parser;
//! use server::cache::MemoryPositionCache;
//! use server::config::ServerConfig;
//! use server::network::Server;
//! use server::persistence::MemoryStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::parse();
//!     let mut server = Server::new(
//!         &config,
//!         Arc::new(MemoryPositionCache::new()),
//!         Arc::new(MemoryStore::new()),
//!     )
//!     .await?;
//!
//!     // Runs the receive loop plus the combat and AI ticks until shutdown
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod ai;
pub mod auto_attack;
pub mod cache;
pub mod client_manager;
pub mod combat;
pub mod config;
pub mod damage;
pub mod entity;
pub mod error;
pub mod events;
pub mod network;
pub mod persistence;
pub mod registry;
pub mod spawns;
pub mod world;
