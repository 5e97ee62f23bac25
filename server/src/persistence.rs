//! Durable character storage seen from the simulation core.
//!
//! Reads happen on join and equip. Writes are fire-and-forget: the core hands
//! a [`PersistCommand`] to a [`PersistHandle`] and a background writer task
//! applies it to the [`PersistenceStore`]. A failed write is logged and
//! dropped; gameplay never waits on it.

use crate::error::StoreError;
use log::{debug, info, warn};
use shared::{BaseStats, Coordinate, EquipmentBonuses, LootDrop};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq)]
pub struct CharacterRecord {
    pub character_id: u32,
    pub position: Coordinate,
    pub health: i32,
    pub mana: i32,
    pub base: BaseStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EquipSlot {
    Weapon,
    Armor,
    Shield,
    Headgear,
    Accessory,
}

/// An inventory row as the store knows it.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemRecord {
    pub inventory_id: u32,
    pub item_id: u32,
    pub name: String,
    /// `None` for consumables and materials.
    pub slot: Option<EquipSlot>,
    pub required_level: i32,
    pub attack: i32,
    pub hard_defense: i32,
    pub weapon_range: Option<f32>,
    pub aspd_modifier: i32,
    pub bonuses: EquipmentBonuses,
    pub equipped: bool,
}

impl ItemRecord {
    pub fn weapon(
        inventory_id: u32,
        item_id: u32,
        name: &str,
        attack: i32,
        range: f32,
        aspd_modifier: i32,
    ) -> Self {
        Self {
            inventory_id,
            item_id,
            name: name.to_string(),
            slot: Some(EquipSlot::Weapon),
            required_level: 1,
            attack,
            hard_defense: 0,
            weapon_range: Some(range),
            aspd_modifier,
            bonuses: EquipmentBonuses::default(),
            equipped: false,
        }
    }

    pub fn armor(
        inventory_id: u32,
        item_id: u32,
        name: &str,
        slot: EquipSlot,
        hard_defense: i32,
    ) -> Self {
        Self {
            inventory_id,
            item_id,
            name: name.to_string(),
            slot: Some(slot),
            required_level: 1,
            attack: 0,
            hard_defense,
            weapon_range: None,
            aspd_modifier: 0,
            bonuses: EquipmentBonuses::default(),
            equipped: false,
        }
    }
}

pub trait PersistenceStore: Send + Sync {
    fn load_character(&self, character_id: u32) -> Result<Option<CharacterRecord>, StoreError>;
    /// Every item the character currently has equipped.
    fn load_equipment_bonuses(&self, character_id: u32) -> Result<Vec<ItemRecord>, StoreError>;
    fn load_inventory_item(
        &self,
        character_id: u32,
        inventory_id: u32,
    ) -> Result<Option<ItemRecord>, StoreError>;
    fn save_health_mana(&self, character_id: u32, health: i32, mana: i32) -> Result<(), StoreError>;
    fn save_stats(&self, character_id: u32, base: &BaseStats) -> Result<(), StoreError>;
    fn set_equipped(
        &self,
        character_id: u32,
        inventory_id: u32,
        equipped: bool,
    ) -> Result<(), StoreError>;
    fn grant_loot(&self, character_id: u32, loot: &[LootDrop]) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum PersistCommand {
    SaveHealthMana { character_id: u32, health: i32, mana: i32 },
    SaveStats { character_id: u32, base: BaseStats },
    SetEquipped { character_id: u32, inventory_id: u32, equipped: bool },
    GrantLoot { character_id: u32, loot: Vec<LootDrop> },
}

impl PersistCommand {
    pub fn character_id(&self) -> u32 {
        match self {
            PersistCommand::SaveHealthMana { character_id, .. }
            | PersistCommand::SaveStats { character_id, .. }
            | PersistCommand::SetEquipped { character_id, .. }
            | PersistCommand::GrantLoot { character_id, .. } => *character_id,
        }
    }

    pub fn apply(&self, store: &dyn PersistenceStore) -> Result<(), StoreError> {
        match self {
            PersistCommand::SaveHealthMana {
                character_id,
                health,
                mana,
            } => store.save_health_mana(*character_id, *health, *mana),
            PersistCommand::SaveStats { character_id, base } => {
                store.save_stats(*character_id, base)
            }
            PersistCommand::SetEquipped {
                character_id,
                inventory_id,
                equipped,
            } => store.set_equipped(*character_id, *inventory_id, *equipped),
            PersistCommand::GrantLoot { character_id, loot } => {
                store.grant_loot(*character_id, loot)
            }
        }
    }
}

/// Sending half of the write-behind queue.
#[derive(Debug, Clone)]
pub struct PersistHandle {
    tx: mpsc::UnboundedSender<PersistCommand>,
}

impl PersistHandle {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PersistCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn submit(&self, command: PersistCommand) {
        if let Err(e) = self.tx.send(command) {
            warn!(
                "Persistence writer gone, dropping write for character {}",
                e.0.character_id()
            );
        }
    }
}

/// Spawns the task that drains the write-behind queue into the store.
pub fn spawn_persistence_writer(
    store: Arc<dyn PersistenceStore>,
    mut rx: mpsc::UnboundedReceiver<PersistCommand>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(command) = rx.recv().await {
            if let Err(e) = command.apply(store.as_ref()) {
                warn!(
                    "Failed to persist {:?} for character {}: {}",
                    command,
                    command.character_id(),
                    e
                );
            }
        }
        info!("Persistence writer stopped");
    })
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    characters: HashMap<u32, CharacterRecord>,
    inventories: HashMap<u32, Vec<ItemRecord>>,
    loot: HashMap<u32, Vec<LootDrop>>,
}

/// Store kept entirely in memory. Backs the binary when no database is
/// configured, and the tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryStoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_character(self, record: CharacterRecord) -> Self {
        if let Ok(mut inner) = self.inner.lock() {
            inner.characters.insert(record.character_id, record);
        }
        self
    }

    pub fn with_item(self, character_id: u32, item: ItemRecord) -> Self {
        if let Ok(mut inner) = self.inner.lock() {
            inner.inventories.entry(character_id).or_default().push(item);
        }
        self
    }

    pub fn character(&self, character_id: u32) -> Option<CharacterRecord> {
        self.lock().ok()?.characters.get(&character_id).cloned()
    }

    pub fn loot_of(&self, character_id: u32) -> Vec<LootDrop> {
        self.lock()
            .ok()
            .and_then(|inner| inner.loot.get(&character_id).cloned())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryStoreInner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("poisoned lock".to_string()))
    }
}

impl PersistenceStore for MemoryStore {
    fn load_character(&self, character_id: u32) -> Result<Option<CharacterRecord>, StoreError> {
        Ok(self.lock()?.characters.get(&character_id).cloned())
    }

    fn load_equipment_bonuses(&self, character_id: u32) -> Result<Vec<ItemRecord>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .inventories
            .get(&character_id)
            .map(|items| items.iter().filter(|item| item.equipped).cloned().collect())
            .unwrap_or_default())
    }

    fn load_inventory_item(
        &self,
        character_id: u32,
        inventory_id: u32,
    ) -> Result<Option<ItemRecord>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .inventories
            .get(&character_id)
            .and_then(|items| items.iter().find(|item| item.inventory_id == inventory_id))
            .cloned())
    }

    fn save_health_mana(
        &self,
        character_id: u32,
        health: i32,
        mana: i32,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let record = inner
            .characters
            .entry(character_id)
            .or_insert_with(|| CharacterRecord {
                character_id,
                position: shared::SPAWN_POSITION,
                health,
                mana,
                base: BaseStats::default(),
            });
        record.health = health;
        record.mana = mana;
        debug!("Saved HP/SP {}/{} for character {}", health, mana, character_id);
        Ok(())
    }

    fn save_stats(&self, character_id: u32, base: &BaseStats) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        match inner.characters.get_mut(&character_id) {
            Some(record) => {
                record.base = *base;
                Ok(())
            }
            None => Err(StoreError::Rejected(character_id)),
        }
    }

    fn set_equipped(
        &self,
        character_id: u32,
        inventory_id: u32,
        equipped: bool,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let items = inner
            .inventories
            .get_mut(&character_id)
            .ok_or(StoreError::Rejected(character_id))?;

        let slot = items
            .iter()
            .find(|item| item.inventory_id == inventory_id)
            .ok_or(StoreError::Rejected(character_id))?
            .slot;

        for item in items.iter_mut() {
            if item.inventory_id == inventory_id {
                item.equipped = equipped;
            } else if equipped && slot.is_some() && item.slot == slot {
                item.equipped = false;
            }
        }
        Ok(())
    }

    fn grant_loot(&self, character_id: u32, loot: &[LootDrop]) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.loot.entry(character_id).or_default().extend_from_slice(loot);
        Ok(())
    }
}
