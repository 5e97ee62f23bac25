//! Short-lived player position store.
//!
//! Clients report their own coordinates; the combat tick reads them back for
//! range checks. Entries expire after a TTL and are then treated as absent, so
//! a stale position is never used for a hit.

use crate::error::CacheError;
use log::debug;
use shared::Coordinate;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub trait PositionCache: Send + Sync {
    fn get(&self, character_id: u32) -> Result<Option<Coordinate>, CacheError>;
    fn set(&self, character_id: u32, position: Coordinate, ttl: Duration) -> Result<(), CacheError>;
    fn remove(&self, character_id: u32) -> Result<(), CacheError>;
}

#[derive(Debug, Clone, Copy)]
struct CachedPosition {
    position: Coordinate,
    expires_at: Instant,
}

/// In-process cache with lazy expiry.
#[derive(Debug, Default)]
pub struct MemoryPositionCache {
    entries: Mutex<HashMap<u32, CachedPosition>>,
}

impl MemoryPositionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries, expired ones included until they are next read.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<u32, CachedPosition>>, CacheError> {
        self.entries
            .lock()
            .map_err(|_| CacheError::Unavailable("poisoned lock".to_string()))
    }
}

impl PositionCache for MemoryPositionCache {
    fn get(&self, character_id: u32) -> Result<Option<Coordinate>, CacheError> {
        let mut entries = self.lock()?;
        match entries.get(&character_id) {
            Some(cached) if cached.expires_at > Instant::now() => Ok(Some(cached.position)),
            Some(_) => {
                entries.remove(&character_id);
                debug!("Position of character {} expired", character_id);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn set(
        &self,
        character_id: u32,
        position: Coordinate,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let mut entries = self.lock()?;
        entries.insert(
            character_id,
            CachedPosition {
                position,
                expires_at: Instant::now() + ttl,
            },
        );
        debug!("Cached position for character {}", character_id);
        Ok(())
    }

    fn remove(&self, character_id: u32) -> Result<(), CacheError> {
        let mut entries = self.lock()?;
        entries.remove(&character_id);
        debug!("Removed position cache for character {}", character_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(300);

    #[test]
    fn test_set_and_get() {
        let cache = MemoryPositionCache::new();
        let position = Coordinate::new(10.0, 20.0, 30.0);

        cache.set(1, position, TTL).unwrap();

        assert_eq!(cache.get(1).unwrap(), Some(position));
        assert_eq!(cache.get(2).unwrap(), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_overwrite_keeps_latest() {
        let cache = MemoryPositionCache::new();
        cache.set(1, Coordinate::new(1.0, 1.0, 1.0), TTL).unwrap();
        cache.set(1, Coordinate::new(2.0, 2.0, 2.0), TTL).unwrap();

        assert_eq!(cache.get(1).unwrap(), Some(Coordinate::new(2.0, 2.0, 2.0)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_expired_entry_is_absent() {
        let cache = MemoryPositionCache::new();
        cache.set(1, Coordinate::new(5.0, 5.0, 5.0), Duration::ZERO).unwrap();

        assert_eq!(cache.get(1).unwrap(), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_remove() {
        let cache = MemoryPositionCache::new();
        cache.set(1, Coordinate::default(), TTL).unwrap();
        cache.remove(1).unwrap();
        cache.remove(1).unwrap();

        assert_eq!(cache.get(1).unwrap(), None);
    }
}
