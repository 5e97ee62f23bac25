//! Auto-attack slots.
//!
//! One slot per attacker. An attacker without a slot is Idle; with a slot it
//! is Engaged on exactly one target. The coordinator only stores intent: the
//! combat tick decides when a slot resolves into a hit.

use shared::AttackTarget;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoAttackEntry {
    pub target: AttackTarget,
    pub started_at: u64,
}

/// Result of [`AutoAttackCoordinator::engage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engagement {
    /// The attacker was Idle.
    Started,
    /// The attacker was already on this target; the slot is unchanged.
    Unchanged,
    /// The attacker left `previous` for the new target.
    Switched { previous: AutoAttackEntry },
}

#[derive(Debug, Default)]
pub struct AutoAttackCoordinator {
    entries: HashMap<u32, AutoAttackEntry>,
}

impl AutoAttackCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn engage(&mut self, attacker: u32, target: AttackTarget, now: u64) -> Engagement {
        match self.entries.get(&attacker) {
            Some(entry) if entry.target == target => Engagement::Unchanged,
            _ => {
                let entry = AutoAttackEntry {
                    target,
                    started_at: now,
                };
                match self.entries.insert(attacker, entry) {
                    Some(previous) => Engagement::Switched { previous },
                    None => Engagement::Started,
                }
            }
        }
    }

    /// Drops the attacker's slot. Idempotent.
    pub fn disengage(&mut self, attacker: u32) -> Option<AutoAttackEntry> {
        self.entries.remove(&attacker)
    }

    pub fn entry(&self, attacker: u32) -> Option<&AutoAttackEntry> {
        self.entries.get(&attacker)
    }

    pub fn is_attacking(&self, attacker: u32) -> bool {
        self.entries.contains_key(&attacker)
    }

    /// Attackers currently aimed at `target`, ascending.
    pub fn attackers_of(&self, target: AttackTarget) -> Vec<u32> {
        let mut attackers: Vec<u32> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.target == target)
            .map(|(attacker, _)| *attacker)
            .collect();
        attackers.sort_unstable();
        attackers
    }

    /// Removes every slot aimed at `target` and returns the former attackers.
    pub fn release_target(&mut self, target: AttackTarget) -> Vec<u32> {
        let attackers = self.attackers_of(target);
        for attacker in &attackers {
            self.entries.remove(attacker);
        }
        attackers
    }

    /// Snapshot of all attackers, ascending, for one tick pass.
    pub fn attacker_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.entries.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &AutoAttackEntry)> {
        self.entries.iter().map(|(attacker, entry)| (*attacker, entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engage_from_idle() {
        let mut attacks = AutoAttackCoordinator::new();
        assert_eq!(attacks.engage(1, AttackTarget::Enemy(5), 100), Engagement::Started);
        assert_eq!(
            attacks.entry(1),
            Some(&AutoAttackEntry {
                target: AttackTarget::Enemy(5),
                started_at: 100
            })
        );
        assert!(attacks.is_attacking(1));
    }

    #[test]
    fn test_engage_same_target_is_unchanged() {
        let mut attacks = AutoAttackCoordinator::new();
        attacks.engage(1, AttackTarget::Enemy(5), 100);
        assert_eq!(attacks.engage(1, AttackTarget::Enemy(5), 900), Engagement::Unchanged);
        assert_eq!(attacks.entry(1).map(|e| e.started_at), Some(100));
    }

    #[test]
    fn test_switch_same_id_different_kind() {
        let mut attacks = AutoAttackCoordinator::new();
        attacks.engage(1, AttackTarget::Enemy(5), 100);
        let result = attacks.engage(1, AttackTarget::Player(5), 200);

        assert_eq!(
            result,
            Engagement::Switched {
                previous: AutoAttackEntry {
                    target: AttackTarget::Enemy(5),
                    started_at: 100
                }
            }
        );
        assert_eq!(attacks.len(), 1);
        assert_eq!(attacks.entry(1).map(|e| e.target), Some(AttackTarget::Player(5)));
    }

    #[test]
    fn test_disengage_is_idempotent() {
        let mut attacks = AutoAttackCoordinator::new();
        attacks.engage(1, AttackTarget::Enemy(5), 100);

        assert!(attacks.disengage(1).is_some());
        assert!(attacks.disengage(1).is_none());
        assert!(attacks.disengage(2).is_none());
        assert!(attacks.is_empty());
    }

    #[test]
    fn test_release_target_clears_all_attackers() {
        let mut attacks = AutoAttackCoordinator::new();
        attacks.engage(3, AttackTarget::Enemy(5), 0);
        attacks.engage(1, AttackTarget::Enemy(5), 0);
        attacks.engage(2, AttackTarget::Enemy(6), 0);

        assert_eq!(attacks.attackers_of(AttackTarget::Enemy(5)), vec![1, 3]);
        assert_eq!(attacks.release_target(AttackTarget::Enemy(5)), vec![1, 3]);
        assert!(attacks.attackers_of(AttackTarget::Enemy(5)).is_empty());
        assert_eq!(attacks.attacker_ids(), vec![2]);
    }
}
