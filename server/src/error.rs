//! Error classes of the simulation core.
//!
//! [`ValidationError`] is the only class a player ever sees: it is turned into
//! a unicast `Error` event. Everything else is logged and absorbed.

use shared::StatKind;
use thiserror::Error;

/// An intent that was understood but is not allowed right now.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Cannot attack yourself")]
    SelfTarget,
    #[error("Target is already dead")]
    TargetDead,
    #[error("Target not found")]
    UnknownTarget,
    #[error("You are dead")]
    AttackerDead,
    #[error("You are not dead")]
    NotDead,
    #[error("Unknown stat: {0}")]
    UnknownStat(String),
    #[error("Amount must be positive, got {0}")]
    InvalidAmount(i32),
    #[error("Not enough stat points: have {available}, need {required}")]
    InsufficientStatPoints { available: i32, required: i32 },
    #[error("{stat} cannot exceed {max}")]
    AttributeCapped { stat: StatKind, max: i32 },
    #[error("Requires base level {required} (current {current})")]
    LevelRequirement { required: i32, current: i32 },
    #[error("Item not found in inventory")]
    UnknownItem,
    #[error("Item cannot be equipped")]
    NotEquippable,
    #[error("Item is not equipped")]
    NotEquipped,
}

/// Entities that may disappear between an intent and its processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    Character(u32),
}

impl std::fmt::Display for Missing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Missing::Character(id) => write!(f, "character {}", id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("position cache unavailable: {0}")]
    Unavailable(String),
    #[error("position cache timed out")]
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store rejected write for character {0}")]
    Rejected(u32),
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0} not found")]
    NotFound(Missing),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_messages() {
        assert_eq!(ValidationError::SelfTarget.to_string(), "Cannot attack yourself");
        let err = ValidationError::InsufficientStatPoints {
            available: 1,
            required: 3,
        };
        assert_eq!(err.to_string(), "Not enough stat points: have 1, need 3");
        let capped = ValidationError::AttributeCapped {
            stat: StatKind::Luck,
            max: 99,
        };
        assert_eq!(capped.to_string(), "luk cannot exceed 99");
    }

    #[test]
    fn test_core_error_conversions() {
        let err: CoreError = ValidationError::TargetDead.into();
        assert!(matches!(err, CoreError::Validation(ValidationError::TargetDead)));

        let err: CoreError = CacheError::Timeout.into();
        assert_eq!(err.to_string(), "position cache timed out");

        let err = CoreError::NotFound(Missing::Character(4));
        assert_eq!(err.to_string(), "character 4 not found");
    }
}
