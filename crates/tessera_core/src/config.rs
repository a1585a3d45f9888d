//! # Arena Configuration
//!
//! Loaded once at startup, usually from TOML:
//!
//! ```toml
//! initial_capacity = 4096
//! min_reserve = 3
//! max_capacity = 1048576
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{ArenaError, ArenaResult};

/// Smallest speculative reservation made by `start_item` (one triangle).
pub const DEFAULT_MIN_RESERVE: usize = 3;

/// Construction and growth parameters for a [`ChunkArena`](crate::ChunkArena).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Slots allocated at construction. May be zero.
    pub initial_capacity: usize,
    /// Slots reserved by `start_item` before anything is appended.
    pub min_reserve: usize,
    /// Hard cap on capacity. Growth past it is an allocation failure.
    pub max_capacity: Option<usize>,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 0,
            min_reserve: DEFAULT_MIN_RESERVE,
            max_capacity: None,
        }
    }
}

impl ArenaConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`ArenaError::InvalidConfig`] on malformed TOML or invalid values.
    pub fn from_toml_str(source: &str) -> ArenaResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| ArenaError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// [`ArenaError::InvalidConfig`] describing the first bad value.
    pub fn validate(&self) -> ArenaResult<()> {
        if self.min_reserve == 0 {
            return Err(ArenaError::InvalidConfig(
                "min_reserve must be at least 1".to_string(),
            ));
        }
        if let Some(max) = self.max_capacity {
            if self.initial_capacity > max {
                return Err(ArenaError::InvalidConfig(format!(
                    "initial_capacity {} exceeds max_capacity {max}",
                    self.initial_capacity
                )));
            }
        }
        Ok(())
    }

    /// Sets the initial capacity.
    #[must_use]
    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Sets the speculative reservation size.
    #[must_use]
    pub fn with_min_reserve(mut self, min_reserve: usize) -> Self {
        self.min_reserve = min_reserve;
        self
    }

    /// Caps growth at `max` slots.
    #[must_use]
    pub fn with_max_capacity(mut self, max: usize) -> Self {
        self.max_capacity = Some(max);
        self
    }
}
