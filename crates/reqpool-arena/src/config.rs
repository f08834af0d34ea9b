//! Arena configuration parameters.

use reqpool_core::ArenaError;

/// What [`Arena::reset`](crate::Arena::reset) does with plain cleanup
/// callbacks.
///
/// In-place destructors registered by
/// [`Arena::alloc_with_cleanup`](crate::Arena::alloc_with_cleanup) always
/// run at reset, because their storage is recycled. This policy only
/// governs callbacks registered with
/// [`Arena::register_cleanup`](crate::Arena::register_cleanup).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ResetCleanup {
    /// Run callbacks (LIFO) at reset and forget them.
    #[default]
    Run,
    /// Keep callbacks registered until the arena is destroyed.
    Defer,
}

/// Configuration for a request arena.
///
/// Controls block sizing, the scratch/large tier split, the byte budget,
/// and the reset policy. Validated by [`Arena::new`](crate::Arena::new);
/// all values are immutable after creation.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ArenaConfig {
    /// Size of each scratch block in bytes (the arena's size hint).
    ///
    /// Default: 16 KiB. Must be at least [`ArenaConfig::MIN_BLOCK_SIZE`].
    pub block_size: usize,

    /// Layout-driven allocations larger than this many bytes go to the
    /// large-object tier and can be freed individually.
    ///
    /// Default: `min(block_size, 4095)`. Must be non-zero and no larger
    /// than `block_size`.
    pub large_threshold: usize,

    /// Upper bound on bytes reserved from the system across both tiers.
    /// `None` means unbounded.
    pub max_bytes: Option<usize>,

    /// Reset behaviour for plain cleanup callbacks.
    pub reset_cleanup: ResetCleanup,

    /// Name attached to the arena's diagnostic span.
    pub label: Option<String>,
}

impl ArenaConfig {
    /// Default block size: 16 KiB.
    pub const DEFAULT_BLOCK_SIZE: usize = 16 * 1024;

    /// Default large-object threshold: one page minus one byte.
    pub const DEFAULT_LARGE_THRESHOLD: usize = 4095;

    /// Smallest accepted block size.
    pub const MIN_BLOCK_SIZE: usize = 64;

    /// Create a config with the given block size hint.
    ///
    /// Uses default values for all other parameters.
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size,
            large_threshold: block_size.min(Self::DEFAULT_LARGE_THRESHOLD),
            max_bytes: None,
            reset_cleanup: ResetCleanup::default(),
            label: None,
        }
    }

    /// Set a byte budget.
    #[must_use]
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }

    /// Set the large-object threshold.
    #[must_use]
    pub fn with_large_threshold(mut self, threshold: usize) -> Self {
        self.large_threshold = threshold;
        self
    }

    /// Set the reset policy for cleanup callbacks.
    #[must_use]
    pub fn with_reset_cleanup(mut self, policy: ResetCleanup) -> Self {
        self.reset_cleanup = policy;
        self
    }

    /// Attach a diagnostic label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ArenaError> {
        if self.block_size < Self::MIN_BLOCK_SIZE {
            return Err(ArenaError::InvalidConfig {
                reason: format!(
                    "block_size must be >= {} (got {})",
                    Self::MIN_BLOCK_SIZE,
                    self.block_size
                ),
            });
        }
        if self.block_size > isize::MAX as usize {
            return Err(ArenaError::InvalidConfig {
                reason: format!("block_size {} exceeds isize::MAX", self.block_size),
            });
        }
        if self.large_threshold == 0 || self.large_threshold > self.block_size {
            return Err(ArenaError::InvalidConfig {
                reason: format!(
                    "large_threshold must be in 1..={} (got {})",
                    self.block_size, self.large_threshold
                ),
            });
        }
        if let Some(max) = self.max_bytes {
            if max < self.block_size {
                return Err(ArenaError::InvalidConfig {
                    reason: format!(
                        "max_bytes ({max}) cannot hold the initial block ({})",
                        self.block_size
                    ),
                });
            }
        }
        Ok(())
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BLOCK_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_block_is_16k() {
        let config = ArenaConfig::default();
        assert_eq!(config.block_size, 16 * 1024);
        assert_eq!(config.large_threshold, 4095);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn small_hint_caps_threshold() {
        let config = ArenaConfig::new(1024);
        assert_eq!(config.large_threshold, 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn tiny_block_rejected() {
        let err = ArenaConfig::new(8).validate().unwrap_err();
        assert!(matches!(err, ArenaError::InvalidConfig { .. }));
    }

    #[test]
    fn threshold_above_block_rejected() {
        let config = ArenaConfig::new(1024).with_large_threshold(2048);
        assert!(config.validate().is_err());
    }

    #[test]
    fn budget_smaller_than_block_rejected() {
        let config = ArenaConfig::new(4096).with_max_bytes(1000);
        assert!(config.validate().is_err());
    }

    #[test]
    fn builder_sets_fields() {
        let config = ArenaConfig::new(4096)
            .with_label("req-1")
            .with_reset_cleanup(ResetCleanup::Defer)
            .with_max_bytes(1 << 20);
        assert_eq!(config.label.as_deref(), Some("req-1"));
        assert_eq!(config.reset_cleanup, ResetCleanup::Defer);
        assert_eq!(config.max_bytes, Some(1 << 20));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_fills_missing_fields_from_default() {
        let config: ArenaConfig =
            serde_json::from_str(r#"{"block_size": 16384, "reset_cleanup": "defer"}"#).unwrap();
        assert_eq!(config.block_size, 16384);
        assert_eq!(config.reset_cleanup, ResetCleanup::Defer);
        assert_eq!(config.max_bytes, None);
    }
}
