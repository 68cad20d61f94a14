//! Centralized configuration for Tether.
//!
//! Constants for registry sizing and logging. Per-instance options are set
//! through [`crate::RegistryBuilder`].

/// Handle registry defaults.
pub struct RegistryConfig;

impl RegistryConfig {
    /// Slots reserved up front in each arena.
    pub const DEFAULT_INITIAL_CAPACITY: usize = 16;
    /// Live-object limit per arena. `None` means bounded only by memory.
    pub const DEFAULT_MAX_LIVE_HANDLES: Option<usize> = None;
    /// Largest slot index an arena will hand out. Index `u32::MAX` is reserved
    /// so that packed handle tokens are never zero.
    pub const MAX_SLOT_INDEX: u32 = u32::MAX - 1;
    /// Largest generation a slot reaches before it is retired. The top two
    /// bits stay clear so packed tokens can carry a kind tag.
    pub const MAX_GENERATION: u32 = (1 << 30) - 1;
}

/// Logging configuration shared by the binding crates.
pub struct LoggingConfig;

impl LoggingConfig {
    /// Environment variable holding an `EnvFilter` directive string.
    pub const ENV_FILTER_VAR: &'static str = "TETHER_LOG";
    pub const DEFAULT_FILTER: &'static str = "warn";
}
