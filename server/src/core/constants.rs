// =============================================================================
// Application Identity
// =============================================================================

/// Application name in title case (for display)
pub const APP_NAME: &str = "Fanout";

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "fanout";

// =============================================================================
// Environment Variables
// =============================================================================

/// Environment variable for server host
pub const ENV_HOST: &str = "FANOUT_HOST";

/// Environment variable for server port
pub const ENV_PORT: &str = "FANOUT_PORT";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "FANOUT_LOG";

// =============================================================================
// Server Defaults
// =============================================================================

/// Default server host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server port
pub const DEFAULT_PORT: u16 = 5390;

// =============================================================================
// Broker Limits
// =============================================================================

/// Bounded per-topic history: most recent payloads retained for replay
pub const TOPIC_HISTORY_CAPACITY: usize = 100;
