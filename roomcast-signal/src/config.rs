//! Signaling layer configuration

use serde::{Deserialize, Serialize};

/// Signaling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    /// Room used by peers that never send `prepare_room`
    pub default_room: String,
    /// Maximum number of rooms (0 = unlimited)
    pub max_rooms: usize,
    /// Maximum peers per room, enforced on `prepare_room` (0 = unlimited)
    pub max_peers_per_room: usize,
    /// Create video consumers paused until the client resumes them
    pub pause_video_on_consume: bool,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            default_room: "_default_room".to_string(),
            max_rooms: 0,
            max_peers_per_room: 0,
            pause_video_on_consume: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter ("trace" .. "error")
    pub level: String,
    /// Output format: "json" or "pretty"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SignalConfig::default();
        assert_eq!(config.default_room, "_default_room");
        assert_eq!(config.max_rooms, 0);
        assert!(config.pause_video_on_consume);
    }
}
