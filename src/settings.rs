//! Tunable settings
//!
//! Loaded from the JSON file named by `HOCKEY_LINK_SETTINGS`, defaults otherwise.
//! Both peers must agree on the arena size for mirroring to line up.

use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::net::{SessionConfig, SyncConfig, TcpTransport};
use crate::sim::{ArenaGeometry, MatchRules};

/// Environment variable pointing at a settings file
pub const SETTINGS_ENV: &str = "HOCKEY_LINK_SETTINGS";

/// Logical arena size
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaSettings {
    pub width: f32,
    pub height: f32,
}

impl Default for ArenaSettings {
    fn default() -> Self {
        Self {
            width: ARENA_WIDTH,
            height: ARENA_HEIGHT,
        }
    }
}

/// Timeouts and intervals, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    pub host_connect_timeout_ms: u64,
    pub guest_connect_timeout_ms: u64,
    pub ready_delay_ms: u64,
    pub broadcast_interval_ms: u64,
    pub goal_reset_delay_ms: u64,
    pub frame_interval_ms: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            host_connect_timeout_ms: HOST_CONNECT_TIMEOUT_MS,
            guest_connect_timeout_ms: GUEST_CONNECT_TIMEOUT_MS,
            ready_delay_ms: READY_DELAY_MS,
            broadcast_interval_ms: BROADCAST_INTERVAL_MS,
            goal_reset_delay_ms: GOAL_RESET_DELAY_MS,
            frame_interval_ms: FRAME_INTERVAL_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSettings {
    pub winning_score: u32,
}

impl Default for RuleSettings {
    fn default() -> Self {
        Self {
            winning_score: WINNING_SCORE,
        }
    }
}

/// Where the TCP transport listens and dials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    pub bind_host: IpAddr,
    /// Room `NNNN` lives on `base_port + NNNN`
    pub base_port: u16,
    /// Fresh room codes tried before giving up on create
    pub max_claim_attempts: u32,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            bind_host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            base_port: 41_000,
            max_claim_attempts: 8,
        }
    }
}

/// All settings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub arena: ArenaSettings,
    pub timing: TimingSettings,
    pub rules: RuleSettings,
    pub network: NetworkSettings,
}

impl Settings {
    /// Load from `HOCKEY_LINK_SETTINGS`, or use defaults
    pub fn load() -> Self {
        match std::env::var(SETTINGS_ENV) {
            Ok(path) => Self::load_from(&path),
            Err(_) => {
                log::info!("Using default settings");
                Self::default()
            }
        }
    }

    /// Load from a file, falling back to defaults if it is missing or invalid
    pub fn load_from(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let parsed = std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|json| serde_json::from_str::<Settings>(&json).map_err(|e| e.to_string()));
        match parsed {
            Ok(settings) => {
                log::info!("Loaded settings from {}", path.display());
                settings
            }
            Err(e) => {
                log::warn!("Ignoring settings file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Write as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        log::info!("Settings saved");
        Ok(())
    }

    pub fn arena_geometry(&self) -> ArenaGeometry {
        ArenaGeometry::from_viewport(self.arena.width, self.arena.height)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            host_connect_timeout: Duration::from_millis(self.timing.host_connect_timeout_ms),
            guest_connect_timeout: Duration::from_millis(self.timing.guest_connect_timeout_ms),
            max_claim_attempts: self.network.max_claim_attempts.max(1),
        }
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            ready_delay: Duration::from_millis(self.timing.ready_delay_ms),
            broadcast_interval: Duration::from_millis(self.timing.broadcast_interval_ms),
        }
    }

    pub fn match_rules(&self) -> MatchRules {
        MatchRules {
            winning_score: self.rules.winning_score.max(1),
            goal_reset_delay: Duration::from_millis(self.timing.goal_reset_delay_ms),
        }
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.timing.frame_interval_ms.max(1))
    }

    pub fn tcp_transport(&self) -> TcpTransport {
        TcpTransport::new(self.network.bind_host, self.network.base_port)
    }
}
