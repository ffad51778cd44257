//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Service-level settings
    #[serde(default)]
    pub service: RawServiceConfig,

    /// When sessions may be joined
    #[serde(default)]
    pub join_window: RawJoinWindow,

    /// Live room hand-off settings
    #[serde(default)]
    pub live: RawLiveConfig,

    /// Package catalog
    #[serde(default)]
    pub packages: Vec<RawPackage>,

    /// Standalone service catalog
    #[serde(default)]
    pub services: Vec<RawServiceItem>,

    /// Instructors seeded into the store on first start
    #[serde(default)]
    pub instructors: Vec<RawInstructor>,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// Data directory for the store
    pub data_dir: Option<PathBuf>,

    /// How often the missed-session sweep runs
    pub sweep_interval_seconds: Option<u64>,

    /// How far ahead confirmation may place sessions
    pub scheduling_horizon_days: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawJoinWindow {
    pub join_minutes_before: Option<u32>,
    pub expire_minutes_after: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawLiveConfig {
    /// Prefix prepended to the session id to form the room name
    pub room_prefix: Option<String>,

    /// Meeting server domain handed to the transport
    pub domain: Option<String>,

    pub start_audio_muted: Option<bool>,
    pub start_video_muted: Option<bool>,

    /// Upper bound on the media permission check
    pub permission_timeout_seconds: Option<u64>,
}

/// Raw package definition
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawPackage {
    pub id: String,
    pub name: String,
    pub price: RawAmount,

    /// Session descriptor, e.g. "4 جلسات فردية"
    pub sessions: String,
}

/// Raw standalone service definition
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawServiceItem {
    pub id: String,
    pub name: String,
    pub price: RawAmount,
}

/// Raw instructor seed
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawInstructor {
    pub id: String,
    pub name: String,
    pub bio: Option<String>,

    /// Per-session rate keyed by package id
    #[serde(default)]
    pub package_rates: BTreeMap<String, RawAmount>,

    /// Per-order rate keyed by service id
    #[serde(default)]
    pub service_rates: BTreeMap<String, RawAmount>,

    /// Initially approved availability
    #[serde(default)]
    pub availability: Vec<RawSlotGroup>,
}

/// A group of slot times on either weekdays or one date
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawSlotGroup {
    /// Weekdays: "all" or a list like ["sun", "tue"]
    pub days: Option<RawDays>,

    /// A single date (YYYY-MM-DD)
    pub date: Option<String>,

    /// Start times (HH:MM)
    pub times: Vec<String>,
}

/// Weekday selector: a preset or an explicit list
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RawDays {
    Preset(String),
    List(Vec<String>),
}

/// Amount as written in TOML: `800`, `199.5` or `"199.50"`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RawAmount {
    Integer(i64),
    Float(f64),
    Text(String),
}
