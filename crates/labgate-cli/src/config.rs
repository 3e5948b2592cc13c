//! Configuration loading from TOML files
//!
//! The config file is selected via:
//! 1. `--config <path>` on the command line
//! 2. the `LABGATE_CONFIG` environment variable
//! 3. Default: `config/labgate.toml`
//!
//! Every section is optional. A missing key takes the same default the
//! library crates use, so an empty file describes a simulated two-door
//! access point.

use anyhow::Context;
use labgate_core::constants::{
    DEFAULT_DECISION_TIMEOUT_MS, DEFAULT_DISPLAY_CHANNEL, DEFAULT_DISPLAY_COLS, DEFAULT_DISPLAY_REFRESH_MS,
    DEFAULT_DISPLAY_ROWS, DEFAULT_INSIDE_CHANNEL, DEFAULT_MESSAGE_HOLD_MS, DEFAULT_MUX_ADDRESS,
    DEFAULT_OUTSIDE_CHANNEL, DEFAULT_READER_ADDRESS, DEFAULT_RELAY_DURATION_MS, DEFAULT_SETTLE_DELAY_MS,
};
use labgate_core::{BusAddress, Channel, DoorConfig, DoorRole, Error, Result, RetryPolicy};
use labgate_network::HttpDecisionConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config/labgate.toml";

/// Where the devices come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Mock bus, mock readers and a card generator
    #[default]
    Simulated,
    /// Linux i2c-dev bus and PN532 readers
    Hardware,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusSettings {
    pub device: PathBuf,
    pub mux_address: u8,
    pub settle_delay_ms: u64,
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            device: PathBuf::from("/dev/i2c-1"),
            mux_address: DEFAULT_MUX_ADDRESS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoorSettings {
    pub role: DoorRole,
    pub channel: u8,
    #[serde(default = "default_reader_address")]
    pub reader_address: u8,
}

fn default_reader_address() -> u8 {
    DEFAULT_READER_ADDRESS
}

fn default_doors() -> Vec<DoorSettings> {
    vec![
        DoorSettings {
            role: DoorRole::Inside,
            channel: DEFAULT_INSIDE_CHANNEL,
            reader_address: DEFAULT_READER_ADDRESS,
        },
        DoorSettings {
            role: DoorRole::Outside,
            channel: DEFAULT_OUTSIDE_CHANNEL,
            reader_address: DEFAULT_READER_ADDRESS,
        },
    ]
}

/// Overrides on top of [`RetryPolicy::default`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_init_retries: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_delay_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_threshold: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hardware_reset_delay_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown_window_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_restart_attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff_delay_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stable_polls: Option<u32>,
}

impl RetrySettings {
    pub fn to_policy(&self) -> RetryPolicy {
        let mut policy = RetryPolicy::default();
        if let Some(v) = self.max_init_retries {
            policy = policy.with_max_init_retries(v);
        }
        if let Some(ms) = self.retry_delay_ms {
            policy = policy.with_retry_delay(Duration::from_millis(ms));
        }
        if let Some(v) = self.error_threshold {
            policy = policy.with_error_threshold(v);
        }
        if let Some(ms) = self.hardware_reset_delay_ms {
            policy = policy.with_hardware_reset_delay(Duration::from_millis(ms));
        }
        if let Some(ms) = self.cooldown_window_ms {
            policy = policy.with_cooldown_window(Duration::from_millis(ms));
        }
        if let Some(v) = self.max_restart_attempts {
            policy = policy.with_max_restart_attempts(v);
        }
        if let Some(ms) = self.backoff_delay_ms {
            policy = policy.with_backoff_delay(Duration::from_millis(ms));
        }
        if let Some(ms) = self.poll_timeout_ms {
            policy = policy.with_poll_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = self.poll_interval_ms {
            policy = policy.with_poll_interval(Duration::from_millis(ms));
        }
        if let Some(v) = self.stable_polls {
            policy = policy.with_stable_polls(v);
        }
        policy
    }
}

/// Who answers access requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionKind {
    #[default]
    Http,
    /// Grant every card, for bench runs without the service
    Simulated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionSettings {
    pub kind: DecisionKind,
    pub url: String,
    pub timeout_ms: u64,
}

impl Default for DecisionSettings {
    fn default() -> Self {
        Self {
            kind: DecisionKind::default(),
            url: HttpDecisionConfig::default().url,
            timeout_ms: DEFAULT_DECISION_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayKind {
    Gpio,
    Usb,
    #[default]
    Simulated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    pub kind: RelayKind,
    pub duration_ms: u64,
    /// sysfs value file of the relay line, `gpio` only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<PathBuf>,
    pub active_low: bool,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            kind: RelayKind::default(),
            duration_ms: DEFAULT_RELAY_DURATION_MS,
            line: None,
            active_low: false,
        }
    }
}

/// GPIO lines of one door's LED and buzzer. Any line may be left out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorLines {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub red: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub green: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blue: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buzzer: Option<PathBuf>,
    pub active_low: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inside: Option<IndicatorLines>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outside: Option<IndicatorLines>,
}

impl IndicatorSettings {
    pub fn for_role(&self, role: DoorRole) -> Option<&IndicatorLines> {
        match role {
            DoorRole::Inside => self.inside.as_ref(),
            DoorRole::Outside => self.outside.as_ref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    pub enabled: bool,
    pub channel: u8,
    pub rows: usize,
    pub cols: usize,
    pub refresh_ms: u64,
    /// How long a scan result stays up before the idle screen returns
    pub hold_ms: u64,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            channel: DEFAULT_DISPLAY_CHANNEL,
            rows: DEFAULT_DISPLAY_ROWS,
            cols: DEFAULT_DISPLAY_COLS,
            refresh_ms: DEFAULT_DISPLAY_REFRESH_MS,
            hold_ms: DEFAULT_MESSAGE_HOLD_MS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Append every scan as one JSON line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events_file: Option<PathBuf>,
    /// Store every scan in this SQLite file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
    /// JSON log lines instead of the human format
    pub json: bool,
}

/// Complete, immutable process configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub mode: Mode,
    pub site_name: String,
    pub controller_id: String,
    pub bus: BusSettings,
    pub doors: Vec<DoorSettings>,
    pub retry: RetrySettings,
    pub decision: DecisionSettings,
    pub relay: RelaySettings,
    pub indicators: IndicatorSettings,
    pub display: DisplaySettings,
    pub log: LogSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            site_name: "AI LAB".to_string(),
            controller_id: HttpDecisionConfig::default().controller_id,
            bus: BusSettings::default(),
            doors: default_doors(),
            retry: RetrySettings::default(),
            decision: DecisionSettings::default(),
            relay: RelaySettings::default(),
            indicators: IndicatorSettings::default(),
            display: DisplaySettings::default(),
            log: LogSettings::default(),
        }
    }
}

impl AppConfig {
    /// Read and parse `path`, then validate the result.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_toml(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Parse and validate TOML text.
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Check every cross-field rule.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidChannel` for a channel above 7
    /// - `Error::InvalidAddress` for a reserved I2C address
    /// - `Error::InvalidPolicy` for a zero retry bound
    /// - `Error::Config` for everything else: no doors, duplicate roles or
    ///   channels, a display sharing a door's channel, a GPIO relay without
    ///   a line
    pub fn validate(&self) -> Result<()> {
        if self.doors.is_empty() {
            return Err(Error::Config("at least one door is required".to_string()));
        }

        BusAddress::new(self.bus.mux_address)?;
        let doors = self.door_configs()?;

        let mut roles = HashSet::new();
        let mut channels = HashSet::new();
        for door in &doors {
            if !roles.insert(door.role) {
                return Err(Error::Config(format!("door '{}' is configured twice", door.role)));
            }
            if !channels.insert(door.channel) {
                return Err(Error::Config(format!(
                    "channel {} is used by more than one door",
                    door.channel
                )));
            }
        }

        if self.display.enabled {
            let channel = Channel::new(self.display.channel)?;
            if channels.contains(&channel) {
                return Err(Error::Config(format!(
                    "display channel {channel} collides with a door channel"
                )));
            }
            if self.display.rows == 0 || self.display.cols == 0 {
                return Err(Error::Config("display rows and cols must be non-zero".to_string()));
            }
        }

        if self.relay.kind == RelayKind::Gpio && self.relay.line.is_none() {
            return Err(Error::MissingConfig("relay.line".to_string()));
        }

        if self.decision.kind == DecisionKind::Http && self.decision.url.trim().is_empty() {
            return Err(Error::MissingConfig("decision.url".to_string()));
        }

        self.retry_policy().validate()
    }

    /// Door entries as typed bus positions.
    pub fn door_configs(&self) -> Result<Vec<DoorConfig>> {
        self.doors
            .iter()
            .map(|door| {
                Ok(DoorConfig::new(
                    door.role,
                    Channel::new(door.channel)?,
                    BusAddress::new(door.reader_address)?,
                ))
            })
            .collect()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.to_policy()
    }

    pub fn decision_config(&self) -> HttpDecisionConfig {
        HttpDecisionConfig {
            url: self.decision.url.clone(),
            controller_id: self.controller_id.clone(),
            timeout: Duration::from_millis(self.decision.timeout_ms),
        }
    }

    /// Effective configuration as TOML, defaults filled in.
    pub fn to_toml(&self) -> anyhow::Result<String> {
        toml::to_string_pretty(self).context("Failed to render configuration")
    }
}

/// Pick the config path: explicit argument, then `LABGATE_CONFIG`, then the
/// default location.
pub fn resolve_config_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| std::env::var_os("LABGATE_CONFIG").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
