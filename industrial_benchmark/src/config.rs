// src/config.rs
//
// Configuration for the industrial benchmark dynamics.
//
// Configuration is Java-properties style key/value text, loaded once before
// the engine is constructed:
// - `<KEY>_INIT`, `<KEY>_MAX`, `<KEY>_MIN` per state variable (see state.rs)
// - STEP_SIZE_VELOCITY, STEP_SIZE_GAIN, CRGS, ConvArray (required, eager)
// - DGain, DVelocity, DSetPoint, DBase, CostSetPoint, CostGain, CostVelocity
//   (required, but only read while stepping)
// - SEED (optional, wall-clock millis when absent)
// - CRC, CRF, SETPOINT_* (optional, read by the reward and setpoint driver)
//
// `Properties` keeps the raw text values; `DynamicsConfig` holds the values the
// engine reads eagerly plus the properties for everything read later.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::state::StateError;

/// Environment variable prefix used by `Properties::apply_env_overrides`.
pub const ENV_PREFIX: &str = "IB_";

/// Standard benchmark configuration.
const BENCHMARK_DEFAULTS: &str = r"
# Industrial benchmark: standard configuration.

SetPoint_INIT = 50
SetPoint_MIN = 0
SetPoint_MAX = 100

Velocity_INIT = 50
Velocity_MIN = 0
Velocity_MAX = 100

Gain_INIT = 50
Gain_MIN = 0
Gain_MAX = 100

Shift_INIT = 50
Shift_MIN = 0
Shift_MAX = 100

STEP_SIZE_VELOCITY = 1
STEP_SIZE_GAIN = 10

# consumption penalty of the miscalibration
CRGS = 2.5

ConvArray = 0.11111, 0.22222, 0.33333, 0.22222, 0.11111, \
            0.0, 0.0, 0.0, 0.0, 0.0

# fatigue base level
DBase = 30
DVelocity = 5
DSetPoint = 20
DGain = 0.01

# operational cost
CostSetPoint = 2
CostGain = 5
CostVelocity = 3

# reward weights
CRC = 1
CRF = 3

# setpoint random walk
SETPOINT_STEP_SIZE = 1
SETPOINT_MAX_CHANGE_RATE = 0.5
SETPOINT_MAX_SEQUENCE_LENGTH = 100
STATIONARY_SETPOINT = false
";

/// Errors raised while loading or validating configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("missing required configuration key {0}")]
    MissingKey(String),

    #[error("configuration key {key}: cannot parse {value:?} as {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },

    #[error("configuration key {0}: list must not be empty")]
    EmptyList(String),

    #[error("variable={key}: max={max} must be > than min={min}")]
    InvalidBounds { key: String, min: f64, max: f64 },

    #[error("variable={key}: init={init} must be between min={min} and max={max}")]
    InitOutOfBounds {
        key: String,
        init: f64,
        min: f64,
        max: f64,
    },

    #[error(transparent)]
    State(#[from] StateError),
}

/// Raw key/value configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Properties {
    entries: BTreeMap<String, String>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard benchmark configuration.
    pub fn benchmark_defaults() -> Self {
        Self::parse(BENCHMARK_DEFAULTS)
    }

    /// Parse properties text.
    ///
    /// Supports `key = value`, `key: value` and `key value` entries, `#` and
    /// `!` comment lines, and a trailing `\` joining the next line, stripped
    /// of leading whitespace, directly onto the current logical line. Later
    /// entries override earlier ones.
    pub fn parse(text: &str) -> Self {
        let mut entries = BTreeMap::new();
        let mut logical = String::new();

        for raw in text.lines() {
            let line = raw.trim();
            if logical.is_empty()
                && (line.is_empty() || line.starts_with('#') || line.starts_with('!'))
            {
                continue;
            }
            if let Some(head) = line.strip_suffix('\\') {
                logical.push_str(head);
                continue;
            }
            logical.push_str(line);
            if let Some((key, value)) = split_entry(&logical) {
                entries.insert(key, value);
            }
            logical.clear();
        }
        if let Some((key, value)) = split_entry(&logical) {
            entries.insert(key, value);
        }

        Self { entries }
    }

    /// Read and parse a properties file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::parse(&text))
    }

    /// Override every key for which an environment variable `<prefix><KEY>`
    /// is set. Empty values are ignored with a warning.
    pub fn apply_env_overrides(&mut self, prefix: &str) {
        for (name, value) in env::vars() {
            let Some(key) = name.strip_prefix(prefix) else {
                continue;
            };
            if key.is_empty() {
                continue;
            }
            let value = value.trim();
            if value.is_empty() {
                warn!(variable = %name, "ignoring empty configuration override");
                continue;
            }
            info!(key, value, "configuration override from environment");
            self.entries.insert(key.to_string(), value.to_string());
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) {
        self.entries.insert(key.into(), value.to_string());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// A float that must be present.
    pub fn f64_required(&self, key: &str) -> Result<f64, ConfigError> {
        let raw = self
            .get(key)
            .ok_or_else(|| ConfigError::MissingKey(key.to_string()))?;
        parse_f64(key, raw)
    }

    /// A float with a default when the key is absent. A present but
    /// unparseable value is still an error.
    pub fn f64_or(&self, key: &str, default: f64) -> Result<f64, ConfigError> {
        match self.get(key) {
            Some(raw) => parse_f64(key, raw),
            None => Ok(default),
        }
    }

    /// An optional 64-bit integer. Negative values keep their two's
    /// complement bit pattern.
    pub fn u64_opt(&self, key: &str) -> Result<Option<u64>, ConfigError> {
        let Some(raw) = self.get(key) else {
            return Ok(None);
        };
        let raw = raw.trim();
        if let Ok(v) = raw.parse::<u64>() {
            return Ok(Some(v));
        }
        raw.parse::<i64>()
            .map(|v| Some(v as u64))
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw.to_string(),
                expected: "integer",
            })
    }

    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        let Some(raw) = self.get(key) else {
            return Ok(default);
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw.to_string(),
                expected: "boolean",
            }),
        }
    }

    /// A required comma-separated float list. All whitespace is ignored.
    pub fn f64_list(&self, key: &str) -> Result<Vec<f64>, ConfigError> {
        let raw = self
            .get(key)
            .ok_or_else(|| ConfigError::MissingKey(key.to_string()))?;
        let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.is_empty() {
            return Err(ConfigError::EmptyList(key.to_string()));
        }
        compact
            .split(',')
            .map(|item| {
                item.parse::<f64>().map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: item.to_string(),
                    expected: "comma-separated float list",
                })
            })
            .collect()
    }
}

fn split_entry(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match line.find(|c: char| c == '=' || c == ':' || c.is_whitespace()) {
        None => Some((line.to_string(), String::new())),
        Some(idx) => {
            let key = line[..idx].to_string();
            let rest = line[idx..].trim_start();
            let rest = rest
                .strip_prefix('=')
                .or_else(|| rest.strip_prefix(':'))
                .unwrap_or(rest);
            Some((key, rest.trim().to_string()))
        }
    }
}

fn parse_f64(key: &str, raw: &str) -> Result<f64, ConfigError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
            expected: "float",
        })
}

/// Physical constants read lazily while stepping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constant {
    DGain,
    DVelocity,
    DSetPoint,
    DBase,
    CostSetPoint,
    CostGain,
    CostVelocity,
}

impl Constant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Constant::DGain => "DGain",
            Constant::DVelocity => "DVelocity",
            Constant::DSetPoint => "DSetPoint",
            Constant::DBase => "DBase",
            Constant::CostSetPoint => "CostSetPoint",
            Constant::CostGain => "CostGain",
            Constant::CostVelocity => "CostVelocity",
        }
    }
}

/// Engine configuration: eagerly validated values plus the raw properties.
#[derive(Debug, Clone)]
pub struct DynamicsConfig {
    pub step_size_velocity: f64,
    pub step_size_gain: f64,
    /// Consumption penalty applied to the miscalibration.
    pub crgs: f64,
    /// Convolution weights; their count is the cost history length.
    pub conv_weights: Vec<f64>,
    /// Configured seed. `None` means seed from the wall clock on every init.
    pub seed: Option<u64>,
    pub properties: Properties,
}

impl DynamicsConfig {
    pub fn from_properties(properties: Properties) -> Result<Self, ConfigError> {
        Ok(Self {
            step_size_velocity: properties.f64_required("STEP_SIZE_VELOCITY")?,
            step_size_gain: properties.f64_required("STEP_SIZE_GAIN")?,
            crgs: properties.f64_required("CRGS")?,
            conv_weights: properties.f64_list("ConvArray")?,
            seed: properties.u64_opt("SEED")?,
            properties,
        })
    }

    /// Look up a lazily read constant.
    pub fn constant(&self, constant: Constant) -> Result<f64, ConfigError> {
        self.properties.f64_required(constant.as_str())
    }

    /// The configured seed, or the current wall-clock time in milliseconds.
    pub fn resolve_seed(&self) -> u64 {
        self.seed.unwrap_or_else(wall_clock_seed)
    }
}

fn wall_clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
