use std::fmt;

use serde::{Deserialize, Serialize};

use crate::game::Metal;

const DEFAULT_PHASE_SECONDS: u32 = 120;
const DEFAULT_HAND_SIZE: usize = 6;
const DEFAULT_MAX_DUPLICATE_METALS: usize = 3;
const DEFAULT_CHANCE_CARDS_PER_TEAM: usize = 3;
const DEFAULT_WINS_TO_TAKE_SERIES: u32 = 2;
const DEFAULT_MAX_WIRES_PER_NODE: usize = 2;

/// Tunables for one match. Every field falls back to the standard rules when
/// omitted from JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MatchConfig {
    /// Countdown for every timed phase, in seconds.
    pub phase_seconds: u32,
    pub hand_size: usize,
    /// A drawn hand is rerolled when any metal shows up more often than this.
    pub max_duplicate_metals: usize,
    pub chance_cards_per_team: usize,
    pub wins_to_take_series: u32,
    pub max_wires_per_node: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            phase_seconds: DEFAULT_PHASE_SECONDS,
            hand_size: DEFAULT_HAND_SIZE,
            max_duplicate_metals: DEFAULT_MAX_DUPLICATE_METALS,
            chance_cards_per_team: DEFAULT_CHANCE_CARDS_PER_TEAM,
            wins_to_take_series: DEFAULT_WINS_TO_TAKE_SERIES,
            max_wires_per_node: DEFAULT_MAX_WIRES_PER_NODE,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ConfigError {
    Parse { message: String },
    ZeroPhaseSeconds,
    ZeroWinsToTakeSeries,
    ZeroWiresPerNode,
    UnsatisfiableHand {
        hand_size: usize,
        max_duplicate_metals: usize,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Parse { message } => write!(f, "invalid match config: {message}"),
            ConfigError::ZeroPhaseSeconds => f.write_str("phase_seconds must be positive"),
            ConfigError::ZeroWinsToTakeSeries => {
                f.write_str("wins_to_take_series must be positive")
            }
            ConfigError::ZeroWiresPerNode => f.write_str("max_wires_per_node must be positive"),
            ConfigError::UnsatisfiableHand {
                hand_size,
                max_duplicate_metals,
            } => write!(
                f,
                "a hand of {hand_size} cannot be drawn with at most {max_duplicate_metals} of each metal"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

impl MatchConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: MatchConfig = serde_json::from_str(json).map_err(|err| ConfigError::Parse {
            message: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.phase_seconds == 0 {
            return Err(ConfigError::ZeroPhaseSeconds);
        }
        if self.wins_to_take_series == 0 {
            return Err(ConfigError::ZeroWinsToTakeSeries);
        }
        if self.max_wires_per_node == 0 {
            return Err(ConfigError::ZeroWiresPerNode);
        }
        if self.hand_size > self.max_duplicate_metals * Metal::ALL.len() {
            return Err(ConfigError::UnsatisfiableHand {
                hand_size: self.hand_size,
                max_duplicate_metals: self.max_duplicate_metals,
            });
        }
        Ok(())
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}
