//! Long/short exposure chosen from a volatility forecast.

use serde::{Deserialize, Serialize};

/// Exposure for one step. There is no flat state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    #[default]
    Long,
    Short,
}

impl Position {
    /// Signed exposure in percent of balance.
    pub fn multiplier(&self) -> f64 {
        match self {
            Position::Long => 100.0,
            Position::Short => -100.0,
        }
    }

    /// Short when the forecast is strictly above the threshold.
    pub fn decide(forecast: f64, threshold: f64) -> Self {
        if forecast > threshold {
            Position::Short
        } else {
            Position::Long
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Position::Long => "long",
            Position::Short => "short",
        }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
