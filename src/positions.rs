//! Where the planets sit in a chart.
//!
//! Positions are not computed from the birth date, time and place. The
//! [`FixedPositions`] source hands every request the same table, either the
//! built-in [`DEFAULT_POSITIONS`] or the `[chart.positions]` override from the
//! config file. [`PositionSource`] is the seam an ephemeris-backed source would
//! plug into.

use crate::config::ChartConfig;
use crate::models::BirthDetails;

/// Placeholder planet→house table used when the config has no override.
pub const DEFAULT_POSITIONS: [(&str, i64); 9] = [
    ("Sun", 1),
    ("Moon", 4),
    ("Mars", 7),
    ("Mercury", 3),
    ("Jupiter", 9),
    ("Venus", 6),
    ("Saturn", 10),
    ("Rahu", 11),
    ("Ketu", 12),
];

/// Produces planet→house positions for a request.
pub trait PositionSource: Send + Sync {
    fn positions(&self, details: &BirthDetails) -> Vec<(String, i64)>;
}

/// Returns the same positions for every request.
#[derive(Debug, Clone)]
pub struct FixedPositions {
    table: Vec<(String, i64)>,
}

impl FixedPositions {
    pub fn new(table: Vec<(String, i64)>) -> Self {
        Self { table }
    }

    pub fn from_config(config: &ChartConfig) -> Self {
        match &config.positions {
            Some(table) => Self::new(table.clone()),
            None => Self::default(),
        }
    }

    pub fn table(&self) -> &[(String, i64)] {
        &self.table
    }
}

impl Default for FixedPositions {
    fn default() -> Self {
        Self::new(
            DEFAULT_POSITIONS
                .iter()
                .map(|(name, house)| (name.to_string(), *house))
                .collect(),
        )
    }
}

impl PositionSource for FixedPositions {
    fn positions(&self, _details: &BirthDetails) -> Vec<(String, i64)> {
        self.table.clone()
    }
}
