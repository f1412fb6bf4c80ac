//! Block finalization: scaling, rounding and hashing of trial rows.

use crate::csv;
use md5::{Digest, Md5};
use ucm_core::device::float_str;
use ucm_core::{Trial, TrialLayout};

/// Decimals kept in exported cells. Hashing works on the rounded values so the
/// hash matches what ends up in the file.
pub const DECIMALS: i32 = 5;

pub const SESSION_COLUMNS: [&str; 10] = [
    "task",
    "time",
    "time_iso",
    "block",
    "treatment",
    "hash",
    "warm_up",
    "trial_duration",
    "cool_down",
    "rating",
];

/// Rounds half to even, matching the usual numeric-array convention.
pub fn round_cell(x: f64) -> f64 {
    let scale = 10f64.powi(DECIMALS);
    (x * scale).round_ties_even() / scale
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumericTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl NumericTable {
    pub fn to_csv(&self) -> Vec<u8> {
        csv::numeric_table(&self.columns, &self.rows)
    }

    pub fn hash(&self) -> String {
        content_hash(&self.rows)
    }
}

/// Turns the trials of a block into the exported numeric table: the two value
/// columns are scaled from 0..1 to 0..100, then every cell is rounded.
pub fn finalize_trials(trials: &[Trial], layout: TrialLayout) -> NumericTable {
    let rows = trials
        .iter()
        .map(|t| {
            let mut row = t.row(layout);
            for cell in row.iter_mut().take(2) {
                *cell *= 100.0;
            }
            row.into_iter().map(round_cell).collect()
        })
        .collect();
    NumericTable {
        columns: layout.columns().iter().map(|c| c.to_string()).collect(),
        rows,
    }
}

/// Lowercase hex MD5 over the cells as little-endian `f64`, row-major.
pub fn content_hash(rows: &[Vec<f64>]) -> String {
    let mut hasher = Md5::new();
    for cell in rows.iter().flatten() {
        hasher.update(cell.to_le_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Summary of one completed scored block.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRow {
    pub task: String,
    pub time: f64,
    pub time_iso: String,
    pub block: usize,
    pub treatment: String,
    pub hash: String,
    pub warm_up: f64,
    pub trial_duration: f64,
    pub cool_down: f64,
    pub rating: Option<u8>,
}

impl SessionRow {
    pub fn cells(&self) -> Vec<String> {
        vec![
            self.task.clone(),
            float_str(self.time),
            self.time_iso.clone(),
            self.block.to_string(),
            self.treatment.clone(),
            self.hash.clone(),
            float_str(self.warm_up),
            float_str(self.trial_duration),
            float_str(self.cool_down),
            self.rating.map(|r| r.to_string()).unwrap_or_default(),
        ]
    }
}
