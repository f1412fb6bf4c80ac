//! Settings consumed by the task and the export pipeline.
//!
//! Values come from a TOML file where every numeric entry may be written as an
//! integer, a float or a string. Each entry is verified on load; anything
//! unparsable or out of range falls back to its documented default with a
//! warning instead of failing.

use crate::device::create_user_identifier;
use crate::trial::TrialLayout;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use toml::Value;
use tracing::{info, warn};

pub const DEFAULT_TASK: &str = "Circle Task";
pub const DEFAULT_SERVER: &str = "http://127.0.0.1:5000";
/// Upper bound for every count setting (trials, blocks, block indices).
pub const MAX_COUNT: usize = 10_000;

/// Additional sub-goal applied to the sliders during a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintType {
    #[default]
    None,
    /// One randomly chosen slider carries the extra target.
    Single,
    /// Both sliders carry it.
    Double,
}

impl ConstraintType {
    fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            1 => Some(Self::Single),
            2 => Some(Self::Double),
            _ => None,
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "none" => Some(Self::None),
            "single" => Some(Self::Single),
            "double" => Some(Self::Double),
            other => other.parse().ok().and_then(Self::from_code),
        }
    }
}

/// What happens after a block in which one slider was never used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidBlockPolicy {
    /// Treat the block as the last one and end the session.
    #[default]
    AbortSession,
    /// Run the same block again; it does not count towards progress.
    RetryBlock,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CircleTaskSettings {
    pub n_trials: usize,
    pub n_blocks: usize,
    pub n_practice_trials: usize,
    pub n_practice_blocks: usize,
    pub constrained_block: usize,
    pub constraint_type: ConstraintType,
    pub practice_constraint: ConstraintType,
    /// Seconds.
    pub warm_up: f64,
    pub trial_duration: f64,
    pub cool_down: f64,
    pub layout: TrialLayout,
    pub invalid_block_policy: InvalidBlockPolicy,
}

impl Default for CircleTaskSettings {
    fn default() -> Self {
        Self {
            n_trials: 20,
            n_blocks: 3,
            n_practice_trials: 5,
            n_practice_blocks: 2,
            constrained_block: 2,
            constraint_type: ConstraintType::Single,
            practice_constraint: ConstraintType::Double,
            warm_up: 1.0,
            trial_duration: 3.0,
            cool_down: 0.5,
            layout: TrialLayout::Full,
            invalid_block_policy: InvalidBlockPolicy::AbortSession,
        }
    }
}

impl CircleTaskSettings {
    /// Period of the repeating trial tick.
    pub fn cycle_period(&self) -> f64 {
        self.warm_up + self.trial_duration + self.cool_down
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataCollectionSettings {
    pub is_local_storage_enabled: bool,
    pub is_upload_enabled: bool,
    pub is_email_enabled: bool,
    pub server_uri: String,
    pub email_recipient: String,
    pub storage_root: Option<PathBuf>,
}

impl Default for DataCollectionSettings {
    fn default() -> Self {
        Self {
            is_local_storage_enabled: false,
            is_upload_enabled: true,
            is_email_enabled: false,
            server_uri: DEFAULT_SERVER.to_string(),
            email_recipient: String::new(),
            storage_root: None,
        }
    }
}

impl DataCollectionSettings {
    /// Directory local files are written under.
    pub fn storage_root(&self) -> PathBuf {
        self.storage_root.clone().unwrap_or_else(default_storage_root)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub current_user: String,
    pub current_task: String,
    pub circle_task: CircleTaskSettings,
    pub data_collection: DataCollectionSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            current_user: create_user_identifier(),
            current_task: DEFAULT_TASK.to_string(),
            circle_task: CircleTaskSettings::default(),
            data_collection: DataCollectionSettings::default(),
        }
    }
}

/// Settings file as written by hand, before verification.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawSettings {
    pub general: RawGeneral,
    pub circle_task: RawCircleTask,
    pub data_collection: RawDataCollection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawGeneral {
    pub current_user: Option<String>,
    pub task: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawCircleTask {
    pub n_trials: Option<Value>,
    pub n_blocks: Option<Value>,
    pub n_practice_trials: Option<Value>,
    pub n_practice_blocks: Option<Value>,
    pub constrained_block: Option<Value>,
    pub constraint_type: Option<Value>,
    pub practice_constraint: Option<Value>,
    pub warm_up_time: Option<Value>,
    pub trial_duration: Option<Value>,
    pub cool_down_time: Option<Value>,
    pub trial_layout: Option<TrialLayout>,
    pub invalid_block_policy: Option<InvalidBlockPolicy>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawDataCollection {
    pub is_local_storage_enabled: Option<Value>,
    pub is_upload_enabled: Option<Value>,
    pub is_email_enabled: Option<Value>,
    pub webserver: Option<String>,
    pub email_recipient: Option<String>,
    pub storage_root: Option<PathBuf>,
}

impl Settings {
    /// Loads settings from `path`. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(path = %path.display(), "Settings file not found, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let settings = Self::from_toml_str(&text)?;
        info!(path = %path.display(), "Loaded settings");
        Ok(settings)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let raw: RawSettings = toml::from_str(text)?;
        Ok(Self::from_raw(raw))
    }

    pub fn from_raw(raw: RawSettings) -> Self {
        let d = CircleTaskSettings::default();
        let ct = &raw.circle_task;
        let circle_task = CircleTaskSettings {
            n_trials: verify_count("n_trials", ct.n_trials.as_ref(), d.n_trials, |x| x > 0),
            n_blocks: verify_count("n_blocks", ct.n_blocks.as_ref(), d.n_blocks, |x| x > 0),
            n_practice_trials: verify_count(
                "n_practice_trials",
                ct.n_practice_trials.as_ref(),
                d.n_practice_trials,
                |_| true,
            ),
            n_practice_blocks: verify_count(
                "n_practice_blocks",
                ct.n_practice_blocks.as_ref(),
                d.n_practice_blocks,
                |_| true,
            ),
            constrained_block: verify_count(
                "constrained_block",
                ct.constrained_block.as_ref(),
                d.constrained_block,
                |_| true,
            ),
            constraint_type: verify_constraint(
                "constraint_type",
                ct.constraint_type.as_ref(),
                d.constraint_type,
            ),
            practice_constraint: verify_constraint(
                "practice_constraint",
                ct.practice_constraint.as_ref(),
                d.practice_constraint,
            ),
            warm_up: verify_seconds("warm_up_time", ct.warm_up_time.as_ref(), d.warm_up),
            trial_duration: verify_seconds(
                "trial_duration",
                ct.trial_duration.as_ref(),
                d.trial_duration,
            ),
            cool_down: verify_seconds("cool_down_time", ct.cool_down_time.as_ref(), d.cool_down),
            layout: ct.trial_layout.unwrap_or(d.layout),
            invalid_block_policy: ct.invalid_block_policy.unwrap_or(d.invalid_block_policy),
        };

        let dd = DataCollectionSettings::default();
        let dc = raw.data_collection;
        let data_collection = DataCollectionSettings {
            is_local_storage_enabled: verify_flag(
                "is_local_storage_enabled",
                dc.is_local_storage_enabled.as_ref(),
                dd.is_local_storage_enabled,
            ),
            is_upload_enabled: verify_flag(
                "is_upload_enabled",
                dc.is_upload_enabled.as_ref(),
                dd.is_upload_enabled,
            ),
            is_email_enabled: verify_flag(
                "is_email_enabled",
                dc.is_email_enabled.as_ref(),
                dd.is_email_enabled,
            ),
            server_uri: dc.webserver.unwrap_or(dd.server_uri),
            email_recipient: dc.email_recipient.unwrap_or(dd.email_recipient),
            storage_root: dc.storage_root,
        };

        Self {
            current_user: raw
                .general
                .current_user
                .filter(|u| !u.trim().is_empty())
                .unwrap_or_else(create_user_identifier),
            current_task: raw.general.task.unwrap_or_else(|| DEFAULT_TASK.to_string()),
            circle_task,
            data_collection,
        }
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(i) => Some(*i),
        Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
        Value::String(s) => s.trim().parse().ok(),
        Value::Boolean(b) => Some(*b as i64),
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Integer setting in `0..=MAX_COUNT`, `default` when missing or rejected.
pub fn verify_count(key: &str, raw: Option<&Value>, default: usize, ok: fn(usize) -> bool) -> usize {
    let Some(value) = raw else {
        return default;
    };
    match as_i64(value).and_then(|i| usize::try_from(i).ok()) {
        Some(n) if n <= MAX_COUNT && ok(n) => n,
        _ => {
            warn!(key, ?value, default, "Invalid setting, using default");
            default
        }
    }
}

/// Strictly positive duration in seconds, `default` when missing or rejected.
pub fn verify_seconds(key: &str, raw: Option<&Value>, default: f64) -> f64 {
    let Some(value) = raw else {
        return default;
    };
    match as_f64(value) {
        Some(s) if s.is_finite() && s > 0.0 => s,
        _ => {
            warn!(key, ?value, default, "Invalid duration, using default");
            default
        }
    }
}

/// Boolean switch; accepts `true`/`false` as well as `0`/`1`.
pub fn verify_flag(key: &str, raw: Option<&Value>, default: bool) -> bool {
    let Some(value) = raw else {
        return default;
    };
    match value {
        Value::Boolean(b) => *b,
        Value::String(s) if s.eq_ignore_ascii_case("true") => true,
        Value::String(s) if s.eq_ignore_ascii_case("false") => false,
        other => match as_i64(other) {
            Some(0) => false,
            Some(1) => true,
            _ => {
                warn!(key, ?value, default, "Invalid switch, using default");
                default
            }
        },
    }
}

fn verify_constraint(key: &str, raw: Option<&Value>, default: ConstraintType) -> ConstraintType {
    let Some(value) = raw else {
        return default;
    };
    let parsed = match value {
        Value::String(s) => ConstraintType::from_name(s),
        other => as_i64(other).and_then(ConstraintType::from_code),
    };
    parsed.unwrap_or_else(|| {
        warn!(key, ?value, ?default, "Invalid constraint type, using default");
        default
    })
}

/// OS-dependent default directory for stored data.
pub fn default_storage_root() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("ucm"))
        .unwrap_or_else(|| PathBuf::from("./ucm_data"))
}

/// Reads an explicit settings file or fails; used when the user names one.
pub fn load_required(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Err(Error::Config(format!(
            "settings file not found: {}",
            path.display()
        )));
    }
    Settings::load(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let s = Settings::from_toml_str("").unwrap();
        assert_eq!(s.circle_task, CircleTaskSettings::default());
        assert_eq!(s.current_task, DEFAULT_TASK);
        assert!(!s.current_user.is_empty());
        assert_eq!(s.circle_task.cycle_period(), 4.5);
    }

    #[test]
    fn numeric_values_accept_strings() {
        let s = Settings::from_toml_str(
            r#"
            [circle_task]
            n_trials = "12"
            warm_up_time = "0.75"
            trial_duration = 2
            constraint_type = "double"
            "#,
        )
        .unwrap();
        assert_eq!(s.circle_task.n_trials, 12);
        assert_eq!(s.circle_task.warm_up, 0.75);
        assert_eq!(s.circle_task.trial_duration, 2.0);
        assert_eq!(s.circle_task.constraint_type, ConstraintType::Double);
    }

    #[test]
    fn non_positive_values_fall_back() {
        let s = Settings::from_toml_str(
            r#"
            [circle_task]
            n_trials = 0
            n_blocks = -4
            warm_up_time = 0.0
            trial_duration = "soon"
            cool_down_time = -1.5
            constraint_type = 7
            "#,
        )
        .unwrap();
        let d = CircleTaskSettings::default();
        assert_eq!(s.circle_task.n_trials, d.n_trials);
        assert_eq!(s.circle_task.n_blocks, d.n_blocks);
        assert_eq!(s.circle_task.warm_up, d.warm_up);
        assert_eq!(s.circle_task.trial_duration, d.trial_duration);
        assert_eq!(s.circle_task.cool_down, d.cool_down);
        assert_eq!(s.circle_task.constraint_type, d.constraint_type);
    }

    #[test]
    fn oversized_counts_fall_back() {
        let s = Settings::from_toml_str(
            r#"
            [circle_task]
            n_trials = 4611686018427387904
            n_practice_blocks = "10001"
            constrained_block = 10000
            "#,
        )
        .unwrap();
        let d = CircleTaskSettings::default();
        assert_eq!(s.circle_task.n_trials, d.n_trials);
        assert_eq!(s.circle_task.n_practice_blocks, d.n_practice_blocks);
        assert_eq!(s.circle_task.constrained_block, MAX_COUNT);
    }

    #[test]
    fn flags_accept_integers() {
        let s = Settings::from_toml_str(
            r#"
            [general]
            current_user = "abc"
            task = "Circle Task"

            [data_collection]
            is_local_storage_enabled = 1
            is_upload_enabled = 0
            is_email_enabled = "true"
            webserver = "https://example.org/"
            "#,
        )
        .unwrap();
        assert_eq!(s.current_user, "abc");
        assert!(s.data_collection.is_local_storage_enabled);
        assert!(!s.data_collection.is_upload_enabled);
        assert!(s.data_collection.is_email_enabled);
        assert_eq!(s.data_collection.server_uri, "https://example.org/");
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = Settings::from_toml_str("[circle_task\nn_trials = 3").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let s = Settings::load(&path).unwrap();
        assert_eq!(s.circle_task.n_trials, 20);
        assert!(load_required(&path).is_err());
    }
}
