//! Settings records for each command kind.
//!
//! Every record is plain data with defaults for all fields, so a partially
//! written settings payload still deserializes. Range and required-field
//! checks live in [`Validate`] and report human-readable messages instead of
//! failing; they run at edit and load time, never during execution.

use crate::executor::automation::parse_key_combo;
use crate::executor::conditions::{CompareOperator, Expression};
use crate::executor::image_matching::MatchAlgorithm;
use crate::graph::Value;
use serde::{Deserialize, Serialize};

pub const MAX_WAIT_MS: u64 = 86_400_000;
pub const MAX_LOOP_COUNT: u32 = 1_000_000;
pub const MIN_POLL_INTERVAL_MS: u64 = 50;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 200;

/// Range and required-field checks. An empty list means the settings are valid.
pub trait Validate {
    fn validate(&self) -> Vec<String>;
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
}

/// Rectangle in logical screen pixels.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageQuery {
    pub path: String,
    /// Minimum match score, 0.0 exclusive to 1.0 inclusive.
    pub threshold: f32,
    pub region: Option<Region>,
    pub algorithm: MatchAlgorithm,
}

impl Default for ImageQuery {
    fn default() -> Self {
        Self {
            path: String::new(),
            threshold: 0.8,
            region: None,
            algorithm: MatchAlgorithm::Ncc,
        }
    }
}

impl Validate for ImageQuery {
    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.path.trim().is_empty() {
            errors.push("Image path is required".to_string());
        }
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            errors.push(format!(
                "Threshold must be greater than 0 and at most 1 (got {})",
                self.threshold
            ));
        }
        if let Some(region) = self.region {
            if region.width == 0 || region.height == 0 {
                errors.push("Search region must have a non-zero size".to_string());
            }
        }
        errors
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct WaitSettings {
    pub duration_ms: u64,
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self { duration_ms: 1000 }
    }
}

impl Validate for WaitSettings {
    fn validate(&self) -> Vec<String> {
        if self.duration_ms > MAX_WAIT_MS {
            vec![format!(
                "Wait duration must be at most {} ms (got {})",
                MAX_WAIT_MS, self.duration_ms
            )]
        } else {
            Vec::new()
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ClickSettings {
    pub x: i32,
    pub y: i32,
    pub button: MouseButton,
    pub click_count: u32,
}

impl Default for ClickSettings {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            button: MouseButton::Left,
            click_count: 1,
        }
    }
}

impl Validate for ClickSettings {
    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.x < 0 || self.y < 0 {
            errors.push(format!(
                "Click position must not be negative (got {}, {})",
                self.x, self.y
            ));
        }
        if !(1..=3).contains(&self.click_count) {
            errors.push(format!(
                "Click count must be between 1 and 3 (got {})",
                self.click_count
            ));
        }
        errors
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ClickImageSettings {
    pub image: ImageQuery,
    pub button: MouseButton,
    /// 0 waits until the image shows up.
    pub timeout_ms: u64,
    pub offset_x: i32,
    pub offset_y: i32,
}

impl Default for ClickImageSettings {
    fn default() -> Self {
        Self {
            image: ImageQuery::default(),
            button: MouseButton::Left,
            timeout_ms: 5000,
            offset_x: 0,
            offset_y: 0,
        }
    }
}

impl Validate for ClickImageSettings {
    fn validate(&self) -> Vec<String> {
        self.image.validate()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct KeyInputSettings {
    /// Key combination such as `Ctrl+Shift+S`.
    pub keys: String,
}

impl Default for KeyInputSettings {
    fn default() -> Self {
        Self {
            keys: "Enter".to_string(),
        }
    }
}

impl Validate for KeyInputSettings {
    fn validate(&self) -> Vec<String> {
        if self.keys.trim().is_empty() {
            return vec!["Key combination is required".to_string()];
        }
        match parse_key_combo(&self.keys) {
            Ok(_) => Vec::new(),
            Err(unknown) => vec![format!("Unknown key '{}' in '{}'", unknown, self.keys)],
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SetVariableSettings {
    pub name: String,
    pub value: Value,
}

impl Validate for SetVariableSettings {
    fn validate(&self) -> Vec<String> {
        validate_variable_name(&self.name)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct IfSettings {
    /// Condition expression, e.g. `$count >= 3`.
    pub condition: String,
}

impl Default for IfSettings {
    fn default() -> Self {
        Self {
            condition: "true".to_string(),
        }
    }
}

impl Validate for IfSettings {
    fn validate(&self) -> Vec<String> {
        if self.condition.trim().is_empty() {
            return vec!["Condition is required".to_string()];
        }
        match Expression::parse(&self.condition) {
            Ok(_) => Vec::new(),
            Err(e) => vec![format!("Invalid condition: {}", e)],
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct IfVariableSettings {
    pub name: String,
    pub operator: CompareOperator,
    pub value: String,
}

impl Validate for IfVariableSettings {
    fn validate(&self) -> Vec<String> {
        let mut errors = validate_variable_name(&self.name);
        if self.operator.is_numeric() && self.value.trim().parse::<f64>().is_err() {
            errors.push(format!(
                "Operator {:?} needs a numeric compare value (got '{}')",
                self.operator, self.value
            ));
        }
        errors
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct IfImageExistSettings {
    pub image: ImageQuery,
}

impl Validate for IfImageExistSettings {
    fn validate(&self) -> Vec<String> {
        self.image.validate()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct LoopSettings {
    pub loop_count: u32,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self { loop_count: 1 }
    }
}

impl Validate for LoopSettings {
    fn validate(&self) -> Vec<String> {
        if self.loop_count > MAX_LOOP_COUNT {
            vec![format!(
                "Loop count must be at most {} (got {})",
                MAX_LOOP_COUNT, self.loop_count
            )]
        } else {
            Vec::new()
        }
    }
}

/// Shared by WaitImageExist and WaitImageNotExist.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct WaitImageSettings {
    pub image: ImageQuery,
    /// 0 waits forever.
    pub timeout_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for WaitImageSettings {
    fn default() -> Self {
        Self {
            image: ImageQuery::default(),
            timeout_ms: 0,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl WaitImageSettings {
    /// Poll interval with the 50 ms floor applied.
    pub fn effective_poll_interval_ms(&self) -> u64 {
        self.poll_interval_ms.max(MIN_POLL_INTERVAL_MS)
    }
}

impl Validate for WaitImageSettings {
    fn validate(&self) -> Vec<String> {
        let mut errors = self.image.validate();
        if self.poll_interval_ms < MIN_POLL_INTERVAL_MS {
            errors.push(format!(
                "Poll interval must be at least {} ms (got {})",
                MIN_POLL_INTERVAL_MS, self.poll_interval_ms
            ));
        }
        errors
    }
}

fn validate_variable_name(name: &str) -> Vec<String> {
    if name.trim().is_empty() {
        vec!["Variable name is required".to_string()]
    } else if name.chars().any(char::is_whitespace) {
        vec![format!("Variable name '{}' must not contain whitespace", name)]
    } else {
        Vec::new()
    }
}
