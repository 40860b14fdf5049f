//! Strategy parameter definitions and validation

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EngineError;
use crate::Result;

/// Parameter values keyed by name, as received from the UI
pub type Params = serde_json::Map<String, Value>;

/// Parameter value kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    Number,
    String,
    Select,
}

/// One choice of a `select` parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterOption {
    pub value: Value,
    pub label: String,
}

/// UI-facing description of a tunable strategy parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDef {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: ParameterKind,
    pub default_value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ParameterOption>,
    pub required: bool,
}

impl ParameterDef {
    /// Numeric parameter
    pub fn number(name: &str, label: &str, default_value: f64) -> Self {
        Self::base(name, label, ParameterKind::Number, Value::from(default_value))
    }

    /// Free-text parameter
    pub fn text(name: &str, label: &str, default_value: &str) -> Self {
        Self::base(name, label, ParameterKind::String, Value::from(default_value))
    }

    /// Select parameter; the default must be one of the option values
    pub fn select(name: &str, label: &str, default_value: Value, options: Vec<ParameterOption>) -> Self {
        let mut def = Self::base(name, label, ParameterKind::Select, default_value);
        def.options = options;
        def
    }

    fn base(name: &str, label: &str, kind: ParameterKind, default_value: Value) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            kind,
            default_value,
            min: None,
            max: None,
            step: None,
            options: Vec::new(),
            required: false,
        }
    }

    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn with_step(mut self, step: f64) -> Self {
        self.step = Some(step);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Check one supplied parameter set against this definition.
    ///
    /// A missing optional parameter passes; the strategy falls back to the default.
    pub fn validate(&self, params: &Params) -> Result<()> {
        let Some(value) = params.get(&self.name).filter(|v| !v.is_null()) else {
            if self.required {
                return Err(self.invalid("is required"));
            }
            return Ok(());
        };

        match self.kind {
            ParameterKind::Number => {
                let number = value
                    .as_f64()
                    .filter(|n| n.is_finite())
                    .ok_or_else(|| self.invalid(format!("expected a number, got {value}")))?;
                if let Some(min) = self.min.filter(|min| number < *min) {
                    return Err(self.invalid(format!("{number} is below the minimum {min}")));
                }
                if let Some(max) = self.max.filter(|max| number > *max) {
                    return Err(self.invalid(format!("{number} is above the maximum {max}")));
                }
            }
            ParameterKind::String => {
                if !value.is_string() {
                    return Err(self.invalid(format!("expected a string, got {value}")));
                }
            }
            ParameterKind::Select => {
                if !self.options.iter().any(|option| &option.value == value) {
                    return Err(self.invalid(format!("{value} is not one of the allowed options")));
                }
            }
        }

        Ok(())
    }

    fn invalid(&self, reason: impl Into<String>) -> EngineError {
        EngineError::invalid_parameter(&self.name, reason)
    }
}

/// Validate a parameter set against every definition, stopping at the first failure
pub fn validate_params(definitions: &[ParameterDef], params: &Params) -> Result<()> {
    definitions.iter().try_for_each(|def| def.validate(params))
}

/// Read a numeric parameter, if present
pub fn number_param(params: &Params, name: &str) -> Option<f64> {
    params.get(name).and_then(Value::as_f64)
}
