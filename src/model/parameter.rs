//! Typed runtime parameters a report accepts.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declared kind of a report parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterType {
    Text,
    Number,
    Date,
    DateRange,
    Boolean,
    Select,
    MultiSelect,
    /// Identifier of another entity (account, customer, user, ...).
    EntityRef,
}

impl ParameterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterType::Text => "text",
            ParameterType::Number => "number",
            ParameterType::Date => "date",
            ParameterType::DateRange => "date_range",
            ParameterType::Boolean => "boolean",
            ParameterType::Select => "select",
            ParameterType::MultiSelect => "multi_select",
            ParameterType::EntityRef => "entity_ref",
        }
    }
}

/// One choice of a `select` / `multi_select` parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Constraints checked against a supplied value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

/// A named, typed input of a report template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDefinition {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub validation: ValidationRules,
    #[serde(default)]
    pub options: Vec<SelectOption>,
    /// Referenced entity kind for `entity_ref` parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    #[serde(default)]
    pub position: u32,
}

impl ParameterDefinition {
    pub fn new(name: &str, param_type: ParameterType) -> Self {
        Self {
            name: name.into(),
            display_name: name.into(),
            param_type,
            default_value: None,
            required: false,
            validation: ValidationRules::default(),
            options: vec![],
            entity: None,
            position: 0,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn with_rules(mut self, rules: ValidationRules) -> Self {
        self.validation = rules;
        self
    }

    pub fn with_options(mut self, values: Vec<Value>) -> Self {
        self.options = values
            .into_iter()
            .map(|value| SelectOption { value, label: None })
            .collect();
        self
    }

    pub fn at_position(mut self, position: u32) -> Self {
        self.position = position;
        self
    }
}
