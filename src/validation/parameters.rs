//! Parameter validation against declared types and constraints.
//!
//! Policy: fail fast. Parameters are checked in declared `position` order
//! (declaration order breaks ties) and the first violation is returned.

use regex::Regex;
use serde_json::Value;

use super::{ValidationError, ValidationResult};
use crate::model::{ParameterDefinition, ParameterType, ParameterValues};
use crate::value::{is_absent, parse_instant};

/// Fill in declared defaults for parameters the caller did not supply.
pub fn apply_defaults(definitions: &[ParameterDefinition], values: &mut ParameterValues) {
    for definition in definitions {
        if !is_absent(values.get(&definition.name)) {
            continue;
        }
        if let Some(default) = &definition.default_value {
            values.insert(definition.name.clone(), default.clone());
        }
    }
}

/// Validate supplied values against their definitions.
pub fn validate_parameters(
    definitions: &[ParameterDefinition],
    values: &ParameterValues,
) -> ValidationResult<()> {
    let mut ordered: Vec<&ParameterDefinition> = definitions.iter().collect();
    ordered.sort_by_key(|d| d.position);

    for definition in ordered {
        let value = values.get(&definition.name);
        if is_absent(value) {
            if definition.required {
                return Err(ValidationError::RequiredParameterMissing {
                    name: definition.name.clone(),
                });
            }
            continue;
        }
        if let Some(value) = value {
            validate_value(definition, value)?;
        }
    }
    Ok(())
}

/// Check one present value against its definition.
pub fn validate_value(definition: &ParameterDefinition, value: &Value) -> ValidationResult<()> {
    let name = definition.name.as_str();
    match definition.param_type {
        ParameterType::Number => validate_number(definition, value),
        ParameterType::Text => validate_text(definition, value),
        ParameterType::Date => {
            if parse_instant(value).is_none() {
                return Err(ValidationError::invalid_parameter(name, "not a valid date"));
            }
            Ok(())
        }
        ParameterType::DateRange => validate_date_range(name, value),
        ParameterType::Boolean => {
            if !value.is_boolean() {
                return Err(ValidationError::invalid_parameter(name, "expected a boolean"));
            }
            Ok(())
        }
        ParameterType::Select => {
            if !is_declared_option(definition, value) {
                return Err(ValidationError::invalid_parameter(
                    name,
                    format!("{} is not one of the allowed options", value),
                ));
            }
            Ok(())
        }
        ParameterType::MultiSelect => {
            let Some(items) = value.as_array() else {
                return Err(ValidationError::invalid_parameter(name, "expected an array"));
            };
            if let Some(bad) = items.iter().find(|v| !is_declared_option(definition, v)) {
                return Err(ValidationError::invalid_parameter(
                    name,
                    format!("{} is not one of the allowed options", bad),
                ));
            }
            Ok(())
        }
        ParameterType::EntityRef => match value {
            Value::String(s) if !s.trim().is_empty() => Ok(()),
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(()),
            _ => Err(ValidationError::invalid_parameter(
                name,
                "expected an entity identifier",
            )),
        },
    }
}

fn validate_number(definition: &ParameterDefinition, value: &Value) -> ValidationResult<()> {
    let name = definition.name.as_str();
    let Some(n) = value.as_f64() else {
        return Err(ValidationError::invalid_parameter(name, "expected a number"));
    };

    let rules = &definition.validation;
    if let Some(min) = rules.min {
        if n < min {
            return Err(ValidationError::invalid_parameter(
                name,
                format!("must be at least {}", min),
            ));
        }
    }
    if let Some(max) = rules.max {
        if n > max {
            return Err(ValidationError::invalid_parameter(
                name,
                format!("must be at most {}", max),
            ));
        }
    }
    Ok(())
}

fn validate_text(definition: &ParameterDefinition, value: &Value) -> ValidationResult<()> {
    let name = definition.name.as_str();
    let Some(s) = value.as_str() else {
        return Err(ValidationError::invalid_parameter(name, "expected a string"));
    };

    let rules = &definition.validation;
    let len = s.chars().count();
    if let Some(min) = rules.min_length {
        if len < min {
            return Err(ValidationError::invalid_parameter(
                name,
                format!("must be at least {} characters", min),
            ));
        }
    }
    if let Some(max) = rules.max_length {
        if len > max {
            return Err(ValidationError::invalid_parameter(
                name,
                format!("must be at most {} characters", max),
            ));
        }
    }
    if let Some(pattern) = &rules.pattern {
        let re = Regex::new(pattern).map_err(|e| {
            ValidationError::invalid_parameter(name, format!("invalid pattern: {}", e))
        })?;
        if !re.is_match(s) {
            return Err(ValidationError::invalid_parameter(
                name,
                format!("does not match pattern {}", pattern),
            ));
        }
    }
    Ok(())
}

fn validate_date_range(name: &str, value: &Value) -> ValidationResult<()> {
    let Some(range) = value.as_object() else {
        return Err(ValidationError::invalid_parameter(
            name,
            "expected an object with 'from' and 'to'",
        ));
    };
    for bound in ["from", "to"] {
        match range.get(bound) {
            Some(v) if !v.is_null() => {
                if parse_instant(v).is_none() {
                    return Err(ValidationError::invalid_parameter(
                        name,
                        format!("'{}' is not a valid date", bound),
                    ));
                }
            }
            _ => {
                return Err(ValidationError::invalid_parameter(
                    name,
                    format!("missing '{}'", bound),
                ));
            }
        }
    }
    Ok(())
}

/// Options constrain the value only when some are declared.
fn is_declared_option(definition: &ParameterDefinition, value: &Value) -> bool {
    definition.options.is_empty() || definition.options.iter().any(|o| &o.value == value)
}
