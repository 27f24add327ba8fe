//! Schema validation helpers.
//!
//! Checks a `serde_json::Value` against a [`Schema`]: presence of required
//! attributes, value types, nested block counts and the value constraints
//! attached to FortiFlex configuration parameters.
//!
//! # Example
//!
//! ```
//! use fortiflex_provider::schema::{Attribute, Constraint, Schema};
//! use fortiflex_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("name", Attribute::required_string())
//!     .with_attribute(
//!         "status",
//!         Attribute::optional_string()
//!             .with_constraint(Constraint::OneOf(vec!["ACTIVE", "DISABLED"])),
//!     );
//!
//! assert!(validate(&schema, &json!({"name": "lab", "status": "ACTIVE"})).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"name": "lab", "status": "PAUSED"}));
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].summary, "Invalid value of parameter: status");
//! ```

use crate::schema::{
    Attribute, AttributeType, Block, BlockNestingMode, Constraint, Diagnostic, NestedBlock, Schema,
};
use serde_json::Value;
use std::collections::HashMap;

/// Check configuration against a schema, returning every problem found.
///
/// Null counts as absent. Computed-only attributes are skipped.
/// Constraints run only on values that are present,
/// and nested blocks are checked recursively against their item bounds.
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    validate_block(&schema.block, value, "", &mut diagnostics);
    diagnostics
}

/// [`validate`] as a `Result`, for callers that stop at the first invalid config.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Check if a JSON value is valid against a schema.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

/// Check a single present value against one constraint.
///
/// `name` is the user-facing parameter name, such as `fgt_vm_bundle.cpu_size`.
pub fn check_constraint(constraint: &Constraint, name: &str, value: &Value) -> Option<Diagnostic> {
    match constraint {
        Constraint::OneOf(valid) => {
            let text = value.as_str()?;
            if valid.contains(&text) {
                None
            } else {
                Some(constraint_error(
                    name,
                    text,
                    format!("Valid values: {}", bracketed(valid)),
                ))
            }
        },
        Constraint::EachOneOf(valid) => {
            let items = value.as_array()?;
            let bad = items
                .iter()
                .filter_map(Value::as_str)
                .find(|item| !valid.contains(item))?;
            Some(constraint_error(
                name,
                bad,
                format!(
                    "Valid values (you can select multiple values): {}",
                    bracketed(valid)
                ),
            ))
        },
        Constraint::IntRange(lower, upper) => {
            let number = value.as_i64()?;
            if (*lower..=*upper).contains(&number) {
                None
            } else {
                Some(range_error(name, &number.to_string(), *lower, *upper))
            }
        },
        Constraint::IntStringRange(lower, upper) => {
            let text = value.as_str()?;
            match text.trim().parse::<i64>() {
                Ok(number) if (*lower..=*upper).contains(&number) => None,
                _ => Some(range_error(name, text, *lower, *upper)),
            }
        },
    }
}

fn validate_block(block: &Block, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let obj = match value {
        Value::Object(map) => map,
        Value::Null => return,
        _ => {
            diagnostics.push(
                Diagnostic::error("Expected object")
                    .with_detail(format!("Got {}", value_type_name(value)))
                    .with_attribute_if_not_empty(path),
            );
            return;
        },
    };

    for (name, attr) in &block.attributes {
        let attr_path = join_path(path, name);
        validate_attribute(attr, obj.get(name), &attr_path, diagnostics);
    }

    for (name, nested_block) in &block.blocks {
        let block_path = join_path(path, name);
        validate_nested_block(nested_block, obj.get(name), &block_path, diagnostics);
    }
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    // Computed-only attributes are owned by the provider.
    if attr.flags.computed && !attr.flags.optional && !attr.flags.required {
        return;
    }

    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
        },
        Some(v) => {
            let before = diagnostics.len();
            validate_attribute_type(&attr.attr_type, v, path, diagnostics);
            if diagnostics.len() > before {
                return;
            }
            diagnostics.extend(
                attr.constraints
                    .iter()
                    .filter_map(|constraint| check_constraint(constraint, path, v))
                    .map(|diagnostic| diagnostic.with_attribute(path)),
            );
        },
    }
}

fn validate_attribute_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match attr_type {
        AttributeType::String => {
            if !value.is_string() {
                diagnostics.push(type_error(path, "string", value));
            }
        },
        AttributeType::Int64 => {
            if !is_int64(value) {
                diagnostics.push(type_error(path, "int64", value));
            }
        },
        AttributeType::Float64 => {
            if !value.is_number() {
                diagnostics.push(type_error(path, "float64", value));
            }
        },
        AttributeType::Bool => {
            if !value.is_boolean() {
                diagnostics.push(type_error(path, "bool", value));
            }
        },
        AttributeType::List(element_type) | AttributeType::Set(element_type) => {
            if let Some(arr) = value.as_array() {
                for (i, elem) in arr.iter().enumerate() {
                    let elem_path = format!("{}.{}", path, i);
                    validate_attribute_type(element_type, elem, &elem_path, diagnostics);
                }
            } else {
                diagnostics.push(type_error(path, "list", value));
            }
        },
        AttributeType::Object(attrs) => {
            if let Some(obj) = value.as_object() {
                validate_object_type(attrs, obj, path, diagnostics);
            } else {
                diagnostics.push(type_error(path, "object", value));
            }
        },
    }
}

fn validate_object_type(
    attrs: &HashMap<String, AttributeType>,
    obj: &serde_json::Map<String, Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for (name, attr_type) in attrs {
        if let Some(value) = obj.get(name) {
            validate_attribute_type(attr_type, value, &join_path(path, name), diagnostics);
        }
    }
}

fn validate_nested_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match (nested.nesting_mode, value) {
        (_, None | Some(Value::Null)) => {
            if nested.min_items > 0 {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' requires at least {} item(s)",
                        path, nested.min_items
                    ))
                    .with_attribute(path),
                );
            }
        },
        (BlockNestingMode::Single, Some(v)) => {
            validate_block(&nested.block, v, path, diagnostics);
        },
        (BlockNestingMode::List, Some(Value::Array(arr))) => {
            let len = arr.len() as u32;
            if len < nested.min_items {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' requires at least {} item(s), got {}",
                        path, nested.min_items, len
                    ))
                    .with_attribute(path),
                );
            }
            // max_items of 0 means unlimited
            if nested.max_items > 0 && len > nested.max_items {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' allows at most {} item(s), got {}",
                        path, nested.max_items, len
                    ))
                    .with_attribute(path),
                );
            }
            for (i, item) in arr.iter().enumerate() {
                let item_path = format!("{}.{}", path, i);
                validate_block(&nested.block, item, &item_path, diagnostics);
            }
        },
        (BlockNestingMode::List, Some(v)) => {
            diagnostics.push(
                Diagnostic::error(format!("Expected list for block '{}'", path))
                    .with_detail(format!("Got {}", value_type_name(v)))
                    .with_attribute(path),
            );
        },
    }
}

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

fn bracketed(values: &[&str]) -> String {
    format!("[{}]", values.join(" "))
}

fn constraint_error(name: &str, value: &str, valid: String) -> Diagnostic {
    Diagnostic::error(format!("Invalid value of parameter: {}", name))
        .with_detail(format!("Invalid {} value: {}\n{}", name, value, valid))
}

fn range_error(name: &str, value: &str, lower: i64, upper: i64) -> Diagnostic {
    constraint_error(
        name,
        value,
        format!(
            "Valid values: number between {} and {} (inclusive)",
            lower, upper
        ),
    )
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_int64(value: &Value) -> bool {
    match value {
        Value::Number(n) => {
            n.is_i64()
                || n
                    .as_f64()
                    .map(|f| f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64)
                    .unwrap_or(false)
        },
        _ => false,
    }
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic::error(format!("Invalid type for attribute '{}'", path))
        .with_detail(format!("Expected {}, got {}", expected, value_type_name(got)))
        .with_attribute(path)
}

trait DiagnosticExt {
    fn with_attribute_if_not_empty(self, path: &str) -> Self;
}

impl DiagnosticExt for Diagnostic {
    fn with_attribute_if_not_empty(self, path: &str) -> Self {
        if path.is_empty() {
            self
        } else {
            self.with_attribute(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, AttributeFlags, Block, NestedBlock, Schema};
    use serde_json::json;

    #[test]
    fn test_validate_required_string() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());

        assert!(validate(&schema, &json!({"name": "lab-config"})).is_empty());

        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("name".to_string()));

        let diagnostics = validate(&schema, &json!({"name": null}));
        assert_eq!(diagnostics.len(), 1);

        let diagnostics = validate(&schema, &json!({"name": 123}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid type"));
    }

    #[test]
    fn test_validate_computed_attribute_skipped() {
        let schema = Schema::v0().with_attribute("token", Attribute::computed_string());

        assert!(validate(&schema, &json!({})).is_empty());
        assert!(validate(&schema, &json!({"token": 123})).is_empty());
    }

    #[test]
    fn test_validate_int64() {
        let schema = Schema::v0().with_attribute("config_id", Attribute::required_int64());

        assert!(validate(&schema, &json!({"config_id": 42})).is_empty());
        assert!(validate(&schema, &json!({"config_id": 42.0})).is_empty());
        assert_eq!(validate(&schema, &json!({"config_id": 42.5})).len(), 1);
        assert_eq!(validate(&schema, &json!({"config_id": "42"})).len(), 1);
    }

    #[test]
    fn test_validate_list() {
        let schema = Schema::v0().with_attribute(
            "retrieve_status",
            Attribute::new(
                AttributeType::list(AttributeType::String),
                AttributeFlags::required(),
            ),
        );

        assert!(validate(&schema, &json!({"retrieve_status": ["STOPPED", "PENDING"]})).is_empty());
        assert!(validate(&schema, &json!({"retrieve_status": []})).is_empty());

        let diagnostics = validate(&schema, &json!({"retrieve_status": ["STOPPED", 1]}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("retrieve_status.1".to_string()));

        assert_eq!(
            validate(&schema, &json!({"retrieve_status": "STOPPED"})).len(),
            1
        );
    }

    #[test]
    fn test_one_of_constraint() {
        let schema = Schema::v0().with_block(
            "fgt_vm_bundle",
            NestedBlock::single(Block::new().with_attribute(
                "service_pkg",
                Attribute::optional_string()
                    .with_constraint(Constraint::OneOf(vec!["FC", "UTM", "ENT", "ATP"])),
            )),
        );

        assert!(validate(&schema, &json!({"fgt_vm_bundle": {"service_pkg": "UTM"}})).is_empty());

        let diagnostics = validate(&schema, &json!({"fgt_vm_bundle": {"service_pkg": "PRO"}}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].summary,
            "Invalid value of parameter: fgt_vm_bundle.service_pkg"
        );
        assert_eq!(
            diagnostics[0].detail.as_deref(),
            Some("Invalid fgt_vm_bundle.service_pkg value: PRO\nValid values: [FC UTM ENT ATP]")
        );
    }

    #[test]
    fn test_int_range_constraint() {
        let schema = Schema::v0().with_attribute(
            "vdom_num",
            Attribute::optional_int64().with_constraint(Constraint::IntRange(1, 500)),
        );

        assert!(validate(&schema, &json!({"vdom_num": 1})).is_empty());
        assert!(validate(&schema, &json!({"vdom_num": 500})).is_empty());

        let diagnostics = validate(&schema, &json!({"vdom_num": 501}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0]
            .detail
            .as_deref()
            .unwrap()
            .ends_with("number between 1 and 500 (inclusive)"));
    }

    #[test]
    fn test_int_string_range_constraint() {
        let constraint = Constraint::IntStringRange(1, 96);

        assert!(check_constraint(&constraint, "fgt_vm_lcs.cpu_size", &json!("96")).is_none());
        assert!(check_constraint(&constraint, "fgt_vm_lcs.cpu_size", &json!("97")).is_some());

        let diagnostic = check_constraint(&constraint, "fgt_vm_lcs.cpu_size", &json!("four"))
            .expect("non-numeric string must be rejected");
        assert!(diagnostic
            .detail
            .unwrap()
            .starts_with("Invalid fgt_vm_lcs.cpu_size value: four"));
    }

    #[test]
    fn test_each_one_of_constraint() {
        let constraint = Constraint::EachOneOf(vec!["IPS", "AVDB", "FURL"]);

        assert!(check_constraint(&constraint, "services", &json!(["IPS", "FURL"])).is_none());
        assert!(check_constraint(&constraint, "services", &json!([])).is_none());

        let diagnostic = check_constraint(&constraint, "services", &json!(["IPS", "XDR"]))
            .expect("unknown element must be rejected");
        assert!(diagnostic.detail.unwrap().contains("Invalid services value: XDR"));
    }

    #[test]
    fn test_constraint_skipped_on_type_error() {
        let schema = Schema::v0().with_attribute(
            "adom_num",
            Attribute::optional_int64().with_constraint(Constraint::IntRange(1, 100000)),
        );

        let diagnostics = validate(&schema, &json!({"adom_num": "many"}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid type"));
    }

    #[test]
    fn test_validate_nested_block_list() {
        let schema = Schema::v0().with_block(
            "entitlements",
            NestedBlock::list(
                Block::new().with_attribute("serial_number", Attribute::required_string()),
            )
            .with_min_items(1)
            .with_max_items(2),
        );

        assert!(validate(
            &schema,
            &json!({"entitlements": [{"serial_number": "FGVMMLTM00000001"}]})
        )
        .is_empty());

        let diagnostics = validate(&schema, &json!({"entitlements": []}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("at least 1"));

        let diagnostics = validate(
            &schema,
            &json!({"entitlements": [
                {"serial_number": "a"}, {"serial_number": "b"}, {"serial_number": "c"}
            ]}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("at most 2"));

        let diagnostics = validate(&schema, &json!({"entitlements": [{"serial_number": 7}]}));
        assert_eq!(
            diagnostics[0].attribute,
            Some("entitlements.0.serial_number".to_string())
        );
    }

    #[test]
    fn test_validate_object_type() {
        let schema = Schema::v0().with_attribute(
            "entitlement",
            Attribute::new(
                AttributeType::object([
                    ("serial_number", AttributeType::String),
                    ("config_id", AttributeType::Int64),
                ]),
                AttributeFlags::required(),
            ),
        );

        assert!(validate(
            &schema,
            &json!({"entitlement": {"serial_number": "FGVM01", "config_id": 3}})
        )
        .is_empty());

        let diagnostics = validate(
            &schema,
            &json!({"entitlement": {"serial_number": "FGVM01", "config_id": "3"}}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].attribute,
            Some("entitlement.config_id".to_string())
        );
    }

    #[test]
    fn test_helpers() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());

        assert!(is_valid(&schema, &json!({"name": "test"})));
        assert!(!is_valid(&schema, &json!({})));
        assert!(validate_result(&schema, &json!({"name": "test"})).is_ok());
        assert_eq!(validate_result(&schema, &json!({})).unwrap_err().len(), 1);
    }

    #[test]
    fn test_validate_root_not_object() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());

        let diagnostics = validate(&schema, &json!("not an object"));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Expected object"));
    }
}
