//! Plain Rust types exchanged between the provider and the gRPC layer.
//!
//! These sit on top of the raw protobuf messages in [`crate::generated`].
//! The generic planner used by every FortiFlex resource lives here too.

use crate::schema::{BlockNestingMode, Diagnostic, Schema};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// A change to a single attribute during a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// The path to the attribute that changed.
    pub path: String,
    /// The value before the change (None if creating).
    pub before: Option<Value>,
    /// The value after the change (None if deleting).
    pub after: Option<Value>,
}

impl AttributeChange {
    /// Create a new attribute change.
    pub fn new(path: impl Into<String>, before: Option<Value>, after: Option<Value>) -> Self {
        Self {
            path: path.into(),
            before,
            after,
        }
    }

    /// Create a change for a new attribute.
    pub fn added(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, None, Some(value))
    }

    /// Create a change for a removed attribute.
    pub fn removed(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, Some(value), None)
    }

    /// Create a change for a modified attribute.
    pub fn modified(path: impl Into<String>, before: Value, after: Value) -> Self {
        Self::new(path, Some(before), Some(after))
    }
}

impl From<AttributeChange> for crate::generated::AttributeChange {
    fn from(change: AttributeChange) -> Self {
        let encode = |v: Option<Value>| {
            v.map(|v| serde_json::to_vec(&v).unwrap_or_default())
                .unwrap_or_default()
        };
        Self {
            path: change.path,
            before: encode(change.before),
            after: encode(change.after),
        }
    }
}

/// The result of a plan operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// The planned state after the operation.
    pub planned_state: Value,
    /// The list of attribute changes.
    pub changes: Vec<AttributeChange>,
    /// Whether the resource requires replacement.
    pub requires_replace: bool,
}

impl PlanResult {
    /// Create a plan result with no changes.
    pub fn no_change(state: Value) -> Self {
        Self {
            planned_state: state,
            changes: Vec::new(),
            requires_replace: false,
        }
    }

    /// Create a plan result with changes.
    pub fn with_changes(
        planned_state: Value,
        changes: Vec<AttributeChange>,
        requires_replace: bool,
    ) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace,
        }
    }

    /// Whether the plan leaves the resource untouched.
    pub fn is_no_op(&self) -> bool {
        self.changes.is_empty() && !self.requires_replace
    }
}

/// A state returned from a resource operation together with any warnings.
///
/// FortiFlex refuses some requested transitions without failing the whole
/// operation, for instance a PENDING entitlement cannot be forced to ACTIVE.
/// Those cases are reported as warning diagnostics next to the new state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateResult {
    /// The resulting state.
    pub state: Value,
    /// Non-fatal diagnostics produced along the way.
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

impl StateResult {
    /// A state without diagnostics.
    pub fn new(state: Value) -> Self {
        Self {
            state,
            diagnostics: Vec::new(),
        }
    }

    /// Attach diagnostics to this result.
    pub fn with_diagnostics(mut self, diagnostics: Vec<Diagnostic>) -> Self {
        self.diagnostics.extend(diagnostics);
        self
    }
}

impl From<Value> for StateResult {
    fn from(state: Value) -> Self {
        Self::new(state)
    }
}

/// An imported resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// The resource type.
    pub resource_type: String,
    /// The imported state.
    pub state: Value,
}

impl ImportedResource {
    /// Create a new imported resource.
    pub fn new(resource_type: impl Into<String>, state: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// Provider metadata returned by GetMetadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// List of resource type names.
    pub resources: Vec<String>,
    /// List of data source type names.
    pub data_sources: Vec<String>,
    /// Server capabilities.
    pub capabilities: ServerCapabilities,
}

/// Server capability flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ServerCapabilities {
    /// Whether the provider supports planning destroy operations.
    pub plan_destroy: bool,
}

/// The protocol version for the handshake.
pub const PROTOCOL_VERSION: u32 = 1;

/// The handshake prefix output by providers.
pub const HANDSHAKE_PREFIX: &str = "HEMMER_PROVIDER";

/// Plan a resource change from its schema alone.
///
/// - `proposed` of `None` (or null) plans a delete.
/// - Missing attributes with a schema default get the default.
/// - Missing computed attributes, nested blocks and computed fields of single
///   blocks keep their prior value.
/// - A change to a `force_new` attribute of an existing resource requires replacement.
pub fn plan_from_schema(schema: &Schema, prior: Option<&Value>, proposed: Option<&Value>) -> PlanResult {
    let prior = prior.filter(|v| !v.is_null());
    let proposed = match proposed.filter(|v| !v.is_null()) {
        Some(proposed) => proposed,
        None => return plan_delete(prior),
    };

    let mut planned = proposed.as_object().cloned().unwrap_or_default();
    let prior_obj = prior.and_then(Value::as_object);

    for (name, attr) in &schema.block.attributes {
        if is_unset(planned.get(name)) {
            if let Some(default) = &attr.default {
                planned.insert(name.clone(), default.clone());
                continue;
            }
            if attr.flags.computed {
                if let Some(previous) = prior_obj.and_then(|p| p.get(name)).filter(|v| !v.is_null()) {
                    planned.insert(name.clone(), previous.clone());
                }
            }
        }
    }
    for (name, nested) in &schema.block.blocks {
        let Some(previous) = prior_obj.and_then(|p| p.get(name)).filter(|v| !v.is_null()) else {
            continue;
        };
        if is_unset(planned.get(name)) {
            planned.insert(name.clone(), previous.clone());
            continue;
        }
        if nested.nesting_mode != BlockNestingMode::Single {
            continue;
        }
        if let (Some(Value::Object(block)), Value::Object(previous)) = (planned.get_mut(name), previous) {
            for (attr_name, attr) in &nested.block.attributes {
                if attr.flags.computed && is_unset(block.get(attr_name)) {
                    if let Some(value) = previous.get(attr_name).filter(|v| !v.is_null()) {
                        block.insert(attr_name.clone(), value.clone());
                    }
                }
            }
        }
    }

    let empty = Map::new();
    let before = prior_obj.unwrap_or(&empty);
    let changes = diff_objects(before, &planned);

    let requires_replace = prior.is_some()
        && changes.iter().any(|change| {
            change.before.is_some()
                && schema
                    .block
                    .attributes
                    .get(&change.path)
                    .map(|attr| attr.force_new)
                    .unwrap_or(false)
        });

    PlanResult::with_changes(Value::Object(planned), changes, requires_replace)
}

fn plan_delete(prior: Option<&Value>) -> PlanResult {
    let changes = prior
        .and_then(Value::as_object)
        .map(|obj| {
            obj.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| AttributeChange::removed(k.clone(), v.clone()))
                .collect()
        })
        .unwrap_or_default();
    PlanResult::with_changes(Value::Null, changes, false)
}

fn is_unset(value: Option<&Value>) -> bool {
    matches!(value, None | Some(Value::Null))
}

fn diff_objects(before: &Map<String, Value>, after: &Map<String, Value>) -> Vec<AttributeChange> {
    let keys: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
    keys.into_iter()
        .filter_map(|key| {
            let old = before.get(key).filter(|v| !v.is_null());
            let new = after.get(key).filter(|v| !v.is_null());
            match (old, new) {
                (Some(o), Some(n)) if o != n => {
                    Some(AttributeChange::modified(key.clone(), o.clone(), n.clone()))
                },
                (Some(o), None) => Some(AttributeChange::removed(key.clone(), o.clone())),
                (None, Some(n)) => Some(AttributeChange::added(key.clone(), n.clone())),
                _ => None,
            }
        })
        .collect()
}
