//! Managed FortiFlex resources.

mod config;
mod entitlement_cloud;
mod entitlement_hardware;
mod entitlement_vm;
mod entitlement_vm_token;
mod retrieve_vm_group;

pub use config::ConfigResource;
pub use entitlement_cloud::CloudEntitlementResource;
pub use entitlement_hardware::HardwareEntitlementResource;
pub use entitlement_vm::VmEntitlementResource;
pub use entitlement_vm_token::VmTokenResource;
pub use retrieve_vm_group::RetrieveVmGroupResource;

use crate::client::{Entitlement, UpdateEntitlementRequest};
use crate::entitlement::{
    plan_transition, EndDateDecision, EntitlementId, EntitlementKind, EntitlementStatus,
};
use crate::error::ProviderError;
use crate::provider::{ManagedResource, Session};
use crate::schema::{Attribute, AttributeType, Constraint, Diagnostic};
use crate::types::StateResult;
use chrono::Utc;
use serde_json::{json, Map, Value};

/// Every resource served by the provider.
pub fn all() -> Vec<Box<dyn ManagedResource>> {
    vec![
        Box::new(ConfigResource),
        Box::new(VmEntitlementResource),
        Box::new(HardwareEntitlementResource),
        Box::new(CloudEntitlementResource),
        Box::new(VmTokenResource),
        Box::new(RetrieveVmGroupResource),
    ]
}

/// A non-empty string attribute.
pub(crate) fn str_attr<'a>(state: &'a Value, key: &str) -> Option<&'a str> {
    state.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// An integer attribute, accepting numeric strings.
pub(crate) fn i64_attr(state: &Value, key: &str) -> Option<i64> {
    match state.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn bool_attr(state: &Value, key: &str) -> Option<bool> {
    state.get(key).and_then(Value::as_bool)
}

pub(crate) fn f64_attr(state: &Value, key: &str) -> Option<f64> {
    state.get(key).and_then(Value::as_f64)
}

pub(crate) fn required_str<'a>(state: &'a Value, key: &str) -> Result<&'a str, ProviderError> {
    str_attr(state, key).ok_or_else(|| ProviderError::Validation(format!("{} is required", key)))
}

pub(crate) fn required_i64(state: &Value, key: &str) -> Result<i64, ProviderError> {
    i64_attr(state, key).ok_or_else(|| ProviderError::Validation(format!("{} is required", key)))
}

/// The entitlement id stored in state, or one rebuilt from its parts.
pub(crate) fn entitlement_id(state: &Value) -> Result<EntitlementId, ProviderError> {
    if let Some(id) = str_attr(state, "id") {
        return id.parse();
    }
    Ok(EntitlementId::new(
        required_str(state, "serial_number")?,
        required_i64(state, "config_id")?,
    ))
}

/// The desired status the user asked for, if any.
pub(crate) fn desired_status(state: &Value) -> Result<Option<EntitlementStatus>, ProviderError> {
    match str_attr(state, "status") {
        None => Ok(None),
        Some(status) => EntitlementStatus::parse(status)
            .map(Some)
            .ok_or_else(|| ProviderError::Validation(format!("Invalid entitlement status {}", status))),
    }
}

pub(crate) fn current_status(entitlement: &Entitlement) -> Option<EntitlementStatus> {
    entitlement.status.as_deref().and_then(EntitlementStatus::parse)
}

/// Common entitlement fields in state form.
pub(crate) fn entitlement_fields(entitlement: &Entitlement) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("serial_number".into(), json!(entitlement.serial_number));
    fields.insert("config_id".into(), json!(entitlement.config_id));
    fields.insert("account_id".into(), json!(entitlement.account_id));
    fields.insert("description".into(), json!(entitlement.description()));
    fields.insert("start_date".into(), json!(entitlement.start_date));
    fields.insert("end_date".into(), json!(entitlement.end_date));
    fields.insert("status".into(), json!(entitlement.status));
    fields
}

/// Token fields in state form.
pub(crate) fn token_fields(entitlement: &Entitlement) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("token".into(), json!(entitlement.token));
    fields.insert("token_status".into(), json!(entitlement.token_status));
    fields
}

/// Overlay `fields` onto the user's state and set `id`.
///
/// Fields the response left out keep their previous value.
pub(crate) fn merge_state(base: &Value, fields: Map<String, Value>, id: &EntitlementId) -> Value {
    let mut state = base.as_object().cloned().unwrap_or_default();
    state.extend(fields.into_iter().filter(|(_, value)| !value.is_null()));
    state.insert("id".into(), json!(id.to_string()));
    Value::Object(state)
}

/// State of an entitlement resource built on top of `base`.
pub(crate) fn entitlement_state(base: &Value, entitlement: &Entitlement, with_tokens: bool) -> Value {
    let mut fields = entitlement_fields(entitlement);
    if with_tokens {
        fields.extend(token_fields(entitlement));
    }
    merge_state(base, fields, &id_of(entitlement))
}

/// Refresh an entitlement resource from FortiFlex.
pub(crate) async fn read_entitlement(
    session: &Session,
    current: &Value,
    with_tokens: bool,
) -> Result<StateResult, ProviderError> {
    let id = entitlement_id(current)?;
    let entitlement = session.client.find_entitlement(&id).await?;
    Ok(StateResult::new(entitlement_state(current, &entitlement, with_tokens)))
}

/// Run [`reconcile_entitlement`] and turn the outcome into resource state.
///
/// When the update is abandoned the entitlement is read back as it stands.
pub(crate) async fn update_entitlement_state(
    session: &Session,
    kind: EntitlementKind,
    id: &EntitlementId,
    planned: &Value,
    with_tokens: bool,
) -> Result<StateResult, ProviderError> {
    let (updated, diagnostics) = reconcile_entitlement(session, kind, id, planned).await?;
    let entitlement = match updated {
        Some(entitlement) => entitlement,
        None => session.client.find_entitlement(id).await?,
    };
    Ok(StateResult::new(entitlement_state(planned, &entitlement, with_tokens)).with_diagnostics(diagnostics))
}

/// Build the state of an imported entitlement from its `serial_number.config_id` id.
pub(crate) async fn import_entitlement(
    session: &Session,
    id: &str,
    defaults: Value,
    with_tokens: bool,
) -> Result<Value, ProviderError> {
    let id: EntitlementId = id.parse()?;
    let entitlement = session.client.find_entitlement(&id).await?;
    Ok(entitlement_state(&defaults, &entitlement, with_tokens))
}

pub(crate) fn id_of(entitlement: &Entitlement) -> EntitlementId {
    EntitlementId::new(entitlement.serial_number.clone(), entitlement.config_id)
}

/// Object type of one entitlement inside a list attribute.
pub(crate) fn entitlement_object_type() -> AttributeType {
    AttributeType::object([
        ("account_id", AttributeType::Int64),
        ("config_id", AttributeType::Int64),
        ("description", AttributeType::String),
        ("serial_number", AttributeType::String),
        ("start_date", AttributeType::String),
        ("end_date", AttributeType::String),
        ("status", AttributeType::String),
        ("token", AttributeType::String),
        ("token_status", AttributeType::String),
    ])
}

/// One entitlement as an element of a list attribute.
pub(crate) fn entitlement_object(entitlement: &Entitlement) -> Value {
    let mut fields = entitlement_fields(entitlement);
    fields.extend(token_fields(entitlement));
    Value::Object(fields)
}

/// The `status` attribute shared by the entitlement resources.
pub(crate) fn status_attribute() -> Attribute {
    Attribute::optional_computed_string()
        .with_description("Entitlement status. Only ACTIVE or STOPPED can be requested.")
        .with_constraint(Constraint::OneOf(vec!["ACTIVE", "STOPPED"]))
}

/// Bring an existing entitlement in line with the planned state.
///
/// Applies the status transition, then sends `entitlements/update` with the
/// config id, description and vetted end date.
pub(crate) async fn reconcile_entitlement(
    session: &Session,
    kind: EntitlementKind,
    id: &EntitlementId,
    planned: &Value,
) -> Result<(Option<Entitlement>, Vec<Diagnostic>), ProviderError> {
    let client = &session.client;
    let mut diagnostics = Vec::new();
    let mut current = client.find_entitlement(id).await?;

    let transition = plan_transition(current_status(&current), desired_status(planned)?)?;
    diagnostics.extend(transition.warning);
    if let Some(action) = transition.action {
        current = client
            .change_entitlement_status(&current.serial_number, action)
            .await?;
    }

    let end_date = match str_attr(planned, "end_date") {
        None => None,
        Some(requested) if Some(requested) == current.end_date.as_deref() => None,
        Some(requested) => {
            match kind
                .end_date_policy()
                .decide(requested, current.end_date.as_deref(), Utc::now())
            {
                EndDateDecision::Send(date) => Some(date),
                EndDateDecision::Skip(warning) => {
                    diagnostics.extend(warning);
                    None
                },
                EndDateDecision::Abort(warning) => {
                    diagnostics.push(warning);
                    return Ok((None, diagnostics));
                },
            }
        },
    };

    let request = UpdateEntitlementRequest {
        serial_number: id.serial_number.clone(),
        config_id: i64_attr(planned, "config_id").unwrap_or(id.config_id),
        description: planned
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
        end_date,
    };
    let updated = client.update_entitlement(&request).await?;
    Ok((Some(updated), diagnostics))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_helpers() {
        let state = json!({"a": "", "b": "x", "n": 5, "s": "7", "f": 0.5, "t": true});
        assert_eq!(str_attr(&state, "a"), None);
        assert_eq!(str_attr(&state, "b"), Some("x"));
        assert_eq!(i64_attr(&state, "n"), Some(5));
        assert_eq!(i64_attr(&state, "s"), Some(7));
        assert_eq!(f64_attr(&state, "f"), Some(0.5));
        assert_eq!(bool_attr(&state, "t"), Some(true));
        assert!(required_str(&state, "missing").is_err());
    }

    #[test]
    fn test_entitlement_id_from_state() {
        let id = entitlement_id(&json!({"id": "FGVM01.42"})).unwrap();
        assert_eq!(id, EntitlementId::new("FGVM01", 42));

        let id = entitlement_id(&json!({"serial_number": "FGVM01", "config_id": 42})).unwrap();
        assert_eq!(id.to_string(), "FGVM01.42");

        assert!(entitlement_id(&json!({"config_id": 42})).is_err());
    }

    #[test]
    fn test_desired_status() {
        assert_eq!(desired_status(&json!({})).unwrap(), None);
        assert_eq!(
            desired_status(&json!({"status": "STOPPED"})).unwrap(),
            Some(EntitlementStatus::Stopped)
        );
        assert!(desired_status(&json!({"status": "paused"})).is_err());
    }

    #[test]
    fn test_merge_state_sets_id() {
        let ent: Entitlement = serde_json::from_value(json!({
            "serialNumber": "FGVM01",
            "configId": 42,
            "status": "ACTIVE"
        }))
        .unwrap();
        let state = merge_state(
            &json!({"refresh_token_when_destroy": true}),
            entitlement_fields(&ent),
            &id_of(&ent),
        );
        assert_eq!(state["id"], "FGVM01.42");
        assert_eq!(state["refresh_token_when_destroy"], true);
        assert_eq!(state["description"], "");
        assert!(state.get("token").is_none());
    }

    #[test]
    fn test_entitlement_state_keeps_missing_fields() {
        let ent: Entitlement = serde_json::from_value(json!({
            "serialNumber": "FGVM01",
            "configId": 43,
            "status": "STOPPED"
        }))
        .unwrap();
        let prior = json!({"id": "FGVM01.42", "token": "abc", "start_date": "2024-01-01T00:00:00"});
        let state = entitlement_state(&prior, &ent, true);
        assert_eq!(state["id"], "FGVM01.43");
        assert_eq!(state["config_id"], 43);
        assert_eq!(state["token"], "abc");
        assert_eq!(state["start_date"], "2024-01-01T00:00:00");
        assert_eq!(state["status"], "STOPPED");
    }
}
