//! `fortiflexvm_retrieve_vm_group`: claim a batch of idle VM entitlements.
//!
//! Several runs may compete for the same pool of entitlements. A candidate is
//! claimed by writing the task name into its description, waiting
//! `preempt_interval` seconds and checking the description again. Whoever
//! wrote last owns it; everyone else moves on to the next candidate.

use super::{
    bool_attr, current_status, entitlement_object, entitlement_object_type, f64_attr, i64_attr, required_i64,
    required_str,
};
use crate::client::{Entitlement, EntitlementFilter, UpdateEntitlementRequest};
use crate::entitlement::{EntitlementId, EntitlementStatus, StatusAction};
use crate::error::ProviderError;
use crate::provider::{ManagedResource, Session};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Constraint, Diagnostic, Schema};
use crate::types::StateResult;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct RetrieveVmGroupResource;

const DEFAULT_RETRIEVE_STATUS: &str = "STOPPED";

/// Settings of one claim run, read from the planned state.
#[derive(Debug, Clone)]
struct ClaimRequest {
    task_name: String,
    config_id: i64,
    preempt_interval: Duration,
    refresh_token: bool,
    allowed: Vec<EntitlementStatus>,
}

impl ClaimRequest {
    fn from_state(state: &Value) -> Result<Self, ProviderError> {
        let interval = f64_attr(state, "preempt_interval").unwrap_or(1.0);
        let allowed = match state.get("retrieve_status").and_then(Value::as_array) {
            Some(items) if !items.is_empty() => items
                .iter()
                .filter_map(Value::as_str)
                .filter_map(EntitlementStatus::parse)
                .collect(),
            _ => vec![EntitlementStatus::Stopped],
        };
        Ok(Self {
            task_name: required_str(state, "task_name")?.to_string(),
            config_id: required_i64(state, "config_id")?,
            preempt_interval: Duration::try_from_secs_f64(interval).unwrap_or_default(),
            refresh_token: bool_attr(state, "refresh_token_when_create").unwrap_or(false),
            allowed,
        })
    }

    fn is_candidate(&self, entitlement: &Entitlement) -> bool {
        entitlement.description().is_empty()
            && current_status(entitlement).is_some_and(|status| self.allowed.contains(&status))
    }
}

fn held_id(item: &Value) -> Option<EntitlementId> {
    let serial_number = item.get("serial_number")?.as_str()?;
    Some(EntitlementId::new(serial_number, i64_attr(item, "config_id")?))
}

/// Ids of the entitlements held in `state`.
fn held_ids(state: &Value) -> Vec<EntitlementId> {
    state
        .get("entitlements")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(held_id).collect())
        .unwrap_or_default()
}

fn set_description(id: &EntitlementId, description: impl Into<String>) -> UpdateEntitlementRequest {
    UpdateEntitlementRequest {
        serial_number: id.serial_number.clone(),
        config_id: id.config_id,
        description: Some(description.into()),
        end_date: None,
    }
}

fn group_state(base: &Value, task_name: &str, entitlements: Vec<Value>) -> Value {
    let mut state = base.as_object().cloned().unwrap_or_default();
    state.insert("id".into(), json!(task_name));
    state.insert("count_num".into(), json!(entitlements.len()));
    state.insert("entitlements".into(), Value::Array(entitlements));
    Value::Object(state)
}

/// Try to take ownership of one candidate.
///
/// `Ok(None)` means the candidate is not available or another task got it.
async fn try_claim(
    session: &Session,
    request: &ClaimRequest,
    id: &EntitlementId,
) -> Result<Option<Entitlement>, ProviderError> {
    let client = &session.client;

    let current = client.find_entitlement(id).await?;
    if !request.is_candidate(&current) {
        return Ok(None);
    }

    client
        .update_entitlement(&set_description(id, request.task_name.as_str()))
        .await?;
    tokio::time::sleep(request.preempt_interval).await;

    let rechecked = client.find_entitlement(id).await?;
    if rechecked.description() != request.task_name {
        debug!(%id, owner = rechecked.description(), "Entitlement taken by another task");
        return Ok(None);
    }

    match activate(session, request, id, rechecked).await {
        Ok(claimed) => Ok(Some(claimed)),
        Err(err) => {
            // Not held from here on, so hand it back to the pool.
            if let Err(reset) = client.update_entitlement(&set_description(id, "")).await {
                warn!(%id, error = %reset, "Could not clear task name of unclaimed entitlement");
            }
            Err(err)
        },
    }
}

/// Make an owned entitlement usable: reactivate it and refresh its token if asked.
async fn activate(
    session: &Session,
    request: &ClaimRequest,
    id: &EntitlementId,
    owned: Entitlement,
) -> Result<Entitlement, ProviderError> {
    let client = &session.client;
    let mut claimed = if current_status(&owned) == Some(EntitlementStatus::Active) {
        owned
    } else {
        client
            .change_entitlement_status(&id.serial_number, StatusAction::Reactivate)
            .await?
    };
    if request.refresh_token {
        claimed = client.regenerate_token(&id.serial_number).await?;
    }
    Ok(claimed)
}

/// Claim up to `want` entitlements of the request's configuration.
async fn claim(session: &Session, request: &ClaimRequest, want: usize) -> Result<Vec<Entitlement>, ProviderError> {
    if want == 0 {
        return Ok(Vec::new());
    }
    let filter = EntitlementFilter {
        config_id: Some(request.config_id),
        ..Default::default()
    };
    let pool = session.client.list_entitlements(&filter).await?;

    let mut claimed = Vec::with_capacity(want);
    for candidate in pool {
        if claimed.len() >= want {
            break;
        }
        let id = EntitlementId::new(candidate.serial_number, candidate.config_id);
        match try_claim(session, request, &id).await {
            Ok(Some(entitlement)) => {
                info!(%id, task_name = %request.task_name, "Claimed entitlement");
                claimed.push(entitlement);
            },
            Ok(None) => {},
            Err(err) => warn!(%id, error = %err, "Skipping entitlement"),
        }
    }
    Ok(claimed)
}

/// Hand an entitlement back to the pool.
async fn release(session: &Session, id: &EntitlementId, refresh_token: bool) -> Result<(), ProviderError> {
    let client = &session.client;
    client.update_entitlement(&set_description(id, "")).await?;
    client
        .change_entitlement_status(&id.serial_number, StatusAction::Stop)
        .await?;
    if refresh_token {
        client.regenerate_token(&id.serial_number).await?;
    }
    info!(%id, "Released entitlement");
    Ok(())
}

fn refresh_on_release(state: &Value) -> bool {
    bool_attr(state, "refresh_token_when_destroy").unwrap_or(true)
}

#[async_trait::async_trait]
impl ManagedResource for RetrieveVmGroupResource {
    fn type_name(&self) -> &'static str {
        "fortiflexvm_retrieve_vm_group"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Claims idle VM entitlements of a configuration for one task.")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "task_name",
                Attribute::required_string().with_description("Written into the description of claimed entitlements."),
            )
            .with_attribute(
                "count_num",
                Attribute::required_int64().with_constraint(Constraint::IntRange(0, i64::from(u32::MAX))),
            )
            .with_attribute("config_id", Attribute::required_int64())
            .with_attribute(
                "preempt_interval",
                Attribute::optional_float64()
                    .with_description("Seconds to wait before checking a claim.")
                    .with_default(json!(1.0)),
            )
            .with_attribute(
                "refresh_token_when_destroy",
                Attribute::optional_bool().with_default(json!(true)),
            )
            .with_attribute(
                "refresh_token_when_create",
                Attribute::optional_bool().with_default(json!(false)),
            )
            .with_attribute(
                "require_exact_count",
                Attribute::optional_bool()
                    .with_description("Fail and release everything when fewer than count_num are found.")
                    .with_default(json!(false)),
            )
            .with_attribute(
                "retrieve_status",
                Attribute::new(AttributeType::list(AttributeType::String), AttributeFlags::optional())
                    .with_default(json!([DEFAULT_RETRIEVE_STATUS]))
                    .with_constraint(Constraint::EachOneOf(vec!["PENDING", "ACTIVE", "STOPPED", "EXPIRED"])),
            )
            .with_attribute(
                "entitlements",
                Attribute::computed_object_list(entitlement_object_type()),
            )
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        match f64_attr(config, "preempt_interval") {
            Some(interval) if interval < 0.0 || !interval.is_finite() => vec![Diagnostic::error(
                "preempt_interval must be a non-negative number of seconds",
            )
            .with_attribute("preempt_interval")],
            _ => Vec::new(),
        }
    }

    async fn create(&self, session: &Session, planned: Value) -> Result<StateResult, ProviderError> {
        let request = ClaimRequest::from_state(&planned)?;
        let want = usize::try_from(required_i64(&planned, "count_num")?).unwrap_or_default();
        let claimed = claim(session, &request, want).await?;

        if claimed.len() < want && bool_attr(&planned, "require_exact_count").unwrap_or(false) {
            let mut diagnostics = vec![Diagnostic::error(format!("Unable to retrieve {} entitlement(s).", want))
                .with_detail(format!(
                    "Only retrieve {} entitlement(s), while asking for {}. You get this error because you set \
                     require_exact_count as true. All retrieved entitlements by this resource are released now.",
                    claimed.len(),
                    want
                ))];
            let refresh = refresh_on_release(&planned);
            for entitlement in &claimed {
                let id = EntitlementId::new(entitlement.serial_number.clone(), entitlement.config_id);
                if let Err(err) = release(session, &id, refresh).await {
                    diagnostics.push(Diagnostic::error(format!("Unable to release {}", id)).with_detail(err.to_string()));
                }
            }
            return Ok(StateResult::new(Value::Null).with_diagnostics(diagnostics));
        }

        if claimed.len() < want {
            warn!(found = claimed.len(), want, task_name = %request.task_name, "Fewer entitlements available than requested");
        }
        let entitlements = claimed.iter().map(entitlement_object).collect();
        Ok(StateResult::new(group_state(&planned, &request.task_name, entitlements)))
    }

    async fn read(&self, session: &Session, current: Value) -> Result<StateResult, ProviderError> {
        let task_name = required_str(&current, "task_name")?.to_string();
        let mut entitlements = Vec::new();
        for id in held_ids(&current) {
            match session.client.find_entitlement(&id).await {
                Ok(entitlement) => entitlements.push(entitlement_object(&entitlement)),
                Err(ProviderError::NotFound(message)) => warn!(%id, %message, "Held entitlement disappeared"),
                Err(err) => return Err(err),
            }
        }
        Ok(StateResult::new(group_state(&current, &task_name, entitlements)))
    }

    async fn update(&self, session: &Session, prior: Value, planned: Value) -> Result<StateResult, ProviderError> {
        let request = ClaimRequest::from_state(&planned)?;
        let want = usize::try_from(required_i64(&planned, "count_num")?).unwrap_or_default();
        let mut held: Vec<Value> = prior
            .get("entitlements")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut diagnostics = Vec::new();

        if want > held.len() {
            let claimed = claim(session, &request, want - held.len()).await?;
            held.extend(claimed.iter().map(entitlement_object));
        } else if want < held.len() {
            let refresh = refresh_on_release(&planned);
            let mut surplus = held.split_off(want).into_iter();
            while let Some(item) = surplus.next() {
                let Some(id) = held_id(&item) else {
                    continue;
                };
                if let Err(err) = release(session, &id, refresh).await {
                    // Whatever was not released stays held.
                    diagnostics.push(Diagnostic::error(format!("Unable to release {}", id)).with_detail(err.to_string()));
                    held.push(item);
                    held.extend(surplus);
                    break;
                }
            }
        }
        Ok(StateResult::new(group_state(&planned, &request.task_name, held)).with_diagnostics(diagnostics))
    }

    async fn delete(&self, session: &Session, current: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let refresh = refresh_on_release(&current);
        let mut first_failure = None;
        for id in held_ids(&current) {
            if let Err(err) = release(session, &id, refresh).await {
                warn!(%id, error = %err, "Failed to release entitlement");
                first_failure.get_or_insert(err);
            }
        }
        match first_failure {
            Some(err) => Err(err),
            None => Ok(vec![]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entitlement(status: &str, description: Option<&str>) -> Entitlement {
        serde_json::from_value(json!({
            "serialNumber": "FGVMMLTM00000001",
            "configId": 42,
            "status": status,
            "description": description
        }))
        .unwrap()
    }

    #[test]
    fn test_claim_request_defaults() {
        let request = ClaimRequest::from_state(&json!({"task_name": "ci", "config_id": 42})).unwrap();
        assert_eq!(request.allowed, vec![EntitlementStatus::Stopped]);
        assert_eq!(request.preempt_interval, Duration::from_secs(1));
        assert!(!request.refresh_token);

        let request = ClaimRequest::from_state(&json!({
            "task_name": "ci",
            "config_id": 42,
            "preempt_interval": 0.25,
            "retrieve_status": ["STOPPED", "PENDING"]
        }))
        .unwrap();
        assert_eq!(request.preempt_interval, Duration::from_millis(250));
        assert_eq!(request.allowed.len(), 2);
    }

    #[test]
    fn test_candidates() {
        let request = ClaimRequest::from_state(&json!({"task_name": "ci", "config_id": 42})).unwrap();
        assert!(request.is_candidate(&entitlement("STOPPED", None)));
        assert!(request.is_candidate(&entitlement("STOPPED", Some(""))));
        assert!(!request.is_candidate(&entitlement("STOPPED", Some("other-task"))));
        assert!(!request.is_candidate(&entitlement("ACTIVE", None)));
    }

    #[test]
    fn test_held_ids_and_state() {
        let state = json!({
            "task_name": "ci",
            "entitlements": [
                {"serial_number": "A", "config_id": 1},
                {"serial_number": "B", "config_id": 1},
                {"config_id": 1}
            ]
        });
        let ids = held_ids(&state);
        assert_eq!(ids, vec![EntitlementId::new("A", 1), EntitlementId::new("B", 1)]);

        let state = group_state(&state, "ci", vec![json!({"serial_number": "A"})]);
        assert_eq!(state["id"], "ci");
        assert_eq!(state["count_num"], 1);
    }

    #[test]
    fn test_negative_interval_rejected() {
        let diagnostics = RetrieveVmGroupResource.validate(&json!({"preempt_interval": -1.0}));
        assert!(crate::schema::has_errors(&diagnostics));
        assert!(RetrieveVmGroupResource.validate(&json!({"preempt_interval": 0.0})).is_empty());
    }
}
