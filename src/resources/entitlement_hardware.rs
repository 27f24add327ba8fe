//! `fortiflexvm_entitlements_hardware`: an entitlement for a physical device.

use super::{
    desired_status, entitlement_id, entitlement_state, id_of, import_entitlement, read_entitlement, required_i64,
    required_str, status_attribute, str_attr, update_entitlement_state,
};
use crate::client::CreateHardwareRequest;
use crate::entitlement::{requires_stop_on_delete, EntitlementKind, EntitlementStatus, StatusAction};
use crate::error::ProviderError;
use crate::provider::{ManagedResource, Session};
use crate::schema::{Attribute, Diagnostic, Schema};
use crate::types::StateResult;
use serde_json::{json, Value};
use tracing::info;

pub struct HardwareEntitlementResource;

/// Whether a freshly created hardware entitlement needs a follow-up update.
fn needs_update_after_create(planned: &Value) -> Result<bool, ProviderError> {
    Ok(str_attr(planned, "description").is_some()
        || desired_status(planned)? == Some(EntitlementStatus::Stopped))
}

#[async_trait::async_trait]
impl ManagedResource for HardwareEntitlementResource {
    fn type_name(&self) -> &'static str {
        "fortiflexvm_entitlements_hardware"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("A hardware entitlement, identified by the device serial number.")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("account_id", Attribute::computed_int64())
            .with_attribute("config_id", Attribute::required_int64())
            .with_attribute("description", Attribute::optional_computed_string())
            .with_attribute(
                "end_date",
                Attribute::optional_computed_string()
                    .with_description("RFC 3339 end date. Only a later date than the current one is applied."),
            )
            .with_attribute("serial_number", Attribute::required_string().with_force_new())
            .with_attribute("start_date", Attribute::computed_string())
            .with_attribute("status", status_attribute())
    }

    async fn create(&self, session: &Session, planned: Value) -> Result<StateResult, ProviderError> {
        let request = CreateHardwareRequest {
            config_id: required_i64(&planned, "config_id")?,
            serial_numbers: vec![required_str(&planned, "serial_number")?.to_string()],
            end_date: str_attr(&planned, "end_date").map(str::to_string),
        };
        let entitlement = session.client.create_hardware_entitlement(&request).await?;
        let id = id_of(&entitlement);
        info!(%id, "Created hardware entitlement");

        if needs_update_after_create(&planned)? {
            return update_entitlement_state(session, EntitlementKind::Hardware, &id, &planned, false).await;
        }
        Ok(StateResult::new(entitlement_state(&planned, &entitlement, false)))
    }

    async fn read(&self, session: &Session, current: Value) -> Result<StateResult, ProviderError> {
        read_entitlement(session, &current, false).await
    }

    async fn update(&self, session: &Session, prior: Value, planned: Value) -> Result<StateResult, ProviderError> {
        let id = entitlement_id(&prior)?;
        update_entitlement_state(session, EntitlementKind::Hardware, &id, &planned, false).await
    }

    async fn delete(&self, session: &Session, current: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let id = entitlement_id(&current)?;
        let recorded = str_attr(&current, "status").and_then(EntitlementStatus::parse);
        if requires_stop_on_delete(EntitlementKind::Hardware, recorded) {
            session
                .client
                .change_entitlement_status(&id.serial_number, StatusAction::Stop)
                .await?;
            info!(%id, "Stopped hardware entitlement");
        }
        Ok(vec![])
    }

    async fn import(&self, session: &Session, id: &str) -> Result<Value, ProviderError> {
        import_entitlement(session, id, json!({}), false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_update_after_create() {
        assert!(!needs_update_after_create(&json!({"serial_number": "FGT60F"})).unwrap());
        assert!(!needs_update_after_create(&json!({"status": "ACTIVE"})).unwrap());
        assert!(needs_update_after_create(&json!({"status": "STOPPED"})).unwrap());
        assert!(needs_update_after_create(&json!({"description": "lab"})).unwrap());
    }

    #[test]
    fn test_serial_number_forces_replacement() {
        let schema = HardwareEntitlementResource.schema();
        let serial = &schema.block.attributes["serial_number"];
        assert!(serial.flags.required);
        assert!(serial.force_new);
        assert!(!schema.block.attributes.contains_key("token"));
    }
}
