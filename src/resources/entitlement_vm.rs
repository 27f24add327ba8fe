//! `fortiflexvm_entitlements_vm`: a VM entitlement bound to a configuration.

use super::{
    bool_attr, current_status, desired_status, entitlement_id, entitlement_state,
    import_entitlement, read_entitlement, required_i64, status_attribute, str_attr, update_entitlement_state,
};
use crate::client::CreateEntitlementsRequest;
use crate::entitlement::{plan_transition, requires_stop_on_delete, EntitlementId, EntitlementKind, StatusAction};
use crate::error::ProviderError;
use crate::provider::{ManagedResource, Session};
use crate::schema::{Attribute, Diagnostic, Schema};
use crate::types::StateResult;
use serde_json::{json, Value};
use tracing::{info, warn};

pub struct VmEntitlementResource;

#[async_trait::async_trait]
impl ManagedResource for VmEntitlementResource {
    fn type_name(&self) -> &'static str {
        "fortiflexvm_entitlements_vm"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description(
                "A VM entitlement. Leave serial_number unset to create one, or set it to manage an existing entitlement.",
            )
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("account_id", Attribute::computed_int64())
            .with_attribute("config_id", Attribute::required_int64())
            .with_attribute("description", Attribute::optional_computed_string())
            .with_attribute("end_date", Attribute::optional_computed_string())
            .with_attribute(
                "folder_path",
                Attribute::optional_string().with_description("Only used when the entitlement is created."),
            )
            .with_attribute("serial_number", Attribute::optional_computed_string())
            .with_attribute("start_date", Attribute::computed_string())
            .with_attribute("status", status_attribute())
            .with_attribute("token", Attribute::computed_string())
            .with_attribute("token_status", Attribute::computed_string())
            .with_attribute(
                "refresh_token_when_destroy",
                Attribute::optional_bool()
                    .with_description("Regenerate the token when the resource is destroyed.")
                    .with_default(json!(false)),
            )
    }

    async fn create(&self, session: &Session, planned: Value) -> Result<StateResult, ProviderError> {
        let config_id = required_i64(&planned, "config_id")?;

        if let Some(serial_number) = str_attr(&planned, "serial_number") {
            let id = EntitlementId::new(serial_number, config_id);
            info!(%id, "Adopting existing VM entitlement");
            return update_entitlement_state(session, EntitlementKind::Vm, &id, &planned, true).await;
        }

        let request = CreateEntitlementsRequest {
            config_id,
            count: Some(1),
            description: str_attr(&planned, "description").map(str::to_string),
            folder_path: str_attr(&planned, "folder_path").map(str::to_string),
            end_date: str_attr(&planned, "end_date").map(str::to_string),
        };
        let mut entitlement = session.client.create_vm_entitlement(&request).await?;
        info!(serial_number = %entitlement.serial_number, config_id, "Created VM entitlement");

        let transition = plan_transition(current_status(&entitlement), desired_status(&planned)?)?;
        if let Some(action) = transition.action {
            entitlement = session
                .client
                .change_entitlement_status(&entitlement.serial_number, action)
                .await?;
        }
        Ok(StateResult::new(entitlement_state(&planned, &entitlement, true))
            .with_diagnostics(transition.warning.into_iter().collect()))
    }

    async fn read(&self, session: &Session, current: Value) -> Result<StateResult, ProviderError> {
        read_entitlement(session, &current, true).await
    }

    async fn update(&self, session: &Session, prior: Value, planned: Value) -> Result<StateResult, ProviderError> {
        let id = entitlement_id(&prior)?;
        update_entitlement_state(session, EntitlementKind::Vm, &id, &planned, true).await
    }

    async fn delete(&self, session: &Session, current: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let id = entitlement_id(&current)?;
        let status = match session.client.find_entitlement(&id).await {
            Ok(entitlement) => current_status(&entitlement),
            Err(ProviderError::NotFound(message)) => {
                warn!(%id, %message, "VM entitlement already gone");
                return Ok(vec![]);
            },
            Err(err) => return Err(err),
        };

        if requires_stop_on_delete(EntitlementKind::Vm, status) {
            session
                .client
                .change_entitlement_status(&id.serial_number, StatusAction::Stop)
                .await?;
            info!(%id, "Stopped VM entitlement");
        }
        if bool_attr(&current, "refresh_token_when_destroy").unwrap_or(false) {
            session.client.regenerate_token(&id.serial_number).await?;
            info!(%id, "Regenerated VM token");
        }
        Ok(vec![])
    }

    async fn import(&self, session: &Session, id: &str) -> Result<Value, ProviderError> {
        import_entitlement(session, id, json!({ "refresh_token_when_destroy": false }), true).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation;

    #[test]
    fn test_schema_shape() {
        let schema = VmEntitlementResource.schema();
        assert!(schema.block.attributes["config_id"].flags.required);
        assert!(schema.block.attributes["token"].flags.computed);
        assert!(!schema.block.attributes["serial_number"].force_new);
        assert_eq!(
            schema.block.attributes["refresh_token_when_destroy"].default,
            Some(json!(false))
        );
    }

    #[test]
    fn test_status_is_restricted() {
        let schema = VmEntitlementResource.schema();
        let diagnostics = validation::validate(&schema, &json!({"config_id": 1, "status": "PENDING"}));
        assert!(crate::schema::has_errors(&diagnostics));

        let diagnostics = validation::validate(&schema, &json!({"config_id": 1, "status": "STOPPED"}));
        assert!(!crate::schema::has_errors(&diagnostics));
    }
}
