//! `fortiflexvm_entitlements_vm_token`: the license token of a VM entitlement.

use super::{bool_attr, id_of, merge_state, required_i64, required_str, token_fields};
use crate::client::Entitlement;
use crate::entitlement::EntitlementId;
use crate::error::ProviderError;
use crate::provider::{ManagedResource, Session};
use crate::schema::{Attribute, Diagnostic, Schema};
use crate::types::StateResult;
use serde_json::{json, Value};
use tracing::info;

pub struct VmTokenResource;

fn token_state(base: &Value, entitlement: &Entitlement) -> Value {
    let mut fields = token_fields(entitlement);
    fields.insert("serial_number".into(), json!(entitlement.serial_number));
    fields.insert("config_id".into(), json!(entitlement.config_id));
    merge_state(base, fields, &id_of(entitlement))
}

impl VmTokenResource {
    /// Regenerate the token when asked to, then read it back.
    async fn apply(&self, session: &Session, planned: Value) -> Result<StateResult, ProviderError> {
        let id = EntitlementId::new(
            required_str(&planned, "serial_number")?,
            required_i64(&planned, "config_id")?,
        );
        if bool_attr(&planned, "regenerate_token").unwrap_or(false) {
            session.client.regenerate_token(&id.serial_number).await?;
            info!(%id, "Regenerated VM token");
        }
        let entitlement = session.client.find_entitlement(&id).await?;
        Ok(StateResult::new(token_state(&planned, &entitlement)))
    }
}

#[async_trait::async_trait]
impl ManagedResource for VmTokenResource {
    fn type_name(&self) -> &'static str {
        "fortiflexvm_entitlements_vm_token"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Reads, and optionally regenerates, the token of a VM entitlement.")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("serial_number", Attribute::required_string().with_force_new())
            .with_attribute("config_id", Attribute::required_int64())
            .with_attribute(
                "regenerate_token",
                Attribute::optional_bool()
                    .with_default(json!(false))
                    .with_force_new(),
            )
            .with_attribute("token", Attribute::computed_string().sensitive())
            .with_attribute("token_status", Attribute::computed_string())
    }

    async fn create(&self, session: &Session, planned: Value) -> Result<StateResult, ProviderError> {
        self.apply(session, planned).await
    }

    async fn read(&self, session: &Session, current: Value) -> Result<StateResult, ProviderError> {
        let id = super::entitlement_id(&current)?;
        let entitlement = session.client.find_entitlement(&id).await?;
        Ok(StateResult::new(token_state(&current, &entitlement)))
    }

    async fn update(&self, session: &Session, _prior: Value, planned: Value) -> Result<StateResult, ProviderError> {
        self.apply(session, planned).await
    }

    async fn delete(&self, _session: &Session, _current: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(vec![])
    }

    async fn import(&self, session: &Session, id: &str) -> Result<Value, ProviderError> {
        let id: EntitlementId = id.parse()?;
        let entitlement = session.client.find_entitlement(&id).await?;
        Ok(token_state(&json!({ "regenerate_token": false }), &entitlement))
    }
}
