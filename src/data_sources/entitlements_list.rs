//! `fortiflexvm_entitlements_list`

use super::{require_config_or_program, result_state};
use crate::client::EntitlementFilter;
use crate::error::ProviderError;
use crate::provider::{DataSource, Session};
use crate::resources::{entitlement_object, entitlement_object_type, i64_attr, str_attr};
use crate::schema::{Attribute, Diagnostic, Schema};
use crate::types::StateResult;
use serde_json::Value;

pub struct EntitlementsListDataSource;

fn filter_from(config: &Value) -> EntitlementFilter {
    let text = |key: &str| str_attr(config, key).map(str::to_string);
    EntitlementFilter {
        config_id: i64_attr(config, "config_id"),
        account_id: i64_attr(config, "account_id"),
        program_serial_number: text("program_serial_number"),
        serial_number: text("serial_number"),
        description: text("description"),
        status: text("status"),
        token_status: text("token_status"),
    }
}

/// `config_id` when filtering by configuration, `account_id.program_serial_number` otherwise.
fn query_id(filter: &EntitlementFilter) -> String {
    match (filter.config_id, filter.account_id, &filter.program_serial_number) {
        (Some(config_id), _, _) => config_id.to_string(),
        (None, Some(account_id), Some(psn)) => format!("{}.{}", account_id, psn),
        _ => "EntitlementsList".to_string(),
    }
}

#[async_trait::async_trait]
impl DataSource for EntitlementsListDataSource {
    fn type_name(&self) -> &'static str {
        "fortiflexvm_entitlements_list"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Lists entitlements of a configuration or of a program.")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("account_id", Attribute::optional_int64())
            .with_attribute("config_id", Attribute::optional_int64())
            .with_attribute("description", Attribute::optional_string())
            .with_attribute("program_serial_number", Attribute::optional_string())
            .with_attribute("serial_number", Attribute::optional_string())
            .with_attribute("status", Attribute::optional_string())
            .with_attribute("token_status", Attribute::optional_string())
            .with_attribute(
                "entitlements",
                Attribute::computed_object_list(entitlement_object_type()),
            )
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        require_config_or_program(config)
    }

    async fn read(&self, session: &Session, config: Value) -> Result<StateResult, ProviderError> {
        let filter = filter_from(&config);
        let entitlements = session
            .client
            .list_entitlements(&filter)
            .await?
            .iter()
            .map(entitlement_object)
            .collect();
        Ok(StateResult::new(result_state(
            &config,
            query_id(&filter),
            [("entitlements", Value::Array(entitlements))],
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_from_config() {
        let filter = filter_from(&json!({
            "account_id": 7,
            "program_serial_number": "ELAVMS0000000001",
            "status": "ACTIVE",
            "description": ""
        }));
        assert_eq!(filter.account_id, Some(7));
        assert_eq!(filter.status.as_deref(), Some("ACTIVE"));
        assert_eq!(filter.description, None);
        assert_eq!(query_id(&filter), "7.ELAVMS0000000001");

        let filter = filter_from(&json!({"config_id": 42, "account_id": 7}));
        assert_eq!(query_id(&filter), "42");
    }
}
