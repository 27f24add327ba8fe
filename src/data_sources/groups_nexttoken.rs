//! `fortiflexvm_groups_nexttoken`: the next unused token of a folder or configuration.

use super::{is_set, result_state};
use crate::client::NextTokenRequest;
use crate::error::ProviderError;
use crate::provider::{DataSource, Session};
use crate::resources::{entitlement_object, entitlement_object_type, i64_attr, str_attr};
use crate::schema::{Attribute, Constraint, Diagnostic, Schema};
use crate::types::StateResult;
use serde_json::{json, Value};

pub struct GroupsNextTokenDataSource;

fn next_token_request(config: &Value) -> NextTokenRequest {
    NextTokenRequest {
        config_id: i64_attr(config, "config_id"),
        folder_path: str_attr(config, "folder_path").map(str::to_string),
        account_id: i64_attr(config, "account_id"),
        status: config
            .get("status")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default(),
    }
}

#[async_trait::async_trait]
impl DataSource for GroupsNextTokenDataSource {
    fn type_name(&self) -> &'static str {
        "fortiflexvm_groups_nexttoken"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Returns the next available token of a configuration or asset folder.")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("account_id", Attribute::optional_int64())
            .with_attribute("config_id", Attribute::optional_int64())
            .with_attribute("folder_path", Attribute::optional_string())
            .with_attribute(
                "status",
                Attribute::optional_string_list()
                    .with_constraint(Constraint::EachOneOf(vec!["PENDING", "ACTIVE", "STOPPED", "EXPIRED"])),
            )
            .with_attribute(
                "entitlements",
                Attribute::computed_object_list(entitlement_object_type()),
            )
            .with_attribute(
                "token",
                Attribute::computed_string().sensitive(),
            )
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        if ["config_id", "folder_path", "account_id"]
            .iter()
            .any(|key| is_set(config, key))
        {
            return Vec::new();
        }
        vec![Diagnostic::error("at least one of config_id, folder_path or account_id should be provided")]
    }

    async fn read(&self, session: &Session, config: Value) -> Result<StateResult, ProviderError> {
        let entitlements = session.client.next_token(&next_token_request(&config)).await?;
        let token = entitlements
            .first()
            .and_then(|entitlement| entitlement.token.clone());
        let entitlements = entitlements.iter().map(entitlement_object).collect();
        Ok(StateResult::new(result_state(
            &config,
            "GroupsNexttoken",
            [("entitlements", Value::Array(entitlements)), ("token", json!(token))],
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_a_scope() {
        let source = GroupsNextTokenDataSource;
        assert!(crate::schema::has_errors(&source.validate(&json!({"status": ["STOPPED"]}))));
        assert!(source.validate(&json!({"folder_path": "My Assets"})).is_empty());
    }

    #[test]
    fn test_request_from_config() {
        let request = next_token_request(&json!({"config_id": 42, "status": ["STOPPED", "PENDING"]}));
        assert_eq!(request.config_id, Some(42));
        assert_eq!(request.status, vec!["STOPPED", "PENDING"]);
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"configId": 42, "status": ["STOPPED", "PENDING"]})
        );
    }
}
