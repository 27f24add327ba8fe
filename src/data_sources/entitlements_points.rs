//! `fortiflexvm_entitlements_points`: point usage over a date range.

use super::{require_config_or_program, result_state};
use crate::client::PointsRequest;
use crate::error::ProviderError;
use crate::provider::{DataSource, Session};
use crate::resources::{i64_attr, required_str, str_attr};
use crate::schema::{Attribute, AttributeType, Diagnostic, Schema};
use crate::types::StateResult;
use serde_json::{json, Value};

pub struct EntitlementsPointsDataSource;

fn points_request(config: &Value) -> Result<PointsRequest, ProviderError> {
    Ok(PointsRequest {
        config_id: i64_attr(config, "config_id"),
        account_id: i64_attr(config, "account_id"),
        program_serial_number: str_attr(config, "program_serial_number").map(str::to_string),
        start_date: required_str(config, "start_date")?.to_string(),
        end_date: required_str(config, "end_date")?.to_string(),
    })
}

fn query_id(request: &PointsRequest) -> String {
    let scope = match (request.config_id, request.account_id, &request.program_serial_number) {
        (Some(config_id), _, _) => config_id.to_string(),
        (None, Some(account_id), Some(psn)) => format!("{}.{}", account_id, psn),
        _ => String::new(),
    };
    format!("{}.{}.{}", scope, request.start_date, request.end_date)
}

#[async_trait::async_trait]
impl DataSource for EntitlementsPointsDataSource {
    fn type_name(&self) -> &'static str {
        "fortiflexvm_entitlements_points"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Points consumed by entitlements between two dates.")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("account_id", Attribute::optional_int64())
            .with_attribute("config_id", Attribute::optional_int64())
            .with_attribute("program_serial_number", Attribute::optional_string())
            .with_attribute(
                "start_date",
                Attribute::required_string().with_description("Start of the range, e.g. 2024-01-01."),
            )
            .with_attribute("end_date", Attribute::required_string())
            .with_attribute(
                "entitlements",
                Attribute::computed_object_list(AttributeType::object([
                    ("account_id", AttributeType::Int64),
                    ("points", AttributeType::Float64),
                    ("serial_number", AttributeType::String),
                ])),
            )
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        require_config_or_program(config)
    }

    async fn read(&self, session: &Session, config: Value) -> Result<StateResult, ProviderError> {
        let request = points_request(&config)?;
        let entitlements = session
            .client
            .entitlement_points(&request)
            .await?
            .into_iter()
            .map(|usage| {
                json!({
                    "account_id": usage.account_id,
                    "points": usage.points,
                    "serial_number": usage.serial_number,
                })
            })
            .collect();
        Ok(StateResult::new(result_state(
            &config,
            query_id(&request),
            [("entitlements", Value::Array(entitlements))],
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_id() {
        let request = points_request(&json!({
            "config_id": 42,
            "start_date": "2024-01-01",
            "end_date": "2024-02-01"
        }))
        .unwrap();
        assert_eq!(query_id(&request), "42.2024-01-01.2024-02-01");

        let request = points_request(&json!({
            "account_id": 7,
            "program_serial_number": "ELAVMS0000000001",
            "start_date": "2024-01-01",
            "end_date": "2024-02-01"
        }))
        .unwrap();
        assert_eq!(query_id(&request), "7.ELAVMS0000000001.2024-01-01.2024-02-01");
    }

    #[test]
    fn test_dates_required() {
        assert!(points_request(&json!({"config_id": 42, "start_date": "2024-01-01"})).is_err());
    }
}
