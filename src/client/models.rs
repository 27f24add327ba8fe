//! Wire models for the FortiFlex v2 API.
//!
//! Responses are lenient: every field the provider does not strictly need is
//! optional, and unknown fields are ignored.

use crate::params::Parameter;
use serde::{Deserialize, Serialize};

/// A FortiFlex program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Program {
    pub serial_number: String,
    #[serde(default)]
    pub account_id: Option<i64>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub has_support_coverage: Option<bool>,
}

/// Product type reference embedded in a configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductTypeRef {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
}

/// A FortiFlex configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlexConfig {
    pub id: i64,
    #[serde(default)]
    pub account_id: Option<i64>,
    #[serde(default)]
    pub program_serial_number: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    pub product_type: ProductTypeRef,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

/// Body of `configs/create`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConfigRequest {
    pub program_serial_number: String,
    pub name: String,
    pub product_type_id: i64,
    pub parameters: Vec<Parameter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<i64>,
}

/// Body of `configs/update`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateConfigRequest {
    pub id: i64,
    pub name: String,
    pub parameters: Vec<Parameter>,
}

/// A FortiFlex entitlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entitlement {
    pub serial_number: String,
    pub config_id: i64,
    #[serde(default)]
    pub account_id: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub token_status: Option<String>,
}

impl Entitlement {
    /// The description, with a missing one read as empty.
    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or_default()
    }
}

/// Filters for `entitlements/list`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program_serial_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_status: Option<String>,
}

/// Body of `entitlements/vm/create` and `entitlements/cloud/create`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEntitlementsRequest {
    pub config_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

/// Body of `entitlements/hardware/create`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateHardwareRequest {
    pub config_id: i64,
    pub serial_numbers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

/// Body of `entitlements/update`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEntitlementRequest {
    pub serial_number: String,
    pub config_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

/// Body of `entitlements/points`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program_serial_number: Option<String>,
    pub start_date: String,
    pub end_date: String,
}

/// Point usage of one entitlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementPoints {
    pub serial_number: String,
    #[serde(default)]
    pub account_id: Option<i64>,
    #[serde(default)]
    pub points: Option<f64>,
}

/// A FortiFlex asset folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub folder_path: String,
    #[serde(default)]
    pub account_id: Option<i64>,
    #[serde(default)]
    pub available_tokens: Option<i64>,
    #[serde(default)]
    pub used_tokens: Option<i64>,
}

/// Body of `groups/nexttoken`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextTokenRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub status: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_from_wire() {
        let config: FlexConfig = serde_json::from_value(json!({
            "id": 42,
            "name": "vm-small",
            "programSerialNumber": "ELAVMS0000000001",
            "status": "ACTIVE",
            "productType": {"id": 1, "name": "FortiGate Virtual Machine - Service Bundle"},
            "parameters": [{"id": 1, "value": "2"}, {"id": 10, "value": 0}],
            "somethingNew": true
        }))
        .unwrap();

        assert_eq!(config.product_type.id, 1);
        assert_eq!(config.parameters[1], Parameter::new(10, "0"));
        assert!(config.account_id.is_none());
    }

    #[test]
    fn test_entitlement_description_default() {
        let ent: Entitlement = serde_json::from_value(json!({
            "serialNumber": "FGVMMLTM00000001",
            "configId": 42,
            "description": null
        }))
        .unwrap();
        assert_eq!(ent.description(), "");
    }

    #[test]
    fn test_requests_skip_unset_fields() {
        let body = serde_json::to_value(UpdateEntitlementRequest {
            serial_number: "FGVMMLTM00000001".into(),
            config_id: 42,
            description: None,
            end_date: Some("2030-01-01".into()),
        })
        .unwrap();
        assert_eq!(
            body,
            json!({"serialNumber": "FGVMMLTM00000001", "configId": 42, "endDate": "2030-01-01"})
        );

        let body = serde_json::to_value(NextTokenRequest {
            folder_path: Some("My Assets".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(body, json!({"folderPath": "My Assets"}));
    }
}
