//! Typed FortiFlex endpoints.

use super::models::*;
use super::{extract_list, extract_one, FlexClient};
use crate::entitlement::{EntitlementId, StatusAction};
use crate::error::ProviderError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

fn to_body<T: Serialize>(request: &T) -> Result<Value, ProviderError> {
    Ok(serde_json::to_value(request)?)
}

fn decode_list<T: DeserializeOwned>(envelope: &Value, key: &str) -> Result<Vec<T>, ProviderError> {
    extract_list(envelope, key)
        .into_iter()
        .map(|item| serde_json::from_value(item).map_err(ProviderError::from))
        .collect()
}

fn decode_one<T: DeserializeOwned>(envelope: &Value, key: &str) -> Result<T, ProviderError> {
    Ok(serde_json::from_value(extract_one(envelope, key)?)?)
}

impl FlexClient {
    pub async fn list_programs(&self) -> Result<Vec<Program>, ProviderError> {
        let envelope = self.post("programs/list", &json!({})).await?;
        decode_list(&envelope, "programs")
    }

    pub async fn list_configs(&self, program_serial_number: &str) -> Result<Vec<FlexConfig>, ProviderError> {
        let envelope = self
            .post(
                "configs/list",
                &json!({ "programSerialNumber": program_serial_number }),
            )
            .await?;
        decode_list(&envelope, "configs")
    }

    /// Find one configuration of a program by id.
    pub async fn find_config(&self, program_serial_number: &str, id: i64) -> Result<FlexConfig, ProviderError> {
        self.list_configs(program_serial_number)
            .await?
            .into_iter()
            .find(|config| config.id == id)
            .ok_or_else(|| ProviderError::NotFound(format!("Config {} not been created", id)))
    }

    pub async fn create_config(&self, request: &CreateConfigRequest) -> Result<FlexConfig, ProviderError> {
        let envelope = self.post_once("configs/create", &to_body(request)?).await?;
        decode_one(&envelope, "configs")
    }

    pub async fn update_config(&self, request: &UpdateConfigRequest) -> Result<FlexConfig, ProviderError> {
        let envelope = self.post("configs/update", &to_body(request)?).await?;
        decode_one(&envelope, "configs")
    }

    /// Enable or disable a configuration.
    pub async fn set_config_enabled(&self, id: i64, enabled: bool) -> Result<FlexConfig, ProviderError> {
        let path = if enabled { "configs/enable" } else { "configs/disable" };
        let envelope = self.post(path, &json!({ "id": id })).await?;
        decode_one(&envelope, "configs")
    }

    pub async fn list_entitlements(&self, filter: &EntitlementFilter) -> Result<Vec<Entitlement>, ProviderError> {
        let envelope = self.post("entitlements/list", &to_body(filter)?).await?;
        decode_list(&envelope, "entitlements")
    }

    /// Look up a single entitlement by its resource id.
    pub async fn find_entitlement(&self, id: &EntitlementId) -> Result<Entitlement, ProviderError> {
        let filter = EntitlementFilter {
            config_id: Some(id.config_id),
            serial_number: Some(id.serial_number.clone()),
            ..Default::default()
        };
        self.list_entitlements(&filter)
            .await?
            .into_iter()
            .find(|ent| ent.serial_number == id.serial_number)
            .ok_or_else(|| {
                ProviderError::NotFound(format!("target entitlement {} not exist", id.serial_number))
            })
    }

    pub async fn create_vm_entitlement(
        &self,
        request: &CreateEntitlementsRequest,
    ) -> Result<Entitlement, ProviderError> {
        let envelope = self.post_once("entitlements/vm/create", &to_body(request)?).await?;
        decode_one(&envelope, "entitlements")
    }

    pub async fn create_hardware_entitlement(
        &self,
        request: &CreateHardwareRequest,
    ) -> Result<Entitlement, ProviderError> {
        let envelope = self
            .post_once("entitlements/hardware/create", &to_body(request)?)
            .await?;
        decode_one(&envelope, "entitlements")
    }

    pub async fn create_cloud_entitlement(
        &self,
        request: &CreateEntitlementsRequest,
    ) -> Result<Entitlement, ProviderError> {
        let envelope = self
            .post_once("entitlements/cloud/create", &to_body(request)?)
            .await?;
        decode_one(&envelope, "entitlements")
    }

    pub async fn update_entitlement(
        &self,
        request: &UpdateEntitlementRequest,
    ) -> Result<Entitlement, ProviderError> {
        let envelope = self.post("entitlements/update", &to_body(request)?).await?;
        decode_one(&envelope, "entitlements")
    }

    /// Stop or reactivate an entitlement.
    pub async fn change_entitlement_status(
        &self,
        serial_number: &str,
        action: StatusAction,
    ) -> Result<Entitlement, ProviderError> {
        let path = format!("entitlements/{}", action.endpoint());
        let envelope = self
            .post(&path, &json!({ "serialNumber": serial_number }))
            .await?;
        decode_one(&envelope, "entitlements")
    }

    pub async fn regenerate_token(&self, serial_number: &str) -> Result<Entitlement, ProviderError> {
        let envelope = self
            .post("entitlements/vm/token", &json!({ "serialNumber": serial_number }))
            .await?;
        decode_one(&envelope, "entitlements")
    }

    pub async fn entitlement_points(&self, request: &PointsRequest) -> Result<Vec<EntitlementPoints>, ProviderError> {
        let envelope = self.post("entitlements/points", &to_body(request)?).await?;
        decode_list(&envelope, "entitlements")
    }

    pub async fn list_groups(&self, account_id: Option<i64>) -> Result<Vec<Group>, ProviderError> {
        let body = match account_id {
            Some(account_id) => json!({ "accountId": account_id }),
            None => json!({}),
        };
        let envelope = self.post("groups/list", &body).await?;
        decode_list(&envelope, "groups")
    }

    pub async fn next_token(&self, request: &NextTokenRequest) -> Result<Vec<Entitlement>, ProviderError> {
        let envelope = self.post("groups/nexttoken", &to_body(request)?).await?;
        decode_list(&envelope, "entitlements")
    }
}
