//! `fortiflexvm_configs_list`: the configurations of one program.

use super::result_state;
use crate::client::FlexConfig;
use crate::error::ProviderError;
use crate::params::{self, ProductType};
use crate::provider::{DataSource, Session};
use crate::schema::{Attribute, AttributeType, Schema};
use crate::types::StateResult;
use serde_json::{json, Map, Value};
use tracing::warn;

pub struct ConfigsListDataSource;

/// Object type of one product's parameters.
fn product_object_type(product: ProductType) -> AttributeType {
    AttributeType::object(
        product
            .block_schema()
            .attributes
            .into_iter()
            .map(|(name, attr)| (name, attr.attr_type)),
    )
}

fn config_object_type() -> AttributeType {
    let mut fields = vec![
        ("id".to_string(), AttributeType::Int64),
        ("account_id".to_string(), AttributeType::Int64),
        ("program_serial_number".to_string(), AttributeType::String),
        ("name".to_string(), AttributeType::String),
        ("product_type".to_string(), AttributeType::String),
        ("status".to_string(), AttributeType::String),
    ];
    fields.extend(
        ProductType::ALL
            .iter()
            .map(|product| (product.block_name().to_string(), product_object_type(*product))),
    );
    AttributeType::object(fields)
}

/// One configuration as a list element. Only its own product's block is set.
fn config_object(config: &FlexConfig) -> Value {
    let product = ProductType::from_id(config.product_type.id);
    let mut object = Map::new();
    object.insert("id".into(), json!(config.id));
    object.insert("account_id".into(), json!(config.account_id));
    object.insert("program_serial_number".into(), json!(config.program_serial_number));
    object.insert("name".into(), json!(config.name));
    object.insert("product_type".into(), json!(product.map(ProductType::name)));
    object.insert("status".into(), json!(config.status));
    for other in ProductType::ALL {
        object.insert(other.block_name().into(), Value::Null);
    }

    match product {
        Some(product) => match params::decode(product, &config.parameters) {
            Ok(block) => {
                object.insert(product.block_name().into(), block);
            },
            Err(err) => warn!(id = config.id, error = %err, "Unable to decode configuration parameters"),
        },
        None => warn!(id = config.id, product_type = config.product_type.id, "Can not recognise Product Type ID"),
    }
    Value::Object(object)
}

#[async_trait::async_trait]
impl DataSource for ConfigsListDataSource {
    fn type_name(&self) -> &'static str {
        "fortiflexvm_configs_list"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Lists the configurations of a program.")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("program_serial_number", Attribute::required_string())
            .with_attribute("configs", Attribute::computed_object_list(config_object_type()))
    }

    async fn read(&self, session: &Session, config: Value) -> Result<StateResult, ProviderError> {
        let program_serial_number = config
            .get("program_serial_number")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ProviderError::Validation("program_serial_number is required".to_string()))?;
        let configs = session
            .client
            .list_configs(program_serial_number)
            .await?
            .iter()
            .map(config_object)
            .collect();
        let id = program_serial_number.to_string();
        Ok(StateResult::new(result_state(&config, id, [("configs", Value::Array(configs))])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_object() {
        let config: FlexConfig = serde_json::from_value(json!({
            "id": 7,
            "programSerialNumber": "ELAVMS0000000001",
            "name": "fmg",
            "status": "DISABLED",
            "productType": {"id": 2},
            "parameters": [{"id": 3, "value": 10}, {"id": 9, "value": "2"}]
        }))
        .unwrap();
        let object = config_object(&config);
        assert_eq!(object["product_type"], "FMG_VM");
        assert_eq!(object["fmg_vm"], json!({"managed_dev": 10, "adom_num": 2}));
        assert!(object["fgt_vm_bundle"].is_null());
    }

    #[test]
    fn test_unknown_product_leaves_blocks_empty() {
        let config: FlexConfig = serde_json::from_value(json!({
            "id": 7,
            "productType": {"id": 999},
            "parameters": [{"id": 1, "value": "2"}]
        }))
        .unwrap();
        let object = config_object(&config);
        assert!(object["product_type"].is_null());
        assert!(ProductType::ALL.iter().all(|p| object[p.block_name()].is_null()));
    }

    #[test]
    fn test_object_type_covers_every_product() {
        let AttributeType::Object(fields) = config_object_type() else {
            panic!("config objects must be objects");
        };
        assert_eq!(fields.len(), 6 + ProductType::ALL.len());
        assert!(matches!(fields["fgt_vm_lcs"], AttributeType::Object(_)));
    }
}
