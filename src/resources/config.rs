//! `fortiflexvm_config`: a configuration under a program.

use super::{i64_attr, required_str, str_attr};
use crate::client::{CreateConfigRequest, FlexConfig, UpdateConfigRequest};
use crate::error::ProviderError;
use crate::params::{self, ProductType};
use crate::provider::{ManagedResource, Session};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Constraint, Diagnostic, NestedBlock, Schema};
use crate::types::StateResult;
use serde_json::{json, Value};
use tracing::{info, warn};

const ACTIVE: &str = "ACTIVE";
const DISABLED: &str = "DISABLED";

pub struct ConfigResource;

fn product_of(state: &Value) -> Result<ProductType, ProviderError> {
    let name = required_str(state, "product_type")?;
    ProductType::from_name(name).ok_or_else(|| {
        ProviderError::Validation(format!(
            "product_type invalid: {}, should be one of [{}]",
            name,
            ProductType::valid_names()
        ))
    })
}

fn config_id(state: &Value) -> Result<i64, ProviderError> {
    i64_attr(state, "id")
        .ok_or_else(|| ProviderError::InvalidRequest(format!("Invalid config id {}", state.get("id").unwrap_or(&Value::Null))))
}

fn encoded_parameters(product: ProductType, state: &Value) -> Result<Vec<params::Parameter>, ProviderError> {
    params::encode(product, state.get(product.block_name()).unwrap_or(&Value::Null))
}

/// State for `config`, keeping the user's own attributes from `base`.
///
/// Only the block of the configuration's product is filled; the rest are null.
fn config_state(base: &Value, config: &FlexConfig) -> Result<Value, ProviderError> {
    let product = ProductType::from_id(config.product_type.id).ok_or_else(|| {
        ProviderError::InvalidRequest(format!(
            "Can not recognise Product Type ID: {}",
            config.product_type.id
        ))
    })?;

    let mut state = base.as_object().cloned().unwrap_or_default();
    state.insert("id".into(), json!(config.id.to_string()));
    if let Some(psn) = &config.program_serial_number {
        state.insert("program_serial_number".into(), json!(psn));
    }
    if let Some(name) = &config.name {
        state.insert("name".into(), json!(name));
    }
    state.insert("product_type".into(), json!(product.name()));
    state.insert("status".into(), json!(config.status));
    if config.account_id.is_some() || !state.contains_key("account_id") {
        state.insert("account_id".into(), json!(config.account_id));
    }

    for other in ProductType::ALL {
        state.insert(other.block_name().into(), Value::Null);
    }
    let mut block = params::decode(product, &config.parameters)?;
    if let Value::Object(fields) = &mut block {
        for def in product.parameters() {
            fields.entry(def.field).or_insert(Value::Null);
        }
    }
    state.insert(product.block_name().into(), block);

    Ok(Value::Object(state))
}

/// Enable or disable `config` when its status differs from the desired one.
async fn reconcile_status(
    session: &Session,
    config: FlexConfig,
    desired: Option<&str>,
) -> Result<FlexConfig, ProviderError> {
    let Some(desired) = desired else {
        return Ok(config);
    };
    if config.status.as_deref() == Some(desired) {
        return Ok(config);
    }

    let mut updated = session
        .client
        .set_config_enabled(config.id, desired == ACTIVE)
        .await?;
    if updated.status.as_deref() != Some(desired) {
        warn!(id = config.id, desired, "Could not update the status of Config");
    }
    if updated.parameters.is_empty() {
        updated.parameters = config.parameters;
    }
    Ok(updated)
}

impl ConfigResource {
    async fn fetch(&self, session: &Session, current: &Value) -> Result<Value, ProviderError> {
        let program_serial_number = str_attr(current, "program_serial_number")
            .or_else(|| session.config.import_option("program_serial_number"))
            .ok_or_else(|| {
                ProviderError::Configuration(
                    "program_serial_number is unknown; set it in the provider import_options, \
                     e.g. program_serial_number=ELAVMS0000000000"
                        .to_string(),
                )
            })?;
        let config = session
            .client
            .find_config(program_serial_number, config_id(current)?)
            .await?;
        config_state(current, &config)
    }
}

#[async_trait::async_trait]
impl ManagedResource for ConfigResource {
    fn type_name(&self) -> &'static str {
        "fortiflexvm_config"
    }

    fn schema(&self) -> Schema {
        let schema = Schema::v0()
            .with_description("A FortiFlex configuration under a program.")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "program_serial_number",
                Attribute::required_string().with_force_new(),
            )
            .with_attribute("name", Attribute::required_string())
            .with_attribute(
                "product_type",
                Attribute::required_string()
                    .with_force_new()
                    .with_description(format!("Product type, one of: {}.", ProductType::valid_names()))
                    .with_constraint(Constraint::OneOf(
                        ProductType::ALL.iter().map(|p| p.name()).collect(),
                    )),
            )
            .with_attribute(
                "status",
                Attribute::optional_computed_string()
                    .with_description("ACTIVE enables the configuration, DISABLED disables it.")
                    .with_constraint(Constraint::OneOf(vec![ACTIVE, DISABLED])),
            )
            .with_attribute(
                "account_id",
                Attribute::new(AttributeType::Int64, AttributeFlags::optional_computed()),
            );
        ProductType::ALL.iter().fold(schema, |schema, product| {
            schema.with_block(product.block_name(), NestedBlock::single(product.block_schema()))
        })
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let Ok(product) = product_of(config) else {
            return Vec::new();
        };
        ProductType::ALL
            .iter()
            .filter(|other| **other != product)
            .filter(|other| config.get(other.block_name()).is_some_and(|block| !block.is_null()))
            .map(|other| {
                Diagnostic::warning(format!("{} is ignored", other.block_name())).with_detail(format!(
                    "product_type is {}; only the {} block is sent to FortiFlex.",
                    product,
                    product.block_name()
                ))
            })
            .collect()
    }

    async fn create(&self, session: &Session, planned: Value) -> Result<StateResult, ProviderError> {
        let product = product_of(&planned)?;
        let request = CreateConfigRequest {
            program_serial_number: required_str(&planned, "program_serial_number")?.to_string(),
            name: required_str(&planned, "name")?.to_string(),
            product_type_id: product.id(),
            parameters: encoded_parameters(product, &planned)?,
            account_id: i64_attr(&planned, "account_id"),
        };
        let created = session.client.create_config(&request).await?;
        info!(id = created.id, product = %product, "Created FortiFlex configuration");

        let config = reconcile_status(session, created, str_attr(&planned, "status")).await?;
        Ok(StateResult::new(config_state(&planned, &config)?))
    }

    async fn read(&self, session: &Session, current: Value) -> Result<StateResult, ProviderError> {
        Ok(StateResult::new(self.fetch(session, &current).await?))
    }

    async fn update(&self, session: &Session, prior: Value, planned: Value) -> Result<StateResult, ProviderError> {
        let product = product_of(&planned)?;
        let request = UpdateConfigRequest {
            id: config_id(&prior)?,
            name: required_str(&planned, "name")?.to_string(),
            parameters: encoded_parameters(product, &planned)?,
        };
        let updated = session.client.update_config(&request).await?;
        let config = reconcile_status(session, updated, str_attr(&planned, "status")).await?;
        Ok(StateResult::new(config_state(&planned, &config)?))
    }

    async fn delete(&self, session: &Session, current: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let id = config_id(&current)?;
        if str_attr(&current, "status") != Some(DISABLED) {
            let config = session.client.set_config_enabled(id, false).await?;
            if config.status.as_deref() != Some(DISABLED) {
                warn!(id, "Could not update the status of Config");
            }
        }
        info!(id, "Disabled FortiFlex configuration");
        Ok(vec![])
    }

    async fn import(&self, session: &Session, id: &str) -> Result<Value, ProviderError> {
        self.fetch(session, &json!({ "id": id })).await
    }
}
