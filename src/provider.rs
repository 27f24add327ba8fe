//! The FortiFlex provider service.
//!
//! Resources and data sources register themselves by type name. The
//! provider owns the authenticated session and hands it to them on every
//! call.

use crate::client::{ClientSettings, FlexClient};
use crate::config::ProviderConfig;
use crate::data_sources;
use crate::error::ProviderError;
use crate::resources;
use crate::schema::{Diagnostic, ProviderSchema, Schema};
use crate::server::ProviderService;
use crate::types::{plan_from_schema, ImportedResource, PlanResult, StateResult};
use crate::validation;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Everything a resource needs to talk to FortiFlex.
#[derive(Debug, Clone)]
pub struct Session {
    pub client: Arc<FlexClient>,
    pub config: Arc<ProviderConfig>,
}

/// A resource type managed through create, read, update and delete.
#[async_trait::async_trait]
pub trait ManagedResource: Send + Sync {
    /// Type name, e.g. `fortiflexvm_config`.
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    /// Rules beyond what the schema expresses.
    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let _ = config;
        Vec::new()
    }

    async fn create(&self, session: &Session, planned: Value) -> Result<StateResult, ProviderError>;

    /// Refresh state. A [`ProviderError::NotFound`] drops the resource.
    async fn read(&self, session: &Session, current: Value) -> Result<StateResult, ProviderError>;

    async fn update(&self, session: &Session, prior: Value, planned: Value) -> Result<StateResult, ProviderError>;

    async fn delete(&self, session: &Session, current: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Build state for an existing object from its import id.
    async fn import(&self, session: &Session, id: &str) -> Result<Value, ProviderError> {
        let _ = (session, id);
        Err(ProviderError::InvalidRequest(format!(
            "Import not supported for resource type: {}",
            self.type_name()
        )))
    }
}

/// A read-only query.
#[async_trait::async_trait]
pub trait DataSource: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let _ = config;
        Vec::new()
    }

    async fn read(&self, session: &Session, config: Value) -> Result<StateResult, ProviderError>;
}

/// The FortiFlex provider.
pub struct FortiFlexProvider {
    resources: BTreeMap<&'static str, Box<dyn ManagedResource>>,
    data_sources: BTreeMap<&'static str, Box<dyn DataSource>>,
    session: RwLock<Option<Session>>,
}

impl Default for FortiFlexProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl FortiFlexProvider {
    /// A provider with every FortiFlex resource and data source registered.
    pub fn new() -> Self {
        let mut provider = Self {
            resources: BTreeMap::new(),
            data_sources: BTreeMap::new(),
            session: RwLock::new(None),
        };
        for resource in resources::all() {
            provider.resources.insert(resource.type_name(), resource);
        }
        for data_source in data_sources::all() {
            provider.data_sources.insert(data_source.type_name(), data_source);
        }
        provider
    }

    fn resource(&self, resource_type: &str) -> Result<&dyn ManagedResource, ProviderError> {
        self.resources
            .get(resource_type)
            .map(|r| r.as_ref())
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))
    }

    fn data_source(&self, data_source_type: &str) -> Result<&dyn DataSource, ProviderError> {
        self.data_sources
            .get(data_source_type)
            .map(|d| d.as_ref())
            .ok_or_else(|| ProviderError::UnknownResource(format!("Unknown data source type: {}", data_source_type)))
    }

    async fn session(&self) -> Result<Session, ProviderError> {
        self.session
            .read()
            .await
            .clone()
            .ok_or_else(|| ProviderError::Configuration("provider not configured".to_string()))
    }
}

#[async_trait::async_trait]
impl ProviderService for FortiFlexProvider {
    fn schema(&self) -> ProviderSchema {
        let schema = ProviderSchema::new().with_provider_config(ProviderConfig::schema());
        let schema = self
            .resources
            .values()
            .fold(schema, |schema, r| schema.with_resource(r.type_name(), r.schema()));
        self.data_sources
            .values()
            .fold(schema, |schema, d| schema.with_data_source(d.type_name(), d.schema()))
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validation::validate(&ProviderConfig::schema(), &config))
    }

    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let config = ProviderConfig::from_value(&config)?.with_env_fallback();
        let settings = match ClientSettings::from_config(&config) {
            Ok(settings) => settings,
            Err(diagnostics) => return Ok(diagnostics),
        };
        let client = FlexClient::connect(settings).await?;
        *self.session.write().await = Some(Session {
            client: Arc::new(client),
            config: Arc::new(config),
        });
        info!("FortiFlex provider configured");
        Ok(vec![])
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        self.session.write().await.take();
        Ok(())
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let mut diagnostics = validation::validate(&resource.schema(), &config);
        diagnostics.extend(resource.validate(&config));
        Ok(diagnostics)
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Option<Value>,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let resource = self.resource(resource_type)?;
        Ok(plan_from_schema(
            &resource.schema(),
            prior_state.as_ref(),
            proposed_state.as_ref(),
        ))
    }

    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<StateResult, ProviderError> {
        let resource = self.resource(resource_type)?;
        let session = self.session().await?;
        resource.create(&session, planned_state).await
    }

    async fn read(&self, resource_type: &str, current_state: Value) -> Result<StateResult, ProviderError> {
        let resource = self.resource(resource_type)?;
        let session = self.session().await?;
        match resource.read(&session, current_state).await {
            Err(ProviderError::NotFound(message)) => {
                warn!(resource_type, %message, "Resource no longer exists, removing from state");
                Ok(StateResult::new(Value::Null))
            },
            other => other,
        }
    }

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<StateResult, ProviderError> {
        let resource = self.resource(resource_type)?;
        let session = self.session().await?;
        resource.update(&session, prior_state, planned_state).await
    }

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let session = self.session().await?;
        resource.delete(&session, current_state).await
    }

    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let session = self.session().await?;
        let state = resource.import(&session, id).await?;
        Ok(vec![ImportedResource::new(resource_type, state)])
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let data_source = self.data_source(data_source_type)?;
        let mut diagnostics = validation::validate(&data_source.schema(), &config);
        diagnostics.extend(data_source.validate(&config));
        Ok(diagnostics)
    }

    async fn read_data_source(&self, data_source_type: &str, config: Value) -> Result<StateResult, ProviderError> {
        let data_source = self.data_source(data_source_type)?;
        let diagnostics = data_source.validate(&config);
        if crate::schema::has_errors(&diagnostics) {
            let summary = diagnostics
                .iter()
                .filter(|d| d.is_error())
                .map(|d| d.summary.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ProviderError::Validation(summary));
        }
        let session = self.session().await?;
        data_source.read(&session, config).await
    }
}
