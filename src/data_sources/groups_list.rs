//! `fortiflexvm_groups_list`

use super::result_state;
use crate::error::ProviderError;
use crate::provider::{DataSource, Session};
use crate::resources::i64_attr;
use crate::schema::{Attribute, AttributeType, Schema};
use crate::types::StateResult;
use serde_json::{json, Value};

pub struct GroupsListDataSource;

#[async_trait::async_trait]
impl DataSource for GroupsListDataSource {
    fn type_name(&self) -> &'static str {
        "fortiflexvm_groups_list"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Lists asset folders and their token counts.")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("account_id", Attribute::optional_int64())
            .with_attribute(
                "groups",
                Attribute::computed_object_list(AttributeType::object([
                    ("account_id", AttributeType::Int64),
                    ("available_tokens", AttributeType::Int64),
                    ("folder_path", AttributeType::String),
                    ("used_tokens", AttributeType::Int64),
                ])),
            )
    }

    async fn read(&self, session: &Session, config: Value) -> Result<StateResult, ProviderError> {
        let groups = session
            .client
            .list_groups(i64_attr(&config, "account_id"))
            .await?
            .into_iter()
            .map(|group| {
                json!({
                    "account_id": group.account_id,
                    "available_tokens": group.available_tokens,
                    "folder_path": group.folder_path,
                    "used_tokens": group.used_tokens,
                })
            })
            .collect();
        Ok(StateResult::new(result_state(&config, "GroupsList", [("groups", Value::Array(groups))])))
    }
}
