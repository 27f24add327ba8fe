//! `fortiflexvm_programs_list`

use super::result_state;
use crate::error::ProviderError;
use crate::provider::{DataSource, Session};
use crate::schema::{Attribute, AttributeType, Schema};
use crate::types::StateResult;
use serde_json::{json, Value};

pub struct ProgramsListDataSource;

#[async_trait::async_trait]
impl DataSource for ProgramsListDataSource {
    fn type_name(&self) -> &'static str {
        "fortiflexvm_programs_list"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Lists the FortiFlex programs of the account.")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "programs",
                Attribute::computed_object_list(AttributeType::object([
                    ("account_id", AttributeType::Int64),
                    ("end_date", AttributeType::String),
                    ("has_support_coverage", AttributeType::Bool),
                    ("serial_number", AttributeType::String),
                    ("start_date", AttributeType::String),
                ])),
            )
    }

    async fn read(&self, session: &Session, config: Value) -> Result<StateResult, ProviderError> {
        let programs = session
            .client
            .list_programs()
            .await?
            .into_iter()
            .map(|program| {
                json!({
                    "account_id": program.account_id,
                    "end_date": program.end_date,
                    "has_support_coverage": program.has_support_coverage,
                    "serial_number": program.serial_number,
                    "start_date": program.start_date,
                })
            })
            .collect();
        Ok(StateResult::new(result_state(
            &config,
            "ProgramsList",
            [("programs", Value::Array(programs))],
        )))
    }
}
