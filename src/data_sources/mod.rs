//! Read-only FortiFlex queries.

mod configs_list;
mod entitlements_list;
mod entitlements_points;
mod groups_list;
mod groups_nexttoken;
mod programs_list;

pub use configs_list::ConfigsListDataSource;
pub use entitlements_list::EntitlementsListDataSource;
pub use entitlements_points::EntitlementsPointsDataSource;
pub use groups_list::GroupsListDataSource;
pub use groups_nexttoken::GroupsNextTokenDataSource;
pub use programs_list::ProgramsListDataSource;

use crate::provider::DataSource;
use crate::schema::Diagnostic;
use serde_json::{json, Value};

/// Every data source served by the provider.
pub fn all() -> Vec<Box<dyn DataSource>> {
    vec![
        Box::new(ProgramsListDataSource),
        Box::new(ConfigsListDataSource),
        Box::new(EntitlementsListDataSource),
        Box::new(EntitlementsPointsDataSource),
        Box::new(GroupsListDataSource),
        Box::new(GroupsNextTokenDataSource),
    ]
}

/// The query config with `id` and the computed attributes filled in.
pub(crate) fn result_state<I>(config: &Value, id: impl Into<String>, computed: I) -> Value
where
    I: IntoIterator<Item = (&'static str, Value)>,
{
    let mut state = config.as_object().cloned().unwrap_or_default();
    state.insert("id".into(), json!(id.into()));
    for (name, value) in computed {
        state.insert(name.into(), value);
    }
    Value::Object(state)
}

/// Whether a filter attribute was given.
pub(crate) fn is_set(config: &Value, key: &str) -> bool {
    match config.get(key) {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

/// Require `config_id`, or both `account_id` and `program_serial_number`.
pub(crate) fn require_config_or_program(config: &Value) -> Vec<Diagnostic> {
    let by_config = is_set(config, "config_id");
    let by_program = is_set(config, "account_id") && is_set(config, "program_serial_number");
    if by_config || by_program {
        Vec::new()
    } else {
        vec![Diagnostic::error(
            "either config_id or (account_id + program_serial_number) should be provided in request payload",
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_state() {
        let state = result_state(&json!({"account_id": 7}), "GroupsList", [("groups", json!([]))]);
        assert_eq!(state, json!({"account_id": 7, "id": "GroupsList", "groups": []}));
    }

    #[test]
    fn test_require_config_or_program() {
        assert!(require_config_or_program(&json!({"config_id": 42})).is_empty());
        assert!(require_config_or_program(&json!({
            "account_id": 7,
            "program_serial_number": "ELAVMS0000000001"
        }))
        .is_empty());

        let diagnostics = require_config_or_program(&json!({"account_id": 7, "program_serial_number": ""}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.starts_with("either config_id"));
    }
}
