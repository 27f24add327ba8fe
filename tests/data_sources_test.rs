//! Data sources against a mock FortiFlex.

mod common;

use common::*;
use fortiflex_provider::testing::assert_error_contains;
use fortiflex_provider::ProviderError;
use serde_json::json;
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{body_json, method, path};
use wiremock::Mock;

#[tokio::test]
async fn test_configs_list() {
    let server = start_server().await;
    Mock::given(method("POST"))
        .and(path(api("configs/list")))
        .and(body_json(json!({"programSerialNumber": PROGRAM})))
        .respond_with(ok(
            "configs",
            json!([
                {
                    "id": 41,
                    "programSerialNumber": PROGRAM,
                    "name": "bundle",
                    "status": "ACTIVE",
                    "productType": {"id": 1},
                    "parameters": [
                        {"id": 1, "value": "4"},
                        {"id": 2, "value": "UTM"},
                        {"id": 10, "value": 2}
                    ]
                },
                {
                    "id": 7,
                    "programSerialNumber": PROGRAM,
                    "name": "fmg",
                    "status": "DISABLED",
                    "productType": {"id": 2},
                    "parameters": [{"id": 9, "value": "2"}, {"id": 30, "value": "10"}]
                }
            ]),
        ))
        .mount(&server)
        .await;

    let tester = configured(&server).await;
    let result = assert_ok!(
        tester
            .read_data_source("fortiflexvm_configs_list", json!({"program_serial_number": PROGRAM}))
            .await
    );
    let configs = &result.state["configs"];
    assert_eq!(result.state["id"], PROGRAM);
    assert_eq!(configs[0]["product_type"], "FGT_VM_Bundle");
    assert_eq!(configs[0]["fgt_vm_bundle"]["cpu_size"], "4");
    assert!(configs[0]["fmg_vm"].is_null());
    assert_eq!(configs[1]["fmg_vm"], json!({"managed_dev": 10, "adom_num": 2}));
}

#[tokio::test]
async fn test_entitlements_list_by_program() {
    let server = start_server().await;
    Mock::given(method("POST"))
        .and(path(api("entitlements/list")))
        .and(body_json(json!({"accountId": 12345, "programSerialNumber": PROGRAM, "status": "ACTIVE"})))
        .respond_with(ok(
            "entitlements",
            json!([entitlement("FGVMMLTM00000001", "ACTIVE", "web-01")]),
        ))
        .expect(1)
        .mount(&server)
        .await;

    let tester = configured(&server).await;
    let result = assert_ok!(
        tester
            .read_data_source(
                "fortiflexvm_entitlements_list",
                json!({"account_id": 12345, "program_serial_number": PROGRAM, "status": "ACTIVE"})
            )
            .await
    );
    assert_eq!(result.state["id"], format!("12345.{}", PROGRAM));
    let entitlements = &result.state["entitlements"];
    assert_eq!(entitlements[0]["serial_number"], "FGVMMLTM00000001");
    assert_eq!(entitlements[0]["token_status"], "NOTUSED");
}

#[tokio::test]
async fn test_entitlements_list_needs_a_scope() {
    let server = start_server().await;
    let tester = configured(&server).await;

    let diagnostics = assert_ok!(
        tester
            .validate_data_source_config("fortiflexvm_entitlements_list", json!({"account_id": 12345}))
            .await
    );
    assert_error_contains(&diagnostics, "either config_id or (account_id + program_serial_number)");

    let err = assert_err!(
        tester
            .read_data_source("fortiflexvm_entitlements_list", json!({"status": "ACTIVE"}))
            .await
    );
    assert!(matches!(err, ProviderError::Validation(_)));
}

#[tokio::test]
async fn test_entitlements_points() {
    let server = start_server().await;
    Mock::given(method("POST"))
        .and(path(api("entitlements/points")))
        .and(body_json(json!({"configId": 42, "startDate": "2024-01-01", "endDate": "2024-02-01"})))
        .respond_with(ok(
            "entitlements",
            json!([{"serialNumber": "FGVMMLTM00000001", "accountId": 12345, "points": 31.5}]),
        ))
        .mount(&server)
        .await;

    let tester = configured(&server).await;
    let result = assert_ok!(
        tester
            .read_data_source(
                "fortiflexvm_entitlements_points",
                json!({"config_id": 42, "start_date": "2024-01-01", "end_date": "2024-02-01"})
            )
            .await
    );
    assert_eq!(result.state["id"], "42.2024-01-01.2024-02-01");
    assert_eq!(result.state["entitlements"][0]["points"], 31.5);
}

#[tokio::test]
async fn test_groups_list_and_next_token() {
    let server = start_server().await;
    Mock::given(method("POST"))
        .and(path(api("groups/list")))
        .and(body_json(json!({})))
        .respond_with(ok(
            "groups",
            json!([{"folderPath": "My Assets/lab", "accountId": 12345, "availableTokens": 3, "usedTokens": 1}]),
        ))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(api("groups/nexttoken")))
        .and(body_json(json!({"folderPath": "My Assets/lab"})))
        .respond_with(ok(
            "entitlements",
            json!([entitlement("FGVMMLTM00000003", "STOPPED", "")]),
        ))
        .mount(&server)
        .await;

    let tester = configured(&server).await;
    let groups = assert_ok!(tester.read_data_source("fortiflexvm_groups_list", json!({})).await);
    assert_eq!(groups.state["id"], "GroupsList");
    assert_eq!(groups.state["groups"][0]["available_tokens"], 3);

    let next = assert_ok!(
        tester
            .read_data_source("fortiflexvm_groups_nexttoken", json!({"folder_path": "My Assets/lab"}))
            .await
    );
    assert_eq!(next.state["id"], "GroupsNexttoken");
    assert_eq!(next.state["token"], "TOKEN-FGVMMLTM00000003");
}

#[tokio::test]
async fn test_legacy_vms_key_is_accepted() {
    let server = start_server().await;
    Mock::given(method("POST"))
        .and(path(api("entitlements/list")))
        .respond_with(ok("vms", json!([entitlement("FGVMMLTM00000009", "ACTIVE", "")])))
        .mount(&server)
        .await;

    let tester = configured(&server).await;
    let result = assert_ok!(
        tester
            .read_data_source("fortiflexvm_entitlements_list", json!({"config_id": 42}))
            .await
    );
    assert_eq!(result.state["entitlements"][0]["serial_number"], "FGVMMLTM00000009");
}
