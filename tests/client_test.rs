//! Authentication and API envelope handling against a mock FortiFlex.

mod common;

use common::*;
use fortiflex_provider::testing::{ProviderTester, TestError};
use fortiflex_provider::{FortiFlexProvider, ProviderError};
use serde_json::json;
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_requests_carry_bearer_token() {
    let server = start_server().await;
    Mock::given(method("POST"))
        .and(path(api("programs/list")))
        .and(header("authorization", format!("Bearer {}", ACCESS_TOKEN).as_str()))
        .respond_with(ok(
            "programs",
            json!([{"serialNumber": PROGRAM, "accountId": 12345, "startDate": "2024-01-01", "endDate": "2027-01-01"}]),
        ))
        .expect(1)
        .mount(&server)
        .await;

    let tester = configured(&server).await;
    let result = assert_ok!(tester.read_data_source("fortiflexvm_programs_list", json!({})).await);
    assert_eq!(result.state["id"], "ProgramsList");
    assert_eq!(result.state["programs"][0]["serial_number"], PROGRAM);
}

#[tokio::test]
async fn test_auth_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "invalid_grant"})))
        .mount(&server)
        .await;

    let tester = ProviderTester::new(FortiFlexProvider::new());
    let err = assert_err!(tester.configure(provider_config(&server)).await);
    match err {
        TestError::Provider(ProviderError::PermissionDenied(message)) => {
            assert!(message.starts_with("Can not get Token"), "{}", message);
            assert!(message.contains("401"));
        },
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_auth_sends_password_grant() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_json(json!({
            "username": "api-user",
            "password": "api-password",
            "client_id": "flexvm",
            "grant_type": "password"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": ACCESS_TOKEN})))
        .expect(1)
        .mount(&server)
        .await;

    let tester = ProviderTester::new(FortiFlexProvider::new());
    assert_ok!(tester.configure(provider_config(&server)).await);
}

#[tokio::test]
async fn test_operations_require_configure() {
    let tester = ProviderTester::new(FortiFlexProvider::new());
    let err = assert_err!(tester.read_data_source("fortiflexvm_programs_list", json!({})).await);
    assert!(matches!(err, ProviderError::Configuration(_)));
}

#[tokio::test]
async fn test_api_error_status_is_retried_then_humanized() {
    let server = start_server().await;
    Mock::given(method("POST"))
        .and(path(api("configs/update")))
        .respond_with(api_error(1, "Parameter id 9 is out of range"))
        .expect(4)
        .mount(&server)
        .await;

    let tester = configured(&server).await;
    let prior = json!({
        "id": "7",
        "program_serial_number": PROGRAM,
        "name": "fmg",
        "product_type": "FMG_VM",
        "status": "ACTIVE",
        "fmg_vm": {"managed_dev": 10, "adom_num": 2}
    });
    let mut planned = prior.clone();
    planned["fmg_vm"]["adom_num"] = json!(999999);

    let err = assert_err!(tester.update("fortiflexvm_config", prior, planned).await);
    match err {
        ProviderError::Api { status, message } => {
            assert_eq!(status, "1");
            assert_eq!(message, "Parameter adom_num is out of range");
        },
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_create_is_sent_once() {
    let server = start_server().await;
    Mock::given(method("POST"))
        .and(path(api("entitlements/vm/create")))
        .respond_with(api_error(-1, "Not enough points"))
        .expect(1)
        .mount(&server)
        .await;

    let tester = configured(&server).await;
    let plan = assert_ok!(
        tester
            .plan_create("fortiflexvm_entitlements_vm", json!({"config_id": 42}))
            .await
    );
    let err = assert_err!(
        tester
            .create("fortiflexvm_entitlements_vm", plan.planned_state)
            .await
    );
    assert!(err.to_string().contains("Not enough points"));
}

#[tokio::test]
async fn test_non_json_unauthorized_response() {
    let server = start_server().await;
    Mock::given(method("POST"))
        .and(path(api("groups/list")))
        .respond_with(ResponseTemplate::new(401).set_body_string("Authorization Required"))
        .mount(&server)
        .await;

    let tester = configured(&server).await;
    let err = assert_err!(tester.read_data_source("fortiflexvm_groups_list", json!({})).await);
    assert!(matches!(err, ProviderError::PermissionDenied(_)));
}

#[tokio::test]
async fn test_registered_types() {
    let tester = ProviderTester::new(FortiFlexProvider::new());
    assert_eq!(tester.resource_types().len(), 6);
    assert!(tester
        .resource_types()
        .iter()
        .all(|name| name.starts_with("fortiflexvm_")));
    assert!(tester
        .data_source_types()
        .contains(&"fortiflexvm_groups_nexttoken".to_string()));

    let schema = tester.schema();
    assert!(schema.provider.block.attributes["password"].flags.sensitive);
}
