//! Entitlement resources against a mock FortiFlex.

mod common;

use common::*;
use fortiflex_provider::testing::{
    assert_plan_changes_attribute, assert_plan_no_changes, assert_plan_replaces, assert_warning_contains,
};
use fortiflex_provider::ProviderError;
use serde_json::json;
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::Mock;

const VM: &str = "fortiflexvm_entitlements_vm";
const HARDWARE: &str = "fortiflexvm_entitlements_hardware";
const CLOUD: &str = "fortiflexvm_entitlements_cloud";
const VM_TOKEN: &str = "fortiflexvm_entitlements_vm_token";
const SERIAL: &str = "FGVMMLTM00000001";

async fn mount_status_change(server: &wiremock::MockServer, endpoint: &str, status: &str, times: u64) {
    Mock::given(method("POST"))
        .and(path(api(&format!("entitlements/{}", endpoint))))
        .and(body_json(json!({"serialNumber": SERIAL})))
        .respond_with(ok("entitlements", json!([entitlement(SERIAL, status, "web-01")])))
        .expect(times)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_vm_create_stopped() {
    let server = start_server().await;
    Mock::given(method("POST"))
        .and(path(api("entitlements/vm/create")))
        .and(body_json(json!({"configId": 42, "count": 1, "description": "web-01"})))
        .respond_with(ok("entitlements", json!([entitlement(SERIAL, "PENDING", "web-01")])))
        .expect(1)
        .mount(&server)
        .await;
    mount_status_change(&server, "stop", "STOPPED", 1).await;

    let tester = configured(&server).await;
    let created = assert_ok!(
        tester
            .lifecycle_create(VM, json!({"config_id": 42, "description": "web-01", "status": "STOPPED"}))
            .await
    );
    let state = created.state;
    assert_eq!(state["id"], format!("{}.42", SERIAL));
    assert_eq!(state["serial_number"], SERIAL);
    assert_eq!(state["status"], "STOPPED");
    assert_eq!(state["token"], format!("TOKEN-{}", SERIAL));
    assert_eq!(state["token_status"], "NOTUSED");
    assert_eq!(state["refresh_token_when_destroy"], false);
    assert!(created.diagnostics.is_empty());
}

#[tokio::test]
async fn test_vm_pending_to_active_warns() {
    let server = start_server().await;
    Mock::given(method("POST"))
        .and(path(api("entitlements/vm/create")))
        .respond_with(ok("entitlements", json!([entitlement(SERIAL, "PENDING", "")])))
        .mount(&server)
        .await;
    mount_status_change(&server, "reactivate", "PENDING", 1).await;

    let tester = configured(&server).await;
    let created = assert_ok!(
        tester
            .lifecycle_create(VM, json!({"config_id": 42, "status": "ACTIVE"}))
            .await
    );
    assert_warning_contains(&created.diagnostics, "Unable to change status from PENDING to ACTIVE");
    assert_eq!(created.state["status"], "PENDING");
}

#[tokio::test]
async fn test_vm_update_description() {
    let server = start_server().await;
    mount_find(&server, SERIAL, entitlement(SERIAL, "STOPPED", "web-01")).await;
    Mock::given(method("POST"))
        .and(path(api("entitlements/update")))
        .and(body_json(json!({"serialNumber": SERIAL, "configId": 42, "description": "web-02"})))
        .respond_with(ok("entitlements", json!([entitlement(SERIAL, "STOPPED", "web-02")])))
        .expect(1)
        .mount(&server)
        .await;
    mount_status_change(&server, "stop", "STOPPED", 0).await;

    let tester = configured(&server).await;
    let prior = json!({
        "id": format!("{}.42", SERIAL),
        "config_id": 42,
        "serial_number": SERIAL,
        "account_id": 12345,
        "description": "web-01",
        "start_date": "2024-01-01T00:00:00",
        "end_date": "2030-01-01T00:00:00",
        "status": "STOPPED",
        "token": format!("TOKEN-{}", SERIAL),
        "token_status": "NOTUSED",
        "refresh_token_when_destroy": false
    });
    let updated = assert_ok!(
        tester
            .lifecycle_update(VM, prior, json!({"config_id": 42, "description": "web-02"}))
            .await
    );
    assert_eq!(updated.state["description"], "web-02");
    assert_eq!(updated.state["status"], "STOPPED");
}

#[tokio::test]
async fn test_vm_past_end_date_is_ignored_with_warning() {
    let server = start_server().await;
    mount_find(&server, SERIAL, entitlement(SERIAL, "ACTIVE", "web-01")).await;
    Mock::given(method("POST"))
        .and(path(api("entitlements/update")))
        .and(body_json(json!({"serialNumber": SERIAL, "configId": 42, "description": "web-01"})))
        .respond_with(ok("entitlements", json!([entitlement(SERIAL, "ACTIVE", "web-01")])))
        .expect(1)
        .mount(&server)
        .await;

    let tester = configured(&server).await;
    let prior = json!({"id": format!("{}.42", SERIAL), "config_id": 42, "status": "ACTIVE"});
    let planned = json!({
        "id": format!("{}.42", SERIAL),
        "config_id": 42,
        "description": "web-01",
        "end_date": "2001-01-01",
        "status": "ACTIVE"
    });
    let updated = assert_ok!(tester.update(VM, prior, planned).await);
    assert_warning_contains(&updated.diagnostics, "end_date can not be before today's date");
    assert_eq!(updated.state["end_date"], "2030-01-01T00:00:00");
}

#[tokio::test]
async fn test_vm_delete_stops_and_refreshes_token() {
    let server = start_server().await;
    mount_find(&server, SERIAL, entitlement(SERIAL, "ACTIVE", "web-01")).await;
    mount_status_change(&server, "stop", "STOPPED", 1).await;
    Mock::given(method("POST"))
        .and(path(api("entitlements/vm/token")))
        .and(body_json(json!({"serialNumber": SERIAL})))
        .respond_with(ok("entitlements", json!([entitlement(SERIAL, "STOPPED", "web-01")])))
        .expect(1)
        .mount(&server)
        .await;

    let tester = configured(&server).await;
    let state = json!({
        "id": format!("{}.42", SERIAL),
        "config_id": 42,
        "status": "ACTIVE",
        "refresh_token_when_destroy": true
    });
    assert_ok!(tester.lifecycle_delete(VM, state).await);
}

#[tokio::test]
async fn test_vm_delete_of_vanished_entitlement() {
    let server = start_server().await;
    Mock::given(method("POST"))
        .and(path(api("entitlements/list")))
        .respond_with(ok("entitlements", json!([])))
        .mount(&server)
        .await;
    mount_status_change(&server, "stop", "STOPPED", 0).await;

    let tester = configured(&server).await;
    let state = json!({"id": format!("{}.42", SERIAL), "config_id": 42, "status": "ACTIVE"});
    assert_ok!(tester.lifecycle_delete(VM, state.clone()).await);

    let read = assert_ok!(tester.read(VM, state).await);
    assert!(read.state.is_null());
}

#[tokio::test]
async fn test_vm_import() {
    let server = start_server().await;
    mount_find(&server, SERIAL, entitlement(SERIAL, "ACTIVE", "web-01")).await;

    let tester = configured(&server).await;
    let imported = assert_ok!(tester.import_resource(VM, &format!("{}.42", SERIAL)).await);
    let state = &imported[0].state;
    assert_eq!(imported[0].resource_type, VM);
    assert_eq!(state["id"], format!("{}.42", SERIAL));
    assert_eq!(state["refresh_token_when_destroy"], false);
    assert_eq!(state["description"], "web-01");

    let err = assert_err!(tester.import_resource(VM, SERIAL).await);
    assert!(matches!(err, ProviderError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_hardware_create_with_description() {
    let server = start_server().await;
    let serial = "FGT60FTK00000001";
    let device = json!({
        "serialNumber": serial,
        "configId": 42,
        "accountId": 12345,
        "startDate": "2024-01-01T00:00:00Z",
        "endDate": "2030-01-01T00:00:00Z",
        "status": "PENDING"
    });
    Mock::given(method("POST"))
        .and(path(api("entitlements/hardware/create")))
        .and(body_json(json!({"configId": 42, "serialNumbers": [serial]})))
        .respond_with(ok("entitlements", json!([device.clone()])))
        .expect(1)
        .mount(&server)
        .await;
    mount_find(&server, serial, device.clone()).await;
    let mut described = device.clone();
    described["description"] = json!("branch office");
    Mock::given(method("POST"))
        .and(path(api("entitlements/update")))
        .and(body_partial_json(json!({"serialNumber": serial, "description": "branch office"})))
        .respond_with(ok("entitlements", json!([described])))
        .expect(1)
        .mount(&server)
        .await;

    let tester = configured(&server).await;
    let created = assert_ok!(
        tester
            .lifecycle_create(HARDWARE, json!({
                "config_id": 42,
                "serial_number": serial,
                "description": "branch office"
            }))
            .await
    );
    assert_eq!(created.state["id"], format!("{}.42", serial));
    assert_eq!(created.state["description"], "branch office");
    assert!(created.state.get("token").is_none());
}

#[tokio::test]
async fn test_hardware_delete_uses_recorded_status() {
    let server = start_server().await;
    let serial = "FGT60FTK00000001";
    Mock::given(method("POST"))
        .and(path(api("entitlements/stop")))
        .respond_with(ok("entitlements", json!([{"serialNumber": serial, "configId": 42, "status": "STOPPED"}])))
        .expect(1)
        .mount(&server)
        .await;

    let tester = configured(&server).await;
    let id = format!("{}.42", serial);
    assert_ok!(tester.delete(HARDWARE, json!({"id": id, "status": "PENDING"})).await);
    assert_ok!(tester.delete(HARDWARE, json!({"id": id, "status": "ACTIVE"})).await);
}

#[tokio::test]
async fn test_cloud_create_and_delete() {
    let server = start_server().await;
    Mock::given(method("POST"))
        .and(path(api("entitlements/cloud/create")))
        .and(body_json(json!({"configId": 42, "count": 1, "description": "web-01"})))
        .respond_with(ok("entitlements", json!([entitlement(SERIAL, "ACTIVE", "web-01")])))
        .expect(1)
        .mount(&server)
        .await;
    mount_find(&server, SERIAL, entitlement(SERIAL, "ACTIVE", "web-01")).await;
    mount_status_change(&server, "stop", "STOPPED", 1).await;

    let tester = configured(&server).await;
    let created = assert_ok!(
        tester
            .lifecycle_create(CLOUD, json!({"config_id": 42, "description": "web-01"}))
            .await
    );
    assert_eq!(created.state["status"], "ACTIVE");
    assert!(created.state.get("token").is_none());

    assert_ok!(tester.lifecycle_delete(CLOUD, created.state).await);
}

#[tokio::test]
async fn test_vm_token_regenerate() {
    let server = start_server().await;
    Mock::given(method("POST"))
        .and(path(api("entitlements/vm/token")))
        .and(body_json(json!({"serialNumber": SERIAL})))
        .respond_with(ok("entitlements", json!([entitlement(SERIAL, "STOPPED", "")])))
        .expect(1)
        .mount(&server)
        .await;
    mount_find(&server, SERIAL, entitlement(SERIAL, "STOPPED", "")).await;

    let tester = configured(&server).await;
    let created = assert_ok!(
        tester
            .lifecycle_create(VM_TOKEN, json!({
                "serial_number": SERIAL,
                "config_id": 42,
                "regenerate_token": true
            }))
            .await
    );
    assert_eq!(created.state["token"], format!("TOKEN-{}", SERIAL));
    assert_eq!(created.state["regenerate_token"], true);

    // Destroying the token resource leaves the entitlement alone.
    assert_ok!(tester.lifecycle_delete(VM_TOKEN, created.state).await);
}

#[tokio::test]
async fn test_vm_plans() {
    let server = start_server().await;
    let tester = configured(&server).await;
    let prior = json!({
        "id": format!("{}.42", SERIAL),
        "config_id": 42,
        "serial_number": SERIAL,
        "description": "web-01",
        "status": "ACTIVE",
        "token": format!("TOKEN-{}", SERIAL),
        "refresh_token_when_destroy": false
    });

    let plan = assert_ok!(
        tester
            .plan_update(VM, prior.clone(), json!({"config_id": 42, "description": "web-01"}))
            .await
    );
    assert_plan_no_changes(&plan);

    let plan = assert_ok!(
        tester
            .plan_update(VM, prior.clone(), json!({"config_id": 43, "description": "web-01"}))
            .await
    );
    assert_plan_changes_attribute(&plan, "config_id");
    assert!(!plan.requires_replace);

    let hardware_prior = json!({"id": "FGT60FTK00000001.42", "config_id": 42, "serial_number": "FGT60FTK00000001"});
    let plan = assert_ok!(
        tester
            .plan_update(HARDWARE, hardware_prior, json!({"config_id": 42, "serial_number": "FGT60FTK00000002"}))
            .await
    );
    assert_plan_replaces(&plan);
}
