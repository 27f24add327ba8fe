//! Mock FortiFlex API shared by the integration tests.

#![allow(dead_code)]

use fortiflex_provider::testing::ProviderTester;
use fortiflex_provider::FortiFlexProvider;
use serde_json::{json, Value};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN_PATH: &str = "/oauth/token/";
pub const ACCESS_TOKEN: &str = "test-access-token";
pub const PROGRAM: &str = "ELAVMS0000000001";

/// Full path of a v2 endpoint, e.g. `api("configs/list")`.
pub fn api(endpoint: &str) -> String {
    format!("/ES/api/fortiflex/v2/{}", endpoint)
}

/// A successful envelope carrying `payload` under `key`.
pub fn ok(key: &str, payload: Value) -> ResponseTemplate {
    let mut body = json!({"status": 0, "message": "Request processed successfully"});
    body[key] = payload;
    ResponseTemplate::new(200).set_body_json(body)
}

/// An error envelope as FortiFlex sends it.
pub fn api_error(status: i64, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"status": status, "message": message}))
}

pub fn entitlement(serial_number: &str, status: &str, description: &str) -> Value {
    json!({
        "serialNumber": serial_number,
        "configId": 42,
        "accountId": 12345,
        "description": description,
        "startDate": "2024-01-01T00:00:00",
        "endDate": "2030-01-01T00:00:00",
        "status": status,
        "token": format!("TOKEN-{}", serial_number),
        "tokenStatus": "NOTUSED"
    })
}

/// A mock server that already answers the OAuth token request.
pub async fn start_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": ACCESS_TOKEN,
            "expires_in": 3600,
            "token_type": "Bearer"
        })))
        .mount(&server)
        .await;
    server
}

pub fn provider_config(server: &MockServer) -> Value {
    json!({
        "username": "api-user",
        "password": "api-password",
        "api_url": server.uri(),
        "auth_url": format!("{}{}", server.uri(), TOKEN_PATH),
        "retry_interval_ms": 0,
        "import_options": [format!("program_serial_number={}", PROGRAM)]
    })
}

/// A provider configured against `server`.
pub async fn configured(server: &MockServer) -> ProviderTester<FortiFlexProvider> {
    let tester = ProviderTester::new(FortiFlexProvider::new());
    tester
        .configure(provider_config(server))
        .await
        .expect("provider should configure against the mock server");
    tester
}

/// Answer `entitlements/list` lookups of one entitlement of config 42.
pub async fn mount_find(server: &MockServer, serial_number: &str, response: Value) {
    Mock::given(method("POST"))
        .and(path(api("entitlements/list")))
        .and(body_json(json!({"configId": 42, "serialNumber": serial_number})))
        .respond_with(ok("entitlements", json!([response])))
        .mount(server)
        .await;
}
