use serde_json::json;
use serpent_core::azure::{
    AccessToken, AuthorizedClient, CredentialCache, IdentityError, ManagedIdentityCredential,
    TokenCredential,
};
use std::collections::HashMap;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SCOPE: &str = "https://vault.azure.net/.default";

async fn identity_server(status: u16, expected_calls: u64) -> MockServer {
    let server = MockServer::start().await;
    let response = if status == 200 {
        ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "vault-token",
            "expires_on": "1700000000",
            "resource": "https://vault.azure.net",
            "token_type": "Bearer"
        }))
    } else {
        ResponseTemplate::new(status).set_body_string("identity not found")
    };
    Mock::given(method("GET"))
        .and(path("/token"))
        .and(header("Metadata", "true"))
        .and(query_param("api-version", "2018-02-01"))
        .and(query_param("resource", "https://vault.azure.net"))
        .and(query_param("client_id", "client-1"))
        .respond_with(response)
        .expect(expected_calls)
        .mount(&server)
        .await;
    server
}

fn credential(server: &MockServer) -> ManagedIdentityCredential {
    ManagedIdentityCredential::with_endpoint(
        format!("{}/token", server.uri()),
        Some("client-1".to_string()),
    )
}

#[tokio::test]
async fn managed_identity_requests_token_for_scope_resource() {
    let server = identity_server(200, 1).await;

    let token = credential(&server).get_token(SCOPE).await.unwrap();
    assert_eq!(
        token,
        AccessToken {
            token: "vault-token".to_string(),
            expires_on: Some(1_700_000_000),
        }
    );
}

#[tokio::test]
async fn cached_credential_hits_endpoint_once_per_scope() {
    let server = identity_server(200, 1).await;
    let cache = CredentialCache::new(credential(&server)).with_identity(Some("client-1".into()));

    assert_eq!(cache.get_access_token(SCOPE).await.unwrap(), "vault-token");
    assert_eq!(cache.get_access_token(SCOPE).await.unwrap(), "vault-token");
}

#[tokio::test]
async fn endpoint_failure_is_returned_unchanged() {
    let server = identity_server(400, 2).await;
    let cache = CredentialCache::new(credential(&server));

    for _ in 0..2 {
        let err = cache.get_access_token(SCOPE).await.unwrap_err();
        match err {
            IdentityError::Status { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body, "identity not found");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

#[tokio::test]
async fn authorized_client_sends_cached_bearer_token() {
    let server = identity_server(200, 1).await;
    Mock::given(method("GET"))
        .and(path("/secrets/db"))
        .and(header("authorization", "Bearer vault-token"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": "s3cr3t" })))
        .expect(1)
        .mount(&server)
        .await;

    let cache = CredentialCache::new(credential(&server));
    let custom = HashMap::from([("Content-Type".to_string(), "json".to_string())]);
    let client = AuthorizedClient::new(SCOPE, false, &custom, &cache)
        .await
        .unwrap();
    assert_eq!(client.scope(), SCOPE);

    let status = client
        .client()
        .get(format!("{}/secrets/db", server.uri()))
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(status, 200);

    let reused = AuthorizedClient::new(SCOPE, false, &HashMap::new(), &cache)
        .await
        .unwrap();
    assert_eq!(reused.headers()["authorization"], "Bearer vault-token");
}
