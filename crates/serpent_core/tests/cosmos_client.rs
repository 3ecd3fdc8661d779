use async_trait::async_trait;
use serde_json::json;
use serpent_core::azure::{AccessTokenProvider, IdentityResult};
use serpent_core::cosmos::{CosmosClientContext, CosmosError, CosmosSettings, QueryParameter};
use std::sync::{Arc, Mutex};
use wiremock::matchers::{body_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DOCS_PATH: &str = "/dbs/library/colls/books/docs";

fn settings(server: &MockServer, use_rbac: bool) -> CosmosSettings {
    CosmosSettings {
        account_uri: format!("{}/", server.uri()),
        account_key: "c2VjcmV0LWtleQ==".to_string(),
        database_name: "library".to_string(),
        container_name: "books".to_string(),
        use_rbac,
    }
}

fn key_client(server: &MockServer) -> CosmosClientContext {
    CosmosClientContext::new(settings(server, false), None).unwrap()
}

#[derive(Default)]
struct RecordingTokens {
    scopes: Mutex<Vec<String>>,
}

#[async_trait]
impl AccessTokenProvider for RecordingTokens {
    async fn access_token(&self, scope: &str) -> IdentityResult<String> {
        self.scopes.lock().unwrap().push(scope.to_string());
        Ok("aad-token".to_string())
    }
}

#[tokio::test]
async fn add_item_posts_document_with_shared_key_headers() {
    let server = MockServer::start().await;
    let item = json!({ "id": "b-1", "pk": "fiction", "title": "Kindred" });
    Mock::given(method("POST"))
        .and(path(DOCS_PATH))
        .and(header("x-ms-version", "2018-12-31"))
        .and(header("x-ms-documentdb-partitionkey", "[\"fiction\"]"))
        .and(header_exists("x-ms-date"))
        .and(header_exists("authorization"))
        .and(body_json(&item))
        .respond_with(ResponseTemplate::new(201).set_body_json(&item))
        .expect(1)
        .mount(&server)
        .await;

    let created = key_client(&server)
        .add_item(&item, "fiction", "books")
        .await
        .unwrap();
    assert_eq!(created["title"], "Kindred");

    let requests = server.received_requests().await.unwrap();
    let authorization = requests[0].headers["authorization"].to_str().unwrap();
    assert!(authorization.starts_with("type%3Dmaster%26ver%3D1.0%26sig%3D"));
}

#[tokio::test]
async fn update_item_upserts() {
    let server = MockServer::start().await;
    let item = json!({ "id": "b-1", "pk": "fiction", "title": "Kindred (2nd ed.)" });
    Mock::given(method("POST"))
        .and(path(DOCS_PATH))
        .and(header("x-ms-documentdb-is-upsert", "True"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&item))
        .expect(1)
        .mount(&server)
        .await;

    let stored = key_client(&server)
        .update_item(&item, "fiction", "books")
        .await
        .unwrap();
    assert_eq!(stored, item);
}

#[tokio::test]
async fn get_and_delete_address_one_document() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{DOCS_PATH}/b-1")))
        .and(header("x-ms-documentdb-partitionkey", "[\"fiction\"]"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "b-1" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{DOCS_PATH}/b-1")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = key_client(&server);
    let item = client.get_item("b-1", "fiction", "books").await.unwrap();
    assert_eq!(item["id"], "b-1");
    client.delete_item("b-1", "fiction", "books").await.unwrap();
}

#[tokio::test]
async fn error_status_surfaces_with_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{DOCS_PATH}/missing")))
        .respond_with(ResponseTemplate::new(404).set_body_string("{\"code\":\"NotFound\"}"))
        .mount(&server)
        .await;

    let err = key_client(&server)
        .get_item("missing", "fiction", "books")
        .await
        .unwrap_err();
    match err {
        CosmosError::Status { status, body } => {
            assert_eq!(status, 404);
            assert!(body.contains("NotFound"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn query_items_follows_continuation_tokens() {
    let server = MockServer::start().await;
    let query = "SELECT * FROM c WHERE c.pk = @pk";
    Mock::given(method("POST"))
        .and(path(DOCS_PATH))
        .and(header("x-ms-continuation", "page-2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "Documents": [{ "id": "b-3" }], "_count": 1 })),
        )
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(DOCS_PATH))
        .and(header("x-ms-documentdb-isquery", "True"))
        .and(header("content-type", "application/query+json"))
        .and(header("x-ms-max-item-count", "2"))
        .and(body_json(json!({
            "query": query,
            "parameters": [{ "name": "@pk", "value": "fiction" }]
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-ms-continuation", "page-2")
                .set_body_json(json!({
                    "Documents": [{ "id": "b-1" }, { "id": "b-2" }],
                    "_count": 2
                })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let items = key_client(&server)
        .query_items(
            "books",
            query,
            "fiction",
            &[QueryParameter::new("@pk", "fiction")],
            2,
        )
        .await
        .unwrap();
    let ids: Vec<&str> = items.iter().filter_map(|item| item["id"].as_str()).collect();
    assert_eq!(ids, vec!["b-1", "b-2", "b-3"]);
}

#[tokio::test]
async fn query_items_validates_arguments_before_any_request() {
    let server = MockServer::start().await;
    let client = key_client(&server);

    let cases = [
        ("", "SELECT * FROM c", "pk", "container_name must be specified"),
        ("books", "SELECT * FROM c", "", "partition_key must be specified"),
        ("books", "", "pk", "query must be specified"),
    ];
    for (container, query, partition_key, message) in cases {
        let err = client
            .query_items(container, query, partition_key, &[], -1)
            .await
            .unwrap_err();
        assert!(matches!(err, CosmosError::InvalidArgument(_)));
        assert_eq!(err.to_string(), message);
    }
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn rbac_mode_sends_aad_token_for_account_scope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{DOCS_PATH}/b-1")))
        .and(header(
            "authorization",
            "type%3Daad%26ver%3D1.0%26sig%3Daad-token",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "b-1" })))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = Arc::new(RecordingTokens::default());
    let client =
        CosmosClientContext::new(settings(&server, true), Some(tokens.clone())).unwrap();
    client.get_item("b-1", "fiction", "books").await.unwrap();

    let scopes = tokens.scopes.lock().unwrap().clone();
    assert_eq!(scopes, vec!["https://127.0.0.1/.default".to_string()]);
}

#[test]
fn invalid_account_settings_are_rejected() {
    let mut bad_key = CosmosSettings {
        account_uri: "https://acct.documents.azure.com:443/".to_string(),
        account_key: "not base64!".to_string(),
        database_name: "library".to_string(),
        container_name: "books".to_string(),
        use_rbac: false,
    };
    assert!(matches!(
        CosmosClientContext::new(bad_key.clone(), None),
        Err(CosmosError::InvalidAccount(_))
    ));

    bad_key.use_rbac = true;
    assert!(matches!(
        CosmosClientContext::new(bad_key, None),
        Err(CosmosError::InvalidAccount(_))
    ));
}
