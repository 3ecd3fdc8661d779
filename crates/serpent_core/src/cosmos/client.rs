//! Item operations against one Cosmos DB database.

use super::auth::{aad_token, master_key_token, request_date};
use super::{CosmosError, CosmosResult, CosmosSettings, COSMOS_API_VERSION};
use crate::azure::{AccessTokenProvider, CredentialCache, ManagedIdentityCredential};
use crate::util::time::utc_now_time_aware;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::{debug, warn};
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

const RESOURCE_DOCS: &str = "docs";
const HEADER_PARTITION_KEY: &str = "x-ms-documentdb-partitionkey";
const HEADER_CONTINUATION: &str = "x-ms-continuation";

/// Named parameter of a parameterized query, e.g. `@id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryParameter {
    pub name: String,
    pub value: Value,
}

impl QueryParameter {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Deserialize)]
struct QueryPage {
    #[serde(rename = "Documents", default)]
    documents: Vec<Value>,
}

enum Credential {
    MasterKey(Vec<u8>),
    Aad {
        scope: String,
        tokens: Arc<dyn AccessTokenProvider>,
    },
}

/// Cosmos DB client bound to one account and database.
pub struct CosmosClientContext {
    settings: CosmosSettings,
    endpoint: Url,
    client: reqwest::Client,
    credential: Credential,
}

impl std::fmt::Debug for CosmosClientContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CosmosClientContext")
            .field("endpoint", &self.endpoint.as_str())
            .field("database", &self.settings.database_name)
            .field("use_rbac", &self.settings.use_rbac)
            .finish_non_exhaustive()
    }
}

impl CosmosClientContext {
    /// Builds a client; with `use_rbac` it authorizes through a cached
    /// managed identity, otherwise through the account key.
    pub fn from_settings(settings: CosmosSettings, client_id: Option<String>) -> CosmosResult<Self> {
        let tokens: Arc<dyn AccessTokenProvider> = Arc::new(
            CredentialCache::new(ManagedIdentityCredential::new(client_id.clone()))
                .with_identity(client_id),
        );
        Self::new(settings, Some(tokens))
    }

    /// Builds a client with an explicit token provider for `use_rbac`.
    ///
    /// # Errors
    /// - `InvalidAccount` for an unparseable account uri, a non-base64 key,
    ///   or `use_rbac` without a token provider.
    pub fn new(
        settings: CosmosSettings,
        tokens: Option<Arc<dyn AccessTokenProvider>>,
    ) -> CosmosResult<Self> {
        let endpoint = Url::parse(&settings.account_uri)
            .map_err(|err| CosmosError::InvalidAccount(format!("{}: {err}", settings.account_uri)))?;

        let credential = if settings.use_rbac {
            let host = endpoint.host_str().ok_or_else(|| {
                CosmosError::InvalidAccount(format!("{} has no host", settings.account_uri))
            })?;
            let tokens = tokens.ok_or_else(|| {
                CosmosError::InvalidAccount("use_rbac requires a token provider".to_string())
            })?;
            Credential::Aad {
                scope: format!("https://{host}/.default"),
                tokens,
            }
        } else {
            let key = STANDARD
                .decode(settings.account_key.trim())
                .map_err(|err| CosmosError::InvalidAccount(format!("account key: {err}")))?;
            Credential::MasterKey(key)
        };

        Ok(Self {
            settings,
            endpoint,
            client: reqwest::Client::new(),
            credential,
        })
    }

    pub fn settings(&self) -> &CosmosSettings {
        &self.settings
    }

    /// Creates `item`; fails with a 409 status if the id already exists.
    pub async fn add_item(
        &self,
        item: &Value,
        partition_key: &str,
        container_name: &str,
    ) -> CosmosResult<Value> {
        let link = self.collection_link(container_name);
        let request = self
            .request(Method::POST, &format!("{link}/docs"), &link)
            .await?
            .header(HEADER_PARTITION_KEY, partition_key_header(partition_key))
            .json(item);
        let response = self.send(request, "add_item").await?;
        Ok(response.json().await?)
    }

    /// Creates or replaces `item`.
    pub async fn update_item(
        &self,
        item: &Value,
        partition_key: &str,
        container_name: &str,
    ) -> CosmosResult<Value> {
        let link = self.collection_link(container_name);
        let request = self
            .request(Method::POST, &format!("{link}/docs"), &link)
            .await?
            .header(HEADER_PARTITION_KEY, partition_key_header(partition_key))
            .header("x-ms-documentdb-is-upsert", "True")
            .json(item);
        let response = self.send(request, "update_item").await?;
        Ok(response.json().await?)
    }

    pub async fn get_item(
        &self,
        item_id: &str,
        partition_key: &str,
        container_name: &str,
    ) -> CosmosResult<Value> {
        let link = self.document_link(container_name, item_id);
        let request = self
            .request(Method::GET, &link, &link)
            .await?
            .header(HEADER_PARTITION_KEY, partition_key_header(partition_key));
        let response = self.send(request, "get_item").await?;
        Ok(response.json().await?)
    }

    pub async fn delete_item(
        &self,
        item_id: &str,
        partition_key: &str,
        container_name: &str,
    ) -> CosmosResult<()> {
        let link = self.document_link(container_name, item_id);
        let request = self
            .request(Method::DELETE, &link, &link)
            .await?
            .header(HEADER_PARTITION_KEY, partition_key_header(partition_key));
        self.send(request, "delete_item").await?;
        Ok(())
    }

    /// Runs a SQL query within one partition, following continuation
    /// tokens until the result set is exhausted.
    ///
    /// `max_item_count` bounds each page; `-1` lets the service decide.
    pub async fn query_items(
        &self,
        container_name: &str,
        query: &str,
        partition_key: &str,
        parameters: &[QueryParameter],
        max_item_count: i32,
    ) -> CosmosResult<Vec<Value>> {
        if container_name.is_empty() {
            return Err(CosmosError::InvalidArgument(
                "container_name must be specified".to_string(),
            ));
        }
        if partition_key.is_empty() {
            return Err(CosmosError::InvalidArgument(
                "partition_key must be specified".to_string(),
            ));
        }
        if query.is_empty() {
            return Err(CosmosError::InvalidArgument(
                "query must be specified".to_string(),
            ));
        }

        let link = self.collection_link(container_name);
        let body = json!({ "query": query, "parameters": parameters });
        let mut items = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut request = self
                .request(Method::POST, &format!("{link}/docs"), &link)
                .await?
                .header(HEADER_PARTITION_KEY, partition_key_header(partition_key))
                .header("x-ms-documentdb-isquery", "True")
                .header("x-ms-max-item-count", max_item_count.to_string())
                .header(reqwest::header::CONTENT_TYPE, "application/query+json")
                .body(body.to_string());
            if let Some(token) = continuation.take() {
                request = request.header(HEADER_CONTINUATION, token);
            }

            let response = self.send(request, "query_items").await?;
            continuation = response
                .headers()
                .get(HEADER_CONTINUATION)
                .and_then(|value| value.to_str().ok())
                .filter(|value| !value.is_empty())
                .map(str::to_string);
            let page: QueryPage = response.json().await?;
            items.extend(page.documents);

            if continuation.is_none() {
                break;
            }
        }

        Ok(items)
    }

    fn collection_link(&self, container_name: &str) -> String {
        format!(
            "dbs/{}/colls/{container_name}",
            self.settings.database_name
        )
    }

    fn document_link(&self, container_name: &str, item_id: &str) -> String {
        format!("{}/docs/{item_id}", self.collection_link(container_name))
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        resource_link: &str,
    ) -> CosmosResult<RequestBuilder> {
        let url = self
            .endpoint
            .join(path)
            .map_err(|err| CosmosError::InvalidArgument(format!("{path}: {err}")))?;
        let date = request_date(utc_now_time_aware());
        let authorization = match &self.credential {
            Credential::MasterKey(key) => {
                master_key_token(key, method.as_str(), RESOURCE_DOCS, resource_link, &date)?
            }
            Credential::Aad { scope, tokens } => aad_token(&tokens.access_token(scope).await?),
        };

        Ok(self
            .client
            .request(method, url)
            .header("x-ms-date", date)
            .header("x-ms-version", COSMOS_API_VERSION)
            .header(reqwest::header::AUTHORIZATION, authorization))
    }

    async fn send(&self, request: RequestBuilder, operation: &str) -> CosmosResult<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            debug!(
                "event=cosmos_request module=cosmos status=ok operation={} http_status={}",
                operation,
                status.as_u16()
            );
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!(
            "event=cosmos_request module=cosmos status=error operation={} http_status={}",
            operation,
            status.as_u16()
        );
        Err(CosmosError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

fn partition_key_header(partition_key: &str) -> String {
    json!([partition_key]).to_string()
}
