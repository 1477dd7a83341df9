//! REST adapter for Elasticsearch and OpenSearch
//!
//! Both engines share the document, index, scroll and bulk APIs used here, so a
//! single client serves either; [`ClusterKind`] only affects how the cluster
//! identifies itself.

use super::{BulkItemFailure, BulkOutcome, ClusterClient, ClusterConnector, ScrollPage, SearchPage};
use crate::error::{ClusterError, ClusterResult};
use async_trait::async_trait;
use dm_common::types::{
    AliasDefinition, ClusterEndpoint, ClusterInfo, ClusterKind, Document, IndexInfo,
};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Index settings the cluster assigns itself and rejects on index creation
pub const SERVER_MANAGED_SETTINGS: &[&str] = &[
    "uuid",
    "creation_date",
    "version",
    "provided_name",
    "history_uuid",
    "resize",
    "routing.allocation.initial_recovery",
];

/// HTTP client bound to one endpoint
pub struct RestClusterClient {
    endpoint: ClusterEndpoint,
    base_url: String,
    http: Client,
}

impl RestClusterClient {
    pub fn new(endpoint: ClusterEndpoint) -> ClusterResult<Self> {
        endpoint
            .validate()
            .map_err(|e| ClusterError::InvalidEndpoint(e.to_string()))?;

        let http = Client::builder()
            .connect_timeout(endpoint.connect_timeout())
            .timeout(endpoint.read_timeout())
            .build()
            .map_err(|e| ClusterError::InvalidEndpoint(format!("{endpoint}: {e}")))?;

        Ok(Self {
            base_url: endpoint.base_url(),
            endpoint,
            http,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let builder = self.http.request(method, url);

        if let Some(key) = &self.endpoint.api_key {
            builder.header(reqwest::header::AUTHORIZATION, format!("ApiKey {key}"))
        } else if let Some(user) = &self.endpoint.username {
            builder.basic_auth(user, self.endpoint.password.as_deref())
        } else {
            builder
        }
    }

    async fn send(&self, builder: RequestBuilder) -> ClusterResult<Response> {
        builder.send().await.map_err(|source| ClusterError::Connection {
            endpoint: self.base_url.clone(),
            source,
        })
    }

    /// Send and turn any non-success status into a [`ClusterError`]
    async fn execute(&self, operation: &str, builder: RequestBuilder) -> ClusterResult<Response> {
        let response = self.send(builder).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ClusterError::Authentication {
                endpoint: self.base_url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_failure(operation, status, body))
    }

    async fn execute_json(&self, operation: &str, builder: RequestBuilder) -> ClusterResult<Value> {
        self.execute(operation, builder)
            .await?
            .json::<Value>()
            .await
            .map_err(|e| ClusterError::unexpected(operation, e.to_string()))
    }

    /// Fetch `GET <index>/<api>` and return the `field` object of the index entry
    async fn index_section(&self, index: &str, api: &str, field: &str) -> ClusterResult<Option<Value>> {
        let operation = format!("get {api} of {index}");
        let body = self
            .execute_json(&operation, self.request(Method::GET, &format!("{}/{api}", encode(index))))
            .await?;

        let section = index_entry(&body, index)
            .and_then(|entry| entry.get(field))
            .filter(|value| value.as_object().map_or(true, |obj| !obj.is_empty()))
            .cloned();
        Ok(section)
    }
}

fn encode(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

/// The per-index entry of a `{"<index>": {...}}` response
///
/// Falls back to the only entry when `index` resolved to a differently named
/// concrete index (e.g. it was an alias).
fn index_entry<'a>(body: &'a Value, index: &str) -> Option<&'a Value> {
    let obj = body.as_object()?;
    obj.get(index)
        .or_else(|| if obj.len() == 1 { obj.values().next() } else { None })
}

fn error_field<'a>(body: &'a Value, field: &str) -> Option<&'a str> {
    body.get("error")?.get(field)?.as_str()
}

fn classify_failure(operation: &str, status: StatusCode, body: String) -> ClusterError {
    let parsed: Value = serde_json::from_str(&body).unwrap_or(Value::Null);

    match error_field(&parsed, "type") {
        Some("resource_already_exists_exception") => ClusterError::IndexAlreadyExists(
            error_field(&parsed, "index").unwrap_or_default().to_string(),
        ),
        Some("index_not_found_exception") => ClusterError::IndexNotFound(
            error_field(&parsed, "index").unwrap_or_default().to_string(),
        ),
        _ => ClusterError::Status {
            operation: operation.to_string(),
            status: status.as_u16(),
            body: error_field(&parsed, "reason")
                .map(str::to_string)
                .unwrap_or(body),
        },
    }
}

/// Drop settings that describe the source index rather than configure it
pub fn sanitize_settings(settings: &Value) -> Value {
    let mut cleaned = settings.clone();
    let Some(root) = cleaned.as_object_mut() else {
        return cleaned;
    };

    root.retain(|flat_key, _| {
        let key = flat_key.strip_prefix("index.").unwrap_or(flat_key);
        !SERVER_MANAGED_SETTINGS
            .iter()
            .any(|managed| key == *managed || key.starts_with(&format!("{managed}.")))
    });
    if let Some(Value::Object(index)) = root.get_mut("index") {
        for key in SERVER_MANAGED_SETTINGS {
            remove_path(index, key);
        }
    }
    cleaned
}

fn remove_path(obj: &mut Map<String, Value>, dotted: &str) {
    obj.remove(dotted);
    match dotted.split_once('.') {
        None => {}
        Some((head, rest)) => {
            if let Some(Value::Object(child)) = obj.get_mut(head) {
                remove_path(child, rest);
            }
        }
    }
}

fn parse_hits(operation: &str, body: &Value) -> ClusterResult<Vec<Document>> {
    let hits = body
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .ok_or_else(|| ClusterError::unexpected(operation, "missing hits.hits"))?;

    hits.iter()
        .map(|hit| {
            let id = hit
                .get("_id")
                .and_then(Value::as_str)
                .ok_or_else(|| ClusterError::unexpected(operation, "hit without _id"))?;
            Ok(Document::new(
                id,
                hit.get("_source").cloned().unwrap_or(Value::Null),
            ))
        })
        .collect()
}

fn total_hits(body: &Value) -> Option<u64> {
    let total = body.pointer("/hits/total")?;
    total
        .as_u64()
        .or_else(|| total.get("value").and_then(Value::as_u64))
}

fn parse_scroll_page(operation: &str, body: &Value) -> ClusterResult<ScrollPage> {
    Ok(ScrollPage {
        scroll_id: body
            .get("_scroll_id")
            .and_then(Value::as_str)
            .map(str::to_string),
        documents: parse_hits(operation, body)?,
        total_hits: total_hits(body),
    })
}

fn cat_string(row: &Value, key: &str) -> String {
    row.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn cat_number(row: &Value, key: &str) -> u64 {
    match row.get(key) {
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        _ => 0,
    }
}

/// Newline-delimited bulk body: one `index` action plus one source line per document
fn bulk_body(index: &str, documents: &[Document]) -> ClusterResult<String> {
    let mut body = String::new();
    for doc in documents {
        let action = json!({ "index": { "_index": index, "_id": doc.id } });
        body.push_str(&action.to_string());
        body.push('\n');
        body.push_str(
            &serde_json::to_string(&doc.source)
                .map_err(|e| ClusterError::unexpected("bulk", e.to_string()))?,
        );
        body.push('\n');
    }
    Ok(body)
}

fn parse_bulk_response(body: &Value) -> ClusterResult<BulkOutcome> {
    let items = body
        .get("items")
        .and_then(Value::as_array)
        .ok_or_else(|| ClusterError::unexpected("bulk", "missing items"))?;

    let mut outcome = BulkOutcome::default();
    for item in items {
        let Some(result) = item.as_object().and_then(|obj| obj.values().next()) else {
            continue;
        };
        match result.get("error") {
            None | Some(Value::Null) => outcome.succeeded += 1,
            Some(error) => outcome.failures.push(BulkItemFailure {
                id: cat_string(result, "_id"),
                status: result.get("status").and_then(Value::as_u64).unwrap_or(0) as u16,
                reason: error
                    .get("reason")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| error.to_string()),
            }),
        }
    }
    Ok(outcome)
}

#[async_trait]
impl ClusterClient for RestClusterClient {
    fn endpoint(&self) -> &ClusterEndpoint {
        &self.endpoint
    }

    async fn ping(&self) -> ClusterResult<()> {
        self.execute("ping", self.request(Method::GET, "/")).await?;
        Ok(())
    }

    async fn cluster_info(&self) -> ClusterResult<ClusterInfo> {
        let body = self
            .execute_json("cluster info", self.request(Method::GET, "/"))
            .await?;
        let text = |pointer: &str| body.pointer(pointer).and_then(Value::as_str).map(str::to_string);

        let distribution = text("/version/distribution").or_else(|| {
            Some(match self.endpoint.kind {
                ClusterKind::Elasticsearch => "elasticsearch".to_string(),
                ClusterKind::Opensearch => "opensearch".to_string(),
            })
        });

        Ok(ClusterInfo {
            cluster_name: text("/cluster_name").unwrap_or_default(),
            cluster_uuid: text("/cluster_uuid").unwrap_or_default(),
            version: text("/version/number")
                .ok_or_else(|| ClusterError::unexpected("cluster info", "missing version.number"))?,
            lucene_version: text("/version/lucene_version"),
            distribution,
        })
    }

    async fn list_indices(&self) -> ClusterResult<Vec<IndexInfo>> {
        let body = self
            .execute_json(
                "list indices",
                self.request(Method::GET, "_cat/indices").query(&[("format", "json")]),
            )
            .await?;
        let rows = body
            .as_array()
            .ok_or_else(|| ClusterError::unexpected("list indices", "expected an array"))?;

        let mut indices: Vec<IndexInfo> = rows
            .iter()
            .map(|row| IndexInfo {
                name: cat_string(row, "index"),
                document_count: cat_number(row, "docs.count"),
                size: row
                    .get("store.size")
                    .and_then(Value::as_str)
                    .unwrap_or("0")
                    .to_string(),
                health: row
                    .get("health")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string(),
                status: cat_string(row, "status"),
                number_of_shards: cat_number(row, "pri") as u32,
                number_of_replicas: cat_number(row, "rep") as u32,
            })
            .collect();
        indices.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(indices)
    }

    async fn index_exists(&self, index: &str) -> ClusterResult<bool> {
        let response = self
            .send(self.request(Method::HEAD, &encode(index)))
            .await?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ClusterError::Authentication {
                endpoint: self.base_url.clone(),
                status: response.status().as_u16(),
            }),
            status => Err(ClusterError::Status {
                operation: format!("check index {index}"),
                status: status.as_u16(),
                body: String::new(),
            }),
        }
    }

    async fn create_index(
        &self,
        index: &str,
        settings: Option<&Value>,
        mappings: Option<&Value>,
    ) -> ClusterResult<()> {
        let mut body = Map::new();
        if let Some(settings) = settings {
            body.insert("settings".into(), sanitize_settings(settings));
        }
        if let Some(mappings) = mappings {
            body.insert("mappings".into(), mappings.clone());
        }

        let operation = format!("create index {index}");
        match self
            .execute(&operation, self.request(Method::PUT, &encode(index)).json(&body))
            .await
        {
            Ok(_) => Ok(()),
            Err(ClusterError::IndexAlreadyExists(_)) => {
                Err(ClusterError::IndexAlreadyExists(index.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn delete_index(&self, index: &str) -> ClusterResult<()> {
        let operation = format!("delete index {index}");
        match self
            .execute(&operation, self.request(Method::DELETE, &encode(index)))
            .await
        {
            Ok(_) => Ok(()),
            Err(ClusterError::IndexNotFound(_)) => Err(ClusterError::IndexNotFound(index.to_string())),
            Err(e) => Err(e),
        }
    }

    async fn get_settings(&self, index: &str) -> ClusterResult<Option<Value>> {
        self.index_section(index, "_settings", "settings").await
    }

    async fn get_mappings(&self, index: &str) -> ClusterResult<Option<Value>> {
        self.index_section(index, "_mapping", "mappings").await
    }

    async fn get_aliases(&self, index: &str) -> ClusterResult<BTreeMap<String, AliasDefinition>> {
        let aliases = self.index_section(index, "_alias", "aliases").await?;
        Ok(aliases
            .as_ref()
            .and_then(Value::as_object)
            .map(|obj| {
                obj.iter()
                    .map(|(name, def)| (name.clone(), AliasDefinition::from_value(def)))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn put_alias(
        &self,
        index: &str,
        alias: &str,
        definition: &AliasDefinition,
    ) -> ClusterResult<()> {
        let operation = format!("create alias {alias} on {index}");
        let path = format!("{}/_alias/{}", encode(index), encode(alias));
        self.execute(&operation, self.request(Method::PUT, &path).json(definition))
            .await?;
        Ok(())
    }

    async fn count_documents(&self, index: &str) -> ClusterResult<u64> {
        let operation = format!("count documents in {index}");
        let body = self
            .execute_json(&operation, self.request(Method::GET, &format!("{}/_count", encode(index))))
            .await?;
        body.get("count")
            .and_then(Value::as_u64)
            .ok_or_else(|| ClusterError::unexpected(operation, "missing count"))
    }

    async fn open_scroll(
        &self,
        index: &str,
        page_size: usize,
        keep_alive: &str,
    ) -> ClusterResult<ScrollPage> {
        let operation = format!("open scroll on {index}");
        let query = json!({
            "size": page_size,
            "query": { "match_all": {} },
            "sort": ["_doc"],
        });
        let body = self
            .execute_json(
                &operation,
                self.request(Method::POST, &format!("{}/_search", encode(index)))
                    .query(&[("scroll", keep_alive)])
                    .json(&query),
            )
            .await?;
        parse_scroll_page(&operation, &body)
    }

    async fn continue_scroll(&self, scroll_id: &str, keep_alive: &str) -> ClusterResult<ScrollPage> {
        let body = self
            .execute_json(
                "continue scroll",
                self.request(Method::POST, "_search/scroll")
                    .json(&json!({ "scroll": keep_alive, "scroll_id": scroll_id })),
            )
            .await?;
        parse_scroll_page("continue scroll", &body)
    }

    async fn clear_scroll(&self, scroll_id: &str) -> ClusterResult<()> {
        let response = self
            .send(
                self.request(Method::DELETE, "_search/scroll")
                    .json(&json!({ "scroll_id": [scroll_id] })),
            )
            .await?;
        match response.status() {
            status if status.is_success() => Ok(()),
            // Already expired server-side
            StatusCode::NOT_FOUND => {
                debug!(scroll_id = %scroll_id, "Scroll already gone");
                Ok(())
            }
            status => Err(ClusterError::Status {
                operation: "clear scroll".to_string(),
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }

    async fn bulk_index(&self, index: &str, documents: &[Document]) -> ClusterResult<BulkOutcome> {
        if documents.is_empty() {
            return Ok(BulkOutcome::default());
        }

        let operation = format!("bulk index into {index}");
        let body = self
            .execute_json(
                &operation,
                self.request(Method::POST, "_bulk")
                    .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
                    .body(bulk_body(index, documents)?),
            )
            .await?;
        let outcome = parse_bulk_response(&body)?;

        let accounted = outcome.succeeded + outcome.failed();
        if accounted != documents.len() as u64 {
            warn!(
                index = %index,
                sent = documents.len(),
                reported = accounted,
                "Bulk response item count does not match the batch"
            );
        }
        Ok(outcome)
    }

    async fn search_documents(
        &self,
        index: &str,
        query: Option<&str>,
        page: usize,
        size: usize,
    ) -> ClusterResult<SearchPage> {
        let operation = format!("search {index}");
        let query_clause = match query.map(str::trim).filter(|q| !q.is_empty()) {
            Some(q) => json!({ "query_string": { "query": format!("*{q}*") } }),
            None => json!({ "match_all": {} }),
        };
        let body = self
            .execute_json(
                &operation,
                self.request(Method::POST, &format!("{}/_search", encode(index))).json(&json!({
                    "from": page * size,
                    "size": size,
                    "query": query_clause,
                    "track_total_hits": true,
                })),
            )
            .await?;

        Ok(SearchPage {
            total: total_hits(&body).unwrap_or(0),
            page,
            size,
            documents: parse_hits(&operation, &body)?,
        })
    }

    async fn get_document(&self, index: &str, id: &str) -> ClusterResult<Option<Document>> {
        let path = format!("{}/_doc/{}", encode(index), encode(id));
        let response = self.send(self.request(Method::GET, &path)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let operation = format!("get document {id} from {index}");
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(&operation, status, body));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ClusterError::unexpected(&operation, e.to_string()))?;
        if body.get("found").and_then(Value::as_bool) == Some(false) {
            return Ok(None);
        }
        Ok(Some(Document::new(
            id,
            body.get("_source").cloned().unwrap_or(Value::Null),
        )))
    }
}

/// Connects to real clusters over HTTP
#[derive(Debug, Default, Clone, Copy)]
pub struct RestConnector;

impl ClusterConnector for RestConnector {
    fn connect(&self, endpoint: &ClusterEndpoint) -> ClusterResult<Arc<dyn ClusterClient>> {
        Ok(Arc::new(RestClusterClient::new(endpoint.clone())?))
    }
}
