//! Snowflake Cortex Search store.
//!
//! Searches go to the Cortex Search REST endpoint of a named service; the
//! service embeds the query and ranks rows itself. Writes go through the
//! Snowflake SQL API as one parameterized `MERGE` per batch keyed on the
//! title, so a batch lands whole or not at all. Title and abstract vectors
//! are bound as JSON arrays.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use super::{DocumentStore, StoreConnector, StoreError, StoreResult};
use crate::config::StoreSettings;
use crate::models::{DocumentRecord, EmbeddedDocument};

const TOKEN_TYPE_HEADER: &str = "x-snowflake-authorization-token-type";

/// Table columns in binding order.
const COLUMNS: [&str; 11] = [
    "title",
    "abstract",
    "title_vector",
    "abstract_vector",
    "introduction",
    "methods",
    "results",
    "conclusion",
    "keywords",
    "limitations",
    "future_work",
];

/// Opens authenticated sessions against a Snowflake account.
#[derive(Debug, Clone)]
pub struct CortexConnector {
    settings: StoreSettings,
}

impl CortexConnector {
    pub fn new(settings: StoreSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl StoreConnector for CortexConnector {
    type Store = CortexStore;

    async fn connect(&self) -> StoreResult<CortexStore> {
        CortexStore::open(self.settings.clone())
    }
}

/// Session with one Cortex Search service and its backing table.
#[derive(Debug, Clone)]
pub struct CortexStore {
    client: Client,
    base_url: String,
    settings: StoreSettings,
}

impl CortexStore {
    /// Validate settings and build an authenticated HTTP client.
    ///
    /// # Errors
    /// Returns `StoreError::ConfigError` if the account URL or token is missing
    /// or the table name is not a plain identifier
    pub fn open(settings: StoreSettings) -> StoreResult<Self> {
        let base_url = settings.account_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(StoreError::ConfigError(
                "Snowflake account URL is not set (SNOWFLAKE_ACCOUNT_URL)".to_string(),
            ));
        }
        let token = settings
            .token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                StoreError::ConfigError("Snowflake token is not set (SNOWFLAKE_TOKEN)".to_string())
            })?;
        validate_identifier(&settings.table)?;

        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| StoreError::ConfigError(format!("Invalid token: {e}")))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            TOKEN_TYPE_HEADER,
            HeaderValue::from_str(&settings.token_type)
                .map_err(|e| StoreError::ConfigError(format!("Invalid token type: {e}")))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;

        info!(
            account = %base_url,
            database = %settings.database,
            schema = %settings.schema,
            "Opened Snowflake session"
        );

        Ok(Self {
            client,
            base_url,
            settings,
        })
    }

    fn search_url(&self) -> StoreResult<String> {
        if self.settings.service.trim().is_empty() {
            return Err(StoreError::ConfigError(
                "Cortex Search service name is not set (SERVICE)".to_string(),
            ));
        }
        Ok(format!(
            "{}/api/v2/databases/{}/schemas/{}/cortex-search-services/{}:query",
            self.base_url, self.settings.database, self.settings.schema, self.settings.service
        ))
    }

    fn statements_url(&self) -> String {
        format!("{}/api/v2/statements", self.base_url)
    }

    /// Request body for one `MERGE` covering every document in the batch.
    fn merge_body(&self, documents: &[&EmbeddedDocument]) -> StoreResult<Value> {
        let mut bindings = Map::new();
        for document in documents {
            for value in row_bindings(document)? {
                bindings.insert((bindings.len() + 1).to_string(), value);
            }
        }

        Ok(json!({
            "statement": merge_statement(&self.settings.table, documents.len()),
            "timeout": 60,
            "database": self.settings.database,
            "schema": self.settings.schema,
            "warehouse": self.settings.warehouse,
            "bindings": bindings,
        }))
    }

    async fn post(&self, url: &str, body: &Value) -> StoreResult<Value> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| StoreError::RequestError(format!("Request to {url} failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| StoreError::RequestError(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(StoreError::RequestError(format!("HTTP {status}: {text}")));
        }

        serde_json::from_str(&text)
            .map_err(|e| StoreError::SerializationError(format!("Invalid JSON from store: {e}")))
    }
}

#[async_trait]
impl DocumentStore for CortexStore {
    async fn search(
        &self,
        query: &str,
        columns: &[&str],
        limit: usize,
    ) -> StoreResult<Vec<DocumentRecord>> {
        let url = self.search_url()?;
        let body = json!({
            "query": query,
            "columns": columns,
            "limit": limit,
        });

        debug!(service = %self.settings.service, limit, "Querying Cortex Search");
        let response = self.post(&url, &body).await?;
        parse_search_response(&response)
    }

    async fn upsert(&self, documents: &[EmbeddedDocument]) -> StoreResult<usize> {
        let rows = last_per_title(documents);
        if rows.is_empty() {
            return Ok(0);
        }

        let body = self.merge_body(&rows)?;
        self.post(&self.statements_url(), &body).await?;
        debug!(table = %self.settings.table, rows = rows.len(), "Merged papers");
        Ok(documents.len())
    }

    fn name(&self) -> &str {
        "cortex"
    }
}

/// Keep the last document for each title, in first-seen order.
///
/// Snowflake rejects a `MERGE` whose source matches one target row twice.
fn last_per_title(documents: &[EmbeddedDocument]) -> Vec<&EmbeddedDocument> {
    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut rows: Vec<&EmbeddedDocument> = Vec::new();
    for document in documents {
        match slots.get(document.record.title.as_str()) {
            Some(&slot) => rows[slot] = document,
            None => {
                slots.insert(document.record.title.as_str(), rows.len());
                rows.push(document);
            }
        }
    }
    rows
}

fn row_bindings(document: &EmbeddedDocument) -> StoreResult<[Value; 11]> {
    let record = &document.record;
    Ok([
        text_binding(&record.title),
        text_binding(&record.abstract_text),
        vector_binding(document.title_vector.as_deref())?,
        vector_binding(document.abstract_vector.as_deref())?,
        text_binding(&record.introduction),
        text_binding(&record.methods),
        text_binding(&record.results),
        text_binding(&record.conclusion),
        text_binding(&record.keywords),
        text_binding(&record.limitations),
        text_binding(&record.future_work),
    ])
}

/// `MERGE` of `rows` bound rows into `table`, matching on title.
fn merge_statement(table: &str, rows: usize) -> String {
    let first = COLUMNS
        .iter()
        .map(|c| format!("{} AS {c}", placeholder(c)))
        .collect::<Vec<_>>()
        .join(", ");
    let rest = COLUMNS
        .iter()
        .map(|c| placeholder(c))
        .collect::<Vec<_>>()
        .join(", ");
    let source = std::iter::once(format!("SELECT {first}"))
        .chain(std::iter::repeat(format!("SELECT {rest}")).take(rows.saturating_sub(1)))
        .collect::<Vec<_>>()
        .join(" UNION ALL ");

    let updates = COLUMNS[1..]
        .iter()
        .map(|c| format!("{c} = s.{c}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sourced = COLUMNS
        .iter()
        .map(|c| format!("s.{c}"))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "MERGE INTO {table} AS t USING ({source}) AS s ON t.title = s.title \
         WHEN MATCHED THEN UPDATE SET {updates} \
         WHEN NOT MATCHED THEN INSERT ({}) VALUES ({sourced})",
        COLUMNS.join(", ")
    )
}

fn placeholder(column: &str) -> &'static str {
    if column.ends_with("_vector") {
        "PARSE_JSON(?)"
    } else {
        "?"
    }
}

/// Blank text is stored as SQL NULL.
fn text_binding(text: &str) -> Value {
    if text.trim().is_empty() {
        json!({ "type": "TEXT", "value": null })
    } else {
        json!({ "type": "TEXT", "value": text })
    }
}

fn vector_binding(vector: Option<&[f32]>) -> StoreResult<Value> {
    match vector {
        Some(v) => {
            let encoded = serde_json::to_string(v)
                .map_err(|e| StoreError::SerializationError(e.to_string()))?;
            Ok(json!({ "type": "TEXT", "value": encoded }))
        }
        None => Ok(json!({ "type": "TEXT", "value": null })),
    }
}

fn validate_identifier(name: &str) -> StoreResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(StoreError::ConfigError(format!("Invalid table name: {name:?}")))
    }
}

/// Decode the `results` array of a Cortex Search response.
///
/// Column names are matched case-insensitively; absent columns become empty.
fn parse_search_response(body: &Value) -> StoreResult<Vec<DocumentRecord>> {
    let rows = body
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| StoreError::SerializationError("Response has no results array".to_string()))?;

    rows.iter()
        .map(|row| {
            let object = row.as_object().ok_or_else(|| {
                StoreError::SerializationError("Search result row is not an object".to_string())
            })?;
            let lowered: Map<String, Value> = object
                .iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
                .collect();
            serde_json::from_value(Value::Object(lowered))
                .map_err(|e| StoreError::SerializationError(format!("Bad search row: {e}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};

    use super::*;
    use crate::ingestion::IngestionPipeline;
    use crate::testing::{embedded, paper, KeywordEmbedder};

    fn settings() -> StoreSettings {
        StoreSettings {
            account_url: "https://acme.snowflakecomputing.com/".to_string(),
            token: Some("pat-123".to_string()),
            service: "papers_search".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_open_requires_account_and_token() {
        let missing_url = StoreSettings {
            account_url: String::new(),
            ..settings()
        };
        assert!(matches!(
            CortexStore::open(missing_url),
            Err(StoreError::ConfigError(_))
        ));

        let missing_token = StoreSettings {
            token: None,
            ..settings()
        };
        assert!(matches!(
            CortexStore::open(missing_token),
            Err(StoreError::ConfigError(_))
        ));
    }

    #[test]
    fn test_open_rejects_suspicious_table_name() {
        let bad = StoreSettings {
            table: "papers; DROP TABLE x".to_string(),
            ..settings()
        };
        assert!(CortexStore::open(bad).is_err());
    }

    #[test]
    fn test_search_url() {
        let store = CortexStore::open(settings()).unwrap();
        assert_eq!(
            store.search_url().unwrap(),
            "https://acme.snowflakecomputing.com/api/v2/databases/RAG_SYSTEM/schemas/PUBLIC/cortex-search-services/papers_search:query"
        );

        let no_service = CortexStore::open(StoreSettings {
            service: String::new(),
            ..settings()
        })
        .unwrap();
        assert!(no_service.search_url().is_err());
    }

    #[test]
    fn test_merge_body_bindings() {
        let store = CortexStore::open(settings()).unwrap();
        let document = EmbeddedDocument {
            record: DocumentRecord {
                title: "Direct recycling of cathodes".to_string(),
                abstract_text: String::new(),
                methods: "Relithiation".to_string(),
                ..Default::default()
            },
            title_vector: Some(vec![0.5, -0.25]),
            abstract_vector: None,
        };
        let second = embedded("Solar", "pv");

        let body = store.merge_body(&[&document, &second]).unwrap();
        let statement = body["statement"].as_str().unwrap();
        assert!(statement.starts_with("MERGE INTO detailed_research_papers AS t"));
        assert!(statement.contains("ON t.title = s.title"));
        assert_eq!(statement.matches("UNION ALL").count(), 1);
        assert_eq!(statement.matches('?').count(), 22);

        let bindings = &body["bindings"];
        assert_eq!(bindings.as_object().unwrap().len(), 22);
        assert_eq!(bindings["1"]["value"], "Direct recycling of cathodes");
        assert!(bindings["2"]["value"].is_null());
        assert_eq!(bindings["3"]["value"], "[0.5,-0.25]");
        assert!(bindings["4"]["value"].is_null());
        assert_eq!(bindings["6"]["value"], "Relithiation");
        assert_eq!(bindings["12"]["value"], "Solar");
        assert_eq!(body["warehouse"], "COMPUTE_WH");
    }

    #[test]
    fn test_merge_statement_updates_every_column_but_title() {
        let statement = merge_statement("papers", 1);
        assert!(!statement.contains("UNION ALL"));
        assert!(statement.contains("PARSE_JSON(?) AS title_vector"));
        assert!(statement.contains("UPDATE SET abstract = s.abstract"));
        assert!(!statement.contains("title = s.title,"));
        assert!(statement.ends_with("s.limitations, s.future_work)"));
    }

    #[test]
    fn test_last_per_title_keeps_latest_in_first_seen_order() {
        let documents = [
            embedded("Solar", "first"),
            embedded("Battery", "battery"),
            embedded("Solar", "second"),
        ];
        let rows = last_per_title(&documents);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].record.abstract_text, "second");
        assert_eq!(rows[1].record.title, "Battery");
    }

    /// SQL API stand-in that accepts the first `accept` statements and
    /// answers 500 to the rest.
    #[derive(Clone)]
    struct StubSqlApi {
        accept: usize,
        statements: Arc<Mutex<Vec<Value>>>,
    }

    async fn execute_statement(
        State(stub): State<StubSqlApi>,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        let mut statements = stub.statements.lock().unwrap();
        statements.push(body);
        if statements.len() <= stub.accept {
            (StatusCode::OK, Json(json!({"statementHandle": "01b2", "message": "ok"})))
        } else {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"message": "warehouse suspended"})),
            )
        }
    }

    async fn spawn_sql_api(accept: usize) -> (CortexStore, Arc<Mutex<Vec<Value>>>) {
        let statements = Arc::new(Mutex::new(Vec::new()));
        let stub = StubSqlApi {
            accept,
            statements: statements.clone(),
        };
        let app = Router::new()
            .route("/api/v2/statements", post(execute_statement))
            .with_state(stub);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let store = CortexStore::open(StoreSettings {
            account_url: format!("http://{addr}"),
            ..settings()
        })
        .unwrap();
        (store, statements)
    }

    #[tokio::test]
    async fn test_upsert_sends_one_statement_per_batch() {
        let (store, statements) = spawn_sql_api(usize::MAX).await;

        let written = store
            .upsert(&[embedded("Battery recycling", "battery"), embedded("Solar", "pv")])
            .await
            .unwrap();
        assert_eq!(written, 2);

        let statements = statements.lock().unwrap();
        assert_eq!(statements.len(), 1);
        assert_eq!(statements[0]["bindings"]["1"]["value"], "Battery recycling");
        assert_eq!(statements[0]["bindings"]["12"]["value"], "Solar");
    }

    #[tokio::test]
    async fn test_upsert_of_nothing_skips_the_request() {
        let (store, statements) = spawn_sql_api(usize::MAX).await;
        assert_eq!(store.upsert(&[]).await.unwrap(), 0);
        assert!(statements.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_batch_is_counted_as_failed_and_later_batches_still_land() {
        let (store, statements) = spawn_sql_api(1).await;
        let pipeline = IngestionPipeline::new(KeywordEmbedder, store, Some(2));

        let stats = pipeline
            .ingest_batch(&[paper("a"), paper("b"), paper("c"), paper("d")])
            .await
            .unwrap();

        assert_eq!(statements.lock().unwrap().len(), 2);
        assert_eq!(stats.total_processed, 4);
        assert_eq!(stats.inserted, 2);
        assert_eq!(stats.failed, 2);
    }

    #[tokio::test]
    async fn test_failed_statement_surfaces_status() {
        let (store, _) = spawn_sql_api(0).await;
        let err = store.upsert(&[embedded("Solar", "pv")]).await.unwrap_err();
        assert!(matches!(err, StoreError::RequestError(ref m) if m.contains("500")));
    }

    #[test]
    fn test_parse_search_response_preserves_order_and_fills_fields() {
        let body = json!({
            "results": [
                {"TITLE": "Second best", "ABSTRACT": null},
                {"title": "Third", "keywords": "pyrolysis"}
            ],
            "request_id": "abc"
        });

        let records = parse_search_response(&body).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title, "Second best");
        assert_eq!(records[0].abstract_text, "");
        assert_eq!(records[1].keywords, "pyrolysis");
        assert_eq!(records[1].future_work, "");
    }

    #[test]
    fn test_parse_search_response_without_results() {
        assert!(parse_search_response(&json!({"error": "nope"})).is_err());
    }
}
