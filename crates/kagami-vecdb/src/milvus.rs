//! # Milvus REST Client
//!
//! Blocking client for the Milvus v2 RESTful API. Only the calls the
//! image catalog needs: `collections/has`, `collections/create`,
//! `entities/insert`, and `entities/search`.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::collection::CollectionSpec;
use crate::error::{Result, VecDbError};
use crate::index::{Hit, Record, SearchRequest, VectorIndex};

/// Default Milvus endpoint (the standalone docker-compose service name).
pub const DEFAULT_URI: &str = "http://milvus-standalone:19530";

/// Default database name.
pub const DEFAULT_DB_NAME: &str = "default";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Name of the auto-id primary key created alongside the vector field.
const PRIMARY_FIELD: &str = "id";

/// Connection settings for a Milvus server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MilvusConfig {
    pub uri: String,
    pub db_name: String,
    /// Bearer token (`user:password` or an API key).
    pub token: Option<String>,
    pub timeout: Duration,
}

impl Default for MilvusConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_URI.to_string(),
            db_name: DEFAULT_DB_NAME.to_string(),
            token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl MilvusConfig {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Self::default()
        }
    }

    pub fn with_db_name(mut self, db_name: impl Into<String>) -> Self {
        self.db_name = db_name.into();
        self
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full URL of a v2 REST endpoint, e.g. `collections/has`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/v2/vectordb/{}", self.uri.trim_end_matches('/'), path)
    }
}

/// Every Milvus REST response is wrapped in `{code, message?, data?}`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct HasData {
    has: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertData {
    insert_count: Option<usize>,
}

/// Unwraps a response envelope, turning a non-zero `code` into
/// [`VecDbError::Server`].
fn decode_envelope<T: DeserializeOwned>(body: &str) -> Result<Option<T>> {
    let envelope: Envelope<T> = serde_json::from_str(body).map_err(|e| {
        VecDbError::UnexpectedResponse(format!("{e}: {}", truncate(body, 200)))
    })?;
    if envelope.code != 0 {
        return Err(VecDbError::Server {
            code: envelope.code,
            message: envelope.message.unwrap_or_default(),
        });
    }
    Ok(envelope.data)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Splits one search row into a [`Hit`]: `id` and `distance` are lifted
/// out, everything else is an output field.
fn hit_from_row(mut row: Map<String, Value>) -> Result<Hit> {
    let id = match row.remove(PRIMARY_FIELD) {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        other => {
            return Err(VecDbError::UnexpectedResponse(format!(
                "search hit has no usable id: {other:?}"
            )));
        }
    };
    let score = row
        .remove("distance")
        .and_then(|v| v.as_f64())
        .ok_or_else(|| VecDbError::UnexpectedResponse("search hit has no distance".into()))?
        as f32;
    Ok(Hit {
        id,
        score,
        fields: row,
    })
}

/// Blocking Milvus client.
pub struct MilvusClient {
    http: Client,
    config: MilvusConfig,
}

impl MilvusClient {
    pub fn new(config: MilvusConfig) -> Result<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &MilvusConfig {
        &self.config
    }

    fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<Option<T>> {
        let url = self.config.endpoint(path);
        debug!(%url, "POST");

        let mut request = self.http.post(&url).json(body);
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request.send()?;
        let status = response.status();
        let text = response.text()?;
        if !status.is_success() && serde_json::from_str::<Value>(&text).is_err() {
            return Err(VecDbError::UnexpectedResponse(format!(
                "{status}: {}",
                truncate(&text, 200)
            )));
        }
        decode_envelope(&text)
    }

    /// Whether `collection` exists in the configured database.
    pub fn has_collection(&self, collection: &str) -> Result<bool> {
        let data: Option<HasData> = self.post("collections/has", &self.has_body(collection))?;
        Ok(data.is_some_and(|d| d.has))
    }

    fn has_body(&self, collection: &str) -> Value {
        json!({
            "dbName": self.config.db_name,
            "collectionName": collection,
        })
    }

    /// Custom-setup create request: auto-id Int64 key, one float vector
    /// field, an AUTOINDEX on it with the collection's metric.
    fn create_body(&self, spec: &CollectionSpec) -> Value {
        json!({
            "dbName": self.config.db_name,
            "collectionName": spec.name,
            "schema": {
                "autoId": spec.auto_id,
                "enableDynamicField": spec.dynamic_fields,
                "fields": [
                    {
                        "fieldName": PRIMARY_FIELD,
                        "dataType": "Int64",
                        "isPrimary": true,
                    },
                    {
                        "fieldName": spec.vector_field,
                        "dataType": "FloatVector",
                        "elementTypeParams": { "dim": spec.dimension.to_string() },
                    },
                ],
            },
            "indexParams": [
                {
                    "fieldName": spec.vector_field,
                    "indexName": spec.vector_field,
                    "indexType": "AUTOINDEX",
                    "metricType": spec.metric.as_str(),
                },
            ],
        })
    }

    fn insert_body(&self, spec: &CollectionSpec, records: &[Record]) -> Value {
        let data: Vec<Value> = records
            .iter()
            .map(|record| {
                let mut row = record.fields.clone();
                row.insert(spec.vector_field.clone(), json!(record.vector));
                Value::Object(row)
            })
            .collect();
        json!({
            "dbName": self.config.db_name,
            "collectionName": spec.name,
            "data": data,
        })
    }

    fn search_body(&self, spec: &CollectionSpec, request: &SearchRequest) -> Value {
        json!({
            "dbName": self.config.db_name,
            "collectionName": spec.name,
            "data": [request.vector],
            "annsField": spec.vector_field,
            "limit": request.limit,
            "outputFields": request.output_fields,
            "searchParams": { "metricType": request.metric.as_str() },
        })
    }
}

impl VectorIndex for MilvusClient {
    fn ensure_collection(&self, spec: &CollectionSpec) -> Result<bool> {
        spec.validate()?;
        if self.has_collection(&spec.name)? {
            debug!(collection = %spec.name, "collection already exists");
            return Ok(false);
        }

        let _: Option<Value> = self.post("collections/create", &self.create_body(spec))?;
        info!(
            collection = %spec.name,
            dimension = spec.dimension,
            metric = %spec.metric,
            "created collection"
        );
        Ok(true)
    }

    fn insert(&self, spec: &CollectionSpec, records: &[Record]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        for record in records {
            spec.check_dimension(&record.vector)?;
        }

        let data: Option<InsertData> =
            self.post("entities/insert", &self.insert_body(spec, records))?;
        let inserted = data
            .and_then(|d| d.insert_count)
            .unwrap_or(records.len());
        debug!(collection = %spec.name, inserted, "inserted records");
        Ok(inserted)
    }

    fn search(&self, spec: &CollectionSpec, request: &SearchRequest) -> Result<Vec<Hit>> {
        request.validate(spec)?;

        let rows: Option<Vec<Map<String, Value>>> =
            self.post("entities/search", &self.search_body(spec, request))?;
        let hits = rows
            .unwrap_or_default()
            .into_iter()
            .map(hit_from_row)
            .collect::<Result<Vec<_>>>()?;
        debug!(collection = %spec.name, hits = hits.len(), "search complete");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::MetricType;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    fn client() -> MilvusClient {
        MilvusClient::new(MilvusConfig::default()).unwrap()
    }

    #[test]
    fn default_config_points_at_standalone() {
        let config = MilvusConfig::default();
        assert_eq!(config.uri, "http://milvus-standalone:19530");
        assert_eq!(config.db_name, "default");
        assert_eq!(config.token, None);
    }

    #[test]
    fn endpoint_joins_paths() {
        let config = MilvusConfig::new("http://localhost:19530/");
        assert_eq!(
            config.endpoint("entities/search"),
            "http://localhost:19530/v2/vectordb/entities/search"
        );
    }

    #[test]
    fn create_body_shape() {
        let body = client().create_body(&CollectionSpec::default());
        assert_eq!(body["collectionName"], "image_embeddings");
        assert_eq!(body["dbName"], "default");
        assert_eq!(body["schema"]["autoId"], true);
        assert_eq!(body["schema"]["enableDynamicField"], true);
        assert_eq!(body["schema"]["fields"][1]["fieldName"], "vector");
        assert_eq!(body["schema"]["fields"][1]["elementTypeParams"]["dim"], "512");
        assert_eq!(body["indexParams"][0]["metricType"], "COSINE");
    }

    #[test]
    fn insert_body_merges_vector_and_fields() {
        let spec = CollectionSpec::new("c", 2);
        let records = [Record::new(vec![0.5, 0.25]).with_field("filename", "db_images/a.jpg")];
        let body = client().insert_body(&spec, &records);
        assert_eq!(body["data"][0]["vector"], json!([0.5, 0.25]));
        assert_eq!(body["data"][0]["filename"], "db_images/a.jpg");
    }

    #[test]
    fn search_body_shape() {
        let spec = CollectionSpec::new("c", 2).with_metric(MetricType::Cosine);
        let request = SearchRequest::new(vec![1.0, 0.0], 2).with_output_field("filename");
        let body = client().search_body(&spec, &request);
        assert_eq!(body["data"], json!([[1.0, 0.0]]));
        assert_eq!(body["annsField"], "vector");
        assert_eq!(body["limit"], 2);
        assert_eq!(body["outputFields"], json!(["filename"]));
        assert_eq!(body["searchParams"]["metricType"], "COSINE");
    }

    #[test]
    fn decode_success_and_error_envelopes() {
        let has: Option<HasData> = decode_envelope(r#"{"code":0,"data":{"has":true}}"#).unwrap();
        assert!(has.unwrap().has);

        let err = decode_envelope::<HasData>(
            r#"{"code":1800,"message":"user hasn't authenticated"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, VecDbError::Server { code: 1800, .. }));

        let err = decode_envelope::<HasData>("<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, VecDbError::UnexpectedResponse(_)));
    }

    #[test]
    fn search_rows_become_hits() {
        let rows: Option<Vec<Map<String, Value>>> = decode_envelope(
            r#"{"code":0,"data":[
                {"id":450123,"distance":0.97,"filename":"db_images/cat.jpg"},
                {"id":"450124","distance":0.81,"filename":"db_images/dog.jpg"}
            ]}"#,
        )
        .unwrap();
        let hits: Vec<Hit> = rows
            .unwrap()
            .into_iter()
            .map(hit_from_row)
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(hits[0].id, "450123");
        assert!((hits[0].score - 0.97).abs() < 1e-6);
        assert_eq!(hits[0].field_str("filename"), Some("db_images/cat.jpg"));
        assert!(!hits[0].fields.contains_key("distance"));
        assert_eq!(hits[1].id, "450124");
    }

    #[test]
    fn row_without_distance_is_rejected() {
        let mut row = Map::new();
        row.insert("id".into(), json!(1));
        assert!(matches!(
            hit_from_row(row),
            Err(VecDbError::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn insert_checks_dimension_before_sending() {
        let spec = CollectionSpec::new("c", 4);
        let err = client()
            .insert(&spec, &[Record::new(vec![1.0, 2.0])])
            .unwrap_err();
        assert!(matches!(err, VecDbError::DimensionMismatch { .. }));
    }

    #[test]
    fn search_checks_limit_before_sending() {
        let spec = CollectionSpec::new("c", 2);
        let err = client()
            .search(&spec, &SearchRequest::new(vec![1.0, 0.0], 0))
            .unwrap_err();
        assert!(matches!(err, VecDbError::InvalidLimit(0)));
    }

    #[test]
    fn empty_insert_is_a_no_op() {
        let spec = CollectionSpec::new("c", 2);
        assert_eq!(client().insert(&spec, &[]).unwrap(), 0);
    }

    /// Answers a single HTTP request on a loopback port with `status` and
    /// `body`, handing back the raw request it received.
    fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());

            let mut request = String::new();
            let mut content_length = 0;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line == "\r\n" || line.is_empty() {
                    break;
                }
                if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                    content_length = value.trim().parse().unwrap();
                }
                request.push_str(&line);
            }
            let mut payload = vec![0u8; content_length];
            reader.read_exact(&mut payload).unwrap();
            request.push_str(&String::from_utf8_lossy(&payload));

            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).unwrap();
            request
        });
        (format!("http://{addr}"), handle)
    }

    #[test]
    fn gateway_error_page_is_unexpected_response() {
        let (uri, server) = serve_once("502 Bad Gateway", "bad gateway");
        let client =
            MilvusClient::new(MilvusConfig::new(uri).with_token(Some("secret".into()))).unwrap();

        let err = client.has_collection("image_embeddings").unwrap_err();
        let request = server.join().unwrap();

        assert!(matches!(err, VecDbError::UnexpectedResponse(ref m) if m.contains("502")));
        assert!(request.starts_with("POST /v2/vectordb/collections/has "));
        assert!(
            request
                .to_ascii_lowercase()
                .contains("authorization: bearer secret")
        );
        assert!(request.contains("\"collectionName\":\"image_embeddings\""));
    }

    #[test]
    fn no_token_sends_no_authorization() {
        let (uri, server) = serve_once("200 OK", r#"{"code":0,"data":{"has":true}}"#);
        let client = MilvusClient::new(MilvusConfig::new(uri)).unwrap();

        assert!(client.has_collection("image_embeddings").unwrap());
        let request = server.join().unwrap();
        assert!(!request.to_ascii_lowercase().contains("authorization:"));
    }

    #[test]
    fn error_envelope_over_http_is_server_error() {
        let (uri, server) = serve_once(
            "200 OK",
            r#"{"code":1100,"message":"collection not found"}"#,
        );
        let client = MilvusClient::new(MilvusConfig::new(uri)).unwrap();

        let err = client.has_collection("missing").unwrap_err();
        server.join().unwrap();
        assert!(matches!(
            err,
            VecDbError::Server { code: 1100, ref message } if message == "collection not found"
        ));
    }
}
