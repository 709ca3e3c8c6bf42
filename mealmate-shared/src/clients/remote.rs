use std::sync::Arc;

use reqwest::header::CONTENT_RANGE;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::query::{Cardinality, TableQuery};
use crate::errors::DataAccessError;

/// The hosted data store: table reads and writes plus named stored procedures.
#[axum::async_trait]
pub trait RemoteData: Send + Sync {
    async fn select(&self, query: &TableQuery) -> Result<Vec<Value>, DataAccessError>;

    /// Exact row count of `table`.
    async fn count(&self, table: &str) -> Result<u64, DataAccessError>;

    async fn rpc(
        &self,
        function: &str,
        args: Value,
        limit: Option<usize>,
    ) -> Result<Vec<Value>, DataAccessError>;

    async fn insert(&self, table: &str, row: Value) -> Result<(), DataAccessError>;

    /// Insert, or merge into the row with the same primary key.
    async fn upsert(&self, table: &str, row: Value) -> Result<(), DataAccessError>;

    /// A handle that issues requests as the signed-in user.
    fn for_session(&self, access_token: &str) -> Arc<dyn RemoteData>;
}

/// Run `query` and decode each row into `T`.
pub async fn select_as<T: DeserializeOwned>(
    remote: &dyn RemoteData,
    query: &TableQuery,
) -> Result<Vec<T>, DataAccessError> {
    let rows = remote.select(query).await?;
    decode_rows(rows, &query.table)
}

/// Call a stored procedure and decode each returned row into `T`.
pub async fn rpc_as<T: DeserializeOwned>(
    remote: &dyn RemoteData,
    function: &str,
    args: Value,
    limit: Option<usize>,
) -> Result<Vec<T>, DataAccessError> {
    let rows = remote.rpc(function, args, limit).await?;
    decode_rows(rows, function)
}

fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>, source: &str) -> Result<Vec<T>, DataAccessError> {
    rows.into_iter()
        .map(|row| {
            serde_json::from_value(row)
                .map_err(|e| DataAccessError::Decode(format!("{source}: {e}")))
        })
        .collect()
}

/// HTTPS client for the hosted store's auto-generated REST API.
#[derive(Clone)]
pub struct RestClient {
    client: Client,
    base_url: String,
    api_key: String,
    bearer: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RemoteErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl RestClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            bearer: None,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/rest/v1/{path}", self.base_url)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let bearer = self.bearer.as_deref().unwrap_or(&self.api_key);
        self.client
            .request(method, self.endpoint(path))
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {bearer}"))
    }

    async fn send(&self, request: RequestBuilder, resource: &str) -> Result<Response, DataAccessError> {
        let response = request.send().await.map_err(|e| {
            tracing::error!(error = %e, resource = %resource, "data store request failed");
            DataAccessError::from(e)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let err = classify_failure(status, &body, resource);
        tracing::warn!(status = status.as_u16(), resource = %resource, error = %err, "data store rejected request");
        Err(err)
    }
}

#[axum::async_trait]
impl RemoteData for RestClient {
    async fn select(&self, query: &TableQuery) -> Result<Vec<Value>, DataAccessError> {
        let request = self
            .request(Method::GET, &query.table)
            .query(&query.to_query_pairs());
        let response = self.send(request, &query.table).await?;
        let rows = response.json::<Vec<Value>>().await?;
        enforce_cardinality(rows, query.cardinality, &query.table)
    }

    async fn count(&self, table: &str) -> Result<u64, DataAccessError> {
        let request = self
            .request(Method::HEAD, table)
            .query(&[("select", "*")])
            .header("Prefer", "count=exact");
        let response = self.send(request, table).await?;

        response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range)
            .ok_or_else(|| DataAccessError::Decode(format!("{table}: missing row count")))
    }

    async fn rpc(
        &self,
        function: &str,
        args: Value,
        limit: Option<usize>,
    ) -> Result<Vec<Value>, DataAccessError> {
        let mut request = self
            .request(Method::POST, &format!("rpc/{function}"))
            .json(&args);
        if let Some(limit) = limit {
            request = request.query(&[("limit", limit.to_string())]);
        }
        let response = self.send(request, function).await?;

        match response.json::<Value>().await? {
            Value::Array(rows) => Ok(rows),
            Value::Null => Ok(Vec::new()),
            single => Ok(vec![single]),
        }
    }

    async fn insert(&self, table: &str, row: Value) -> Result<(), DataAccessError> {
        let request = self
            .request(Method::POST, table)
            .header("Prefer", "return=minimal")
            .json(&row);
        self.send(request, table).await?;
        tracing::debug!(table = %table, "row inserted");
        Ok(())
    }

    async fn upsert(&self, table: &str, row: Value) -> Result<(), DataAccessError> {
        let request = self
            .request(Method::POST, table)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&row);
        self.send(request, table).await?;
        tracing::debug!(table = %table, "row upserted");
        Ok(())
    }

    fn for_session(&self, access_token: &str) -> Arc<dyn RemoteData> {
        let mut scoped = self.clone();
        scoped.bearer = Some(access_token.to_string());
        Arc::new(scoped)
    }
}

/// Check a result set against what the query asked for.
pub fn enforce_cardinality(
    rows: Vec<Value>,
    cardinality: Cardinality,
    resource: &str,
) -> Result<Vec<Value>, DataAccessError> {
    match (cardinality, rows.len()) {
        (Cardinality::Many, _) | (Cardinality::Single, 1) | (Cardinality::MaybeSingle, 0 | 1) => Ok(rows),
        (Cardinality::Single, 0) => Err(DataAccessError::not_found(resource)),
        (_, n) => Err(DataAccessError::Remote {
            status: 406,
            message: format!("{resource}: expected at most one row, got {n}"),
        }),
    }
}

/// Total from a `Content-Range` header such as `0-24/573` or `*/0`.
pub fn parse_content_range(header: &str) -> Option<u64> {
    header.rsplit_once('/')?.1.trim().parse().ok()
}

/// Map a non-success response onto the data access taxonomy.
pub fn classify_failure(status: StatusCode, body: &str, resource: &str) -> DataAccessError {
    let parsed: Option<RemoteErrorBody> = serde_json::from_str(body).ok();
    let code = parsed.as_ref().and_then(|b| b.code.clone());
    let message = parsed
        .and_then(|b| b.message)
        .unwrap_or_else(|| body.trim().to_string());

    // PGRST116: a single-row request matched no rows
    if status == StatusCode::NOT_FOUND || code.as_deref() == Some("PGRST116") {
        return DataAccessError::not_found(resource);
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => DataAccessError::PermissionDenied(message),
        _ => DataAccessError::Remote { status: status.as_u16(), message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_range_totals() {
        assert_eq!(parse_content_range("0-24/573"), Some(573));
        assert_eq!(parse_content_range("*/0"), Some(0));
        assert_eq!(parse_content_range("0-24/*"), None);
        assert_eq!(parse_content_range("garbage"), None);
    }

    #[test]
    fn classifies_not_found_and_permission_errors() {
        let not_found = classify_failure(
            StatusCode::NOT_ACCEPTABLE,
            r#"{"code":"PGRST116","message":"JSON object requested, multiple (or no) rows returned"}"#,
            "cooks",
        );
        assert_eq!(not_found, DataAccessError::not_found("cooks"));

        let denied = classify_failure(
            StatusCode::FORBIDDEN,
            r#"{"code":"42501","message":"permission denied for table orders"}"#,
            "orders",
        );
        assert_eq!(
            denied,
            DataAccessError::PermissionDenied("permission denied for table orders".into())
        );
    }

    #[test]
    fn other_failures_keep_status_and_raw_body() {
        let err = classify_failure(StatusCode::BAD_GATEWAY, "upstream down", "meals");
        assert_eq!(
            err,
            DataAccessError::Remote { status: 502, message: "upstream down".into() }
        );
    }

    #[test]
    fn single_row_expectations() {
        let one = vec![serde_json::json!({"id": 1})];
        assert!(enforce_cardinality(one.clone(), Cardinality::Single, "meals").is_ok());
        assert!(enforce_cardinality(Vec::new(), Cardinality::MaybeSingle, "meals").is_ok());
        assert!(enforce_cardinality(Vec::new(), Cardinality::Single, "meals")
            .unwrap_err()
            .is_not_found());

        let two = vec![one[0].clone(), one[0].clone()];
        assert!(matches!(
            enforce_cardinality(two, Cardinality::MaybeSingle, "meals"),
            Err(DataAccessError::Remote { status: 406, .. })
        ));
    }

    #[test]
    fn session_scoped_client_uses_user_token() {
        let client = RestClient::new("https://example.supabase.co/", "anon-key");
        assert_eq!(client.endpoint("meals"), "https://example.supabase.co/rest/v1/meals");

        let request = client
            .clone()
            .tap_bearer("user-token")
            .request(Method::GET, "meals")
            .build()
            .unwrap();
        assert_eq!(request.headers()["apikey"], "anon-key");
        assert_eq!(request.headers()["Authorization"], "Bearer user-token");
    }

    impl RestClient {
        fn tap_bearer(mut self, token: &str) -> Self {
            self.bearer = Some(token.to_string());
            self
        }
    }
}
