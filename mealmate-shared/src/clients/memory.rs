use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::query::{Direction, Embed, Filter, TableQuery};
use super::remote::{enforce_cardinality, RemoteData};
use crate::errors::DataAccessError;

pub type Tables = HashMap<String, Vec<Value>>;

/// Server-side function emulation: receives every table and the call
/// arguments, returns the result rows.
pub type RpcHandler = Arc<dyn Fn(&Tables, &Value) -> Vec<Value> + Send + Sync>;

/// In-process stand-in for the hosted store, holding each table as JSON rows.
///
/// Used by tests and by the offline demo mode. Embedded relations resolve
/// through the parent row's foreign key against the target's `id`.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    rpcs: Arc<RwLock<HashMap<String, RpcHandler>>>,
    failures: Arc<RwLock<HashMap<String, DataAccessError>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed(&self, table: &str, rows: Vec<Value>) {
        let mut tables = self.tables.write().await;
        tables.entry(table.to_string()).or_default().extend(rows);
    }

    pub async fn rows(&self, table: &str) -> Vec<Value> {
        self.tables.read().await.get(table).cloned().unwrap_or_default()
    }

    pub async fn register_rpc<F>(&self, name: &str, handler: F)
    where
        F: Fn(&Tables, &Value) -> Vec<Value> + Send + Sync + 'static,
    {
        self.rpcs.write().await.insert(name.to_string(), Arc::new(handler));
    }

    /// Make every call touching `target` (a table or function name) fail.
    pub async fn fail_on(&self, target: &str, error: DataAccessError) {
        self.failures.write().await.insert(target.to_string(), error);
    }

    pub async fn clear_failure(&self, target: &str) {
        self.failures.write().await.remove(target);
    }

    async fn check_failure(&self, target: &str) -> Result<(), DataAccessError> {
        match self.failures.read().await.get(target) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[axum::async_trait]
impl RemoteData for MemoryStore {
    async fn select(&self, query: &TableQuery) -> Result<Vec<Value>, DataAccessError> {
        self.check_failure(&query.table).await?;
        let tables = self.tables.read().await;
        let source = tables.get(&query.table).cloned().unwrap_or_default();

        let mut rows: Vec<Value> = source
            .into_iter()
            .filter(|row| query.filters.iter().all(|f| matches_filter(row, f)))
            .collect();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ord = compare_values(
                    a.get(&order.column).unwrap_or(&Value::Null),
                    b.get(&order.column).unwrap_or(&Value::Null),
                );
                match order.direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                }
            });
        }

        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }

        let rows = enforce_cardinality(rows, query.cardinality, &query.table)?;
        Ok(rows
            .iter()
            .map(|row| project(row, &query.columns, &query.embeds, &tables))
            .collect())
    }

    async fn count(&self, table: &str) -> Result<u64, DataAccessError> {
        self.check_failure(table).await?;
        let tables = self.tables.read().await;
        Ok(tables.get(table).map(|rows| rows.len() as u64).unwrap_or(0))
    }

    async fn rpc(
        &self,
        function: &str,
        args: Value,
        limit: Option<usize>,
    ) -> Result<Vec<Value>, DataAccessError> {
        self.check_failure(function).await?;
        let handler = self
            .rpcs
            .read()
            .await
            .get(function)
            .cloned()
            .ok_or_else(|| DataAccessError::not_found(format!("function {function}")))?;

        let tables = self.tables.read().await;
        let mut rows = handler(&tables, &args);
        if let Some(limit) = limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, row: Value) -> Result<(), DataAccessError> {
        self.check_failure(table).await?;
        let row = with_defaults(row)?;
        self.tables.write().await.entry(table.to_string()).or_default().push(row);
        Ok(())
    }

    async fn upsert(&self, table: &str, row: Value) -> Result<(), DataAccessError> {
        self.check_failure(table).await?;
        let row = with_defaults(row)?;
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();

        let existing = rows.iter_mut().find(|r| r.get("id") == row.get("id"));
        match (existing, row) {
            (Some(Value::Object(current)), Value::Object(incoming)) => {
                for (key, value) in incoming {
                    if key != "created_at" {
                        current.insert(key, value);
                    }
                }
            }
            (_, row) => rows.push(row),
        }
        Ok(())
    }

    fn for_session(&self, _access_token: &str) -> Arc<dyn RemoteData> {
        Arc::new(self.clone())
    }
}

fn with_defaults(row: Value) -> Result<Value, DataAccessError> {
    let Value::Object(mut fields) = row else {
        return Err(DataAccessError::Remote {
            status: 400,
            message: "row must be a JSON object".into(),
        });
    };
    let now = Value::String(chrono::Utc::now().to_rfc3339());
    fields
        .entry("id")
        .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
    fields.entry("created_at").or_insert_with(|| now.clone());
    fields.insert("updated_at".to_string(), now);
    Ok(Value::Object(fields))
}

fn matches_filter(row: &Value, filter: &Filter) -> bool {
    match filter {
        Filter::Eq { column, value } => row.get(column).is_some_and(|v| values_equal(v, value)),
        Filter::In { column, values } => row
            .get(column)
            .is_some_and(|v| values.iter().any(|candidate| values_equal(v, candidate))),
        Filter::Gte { column, value } => row
            .get(column)
            .filter(|v| !v.is_null())
            .is_some_and(|v| compare_values(v, value) != CmpOrdering::Less),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Total order over JSON scalars; nulls sort last.
pub fn compare_values(a: &Value, b: &Value) -> CmpOrdering {
    match (a, b) {
        (Value::Null, Value::Null) => CmpOrdering::Equal,
        (Value::Null, _) => CmpOrdering::Greater,
        (_, Value::Null) => CmpOrdering::Less,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(CmpOrdering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn project(row: &Value, columns: &[String], embeds: &[Embed], tables: &Tables) -> Value {
    let mut out = Map::new();

    if columns.is_empty() || columns.iter().any(|c| c == "*") {
        if let Value::Object(fields) = row {
            out.extend(fields.clone());
        }
    } else {
        for column in columns {
            out.insert(column.clone(), row.get(column).cloned().unwrap_or(Value::Null));
        }
    }

    for embed in embeds {
        let target = row.get(&embed.foreign_key).and_then(|key| {
            tables
                .get(&embed.table)?
                .iter()
                .find(|candidate| candidate.get("id").is_some_and(|id| values_equal(id, key)))
        });
        let value = match target {
            Some(found) => project(found, &embed.columns, &embed.embeds, tables),
            None => Value::Null,
        };
        out.insert(embed.alias.clone(), value);
    }

    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .seed(
                "profiles",
                vec![
                    json!({"id": "p1", "first_name": "Anita", "last_name": "Sharma"}),
                    json!({"id": "p2", "first_name": "Raj", "last_name": "Kumar"}),
                ],
            )
            .await;
        store
            .seed(
                "orders",
                vec![
                    json!({"id": "o1", "customer_id": "p1", "total_amount": 80, "created_at": "2024-05-01T10:00:00Z"}),
                    json!({"id": "o2", "customer_id": "p9", "total_amount": 150, "created_at": "2024-05-03T10:00:00Z"}),
                    json!({"id": "o3", "customer_id": "p2", "total_amount": null, "created_at": "2024-05-02T10:00:00Z"}),
                ],
            )
            .await;
        store
    }

    #[tokio::test]
    async fn orders_filters_and_limits() {
        let store = store().await;
        let query = TableQuery::from("orders")
            .columns(["id"])
            .order_by("created_at", Direction::Desc)
            .limit(2);

        let rows = store.select(&query).await.unwrap();
        assert_eq!(rows, vec![json!({"id": "o2"}), json!({"id": "o3"})]);

        let query = TableQuery::from("orders").columns(["id"]).in_list("customer_id", ["p1", "p2"]);
        assert_eq!(store.select(&query).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn missing_embed_target_becomes_null() {
        let store = store().await;
        let query = TableQuery::from("orders")
            .columns(["id"])
            .embed(Embed::new("profiles", "customer_id").alias("customer").columns(["first_name"]))
            .eq("id", "o2");

        let rows = store.select(&query).await.unwrap();
        assert_eq!(rows, vec![json!({"id": "o2", "customer": null})]);
    }

    #[tokio::test]
    async fn upsert_merges_by_id() {
        let store = store().await;
        store
            .upsert("profiles", json!({"id": "p1", "phone": "98765"}))
            .await
            .unwrap();
        store.upsert("profiles", json!({"id": "p3"})).await.unwrap();

        let rows = store.rows("profiles").await;
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["first_name"], "Anita");
        assert_eq!(rows[0]["phone"], "98765");
    }

    #[tokio::test]
    async fn injected_failures_surface() {
        let store = store().await;
        store.fail_on("orders", DataAccessError::Transport("down".into())).await;
        assert!(store.count("orders").await.is_err());
        assert_eq!(store.count("profiles").await.unwrap(), 2);

        store.clear_failure("orders").await;
        assert_eq!(store.count("orders").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn unknown_rpc_is_not_found() {
        let store = store().await;
        let err = store.rpc("get_nothing", json!({}), None).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
