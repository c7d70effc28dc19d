//! In-process store snapshotted to a JSON file after every write.

use crate::clock::format_timestamp;
use crate::errors::StoreError;
use crate::store::{value_text, DataStore, Filter, Row, SelectOptions};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{error, info};

struct TableSchema {
    columns: &'static [&'static str],
    unique: Option<&'static str>,
    defaults: &'static [(&'static str, &'static str)],
    stamped: bool,
}

const EMPLOYEES: TableSchema = TableSchema {
    columns: &[
        "id",
        "emp_code",
        "full_name",
        "position",
        "department",
        "line_id",
        "line_name",
        "line_picture",
        "status",
        "created_at",
    ],
    unique: Some("emp_code"),
    defaults: &[("status", "active")],
    stamped: true,
};

const TIME_LOGS: TableSchema = TableSchema {
    columns: &[
        "id",
        "employee_id",
        "clock_in",
        "clock_out",
        "note",
        "latitude_in",
        "longitude_in",
        "latitude_out",
        "longitude_out",
        "line_id",
        "line_name",
        "line_picture",
        "status",
        "created_at",
    ],
    unique: None,
    defaults: &[("status", "normal")],
    stamped: true,
};

const SETTINGS: TableSchema = TableSchema {
    columns: &["id", "setting_name", "setting_value", "description"],
    unique: Some("setting_name"),
    defaults: &[],
    stamped: false,
};

fn schema(table: &str) -> Result<&'static TableSchema, StoreError> {
    match table {
        "employees" => Ok(&EMPLOYEES),
        "time_logs" => Ok(&TIME_LOGS),
        "settings" => Ok(&SETTINGS),
        other => Err(StoreError::UnknownTable(other.to_string())),
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Table {
    pub next_id: i64,
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub tables: BTreeMap<String, Table>,
}

pub struct MemoryStore {
    path: Option<PathBuf>,
    data: Mutex<Snapshot>,
}

impl MemoryStore {
    /// A store that lives only as long as the process.
    pub fn ephemeral() -> Self {
        Self {
            path: None,
            data: Mutex::new(Snapshot::default()),
        }
    }

    pub async fn open(path: PathBuf) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let snapshot = load_snapshot(&path).await;
        info!(path = %path.display(), "memory store opened");
        Ok(Self {
            path: Some(path),
            data: Mutex::new(snapshot),
        })
    }

    async fn persist(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        match &self.path {
            Some(path) => persist_snapshot(path, snapshot).await,
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn select(&self, table: &str, options: &SelectOptions) -> Result<Vec<Row>, StoreError> {
        let schema = schema(table)?;
        let projection = projection(schema, options.select.as_deref())?;
        let data = self.data.lock().await;
        let mut rows: Vec<&Row> = data
            .tables
            .get(table)
            .map(|table| table.rows.iter().collect())
            .unwrap_or_default();

        rows.retain(|row| {
            options.eq.iter().all(|(column, value)| matches_eq(row, column, value))
                && options.like.iter().all(|(column, pattern)| matches_like(row, column, pattern))
        });

        if let Some(order) = &options.order {
            let keys = order_keys(order);
            rows.sort_by(|a, b| compare_rows(a, b, &keys));
        }

        let offset = options.offset.unwrap_or(0) as usize;
        let limit = options.limit.filter(|limit| *limit > 0).map(|limit| limit as usize);

        Ok(rows
            .into_iter()
            .skip(offset)
            .take(limit.unwrap_or(usize::MAX))
            .map(|row| project(row, &projection))
            .collect())
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Vec<Row>, StoreError> {
        let schema = schema(table)?;
        check_columns(schema, &row)?;

        let mut data = self.data.lock().await;
        let entry = data.tables.entry(table.to_string()).or_default();

        let mut record = Row::new();
        for column in schema.columns {
            record.insert(column.to_string(), row.get(*column).cloned().unwrap_or(Value::Null));
        }
        for (column, default) in schema.defaults {
            if record.get(*column).is_none_or(Value::is_null) {
                record.insert(column.to_string(), Value::String(default.to_string()));
            }
        }
        if schema.stamped && record.get("created_at").is_none_or(Value::is_null) {
            record.insert("created_at".into(), Value::String(format_timestamp(Utc::now())));
        }

        if let Some(column) = schema.unique {
            let value = record.get(column).cloned().unwrap_or(Value::Null);
            if entry.rows.iter().any(|existing| existing.get(column) == Some(&value)) {
                return Err(StoreError::Conflict(format!("{table}.{column}")));
            }
        }

        entry.next_id += 1;
        record.insert("id".into(), Value::from(entry.next_id));
        entry.rows.push(record.clone());

        self.persist(&data).await?;
        Ok(vec![record])
    }

    async fn update(&self, table: &str, filter: &Filter, row: Row) -> Result<Vec<Row>, StoreError> {
        let schema = schema(table)?;
        check_columns(schema, &row)?;
        let conditions = filter.conditions();

        let mut data = self.data.lock().await;
        let entry = data.tables.entry(table.to_string()).or_default();

        if let Some(column) = schema.unique {
            if let Some(value) = row.get(column) {
                let clash = entry.rows.iter().any(|existing| {
                    existing.get(column) == Some(value) && !matches_all(existing, &conditions)
                });
                if clash {
                    return Err(StoreError::Conflict(format!("{table}.{column}")));
                }
            }
        }

        let mut updated = Vec::new();
        for existing in entry.rows.iter_mut().filter(|existing| matches_all(existing, &conditions)) {
            for (column, value) in &row {
                if column != "id" {
                    existing.insert(column.clone(), value.clone());
                }
            }
            updated.push(existing.clone());
        }

        if !updated.is_empty() {
            self.persist(&data).await?;
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<Vec<Row>, StoreError> {
        schema(table)?;
        let conditions = filter.conditions();

        let mut data = self.data.lock().await;
        let entry = data.tables.entry(table.to_string()).or_default();
        let (removed, kept): (Vec<Row>, Vec<Row>) = std::mem::take(&mut entry.rows)
            .into_iter()
            .partition(|row| matches_all(row, &conditions));
        entry.rows = kept;

        if !removed.is_empty() {
            self.persist(&data).await?;
        }
        Ok(removed)
    }
}

fn check_columns(schema: &TableSchema, row: &Row) -> Result<(), StoreError> {
    match row.keys().find(|column| !schema.columns.contains(&column.as_str())) {
        Some(column) => Err(StoreError::Status {
            status: 400,
            message: format!("Could not find the '{column}' column"),
        }),
        None => Ok(()),
    }
}

fn projection(schema: &TableSchema, select: Option<&str>) -> Result<Vec<String>, StoreError> {
    let select = select.map(str::trim).filter(|select| !select.is_empty() && *select != "*");
    let Some(select) = select else {
        return Ok(schema.columns.iter().map(|column| column.to_string()).collect());
    };

    select
        .split(',')
        .map(str::trim)
        .map(|column| {
            if schema.columns.contains(&column) {
                Ok(column.to_string())
            } else {
                Err(StoreError::Status {
                    status: 400,
                    message: format!("column {column} does not exist"),
                })
            }
        })
        .collect()
}

fn project(row: &Row, columns: &[String]) -> Row {
    columns
        .iter()
        .map(|column| (column.clone(), row.get(column).cloned().unwrap_or(Value::Null)))
        .collect()
}

fn matches_eq(row: &Row, column: &str, expected: &str) -> bool {
    row.get(column)
        .is_some_and(|value| !value.is_null() && value_text(value) == expected)
}

fn matches_all(row: &Row, conditions: &[(String, String)]) -> bool {
    conditions.iter().all(|(column, value)| matches_eq(row, column, value))
}

fn matches_like(row: &Row, column: &str, pattern: &str) -> bool {
    match row.get(column) {
        Some(Value::Null) | None => false,
        Some(value) => wildcard_match(pattern, &value_text(value)),
    }
}

/// `*` and `%` match any run of characters, `_` matches one.
fn wildcard_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '_' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && (pattern[p] == '*' || pattern[p] == '%') {
            star = Some((p, t));
            p += 1;
        } else if let Some((star_p, star_t)) = star {
            p = star_p + 1;
            t = star_t + 1;
            star = Some((star_p, star_t + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|c| *c == '*' || *c == '%')
}

fn order_keys(order: &str) -> Vec<(String, bool)> {
    order
        .split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(|key| {
            let mut parts = key.split('.');
            let column = parts.next().unwrap_or_default().to_string();
            let descending = parts.any(|part| part == "desc");
            (column, descending)
        })
        .collect()
}

fn compare_rows(a: &Row, b: &Row, keys: &[(String, bool)]) -> Ordering {
    for (column, descending) in keys {
        let left = a.get(column).unwrap_or(&Value::Null);
        let right = b.get(column).unwrap_or(&Value::Null);
        // nulls sort last ascending and first descending, as the hosted API does
        let ordering = match (left.is_null(), right.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => compare_values(left, right),
        };
        let ordering = if *descending { ordering.reverse() } else { ordering };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn compare_values(left: &Value, right: &Value) -> Ordering {
    match (left.as_f64(), right.as_f64()) {
        (Some(l), Some(r)) => l.partial_cmp(&r).unwrap_or(Ordering::Equal),
        _ => value_text(left).cmp(&value_text(right)),
    }
}

pub async fn load_snapshot(path: &Path) -> Snapshot {
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                error!("failed to parse store snapshot: {err}");
                Snapshot::default()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Snapshot::default(),
        Err(err) => {
            error!("failed to read store snapshot: {err}");
            Snapshot::default()
        }
    }
}

pub async fn persist_snapshot(path: &Path, snapshot: &Snapshot) -> Result<(), StoreError> {
    let payload = serde_json::to_vec_pretty(snapshot)?;
    fs::write(path, payload).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::ephemeral();
        for (code, name, status) in [("002", "Bea", "active"), ("001", "Ann", "active"), ("003", "Cal", "inactive")] {
            store
                .insert("employees", row(json!({ "emp_code": code, "full_name": name, "status": status })))
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn insert_assigns_ids_and_defaults() {
        let store = MemoryStore::ephemeral();
        let created = store
            .insert("employees", row(json!({ "emp_code": "001", "full_name": "Ann" })))
            .await
            .unwrap();
        assert_eq!(created[0]["id"], json!(1));
        assert_eq!(created[0]["status"], json!("active"));
        assert!(created[0]["created_at"].is_string());
        assert!(created[0]["position"].is_null());
    }

    #[tokio::test]
    async fn unique_columns_are_enforced() {
        let store = seeded().await;
        let duplicate = store
            .insert("employees", row(json!({ "emp_code": "001", "full_name": "Other" })))
            .await;
        assert!(matches!(duplicate, Err(StoreError::Conflict(_))));

        let clash = store
            .update("employees", &Filter::id(1), row(json!({ "emp_code": "001" })))
            .await;
        assert!(matches!(clash, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn select_filters_orders_and_pages() {
        let store = seeded().await;
        let options = SelectOptions::new()
            .columns("emp_code")
            .eq("status", "active")
            .order("emp_code.asc");
        let rows = store.select("employees", &options).await.unwrap();
        let codes: Vec<_> = rows.iter().map(|row| row["emp_code"].clone()).collect();
        assert_eq!(codes, vec![json!("001"), json!("002")]);
        assert_eq!(rows[0].len(), 1);

        let paged = store
            .select("employees", &SelectOptions::new().order("emp_code.desc").limit(1).offset(1))
            .await
            .unwrap();
        assert_eq!(paged.len(), 1);
        assert_eq!(paged[0]["emp_code"], json!("002"));
    }

    #[tokio::test]
    async fn like_supports_wildcards() {
        let store = seeded().await;
        let rows = store
            .select("employees", &SelectOptions::new().like("full_name", "*a*"))
            .await
            .unwrap();
        let names: Vec<_> = rows.iter().map(|row| row["full_name"].clone()).collect();
        assert_eq!(names, vec![json!("Bea"), json!("Cal")]);
    }

    #[tokio::test]
    async fn unknown_columns_are_rejected() {
        let store = seeded().await;
        let result = store
            .select("employees", &SelectOptions::new().columns("id,nickname"))
            .await;
        assert!(matches!(result, Err(StoreError::Status { status: 400, .. })));
        assert!(matches!(
            store.select("payroll", &SelectOptions::new()).await,
            Err(StoreError::UnknownTable(_))
        ));
    }

    #[tokio::test]
    async fn update_and_delete_scope_by_filter() {
        let store = seeded().await;
        let updated = store
            .update("employees", &Filter::eq("emp_code", "003"), row(json!({ "status": "active" })))
            .await
            .unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0]["status"], json!("active"));

        let removed = store.delete("employees", &Filter::from(1)).await.unwrap();
        assert_eq!(removed.len(), 1);
        let remaining = store.select("employees", &SelectOptions::new()).await.unwrap();
        assert_eq!(remaining.len(), 2);
    }

    #[tokio::test]
    async fn snapshot_survives_reopen() {
        let mut path = std::env::temp_dir();
        path.push(format!("timeclock_snapshot_{}_{}.json", std::process::id(), line!()));

        let store = MemoryStore::open(path.clone()).await.unwrap();
        store
            .insert("settings", row(json!({ "setting_name": "liff_id", "setting_value": "abc" })))
            .await
            .unwrap();
        drop(store);

        let reopened = MemoryStore::open(path.clone()).await.unwrap();
        let rows = reopened
            .select("settings", &SelectOptions::new().eq("setting_name", "liff_id"))
            .await
            .unwrap();
        assert_eq!(rows[0]["setting_value"], json!("abc"));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn wildcard_matching() {
        assert!(wildcard_match("a*c", "abbbc"));
        assert!(wildcard_match("%b%", "abc"));
        assert!(wildcard_match("a_c", "abc"));
        assert!(!wildcard_match("a*d", "abc"));
        assert!(wildcard_match("*", ""));
    }
}
