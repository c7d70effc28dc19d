//! Storage seam mirroring the REST vocabulary: projection, eq/like filters, order, paging.

use crate::errors::StoreError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt::Display;

pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectOptions {
    pub select: Option<String>,
    pub eq: Vec<(String, String)>,
    pub like: Vec<(String, String)>,
    pub order: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl SelectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn columns(mut self, columns: &str) -> Self {
        self.select = Some(columns.to_string());
        self
    }

    pub fn eq(mut self, column: &str, value: impl Display) -> Self {
        self.eq.push((column.to_string(), value.to_string()));
        self
    }

    pub fn like(mut self, column: &str, pattern: impl Display) -> Self {
        self.like.push((column.to_string(), pattern.to_string()));
        self
    }

    pub fn order(mut self, order: &str) -> Self {
        self.order = Some(order.to_string());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Query-string pairs in the hosted API's syntax. Zero limit/offset are
    /// omitted, as the API treats them the same as absent.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(select) = &self.select {
            pairs.push(("select".to_string(), select.clone()));
        }
        for (column, value) in &self.eq {
            pairs.push((column.clone(), format!("eq.{value}")));
        }
        for (column, pattern) in &self.like {
            pairs.push((column.clone(), format!("like.{pattern}")));
        }
        if let Some(order) = &self.order {
            pairs.push(("order".to_string(), order.clone()));
        }
        if let Some(limit) = self.limit.filter(|limit| *limit > 0) {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(offset) = self.offset.filter(|offset| *offset > 0) {
            pairs.push(("offset".to_string(), offset.to_string()));
        }
        pairs
    }
}

/// Row scope for update and delete. A bare id is shorthand for `id = value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Id(String),
    Eq(Vec<(String, String)>),
}

impl Filter {
    pub fn id(value: impl Display) -> Self {
        Self::Id(value.to_string())
    }

    pub fn eq(column: &str, value: impl Display) -> Self {
        Self::Eq(vec![(column.to_string(), value.to_string())])
    }

    pub fn and(self, column: &str, value: impl Display) -> Self {
        let mut pairs = self.conditions();
        pairs.push((column.to_string(), value.to_string()));
        Self::Eq(pairs)
    }

    pub fn conditions(&self) -> Vec<(String, String)> {
        match self {
            Self::Id(value) => vec![("id".to_string(), value.clone())],
            Self::Eq(pairs) => pairs.clone(),
        }
    }

    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.conditions()
            .into_iter()
            .map(|(column, value)| (column, format!("eq.{value}")))
            .collect()
    }
}

impl From<i64> for Filter {
    fn from(id: i64) -> Self {
        Self::id(id)
    }
}

#[async_trait]
pub trait DataStore: Send + Sync {
    async fn select(&self, table: &str, options: &SelectOptions) -> Result<Vec<Row>, StoreError>;

    /// Returns the created representation.
    async fn insert(&self, table: &str, row: Row) -> Result<Vec<Row>, StoreError>;

    /// Returns the rows as they look after the update.
    async fn update(&self, table: &str, filter: &Filter, row: Row) -> Result<Vec<Row>, StoreError>;

    /// Returns the removed rows.
    async fn delete(&self, table: &str, filter: &Filter) -> Result<Vec<Row>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError> {
        let probe = SelectOptions::new().columns("id").limit(1);
        self.select("employees", &probe).await.map(|_| ())
    }
}

/// Text form of a JSON scalar as it would appear in a query string.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_pairs_follow_api_syntax() {
        let options = SelectOptions::new()
            .columns("id,clock_in")
            .eq("employee_id", 7)
            .like("full_name", "Som*")
            .order("clock_in.desc")
            .limit(10)
            .offset(0);

        assert_eq!(
            options.query_pairs(),
            vec![
                ("select".to_string(), "id,clock_in".to_string()),
                ("employee_id".to_string(), "eq.7".to_string()),
                ("full_name".to_string(), "like.Som*".to_string()),
                ("order".to_string(), "clock_in.desc".to_string()),
                ("limit".to_string(), "10".to_string()),
            ]
        );
    }

    #[test]
    fn scalar_filter_matches_id_equality() {
        assert_eq!(Filter::from(42).query_pairs(), Filter::eq("id", 42).query_pairs());
        assert_eq!(Filter::id("42").conditions(), Filter::eq("id", "42").conditions());
    }

    #[test]
    fn filters_combine_with_and() {
        let filter = Filter::id(3).and("status", "active");
        assert_eq!(
            filter.query_pairs(),
            vec![
                ("id".to_string(), "eq.3".to_string()),
                ("status".to_string(), "eq.active".to_string()),
            ]
        );
    }
}
