//! Executes tagged query descriptors against a [`DataStore`] as `{rows, row_count}`.

use crate::clock::{format_timestamp, LocalClock};
use crate::errors::StoreError;
use crate::models::{
    ClockInRecord, ClockOutRecord, EmployeeUpdate, ManualTimeLog, NewEmployee, NewSetting,
    TimeLogEdit,
};
use crate::sql;
use crate::store::{DataStore, Filter, Row, SelectOptions};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub const EMPLOYEE_LOOKUP: &str = "id,emp_code,full_name,position,department,status";
pub const EMPLOYEE_LIST: &str =
    "id,emp_code,full_name,position,department,line_id,line_name,status,created_at";
pub const EMPLOYEE_JOIN: &str = "id,emp_code,full_name,position,department";
pub const TIME_LOG_JOIN: &str = "id,employee_id,clock_in,clock_out,note,status,latitude_in,longitude_in,latitude_out,longitude_out";
pub const SETTING_COLUMNS: &str = "id,setting_name,setting_value,description";

const DEFAULT_JOIN_LIMIT: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Employees,
    TimeLogs,
    Settings,
}

impl Table {
    pub fn name(self) -> &'static str {
        match self {
            Self::Employees => "employees",
            Self::TimeLogs => "time_logs",
            Self::Settings => "settings",
        }
    }
}

/// Filters for the joined time-log listing. Dates are local calendar dates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogQuery {
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    /// Exclusive upper bound.
    pub before: Option<NaiveDate>,
    pub employee_id: Option<i64>,
    pub employee_ids: Option<Vec<i64>>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// Every matching log, ignoring `limit` and `offset`.
    pub unbounded: bool,
}

impl LogQuery {
    fn filters_dates(&self) -> bool {
        self.from_date.is_some() || self.to_date.is_some() || self.before.is_some()
    }

    fn accepts_date(&self, date: NaiveDate) -> bool {
        self.from_date.is_none_or(|from| date >= from)
            && self.to_date.is_none_or(|to| date <= to)
            && self.before.is_none_or(|before| date < before)
    }

    fn accepts_employee(&self, employee_id: Option<i64>) -> bool {
        match (&self.employee_ids, employee_id) {
            (None, _) => true,
            (Some(ids), Some(id)) => ids.contains(&id),
            (Some(_), None) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Select {
    /// Code first, then full name when the code matches nothing.
    EmployeeByCodeOrName(String),
    EmployeeByCode { emp_code: String, except_id: Option<i64> },
    EmployeeById(i64),
    CountEmployees { status: Option<String> },
    EmployeesByStatus(String),
    EmployeeNamesByStatus(String),
    Employees { limit: Option<u64>, offset: Option<u64> },
    /// Logs of one employee whose local `clock_in` date is `date`.
    TimeLogsOnDate { employee_id: i64, date: NaiveDate },
    LatestTimeLogOnDate { employee_id: i64, date: NaiveDate },
    /// Every log whose local `clock_in` date is the given day.
    TimeLogsForDay(NaiveDate),
    /// Joined with its employee; orphaned logs are not found.
    TimeLogById(i64),
    /// The bare `time_logs` row, whether or not its employee still exists.
    TimeLogRowById(i64),
    JoinedTimeLogs(LogQuery),
    Settings { name: Option<String> },
    Dump(Table),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Insert {
    ClockIn(ClockInRecord),
    ManualTimeLog(ManualTimeLog),
    Employee(NewEmployee),
    Setting(NewSetting),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    ClockOut { id: i64, record: ClockOutRecord },
    TimeLog { id: i64, edit: TimeLogEdit },
    Employee { id: i64, update: EmployeeUpdate },
    EmployeeByCode { emp_code: String, update: EmployeeUpdate },
    Setting { name: String, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Delete {
    TimeLog(i64),
    TimeLogsForEmployee(i64),
    Employee(i64),
    Setting(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Now,
    /// Schema lives in the hosted store; accepted and ignored.
    CreateTable,
    Select(Select),
    Insert(Insert),
    Update(Update),
    Delete(Delete),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub rows: Vec<Row>,
    pub row_count: usize,
}

impl QueryResult {
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let row_count = rows.len();
        Self { rows, row_count }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<Vec<T>, StoreError> {
        self.rows
            .iter()
            .map(|row| serde_json::from_value(Value::Object(row.clone())).map_err(StoreError::from))
            .collect()
    }

    pub fn first<T: DeserializeOwned>(&self) -> Result<Option<T>, StoreError> {
        self.rows
            .first()
            .map(|row| serde_json::from_value(Value::Object(row.clone())))
            .transpose()
            .map_err(StoreError::from)
    }

    pub fn count(&self) -> u64 {
        self.rows
            .first()
            .and_then(|row| row.get("count"))
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }
}

#[derive(Clone)]
pub struct Adapter {
    store: Arc<dyn DataStore>,
    clock: LocalClock,
}

impl Adapter {
    pub fn new(store: Arc<dyn DataStore>, clock: LocalClock) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &Arc<dyn DataStore> {
        &self.store
    }

    pub fn clock(&self) -> LocalClock {
        self.clock
    }

    /// Text front door for call sites still written as parameterized SQL.
    /// Statements that match no known shape yield an empty result and a
    /// warning rather than an error.
    pub async fn sql(&self, text: &str, params: &[Value]) -> Result<QueryResult, StoreError> {
        match sql::classify(text, params) {
            Ok(query) => {
                debug!(?query, "classified statement");
                self.execute(query).await
            }
            Err(err) => {
                warn!("{err}");
                Ok(QueryResult::empty())
            }
        }
    }

    pub async fn execute(&self, query: Query) -> Result<QueryResult, StoreError> {
        match query {
            Query::Now => Ok(QueryResult::from_rows(vec![
                object(json!({ "now": format_timestamp(Utc::now()) })),
            ])),
            Query::CreateTable => {
                warn!("CREATE TABLE ignored; tables are managed in the hosted store");
                Ok(QueryResult::empty())
            }
            Query::Select(select) => self.select(select).await,
            Query::Insert(insert) => self.insert(insert).await,
            Query::Update(update) => self.update(update).await,
            Query::Delete(delete) => self.delete(delete).await,
        }
    }

    async fn fetch(&self, table: Table, options: SelectOptions) -> Result<Vec<Row>, StoreError> {
        self.store.select(table.name(), &options).await
    }

    async fn select(&self, select: Select) -> Result<QueryResult, StoreError> {
        let rows = match select {
            Select::EmployeeByCodeOrName(key) => {
                let by_code = SelectOptions::new().columns(EMPLOYEE_LOOKUP).eq("emp_code", &key);
                let rows = self.fetch(Table::Employees, by_code).await?;
                if rows.is_empty() {
                    let by_name = SelectOptions::new().columns(EMPLOYEE_LOOKUP).eq("full_name", &key);
                    self.fetch(Table::Employees, by_name).await?
                } else {
                    rows
                }
            }
            Select::EmployeeByCode { emp_code, except_id } => {
                let options = SelectOptions::new().columns(EMPLOYEE_LOOKUP).eq("emp_code", &emp_code);
                let mut rows = self.fetch(Table::Employees, options).await?;
                if let Some(except_id) = except_id {
                    rows.retain(|row| row_id(row, "id") != Some(except_id));
                }
                rows
            }
            Select::EmployeeById(id) => {
                let options = SelectOptions::new().columns(EMPLOYEE_LIST).eq("id", id);
                self.fetch(Table::Employees, options).await?
            }
            Select::CountEmployees { status } => {
                let mut options = SelectOptions::new().columns("id");
                if let Some(status) = status {
                    options = options.eq("status", status);
                }
                let count = self.fetch(Table::Employees, options).await?.len();
                vec![object(json!({ "count": count }))]
            }
            Select::EmployeesByStatus(status) => {
                let options = SelectOptions::new()
                    .columns("id,emp_code,full_name,position,department,status,created_at")
                    .eq("status", status);
                self.fetch(Table::Employees, options).await?
            }
            Select::EmployeeNamesByStatus(status) => {
                let options = SelectOptions::new().columns("full_name,emp_code").eq("status", status);
                self.fetch(Table::Employees, options).await?
            }
            Select::Employees { limit, offset } => {
                let mut options = SelectOptions::new().columns(EMPLOYEE_LIST).order("emp_code.asc");
                options.limit = limit;
                options.offset = offset;
                self.fetch(Table::Employees, options).await?
            }
            Select::TimeLogsOnDate { employee_id, date } => {
                let options = SelectOptions::new()
                    .columns("id,employee_id,clock_in,clock_out")
                    .eq("employee_id", employee_id);
                let rows = self.fetch(Table::TimeLogs, options).await?;
                self.on_local_date(rows, date)
            }
            Select::LatestTimeLogOnDate { employee_id, date } => {
                let options = SelectOptions::new()
                    .columns("id,employee_id,clock_in,clock_out")
                    .eq("employee_id", employee_id)
                    .order("clock_in.desc");
                let rows = self.fetch(Table::TimeLogs, options).await?;
                self.on_local_date(rows, date).into_iter().take(1).collect()
            }
            Select::TimeLogsForDay(date) => {
                let options = SelectOptions::new()
                    .columns("id,employee_id,clock_in,clock_out")
                    .order("clock_in.desc");
                let rows = self.fetch(Table::TimeLogs, options).await?;
                self.on_local_date(rows, date)
            }
            Select::TimeLogById(id) => {
                let options = SelectOptions::new().columns(TIME_LOG_JOIN).eq("id", id);
                let logs = self.fetch(Table::TimeLogs, options).await?;
                self.join_employees(logs).await?
            }
            Select::TimeLogRowById(id) => {
                let options = SelectOptions::new()
                    .columns("id,employee_id,clock_in,clock_out,note,status")
                    .eq("id", id);
                self.fetch(Table::TimeLogs, options).await?
            }
            Select::JoinedTimeLogs(filter) => self.joined_time_logs(filter).await?,
            Select::Settings { name } => {
                let options = SelectOptions::new().columns(SETTING_COLUMNS);
                let mut rows = self.fetch(Table::Settings, options).await?;
                if let Some(name) = name {
                    rows.retain(|row| row.get("setting_name").and_then(Value::as_str) == Some(name.as_str()));
                }
                rows
            }
            Select::Dump(table) => {
                let options = SelectOptions::new().columns("*").order("id.asc");
                self.fetch(table, options).await?
            }
        };
        Ok(QueryResult::from_rows(rows))
    }

    /// Keeps rows whose `clock_in`, truncated to a local date, equals `date`.
    fn on_local_date(&self, rows: Vec<Row>, date: NaiveDate) -> Vec<Row> {
        rows.into_iter()
            .filter(|row| {
                row.get("clock_in")
                    .and_then(Value::as_str)
                    .and_then(|raw| self.clock.local_date_of(raw))
                    == Some(date)
            })
            .collect()
    }

    async fn joined_time_logs(&self, filter: LogQuery) -> Result<Vec<Row>, StoreError> {
        let mut options = SelectOptions::new().columns(TIME_LOG_JOIN).order("clock_in.desc");
        if let Some(employee_id) = filter.employee_id {
            options = options.eq("employee_id", employee_id);
        }

        // Predicates the API cannot express force a full fetch and client-side paging.
        let client_side = filter.filters_dates() || filter.employee_ids.is_some();
        if !client_side && !filter.unbounded {
            options.limit = Some(filter.limit.unwrap_or(DEFAULT_JOIN_LIMIT));
            options.offset = filter.offset;
        }

        let mut logs = self.fetch(Table::TimeLogs, options).await?;
        if client_side {
            logs = logs
                .into_iter()
                .filter(|row| filter.accepts_employee(row_id(row, "employee_id")))
                .filter(|row| {
                    !filter.filters_dates()
                        || row
                            .get("clock_in")
                            .and_then(Value::as_str)
                            .and_then(|raw| self.clock.local_date_of(raw))
                            .is_some_and(|date| filter.accepts_date(date))
                })
                .skip(if filter.unbounded { 0 } else { filter.offset.unwrap_or(0) as usize })
                .take(match filter.limit {
                    Some(limit) if !filter.unbounded => limit as usize,
                    _ => usize::MAX,
                })
                .collect();
        }

        self.join_employees(logs).await
    }

    /// Left-joins employee columns onto each log by `employee_id`, dropping
    /// logs whose employee no longer exists.
    async fn join_employees(&self, logs: Vec<Row>) -> Result<Vec<Row>, StoreError> {
        if logs.is_empty() {
            return Ok(logs);
        }

        let employees = self
            .fetch(Table::Employees, SelectOptions::new().columns(EMPLOYEE_JOIN))
            .await?;
        let by_id: HashMap<i64, Row> = employees
            .into_iter()
            .filter_map(|employee| row_id(&employee, "id").map(|id| (id, employee)))
            .collect();

        Ok(logs
            .into_iter()
            .filter_map(|mut log| {
                let employee = by_id.get(&row_id(&log, "employee_id")?)?;
                for column in ["emp_code", "full_name", "position", "department"] {
                    log.insert(column.to_string(), employee.get(column).cloned().unwrap_or(Value::Null));
                }
                Some(log)
            })
            .collect())
    }

    async fn insert(&self, insert: Insert) -> Result<QueryResult, StoreError> {
        let (table, row) = match insert {
            Insert::ClockIn(record) => (Table::TimeLogs, to_row(&record)?),
            Insert::ManualTimeLog(record) => (Table::TimeLogs, to_row(&record)?),
            Insert::Employee(employee) => {
                // unique in the store as well; checked here to fail with no write
                let existing = SelectOptions::new().columns("id").eq("emp_code", &employee.emp_code);
                if !self.fetch(Table::Employees, existing).await?.is_empty() {
                    return Err(StoreError::Conflict(format!("employees.emp_code={}", employee.emp_code)));
                }
                (Table::Employees, to_row(&employee)?)
            }
            Insert::Setting(setting) => (Table::Settings, to_row(&setting)?),
        };
        let rows = self.store.insert(table.name(), row).await?;
        Ok(QueryResult::from_rows(rows))
    }

    async fn update(&self, update: Update) -> Result<QueryResult, StoreError> {
        let (table, filter, row) = match update {
            Update::ClockOut { id, record } => (Table::TimeLogs, Filter::from(id), to_row(&record)?),
            Update::TimeLog { id, edit } => (Table::TimeLogs, Filter::from(id), to_row(&edit)?),
            Update::Employee { id, update } => (Table::Employees, Filter::from(id), to_row(&update)?),
            Update::EmployeeByCode { emp_code, update } => {
                (Table::Employees, Filter::eq("emp_code", emp_code), to_row(&update)?)
            }
            Update::Setting { name, value } => (
                Table::Settings,
                Filter::eq("setting_name", name),
                object(json!({ "setting_value": value })),
            ),
        };
        let rows = self.store.update(table.name(), &filter, row).await?;
        Ok(QueryResult::from_rows(rows))
    }

    async fn delete(&self, delete: Delete) -> Result<QueryResult, StoreError> {
        let (table, filter) = match delete {
            Delete::TimeLog(id) => (Table::TimeLogs, Filter::from(id)),
            Delete::TimeLogsForEmployee(employee_id) => (Table::TimeLogs, Filter::eq("employee_id", employee_id)),
            Delete::Employee(id) => (Table::Employees, Filter::from(id)),
            Delete::Setting(name) => (Table::Settings, Filter::eq("setting_name", name)),
        };
        let rows = self.store.delete(table.name(), &filter).await?;
        Ok(QueryResult::from_rows(rows))
    }
}

pub fn to_row<T: Serialize>(value: &T) -> Result<Row, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(row) => Ok(row),
        other => Err(StoreError::Decode(serde::de::Error::custom(format!(
            "expected an object row, got {other}"
        )))),
    }
}

fn object(value: Value) -> Row {
    match value {
        Value::Object(row) => row,
        _ => Row::new(),
    }
}

pub fn row_id(row: &Row, column: &str) -> Option<i64> {
    match row.get(column)? {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Employee, TimeLogView};
    use crate::storage::MemoryStore;
    use chrono::TimeZone;

    fn row(value: Value) -> Row {
        object(value)
    }

    async fn fixture() -> (Adapter, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::ephemeral());
        for (code, name, status) in [
            ("001", "Ann Lee", "active"),
            ("002", "Bo Chan", "active"),
            ("003", "001", "inactive"),
        ] {
            store
                .insert("employees", row(json!({ "emp_code": code, "full_name": name, "status": status })))
                .await
                .unwrap();
        }
        for (employee_id, clock_in, clock_out) in [
            (1, "2024-01-01T23:50:00Z", Value::Null),
            (1, "2024-01-02T00:10:00Z", json!("2024-01-02T09:00:00Z")),
            (2, "2024-01-02T18:00:00Z", Value::Null),
            (99, "2024-01-02T03:00:00Z", Value::Null),
        ] {
            store
                .insert(
                    "time_logs",
                    row(json!({ "employee_id": employee_id, "clock_in": clock_in, "clock_out": clock_out })),
                )
                .await
                .unwrap();
        }
        let adapter = Adapter::new(store.clone(), LocalClock::from_minutes(420));
        (adapter, store)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn code_lookup_falls_back_to_name() {
        let (adapter, _) = fixture().await;

        let by_code = adapter
            .execute(Query::Select(Select::EmployeeByCodeOrName("002".into())))
            .await
            .unwrap();
        let found: Employee = by_code.first().unwrap().unwrap();
        assert_eq!(found.full_name, "Bo Chan");

        let by_name = adapter
            .execute(Query::Select(Select::EmployeeByCodeOrName("Ann Lee".into())))
            .await
            .unwrap();
        assert_eq!(by_name.first::<Employee>().unwrap().unwrap().emp_code, "001");

        // a code match wins even when another employee is named the same
        let ambiguous = adapter
            .execute(Query::Select(Select::EmployeeByCodeOrName("001".into())))
            .await
            .unwrap();
        assert_eq!(ambiguous.row_count, 1);
        assert_eq!(ambiguous.first::<Employee>().unwrap().unwrap().full_name, "Ann Lee");

        let missing = adapter
            .execute(Query::Select(Select::EmployeeByCodeOrName("nobody".into())))
            .await
            .unwrap();
        assert!(missing.is_empty());
    }

    #[tokio::test]
    async fn select_matches_direct_store_calls() {
        let (adapter, store) = fixture().await;

        let via_adapter = adapter
            .execute(Query::Select(Select::EmployeesByStatus("active".into())))
            .await
            .unwrap();
        let direct = store
            .select(
                "employees",
                &SelectOptions::new()
                    .columns("id,emp_code,full_name,position,department,status,created_at")
                    .eq("status", "active"),
            )
            .await
            .unwrap();
        assert_eq!(via_adapter.rows, direct);

        let settings = adapter
            .execute(Query::Select(Select::Settings { name: None }))
            .await
            .unwrap();
        let direct = store
            .select("settings", &SelectOptions::new().columns(SETTING_COLUMNS))
            .await
            .unwrap();
        assert_eq!(settings.rows, direct);
    }

    #[tokio::test]
    async fn counts_without_server_aggregation() {
        let (adapter, _) = fixture().await;
        let all = adapter
            .execute(Query::Select(Select::CountEmployees { status: None }))
            .await
            .unwrap();
        assert_eq!(all.count(), 3);

        let active = adapter
            .execute(Query::Select(Select::CountEmployees { status: Some("active".into()) }))
            .await
            .unwrap();
        assert_eq!(active.count(), 2);
    }

    #[tokio::test]
    async fn date_truncation_uses_local_offset() {
        let (adapter, _) = fixture().await;
        let result = adapter
            .execute(Query::Select(Select::TimeLogsOnDate {
                employee_id: 1,
                date: date(2024, 1, 2),
            }))
            .await
            .unwrap();
        assert_eq!(result.row_count, 2);

        let previous_day = adapter
            .execute(Query::Select(Select::TimeLogsOnDate {
                employee_id: 1,
                date: date(2024, 1, 1),
            }))
            .await
            .unwrap();
        assert!(previous_day.is_empty());

        let utc = Adapter::new(adapter.store().clone(), LocalClock::from_minutes(0));
        let utc_result = utc
            .execute(Query::Select(Select::TimeLogsOnDate {
                employee_id: 1,
                date: date(2024, 1, 2),
            }))
            .await
            .unwrap();
        assert_eq!(utc_result.row_count, 1);
        assert_eq!(utc_result.rows[0]["clock_in"], json!("2024-01-02T00:10:00Z"));
    }

    #[tokio::test]
    async fn latest_log_on_date_is_most_recent() {
        let (adapter, _) = fixture().await;
        let latest = adapter
            .execute(Query::Select(Select::LatestTimeLogOnDate {
                employee_id: 1,
                date: date(2024, 1, 2),
            }))
            .await
            .unwrap();
        assert_eq!(latest.row_count, 1);
        assert_eq!(latest.rows[0]["clock_in"], json!("2024-01-02T00:10:00Z"));
    }

    #[tokio::test]
    async fn join_drops_logs_of_unknown_employees() {
        let (adapter, _) = fixture().await;
        let joined = adapter
            .execute(Query::Select(Select::JoinedTimeLogs(LogQuery::default())))
            .await
            .unwrap();
        let views: Vec<TimeLogView> = joined.decode().unwrap();
        assert_eq!(views.len(), 3);
        assert!(views.iter().all(|view| view.employee_id != 99));
        assert_eq!(views[0].full_name, "Bo Chan");
        assert_eq!(views[0].clock_in, Utc.with_ymd_and_hms(2024, 1, 2, 18, 0, 0).unwrap());

        let orphan = adapter
            .execute(Query::Select(Select::TimeLogById(4)))
            .await
            .unwrap();
        assert!(orphan.is_empty());

        let bare = adapter
            .execute(Query::Select(Select::TimeLogRowById(4)))
            .await
            .unwrap();
        assert_eq!(bare.row_count, 1);
        assert_eq!(bare.rows[0]["employee_id"], json!(99));
    }

    #[tokio::test]
    async fn joined_logs_filter_by_local_date_range() {
        let (adapter, _) = fixture().await;
        let filter = LogQuery {
            from_date: Some(date(2024, 1, 3)),
            ..LogQuery::default()
        };
        let joined = adapter
            .execute(Query::Select(Select::JoinedTimeLogs(filter)))
            .await
            .unwrap();
        assert_eq!(joined.row_count, 1);
        assert_eq!(joined.rows[0]["emp_code"], json!("002"));

        let before = LogQuery {
            before: Some(date(2024, 1, 3)),
            employee_id: Some(1),
            limit: Some(1),
            ..LogQuery::default()
        };
        let joined = adapter
            .execute(Query::Select(Select::JoinedTimeLogs(before)))
            .await
            .unwrap();
        assert_eq!(joined.row_count, 1);
        assert_eq!(joined.rows[0]["clock_in"], json!("2024-01-02T00:10:00Z"));
    }

    #[tokio::test]
    async fn unbounded_listing_ignores_paging() {
        let (adapter, _) = fixture().await;
        let paged = LogQuery {
            limit: Some(1),
            offset: Some(1),
            ..LogQuery::default()
        };
        let page = adapter
            .execute(Query::Select(Select::JoinedTimeLogs(paged.clone())))
            .await
            .unwrap();
        assert_eq!(page.row_count, 1);

        let all = adapter
            .execute(Query::Select(Select::JoinedTimeLogs(LogQuery {
                unbounded: true,
                ..paged
            })))
            .await
            .unwrap();
        assert_eq!(all.row_count, 3);
    }

    #[tokio::test]
    async fn employee_insert_rejects_duplicate_code() {
        let (adapter, _) = fixture().await;
        let duplicate = NewEmployee {
            emp_code: "001".into(),
            full_name: "Someone Else".into(),
            position: None,
            department: None,
            status: "active".into(),
        };
        let result = adapter.execute(Query::Insert(Insert::Employee(duplicate))).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn clock_out_update_fills_the_open_log() {
        let (adapter, _) = fixture().await;
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap();
        let record = ClockOutRecord {
            clock_out: at,
            latitude_out: Some(13.7),
            longitude_out: Some(100.5),
            line_name: None,
            line_picture: None,
        };
        let updated = adapter
            .execute(Query::Update(Update::ClockOut { id: 1, record }))
            .await
            .unwrap();
        assert_eq!(updated.row_count, 1);
        assert_eq!(updated.rows[0]["clock_out"], json!("2024-01-02T10:00:00.000Z"));
        assert_eq!(updated.rows[0]["latitude_out"], json!(13.7));
    }

    #[tokio::test]
    async fn backend_errors_are_not_empty_results() {
        let (adapter, _) = fixture().await;
        let result = adapter.execute(Query::Select(Select::Dump(Table::Settings))).await;
        assert!(result.unwrap().is_empty());

        let broken = Adapter::new(Arc::new(FailingStore), LocalClock::from_minutes(420));
        let result = broken
            .execute(Query::Select(Select::EmployeeByCodeOrName("001".into())))
            .await;
        assert!(matches!(result, Err(StoreError::Status { status: 503, .. })));
    }

    #[tokio::test]
    async fn unsupported_text_is_an_empty_result() {
        let (adapter, _) = fixture().await;
        let result = adapter.sql("VACUUM time_logs", &[]).await.unwrap();
        assert!(result.is_empty());
        assert_eq!(result.row_count, 0);

        let now = adapter.sql("SELECT NOW()", &[]).await.unwrap();
        assert!(now.rows[0]["now"].is_string());
    }

    struct FailingStore;

    #[async_trait::async_trait]
    impl DataStore for FailingStore {
        async fn select(&self, _: &str, _: &SelectOptions) -> Result<Vec<Row>, StoreError> {
            Err(unavailable())
        }

        async fn insert(&self, _: &str, _: Row) -> Result<Vec<Row>, StoreError> {
            Err(unavailable())
        }

        async fn update(&self, _: &str, _: &Filter, _: Row) -> Result<Vec<Row>, StoreError> {
            Err(unavailable())
        }

        async fn delete(&self, _: &str, _: &Filter) -> Result<Vec<Row>, StoreError> {
            Err(unavailable())
        }
    }

    fn unavailable() -> StoreError {
        StoreError::Status {
            status: 503,
            message: "service unavailable".into(),
        }
    }
}
