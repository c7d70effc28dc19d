//! Bulk admin operations. Deletes are issued row by row, outside any transaction.

use crate::admin::log_filter;
use crate::errors::{AppError, StoreError};
use crate::handlers::fail;
use crate::models::{
    CleanupInactiveRequest, CleanupTimeLogsRequest, ConfirmRequest, Employee, EmployeeUpdate,
    ExportRequest, ImportRequest, NewEmployee, TimeLogView,
};
use crate::query::{row_id, Adapter, Delete, Insert, LogQuery, Query, Select, Table, Update};
use crate::report::{archive, export_row, parse_date, CleanupPreset};
use crate::settings::ADMIN_PASSWORD;
use crate::state::AppState;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

const NOTHING_MATCHED: &str = "No data matches the given conditions";

#[derive(Debug, Serialize)]
pub struct ImportFailure {
    pub emp_code: String,
    pub full_name: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct ImportReport {
    pub success: bool,
    pub total: usize,
    pub imported: usize,
    pub skipped: usize,
    pub errors: Vec<ImportFailure>,
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

pub async fn import_employees(
    State(state): State<AppState>,
    Json(request): Json<ImportRequest>,
) -> Result<Response, AppError> {
    if request.employees.is_empty() {
        return Ok(fail("No data to import").into_response());
    }
    if request
        .employees
        .iter()
        .any(|row| trimmed(&row.emp_code).is_none() || trimmed(&row.full_name).is_none())
    {
        return Ok(fail("Invalid data: every row needs an employee code and full name").into_response());
    }

    let mut report = ImportReport {
        success: true,
        total: request.employees.len(),
        imported: 0,
        skipped: 0,
        errors: Vec::new(),
    };

    for row in &request.employees {
        let emp_code = trimmed(&row.emp_code).unwrap_or_default();
        let full_name = trimmed(&row.full_name).unwrap_or_default();
        let status = trimmed(&row.status).unwrap_or_else(|| "active".to_string());

        let outcome = import_one(
            &state.db,
            request.skip_existing,
            NewEmployee {
                emp_code: emp_code.clone(),
                full_name: full_name.clone(),
                position: trimmed(&row.position),
                department: trimmed(&row.department),
                status,
            },
        )
        .await;
        match outcome {
            Ok(true) => report.imported += 1,
            Ok(false) => report.skipped += 1,
            Err(err) => {
                warn!(%emp_code, "import row failed: {err}");
                report.errors.push(ImportFailure {
                    emp_code,
                    full_name,
                    error: err.to_string(),
                });
            }
        }
    }

    state.employees.invalidate().await;
    info!(
        total = report.total,
        imported = report.imported,
        skipped = report.skipped,
        failed = report.errors.len(),
        "employee import finished"
    );
    Ok(Json(report).into_response())
}

/// Inserts a new code, or updates (or skips) an existing one. `Ok(false)`
/// means skipped.
async fn import_one(db: &Adapter, skip_existing: bool, employee: NewEmployee) -> Result<bool, StoreError> {
    let existing = db
        .execute(Query::Select(Select::EmployeeByCode {
            emp_code: employee.emp_code.clone(),
            except_id: None,
        }))
        .await?;

    if existing.is_empty() {
        db.execute(Query::Insert(Insert::Employee(employee))).await?;
        return Ok(true);
    }
    if skip_existing {
        return Ok(false);
    }

    let update = EmployeeUpdate {
        emp_code: None,
        full_name: employee.full_name,
        position: employee.position,
        department: employee.department,
        status: employee.status,
    };
    db.execute(Query::Update(Update::EmployeeByCode {
        emp_code: employee.emp_code,
        update,
    }))
    .await?;
    Ok(true)
}

async fn joined_logs(db: &Adapter, filter: LogQuery) -> Result<Vec<TimeLogView>, StoreError> {
    db.execute(Query::Select(Select::JoinedTimeLogs(LogQuery {
        unbounded: true,
        ..filter
    })))
    .await?
    .decode()
}

pub async fn export_time_logs(
    State(state): State<AppState>,
    Json(request): Json<ExportRequest>,
) -> Result<Json<Value>, AppError> {
    let filter = log_filter(
        request.from_date.as_deref(),
        request.to_date.as_deref(),
        request.employee_id,
    );
    let logs = joined_logs(&state.db, filter).await?;
    if logs.is_empty() {
        return Ok(fail(NOTHING_MATCHED));
    }

    let data: Vec<_> = logs.iter().map(|log| export_row(&state.clock, log)).collect();
    info!(count = data.len(), "time logs exported");
    Ok(Json(json!({ "success": true, "count": data.len(), "data": data })))
}

pub async fn cleanup_time_logs(
    State(state): State<AppState>,
    Json(request): Json<CleanupTimeLogsRequest>,
) -> Result<Json<Value>, AppError> {
    let date_before = trimmed(&request.date_before);
    let cleanup_type = trimmed(&request.cleanup_type);
    if date_before.is_none() && cleanup_type.is_none() {
        return Ok(fail("Please give a date or a cleanup type"));
    }

    let mut filter = LogQuery {
        before: date_before.as_deref().and_then(parse_date),
        employee_id: request.employee_id,
        ..LogQuery::default()
    };
    if date_before.is_some() && filter.before.is_none() {
        return Ok(fail("Invalid date"));
    }
    if let Some(raw) = cleanup_type.as_deref() {
        match CleanupPreset::parse(raw) {
            Some(preset) => preset.apply_at(state.clock.today(), &mut filter),
            None if filter.before.is_none() => return Ok(fail("Unknown cleanup type")),
            None => warn!(cleanup_type = raw, "unknown cleanup type ignored"),
        }
    }

    let logs = joined_logs(&state.db, filter).await?;
    if logs.is_empty() {
        return Ok(fail(NOTHING_MATCHED));
    }

    let export_data = request.export_before_delete.then(|| {
        logs.iter()
            .map(|log| archive(&state.clock, log))
            .collect::<Vec<_>>()
    });

    let mut deleted_count = 0;
    for log in &logs {
        deleted_count += state
            .db
            .execute(Query::Delete(Delete::TimeLog(log.id)))
            .await?
            .row_count;
    }
    info!(deleted_count, "time logs cleaned up");

    Ok(Json(json!({
        "success": true,
        "message": format!("Deleted {deleted_count} records"),
        "deleted_count": deleted_count,
        "export_data": export_data,
    })))
}

pub async fn cleanup_inactive_employees(
    State(state): State<AppState>,
    Json(request): Json<CleanupInactiveRequest>,
) -> Result<Json<Value>, AppError> {
    let inactive: Vec<Employee> = state
        .db
        .execute(Query::Select(Select::EmployeesByStatus("inactive".to_string())))
        .await?
        .decode()?;
    if inactive.is_empty() {
        return Ok(fail("No inactive employees found"));
    }
    let ids: Vec<i64> = inactive.iter().map(|employee| employee.id).collect();

    let export_data = if request.export_before_delete {
        let employees: Vec<Value> = inactive
            .iter()
            .map(|employee| {
                json!({
                    "id": employee.id,
                    "emp_code": employee.emp_code,
                    "full_name": employee.full_name,
                })
            })
            .collect();
        let mut export = json!({ "employees": employees });
        if request.include_logs {
            let logs = joined_logs(
                &state.db,
                LogQuery {
                    employee_ids: Some(ids.clone()),
                    ..LogQuery::default()
                },
            )
            .await?;
            let archived: Vec<_> = logs
                .iter()
                .map(|log| {
                    let mut archived = archive(&state.clock, log);
                    archived.status = None;
                    archived
                })
                .collect();
            export["time_logs"] = json!(archived);
        }
        Some(export)
    } else {
        None
    };

    let mut deleted_logs = 0;
    if request.include_logs {
        for id in &ids {
            deleted_logs += state
                .db
                .execute(Query::Delete(Delete::TimeLogsForEmployee(*id)))
                .await?
                .row_count;
        }
    }
    let mut deleted_employees = 0;
    for id in &ids {
        deleted_employees += state
            .db
            .execute(Query::Delete(Delete::Employee(*id)))
            .await?
            .row_count;
    }
    state.employees.invalidate().await;
    info!(deleted_employees, deleted_logs, "inactive employees cleaned up");

    Ok(Json(json!({
        "success": true,
        "message": format!("Deleted {deleted_employees} employees and {deleted_logs} time logs"),
        "deleted_employees": deleted_employees,
        "deleted_logs": deleted_logs,
        "export_data": export_data,
    })))
}

async fn delete_rows(db: &Adapter, table: Table) -> Result<usize, StoreError> {
    let rows = db.execute(Query::Select(Select::Dump(table))).await?;
    let mut deleted = 0;
    for id in rows.rows.iter().filter_map(|row| row_id(row, "id")) {
        let delete = match table {
            Table::TimeLogs => Delete::TimeLog(id),
            Table::Employees => Delete::Employee(id),
            Table::Settings => continue,
        };
        deleted += db.execute(Query::Delete(delete)).await?.row_count;
    }
    Ok(deleted)
}

pub async fn delete_all_employees(
    State(state): State<AppState>,
    Json(request): Json<ConfirmRequest>,
) -> Result<Json<Value>, AppError> {
    if !request.confirm {
        return Ok(fail("Deletion must be confirmed"));
    }

    let deleted_logs = delete_rows(&state.db, Table::TimeLogs).await?;
    let deleted_count = delete_rows(&state.db, Table::Employees).await?;
    state.employees.invalidate().await;
    warn!(deleted_count, deleted_logs, "all employees deleted");

    Ok(Json(json!({
        "success": true,
        "message": "All employees deleted",
        "deleted_count": deleted_count,
        "deleted_logs": deleted_logs,
    })))
}

pub async fn backup_database(State(state): State<AppState>) -> Result<Response, AppError> {
    let dump = |table| state.db.execute(Query::Select(Select::Dump(table)));
    let employees = dump(Table::Employees).await?.rows;
    let time_logs = dump(Table::TimeLogs).await?.rows;
    let settings: Vec<_> = dump(Table::Settings)
        .await?
        .rows
        .into_iter()
        .filter(|row| row.get("setting_name").and_then(Value::as_str) != Some(ADMIN_PASSWORD))
        .collect();

    info!(
        employees = employees.len(),
        time_logs = time_logs.len(),
        "backup generated"
    );

    let now = Utc::now();
    let backup = json!({
        "timestamp": now.to_rfc3339(),
        "employees": employees,
        "time_logs": time_logs,
        "settings": settings,
    });
    let body = serde_json::to_string_pretty(&backup).map_err(AppError::internal)?;
    let disposition = format!(
        "attachment; filename=time_tracker_backup_{}.json",
        now.format("%Y-%m-%d")
    );

    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}
