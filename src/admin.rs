use crate::errors::{AppError, StoreError};
use crate::handlers::{fail, succeed};
use crate::models::{
    Employee, EmployeeForm, EmployeeUpdate, LoginRequest, ManualTimeLog, NewEmployee, PageQuery,
    RelayTestForm, RelayUrlForm, Setting, SettingsForm, TimeLog, TimeLogEdit, TimeLogForm,
    TimeLogListQuery, TimeLogView,
};
use crate::notify::{ClockEvent, ClockNotice, RelayPayload, TEST_RELAY_TIMEOUT};
use crate::query::{row_id, Delete, Insert, LogQuery, Query, Select, Update};
use crate::report::{day_counts, parse_date, present, Dashboard};
use crate::settings::{self, Settings, ADMIN_PASSWORD, RELAY_URL};
use crate::state::AppState;
use axum::extract::{Path, Query as UrlQuery, State};
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, warn};

pub const DUPLICATE_CODE: &str = "Employee code already exists";
const EMPLOYEE_NOT_FOUND: &str = "Employee not found";
const TIME_LOG_NOT_FOUND: &str = "Time log not found";
const DEFAULT_PAGE: u64 = 100;

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    let (Some(username), Some(password)) = (
        request.username.filter(|value| !value.is_empty()),
        request.password.filter(|value| !value.is_empty()),
    ) else {
        return Ok(fail("Please enter a username and password"));
    };

    let settings = Settings::load(&state.db).await?;
    let (Some(expected_user), Some(expected_password)) =
        (settings.get("admin_username"), settings.get(ADMIN_PASSWORD))
    else {
        return Ok(fail("Admin account not found"));
    };

    if username == expected_user && password == expected_password {
        info!(%username, "admin login");
        Ok(Json(json!({ "success": true })))
    } else {
        warn!(%username, "admin login rejected");
        Ok(fail("Invalid username or password"))
    }
}

// ---- employees ----

pub async fn list_employees(
    State(state): State<AppState>,
    UrlQuery(page): UrlQuery<PageQuery>,
) -> Result<Json<Value>, AppError> {
    let employees: Vec<Employee> = state
        .db
        .execute(Query::Select(Select::Employees {
            limit: Some(page.limit.unwrap_or(DEFAULT_PAGE)),
            offset: page.offset,
        }))
        .await?
        .decode()?;
    Ok(Json(json!({ "success": true, "employees": employees })))
}

pub async fn get_employee(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let employee: Option<Employee> = state
        .db
        .execute(Query::Select(Select::EmployeeById(id)))
        .await?
        .first()?;
    Ok(match employee {
        Some(employee) => Json(json!({ "success": true, "employee": employee })),
        None => fail(EMPLOYEE_NOT_FOUND),
    })
}

/// `(emp_code, full_name)` when both are present.
fn required_identity(form: &EmployeeForm) -> Option<(String, String)> {
    let code = form.emp_code.clone()?;
    let name = form.full_name.as_deref().map(str::trim).filter(|name| !name.is_empty())?;
    Some((code, name.to_string()))
}

fn optional(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn status_or_active(value: &Option<String>) -> String {
    optional(value).unwrap_or_else(|| "active".to_string())
}

pub async fn create_employee(
    State(state): State<AppState>,
    Json(form): Json<EmployeeForm>,
) -> Result<Json<Value>, AppError> {
    let Some((emp_code, full_name)) = required_identity(&form) else {
        return Ok(fail("Please enter the employee code and full name"));
    };

    let employee = NewEmployee {
        emp_code,
        full_name,
        position: optional(&form.position),
        department: optional(&form.department),
        status: "active".to_string(),
    };
    let created = match state.db.execute(Query::Insert(Insert::Employee(employee))).await {
        Ok(created) => created,
        Err(StoreError::Conflict(_)) => return Ok(fail(DUPLICATE_CODE)),
        Err(err) => return Err(err.into()),
    };
    state.employees.invalidate().await;

    let id = created.rows.first().and_then(|row| row_id(row, "id"));
    info!(?id, "employee added");
    Ok(Json(json!({ "success": true, "message": "Employee added", "id": id })))
}

pub async fn update_employee(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(form): Json<EmployeeForm>,
) -> Result<Json<Value>, AppError> {
    let Some((emp_code, full_name)) = required_identity(&form) else {
        return Ok(fail("Please enter the employee code and full name"));
    };

    let existing = state.db.execute(Query::Select(Select::EmployeeById(id))).await?;
    if existing.is_empty() {
        return Ok(fail(EMPLOYEE_NOT_FOUND));
    }
    let clash = state
        .db
        .execute(Query::Select(Select::EmployeeByCode {
            emp_code: emp_code.clone(),
            except_id: Some(id),
        }))
        .await?;
    if !clash.is_empty() {
        return Ok(fail(DUPLICATE_CODE));
    }

    let update = EmployeeUpdate {
        emp_code: Some(emp_code),
        full_name,
        position: optional(&form.position),
        department: optional(&form.department),
        status: status_or_active(&form.status),
    };
    match state.db.execute(Query::Update(Update::Employee { id, update })).await {
        Ok(_) => {}
        Err(StoreError::Conflict(_)) => return Ok(fail(DUPLICATE_CODE)),
        Err(err) => return Err(err.into()),
    }
    state.employees.invalidate().await;
    Ok(succeed("Employee updated"))
}

pub async fn delete_employee(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let existing = state.db.execute(Query::Select(Select::EmployeeById(id))).await?;
    if existing.is_empty() {
        return Ok(fail(EMPLOYEE_NOT_FOUND));
    }
    state.db.execute(Query::Delete(Delete::Employee(id))).await?;
    state.employees.invalidate().await;
    info!(id, "employee deleted");
    Ok(succeed("Employee deleted"))
}

// ---- time logs ----

pub(crate) fn log_filter(
    from_date: Option<&str>,
    to_date: Option<&str>,
    employee_id: Option<i64>,
) -> LogQuery {
    LogQuery {
        from_date: from_date.and_then(parse_date),
        to_date: to_date.and_then(parse_date),
        employee_id,
        ..LogQuery::default()
    }
}

pub async fn list_time_logs(
    State(state): State<AppState>,
    UrlQuery(query): UrlQuery<TimeLogListQuery>,
) -> Result<Json<Value>, AppError> {
    let mut filter = log_filter(
        query.from_date.as_deref(),
        query.to_date.as_deref(),
        query.employee_id,
    );
    filter.limit = Some(query.limit.unwrap_or(DEFAULT_PAGE));
    filter.offset = query.offset;

    let logs: Vec<TimeLogView> = state
        .db
        .execute(Query::Select(Select::JoinedTimeLogs(filter)))
        .await?
        .decode()?;
    let logs: Vec<_> = logs.into_iter().map(|log| present(&state.clock, log)).collect();
    Ok(Json(json!({ "success": true, "logs": logs })))
}

pub async fn get_time_log(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let log: Option<TimeLogView> = state
        .db
        .execute(Query::Select(Select::TimeLogById(id)))
        .await?
        .first()?;
    Ok(match log {
        Some(log) => Json(json!({ "success": true, "log": log })),
        None => fail(TIME_LOG_NOT_FOUND),
    })
}

pub async fn create_time_log(
    State(state): State<AppState>,
    Json(form): Json<TimeLogForm>,
) -> Result<Json<Value>, AppError> {
    let (Some(employee_id), Some(clock_in)) = (form.employee_id, optional(&form.clock_in)) else {
        return Ok(fail("Please fill in the required fields"));
    };

    let employee: Option<Employee> = state
        .db
        .execute(Query::Select(Select::EmployeeById(employee_id)))
        .await?
        .first()?;
    let Some(employee) = employee else {
        return Ok(fail(EMPLOYEE_NOT_FOUND));
    };

    let clock_in = admin_time(&state, &clock_in);
    let clock_out = optional(&form.clock_out).map(|raw| admin_time(&state, &raw));
    let note = optional(&form.note);
    let record = ManualTimeLog {
        employee_id,
        clock_in,
        clock_out,
        note: note.clone(),
        status: "manual".to_string(),
    };
    let created = state
        .db
        .execute(Query::Insert(Insert::ManualTimeLog(record)))
        .await?;
    let id = created.rows.first().and_then(|row| row_id(row, "id"));
    info!(?id, employee_id, "manual time log added");

    if !form.skip_notification {
        let mut notice = ClockNotice::new(ClockEvent::ClockIn, employee.full_name.as_str(), clock_in);
        notice.note = note;
        notice.by_admin = true;
        state.notifier.spawn(notice);

        if let Some(clock_out) = clock_out {
            let mut notice = ClockNotice::new(ClockEvent::ClockOut, employee.full_name.as_str(), clock_out);
            notice.by_admin = true;
            state.notifier.spawn(notice);
        }
    }

    Ok(Json(json!({ "success": true, "message": "Time log added", "id": id })))
}

/// Admin-typed time; anything unparseable means now.
fn admin_time(state: &AppState, raw: &str) -> chrono::DateTime<Utc> {
    state.clock.admin_time(raw).unwrap_or_else(|| {
        warn!(raw, "unparseable admin time, using now");
        Utc::now()
    })
}

pub async fn update_time_log(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(form): Json<TimeLogForm>,
) -> Result<Json<Value>, AppError> {
    let existing: Option<TimeLog> = state
        .db
        .execute(Query::Select(Select::TimeLogRowById(id)))
        .await?
        .first()?;
    let Some(existing) = existing else {
        return Ok(fail(TIME_LOG_NOT_FOUND));
    };

    let clock_in = optional(&form.clock_in)
        .map(|raw| admin_time(&state, &raw))
        .unwrap_or(existing.clock_in);
    let edit = TimeLogEdit {
        clock_in,
        clock_out: optional(&form.clock_out).map(|raw| admin_time(&state, &raw)),
        note: optional(&form.note),
    };
    state.db.execute(Query::Update(Update::TimeLog { id, edit })).await?;
    info!(id, "time log edited");
    Ok(succeed("Time log updated"))
}

pub async fn delete_time_log(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let existing = state.db.execute(Query::Select(Select::TimeLogRowById(id))).await?;
    if existing.is_empty() {
        return Ok(fail(TIME_LOG_NOT_FOUND));
    }
    state.db.execute(Query::Delete(Delete::TimeLog(id))).await?;
    info!(id, "time log deleted");
    Ok(succeed("Time log deleted"))
}

// ---- settings ----

pub async fn get_settings(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let mut settings: Vec<Setting> = state
        .db
        .execute(Query::Select(Select::Settings { name: None }))
        .await?
        .decode()?;
    for setting in settings.iter_mut().filter(|setting| setting.setting_name == ADMIN_PASSWORD) {
        setting.setting_value = Some(String::new());
    }
    Ok(Json(json!({ "success": true, "settings": settings })))
}

pub async fn save_settings(
    State(state): State<AppState>,
    Json(form): Json<SettingsForm>,
) -> Result<Json<Value>, AppError> {
    if form.settings.is_empty() {
        return Ok(fail("Invalid settings data"));
    }

    let mut updated = 0;
    for change in form.settings {
        let Some(name) = change.name.filter(|name| !name.is_empty()) else {
            continue;
        };
        let value = change.value.unwrap_or_default();
        state
            .db
            .execute(Query::Update(Update::Setting { name, value }))
            .await?;
        updated += 1;
    }
    info!(updated, "settings saved");
    Ok(succeed("Settings saved"))
}

pub async fn set_relay_url(
    State(state): State<AppState>,
    Json(form): Json<RelayUrlForm>,
) -> Result<Json<Value>, AppError> {
    let Some(url) = optional(&form.gas_url) else {
        return Ok(fail("Please enter a URL"));
    };
    settings::upsert(&state.db, RELAY_URL, &url, Some("Relay script web app URL")).await?;
    info!(%url, "relay URL updated");
    Ok(succeed("URL saved"))
}

pub async fn test_relay(
    State(state): State<AppState>,
    Json(form): Json<RelayTestForm>,
) -> Result<Json<Value>, AppError> {
    let Some(message) = optional(&form.message) else {
        return Ok(fail("Please enter a message"));
    };

    let settings = Settings::load(&state.db).await?;
    let url = match optional(&form.gas_url) {
        Some(url) => url,
        None => match settings.get(RELAY_URL) {
            Some(url) => url.to_string(),
            None => return Ok(fail("Relay URL not found, please configure it first")),
        },
    };
    if !url.starts_with("https://") {
        return Ok(fail("Relay URL must start with https://"));
    }

    let Some(token) = settings.get("telegram_bot_token") else {
        return Ok(fail("Telegram token not found, please configure it first"));
    };
    let groups = settings.notify_groups();
    if groups.is_empty() {
        return Ok(fail("Telegram groups not found, please configure them first"));
    }
    let Some(group) = groups.iter().find(|group| group.active && !group.chat_id.is_empty()) else {
        return Ok(fail("No active Telegram group"));
    };

    let payload = RelayPayload::new(&message, &group.chat_id, token, form.lat, form.lon);
    match state.notifier.send_relay(&url, &payload, TEST_RELAY_TIMEOUT).await {
        Ok(response) => Ok(Json(json!({
            "success": true,
            "message": "Test message sent",
            "response": response,
        }))),
        Err(err) => {
            warn!("relay test failed: {err}");
            Ok(Json(json!({
                "success": false,
                "message": format!("An error occurred: {err}"),
                "error": err.to_string(),
            })))
        }
    }
}

pub async fn reset_admin(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    settings::reset_admin(&state.db).await?;
    warn!("admin credentials reset to defaults");
    Ok(succeed("Admin credentials reset"))
}

// ---- dashboard ----

pub async fn dashboard(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let today = state.clock.today();

    let total_employees = state
        .db
        .execute(Query::Select(Select::CountEmployees {
            status: Some("active".to_string()),
        }))
        .await?
        .count();
    let logs_today: Vec<TimeLog> = state
        .db
        .execute(Query::Select(Select::TimeLogsForDay(today)))
        .await?
        .decode()?;
    let (checked_in_today, not_checked_out_today) = day_counts(&logs_today);

    let recent: Vec<TimeLogView> = state
        .db
        .execute(Query::Select(Select::JoinedTimeLogs(LogQuery {
            limit: Some(10),
            ..LogQuery::default()
        })))
        .await?
        .decode()?;

    let dashboard = Dashboard {
        total_employees,
        checked_in_today,
        not_checked_out_today,
        recent_logs: recent.into_iter().map(|log| present(&state.clock, log)).collect(),
    };
    Ok(Json(json!({ "success": true, "dashboard": dashboard })))
}
