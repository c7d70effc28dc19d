use crate::cache::EmployeePair;
use crate::clock::{format_timestamp, LocalClock};
use crate::errors::{AppError, StoreError};
use crate::models::{
    ClockInRecord, ClockInRequest, ClockOutRecord, ClockOutRequest, ClockResponse, Employee,
    NotifyRequest, TimeLog,
};
use crate::notify::{with_location, ClockEvent, ClockNotice};
use crate::query::{Adapter, Insert, Query, Select, Update};
use crate::settings::{self, Settings, DEFAULT_LIFF_ID};
use crate::state::AppState;
use crate::ui::render_index;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

pub const SUCCESS: &str = "SUCCESS";
pub const NO_EMPLOYEE: &str = "Please specify an employee";
pub const EMPLOYEE_NOT_FOUND: &str = "Employee not found";
pub const ALREADY_CLOCKED_IN: &str = "You have already clocked in today";
pub const NOT_CLOCKED_IN: &str = "You have not clocked in today";
pub const ALREADY_CLOCKED_OUT: &str = "You have already clocked out today";

pub(crate) fn succeed(message: &str) -> Json<Value> {
    Json(json!({ "success": true, "message": message }))
}

pub(crate) fn fail(message: &str) -> Json<Value> {
    Json(json!({ "success": false, "message": message }))
}

pub async fn index(State(state): State<AppState>) -> Html<String> {
    let organization = match Settings::load(&state.db).await {
        Ok(settings) => settings.get("organization_name").unwrap_or_default().to_string(),
        Err(err) => {
            warn!("failed to load settings for index page: {err}");
            String::new()
        }
    };
    Html(render_index(&organization))
}

pub async fn health(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    state.db.store().ping().await.map_err(|err| AppError {
        status: StatusCode::SERVICE_UNAVAILABLE,
        message: format!("data store unavailable: {err}"),
    })?;
    Ok(Json(json!({ "status": "ok" })))
}

#[derive(Deserialize)]
struct NameRow {
    full_name: String,
}

/// Names of active employees for the autocomplete.
pub async fn get_data(State(state): State<AppState>) -> Result<Json<Vec<String>>, AppError> {
    let rows: Vec<NameRow> = state
        .db
        .execute(Query::Select(Select::EmployeeNamesByStatus("active".to_string())))
        .await?
        .decode()?;
    Ok(Json(rows.into_iter().map(|row| row.full_name).collect()))
}

pub async fn get_employee(State(state): State<AppState>) -> Result<Json<Vec<EmployeePair>>, AppError> {
    let pairs = state.employees.get(&state.db).await?;
    Ok(Json(pairs.as_ref().clone()))
}

pub(crate) async fn find_employee(db: &Adapter, key: &str) -> Result<Option<Employee>, StoreError> {
    db.execute(Query::Select(Select::EmployeeByCodeOrName(key.to_string())))
        .await?
        .first()
}

fn employee_key(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|key| !key.is_empty())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn clocked(clock: &LocalClock, employee: &str, at: DateTime<Utc>) -> ClockResponse {
    ClockResponse {
        return_date: Some(clock.time_of_day(at)),
        return_date_utc: Some(format_timestamp(at)),
        ..ClockResponse::for_employee(SUCCESS, employee)
    }
}

pub async fn clock_in(
    State(state): State<AppState>,
    Json(request): Json<ClockInRequest>,
) -> Result<Json<ClockResponse>, AppError> {
    let Some(key) = employee_key(request.employee.as_deref()) else {
        return Ok(Json(ClockResponse::message(NO_EMPLOYEE)));
    };
    let Some(employee) = find_employee(&state.db, key).await? else {
        return Ok(Json(ClockResponse::message(EMPLOYEE_NOT_FOUND)));
    };

    // check-then-write: two concurrent requests can both pass this
    let today = state.clock.today();
    let existing = state
        .db
        .execute(Query::Select(Select::TimeLogsOnDate {
            employee_id: employee.id,
            date: today,
        }))
        .await?;
    if !existing.is_empty() {
        return Ok(Json(ClockResponse::for_employee(ALREADY_CLOCKED_IN, key)));
    }

    let at = state.clock.client_time(request.client_time.as_deref());
    let note = non_blank(request.userinfo);
    let line_name = non_blank(request.line_name);
    let record = ClockInRecord {
        employee_id: employee.id,
        clock_in: at,
        note: note.clone(),
        latitude_in: request.lat,
        longitude_in: request.lon,
        line_name: line_name.clone(),
        line_picture: non_blank(request.line_picture),
    };
    state.db.execute(Query::Insert(Insert::ClockIn(record))).await?;
    info!(emp_code = %employee.emp_code, "clock-in recorded");

    let mut notice = ClockNotice::new(ClockEvent::ClockIn, employee.full_name.as_str(), at);
    notice.note = note;
    notice.lat = request.lat;
    notice.lon = request.lon;
    notice.line_name = line_name;
    state.notifier.spawn(notice);

    Ok(Json(clocked(&state.clock, key, at)))
}

pub async fn clock_out(
    State(state): State<AppState>,
    Json(request): Json<ClockOutRequest>,
) -> Result<Json<ClockResponse>, AppError> {
    let Some(key) = employee_key(request.employee.as_deref()) else {
        return Ok(Json(ClockResponse::message(NO_EMPLOYEE)));
    };
    let Some(employee) = find_employee(&state.db, key).await? else {
        return Ok(Json(ClockResponse::message(EMPLOYEE_NOT_FOUND)));
    };

    let today = state.clock.today();
    let latest: Option<TimeLog> = state
        .db
        .execute(Query::Select(Select::LatestTimeLogOnDate {
            employee_id: employee.id,
            date: today,
        }))
        .await?
        .first()?;
    let Some(log) = latest else {
        return Ok(Json(ClockResponse::for_employee(NOT_CLOCKED_IN, key)));
    };
    if log.clock_out.is_some() {
        return Ok(Json(ClockResponse::for_employee(ALREADY_CLOCKED_OUT, key)));
    }

    let at = state.clock.client_time(request.client_time.as_deref());
    let line_name = non_blank(request.line_name);
    let record = ClockOutRecord {
        clock_out: at,
        latitude_out: request.lat,
        longitude_out: request.lon,
        line_name: line_name.clone(),
        line_picture: non_blank(request.line_picture),
    };
    state
        .db
        .execute(Query::Update(Update::ClockOut { id: log.id, record }))
        .await?;
    info!(emp_code = %employee.emp_code, log_id = log.id, "clock-out recorded");

    let mut notice = ClockNotice::new(ClockEvent::ClockOut, employee.full_name.as_str(), at);
    notice.lat = request.lat;
    notice.lon = request.lon;
    notice.line_name = line_name;
    state.notifier.spawn(notice);

    Ok(Json(clocked(&state.clock, key, at)))
}

/// Sends a caller-supplied message straight to the bot API.
pub async fn send_notify(
    State(state): State<AppState>,
    Json(request): Json<NotifyRequest>,
) -> Json<Value> {
    let (Some(message), Some(token), Some(chat_id)) = (
        non_blank(request.message),
        non_blank(request.token),
        request.chat_id,
    ) else {
        return Json(json!({ "success": false, "msg": "Incomplete data" }));
    };

    let text = with_location(&message, request.lat, request.lon);
    match state.notifier.send_direct(&token, &chat_id, &text).await {
        Ok(_) => Json(json!({ "success": true })),
        Err(err) => {
            warn!("sendnotify failed: {err}");
            Json(json!({ "success": false, "error": err.to_string() }))
        }
    }
}

pub async fn liff_id(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let liff_id = settings::value(&state.db, "liff_id")
        .await?
        .unwrap_or_else(|| DEFAULT_LIFF_ID.to_string());
    Ok(Json(json!({ "success": true, "liffId": liff_id })))
}

pub async fn time_offset(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let offset = match settings::value(&state.db, "time_offset").await? {
        Some(stored) => Value::String(stored),
        None => Value::from(state.clock.offset_minutes()),
    };
    Ok(Json(json!({ "success": true, "time_offset": offset })))
}
