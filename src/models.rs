use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Employee {
    pub id: i64,
    #[serde(default)]
    pub emp_code: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_picture: Option<String>,
    #[serde(default = "active_status")]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeLog {
    pub id: i64,
    #[serde(default)]
    pub employee_id: i64,
    #[serde(with = "crate::clock::ts")]
    pub clock_in: DateTime<Utc>,
    #[serde(default, with = "crate::clock::ts_opt")]
    pub clock_out: Option<DateTime<Utc>>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// A time log joined with the employee it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeLogView {
    pub id: i64,
    #[serde(default)]
    pub employee_id: i64,
    #[serde(default)]
    pub emp_code: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(with = "crate::clock::ts")]
    pub clock_in: DateTime<Utc>,
    #[serde(default, with = "crate::clock::ts_opt")]
    pub clock_out: Option<DateTime<Utc>>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub latitude_in: Option<f64>,
    #[serde(default)]
    pub longitude_in: Option<f64>,
    #[serde(default)]
    pub latitude_out: Option<f64>,
    #[serde(default)]
    pub longitude_out: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Setting {
    #[serde(default)]
    pub id: i64,
    pub setting_name: String,
    #[serde(default)]
    pub setting_value: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A messaging group that receives attendance notifications.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotifyGroup {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub chat_id: String,
    #[serde(default)]
    pub active: bool,
}

// ---- rows written to the store ----

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewEmployee {
    pub emp_code: String,
    pub full_name: String,
    pub position: Option<String>,
    pub department: Option<String>,
    pub status: String,
}

/// Full replacement of an employee's editable fields. `emp_code` is left
/// untouched when absent (updates keyed by code).
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EmployeeUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emp_code: Option<String>,
    pub full_name: String,
    pub position: Option<String>,
    pub department: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ClockInRecord {
    pub employee_id: i64,
    #[serde(with = "crate::clock::ts")]
    pub clock_in: DateTime<Utc>,
    pub note: Option<String>,
    pub latitude_in: Option<f64>,
    pub longitude_in: Option<f64>,
    pub line_name: Option<String>,
    pub line_picture: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ClockOutRecord {
    #[serde(with = "crate::clock::ts")]
    pub clock_out: DateTime<Utc>,
    pub latitude_out: Option<f64>,
    pub longitude_out: Option<f64>,
    pub line_name: Option<String>,
    pub line_picture: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ManualTimeLog {
    pub employee_id: i64,
    #[serde(with = "crate::clock::ts")]
    pub clock_in: DateTime<Utc>,
    #[serde(with = "crate::clock::ts_opt")]
    pub clock_out: Option<DateTime<Utc>>,
    pub note: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TimeLogEdit {
    #[serde(with = "crate::clock::ts")]
    pub clock_in: DateTime<Utc>,
    #[serde(with = "crate::clock::ts_opt")]
    pub clock_out: Option<DateTime<Utc>>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewSetting {
    pub setting_name: String,
    pub setting_value: String,
    pub description: Option<String>,
}

// ---- request payloads ----

#[derive(Debug, Default, Deserialize)]
pub struct ClockInRequest {
    #[serde(default)]
    pub employee: Option<String>,
    #[serde(default)]
    pub userinfo: Option<String>,
    #[serde(default, deserialize_with = "lenient::f64_opt")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient::f64_opt")]
    pub lon: Option<f64>,
    #[serde(default)]
    pub line_name: Option<String>,
    #[serde(default)]
    pub line_picture: Option<String>,
    #[serde(default)]
    pub client_time: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClockOutRequest {
    #[serde(default)]
    pub employee: Option<String>,
    #[serde(default, deserialize_with = "lenient::f64_opt")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient::f64_opt")]
    pub lon: Option<f64>,
    #[serde(default)]
    pub line_name: Option<String>,
    #[serde(default)]
    pub line_picture: Option<String>,
    #[serde(default)]
    pub client_time: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClockResponse {
    pub msg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_date_utc: Option<String>,
}

impl ClockResponse {
    pub fn message(msg: impl Into<String>) -> Self {
        Self {
            msg: msg.into(),
            employee: None,
            return_date: None,
            return_date_utc: None,
        }
    }

    pub fn for_employee(msg: impl Into<String>, employee: &str) -> Self {
        Self {
            employee: Some(employee.to_string()),
            ..Self::message(msg)
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct NotifyRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_opt")]
    pub chat_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::f64_opt")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient::f64_opt")]
    pub lon: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TimeLogListQuery {
    #[serde(default)]
    pub from_date: Option<String>,
    #[serde(default)]
    pub to_date: Option<String>,
    #[serde(default, deserialize_with = "lenient::i64_opt")]
    pub employee_id: Option<i64>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EmployeeForm {
    #[serde(default, deserialize_with = "lenient::string_opt")]
    pub emp_code: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TimeLogForm {
    #[serde(default, deserialize_with = "lenient::i64_opt")]
    pub employee_id: Option<i64>,
    #[serde(default)]
    pub clock_in: Option<String>,
    #[serde(default)]
    pub clock_out: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub skip_notification: bool,
}

#[derive(Debug, Deserialize)]
pub struct SettingChange {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_opt")]
    pub value: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SettingsForm {
    #[serde(default)]
    pub settings: Vec<SettingChange>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RelayUrlForm {
    #[serde(default)]
    pub gas_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayTestForm {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient::f64_opt")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient::f64_opt")]
    pub lon: Option<f64>,
    #[serde(default)]
    pub gas_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    #[serde(default)]
    pub employees: Vec<EmployeeForm>,
    #[serde(default)]
    pub skip_existing: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportRequest {
    #[serde(default)]
    pub from_date: Option<String>,
    #[serde(default)]
    pub to_date: Option<String>,
    #[serde(default, deserialize_with = "lenient::i64_opt")]
    pub employee_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CleanupTimeLogsRequest {
    #[serde(default)]
    pub date_before: Option<String>,
    #[serde(default, deserialize_with = "lenient::i64_opt")]
    pub employee_id: Option<i64>,
    #[serde(default)]
    pub export_before_delete: bool,
    #[serde(default)]
    pub cleanup_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CleanupInactiveRequest {
    #[serde(default)]
    pub include_logs: bool,
    #[serde(default)]
    pub export_before_delete: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConfirmRequest {
    #[serde(default)]
    pub confirm: bool,
}

fn active_status() -> String {
    "active".to_string()
}

/// Browser forms send numbers as strings and empty fields as `""`.
pub mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn text(value: Value) -> Option<String> {
        match value {
            Value::String(text) => {
                let text = text.trim().to_string();
                (!text.is_empty()).then_some(text)
            }
            Value::Number(number) => Some(number.to_string()),
            Value::Bool(flag) => Some(flag.to_string()),
            _ => None,
        }
    }

    pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(text(Value::deserialize(deserializer)?).unwrap_or_default())
    }

    pub fn string_opt<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        Ok(text(Value::deserialize(deserializer)?))
    }

    pub fn f64_opt<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        Ok(text(Value::deserialize(deserializer)?).and_then(|text| text.parse().ok()))
    }

    pub fn i64_opt<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
        Ok(text(Value::deserialize(deserializer)?).and_then(|text| text.parse().ok()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn clock_in_request_accepts_string_coordinates() {
        let request: ClockInRequest = serde_json::from_value(json!({
            "employee": "Ann",
            "lat": "13.75",
            "lon": 100.5,
            "userinfo": ""
        }))
        .unwrap();
        assert_eq!(request.lat, Some(13.75));
        assert_eq!(request.lon, Some(100.5));
        assert_eq!(request.client_time, None);
    }

    #[test]
    fn blank_form_fields_become_none() {
        let form: TimeLogForm = serde_json::from_value(json!({
            "employee_id": "",
            "clock_in": "2024-01-01T08:00"
        }))
        .unwrap();
        assert_eq!(form.employee_id, None);
        assert!(!form.skip_notification);
    }

    #[test]
    fn time_log_reads_store_timestamps() {
        let log: TimeLog = serde_json::from_value(json!({
            "id": 1,
            "employee_id": 2,
            "clock_in": "2024-01-01T01:00:00",
            "clock_out": null
        }))
        .unwrap();
        assert_eq!(log.clock_in.to_rfc3339(), "2024-01-01T01:00:00+00:00");
        assert_eq!(log.clock_out, None);
    }

    #[test]
    fn notify_groups_accept_numeric_chat_ids() {
        let groups: Vec<NotifyGroup> = serde_json::from_value(json!([
            { "name": "main", "chat_id": -100123, "active": true },
            { "name": "spare", "chat_id": "", "active": false }
        ]))
        .unwrap();
        assert_eq!(groups[0].chat_id, "-100123");
        assert_eq!(groups[1].chat_id, "");
    }
}
