use crate::clock::{format_duration, LocalClock};
use crate::models::{TimeLog, TimeLogView};
use crate::query::LogQuery;
use chrono::{Datelike, Months, NaiveDate};
use serde::Serialize;
use std::collections::HashSet;

/// A joined log with its local date/time columns filled in.
#[derive(Debug, Clone, Serialize)]
pub struct PresentedLog {
    #[serde(flatten)]
    pub log: TimeLogView,
    pub clock_in_date: String,
    pub clock_in_time: String,
    pub clock_out_date: String,
    pub clock_out_time: String,
    pub duration: String,
}

pub fn present(clock: &LocalClock, log: TimeLogView) -> PresentedLog {
    let (clock_out_date, clock_out_time, duration) = match log.clock_out {
        Some(out) => (
            clock.short_date(out),
            clock.time_of_day(out),
            format_duration(log.clock_in, out),
        ),
        None => Default::default(),
    };
    PresentedLog {
        clock_in_date: clock.short_date(log.clock_in),
        clock_in_time: clock.time_of_day(log.clock_in),
        clock_out_date,
        clock_out_time,
        duration,
        log,
    }
}

/// One spreadsheet row of the time-log export.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExportRow {
    #[serde(rename = "Employee code")]
    pub emp_code: String,
    #[serde(rename = "Full name")]
    pub full_name: String,
    #[serde(rename = "Position")]
    pub position: String,
    #[serde(rename = "Department")]
    pub department: String,
    #[serde(rename = "Clock-in date")]
    pub clock_in_date: String,
    #[serde(rename = "Clock-in time")]
    pub clock_in_time: String,
    #[serde(rename = "Clock-out date")]
    pub clock_out_date: String,
    #[serde(rename = "Clock-out time")]
    pub clock_out_time: String,
    #[serde(rename = "Note")]
    pub note: String,
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Clock-in location")]
    pub location_in: String,
    #[serde(rename = "Clock-out location")]
    pub location_out: String,
}

fn location(lat: Option<f64>, lon: Option<f64>) -> String {
    lat.zip(lon)
        .map(|(lat, lon)| format!("{lat}, {lon}"))
        .unwrap_or_default()
}

pub fn export_row(clock: &LocalClock, log: &TimeLogView) -> ExportRow {
    ExportRow {
        emp_code: log.emp_code.clone(),
        full_name: log.full_name.clone(),
        position: log.position.clone().unwrap_or_default(),
        department: log.department.clone().unwrap_or_default(),
        clock_in_date: clock.short_date(log.clock_in),
        clock_in_time: clock.time_of_day(log.clock_in),
        clock_out_date: log.clock_out.map(|out| clock.short_date(out)).unwrap_or_default(),
        clock_out_time: log.clock_out.map(|out| clock.time_of_day(out)).unwrap_or_default(),
        note: log.note.clone().unwrap_or_default(),
        status: log.status.clone().unwrap_or_default(),
        location_in: location(log.latitude_in, log.longitude_in),
        location_out: location(log.latitude_out, log.longitude_out),
    }
}

/// Log snapshot returned by cleanups that export before deleting.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ArchivedLog {
    pub id: i64,
    pub emp_code: String,
    pub full_name: String,
    pub clock_in_date: String,
    pub clock_in_time: String,
    pub clock_out_date: String,
    pub clock_out_time: String,
    pub note: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

pub fn archive(clock: &LocalClock, log: &TimeLogView) -> ArchivedLog {
    ArchivedLog {
        id: log.id,
        emp_code: log.emp_code.clone(),
        full_name: log.full_name.clone(),
        clock_in_date: clock.short_date(log.clock_in),
        clock_in_time: clock.time_of_day(log.clock_in),
        clock_out_date: log.clock_out.map(|out| clock.short_date(out)).unwrap_or_default(),
        clock_out_time: log.clock_out.map(|out| clock.time_of_day(out)).unwrap_or_default(),
        note: log.note.clone().unwrap_or_default(),
        status: log.status.clone(),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub total_employees: u64,
    pub checked_in_today: usize,
    pub not_checked_out_today: usize,
    pub recent_logs: Vec<PresentedLog>,
}

/// Distinct employees with a log today, and today's logs still open.
pub fn day_counts(logs_today: &[TimeLog]) -> (usize, usize) {
    let employees: HashSet<i64> = logs_today.iter().map(|log| log.employee_id).collect();
    let open = logs_today.iter().filter(|log| log.clock_out.is_none()).count();
    (employees.len(), open)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupPreset {
    LastMonth,
    LastYear,
    OlderThanSixMonths,
    OlderThanOneYear,
}

impl CleanupPreset {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "last_month" => Some(Self::LastMonth),
            "last_year" => Some(Self::LastYear),
            "older_than_6_months" => Some(Self::OlderThanSixMonths),
            "older_than_1_year" => Some(Self::OlderThanOneYear),
            _ => None,
        }
    }

    /// Narrows `filter` to this preset's window, relative to `today`.
    pub fn apply_at(self, today: NaiveDate, filter: &mut LogQuery) {
        match self {
            Self::LastMonth => {
                let first_this_month = today.with_day(1).unwrap_or(today);
                let last = first_this_month.pred_opt().unwrap_or(first_this_month);
                filter.from_date = last.with_day(1);
                filter.to_date = Some(last);
            }
            Self::LastYear => {
                let year = today.year() - 1;
                filter.from_date = NaiveDate::from_ymd_opt(year, 1, 1);
                filter.to_date = NaiveDate::from_ymd_opt(year, 12, 31);
            }
            Self::OlderThanSixMonths => {
                filter.before = today.checked_sub_months(Months::new(6));
            }
            Self::OlderThanOneYear => {
                filter.before = today.checked_sub_months(Months::new(12));
            }
        }
    }
}

/// `YYYY-MM-DD`, ignoring anything after the date.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let day: String = raw.trim().chars().take(10).collect();
    NaiveDate::parse_from_str(&day, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn view(clock_out: Option<(u32, u32)>) -> TimeLogView {
        TimeLogView {
            id: 7,
            employee_id: 1,
            emp_code: "001".into(),
            full_name: "Ann Lee".into(),
            position: Some("Clerk".into()),
            department: None,
            clock_in: Utc.with_ymd_and_hms(2024, 3, 1, 1, 30, 0).unwrap(),
            clock_out: clock_out.map(|(h, m)| Utc.with_ymd_and_hms(2024, 3, 1, h, m, 0).unwrap()),
            note: None,
            status: Some("normal".into()),
            latitude_in: Some(13.5),
            longitude_in: Some(100.25),
            latitude_out: None,
            longitude_out: None,
        }
    }

    #[test]
    fn presents_local_times_and_duration() {
        let clock = LocalClock::from_minutes(420);
        let closed = present(&clock, view(Some((10, 0))));
        assert_eq!(closed.clock_in_date, "01/03/2024");
        assert_eq!(closed.clock_in_time, "08:30:00");
        assert_eq!(closed.clock_out_time, "17:00:00");
        assert_eq!(closed.duration, "8 hours 30 minutes");

        let open = present(&clock, view(None));
        assert_eq!(open.clock_out_date, "");
        assert_eq!(open.duration, "");

        let json = serde_json::to_value(&open).unwrap();
        assert_eq!(json["full_name"], "Ann Lee");
        assert_eq!(json["clock_in_time"], "08:30:00");
    }

    #[test]
    fn export_rows_use_readable_columns() {
        let clock = LocalClock::from_minutes(420);
        let row = export_row(&clock, &view(None));
        assert_eq!(row.location_in, "13.5, 100.25");
        assert_eq!(row.location_out, "");
        assert_eq!(row.department, "");

        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["Employee code"], "001");
        assert_eq!(json["Clock-in time"], "08:30:00");
    }

    #[test]
    fn day_counts_distinct_and_open() {
        let log = |id: i64, employee_id: i64, open: bool| TimeLog {
            id,
            employee_id,
            clock_in: Utc.with_ymd_and_hms(2024, 3, 1, 1, 0, 0).unwrap(),
            clock_out: (!open).then(|| Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()),
            note: None,
            status: None,
        };
        let logs = vec![log(1, 1, false), log(2, 1, true), log(3, 2, true)];
        assert_eq!(day_counts(&logs), (2, 2));
        assert_eq!(day_counts(&[]), (0, 0));
    }

    #[test]
    fn cleanup_presets_at_fixed_day() {
        let today = date(2024, 3, 15);

        let mut filter = LogQuery::default();
        CleanupPreset::LastMonth.apply_at(today, &mut filter);
        assert_eq!(filter.from_date, Some(date(2024, 2, 1)));
        assert_eq!(filter.to_date, Some(date(2024, 2, 29)));

        let mut filter = LogQuery::default();
        CleanupPreset::LastYear.apply_at(today, &mut filter);
        assert_eq!(filter.from_date, Some(date(2023, 1, 1)));
        assert_eq!(filter.to_date, Some(date(2023, 12, 31)));

        let mut filter = LogQuery::default();
        CleanupPreset::OlderThanSixMonths.apply_at(today, &mut filter);
        assert_eq!(filter.before, Some(date(2023, 9, 15)));

        let mut filter = LogQuery::default();
        CleanupPreset::OlderThanOneYear.apply_at(date(2024, 2, 29), &mut filter);
        assert_eq!(filter.before, Some(date(2023, 2, 28)));

        let mut filter = LogQuery::default();
        CleanupPreset::LastMonth.apply_at(date(2024, 1, 10), &mut filter);
        assert_eq!(filter.from_date, Some(date(2023, 12, 1)));
        assert_eq!(filter.to_date, Some(date(2023, 12, 31)));

        assert_eq!(CleanupPreset::parse("older_than_6_months"), Some(CleanupPreset::OlderThanSixMonths));
        assert_eq!(CleanupPreset::parse("yesterday"), None);
    }

    #[test]
    fn parses_leading_date() {
        assert_eq!(parse_date("2024-02-03"), Some(date(2024, 2, 3)));
        assert_eq!(parse_date(" 2024-02-03T10:00 "), Some(date(2024, 2, 3)));
        assert_eq!(parse_date("03/02/2024"), None);
    }
}
