//! Classifies the known parameterized SQL statement shapes into a [`Query`].

use crate::clock::parse_timestamp;
use crate::models::{
    ClockInRecord, ClockOutRecord, EmployeeUpdate, NewEmployee, NewSetting, TimeLogEdit,
};
use crate::query::{Delete, Insert, LogQuery, Query, Select, Update};
use crate::store::value_text;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unsupported query: {statement} ({reason})")]
pub struct Unsupported {
    pub statement: String,
    pub reason: &'static str,
}

struct Params<'a> {
    values: &'a [Value],
    statement: &'a str,
}

impl<'a> Params<'a> {
    fn fail(&self, reason: &'static str) -> Unsupported {
        Unsupported {
            statement: self.statement.chars().take(120).collect(),
            reason,
        }
    }

    fn text(&self, index: usize) -> Option<String> {
        self.values
            .get(index)
            .filter(|value| !value.is_null())
            .map(value_text)
    }

    fn required_text(&self, index: usize) -> Result<String, Unsupported> {
        self.text(index).ok_or_else(|| self.fail("missing text parameter"))
    }

    fn int(&self, index: usize) -> Result<i64, Unsupported> {
        self.text(index)
            .and_then(|text| text.trim().parse().ok())
            .ok_or_else(|| self.fail("missing integer parameter"))
    }

    fn float(&self, index: usize) -> Option<f64> {
        match self.values.get(index)? {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    fn timestamp(&self, index: usize) -> Result<DateTime<Utc>, Unsupported> {
        self.text(index)
            .and_then(|raw| parse_timestamp(&raw))
            .ok_or_else(|| self.fail("missing timestamp parameter"))
    }

    fn optional_timestamp(&self, index: usize) -> Option<DateTime<Utc>> {
        self.text(index).and_then(|raw| parse_timestamp(&raw))
    }

    fn date(&self, index: usize) -> Result<NaiveDate, Unsupported> {
        self.text(index)
            .and_then(|raw| {
                let day: String = raw.trim().chars().take(10).collect();
                NaiveDate::parse_from_str(&day, "%Y-%m-%d").ok()
            })
            .ok_or_else(|| self.fail("missing date parameter"))
    }

    fn last_int(&self) -> Option<u64> {
        self.values
            .last()
            .and_then(|value| value_text(value).trim().parse().ok())
    }
}

pub fn classify(text: &str, params: &[Value]) -> Result<Query, Unsupported> {
    let statement = normalize(text);
    let p = Params {
        values: params,
        statement: &statement,
    };

    if statement.starts_with("create table") {
        return Ok(Query::CreateTable);
    }
    if statement == "select now()" {
        return Ok(Query::Now);
    }

    let query = if statement.starts_with("select") {
        Query::Select(classify_select(&statement, &p)?)
    } else if statement.starts_with("insert") {
        Query::Insert(classify_insert(&statement, &p)?)
    } else if statement.starts_with("update") {
        Query::Update(classify_update(&statement, &p)?)
    } else if statement.starts_with("delete") {
        Query::Delete(classify_delete(&statement, &p)?)
    } else {
        return Err(p.fail("unknown statement kind"));
    };
    Ok(query)
}

fn classify_select(statement: &str, p: &Params<'_>) -> Result<Select, Unsupported> {
    if statement.contains("time_logs t") && statement.contains("join employees e") {
        if statement.contains("where t.id") {
            return Ok(Select::TimeLogById(p.int(0)?));
        }
        return Ok(Select::JoinedTimeLogs(LogQuery {
            limit: Some(p.last_int().unwrap_or(100)),
            ..LogQuery::default()
        }));
    }

    if statement.contains("from employees") {
        if statement.contains("count(*)") {
            let status = if statement.contains("status") { p.text(0) } else { None };
            return Ok(Select::CountEmployees { status });
        }
        if statement.starts_with("select full_name from employees")
            || statement.starts_with("select full_name, emp_code from employees")
        {
            let status = p.text(0).unwrap_or_else(|| "active".to_string());
            return Ok(Select::EmployeeNamesByStatus(status));
        }
        if statement.contains("where emp_code")
            && (statement.contains("and id !=") || statement.contains("and id <>"))
        {
            return Ok(Select::EmployeeByCode {
                emp_code: p.required_text(0)?,
                except_id: Some(p.int(1)?),
            });
        }
        if statement.contains("where emp_code") {
            return Ok(Select::EmployeeByCodeOrName(p.required_text(0)?));
        }
        if statement.contains("where status") {
            return Ok(Select::EmployeesByStatus(p.required_text(0)?));
        }
        if statement.contains("where id") {
            return Ok(Select::EmployeeById(p.int(0)?));
        }
        return Ok(Select::Employees {
            limit: p.text(0).and_then(|text| text.parse().ok()),
            offset: p.text(1).and_then(|text| text.parse().ok()),
        });
    }

    if statement.contains("from time_logs") && statement.contains("where id =") {
        return Ok(Select::TimeLogRowById(p.int(0)?));
    }

    if statement.contains("from time_logs") && statement.contains("date(clock_in)") {
        if !statement.contains("employee_id") {
            return Ok(Select::TimeLogsForDay(p.date(0)?));
        }
        let employee_id = p.int(0)?;
        let date = p.date(1)?;
        if statement.contains("order by clock_in desc") && statement.contains("limit 1") {
            return Ok(Select::LatestTimeLogOnDate { employee_id, date });
        }
        return Ok(Select::TimeLogsOnDate { employee_id, date });
    }

    if statement.contains("from settings") {
        let name = if statement.contains("setting_name =") { p.text(0) } else { None };
        return Ok(Select::Settings { name });
    }

    Err(p.fail("unrecognised select"))
}

fn classify_insert(statement: &str, p: &Params<'_>) -> Result<Insert, Unsupported> {
    if statement.starts_with("insert into time_logs") {
        // (employee_id, clock_in, note, latitude_in, longitude_in, line_name, line_picture)
        return Ok(Insert::ClockIn(ClockInRecord {
            employee_id: p.int(0)?,
            clock_in: p.timestamp(1)?,
            note: p.text(2),
            latitude_in: p.float(3),
            longitude_in: p.float(4),
            line_name: p.text(5),
            line_picture: p.text(6),
        }));
    }
    if statement.starts_with("insert into employees") {
        // (emp_code, full_name, position, department, status)
        return Ok(Insert::Employee(NewEmployee {
            emp_code: p.required_text(0)?,
            full_name: p.required_text(1)?,
            position: p.text(2),
            department: p.text(3),
            status: p.text(4).unwrap_or_else(|| "active".to_string()),
        }));
    }
    if statement.starts_with("insert into settings") {
        // (setting_name, setting_value, description)
        return Ok(Insert::Setting(NewSetting {
            setting_name: p.required_text(0)?,
            setting_value: p.text(1).unwrap_or_default(),
            description: p.text(2),
        }));
    }
    Err(p.fail("unrecognised insert"))
}

fn classify_update(statement: &str, p: &Params<'_>) -> Result<Update, Unsupported> {
    if statement.starts_with("update time_logs") {
        if statement.contains("clock_in =") {
            // (clock_in, clock_out, note, id)
            return Ok(Update::TimeLog {
                id: p.int(3)?,
                edit: TimeLogEdit {
                    clock_in: p.timestamp(0)?,
                    clock_out: p.optional_timestamp(1),
                    note: p.text(2),
                },
            });
        }
        // (clock_out, latitude_out, longitude_out, line_name, line_picture, id)
        return Ok(Update::ClockOut {
            id: p.int(5)?,
            record: ClockOutRecord {
                clock_out: p.timestamp(0)?,
                latitude_out: p.float(1),
                longitude_out: p.float(2),
                line_name: p.text(3),
                line_picture: p.text(4),
            },
        });
    }
    if statement.starts_with("update employees") {
        if statement.contains("set emp_code") {
            // (emp_code, full_name, position, department, status, id)
            return Ok(Update::Employee {
                id: p.int(5)?,
                update: EmployeeUpdate {
                    emp_code: Some(p.required_text(0)?),
                    full_name: p.required_text(1)?,
                    position: p.text(2),
                    department: p.text(3),
                    status: p.text(4).unwrap_or_else(|| "active".to_string()),
                },
            });
        }
        if statement.contains("where emp_code") {
            // (full_name, position, department, status, emp_code)
            return Ok(Update::EmployeeByCode {
                emp_code: p.required_text(4)?,
                update: EmployeeUpdate {
                    emp_code: None,
                    full_name: p.required_text(0)?,
                    position: p.text(1),
                    department: p.text(2),
                    status: p.text(3).unwrap_or_else(|| "active".to_string()),
                },
            });
        }
    }
    if statement.starts_with("update settings") {
        // (setting_value, setting_name)
        return Ok(Update::Setting {
            name: p.required_text(1)?,
            value: p.text(0).unwrap_or_default(),
        });
    }
    Err(p.fail("unrecognised update"))
}

fn classify_delete(statement: &str, p: &Params<'_>) -> Result<Delete, Unsupported> {
    if statement.starts_with("delete from time_logs") {
        if statement.contains("where employee_id") {
            return Ok(Delete::TimeLogsForEmployee(p.int(0)?));
        }
        if statement.contains("where id") {
            return Ok(Delete::TimeLog(p.int(0)?));
        }
    }
    if statement.starts_with("delete from employees") && statement.contains("where id") {
        return Ok(Delete::Employee(p.int(0)?));
    }
    if statement.starts_with("delete from settings") && statement.contains("where setting_name") {
        return Ok(Delete::Setting(p.required_text(0)?));
    }
    Err(p.fail("unrecognised delete"))
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(';')
        .trim()
        .to_lowercase()
}
