use crate::errors::StoreError;
use crate::models::{NewEmployee, NewSetting, NotifyGroup, Setting};
use crate::query::{Adapter, Delete, Insert, Query, Select, Update};
use std::collections::HashMap;
use tracing::{info, warn};

pub const DEFAULT_LIFF_ID: &str = "2001032478-VR5Akj0k";
pub const DEFAULT_RELAY_URL: &str = "https://script.google.com/macros/s/YOUR_SCRIPT_ID/exec";
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

pub const ADMIN_PASSWORD: &str = "admin_password";
pub const RELAY_URL: &str = "gas_web_app_url";
pub const USE_RELAY: &str = "use_gas_for_telegram";

/// `(name, value, description)`
pub const DEFAULT_SETTINGS: [(&str, &str, &str); 14] = [
    ("organization_name", "Hua Na Subdistrict Administrative Organization", "Organization name"),
    ("work_start_time", "08:30", "Work start time"),
    ("work_end_time", "16:30", "Work end time"),
    ("allowed_ip", "", "Allowed IP address"),
    ("telegram_bot_token", "", "Telegram bot token"),
    (
        "telegram_groups",
        r#"[{"name":"Main group","chat_id":"","active":true}]"#,
        "Telegram groups that receive notifications",
    ),
    ("notify_clock_in", "1", "Notify on clock-in"),
    ("notify_clock_out", "1", "Notify on clock-out"),
    ("admin_username", DEFAULT_ADMIN_USERNAME, "Admin username"),
    (ADMIN_PASSWORD, DEFAULT_ADMIN_PASSWORD, "Admin password"),
    ("liff_id", DEFAULT_LIFF_ID, "LINE LIFF ID"),
    ("time_offset", "420", "Time offset (minutes)"),
    (RELAY_URL, DEFAULT_RELAY_URL, "Relay script web app URL"),
    (USE_RELAY, "1", "Send Telegram messages through the relay script (1 = yes, 0 = no)"),
];

/// Settings added after the first release; topped up on existing installs.
const LATER_SETTINGS: [&str; 2] = [RELAY_URL, USE_RELAY];

const SAMPLE_EMPLOYEES: [(&str, &str, &str, &str); 2] = [
    ("001", "Somchai Jaidee", "Manager", "Administration"),
    ("002", "Somying Rakrian", "Officer", "General Affairs"),
];

#[derive(Debug, Clone, Default)]
pub struct Settings {
    values: HashMap<String, String>,
}

impl Settings {
    pub async fn load(db: &Adapter) -> Result<Self, StoreError> {
        let rows: Vec<Setting> = db
            .execute(Query::Select(Select::Settings { name: None }))
            .await?
            .decode()?;
        Ok(Self::from_rows(rows))
    }

    pub fn from_rows(rows: Vec<Setting>) -> Self {
        let values = rows
            .into_iter()
            .map(|row| (row.setting_name, row.setting_value.unwrap_or_default()))
            .collect();
        Self { values }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// The trimmed value, or `None` when missing or blank.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// `"1"` means on.
    pub fn flag(&self, name: &str) -> bool {
        self.get(name) == Some("1")
    }

    /// Relay is the default when the flag was never stored.
    pub fn uses_relay(&self) -> bool {
        match self.values.get(USE_RELAY) {
            Some(value) => value.trim() == "1",
            None => true,
        }
    }

    pub fn notify_groups(&self) -> Vec<NotifyGroup> {
        let Some(raw) = self.get("telegram_groups") else {
            return Vec::new();
        };
        match serde_json::from_str(raw) {
            Ok(groups) => groups,
            Err(err) => {
                warn!("telegram_groups is not valid JSON: {err}");
                Vec::new()
            }
        }
    }
}

pub async fn value(db: &Adapter, name: &str) -> Result<Option<String>, StoreError> {
    let rows: Vec<Setting> = db
        .execute(Query::Select(Select::Settings { name: Some(name.to_string()) }))
        .await?
        .decode()?;
    Ok(rows.into_iter().next().and_then(|row| row.setting_value))
}

pub async fn upsert(
    db: &Adapter,
    name: &str,
    value: &str,
    description: Option<&str>,
) -> Result<(), StoreError> {
    let existing = db
        .execute(Query::Select(Select::Settings { name: Some(name.to_string()) }))
        .await?;
    let query = if existing.is_empty() {
        Query::Insert(Insert::Setting(NewSetting {
            setting_name: name.to_string(),
            setting_value: value.to_string(),
            description: description.map(str::to_string),
        }))
    } else {
        Query::Update(Update::Setting {
            name: name.to_string(),
            value: value.to_string(),
        })
    };
    db.execute(query).await?;
    Ok(())
}

fn default_setting(name: &str) -> Option<NewSetting> {
    DEFAULT_SETTINGS
        .iter()
        .find(|(candidate, _, _)| *candidate == name)
        .map(|(name, value, description)| NewSetting {
            setting_name: name.to_string(),
            setting_value: value.to_string(),
            description: Some(description.to_string()),
        })
}

pub async fn reset_admin(db: &Adapter) -> Result<(), StoreError> {
    for name in ["admin_username", ADMIN_PASSWORD] {
        db.execute(Query::Delete(Delete::Setting(name.to_string()))).await?;
        if let Some(setting) = default_setting(name) {
            db.execute(Query::Insert(Insert::Setting(setting))).await?;
        }
    }
    Ok(())
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub settings_added: usize,
    pub employees_added: usize,
}

/// First-run seeding. Inserts only into empty tables, apart from topping up
/// settings introduced after the first release.
pub async fn seed(db: &Adapter) -> Result<SeedReport, StoreError> {
    let mut report = SeedReport::default();

    let current = Settings::load(db).await?;
    let missing: Vec<&str> = if current.values.is_empty() {
        DEFAULT_SETTINGS.iter().map(|(name, _, _)| *name).collect()
    } else {
        LATER_SETTINGS
            .into_iter()
            .filter(|name| !current.contains(name))
            .collect()
    };
    for name in missing {
        if let Some(setting) = default_setting(name) {
            db.execute(Query::Insert(Insert::Setting(setting))).await?;
            report.settings_added += 1;
        }
    }

    let employees = db
        .execute(Query::Select(Select::CountEmployees { status: None }))
        .await?;
    if employees.count() == 0 {
        for (code, name, position, department) in SAMPLE_EMPLOYEES {
            let employee = NewEmployee {
                emp_code: code.to_string(),
                full_name: name.to_string(),
                position: Some(position.to_string()),
                department: Some(department.to_string()),
                status: "active".to_string(),
            };
            db.execute(Query::Insert(Insert::Employee(employee))).await?;
            report.employees_added += 1;
        }
    }

    if report != SeedReport::default() {
        info!(
            settings = report.settings_added,
            employees = report.employees_added,
            "seeded initial data"
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::LocalClock;
    use crate::storage::MemoryStore;
    use crate::store::DataStore;
    use serde_json::json;
    use std::sync::Arc;

    fn adapter() -> (Adapter, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::ephemeral());
        (Adapter::new(store.clone(), LocalClock::from_minutes(420)), store)
    }

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let (db, _) = adapter();
        let first = seed(&db).await.unwrap();
        assert_eq!(first, SeedReport { settings_added: 14, employees_added: 2 });

        let second = seed(&db).await.unwrap();
        assert_eq!(second, SeedReport::default());

        let settings = Settings::load(&db).await.unwrap();
        assert_eq!(settings.get("work_start_time"), Some("08:30"));
        assert!(settings.flag("notify_clock_in"));
    }

    #[tokio::test]
    async fn existing_installs_get_later_settings_only() {
        let (db, store) = adapter();
        let old = json!({ "setting_name": "organization_name", "setting_value": "Acme" });
        store.insert("settings", old.as_object().unwrap().clone()).await.unwrap();

        let report = seed(&db).await.unwrap();
        assert_eq!(report.settings_added, 2);

        let settings = Settings::load(&db).await.unwrap();
        assert_eq!(settings.get("organization_name"), Some("Acme"));
        assert_eq!(settings.get(RELAY_URL), Some(DEFAULT_RELAY_URL));
        assert!(settings.uses_relay());
        assert!(!settings.contains("work_start_time"));
    }

    #[tokio::test]
    async fn upsert_inserts_then_updates() {
        let (db, _) = adapter();
        upsert(&db, RELAY_URL, "https://relay.test/exec", Some("relay")).await.unwrap();
        upsert(&db, RELAY_URL, "https://relay.test/v2", None).await.unwrap();

        let rows = db
            .execute(Query::Select(Select::Settings { name: Some(RELAY_URL.into()) }))
            .await
            .unwrap();
        assert_eq!(rows.row_count, 1);
        assert_eq!(value(&db, RELAY_URL).await.unwrap().as_deref(), Some("https://relay.test/v2"));
    }

    #[tokio::test]
    async fn reset_admin_restores_defaults() {
        let (db, _) = adapter();
        seed(&db).await.unwrap();
        upsert(&db, ADMIN_PASSWORD, "hunter2", None).await.unwrap();

        reset_admin(&db).await.unwrap();
        let settings = Settings::load(&db).await.unwrap();
        assert_eq!(settings.get(ADMIN_PASSWORD), Some(DEFAULT_ADMIN_PASSWORD));
        assert_eq!(settings.get("admin_username"), Some(DEFAULT_ADMIN_USERNAME));
    }

    #[test]
    fn snapshot_reads_flags_and_groups() {
        let settings = Settings::from_rows(vec![
            Setting {
                id: 1,
                setting_name: "notify_clock_out".into(),
                setting_value: Some("0".into()),
                description: None,
            },
            Setting {
                id: 2,
                setting_name: "telegram_groups".into(),
                setting_value: Some(r#"[{"name":"ops","chat_id":"-1001","active":true}]"#.into()),
                description: None,
            },
            Setting {
                id: 3,
                setting_name: USE_RELAY.into(),
                setting_value: Some("0".into()),
                description: None,
            },
        ]);
        assert!(!settings.flag("notify_clock_out"));
        assert!(!settings.flag("missing"));
        assert!(!settings.uses_relay());
        let groups = settings.notify_groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].chat_id, "-1001");

        let broken = Settings::from_rows(vec![Setting {
            id: 1,
            setting_name: "telegram_groups".into(),
            setting_value: Some("not json".into()),
            description: None,
        }]);
        assert!(broken.notify_groups().is_empty());
    }
}
