//! Workspace settings sections stored as JSON in the `settings` table.

use crate::db;
use crate::query::list::ListDefaults;
use crate::query::SortOrder;
use crate::schema::Rules;
use rusqlite::Connection;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupSection {
    Lists,
    Accounts,
}

impl SetupSection {
    pub const ALL: [SetupSection; 2] = [SetupSection::Lists, SetupSection::Accounts];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "lists" => Some(Self::Lists),
            "accounts" => Some(Self::Accounts),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Lists => "lists",
            Self::Accounts => "accounts",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Lists => "setup.lists",
            Self::Accounts => "setup.accounts",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Lists => json!({
            "pageSize": 10,
            "defaultSortOrder": "asc"
        }),
        SetupSection::Accounts => json!({
            "minPasswordLength": 8,
            "sessionTtlMinutes": 720
        }),
    }
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

pub fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = current
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())?;
    for (k, v) in patch {
        match section {
            SetupSection::Lists => match k.as_str() {
                "pageSize" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 100)?));
                }
                "defaultSortOrder" => {
                    let order = v
                        .as_str()
                        .and_then(SortOrder::parse)
                        .ok_or_else(|| "defaultSortOrder must be one of: asc, desc".to_string())?;
                    obj.insert(k.clone(), Value::String(order.as_str().to_string()));
                }
                _ => return Err(format!("unknown lists field: {}", k)),
            },
            SetupSection::Accounts => match k.as_str() {
                "minPasswordLength" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 8, 64)?));
                }
                "sessionTtlMinutes" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 5, 10080)?));
                }
                _ => return Err(format!("unknown accounts field: {}", k)),
            },
        }
    }
    Ok(())
}

pub fn load_section(conn: &Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Malformed saved values fall back to defaults field by field.
            for (k, v) in saved_obj {
                let mut single = Map::new();
                single.insert(k.clone(), v.clone());
                let _ = merge_section_patch(section, &mut current, &single);
            }
        }
    }
    Ok(current)
}

pub fn save_section(conn: &Connection, section: SetupSection, value: &Value) -> anyhow::Result<()> {
    db::settings_set_json(conn, section.key(), value)
}

pub fn list_defaults(conn: &Connection) -> anyhow::Result<ListDefaults> {
    let lists = load_section(conn, SetupSection::Lists)?;
    let mut out = ListDefaults::default();
    if let Some(n) = lists["pageSize"].as_u64() {
        out.page_size = n as u32;
    }
    if let Some(order) = lists["defaultSortOrder"].as_str().and_then(SortOrder::parse) {
        out.sort = order;
    }
    Ok(out)
}

#[derive(Debug, Clone, Copy)]
pub struct AccountSettings {
    pub min_password_length: usize,
    pub session_ttl: chrono::Duration,
}

impl AccountSettings {
    pub fn rules(&self) -> Rules {
        Rules {
            min_password_length: self.min_password_length,
        }
    }
}

pub fn account_settings(conn: &Connection) -> anyhow::Result<AccountSettings> {
    let accounts = load_section(conn, SetupSection::Accounts)?;
    Ok(AccountSettings {
        min_password_length: accounts["minPasswordLength"].as_u64().unwrap_or(8) as usize,
        session_ttl: chrono::Duration::minutes(
            accounts["sessionTtlMinutes"].as_i64().unwrap_or(720),
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Connection {
        let ws = std::env::temp_dir().join(format!("schoold-settings-{}", uuid::Uuid::new_v4()));
        db::open_db(&ws).expect("open")
    }

    fn patch(v: Value) -> Map<String, Value> {
        v.as_object().cloned().expect("object")
    }

    #[test]
    fn defaults_without_saved_values() {
        let conn = store();
        let d = list_defaults(&conn).expect("lists");
        assert_eq!(d.page_size, 10);
        assert_eq!(d.sort, SortOrder::Asc);
        let a = account_settings(&conn).expect("accounts");
        assert_eq!(a.min_password_length, 8);
        assert_eq!(a.session_ttl, chrono::Duration::minutes(720));
    }

    #[test]
    fn patches_are_validated() {
        let mut lists = default_section(SetupSection::Lists);
        assert!(merge_section_patch(SetupSection::Lists, &mut lists, &patch(json!({ "pageSize": 0 }))).is_err());
        assert!(merge_section_patch(SetupSection::Lists, &mut lists, &patch(json!({ "pageSize": "5" }))).is_err());
        assert!(merge_section_patch(SetupSection::Lists, &mut lists, &patch(json!({ "color": "red" }))).is_err());
        merge_section_patch(
            SetupSection::Lists,
            &mut lists,
            &patch(json!({ "pageSize": 25, "defaultSortOrder": "DESC" })),
        )
        .expect("valid patch");
        assert_eq!(lists["pageSize"], 25);
        assert_eq!(lists["defaultSortOrder"], "desc");
    }

    #[test]
    fn saved_section_drives_accessors() {
        let conn = store();
        let mut accounts = load_section(&conn, SetupSection::Accounts).expect("load");
        merge_section_patch(
            SetupSection::Accounts,
            &mut accounts,
            &patch(json!({ "minPasswordLength": 12 })),
        )
        .expect("patch");
        save_section(&conn, SetupSection::Accounts, &accounts).expect("save");
        assert_eq!(account_settings(&conn).expect("accounts").min_password_length, 12);
    }

    #[test]
    fn malformed_saved_field_keeps_default() {
        let conn = store();
        db::settings_set_json(&conn, "setup.lists", &json!({ "pageSize": 500, "defaultSortOrder": "desc" }))
            .expect("raw set");
        let d = list_defaults(&conn).expect("lists");
        assert_eq!(d.page_size, 10);
        assert_eq!(d.sort, SortOrder::Desc);
    }
}
