use super::QueryError;
use std::collections::BTreeMap;

pub const PAGE_KEY: &str = "page";
pub const SORT_KEY: &str = "sortOrder";

/// Raw list parameters: one string value per key, order irrelevant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    values: BTreeMap<String, String>,
}

impl QueryParams {
    /// Scalars are stringified the way they would arrive in a URL; `null`,
    /// arrays and objects count as absent.
    pub fn from_json(v: &serde_json::Value) -> Result<Self, QueryError> {
        let mut values = BTreeMap::new();
        match v {
            serde_json::Value::Null => {}
            serde_json::Value::Object(map) => {
                for (k, v) in map {
                    let s = match v {
                        serde_json::Value::String(s) => s.clone(),
                        serde_json::Value::Number(n) => n.to_string(),
                        serde_json::Value::Bool(b) => b.to_string(),
                        _ => continue,
                    };
                    values.insert(k.clone(), s);
                }
            }
            _ => return Err(QueryError::NotAnObject),
        }
        Ok(Self { values })
    }

    #[cfg(test)]
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn page(&self) -> Option<&str> {
        self.get(PAGE_KEY)
    }

    pub fn sort_order(&self) -> Option<&str> {
        self.get(SORT_KEY)
    }

    /// Everything except the paging and sorting keys.
    pub fn filters(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values
            .iter()
            .filter(|(k, _)| k.as_str() != PAGE_KEY && k.as_str() != SORT_KEY)
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalars_are_stringified_and_structures_dropped() {
        let p = QueryParams::from_json(&json!({
            "page": 2,
            "search": "math",
            "classId": "7",
            "flag": true,
            "nested": { "a": 1 },
            "gone": null
        }))
        .expect("params");
        assert_eq!(p.page(), Some("2"));
        assert_eq!(p.get("flag"), Some("true"));
        assert_eq!(p.get("nested"), None);
        assert_eq!(p.get("gone"), None);

        let keys: Vec<&str> = p.filters().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["classId", "flag", "search"]);
    }

    #[test]
    fn non_object_params_are_rejected() {
        assert!(matches!(
            QueryParams::from_json(&json!([1, 2])),
            Err(QueryError::NotAnObject)
        ));
        assert_eq!(
            QueryParams::from_json(&serde_json::Value::Null).expect("null"),
            QueryParams::default()
        );
    }
}
