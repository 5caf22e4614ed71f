//! Settings defaults and category merging.
//!
//! Stored categories shallow-merge over these defaults so a partially
//! populated settings table never strips keys the views rely on. Public
//! stats in particular must never fail: any lookup problem serves the
//! hard-coded numbers.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use utoipa::ToSchema;

/// Public site statistics with their fallback values.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct SiteStats {
    pub total_students: u32,
    pub total_staff: u32,
    pub total_clubs_teams: u32,
    pub years_of_joy: u32,
}

impl Default for SiteStats {
    fn default() -> Self {
        Self {
            total_students: 450,
            total_staff: 48,
            total_clubs_teams: 15,
            years_of_joy: 12,
        }
    }
}

pub(crate) fn default_seo() -> Value {
    json!({
        "metaTitle": "Jolly Children Academic Center - Quality Education for Kids",
        "metaDescription": "Premier academic center providing quality education for children with experienced teachers and modern facilities. Enroll your child today!",
        "keywords": "education, children, academic center, school, learning, kids",
    })
}

pub(crate) fn default_system() -> Value {
    json!({
        "maxFileSize": 5,
        "sessionTimeout": 30,
        "enableLogging": true,
    })
}

pub(crate) fn default_site_stats() -> Value {
    serde_json::to_value(SiteStats::default()).unwrap_or_else(|_| json!({}))
}

/// Shallow-merge a stored category over its defaults.
pub(crate) fn merge_category(default: Value, stored: Option<&Value>) -> Value {
    let Some(Value::Object(stored)) = stored else {
        return default;
    };
    let mut merged = match default {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    for (key, value) in stored {
        merged.insert(key.clone(), value.clone());
    }
    Value::Object(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_defaults_are_the_documented_numbers() {
        let stats = SiteStats::default();
        assert_eq!(stats.total_students, 450);
        assert_eq!(stats.total_staff, 48);
        assert_eq!(stats.total_clubs_teams, 15);
        assert_eq!(stats.years_of_joy, 12);
    }

    #[test]
    fn stats_parse_fills_missing_fields_from_defaults() {
        let stats: SiteStats =
            serde_json::from_value(json!({ "totalStudents": 512 })).expect("stats");
        assert_eq!(stats.total_students, 512);
        assert_eq!(stats.total_staff, 48);
    }

    #[test]
    fn stats_serialize_with_camel_case_keys() {
        let value = serde_json::to_value(SiteStats::default()).expect("json");
        assert_eq!(value.get("totalStudents").and_then(Value::as_u64), Some(450));
        assert_eq!(value.get("yearsOfJoy").and_then(Value::as_u64), Some(12));
    }

    #[test]
    fn merge_keeps_default_keys_the_store_does_not_return() {
        let merged = merge_category(
            default_system(),
            Some(&json!({ "sessionTimeout": 45 })),
        );
        assert_eq!(merged.get("sessionTimeout").and_then(Value::as_u64), Some(45));
        assert_eq!(merged.get("maxFileSize").and_then(Value::as_u64), Some(5));
        assert_eq!(merged.get("enableLogging").and_then(Value::as_bool), Some(true));
    }

    #[test]
    fn merge_ignores_non_object_stored_values() {
        let merged = merge_category(default_seo(), Some(&json!("bogus")));
        assert_eq!(merged, default_seo());
        let merged = merge_category(default_seo(), None);
        assert_eq!(merged, default_seo());
    }
}
