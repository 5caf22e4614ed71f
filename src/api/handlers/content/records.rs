//! Typed public content records and normalization from loose JSON.
//!
//! The primary store has fixed column names, but the legacy fallback files
//! accumulated several spellings over the years (`image_url`, `imageUrl`,
//! `image`, `photoUrl`). Every record is normalized into one public shape at
//! this boundary so nothing loose leaks past it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// A record the resolution layer can merge and deduplicate.
pub trait ContentRecord {
    fn id(&self) -> &str;

    /// Composite key for duplicate collapse; first occurrence wins.
    fn dedupe_key(&self) -> String;
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Facility {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub created_at: String,
}

impl Facility {
    /// Normalize a loose record into the public shape, whatever the source
    /// called its fields. Non-objects are dropped.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        Some(Self {
            id: string_ish(object.get("id")),
            title: first_string(object, &["title", "name"]),
            description: first_string(object, &["description", "desc"]),
            image_url: first_present(object, &["image_url", "imageUrl", "image", "photoUrl"]),
            created_at: first_string(object, &["created_at", "createdAt"]),
        })
    }
}

impl ContentRecord for Facility {
    fn id(&self) -> &str {
        &self.id
    }

    fn dedupe_key(&self) -> String {
        format!(
            "{}|{}",
            self.title,
            self.image_url.as_deref().unwrap_or_default()
        )
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Testimonial {
    pub id: String,
    pub client_name: String,
    pub client_role: String,
    pub content: String,
    pub rating: i32,
    pub is_featured: bool,
    pub created_at: String,
}

impl Testimonial {
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let client_name = first_string(object, &["client_name", "clientName"]);
        let client_role = first_string(object, &["client_role", "clientRole"]);
        Some(Self {
            id: string_ish(object.get("id")),
            client_name: if client_name.is_empty() {
                "Anonymous".to_string()
            } else {
                client_name
            },
            client_role: if client_role.is_empty() {
                "Parent".to_string()
            } else {
                client_role
            },
            content: first_string(object, &["content", "testimonialContent"]),
            rating: rating_of(object),
            is_featured: truthy(object, &["is_featured", "isFeatured"]),
            created_at: first_string(object, &["created_at", "createdAt"]),
        })
    }
}

impl ContentRecord for Testimonial {
    fn id(&self) -> &str {
        &self.id
    }

    // Testimonials carry no image; content plays the title role in the key.
    fn dedupe_key(&self) -> String {
        format!("{}|", self.content)
    }
}

fn string_ish(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn first_string(object: &Map<String, Value>, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| object.get(*key).and_then(Value::as_str))
        .unwrap_or_default()
        .to_string()
}

fn first_present(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| object.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn rating_of(object: &Map<String, Value>) -> i32 {
    match object.get("rating") {
        Some(Value::Number(n)) => n.as_i64().map_or(5, |v| v as i32),
        Some(Value::String(s)) => s.parse().unwrap_or(5),
        _ => 5,
    }
}

fn truthy(object: &Map<String, Value>, keys: &[&str]) -> bool {
    keys.iter().any(|key| match object.get(*key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s == "true",
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn facility_normalizes_every_image_field_spelling() {
        for key in ["image_url", "imageUrl", "image", "photoUrl"] {
            let value = json!({ "id": 7, "title": "Library", key: "/uploads/facilities/lib.webp" });
            let facility = Facility::from_value(&value).expect("facility");
            assert_eq!(facility.id, "7");
            assert_eq!(facility.title, "Library");
            assert_eq!(
                facility.image_url.as_deref(),
                Some("/uploads/facilities/lib.webp")
            );
        }
    }

    #[test]
    fn facility_accepts_name_and_created_at_variants() {
        let value = json!({
            "id": "legacy-3",
            "name": "Playground",
            "createdAt": "2023-04-01T00:00:00Z"
        });
        let facility = Facility::from_value(&value).expect("facility");
        assert_eq!(facility.title, "Playground");
        assert_eq!(facility.created_at, "2023-04-01T00:00:00Z");
        assert_eq!(facility.image_url, None);
    }

    #[test]
    fn facility_missing_fields_become_empty_not_errors() {
        let facility = Facility::from_value(&json!({})).expect("facility");
        assert_eq!(facility.id, "");
        assert_eq!(facility.title, "");
        assert_eq!(facility.image_url, None);
        assert!(Facility::from_value(&json!("not-an-object")).is_none());
    }

    #[test]
    fn facility_serializes_with_camel_case_keys() {
        let facility = Facility {
            id: "1".to_string(),
            title: "Gym".to_string(),
            description: String::new(),
            image_url: Some("/uploads/facilities/gym.webp".to_string()),
            created_at: "2024-01-01".to_string(),
        };
        let value = serde_json::to_value(&facility).expect("json");
        assert!(value.get("imageUrl").is_some());
        assert!(value.get("createdAt").is_some());
        assert!(value.get("image_url").is_none());
    }

    #[test]
    fn testimonial_defaults_follow_the_legacy_records() {
        let testimonial = Testimonial::from_value(&json!({
            "id": 2,
            "content": "Wonderful school",
            "rating": "4",
            "isFeatured": "true"
        }))
        .expect("testimonial");
        assert_eq!(testimonial.client_name, "Anonymous");
        assert_eq!(testimonial.client_role, "Parent");
        assert_eq!(testimonial.rating, 4);
        assert!(testimonial.is_featured);

        let testimonial = Testimonial::from_value(&json!({ "id": 3 })).expect("testimonial");
        assert_eq!(testimonial.rating, 5);
        assert!(!testimonial.is_featured);
    }

    #[test]
    fn dedupe_keys_pair_title_with_image() {
        let a = Facility {
            id: "1".to_string(),
            title: "Gym".to_string(),
            description: "new".to_string(),
            image_url: Some("/a.webp".to_string()),
            created_at: String::new(),
        };
        let mut b = a.clone();
        b.id = "2".to_string();
        b.description = "old".to_string();
        assert_eq!(a.dedupe_key(), b.dedupe_key());

        b.image_url = Some("/b.webp".to_string());
        assert_ne!(a.dedupe_key(), b.dedupe_key());
    }
}
