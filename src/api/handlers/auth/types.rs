//! Request/response types for the admin auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body of the password step. Field names match the login form.
#[derive(ToSchema, Deserialize, Debug)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, rename = "csrfToken")]
    pub csrf_token: String,
}

/// Body of the code-entry step.
#[derive(ToSchema, Deserialize, Debug)]
pub struct MfaForm {
    #[serde(default)]
    pub code: String,
    #[serde(default, rename = "csrfToken")]
    pub csrf_token: String,
}

/// View data returned by the login and code-entry pages.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CsrfResponse {
    #[serde(rename = "csrfToken")]
    pub csrf_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Flash-style query parameters carried across redirects.
#[derive(Deserialize, Debug, Default)]
pub struct PageQuery {
    pub error: Option<String>,
    pub success: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_form_tolerates_missing_fields() {
        let form: LoginForm = serde_urlencoded_like("email=a%40b.co");
        assert_eq!(form.email, "a@b.co");
        assert_eq!(form.password, "");
        assert_eq!(form.csrf_token, "");
    }

    #[test]
    fn csrf_response_uses_the_form_field_name() {
        let response = CsrfResponse {
            csrf_token: "token".to_string(),
            error: None,
        };
        let value = serde_json::to_value(&response).expect("json");
        assert_eq!(value.get("csrfToken").and_then(|v| v.as_str()), Some("token"));
        assert!(value.get("error").is_none());
    }

    // Forms arrive urlencoded; JSON with the same field names exercises the
    // same serde derives without pulling in another test dependency.
    fn serde_urlencoded_like(query: &str) -> LoginForm {
        let mut map = serde_json::Map::new();
        for pair in query.split('&') {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next().unwrap_or_default().to_string();
            let value = parts.next().unwrap_or_default().replace("%40", "@");
            map.insert(key, serde_json::Value::String(value));
        }
        serde_json::from_value(serde_json::Value::Object(map)).expect("form")
    }
}
