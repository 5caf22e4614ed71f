//! Contact form intake: validation, honeypot filtering, and notification
//! dispatch to the front office.

use axum::{
    extract::Extension,
    http::{header::ACCEPT, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, warn};
use utoipa::ToSchema;

use super::auth::utils::{extract_client_ip, valid_email};
use crate::api::email::ContactMessage;
use crate::api::state::AppState;

#[derive(ToSchema, Deserialize, Debug)]
pub struct ContactForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub message: String,
    // Hidden honeypot fields; humans leave them empty.
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub phone: String,
}

#[utoipa::path(
    post,
    path = "/api/contact",
    responses(
        (status = 200, description = "Submission accepted"),
        (status = 400, description = "Validation errors"),
        (status = 303, description = "Redirect variant for plain form posts")
    ),
    tag = "content"
)]
pub async fn contact(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    payload: Option<Form<ContactForm>>,
) -> Response {
    let wants_json = headers
        .get(ACCEPT)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains("application/json"));

    let Some(Form(form)) = payload else {
        return validation_failure(wants_json, vec!["Invalid request".to_string()]);
    };

    // A filled honeypot means a bot: accept the request, drop the message.
    if !form.website.trim().is_empty() || !form.phone.trim().is_empty() {
        warn!("Contact form honeypot triggered");
        return success(wants_json);
    }

    let mut errors = Vec::new();
    if form.name.trim().is_empty() {
        errors.push("Name is required".to_string());
    }
    if !valid_email(&form.email.trim().to_lowercase()) {
        errors.push("Valid email is required".to_string());
    }
    if form.message.trim().is_empty() {
        errors.push("Message is required".to_string());
    } else if form.message.split_whitespace().count() < 3 {
        errors.push("Message is too short".to_string());
    }
    if !errors.is_empty() {
        return validation_failure(wants_json, errors);
    }

    let contact = ContactMessage {
        name: form.name.trim().to_string(),
        email: form.email.trim().to_string(),
        message: form.message.trim().to_string(),
        ip: extract_client_ip(&headers),
        user_agent: header_string(&headers, "user-agent"),
        referer: header_string(&headers, "referer"),
    };

    match state.mailer().send_contact_notification(&contact).await {
        Ok(()) => success(wants_json),
        Err(err) => {
            error!("Failed to send contact notification: {err:#}");
            if wants_json {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Failed to submit contact form" })),
                )
                    .into_response()
            } else {
                redirect_to_form("error", "Failed to send message")
            }
        }
    }
}

fn success(wants_json: bool) -> Response {
    if wants_json {
        Json(json!({ "status": "ok" })).into_response()
    } else {
        redirect_to_form("success", "Message sent")
    }
}

fn validation_failure(wants_json: bool, errors: Vec<String>) -> Response {
    if wants_json {
        (StatusCode::BAD_REQUEST, Json(json!({ "errors": errors }))).into_response()
    } else {
        redirect_to_form("error", &errors.join(", "))
    }
}

fn redirect_to_form(key: &str, value: &str) -> Response {
    let query: String = url::form_urlencoded::Serializer::new(String::new())
        .append_pair(key, value)
        .finish();
    Redirect::to(&format!("/?{query}#contact-form")).into_response()
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}
