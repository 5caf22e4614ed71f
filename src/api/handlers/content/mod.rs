//! Public content endpoints and the admin content views.
//!
//! Every read path follows the same shape: try the primary store, read the
//! legacy fallback file independently, merge per the policy in `resolve`, and
//! degrade to empty lists or defaults rather than failing the request.

pub mod images;
pub mod records;
pub mod resolve;
pub mod settings;
pub(crate) mod store;

use axum::{
    extract::Extension,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use super::auth::require_admin;
use crate::api::state::AppState;
use records::{Facility, Testimonial};
use resolve::{merge_sources, Resolved};
use settings::SiteStats;

const FEATURED_LIMIT: usize = 5;

async fn resolve_facilities(pool: &PgPool, state: &AppState) -> Resolved<Facility> {
    let primary = store::list_facilities(pool).await;
    if let Err(err) = &primary {
        warn!("Facilities primary read failed, will use the fallback file: {err:#}");
    }
    let path = state.config().data_dir().join("facilities.json");
    let fallback = store::read_fallback(&path)
        .await
        .map(|values| values.iter().filter_map(Facility::from_value).collect());
    if let Err(err) = &fallback {
        warn!("Facilities fallback read failed: {err:#}");
    }
    merge_sources(primary, fallback)
}

async fn resolve_testimonials(pool: &PgPool, state: &AppState) -> Resolved<Testimonial> {
    let primary = store::list_testimonials(pool).await;
    if let Err(err) = &primary {
        warn!("Testimonials primary read failed, will use the fallback file: {err:#}");
    }
    let path = state.config().data_dir().join("testimonials.json");
    let fallback = store::read_fallback(&path)
        .await
        .map(|values| values.iter().filter_map(Testimonial::from_value).collect());
    if let Err(err) = &fallback {
        warn!("Testimonials fallback read failed: {err:#}");
    }
    merge_sources(primary, fallback)
}

#[utoipa::path(
    get,
    path = "/api/facilities",
    responses(
        (status = 200, description = "Facilities with resolved image URLs; empty when no data exists", body = [Facility])
    ),
    tag = "content"
)]
pub async fn facilities(pool: Extension<PgPool>, state: Extension<Arc<AppState>>) -> Response {
    let resolved = resolve_facilities(&pool, &state).await;
    let mut records = resolved.records;
    for record in &mut records {
        record.image_url = state.images().resolve(record.image_url.as_deref()).await;
    }
    Json(records).into_response()
}

#[utoipa::path(
    get,
    path = "/api/testimonials",
    responses(
        (status = 200, description = "All testimonials, newest first; empty when no data exists", body = [Testimonial])
    ),
    tag = "content"
)]
pub async fn testimonials(pool: Extension<PgPool>, state: Extension<Arc<AppState>>) -> Response {
    let resolved = resolve_testimonials(&pool, &state).await;
    Json(resolved.records).into_response()
}

#[utoipa::path(
    get,
    path = "/api/testimonials/featured",
    responses(
        (status = 200, description = "Up to five featured testimonials, newest first", body = [Testimonial])
    ),
    tag = "content"
)]
pub async fn featured_testimonials(
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
) -> Response {
    let resolved = resolve_testimonials(&pool, &state).await;
    let featured: Vec<Testimonial> = resolved
        .records
        .into_iter()
        .filter(|testimonial| testimonial.is_featured)
        .take(FEATURED_LIMIT)
        .collect();
    Json(featured).into_response()
}

#[utoipa::path(
    get,
    path = "/api/site-stats",
    responses(
        (status = 200, description = "Public site statistics; defaults when the store is unavailable", body = SiteStats)
    ),
    tag = "content"
)]
pub async fn site_stats(pool: Extension<PgPool>) -> Json<SiteStats> {
    match store::settings_category(&pool, "site_stats").await {
        Ok(Some(value)) => Json(serde_json::from_value(value).unwrap_or_default()),
        Ok(None) => Json(SiteStats::default()),
        Err(err) => {
            // Public stats must never fail the page.
            warn!("Site stats lookup failed, serving defaults: {err:#}");
            Json(SiteStats::default())
        }
    }
}

/// Collection size with a fetch-all-length fallback when COUNT fails.
#[derive(Debug, Serialize)]
struct CountDiagnostics {
    value: i64,
    fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn facilities_count(pool: &PgPool) -> CountDiagnostics {
    match store::count_facilities(pool).await {
        Ok(value) => CountDiagnostics {
            value,
            fallback: false,
            error: None,
        },
        Err(err) => {
            warn!("Facility count failed, falling back to a full fetch: {err:#}");
            match store::list_facilities(pool).await {
                Ok(all) => CountDiagnostics {
                    value: all.len() as i64,
                    fallback: true,
                    error: Some(format!("{err:#}")),
                },
                Err(inner) => CountDiagnostics {
                    value: 0,
                    fallback: true,
                    error: Some(format!("{err:#} | fallback failed: {inner:#}")),
                },
            }
        }
    }
}

async fn testimonials_count(pool: &PgPool) -> CountDiagnostics {
    match store::count_testimonials(pool).await {
        Ok(value) => CountDiagnostics {
            value,
            fallback: false,
            error: None,
        },
        Err(err) => {
            warn!("Testimonial count failed, falling back to a full fetch: {err:#}");
            match store::list_testimonials(pool).await {
                Ok(all) => CountDiagnostics {
                    value: all.len() as i64,
                    fallback: true,
                    error: Some(format!("{err:#}")),
                },
                Err(inner) => CountDiagnostics {
                    value: 0,
                    fallback: true,
                    error: Some(format!("{err:#} | fallback failed: {inner:#}")),
                },
            }
        }
    }
}

#[utoipa::path(
    get,
    path = "/admin/dashboard",
    responses(
        (status = 200, description = "Dashboard counts with per-collection diagnostics"),
        (status = 303, description = "Redirect to login without an authenticated session")
    ),
    tag = "admin"
)]
pub async fn dashboard(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
) -> Response {
    if let Err(redirect) = require_admin(&headers, &state).await {
        return redirect;
    }

    let facilities = facilities_count(&pool).await;
    let testimonials = testimonials_count(&pool).await;

    Json(json!({
        "stats": {
            "totalFacilities": facilities.value,
            "totalTestimonials": testimonials.value,
            "websiteVisitors": 156,
            "contactForms": 24,
        },
        "diagnostics": {
            "facilities": facilities,
            "testimonials": testimonials,
        },
    }))
    .into_response()
}

#[utoipa::path(
    get,
    path = "/admin/facilities",
    responses(
        (status = 200, description = "Facilities with merge diagnostics; partial data plus an error banner when the store is down"),
        (status = 303, description = "Redirect to login without an authenticated session")
    ),
    tag = "admin"
)]
pub async fn admin_facilities(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
) -> Response {
    if let Err(redirect) = require_admin(&headers, &state).await {
        return redirect;
    }

    let resolved = resolve_facilities(&pool, &state).await;
    let mut body = json!({
        "facilities": resolved.records,
        "diagnostics": { "db": resolved.primary, "file": resolved.fallback },
    });
    if !resolved.primary.ok {
        body["error"] = json!("Error loading facilities");
    }
    Json(body).into_response()
}

#[utoipa::path(
    get,
    path = "/admin/testimonials",
    responses(
        (status = 200, description = "Testimonials with merge diagnostics; partial data plus an error banner when the store is down"),
        (status = 303, description = "Redirect to login without an authenticated session")
    ),
    tag = "admin"
)]
pub async fn admin_testimonials(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
) -> Response {
    if let Err(redirect) = require_admin(&headers, &state).await {
        return redirect;
    }

    let resolved = resolve_testimonials(&pool, &state).await;
    let mut body = json!({
        "testimonials": resolved.records,
        "diagnostics": { "db": resolved.primary, "file": resolved.fallback },
    });
    if !resolved.primary.ok {
        body["error"] = json!("Error loading testimonials");
    }
    Json(body).into_response()
}

#[utoipa::path(
    get,
    path = "/admin/settings",
    responses(
        (status = 200, description = "Settings categories merged over defaults; defaults plus an error banner when the store is down"),
        (status = 303, description = "Redirect to login without an authenticated session")
    ),
    tag = "admin"
)]
pub async fn admin_settings(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
) -> Response {
    if let Err(redirect) = require_admin(&headers, &state).await {
        return redirect;
    }

    match store::all_settings(&pool).await {
        Ok(categories) => {
            let stored: HashMap<String, serde_json::Value> = categories.into_iter().collect();
            Json(json!({
                "settings": {
                    "seo": settings::merge_category(settings::default_seo(), stored.get("seo")),
                    "system": settings::merge_category(settings::default_system(), stored.get("system")),
                    "site_stats": settings::merge_category(
                        settings::default_site_stats(),
                        stored.get("site_stats"),
                    ),
                },
            }))
            .into_response()
        }
        Err(err) => {
            warn!("Settings lookup failed, rendering defaults: {err:#}");
            Json(json!({
                "settings": {
                    "seo": settings::default_seo(),
                    "system": settings::default_system(),
                    "site_stats": settings::default_site_stats(),
                },
                "error": "Error loading settings",
            }))
            .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::email::{EmailSender, Mailer, OutboundEmail};
    use crate::api::handlers::auth::identity::{AdminUser, IdentityError, IdentityProvider};
    use crate::api::handlers::auth::machine::LoginSession;
    use crate::api::handlers::auth::session::{
        generate_session_id, MemorySessionStore, SessionStore,
    };
    use crate::api::state::SiteConfig;
    use super::images::ImageResolver;
    use anyhow::Result;
    use async_trait::async_trait;
    use axum::http::header::{COOKIE, LOCATION};
    use axum::http::StatusCode;
    use sqlx::postgres::PgPoolOptions;
    use std::path::PathBuf;
    use std::time::{Duration, Instant};

    struct RejectProvider;

    #[async_trait]
    impl IdentityProvider for RejectProvider {
        async fn verify_password(
            &self,
            _email: &str,
            _secret: &str,
        ) -> Result<AdminUser, IdentityError> {
            Err(IdentityError::InvalidCredentials)
        }
    }

    struct NullSender;

    #[async_trait]
    impl EmailSender for NullSender {
        async fn send(&self, _message: &OutboundEmail) -> Result<()> {
            Ok(())
        }

        fn name(&self) -> &'static str {
            "null"
        }
    }

    fn failing_pool() -> PgPool {
        PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(250))
            .connect_lazy("postgres://jollysite@127.0.0.1:1/jollysite")
            .expect("lazy pool")
    }

    fn scratch_data_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "jollysite-content-test-{}-{name}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).expect("data dir");
        dir
    }

    struct Harness {
        state: Arc<AppState>,
        sessions: Arc<MemorySessionStore>,
    }

    fn harness(data_dir: PathBuf) -> Harness {
        let sessions = Arc::new(MemorySessionStore::new(Duration::from_secs(60 * 60)));
        let config = SiteConfig::new("http://localhost:8080".to_string()).with_data_dir(data_dir);
        let images = ImageResolver::new(
            "http://localhost:8080".to_string(),
            PathBuf::from("."),
            PathBuf::from("public"),
            None,
        );
        let mailer = Mailer::new(Arc::new(NullSender), "Brand".to_string());
        let state = Arc::new(AppState::new(
            config,
            sessions.clone(),
            Arc::new(RejectProvider),
            mailer,
            images,
        ));
        Harness { state, sessions }
    }

    async fn authenticated_cookie(harness: &Harness) -> HeaderMap {
        let id = generate_session_id();
        let now = Instant::now();
        let mut session = LoginSession::new();
        let code = session.password_verified(now, "admin@jollychildren.edu");
        let token = session.issue_csrf_token().expect("csrf");
        session.verify_code(now, &token, &code).expect("verified");
        harness.sessions.save(&id, session).await;

        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            format!("jollysite_session={id}").parse().expect("cookie"),
        );
        headers
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&body).expect("json")
    }

    #[tokio::test]
    async fn site_stats_serves_the_literal_defaults_when_the_store_is_down() {
        let response = site_stats(Extension(failing_pool())).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let value = json_body(response).await;
        assert_eq!(
            value,
            json!({
                "totalStudents": 450,
                "totalStaff": 48,
                "totalClubsTeams": 15,
                "yearsOfJoy": 12,
            })
        );
    }

    #[tokio::test]
    async fn facilities_fall_back_to_the_legacy_file_when_the_store_is_down() {
        let data_dir = scratch_data_dir("facilities-fallback");
        std::fs::write(
            data_dir.join("facilities.json"),
            r#"[{"id": "5", "title": "C", "createdAt": "2022-01-01"}]"#,
        )
        .expect("fallback file");
        let harness = harness(data_dir);

        let response = facilities(Extension(failing_pool()), Extension(harness.state.clone())).await;
        assert_eq!(response.status(), StatusCode::OK);
        let value = json_body(response).await;
        let records = value.as_array().expect("array");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("id").and_then(|v| v.as_str()), Some("5"));
        assert_eq!(records[0].get("title").and_then(|v| v.as_str()), Some("C"));
    }

    #[tokio::test]
    async fn facilities_with_no_sources_are_an_empty_list_not_an_error() {
        let harness = harness(scratch_data_dir("facilities-empty"));
        let response = facilities(Extension(failing_pool()), Extension(harness.state.clone())).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!([]));
    }

    #[tokio::test]
    async fn featured_testimonials_filter_and_cap_at_five() {
        let data_dir = scratch_data_dir("featured");
        let mut records = Vec::new();
        for i in 0..7 {
            records.push(json!({
                "id": i.to_string(),
                "content": format!("Testimonial {i}"),
                "is_featured": i != 3,
            }));
        }
        std::fs::write(
            data_dir.join("testimonials.json"),
            serde_json::to_string(&records).expect("json"),
        )
        .expect("fallback file");
        let harness = harness(data_dir);

        let response =
            featured_testimonials(Extension(failing_pool()), Extension(harness.state.clone()))
                .await;
        let value = json_body(response).await;
        let records = value.as_array().expect("array");
        assert_eq!(records.len(), 5);
        assert!(records
            .iter()
            .all(|record| record.get("isFeatured") == Some(&json!(true))));
    }

    #[tokio::test]
    async fn admin_views_redirect_anonymous_visitors_to_login() {
        let harness = harness(scratch_data_dir("admin-anonymous"));
        let response = dashboard(
            HeaderMap::new(),
            Extension(failing_pool()),
            Extension(harness.state.clone()),
        )
        .await;
        assert_eq!(
            response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok()),
            Some("/admin/login")
        );
    }

    #[tokio::test]
    async fn dashboard_renders_zeros_when_everything_is_down() {
        let harness = harness(scratch_data_dir("dashboard-down"));
        let headers = authenticated_cookie(&harness).await;

        let response = dashboard(
            headers,
            Extension(failing_pool()),
            Extension(harness.state.clone()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let value = json_body(response).await;
        assert_eq!(
            value.pointer("/stats/totalFacilities"),
            Some(&json!(0))
        );
        assert_eq!(
            value.pointer("/diagnostics/facilities/fallback"),
            Some(&json!(true))
        );
    }

    #[tokio::test]
    async fn admin_facilities_degrade_with_an_error_banner() {
        let data_dir = scratch_data_dir("admin-facilities");
        std::fs::write(
            data_dir.join("facilities.json"),
            r#"[{"id": "1", "title": "A"}]"#,
        )
        .expect("fallback file");
        let harness = harness(data_dir);
        let headers = authenticated_cookie(&harness).await;

        let response = admin_facilities(
            headers,
            Extension(failing_pool()),
            Extension(harness.state.clone()),
        )
        .await;
        let value = json_body(response).await;
        assert_eq!(
            value.get("error").and_then(|v| v.as_str()),
            Some("Error loading facilities")
        );
        assert_eq!(
            value
                .pointer("/facilities/0/title")
                .and_then(|v| v.as_str()),
            Some("A")
        );
        assert_eq!(value.pointer("/diagnostics/db/ok"), Some(&json!(false)));
    }

    #[tokio::test]
    async fn admin_settings_render_defaults_with_an_error_banner_when_down() {
        let harness = harness(scratch_data_dir("admin-settings"));
        let headers = authenticated_cookie(&harness).await;

        let response = admin_settings(
            headers,
            Extension(failing_pool()),
            Extension(harness.state.clone()),
        )
        .await;
        let value = json_body(response).await;
        assert_eq!(
            value.get("error").and_then(|v| v.as_str()),
            Some("Error loading settings")
        );
        assert_eq!(
            value.pointer("/settings/site_stats/totalStudents"),
            Some(&json!(450))
        );
        assert_eq!(
            value.pointer("/settings/system/maxFileSize"),
            Some(&json!(5))
        );
    }
}
