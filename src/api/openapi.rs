use crate::api::handlers::{auth, contact, content, health};
use utoipa::openapi::{InfoBuilder, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    // Reuse the same router wiring and only return the generated OpenAPI spec.
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Add new endpoints here via `.routes(routes!(...))` so they are both served
/// and included in the generated `OpenAPI` spec.
/// Routes added outside (like `GET /` and `OPTIONS /health`) are
/// intentionally not documented.
pub(crate) fn api_router() -> OpenApiRouter {
    // `routes!` reads #[utoipa::path] to bind HTTP method + path and add the route to OpenAPI.
    let router = OpenApiRouter::with_openapi(cargo_openapi())
        .routes(routes!(health::health))
        .routes(routes!(content::facilities))
        .routes(routes!(content::testimonials))
        .routes(routes!(content::featured_testimonials))
        .routes(routes!(content::site_stats))
        .routes(routes!(contact::contact))
        .routes(routes!(auth::login_page, auth::login))
        .routes(routes!(auth::mfa_page, auth::mfa_verify))
        .routes(routes!(auth::mfa_resend))
        .routes(routes!(auth::logout))
        .routes(routes!(content::dashboard))
        .routes(routes!(content::admin_facilities))
        .routes(routes!(content::admin_testimonials))
        .routes(routes!(content::admin_settings));

    router
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    // Use Cargo.toml metadata instead of the utoipa-axum crate info defaults.
    let info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(Some(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    let mut content_tag = Tag::new("content");
    content_tag.description = Some("Public site content API".to_string());
    let mut auth_tag = Tag::new("auth");
    auth_tag.description = Some("Admin sign-in with an emailed one-time code".to_string());
    let mut admin_tag = Tag::new("admin");
    admin_tag.description = Some("Back-office views behind an authenticated session".to_string());

    OpenApiBuilder::new()
        .info(info)
        .tags(Some(vec![content_tag, auth_tag, admin_tag]))
        .build()
}
