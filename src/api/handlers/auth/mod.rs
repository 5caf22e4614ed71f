//! Admin login endpoints: password step, emailed one-time code, resend,
//! and logout.
//!
//! Flow overview:
//! 1) `POST /admin/login` checks the anti-forgery token, the trailing-window
//!    attempt budget, and the password (identity provider). Success stages a
//!    6-digit code and emails it.
//! 2) `GET/POST /admin/mfa` verify the code; five bad codes force a restart
//!    from the password step.
//! 3) `POST /admin/mfa/resend` issues a fresh code, throttled to one per
//!    minute.
//!
//! The session record is the only state; it is loaded by cookie, mutated by
//! the state machine in `machine`, and written back before responding.

pub mod error;
pub mod identity;
pub mod machine;
pub(crate) mod rate_limit;
pub mod session;
pub mod types;
pub(crate) mod utils;

use axum::{
    extract::{Extension, Query},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::api::state::AppState;
use error::AuthError;
use identity::IdentityError;
use machine::{AuthStage, LoginSession};
use session::{clear_session_cookie, extract_session_id, generate_session_id, session_cookie};
use types::{CsrfResponse, LoginForm, MfaForm, PageQuery};
use utils::normalize_email;

/// Load the session named by the request cookie, or start a fresh one.
async fn establish_session(headers: &HeaderMap, state: &AppState) -> (String, LoginSession, bool) {
    if let Some(id) = extract_session_id(headers) {
        if let Some(session) = state.sessions().load(&id).await {
            return (id, session, false);
        }
    }
    (generate_session_id(), LoginSession::new(), true)
}

fn attach_session_cookie(
    mut response: Response,
    state: &AppState,
    id: &str,
    created: bool,
) -> Response {
    if !created {
        return response;
    }
    match session_cookie(
        id,
        state.config().session_ttl_seconds(),
        state.config().session_cookie_secure(),
    ) {
        Ok(cookie) => {
            response.headers_mut().append(SET_COOKIE, cookie);
            response
        }
        Err(err) => {
            error!("Failed to build session cookie: {err}");
            response
        }
    }
}

fn redirect_with_error(path: &str, err: &AuthError) -> Response {
    let query: String = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("error", &err.to_string())
        .finish();
    Redirect::to(&format!("{path}?{query}")).into_response()
}

/// Gate for the admin pages; anything short of a fully confirmed session
/// bounces to the login view.
pub(crate) async fn require_admin(
    headers: &HeaderMap,
    state: &AppState,
) -> Result<LoginSession, Response> {
    let Some(id) = extract_session_id(headers) else {
        return Err(Redirect::to("/admin/login").into_response());
    };
    match state.sessions().load(&id).await {
        Some(session) if session.stage() == AuthStage::Authenticated => Ok(session),
        _ => Err(Redirect::to("/admin/login").into_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/login",
    responses(
        (status = 200, description = "Login view data with a fresh anti-forgery token", body = CsrfResponse)
    ),
    tag = "auth"
)]
pub async fn login_page(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    query: Query<PageQuery>,
) -> Response {
    let (id, mut session, created) = establish_session(&headers, &state).await;
    let token = match session.issue_csrf_token() {
        Ok(token) => token,
        Err(err) => {
            error!("Failed to issue csrf token: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    state.sessions().save(&id, session).await;

    let response = Json(CsrfResponse {
        csrf_token: token,
        error: query.error.clone(),
    })
    .into_response();
    attach_session_cookie(response, &state, &id, created)
}

#[utoipa::path(
    post,
    path = "/admin/login",
    responses(
        (status = 303, description = "Redirect to the code-entry step, or back to login with an error")
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    payload: Option<Form<LoginForm>>,
) -> Response {
    let Some(Form(form)) = payload else {
        return redirect_with_error("/admin/login", &AuthError::InvalidRequest);
    };
    let (id, mut session, created) = establish_session(&headers, &state).await;
    let now = Instant::now();

    if let Err(err) = session.begin_login(now, &form.csrf_token, &form.email, &form.password) {
        state.sessions().save(&id, session).await;
        warn!(
            client_ip = ?utils::extract_client_ip(&headers),
            "Login rejected before credential check: {err}"
        );
        let response = redirect_with_error("/admin/login", &err);
        return attach_session_cookie(response, &state, &id, created);
    }

    let email = normalize_email(&form.email);
    match state.identity().verify_password(&email, &form.password).await {
        Ok(user) => {
            // Stage the second factor; the password alone never signs in.
            let code = session.password_verified(now, &user.email);
            let dispatch = state.mailer().send_login_code(&user.email, &code).await;
            state.sessions().save(&id, session).await;
            let response = match dispatch {
                Ok(()) => {
                    info!(email = %user.email, "Password verified, one-time code dispatched");
                    Redirect::to("/admin/mfa").into_response()
                }
                Err(err) => {
                    error!("Failed to send one-time code: {err:#}");
                    redirect_with_error("/admin/login", &AuthError::Dispatch)
                }
            };
            attach_session_cookie(response, &state, &id, created)
        }
        Err(IdentityError::InvalidCredentials) => {
            session.record_failed_login(now);
            state.sessions().save(&id, session).await;
            warn!(email = %email, "Login failed: invalid credentials");
            let response = redirect_with_error("/admin/login", &AuthError::InvalidCredentials);
            attach_session_cookie(response, &state, &id, created)
        }
        Err(IdentityError::Unavailable(err)) => {
            // The store being down must look no different from a bad password.
            session.record_failed_login(now);
            state.sessions().save(&id, session).await;
            error!("Credential store unavailable: {err:#}");
            let response = redirect_with_error("/admin/login", &AuthError::InvalidCredentials);
            attach_session_cookie(response, &state, &id, created)
        }
    }
}

#[utoipa::path(
    get,
    path = "/admin/mfa",
    responses(
        (status = 200, description = "Code-entry view data with a fresh anti-forgery token", body = CsrfResponse),
        (status = 303, description = "Redirect to login when the password step has not completed")
    ),
    tag = "auth"
)]
pub async fn mfa_page(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    query: Query<PageQuery>,
) -> Response {
    let (id, mut session, created) = establish_session(&headers, &state).await;
    if session.stage() != AuthStage::PasswordOk {
        return Redirect::to("/admin/login").into_response();
    }
    let token = match session.issue_csrf_token() {
        Ok(token) => token,
        Err(err) => {
            error!("Failed to issue csrf token: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    state.sessions().save(&id, session).await;

    let response = Json(CsrfResponse {
        csrf_token: token,
        error: query.error.clone(),
    })
    .into_response();
    attach_session_cookie(response, &state, &id, created)
}

#[utoipa::path(
    post,
    path = "/admin/mfa",
    responses(
        (status = 303, description = "Redirect to the dashboard on a code match, back to code entry on a miss, or to login on lockout")
    ),
    tag = "auth"
)]
pub async fn mfa_verify(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    payload: Option<Form<MfaForm>>,
) -> Response {
    let Some(id) = extract_session_id(&headers) else {
        return Redirect::to("/admin/login").into_response();
    };
    let Some(mut session) = state.sessions().load(&id).await else {
        return Redirect::to("/admin/login").into_response();
    };
    if session.stage() != AuthStage::PasswordOk {
        return Redirect::to("/admin/login").into_response();
    }
    let Some(Form(form)) = payload else {
        return redirect_with_error("/admin/mfa", &AuthError::InvalidRequest);
    };

    match session.verify_code(Instant::now(), &form.csrf_token, &form.code) {
        Ok(email) => {
            state.sessions().save(&id, session).await;
            info!(email = %email, "Admin signed in");
            Redirect::to("/admin/dashboard").into_response()
        }
        Err(err @ AuthError::CodeLockout) => {
            state.sessions().save(&id, session).await;
            warn!("One-time code lockout, login restarted");
            redirect_with_error("/admin/login", &err)
        }
        Err(err) => {
            state.sessions().save(&id, session).await;
            redirect_with_error("/admin/mfa", &err)
        }
    }
}

#[utoipa::path(
    post,
    path = "/admin/mfa/resend",
    responses(
        (status = 303, description = "Redirect back to code entry; an error message is attached when throttled or dispatch fails")
    ),
    tag = "auth"
)]
pub async fn mfa_resend(headers: HeaderMap, state: Extension<Arc<AppState>>) -> Response {
    let Some(id) = extract_session_id(&headers) else {
        return Redirect::to("/admin/login").into_response();
    };
    let Some(mut session) = state.sessions().load(&id).await else {
        return Redirect::to("/admin/login").into_response();
    };
    if session.stage() != AuthStage::PasswordOk {
        return Redirect::to("/admin/login").into_response();
    }

    match session.resend_code(Instant::now()) {
        Ok(code) => {
            let Some(to) = session.pending_identity().map(str::to_string) else {
                return Redirect::to("/admin/login").into_response();
            };
            let dispatch = state.mailer().send_login_code(&to, &code).await;
            state.sessions().save(&id, session).await;
            match dispatch {
                Ok(()) => Redirect::to("/admin/mfa").into_response(),
                Err(err) => {
                    error!("Failed to resend one-time code: {err:#}");
                    redirect_with_error("/admin/mfa", &AuthError::Dispatch)
                }
            }
        }
        Err(err) => {
            state.sessions().save(&id, session).await;
            redirect_with_error("/admin/mfa", &err)
        }
    }
}

#[utoipa::path(
    post,
    path = "/admin/logout",
    responses(
        (status = 303, description = "Session destroyed, cookie cleared, redirect to the public site")
    ),
    tag = "auth"
)]
pub async fn logout(headers: HeaderMap, state: Extension<Arc<AppState>>) -> Response {
    if let Some(id) = extract_session_id(&headers) {
        state.sessions().destroy(&id).await;
    }

    // Always clear the cookie, even if the session record was missing.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(state.config().session_cookie_secure()) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    (response_headers, Redirect::to("/")).into_response()
}
