//! Admin login state machine.
//!
//! A login advances `None → PasswordOk → Authenticated`. The password stage is
//! confirmed by the identity provider; the code stage by an emailed 6-digit
//! one-time code. Lockout or an expiry-triggered restart drops the session
//! back to `None`. All methods take the current instant so the transitions
//! stay deterministic under test; collaborator calls (credential check, mail
//! dispatch) belong to the handlers.

use anyhow::Result;
use std::time::{Duration, Instant};

use super::error::AuthError;
use super::rate_limit::AttemptWindow;
use super::utils::{constant_time_eq, generate_csrf_token, generate_login_code, valid_email};

/// One-time codes are valid for ten minutes from issuance.
pub(crate) const CODE_TTL: Duration = Duration::from_secs(10 * 60);

/// Minimum delay between two code dispatches for the same session.
pub(crate) const RESEND_COOLDOWN: Duration = Duration::from_secs(60);

/// Bad codes tolerated before the login must restart from the password step.
pub(crate) const CODE_ATTEMPT_LIMIT: u32 = 5;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AuthStage {
    None,
    PasswordOk,
    Authenticated,
}

/// Per-browser-session login state, persisted by the session store.
///
/// Invariants: `pending_identity` and `one_time_code` are both present or
/// both absent; `failed_code_attempts` only moves while the stage is
/// `PasswordOk`; `Authenticated` is only reachable through a code match.
#[derive(Clone, Debug)]
pub struct LoginSession {
    stage: AuthStage,
    pending_identity: Option<String>,
    one_time_code: Option<String>,
    code_expires_at: Option<Instant>,
    code_sent_at: Option<Instant>,
    failed_code_attempts: u32,
    login_attempts: AttemptWindow,
    csrf_token: Option<String>,
    identity: Option<String>,
}

impl Default for LoginSession {
    fn default() -> Self {
        Self::new()
    }
}

impl LoginSession {
    #[must_use]
    pub fn new() -> Self {
        Self {
            stage: AuthStage::None,
            pending_identity: None,
            one_time_code: None,
            code_expires_at: None,
            code_sent_at: None,
            failed_code_attempts: 0,
            login_attempts: AttemptWindow::default(),
            csrf_token: None,
            identity: None,
        }
    }

    #[must_use]
    pub fn stage(&self) -> AuthStage {
        self.stage
    }

    /// Email awaiting second-factor confirmation, present only in `PasswordOk`.
    #[must_use]
    pub fn pending_identity(&self) -> Option<&str> {
        self.pending_identity.as_deref()
    }

    /// Email of the fully authenticated user.
    #[must_use]
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Issue a fresh anti-forgery token, replacing any previous one.
    pub fn issue_csrf_token(&mut self) -> Result<String> {
        let token = generate_csrf_token()?;
        self.csrf_token = Some(token.clone());
        Ok(token)
    }

    /// Consume the stored token on a successful match. A matched token never
    /// authorizes a second request; a mismatch leaves the stored token alone.
    fn consume_csrf(&mut self, submitted: &str) -> bool {
        let Some(expected) = self.csrf_token.as_deref() else {
            return false;
        };
        if constant_time_eq(submitted, expected) {
            self.csrf_token = None;
            true
        } else {
            false
        }
    }

    /// Preconditions for the password step.
    ///
    /// Token mismatch fails closed without recording an attempt; every other
    /// rejection records one. Callers must not consult the credential store
    /// unless this returns `Ok`.
    pub fn begin_login(
        &mut self,
        now: Instant,
        csrf: &str,
        identity: &str,
        secret: &str,
    ) -> Result<(), AuthError> {
        if !self.consume_csrf(csrf) {
            return Err(AuthError::InvalidRequest);
        }
        if self.login_attempts.limited(now) {
            self.login_attempts.record(now);
            return Err(AuthError::RateLimited);
        }
        if identity.trim().is_empty() || secret.is_empty() {
            self.login_attempts.record(now);
            return Err(AuthError::InvalidRequest);
        }
        if !valid_email(&identity.trim().to_lowercase()) {
            self.login_attempts.record(now);
            return Err(AuthError::InvalidRequest);
        }
        Ok(())
    }

    /// Count a failed credential check against the trailing window.
    pub fn record_failed_login(&mut self, now: Instant) {
        self.login_attempts.record(now);
    }

    /// The identity provider accepted the password: stage the second factor.
    ///
    /// Returns the freshly generated one-time code for dispatch. The stage is
    /// `PasswordOk` from here on even if dispatch fails; only a code match
    /// moves it further.
    pub fn password_verified(&mut self, now: Instant, identity: &str) -> String {
        let code = generate_login_code();
        self.stage = AuthStage::PasswordOk;
        self.pending_identity = Some(identity.to_string());
        self.identity = None;
        self.login_attempts.clear();
        self.one_time_code = Some(code.clone());
        self.code_expires_at = Some(now + CODE_TTL);
        self.code_sent_at = Some(now);
        self.failed_code_attempts = 0;
        code
    }

    /// Check a submitted one-time code.
    ///
    /// Expired codes do not count against the attempt budget. Mismatches do,
    /// and the fifth in a row wipes the staged login. A match returns the
    /// confirmed identity and clears all one-time-code state.
    pub fn verify_code(
        &mut self,
        now: Instant,
        csrf: &str,
        submitted: &str,
    ) -> Result<String, AuthError> {
        if self.stage != AuthStage::PasswordOk || self.pending_identity.is_none() {
            return Err(AuthError::InvalidRequest);
        }
        if !self.consume_csrf(csrf) {
            return Err(AuthError::InvalidRequest);
        }

        let expired = match (self.one_time_code.as_deref(), self.code_expires_at) {
            (Some(_), Some(expires_at)) => now >= expires_at,
            _ => true,
        };
        if expired {
            return Err(AuthError::CodeExpired);
        }

        let expected = self.one_time_code.clone().unwrap_or_default();
        if !constant_time_eq(submitted.trim(), &expected) {
            self.failed_code_attempts += 1;
            if self.failed_code_attempts >= CODE_ATTEMPT_LIMIT {
                self.restart();
                return Err(AuthError::CodeLockout);
            }
            return Err(AuthError::CodeMismatch);
        }

        let Some(identity) = self.pending_identity.take() else {
            return Err(AuthError::InvalidRequest);
        };
        self.stage = AuthStage::Authenticated;
        self.identity = Some(identity.clone());
        self.one_time_code = None;
        self.code_expires_at = None;
        self.code_sent_at = None;
        self.failed_code_attempts = 0;
        Ok(identity)
    }

    /// Issue a replacement code, subject to the resend cooldown.
    ///
    /// Returns the new code for dispatch. Dispatch failures downstream leave
    /// the stage untouched; the freshly staged code simply goes unused.
    pub fn resend_code(&mut self, now: Instant) -> Result<String, AuthError> {
        if self.stage != AuthStage::PasswordOk || self.pending_identity.is_none() {
            return Err(AuthError::InvalidRequest);
        }
        if let Some(sent_at) = self.code_sent_at {
            if now.saturating_duration_since(sent_at) < RESEND_COOLDOWN {
                return Err(AuthError::ResendThrottled);
            }
        }
        let code = generate_login_code();
        self.one_time_code = Some(code.clone());
        self.code_expires_at = Some(now + CODE_TTL);
        self.code_sent_at = Some(now);
        Ok(code)
    }

    /// Drop back to the password step, wiping all staged second-factor state.
    fn restart(&mut self) {
        self.stage = AuthStage::None;
        self.pending_identity = None;
        self.one_time_code = None;
        self.code_expires_at = None;
        self.code_sent_at = None;
        self.failed_code_attempts = 0;
    }

    #[cfg(test)]
    pub(crate) fn one_time_code(&self) -> Option<&str> {
        self.one_time_code.as_deref()
    }

    #[cfg(test)]
    pub(crate) fn code_expires_at(&self) -> Option<Instant> {
        self.code_expires_at
    }

    #[cfg(test)]
    pub(crate) fn failed_code_attempts(&self) -> u32 {
        self.failed_code_attempts
    }
}
