//! User-facing failure kinds for the admin login flow.
//!
//! Every collaborator failure is converted to one of these at the operation
//! boundary; nothing propagates past the handlers as a raw error. The display
//! strings are the exact messages shown to the user, so they stay generic and
//! never leak which factor failed.

use thiserror::Error;

#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum AuthError {
    /// Missing or mismatched anti-forgery token, or malformed identity.
    #[error("Invalid request.")]
    InvalidRequest,
    /// Too many login attempts inside the trailing window.
    #[error("Too many login attempts. Try again later.")]
    RateLimited,
    /// Password mismatch or unknown account.
    #[error("Invalid email or password.")]
    InvalidCredentials,
    /// One-time code submitted at or past its expiry.
    #[error("Code expired. Please request a new one.")]
    CodeExpired,
    /// One-time code did not match; the session stays in the code-entry stage.
    #[error("Invalid code. Please try again.")]
    CodeMismatch,
    /// Too many bad codes; the login must restart from the password step.
    #[error("Too many invalid codes. Please sign in again.")]
    CodeLockout,
    /// The mail collaborator could not deliver the code.
    #[error("We could not send your verification code. Please try again.")]
    Dispatch,
    /// Resend requested before the cooldown elapsed.
    #[error("Please wait a minute before requesting a new code.")]
    ResendThrottled,
}
