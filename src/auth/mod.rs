mod hash;
mod helpers;
mod middleware;
mod session;

pub use hash::SecretHasher;
pub use helpers::{SessionValidationError, ValidatedSession, extract_session_token, validate_session};
pub use middleware::{
    AuthError, RequireAdmin, RequireAuth, RequireStoreManager, RequireStoreOwner, require_role,
};
pub use session::{
    IssuedToken, SESSION_COOKIE, clear_session_cookie, generate_token, parse_token,
    session_cookie, token_from_cookie_header,
};
