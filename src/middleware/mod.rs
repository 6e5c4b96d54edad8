pub mod auth;
pub mod policy;

pub use auth::{authenticate_jwt, redacted_uri, CurrentUser};
pub use policy::{admin_required, ensure_correct_user_or_admin, ensure_logged_in, Decision, Denied, Policy};
