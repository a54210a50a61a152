mod password;
mod tokens;

pub use password::{hash_password, verify_password, MIN_PASSWORD_LEN};
pub use tokens::{bearer_token, AuthError, TokenService};
