/// Authentication module
///
/// JWT generation/validation, password hashing, and refresh token
/// generation. Refresh token storage lives in the session cache.

mod claims;
mod jwt;
mod password;
mod refresh_token;

pub use claims::Claims;
pub use jwt::generate_access_token;
pub use jwt::validate_access_token;
pub use password::hash_password;
pub use password::validate_password_strength;
pub use password::verify_password;
pub use refresh_token::generate_refresh_token;
pub use refresh_token::hash_token;
