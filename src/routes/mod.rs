mod admin;
pub mod auth;
mod health;
mod profile;

pub use admin::set_user_active;
pub use auth::{login, refresh, register};
pub use health::{health_check, metrics};
pub use profile::{change_password, get_profile, update_profile};
