//! User accounts.
//!
//! Provides:
//! - User and group storage ([`users`])
//! - The password policy ([`password`])
//! - Login, logout and password change pages ([`routes`])
//! - The middleware that forces a pending password change ([`middleware`])

pub mod middleware;
pub mod password;
pub mod routes;
pub mod users;

pub use middleware::force_password_change;
pub use routes::accounts_router;
pub use users::{NewUser, User, UserEdit, UserFlags, UserStore};
