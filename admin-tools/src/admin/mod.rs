//! Staff-only user administration.
//!
//! Provides:
//! - The [`StaffUser`] extractor (login required, 403 for non-staff)
//! - User list, creation and editing, including tool group membership

pub mod middleware;
pub mod routes;
pub mod templates;

pub use middleware::StaffUser;
pub use routes::admin_router;
