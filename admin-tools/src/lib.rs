//! Admin tools platform library
//!
//! Login with a forced password change, a permission-gated tool dashboard,
//! a session viewer and a staff-only user admin. The binary entry point is
//! in main.rs.

pub mod accounts;
pub mod admin;
pub mod config;
pub mod db;
pub mod permissions;
pub mod server;
pub mod sessions;
mod sql;
pub mod state;
pub mod templates;
pub mod tools;
pub mod web;
