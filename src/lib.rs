// Library exports so integration tests can exercise the workflow and
// resolution logic directly.

pub mod backend;
pub mod catalog;
pub mod config;
pub mod error;
pub mod extractors;
pub mod flash;
pub mod moderation;
pub mod routes;
pub mod session;
pub mod state;
pub mod users;
