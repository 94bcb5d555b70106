//! Read-only admin HTTP surface

pub mod routes;

pub use routes::{build_router, AppError};
