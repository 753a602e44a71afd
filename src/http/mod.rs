//! HTTP surface

pub mod middleware;
pub mod routes;
pub mod sse;

pub use routes::build_router;
