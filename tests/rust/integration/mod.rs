//! Integration tests - explorer and HTTP backend with live tokio tasks
//!
//! The explorer runs against an in-memory backend or a mock; the HTTP backend
//! runs against an in-process axum app.

mod fake_backend;
mod http_backend_tests;
mod save_query_tests;
