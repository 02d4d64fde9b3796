//! Blocking client for the task-management REST API.
//!
//! # Overview
//! Builds `HttpRequest` values and parses `HttpResponse` values without
//! touching the network (host-does-IO pattern); `ApiClient` pairs those
//! builders with a `Transport` for callers that just want results.
//!
//! # Design
//! - `RequestCore` owns the base URL and the session store. It sets the JSON
//!   content type, injects `Authorization: Bearer <token>` when a token is
//!   stored, and maps every non-2xx response to `ApiError::Status`.
//! - `TaskClient` and `AuthClient` are the two resource facades; each
//!   operation is a `build_*` / `parse_*` pair.
//! - `SessionStore` abstracts where the token lives (memory or a file), so
//!   nothing depends on global state.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod request;
pub mod session;
pub mod tasks;
pub mod transport;
pub mod types;

pub use auth::AuthClient;
pub use client::ApiClient;
pub use config::ClientConfig;
pub use error::{ApiError, Result};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use request::RequestCore;
pub use session::{FileSessionStore, MemorySessionStore, SessionCookie, SessionStore};
pub use tasks::TaskClient;
pub use transport::{Transport, UreqTransport};
pub use types::{
    AuthResponse, CreateTask, Credentials, ListTasksQuery, Page, PatchTask, SessionState,
    SessionUser, Task, UpdateTask,
};
