//! taskboard-store library.
//!
//! The authoritative CRUD service behind taskboard: a SQLite store with
//! ownership-checked operations on projects, tasks, threaded comments and
//! emoji reactions, plus [`LocalBackend`], which exposes the store through
//! the client's `Backend` contract so the mutation executor can run
//! in-process.
//!
//! # Conventions
//!
//! - **Errors**: service operations return [`ServiceError`]; opening and
//!   migrating the database uses `anyhow::Result`.
//! - **Logging**: `tracing` macros, `info!` for writes and `debug!` for
//!   lookups.

pub mod db;
pub mod error;
pub mod local;
pub mod service;

pub use error::ServiceError;
pub use local::LocalBackend;
pub use service::Store;
