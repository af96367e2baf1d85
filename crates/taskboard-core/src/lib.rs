//! taskboard-core library.
//!
//! Shared domain model plus the client side of taskboard: the comment tree
//! reconciler, the query cache, and the optimistic mutation executor that
//! drives writes against a [`backend::Backend`].
//!
//! # Conventions
//!
//! - **Errors**: typed `thiserror` enums at the backend/mutation seams,
//!   `anyhow::Result` for configuration loading.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod backend;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod model;
pub mod mutation;
pub mod reconcile;
