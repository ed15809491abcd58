//! monday.com remote adapter.
//!
//! Implements [`model::SnapshotProvider`] and [`model::MutationProvider`]
//! against the monday.com GraphQL API. The core crates never see HTTP,
//! GraphQL, or the API's JSON encodings; they see only the port traits.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Request building, cursor pagination, multipart file
//! upload, error classification, and rate-limit back-off all live here.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`config`] | `MondayConfig` parsed from the environment |
//! | `client` | `MondayClient` and the port trait implementations |
//! | `error` | `MondayError` and response classification |
//! | `wire` | GraphQL documents, column-value encoding, response shapes |

mod client;
pub mod config;
mod error;
mod wire;

pub use client::MondayClient;
pub use config::MondayConfig;
pub use error::MondayError;
