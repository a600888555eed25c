//! Durable storage for the keygate authentication gateway.
//!
//! This crate provides the [`StorageBackend`] trait and the typed stores the
//! gateway persists its state through: pending challenges and the signing
//! keypair.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   keygate-authn                             │
//! │   (authenticator, key store, token service, access gate)    │
//! ├──────────────────────────────┬──────────────────────────────┤
//! │        ChallengeStore        │    BackendSigningKeyStore    │
//! │   (TTL records, lazy expiry) │  (insert-if-absent keypair)  │
//! ├──────────────────────────────┴──────────────────────────────┤
//! │                    StorageBackend trait                     │
//! │  (get, set, compare_and_set, compare_and_delete, scan)      │
//! ├──────────────┬──────────────────────────────────────────────┤
//! │ MemoryBackend│                FileBackend                   │
//! │   (testing)  │        (one file per key under a root)       │
//! └──────────────┴──────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use std::{sync::Arc, time::Duration};
//!
//! use keygate_storage::{ChallengeStore, MemoryBackend};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let challenges = ChallengeStore::new(Arc::new(MemoryBackend::new()));
//!
//!     challenges.put("4f2a", Duration::from_secs(30)).await?;
//!     assert!(challenges.is_valid("4f2a").await?);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Available Backends
//!
//! | Backend | Use Case | Persistence |
//! |---------|----------|-------------|
//! | [`MemoryBackend`] | Testing, development | No |
//! | [`FileBackend`] | Single-instance deployments | Yes |
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module (record seeding helpers, assertion macros) and
//!   the `conformance` suite. Enable this in `[dev-dependencies]` for integration tests.

#![deny(unsafe_code)]

pub mod auth;
pub mod backend;
pub mod challenge;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod conformance;
pub mod error;
pub mod file;
pub mod memory;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;
pub mod types;

// Re-export primary types at crate root for convenience
pub use backend::StorageBackend;
pub use challenge::{CHALLENGE_PREFIX, ChallengeRecord, ChallengeStore};
pub use error::{BoxError, StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::MemoryBackend;
pub use types::KeyValue;
pub use zeroize::Zeroizing;
