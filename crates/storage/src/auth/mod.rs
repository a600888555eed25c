//! Signing keypair persistence.
//!
//! The gateway signs every token with a single Ed25519 keypair that is
//! generated once per store and never rotated while the process runs. This
//! module holds the persisted record type and the store that reads and
//! creates it.
//!
//! # Key Storage
//!
//! - **Storage key**: [`ACTIVE_KEYPAIR_KEY`] (`signing-keys/active`)
//! - **Encoding**: JSON-serialized [`SigningKeyPair`]
//!
//! Creation is insert-if-absent, so concurrent first calls converge on one
//! persisted keypair.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use keygate_storage::{
//!     MemoryBackend,
//!     auth::{BackendSigningKeyStore, SigningKeyPair, SigningKeyStore},
//! };
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let store = BackendSigningKeyStore::new(Arc::new(MemoryBackend::new()));
//!
//! let keypair = SigningKeyPair::builder()
//!     .kid("deadbeef")
//!     .algorithm("EdDSA")
//!     .private_key("base64url-seed".to_owned())
//!     .public_key("base64url-public")
//!     .build();
//!
//! assert!(store.create_keypair(&keypair).await.unwrap());
//! assert!(store.get_keypair().await.unwrap().is_some());
//! # });
//! ```

mod signing_key;
mod store;

pub use signing_key::SigningKeyPair;
pub use store::{ACTIVE_KEYPAIR_KEY, BackendSigningKeyStore, SigningKeyStore};
