//! Credential Storage
//!
//! Durable storage for the access, refresh and mock tokens used by the
//! HTTP client.
//!
//! ## Layers
//!
//! - **CredentialStorage**: name/value storage with per-entry expiry
//!   (in-memory or a JSON file on disk)
//! - **TokenStore**: typed access to the tokens the request pipeline needs

mod error;
mod storage;
mod store;

pub use error::{StorageError, StorageResult};
pub use storage::{CredentialStorage, FileStorage, MemoryStorage};
pub use store::{AuthMode, TokenKind, TokenStore, TokenTtl};
