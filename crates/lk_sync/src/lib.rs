//! lk_sync — remote synchronization for Latchkey vaults
//!
//! The server is a dumb store: it holds SRP verifiers and opaque encrypted
//! vault documents, and can authenticate a user without ever seeing the
//! password. Reconciliation is strict last-writer-wins by `updatedAt`; a
//! tampered remote payload is rejected by an integrity digest and the local
//! vault stays the source of truth.
//!
//! # Modules
//! - `api`       — request/response types mapping 1:1 to JSON bodies
//! - `envelope`  — the transport envelope (inner entries + outer digest)
//! - `transport` — the `SyncTransport` capability and the HTTP implementation
//! - `memory`    — in-process server (SRP records, sessions, tokens, vault)
//! - `session`   — login flow, mutate-then-sync facade, the reconciler
//! - `error`     — unified error type

pub mod api;
pub mod envelope;
pub mod error;
pub mod memory;
pub mod session;
pub mod transport;

pub use api::RemoteVault;
pub use error::SyncError;
pub use memory::MemoryServer;
pub use session::{Session, SyncStatus};
pub use transport::{HttpTransport, SyncTransport};
