//! Nullable infrastructure for deterministic testing.
//!
//! Every collaborator of the election engine (storage, scheduler, account
//! authority) is abstracted behind a trait. This crate provides test-friendly
//! implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod authority;
pub mod scheduler;
pub mod store;

pub use authority::NullAuthority;
pub use scheduler::NullScheduler;
pub use store::NullElectorStore;
