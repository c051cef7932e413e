//! Host graphics API surface used by the Xenos GPU caches.
//!
//! The caches never talk to a concrete graphics API. They describe resources,
//! views and commands with the plain value types in [`format`] and [`desc`] and
//! hand them to implementations of the traits in [`backend`]. The renderer owns
//! the real device, command list and guest memory mirror and implements the
//! traits on top of them.

pub mod backend;
pub mod desc;
pub mod error;
pub mod format;

/// A backend that records every call instead of executing it.
///
/// This module is only available when compiling this crate's own tests, or when
/// the `test-utils` feature is enabled. It is **not** considered part of the
/// stable API.
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use backend::{Backend, CommandSubmitter, HostDevice, SharedMemory};
pub use desc::*;
pub use error::HostError;
pub use format::DxgiFormat;
