//! Web eID client for relying-party applications.
//!
//! Re-exports [`eidkit_core`]; see [`EidClient`] for the entry point.

pub use eidkit_core::*;

/// Result of an `eidkit` operation.
pub type EidResult<T, E = EidError> = std::result::Result<T, E>;
