//! Foundation types for the Retrace execution recorder.
//!
//! This crate provides the identity, temporal, and hashing types used
//! throughout the Retrace system. Every other Retrace crate depends on
//! `retrace-types`.
//!
//! # Key Types
//!
//! - [`ValueHash`] — Content-addressed identifier (BLAKE3 digest) for a
//!   stored value record
//! - [`ContentHasher`] — Domain-separated hasher, one domain per record kind
//! - [`Identity`] — Stable key naming one logical object across mutations,
//!   independent of content
//! - [`CallId`] / [`SnapshotId`] / [`SessionId`] — UUID v7 record identifiers
//! - [`Timestamp`] — Millisecond wall-clock timestamp

pub mod error;
pub mod hash;
pub mod identity;
pub mod ids;
pub mod temporal;

pub use error::TypeError;
pub use hash::{ContentHasher, ValueHash};
pub use identity::Identity;
pub use ids::{CallId, SessionId, SnapshotId};
pub use temporal::Timestamp;
