use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Stable key naming one logical object across its lifetime.
///
/// An `Identity` is assigned by the collector observing the monitored
/// program and is opaque to the core: the core only requires that the same
/// logical object keeps the same key across mutations, independent of what
/// the object's content hashes to at any moment.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity(String);

impl Identity {
    /// Create an identity from a collector-assigned key.
    pub fn new(key: impl Into<String>) -> Result<Self, TypeError> {
        let key = key.into();
        if key.is_empty() {
            return Err(TypeError::EmptyIdentity);
        }
        Ok(Self(key))
    }

    /// Create a random identity for tests and demos.
    pub fn ephemeral() -> Self {
        let mut bytes = [0u8; 16];
        rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
        Self(format!("ephemeral:{}", hex::encode(bytes)))
    }

    /// The underlying key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self.0)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_accepts_non_empty_key() {
        let id = Identity::new("obj:140235").unwrap();
        assert_eq!(id.as_str(), "obj:140235");
    }

    #[test]
    fn new_rejects_empty_key() {
        assert_eq!(Identity::new("").unwrap_err(), TypeError::EmptyIdentity);
    }

    #[test]
    fn ephemeral_identities_differ() {
        let a = Identity::ephemeral();
        let b = Identity::ephemeral();
        assert_ne!(a, b);
    }

    #[test]
    fn same_key_is_equal() {
        let a = Identity::new("shared").unwrap();
        let b = Identity::new("shared").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn display_is_raw_key() {
        let id = Identity::new("counter").unwrap();
        assert_eq!(format!("{id}"), "counter");
    }
}
