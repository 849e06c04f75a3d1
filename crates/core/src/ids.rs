// SPDX-License-Identifier: MIT

//! Strongly-typed identifiers backed by [`uuid::Uuid`].
//!
//! The reference implementation stores these as Postgres `uuid` columns;
//! wrapping each one in its own newtype keeps a `WorkspaceId` from ever being
//! passed where an `OwnerId` is expected, the same mistake-proofing a
//! `nanoid`-prefixed ID newtype gets for free.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Define a newtype identifier wrapping a [`Uuid`].
///
/// Generates `new()` (random v4), `from_uuid()`, `as_uuid()`, `Display`,
/// `FromStr`, and the serde/sqlx-friendly `#[serde(transparent)]` wrapper.
macro_rules! define_id {
    ($(#[$meta:meta])* pub struct $name:ident;) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID (e.g. one read back from a database row).
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

define_id! {
    /// Primary key of a workspace row.
    pub struct WorkspaceId;
}

define_id! {
    /// Foreign key routing SSE streams and enforcing per-user running limits.
    pub struct OwnerId;
}

define_id! {
    /// Idempotency token attached to an in-flight operation.
    ///
    /// Reused across retries of the same operation attempt; a fresh op_id is
    /// minted only when a new operation begins (see invariant I2).
    pub struct OpId;
}

#[cfg(test)]
#[path = "ids_tests.rs"]
mod tests;
