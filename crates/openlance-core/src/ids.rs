//! Newtype identifiers for marketplace entities.
//!
//! Each identifier wraps a [`Uuid`] so that a job id cannot be passed where a
//! user id is expected. [`TxHash`] wraps the 0x-prefixed hex string form of an
//! EVM transaction hash.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ValidationError;

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create an identifier from an existing UUID.
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Access the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

uuid_id!(
    /// A unique identifier for a marketplace user (client, worker, or voter).
    UserId,
    "user"
);

uuid_id!(
    /// A unique identifier for a job posting.
    JobId,
    "job"
);

uuid_id!(
    /// A unique identifier for a milestone within a job.
    MilestoneId,
    "milestone"
);

/// A settlement-ledger transaction hash.
///
/// Stored in its canonical wire form: `0x` followed by 64 lowercase hex
/// characters. Validated on construction so downstream code can treat the
/// inner string as well-formed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct TxHash(String);

impl TxHash {
    /// Parse and validate a transaction hash.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidTxHash`] unless the input is a
    /// `0x`-prefixed 64-character hex string.
    pub fn parse(s: impl Into<String>) -> Result<Self, ValidationError> {
        let s = s.into();
        let hex = match s.strip_prefix("0x") {
            Some(h) => h,
            None => return Err(ValidationError::InvalidTxHash(s)),
        };
        if hex.len() != 64 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ValidationError::InvalidTxHash(s));
        }
        Ok(Self(s.to_lowercase()))
    }

    /// The canonical `0x`-prefixed string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TxHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
