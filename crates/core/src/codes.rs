//! Validated warehouse codes (SKU, location, batch).

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::value_object::ValueObject;

/// Longest code accepted for any of the warehouse code types.
pub const MAX_CODE_LEN: usize = 64;

fn validate_code(kind: &str, raw: &str) -> Result<String, DomainError> {
    let code = raw.trim();
    if code.is_empty() {
        return Err(DomainError::validation(format!("{kind} cannot be empty")));
    }
    if code.len() > MAX_CODE_LEN {
        return Err(DomainError::validation(format!(
            "{kind} longer than {MAX_CODE_LEN} characters"
        )));
    }
    if let Some(bad) = code
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/')))
    {
        return Err(DomainError::validation(format!(
            "{kind} contains invalid character '{bad}'"
        )));
    }
    Ok(code.to_string())
}

macro_rules! code_type {
    ($(#[$meta:meta])* $t:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $t(String);

        impl $t {
            /// Parse and normalise (trim) a code.
            pub fn parse(raw: impl AsRef<str>) -> Result<Self, DomainError> {
                validate_code($kind, raw.as_ref()).map(Self)
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl ValueObject for $t {}

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $t {
            type Error = DomainError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(value)
            }
        }

        impl From<$t> for String {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl core::str::FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

code_type!(
    /// Stock keeping unit code.
    Sku,
    "sku"
);
code_type!(
    /// Storage location (bin, rack slot, dock).
    LocationCode,
    "location"
);
code_type!(
    /// Manufacturer / supplier batch or lot number.
    BatchNumber,
    "batch"
);
code_type!(
    /// Stock condition (e.g. `GOOD`, `DAMAGED`, `QUARANTINE`).
    ConditionCode,
    "condition"
);

impl LocationCode {
    /// Default inbound staging location.
    pub fn receiving() -> Self {
        Self("RECEIVING".to_string())
    }
}

impl ConditionCode {
    /// Condition assigned when a receipt does not state one.
    pub fn good() -> Self {
        Self("GOOD".to_string())
    }
}
