use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

/// A 16 byte globally unique identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Guid(Uuid);

impl Guid {
    /// Create a new random guid.
    pub fn new() -> Guid {
        Guid(Uuid::new_v4())
    }

    /// The all-zero guid.
    pub fn null() -> Guid {
        Guid(Uuid::nil())
    }

    /// Whether this is the all-zero guid.
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// The raw bytes of the guid.
    pub fn as_bytes(&self) -> [u8; 16] {
        *self.0.as_bytes()
    }

    /// Build a guid from raw bytes.
    pub fn from_bytes(bytes: [u8; 16]) -> Guid {
        Guid(Uuid::from_bytes(bytes))
    }
}

impl FromStr for Guid {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Guid)
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
