use crate::guid::Guid;

/// An opaque sequence of bytes. Unlike a `Vec<u8>` a byte string has a
/// distinguished null state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ByteString {
    /// The bytes, or `None` for the null byte string.
    pub value: Option<Vec<u8>>,
}

impl ByteString {
    /// The null byte string.
    pub fn null() -> ByteString {
        ByteString { value: None }
    }

    /// A byte string over the given bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> ByteString {
        ByteString {
            value: Some(bytes.into()),
        }
    }

    /// 16 random bytes, used for event ids.
    pub fn random_16() -> ByteString {
        ByteString::from_bytes(Guid::new().as_bytes().to_vec())
    }

    /// Null or zero length.
    pub fn is_null_or_empty(&self) -> bool {
        self.value.as_ref().map(|v| v.is_empty()).unwrap_or(true)
    }

    /// The length in bytes, 0 for null.
    pub fn len(&self) -> usize {
        self.value.as_ref().map(|v| v.len()).unwrap_or(0)
    }

    /// Whether the byte string holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The bytes, empty for null.
    pub fn as_ref(&self) -> &[u8] {
        self.value.as_deref().unwrap_or(&[])
    }
}

impl From<&[u8]> for ByteString {
    fn from(v: &[u8]) -> Self {
        ByteString::from_bytes(v.to_vec())
    }
}

impl From<Vec<u8>> for ByteString {
    fn from(v: Vec<u8>) -> Self {
        ByteString::from_bytes(v)
    }
}
