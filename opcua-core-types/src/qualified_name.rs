use std::fmt;

/// A name qualified by a namespace index, used for browse names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct QualifiedName {
    /// Index into the server's namespace array.
    pub namespace_index: u16,
    /// The unqualified name.
    pub name: String,
}

impl QualifiedName {
    /// Create a qualified name.
    pub fn new(namespace_index: u16, name: impl Into<String>) -> QualifiedName {
        QualifiedName {
            namespace_index,
            name: name.into(),
        }
    }

    /// The null qualified name.
    pub fn null() -> QualifiedName {
        QualifiedName::default()
    }

    /// Empty name in namespace 0.
    pub fn is_null(&self) -> bool {
        self.namespace_index == 0 && self.name.is_empty()
    }
}

impl From<&str> for QualifiedName {
    fn from(v: &str) -> Self {
        QualifiedName::new(0, v)
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace_index != 0 {
            write!(f, "{}:{}", self.namespace_index, self.name)
        } else {
            write!(f, "{}", self.name)
        }
    }
}
