use std::cmp::Ordering;
use std::fmt;

use crate::{byte_string::ByteString, guid::Guid};

/// The identifier part of a [`NodeId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    /// A numeric identifier.
    Numeric(u32),
    /// A string identifier.
    String(String),
    /// A 16 byte guid identifier.
    Guid(Guid),
    /// An opaque bytestring identifier.
    ByteString(ByteString),
}

impl Identifier {
    fn type_order(&self) -> u8 {
        match self {
            Identifier::Numeric(_) => 0,
            Identifier::String(_) => 1,
            Identifier::Guid(_) => 2,
            Identifier::ByteString(_) => 3,
        }
    }

    fn is_null(&self) -> bool {
        match self {
            Identifier::Numeric(v) => *v == 0,
            Identifier::String(v) => v.is_empty(),
            Identifier::Guid(v) => v.is_nil(),
            Identifier::ByteString(v) => v.is_null_or_empty(),
        }
    }
}

impl From<u32> for Identifier {
    fn from(v: u32) -> Self {
        Identifier::Numeric(v)
    }
}

impl From<&str> for Identifier {
    fn from(v: &str) -> Self {
        Identifier::String(v.to_owned())
    }
}

impl From<String> for Identifier {
    fn from(v: String) -> Self {
        Identifier::String(v)
    }
}

impl From<Guid> for Identifier {
    fn from(v: Guid) -> Self {
        Identifier::Guid(v)
    }
}

impl From<ByteString> for Identifier {
    fn from(v: ByteString) -> Self {
        Identifier::ByteString(v)
    }
}

/// The canonical identity of an address-space node, qualified by a namespace
/// index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeId {
    /// Index into the server's namespace array.
    pub namespace: u16,
    /// The identifier within that namespace.
    pub identifier: Identifier,
}

impl Default for NodeId {
    fn default() -> Self {
        NodeId::null()
    }
}

impl NodeId {
    /// Create a node id from a namespace index and anything convertible to
    /// an identifier.
    pub fn new<T: Into<Identifier>>(namespace: u16, identifier: T) -> NodeId {
        NodeId {
            namespace,
            identifier: identifier.into(),
        }
    }

    /// The null node id, `ns=0;i=0`.
    pub fn null() -> NodeId {
        NodeId {
            namespace: 0,
            identifier: Identifier::Numeric(0),
        }
    }

    /// A node id is null when both the namespace is 0 and the identifier is
    /// empty or zero.
    pub fn is_null(&self) -> bool {
        self.namespace == 0 && self.identifier.is_null()
    }

    /// The identifier is empty or zero, regardless of namespace.
    pub fn is_null_identifier(&self) -> bool {
        self.identifier.is_null()
    }

    /// The numeric identifier, if the id is numeric.
    pub fn as_u32(&self) -> Option<u32> {
        match &self.identifier {
            Identifier::Numeric(v) => Some(*v),
            _ => None,
        }
    }
}

// The total order: identifier type tag first, then namespace, then the
// identifier value.
impl Ord for NodeId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identifier
            .type_order()
            .cmp(&other.identifier.type_order())
            .then_with(|| self.namespace.cmp(&other.namespace))
            .then_with(|| match (&self.identifier, &other.identifier) {
                (Identifier::Numeric(a), Identifier::Numeric(b)) => a.cmp(b),
                (Identifier::String(a), Identifier::String(b)) => a.cmp(b),
                (Identifier::Guid(a), Identifier::Guid(b)) => a.as_bytes().cmp(&b.as_bytes()),
                (Identifier::ByteString(a), Identifier::ByteString(b)) => a.cmp(b),
                _ => unreachable!("tags compared equal"),
            })
    }
}

impl PartialOrd for NodeId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.identifier {
            Identifier::Numeric(v) => write!(f, "ns={};i={}", self.namespace, v),
            Identifier::String(v) => write!(f, "ns={};s={}", self.namespace, v),
            Identifier::Guid(v) => write!(f, "ns={};g={}", self.namespace, v),
            Identifier::ByteString(v) => write!(f, "ns={};b={}byte", self.namespace, v.len()),
        }
    }
}

/// A node id that may point into another server. The core only ever follows
/// references with an empty server index, everything else is opaque payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ExpandedNodeId {
    /// The node id within the target namespace.
    pub node_id: NodeId,
    /// An explicit namespace uri overriding the index, if set.
    pub namespace_uri: Option<String>,
    /// Index into the server table. 0 is the local server.
    pub server_index: u32,
}

impl ExpandedNodeId {
    /// An expanded node id pointing at a local node.
    pub fn local(node_id: NodeId) -> Self {
        ExpandedNodeId {
            node_id,
            namespace_uri: None,
            server_index: 0,
        }
    }

    /// Whether this id can be resolved against the local address space.
    pub fn is_local(&self) -> bool {
        self.server_index == 0 && self.namespace_uri.is_none()
    }
}

impl From<NodeId> for ExpandedNodeId {
    fn from(node_id: NodeId) -> Self {
        ExpandedNodeId::local(node_id)
    }
}

impl fmt::Display for ExpandedNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.server_index != 0 {
            write!(f, "svr={};", self.server_index)?;
        }
        write!(f, "{}", self.node_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_detection() {
        assert!(NodeId::null().is_null());
        assert!(NodeId::new(0, "").is_null());
        assert!(!NodeId::new(1, 0u32).is_null());
        assert!(NodeId::new(1, 0u32).is_null_identifier());
        assert!(!NodeId::new(0, 2253u32).is_null());
    }

    #[test]
    fn total_order() {
        // Numeric sorts before string regardless of namespace or value
        assert!(NodeId::new(5, 99u32) < NodeId::new(0, "a"));
        // Within a type, namespace is compared first
        assert!(NodeId::new(0, 99u32) < NodeId::new(1, 1u32));
        // Then the identifier
        assert!(NodeId::new(1, 1u32) < NodeId::new(1, 2u32));
        assert_eq!(
            NodeId::new(1, "x").cmp(&NodeId::new(1, "x")),
            std::cmp::Ordering::Equal
        );
    }
}
