use opcua_types::{ExpandedNodeId, NodeId};

/// A reference from its source node to a target, stored inside the source.
/// Only ids are held, so arbitrary insert/remove orderings cannot leave
/// dangling pointers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    /// The reference type.
    pub reference_type_id: NodeId,
    /// Whether this entry represents the inverse direction.
    pub is_inverse: bool,
    /// The target node.
    pub target_node_id: ExpandedNodeId,
}

impl Reference {
    /// A forward reference to a local target.
    pub fn forward(reference_type_id: impl Into<NodeId>, target: NodeId) -> Reference {
        Reference {
            reference_type_id: reference_type_id.into(),
            is_inverse: false,
            target_node_id: target.into(),
        }
    }

    /// An inverse reference to a local target.
    pub fn inverse(reference_type_id: impl Into<NodeId>, target: NodeId) -> Reference {
        Reference {
            reference_type_id: reference_type_id.into(),
            is_inverse: true,
            target_node_id: target.into(),
        }
    }

    /// The same edge seen from the other end.
    pub fn inverted(&self, source: NodeId) -> Reference {
        Reference {
            reference_type_id: self.reference_type_id.clone(),
            is_inverse: !self.is_inverse,
            target_node_id: source.into(),
        }
    }
}
