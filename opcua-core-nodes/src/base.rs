use opcua_types::{LocalizedText, NodeId, QualifiedName};

use crate::{access_level::WriteMask, references::Reference};

/// The attributes common to every node class, plus the references stored
/// inside the source node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeBase {
    /// The node's identity.
    pub node_id: NodeId,
    /// The name used when browsing.
    pub browse_name: QualifiedName,
    /// The name shown to users.
    pub display_name: LocalizedText,
    /// An optional description.
    pub description: Option<LocalizedText>,
    /// Which attributes clients may write.
    pub write_mask: WriteMask,
    /// References with this node as the source. Targets are held by id
    /// only; traversal re-resolves them through the node store.
    pub references: Vec<Reference>,
}

impl NodeBase {
    /// Create a base with the given identity and names.
    pub fn new(
        node_id: &NodeId,
        browse_name: impl Into<QualifiedName>,
        display_name: impl Into<LocalizedText>,
    ) -> NodeBase {
        NodeBase {
            node_id: node_id.clone(),
            browse_name: browse_name.into(),
            display_name: display_name.into(),
            description: None,
            write_mask: WriteMask::empty(),
            references: Vec::new(),
        }
    }

    /// Add a reference if an identical one is not already present.
    pub fn insert_reference(&mut self, reference: Reference) -> bool {
        if self.references.contains(&reference) {
            return false;
        }
        self.references.push(reference);
        true
    }

    /// Remove a matching reference. Returns whether one was removed.
    pub fn remove_reference(&mut self, reference: &Reference) -> bool {
        let before = self.references.len();
        self.references.retain(|r| r != reference);
        self.references.len() != before
    }
}
