use crate::base::NodeBase;

/// An object type node.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectTypeNode {
    /// The common head.
    pub base: NodeBase,
    /// Whether instances of the type may be created.
    pub is_abstract: bool,
}
