use crate::base::NodeBase;

/// A data type node.
#[derive(Debug, Clone, PartialEq)]
pub struct DataTypeNode {
    /// The common head.
    pub base: NodeBase,
    /// Whether values of the type may exist.
    pub is_abstract: bool,
}
