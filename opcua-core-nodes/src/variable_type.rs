use opcua_types::{DataValue, NodeId};

use crate::base::NodeBase;

/// A variable type node.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableTypeNode {
    /// The common head.
    pub base: NodeBase,
    /// The default value of instances, if any.
    pub value: Option<DataValue>,
    /// The data type of instance values.
    pub data_type: NodeId,
    /// Whether instances of the type may be created.
    pub is_abstract: bool,
    /// Scalar (-1), any (0) or a fixed array rank.
    pub value_rank: i32,
}
