use opcua_types::{AttributeId, NodeClass, NodeId, QualifiedName, StatusCode, Variant};

use crate::{
    base::NodeBase, data_type::DataTypeNode, method::MethodNode, object::ObjectNode,
    object_type::ObjectTypeNode, reference_type::ReferenceTypeNode, variable::VariableNode,
    variable::VariableValue, variable_type::VariableTypeNode, view::ViewNode,
    access_level::{AccessLevel, EventNotifier},
};

/// A node of any class.
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub enum NodeType {
    Object(ObjectNode),
    Variable(VariableNode),
    Method(MethodNode),
    ObjectType(ObjectTypeNode),
    VariableType(VariableTypeNode),
    ReferenceType(ReferenceTypeNode),
    DataType(DataTypeNode),
    View(ViewNode),
}

macro_rules! dispatch {
    ($self:ident, $node:ident => $expr:expr) => {
        match $self {
            NodeType::Object($node) => $expr,
            NodeType::Variable($node) => $expr,
            NodeType::Method($node) => $expr,
            NodeType::ObjectType($node) => $expr,
            NodeType::VariableType($node) => $expr,
            NodeType::ReferenceType($node) => $expr,
            NodeType::DataType($node) => $expr,
            NodeType::View($node) => $expr,
        }
    };
}

impl NodeType {
    /// The common head of the node.
    pub fn base(&self) -> &NodeBase {
        dispatch!(self, n => &n.base)
    }

    /// The common head, mutably.
    pub fn base_mut(&mut self) -> &mut NodeBase {
        dispatch!(self, n => &mut n.base)
    }

    /// The node's identity.
    pub fn node_id(&self) -> &NodeId {
        &self.base().node_id
    }

    /// The node's browse name.
    pub fn browse_name(&self) -> &QualifiedName {
        &self.base().browse_name
    }

    /// The class of the node.
    pub fn node_class(&self) -> NodeClass {
        match self {
            NodeType::Object(_) => NodeClass::Object,
            NodeType::Variable(_) => NodeClass::Variable,
            NodeType::Method(_) => NodeClass::Method,
            NodeType::ObjectType(_) => NodeClass::ObjectType,
            NodeType::VariableType(_) => NodeClass::VariableType,
            NodeType::ReferenceType(_) => NodeClass::ReferenceType,
            NodeType::DataType(_) => NodeClass::DataType,
            NodeType::View(_) => NodeClass::View,
        }
    }

    /// The variable payload, if this is a variable.
    pub fn as_variable(&self) -> Option<&VariableNode> {
        match self {
            NodeType::Variable(v) => Some(v),
            _ => None,
        }
    }

    /// The variable payload, mutably.
    pub fn as_variable_mut(&mut self) -> Option<&mut VariableNode> {
        match self {
            NodeType::Variable(v) => Some(v),
            _ => None,
        }
    }

    /// The method payload, if this is a method.
    pub fn as_method(&self) -> Option<&MethodNode> {
        match self {
            NodeType::Method(m) => Some(m),
            _ => None,
        }
    }

    /// The event notifier byte, for classes that carry one.
    pub fn event_notifier(&self) -> Option<EventNotifier> {
        match self {
            NodeType::Object(o) => Some(o.event_notifier),
            NodeType::View(v) => Some(v.event_notifier),
            _ => None,
        }
    }

    /// Read an attribute as a variant. The Value attribute of variables is
    /// only the raw variant here; timestamped reads go through
    /// [`VariableNode::read_value`].
    pub fn get_attribute(&self, attribute_id: AttributeId) -> Option<Variant> {
        let base = self.base();
        match attribute_id {
            AttributeId::NodeId => return Some(base.node_id.clone().into()),
            AttributeId::NodeClass => return Some(Variant::from(self.node_class() as u32)),
            AttributeId::BrowseName => return Some(base.browse_name.clone().into()),
            AttributeId::DisplayName => return Some(base.display_name.clone().into()),
            AttributeId::Description => return base.description.clone().map(Variant::from),
            AttributeId::WriteMask => return Some(Variant::from(base.write_mask.bits())),
            _ => {}
        }
        match self {
            NodeType::Object(o) => match attribute_id {
                AttributeId::EventNotifier => Some(Variant::from(o.event_notifier.bits())),
                _ => None,
            },
            NodeType::Variable(v) => match attribute_id {
                AttributeId::Value => match &v.value {
                    VariableValue::Static(dv) => dv.value.clone(),
                    VariableValue::Source(_) => {
                        v.read_value(&opcua_types::NumericRange::None).value
                    }
                },
                AttributeId::DataType => Some(v.data_type.clone().into()),
                AttributeId::ValueRank => Some(Variant::from(v.value_rank)),
                AttributeId::ArrayDimensions => v.array_dimensions.as_ref().map(|dims| {
                    Variant::from_array(
                        opcua_types::VariantScalarTypeId::UInt32,
                        dims.iter().map(|d| Variant::from(*d)).collect(),
                    )
                }),
                AttributeId::AccessLevel => Some(Variant::from(v.access_level.bits())),
                AttributeId::UserAccessLevel => Some(Variant::from(v.user_access_level.bits())),
                AttributeId::MinimumSamplingInterval => {
                    Some(Variant::from(v.minimum_sampling_interval))
                }
                AttributeId::Historizing => Some(Variant::from(v.historizing)),
                _ => None,
            },
            NodeType::Method(m) => match attribute_id {
                AttributeId::Executable => Some(Variant::from(m.executable)),
                AttributeId::UserExecutable => Some(Variant::from(m.user_executable)),
                _ => None,
            },
            NodeType::ObjectType(t) => match attribute_id {
                AttributeId::IsAbstract => Some(Variant::from(t.is_abstract)),
                _ => None,
            },
            NodeType::VariableType(t) => match attribute_id {
                AttributeId::Value => t.value.as_ref().and_then(|v| v.value.clone()),
                AttributeId::DataType => Some(t.data_type.clone().into()),
                AttributeId::IsAbstract => Some(Variant::from(t.is_abstract)),
                AttributeId::ValueRank => Some(Variant::from(t.value_rank)),
                _ => None,
            },
            NodeType::ReferenceType(t) => match attribute_id {
                AttributeId::IsAbstract => Some(Variant::from(t.is_abstract)),
                AttributeId::Symmetric => Some(Variant::from(t.symmetric)),
                AttributeId::InverseName => t.inverse_name.clone().map(Variant::from),
                _ => None,
            },
            NodeType::DataType(t) => match attribute_id {
                AttributeId::IsAbstract => Some(Variant::from(t.is_abstract)),
                _ => None,
            },
            NodeType::View(v) => match attribute_id {
                AttributeId::ContainsNoLoops => Some(Variant::from(v.contains_no_loops)),
                AttributeId::EventNotifier => Some(Variant::from(v.event_notifier.bits())),
                _ => None,
            },
        }
    }

    /// Write a non-value attribute. The Value attribute of variables goes
    /// through [`VariableNode::write_value`] so data sources are honored.
    pub fn set_attribute(
        &mut self,
        attribute_id: AttributeId,
        value: Variant,
    ) -> Result<(), StatusCode> {
        match attribute_id {
            AttributeId::DisplayName => match value {
                Variant::LocalizedText(text) => {
                    self.base_mut().display_name = *text;
                    Ok(())
                }
                _ => Err(StatusCode::BadTypeMismatch),
            },
            AttributeId::Description => match value {
                Variant::LocalizedText(text) => {
                    self.base_mut().description = Some(*text);
                    Ok(())
                }
                _ => Err(StatusCode::BadTypeMismatch),
            },
            AttributeId::BrowseName => match value {
                Variant::QualifiedName(name) => {
                    self.base_mut().browse_name = *name;
                    Ok(())
                }
                _ => Err(StatusCode::BadTypeMismatch),
            },
            AttributeId::EventNotifier => match (self, value) {
                (NodeType::Object(o), Variant::Byte(bits)) => {
                    o.event_notifier = EventNotifier::from_bits_truncate(bits);
                    Ok(())
                }
                (NodeType::View(v), Variant::Byte(bits)) => {
                    v.event_notifier = EventNotifier::from_bits_truncate(bits);
                    Ok(())
                }
                (NodeType::Object(_) | NodeType::View(_), _) => Err(StatusCode::BadTypeMismatch),
                _ => Err(StatusCode::BadAttributeIdInvalid),
            },
            AttributeId::Executable => match (self, value) {
                (NodeType::Method(m), Variant::Boolean(v)) => {
                    m.executable = v;
                    Ok(())
                }
                (NodeType::Method(_), _) => Err(StatusCode::BadTypeMismatch),
                _ => Err(StatusCode::BadAttributeIdInvalid),
            },
            AttributeId::AccessLevel => match (self, value) {
                (NodeType::Variable(n), Variant::Byte(bits)) => {
                    n.access_level = AccessLevel::from_bits_truncate(bits);
                    Ok(())
                }
                (NodeType::Variable(_), _) => Err(StatusCode::BadTypeMismatch),
                _ => Err(StatusCode::BadAttributeIdInvalid),
            },
            AttributeId::Historizing => match (self, value) {
                (NodeType::Variable(n), Variant::Boolean(v)) => {
                    n.historizing = v;
                    Ok(())
                }
                (NodeType::Variable(_), _) => Err(StatusCode::BadTypeMismatch),
                _ => Err(StatusCode::BadAttributeIdInvalid),
            },
            _ => Err(StatusCode::BadNotWritable),
        }
    }
}

impl From<ObjectNode> for NodeType {
    fn from(n: ObjectNode) -> Self {
        NodeType::Object(n)
    }
}

impl From<VariableNode> for NodeType {
    fn from(n: VariableNode) -> Self {
        NodeType::Variable(n)
    }
}

impl From<MethodNode> for NodeType {
    fn from(n: MethodNode) -> Self {
        NodeType::Method(n)
    }
}

impl From<ObjectTypeNode> for NodeType {
    fn from(n: ObjectTypeNode) -> Self {
        NodeType::ObjectType(n)
    }
}

impl From<VariableTypeNode> for NodeType {
    fn from(n: VariableTypeNode) -> Self {
        NodeType::VariableType(n)
    }
}

impl From<ReferenceTypeNode> for NodeType {
    fn from(n: ReferenceTypeNode) -> Self {
        NodeType::ReferenceType(n)
    }
}

impl From<DataTypeNode> for NodeType {
    fn from(n: DataTypeNode) -> Self {
        NodeType::DataType(n)
    }
}

impl From<ViewNode> for NodeType {
    fn from(n: ViewNode) -> Self {
        NodeType::View(n)
    }
}
