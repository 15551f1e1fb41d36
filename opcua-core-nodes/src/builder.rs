//! Builders for assembling nodes, in the fluent style the embedding
//! application and the test fixtures use.

use std::sync::Arc;

use opcua_types::{DataValue, LocalizedText, NodeId, QualifiedName, Variant};

use crate::{
    access_level::{AccessLevel, EventNotifier},
    base::NodeBase,
    method::{MethodCallback, MethodNode},
    object::ObjectNode,
    object_type::ObjectTypeNode,
    variable::{ValueSource, VariableNode, VariableValue},
};

/// Builds a [`VariableNode`].
pub struct VariableBuilder {
    node: VariableNode,
}

impl VariableBuilder {
    /// Start a variable with its identity and names.
    pub fn new(
        node_id: &NodeId,
        browse_name: impl Into<QualifiedName>,
        display_name: impl Into<LocalizedText>,
    ) -> VariableBuilder {
        VariableBuilder {
            node: VariableNode {
                base: NodeBase::new(node_id, browse_name, display_name),
                value: VariableValue::Static(DataValue::null()),
                data_type: NodeId::null(),
                value_rank: -1,
                array_dimensions: None,
                access_level: AccessLevel::CURRENT_READ,
                user_access_level: AccessLevel::CURRENT_READ,
                minimum_sampling_interval: 0.0,
                historizing: false,
            },
        }
    }

    /// Set the initial value, timestamped now.
    pub fn value(mut self, value: impl Into<Variant>) -> Self {
        self.node.value = VariableValue::Static(DataValue::new_now(value));
        self
    }

    /// Attach a data source instead of a static value.
    pub fn value_source(mut self, source: ValueSource) -> Self {
        self.node.value = VariableValue::Source(source);
        self
    }

    /// Set the data type.
    pub fn data_type(mut self, data_type: impl Into<NodeId>) -> Self {
        self.node.data_type = data_type.into();
        self
    }

    /// Set the value rank.
    pub fn value_rank(mut self, value_rank: i32) -> Self {
        self.node.value_rank = value_rank;
        self
    }

    /// Set the access level.
    pub fn access_level(mut self, access_level: AccessLevel) -> Self {
        self.node.access_level = access_level;
        self
    }

    /// Set the user access level.
    pub fn user_access_level(mut self, user_access_level: AccessLevel) -> Self {
        self.node.user_access_level = user_access_level;
        self
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<LocalizedText>) -> Self {
        self.node.base.description = Some(description.into());
        self
    }

    /// Set the minimum sampling interval in ms.
    pub fn minimum_sampling_interval(mut self, interval: f64) -> Self {
        self.node.minimum_sampling_interval = interval;
        self
    }

    /// Set the historizing flag.
    pub fn historizing(mut self, historizing: bool) -> Self {
        self.node.historizing = historizing;
        self
    }

    /// Finish the node.
    pub fn build(self) -> VariableNode {
        self.node
    }
}

/// Builds an [`ObjectNode`].
pub struct ObjectBuilder {
    node: ObjectNode,
}

impl ObjectBuilder {
    /// Start an object with its identity and names.
    pub fn new(
        node_id: &NodeId,
        browse_name: impl Into<QualifiedName>,
        display_name: impl Into<LocalizedText>,
    ) -> ObjectBuilder {
        ObjectBuilder {
            node: ObjectNode {
                base: NodeBase::new(node_id, browse_name, display_name),
                event_notifier: EventNotifier::empty(),
            },
        }
    }

    /// Set the event notifier bits.
    pub fn event_notifier(mut self, event_notifier: EventNotifier) -> Self {
        self.node.event_notifier = event_notifier;
        self
    }

    /// Finish the node.
    pub fn build(self) -> ObjectNode {
        self.node
    }
}

/// Builds an [`ObjectTypeNode`].
pub struct ObjectTypeBuilder {
    node: ObjectTypeNode,
}

impl ObjectTypeBuilder {
    /// Start an object type with its identity and names.
    pub fn new(
        node_id: &NodeId,
        browse_name: impl Into<QualifiedName>,
        display_name: impl Into<LocalizedText>,
    ) -> ObjectTypeBuilder {
        ObjectTypeBuilder {
            node: ObjectTypeNode {
                base: NodeBase::new(node_id, browse_name, display_name),
                is_abstract: false,
            },
        }
    }

    /// Set the abstract flag.
    pub fn is_abstract(mut self, is_abstract: bool) -> Self {
        self.node.is_abstract = is_abstract;
        self
    }

    /// Finish the node.
    pub fn build(self) -> ObjectTypeNode {
        self.node
    }
}

/// Builds a [`MethodNode`].
pub struct MethodBuilder {
    node: MethodNode,
}

impl MethodBuilder {
    /// Start a method with its identity and names.
    pub fn new(
        node_id: &NodeId,
        browse_name: impl Into<QualifiedName>,
        display_name: impl Into<LocalizedText>,
    ) -> MethodBuilder {
        MethodBuilder {
            node: MethodNode {
                base: NodeBase::new(node_id, browse_name, display_name),
                executable: true,
                user_executable: true,
                is_async: false,
                callback: None,
            },
        }
    }

    /// Set the executable flags.
    pub fn executable(mut self, executable: bool) -> Self {
        self.node.executable = executable;
        self.node.user_executable = executable;
        self
    }

    /// Route calls through the async method manager.
    pub fn is_async(mut self, is_async: bool) -> Self {
        self.node.is_async = is_async;
        self
    }

    /// Attach the implementation.
    pub fn callback(mut self, callback: impl MethodCallback + 'static) -> Self {
        self.node.callback = Some(Arc::new(callback));
        self
    }

    /// Finish the node.
    pub fn build(self) -> MethodNode {
        self.node
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opcua_types::DataTypeId;

    #[test]
    fn variable_builder() {
        let id = NodeId::new(1, 1u32);
        let node = VariableBuilder::new(&id, "TestVar1", "TestVar1")
            .value(-1i32)
            .data_type(DataTypeId::Int32)
            .access_level(AccessLevel::CURRENT_READ | AccessLevel::CURRENT_WRITE)
            .build();
        assert_eq!(node.base.node_id, id);
        assert_eq!(
            node.read_value(&opcua_types::NumericRange::None).value,
            Some(Variant::from(-1i32))
        );
        assert!(node.access_level.contains(AccessLevel::CURRENT_WRITE));
    }
}
