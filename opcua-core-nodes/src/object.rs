use crate::{access_level::EventNotifier, base::NodeBase};

/// An object node.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectNode {
    /// The common head.
    pub base: NodeBase,
    /// Whether the object emits events and whether their history is
    /// accessible.
    pub event_notifier: EventNotifier,
}
