use crate::{access_level::EventNotifier, base::NodeBase};

/// A view node.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewNode {
    /// The common head.
    pub base: NodeBase,
    /// Whether browsing the view cannot loop.
    pub contains_no_loops: bool,
    /// Whether the view emits events.
    pub event_notifier: EventNotifier,
}
