use std::fmt;
use std::sync::Arc;

use opcua_types::{NodeId, StatusCode, Variant};

use crate::base::NodeBase;

/// The callback attached to a method node. Implementations must be cheap to
/// clone through the node copy machinery, so the node stores an `Arc`.
pub trait MethodCallback: Send + Sync {
    /// Execute the method on the given object with the given arguments.
    fn call(&self, object_id: &NodeId, arguments: &[Variant]) -> Result<Vec<Variant>, StatusCode>;
}

impl<F> MethodCallback for F
where
    F: Fn(&NodeId, &[Variant]) -> Result<Vec<Variant>, StatusCode> + Send + Sync,
{
    fn call(&self, object_id: &NodeId, arguments: &[Variant]) -> Result<Vec<Variant>, StatusCode> {
        self(object_id, arguments)
    }
}

/// A method node.
#[derive(Clone)]
pub struct MethodNode {
    /// The common head.
    pub base: NodeBase,
    /// Whether the method may be called at all.
    pub executable: bool,
    /// Whether the current user may call the method.
    pub user_executable: bool,
    /// Whether calls are dispatched through the async method manager.
    pub is_async: bool,
    /// The attached implementation, shared between copies.
    pub callback: Option<Arc<dyn MethodCallback>>,
}

impl fmt::Debug for MethodNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodNode")
            .field("base", &self.base)
            .field("executable", &self.executable)
            .field("user_executable", &self.user_executable)
            .field("is_async", &self.is_async)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}
