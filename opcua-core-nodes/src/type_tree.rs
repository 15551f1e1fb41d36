use hashbrown::HashMap;
use tracing::warn;

use opcua_types::NodeId;

/// The HasSubtype hierarchy over type nodes. Both the event type hierarchy
/// and the reference type hierarchy live in the same tree, since subtype
/// ids never collide.
#[derive(Debug, Default)]
pub struct TypeTree {
    /// child -> parent along HasSubtype.
    parents: HashMap<NodeId, NodeId>,
}

impl TypeTree {
    /// An empty tree.
    pub fn new() -> TypeTree {
        TypeTree::default()
    }

    /// Register `child` as a subtype of `parent`.
    pub fn add_subtype(&mut self, parent: impl Into<NodeId>, child: impl Into<NodeId>) {
        let parent = parent.into();
        let child = child.into();
        if parent == child {
            warn!("Ignoring self referential subtype for {child}");
            return;
        }
        self.parents.insert(child, parent);
    }

    /// Remove a type and its subtype edge.
    pub fn remove(&mut self, node: &NodeId) {
        self.parents.remove(node);
        self.parents.retain(|_, parent| parent != node);
    }

    /// Whether `node` equals `of` or is a transitive subtype of it.
    pub fn is_subtype_of(&self, node: &NodeId, of: &NodeId) -> bool {
        let mut current = node;
        loop {
            if current == of {
                return true;
            }
            match self.parents.get(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// All registered types that equal `of` or descend from it.
    pub fn subtypes_of<'a>(&'a self, of: &'a NodeId) -> impl Iterator<Item = &'a NodeId> {
        std::iter::once(of).chain(
            self.parents
                .keys()
                .filter(move |candidate| *candidate != of && self.is_subtype_of(candidate, of)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opcua_types::ObjectTypeId;

    #[test]
    fn subtype_chains() {
        let mut tree = TypeTree::new();
        tree.add_subtype(ObjectTypeId::BaseEventType, ObjectTypeId::SystemEventType);
        tree.add_subtype(ObjectTypeId::SystemEventType, NodeId::new(1, 100u32));

        let base: NodeId = ObjectTypeId::BaseEventType.into();
        let custom = NodeId::new(1, 100u32);
        assert!(tree.is_subtype_of(&custom, &base));
        assert!(tree.is_subtype_of(&base, &base));
        assert!(!tree.is_subtype_of(&base, &custom));

        let subtypes: Vec<_> = tree.subtypes_of(&base).cloned().collect();
        assert_eq!(subtypes.len(), 3);
    }

    #[test]
    fn removal_cuts_the_chain() {
        let mut tree = TypeTree::new();
        tree.add_subtype(NodeId::new(0, 1u32), NodeId::new(0, 2u32));
        tree.add_subtype(NodeId::new(0, 2u32), NodeId::new(0, 3u32));
        tree.remove(&NodeId::new(0, 2u32));
        assert!(!tree.is_subtype_of(&NodeId::new(0, 3u32), &NodeId::new(0, 1u32)));
    }
}
