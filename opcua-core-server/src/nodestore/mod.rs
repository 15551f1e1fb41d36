//! The address-space node store.
//!
//! An open-addressed hash table keyed by NodeId. The table size is always a
//! prime chosen from a growth table so the sizes roughly double; probing
//! uses a secondary hash. Nodes are immutable once stored: edits go through
//! [`NodeStore::get_copy`] and an optimistic [`NodeStore::replace`] that
//! fails when the stored node changed since the copy was taken.
//!
//! Namespaces may delegate to an external store registered at their
//! namespace index; `get` dispatches on the namespace.

use hashbrown::HashMap;
use tracing::debug;

use opcua_nodes::NodeType;
use opcua_types::{Identifier, NodeId, StatusCode};

/// The hash-map sizes are primes chosen to be close to the next power of 2,
/// so the size roughly doubles with each growth step.
const PRIMES: [u32; 30] = [
    7, 13, 31, 61, 127, 251, 509, 1021, 2039, 4093, 8191, 16381, 32749, 65521, 131071, 262139,
    524287, 1048573, 2097143, 4194301, 8388593, 16777213, 33554393, 67108859, 134217689, 268435399,
    536870909, 1073741789, 2147483647, 4294967291,
];

const MIN_SIZE: u32 = 64;

fn higher_prime_index(n: u32) -> usize {
    let mut low = 0usize;
    let mut high = PRIMES.len();
    while low != high {
        let mid = low + (high - low) / 2;
        if n > PRIMES[mid] {
            low = mid + 1;
        } else {
            high = mid;
        }
    }
    low
}

fn hash_node_id(id: &NodeId) -> u64 {
    // FNV-1a over the namespace and identifier payload
    const PRIME: u64 = 0x0000_0100_0000_01B3;
    let mut h: u64 = 0xCBF2_9CE4_8422_2325;
    let mut write = |bytes: &[u8]| {
        for b in bytes {
            h ^= *b as u64;
            h = h.wrapping_mul(PRIME);
        }
    };
    write(&id.namespace.to_le_bytes());
    match &id.identifier {
        Identifier::Numeric(v) => {
            write(&[0]);
            write(&v.to_le_bytes());
        }
        Identifier::String(v) => {
            write(&[1]);
            write(v.as_bytes());
        }
        Identifier::Guid(v) => {
            write(&[2]);
            write(&v.as_bytes());
        }
        Identifier::ByteString(v) => {
            write(&[3]);
            write(v.as_ref());
        }
    }
    h
}

#[derive(Debug)]
enum Slot {
    Empty,
    /// A removed entry. Probe chains walk over tombstones; rehashing drops
    /// them.
    Tombstone,
    Occupied(Entry),
}

#[derive(Debug)]
struct Entry {
    version: u64,
    node: NodeType,
}

/// A deep copy of a stored node, tagged with the version it was copied
/// from so [`NodeStore::replace`] can detect intervening changes.
#[derive(Debug)]
pub struct NodeCopy {
    node: NodeType,
    origin_version: u64,
}

impl NodeCopy {
    /// The copied node.
    pub fn node(&self) -> &NodeType {
        &self.node
    }

    /// The copied node, for editing before replace.
    pub fn node_mut(&mut self) -> &mut NodeType {
        &mut self.node
    }
}

/// An externally managed namespace. Only lookups dispatch to it; node
/// management of external namespaces is the delegate's concern.
pub trait ExternalNodeStore: Send + Sync {
    /// Look up a node by id.
    fn get(&self, node_id: &NodeId) -> Option<&NodeType>;
}

/// The node store.
pub struct NodeStore {
    slots: Vec<Slot>,
    count: usize,
    size_prime_index: usize,
    /// Monotonic version stamp handed to entries on insert/replace.
    next_version: u64,
    externals: HashMap<u16, Box<dyn ExternalNodeStore>>,
}

impl Default for NodeStore {
    fn default() -> Self {
        NodeStore::new()
    }
}

impl NodeStore {
    /// An empty store at the minimum table size.
    pub fn new() -> NodeStore {
        let size_prime_index = higher_prime_index(MIN_SIZE);
        let size = PRIMES[size_prime_index] as usize;
        NodeStore {
            slots: (0..size).map(|_| Slot::Empty).collect(),
            count: 0,
            size_prime_index,
            next_version: 1,
            externals: HashMap::new(),
        }
    }

    /// The number of stored nodes, not counting external namespaces.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether the store holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Register an external store for a namespace. Lookups in that
    /// namespace are delegated from then on.
    pub fn register_namespace(&mut self, namespace: u16, store: Box<dyn ExternalNodeStore>) {
        self.externals.insert(namespace, store);
    }

    fn probe(&self, node_id: &NodeId) -> Result<usize, usize> {
        let size = self.slots.len();
        let h = hash_node_id(node_id);
        let mut idx = (h % size as u64) as usize;
        let step = (h % (size as u64 - 2) + 1) as usize;
        let mut insert_at: Option<usize> = None;
        loop {
            match &self.slots[idx] {
                Slot::Empty => return Err(insert_at.unwrap_or(idx)),
                Slot::Tombstone => {
                    if insert_at.is_none() {
                        insert_at = Some(idx);
                    }
                }
                Slot::Occupied(entry) => {
                    if entry.node.node_id() == node_id {
                        return Ok(idx);
                    }
                }
            }
            idx += step;
            if idx >= size {
                idx -= size;
            }
        }
    }

    /// Resize when the table is too full, or shrink it when it is very
    /// empty. Rehashing drops tombstones, so occupancy afterwards is about
    /// 50%.
    fn expand(&mut self) {
        let osize = self.slots.len() as u32;
        let count = self.count as u32;
        if count * 2 < osize && (count * 8 > osize || osize <= MIN_SIZE) {
            return;
        }

        let nindex = higher_prime_index(count * 2);
        let nsize = PRIMES[nindex] as usize;
        let old = std::mem::replace(
            &mut self.slots,
            (0..nsize).map(|_| Slot::Empty).collect(),
        );
        self.size_prime_index = nindex;
        for slot in old {
            if let Slot::Occupied(entry) = slot {
                match self.probe(entry.node.node_id()) {
                    Err(free) => self.slots[free] = Slot::Occupied(entry),
                    Ok(_) => unreachable!("duplicate id while rehashing"),
                }
            }
        }
        debug!("Nodestore resized to {} slots", nsize);
    }

    /// Insert a node, taking ownership. A node with a null identifier gets
    /// a fresh numeric id assigned (in namespace 1 when the namespace was
    /// 0). Returns the id the node is stored under.
    pub fn insert(&mut self, mut node: NodeType) -> Result<NodeId, StatusCode> {
        if self.slots.len() * 3 <= self.count * 4 {
            self.expand();
        }

        if node.node_id().is_null_identifier() {
            // Find a free numeric id. The start value and stride mirror the
            // probe so ids spread over the table.
            let mut id = node.node_id().clone();
            if id.namespace == 0 {
                id.namespace = 1;
            }
            let size = self.slots.len() as u32;
            let mut identifier = self.count as u32 + 1;
            let increase = identifier % (size - 2) + 1;
            loop {
                id.identifier = Identifier::Numeric(identifier);
                if self.probe(&id).is_err() {
                    break;
                }
                identifier = identifier.wrapping_add(increase);
                if identifier >= size {
                    identifier -= size;
                }
            }
            node.base_mut().node_id = id;
        } else if self.probe(node.node_id()).is_ok() {
            return Err(StatusCode::BadNodeIdExists);
        }

        let assigned = node.node_id().clone();
        let free = match self.probe(&assigned) {
            Err(free) => free,
            Ok(_) => return Err(StatusCode::BadNodeIdExists),
        };
        let version = self.next_version;
        self.next_version += 1;
        self.slots[free] = Slot::Occupied(Entry { version, node });
        self.count += 1;
        Ok(assigned)
    }

    /// Optimistically replace a stored node with an edited copy. Fails with
    /// `BadInternalError` when the stored node is no longer the version the
    /// copy was taken from; the caller copies again and retries.
    pub fn replace(&mut self, copy: NodeCopy) -> Result<(), StatusCode> {
        let idx = self
            .probe(copy.node.node_id())
            .map_err(|_| StatusCode::BadNodeIdUnknown)?;
        let Slot::Occupied(entry) = &mut self.slots[idx] else {
            unreachable!("probe returned occupied");
        };
        if entry.version != copy.origin_version {
            // The node was replaced since the copy was made
            return Err(StatusCode::BadInternalError);
        }
        let version = self.next_version;
        self.next_version += 1;
        *entry = Entry {
            version,
            node: copy.node,
        };
        Ok(())
    }

    /// Remove and drop a node.
    pub fn remove(&mut self, node_id: &NodeId) -> Result<(), StatusCode> {
        let idx = self
            .probe(node_id)
            .map_err(|_| StatusCode::BadNodeIdUnknown)?;
        self.slots[idx] = Slot::Tombstone;
        self.count -= 1;
        // Downsize the table if it is very empty
        if self.count * 8 < self.slots.len() && self.slots.len() > 32 {
            self.expand();
        }
        Ok(())
    }

    /// Look up a node. Dispatches to an external store when one is
    /// registered for the namespace.
    pub fn get(&self, node_id: &NodeId) -> Option<&NodeType> {
        if let Some(external) = self.externals.get(&node_id.namespace) {
            return external.get(node_id);
        }
        self.get_internal(node_id)
    }

    fn get_internal(&self, node_id: &NodeId) -> Option<&NodeType> {
        let idx = self.probe(node_id).ok()?;
        match &self.slots[idx] {
            Slot::Occupied(entry) => Some(&entry.node),
            _ => None,
        }
    }

    /// Deep copy a node for editing, tagged with its current version.
    pub fn get_copy(&self, node_id: &NodeId) -> Option<NodeCopy> {
        let idx = self.probe(node_id).ok()?;
        match &self.slots[idx] {
            Slot::Occupied(entry) => Some(NodeCopy {
                node: entry.node.clone(),
                origin_version: entry.version,
            }),
            _ => None,
        }
    }

    /// Copy, edit, replace. In the single-threaded service path the replace
    /// cannot race, so the edit applies exactly once.
    pub fn edit<R>(
        &mut self,
        node_id: &NodeId,
        f: impl FnOnce(&mut NodeType) -> R,
    ) -> Result<R, StatusCode> {
        let mut copy = self.get_copy(node_id).ok_or(StatusCode::BadNodeIdUnknown)?;
        let result = f(copy.node_mut());
        self.replace(copy)?;
        Ok(result)
    }

    /// Visit every stored node in unspecified order. The visitor must not
    /// mutate the store.
    pub fn iterate(&self, mut visitor: impl FnMut(&NodeType)) {
        for slot in &self.slots {
            if let Slot::Occupied(entry) = slot {
                visitor(&entry.node);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opcua_nodes::VariableBuilder;
    use opcua_types::{DataTypeId, DataValue, Variant};

    fn test_variable(id: NodeId) -> NodeType {
        VariableBuilder::new(&id, "v", "v")
            .value(0u32)
            .data_type(DataTypeId::UInt32)
            .build()
            .into()
    }

    #[test]
    fn insert_get_remove() {
        let mut store = NodeStore::new();
        let id = NodeId::new(0, 2253u32);
        assert_eq!(store.insert(test_variable(id.clone())), Ok(id.clone()));

        // Inserting the same id again fails and the node is dropped
        assert_eq!(
            store.insert(test_variable(id.clone())),
            Err(StatusCode::BadNodeIdExists)
        );

        // The same identifier in another namespace is a different node
        assert!(store.get(&NodeId::new(1, 2253u32)).is_none());
        assert_eq!(store.get(&id).unwrap().node_id(), &id);

        assert_eq!(store.remove(&id), Ok(()));
        assert_eq!(store.remove(&id), Err(StatusCode::BadNodeIdUnknown));
        assert!(store.get(&id).is_none());
    }

    #[test]
    fn null_id_gets_assigned_in_namespace_1() {
        let mut store = NodeStore::new();
        let assigned = store.insert(test_variable(NodeId::null())).unwrap();
        assert_eq!(assigned.namespace, 1);
        assert!(assigned.as_u32().unwrap() > 0);
        assert!(store.get(&assigned).is_some());

        // A null identifier in a nonzero namespace keeps its namespace
        let assigned = store
            .insert(test_variable(NodeId::new(4, 0u32)))
            .unwrap();
        assert_eq!(assigned.namespace, 4);
    }

    #[test]
    fn copy_edit_replace() {
        let mut store = NodeStore::new();
        let id = store.insert(test_variable(NodeId::new(1, 5u32))).unwrap();

        let mut copy = store.get_copy(&id).unwrap();
        copy.node_mut()
            .as_variable_mut()
            .unwrap()
            .set_value(DataValue::new_now(42u32));
        assert_eq!(store.replace(copy), Ok(()));

        let node = store.get(&id).unwrap();
        let value = node.as_variable().unwrap();
        assert_eq!(
            value.read_value(&opcua_types::NumericRange::None).value,
            Some(Variant::from(42u32))
        );
    }

    #[test]
    fn stale_replace_fails() {
        let mut store = NodeStore::new();
        let id = store.insert(test_variable(NodeId::new(1, 5u32))).unwrap();

        let stale = store.get_copy(&id).unwrap();
        let fresh = store.get_copy(&id).unwrap();
        assert_eq!(store.replace(fresh), Ok(()));
        // The interleaved replace invalidated the first copy
        assert_eq!(store.replace(stale), Err(StatusCode::BadInternalError));
    }

    #[test]
    fn replace_of_unknown_node_fails() {
        let mut store = NodeStore::new();
        let id = store.insert(test_variable(NodeId::new(1, 5u32))).unwrap();
        let copy = store.get_copy(&id).unwrap();
        store.remove(&id).unwrap();
        assert_eq!(store.replace(copy), Err(StatusCode::BadNodeIdUnknown));
    }

    #[test]
    fn grows_and_shrinks_through_bulk_churn() {
        let mut store = NodeStore::new();
        for i in 0..1000u32 {
            store.insert(test_variable(NodeId::new(1, i + 1))).unwrap();
        }
        assert_eq!(store.len(), 1000);
        for i in 0..1000u32 {
            assert!(
                store.get(&NodeId::new(1, i + 1)).is_some(),
                "lost node {} after growth",
                i + 1
            );
        }
        for i in 0..990u32 {
            store.remove(&NodeId::new(1, i + 1)).unwrap();
        }
        assert_eq!(store.len(), 10);
        for i in 990..1000u32 {
            assert!(store.get(&NodeId::new(1, i + 1)).is_some());
        }
    }

    #[test]
    fn iterate_visits_every_live_node() {
        let mut store = NodeStore::new();
        for i in 0..50u32 {
            store.insert(test_variable(NodeId::new(1, i + 1))).unwrap();
        }
        store.remove(&NodeId::new(1, 7u32)).unwrap();
        let mut seen = Vec::new();
        store.iterate(|node| seen.push(node.node_id().clone()));
        assert_eq!(seen.len(), 49);
        assert!(!seen.contains(&NodeId::new(1, 7u32)));
    }

    #[test]
    fn external_namespace_dispatch() {
        struct Fixed(NodeType);
        impl ExternalNodeStore for Fixed {
            fn get(&self, node_id: &NodeId) -> Option<&NodeType> {
                (self.0.node_id() == node_id).then_some(&self.0)
            }
        }

        let mut store = NodeStore::new();
        let ext_id = NodeId::new(7, 1u32);
        store.register_namespace(7, Box::new(Fixed(test_variable(ext_id.clone()))));
        assert!(store.get(&ext_id).is_some());
        assert!(store.get(&NodeId::new(7, 2u32)).is_none());
    }
}
