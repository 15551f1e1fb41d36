use bitflags::bitflags;

/// The class of an address-space node.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u32)]
#[allow(missing_docs)]
pub enum NodeClass {
    Object = 1,
    Variable = 2,
    Method = 4,
    ObjectType = 8,
    VariableType = 16,
    ReferenceType = 32,
    DataType = 64,
    View = 128,
}

bitflags! {
    /// A browse-time filter over node classes. Empty means "all".
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
    pub struct NodeClassMask: u32 {
        #[allow(missing_docs)]
        const OBJECT = 1;
        #[allow(missing_docs)]
        const VARIABLE = 2;
        #[allow(missing_docs)]
        const METHOD = 4;
        #[allow(missing_docs)]
        const OBJECT_TYPE = 8;
        #[allow(missing_docs)]
        const VARIABLE_TYPE = 16;
        #[allow(missing_docs)]
        const REFERENCE_TYPE = 32;
        #[allow(missing_docs)]
        const DATA_TYPE = 64;
        #[allow(missing_docs)]
        const VIEW = 128;
    }
}

impl NodeClassMask {
    /// Whether the mask admits the given node class. An empty mask admits
    /// everything.
    pub fn accepts(&self, class: NodeClass) -> bool {
        self.is_empty() || self.bits() & class as u32 != 0
    }
}
