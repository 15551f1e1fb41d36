use crate::{
    data_value::DataValue,
    localized_text::LocalizedText,
    node_class::NodeClass,
    node_id::{ExpandedNodeId, NodeId},
    qualified_name::QualifiedName,
    service_types::header::{RequestHeader, ResponseHeader},
    status_code::StatusCode,
};

/// The class specific attributes of a node to add. The common display
/// name / description / write mask head is inlined in every variant's
/// struct-free form through [`CommonNodeAttributes`].
#[derive(Debug, Clone, Default)]
pub struct CommonNodeAttributes {
    /// The display name.
    pub display_name: LocalizedText,
    /// An optional description.
    pub description: LocalizedText,
    /// Which attributes a client may write.
    pub write_mask: u32,
}

/// Attribute payload per node class for AddNodes.
#[derive(Debug, Clone)]
pub enum NodeAttributes {
    /// An object with its event notifier byte.
    Object {
        #[allow(missing_docs)]
        common: CommonNodeAttributes,
        /// Bit 0 set = the object emits events.
        event_notifier: u8,
    },
    /// A variable with its value machinery.
    Variable {
        #[allow(missing_docs)]
        common: CommonNodeAttributes,
        /// The initial value.
        value: DataValue,
        /// The data type of the value.
        data_type: NodeId,
        /// Scalar (-1) or array rank.
        value_rank: i32,
        /// Read/write access bits.
        access_level: u8,
        /// The fastest sampling the source supports, ms.
        minimum_sampling_interval: f64,
        /// Whether history is collected.
        historizing: bool,
    },
    /// A method.
    Method {
        #[allow(missing_docs)]
        common: CommonNodeAttributes,
        /// Whether the method may be called.
        executable: bool,
    },
    /// An object type.
    ObjectType {
        #[allow(missing_docs)]
        common: CommonNodeAttributes,
        /// Whether instances may be created.
        is_abstract: bool,
    },
    /// A variable type.
    VariableType {
        #[allow(missing_docs)]
        common: CommonNodeAttributes,
        /// Whether instances may be created.
        is_abstract: bool,
    },
    /// A reference type.
    ReferenceType {
        #[allow(missing_docs)]
        common: CommonNodeAttributes,
        /// Whether the type may be used in references.
        is_abstract: bool,
        /// Whether source and target are interchangeable.
        symmetric: bool,
        /// The name of the inverse direction.
        inverse_name: LocalizedText,
    },
    /// A data type.
    DataType {
        #[allow(missing_docs)]
        common: CommonNodeAttributes,
        /// Whether values of the type may exist.
        is_abstract: bool,
    },
    /// A view.
    View {
        #[allow(missing_docs)]
        common: CommonNodeAttributes,
        /// Whether the view is loop free.
        contains_no_loops: bool,
        /// Bit 0 set = the view emits events.
        event_notifier: u8,
    },
}

impl NodeAttributes {
    /// The node class implied by the attribute payload.
    pub fn node_class(&self) -> NodeClass {
        match self {
            NodeAttributes::Object { .. } => NodeClass::Object,
            NodeAttributes::Variable { .. } => NodeClass::Variable,
            NodeAttributes::Method { .. } => NodeClass::Method,
            NodeAttributes::ObjectType { .. } => NodeClass::ObjectType,
            NodeAttributes::VariableType { .. } => NodeClass::VariableType,
            NodeAttributes::ReferenceType { .. } => NodeClass::ReferenceType,
            NodeAttributes::DataType { .. } => NodeClass::DataType,
            NodeAttributes::View { .. } => NodeClass::View,
        }
    }
}

/// One node of an AddNodes request.
#[derive(Debug, Clone)]
pub struct AddNodesItem {
    /// The requested id, null to let the server assign one.
    pub requested_new_node_id: ExpandedNodeId,
    /// The hierarchical parent.
    pub parent_node_id: ExpandedNodeId,
    /// The reference from the parent to the new node.
    pub reference_type_id: NodeId,
    /// The browse name of the new node.
    pub browse_name: QualifiedName,
    /// The attributes, which also carry the node class.
    pub node_attributes: NodeAttributes,
    /// The type definition for objects and variables, null otherwise.
    pub type_definition: ExpandedNodeId,
}

/// The per-node result of an AddNodes.
#[derive(Debug, Clone, Default)]
pub struct AddNodesResult {
    /// The outcome.
    pub status_code: StatusCode,
    /// The id actually used, null on failure.
    pub added_node_id: NodeId,
}

/// AddNodes service request.
#[derive(Debug, Clone, Default)]
pub struct AddNodesRequest {
    #[allow(missing_docs)]
    pub request_header: RequestHeader,
    /// The nodes to add.
    pub nodes_to_add: Vec<AddNodesItem>,
}

/// AddNodes service response.
#[derive(Debug, Clone, Default)]
pub struct AddNodesResponse {
    #[allow(missing_docs)]
    pub response_header: ResponseHeader,
    /// One result per node, in request order.
    pub results: Vec<AddNodesResult>,
}

/// One node of a DeleteNodes request.
#[derive(Debug, Clone, Default)]
pub struct DeleteNodesItem {
    /// The node to delete.
    pub node_id: NodeId,
    /// Whether references pointing at the node are removed as well.
    pub delete_target_references: bool,
}

/// DeleteNodes service request.
#[derive(Debug, Clone, Default)]
pub struct DeleteNodesRequest {
    #[allow(missing_docs)]
    pub request_header: RequestHeader,
    /// The nodes to delete.
    pub nodes_to_delete: Vec<DeleteNodesItem>,
}

/// DeleteNodes service response.
#[derive(Debug, Clone, Default)]
pub struct DeleteNodesResponse {
    #[allow(missing_docs)]
    pub response_header: ResponseHeader,
    /// One status per node, in request order.
    pub results: Vec<StatusCode>,
}

/// One reference of an AddReferences request.
#[derive(Debug, Clone, Default)]
pub struct AddReferencesItem {
    /// The source node.
    pub source_node_id: NodeId,
    /// The reference type.
    pub reference_type_id: NodeId,
    /// Whether the reference is stored in the forward direction.
    pub is_forward: bool,
    /// The target node.
    pub target_node_id: ExpandedNodeId,
    /// The class of the target node, checked when the target is local.
    pub target_node_class: Option<NodeClass>,
}

/// AddReferences service request.
#[derive(Debug, Clone, Default)]
pub struct AddReferencesRequest {
    #[allow(missing_docs)]
    pub request_header: RequestHeader,
    /// The references to add.
    pub references_to_add: Vec<AddReferencesItem>,
}

/// AddReferences service response.
#[derive(Debug, Clone, Default)]
pub struct AddReferencesResponse {
    #[allow(missing_docs)]
    pub response_header: ResponseHeader,
    /// One status per reference, in request order.
    pub results: Vec<StatusCode>,
}

/// One reference of a DeleteReferences request.
#[derive(Debug, Clone, Default)]
pub struct DeleteReferencesItem {
    /// The source node.
    pub source_node_id: NodeId,
    /// The reference type.
    pub reference_type_id: NodeId,
    /// Whether the forward direction is addressed.
    pub is_forward: bool,
    /// The target node.
    pub target_node_id: ExpandedNodeId,
    /// Whether the inverse reference at the target is removed as well.
    pub delete_bidirectional: bool,
}

/// DeleteReferences service request.
#[derive(Debug, Clone, Default)]
pub struct DeleteReferencesRequest {
    #[allow(missing_docs)]
    pub request_header: RequestHeader,
    /// The references to delete.
    pub references_to_delete: Vec<DeleteReferencesItem>,
}

/// DeleteReferences service response.
#[derive(Debug, Clone, Default)]
pub struct DeleteReferencesResponse {
    #[allow(missing_docs)]
    pub response_header: ResponseHeader,
    /// One status per reference, in request order.
    pub results: Vec<StatusCode>,
}
