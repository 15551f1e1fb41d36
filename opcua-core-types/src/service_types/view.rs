use crate::{
    localized_text::LocalizedText,
    node_class::{NodeClass, NodeClassMask},
    node_id::{ExpandedNodeId, NodeId},
    qualified_name::QualifiedName,
    service_types::header::{RequestHeader, ResponseHeader},
    status_code::StatusCode,
};

/// The direction references are followed in a browse.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum BrowseDirection {
    /// Follow references from source to target.
    #[default]
    Forward,
    /// Follow references from target to source.
    Inverse,
    /// Follow both directions.
    Both,
}

/// Addresses the references of one node for browsing.
#[derive(Debug, Clone, Default)]
pub struct BrowseDescription {
    /// The node whose references are browsed.
    pub node_id: NodeId,
    /// The direction to follow.
    pub browse_direction: BrowseDirection,
    /// Restrict to this reference type. Null means all.
    pub reference_type_id: NodeId,
    /// Whether subtypes of the reference type are included.
    pub include_subtypes: bool,
    /// Restrict targets to these node classes. Empty means all.
    pub node_class_mask: NodeClassMask,
}

/// One reference found by a browse.
#[derive(Debug, Clone, Default)]
pub struct ReferenceDescription {
    /// The reference type.
    pub reference_type_id: NodeId,
    /// Whether the reference is followed in the forward direction.
    pub is_forward: bool,
    /// The target node.
    pub node_id: ExpandedNodeId,
    /// The target's browse name, if the target is local.
    pub browse_name: QualifiedName,
    /// The target's display name, if the target is local.
    pub display_name: LocalizedText,
    /// The target's node class, if the target is local.
    pub node_class: Option<NodeClass>,
}

/// The per-node result of a browse.
#[derive(Debug, Clone, Default)]
pub struct BrowseResult {
    /// The outcome for this node.
    pub status_code: StatusCode,
    /// The references found.
    pub references: Vec<ReferenceDescription>,
}

/// Browse service request.
#[derive(Debug, Clone, Default)]
pub struct BrowseRequest {
    #[allow(missing_docs)]
    pub request_header: RequestHeader,
    /// Cap on references per result. 0 means unlimited.
    pub requested_max_references_per_node: u32,
    /// The nodes to browse.
    pub nodes_to_browse: Vec<BrowseDescription>,
}

/// Browse service response.
#[derive(Debug, Clone, Default)]
pub struct BrowseResponse {
    #[allow(missing_docs)]
    pub response_header: ResponseHeader,
    /// One result per node, in request order.
    pub results: Vec<BrowseResult>,
}

/// One step of a relative path.
#[derive(Debug, Clone, Default)]
pub struct RelativePathElement {
    /// The reference type to follow. Null means any hierarchical reference.
    pub reference_type_id: NodeId,
    /// Whether the reference is followed inverse.
    pub is_inverse: bool,
    /// Whether subtypes of the reference type are included.
    pub include_subtypes: bool,
    /// The browse name the target must carry.
    pub target_name: QualifiedName,
}

/// A browse path from a starting node.
#[derive(Debug, Clone, Default)]
pub struct BrowsePath {
    /// The node to resolve from.
    pub starting_node: NodeId,
    /// The steps to follow.
    pub relative_path: Vec<RelativePathElement>,
}

/// One node a browse path resolved to.
#[derive(Debug, Clone, Default)]
pub struct BrowsePathTarget {
    /// The resolved node.
    pub target_id: ExpandedNodeId,
    /// Index of the first unprocessed path element, `u32::MAX` when the
    /// whole path was processed.
    pub remaining_path_index: u32,
}

/// The per-path result of a translate.
#[derive(Debug, Clone, Default)]
pub struct BrowsePathResult {
    /// The outcome for this path.
    pub status_code: StatusCode,
    /// All nodes the path resolved to.
    pub targets: Vec<BrowsePathTarget>,
}

/// TranslateBrowsePathsToNodeIds service request.
#[derive(Debug, Clone, Default)]
pub struct TranslateBrowsePathsToNodeIdsRequest {
    #[allow(missing_docs)]
    pub request_header: RequestHeader,
    /// The paths to resolve.
    pub browse_paths: Vec<BrowsePath>,
}

/// TranslateBrowsePathsToNodeIds service response.
#[derive(Debug, Clone, Default)]
pub struct TranslateBrowsePathsToNodeIdsResponse {
    #[allow(missing_docs)]
    pub response_header: ResponseHeader,
    /// One result per path, in request order.
    pub results: Vec<BrowsePathResult>,
}
