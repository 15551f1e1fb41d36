//! Browse and TranslateBrowsePathsToNodeIds, plus the traversal helpers
//! the rest of the core builds on.

use opcua_types::{
    BrowseDescription, BrowseDirection, BrowsePath, BrowsePathResult, BrowsePathTarget,
    BrowseRequest, BrowseResponse, BrowseResult, NodeId, QualifiedName, ReferenceDescription, ReferenceTypeId,
    RelativePathElement, ResponseHeader, StatusCode, TranslateBrowsePathsToNodeIdsRequest,
    TranslateBrowsePathsToNodeIdsResponse,
};

use crate::server::ServerCore;
use crate::services::check_operation_count;

/// Resolve browse-name steps from `origin` along forward hierarchical
/// references, returning the first match. This is the simplified browse
/// used by event field resolution and event property stamping.
pub fn browse_simplified_path(
    core: &ServerCore,
    origin: &NodeId,
    path: &[QualifiedName],
) -> Result<NodeId, StatusCode> {
    let hierarchical: NodeId = ReferenceTypeId::HierarchicalReferences.into();
    let mut current = origin.clone();
    for step in path {
        let node = core
            .nodestore
            .get(&current)
            .ok_or(StatusCode::BadNodeIdUnknown)?;
        let mut next = None;
        for reference in &node.base().references {
            if reference.is_inverse || !reference.target_node_id.is_local() {
                continue;
            }
            if !core
                .type_tree
                .is_subtype_of(&reference.reference_type_id, &hierarchical)
            {
                continue;
            }
            let target_id = &reference.target_node_id.node_id;
            if let Some(target) = core.nodestore.get(target_id) {
                if target.browse_name() == step {
                    next = Some(target_id.clone());
                    break;
                }
            }
        }
        current = next.ok_or(StatusCode::BadNotFound)?;
    }
    Ok(current)
}

/// Whether `target` is reachable from `node` by walking the INVERSE
/// direction of the given reference types (and their subtypes). Matches
/// when the nodes are equal.
pub fn is_node_in_tree(
    core: &ServerCore,
    node: &NodeId,
    target: &NodeId,
    reference_types: &[NodeId],
) -> bool {
    let mut visited: Vec<NodeId> = Vec::new();
    let mut stack = vec![node.clone()];
    while let Some(current) = stack.pop() {
        if &current == target {
            return true;
        }
        if visited.contains(&current) {
            continue;
        }
        visited.push(current.clone());
        let Some(n) = core.nodestore.get(&current) else {
            continue;
        };
        for reference in &n.base().references {
            if !reference.is_inverse || !reference.target_node_id.is_local() {
                continue;
            }
            let matches = reference_types.iter().any(|rt| {
                core.type_tree
                    .is_subtype_of(&reference.reference_type_id, rt)
            });
            if matches {
                stack.push(reference.target_node_id.node_id.clone());
            }
        }
    }
    false
}

/// Browse one node.
pub(crate) fn browse_node(
    core: &ServerCore,
    description: &BrowseDescription,
    max_references: usize,
) -> BrowseResult {
    let Some(node) = core.nodestore.get(&description.node_id) else {
        return BrowseResult {
            status_code: StatusCode::BadNodeIdUnknown,
            references: Vec::new(),
        };
    };

    // A set reference type filter must name a known reference type
    if !description.reference_type_id.is_null() {
        let known = core.type_tree.is_subtype_of(
            &description.reference_type_id,
            &ReferenceTypeId::References.into(),
        ) || core
            .nodestore
            .get(&description.reference_type_id)
            .map(|n| n.node_class() == opcua_types::NodeClass::ReferenceType)
            .unwrap_or(false);
        if !known {
            return BrowseResult {
                status_code: StatusCode::BadReferenceTypeIdInvalid,
                references: Vec::new(),
            };
        }
    }

    let mut references = Vec::new();
    for reference in &node.base().references {
        let direction_ok = match description.browse_direction {
            BrowseDirection::Forward => !reference.is_inverse,
            BrowseDirection::Inverse => reference.is_inverse,
            BrowseDirection::Both => true,
        };
        if !direction_ok {
            continue;
        }
        if !description.reference_type_id.is_null() {
            let matches = if description.include_subtypes {
                core.type_tree.is_subtype_of(
                    &reference.reference_type_id,
                    &description.reference_type_id,
                )
            } else {
                reference.reference_type_id == description.reference_type_id
            };
            if !matches {
                continue;
            }
        }

        // Fill in what we know about the target; remote targets stay bare
        let mut entry = ReferenceDescription {
            reference_type_id: reference.reference_type_id.clone(),
            is_forward: !reference.is_inverse,
            node_id: reference.target_node_id.clone(),
            ..Default::default()
        };
        if reference.target_node_id.is_local() {
            if let Some(target) = core.nodestore.get(&reference.target_node_id.node_id) {
                if !description.node_class_mask.accepts(target.node_class()) {
                    continue;
                }
                entry.browse_name = target.browse_name().clone();
                entry.display_name = target.base().display_name.clone();
                entry.node_class = Some(target.node_class());
            }
        }
        references.push(entry);
        if max_references != 0 && references.len() >= max_references {
            break;
        }
    }

    BrowseResult {
        status_code: StatusCode::Good,
        references,
    }
}

/// The Browse service.
pub fn browse(core: &ServerCore, request: &BrowseRequest) -> BrowseResponse {
    if let Err(status) = check_operation_count(
        request.nodes_to_browse.len(),
        core.config.operational.max_operations_per_call,
    ) {
        return BrowseResponse {
            response_header: ResponseHeader::new_service_result(&request.request_header, status),
            results: Vec::new(),
        };
    }

    let results = request
        .nodes_to_browse
        .iter()
        .map(|d| browse_node(core, d, request.requested_max_references_per_node as usize))
        .collect();
    BrowseResponse {
        response_header: ResponseHeader::new_good(&request.request_header),
        results,
    }
}

fn follow_path_element(
    core: &ServerCore,
    from: &NodeId,
    element: &RelativePathElement,
) -> Vec<NodeId> {
    let Some(node) = core.nodestore.get(from) else {
        return Vec::new();
    };
    let hierarchical: NodeId = ReferenceTypeId::HierarchicalReferences.into();
    let filter_type = if element.reference_type_id.is_null() {
        &hierarchical
    } else {
        &element.reference_type_id
    };

    let mut targets = Vec::new();
    for reference in &node.base().references {
        if reference.is_inverse != element.is_inverse || !reference.target_node_id.is_local() {
            continue;
        }
        let matches = if element.include_subtypes || element.reference_type_id.is_null() {
            core.type_tree
                .is_subtype_of(&reference.reference_type_id, filter_type)
        } else {
            &reference.reference_type_id == filter_type
        };
        if !matches {
            continue;
        }
        let target_id = &reference.target_node_id.node_id;
        if let Some(target) = core.nodestore.get(target_id) {
            if target.browse_name() == &element.target_name {
                targets.push(target_id.clone());
            }
        }
    }
    targets
}

/// Resolve one browse path.
pub(crate) fn translate_browse_path(core: &ServerCore, path: &BrowsePath) -> BrowsePathResult {
    if core.nodestore.get(&path.starting_node).is_none() {
        return BrowsePathResult {
            status_code: StatusCode::BadNodeIdUnknown,
            targets: Vec::new(),
        };
    }
    if path.relative_path.is_empty() {
        return BrowsePathResult {
            status_code: StatusCode::BadNothingToDo,
            targets: Vec::new(),
        };
    }

    let mut current = vec![path.starting_node.clone()];
    for element in &path.relative_path {
        let mut next = Vec::new();
        for node in &current {
            for target in follow_path_element(core, node, element) {
                if !next.contains(&target) {
                    next.push(target);
                }
            }
        }
        if next.is_empty() {
            return BrowsePathResult {
                status_code: StatusCode::BadNoMatch,
                targets: Vec::new(),
            };
        }
        current = next;
    }

    BrowsePathResult {
        status_code: StatusCode::Good,
        targets: current
            .into_iter()
            .map(|node_id| BrowsePathTarget {
                target_id: node_id.into(),
                remaining_path_index: u32::MAX,
            })
            .collect(),
    }
}

/// The TranslateBrowsePathsToNodeIds service.
pub fn translate_browse_paths(
    core: &ServerCore,
    request: &TranslateBrowsePathsToNodeIdsRequest,
) -> TranslateBrowsePathsToNodeIdsResponse {
    if let Err(status) = check_operation_count(
        request.browse_paths.len(),
        core.config.operational.max_operations_per_call,
    ) {
        return TranslateBrowsePathsToNodeIdsResponse {
            response_header: ResponseHeader::new_service_result(&request.request_header, status),
            results: Vec::new(),
        };
    }

    let results = request
        .browse_paths
        .iter()
        .map(|p| translate_browse_path(core, p))
        .collect();
    TranslateBrowsePathsToNodeIdsResponse {
        response_header: ResponseHeader::new_good(&request.request_header),
        results,
    }
}
