//! AddNodes, DeleteNodes, AddReferences and DeleteReferences.

use tracing::debug;

use opcua_nodes::{
    AccessLevel, DataTypeNode, EventNotifier, MethodNode, NodeBase, NodeType, ObjectNode,
    ObjectTypeNode, Reference, ReferenceTypeNode, VariableNode, VariableTypeNode, ViewNode,
    WriteMask,
};
use opcua_types::{
    AddNodesItem, AddNodesRequest, AddNodesResponse, AddNodesResult, AddReferencesItem,
    AddReferencesRequest, AddReferencesResponse, DeleteNodesItem, DeleteNodesRequest,
    DeleteNodesResponse, DeleteReferencesItem, DeleteReferencesRequest, DeleteReferencesResponse,
    NodeAttributes, NodeClass, NodeId, ReferenceTypeId, ResponseHeader, StatusCode,
};

use crate::server::ServerCore;
use crate::services::check_operation_count;

fn build_node(node_id: NodeId, item: &AddNodesItem) -> NodeType {
    let mut base = NodeBase::new(&node_id, item.browse_name.clone(), item.browse_name.name.as_str());
    match &item.node_attributes {
        NodeAttributes::Object { common, event_notifier } => {
            apply_common(&mut base, common);
            NodeType::Object(ObjectNode {
                base,
                event_notifier: EventNotifier::from_bits_truncate(*event_notifier),
            })
        }
        NodeAttributes::Variable {
            common,
            value,
            data_type,
            value_rank,
            access_level,
            minimum_sampling_interval,
            historizing,
        } => {
            apply_common(&mut base, common);
            NodeType::Variable(VariableNode {
                base,
                value: opcua_nodes::VariableValue::Static(value.clone()),
                data_type: data_type.clone(),
                value_rank: *value_rank,
                array_dimensions: None,
                access_level: AccessLevel::from_bits_truncate(*access_level),
                user_access_level: AccessLevel::from_bits_truncate(*access_level),
                minimum_sampling_interval: *minimum_sampling_interval,
                historizing: *historizing,
            })
        }
        NodeAttributes::Method { common, executable } => {
            apply_common(&mut base, common);
            NodeType::Method(MethodNode {
                base,
                executable: *executable,
                user_executable: *executable,
                is_async: false,
                callback: None,
            })
        }
        NodeAttributes::ObjectType { common, is_abstract } => {
            apply_common(&mut base, common);
            NodeType::ObjectType(ObjectTypeNode {
                base,
                is_abstract: *is_abstract,
            })
        }
        NodeAttributes::VariableType { common, is_abstract } => {
            apply_common(&mut base, common);
            NodeType::VariableType(VariableTypeNode {
                base,
                value: None,
                data_type: NodeId::null(),
                is_abstract: *is_abstract,
                value_rank: -1,
            })
        }
        NodeAttributes::ReferenceType {
            common,
            is_abstract,
            symmetric,
            inverse_name,
        } => {
            apply_common(&mut base, common);
            NodeType::ReferenceType(ReferenceTypeNode {
                base,
                is_abstract: *is_abstract,
                symmetric: *symmetric,
                inverse_name: Some(inverse_name.clone()),
            })
        }
        NodeAttributes::DataType { common, is_abstract } => {
            apply_common(&mut base, common);
            NodeType::DataType(DataTypeNode {
                base,
                is_abstract: *is_abstract,
            })
        }
        NodeAttributes::View {
            common,
            contains_no_loops,
            event_notifier,
        } => {
            apply_common(&mut base, common);
            NodeType::View(ViewNode {
                base,
                contains_no_loops: *contains_no_loops,
                event_notifier: EventNotifier::from_bits_truncate(*event_notifier),
            })
        }
    }
}

fn apply_common(base: &mut NodeBase, common: &opcua_types::CommonNodeAttributes) {
    base.display_name = common.display_name.clone();
    if !common.description.text.is_empty() {
        base.description = Some(common.description.clone());
    }
    base.write_mask = WriteMask::from_bits_truncate(common.write_mask);
}

/// Add one node: insert it, wire the parent reference pair, the type
/// definition reference, and keep the type tree current for subtype
/// insertions.
pub(crate) fn add_node(core: &mut ServerCore, item: &AddNodesItem) -> AddNodesResult {
    // The parent must exist locally
    if !item.parent_node_id.is_local()
        || core.nodestore.get(&item.parent_node_id.node_id).is_none()
    {
        return AddNodesResult {
            status_code: StatusCode::BadNodeIdUnknown,
            added_node_id: NodeId::null(),
        };
    }
    if item.browse_name.is_null() {
        return AddNodesResult {
            status_code: StatusCode::BadBrowseNameInvalid,
            added_node_id: NodeId::null(),
        };
    }
    let references: NodeId = ReferenceTypeId::References.into();
    if !core
        .type_tree
        .is_subtype_of(&item.reference_type_id, &references)
    {
        return AddNodesResult {
            status_code: StatusCode::BadReferenceTypeIdInvalid,
            added_node_id: NodeId::null(),
        };
    }

    let requested = if item.requested_new_node_id.is_local() {
        item.requested_new_node_id.node_id.clone()
    } else {
        NodeId::null()
    };
    let mut node = build_node(requested, item);

    // Wire the child side references before insertion
    node.base_mut().insert_reference(Reference::inverse(
        item.reference_type_id.clone(),
        item.parent_node_id.node_id.clone(),
    ));
    if item.type_definition.is_local() && !item.type_definition.node_id.is_null() {
        node.base_mut().insert_reference(Reference::forward(
            ReferenceTypeId::HasTypeDefinition,
            item.type_definition.node_id.clone(),
        ));
    }
    let node_class = node.node_class();

    let added_node_id = match core.nodestore.insert(node) {
        Ok(id) => id,
        Err(status) => {
            return AddNodesResult {
                status_code: status,
                added_node_id: NodeId::null(),
            }
        }
    };

    // The forward reference at the parent
    let parent_result = core.nodestore.edit(&item.parent_node_id.node_id, |parent| {
        parent.base_mut().insert_reference(Reference::forward(
            item.reference_type_id.clone(),
            added_node_id.clone(),
        ));
    });
    if let Err(status) = parent_result {
        let _ = core.nodestore.remove(&added_node_id);
        return AddNodesResult {
            status_code: status,
            added_node_id: NodeId::null(),
        };
    }

    // Keep the subtype hierarchy current when a type is inserted below
    // another type
    let has_subtype: NodeId = ReferenceTypeId::HasSubtype.into();
    let is_type_class = matches!(
        node_class,
        NodeClass::ObjectType
            | NodeClass::VariableType
            | NodeClass::ReferenceType
            | NodeClass::DataType
    );
    if is_type_class && item.reference_type_id == has_subtype {
        core.type_tree
            .add_subtype(item.parent_node_id.node_id.clone(), added_node_id.clone());
    }

    debug!("Added node {} under {}", added_node_id, item.parent_node_id);
    AddNodesResult {
        status_code: StatusCode::Good,
        added_node_id,
    }
}

/// The AddNodes service.
pub fn add_nodes(core: &mut ServerCore, request: &AddNodesRequest) -> AddNodesResponse {
    if let Err(status) = check_operation_count(
        request.nodes_to_add.len(),
        core.config.operational.max_operations_per_call,
    ) {
        return AddNodesResponse {
            response_header: ResponseHeader::new_service_result(&request.request_header, status),
            results: Vec::new(),
        };
    }
    let results = request
        .nodes_to_add
        .iter()
        .map(|item| add_node(core, item))
        .collect();
    AddNodesResponse {
        response_header: ResponseHeader::new_good(&request.request_header),
        results,
    }
}

fn delete_node(core: &mut ServerCore, item: &DeleteNodesItem) -> StatusCode {
    let Some(node) = core.nodestore.get(&item.node_id) else {
        return StatusCode::BadNodeIdUnknown;
    };
    // Drop the inverse halves held by referenced local nodes
    let references: Vec<Reference> = node.base().references.clone();
    let node_class = node.node_class();
    if let Err(status) = core.nodestore.remove(&item.node_id) {
        return status;
    }
    for reference in references {
        if !reference.target_node_id.is_local() {
            continue;
        }
        let inverted = reference.inverted(item.node_id.clone());
        let _ = core
            .nodestore
            .edit(&reference.target_node_id.node_id, |target| {
                target.base_mut().remove_reference(&inverted);
            });
    }
    if item.delete_target_references {
        // A full sweep for references the node did not know about
        let mut holders = Vec::new();
        core.nodestore.iterate(|candidate| {
            if candidate
                .base()
                .references
                .iter()
                .any(|r| r.target_node_id.is_local() && r.target_node_id.node_id == item.node_id)
            {
                holders.push(candidate.node_id().clone());
            }
        });
        for holder in holders {
            let _ = core.nodestore.edit(&holder, |n| {
                n.base_mut().references.retain(|r| {
                    !(r.target_node_id.is_local() && r.target_node_id.node_id == item.node_id)
                });
            });
        }
    }
    if matches!(
        node_class,
        NodeClass::ObjectType
            | NodeClass::VariableType
            | NodeClass::ReferenceType
            | NodeClass::DataType
    ) {
        core.type_tree.remove(&item.node_id);
    }
    StatusCode::Good
}

/// Remove a node and the nodes aggregated below it, used when a triggered
/// event node asked for deletion.
pub(crate) fn delete_node_with_children(core: &mut ServerCore, node_id: &NodeId) {
    let mut children = Vec::new();
    if let Some(node) = core.nodestore.get(node_id) {
        let aggregates: NodeId = ReferenceTypeId::Aggregates.into();
        for reference in &node.base().references {
            if !reference.is_inverse
                && reference.target_node_id.is_local()
                && core
                    .type_tree
                    .is_subtype_of(&reference.reference_type_id, &aggregates)
            {
                children.push(reference.target_node_id.node_id.clone());
            }
        }
    }
    for child in children {
        let _ = delete_node(
            core,
            &DeleteNodesItem {
                node_id: child,
                delete_target_references: false,
            },
        );
    }
    let _ = delete_node(
        core,
        &DeleteNodesItem {
            node_id: node_id.clone(),
            delete_target_references: false,
        },
    );
}

/// The DeleteNodes service.
pub fn delete_nodes(core: &mut ServerCore, request: &DeleteNodesRequest) -> DeleteNodesResponse {
    if let Err(status) = check_operation_count(
        request.nodes_to_delete.len(),
        core.config.operational.max_operations_per_call,
    ) {
        return DeleteNodesResponse {
            response_header: ResponseHeader::new_service_result(&request.request_header, status),
            results: Vec::new(),
        };
    }
    let results = request
        .nodes_to_delete
        .iter()
        .map(|item| delete_node(core, item))
        .collect();
    DeleteNodesResponse {
        response_header: ResponseHeader::new_good(&request.request_header),
        results,
    }
}

fn add_reference(core: &mut ServerCore, item: &AddReferencesItem) -> StatusCode {
    if core.nodestore.get(&item.source_node_id).is_none() {
        return StatusCode::BadSourceNodeIdInvalid;
    }
    let references: NodeId = ReferenceTypeId::References.into();
    if !core
        .type_tree
        .is_subtype_of(&item.reference_type_id, &references)
    {
        return StatusCode::BadReferenceTypeIdInvalid;
    }

    let reference = Reference {
        reference_type_id: item.reference_type_id.clone(),
        is_inverse: !item.is_forward,
        target_node_id: item.target_node_id.clone(),
    };
    let inserted = core
        .nodestore
        .edit(&item.source_node_id, |node| {
            node.base_mut().insert_reference(reference.clone())
        })
        .unwrap_or(false);
    if !inserted {
        return StatusCode::BadReferenceNotAllowed;
    }

    // The inverse half lands at the target, unless the target is outside
    // any local namespace
    if item.target_node_id.is_local() {
        let target_id = item.target_node_id.node_id.clone();
        if core.nodestore.get(&target_id).is_none() {
            return StatusCode::BadTargetNodeIdInvalid;
        }
        if let Some(expected_class) = item.target_node_class {
            let matches = core
                .nodestore
                .get(&target_id)
                .map(|n| n.node_class() == expected_class)
                .unwrap_or(false);
            if !matches {
                return StatusCode::BadNodeClassInvalid;
            }
        }
        let inverted = reference.inverted(item.source_node_id.clone());
        let _ = core.nodestore.edit(&target_id, |node| {
            node.base_mut().insert_reference(inverted);
        });
    }
    StatusCode::Good
}

/// The AddReferences service.
pub fn add_references(
    core: &mut ServerCore,
    request: &AddReferencesRequest,
) -> AddReferencesResponse {
    if let Err(status) = check_operation_count(
        request.references_to_add.len(),
        core.config.operational.max_operations_per_call,
    ) {
        return AddReferencesResponse {
            response_header: ResponseHeader::new_service_result(&request.request_header, status),
            results: Vec::new(),
        };
    }
    let results = request
        .references_to_add
        .iter()
        .map(|item| add_reference(core, item))
        .collect();
    AddReferencesResponse {
        response_header: ResponseHeader::new_good(&request.request_header),
        results,
    }
}

fn delete_reference(core: &mut ServerCore, item: &DeleteReferencesItem) -> StatusCode {
    if core.nodestore.get(&item.source_node_id).is_none() {
        return StatusCode::BadSourceNodeIdInvalid;
    }
    let reference = Reference {
        reference_type_id: item.reference_type_id.clone(),
        is_inverse: !item.is_forward,
        target_node_id: item.target_node_id.clone(),
    };
    let removed = core
        .nodestore
        .edit(&item.source_node_id, |node| {
            node.base_mut().remove_reference(&reference)
        })
        .unwrap_or(false);
    if !removed {
        return StatusCode::BadNodeIdUnknown;
    }
    if item.delete_bidirectional && item.target_node_id.is_local() {
        let inverted = reference.inverted(item.source_node_id.clone());
        let _ = core
            .nodestore
            .edit(&item.target_node_id.node_id, |node| {
                node.base_mut().remove_reference(&inverted);
            });
    }
    StatusCode::Good
}

/// The DeleteReferences service.
pub fn delete_references(
    core: &mut ServerCore,
    request: &DeleteReferencesRequest,
) -> DeleteReferencesResponse {
    if let Err(status) = check_operation_count(
        request.references_to_delete.len(),
        core.config.operational.max_operations_per_call,
    ) {
        return DeleteReferencesResponse {
            response_header: ResponseHeader::new_service_result(&request.request_header, status),
            results: Vec::new(),
        };
    }
    let results = request
        .references_to_delete
        .iter()
        .map(|item| delete_reference(core, item))
        .collect();
    DeleteReferencesResponse {
        response_header: ResponseHeader::new_good(&request.request_header),
        results,
    }
}
