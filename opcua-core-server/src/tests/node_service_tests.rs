use super::*;
use opcua_types::{
    AddNodesItem, AddNodesRequest, AddReferencesItem, AddReferencesRequest, BrowseDescription,
    BrowseDirection, BrowsePath, BrowseRequest, CommonNodeAttributes, DataValue,
    DeleteNodesItem, DeleteNodesRequest, DeleteReferencesItem, DeleteReferencesRequest,
    ExpandedNodeId, NodeAttributes, NodeClass, NodeClassMask, RelativePathElement,
    TranslateBrowsePathsToNodeIdsRequest,
};

fn add_folder_object(core: &mut ServerCore, name: &str) -> NodeId {
    let response = services::node_management::add_nodes(
        core,
        &AddNodesRequest {
            request_header: RequestHeader::new(1),
            nodes_to_add: vec![AddNodesItem {
                requested_new_node_id: ExpandedNodeId::default(),
                parent_node_id: ExpandedNodeId::local(ObjectId::ObjectsFolder.into()),
                reference_type_id: ReferenceTypeId::Organizes.into(),
                browse_name: name.into(),
                node_attributes: NodeAttributes::Object {
                    common: CommonNodeAttributes {
                        display_name: name.into(),
                        ..Default::default()
                    },
                    event_notifier: 0,
                },
                type_definition: ExpandedNodeId::local(ObjectTypeId::FolderType.into()),
            }],
        },
    );
    let result = &response.results[0];
    assert_eq!(result.status_code, StatusCode::Good);
    result.added_node_id.clone()
}

#[test]
fn add_nodes_wires_both_reference_halves() {
    let (mut core, _, _) = setup();
    let folder_id = add_folder_object(&mut core, "Folder1");

    // The server assigned an id in namespace 1
    assert_eq!(folder_id.namespace, 1);

    // Forward half at the parent
    let parent = core.nodestore.get(&ObjectId::ObjectsFolder.into()).unwrap();
    assert!(parent.base().references.iter().any(|r| {
        !r.is_inverse
            && r.target_node_id.node_id == folder_id
            && ReferenceTypeId::Organizes == r.reference_type_id
    }));
    // Inverse half plus the type definition at the child
    let child = core.nodestore.get(&folder_id).unwrap();
    assert!(child
        .base()
        .references
        .iter()
        .any(|r| r.is_inverse && r.target_node_id.node_id == ObjectId::ObjectsFolder));
    assert!(child.base().references.iter().any(|r| {
        !r.is_inverse && ReferenceTypeId::HasTypeDefinition == r.reference_type_id
    }));
}

#[test]
fn add_node_with_explicit_id_conflicts() {
    let (mut core, _, _) = setup();
    let existing = add_test_variable(&mut core, 100, 0);

    let response = services::node_management::add_nodes(
        &mut core,
        &AddNodesRequest {
            request_header: RequestHeader::new(1),
            nodes_to_add: vec![AddNodesItem {
                requested_new_node_id: ExpandedNodeId::local(existing),
                parent_node_id: ExpandedNodeId::local(ObjectId::ObjectsFolder.into()),
                reference_type_id: ReferenceTypeId::Organizes.into(),
                browse_name: "Duplicate".into(),
                node_attributes: NodeAttributes::Variable {
                    common: CommonNodeAttributes::default(),
                    value: DataValue::new_now(1u32),
                    data_type: DataTypeId::UInt32.into(),
                    value_rank: -1,
                    access_level: 1,
                    minimum_sampling_interval: 0.0,
                    historizing: false,
                },
                type_definition: ExpandedNodeId::default(),
            }],
        },
    );
    assert_eq!(response.results[0].status_code, StatusCode::BadNodeIdExists);
}

#[test]
fn browse_filters_by_direction_and_reference_type() {
    let (mut core, _, _) = setup();
    let variable_id = add_test_variable(&mut core, 100, 0);

    // Forward Organizes from the objects folder finds the variable
    let response = services::view::browse(
        &core,
        &BrowseRequest {
            request_header: RequestHeader::new(1),
            requested_max_references_per_node: 0,
            nodes_to_browse: vec![BrowseDescription {
                node_id: ObjectId::ObjectsFolder.into(),
                browse_direction: BrowseDirection::Forward,
                reference_type_id: ReferenceTypeId::Organizes.into(),
                include_subtypes: true,
                node_class_mask: NodeClassMask::empty(),
            }],
        },
    );
    let result = &response.results[0];
    assert_eq!(result.status_code, StatusCode::Good);
    assert!(result
        .references
        .iter()
        .any(|r| r.node_id.node_id == variable_id));
    // Target metadata is filled in for local targets
    let entry = result
        .references
        .iter()
        .find(|r| r.node_id.node_id == variable_id)
        .unwrap();
    assert_eq!(entry.node_class, Some(NodeClass::Variable));
    assert_eq!(entry.browse_name.name, "Var100");

    // Inverse direction from the variable leads back to the folder
    let response = services::view::browse(
        &core,
        &BrowseRequest {
            request_header: RequestHeader::new(2),
            requested_max_references_per_node: 0,
            nodes_to_browse: vec![BrowseDescription {
                node_id: variable_id.clone(),
                browse_direction: BrowseDirection::Inverse,
                reference_type_id: NodeId::null(),
                include_subtypes: true,
                node_class_mask: NodeClassMask::empty(),
            }],
        },
    );
    assert!(response.results[0]
        .references
        .iter()
        .any(|r| r.node_id.node_id == ObjectId::ObjectsFolder));

    // A node class mask excludes non-matching targets
    let response = services::view::browse(
        &core,
        &BrowseRequest {
            request_header: RequestHeader::new(3),
            requested_max_references_per_node: 0,
            nodes_to_browse: vec![BrowseDescription {
                node_id: ObjectId::ObjectsFolder.into(),
                browse_direction: BrowseDirection::Forward,
                reference_type_id: NodeId::null(),
                include_subtypes: true,
                node_class_mask: NodeClassMask::METHOD,
            }],
        },
    );
    assert!(response.results[0].references.is_empty());

    // Unknown nodes fail per item
    let response = services::view::browse(
        &core,
        &BrowseRequest {
            request_header: RequestHeader::new(4),
            requested_max_references_per_node: 0,
            nodes_to_browse: vec![BrowseDescription {
                node_id: NodeId::new(9, 1u32),
                ..Default::default()
            }],
        },
    );
    assert_eq!(
        response.results[0].status_code,
        StatusCode::BadNodeIdUnknown
    );
}

#[test]
fn translate_browse_path_resolves_and_reports_no_match() {
    let (mut core, _, _) = setup();
    let variable_id = add_test_variable(&mut core, 100, 0);

    let response = services::view::translate_browse_paths(
        &core,
        &TranslateBrowsePathsToNodeIdsRequest {
            request_header: RequestHeader::new(1),
            browse_paths: vec![
                BrowsePath {
                    starting_node: ObjectId::ObjectsFolder.into(),
                    relative_path: vec![RelativePathElement {
                        reference_type_id: NodeId::null(),
                        is_inverse: false,
                        include_subtypes: true,
                        target_name: "Var100".into(),
                    }],
                },
                BrowsePath {
                    starting_node: ObjectId::ObjectsFolder.into(),
                    relative_path: vec![RelativePathElement {
                        reference_type_id: NodeId::null(),
                        is_inverse: false,
                        include_subtypes: true,
                        target_name: "Nowhere".into(),
                    }],
                },
            ],
        },
    );
    let hit = &response.results[0];
    assert_eq!(hit.status_code, StatusCode::Good);
    assert_eq!(hit.targets[0].target_id.node_id, variable_id);
    assert_eq!(hit.targets[0].remaining_path_index, u32::MAX);
    assert_eq!(response.results[1].status_code, StatusCode::BadNoMatch);
}

#[test]
fn add_reference_inserts_inverse_at_local_target() {
    let (mut core, _, _) = setup();
    let a = add_folder_object(&mut core, "A");
    let b = add_folder_object(&mut core, "B");

    let response = services::node_management::add_references(
        &mut core,
        &AddReferencesRequest {
            request_header: RequestHeader::new(1),
            references_to_add: vec![AddReferencesItem {
                source_node_id: a.clone(),
                reference_type_id: ReferenceTypeId::Organizes.into(),
                is_forward: true,
                target_node_id: ExpandedNodeId::local(b.clone()),
                target_node_class: Some(NodeClass::Object),
            }],
        },
    );
    assert_eq!(response.results[0], StatusCode::Good);

    let target = core.nodestore.get(&b).unwrap();
    assert!(target
        .base()
        .references
        .iter()
        .any(|r| r.is_inverse && r.target_node_id.node_id == a));

    // A remote target gets no inverse half and no existence check
    let response = services::node_management::add_references(
        &mut core,
        &AddReferencesRequest {
            request_header: RequestHeader::new(2),
            references_to_add: vec![AddReferencesItem {
                source_node_id: a.clone(),
                reference_type_id: ReferenceTypeId::Organizes.into(),
                is_forward: true,
                target_node_id: ExpandedNodeId {
                    node_id: NodeId::new(1, 424242u32),
                    namespace_uri: Some("opc.tcp://elsewhere".to_owned()),
                    server_index: 1,
                },
                target_node_class: None,
            }],
        },
    );
    assert_eq!(response.results[0], StatusCode::Good);
}

#[test]
fn delete_reference_and_node_cleanup() {
    let (mut core, _, _) = setup();
    let folder = add_folder_object(&mut core, "Doomed");

    // Delete the parent reference pair explicitly
    let response = services::node_management::delete_references(
        &mut core,
        &DeleteReferencesRequest {
            request_header: RequestHeader::new(1),
            references_to_delete: vec![DeleteReferencesItem {
                source_node_id: ObjectId::ObjectsFolder.into(),
                reference_type_id: ReferenceTypeId::Organizes.into(),
                is_forward: true,
                target_node_id: ExpandedNodeId::local(folder.clone()),
                delete_bidirectional: true,
            }],
        },
    );
    assert_eq!(response.results[0], StatusCode::Good);
    let child = core.nodestore.get(&folder).unwrap();
    assert!(!child.base().references.iter().any(|r| r.is_inverse));

    // Delete the node itself
    let response = services::node_management::delete_nodes(
        &mut core,
        &DeleteNodesRequest {
            request_header: RequestHeader::new(2),
            nodes_to_delete: vec![DeleteNodesItem {
                node_id: folder.clone(),
                delete_target_references: true,
            }],
        },
    );
    assert_eq!(response.results[0], StatusCode::Good);
    assert!(core.nodestore.get(&folder).is_none());
    // Deleting again reports the unknown id
    let response = services::node_management::delete_nodes(
        &mut core,
        &DeleteNodesRequest {
            request_header: RequestHeader::new(3),
            nodes_to_delete: vec![DeleteNodesItem {
                node_id: folder,
                delete_target_references: false,
            }],
        },
    );
    assert_eq!(response.results[0], StatusCode::BadNodeIdUnknown);
}

#[test]
fn deleting_a_node_drops_inverse_halves_elsewhere() {
    let (mut core, _, _) = setup();
    let folder = add_folder_object(&mut core, "Parent");

    services::node_management::delete_nodes(
        &mut core,
        &DeleteNodesRequest {
            request_header: RequestHeader::new(1),
            nodes_to_delete: vec![DeleteNodesItem {
                node_id: folder.clone(),
                delete_target_references: true,
            }],
        },
    );
    // The objects folder no longer references the deleted node
    let parent = core.nodestore.get(&ObjectId::ObjectsFolder.into()).unwrap();
    assert!(!parent
        .base()
        .references
        .iter()
        .any(|r| r.target_node_id.node_id == folder));
}
