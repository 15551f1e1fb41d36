//! Scenario tests driving the engine through the service surface, with
//! ticks driven manually instead of timers.

use std::sync::Arc;

use opcua_nodes::{AccessLevel, EventNotifier, ObjectBuilder, Reference, VariableBuilder};
use opcua_types::{
    AttributeId, ContentFilter, ContentFilterElement, CreateMonitoredItemsRequest,
    CreateSubscriptionRequest, DataTypeId, DateTime, EventFilter, FilterOperand, FilterOperator,
    MonitoredItemCreateRequest, MonitoringFilter, MonitoringMode, MonitoringParameters, NodeId,
    NotificationData, ObjectId, ObjectTypeId, PublishRequest, ReadValueId, ReferenceTypeId,
    RepublishRequest, RequestHeader, SetMonitoringModeRequest, SimpleAttributeOperand, StatusCode,
    SubStatusBits, SubscriptionAcknowledgement, TimestampsToReturn, Variant,
};

use crate::config::ServerConfig;
use crate::server::{add_base_event_type, add_server_object, ServerCore};
use crate::services;
use crate::session::tests::RecordingChannel;

mod async_method_tests;
mod event_tests;
mod node_service_tests;

pub(crate) fn setup() -> (ServerCore, u32, Arc<RecordingChannel>) {
    let mut core = ServerCore::new(ServerConfig::new("test-server"));
    add_server_object(&mut core);
    add_base_event_type(&mut core);
    let session_id = core.create_session("test-session");
    let channel = Arc::new(RecordingChannel::default());
    core.attach_channel(session_id, channel.clone());
    (core, session_id, channel)
}

/// Add a UInt32 variable below the objects folder.
pub(crate) fn add_test_variable(core: &mut ServerCore, id: u32, value: u32) -> NodeId {
    let node_id = NodeId::new(1, id);
    let mut variable = VariableBuilder::new(&node_id, format!("Var{id}").as_str(), "TestVar")
        .value(value)
        .data_type(DataTypeId::UInt32)
        .access_level(AccessLevel::CURRENT_READ | AccessLevel::CURRENT_WRITE)
        .build();
    variable.base.insert_reference(Reference::inverse(
        ReferenceTypeId::Organizes,
        ObjectId::ObjectsFolder.into(),
    ));
    core.nodestore.insert(variable.into()).unwrap();
    core.nodestore
        .edit(&ObjectId::ObjectsFolder.into(), |node| {
            node.base_mut().insert_reference(Reference::forward(
                ReferenceTypeId::Organizes,
                node_id.clone(),
            ));
        })
        .unwrap();
    node_id
}

/// Add an event-notifying object below the objects folder.
pub(crate) fn add_notifier_object(core: &mut ServerCore, id: u32) -> NodeId {
    let node_id = NodeId::new(1, id);
    let mut object = ObjectBuilder::new(&node_id, format!("Obj{id}").as_str(), "TestObj")
        .event_notifier(EventNotifier::SUBSCRIBE_TO_EVENTS)
        .build();
    object.base.insert_reference(Reference::inverse(
        ReferenceTypeId::HasNotifier,
        ObjectId::Server.into(),
    ));
    object.base.insert_reference(Reference::inverse(
        ReferenceTypeId::Organizes,
        ObjectId::ObjectsFolder.into(),
    ));
    core.nodestore.insert(object.into()).unwrap();
    core.nodestore
        .edit(&ObjectId::ObjectsFolder.into(), |node| {
            node.base_mut().insert_reference(Reference::forward(
                ReferenceTypeId::Organizes,
                node_id.clone(),
            ));
        })
        .unwrap();
    core.nodestore
        .edit(&ObjectId::Server.into(), |node| {
            node.base_mut().insert_reference(Reference::forward(
                ReferenceTypeId::HasNotifier,
                node_id.clone(),
            ));
        })
        .unwrap();
    node_id
}

pub(crate) fn create_subscription(
    core: &mut ServerCore,
    session_id: u32,
    publishing_interval: f64,
    lifetime_count: u32,
    keep_alive_count: u32,
) -> u32 {
    let response = services::subscription::create_subscription(
        core,
        session_id,
        &CreateSubscriptionRequest {
            request_header: RequestHeader::new(1),
            requested_publishing_interval: publishing_interval,
            requested_lifetime_count: lifetime_count,
            requested_max_keep_alive_count: keep_alive_count,
            max_notifications_per_publish: 1000,
            publishing_enabled: true,
            priority: 0,
        },
    );
    assert_eq!(response.response_header.service_result, StatusCode::Good);
    response.subscription_id
}

pub(crate) fn create_value_item(
    core: &mut ServerCore,
    session_id: u32,
    subscription_id: u32,
    node_id: &NodeId,
    queue_size: u32,
    discard_oldest: bool,
    mode: MonitoringMode,
) -> u32 {
    let response = services::monitored_items::create_monitored_items(
        core,
        session_id,
        &CreateMonitoredItemsRequest {
            request_header: RequestHeader::new(2),
            subscription_id,
            timestamps_to_return: TimestampsToReturn::Both,
            items_to_create: vec![MonitoredItemCreateRequest {
                item_to_monitor: ReadValueId::value_of(node_id.clone()),
                monitoring_mode: mode,
                requested_parameters: MonitoringParameters {
                    client_handle: 17,
                    sampling_interval: 100.0,
                    filter: MonitoringFilter::None,
                    queue_size,
                    discard_oldest,
                },
            }],
        },
    );
    assert_eq!(response.response_header.service_result, StatusCode::Good);
    let result = &response.results[0];
    assert_eq!(result.status_code, StatusCode::Good);
    result.monitored_item_id
}

pub(crate) fn create_event_item(
    core: &mut ServerCore,
    session_id: u32,
    subscription_id: u32,
    node_id: &NodeId,
    filter: EventFilter,
) -> (StatusCode, u32) {
    let response = services::monitored_items::create_monitored_items(
        core,
        session_id,
        &CreateMonitoredItemsRequest {
            request_header: RequestHeader::new(3),
            subscription_id,
            timestamps_to_return: TimestampsToReturn::Both,
            items_to_create: vec![MonitoredItemCreateRequest {
                item_to_monitor: ReadValueId {
                    node_id: node_id.clone(),
                    attribute_id: AttributeId::EventNotifier as u32,
                    index_range: String::new(),
                },
                monitoring_mode: MonitoringMode::Reporting,
                requested_parameters: MonitoringParameters {
                    client_handle: 33,
                    sampling_interval: 0.0,
                    filter: MonitoringFilter::Event(filter),
                    queue_size: 10,
                    discard_oldest: true,
                },
            }],
        },
    );
    let result = &response.results[0];
    (result.status_code, result.monitored_item_id)
}

/// Park a publish request on the session.
pub(crate) fn queue_publish(core: &mut ServerCore, session_id: u32, request_id: u32) {
    services::subscription::publish(
        core,
        session_id,
        request_id,
        &PublishRequest {
            request_header: RequestHeader::new(request_id),
            subscription_acknowledgements: Vec::new(),
        },
    );
}

/// Park a publish request carrying acknowledgements.
pub(crate) fn queue_publish_with_acks(
    core: &mut ServerCore,
    session_id: u32,
    request_id: u32,
    acks: Vec<SubscriptionAcknowledgement>,
) {
    services::subscription::publish(
        core,
        session_id,
        request_id,
        &PublishRequest {
            request_header: RequestHeader::new(request_id),
            subscription_acknowledgements: acks,
        },
    );
}

/// The data change values delivered by the most recent publish response.
pub(crate) fn last_published_values(channel: &RecordingChannel) -> Vec<(u32, Variant, StatusCode)> {
    let responses = channel.publish_responses.lock();
    let (_, response) = responses.last().expect("a publish response was sent");
    let mut out = Vec::new();
    for data in &response.notification_message.notification_data {
        if let NotificationData::DataChange(dcn) = data {
            for item in &dcn.monitored_items {
                out.push((
                    item.client_handle,
                    item.value.value.clone().unwrap_or(Variant::Empty),
                    item.value.status(),
                ));
            }
        }
    }
    out
}

/// A where clause consisting of a single OfType element.
pub(crate) fn of_type_filter(type_id: NodeId) -> EventFilter {
    EventFilter {
        select_clauses: vec![SimpleAttributeOperand::new_value(
            ObjectTypeId::BaseEventType,
            "Severity",
        )],
        where_clause: ContentFilter {
            elements: vec![ContentFilterElement::new(
                FilterOperator::OfType,
                vec![FilterOperand::Literal(Variant::from(type_id))],
            )],
        },
    }
}

#[test]
fn read_write_roundtrip_through_services() {
    let (mut core, _session_id, _) = setup();
    let node_id = add_test_variable(&mut core, 100, 7);

    let response = services::attribute::read(
        &core,
        &opcua_types::ReadRequest {
            request_header: RequestHeader::new(1),
            max_age: 0.0,
            timestamps_to_return: TimestampsToReturn::Source,
            nodes_to_read: vec![ReadValueId::value_of(node_id.clone())],
        },
    );
    assert_eq!(response.results.len(), 1);
    assert_eq!(response.results[0].value, Some(Variant::from(7u32)));
    assert!(response.results[0].source_timestamp.is_some());
    assert!(response.results[0].server_timestamp.is_none());

    assert_eq!(
        services::attribute::write_value(&mut core, &node_id, 8u32),
        StatusCode::Good
    );
    let response = services::attribute::read(
        &core,
        &opcua_types::ReadRequest {
            request_header: RequestHeader::new(2),
            max_age: 0.0,
            timestamps_to_return: TimestampsToReturn::Both,
            nodes_to_read: vec![ReadValueId::value_of(node_id)],
        },
    );
    assert_eq!(response.results[0].value, Some(Variant::from(8u32)));
}

#[test]
fn read_reports_per_item_failures() {
    let (core, _, _) = setup();
    let response = services::attribute::read(
        &core,
        &opcua_types::ReadRequest {
            request_header: RequestHeader::new(1),
            max_age: 0.0,
            timestamps_to_return: TimestampsToReturn::Both,
            nodes_to_read: vec![
                ReadValueId::value_of(NodeId::new(9, 999u32)),
                ReadValueId {
                    node_id: ObjectId::Server.into(),
                    attribute_id: 99,
                    index_range: String::new(),
                },
            ],
        },
    );
    // The service itself succeeds, failures are per item
    assert_eq!(response.response_header.service_result, StatusCode::Good);
    assert_eq!(response.results[0].status(), StatusCode::BadNodeIdUnknown);
    assert_eq!(
        response.results[1].status(),
        StatusCode::BadAttributeIdInvalid
    );
}

#[test]
fn empty_read_is_nothing_to_do() {
    let (core, _, _) = setup();
    let response = services::attribute::read(
        &core,
        &opcua_types::ReadRequest {
            request_header: RequestHeader::new(1),
            max_age: 0.0,
            timestamps_to_return: TimestampsToReturn::Both,
            nodes_to_read: Vec::new(),
        },
    );
    assert_eq!(
        response.response_header.service_result,
        StatusCode::BadNothingToDo
    );
}

#[test]
fn canonical_encoding_roundtrip_is_stable() {
    // The change detector must never report a change when the canonical
    // encoding is byte identical
    use opcua_types::encoding::encode_data_value;
    let value = opcua_types::DataValue::new_at(
        Variant::from_array(
            opcua_types::VariantScalarTypeId::Double,
            vec![Variant::from(1.5f64), Variant::from(-2.5f64)],
        ),
        DateTime::from_ticks(777),
    );
    assert_eq!(encode_data_value(&value), encode_data_value(&value.clone()));
}
