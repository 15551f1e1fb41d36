//! Timer driven end-to-end behavior of the [`opcua_server::Server`]
//! runtime, using tokio's paused clock.

use std::sync::Arc;
use std::time::Duration;

use opcua_base::sync::Mutex;
use opcua_nodes::{AccessLevel, Reference, VariableBuilder};
use opcua_server::{server::add_server_object, ResponseSender, Server, ServerConfig};
use opcua_types::{
    CallResponse, CreateMonitoredItemsRequest, CreateSubscriptionRequest, DataTypeId,
    MonitoredItemCreateRequest, MonitoringMode, MonitoringParameters, NodeId, ObjectId,
    PublishRequest, PublishResponse, ReadValueId, ReferenceTypeId, RequestHeader, StatusCode,
    TimestampsToReturn, Variant,
};

#[derive(Default)]
struct RecordingChannel {
    publish_responses: Mutex<Vec<PublishResponse>>,
}

impl ResponseSender for RecordingChannel {
    fn send_publish_response(&self, _request_id: u32, response: PublishResponse) {
        self.publish_responses.lock().push(response);
    }

    fn send_call_response(&self, _request_id: u32, _response: CallResponse) {}
}

fn setup_server() -> (Server, u32, Arc<RecordingChannel>, NodeId) {
    let _ = env_logger::builder().is_test(true).try_init();
    let server = Server::new(ServerConfig::new("timer-test"));
    let node_id = NodeId::new(1, 1u32);
    let session_id = {
        let mut core = server.core().write();
        add_server_object(&mut core);
        let mut variable = VariableBuilder::new(&node_id, "Var1", "Var1")
            .value(0u32)
            .data_type(DataTypeId::UInt32)
            .access_level(AccessLevel::CURRENT_READ | AccessLevel::CURRENT_WRITE)
            .build();
        variable.base.insert_reference(Reference::inverse(
            ReferenceTypeId::Organizes,
            ObjectId::ObjectsFolder.into(),
        ));
        core.nodestore.insert(variable.into()).unwrap();
        core.create_session("timer-session")
    };
    let channel = Arc::new(RecordingChannel::default());
    server.core().write().attach_channel(session_id, channel.clone());
    (server, session_id, channel, node_id)
}

fn queue_publish(server: &Server, session_id: u32, request_id: u32) {
    let mut core = server.core().write();
    opcua_server::services::subscription::publish(
        &mut core,
        session_id,
        request_id,
        &PublishRequest {
            request_header: RequestHeader::new(request_id),
            subscription_acknowledgements: Vec::new(),
        },
    );
}

#[tokio::test(start_paused = true)]
async fn publish_timer_delivers_keepalive_and_data() {
    let (server, session_id, channel, node_id) = setup_server();

    let response = server.create_subscription(
        session_id,
        &CreateSubscriptionRequest {
            request_header: RequestHeader::new(1),
            requested_publishing_interval: 100.0,
            requested_lifetime_count: 60,
            requested_max_keep_alive_count: 20,
            max_notifications_per_publish: 100,
            publishing_enabled: true,
            priority: 0,
        },
    );
    assert_eq!(response.response_header.service_result, StatusCode::Good);
    let sub_id = response.subscription_id;

    // The first interval sends the initial keepalive into the parked
    // publish request
    queue_publish(&server, session_id, 1);
    tokio::time::sleep(Duration::from_millis(150)).await;
    {
        let responses = channel.publish_responses.lock();
        assert_eq!(responses.len(), 1);
        assert!(responses[0].notification_message.is_keep_alive());
    }

    // A monitored item with a sampling timer picks up a written value
    let response = server.create_monitored_items(
        session_id,
        &CreateMonitoredItemsRequest {
            request_header: RequestHeader::new(2),
            subscription_id: sub_id,
            timestamps_to_return: TimestampsToReturn::Both,
            items_to_create: vec![MonitoredItemCreateRequest {
                item_to_monitor: ReadValueId::value_of(node_id.clone()),
                monitoring_mode: MonitoringMode::Reporting,
                requested_parameters: MonitoringParameters {
                    client_handle: 5,
                    sampling_interval: 50.0,
                    queue_size: 10,
                    discard_oldest: true,
                    ..Default::default()
                },
            }],
        },
    );
    assert_eq!(response.results[0].status_code, StatusCode::Good);
    assert_eq!(response.results[0].revised_sampling_interval, 50.0);

    // Mutate the value directly in the store; only the sampling timer can
    // observe this
    {
        let mut core = server.core().write();
        core.nodestore
            .edit(&node_id, |node| {
                node.as_variable_mut()
                    .unwrap()
                    .set_value(opcua_types::DataValue::new_now(42u32));
            })
            .unwrap();
    }

    queue_publish(&server, session_id, 2);
    tokio::time::sleep(Duration::from_millis(300)).await;
    {
        let responses = channel.publish_responses.lock();
        let data_response = responses
            .iter()
            .find(|r| !r.notification_message.is_keep_alive())
            .expect("a data change response was published");
        let opcua_types::NotificationData::DataChange(dcn) =
            &data_response.notification_message.notification_data[0]
        else {
            panic!("expected a data change notification");
        };
        // The initial sample and the write both surface
        assert!(dcn
            .monitored_items
            .iter()
            .any(|n| n.value.value == Some(Variant::from(42u32))));
    }

    server.stop();
}

#[tokio::test(start_paused = true)]
async fn subscription_without_publish_requests_expires() {
    let (server, session_id, _channel, _node_id) = setup_server();

    let response = server.create_subscription(
        session_id,
        &CreateSubscriptionRequest {
            request_header: RequestHeader::new(1),
            requested_publishing_interval: 100.0,
            requested_lifetime_count: 3,
            requested_max_keep_alive_count: 1,
            max_notifications_per_publish: 100,
            publishing_enabled: true,
            priority: 0,
        },
    );
    let sub_id = response.subscription_id;
    // lifetime was revised up to 3 * keepalive
    assert_eq!(response.revised_lifetime_count, 3);

    // No publish requests ever arrive; the subscription runs out of
    // lifetime and disappears
    tokio::time::sleep(Duration::from_millis(1200)).await;
    let core = server.core().read();
    assert!(!core
        .session(session_id)
        .map(|s| s.subscriptions.contains_key(&sub_id))
        .unwrap_or(false));
}
