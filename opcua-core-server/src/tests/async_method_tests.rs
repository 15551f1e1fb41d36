use super::*;
use opcua_nodes::{MethodBuilder, Reference};
use opcua_types::{CallMethodRequest, CallMethodResult, CallRequest};

/// Attach a doubling method to the server object.
fn add_double_method(core: &mut ServerCore, id: u32, is_async: bool) -> NodeId {
    let method_id = NodeId::new(1, id);
    let mut method = MethodBuilder::new(&method_id, "Double", "Double")
        .is_async(is_async)
        .callback(|_object_id: &NodeId, args: &[Variant]| match args.first() {
            Some(Variant::UInt32(v)) => Ok(vec![Variant::from(v * 2)]),
            _ => Err(StatusCode::BadArgumentsMissing),
        })
        .build();
    method.base.insert_reference(Reference::inverse(
        ReferenceTypeId::HasComponent,
        ObjectId::Server.into(),
    ));
    core.nodestore.insert(method.into()).unwrap();
    core.nodestore
        .edit(&ObjectId::Server.into(), |node| {
            node.base_mut().insert_reference(Reference::forward(
                ReferenceTypeId::HasComponent,
                method_id.clone(),
            ));
        })
        .unwrap();
    method_id
}

fn call_request(method_id: &NodeId, argument: u32) -> CallRequest {
    CallRequest {
        request_header: RequestHeader::new(42),
        methods_to_call: vec![CallMethodRequest {
            object_id: ObjectId::Server.into(),
            method_id: method_id.clone(),
            input_arguments: vec![Variant::from(argument)],
        }],
    }
}

#[test]
fn synchronous_call_executes_inline() {
    let (mut core, session_id, _) = setup();
    let method_id = add_double_method(&mut core, 700, false);

    let response = services::method::call(&mut core, session_id, 1, &call_request(&method_id, 21))
        .expect("sync calls respond inline");
    assert_eq!(response.results.len(), 1);
    assert_eq!(response.results[0].status_code, StatusCode::Good);
    assert_eq!(
        response.results[0].output_arguments,
        vec![Variant::from(42u32)]
    );
}

#[test]
fn async_call_defers_and_responds_through_the_channel() {
    let (mut core, session_id, channel) = setup();
    let method_id = add_double_method(&mut core, 700, true);

    let deferred = services::method::call(&mut core, session_id, 9, &call_request(&method_id, 10));
    assert!(deferred.is_none(), "async calls answer via the channel");
    assert_eq!(core.async_methods.current_count(), 1);

    // A worker picks up the operation and executes the method callback
    let operation = core.async_methods.get_async_operation().unwrap();
    let callback = core
        .nodestore
        .get(&operation.request.method_id)
        .and_then(|n| n.as_method())
        .and_then(|m| m.callback.clone())
        .unwrap();
    let output = callback
        .call(&operation.request.object_id, &operation.request.input_arguments)
        .unwrap();
    core.async_methods.set_async_operation_result(
        operation.op_id,
        CallMethodResult {
            status_code: StatusCode::Good,
            output_arguments: output,
            ..Default::default()
        },
    );

    // The 50 ms drain assembles and sends the aggregated response
    core.async_response_tick();
    let responses = channel.call_responses.lock();
    assert_eq!(responses.len(), 1);
    let (request_id, response) = &responses[0];
    assert_eq!(*request_id, 9);
    assert_eq!(response.response_header.request_handle, 42);
    assert_eq!(response.results[0].status_code, StatusCode::Good);
    assert_eq!(
        response.results[0].output_arguments,
        vec![Variant::from(20u32)]
    );
    assert_eq!(core.async_methods.current_count(), 0);
}

#[test]
fn async_call_times_out_without_a_worker() {
    let (mut core, session_id, channel) = setup();
    core.config.async_operations.operation_timeout_ms = 0.001;
    // The manager was built from the config at construction; rebuild it
    // with the tightened timeout
    core.async_methods =
        crate::async_methods::AsyncMethodManager::new(core.config.async_operations.clone());
    let method_id = add_double_method(&mut core, 700, true);

    let deferred = services::method::call(&mut core, session_id, 9, &call_request(&method_id, 10));
    assert!(deferred.is_none());

    std::thread::sleep(std::time::Duration::from_millis(5));
    core.async_integrity_tick(std::time::Instant::now());

    let responses = channel.call_responses.lock();
    assert_eq!(responses.len(), 1);
    assert_eq!(
        responses[0].1.results[0].status_code,
        StatusCode::BadRequestTimeout
    );
}

#[test]
fn mixed_call_aggregates_sync_and_async_results() {
    let (mut core, session_id, channel) = setup();
    let sync_method = add_double_method(&mut core, 700, false);
    let async_method = add_double_method(&mut core, 701, true);

    let request = CallRequest {
        request_header: RequestHeader::new(7),
        methods_to_call: vec![
            CallMethodRequest {
                object_id: ObjectId::Server.into(),
                method_id: sync_method,
                input_arguments: vec![Variant::from(1u32)],
            },
            CallMethodRequest {
                object_id: ObjectId::Server.into(),
                method_id: async_method,
                input_arguments: vec![Variant::from(2u32)],
            },
            CallMethodRequest {
                object_id: ObjectId::Server.into(),
                method_id: NodeId::new(1, 999u32),
                input_arguments: Vec::new(),
            },
        ],
    };
    let deferred = services::method::call(&mut core, session_id, 11, &request);
    assert!(deferred.is_none());

    let operation = core.async_methods.get_async_operation().unwrap();
    core.async_methods.set_async_operation_result(
        operation.op_id,
        CallMethodResult {
            status_code: StatusCode::Good,
            output_arguments: vec![Variant::from(4u32)],
            ..Default::default()
        },
    );
    core.async_response_tick();

    let responses = channel.call_responses.lock();
    assert_eq!(responses.len(), 1);
    let results = &responses[0].1.results;
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].status_code, StatusCode::Good);
    assert_eq!(results[0].output_arguments, vec![Variant::from(2u32)]);
    assert_eq!(results[1].status_code, StatusCode::Good);
    assert_eq!(results[1].output_arguments, vec![Variant::from(4u32)]);
    assert_eq!(results[2].status_code, StatusCode::BadMethodInvalid);
}

#[test]
fn call_validation_failures_are_per_item() {
    let (mut core, session_id, _) = setup();
    let method_id = add_double_method(&mut core, 700, false);
    // Not executable
    services::method::set_method_async(&mut core, &method_id, false);
    core.nodestore
        .edit(&method_id, |node| {
            if let opcua_nodes::NodeType::Method(m) = node {
                m.executable = false;
            }
        })
        .unwrap();

    let response = services::method::call(&mut core, session_id, 1, &call_request(&method_id, 1))
        .expect("all-sync responses are inline");
    assert_eq!(response.results[0].status_code, StatusCode::BadNotExecutable);

    // Empty calls are a request shape error
    let response = services::method::call(
        &mut core,
        session_id,
        2,
        &CallRequest {
            request_header: RequestHeader::new(1),
            methods_to_call: Vec::new(),
        },
    )
    .unwrap();
    assert_eq!(
        response.response_header.service_result,
        StatusCode::BadNothingToDo
    );
}

#[test]
fn set_method_async_flag_round_trip() {
    let (mut core, _, _) = setup();
    let method_id = add_double_method(&mut core, 700, false);
    assert_eq!(
        services::method::set_method_async(&mut core, &method_id, true),
        StatusCode::Good
    );
    assert!(core
        .nodestore
        .get(&method_id)
        .and_then(|n| n.as_method())
        .map(|m| m.is_async)
        .unwrap());
    // Only methods carry the flag
    let variable_id = add_test_variable(&mut core, 400, 0);
    assert_eq!(
        services::method::set_method_async(&mut core, &variable_id, true),
        StatusCode::BadNodeClassInvalid
    );
}
