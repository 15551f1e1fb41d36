//! The Call service. Methods carrying the async flag are parked with the
//! async method manager and answered when every operation of the call has
//! a result; everything else executes inline.

use tracing::debug;

use opcua_types::{
    CallMethodRequest, CallMethodResult, CallRequest, CallResponse, NodeClass, NodeId,
    ReferenceTypeId, ResponseHeader, StatusCode,
};

use crate::server::ServerCore;
use crate::services::check_operation_count;

enum MethodDispatch {
    /// The call failed validation outright.
    Failed(StatusCode),
    /// Execute inline with the attached callback.
    Sync,
    /// Route through the async method manager.
    Async,
}

fn validate_method_call(core: &ServerCore, item: &CallMethodRequest) -> MethodDispatch {
    if core.nodestore.get(&item.object_id).is_none() {
        return MethodDispatch::Failed(StatusCode::BadNodeIdUnknown);
    }
    let Some(node) = core.nodestore.get(&item.method_id) else {
        return MethodDispatch::Failed(StatusCode::BadMethodInvalid);
    };
    let Some(method) = node.as_method() else {
        return MethodDispatch::Failed(StatusCode::BadMethodInvalid);
    };
    if !method.executable || !method.user_executable {
        return MethodDispatch::Failed(StatusCode::BadNotExecutable);
    }

    // The method must hang below the object via a component reference
    let has_component: NodeId = ReferenceTypeId::HasComponent.into();
    let attached = core
        .nodestore
        .get(&item.object_id)
        .map(|object| {
            object.node_class() != NodeClass::Object
                || object.base().references.iter().any(|r| {
                    !r.is_inverse
                        && r.target_node_id.is_local()
                        && r.target_node_id.node_id == item.method_id
                        && core
                            .type_tree
                            .is_subtype_of(&r.reference_type_id, &has_component)
                })
        })
        .unwrap_or(false);
    if !attached {
        return MethodDispatch::Failed(StatusCode::BadMethodInvalid);
    }

    if method.callback.is_none() {
        return MethodDispatch::Failed(StatusCode::BadInternalError);
    }
    if method.is_async {
        MethodDispatch::Async
    } else {
        MethodDispatch::Sync
    }
}

fn execute_sync(core: &ServerCore, item: &CallMethodRequest) -> CallMethodResult {
    let callback = core
        .nodestore
        .get(&item.method_id)
        .and_then(|n| n.as_method())
        .and_then(|m| m.callback.clone())
        .expect("validated to exist");
    match callback.call(&item.object_id, &item.input_arguments) {
        Ok(output_arguments) => CallMethodResult {
            status_code: StatusCode::Good,
            input_argument_results: vec![StatusCode::Good; item.input_arguments.len()],
            output_arguments,
        },
        Err(status) => CallMethodResult::from_status(status),
    }
}

/// The Call service. Returns `None` when the response is deferred through
/// the async method manager and will be sent on the session channel once
/// all operations completed.
pub fn call(
    core: &mut ServerCore,
    session_id: u32,
    request_id: u32,
    request: &CallRequest,
) -> Option<CallResponse> {
    if let Err(status) = check_operation_count(
        request.methods_to_call.len(),
        core.config.operational.max_operations_per_call,
    ) {
        return Some(CallResponse {
            response_header: ResponseHeader::new_service_result(&request.request_header, status),
            results: Vec::new(),
        });
    }

    let dispatches: Vec<MethodDispatch> = request
        .methods_to_call
        .iter()
        .map(|item| validate_method_call(core, item))
        .collect();
    let any_async = dispatches
        .iter()
        .any(|d| matches!(d, MethodDispatch::Async));

    if !any_async {
        let results = request
            .methods_to_call
            .iter()
            .zip(&dispatches)
            .map(|(item, dispatch)| match dispatch {
                MethodDispatch::Failed(status) => CallMethodResult::from_status(*status),
                _ => execute_sync(core, item),
            })
            .collect();
        return Some(CallResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            results,
        });
    }

    // At least one operation is async: aggregate the whole call
    debug!(
        "Call request {} has async operations, deferring the response",
        request_id
    );
    core.async_methods.create_call_entry(
        session_id,
        request_id,
        request.request_header.request_handle,
        request.methods_to_call.len(),
    );
    let mut completed = Vec::new();
    for (index, (item, dispatch)) in request.methods_to_call.iter().zip(&dispatches).enumerate() {
        let local_result = match dispatch {
            MethodDispatch::Failed(status) => Some(CallMethodResult::from_status(*status)),
            MethodDispatch::Sync => Some(execute_sync(core, item)),
            MethodDispatch::Async => {
                let status = core.async_methods.set_next_async_method(
                    session_id,
                    request_id,
                    index as u32,
                    item.clone(),
                );
                if status.is_good() {
                    None
                } else {
                    Some(CallMethodResult::from_status(status))
                }
            }
        };
        if let Some(result) = local_result {
            if let Some(call) = core.async_methods.complete_operation_locally(
                session_id,
                request_id,
                index as u32,
                result,
            ) {
                completed.push(call);
            }
        }
    }
    // Everything may have completed locally after all, e.g. when every
    // async enqueue failed
    for call in completed {
        core.send_completed_call(call);
    }
    None
}

/// Toggle the async flag of a method node.
pub fn set_method_async(
    core: &mut ServerCore,
    method_id: &NodeId,
    is_async: bool,
) -> StatusCode {
    let result = core.nodestore.edit(method_id, |node| match node {
        opcua_nodes::NodeType::Method(method) => {
            method.is_async = is_async;
            StatusCode::Good
        }
        _ => StatusCode::BadNodeClassInvalid,
    });
    match result {
        Ok(status) => status,
        Err(status) => status,
    }
}
