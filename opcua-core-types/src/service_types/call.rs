use crate::{
    node_id::NodeId,
    service_types::header::{RequestHeader, ResponseHeader},
    status_code::StatusCode,
    variant::Variant,
};

/// One method invocation within a Call request.
#[derive(Debug, Clone, Default)]
pub struct CallMethodRequest {
    /// The object (or object type) the method is invoked on.
    pub object_id: NodeId,
    /// The method node.
    pub method_id: NodeId,
    /// The input arguments.
    pub input_arguments: Vec<Variant>,
}

/// The result of one method invocation.
#[derive(Debug, Clone, Default)]
pub struct CallMethodResult {
    /// The outcome.
    pub status_code: StatusCode,
    /// One status per input argument.
    pub input_argument_results: Vec<StatusCode>,
    /// The output arguments produced by the method.
    pub output_arguments: Vec<Variant>,
}

impl CallMethodResult {
    /// A result carrying only a status.
    pub fn from_status(status_code: StatusCode) -> CallMethodResult {
        CallMethodResult {
            status_code,
            ..Default::default()
        }
    }
}

/// Call service request.
#[derive(Debug, Clone, Default)]
pub struct CallRequest {
    #[allow(missing_docs)]
    pub request_header: RequestHeader,
    /// The invocations to perform.
    pub methods_to_call: Vec<CallMethodRequest>,
}

/// Call service response.
#[derive(Debug, Clone, Default)]
pub struct CallResponse {
    #[allow(missing_docs)]
    pub response_header: ResponseHeader,
    /// One result per invocation, in request order.
    pub results: Vec<CallMethodResult>,
}
