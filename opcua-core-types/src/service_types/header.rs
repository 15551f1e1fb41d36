use crate::{date_time::DateTime, status_code::StatusCode};

/// The part of the standard request header this core consumes.
#[derive(Debug, Clone, Default)]
pub struct RequestHeader {
    /// Client supplied handle echoed in the response.
    pub request_handle: u32,
    /// When the client sent the request.
    pub timestamp: DateTime,
    /// Hint after which the client no longer cares, in ms. 0 means none.
    pub timeout_hint: u32,
}

impl RequestHeader {
    /// A header carrying only a request handle.
    pub fn new(request_handle: u32) -> RequestHeader {
        RequestHeader {
            request_handle,
            timestamp: DateTime::now(),
            timeout_hint: 0,
        }
    }
}

/// The standard response header.
#[derive(Debug, Clone, Default)]
pub struct ResponseHeader {
    /// Echo of the request handle.
    pub request_handle: u32,
    /// When the server produced the response.
    pub timestamp: DateTime,
    /// The service level result.
    pub service_result: StatusCode,
}

impl ResponseHeader {
    /// A good response for the given request.
    pub fn new_good(request: &RequestHeader) -> ResponseHeader {
        ResponseHeader {
            request_handle: request.request_handle,
            timestamp: DateTime::now(),
            service_result: StatusCode::Good,
        }
    }

    /// A response with a service level failure.
    pub fn new_service_result(request: &RequestHeader, service_result: StatusCode) -> ResponseHeader {
        ResponseHeader {
            request_handle: request.request_handle,
            timestamp: DateTime::now(),
            service_result,
        }
    }
}
