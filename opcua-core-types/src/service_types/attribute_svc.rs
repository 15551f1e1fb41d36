use crate::{
    data_value::DataValue,
    node_id::NodeId,
    service_types::header::{RequestHeader, ResponseHeader},
    service_types::TimestampsToReturn,
    status_code::StatusCode,
};

/// Addresses one attribute of one node for reading or monitoring.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReadValueId {
    /// The node.
    pub node_id: NodeId,
    /// The attribute, raw form of [`crate::AttributeId`].
    pub attribute_id: u32,
    /// Optional index range into a value attribute, string form.
    pub index_range: String,
}

impl ReadValueId {
    /// Address the value attribute of a node.
    pub fn value_of(node_id: NodeId) -> ReadValueId {
        ReadValueId {
            node_id,
            attribute_id: crate::AttributeId::Value as u32,
            index_range: String::new(),
        }
    }
}

/// Read service request.
#[derive(Debug, Clone, Default)]
pub struct ReadRequest {
    #[allow(missing_docs)]
    pub request_header: RequestHeader,
    /// Maximum age of cached values in ms. This core always reads live.
    pub max_age: f64,
    /// Which timestamps to include.
    pub timestamps_to_return: TimestampsToReturn,
    /// The attributes to read.
    pub nodes_to_read: Vec<ReadValueId>,
}

/// Read service response.
#[derive(Debug, Clone, Default)]
pub struct ReadResponse {
    #[allow(missing_docs)]
    pub response_header: ResponseHeader,
    /// One data value per read id, in request order.
    pub results: Vec<DataValue>,
}

/// One attribute write.
#[derive(Debug, Clone, Default)]
pub struct WriteValue {
    /// The node.
    pub node_id: NodeId,
    /// The attribute, raw form.
    pub attribute_id: u32,
    /// Optional index range into a value attribute, string form.
    pub index_range: String,
    /// The value to write.
    pub value: DataValue,
}

/// Write service request.
#[derive(Debug, Clone, Default)]
pub struct WriteRequest {
    #[allow(missing_docs)]
    pub request_header: RequestHeader,
    /// The writes to perform.
    pub nodes_to_write: Vec<WriteValue>,
}

/// Write service response.
#[derive(Debug, Clone, Default)]
pub struct WriteResponse {
    #[allow(missing_docs)]
    pub response_header: ResponseHeader,
    /// One status per write, in request order.
    pub results: Vec<StatusCode>,
}
