//! The Read and Write services.

use tracing::debug;

use opcua_nodes::AccessLevel;
use opcua_nodes::WriteMask;
use opcua_types::{
    AttributeId, DataValue, DateTime, NodeId, NumericRange, ReadRequest, ReadResponse,
    ResponseHeader, StatusCode, TimestampsToReturn, Variant, WriteRequest, WriteResponse,
    WriteValue,
};

use crate::nodestore::NodeStore;
use crate::server::ServerCore;
use crate::services::check_operation_count;

/// Strip the timestamps the caller did not ask for.
pub(crate) fn apply_timestamps(value: &mut DataValue, timestamps: TimestampsToReturn) {
    match timestamps {
        TimestampsToReturn::Source => {
            value.server_timestamp = None;
            value.server_picoseconds = None;
        }
        TimestampsToReturn::Server => {
            value.source_timestamp = None;
            value.source_picoseconds = None;
        }
        TimestampsToReturn::Both => {}
        TimestampsToReturn::Neither => {
            value.source_timestamp = None;
            value.source_picoseconds = None;
            value.server_timestamp = None;
            value.server_picoseconds = None;
        }
    }
}

/// Read one attribute of one node into a data value. Failures land in the
/// value's status.
pub(crate) fn read_attribute_value(
    nodestore: &NodeStore,
    node_id: &NodeId,
    attribute_id: AttributeId,
    index_range: &NumericRange,
    timestamps: TimestampsToReturn,
) -> DataValue {
    let Some(node) = nodestore.get(node_id) else {
        return DataValue::from_status(StatusCode::BadNodeIdUnknown);
    };

    // An index range is only defined for the value attribute
    if !index_range.is_none() && attribute_id != AttributeId::Value {
        return DataValue::from_status(StatusCode::BadIndexRangeInvalid);
    }

    let mut value = if attribute_id == AttributeId::Value {
        let Some(variable) = node.as_variable() else {
            return DataValue::from_status(StatusCode::BadAttributeIdInvalid);
        };
        if !variable.access_level.contains(AccessLevel::CURRENT_READ) {
            return DataValue::from_status(StatusCode::BadNotReadable);
        }
        variable.read_value(index_range)
    } else {
        match node.get_attribute(attribute_id) {
            Some(v) => DataValue {
                value: Some(v),
                status: Some(StatusCode::Good),
                source_timestamp: Some(DateTime::now()),
                ..Default::default()
            },
            None => return DataValue::from_status(StatusCode::BadAttributeIdInvalid),
        }
    };

    if value.server_timestamp.is_none() {
        value.server_timestamp = Some(DateTime::now());
    }
    apply_timestamps(&mut value, timestamps);
    value
}

/// The Read service.
pub fn read(core: &ServerCore, request: &ReadRequest) -> ReadResponse {
    if let Err(status) = check_operation_count(
        request.nodes_to_read.len(),
        core.config.operational.max_operations_per_call,
    ) {
        return ReadResponse {
            response_header: ResponseHeader::new_service_result(&request.request_header, status),
            results: Vec::new(),
        };
    }

    let results = request
        .nodes_to_read
        .iter()
        .map(|rv| {
            let attribute_id = match AttributeId::from_u32(rv.attribute_id) {
                Ok(id) => id,
                Err(status) => return DataValue::from_status(status),
            };
            let index_range = match NumericRange::parse(&rv.index_range) {
                Ok(range) => range,
                Err(status) => return DataValue::from_status(status),
            };
            read_attribute_value(
                &core.nodestore,
                &rv.node_id,
                attribute_id,
                &index_range,
                request.timestamps_to_return,
            )
        })
        .collect();

    ReadResponse {
        response_header: ResponseHeader::new_good(&request.request_header),
        results,
    }
}

fn write_mask_for(attribute_id: AttributeId) -> Option<WriteMask> {
    Some(match attribute_id {
        AttributeId::AccessLevel => WriteMask::ACCESS_LEVEL,
        AttributeId::BrowseName => WriteMask::BROWSE_NAME,
        AttributeId::Description => WriteMask::DESCRIPTION,
        AttributeId::DisplayName => WriteMask::DISPLAY_NAME,
        AttributeId::EventNotifier => WriteMask::EVENT_NOTIFIER,
        AttributeId::Executable => WriteMask::EXECUTABLE,
        AttributeId::Historizing => WriteMask::HISTORIZING,
        AttributeId::IsAbstract => WriteMask::IS_ABSTRACT,
        AttributeId::MinimumSamplingInterval => WriteMask::MINIMUM_SAMPLING_INTERVAL,
        AttributeId::ValueRank => WriteMask::VALUE_RANK,
        AttributeId::WriteMask => WriteMask::WRITE_MASK,
        _ => return None,
    })
}

fn write_node_value(core: &mut ServerCore, item: &WriteValue) -> StatusCode {
    let attribute_id = match AttributeId::from_u32(item.attribute_id) {
        Ok(id) => id,
        Err(status) => return status,
    };
    let index_range = match NumericRange::parse(&item.index_range) {
        Ok(range) => range,
        Err(status) => return status,
    };
    if !index_range.is_none() && attribute_id != AttributeId::Value {
        return StatusCode::BadIndexRangeInvalid;
    }

    let Some(node) = core.nodestore.get(&item.node_id) else {
        return StatusCode::BadNodeIdUnknown;
    };

    if attribute_id == AttributeId::Value {
        let Some(variable) = node.as_variable() else {
            return StatusCode::BadAttributeIdInvalid;
        };
        if !variable.access_level.contains(AccessLevel::CURRENT_WRITE) {
            return StatusCode::BadNotWritable;
        }
        // Writes go through the copy and replace discipline like any
        // other node mutation
        let status = match core.nodestore.edit(&item.node_id, |node| {
            let variable = node.as_variable_mut().expect("node class checked");
            let mut value = item.value.clone();
            if value.source_timestamp.is_none() {
                value.source_timestamp = Some(DateTime::now());
            }
            variable.write_value(&value)
        }) {
            Ok(status) => status,
            Err(status) => status,
        };
        if status.is_good() {
            core.notify_value_changed(&item.node_id);
        }
        return status;
    }

    // Non-value attributes are gated by the node's write mask
    let Some(required) = write_mask_for(attribute_id) else {
        return StatusCode::BadNotWritable;
    };
    if !node.base().write_mask.contains(required) {
        return StatusCode::BadNotWritable;
    }
    let Some(value) = item.value.value.clone() else {
        return StatusCode::BadTypeMismatch;
    };
    match core.nodestore.edit(&item.node_id, |node| {
        node.set_attribute(attribute_id, value)
    }) {
        Ok(Ok(())) => StatusCode::Good,
        Ok(Err(status)) => status,
        Err(status) => status,
    }
}

/// The Write service.
pub fn write(core: &mut ServerCore, request: &WriteRequest) -> WriteResponse {
    if let Err(status) = check_operation_count(
        request.nodes_to_write.len(),
        core.config.operational.max_operations_per_call,
    ) {
        return WriteResponse {
            response_header: ResponseHeader::new_service_result(&request.request_header, status),
            results: Vec::new(),
        };
    }

    let results = request
        .nodes_to_write
        .iter()
        .map(|item| {
            let status = write_node_value(core, item);
            debug!(
                "Write {} attribute {} -> {}",
                item.node_id, item.attribute_id, status
            );
            status
        })
        .collect();

    WriteResponse {
        response_header: ResponseHeader::new_good(&request.request_header),
        results,
    }
}

/// Convenience used by tests and embedders: write a value through the
/// service path so monitored items observe the change.
pub fn write_value(core: &mut ServerCore, node_id: &NodeId, value: impl Into<Variant>) -> StatusCode {
    write_node_value(
        core,
        &WriteValue {
            node_id: node_id.clone(),
            attribute_id: AttributeId::Value as u32,
            index_range: String::new(),
            value: DataValue::new_now(value),
        },
    )
}
