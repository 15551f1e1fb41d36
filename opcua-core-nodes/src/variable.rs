use std::fmt;
use std::sync::Arc;

use opcua_types::{DataValue, NodeId, NumericRange, StatusCode};

use crate::base::NodeBase;
use crate::access_level::AccessLevel;

/// A callback pair standing in for a statically stored value. Reads pull
/// from the source, writes push into it. The callbacks are shared between
/// copies of the node.
#[derive(Clone)]
pub struct ValueSource {
    /// Produces the current value for the given index range.
    pub read: Arc<dyn Fn(&NumericRange) -> DataValue + Send + Sync>,
    /// Accepts a written value, if writing is supported.
    pub write: Option<Arc<dyn Fn(&DataValue) -> StatusCode + Send + Sync>>,
}

impl fmt::Debug for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueSource")
            .field("write", &self.write.is_some())
            .finish()
    }
}

/// How a variable node obtains its value.
#[derive(Debug, Clone)]
pub enum VariableValue {
    /// A value stored in the node itself.
    Static(DataValue),
    /// A data-source callback pair.
    Source(ValueSource),
}

/// A variable node.
#[derive(Debug, Clone)]
pub struct VariableNode {
    /// The common head.
    pub base: NodeBase,
    /// The value, static or sourced.
    pub value: VariableValue,
    /// The data type of the value.
    pub data_type: NodeId,
    /// Scalar (-1), any (0) or a fixed array rank.
    pub value_rank: i32,
    /// The dimensions for fixed rank arrays.
    pub array_dimensions: Option<Vec<u32>>,
    /// Read/write access bits.
    pub access_level: AccessLevel,
    /// Access bits after user rights are applied.
    pub user_access_level: AccessLevel,
    /// The fastest sampling the source supports, ms. -1 is unspecified.
    pub minimum_sampling_interval: f64,
    /// Whether the server collects history for the variable.
    pub historizing: bool,
}

impl VariableNode {
    /// Read the current value, applying the index range.
    pub fn read_value(&self, index_range: &NumericRange) -> DataValue {
        match &self.value {
            VariableValue::Static(value) => {
                if index_range.is_none() {
                    return value.clone();
                }
                let Some(inner) = &value.value else {
                    return value.clone();
                };
                match index_range.apply(inner) {
                    Ok(sliced) => DataValue {
                        value: Some(sliced),
                        ..value.clone()
                    },
                    Err(status) => DataValue::from_status(status),
                }
            }
            VariableValue::Source(source) => (source.read)(index_range),
        }
    }

    /// Write a new value. The caller has already checked access rights.
    pub fn write_value(&mut self, value: &DataValue) -> StatusCode {
        match &mut self.value {
            VariableValue::Static(stored) => {
                *stored = value.clone();
                StatusCode::Good
            }
            VariableValue::Source(source) => match &source.write {
                Some(write) => write(value),
                None => StatusCode::BadNotWritable,
            },
        }
    }

    /// Replace the stored value outright, bypassing source callbacks.
    pub fn set_value(&mut self, value: DataValue) {
        self.value = VariableValue::Static(value);
    }
}
