// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

#![warn(missing_docs)]

//! Data types shared by the OPC UA server core runtime.
//!
//! This crate holds the value model (NodeId, Variant, DataValue, ...) and the
//! already-decoded service request/response structures the core consumes. It
//! defines no wire format; the only encoding in here is the canonical binary
//! form of values, used by the subscription engine for change detection.

mod attribute;
mod byte_string;
mod data_value;
mod date_time;
mod guid;
mod localized_text;
mod node_class;
mod node_id;
mod node_ids;
mod qualified_name;
mod status_code;
mod variant;

pub mod encoding;
pub mod numeric_range;
pub mod service_types;

pub use attribute::AttributeId;
pub use byte_string::ByteString;
pub use data_value::DataValue;
pub use date_time::{DateTime, DateTimeUtc};
pub use guid::Guid;
pub use localized_text::LocalizedText;
pub use node_class::{NodeClass, NodeClassMask};
pub use node_id::{ExpandedNodeId, Identifier, NodeId};
pub use node_ids::{
    DataTypeId, MethodId, ObjectId, ObjectTypeId, ReferenceTypeId, VariableId, VariableTypeId,
};
pub use numeric_range::NumericRange;
pub use qualified_name::QualifiedName;
pub use service_types::*;
pub use status_code::{StatusCode, SubStatusBits};
pub use variant::{Variant, VariantScalarTypeId};

/// An XML element. The core never interprets these, they are carried opaquely.
pub type XmlElement = String;
