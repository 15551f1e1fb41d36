use std::fmt;

use crate::{
    byte_string::ByteString,
    date_time::DateTime,
    guid::Guid,
    localized_text::LocalizedText,
    node_id::{ExpandedNodeId, NodeId},
    qualified_name::QualifiedName,
    status_code::StatusCode,
    XmlElement,
};

/// The scalar type of a variant, used by the filter evaluator's casting
/// rules and by typed reads.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum VariantScalarTypeId {
    Boolean,
    SByte,
    Byte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float,
    Double,
    String,
    DateTime,
    Guid,
    ByteString,
    XmlElement,
    NodeId,
    ExpandedNodeId,
    StatusCode,
    QualifiedName,
    LocalizedText,
}

impl VariantScalarTypeId {
    /// Whether values of the type are numeric (integer or floating point).
    pub fn is_numeric(&self) -> bool {
        use VariantScalarTypeId::*;
        matches!(
            self,
            SByte | Byte | Int16 | UInt16 | Int32 | UInt32 | Int64 | UInt64 | Float | Double
        )
    }
}

/// A value of one of the 21 OPC UA scalar kinds, or a single-dimension array
/// of one of them, or nothing at all.
#[derive(Debug, Clone, PartialEq, Default)]
#[allow(missing_docs)]
pub enum Variant {
    #[default]
    Empty,
    Boolean(bool),
    SByte(i8),
    Byte(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    String(String),
    DateTime(DateTime),
    Guid(Guid),
    ByteString(ByteString),
    XmlElement(XmlElement),
    NodeId(Box<NodeId>),
    ExpandedNodeId(Box<ExpandedNodeId>),
    StatusCode(StatusCode),
    QualifiedName(Box<QualifiedName>),
    LocalizedText(Box<LocalizedText>),
    /// A single-dimension array of scalars of one type.
    Array(Box<ArrayVariant>),
}

/// The payload of an array variant.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayVariant {
    /// The element type.
    pub value_type: VariantScalarTypeId,
    /// The elements. Every element is a scalar of `value_type`.
    pub values: Vec<Variant>,
}

impl Variant {
    /// Whether the variant holds no value.
    pub fn is_empty(&self) -> bool {
        matches!(self, Variant::Empty)
    }

    /// Whether the variant holds a scalar value.
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Variant::Empty | Variant::Array(_))
    }

    /// Whether the variant holds an array.
    pub fn is_array(&self) -> bool {
        matches!(self, Variant::Array(_))
    }

    /// The scalar type of the value, or the element type for arrays.
    pub fn scalar_type_id(&self) -> Option<VariantScalarTypeId> {
        use VariantScalarTypeId as T;
        Some(match self {
            Variant::Empty => return None,
            Variant::Boolean(_) => T::Boolean,
            Variant::SByte(_) => T::SByte,
            Variant::Byte(_) => T::Byte,
            Variant::Int16(_) => T::Int16,
            Variant::UInt16(_) => T::UInt16,
            Variant::Int32(_) => T::Int32,
            Variant::UInt32(_) => T::UInt32,
            Variant::Int64(_) => T::Int64,
            Variant::UInt64(_) => T::UInt64,
            Variant::Float(_) => T::Float,
            Variant::Double(_) => T::Double,
            Variant::String(_) => T::String,
            Variant::DateTime(_) => T::DateTime,
            Variant::Guid(_) => T::Guid,
            Variant::ByteString(_) => T::ByteString,
            Variant::XmlElement(_) => T::XmlElement,
            Variant::NodeId(_) => T::NodeId,
            Variant::ExpandedNodeId(_) => T::ExpandedNodeId,
            Variant::StatusCode(_) => T::StatusCode,
            Variant::QualifiedName(_) => T::QualifiedName,
            Variant::LocalizedText(_) => T::LocalizedText,
            Variant::Array(a) => a.value_type,
        })
    }

    /// Whether the value (or element type) is numeric.
    pub fn is_numeric(&self) -> bool {
        self.scalar_type_id().map(|t| t.is_numeric()).unwrap_or(false)
    }

    /// The value as an f64, for numeric scalars.
    pub fn as_f64(&self) -> Option<f64> {
        Some(match self {
            Variant::SByte(v) => *v as f64,
            Variant::Byte(v) => *v as f64,
            Variant::Int16(v) => *v as f64,
            Variant::UInt16(v) => *v as f64,
            Variant::Int32(v) => *v as f64,
            Variant::UInt32(v) => *v as f64,
            Variant::Int64(v) => *v as f64,
            Variant::UInt64(v) => *v as f64,
            Variant::Float(v) => *v as f64,
            Variant::Double(v) => *v,
            Variant::Boolean(v) => *v as u8 as f64,
            _ => return None,
        })
    }

    /// The value as a bool, for boolean scalars.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Variant::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as a node id, for node id scalars.
    pub fn as_node_id(&self) -> Option<&NodeId> {
        match self {
            Variant::NodeId(v) => Some(v),
            _ => None,
        }
    }

    /// Build an array variant. Fails back to `Empty` when elements disagree
    /// with the declared type.
    pub fn from_array(value_type: VariantScalarTypeId, values: Vec<Variant>) -> Variant {
        if values
            .iter()
            .any(|v| v.scalar_type_id() != Some(value_type) || !v.is_scalar())
        {
            return Variant::Empty;
        }
        Variant::Array(Box::new(ArrayVariant { value_type, values }))
    }

    /// The elements of an array variant.
    pub fn as_array(&self) -> Option<&[Variant]> {
        match self {
            Variant::Array(a) => Some(&a.values),
            _ => None,
        }
    }
}

macro_rules! variant_from {
    ($($ty:ty => $var:ident),+ $(,)?) => {
        $(
            impl From<$ty> for Variant {
                fn from(v: $ty) -> Self {
                    Variant::$var(v)
                }
            }
        )+
    };
}

variant_from! {
    bool => Boolean,
    i8 => SByte,
    u8 => Byte,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Float,
    f64 => Double,
    String => String,
    DateTime => DateTime,
    Guid => Guid,
    ByteString => ByteString,
    StatusCode => StatusCode,
}

impl From<&str> for Variant {
    fn from(v: &str) -> Self {
        Variant::String(v.to_owned())
    }
}

impl From<NodeId> for Variant {
    fn from(v: NodeId) -> Self {
        Variant::NodeId(Box::new(v))
    }
}

impl From<ExpandedNodeId> for Variant {
    fn from(v: ExpandedNodeId) -> Self {
        Variant::ExpandedNodeId(Box::new(v))
    }
}

impl From<QualifiedName> for Variant {
    fn from(v: QualifiedName) -> Self {
        Variant::QualifiedName(Box::new(v))
    }
}

impl From<LocalizedText> for Variant {
    fn from(v: LocalizedText) -> Self {
        Variant::LocalizedText(Box::new(v))
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Empty => write!(f, "Empty"),
            Variant::Boolean(v) => write!(f, "{v}"),
            Variant::SByte(v) => write!(f, "{v}"),
            Variant::Byte(v) => write!(f, "{v}"),
            Variant::Int16(v) => write!(f, "{v}"),
            Variant::UInt16(v) => write!(f, "{v}"),
            Variant::Int32(v) => write!(f, "{v}"),
            Variant::UInt32(v) => write!(f, "{v}"),
            Variant::Int64(v) => write!(f, "{v}"),
            Variant::UInt64(v) => write!(f, "{v}"),
            Variant::Float(v) => write!(f, "{v}"),
            Variant::Double(v) => write!(f, "{v}"),
            Variant::String(v) => write!(f, "{v}"),
            Variant::DateTime(v) => write!(f, "{v}"),
            Variant::Guid(v) => write!(f, "{v}"),
            Variant::ByteString(v) => write!(f, "{} bytes", v.len()),
            Variant::XmlElement(v) => write!(f, "{v}"),
            Variant::NodeId(v) => write!(f, "{v}"),
            Variant::ExpandedNodeId(v) => write!(f, "{v}"),
            Variant::StatusCode(v) => write!(f, "{v}"),
            Variant::QualifiedName(v) => write!(f, "{v}"),
            Variant::LocalizedText(v) => write!(f, "{v}"),
            Variant::Array(a) => write!(f, "[{} elements]", a.values.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_classification() {
        assert!(Variant::from(1u32).is_scalar());
        assert!(Variant::from(1u32).is_numeric());
        assert!(!Variant::from("x").is_numeric());
        assert!(!Variant::Empty.is_scalar());
        assert_eq!(Variant::Empty.scalar_type_id(), None);
    }

    #[test]
    fn homogeneous_arrays_only() {
        let ok = Variant::from_array(
            VariantScalarTypeId::Int32,
            vec![Variant::from(1i32), Variant::from(2i32)],
        );
        assert!(ok.is_array());
        assert_eq!(ok.scalar_type_id(), Some(VariantScalarTypeId::Int32));

        let bad = Variant::from_array(
            VariantScalarTypeId::Int32,
            vec![Variant::from(1i32), Variant::from(2.0f64)],
        );
        assert!(bad.is_empty());
    }
}
