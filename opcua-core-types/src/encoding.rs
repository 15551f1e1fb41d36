//! The canonical binary form of values.
//!
//! The subscription engine detects data changes by comparing the canonical
//! encoding of the sampled value against the last sampled encoding. The
//! format follows the OPC UA binary layout (little endian, encoding-mask
//! driven) closely enough to be injective; nothing here is ever put on a
//! wire.

use byteorder::{LittleEndian, WriteBytesExt};

use crate::{
    byte_string::ByteString, data_value::DataValue, localized_text::LocalizedText,
    node_id::Identifier, node_id::NodeId, qualified_name::QualifiedName, variant::Variant,
};

/// Encode a data value to its canonical binary form.
pub fn encode_data_value(value: &DataValue) -> Vec<u8> {
    let mut out = Vec::with_capacity(64);
    let mut mask = 0u8;
    if value.value.is_some() {
        mask |= 0x01;
    }
    if value.status.is_some() {
        mask |= 0x02;
    }
    if value.source_timestamp.is_some() {
        mask |= 0x04;
    }
    if value.server_timestamp.is_some() {
        mask |= 0x08;
    }
    if value.source_picoseconds.is_some() {
        mask |= 0x10;
    }
    if value.server_picoseconds.is_some() {
        mask |= 0x20;
    }
    out.push(mask);
    if let Some(v) = &value.value {
        encode_variant(v, &mut out);
    }
    if let Some(s) = &value.status {
        out.write_u32::<LittleEndian>(s.raw()).unwrap();
    }
    if let Some(t) = &value.source_timestamp {
        out.write_i64::<LittleEndian>(t.ticks()).unwrap();
    }
    if let Some(p) = &value.source_picoseconds {
        out.write_i16::<LittleEndian>(*p).unwrap();
    }
    if let Some(t) = &value.server_timestamp {
        out.write_i64::<LittleEndian>(t.ticks()).unwrap();
    }
    if let Some(p) = &value.server_picoseconds {
        out.write_i16::<LittleEndian>(*p).unwrap();
    }
    out
}

/// Encode a variant to its canonical binary form, appended to `out`.
pub fn encode_variant(value: &Variant, out: &mut Vec<u8>) {
    match value {
        Variant::Empty => out.push(0),
        Variant::Boolean(v) => {
            out.push(1);
            out.push(*v as u8);
        }
        Variant::SByte(v) => {
            out.push(2);
            out.write_i8(*v).unwrap();
        }
        Variant::Byte(v) => {
            out.push(3);
            out.push(*v);
        }
        Variant::Int16(v) => {
            out.push(4);
            out.write_i16::<LittleEndian>(*v).unwrap();
        }
        Variant::UInt16(v) => {
            out.push(5);
            out.write_u16::<LittleEndian>(*v).unwrap();
        }
        Variant::Int32(v) => {
            out.push(6);
            out.write_i32::<LittleEndian>(*v).unwrap();
        }
        Variant::UInt32(v) => {
            out.push(7);
            out.write_u32::<LittleEndian>(*v).unwrap();
        }
        Variant::Int64(v) => {
            out.push(8);
            out.write_i64::<LittleEndian>(*v).unwrap();
        }
        Variant::UInt64(v) => {
            out.push(9);
            out.write_u64::<LittleEndian>(*v).unwrap();
        }
        Variant::Float(v) => {
            out.push(10);
            out.write_u32::<LittleEndian>(v.to_bits()).unwrap();
        }
        Variant::Double(v) => {
            out.push(11);
            out.write_u64::<LittleEndian>(v.to_bits()).unwrap();
        }
        Variant::String(v) => {
            out.push(12);
            encode_string(v, out);
        }
        Variant::DateTime(v) => {
            out.push(13);
            out.write_i64::<LittleEndian>(v.ticks()).unwrap();
        }
        Variant::Guid(v) => {
            out.push(14);
            out.extend_from_slice(&v.as_bytes());
        }
        Variant::ByteString(v) => {
            out.push(15);
            encode_byte_string(v, out);
        }
        Variant::XmlElement(v) => {
            out.push(16);
            encode_string(v, out);
        }
        Variant::NodeId(v) => {
            out.push(17);
            encode_node_id(v, out);
        }
        Variant::ExpandedNodeId(v) => {
            out.push(18);
            encode_node_id(&v.node_id, out);
            match &v.namespace_uri {
                Some(uri) => encode_string(uri, out),
                None => out.write_i32::<LittleEndian>(-1).unwrap(),
            }
            out.write_u32::<LittleEndian>(v.server_index).unwrap();
        }
        Variant::StatusCode(v) => {
            out.push(19);
            out.write_u32::<LittleEndian>(v.raw()).unwrap();
        }
        Variant::QualifiedName(v) => {
            out.push(20);
            encode_qualified_name(v, out);
        }
        Variant::LocalizedText(v) => {
            out.push(21);
            encode_localized_text(v, out);
        }
        Variant::Array(a) => {
            // Array flag bit on top of the element type tag
            out.push(0x80);
            out.write_u32::<LittleEndian>(a.values.len() as u32).unwrap();
            for v in &a.values {
                encode_variant(v, out);
            }
        }
    }
}

fn encode_string(value: &str, out: &mut Vec<u8>) {
    out.write_i32::<LittleEndian>(value.len() as i32).unwrap();
    out.extend_from_slice(value.as_bytes());
}

fn encode_byte_string(value: &ByteString, out: &mut Vec<u8>) {
    match &value.value {
        Some(bytes) => {
            out.write_i32::<LittleEndian>(bytes.len() as i32).unwrap();
            out.extend_from_slice(bytes);
        }
        None => out.write_i32::<LittleEndian>(-1).unwrap(),
    }
}

fn encode_node_id(value: &NodeId, out: &mut Vec<u8>) {
    out.write_u16::<LittleEndian>(value.namespace).unwrap();
    match &value.identifier {
        Identifier::Numeric(v) => {
            out.push(0);
            out.write_u32::<LittleEndian>(*v).unwrap();
        }
        Identifier::String(v) => {
            out.push(1);
            encode_string(v, out);
        }
        Identifier::Guid(v) => {
            out.push(2);
            out.extend_from_slice(&v.as_bytes());
        }
        Identifier::ByteString(v) => {
            out.push(3);
            encode_byte_string(v, out);
        }
    }
}

fn encode_qualified_name(value: &QualifiedName, out: &mut Vec<u8>) {
    out.write_u16::<LittleEndian>(value.namespace_index).unwrap();
    encode_string(&value.name, out);
}

fn encode_localized_text(value: &LocalizedText, out: &mut Vec<u8>) {
    encode_string(&value.locale, out);
    encode_string(&value.text, out);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::VariantScalarTypeId;
    use crate::{DateTime, StatusCode};

    #[test]
    fn encoding_is_deterministic() {
        let dv = DataValue::new_at(3.14f64, DateTime::from_ticks(1234));
        assert_eq!(encode_data_value(&dv), encode_data_value(&dv.clone()));
    }

    #[test]
    fn encoding_separates_values() {
        let a = DataValue::new_at(1u32, DateTime::from_ticks(1));
        let b = DataValue::new_at(2u32, DateTime::from_ticks(1));
        assert_ne!(encode_data_value(&a), encode_data_value(&b));

        // A status difference alone must change the encoding
        let mut c = a.clone();
        c.status = Some(StatusCode::BadNoCommunication);
        assert_ne!(encode_data_value(&a), encode_data_value(&c));
    }

    #[test]
    fn type_tag_separates_same_bit_patterns() {
        let a = DataValue::new_at(1i32, DateTime::from_ticks(1));
        let b = DataValue::new_at(1u32, DateTime::from_ticks(1));
        assert_ne!(encode_data_value(&a), encode_data_value(&b));
    }

    #[test]
    fn arrays_encode_elementwise() {
        let arr1 = Variant::from_array(
            VariantScalarTypeId::Byte,
            vec![Variant::from(1u8), Variant::from(2u8)],
        );
        let arr2 = Variant::from_array(
            VariantScalarTypeId::Byte,
            vec![Variant::from(1u8), Variant::from(3u8)],
        );
        let mut e1 = Vec::new();
        let mut e2 = Vec::new();
        encode_variant(&arr1, &mut e1);
        encode_variant(&arr2, &mut e2);
        assert_ne!(e1, e2);
    }
}
