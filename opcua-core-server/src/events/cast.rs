//! The data type precedence and casting rules used by the filter
//! operators (Part 4, tables 122 and 123).

use opcua_types::{Guid, Variant, VariantScalarTypeId};

/// What a cast between two types is allowed to do.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CastRule {
    /// The types are the same.
    Same,
    /// An implicit cast is allowed.
    Implicit,
    /// Only an explicit cast is allowed.
    Explicit,
    /// No cast exists.
    Forbidden,
}

/// The precedence rank of a type for implicit casting. 1 is the highest;
/// implicit casts always run toward the operand of lower precedence.
/// Types without a rank cannot participate in implicit casts.
pub fn precedence(t: VariantScalarTypeId) -> Option<i16> {
    use VariantScalarTypeId::*;
    Some(match t {
        Double => 1,
        Float => 2,
        Int64 => 3,
        UInt64 => 4,
        Int32 => 5,
        UInt32 => 6,
        StatusCode => 7,
        Int16 => 8,
        UInt16 => 9,
        SByte => 10,
        Byte => 11,
        Boolean => 12,
        Guid => 13,
        String => 14,
        ExpandedNodeId => 15,
        NodeId => 16,
        LocalizedText => 17,
        QualifiedName => 18,
        _ => return None,
    })
}

/// Index of a scalar type in the casting rule table.
fn kind_index(t: VariantScalarTypeId) -> usize {
    use VariantScalarTypeId::*;
    match t {
        Boolean => 0,
        Byte => 1,
        ByteString => 2,
        DateTime => 3,
        Double => 4,
        ExpandedNodeId => 5,
        Float => 6,
        Guid => 7,
        Int16 => 8,
        Int32 => 9,
        Int64 => 10,
        NodeId => 11,
        SByte => 12,
        StatusCode => 13,
        String => 14,
        LocalizedText => 15,
        QualifiedName => 16,
        UInt16 => 17,
        UInt32 => 18,
        UInt64 => 19,
        XmlElement => 20,
    }
}

/// 0 -> same type, 1 -> implicit cast, 2 -> only explicit cast,
/// -1 -> cast invalid. Rows are the cast target, columns the source.
#[rustfmt::skip]
const CAST_RULES: [[i8; 21]; 21] = [
    [ 0, 1,-1,-1, 1,-1, 1,-1, 1, 1, 1,-1, 1,-1, 2,-1,-1, 1, 1, 1,-1],
    [ 2, 0,-1,-1, 1,-1, 1,-1, 1, 1, 1,-1, 1,-1, 2,-1,-1, 1, 1, 1,-1],
    [-1,-1, 0,-1,-1,-1,-1, 2,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1],
    [-1,-1,-1, 0,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1, 2,-1,-1,-1,-1,-1,-1],
    [ 2, 2,-1,-1, 0,-1, 2,-1, 2, 2, 2,-1, 2,-1, 2,-1,-1, 2, 2, 2,-1],
    [-1,-1,-1,-1,-1, 0,-1,-1,-1,-1,-1, 2,-1,-1, 1,-1,-1,-1,-1,-1,-1],
    [ 2, 2,-1,-1, 1,-1, 0,-1, 2, 2, 2,-1, 2,-1, 2,-1,-1, 2, 2, 2,-1],
    [-1,-1, 2,-1,-1,-1,-1, 0,-1,-1,-1,-1,-1,-1, 2,-1,-1,-1,-1,-1,-1],
    [ 2, 2,-1,-1, 1,-1, 1,-1, 0, 1, 1,-1, 2,-1, 2,-1,-1, 2, 1, 1,-1],
    [ 2, 2,-1,-1, 1,-1, 1,-1, 2, 0, 1,-1, 2, 2, 2,-1,-1, 2, 2, 1,-1],
    [ 2, 2,-1,-1, 1,-1, 1,-1, 2, 2, 0,-1, 2, 2, 2,-1,-1, 2, 2, 2,-1],
    [-1,-1,-1,-1,-1, 1,-1,-1,-1,-1,-1, 0,-1,-1, 1,-1,-1,-1,-1,-1,-1],
    [ 2, 2,-1,-1, 1,-1, 1,-1, 1, 1, 1,-1, 0,-1, 2,-1,-1, 1, 1, 1,-1],
    [-1,-1,-1,-1,-1,-1,-1,-1,-1, 1, 1,-1,-1, 0,-1,-1,-1, 2, 1, 1,-1],
    [ 1, 1,-1, 2, 1, 2, 1, 1, 1, 1, 1, 2, 1,-1, 0, 2, 2, 1, 1, 1,-1],
    [-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1, 1, 0,-1,-1,-1,-1,-1],
    [-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1, 1, 1, 0,-1,-1,-1,-1],
    [ 2, 2,-1,-1, 1,-1, 1,-1, 1, 1, 1,-1, 2, 1, 2,-1,-1, 0, 1, 1,-1],
    [ 2, 2,-1,-1, 1,-1, 1,-1, 2, 1, 1,-1, 2, 2, 2,-1,-1, 2, 0, 1,-1],
    [ 2, 2,-1,-1, 1,-1, 1,-1, 2, 2, 1,-1, 2, 2, 2,-1,-1, 2, 2, 0,-1],
    [-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1, 0],
];

/// Look up what a cast from `source` to `target` may do.
pub fn cast_rule(target: VariantScalarTypeId, source: VariantScalarTypeId) -> CastRule {
    match CAST_RULES[kind_index(target)][kind_index(source)] {
        0 => CastRule::Same,
        1 => CastRule::Implicit,
        2 => CastRule::Explicit,
        _ => CastRule::Forbidden,
    }
}

pub(crate) fn is_signed(t: VariantScalarTypeId) -> bool {
    use VariantScalarTypeId::*;
    matches!(t, SByte | Int16 | Int32 | Int64)
}

pub(crate) fn is_unsigned(t: VariantScalarTypeId) -> bool {
    use VariantScalarTypeId::*;
    matches!(t, Byte | UInt16 | UInt32 | UInt64)
}

pub(crate) fn is_float(t: VariantScalarTypeId) -> bool {
    use VariantScalarTypeId::*;
    matches!(t, Float | Double)
}

/// Whether the type is an integer of either signedness.
pub(crate) fn is_integer(t: VariantScalarTypeId) -> bool {
    is_signed(t) || is_unsigned(t)
}

pub(crate) fn as_signed(value: &Variant) -> Option<i64> {
    Some(match value {
        Variant::SByte(v) => *v as i64,
        Variant::Int16(v) => *v as i64,
        Variant::Int32(v) => *v as i64,
        Variant::Int64(v) => *v,
        _ => return None,
    })
}

pub(crate) fn as_unsigned(value: &Variant) -> Option<u64> {
    Some(match value {
        Variant::Byte(v) => *v as u64,
        Variant::UInt16(v) => *v as u64,
        Variant::UInt32(v) => *v as u64,
        Variant::UInt64(v) => *v,
        _ => return None,
    })
}

/// Round half away from zero, the rounding the casting rules prescribe.
fn round_half_up(v: f64) -> f64 {
    if v < 0.0 {
        -(-v + 0.5).floor()
    } else {
        (v + 0.5).floor()
    }
}

fn signed_to_variant(v: i64, target: VariantScalarTypeId) -> Option<Variant> {
    use VariantScalarTypeId::*;
    Some(match target {
        SByte => Variant::SByte(i8::try_from(v).ok()?),
        Int16 => Variant::Int16(i16::try_from(v).ok()?),
        Int32 => Variant::Int32(i32::try_from(v).ok()?),
        Int64 => Variant::Int64(v),
        _ => return None,
    })
}

fn unsigned_to_variant(v: u64, target: VariantScalarTypeId) -> Option<Variant> {
    use VariantScalarTypeId::*;
    Some(match target {
        Byte => Variant::Byte(u8::try_from(v).ok()?),
        UInt16 => Variant::UInt16(u16::try_from(v).ok()?),
        UInt32 => Variant::UInt32(u32::try_from(v).ok()?),
        UInt64 => Variant::UInt64(v),
        _ => return None,
    })
}

/// Cast a scalar value to the target type per the casting rules. With
/// `allow_explicit` false only implicit rules apply. Numeric casts fail
/// out of range rather than saturating, floats round half-up before the
/// bounds check, NaN never casts, strings parse with the canonical
/// parsers, and the empty variant always casts to the empty variant.
pub fn cast(value: &Variant, target: VariantScalarTypeId, allow_explicit: bool) -> Option<Variant> {
    use VariantScalarTypeId as T;

    if value.is_empty() {
        return Some(Variant::Empty);
    }
    let source = value.scalar_type_id()?;
    if source == target {
        return Some(value.clone());
    }
    match cast_rule(target, source) {
        CastRule::Same | CastRule::Implicit => {}
        CastRule::Explicit if allow_explicit => {}
        _ => return None,
    }

    // String sources parse with the canonical parsers
    if let Variant::String(s) = value {
        return match target {
            T::Boolean => match s.to_ascii_lowercase().as_str() {
                "true" | "1" => Some(Variant::Boolean(true)),
                "false" | "0" => Some(Variant::Boolean(false)),
                _ => None,
            },
            T::Guid => s.parse::<Guid>().ok().map(Variant::Guid),
            t if is_signed(t) => s.parse::<i64>().ok().and_then(|v| signed_to_variant(v, t)),
            t if is_unsigned(t) => s
                .parse::<u64>()
                .ok()
                .and_then(|v| unsigned_to_variant(v, t)),
            T::Float => s.parse::<f32>().ok().map(Variant::Float),
            T::Double => s.parse::<f64>().ok().map(Variant::Double),
            _ => None,
        };
    }

    match target {
        T::Double => value.as_f64().map(Variant::Double),
        T::Float => value.as_f64().map(|v| Variant::Float(v as f32)),
        t if is_signed(t) => {
            let widened = if let Some(v) = as_signed(value) {
                v
            } else if let Some(v) = as_unsigned(value) {
                i64::try_from(v).ok()?
            } else if let Some(v) = value.as_f64() {
                if v.is_nan() {
                    return None;
                }
                let rounded = round_half_up(v);
                if rounded < i64::MIN as f64 || rounded > i64::MAX as f64 {
                    return None;
                }
                rounded as i64
            } else if let Variant::Boolean(b) = value {
                *b as i64
            } else {
                return None;
            };
            signed_to_variant(widened, t)
        }
        t if is_unsigned(t) => {
            let widened = if let Some(v) = as_unsigned(value) {
                v
            } else if let Some(v) = as_signed(value) {
                u64::try_from(v).ok()?
            } else if let Some(v) = value.as_f64() {
                if v.is_nan() {
                    return None;
                }
                let rounded = round_half_up(v);
                if rounded < 0.0 || rounded > u64::MAX as f64 {
                    return None;
                }
                rounded as u64
            } else if let Variant::Boolean(b) = value {
                *b as u64
            } else {
                return None;
            };
            unsigned_to_variant(widened, t)
        }
        T::String => Some(Variant::String(value.to_string())),
        T::NodeId => match value {
            // Only an expanded id pointing at the local server reduces to
            // a plain node id
            Variant::ExpandedNodeId(v) if v.is_local() => {
                Some(Variant::NodeId(Box::new(v.node_id.clone())))
            }
            _ => None,
        },
        _ => None,
    }
}

/// Implicit cast only, the form the comparison operators use.
pub fn implicit_cast(value: &Variant, target: VariantScalarTypeId) -> Option<Variant> {
    cast(value, target, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_diagonal_is_same() {
        use VariantScalarTypeId::*;
        for t in [
            Boolean, Byte, ByteString, DateTime, Double, ExpandedNodeId, Float, Guid, Int16,
            Int32, Int64, NodeId, SByte, StatusCode, String, LocalizedText, QualifiedName, UInt16,
            UInt32, UInt64, XmlElement,
        ] {
            assert_eq!(cast_rule(t, t), CastRule::Same);
        }
    }

    #[test]
    fn implicit_runs_toward_lower_precedence() {
        use VariantScalarTypeId::*;
        // Int16 has lower precedence than Int32, so Int32 -> Int16 is the
        // implicit direction
        assert_eq!(cast_rule(Int16, Int32), CastRule::Implicit);
        assert_eq!(cast_rule(Int64, Int32), CastRule::Explicit);
        assert_eq!(cast_rule(Int32, Double), CastRule::Implicit);
        assert_eq!(cast_rule(Double, Int32), CastRule::Explicit);
        // Anything numeric renders to String implicitly
        assert_eq!(cast_rule(String, Int32), CastRule::Implicit);
        // String only parses into numbers explicitly
        assert_eq!(cast_rule(Int32, String), CastRule::Explicit);
        // DateTime converts to and from String only
        assert_eq!(cast_rule(DateTime, Guid), CastRule::Forbidden);
        assert_eq!(cast_rule(String, DateTime), CastRule::Explicit);
    }

    #[test]
    fn float_to_int_rounds_half_up() {
        use VariantScalarTypeId::*;
        assert_eq!(
            cast(&Variant::Double(2.5), Int32, false),
            Some(Variant::Int32(3))
        );
        assert_eq!(
            cast(&Variant::Double(2.4), Int32, false),
            Some(Variant::Int32(2))
        );
        assert_eq!(
            cast(&Variant::Double(-2.5), Int32, false),
            Some(Variant::Int32(-3))
        );
        assert_eq!(cast(&Variant::Double(f64::NAN), Int32, false), None);
        assert_eq!(cast(&Variant::Double(1e30), Int32, false), None);
    }

    #[test]
    fn signedness_range_checks() {
        use VariantScalarTypeId::*;
        assert_eq!(cast(&Variant::Int32(-1), UInt16, false), None);
        assert_eq!(cast(&Variant::Int64(-1), UInt64, true), None);
        assert_eq!(cast(&Variant::UInt64(u64::MAX), Int64, true), None);
        assert_eq!(cast(&Variant::Int64(7), UInt32, false), Some(Variant::UInt32(7)));
    }

    #[test]
    fn string_parsing_is_explicit() {
        use VariantScalarTypeId::*;
        assert_eq!(cast(&Variant::from("TRUE"), Boolean, false), None);
        assert_eq!(
            cast(&Variant::from("TRUE"), Boolean, true),
            Some(Variant::Boolean(true))
        );
        assert_eq!(
            cast(&Variant::from("0"), Boolean, true),
            Some(Variant::Boolean(false))
        );
        assert_eq!(cast(&Variant::from("maybe"), Boolean, true), None);
        assert_eq!(
            cast(&Variant::from("42"), Int32, true),
            Some(Variant::Int32(42))
        );
        assert!(matches!(
            cast(
                &Variant::from("72962b91-fa75-4ae6-8d28-b404dc7daf63"),
                Guid,
                true
            ),
            Some(Variant::Guid(_))
        ));
    }

    #[test]
    fn empty_casts_to_empty() {
        assert_eq!(
            implicit_cast(&Variant::Empty, VariantScalarTypeId::Int32),
            Some(Variant::Empty)
        );
    }
}
