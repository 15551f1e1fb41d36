//! The content filter evaluator.
//!
//! Elements are evaluated from the highest index downward into an indexed
//! slot per element; ElementOperand references point forward, so every
//! referenced slot is already computed when it is read. The final filter
//! decision is the value in slot 0: True is a match, False and Null are
//! not. No status code is ever used for control flow; each element writes
//! either a variant result or a diagnostic into its own slot.

use opcua_types::{
    AttributeId, ContentFilter, ContentFilterElementResult, ContentFilterResult, FilterOperand,
    FilterOperator, NodeId, NumericRange, ObjectTypeId, QualifiedName, SimpleAttributeOperand,
    StatusCode, Variant, VariantScalarTypeId,
};

use super::cast::{
    as_signed, as_unsigned, cast_rule, implicit_cast, is_float, is_integer, precedence, CastRule,
};
use super::{FilterTarget, Ternary};

/// Resolve a SimpleAttributeOperand against an origin event node.
///
/// An empty browse path addresses the origin itself, unless the declared
/// type is ConditionType, which would need the condition indirection this
/// runtime does not support. Otherwise the path resolves through a
/// simplified browse and the first match is read.
pub fn resolve_simple_attribute_operand(
    target: &dyn FilterTarget,
    origin: &NodeId,
    operand: &SimpleAttributeOperand,
) -> Result<Variant, StatusCode> {
    // The index range must parse before anything is read
    NumericRange::parse(&operand.index_range)?;

    let node = if operand.browse_path.is_empty() {
        let condition_type: NodeId = ObjectTypeId::ConditionType.into();
        if operand.type_definition_id == condition_type {
            return Err(StatusCode::BadNotSupported);
        }
        origin.clone()
    } else {
        target.resolve_browse_path(origin, &operand.browse_path)?
    };

    let value = target.read_attribute(&node, operand.attribute_id, &operand.index_range)?;
    if value.is_empty() {
        return Err(StatusCode::BadNoDataAvailable);
    }
    Ok(value)
}

/// Compare two resolved operands. Operands of different types are
/// implicitly cast toward the type of lower precedence; a failed or
/// forbidden cast yields False, empty operands yield Null, and order
/// comparisons on types without a natural order yield Null.
pub fn compare_operation(first: &Variant, second: &Variant, op: FilterOperator) -> Ternary {
    if first.is_empty() || second.is_empty() {
        return Ternary::Null;
    }
    if !first.is_scalar() || !second.is_scalar() {
        return Ternary::Null;
    }
    let first_type = first.scalar_type_id().unwrap();
    let second_type = second.scalar_type_id().unwrap();

    if first_type == second_type {
        return compare_same_type(first, second, op);
    }

    // Implicit casting runs toward the operand of lower precedence
    let (Some(first_prec), Some(second_prec)) = (precedence(first_type), precedence(second_type))
    else {
        return Ternary::False;
    };
    let (target_type, source) = if first_prec > second_prec {
        (first_type, second)
    } else {
        (second_type, first)
    };
    let source_type = source.scalar_type_id().unwrap();
    match cast_rule(target_type, source_type) {
        CastRule::Same | CastRule::Implicit => {}
        _ => return Ternary::False,
    }

    // Numeric pairs are compared in a widened class rather than actually
    // narrowing, so only a signedness conflict can fail
    if is_float(target_type) || is_float(source_type) {
        let (Some(a), Some(b)) = (first.as_f64(), second.as_f64()) else {
            return Ternary::False;
        };
        return apply_order(partial_order(a, b), op);
    }
    if is_integer(target_type) && is_integer(source_type) {
        return match (widen_integer(first), widen_integer(second)) {
            (Some(WideInt::Signed(a)), Some(WideInt::Signed(b))) => {
                apply_order(Some(a.cmp(&b)), op)
            }
            (Some(WideInt::Unsigned(a)), Some(WideInt::Unsigned(b))) => {
                apply_order(Some(a.cmp(&b)), op)
            }
            (Some(WideInt::Signed(a)), Some(WideInt::Unsigned(b))) => {
                mixed_sign_compare(a, b, if signed_is_target(first_type, target_type) {
                    MixedTarget::Signed
                } else {
                    MixedTarget::Unsigned
                })
                .map(|ord| apply_order(Some(ord), op))
                .unwrap_or(Ternary::False)
            }
            (Some(WideInt::Unsigned(a)), Some(WideInt::Signed(b))) => {
                mixed_sign_compare(b, a, if signed_is_target(second_type, target_type) {
                    MixedTarget::Signed
                } else {
                    MixedTarget::Unsigned
                })
                .map(|ord| apply_order(Some(ord.reverse()), op))
                .unwrap_or(Ternary::False)
            }
            _ => Ternary::False,
        };
    }

    // Everything else goes through the actual cast and a same-type compare
    match implicit_cast(source, target_type) {
        Some(cast_value) => {
            if first_prec > second_prec {
                compare_same_type(first, &cast_value, op)
            } else {
                compare_same_type(&cast_value, second, op)
            }
        }
        None => Ternary::False,
    }
}

#[derive(Debug, Copy, Clone)]
enum WideInt {
    Signed(i64),
    Unsigned(u64),
}

#[derive(Debug, Copy, Clone, PartialEq)]
enum MixedTarget {
    Signed,
    Unsigned,
}

fn widen_integer(value: &Variant) -> Option<WideInt> {
    as_signed(value)
        .map(WideInt::Signed)
        .or_else(|| as_unsigned(value).map(WideInt::Unsigned))
}

fn signed_is_target(this_type: VariantScalarTypeId, target_type: VariantScalarTypeId) -> bool {
    this_type == target_type && super::cast::is_signed(target_type)
}

/// Compare a signed and an unsigned value by casting toward the target
/// signedness. The cast fails out of range, per the casting rules.
fn mixed_sign_compare(
    signed: i64,
    unsigned: u64,
    target: MixedTarget,
) -> Option<std::cmp::Ordering> {
    match target {
        MixedTarget::Signed => {
            let unsigned = i64::try_from(unsigned).ok()?;
            Some(signed.cmp(&unsigned))
        }
        MixedTarget::Unsigned => {
            let signed = u64::try_from(signed).ok()?;
            Some(signed.cmp(&unsigned))
        }
    }
}

fn partial_order(a: f64, b: f64) -> Option<std::cmp::Ordering> {
    a.partial_cmp(&b)
}

fn apply_order(ord: Option<std::cmp::Ordering>, op: FilterOperator) -> Ternary {
    use std::cmp::Ordering;
    let Some(ord) = ord else {
        // NaN compares with nothing
        return Ternary::False;
    };
    let result = match op {
        FilterOperator::Equals => ord == Ordering::Equal,
        FilterOperator::GreaterThan => ord == Ordering::Greater,
        FilterOperator::LessThan => ord == Ordering::Less,
        FilterOperator::GreaterThanOrEqual => ord != Ordering::Less,
        FilterOperator::LessThanOrEqual => ord != Ordering::Greater,
        _ => return Ternary::Null,
    };
    Ternary::from_bool(result)
}

fn compare_same_type(first: &Variant, second: &Variant, op: FilterOperator) -> Ternary {
    use VariantScalarTypeId as T;
    let type_id = first.scalar_type_id().unwrap();

    // Types with a natural order compare fully
    let ord = match type_id {
        t if is_integer(t) => match widen_integer(first).zip(widen_integer(second)) {
            Some((WideInt::Signed(a), WideInt::Signed(b))) => Some(a.cmp(&b)),
            Some((WideInt::Unsigned(a), WideInt::Unsigned(b))) => Some(a.cmp(&b)),
            _ => None,
        },
        t if is_float(t) => return apply_order(partial_order(
            first.as_f64().unwrap(),
            second.as_f64().unwrap(),
        ), op),
        T::Boolean | T::DateTime | T::String | T::ByteString | T::StatusCode => {
            match (first, second) {
                (Variant::Boolean(a), Variant::Boolean(b)) => Some(a.cmp(b)),
                (Variant::DateTime(a), Variant::DateTime(b)) => Some(a.cmp(b)),
                (Variant::String(a), Variant::String(b)) => Some(a.cmp(b)),
                (Variant::ByteString(a), Variant::ByteString(b)) => Some(a.cmp(b)),
                (Variant::StatusCode(a), Variant::StatusCode(b)) => Some(a.raw().cmp(&b.raw())),
                _ => None,
            }
        }
        // Unordered types support equality only
        _ => {
            return match op {
                FilterOperator::Equals => Ternary::from_bool(first == second),
                _ => Ternary::Null,
            };
        }
    };
    apply_order(ord, op)
}

struct EvalContext<'a> {
    target: &'a dyn FilterTarget,
    event_node: &'a NodeId,
    filter: &'a ContentFilter,
    slots: Vec<Variant>,
    diagnostics: Vec<ContentFilterElementResult>,
}

/// Evaluate a where clause against a candidate event node.
///
/// Returns `Good` on a match, `BadNoMatch` otherwise, and per-element
/// diagnostics either way. An empty filter matches everything.
pub fn evaluate_where_clause(
    target: &dyn FilterTarget,
    event_node: &NodeId,
    filter: &ContentFilter,
) -> (StatusCode, ContentFilterResult) {
    let n = filter.elements.len();
    if n == 0 {
        return (StatusCode::Good, ContentFilterResult::default());
    }

    let mut ctx = EvalContext {
        target,
        event_node,
        filter,
        slots: vec![Variant::Empty; n],
        diagnostics: filter
            .elements
            .iter()
            .map(|e| ContentFilterElementResult {
                status_code: StatusCode::Good,
                operand_status_codes: vec![StatusCode::Good; e.filter_operands.len()],
            })
            .collect(),
    };

    // Highest index first: forward references are then always precomputed
    for index in (0..n).rev() {
        let (value, status) = evaluate_element(&mut ctx, index);
        ctx.slots[index] = value;
        ctx.diagnostics[index].status_code = status;
    }

    let result = ContentFilterResult {
        element_results: ctx.diagnostics,
    };
    let status0 = result.element_results[0].status_code;
    if !status0.is_good() {
        return (status0, result);
    }
    match ctx.slots[0] {
        Variant::Boolean(true) => (StatusCode::Good, result),
        _ => (StatusCode::BadNoMatch, result),
    }
}

/// Resolve one operand of the element at `index` to a variant. Errors are
/// recorded in the operand's diagnostic slot and yield the empty variant.
fn resolve_operand(ctx: &mut EvalContext<'_>, index: usize, nr: usize) -> Variant {
    let operand = &ctx.filter.elements[index].filter_operands[nr];
    let (value, status) = match operand {
        FilterOperand::Literal(value) => (value.clone(), StatusCode::Good),
        FilterOperand::Element { index: referenced } => {
            let referenced = *referenced as usize;
            if referenced <= index || referenced >= ctx.slots.len() {
                (Variant::Empty, StatusCode::BadFilterOperandInvalid)
            } else {
                (ctx.slots[referenced].clone(), StatusCode::Good)
            }
        }
        FilterOperand::SimpleAttribute(operand) => {
            match resolve_simple_attribute_operand(ctx.target, ctx.event_node, operand) {
                Ok(value) => (value, StatusCode::Good),
                Err(status) => (Variant::Empty, status),
            }
        }
        FilterOperand::Attribute => (Variant::Empty, StatusCode::BadNotSupported),
    };
    if !status.is_good() {
        ctx.diagnostics[index].operand_status_codes[nr] = status;
    }
    value
}

fn evaluate_element(ctx: &mut EvalContext<'_>, index: usize) -> (Variant, StatusCode) {
    let element = &ctx.filter.elements[index];
    let operator = element.filter_operator;
    let arity = element.filter_operands.len();

    match operator {
        FilterOperator::InView | FilterOperator::RelatedTo => {
            // Not allowed in an event where clause
            (Variant::Empty, StatusCode::BadEventFilterInvalid)
        }
        FilterOperator::Like | FilterOperator::Cast => {
            (Variant::Empty, StatusCode::BadFilterOperatorUnsupported)
        }
        FilterOperator::Equals
        | FilterOperator::GreaterThan
        | FilterOperator::LessThan
        | FilterOperator::GreaterThanOrEqual
        | FilterOperator::LessThanOrEqual => {
            if arity != 2 {
                return (Variant::Empty, StatusCode::BadFilterOperandCountMismatch);
            }
            let first = resolve_operand(ctx, index, 0);
            let second = resolve_operand(ctx, index, 1);
            (compare_operation(&first, &second, operator).to_variant(), StatusCode::Good)
        }
        FilterOperator::Not => {
            if arity != 1 {
                return (Variant::Empty, StatusCode::BadFilterOperandCountMismatch);
            }
            let value = resolve_operand(ctx, index, 0);
            (Ternary::from_variant(&value).not().to_variant(), StatusCode::Good)
        }
        FilterOperator::And => {
            if arity != 2 {
                return (Variant::Empty, StatusCode::BadFilterOperandCountMismatch);
            }
            let first = Ternary::from_variant(&resolve_operand(ctx, index, 0));
            let second = Ternary::from_variant(&resolve_operand(ctx, index, 1));
            (first.and(second).to_variant(), StatusCode::Good)
        }
        FilterOperator::Or => {
            if arity != 2 {
                return (Variant::Empty, StatusCode::BadFilterOperandCountMismatch);
            }
            let first = Ternary::from_variant(&resolve_operand(ctx, index, 0));
            let second = Ternary::from_variant(&resolve_operand(ctx, index, 1));
            (first.or(second).to_variant(), StatusCode::Good)
        }
        FilterOperator::Between => {
            if arity != 3 {
                return (Variant::Empty, StatusCode::BadFilterOperandCountMismatch);
            }
            let value = resolve_operand(ctx, index, 0);
            let low = resolve_operand(ctx, index, 1);
            let high = resolve_operand(ctx, index, 2);
            if !value.is_numeric() || !low.is_numeric() || !high.is_numeric() {
                return (Variant::Empty, StatusCode::BadFilterOperandInvalid);
            }
            let ge = compare_operation(&value, &low, FilterOperator::GreaterThanOrEqual);
            let le = compare_operation(&value, &high, FilterOperator::LessThanOrEqual);
            (ge.and(le).to_variant(), StatusCode::Good)
        }
        FilterOperator::InList => {
            if arity < 2 {
                return (Variant::Empty, StatusCode::BadFilterOperandCountMismatch);
            }
            let value = resolve_operand(ctx, index, 0);
            if value.is_empty() || !value.is_scalar() {
                return (Variant::Empty, StatusCode::Good);
            }
            let mut result = Ternary::False;
            for nr in 1..arity {
                let candidate = resolve_operand(ctx, index, nr);
                if compare_operation(&value, &candidate, FilterOperator::Equals) == Ternary::True {
                    result = Ternary::True;
                    break;
                }
            }
            (result.to_variant(), StatusCode::Good)
        }
        FilterOperator::IsNull => {
            if arity != 1 {
                return (Variant::Empty, StatusCode::BadFilterOperandCountMismatch);
            }
            let value = resolve_operand(ctx, index, 0);
            (Variant::Boolean(value.is_empty()), StatusCode::Good)
        }
        FilterOperator::OfType => {
            if arity != 1 {
                return (Variant::Empty, StatusCode::BadFilterOperandCountMismatch);
            }
            let FilterOperand::Literal(literal) = &ctx.filter.elements[index].filter_operands[0]
            else {
                return (Variant::Empty, StatusCode::BadFilterOperatorUnsupported);
            };
            let Some(type_id) = literal.as_node_id().cloned() else {
                return (Variant::Empty, StatusCode::BadEventFilterInvalid);
            };
            match read_event_type(ctx.target, ctx.event_node) {
                Ok(event_type) => {
                    let matches = event_type == type_id
                        || ctx.target.is_subtype_of(&event_type, &type_id);
                    (Variant::Boolean(matches), StatusCode::Good)
                }
                Err(status) => (Variant::Empty, status),
            }
        }
        FilterOperator::BitwiseAnd | FilterOperator::BitwiseOr => {
            if arity != 2 {
                return (Variant::Empty, StatusCode::BadFilterOperandCountMismatch);
            }
            let first = resolve_operand(ctx, index, 0);
            let second = resolve_operand(ctx, index, 1);
            bitwise_operation(&first, &second, operator == FilterOperator::BitwiseAnd)
        }
    }
}

/// Read the EventType property of the candidate event.
fn read_event_type(target: &dyn FilterTarget, event_node: &NodeId) -> Result<NodeId, StatusCode> {
    let type_node =
        target.resolve_browse_path(event_node, &[QualifiedName::new(0, "EventType")])?;
    let value = target.read_attribute(&type_node, AttributeId::Value as u32, "")?;
    value
        .as_node_id()
        .cloned()
        .ok_or(StatusCode::BadInternalError)
}

/// Bitwise and/or over two integers. The result takes the wider of the
/// two integer types; the other operand is implicitly cast to it, which
/// makes the operands effectively same-sized.
fn bitwise_operation(first: &Variant, second: &Variant, and: bool) -> (Variant, StatusCode) {
    let (Some(first_type), Some(second_type)) =
        (first.scalar_type_id(), second.scalar_type_id())
    else {
        return (Variant::Empty, StatusCode::BadFilterOperandInvalid);
    };
    if !is_integer(first_type)
        || !is_integer(second_type)
        || !first.is_scalar()
        || !second.is_scalar()
    {
        return (Variant::Empty, StatusCode::BadFilterOperandInvalid);
    }
    // The wider integer has the numerically smaller precedence rank
    let (Some(first_prec), Some(second_prec)) = (precedence(first_type), precedence(second_type))
    else {
        return (Variant::Empty, StatusCode::BadFilterOperandInvalid);
    };
    let result_type = if first_prec <= second_prec {
        first_type
    } else {
        second_type
    };
    let (Some(a), Some(b)) = (
        super::cast::cast(first, result_type, true),
        super::cast::cast(second, result_type, true),
    ) else {
        return (Variant::Empty, StatusCode::BadFilterOperandInvalid);
    };
    let value = match (as_signed(&a), as_signed(&b), as_unsigned(&a), as_unsigned(&b)) {
        (Some(a), Some(b), _, _) => {
            let r = if and { a & b } else { a | b };
            match result_type {
                VariantScalarTypeId::SByte => Variant::SByte(r as i8),
                VariantScalarTypeId::Int16 => Variant::Int16(r as i16),
                VariantScalarTypeId::Int32 => Variant::Int32(r as i32),
                _ => Variant::Int64(r),
            }
        }
        (_, _, Some(a), Some(b)) => {
            let r = if and { a & b } else { a | b };
            match result_type {
                VariantScalarTypeId::Byte => Variant::Byte(r as u8),
                VariantScalarTypeId::UInt16 => Variant::UInt16(r as u16),
                VariantScalarTypeId::UInt32 => Variant::UInt32(r as u32),
                _ => Variant::UInt64(r),
            }
        }
        _ => return (Variant::Empty, StatusCode::BadFilterOperandInvalid),
    };
    (value, StatusCode::Good)
}
