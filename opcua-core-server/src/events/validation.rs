//! Static validation of event filters at monitored item creation and
//! modification. Diagnostics are reported per select clause and per
//! where-clause element and operand.

use opcua_types::{
    AttributeId, ContentFilter, ContentFilterElementResult, ContentFilterResult, EventFilter,
    EventFilterResult, FilterOperand, FilterOperator, NodeId, NumericRange, ObjectTypeId,
    StatusCode,
};

use super::FilterTarget;

/// Validate the select clauses of an event filter, one status per clause.
///
/// Checks performed per clause:
/// - the type definition id is not null and is a subtype of BaseEventType
/// - the attribute id is within the defined range
/// - no browse path segment is a null name
/// - the browse path resolves from at least one subtype of the declared
///   type
/// - a set index range parses and the attribute is Value
pub fn validate_select_clauses(
    target: &dyn FilterTarget,
    filter: &EventFilter,
) -> Vec<StatusCode> {
    let base_event_type: NodeId = ObjectTypeId::BaseEventType.into();
    let condition_type: NodeId = ObjectTypeId::ConditionType.into();

    filter
        .select_clauses
        .iter()
        .map(|clause| {
            if clause.type_definition_id.is_null() {
                return StatusCode::BadTypeDefinitionInvalid;
            }
            // The condition indirection is recognized even without the
            // alarms & conditions model being present
            if clause.type_definition_id == condition_type {
                return StatusCode::Good;
            }
            if !target.is_subtype_of(&clause.type_definition_id, &base_event_type) {
                return StatusCode::BadTypeDefinitionInvalid;
            }
            let Ok(attribute_id) = AttributeId::from_u32(clause.attribute_id) else {
                return StatusCode::BadAttributeIdInvalid;
            };
            if clause.browse_path.iter().any(|segment| segment.is_null()) {
                return StatusCode::BadBrowseNameInvalid;
            }

            // The path must exist below the declared type or one of its
            // subtypes
            if !clause.browse_path.is_empty() {
                let resolvable = target
                    .subtypes_of(&clause.type_definition_id)
                    .iter()
                    .any(|subtype| {
                        target
                            .resolve_browse_path(subtype, &clause.browse_path)
                            .is_ok()
                    });
                if !resolvable {
                    return StatusCode::BadNodeIdUnknown;
                }
            }

            if !clause.index_range.is_empty() {
                if NumericRange::parse(&clause.index_range).is_err() {
                    return StatusCode::BadIndexRangeInvalid;
                }
                if attribute_id != AttributeId::Value {
                    return StatusCode::BadTypeMismatch;
                }
            }
            StatusCode::Good
        })
        .collect()
}

/// Validate a where clause: operator range, operand arity, operand kinds,
/// forward element references and the OfType operand constraint.
pub fn validate_where_clause(
    target: &dyn FilterTarget,
    filter: &ContentFilter,
) -> ContentFilterResult {
    let element_count = filter.elements.len();
    let element_results = filter
        .elements
        .iter()
        .enumerate()
        .map(|(index, element)| {
            let mut result = ContentFilterElementResult {
                status_code: StatusCode::Good,
                operand_status_codes: vec![StatusCode::Good; element.filter_operands.len()],
            };
            let arity = element.filter_operands.len();

            // Unsupported operand kinds fail the element outright
            for (nr, operand) in element.filter_operands.iter().enumerate() {
                if matches!(operand, FilterOperand::Attribute) {
                    result.operand_status_codes[nr] = StatusCode::BadFilterOperandInvalid;
                    result.status_code = StatusCode::BadFilterOperandInvalid;
                }
            }
            if !result.status_code.is_good() {
                return result;
            }

            // Element references must point forward and stay in range
            for (nr, operand) in element.filter_operands.iter().enumerate() {
                if let FilterOperand::Element { index: referenced } = operand {
                    let referenced = *referenced as usize;
                    if referenced >= element_count {
                        result.operand_status_codes[nr] = StatusCode::BadIndexRangeInvalid;
                        result.status_code = StatusCode::BadIndexRangeInvalid;
                    } else if referenced <= index {
                        result.operand_status_codes[nr] = StatusCode::BadFilterOperandInvalid;
                        result.status_code = StatusCode::BadFilterOperandInvalid;
                    }
                }
            }
            if !result.status_code.is_good() {
                return result;
            }

            result.status_code = match element.filter_operator {
                FilterOperator::InView | FilterOperator::RelatedTo => {
                    // Not allowed for an event where clause
                    StatusCode::BadEventFilterInvalid
                }
                FilterOperator::Like | FilterOperator::Cast => {
                    StatusCode::BadFilterOperatorUnsupported
                }
                FilterOperator::Equals
                | FilterOperator::GreaterThan
                | FilterOperator::LessThan
                | FilterOperator::GreaterThanOrEqual
                | FilterOperator::LessThanOrEqual
                | FilterOperator::BitwiseAnd
                | FilterOperator::BitwiseOr
                | FilterOperator::And
                | FilterOperator::Or => {
                    if arity != 2 {
                        StatusCode::BadFilterOperandCountMismatch
                    } else {
                        StatusCode::Good
                    }
                }
                FilterOperator::IsNull | FilterOperator::Not => {
                    if arity != 1 {
                        StatusCode::BadFilterOperandCountMismatch
                    } else {
                        StatusCode::Good
                    }
                }
                FilterOperator::InList => {
                    if arity < 2 {
                        StatusCode::BadFilterOperandCountMismatch
                    } else {
                        StatusCode::Good
                    }
                }
                FilterOperator::Between => {
                    if arity != 3 {
                        StatusCode::BadFilterOperandCountMismatch
                    } else {
                        StatusCode::Good
                    }
                }
                FilterOperator::OfType => validate_of_type(target, element, &mut result),
            };
            result
        })
        .collect();

    ContentFilterResult { element_results }
}

fn validate_of_type(
    target: &dyn FilterTarget,
    element: &opcua_types::ContentFilterElement,
    result: &mut ContentFilterElementResult,
) -> StatusCode {
    if element.filter_operands.len() != 1 {
        return StatusCode::BadFilterOperandCountMismatch;
    }
    let FilterOperand::Literal(literal) = &element.filter_operands[0] else {
        result.operand_status_codes[0] = StatusCode::BadFilterOperandInvalid;
        return StatusCode::BadFilterOperandInvalid;
    };
    let Some(type_id) = literal.as_node_id() else {
        result.operand_status_codes[0] = StatusCode::BadFilterOperandInvalid;
        return StatusCode::BadFilterOperandInvalid;
    };
    // The operand must name an event type
    let base_event_type: NodeId = ObjectTypeId::BaseEventType.into();
    if !target.is_subtype_of(type_id, &base_event_type) {
        result.operand_status_codes[0] = StatusCode::BadNodeIdInvalid;
        return StatusCode::BadNodeIdInvalid;
    }
    StatusCode::Good
}

/// Validate a whole event filter. The filter is usable when every select
/// clause and where element validated clean.
pub fn validate_event_filter(
    target: &dyn FilterTarget,
    filter: &EventFilter,
) -> EventFilterResult {
    EventFilterResult {
        select_clause_results: validate_select_clauses(target, filter),
        where_clause_result: validate_where_clause(target, &filter.where_clause),
    }
}
