//! Event filter machinery: SimpleAttributeOperand resolution, the
//! ContentFilter evaluator and the static filter validations run at
//! monitored item creation.

mod cast;
mod evaluator;
mod validation;

pub use cast::{cast_rule, implicit_cast, precedence, CastRule};
pub use evaluator::{compare_operation, evaluate_where_clause, resolve_simple_attribute_operand};
pub use validation::{validate_event_filter, validate_select_clauses, validate_where_clause};

use opcua_types::{
    EventFieldList, EventFilter, EventFilterResult, NodeId, ObjectTypeId, QualifiedName,
    StatusCode, Variant,
};

/// What the filter evaluator needs from the address space. The evaluator
/// itself is pure: identical inputs yield identical outputs and nothing
/// outside the caller-owned result buffers is touched.
pub trait FilterTarget {
    /// Read an attribute of a node, applying the index range. `Ok` with an
    /// empty variant means the attribute exists but holds nothing.
    fn read_attribute(
        &self,
        node_id: &NodeId,
        attribute_id: u32,
        index_range: &str,
    ) -> Result<Variant, StatusCode>;

    /// Resolve browse-name steps from `origin` along forward hierarchical
    /// references, returning the first match.
    fn resolve_browse_path(
        &self,
        origin: &NodeId,
        path: &[QualifiedName],
    ) -> Result<NodeId, StatusCode>;

    /// Whether `node` equals `of` or descends from it via HasSubtype.
    fn is_subtype_of(&self, node: &NodeId, of: &NodeId) -> bool;

    /// All known types equal to or descending from `type_id`.
    fn subtypes_of(&self, type_id: &NodeId) -> Vec<NodeId>;
}

/// Kleene's strong three-valued logic.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Ternary {
    /// Definitely true.
    True,
    /// Definitely false.
    False,
    /// Unknown.
    Null,
}

impl Ternary {
    /// Interpret a variant as a logical value. Non-boolean input is Null.
    pub fn from_variant(value: &Variant) -> Ternary {
        match value {
            Variant::Boolean(true) => Ternary::True,
            Variant::Boolean(false) => Ternary::False,
            _ => Ternary::Null,
        }
    }

    /// Back to a variant slot value; Null becomes the empty variant.
    pub fn to_variant(self) -> Variant {
        match self {
            Ternary::True => Variant::Boolean(true),
            Ternary::False => Variant::Boolean(false),
            Ternary::Null => Variant::Empty,
        }
    }

    /// Kleene conjunction.
    pub fn and(self, other: Ternary) -> Ternary {
        match (self, other) {
            (Ternary::False, _) | (_, Ternary::False) => Ternary::False,
            (Ternary::True, Ternary::True) => Ternary::True,
            _ => Ternary::Null,
        }
    }

    /// Kleene disjunction.
    pub fn or(self, other: Ternary) -> Ternary {
        match (self, other) {
            (Ternary::True, _) | (_, Ternary::True) => Ternary::True,
            (Ternary::False, Ternary::False) => Ternary::False,
            _ => Ternary::Null,
        }
    }

    /// Kleene negation.
    pub fn not(self) -> Ternary {
        match self {
            Ternary::True => Ternary::False,
            Ternary::False => Ternary::True,
            Ternary::Null => Ternary::Null,
        }
    }

    /// From a definite boolean.
    pub fn from_bool(value: bool) -> Ternary {
        if value {
            Ternary::True
        } else {
            Ternary::False
        }
    }
}

/// Apply an event filter to a candidate event node: evaluate the where
/// clause, then resolve the select clauses into the delivered field list.
/// `Err(BadNoMatch)` means the event is silently dropped.
pub fn filter_event(
    target: &dyn FilterTarget,
    event_node: &NodeId,
    filter: &EventFilter,
) -> Result<(EventFieldList, EventFilterResult), StatusCode> {
    if filter.select_clauses.is_empty() {
        return Err(StatusCode::BadEventFilterInvalid);
    }

    let (where_status, where_clause_result) =
        evaluate_where_clause(target, event_node, &filter.where_clause);
    if !where_status.is_good() {
        return Err(where_status);
    }

    let base_event_type: NodeId = ObjectTypeId::BaseEventType.into();
    let mut event_fields = Vec::with_capacity(filter.select_clauses.len());
    let mut select_clause_results = Vec::with_capacity(filter.select_clauses.len());
    for clause in &filter.select_clauses {
        // A clause declared against a type the event is not an instance of
        // yields an empty field, not an error.
        if clause.type_definition_id != base_event_type
            && !is_valid_event(target, &clause.type_definition_id, event_node)
        {
            event_fields.push(Variant::Empty);
            select_clause_results.push(StatusCode::BadTypeDefinitionInvalid);
            continue;
        }
        match resolve_simple_attribute_operand(target, event_node, clause) {
            Ok(value) => {
                event_fields.push(value);
                select_clause_results.push(StatusCode::Good);
            }
            Err(status) => {
                event_fields.push(Variant::Empty);
                select_clause_results.push(status);
            }
        }
    }

    Ok((
        EventFieldList {
            client_handle: 0,
            event_fields,
        },
        EventFilterResult {
            select_clause_results,
            where_clause_result,
        },
    ))
}

/// Whether the candidate event's type is an instance of the declared
/// parent type: its EventType property must be a subtype of it (or of
/// ConditionType for the recognized indirection).
pub fn is_valid_event(
    target: &dyn FilterTarget,
    declared_parent: &NodeId,
    event_node: &NodeId,
) -> bool {
    let Ok(event_type_node) =
        target.resolve_browse_path(event_node, &[QualifiedName::new(0, "EventType")])
    else {
        return false;
    };
    let Ok(value) = target.read_attribute(
        &event_type_node,
        opcua_types::AttributeId::Value as u32,
        "",
    ) else {
        return false;
    };
    let Some(event_type) = value.as_node_id() else {
        return false;
    };

    let condition_type: NodeId = ObjectTypeId::ConditionType.into();
    if *declared_parent == condition_type {
        return target.is_subtype_of(event_type, &condition_type);
    }
    target.is_subtype_of(event_type, declared_parent)
}
