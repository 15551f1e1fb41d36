use crate::{
    node_id::NodeId, qualified_name::QualifiedName, status_code::StatusCode, variant::Variant,
};

/// What kind of change triggers a data change notification.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum DataChangeTrigger {
    /// Report on status changes only.
    Status,
    /// Report on status or value changes.
    #[default]
    StatusValue,
    /// Report on status, value or source timestamp changes.
    StatusValueTimestamp,
}

/// The deadband variant of a data change filter.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum DeadbandType {
    /// No deadband.
    #[default]
    None,
    /// Absolute deadband over the value delta.
    Absolute,
    /// Percent of the EURange. Unsupported by this runtime.
    Percent,
}

/// Filter deciding when a sampled value becomes a notification.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct DataChangeFilter {
    /// The trigger deciding which fields participate in change detection.
    pub trigger: DataChangeTrigger,
    /// The deadband type.
    pub deadband_type: DeadbandType,
    /// The deadband value, interpreted per `deadband_type`.
    pub deadband_value: f64,
}

/// The operator of a content filter element. Discriminants follow the
/// standard numbering.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u32)]
#[allow(missing_docs)]
pub enum FilterOperator {
    Equals = 0,
    IsNull = 1,
    GreaterThan = 2,
    LessThan = 3,
    GreaterThanOrEqual = 4,
    LessThanOrEqual = 5,
    Like = 6,
    Not = 7,
    Between = 8,
    InList = 9,
    And = 10,
    Or = 11,
    Cast = 12,
    InView = 13,
    OfType = 14,
    RelatedTo = 15,
    BitwiseAnd = 16,
    BitwiseOr = 17,
}

/// An operand of a content filter element. `Attribute` operands are carried
/// so validation can reject them explicitly.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOperand {
    /// A literal value.
    Literal(Variant),
    /// A reference to the boolean result of another element.
    Element {
        /// Index of the referenced element, must be greater than the index
        /// of the referring element.
        index: u32,
    },
    /// A field of the candidate event.
    SimpleAttribute(SimpleAttributeOperand),
    /// The full attribute operand. Not supported by this runtime.
    Attribute,
}

impl From<Variant> for FilterOperand {
    fn from(v: Variant) -> Self {
        FilterOperand::Literal(v)
    }
}

impl From<SimpleAttributeOperand> for FilterOperand {
    fn from(v: SimpleAttributeOperand) -> Self {
        FilterOperand::SimpleAttribute(v)
    }
}

/// One operator application inside a content filter.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentFilterElement {
    /// The operator.
    pub filter_operator: FilterOperator,
    /// Its operands, arity checked during validation.
    pub filter_operands: Vec<FilterOperand>,
}

impl ContentFilterElement {
    /// Build an element from an operator and operands.
    pub fn new(
        filter_operator: FilterOperator,
        filter_operands: Vec<FilterOperand>,
    ) -> ContentFilterElement {
        ContentFilterElement {
            filter_operator,
            filter_operands,
        }
    }
}

/// A where-clause: an array of elements evaluated from index 0.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContentFilter {
    /// The elements. May be empty, in which case everything matches.
    pub elements: Vec<ContentFilterElement>,
}

/// Selects one field of an event for delivery or evaluation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SimpleAttributeOperand {
    /// The event type the browse path is declared against.
    pub type_definition_id: NodeId,
    /// Browse-name steps from the event instance to the target node.
    pub browse_path: Vec<QualifiedName>,
    /// The attribute to read from the target, raw form.
    pub attribute_id: u32,
    /// Optional index range into a value attribute, string form.
    pub index_range: String,
}

impl SimpleAttributeOperand {
    /// A value select of a single browse-name step below the given type.
    pub fn new_value(type_definition_id: impl Into<NodeId>, path: &str) -> SimpleAttributeOperand {
        SimpleAttributeOperand {
            type_definition_id: type_definition_id.into(),
            browse_path: vec![QualifiedName::new(0, path)],
            attribute_id: crate::AttributeId::Value as u32,
            index_range: String::new(),
        }
    }
}

/// The filter of an event monitored item: which fields to deliver and
/// which events to accept.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventFilter {
    /// The fields delivered for each matching event.
    pub select_clauses: Vec<SimpleAttributeOperand>,
    /// The acceptance filter.
    pub where_clause: ContentFilter,
}

/// The filter attached to a monitored item.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum MonitoringFilter {
    /// No filter.
    #[default]
    None,
    /// A data change filter, valid for value attributes.
    DataChange(DataChangeFilter),
    /// An event filter, valid for the EventNotifier attribute.
    Event(EventFilter),
}

/// Per-element diagnostics of a validated or evaluated where-clause.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContentFilterElementResult {
    /// The element level status.
    pub status_code: StatusCode,
    /// One status per operand.
    pub operand_status_codes: Vec<StatusCode>,
}

/// Diagnostics for a whole where-clause.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContentFilterResult {
    /// One result per element.
    pub element_results: Vec<ContentFilterElementResult>,
}

/// Diagnostics for a whole event filter.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventFilterResult {
    /// One status per select clause.
    pub select_clause_results: Vec<StatusCode>,
    /// The where-clause diagnostics.
    pub where_clause_result: ContentFilterResult,
}

impl EventFilterResult {
    /// Whether every clause and element validated clean.
    pub fn is_valid(&self) -> bool {
        self.select_clause_results.iter().all(|s| s.is_good())
            && self
                .where_clause_result
                .element_results
                .iter()
                .all(|e| e.status_code.is_good())
    }
}

/// The fields of one delivered event, in select-clause order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventFieldList {
    /// Client supplied handle of the monitored item.
    pub client_handle: u32,
    /// One variant per select clause; unresolvable clauses yield `Empty`.
    pub event_fields: Vec<Variant>,
}
