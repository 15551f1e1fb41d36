use super::*;
use crate::events::{
    compare_operation, evaluate_where_clause, validate_event_filter, Ternary,
};

fn simple_event_type() -> NodeId {
    NodeId::new(1, 5000u32)
}

fn sibling_event_type() -> NodeId {
    NodeId::new(1, 5001u32)
}

fn setup_with_event_types() -> (ServerCore, u32, Arc<RecordingChannel>) {
    let (mut core, session_id, channel) = setup();
    core.type_tree
        .add_subtype(ObjectTypeId::BaseEventType, simple_event_type());
    core.type_tree
        .add_subtype(ObjectTypeId::BaseEventType, sibling_event_type());
    (core, session_id, channel)
}

fn last_published_events(channel: &RecordingChannel) -> Vec<Vec<Variant>> {
    let responses = channel.publish_responses.lock();
    let Some((_, response)) = responses.last() else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for data in &response.notification_message.notification_data {
        if let NotificationData::Events(list) = data {
            for event in &list.events {
                out.push(event.event_fields.clone());
            }
        }
    }
    out
}

#[test]
fn of_type_filter_delivers_matching_events_only() {
    let (mut core, session_id, channel) = setup_with_event_types();
    let server_id: NodeId = ObjectId::Server.into();

    let sub_id = create_subscription(&mut core, session_id, 500.0, 9, 3);
    let (status, _mi) = create_event_item(
        &mut core,
        session_id,
        sub_id,
        &server_id,
        of_type_filter(ObjectTypeId::BaseEventType.into()),
    );
    assert_eq!(status, StatusCode::Good);

    // Trigger a SimpleEventType instance on the server object
    let event = core.create_event(simple_event_type()).unwrap();
    core.write_event_property(&event, "Severity", Variant::UInt16(500))
        .unwrap();
    let event_id = core.trigger_event(&event, &server_id, true).unwrap();
    assert_eq!(event_id.len(), 16);

    queue_publish(&mut core, session_id, 1);
    core.subscription_publish_tick(session_id, sub_id);
    let events = last_published_events(&channel);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0], vec![Variant::UInt16(500)]);
}

#[test]
fn of_type_filter_drops_sibling_types_silently() {
    let (mut core, session_id, channel) = setup_with_event_types();
    let server_id: NodeId = ObjectId::Server.into();

    let sub_id = create_subscription(&mut core, session_id, 500.0, 9, 3);
    let (status, mi) = create_event_item(
        &mut core,
        session_id,
        sub_id,
        &server_id,
        of_type_filter(sibling_event_type()),
    );
    assert_eq!(status, StatusCode::Good);

    // The triggered event is a SimpleEventType, a sibling of the filter's
    // type: dropped without any service error
    let event = core.create_event(simple_event_type()).unwrap();
    let result = core.trigger_event(&event, &server_id, true);
    assert!(result.is_ok());

    {
        let sub = &core.session(session_id).unwrap().subscriptions[&sub_id];
        assert_eq!(sub.monitored_item(mi).unwrap().queue_len(), 0);
    }

    // The publish tick produces a keepalive, not an event
    queue_publish(&mut core, session_id, 1);
    core.subscription_publish_tick(session_id, sub_id);
    assert!(last_published_events(&channel).is_empty());
}

#[test]
fn events_reach_items_along_the_notifier_hierarchy() {
    let (mut core, session_id, channel) = setup_with_event_types();
    let notifier = add_notifier_object(&mut core, 300);

    let sub_id = create_subscription(&mut core, session_id, 500.0, 9, 3);
    // One item on the notifier object itself, one on the server object;
    // the event on the notifier must reach both
    let (status, _) = create_event_item(
        &mut core,
        session_id,
        sub_id,
        &notifier,
        of_type_filter(ObjectTypeId::BaseEventType.into()),
    );
    assert_eq!(status, StatusCode::Good);
    let (status, _) = create_event_item(
        &mut core,
        session_id,
        sub_id,
        &ObjectId::Server.into(),
        of_type_filter(ObjectTypeId::BaseEventType.into()),
    );
    assert_eq!(status, StatusCode::Good);

    let event = core.create_event(simple_event_type()).unwrap();
    core.write_event_property(&event, "Severity", Variant::UInt16(100))
        .unwrap();
    core.trigger_event(&event, &notifier, true).unwrap();

    queue_publish(&mut core, session_id, 1);
    core.subscription_publish_tick(session_id, sub_id);
    let events = last_published_events(&channel);
    assert_eq!(events.len(), 2);
}

#[test]
fn trigger_event_requires_origin_below_objects_folder() {
    let (mut core, _session_id, _) = setup_with_event_types();
    // A node that exists but hangs nowhere
    let orphan = add_test_variable(&mut core, 400, 1);
    core.nodestore
        .edit(&orphan, |node| {
            node.base_mut().references.clear();
        })
        .unwrap();

    let event = core.create_event(simple_event_type()).unwrap();
    assert_eq!(
        core.trigger_event(&event, &orphan, false),
        Err(StatusCode::BadInvalidArgument)
    );
    // An unknown origin is reported as not found
    assert_eq!(
        core.trigger_event(&event, &NodeId::new(5, 123u32), false),
        Err(StatusCode::BadNotFound)
    );
}

#[test]
fn event_queue_overflow_inserts_synthetic_event() {
    let (mut core, session_id, channel) = setup_with_event_types();
    let server_id: NodeId = ObjectId::Server.into();

    let sub_id = create_subscription(&mut core, session_id, 500.0, 9, 3);
    let mut filter = of_type_filter(ObjectTypeId::BaseEventType.into());
    filter.select_clauses = vec![SimpleAttributeOperand::new_value(
        ObjectTypeId::BaseEventType,
        "Severity",
    )];
    // A queue of one: the second event forces an overflow marker
    let response = services::monitored_items::create_monitored_items(
        &mut core,
        session_id,
        &CreateMonitoredItemsRequest {
            request_header: RequestHeader::new(3),
            subscription_id: sub_id,
            timestamps_to_return: TimestampsToReturn::Both,
            items_to_create: vec![MonitoredItemCreateRequest {
                item_to_monitor: ReadValueId {
                    node_id: server_id.clone(),
                    attribute_id: AttributeId::EventNotifier as u32,
                    index_range: String::new(),
                },
                monitoring_mode: MonitoringMode::Reporting,
                requested_parameters: MonitoringParameters {
                    client_handle: 33,
                    sampling_interval: 0.0,
                    filter: MonitoringFilter::Event(filter),
                    queue_size: 1,
                    discard_oldest: true,
                },
            }],
        },
    );
    assert_eq!(response.results[0].status_code, StatusCode::Good);

    for severity in [100u16, 200, 300] {
        let event = core.create_event(simple_event_type()).unwrap();
        core.write_event_property(&event, "Severity", Variant::UInt16(severity))
            .unwrap();
        core.trigger_event(&event, &server_id, true).unwrap();
    }

    queue_publish(&mut core, session_id, 1);
    core.subscription_publish_tick(session_id, sub_id);
    let events = last_published_events(&channel);
    // The overflow marker plus the surviving newest event
    assert_eq!(events.len(), 2);
    assert_eq!(
        events[0],
        vec![Variant::from(NodeId::from(
            ObjectTypeId::EventQueueOverflowEventType
        ))]
    );
    assert_eq!(events[1], vec![Variant::UInt16(300)]);
}

#[test]
fn event_filter_validation_reports_per_clause() {
    let (core, _, _) = setup();

    let filter = EventFilter {
        select_clauses: vec![
            SimpleAttributeOperand::new_value(ObjectTypeId::BaseEventType, "Severity"),
            // Null type definition
            SimpleAttributeOperand {
                type_definition_id: NodeId::null(),
                browse_path: vec!["Severity".into()],
                attribute_id: AttributeId::Value as u32,
                index_range: String::new(),
            },
            // Attribute id out of range
            SimpleAttributeOperand {
                type_definition_id: ObjectTypeId::BaseEventType.into(),
                browse_path: vec!["Severity".into()],
                attribute_id: 99,
                index_range: String::new(),
            },
            // Unresolvable path
            SimpleAttributeOperand::new_value(ObjectTypeId::BaseEventType, "NoSuchField"),
        ],
        where_clause: ContentFilter {
            elements: vec![
                // Like is unsupported
                ContentFilterElement::new(
                    FilterOperator::Like,
                    vec![
                        FilterOperand::Literal(Variant::from("a")),
                        FilterOperand::Literal(Variant::from("b")),
                    ],
                ),
                // Arity mismatch
                ContentFilterElement::new(
                    FilterOperator::Not,
                    vec![
                        FilterOperand::Literal(Variant::from(true)),
                        FilterOperand::Literal(Variant::from(false)),
                    ],
                ),
            ],
        },
    };
    let result = validate_event_filter(&core, &filter);
    assert_eq!(result.select_clause_results[0], StatusCode::Good);
    assert_eq!(
        result.select_clause_results[1],
        StatusCode::BadTypeDefinitionInvalid
    );
    assert_eq!(
        result.select_clause_results[2],
        StatusCode::BadAttributeIdInvalid
    );
    assert_eq!(
        result.select_clause_results[3],
        StatusCode::BadNodeIdUnknown
    );
    assert_eq!(
        result.where_clause_result.element_results[0].status_code,
        StatusCode::BadFilterOperatorUnsupported
    );
    assert_eq!(
        result.where_clause_result.element_results[1].status_code,
        StatusCode::BadFilterOperandCountMismatch
    );
    assert!(!result.is_valid());
}

#[test]
fn where_clause_element_references_must_point_forward() {
    let (core, _, _) = setup();
    let filter = ContentFilter {
        elements: vec![
            ContentFilterElement::new(
                FilterOperator::And,
                vec![
                    FilterOperand::Element { index: 1 },
                    // Points at itself
                    FilterOperand::Element { index: 0 },
                ],
            ),
            ContentFilterElement::new(FilterOperator::IsNull, vec![FilterOperand::Literal(Variant::Empty)]),
        ],
    };
    let result = crate::events::validate_where_clause(&core, &filter);
    assert_eq!(
        result.element_results[0].status_code,
        StatusCode::BadFilterOperandInvalid
    );
    assert_eq!(
        result.element_results[0].operand_status_codes[1],
        StatusCode::BadFilterOperandInvalid
    );
    // Out of range references are flagged as index errors
    let filter = ContentFilter {
        elements: vec![ContentFilterElement::new(
            FilterOperator::Not,
            vec![FilterOperand::Element { index: 5 }],
        )],
    };
    let result = crate::events::validate_where_clause(&core, &filter);
    assert_eq!(
        result.element_results[0].status_code,
        StatusCode::BadIndexRangeInvalid
    );
}

#[test]
fn kleene_logic_over_element_operands() {
    let (mut core, _, _) = setup_with_event_types();
    let event = core.create_event(simple_event_type()).unwrap();
    core.write_event_property(&event, "Severity", Variant::UInt16(500))
        .unwrap();

    // AND(  Severity == 500, OfType(BaseEventType) ) via element operands
    let filter = ContentFilter {
        elements: vec![
            ContentFilterElement::new(
                FilterOperator::And,
                vec![
                    FilterOperand::Element { index: 1 },
                    FilterOperand::Element { index: 2 },
                ],
            ),
            ContentFilterElement::new(
                FilterOperator::Equals,
                vec![
                    FilterOperand::SimpleAttribute(SimpleAttributeOperand::new_value(
                        ObjectTypeId::BaseEventType,
                        "Severity",
                    )),
                    FilterOperand::Literal(Variant::Int32(500)),
                ],
            ),
            ContentFilterElement::new(
                FilterOperator::OfType,
                vec![FilterOperand::Literal(Variant::from(NodeId::from(
                    ObjectTypeId::BaseEventType,
                )))],
            ),
        ],
    };
    let (status, _) = evaluate_where_clause(&core, &event, &filter);
    assert_eq!(status, StatusCode::Good);

    // Flip the comparison: False AND True is False, hence no match
    let mut no_match = filter.clone();
    no_match.elements[1].filter_operands[1] = FilterOperand::Literal(Variant::Int32(501));
    let (status, _) = evaluate_where_clause(&core, &event, &no_match);
    assert_eq!(status, StatusCode::BadNoMatch);

    // An unresolvable operand makes the comparison Null; AND(Null, True)
    // is Null, which does not match
    let mut null_match = filter.clone();
    null_match.elements[1].filter_operands[0] = FilterOperand::SimpleAttribute(
        SimpleAttributeOperand::new_value(ObjectTypeId::BaseEventType, "NoSuchField"),
    );
    let (status, _) = evaluate_where_clause(&core, &event, &null_match);
    assert_eq!(status, StatusCode::BadNoMatch);
}

#[test]
fn comparison_casts_across_numeric_widths() {
    assert_eq!(
        compare_operation(
            &Variant::Int32(500),
            &Variant::UInt16(500),
            FilterOperator::Equals
        ),
        Ternary::True
    );
    assert_eq!(
        compare_operation(
            &Variant::Double(2.0),
            &Variant::Int64(2),
            FilterOperator::Equals
        ),
        Ternary::True
    );
    assert_eq!(
        compare_operation(
            &Variant::Int64(-1),
            &Variant::UInt64(u64::MAX),
            FilterOperator::LessThan
        ),
        // The unsigned operand cannot cast into the signed target
        Ternary::False
    );
    assert_eq!(
        compare_operation(
            &Variant::from("abc"),
            &Variant::Int32(1),
            FilterOperator::Equals
        ),
        Ternary::False
    );
    assert_eq!(
        compare_operation(&Variant::Empty, &Variant::Int32(1), FilterOperator::Equals),
        Ternary::Null
    );
    assert_eq!(
        compare_operation(
            &Variant::UInt16(3),
            &Variant::UInt64(4),
            FilterOperator::LessThan
        ),
        Ternary::True
    );
}

#[test]
fn between_inlist_isnull_operators() {
    let (core, _, _) = setup();
    let eval = |elements: Vec<ContentFilterElement>| {
        let filter = ContentFilter { elements };
        evaluate_where_clause(&core, &NodeId::new(1, 1u32), &filter).0
    };

    assert_eq!(
        eval(vec![ContentFilterElement::new(
            FilterOperator::Between,
            vec![
                FilterOperand::Literal(Variant::Int32(5)),
                FilterOperand::Literal(Variant::Int32(1)),
                FilterOperand::Literal(Variant::Int32(10)),
            ],
        )]),
        StatusCode::Good
    );
    assert_eq!(
        eval(vec![ContentFilterElement::new(
            FilterOperator::Between,
            vec![
                FilterOperand::Literal(Variant::Int32(11)),
                FilterOperand::Literal(Variant::Int32(1)),
                FilterOperand::Literal(Variant::Int32(10)),
            ],
        )]),
        StatusCode::BadNoMatch
    );
    assert_eq!(
        eval(vec![ContentFilterElement::new(
            FilterOperator::InList,
            vec![
                FilterOperand::Literal(Variant::Int32(7)),
                FilterOperand::Literal(Variant::Int32(5)),
                FilterOperand::Literal(Variant::Int64(7)),
            ],
        )]),
        StatusCode::Good
    );
    assert_eq!(
        eval(vec![ContentFilterElement::new(
            FilterOperator::IsNull,
            vec![FilterOperand::Literal(Variant::Empty)],
        )]),
        StatusCode::Good
    );
    assert_eq!(
        eval(vec![ContentFilterElement::new(
            FilterOperator::IsNull,
            vec![FilterOperand::Literal(Variant::Int32(1))],
        )]),
        StatusCode::BadNoMatch
    );
}

#[test]
fn bitwise_operators_produce_integers() {
    let (core, _, _) = setup();
    // BitwiseAnd(0b1100, 0b1010) == 0b1000
    let filter = ContentFilter {
        elements: vec![
            ContentFilterElement::new(
                FilterOperator::Equals,
                vec![
                    FilterOperand::Element { index: 1 },
                    FilterOperand::Literal(Variant::Int32(0b1000)),
                ],
            ),
            ContentFilterElement::new(
                FilterOperator::BitwiseAnd,
                vec![
                    FilterOperand::Literal(Variant::Int32(0b1100)),
                    FilterOperand::Literal(Variant::Int32(0b1010)),
                ],
            ),
        ],
    };
    let (status, _) = evaluate_where_clause(&core, &NodeId::new(1, 1u32), &filter);
    assert_eq!(status, StatusCode::Good);

    // Floats never participate
    let filter = ContentFilter {
        elements: vec![ContentFilterElement::new(
            FilterOperator::BitwiseOr,
            vec![
                FilterOperand::Literal(Variant::Double(1.0)),
                FilterOperand::Literal(Variant::Int32(1)),
            ],
        )],
    };
    let (status, result) = evaluate_where_clause(&core, &NodeId::new(1, 1u32), &filter);
    assert_eq!(status, StatusCode::BadFilterOperandInvalid);
    assert_eq!(
        result.element_results[0].status_code,
        StatusCode::BadFilterOperandInvalid
    );
}

#[test]
fn evaluator_is_pure() {
    let (mut core, _, _) = setup_with_event_types();
    let event = core.create_event(simple_event_type()).unwrap();
    core.write_event_property(&event, "Severity", Variant::UInt16(500))
        .unwrap();
    let filter = of_type_filter(ObjectTypeId::BaseEventType.into());

    let first = crate::events::filter_event(&core, &event, &filter).unwrap();
    let second = crate::events::filter_event(&core, &event, &filter).unwrap();
    assert_eq!(first.0, second.0);
    assert_eq!(first.1, second.1);
}
