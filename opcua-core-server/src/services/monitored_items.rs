//! CreateMonitoredItems, ModifyMonitoredItems, SetMonitoringMode and
//! DeleteMonitoredItems.

use tracing::debug;

use opcua_nodes::EventNotifier;
use opcua_types::{
    AttributeId, CreateMonitoredItemsRequest, CreateMonitoredItemsResponse,
    DeleteMonitoredItemsRequest, DeleteMonitoredItemsResponse, EventFilterResult,
    ModifyMonitoredItemsRequest, ModifyMonitoredItemsResponse, MonitoredItemCreateRequest,
    MonitoredItemCreateResult, MonitoredItemModifyResult, MonitoringFilter, MonitoringMode,
    NodeClass, NumericRange, ResponseHeader, SetMonitoringModeRequest, SetMonitoringModeResponse,
    StatusCode, TimestampsToReturn,
};

use crate::config::SubscriptionLimits;
use crate::events::validate_event_filter;
use crate::server::{MonitoredItemRef, ServerCore};
use crate::services::check_operation_count;
use crate::subscriptions::monitored_item::{MonitoredItem, MonitoredItemType};

/// Clamp a requested sampling interval. Zero and negative values default
/// to the subscription's publishing interval; the node may raise the
/// result through its own minimum.
pub(crate) fn revise_sampling_interval(
    limits: &SubscriptionLimits,
    requested: f64,
    publishing_interval: f64,
    node_minimum: f64,
) -> f64 {
    let mut interval = if requested <= 0.0 || requested.is_nan() {
        publishing_interval
    } else {
        requested
    };
    if interval < limits.min_sampling_interval_ms {
        interval = limits.min_sampling_interval_ms;
    }
    if node_minimum > 0.0 && interval < node_minimum {
        interval = node_minimum;
    }
    interval
}

/// Clamp a requested queue size. Zero means one.
pub(crate) fn revise_queue_size(limits: &SubscriptionLimits, requested: u32) -> usize {
    (requested.max(1) as usize).min(limits.max_queue_size)
}

enum ValidatedFilter {
    Accepted(MonitoringFilter),
    EventDiagnostics(Box<EventFilterResult>),
    Rejected(StatusCode),
}

fn validate_item_filter(
    core: &ServerCore,
    attribute_id: AttributeId,
    filter: &MonitoringFilter,
) -> ValidatedFilter {
    if attribute_id == AttributeId::EventNotifier {
        let MonitoringFilter::Event(event_filter) = filter else {
            return ValidatedFilter::Rejected(StatusCode::BadFilterNotAllowed);
        };
        let result = validate_event_filter(core, event_filter);
        if !result.is_valid() {
            return ValidatedFilter::EventDiagnostics(Box::new(result));
        }
        return ValidatedFilter::Accepted(filter.clone());
    }
    match filter {
        MonitoringFilter::None => ValidatedFilter::Accepted(MonitoringFilter::None),
        MonitoringFilter::DataChange(f) => {
            if f.deadband_type == opcua_types::DeadbandType::Percent {
                // Percent deadbands need the EURange machinery which this
                // runtime does not carry
                return ValidatedFilter::Rejected(StatusCode::BadMonitoredItemFilterUnsupported);
            }
            ValidatedFilter::Accepted(MonitoringFilter::DataChange(*f))
        }
        MonitoringFilter::Event(_) => ValidatedFilter::Rejected(StatusCode::BadFilterNotAllowed),
    }
}

fn create_one(
    core: &mut ServerCore,
    session_id: u32,
    subscription_id: u32,
    timestamps_to_return: TimestampsToReturn,
    item: &MonitoredItemCreateRequest,
) -> MonitoredItemCreateResult {
    let failed = |status: StatusCode| MonitoredItemCreateResult {
        status_code: status,
        ..Default::default()
    };

    let Ok(attribute_id) = AttributeId::from_u32(item.item_to_monitor.attribute_id) else {
        return failed(StatusCode::BadAttributeIdInvalid);
    };
    let Ok(index_range) = NumericRange::parse(&item.item_to_monitor.index_range) else {
        return failed(StatusCode::BadIndexRangeInvalid);
    };
    if !index_range.is_none() && attribute_id != AttributeId::Value {
        return failed(StatusCode::BadIndexRangeInvalid);
    }

    // The monitored node must exist
    let Some(node) = core.nodestore.get(&item.item_to_monitor.node_id) else {
        return failed(StatusCode::BadNodeIdUnknown);
    };
    let node_minimum = node
        .as_variable()
        .map(|v| v.minimum_sampling_interval)
        .unwrap_or(0.0);
    if attribute_id == AttributeId::EventNotifier {
        let subscribable = node
            .event_notifier()
            .map(|n| n.contains(EventNotifier::SUBSCRIBE_TO_EVENTS))
            .unwrap_or(false);
        if node.node_class() != NodeClass::Object || !subscribable {
            return failed(StatusCode::BadNotSupported);
        }
    }

    let filter = match validate_item_filter(core, attribute_id, &item.requested_parameters.filter)
    {
        ValidatedFilter::Accepted(filter) => filter,
        ValidatedFilter::EventDiagnostics(result) => {
            return MonitoredItemCreateResult {
                status_code: StatusCode::BadEventFilterInvalid,
                filter_result: Some(*result),
                ..Default::default()
            };
        }
        ValidatedFilter::Rejected(status) => return failed(status),
    };

    let limits = core.config.subscriptions.clone();
    let Some(session) = core.session_mut(session_id) else {
        return failed(StatusCode::BadSessionIdInvalid);
    };
    let Some(sub) = session.subscriptions.get_mut(&subscription_id) else {
        return failed(StatusCode::BadSubscriptionIdInvalid);
    };
    if sub.len() >= limits.max_monitored_items_per_subscription {
        return failed(StatusCode::BadTooManyOperations);
    }

    let revised_sampling_interval = if attribute_id == AttributeId::EventNotifier {
        // Event items are notified, not polled
        0.0
    } else {
        revise_sampling_interval(
            &limits,
            item.requested_parameters.sampling_interval,
            sub.publishing_interval,
            node_minimum,
        )
    };
    let revised_queue_size = revise_queue_size(&limits, item.requested_parameters.queue_size);

    let monitored_item_id = sub.next_monitored_item_id();
    let monitored_item = MonitoredItem::new(
        monitored_item_id,
        item.item_to_monitor.node_id.clone(),
        attribute_id,
        index_range,
        timestamps_to_return,
        item.monitoring_mode,
        item.requested_parameters.client_handle,
        revised_sampling_interval,
        revised_queue_size,
        item.requested_parameters.discard_oldest,
        filter,
    );
    let item_type = monitored_item.item_type;
    sub.insert_monitored_item(monitored_item);
    debug!(
        "Session {} | Subscription {} | MonitoredItem {} created",
        session_id, subscription_id, monitored_item_id
    );

    match item_type {
        MonitoredItemType::EventNotify => {
            core.register_event_listener(
                item.item_to_monitor.node_id.clone(),
                MonitoredItemRef {
                    session_id,
                    subscription_id,
                    monitored_item_id,
                },
            );
        }
        MonitoredItemType::DataChange => {
            // Sample immediately so the current value reaches the first
            // publish instead of waiting out a sampling interval
            if item.monitoring_mode != MonitoringMode::Disabled {
                core.monitored_item_sample_tick(session_id, subscription_id, monitored_item_id);
            }
        }
        MonitoredItemType::StatusNotify => {}
    }

    MonitoredItemCreateResult {
        status_code: StatusCode::Good,
        monitored_item_id,
        revised_sampling_interval,
        revised_queue_size: revised_queue_size as u32,
        filter_result: None,
    }
}

/// The CreateMonitoredItems service.
pub fn create_monitored_items(
    core: &mut ServerCore,
    session_id: u32,
    request: &CreateMonitoredItemsRequest,
) -> CreateMonitoredItemsResponse {
    if let Err(status) = check_operation_count(
        request.items_to_create.len(),
        core.config.operational.max_operations_per_call,
    ) {
        return CreateMonitoredItemsResponse {
            response_header: ResponseHeader::new_service_result(&request.request_header, status),
            results: Vec::new(),
        };
    }
    let sub_exists = core
        .session(session_id)
        .map(|s| s.subscriptions.contains_key(&request.subscription_id))
        .unwrap_or(false);
    if !sub_exists {
        return CreateMonitoredItemsResponse {
            response_header: ResponseHeader::new_service_result(
                &request.request_header,
                StatusCode::BadSubscriptionIdInvalid,
            ),
            results: Vec::new(),
        };
    }

    let results = request
        .items_to_create
        .iter()
        .map(|item| {
            create_one(
                core,
                session_id,
                request.subscription_id,
                request.timestamps_to_return,
                item,
            )
        })
        .collect();
    CreateMonitoredItemsResponse {
        response_header: ResponseHeader::new_good(&request.request_header),
        results,
    }
}

/// The ModifyMonitoredItems service.
pub fn modify_monitored_items(
    core: &mut ServerCore,
    session_id: u32,
    request: &ModifyMonitoredItemsRequest,
) -> ModifyMonitoredItemsResponse {
    if let Err(status) = check_operation_count(
        request.items_to_modify.len(),
        core.config.operational.max_operations_per_call,
    ) {
        return ModifyMonitoredItemsResponse {
            response_header: ResponseHeader::new_service_result(&request.request_header, status),
            results: Vec::new(),
        };
    }
    let sub_exists = core
        .session(session_id)
        .map(|s| s.subscriptions.contains_key(&request.subscription_id))
        .unwrap_or(false);
    if !sub_exists {
        return ModifyMonitoredItemsResponse {
            response_header: ResponseHeader::new_service_result(
                &request.request_header,
                StatusCode::BadSubscriptionIdInvalid,
            ),
            results: Vec::new(),
        };
    }

    let limits = core.config.subscriptions.clone();
    let results = request
        .items_to_modify
        .iter()
        .map(|item| {
            let failed = |status: StatusCode| MonitoredItemModifyResult {
                status_code: status,
                ..Default::default()
            };

            let Some((attribute_id, node_id)) = core
                .session(session_id)
                .and_then(|s| s.subscriptions.get(&request.subscription_id))
                .and_then(|sub| sub.monitored_item(item.monitored_item_id))
                .map(|mi| (mi.attribute_id, mi.monitored_node_id.clone()))
            else {
                return failed(StatusCode::BadMonitoredItemIdInvalid);
            };

            let filter =
                match validate_item_filter(core, attribute_id, &item.requested_parameters.filter) {
                    ValidatedFilter::Accepted(filter) => filter,
                    ValidatedFilter::EventDiagnostics(result) => {
                        return MonitoredItemModifyResult {
                            status_code: StatusCode::BadEventFilterInvalid,
                            filter_result: Some(*result),
                            ..Default::default()
                        };
                    }
                    ValidatedFilter::Rejected(status) => return failed(status),
                };

            let node_minimum = core
                .nodestore
                .get(&node_id)
                .and_then(|n| n.as_variable().map(|v| v.minimum_sampling_interval))
                .unwrap_or(0.0);

            let sub = core
                .session_mut(session_id)
                .unwrap()
                .subscriptions
                .get_mut(&request.subscription_id)
                .unwrap();
            let publishing_interval = sub.publishing_interval;
            let revised_sampling_interval = if attribute_id == AttributeId::EventNotifier {
                0.0
            } else {
                revise_sampling_interval(
                    &limits,
                    item.requested_parameters.sampling_interval,
                    publishing_interval,
                    node_minimum,
                )
            };
            let revised_queue_size =
                revise_queue_size(&limits, item.requested_parameters.queue_size);

            let mi = sub.monitored_item_mut(item.monitored_item_id).unwrap();
            mi.sampling_interval = revised_sampling_interval;
            mi.max_queue_size = revised_queue_size;
            mi.discard_oldest = item.requested_parameters.discard_oldest;
            mi.client_handle = item.requested_parameters.client_handle;
            mi.filter = filter;
            sub.enforce_monitored_item_bound(item.monitored_item_id);

            MonitoredItemModifyResult {
                status_code: StatusCode::Good,
                revised_sampling_interval,
                revised_queue_size: revised_queue_size as u32,
                filter_result: None,
            }
        })
        .collect();

    ModifyMonitoredItemsResponse {
        response_header: ResponseHeader::new_good(&request.request_header),
        results,
    }
}

/// The SetMonitoringMode service. Disabled drops the queue, Sampling
/// samples without enqueueing, Reporting samples and enqueues.
pub fn set_monitoring_mode(
    core: &mut ServerCore,
    session_id: u32,
    request: &SetMonitoringModeRequest,
) -> SetMonitoringModeResponse {
    if let Err(status) = check_operation_count(
        request.monitored_item_ids.len(),
        core.config.operational.max_operations_per_call,
    ) {
        return SetMonitoringModeResponse {
            response_header: ResponseHeader::new_service_result(&request.request_header, status),
            results: Vec::new(),
        };
    }
    let Some(sub) = core
        .session_mut(session_id)
        .and_then(|s| s.subscriptions.get_mut(&request.subscription_id))
    else {
        return SetMonitoringModeResponse {
            response_header: ResponseHeader::new_service_result(
                &request.request_header,
                StatusCode::BadSubscriptionIdInvalid,
            ),
            results: Vec::new(),
        };
    };

    let results = request
        .monitored_item_ids
        .iter()
        .map(|id| {
            let Some(mi) = sub.monitored_item_mut(*id) else {
                return StatusCode::BadMonitoredItemIdInvalid;
            };
            mi.monitoring_mode = request.monitoring_mode;
            if request.monitoring_mode == MonitoringMode::Disabled {
                mi.registered = false;
                sub.clear_monitored_item_queue(*id);
            }
            StatusCode::Good
        })
        .collect();

    SetMonitoringModeResponse {
        response_header: ResponseHeader::new_good(&request.request_header),
        results,
    }
}

/// The DeleteMonitoredItems service.
pub fn delete_monitored_items(
    core: &mut ServerCore,
    session_id: u32,
    request: &DeleteMonitoredItemsRequest,
) -> DeleteMonitoredItemsResponse {
    if let Err(status) = check_operation_count(
        request.monitored_item_ids.len(),
        core.config.operational.max_operations_per_call,
    ) {
        return DeleteMonitoredItemsResponse {
            response_header: ResponseHeader::new_service_result(&request.request_header, status),
            results: Vec::new(),
        };
    }
    let sub_exists = core
        .session(session_id)
        .map(|s| s.subscriptions.contains_key(&request.subscription_id))
        .unwrap_or(false);
    if !sub_exists {
        return DeleteMonitoredItemsResponse {
            response_header: ResponseHeader::new_service_result(
                &request.request_header,
                StatusCode::BadSubscriptionIdInvalid,
            ),
            results: Vec::new(),
        };
    }

    let results = request
        .monitored_item_ids
        .iter()
        .map(|id| {
            let removed = core
                .session_mut(session_id)
                .unwrap()
                .subscriptions
                .get_mut(&request.subscription_id)
                .unwrap()
                .remove_monitored_item(*id);
            match removed {
                Some(item) => {
                    if item.item_type == MonitoredItemType::EventNotify {
                        core.unregister_event_listener(
                            &item.monitored_node_id,
                            &MonitoredItemRef {
                                session_id,
                                subscription_id: request.subscription_id,
                                monitored_item_id: *id,
                            },
                        );
                    }
                    StatusCode::Good
                }
                None => StatusCode::BadMonitoredItemIdInvalid,
            }
        })
        .collect();

    DeleteMonitoredItemsResponse {
        response_header: ResponseHeader::new_good(&request.request_header),
        results,
    }
}
