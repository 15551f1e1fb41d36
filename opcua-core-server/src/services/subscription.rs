//! The subscription services: CreateSubscription, ModifySubscription,
//! DeleteSubscriptions, SetPublishingMode, Publish, Republish and
//! TransferSubscriptions.

use tracing::debug;

use opcua_types::{
    CreateSubscriptionRequest, CreateSubscriptionResponse, DeleteSubscriptionsRequest,
    DeleteSubscriptionsResponse, ModifySubscriptionRequest, ModifySubscriptionResponse,
    PublishRequest, RepublishRequest, RepublishResponse, ResponseHeader, SetPublishingModeRequest,
    SetPublishingModeResponse, StatusCode, TransferResult, TransferSubscriptionsRequest,
    TransferSubscriptionsResponse,
};

use crate::config::SubscriptionLimits;
use crate::server::ServerCore;
use crate::services::check_operation_count;
use crate::session::QueuedPublishRequest;
use crate::subscriptions::subscription::{Subscription, SubscriptionState};

/// The parameters of a subscription after revision against the server
/// limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RevisedSubscriptionParameters {
    /// Publishing interval in ms.
    pub publishing_interval: f64,
    /// Lifetime count, at least three times the keepalive count.
    pub lifetime_count: u32,
    /// Keepalive count.
    pub max_keep_alive_count: u32,
    /// Notifications per publish.
    pub max_notifications_per_publish: u32,
}

/// Clamp the requested parameters into the configured bounds and enforce
/// `lifetime >= 3 * keepalive`.
pub fn revise_subscription_parameters(
    limits: &SubscriptionLimits,
    requested_publishing_interval: f64,
    requested_lifetime_count: u32,
    requested_max_keep_alive_count: u32,
    max_notifications_per_publish: u32,
) -> RevisedSubscriptionParameters {
    let publishing_interval = if requested_publishing_interval.is_nan() {
        limits.min_publishing_interval_ms
    } else {
        requested_publishing_interval
            .clamp(limits.min_publishing_interval_ms, limits.max_publishing_interval_ms)
    };
    let max_keep_alive_count = requested_max_keep_alive_count
        .clamp(limits.min_keep_alive_count, limits.max_keep_alive_count);
    let mut lifetime_count = requested_lifetime_count.min(limits.max_lifetime_count);
    // The standard requires the lifetime to cover at least three keepalive
    // periods
    if lifetime_count < max_keep_alive_count * 3 {
        lifetime_count = (max_keep_alive_count * 3).min(limits.max_lifetime_count);
    }
    let max_notifications_per_publish = if max_notifications_per_publish == 0 {
        limits.max_notifications_per_publish
    } else {
        max_notifications_per_publish.min(limits.max_notifications_per_publish)
    };
    RevisedSubscriptionParameters {
        publishing_interval,
        lifetime_count,
        max_keep_alive_count,
        max_notifications_per_publish,
    }
}

/// The CreateSubscription service.
pub fn create_subscription(
    core: &mut ServerCore,
    session_id: u32,
    request: &CreateSubscriptionRequest,
) -> CreateSubscriptionResponse {
    let max_retransmission = core.config.subscriptions.max_retransmission_queue_size;
    let max_subscriptions = core.config.subscriptions.max_subscriptions_per_session;
    // Ids come from a server wide counter so a subscription keeps its id
    // across a transfer to another session
    let subscription_id = core.next_subscription_id();
    let revised = revise_subscription_parameters(
        &core.config.subscriptions,
        request.requested_publishing_interval,
        request.requested_lifetime_count,
        request.requested_max_keep_alive_count,
        request.max_notifications_per_publish,
    );

    let Some(session) = core.session_mut(session_id) else {
        return CreateSubscriptionResponse {
            response_header: ResponseHeader::new_service_result(
                &request.request_header,
                StatusCode::BadSessionIdInvalid,
            ),
            ..Default::default()
        };
    };
    if session.subscriptions.len() >= max_subscriptions {
        return CreateSubscriptionResponse {
            response_header: ResponseHeader::new_service_result(
                &request.request_header,
                StatusCode::BadTooManySubscriptions,
            ),
            ..Default::default()
        };
    }

    let subscription = Subscription::new(
        subscription_id,
        revised.publishing_interval,
        revised.lifetime_count,
        revised.max_keep_alive_count,
        revised.max_notifications_per_publish,
        request.publishing_enabled,
        request.priority,
        max_retransmission,
    );
    session.subscriptions.insert(subscription_id, subscription);
    debug!(
        "Session {} | Subscription {} created, interval {} ms",
        session_id, subscription_id, revised.publishing_interval
    );

    CreateSubscriptionResponse {
        response_header: ResponseHeader::new_good(&request.request_header),
        subscription_id,
        revised_publishing_interval: revised.publishing_interval,
        revised_lifetime_count: revised.lifetime_count,
        revised_max_keep_alive_count: revised.max_keep_alive_count,
    }
}

/// The ModifySubscription service. Queue contents and the sequence number
/// are preserved; only the parameters change.
pub fn modify_subscription(
    core: &mut ServerCore,
    session_id: u32,
    request: &ModifySubscriptionRequest,
) -> ModifySubscriptionResponse {
    let revised = revise_subscription_parameters(
        &core.config.subscriptions,
        request.requested_publishing_interval,
        request.requested_lifetime_count,
        request.requested_max_keep_alive_count,
        request.max_notifications_per_publish,
    );
    let Some(sub) = core
        .session_mut(session_id)
        .and_then(|s| s.subscriptions.get_mut(&request.subscription_id))
    else {
        return ModifySubscriptionResponse {
            response_header: ResponseHeader::new_service_result(
                &request.request_header,
                StatusCode::BadSubscriptionIdInvalid,
            ),
            ..Default::default()
        };
    };

    sub.publishing_interval = revised.publishing_interval;
    sub.lifetime_count = revised.lifetime_count;
    sub.max_keep_alive_count = revised.max_keep_alive_count;
    sub.notifications_per_publish = revised.max_notifications_per_publish;
    sub.priority = request.priority;
    sub.reset_lifetime_counter();

    ModifySubscriptionResponse {
        response_header: ResponseHeader::new_good(&request.request_header),
        revised_publishing_interval: revised.publishing_interval,
        revised_lifetime_count: revised.lifetime_count,
        revised_max_keep_alive_count: revised.max_keep_alive_count,
    }
}

/// The DeleteSubscriptions service.
pub fn delete_subscriptions(
    core: &mut ServerCore,
    session_id: u32,
    request: &DeleteSubscriptionsRequest,
) -> DeleteSubscriptionsResponse {
    if let Err(status) = check_operation_count(
        request.subscription_ids.len(),
        core.config.operational.max_operations_per_call,
    ) {
        return DeleteSubscriptionsResponse {
            response_header: ResponseHeader::new_service_result(&request.request_header, status),
            results: Vec::new(),
        };
    }
    let results = request
        .subscription_ids
        .iter()
        .map(|id| core.delete_subscription(session_id, *id))
        .collect();
    DeleteSubscriptionsResponse {
        response_header: ResponseHeader::new_good(&request.request_header),
        results,
    }
}

/// The SetPublishingMode service. While disabled, sampling continues but
/// notifications stay queued; keepalives keep flowing.
pub fn set_publishing_mode(
    core: &mut ServerCore,
    session_id: u32,
    request: &SetPublishingModeRequest,
) -> SetPublishingModeResponse {
    if let Err(status) = check_operation_count(
        request.subscription_ids.len(),
        core.config.operational.max_operations_per_call,
    ) {
        return SetPublishingModeResponse {
            response_header: ResponseHeader::new_service_result(&request.request_header, status),
            results: Vec::new(),
        };
    }
    let Some(session) = core.session_mut(session_id) else {
        return SetPublishingModeResponse {
            response_header: ResponseHeader::new_service_result(
                &request.request_header,
                StatusCode::BadSessionIdInvalid,
            ),
            results: Vec::new(),
        };
    };
    let results = request
        .subscription_ids
        .iter()
        .map(|id| match session.subscriptions.get_mut(id) {
            Some(sub) => {
                sub.publishing_enabled = request.publishing_enabled;
                sub.reset_lifetime_counter();
                StatusCode::Good
            }
            None => StatusCode::BadSubscriptionIdInvalid,
        })
        .collect();
    SetPublishingModeResponse {
        response_header: ResponseHeader::new_good(&request.request_header),
        results,
    }
}

/// The Publish service: process acknowledgements, park the request as a
/// response slot, then give late subscriptions a chance to use it
/// immediately.
pub fn publish(
    core: &mut ServerCore,
    session_id: u32,
    request_id: u32,
    request: &PublishRequest,
) {
    let limit = core.config.subscriptions.max_publish_requests_per_session;
    let Some(session) = core.session_mut(session_id) else {
        return;
    };
    let ack_results = session.process_acknowledgements(&request.subscription_acknowledgements);
    session.enqueue_publish_request(
        QueuedPublishRequest {
            request_id,
            request_handle: request.request_header.request_handle,
            ack_results,
        },
        limit,
    );

    if session.subscriptions.is_empty() {
        session.answer_publish_requests_no_subscription();
        return;
    }

    // A late subscription has data waiting for exactly this slot
    let late: Vec<u32> = session
        .subscriptions
        .values()
        .filter(|s| s.state == SubscriptionState::Late)
        .map(|s| s.id)
        .collect();
    for subscription_id in late {
        core.subscription_publish_tick(session_id, subscription_id);
    }
}

/// The Republish service.
pub fn republish(
    core: &mut ServerCore,
    session_id: u32,
    request: &RepublishRequest,
) -> RepublishResponse {
    let Some(session) = core.session_mut(session_id) else {
        return RepublishResponse {
            response_header: ResponseHeader::new_service_result(
                &request.request_header,
                StatusCode::BadSessionIdInvalid,
            ),
            ..Default::default()
        };
    };
    let Some(sub) = session.subscriptions.get_mut(&request.subscription_id) else {
        return RepublishResponse {
            response_header: ResponseHeader::new_service_result(
                &request.request_header,
                StatusCode::BadSubscriptionIdInvalid,
            ),
            ..Default::default()
        };
    };
    sub.reset_lifetime_counter();
    match sub.republish(request.retransmit_sequence_number) {
        Ok(notification_message) => RepublishResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            notification_message,
        },
        Err(status) => RepublishResponse {
            response_header: ResponseHeader::new_service_result(&request.request_header, status),
            ..Default::default()
        },
    }
}

/// The TransferSubscriptions service: move subscriptions owned by other
/// sessions of this server into the requesting session. The old session
/// is told through a `GoodSubscriptionTransferred` status change.
pub fn transfer_subscriptions(
    core: &mut ServerCore,
    session_id: u32,
    request: &TransferSubscriptionsRequest,
) -> TransferSubscriptionsResponse {
    if let Err(status) = check_operation_count(
        request.subscription_ids.len(),
        core.config.operational.max_operations_per_call,
    ) {
        return TransferSubscriptionsResponse {
            response_header: ResponseHeader::new_service_result(&request.request_header, status),
            results: Vec::new(),
        };
    }

    let results = request
        .subscription_ids
        .iter()
        .map(|sub_id| transfer_one(core, session_id, *sub_id, request.send_initial_values))
        .collect();
    TransferSubscriptionsResponse {
        response_header: ResponseHeader::new_good(&request.request_header),
        results,
    }
}

fn transfer_one(
    core: &mut ServerCore,
    to_session: u32,
    subscription_id: u32,
    send_initial_values: bool,
) -> TransferResult {
    let Some(from_session) = core.find_subscription_session(subscription_id) else {
        return TransferResult {
            status_code: StatusCode::BadSubscriptionIdInvalid,
            available_sequence_numbers: Vec::new(),
        };
    };
    if core.session(to_session).is_none() {
        return TransferResult {
            status_code: StatusCode::BadSessionIdInvalid,
            available_sequence_numbers: Vec::new(),
        };
    }
    if from_session == to_session {
        // Already owned by the requesting session
        let sub = &core.session(to_session).unwrap().subscriptions[&subscription_id];
        return TransferResult {
            status_code: StatusCode::Good,
            available_sequence_numbers: sub.available_sequence_numbers(),
        };
    }

    let old_session = core.session_mut(from_session).unwrap();
    // Tell the old session before the subscription moves, while the
    // status change can still name it
    old_session.send_status_change(subscription_id, StatusCode::GoodSubscriptionTransferred);
    let mut sub = old_session.remove_subscription(subscription_id).unwrap();
    if old_session.subscriptions.is_empty() {
        old_session.answer_publish_requests_no_subscription();
    }

    if send_initial_values {
        sub.set_resend_data();
    }
    let available_sequence_numbers = sub.available_sequence_numbers();

    // Re-home the event listener registrations
    let items: Vec<u32> = sub
        .monitored_items
        .values()
        .filter(|i| i.item_type == crate::subscriptions::monitored_item::MonitoredItemType::EventNotify)
        .map(|i| i.id)
        .collect();
    for item_id in &items {
        let node_id = sub.monitored_item(*item_id).unwrap().monitored_node_id.clone();
        core.unregister_event_listener(
            &node_id,
            &crate::server::MonitoredItemRef {
                session_id: from_session,
                subscription_id,
                monitored_item_id: *item_id,
            },
        );
        core.register_event_listener(
            node_id,
            crate::server::MonitoredItemRef {
                session_id: to_session,
                subscription_id,
                monitored_item_id: *item_id,
            },
        );
    }

    core.session_mut(to_session)
        .unwrap()
        .subscriptions
        .insert(subscription_id, sub);
    debug!(
        "Subscription {} transferred from session {} to {}",
        subscription_id, from_session, to_session
    );

    TransferResult {
        status_code: StatusCode::Good,
        available_sequence_numbers,
    }
}
