use crate::{
    service_types::header::{RequestHeader, ResponseHeader},
    service_types::notifications::NotificationMessage,
    status_code::StatusCode,
};

/// CreateSubscription service request.
#[derive(Debug, Clone, Default)]
pub struct CreateSubscriptionRequest {
    #[allow(missing_docs)]
    pub request_header: RequestHeader,
    /// Requested publishing interval in ms, revised by the server.
    pub requested_publishing_interval: f64,
    /// Requested lifetime in publishing intervals, revised.
    pub requested_lifetime_count: u32,
    /// Requested keepalive cadence in publishing intervals, revised.
    pub requested_max_keep_alive_count: u32,
    /// Cap on notifications per publish response. 0 means unlimited.
    pub max_notifications_per_publish: u32,
    /// Whether publishing starts enabled.
    pub publishing_enabled: bool,
    /// Relative priority against other subscriptions of the session.
    pub priority: u8,
}

/// CreateSubscription service response.
#[derive(Debug, Clone, Default)]
pub struct CreateSubscriptionResponse {
    #[allow(missing_docs)]
    pub response_header: ResponseHeader,
    /// The id of the new subscription, unique within the session.
    pub subscription_id: u32,
    /// The interval actually used.
    pub revised_publishing_interval: f64,
    /// The lifetime count actually used.
    pub revised_lifetime_count: u32,
    /// The keepalive count actually used.
    pub revised_max_keep_alive_count: u32,
}

/// ModifySubscription service request.
#[derive(Debug, Clone, Default)]
pub struct ModifySubscriptionRequest {
    #[allow(missing_docs)]
    pub request_header: RequestHeader,
    /// The subscription to modify.
    pub subscription_id: u32,
    #[allow(missing_docs)]
    pub requested_publishing_interval: f64,
    #[allow(missing_docs)]
    pub requested_lifetime_count: u32,
    #[allow(missing_docs)]
    pub requested_max_keep_alive_count: u32,
    #[allow(missing_docs)]
    pub max_notifications_per_publish: u32,
    #[allow(missing_docs)]
    pub priority: u8,
}

/// ModifySubscription service response.
#[derive(Debug, Clone, Default)]
pub struct ModifySubscriptionResponse {
    #[allow(missing_docs)]
    pub response_header: ResponseHeader,
    #[allow(missing_docs)]
    pub revised_publishing_interval: f64,
    #[allow(missing_docs)]
    pub revised_lifetime_count: u32,
    #[allow(missing_docs)]
    pub revised_max_keep_alive_count: u32,
}

/// DeleteSubscriptions service request.
#[derive(Debug, Clone, Default)]
pub struct DeleteSubscriptionsRequest {
    #[allow(missing_docs)]
    pub request_header: RequestHeader,
    /// The subscriptions to delete.
    pub subscription_ids: Vec<u32>,
}

/// DeleteSubscriptions service response.
#[derive(Debug, Clone, Default)]
pub struct DeleteSubscriptionsResponse {
    #[allow(missing_docs)]
    pub response_header: ResponseHeader,
    /// One status per requested id.
    pub results: Vec<StatusCode>,
}

/// SetPublishingMode service request.
#[derive(Debug, Clone, Default)]
pub struct SetPublishingModeRequest {
    #[allow(missing_docs)]
    pub request_header: RequestHeader,
    /// The new publishing enabled flag.
    pub publishing_enabled: bool,
    /// The subscriptions to toggle.
    pub subscription_ids: Vec<u32>,
}

/// SetPublishingMode service response.
#[derive(Debug, Clone, Default)]
pub struct SetPublishingModeResponse {
    #[allow(missing_docs)]
    pub response_header: ResponseHeader,
    /// One status per requested id.
    pub results: Vec<StatusCode>,
}

/// Acknowledgement of a received notification message.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionAcknowledgement {
    /// The acknowledged subscription.
    pub subscription_id: u32,
    /// The acknowledged sequence number.
    pub sequence_number: u32,
}

/// Publish service request: the client-provided response slot.
#[derive(Debug, Clone, Default)]
pub struct PublishRequest {
    #[allow(missing_docs)]
    pub request_header: RequestHeader,
    /// Sequence numbers the client has received.
    pub subscription_acknowledgements: Vec<SubscriptionAcknowledgement>,
}

/// Publish service response.
#[derive(Debug, Clone, Default)]
pub struct PublishResponse {
    #[allow(missing_docs)]
    pub response_header: ResponseHeader,
    /// The subscription this response serves.
    pub subscription_id: u32,
    /// Sequence numbers still held for republish.
    pub available_sequence_numbers: Vec<u32>,
    /// Whether more notifications are queued beyond this message.
    pub more_notifications: bool,
    /// The payload.
    pub notification_message: NotificationMessage,
    /// One status per acknowledgement in the request.
    pub results: Vec<StatusCode>,
}

/// Republish service request.
#[derive(Debug, Clone, Default)]
pub struct RepublishRequest {
    #[allow(missing_docs)]
    pub request_header: RequestHeader,
    /// The subscription to fetch from.
    pub subscription_id: u32,
    /// The sequence number to retransmit.
    pub retransmit_sequence_number: u32,
}

/// Republish service response.
#[derive(Debug, Clone, Default)]
pub struct RepublishResponse {
    #[allow(missing_docs)]
    pub response_header: ResponseHeader,
    /// The retransmitted message.
    pub notification_message: NotificationMessage,
}

/// TransferSubscriptions service request.
#[derive(Debug, Clone, Default)]
pub struct TransferSubscriptionsRequest {
    #[allow(missing_docs)]
    pub request_header: RequestHeader,
    /// The subscriptions to move to the requesting session.
    pub subscription_ids: Vec<u32>,
    /// Whether every monitored item resends its current value after the
    /// transfer.
    pub send_initial_values: bool,
}

/// The per-subscription result of a transfer.
#[derive(Debug, Clone, Default)]
pub struct TransferResult {
    /// The outcome for this subscription.
    pub status_code: StatusCode,
    /// Sequence numbers available for republish after the transfer.
    pub available_sequence_numbers: Vec<u32>,
}

/// TransferSubscriptions service response.
#[derive(Debug, Clone, Default)]
pub struct TransferSubscriptionsResponse {
    #[allow(missing_docs)]
    pub response_header: ResponseHeader,
    /// One result per requested id.
    pub results: Vec<TransferResult>,
}
