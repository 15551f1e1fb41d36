use crate::{
    service_types::attribute_svc::ReadValueId,
    service_types::filters::{EventFilterResult, MonitoringFilter},
    service_types::header::{RequestHeader, ResponseHeader},
    service_types::{MonitoringMode, TimestampsToReturn},
    status_code::StatusCode,
};

/// The client-requested parameters of a monitored item.
#[derive(Debug, Clone, Default)]
pub struct MonitoringParameters {
    /// Opaque handle the client uses to correlate notifications.
    pub client_handle: u32,
    /// Requested sampling interval in ms. 0 defaults to the publishing
    /// interval, negative values likewise.
    pub sampling_interval: f64,
    /// The filter deciding what becomes a notification.
    pub filter: MonitoringFilter,
    /// Requested queue depth, revised by the server.
    pub queue_size: u32,
    /// Whether the oldest or the second-newest value is dropped on
    /// overflow.
    pub discard_oldest: bool,
}

/// One item of a CreateMonitoredItems request.
#[derive(Debug, Clone, Default)]
pub struct MonitoredItemCreateRequest {
    /// What to monitor.
    pub item_to_monitor: ReadValueId,
    /// The initial monitoring mode.
    pub monitoring_mode: MonitoringMode,
    /// The requested parameters.
    pub requested_parameters: MonitoringParameters,
}

/// The per-item result of a create.
#[derive(Debug, Clone, Default)]
pub struct MonitoredItemCreateResult {
    /// The outcome.
    pub status_code: StatusCode,
    /// Server assigned id, unique within the subscription.
    pub monitored_item_id: u32,
    /// The sampling interval actually used.
    pub revised_sampling_interval: f64,
    /// The queue size actually used.
    pub revised_queue_size: u32,
    /// Diagnostics for an attached event filter.
    pub filter_result: Option<EventFilterResult>,
}

/// CreateMonitoredItems service request.
#[derive(Debug, Clone, Default)]
pub struct CreateMonitoredItemsRequest {
    #[allow(missing_docs)]
    pub request_header: RequestHeader,
    /// The owning subscription.
    pub subscription_id: u32,
    /// Which timestamps sampled values carry.
    pub timestamps_to_return: TimestampsToReturn,
    /// The items to create.
    pub items_to_create: Vec<MonitoredItemCreateRequest>,
}

/// CreateMonitoredItems service response.
#[derive(Debug, Clone, Default)]
pub struct CreateMonitoredItemsResponse {
    #[allow(missing_docs)]
    pub response_header: ResponseHeader,
    /// One result per item, in request order.
    pub results: Vec<MonitoredItemCreateResult>,
}

/// One item of a ModifyMonitoredItems request.
#[derive(Debug, Clone, Default)]
pub struct MonitoredItemModifyRequest {
    /// The item to modify.
    pub monitored_item_id: u32,
    /// The new parameters.
    pub requested_parameters: MonitoringParameters,
}

/// The per-item result of a modify.
#[derive(Debug, Clone, Default)]
pub struct MonitoredItemModifyResult {
    /// The outcome.
    pub status_code: StatusCode,
    /// The sampling interval actually used.
    pub revised_sampling_interval: f64,
    /// The queue size actually used.
    pub revised_queue_size: u32,
    /// Diagnostics for an attached event filter.
    pub filter_result: Option<EventFilterResult>,
}

/// ModifyMonitoredItems service request.
#[derive(Debug, Clone, Default)]
pub struct ModifyMonitoredItemsRequest {
    #[allow(missing_docs)]
    pub request_header: RequestHeader,
    /// The owning subscription.
    pub subscription_id: u32,
    /// Which timestamps sampled values carry.
    pub timestamps_to_return: TimestampsToReturn,
    /// The items to modify.
    pub items_to_modify: Vec<MonitoredItemModifyRequest>,
}

/// ModifyMonitoredItems service response.
#[derive(Debug, Clone, Default)]
pub struct ModifyMonitoredItemsResponse {
    #[allow(missing_docs)]
    pub response_header: ResponseHeader,
    /// One result per item, in request order.
    pub results: Vec<MonitoredItemModifyResult>,
}

/// SetMonitoringMode service request.
#[derive(Debug, Clone, Default)]
pub struct SetMonitoringModeRequest {
    #[allow(missing_docs)]
    pub request_header: RequestHeader,
    /// The owning subscription.
    pub subscription_id: u32,
    /// The new mode for all listed items.
    pub monitoring_mode: MonitoringMode,
    /// The items to transition.
    pub monitored_item_ids: Vec<u32>,
}

/// SetMonitoringMode service response.
#[derive(Debug, Clone, Default)]
pub struct SetMonitoringModeResponse {
    #[allow(missing_docs)]
    pub response_header: ResponseHeader,
    /// One status per item, in request order.
    pub results: Vec<StatusCode>,
}

/// DeleteMonitoredItems service request.
#[derive(Debug, Clone, Default)]
pub struct DeleteMonitoredItemsRequest {
    #[allow(missing_docs)]
    pub request_header: RequestHeader,
    /// The owning subscription.
    pub subscription_id: u32,
    /// The items to delete.
    pub monitored_item_ids: Vec<u32>,
}

/// DeleteMonitoredItems service response.
#[derive(Debug, Clone, Default)]
pub struct DeleteMonitoredItemsResponse {
    #[allow(missing_docs)]
    pub response_header: ResponseHeader,
    /// One status per item, in request order.
    pub results: Vec<StatusCode>,
}
