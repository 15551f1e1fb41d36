use crate::{
    data_value::DataValue, date_time::DateTime, service_types::filters::EventFieldList,
    status_code::StatusCode,
};

/// One queued data change for one monitored item.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MonitoredItemNotification {
    /// Client supplied handle of the monitored item.
    pub client_handle: u32,
    /// The changed value.
    pub value: DataValue,
}

/// A batch of data changes inside a notification message.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataChangeNotification {
    /// The changed values, grouped by monitored item in FIFO order.
    pub monitored_items: Vec<MonitoredItemNotification>,
}

/// A batch of events inside a notification message.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventNotificationList {
    /// The delivered events.
    pub events: Vec<EventFieldList>,
}

/// A change of the subscription itself, e.g. transfer or timeout.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatusChangeNotification {
    /// The new status of the subscription.
    pub status: StatusCode,
}

/// The typed replacement for the ExtensionObject payloads of a
/// notification message.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationData {
    /// Data change notifications.
    DataChange(DataChangeNotification),
    /// Event notifications.
    Events(EventNotificationList),
    /// A subscription status change.
    StatusChange(StatusChangeNotification),
}

/// The payload of a publish response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NotificationMessage {
    /// Strictly monotonic per subscription; reserved-not-consumed for
    /// keepalives.
    pub sequence_number: u32,
    /// When the message was assembled.
    pub publish_time: DateTime,
    /// The notifications. Empty for a keepalive.
    pub notification_data: Vec<NotificationData>,
}

impl NotificationMessage {
    /// A keepalive message: the sequence number is the next one to be used,
    /// and there is no payload.
    pub fn keep_alive(sequence_number: u32, publish_time: DateTime) -> NotificationMessage {
        NotificationMessage {
            sequence_number,
            publish_time,
            notification_data: Vec::new(),
        }
    }

    /// Whether this is a keepalive.
    pub fn is_keep_alive(&self) -> bool {
        self.notification_data.is_empty()
    }
}
