//! Server side subscriptions: notification queues, the retransmission
//! queue and the publish/keepalive bookkeeping.

use std::collections::{BTreeMap, VecDeque};

use tracing::debug;

use opcua_types::{
    DataChangeNotification, DataValue, DateTime, EventFieldList, EventNotificationList,
    MonitoredItemNotification, NotificationData, NotificationMessage, StatusChangeNotification,
    StatusCode,
};

use crate::subscriptions::monitored_item::{
    GlobalQueueEntry, MonitoredItem, NotificationPayload,
};

/// The state of the publish machinery. The server only needs the subset of
/// the standard's states that outlive a service call.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Publishing normally.
    Normal,
    /// A publishing interval elapsed without a publish request available.
    Late,
    /// Keepalive cadence, nothing to send.
    KeepAlive,
}

/// A published, not yet acknowledged notification message.
#[derive(Debug, Clone)]
pub struct NotificationMessageEntry {
    /// The message's sequence number.
    pub sequence_number: u32,
    /// The retained message.
    pub message: NotificationMessage,
}

/// What a publish tick decided to do.
#[derive(Debug)]
pub enum PublishAction {
    /// Nothing to send this tick.
    None,
    /// A response is ready; `more_notifications` says whether another tick
    /// should run immediately.
    Send {
        /// The assembled message.
        message: NotificationMessage,
        /// Sequence numbers in the retransmission queue, oldest first.
        available_sequence_numbers: Vec<u32>,
        /// More notifications remain queued.
        more_notifications: bool,
    },
    /// The subscription exceeded its lifetime and must be deleted.
    Expired,
}

/// A server side subscription.
#[derive(Debug)]
pub struct Subscription {
    /// Id, unique within the owning session.
    pub id: u32,
    /// Revised publishing interval in ms.
    pub publishing_interval: f64,
    /// Revised lifetime count.
    pub lifetime_count: u32,
    /// Revised keepalive count.
    pub max_keep_alive_count: u32,
    /// Cap on notifications per publish response.
    pub notifications_per_publish: u32,
    /// Whether publishing is enabled.
    pub publishing_enabled: bool,
    /// Relative priority of the subscription.
    pub priority: u8,
    /// The current state.
    pub state: SubscriptionState,
    /// Counts publishing intervals with nothing to send.
    pub current_keep_alive_count: u32,
    /// Counts publishing intervals without a usable publish request.
    pub current_lifetime_count: u32,
    /// The last used sequence number. The first message carries 1.
    sequence_number: u32,
    /// Where the next publish drain starts, to avoid starvation.
    last_send_monitored_item_id: u32,
    /// The monitored items, keyed by id.
    pub monitored_items: BTreeMap<u32, MonitoredItem>,
    next_monitored_item_id: u32,
    /// Cross-item notification arrival order.
    global_queue: VecDeque<GlobalQueueEntry>,
    /// Allocator for cross-item arrival sequences.
    notification_seq: u64,
    /// Published messages retained for republish, oldest first.
    retransmission_queue: VecDeque<NotificationMessageEntry>,
    /// Bound for the retransmission queue, from server config.
    max_retransmission_queue_size: usize,
}

impl Subscription {
    /// A new subscription with already revised parameters. The keepalive
    /// counter starts at the maximum so the first tick sends immediately.
    pub fn new(
        id: u32,
        publishing_interval: f64,
        lifetime_count: u32,
        max_keep_alive_count: u32,
        notifications_per_publish: u32,
        publishing_enabled: bool,
        priority: u8,
        max_retransmission_queue_size: usize,
    ) -> Subscription {
        Subscription {
            id,
            publishing_interval,
            lifetime_count,
            max_keep_alive_count,
            notifications_per_publish,
            publishing_enabled,
            priority,
            state: SubscriptionState::Normal,
            current_keep_alive_count: max_keep_alive_count,
            current_lifetime_count: 0,
            sequence_number: 0,
            last_send_monitored_item_id: 0,
            monitored_items: BTreeMap::new(),
            next_monitored_item_id: 1,
            global_queue: VecDeque::new(),
            notification_seq: 1,
            retransmission_queue: VecDeque::new(),
            max_retransmission_queue_size,
        }
    }

    /// The number of monitored items.
    pub fn len(&self) -> usize {
        self.monitored_items.len()
    }

    /// Whether the subscription has no monitored items.
    pub fn is_empty(&self) -> bool {
        self.monitored_items.is_empty()
    }

    /// The next monitored item id.
    pub fn next_monitored_item_id(&mut self) -> u32 {
        let id = self.next_monitored_item_id;
        self.next_monitored_item_id += 1;
        id
    }

    /// Register a monitored item.
    pub fn insert_monitored_item(&mut self, item: MonitoredItem) {
        self.monitored_items.insert(item.id, item);
    }

    /// Fetch a monitored item.
    pub fn monitored_item(&self, id: u32) -> Option<&MonitoredItem> {
        self.monitored_items.get(&id)
    }

    /// Fetch a monitored item mutably.
    pub fn monitored_item_mut(&mut self, id: u32) -> Option<&mut MonitoredItem> {
        self.monitored_items.get_mut(&id)
    }

    /// Remove a monitored item, dropping its queued notifications.
    pub fn remove_monitored_item(&mut self, id: u32) -> Option<MonitoredItem> {
        let mut item = self.monitored_items.remove(&id)?;
        item.clear_queue(&mut self.global_queue);
        Some(item)
    }

    /// The last used sequence number.
    pub fn sequence_number(&self) -> u32 {
        self.sequence_number
    }

    /// The sequence number a keepalive announces: the next to be used,
    /// without consuming it. 0 is reserved, so the wrap lands on 1.
    fn next_sequence_number(&self) -> u32 {
        if self.sequence_number == u32::MAX {
            1
        } else {
            self.sequence_number + 1
        }
    }

    /// Reset the keepalive counter after a sent message.
    pub fn reset_keep_alive_counter(&mut self) {
        self.current_keep_alive_count = 0;
    }

    /// Reset the lifetime counter on client activity.
    pub fn reset_lifetime_counter(&mut self) {
        self.current_lifetime_count = 0;
    }

    /// Enqueue a sampled data change for a monitored item.
    pub fn enqueue_data_change(&mut self, monitored_item_id: u32, value: DataValue) {
        let Some(item) = self.monitored_items.get_mut(&monitored_item_id) else {
            return;
        };
        item.enqueue(
            NotificationPayload::DataChange(value),
            false,
            &mut self.notification_seq,
            &mut self.global_queue,
        );
    }

    /// Enqueue an event for a monitored item.
    pub fn enqueue_event(&mut self, monitored_item_id: u32, fields: Vec<opcua_types::Variant>) {
        let Some(item) = self.monitored_items.get_mut(&monitored_item_id) else {
            return;
        };
        item.enqueue(
            NotificationPayload::Event(fields),
            false,
            &mut self.notification_seq,
            &mut self.global_queue,
        );
    }

    /// Drop every notification queued for a monitored item.
    pub fn clear_monitored_item_queue(&mut self, monitored_item_id: u32) {
        if let Some(item) = self.monitored_items.get_mut(&monitored_item_id) {
            item.clear_queue(&mut self.global_queue);
        }
    }

    /// Re-apply the queue bound of an item after its size was revised
    /// down by a modify.
    pub fn enforce_monitored_item_bound(&mut self, monitored_item_id: u32) {
        if let Some(item) = self.monitored_items.get_mut(&monitored_item_id) {
            item.ensure_queue_space(&mut self.notification_seq, &mut self.global_queue);
        }
    }

    /// Count the notifications a publish response could carry right now.
    /// While publishing is disabled nothing is movable, so the count is 0
    /// and keepalive cadence takes over.
    pub fn count_queued_notifications(&self) -> (usize, bool) {
        if !self.publishing_enabled {
            return (0, false);
        }
        let queued = self.global_queue.len();
        let budget = self.publish_budget();
        if queued > budget {
            (budget, true)
        } else {
            (queued, false)
        }
    }

    fn publish_budget(&self) -> usize {
        if self.notifications_per_publish == 0 {
            usize::MAX
        } else {
            self.notifications_per_publish as usize
        }
    }

    /// One publishing-interval tick. The caller provides whether the
    /// session has a publish request available and sends the returned
    /// message; the keepalive/lifetime counters advance here.
    pub fn publish_tick(&mut self, publish_request_available: bool, now: DateTime) -> PublishAction {
        let (notifications, more_notifications) = self.count_queued_notifications();

        if notifications == 0 {
            self.current_keep_alive_count += 1;
            if self.current_keep_alive_count < self.max_keep_alive_count {
                return PublishAction::None;
            }
            debug!("Subscription {} | Sending a KeepAlive", self.id);
        }

        if !publish_request_available {
            if self.state != SubscriptionState::Late {
                self.state = SubscriptionState::Late;
            } else {
                self.current_lifetime_count += 1;
                if self.current_lifetime_count > self.lifetime_count {
                    debug!("Subscription {} | End of lifetime", self.id);
                    return PublishAction::Expired;
                }
            }
            return PublishAction::None;
        }

        let message = if notifications == 0 {
            // A keepalive reserves the next sequence number without
            // consuming it
            NotificationMessage::keep_alive(self.next_sequence_number(), now)
        } else {
            let notification_data = self.move_notifications(notifications);
            self.sequence_number = self.next_sequence_number();
            let message = NotificationMessage {
                sequence_number: self.sequence_number,
                publish_time: now,
                notification_data,
            };
            // Retained for acknowledgement. Needs to happen before the
            // available sequence numbers are collected so this message is
            // itself announced.
            self.add_retransmission_message(NotificationMessageEntry {
                sequence_number: self.sequence_number,
                message: message.clone(),
            });
            message
        };

        let available_sequence_numbers = self
            .retransmission_queue
            .iter()
            .map(|e| e.sequence_number)
            .collect();

        self.state = SubscriptionState::Normal;
        self.current_keep_alive_count = 0;
        self.current_lifetime_count = 0;

        PublishAction::Send {
            message,
            available_sequence_numbers,
            more_notifications,
        }
    }

    /// Move up to `count` notifications out of the item queues, grouped by
    /// monitored item with per-item FIFO order preserved. The drain
    /// round-robins across items starting after the item that was drained
    /// last, so one busy item cannot starve the others.
    fn move_notifications(&mut self, count: usize) -> Vec<NotificationData> {
        let mut remaining = count;
        let mut data_changes: Vec<MonitoredItemNotification> = Vec::new();
        let mut events: Vec<EventFieldList> = Vec::new();
        let mut status_changes: Vec<StatusCode> = Vec::new();

        let ids: Vec<u32> = self.monitored_items.keys().copied().collect();
        let start = ids
            .iter()
            .position(|id| *id > self.last_send_monitored_item_id)
            .unwrap_or(0);

        for offset in 0..ids.len() {
            if remaining == 0 {
                break;
            }
            let id = ids[(start + offset) % ids.len()];
            let item = self.monitored_items.get_mut(&id).unwrap();
            let client_handle = item.client_handle;
            let mut drained = false;
            while remaining > 0 {
                let Some(notification) = item.pop_front(&mut self.global_queue) else {
                    break;
                };
                drained = true;
                remaining -= 1;
                match notification.payload {
                    NotificationPayload::DataChange(value) => {
                        data_changes.push(MonitoredItemNotification {
                            client_handle,
                            value,
                        });
                    }
                    NotificationPayload::Event(event_fields) => {
                        events.push(EventFieldList {
                            client_handle,
                            event_fields,
                        });
                    }
                    NotificationPayload::Status(status) => status_changes.push(status),
                }
            }
            if drained {
                self.last_send_monitored_item_id = id;
            }
        }

        let mut out = Vec::new();
        if !data_changes.is_empty() {
            out.push(NotificationData::DataChange(DataChangeNotification {
                monitored_items: data_changes,
            }));
        }
        if !events.is_empty() {
            out.push(NotificationData::Events(EventNotificationList { events }));
        }
        for status in status_changes {
            out.push(NotificationData::StatusChange(StatusChangeNotification {
                status,
            }));
        }
        out
    }

    fn add_retransmission_message(&mut self, entry: NotificationMessageEntry) {
        if self.max_retransmission_queue_size > 0
            && self.retransmission_queue.len() >= self.max_retransmission_queue_size
        {
            // Release the oldest entry when there is not enough space
            self.retransmission_queue.pop_front();
        }
        self.retransmission_queue.push_back(entry);
    }

    /// Drop a retransmission entry on acknowledgement.
    pub fn remove_retransmission_message(&mut self, sequence_number: u32) -> StatusCode {
        let before = self.retransmission_queue.len();
        self.retransmission_queue
            .retain(|e| e.sequence_number != sequence_number);
        if self.retransmission_queue.len() == before {
            StatusCode::BadSequenceNumberUnknown
        } else {
            StatusCode::Good
        }
    }

    /// Fetch a retained message for republish.
    pub fn republish(&self, sequence_number: u32) -> Result<NotificationMessage, StatusCode> {
        self.retransmission_queue
            .iter()
            .find(|e| e.sequence_number == sequence_number)
            .map(|e| e.message.clone())
            .ok_or(StatusCode::BadMessageNotAvailable)
    }

    /// The sequence numbers currently retained, oldest first.
    pub fn available_sequence_numbers(&self) -> Vec<u32> {
        self.retransmission_queue
            .iter()
            .map(|e| e.sequence_number)
            .collect()
    }

    /// Forget all comparison state so every data change item reports its
    /// current value on the next sample.
    pub fn set_resend_data(&mut self) {
        for item in self.monitored_items.values_mut() {
            item.force_resend();
        }
    }
}
