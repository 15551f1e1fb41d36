//! Server side monitored items: sampling, change detection and the queue
//! overflow policy.

use std::collections::VecDeque;

use tracing::debug;

use opcua_types::{
    encoding::encode_data_value, AttributeId, DataChangeTrigger, DataValue, DeadbandType,
    MonitoringFilter, MonitoringMode, NodeId, NumericRange, ObjectTypeId, StatusCode,
    SubStatusBits, TimestampsToReturn, Variant,
};

/// What kind of notifications the item produces.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MonitoredItemType {
    /// Sampled data changes of an attribute.
    DataChange,
    /// Events emitted through the monitored node.
    EventNotify,
    /// Status notifications.
    StatusNotify,
}

/// A single queued notification.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationPayload {
    /// A changed value.
    DataChange(DataValue),
    /// The fields of one event, in select clause order.
    Event(Vec<Variant>),
    /// A status notification.
    Status(StatusCode),
}

/// A notification in the monitored item queue. The same logical entry is
/// tracked in the subscription's cross-item queue by its sequence.
#[derive(Debug, Clone)]
pub struct Notification {
    /// Position in the subscription wide arrival order.
    pub global_seq: u64,
    /// The payload.
    pub payload: NotificationPayload,
    /// Whether this is a synthetic queue-overflow event. Overflow events
    /// are never discarded by the overflow policy.
    pub overflow_event: bool,
}

/// An entry of the subscription's cross-item notification queue.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalQueueEntry {
    /// The notification's arrival sequence.
    pub seq: u64,
    /// The owning monitored item.
    pub monitored_item_id: u32,
}

/// A server side monitored item.
#[derive(Debug)]
pub struct MonitoredItem {
    /// Id, unique within the owning subscription. Server-local items use
    /// ids from their own space.
    pub id: u32,
    /// The monitored node.
    pub monitored_node_id: NodeId,
    /// The monitored attribute.
    pub attribute_id: AttributeId,
    /// Parsed index range for value reads.
    pub index_range: NumericRange,
    /// Which timestamps sampled values carry.
    pub timestamps_to_return: TimestampsToReturn,
    /// The current monitoring mode.
    pub monitoring_mode: MonitoringMode,
    /// Client supplied correlation handle.
    pub client_handle: u32,
    /// Revised sampling interval in ms.
    pub sampling_interval: f64,
    /// Revised queue bound. Overflow markers are not counted against it.
    pub max_queue_size: usize,
    /// Whether overflow drops the oldest (true) or the second-newest.
    pub discard_oldest: bool,
    /// The monitoring filter.
    pub filter: MonitoringFilter,
    /// The kind of item.
    pub item_type: MonitoredItemType,
    /// Whether a sampling callback is registered with the timer service.
    pub registered: bool,
    queue: VecDeque<Notification>,
    event_overflows: usize,
    /// Canonical encoding of the last sampled (masked) value.
    last_sampled_value: Vec<u8>,
    /// The last sampled value in decoded form, for deadband comparison.
    last_value: Option<DataValue>,
}

impl MonitoredItem {
    /// A fresh item. Parameters are revised by the service layer before
    /// construction.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u32,
        monitored_node_id: NodeId,
        attribute_id: AttributeId,
        index_range: NumericRange,
        timestamps_to_return: TimestampsToReturn,
        monitoring_mode: MonitoringMode,
        client_handle: u32,
        sampling_interval: f64,
        max_queue_size: usize,
        discard_oldest: bool,
        filter: MonitoringFilter,
    ) -> MonitoredItem {
        let item_type = if attribute_id == AttributeId::EventNotifier {
            MonitoredItemType::EventNotify
        } else {
            MonitoredItemType::DataChange
        };
        MonitoredItem {
            id,
            monitored_node_id,
            attribute_id,
            index_range,
            timestamps_to_return,
            monitoring_mode,
            client_handle,
            sampling_interval,
            max_queue_size,
            discard_oldest,
            filter,
            item_type,
            registered: false,
            queue: VecDeque::new(),
            event_overflows: 0,
            last_sampled_value: Vec::new(),
            last_value: None,
        }
    }

    /// The number of queued notifications, including overflow markers.
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// The number of queued synthetic overflow events.
    pub fn event_overflows(&self) -> usize {
        self.event_overflows
    }

    /// The queued notifications, oldest first.
    pub fn queue(&self) -> impl Iterator<Item = &Notification> {
        self.queue.iter()
    }

    /// Pop the oldest notification, dropping its cross-item entry.
    pub fn pop_front(&mut self, global_queue: &mut VecDeque<GlobalQueueEntry>) -> Option<Notification> {
        let n = self.queue.pop_front()?;
        if n.overflow_event {
            self.event_overflows -= 1;
        }
        global_queue.retain(|e| e.seq != n.global_seq);
        Some(n)
    }

    /// Drop all queued notifications, e.g. when monitoring is disabled.
    pub fn clear_queue(&mut self, global_queue: &mut VecDeque<GlobalQueueEntry>) {
        global_queue.retain(|e| e.monitored_item_id != self.id);
        self.queue.clear();
        self.event_overflows = 0;
    }

    /// Forget the last sampled value so the next sample always reports.
    /// Used for resend-data semantics after a subscription transfer.
    pub fn force_resend(&mut self) {
        self.last_sampled_value.clear();
        self.last_value = None;
    }

    /// The last sampled value, used by transfer and diagnostics.
    pub fn last_value(&self) -> Option<&DataValue> {
        self.last_value.as_ref()
    }

    /// The effective data change trigger from the filter.
    fn trigger(&self) -> DataChangeTrigger {
        match &self.filter {
            MonitoringFilter::DataChange(f) => f.trigger,
            _ => DataChangeTrigger::StatusValue,
        }
    }

    /// Run change detection on a sampled value. On a detected change the
    /// comparison state is updated and the value to enqueue is returned.
    pub fn sample(&mut self, value: DataValue) -> Option<DataValue> {
        debug_assert_eq!(self.item_type, MonitoredItemType::DataChange);
        let trigger = self.trigger();

        // Mask the fields that do not participate in change detection
        let mut masked = value.clone();
        if trigger == DataChangeTrigger::Status {
            masked.value = None;
        }
        masked.server_timestamp = None;
        masked.server_picoseconds = None;
        if trigger < DataChangeTrigger::StatusValueTimestamp {
            masked.source_timestamp = None;
            masked.source_picoseconds = None;
        }

        let changed = if let Some(deadband) = self.absolute_deadband(trigger) {
            if masked.value.as_ref().map(|v| v.is_numeric()).unwrap_or(false) {
                deadband_change(
                    masked.value.as_ref(),
                    self.last_value.as_ref().and_then(|v| v.value.as_ref()),
                    deadband,
                )
            } else {
                self.encoding_changed(&masked)
            }
        } else {
            self.encoding_changed(&masked)
        };

        if !changed {
            return None;
        }

        self.last_sampled_value = encode_data_value(&masked);
        self.last_value = Some(value.clone());
        Some(value)
    }

    fn absolute_deadband(&self, trigger: DataChangeTrigger) -> Option<f64> {
        match &self.filter {
            MonitoringFilter::DataChange(f)
                if f.deadband_type == DeadbandType::Absolute
                    && trigger >= DataChangeTrigger::StatusValue =>
            {
                Some(f.deadband_value)
            }
            _ => None,
        }
    }

    fn encoding_changed(&self, masked: &DataValue) -> bool {
        let encoding = encode_data_value(masked);
        self.last_sampled_value.is_empty() || encoding != self.last_sampled_value
    }

    /// Append a notification to this item's queue and the cross-item
    /// queue, then enforce the queue bound.
    pub fn enqueue(
        &mut self,
        payload: NotificationPayload,
        overflow_event: bool,
        seq_alloc: &mut u64,
        global_queue: &mut VecDeque<GlobalQueueEntry>,
    ) {
        let seq = *seq_alloc;
        *seq_alloc += 1;
        self.queue.push_back(Notification {
            global_seq: seq,
            payload,
            overflow_event,
        });
        global_queue.push_back(GlobalQueueEntry {
            seq,
            monitored_item_id: self.id,
        });
        if overflow_event {
            self.event_overflows += 1;
        }
        self.ensure_queue_space(seq_alloc, global_queue);
    }

    /// Enforce `queue length - overflow markers <= max queue size`,
    /// discarding per policy and announcing the overflow.
    pub(crate) fn ensure_queue_space(
        &mut self,
        seq_alloc: &mut u64,
        global_queue: &mut VecDeque<GlobalQueueEntry>,
    ) {
        if self.queue.len() - self.event_overflows <= self.max_queue_size {
            return;
        }

        while self.queue.len() - self.event_overflows > self.max_queue_size {
            // At least two non-overflow notifications are in the queue
            debug_assert!(self.queue.len() - self.event_overflows >= 2);

            // Select the victim, skipping overflow events. They are never
            // discarded.
            let del_idx = if self.discard_oldest {
                (0..self.queue.len())
                    .find(|i| !self.queue[*i].overflow_event)
                    .expect("a non-overflow notification exists")
            } else {
                // The second newest, keeping the up-to-date notification
                let mut i = self.queue.len() - 2;
                while self.queue[i].overflow_event {
                    i -= 1;
                }
                i
            };
            let del_seq = self.queue[del_idx].global_seq;

            // Move the victim's successor right after the victim's slot in
            // the cross-item queue. Without this, an item with a fast
            // sampling interval could starve the others out of every
            // publish response.
            if let Some(successor) = self.queue.get(del_idx + 1) {
                let succ_seq = successor.global_seq;
                if let Some(succ_pos) = global_queue.iter().position(|e| e.seq == succ_seq) {
                    let entry = global_queue.remove(succ_pos).unwrap();
                    if let Some(del_pos) = global_queue.iter().position(|e| e.seq == del_seq) {
                        global_queue.insert(del_pos + 1, entry);
                    } else {
                        global_queue.push_front(entry);
                    }
                }
            }

            global_queue.retain(|e| e.seq != del_seq);
            self.queue.remove(del_idx);
        }

        // The element where the overflow is announced: the remaining head
        // when the oldest was dropped, the newest otherwise.
        let ind_idx = if self.discard_oldest {
            0
        } else {
            self.queue.len() - 1
        };

        match self.item_type {
            MonitoredItemType::EventNotify => {
                // Only one overflow event is generated for any run of
                // discarded events. Avoid two redundant overflow events in
                // a row.
                if self.queue[ind_idx].overflow_event {
                    if self.discard_oldest {
                        return;
                    }
                    if ind_idx > 0 && self.queue[ind_idx - 1].overflow_event {
                        return;
                    }
                }
                debug!(
                    "MonitoredItem {} | Inserting EventQueueOverflowEvent",
                    self.id
                );
                let seq = *seq_alloc;
                *seq_alloc += 1;
                let overflow = Notification {
                    global_seq: seq,
                    payload: NotificationPayload::Event(vec![Variant::from(NodeId::from(
                        ObjectTypeId::EventQueueOverflowEventType,
                    ))]),
                    overflow_event: true,
                };
                // Insert before the indicator in both queues
                let ind_seq = self.queue[ind_idx].global_seq;
                self.queue.insert(ind_idx, overflow);
                let global_pos = global_queue
                    .iter()
                    .position(|e| e.seq == ind_seq)
                    .unwrap_or(global_queue.len());
                global_queue.insert(
                    global_pos,
                    GlobalQueueEntry {
                        seq,
                        monitored_item_id: self.id,
                    },
                );
                self.event_overflows += 1;
            }
            MonitoredItemType::DataChange => {
                if let NotificationPayload::DataChange(value) = &mut self.queue[ind_idx].payload {
                    if self.max_queue_size > 1 {
                        value.status = Some(value.status().with_info_bits(
                            SubStatusBits::INFO_TYPE_DATA_VALUE | SubStatusBits::OVERFLOW,
                        ));
                    } else {
                        // A queue of one never reports the overflow bit
                        value.status = Some(value.status().without_info_bits());
                    }
                }
            }
            MonitoredItemType::StatusNotify => {}
        }
    }
}

fn out_of_deadband(new: &Variant, old: &Variant, deadband: f64) -> bool {
    match (new.as_f64(), old.as_f64()) {
        (Some(a), Some(b)) => (a - b).abs() > deadband,
        _ => false,
    }
}

/// Deadband change detection. Arrays compare element-wise; any difference
/// in length or type is a change.
fn deadband_change(new: Option<&Variant>, old: Option<&Variant>, deadband: f64) -> bool {
    let (new, old) = match (new, old) {
        (Some(new), Some(old)) => (new, old),
        (None, None) => return false,
        _ => return true,
    };
    if new.scalar_type_id() != old.scalar_type_id() {
        return true;
    }
    match (new.as_array(), old.as_array()) {
        (Some(new_values), Some(old_values)) => {
            if new_values.len() != old_values.len() {
                return true;
            }
            new_values
                .iter()
                .zip(old_values)
                .any(|(a, b)| out_of_deadband(a, b, deadband))
        }
        (None, None) => out_of_deadband(new, old, deadband),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opcua_types::DataChangeFilter;

    fn data_item(queue_size: usize, discard_oldest: bool) -> MonitoredItem {
        MonitoredItem::new(
            1,
            NodeId::new(1, 1u32),
            AttributeId::Value,
            NumericRange::None,
            TimestampsToReturn::Both,
            MonitoringMode::Reporting,
            100,
            100.0,
            queue_size,
            discard_oldest,
            MonitoringFilter::None,
        )
    }

    fn event_item(queue_size: usize, discard_oldest: bool) -> MonitoredItem {
        MonitoredItem::new(
            2,
            NodeId::new(1, 1u32),
            AttributeId::EventNotifier,
            NumericRange::None,
            TimestampsToReturn::Both,
            MonitoringMode::Reporting,
            100,
            0.0,
            queue_size,
            discard_oldest,
            MonitoringFilter::Event(Default::default()),
        )
    }

    fn enqueue_values(
        mi: &mut MonitoredItem,
        values: impl IntoIterator<Item = u32>,
        seq: &mut u64,
        global: &mut VecDeque<GlobalQueueEntry>,
    ) {
        for v in values {
            let dv = mi.sample(DataValue::new_now(v)).expect("value changed");
            mi.enqueue(NotificationPayload::DataChange(dv), false, seq, global);
        }
    }

    fn queued_values(mi: &MonitoredItem) -> Vec<u32> {
        mi.queue()
            .map(|n| match &n.payload {
                NotificationPayload::DataChange(dv) => match dv.value {
                    Some(Variant::UInt32(v)) => v,
                    _ => panic!("unexpected value"),
                },
                _ => panic!("not a data change"),
            })
            .collect()
    }

    #[test]
    fn first_sample_always_changes() {
        let mut mi = data_item(3, true);
        assert!(mi.sample(DataValue::new_now(1u32)).is_some());
    }

    #[test]
    fn unchanged_value_is_suppressed() {
        let mut mi = data_item(3, true);
        let dv = DataValue::new_at(1u32, opcua_types::DateTime::from_ticks(5));
        assert!(mi.sample(dv.clone()).is_some());
        assert!(mi.sample(dv).is_none());
    }

    #[test]
    fn timestamp_change_only_reports_with_timestamp_trigger() {
        let mut mi = data_item(10, true);
        mi.filter = MonitoringFilter::DataChange(DataChangeFilter {
            trigger: DataChangeTrigger::StatusValue,
            ..Default::default()
        });
        let v1 = DataValue::new_at(1u32, opcua_types::DateTime::from_ticks(5));
        let mut v2 = v1.clone();
        v2.source_timestamp = Some(opcua_types::DateTime::from_ticks(9));
        assert!(mi.sample(v1.clone()).is_some());
        // Same value, different source timestamp: suppressed
        assert!(mi.sample(v2.clone()).is_none());

        let mut mi = data_item(10, true);
        mi.filter = MonitoringFilter::DataChange(DataChangeFilter {
            trigger: DataChangeTrigger::StatusValueTimestamp,
            ..Default::default()
        });
        assert!(mi.sample(v1).is_some());
        assert!(mi.sample(v2).is_some());
    }

    #[test]
    fn absolute_deadband_suppresses_small_changes() {
        let mut mi = data_item(10, true);
        mi.filter = MonitoringFilter::DataChange(DataChangeFilter {
            trigger: DataChangeTrigger::StatusValue,
            deadband_type: DeadbandType::Absolute,
            deadband_value: 2.0,
        });
        assert!(mi.sample(DataValue::new_now(0.0f64)).is_some());
        assert!(mi.sample(DataValue::new_now(1.0f64)).is_none());
        assert!(mi.sample(DataValue::new_now(2.0f64)).is_none());
        assert!(mi.sample(DataValue::new_now(3.0f64)).is_some());
        // Comparison is against the last reported value, now 3.0
        assert!(mi.sample(DataValue::new_now(4.0f64)).is_none());
    }

    #[test]
    fn overflow_discard_oldest_flags_head() {
        let mut mi = data_item(3, true);
        let mut seq = 0u64;
        let mut global = VecDeque::new();
        enqueue_values(&mut mi, [1, 2, 3, 4], &mut seq, &mut global);

        assert_eq!(queued_values(&mi), vec![2, 3, 4]);
        assert_eq!(global.len(), 3);
        let head = mi.queue().next().unwrap();
        let NotificationPayload::DataChange(dv) = &head.payload else {
            panic!()
        };
        assert!(dv.status().contains_info_bits(SubStatusBits::OVERFLOW));
        // The newest value carries no overflow bit
        let tail = mi.queue().last().unwrap();
        let NotificationPayload::DataChange(dv) = &tail.payload else {
            panic!()
        };
        assert!(!dv.status().contains_info_bits(SubStatusBits::OVERFLOW));
    }

    #[test]
    fn overflow_keep_newest_flags_tail() {
        let mut mi = data_item(3, false);
        let mut seq = 0u64;
        let mut global = VecDeque::new();
        enqueue_values(&mut mi, [1, 2, 3, 4], &mut seq, &mut global);

        // The second newest was dropped, the newest survives
        assert_eq!(queued_values(&mi), vec![1, 2, 4]);
        let tail = mi.queue().last().unwrap();
        let NotificationPayload::DataChange(dv) = &tail.payload else {
            panic!()
        };
        assert!(dv.status().contains_info_bits(SubStatusBits::OVERFLOW));
    }

    #[test]
    fn queue_of_one_has_no_overflow_bit() {
        let mut mi = data_item(1, true);
        let mut seq = 0u64;
        let mut global = VecDeque::new();
        enqueue_values(&mut mi, [1, 2], &mut seq, &mut global);
        assert_eq!(queued_values(&mi), vec![2]);
        let NotificationPayload::DataChange(dv) = &mi.queue().next().unwrap().payload else {
            panic!()
        };
        assert!(!dv.status().contains_info_bits(SubStatusBits::OVERFLOW));
    }

    #[test]
    fn event_overflow_inserts_single_marker() {
        let mut mi = event_item(2, true);
        let mut seq = 0u64;
        let mut global = VecDeque::new();
        for i in 0..4u32 {
            mi.enqueue(
                NotificationPayload::Event(vec![Variant::from(i)]),
                false,
                &mut seq,
                &mut global,
            );
        }
        // Queue bound is 2 plus the single overflow marker at the head
        assert_eq!(mi.queue_len(), 3);
        assert_eq!(mi.event_overflows(), 1);
        assert!(mi.queue().next().unwrap().overflow_event);
        // Invariant: queue length within size + overflow markers
        assert!(mi.queue_len() <= mi.max_queue_size + mi.event_overflows());
        // The cross-item queue tracks every entry
        assert_eq!(global.len(), mi.queue_len());
    }

    #[test]
    fn force_resend_reports_unchanged_value() {
        let mut mi = data_item(3, true);
        let dv = DataValue::new_at(1u32, opcua_types::DateTime::from_ticks(5));
        assert!(mi.sample(dv.clone()).is_some());
        assert!(mi.sample(dv.clone()).is_none());
        mi.force_resend();
        assert!(mi.sample(dv).is_some());
    }
}
