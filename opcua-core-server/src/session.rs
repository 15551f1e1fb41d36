//! Server side sessions.
//!
//! A session owns its subscriptions and the FIFO of publish requests the
//! client has queued as response slots. The attached channel is only a
//! sender of typed responses; transport and security live outside the
//! core.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use opcua_types::{
    CallResponse, DateTime, NotificationMessage, PublishResponse, ResponseHeader,
    StatusChangeNotification, StatusCode, SubscriptionAcknowledgement,
};

use crate::subscriptions::subscription::{PublishAction, Subscription};

/// The channel half of a session: something that can deliver typed
/// responses for previously received requests.
pub trait ResponseSender: Send + Sync {
    /// Deliver a publish response.
    fn send_publish_response(&self, request_id: u32, response: PublishResponse);
    /// Deliver a call response for an asynchronously completed call.
    fn send_call_response(&self, request_id: u32, response: CallResponse);
}

/// A publish request parked in the session as a response slot.
#[derive(Debug)]
pub struct QueuedPublishRequest {
    /// The transport level request id, echoed when responding.
    pub request_id: u32,
    /// The client's request handle.
    pub request_handle: u32,
    /// Results for the acknowledgements the request carried.
    pub ack_results: Vec<StatusCode>,
}

/// A server side session.
pub struct Session {
    /// The session id.
    pub id: u32,
    /// The session name, informational.
    pub name: String,
    /// The attached channel, if any.
    channel: Option<Arc<dyn ResponseSender>>,
    /// Session timeout in ms.
    pub timeout_ms: f64,
    /// When the session expires without further activity.
    deadline: Instant,
    /// The session's subscriptions, keyed by the server wide id.
    pub subscriptions: BTreeMap<u32, Subscription>,
    publish_queue: VecDeque<QueuedPublishRequest>,
}

impl Session {
    /// A new session with an attached channel.
    pub fn new(id: u32, name: impl Into<String>, timeout_ms: f64) -> Session {
        Session {
            id,
            name: name.into(),
            channel: None,
            timeout_ms,
            deadline: Instant::now() + std::time::Duration::from_millis(timeout_ms as u64),
            subscriptions: BTreeMap::new(),
            publish_queue: VecDeque::new(),
        }
    }

    /// Attach the response channel.
    pub fn attach_channel(&mut self, channel: Arc<dyn ResponseSender>) {
        self.channel = Some(channel);
    }

    /// Detach the response channel, e.g. when the secure channel closed.
    pub fn detach_channel(&mut self) {
        self.channel = None;
    }

    /// The attached channel.
    pub fn channel(&self) -> Option<&Arc<dyn ResponseSender>> {
        self.channel.as_ref()
    }

    /// Extend the session lifetime on request activity.
    pub fn update_lifetime(&mut self, now: Instant) {
        self.deadline = now + std::time::Duration::from_millis(self.timeout_ms as u64);
    }

    /// Whether the session deadline has passed.
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    /// The number of parked publish requests.
    pub fn publish_queue_len(&self) -> usize {
        self.publish_queue.len()
    }

    /// Park a publish request as a response slot. When the queue is full
    /// the oldest parked request is answered `BadTooManyPublishRequests`
    /// to make room.
    pub fn enqueue_publish_request(&mut self, entry: QueuedPublishRequest, limit: usize) {
        if limit > 0 && self.publish_queue.len() >= limit {
            warn!(
                "Session {} | Publish request limit {} reached",
                self.id, limit
            );
            if let Some(oldest) = self.publish_queue.pop_front() {
                self.answer_publish_request(oldest, StatusCode::BadTooManyPublishRequests);
            }
        }
        self.publish_queue.push_back(entry);
    }

    fn answer_publish_request(&self, entry: QueuedPublishRequest, status: StatusCode) {
        let Some(channel) = &self.channel else {
            return;
        };
        let response = PublishResponse {
            response_header: ResponseHeader {
                request_handle: entry.request_handle,
                timestamp: DateTime::now(),
                service_result: status,
            },
            results: entry.ack_results,
            ..Default::default()
        };
        channel.send_publish_response(entry.request_id, response);
    }

    /// Answer every parked publish request with `BadNoSubscription`. Called
    /// when the session's last subscription disappears.
    pub fn answer_publish_requests_no_subscription(&mut self) {
        while let Some(entry) = self.publish_queue.pop_front() {
            self.answer_publish_request(entry, StatusCode::BadNoSubscription);
        }
    }

    /// Process the acknowledgements of a publish request.
    pub fn process_acknowledgements(
        &mut self,
        acknowledgements: &[SubscriptionAcknowledgement],
    ) -> Vec<StatusCode> {
        acknowledgements
            .iter()
            .map(|ack| match self.subscriptions.get_mut(&ack.subscription_id) {
                Some(sub) => sub.remove_retransmission_message(ack.sequence_number),
                None => StatusCode::BadSubscriptionIdInvalid,
            })
            .collect()
    }

    /// Run the publish callback for one subscription. Returns true when
    /// the subscription exceeded its lifetime and must be deleted by the
    /// caller.
    pub fn subscription_publish_tick(&mut self, subscription_id: u32, now: DateTime) -> bool {
        loop {
            let available = !self.publish_queue.is_empty() && self.channel.is_some();
            let Some(sub) = self.subscriptions.get_mut(&subscription_id) else {
                return false;
            };
            match sub.publish_tick(available, now) {
                PublishAction::None => return false,
                PublishAction::Expired => return true,
                PublishAction::Send {
                    message,
                    available_sequence_numbers,
                    more_notifications,
                } => {
                    let entry = self
                        .publish_queue
                        .pop_front()
                        .expect("publish request available");
                    let response = PublishResponse {
                        response_header: ResponseHeader {
                            request_handle: entry.request_handle,
                            timestamp: now,
                            service_result: StatusCode::Good,
                        },
                        subscription_id,
                        available_sequence_numbers,
                        more_notifications,
                        notification_message: message,
                        results: entry.ack_results,
                    };
                    debug!(
                        "Session {} | Subscription {} | Sending publish response, seq {}",
                        self.id, subscription_id, response.notification_message.sequence_number
                    );
                    if let Some(channel) = &self.channel {
                        channel.send_publish_response(entry.request_id, response);
                    }
                    // Repeat if there are more notifications to send
                    if !more_notifications {
                        return false;
                    }
                }
            }
        }
    }

    /// Deliver a status change notification for a subscription if a
    /// response slot is available; otherwise it is dropped after logging.
    pub fn send_status_change(&mut self, subscription_id: u32, status: StatusCode) {
        let Some(sub) = self.subscriptions.get(&subscription_id) else {
            return;
        };
        let sequence_number = sub.sequence_number().wrapping_add(1).max(1);
        let Some(entry) = self.publish_queue.pop_front() else {
            debug!(
                "Session {} | Subscription {} | No response slot for status change {}",
                self.id, subscription_id, status
            );
            return;
        };
        let message = NotificationMessage {
            sequence_number,
            publish_time: DateTime::now(),
            notification_data: vec![opcua_types::NotificationData::StatusChange(
                StatusChangeNotification { status },
            )],
        };
        let response = PublishResponse {
            response_header: ResponseHeader {
                request_handle: entry.request_handle,
                timestamp: DateTime::now(),
                service_result: StatusCode::Good,
            },
            subscription_id,
            notification_message: message,
            results: entry.ack_results,
            ..Default::default()
        };
        if let Some(channel) = &self.channel {
            channel.send_publish_response(entry.request_id, response);
        }
    }

    /// Remove a subscription. The caller deals with event listener
    /// deregistration and with orphaned publish requests.
    pub fn remove_subscription(&mut self, subscription_id: u32) -> Option<Subscription> {
        self.subscriptions.remove(&subscription_id)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use opcua_base::sync::Mutex;

    /// A channel that records everything sent through it.
    #[derive(Default)]
    pub(crate) struct RecordingChannel {
        pub publish_responses: Mutex<Vec<(u32, PublishResponse)>>,
        pub call_responses: Mutex<Vec<(u32, CallResponse)>>,
    }

    impl ResponseSender for RecordingChannel {
        fn send_publish_response(&self, request_id: u32, response: PublishResponse) {
            self.publish_responses.lock().push((request_id, response));
        }

        fn send_call_response(&self, request_id: u32, response: CallResponse) {
            self.call_responses.lock().push((request_id, response));
        }
    }

    fn entry(request_id: u32) -> QueuedPublishRequest {
        QueuedPublishRequest {
            request_id,
            request_handle: request_id,
            ack_results: Vec::new(),
        }
    }

    #[test]
    fn publish_queue_bound_answers_oldest() {
        let mut session = Session::new(1, "test", 60_000.0);
        let channel = Arc::new(RecordingChannel::default());
        session.attach_channel(channel.clone());

        for i in 0..3 {
            session.enqueue_publish_request(entry(i), 2);
        }
        assert_eq!(session.publish_queue_len(), 2);
        let sent = channel.publish_responses.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 0);
        assert_eq!(
            sent[0].1.response_header.service_result,
            StatusCode::BadTooManyPublishRequests
        );
    }

    #[test]
    fn no_subscription_answers_everything() {
        let mut session = Session::new(1, "test", 60_000.0);
        let channel = Arc::new(RecordingChannel::default());
        session.attach_channel(channel.clone());
        session.enqueue_publish_request(entry(1), 10);
        session.enqueue_publish_request(entry(2), 10);
        session.answer_publish_requests_no_subscription();
        assert_eq!(session.publish_queue_len(), 0);
        let sent = channel.publish_responses.lock();
        assert_eq!(sent.len(), 2);
        assert!(sent
            .iter()
            .all(|(_, r)| r.response_header.service_result == StatusCode::BadNoSubscription));
    }

    #[test]
    fn lifetime_extension() {
        let mut session = Session::new(1, "test", 50.0);
        let now = Instant::now();
        assert!(!session.is_expired(now));
        assert!(session.is_expired(now + std::time::Duration::from_millis(60)));
        session.update_lifetime(now + std::time::Duration::from_millis(60));
        assert!(!session.is_expired(now + std::time::Duration::from_millis(100)));
    }
}
