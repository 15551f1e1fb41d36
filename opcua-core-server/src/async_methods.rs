//! The asynchronous method call manager.
//!
//! Calls on methods flagged async are split into per-method operations and
//! parked here. Workers pull operations, produce results, and push them
//! back; the main loop drains completed results on a short timer and
//! enforces timeouts on a long one. Workers never touch anything but these
//! queues: each queue has its own lock and the aggregate countdown is an
//! atomic.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use opcua_base::sync::Mutex;
use opcua_types::{CallMethodRequest, CallMethodResult, CallResponse, ResponseHeader, StatusCode};

use crate::config::AsyncOperationLimits;

/// How often completed results are drained into their aggregates.
pub const RESPONSE_INTERVAL: Duration = Duration::from_millis(50);
/// How often the queues are swept for timed out operations.
pub const INTEGRITY_INTERVAL: Duration = Duration::from_secs(10);

/// One queued method operation.
#[derive(Debug)]
struct AsyncOperation {
    /// Identity of the operation, stable across queue moves.
    op_id: u64,
    session_id: u32,
    request_id: u32,
    /// Index of this operation's result slot in the aggregate.
    index: u32,
    dispatch_time: Instant,
    request: CallMethodRequest,
    result: CallMethodResult,
}

/// The operation a worker received, with the token it reports back with.
#[derive(Debug)]
pub struct AsyncOperationHandle {
    /// Token identifying the operation for the result report.
    pub op_id: u64,
    /// The call to execute.
    pub request: CallMethodRequest,
}

/// An aggregated call waiting for its outstanding operations.
#[derive(Debug)]
struct AsyncCallEntry {
    session_id: u32,
    request_id: u32,
    request_handle: u32,
    dispatch_time: Instant,
    /// Outstanding operations. Atomic so workers could observe it without
    /// the entry lock; all mutation happens through the manager.
    countdown: AtomicU32,
    response: CallResponse,
}

/// A finished aggregate, ready to be sent on the originating channel.
#[derive(Debug)]
pub struct CompletedCall {
    /// The session the call arrived on.
    pub session_id: u32,
    /// The transport request id to respond to.
    pub request_id: u32,
    /// The assembled response.
    pub response: CallResponse,
}

/// The async method manager.
pub struct AsyncMethodManager {
    limits: AsyncOperationLimits,
    request_queue: Mutex<VecDeque<AsyncOperation>>,
    pending_list: Mutex<VecDeque<AsyncOperation>>,
    response_queue: Mutex<VecDeque<AsyncOperation>>,
    entries: Mutex<Vec<AsyncCallEntry>>,
    next_op_id: AtomicU64,
    /// The number of live aggregate entries.
    current_count: AtomicU32,
    /// Called after an operation is queued, to wake a worker.
    notify: Mutex<Option<Box<dyn Fn() + Send>>>,
}

impl AsyncMethodManager {
    /// A manager with the given limits.
    pub fn new(limits: AsyncOperationLimits) -> AsyncMethodManager {
        AsyncMethodManager {
            limits,
            request_queue: Mutex::new(VecDeque::new()),
            pending_list: Mutex::new(VecDeque::new()),
            response_queue: Mutex::new(VecDeque::new()),
            entries: Mutex::new(Vec::new()),
            next_op_id: AtomicU64::new(1),
            current_count: AtomicU32::new(0),
            notify: Mutex::new(None),
        }
    }

    /// Install the callback that wakes workers when an operation arrives.
    pub fn set_notify(&self, notify: impl Fn() + Send + 'static) {
        *self.notify.lock() = Some(Box::new(notify));
    }

    /// The number of calls currently aggregating.
    pub fn current_count(&self) -> u32 {
        self.current_count.load(Ordering::Relaxed)
    }

    /// Create the aggregate entry for a call with `operation_count`
    /// operations. Result slots start out as `BadTimeout` and are
    /// overwritten as results arrive.
    pub fn create_call_entry(
        &self,
        session_id: u32,
        request_id: u32,
        request_handle: u32,
        operation_count: usize,
    ) {
        let response = CallResponse {
            response_header: ResponseHeader {
                request_handle,
                ..Default::default()
            },
            results: (0..operation_count)
                .map(|_| CallMethodResult::from_status(StatusCode::BadTimeout))
                .collect(),
        };
        self.entries.lock().push(AsyncCallEntry {
            session_id,
            request_id,
            request_handle,
            dispatch_time: Instant::now(),
            countdown: AtomicU32::new(operation_count as u32),
            response,
        });
        self.current_count.fetch_add(1, Ordering::Relaxed);
        debug!(
            "AsyncMethodManager | Created call entry for request {} with {} operations",
            request_id, operation_count
        );
    }

    /// Queue one operation of a call for a worker. Fails when the request
    /// queue is at its configured bound.
    pub fn set_next_async_method(
        &self,
        session_id: u32,
        request_id: u32,
        index: u32,
        request: CallMethodRequest,
    ) -> StatusCode {
        {
            let mut queue = self.request_queue.lock();
            if self.limits.max_queue_size != 0 && queue.len() >= self.limits.max_queue_size {
                warn!(
                    "AsyncMethodManager | Queue exceeds limit ({})",
                    self.limits.max_queue_size
                );
                return StatusCode::BadUnexpectedError;
            }
            queue.push_back(AsyncOperation {
                op_id: self.next_op_id.fetch_add(1, Ordering::Relaxed),
                session_id,
                request_id,
                index,
                dispatch_time: Instant::now(),
                request,
                result: CallMethodResult::default(),
            });
        }
        if let Some(notify) = &*self.notify.lock() {
            notify();
        }
        StatusCode::Good
    }

    /// Worker side: take the next operation. The operation moves to the
    /// pending list until its result is reported.
    pub fn get_async_operation(&self) -> Option<AsyncOperationHandle> {
        let mut operation = self.request_queue.lock().pop_front()?;
        // The pending timestamp restarts the timeout for the worker phase
        operation.dispatch_time = Instant::now();
        let handle = AsyncOperationHandle {
            op_id: operation.op_id,
            request: operation.request.clone(),
        };
        self.pending_list.lock().push_back(operation);
        Some(handle)
    }

    /// Worker side: report the result of an operation previously taken
    /// with [`Self::get_async_operation`]. A result for an operation that
    /// was already swept is dismissed.
    pub fn set_async_operation_result(&self, op_id: u64, result: CallMethodResult) {
        let operation = {
            let mut pending = self.pending_list.lock();
            let Some(pos) = pending.iter().position(|op| op.op_id == op_id) else {
                // Late call, the operation timed out and was removed
                warn!("AsyncMethodManager | Operation {} is not pending anymore", op_id);
                return;
            };
            let mut operation = pending.remove(pos).unwrap();
            operation.result = result;
            operation
        };
        self.response_queue.lock().push_back(operation);
    }

    /// Install a result produced on the main loop itself, e.g. for an
    /// operation that failed validation or ran synchronously within an
    /// otherwise async call.
    pub fn complete_operation_locally(
        &self,
        session_id: u32,
        request_id: u32,
        index: u32,
        result: CallMethodResult,
    ) -> Option<CompletedCall> {
        self.insert_method_response(AsyncOperation {
            op_id: self.next_op_id.fetch_add(1, Ordering::Relaxed),
            session_id,
            request_id,
            index,
            dispatch_time: Instant::now(),
            request: CallMethodRequest::default(),
            result,
        })
    }

    /// Drain completed results into their aggregates, returning every call
    /// that became complete. Runs every 50 ms on the main loop.
    pub fn response_tick(&self) -> Vec<CompletedCall> {
        let mut completed = Vec::new();
        loop {
            let Some(operation) = self.response_queue.lock().pop_front() else {
                break;
            };
            if let Some(call) = self.insert_method_response(operation) {
                completed.push(call);
            }
        }
        completed
    }

    /// Install an operation result in its aggregate entry. Returns the
    /// finished call when this was the last outstanding operation.
    fn insert_method_response(&self, operation: AsyncOperation) -> Option<CompletedCall> {
        let mut entries = self.entries.lock();
        let Some(pos) = entries.iter().position(|e| {
            e.request_id == operation.request_id && e.session_id == operation.session_id
        }) else {
            warn!(
                "AsyncMethodManager | No call entry for request {}",
                operation.request_id
            );
            return None;
        };
        let entry = &mut entries[pos];
        if let Some(slot) = entry.response.results.get_mut(operation.index as usize) {
            *slot = operation.result;
        }
        let remaining = entry.countdown.fetch_sub(1, Ordering::AcqRel) - 1;
        if remaining > 0 {
            return None;
        }
        let entry = entries.remove(pos);
        self.current_count.fetch_sub(1, Ordering::Relaxed);
        Some(CompletedCall {
            session_id: entry.session_id,
            request_id: entry.request_id,
            response: finish_response(entry),
        })
    }

    /// Sweep the request queue and pending list for operations older than
    /// the operation timeout, reporting them `BadRequestTimeout`, and
    /// flush aggregates that have waited longer than the whole-call
    /// timeout. Runs every 10 s on the main loop.
    pub fn integrity_tick(&self, now: Instant) -> Vec<CompletedCall> {
        let mut completed = Vec::new();
        if self.limits.operation_timeout_ms > 0.0 {
            let timeout = Duration::from_millis(self.limits.operation_timeout_ms as u64);

            // Removing everything at once could stall the loop; take at
            // most 10% of the queue bound, and always at least 3
            let mut budget = (self.limits.max_queue_size / 10).max(3);

            loop {
                if budget == 0 {
                    break;
                }
                let expired = {
                    let mut queue = self.request_queue.lock();
                    match queue.front() {
                        Some(op) if now.duration_since(op.dispatch_time) > timeout => {
                            queue.pop_front()
                        }
                        _ => None,
                    }
                };
                let Some(mut operation) = expired else {
                    break;
                };
                warn!(
                    "AsyncMethodManager | Request {} operation {} timed out in queue",
                    operation.request_id, operation.index
                );
                operation.result = CallMethodResult::from_status(StatusCode::BadRequestTimeout);
                if let Some(call) = self.insert_method_response(operation) {
                    completed.push(call);
                }
                budget -= 1;
            }

            loop {
                if budget == 0 {
                    break;
                }
                let expired = {
                    let mut pending = self.pending_list.lock();
                    match pending.front() {
                        Some(op) if now.duration_since(op.dispatch_time) > timeout => {
                            pending.pop_front()
                        }
                        _ => None,
                    }
                };
                let Some(mut operation) = expired else {
                    break;
                };
                warn!(
                    "AsyncMethodManager | Request {} operation {} timed out with its worker",
                    operation.request_id, operation.index
                );
                operation.result = CallMethodResult::from_status(StatusCode::BadRequestTimeout);
                if let Some(call) = self.insert_method_response(operation) {
                    completed.push(call);
                }
                budget -= 1;
            }
        }

        completed.extend(self.check_call_timeouts(now));
        completed
    }

    /// Flush aggregates that never completed within the whole-call
    /// timeout. Their untouched slots still carry `BadTimeout`.
    fn check_call_timeouts(&self, now: Instant) -> Vec<CompletedCall> {
        if self.limits.call_request_timeout_ms <= 0.0 {
            return Vec::new();
        }
        let timeout = Duration::from_millis(self.limits.call_request_timeout_ms as u64);
        let mut entries = self.entries.lock();
        let mut flushed = Vec::new();
        let mut i = 0;
        while i < entries.len() {
            let entry = &entries[i];
            if entry.countdown.load(Ordering::Acquire) > 0
                && now.duration_since(entry.dispatch_time) > timeout
            {
                warn!(
                    "AsyncMethodManager | Call request {} was flushed due to a timeout",
                    entry.request_id
                );
                let entry = entries.remove(i);
                self.current_count.fetch_sub(1, Ordering::Relaxed);
                flushed.push(CompletedCall {
                    session_id: entry.session_id,
                    request_id: entry.request_id,
                    response: finish_response(entry),
                });
            } else {
                i += 1;
            }
        }
        flushed
    }
}

fn finish_response(entry: AsyncCallEntry) -> CallResponse {
    let mut response = entry.response;
    response.response_header = ResponseHeader {
        request_handle: entry.request_handle,
        timestamp: opcua_types::DateTime::now(),
        service_result: StatusCode::Good,
    };
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use opcua_types::{NodeId, Variant};

    fn limits(op_timeout: f64) -> AsyncOperationLimits {
        AsyncOperationLimits {
            operation_timeout_ms: op_timeout,
            max_queue_size: 100,
            call_request_timeout_ms: 120_000.0,
        }
    }

    fn request(i: u32) -> CallMethodRequest {
        CallMethodRequest {
            object_id: NodeId::new(1, 1u32),
            method_id: NodeId::new(1, 100 + i),
            input_arguments: vec![Variant::from(i)],
        }
    }

    #[test]
    fn worker_roundtrip_completes_call() {
        let manager = AsyncMethodManager::new(limits(60_000.0));
        manager.create_call_entry(1, 10, 99, 2);
        assert_eq!(manager.current_count(), 1);
        manager.set_next_async_method(1, 10, 0, request(0));
        manager.set_next_async_method(1, 10, 1, request(1));

        // Worker picks up both operations
        let op0 = manager.get_async_operation().unwrap();
        let op1 = manager.get_async_operation().unwrap();
        assert!(manager.get_async_operation().is_none());

        manager.set_async_operation_result(
            op0.op_id,
            CallMethodResult {
                status_code: StatusCode::Good,
                output_arguments: vec![Variant::from(1000u32)],
                ..Default::default()
            },
        );
        // Only one result: the call is not complete yet
        assert!(manager.response_tick().is_empty());

        manager.set_async_operation_result(
            op1.op_id,
            CallMethodResult::from_status(StatusCode::Good),
        );
        let completed = manager.response_tick();
        assert_eq!(completed.len(), 1);
        let call = &completed[0];
        assert_eq!(call.session_id, 1);
        assert_eq!(call.request_id, 10);
        assert_eq!(call.response.response_header.request_handle, 99);
        assert_eq!(call.response.results.len(), 2);
        assert_eq!(call.response.results[0].status_code, StatusCode::Good);
        assert_eq!(
            call.response.results[0].output_arguments,
            vec![Variant::from(1000u32)]
        );
        assert_eq!(manager.current_count(), 0);
    }

    #[test]
    fn queued_operation_times_out() {
        let manager = AsyncMethodManager::new(limits(0.001));
        manager.create_call_entry(1, 10, 99, 1);
        manager.set_next_async_method(1, 10, 0, request(0));

        std::thread::sleep(Duration::from_millis(5));
        let completed = manager.integrity_tick(Instant::now());
        assert_eq!(completed.len(), 1);
        assert_eq!(
            completed[0].response.results[0].status_code,
            StatusCode::BadRequestTimeout
        );
        // The operation is gone from the queue
        assert!(manager.get_async_operation().is_none());
    }

    #[test]
    fn pending_operation_times_out_when_worker_never_returns() {
        let manager = AsyncMethodManager::new(limits(0.001));
        manager.create_call_entry(1, 10, 99, 1);
        manager.set_next_async_method(1, 10, 0, request(0));
        let op = manager.get_async_operation().unwrap();

        std::thread::sleep(Duration::from_millis(5));
        let completed = manager.integrity_tick(Instant::now());
        assert_eq!(completed.len(), 1);
        assert_eq!(
            completed[0].response.results[0].status_code,
            StatusCode::BadRequestTimeout
        );

        // The late result is dismissed
        manager.set_async_operation_result(op.op_id, CallMethodResult::from_status(StatusCode::Good));
        assert!(manager.response_tick().is_empty());
    }

    #[test]
    fn unfinished_slots_remain_bad_timeout() {
        let mut l = limits(60_000.0);
        l.call_request_timeout_ms = 0.001;
        let manager = AsyncMethodManager::new(l);
        manager.create_call_entry(1, 10, 99, 2);
        manager.set_next_async_method(1, 10, 0, request(0));
        let op = manager.get_async_operation().unwrap();
        manager.set_async_operation_result(op.op_id, CallMethodResult::from_status(StatusCode::Good));
        let _ = manager.response_tick();

        // The second operation never even got queued; the whole-call
        // timeout flushes the aggregate with its slot untouched
        std::thread::sleep(Duration::from_millis(5));
        let completed = manager.integrity_tick(Instant::now());
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].response.results[0].status_code, StatusCode::Good);
        assert_eq!(
            completed[0].response.results[1].status_code,
            StatusCode::BadTimeout
        );
    }

    #[test]
    fn queue_bound_rejects() {
        let mut l = limits(60_000.0);
        l.max_queue_size = 1;
        let manager = AsyncMethodManager::new(l);
        manager.create_call_entry(1, 10, 99, 2);
        assert_eq!(
            manager.set_next_async_method(1, 10, 0, request(0)),
            StatusCode::Good
        );
        assert_eq!(
            manager.set_next_async_method(1, 10, 1, request(1)),
            StatusCode::BadUnexpectedError
        );
    }

    #[test]
    fn notify_wakes_on_enqueue() {
        use std::sync::atomic::AtomicUsize;
        use std::sync::Arc;
        let manager = AsyncMethodManager::new(limits(60_000.0));
        let woken = Arc::new(AtomicUsize::new(0));
        let w = woken.clone();
        manager.set_notify(move || {
            w.fetch_add(1, Ordering::Relaxed);
        });
        manager.create_call_entry(1, 10, 99, 1);
        manager.set_next_async_method(1, 10, 0, request(0));
        assert_eq!(woken.load(Ordering::Relaxed), 1);
    }
}
