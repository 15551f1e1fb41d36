//! The timer driven runtime around [`ServerCore`].
//!
//! The core itself is tick driven and single threaded; this wrapper owns
//! the repeating callbacks: one publish callback per subscription, one
//! sampling callback per polled monitored item, the two async method
//! intervals and the session expiry sweep. All callbacks run on the tokio
//! runtime and take the core's write lock for the duration of a tick.

use std::sync::{Arc, Weak};
use std::time::Duration;

use hashbrown::HashMap;
use tracing::debug;

use opcua_base::sync::{Mutex, RwLock};
use opcua_base::timer::{repeating, TimerHandle};
use opcua_types::{
    CreateMonitoredItemsRequest, CreateMonitoredItemsResponse, CreateSubscriptionRequest,
    CreateSubscriptionResponse, DeleteMonitoredItemsRequest, DeleteMonitoredItemsResponse,
    DeleteSubscriptionsRequest, DeleteSubscriptionsResponse, ModifySubscriptionRequest,
    ModifySubscriptionResponse, MonitoringMode, SetMonitoringModeRequest,
    SetMonitoringModeResponse,
};

use crate::async_methods::{INTEGRITY_INTERVAL, RESPONSE_INTERVAL};
use crate::config::ServerConfig;
use crate::server::ServerCore;
use crate::services;
use crate::subscriptions::monitored_item::MonitoredItemType;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Default)]
struct TimerRegistry {
    publish: HashMap<(u32, u32), TimerHandle>,
    sampling: HashMap<(u32, u32, u32), TimerHandle>,
    background: Vec<TimerHandle>,
}

struct ServerInner {
    core: RwLock<ServerCore>,
    timers: Mutex<TimerRegistry>,
}

/// The runtime wrapper around the server core.
#[derive(Clone)]
pub struct Server {
    inner: Arc<ServerInner>,
}

impl Server {
    /// A server with an empty address space and no timers running yet.
    pub fn new(config: ServerConfig) -> Server {
        Server {
            inner: Arc::new(ServerInner {
                core: RwLock::new(ServerCore::new(config)),
                timers: Mutex::new(TimerRegistry::default()),
            }),
        }
    }

    /// The core, for services that need no timer bookkeeping.
    pub fn core(&self) -> &RwLock<ServerCore> {
        &self.inner.core
    }

    /// Start the background timers: async method response drain and
    /// integrity sweep, and the session expiry sweep. Must be called
    /// within a tokio runtime.
    pub fn start(&self) {
        let mut timers = self.inner.timers.lock();
        let weak = Arc::downgrade(&self.inner);
        timers.background.push(repeating(RESPONSE_INTERVAL, {
            let weak = weak.clone();
            move || {
                if let Some(inner) = weak.upgrade() {
                    inner.core.write().async_response_tick();
                }
            }
        }));
        timers.background.push(repeating(INTEGRITY_INTERVAL, {
            let weak = weak.clone();
            move || {
                if let Some(inner) = weak.upgrade() {
                    inner
                        .core
                        .write()
                        .async_integrity_tick(std::time::Instant::now());
                }
            }
        }));
        timers.background.push(repeating(SESSION_SWEEP_INTERVAL, {
            let weak = weak.clone();
            move || {
                if let Some(inner) = weak.upgrade() {
                    inner.core.write().expire_sessions(std::time::Instant::now());
                }
            }
        }));
    }

    /// Stop every timer. Ticking continues only if driven manually.
    pub fn stop(&self) {
        let mut timers = self.inner.timers.lock();
        timers.publish.clear();
        timers.sampling.clear();
        timers.background.clear();
    }

    fn schedule_publish(&self, session_id: u32, subscription_id: u32, interval_ms: f64) {
        let weak = Arc::downgrade(&self.inner);
        let handle = repeating(Duration::from_micros((interval_ms * 1000.0) as u64), move || {
            publish_tick(&weak, session_id, subscription_id);
        });
        self.inner
            .timers
            .lock()
            .publish
            .insert((session_id, subscription_id), handle);
    }

    fn schedule_sampling(
        &self,
        session_id: u32,
        subscription_id: u32,
        monitored_item_id: u32,
        interval_ms: f64,
    ) {
        let weak = Arc::downgrade(&self.inner);
        let handle = repeating(Duration::from_micros((interval_ms * 1000.0) as u64), move || {
            sample_tick(&weak, session_id, subscription_id, monitored_item_id);
        });
        self.inner
            .timers
            .lock()
            .sampling
            .insert((session_id, subscription_id, monitored_item_id), handle);
    }

    fn remove_subscription_timers(&self, session_id: u32, subscription_id: u32) {
        let mut timers = self.inner.timers.lock();
        timers.publish.remove(&(session_id, subscription_id));
        timers
            .sampling
            .retain(|(s, sub, _), _| !(*s == session_id && *sub == subscription_id));
    }

    /// CreateSubscription plus publish callback registration.
    pub fn create_subscription(
        &self,
        session_id: u32,
        request: &CreateSubscriptionRequest,
    ) -> CreateSubscriptionResponse {
        let response = {
            let mut core = self.inner.core.write();
            services::subscription::create_subscription(&mut core, session_id, request)
        };
        if response.response_header.service_result.is_good() {
            self.schedule_publish(
                session_id,
                response.subscription_id,
                response.revised_publishing_interval,
            );
        }
        response
    }

    /// ModifySubscription plus publish callback rescheduling.
    pub fn modify_subscription(
        &self,
        session_id: u32,
        request: &ModifySubscriptionRequest,
    ) -> ModifySubscriptionResponse {
        let response = {
            let mut core = self.inner.core.write();
            services::subscription::modify_subscription(&mut core, session_id, request)
        };
        if response.response_header.service_result.is_good() {
            self.remove_publish_timer(session_id, request.subscription_id);
            self.schedule_publish(
                session_id,
                request.subscription_id,
                response.revised_publishing_interval,
            );
        }
        response
    }

    fn remove_publish_timer(&self, session_id: u32, subscription_id: u32) {
        self.inner
            .timers
            .lock()
            .publish
            .remove(&(session_id, subscription_id));
    }

    /// DeleteSubscriptions plus timer teardown.
    pub fn delete_subscriptions(
        &self,
        session_id: u32,
        request: &DeleteSubscriptionsRequest,
    ) -> DeleteSubscriptionsResponse {
        let response = {
            let mut core = self.inner.core.write();
            services::subscription::delete_subscriptions(&mut core, session_id, request)
        };
        for (id, result) in request.subscription_ids.iter().zip(&response.results) {
            if result.is_good() {
                self.remove_subscription_timers(session_id, *id);
            }
        }
        response
    }

    /// CreateMonitoredItems plus sampling callback registration for the
    /// polled items.
    pub fn create_monitored_items(
        &self,
        session_id: u32,
        request: &CreateMonitoredItemsRequest,
    ) -> CreateMonitoredItemsResponse {
        let response = {
            let mut core = self.inner.core.write();
            services::monitored_items::create_monitored_items(&mut core, session_id, request)
        };
        {
            let mut core = self.inner.core.write();
            for result in &response.results {
                if !result.status_code.is_good() {
                    continue;
                }
                let Some(item) = core
                    .session_mut(session_id)
                    .and_then(|s| s.subscriptions.get_mut(&request.subscription_id))
                    .and_then(|sub| sub.monitored_item_mut(result.monitored_item_id))
                else {
                    continue;
                };
                if item.item_type == MonitoredItemType::DataChange
                    && item.monitoring_mode != MonitoringMode::Disabled
                    && item.sampling_interval > 0.0
                {
                    item.registered = true;
                    let interval = item.sampling_interval;
                    self.schedule_sampling(
                        session_id,
                        request.subscription_id,
                        result.monitored_item_id,
                        interval,
                    );
                }
            }
        }
        response
    }

    /// SetMonitoringMode plus sampling callback bookkeeping.
    pub fn set_monitoring_mode(
        &self,
        session_id: u32,
        request: &SetMonitoringModeRequest,
    ) -> SetMonitoringModeResponse {
        let response = {
            let mut core = self.inner.core.write();
            services::monitored_items::set_monitoring_mode(&mut core, session_id, request)
        };
        for (id, result) in request.monitored_item_ids.iter().zip(&response.results) {
            if !result.is_good() {
                continue;
            }
            match request.monitoring_mode {
                MonitoringMode::Disabled => {
                    self.inner
                        .timers
                        .lock()
                        .sampling
                        .remove(&(session_id, request.subscription_id, *id));
                }
                MonitoringMode::Sampling | MonitoringMode::Reporting => {
                    let interval = {
                        let core = self.inner.core.read();
                        core.session(session_id)
                            .and_then(|s| s.subscriptions.get(&request.subscription_id))
                            .and_then(|sub| sub.monitored_item(*id))
                            .filter(|mi| mi.item_type == MonitoredItemType::DataChange)
                            .map(|mi| mi.sampling_interval)
                    };
                    if let Some(interval) = interval {
                        if interval > 0.0 {
                            self.schedule_sampling(
                                session_id,
                                request.subscription_id,
                                *id,
                                interval,
                            );
                        }
                    }
                }
            }
        }
        response
    }

    /// DeleteMonitoredItems plus sampling callback teardown.
    pub fn delete_monitored_items(
        &self,
        session_id: u32,
        request: &DeleteMonitoredItemsRequest,
    ) -> DeleteMonitoredItemsResponse {
        let response = {
            let mut core = self.inner.core.write();
            services::monitored_items::delete_monitored_items(&mut core, session_id, request)
        };
        let mut timers = self.inner.timers.lock();
        for (id, result) in request.monitored_item_ids.iter().zip(&response.results) {
            if result.is_good() {
                timers
                    .sampling
                    .remove(&(session_id, request.subscription_id, *id));
            }
        }
        response
    }
}

fn publish_tick(weak: &Weak<ServerInner>, session_id: u32, subscription_id: u32) {
    let Some(inner) = weak.upgrade() else {
        return;
    };
    let gone = {
        let mut core = inner.core.write();
        core.subscription_publish_tick(session_id, subscription_id);
        core.session(session_id)
            .map(|s| !s.subscriptions.contains_key(&subscription_id))
            .unwrap_or(true)
    };
    if gone {
        // The subscription expired or the session closed underneath us;
        // drop the callbacks
        debug!(
            "Removing timers of subscription {} after expiry",
            subscription_id
        );
        let mut timers = inner.timers.lock();
        timers.publish.remove(&(session_id, subscription_id));
        timers
            .sampling
            .retain(|(s, sub, _), _| !(*s == session_id && *sub == subscription_id));
    }
}

fn sample_tick(
    weak: &Weak<ServerInner>,
    session_id: u32,
    subscription_id: u32,
    monitored_item_id: u32,
) {
    let Some(inner) = weak.upgrade() else {
        return;
    };
    inner
        .core
        .write()
        .monitored_item_sample_tick(session_id, subscription_id, monitored_item_id);
}
