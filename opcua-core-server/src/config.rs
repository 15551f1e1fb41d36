//! Server configuration, loadable from yaml.

use serde::{Deserialize, Serialize};

/// Bounds the subscription engine revises client requests against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionLimits {
    /// Lower bound on the publishing interval in ms.
    pub min_publishing_interval_ms: f64,
    /// Upper bound on the publishing interval in ms.
    pub max_publishing_interval_ms: f64,
    /// Lower bound on the keepalive count.
    pub min_keep_alive_count: u32,
    /// Upper bound on the keepalive count.
    pub max_keep_alive_count: u32,
    /// Upper bound on the lifetime count. The lower bound is derived as
    /// three times the revised keepalive count.
    pub max_lifetime_count: u32,
    /// Cap on notifications in one publish response. 0 means unlimited.
    pub max_notifications_per_publish: u32,
    /// Cap on the retransmission queue per subscription.
    pub max_retransmission_queue_size: usize,
    /// Cap on queued publish requests per session.
    pub max_publish_requests_per_session: usize,
    /// Cap on subscriptions per session.
    pub max_subscriptions_per_session: usize,
    /// Cap on monitored items per subscription.
    pub max_monitored_items_per_subscription: usize,
    /// Lower bound on the sampling interval in ms.
    pub min_sampling_interval_ms: f64,
    /// Upper bound on a monitored item queue.
    pub max_queue_size: usize,
}

impl Default for SubscriptionLimits {
    fn default() -> Self {
        SubscriptionLimits {
            min_publishing_interval_ms: 5.0,
            max_publishing_interval_ms: 3_600_000.0,
            min_keep_alive_count: 1,
            max_keep_alive_count: 10_000,
            max_lifetime_count: 60_000,
            max_notifications_per_publish: 1_000,
            max_retransmission_queue_size: 10,
            max_publish_requests_per_session: 10,
            max_subscriptions_per_session: 100,
            max_monitored_items_per_subscription: 10_000,
            min_sampling_interval_ms: 5.0,
            max_queue_size: 100,
        }
    }
}

/// Bounds on the async method machinery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsyncOperationLimits {
    /// How long an operation may sit in the request queue or with a worker
    /// before it is reported `BadRequestTimeout`, in ms. 0 disables the
    /// timeout.
    pub operation_timeout_ms: f64,
    /// Cap on queued operations. 0 means unlimited.
    pub max_queue_size: usize,
    /// How long a whole call may stay unfinished before the aggregate is
    /// flushed as-is, in ms.
    pub call_request_timeout_ms: f64,
}

impl Default for AsyncOperationLimits {
    fn default() -> Self {
        AsyncOperationLimits {
            operation_timeout_ms: 60_000.0,
            max_queue_size: 100,
            call_request_timeout_ms: 120_000.0,
        }
    }
}

/// Per-call operation caps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationalLimits {
    /// Cap on operations (reads, writes, browse descriptions, monitored
    /// items, ...) in one service call. 0 means unlimited.
    pub max_operations_per_call: usize,
}

impl Default for OperationalLimits {
    fn default() -> Self {
        OperationalLimits {
            max_operations_per_call: 10_000,
        }
    }
}

/// The server configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerConfig {
    /// The application name, informational only.
    pub application_name: String,
    /// Session timeout in ms when the client does not request one.
    pub default_session_timeout_ms: f64,
    /// Subscription engine limits.
    pub subscriptions: SubscriptionLimits,
    /// Async method limits.
    pub async_operations: AsyncOperationLimits,
    /// Per-call operation caps.
    pub operational: OperationalLimits,
}

impl opcua_base::config::Config for ServerConfig {
    fn is_valid(&self) -> bool {
        self.subscriptions.min_publishing_interval_ms > 0.0
            && self.subscriptions.min_publishing_interval_ms
                <= self.subscriptions.max_publishing_interval_ms
            && self.subscriptions.min_keep_alive_count <= self.subscriptions.max_keep_alive_count
            && self.subscriptions.max_queue_size > 0
            && self.subscriptions.min_sampling_interval_ms > 0.0
    }
}

impl ServerConfig {
    /// A configuration with sensible defaults for tests and embedding.
    pub fn new(application_name: impl Into<String>) -> ServerConfig {
        ServerConfig {
            application_name: application_name.into(),
            default_session_timeout_ms: 60_000.0,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opcua_base::config::Config;

    #[test]
    fn default_config_is_valid() {
        assert!(ServerConfig::new("test").is_valid());
    }

    #[test]
    fn inverted_interval_bounds_are_invalid() {
        let mut config = ServerConfig::new("test");
        config.subscriptions.min_publishing_interval_ms = 10_000.0;
        config.subscriptions.max_publishing_interval_ms = 10.0;
        assert!(!config.is_valid());
    }
}
