//! The subscription engine: subscriptions, monitored items and their
//! notification queues.

pub mod monitored_item;
pub mod subscription;

pub use monitored_item::{MonitoredItem, MonitoredItemType, Notification, NotificationPayload};
pub use subscription::{PublishAction, Subscription, SubscriptionState};
