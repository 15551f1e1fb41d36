// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

#![warn(missing_docs)]

//! The OPC UA server core runtime: the address-space node store, the
//! subscription engine with its monitored items and event filters, and
//! the asynchronous method call manager.
//!
//! The core consumes already-decoded service requests and produces typed
//! responses; transports, codecs and session authentication live in the
//! embedding application. Timers drive the engine through the [`runtime`]
//! wrapper, or a test drives the tick entry points on [`server::ServerCore`]
//! directly.

pub mod async_methods;
pub mod config;
pub mod events;
pub mod nodestore;
pub mod runtime;
pub mod server;
pub mod services;
pub mod session;
pub mod subscriptions;

#[cfg(test)]
mod tests;

pub use config::ServerConfig;
pub use runtime::Server;
pub use server::{HistoryNotifier, MonitoredItemRef, ServerCore};
pub use session::{ResponseSender, Session};
