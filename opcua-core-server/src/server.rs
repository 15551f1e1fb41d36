//! The server core context: one value owning the node store, the sessions
//! with their subscriptions, the type tree and the async method manager.
//! Every service call and timer callback receives this context explicitly;
//! there are no global singletons.

use std::sync::Arc;
use std::time::Instant;

use hashbrown::HashMap;
use tracing::{debug, error, warn};

use opcua_base::handle::AtomicHandle;
use opcua_nodes::{
    EventNotifier, NodeType, ObjectBuilder, Reference, TypeTree, VariableBuilder,
};
use opcua_types::{
    AttributeId, ByteString, DataTypeId, DataValue, DateTime, EventFieldList, NodeClass, NodeId,
    NumericRange, ObjectId, ObjectTypeId, QualifiedName, ReferenceTypeId, StatusCode, Variant,
    VariableTypeId,
};

use crate::async_methods::AsyncMethodManager;
use crate::config::ServerConfig;
use crate::events::{filter_event, FilterTarget};
use crate::nodestore::NodeStore;
use crate::services::view::{browse_simplified_path, is_node_in_tree};
use crate::session::{ResponseSender, Session};
use crate::subscriptions::monitored_item::MonitoredItemType;

/// Addresses one monitored item across the session and subscription
/// registries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitoredItemRef {
    /// The owning session.
    pub session_id: u32,
    /// The owning subscription.
    pub subscription_id: u32,
    /// The item.
    pub monitored_item_id: u32,
}

/// Hook for persisting events. The core calls it per emitting node; there
/// is no backend in this crate.
pub trait HistoryNotifier: Send + Sync {
    /// An event passed through the given emitter.
    fn store_event(&self, origin: &NodeId, emitter: &NodeId, fields: &EventFieldList);
}

/// The server core.
pub struct ServerCore {
    /// The active configuration.
    pub config: ServerConfig,
    /// The address space.
    pub nodestore: NodeStore,
    /// The HasSubtype hierarchy over types.
    pub type_tree: TypeTree,
    /// The async method manager.
    pub async_methods: AsyncMethodManager,
    sessions: HashMap<u32, Session>,
    session_handle: AtomicHandle,
    subscription_id_handle: AtomicHandle,
    /// Monitored items listening for events, per monitored node.
    event_listeners: HashMap<NodeId, Vec<MonitoredItemRef>>,
    history: Option<Box<dyn HistoryNotifier>>,
}

impl ServerCore {
    /// A core with an empty address space. The standard reference type
    /// hierarchy and the event type roots are registered in the type tree
    /// so traversal and filtering work before any nodes are imported.
    pub fn new(config: ServerConfig) -> ServerCore {
        let async_methods = AsyncMethodManager::new(config.async_operations.clone());
        let mut type_tree = TypeTree::new();
        register_base_types(&mut type_tree);
        ServerCore {
            config,
            nodestore: NodeStore::new(),
            type_tree,
            async_methods,
            sessions: HashMap::new(),
            session_handle: AtomicHandle::new(1),
            subscription_id_handle: AtomicHandle::new(1),
            event_listeners: HashMap::new(),
            history: None,
        }
    }

    /// Install the history hook.
    pub fn set_history_notifier(&mut self, notifier: Box<dyn HistoryNotifier>) {
        self.history = Some(notifier);
    }

    /// Create a session. The channel is attached separately once the
    /// transport has one.
    pub fn create_session(&mut self, name: impl Into<String>) -> u32 {
        let id = self.session_handle.next();
        let session = Session::new(id, name, self.config.default_session_timeout_ms);
        self.sessions.insert(id, session);
        debug!("Session {} created", id);
        id
    }

    /// Attach a response channel to a session.
    pub fn attach_channel(&mut self, session_id: u32, channel: Arc<dyn ResponseSender>) {
        if let Some(session) = self.sessions.get_mut(&session_id) {
            session.attach_channel(channel);
        }
    }

    /// The next server wide subscription id.
    pub fn next_subscription_id(&self) -> u32 {
        self.subscription_id_handle.next()
    }

    /// A session by id.
    pub fn session(&self, session_id: u32) -> Option<&Session> {
        self.sessions.get(&session_id)
    }

    /// A session by id, mutably.
    pub fn session_mut(&mut self, session_id: u32) -> Option<&mut Session> {
        self.sessions.get_mut(&session_id)
    }

    /// Close a session, cascading deletion of its subscriptions.
    pub fn close_session(&mut self, session_id: u32) {
        let Some(mut session) = self.sessions.remove(&session_id) else {
            return;
        };
        let subscription_ids: Vec<u32> = session.subscriptions.keys().copied().collect();
        for sub_id in subscription_ids {
            if let Some(sub) = session.remove_subscription(sub_id) {
                self.unregister_subscription_listeners(session_id, &sub);
            }
        }
        debug!("Session {} closed", session_id);
    }

    /// Expire sessions whose deadline passed, cascading like an explicit
    /// close.
    pub fn expire_sessions(&mut self, now: Instant) {
        let expired: Vec<u32> = self
            .sessions
            .iter()
            .filter(|(_, s)| s.is_expired(now))
            .map(|(id, _)| *id)
            .collect();
        for session_id in expired {
            warn!("Session {} timed out", session_id);
            self.close_session(session_id);
        }
    }

    /// Register an event monitored item with its node.
    pub(crate) fn register_event_listener(&mut self, node_id: NodeId, item: MonitoredItemRef) {
        self.event_listeners.entry(node_id).or_default().push(item);
    }

    /// Deregister an event monitored item.
    pub(crate) fn unregister_event_listener(&mut self, node_id: &NodeId, item: &MonitoredItemRef) {
        if let Some(listeners) = self.event_listeners.get_mut(node_id) {
            listeners.retain(|l| l != item);
            if listeners.is_empty() {
                self.event_listeners.remove(node_id);
            }
        }
    }

    /// Drop the event listener registrations of every item in a
    /// subscription that is going away.
    pub(crate) fn unregister_subscription_listeners(
        &mut self,
        session_id: u32,
        sub: &crate::subscriptions::subscription::Subscription,
    ) {
        for item in sub.monitored_items.values() {
            if item.item_type == MonitoredItemType::EventNotify {
                self.unregister_event_listener(
                    &item.monitored_node_id.clone(),
                    &MonitoredItemRef {
                        session_id,
                        subscription_id: sub.id,
                        monitored_item_id: item.id,
                    },
                );
            }
        }
    }

    /// Delete one subscription: detach its items, return in-flight
    /// notifications, and answer now-orphaned publish requests with
    /// `BadNoSubscription` when it was the session's last.
    pub fn delete_subscription(
        &mut self,
        session_id: u32,
        subscription_id: u32,
    ) -> StatusCode {
        let Some(session) = self.sessions.get_mut(&session_id) else {
            return StatusCode::BadSessionIdInvalid;
        };
        let Some(sub) = session.remove_subscription(subscription_id) else {
            return StatusCode::BadSubscriptionIdInvalid;
        };
        let last = session.subscriptions.is_empty();
        if last {
            session.answer_publish_requests_no_subscription();
        }
        self.unregister_subscription_listeners(session_id, &sub);
        debug!(
            "Session {} | Subscription {} deleted",
            session_id, subscription_id
        );
        StatusCode::Good
    }

    /// The publish callback of one subscription, fired every publishing
    /// interval. Deletes the subscription when its lifetime is exceeded,
    /// delivering a `BadTimeout` status change if a response slot exists.
    pub fn subscription_publish_tick(&mut self, session_id: u32, subscription_id: u32) {
        let Some(session) = self.sessions.get_mut(&session_id) else {
            return;
        };
        let expired = session.subscription_publish_tick(subscription_id, DateTime::now());
        if expired {
            session.send_status_change(subscription_id, StatusCode::BadTimeout);
            self.delete_subscription(session_id, subscription_id);
        }
    }

    /// The sampling callback of one data change monitored item.
    pub fn monitored_item_sample_tick(
        &mut self,
        session_id: u32,
        subscription_id: u32,
        monitored_item_id: u32,
    ) {
        let ServerCore {
            nodestore,
            sessions,
            ..
        } = self;
        let Some(session) = sessions.get_mut(&session_id) else {
            return;
        };
        let Some(sub) = session.subscriptions.get_mut(&subscription_id) else {
            return;
        };
        let reported = {
            let Some(item) = sub.monitored_item_mut(monitored_item_id) else {
                return;
            };
            if item.item_type != MonitoredItemType::DataChange
                || item.monitoring_mode == opcua_types::MonitoringMode::Disabled
            {
                return;
            }
            let value = crate::services::attribute::read_attribute_value(
                nodestore,
                &item.monitored_node_id,
                item.attribute_id,
                &item.index_range,
                item.timestamps_to_return,
            );
            match item.sample(value) {
                Some(value) if item.monitoring_mode == opcua_types::MonitoringMode::Reporting => {
                    Some(value)
                }
                _ => None,
            }
        };
        if let Some(value) = reported {
            sub.enqueue_data_change(monitored_item_id, value);
        }
    }

    /// Sample every reporting monitored item watching the given node,
    /// called after a value write so changes surface without waiting for
    /// the next sampling interval.
    pub fn notify_value_changed(&mut self, node_id: &NodeId) {
        let mut items = Vec::new();
        for (session_id, session) in &self.sessions {
            for (sub_id, sub) in &session.subscriptions {
                for item in sub.monitored_items.values() {
                    if item.item_type == MonitoredItemType::DataChange
                        && &item.monitored_node_id == node_id
                    {
                        items.push((*session_id, *sub_id, item.id));
                    }
                }
            }
        }
        for (session_id, sub_id, item_id) in items {
            self.monitored_item_sample_tick(session_id, sub_id, item_id);
        }
    }

    /// The 50 ms async response drain.
    pub fn async_response_tick(&mut self) {
        for call in self.async_methods.response_tick() {
            self.send_completed_call(call);
        }
    }

    /// The 10 s async integrity sweep.
    pub fn async_integrity_tick(&mut self, now: Instant) {
        for call in self.async_methods.integrity_tick(now) {
            self.send_completed_call(call);
        }
    }

    pub(crate) fn send_completed_call(&mut self, call: crate::async_methods::CompletedCall) {
        let Some(session) = self.sessions.get(&call.session_id) else {
            warn!(
                "Async call response for request {} dropped, session {} is gone",
                call.request_id, call.session_id
            );
            return;
        };
        let Some(channel) = session.channel() else {
            warn!(
                "Async call response for request {} dropped, channel is gone",
                call.request_id
            );
            return;
        };
        channel.send_call_response(call.request_id, call.response);
    }

    /// Create an event node of the given type: an object with the standard
    /// property variables, ready for [`ServerCore::trigger_event`].
    pub fn create_event(&mut self, event_type: NodeId) -> Result<NodeId, StatusCode> {
        let base_event_type: NodeId = ObjectTypeId::BaseEventType.into();
        if !self.type_tree.is_subtype_of(&event_type, &base_event_type) {
            error!("Event type must be a subtype of BaseEventType");
            return Err(StatusCode::BadInvalidArgument);
        }

        let mut event = ObjectBuilder::new(&NodeId::null(), "E", "E").build();
        event.base.insert_reference(Reference::forward(
            ReferenceTypeId::HasTypeDefinition,
            event_type.clone(),
        ));
        let event_id = self.nodestore.insert(event.into())?;

        let properties: [(&str, NodeId, Variant); 6] = [
            ("EventType", DataTypeId::NodeId.into(), event_type.into()),
            ("EventId", DataTypeId::ByteString.into(), Variant::Empty),
            ("SourceNode", DataTypeId::NodeId.into(), Variant::Empty),
            ("ReceiveTime", DataTypeId::DateTime.into(), Variant::Empty),
            ("Time", DataTypeId::DateTime.into(), DateTime::now().into()),
            ("Severity", DataTypeId::UInt16.into(), Variant::UInt16(0)),
        ];
        for (name, data_type, value) in properties {
            let mut prop = VariableBuilder::new(&NodeId::null(), name, name)
                .data_type(data_type)
                .build();
            if !value.is_empty() {
                prop.set_value(DataValue::new_now(value));
            }
            prop.base.insert_reference(Reference::forward(
                ReferenceTypeId::HasTypeDefinition,
                VariableTypeId::PropertyType.into(),
            ));
            prop.base.insert_reference(Reference::inverse(
                ReferenceTypeId::HasProperty,
                event_id.clone(),
            ));
            let prop_id = self.nodestore.insert(prop.into())?;
            self.nodestore.edit(&event_id, |node| {
                node.base_mut()
                    .insert_reference(Reference::forward(ReferenceTypeId::HasProperty, prop_id));
            })?;
        }
        Ok(event_id)
    }

    /// Set an event property's value through its browse path.
    pub fn write_event_property(
        &mut self,
        event_node: &NodeId,
        name: &str,
        value: Variant,
    ) -> Result<(), StatusCode> {
        let target = browse_simplified_path(self, event_node, &[QualifiedName::new(0, name)])?;
        self.nodestore.edit(&target, |node| {
            if let Some(variable) = node.as_variable_mut() {
                variable.set_value(DataValue::new_now(value));
            }
        })
    }

    /// Trigger an event: stamp the standard fields, compute the emitting
    /// nodes, filter the event into every listening monitored item, pass
    /// it to the history hook, and optionally delete the event node.
    /// Returns the generated EventId.
    pub fn trigger_event(
        &mut self,
        event_node_id: &NodeId,
        origin_node_id: &NodeId,
        delete_event_node: bool,
    ) -> Result<ByteString, StatusCode> {
        // The origin must exist and be reachable from the objects folder
        if self.nodestore.get(origin_node_id).is_none() {
            error!("Origin node for event does not exist");
            return Err(StatusCode::BadNotFound);
        }
        let objects_folder: NodeId = ObjectId::ObjectsFolder.into();
        let folder_refs: [NodeId; 2] = [
            ReferenceTypeId::Organizes.into(),
            ReferenceTypeId::HasComponent.into(),
        ];
        if !is_node_in_tree(self, origin_node_id, &objects_folder, &folder_refs) {
            error!("Node for event must be in the objects folder");
            return Err(StatusCode::BadInvalidArgument);
        }

        // Stamp the standard fields
        let event_id = ByteString::random_16();
        self.write_event_property(
            event_node_id,
            "SourceNode",
            origin_node_id.clone().into(),
        )?;
        self.write_event_property(event_node_id, "ReceiveTime", DateTime::now().into())?;
        self.write_event_property(event_node_id, "EventId", event_id.clone().into())?;

        // Events bubble upward over the hierarchical event references,
        // seeded with the origin and the server object which implicitly
        // emits everything
        let emit_refs: [NodeId; 4] = [
            ReferenceTypeId::Organizes.into(),
            ReferenceTypeId::HasComponent.into(),
            ReferenceTypeId::HasEventSource.into(),
            ReferenceTypeId::HasNotifier.into(),
        ];
        let emitters = self.upward_closure(
            &[origin_node_id.clone(), ObjectId::Server.into()],
            &emit_refs,
        );

        for emitter in &emitters {
            let Some(node) = self.nodestore.get(emitter) else {
                continue;
            };
            if node.node_class() != NodeClass::Object {
                continue;
            }
            let Some(listeners) = self.event_listeners.get(emitter) else {
                self.historize_event(origin_node_id, emitter, event_node_id);
                continue;
            };
            // Filter the event per listening item, then enqueue matches
            let mut deliveries = Vec::new();
            for listener in listeners.clone() {
                let Some(filter) = self.event_listener_filter(&listener) else {
                    continue;
                };
                match filter_event(self, event_node_id, &filter) {
                    Ok((fields, _)) => deliveries.push((listener, fields.event_fields)),
                    Err(status) if status == StatusCode::BadNoMatch => {}
                    Err(status) => {
                        warn!(
                            "Could not add the event to a listening node with StatusCode {}",
                            status
                        );
                    }
                }
            }
            for (listener, fields) in deliveries {
                if let Some(session) = self.sessions.get_mut(&listener.session_id) {
                    if let Some(sub) = session.subscriptions.get_mut(&listener.subscription_id) {
                        sub.enqueue_event(listener.monitored_item_id, fields);
                    }
                }
            }
            self.historize_event(origin_node_id, emitter, event_node_id);
        }

        if delete_event_node {
            crate::services::node_management::delete_node_with_children(self, event_node_id);
        }
        Ok(event_id)
    }

    fn event_listener_filter(
        &self,
        listener: &MonitoredItemRef,
    ) -> Option<opcua_types::EventFilter> {
        let session = self.sessions.get(&listener.session_id)?;
        let sub = session.subscriptions.get(&listener.subscription_id)?;
        let item = sub.monitored_item(listener.monitored_item_id)?;
        if item.monitoring_mode != opcua_types::MonitoringMode::Reporting {
            return None;
        }
        match &item.filter {
            opcua_types::MonitoringFilter::Event(filter) => Some(filter.clone()),
            _ => None,
        }
    }

    fn historize_event(&self, origin: &NodeId, emitter: &NodeId, event_node: &NodeId) {
        let Some(history) = &self.history else {
            return;
        };
        // The history hook receives the raw event fields of the standard
        // properties; a real backend would apply its own filter here
        let fields = EventFieldList {
            client_handle: 0,
            event_fields: vec![Variant::from(event_node.clone())],
        };
        history.store_event(origin, emitter, &fields);
    }

    /// The transitive closure of the given start nodes over the inverse
    /// direction of the given reference types (and their subtypes),
    /// including the start nodes themselves.
    pub fn upward_closure(&self, start: &[NodeId], reference_types: &[NodeId]) -> Vec<NodeId> {
        let mut visited: Vec<NodeId> = Vec::new();
        let mut stack: Vec<NodeId> = start.to_vec();
        while let Some(current) = stack.pop() {
            if visited.contains(&current) {
                continue;
            }
            visited.push(current.clone());
            let Some(node) = self.nodestore.get(&current) else {
                continue;
            };
            for reference in &node.base().references {
                if !reference.is_inverse || !reference.target_node_id.is_local() {
                    continue;
                }
                let matches = reference_types.iter().any(|rt| {
                    self.type_tree
                        .is_subtype_of(&reference.reference_type_id, rt)
                });
                if matches {
                    stack.push(reference.target_node_id.node_id.clone());
                }
            }
        }
        visited
    }
}

impl FilterTarget for ServerCore {
    fn read_attribute(
        &self,
        node_id: &NodeId,
        attribute_id: u32,
        index_range: &str,
    ) -> Result<Variant, StatusCode> {
        let attribute_id = AttributeId::from_u32(attribute_id)?;
        let range = NumericRange::parse(index_range)?;
        let node = self
            .nodestore
            .get(node_id)
            .ok_or(StatusCode::BadNodeIdUnknown)?;
        if attribute_id == AttributeId::Value {
            if let Some(variable) = node.as_variable() {
                let value = variable.read_value(&range);
                if !value.status().is_good() {
                    return Err(value.status());
                }
                return Ok(value.value.unwrap_or(Variant::Empty));
            }
        }
        node.get_attribute(attribute_id)
            .ok_or(StatusCode::BadAttributeIdInvalid)
    }

    fn resolve_browse_path(
        &self,
        origin: &NodeId,
        path: &[QualifiedName],
    ) -> Result<NodeId, StatusCode> {
        browse_simplified_path(self, origin, path)
    }

    fn is_subtype_of(&self, node: &NodeId, of: &NodeId) -> bool {
        self.type_tree.is_subtype_of(node, of)
    }

    fn subtypes_of(&self, type_id: &NodeId) -> Vec<NodeId> {
        self.type_tree.subtypes_of(type_id).cloned().collect()
    }
}

/// Register the standard reference type hierarchy and the event type roots
/// the engine itself depends on. Everything else about the type system is
/// supplied by the embedding application.
fn register_base_types(tree: &mut TypeTree) {
    use ReferenceTypeId::*;
    tree.add_subtype(References, HierarchicalReferences);
    tree.add_subtype(References, NonHierarchicalReferences);
    tree.add_subtype(HierarchicalReferences, HasChild);
    tree.add_subtype(HierarchicalReferences, Organizes);
    tree.add_subtype(HierarchicalReferences, HasEventSource);
    tree.add_subtype(HasChild, Aggregates);
    tree.add_subtype(HasChild, HasSubtype);
    tree.add_subtype(Aggregates, HasComponent);
    tree.add_subtype(Aggregates, HasProperty);
    tree.add_subtype(HasComponent, HasOrderedComponent);
    tree.add_subtype(HasEventSource, HasNotifier);
    tree.add_subtype(NonHierarchicalReferences, HasTypeDefinition);
    tree.add_subtype(NonHierarchicalReferences, HasModellingRule);
    tree.add_subtype(NonHierarchicalReferences, HasEncoding);
    tree.add_subtype(NonHierarchicalReferences, HasDescription);
    tree.add_subtype(NonHierarchicalReferences, GeneratesEvent);

    tree.add_subtype(ObjectTypeId::BaseObjectType, ObjectTypeId::BaseEventType);
    tree.add_subtype(ObjectTypeId::BaseObjectType, ObjectTypeId::FolderType);
    tree.add_subtype(ObjectTypeId::BaseEventType, ObjectTypeId::AuditEventType);
    tree.add_subtype(ObjectTypeId::BaseEventType, ObjectTypeId::SystemEventType);
    tree.add_subtype(ObjectTypeId::BaseEventType, ObjectTypeId::ProgressEventType);
    tree.add_subtype(
        ObjectTypeId::BaseEventType,
        ObjectTypeId::EventQueueOverflowEventType,
    );
    tree.add_subtype(ObjectTypeId::BaseEventType, ObjectTypeId::ConditionType);
}

/// Build the BaseEventType declaration with its standard property
/// declarations, so select clauses validate against the type hierarchy.
/// Embedders bringing their own nodeset skip this.
pub fn add_base_event_type(core: &mut ServerCore) {
    let type_id: NodeId = ObjectTypeId::BaseEventType.into();
    let mut event_type = opcua_nodes::ObjectTypeBuilder::new(&type_id, "BaseEventType", "BaseEventType")
        .is_abstract(true)
        .build();

    let properties: [(&str, NodeId); 7] = [
        ("EventId", DataTypeId::ByteString.into()),
        ("EventType", DataTypeId::NodeId.into()),
        ("SourceNode", DataTypeId::NodeId.into()),
        ("Time", DataTypeId::DateTime.into()),
        ("ReceiveTime", DataTypeId::DateTime.into()),
        ("Severity", DataTypeId::UInt16.into()),
        ("Message", DataTypeId::LocalizedText.into()),
    ];
    let mut property_ids = Vec::new();
    for (name, data_type) in properties {
        let mut prop = VariableBuilder::new(&NodeId::null(), name, name)
            .data_type(data_type)
            .build();
        prop.base.insert_reference(Reference::inverse(
            ReferenceTypeId::HasProperty,
            type_id.clone(),
        ));
        if let Ok(id) = core.nodestore.insert(prop.into()) {
            property_ids.push(id);
        }
    }
    for prop_id in property_ids {
        event_type
            .base
            .insert_reference(Reference::forward(ReferenceTypeId::HasProperty, prop_id));
    }
    let _ = core.nodestore.insert(event_type.into());
}

/// Build the minimal browse skeleton tests and embedders start from: the
/// objects folder and the server object below it.
pub fn add_server_object(core: &mut ServerCore) {
    let objects_id: NodeId = ObjectId::ObjectsFolder.into();
    let server_id: NodeId = ObjectId::Server.into();

    let mut objects = ObjectBuilder::new(&objects_id, "Objects", "Objects").build();
    objects.base.insert_reference(Reference::forward(
        ReferenceTypeId::HasTypeDefinition,
        ObjectTypeId::FolderType.into(),
    ));
    objects.base.insert_reference(Reference::forward(
        ReferenceTypeId::Organizes,
        server_id.clone(),
    ));

    let mut server = ObjectBuilder::new(&server_id, "Server", "Server")
        .event_notifier(EventNotifier::SUBSCRIBE_TO_EVENTS)
        .build();
    server.base.insert_reference(Reference::inverse(
        ReferenceTypeId::Organizes,
        objects_id.clone(),
    ));

    let _ = core.nodestore.insert(objects.into());
    let _ = core.nodestore.insert(server.into());
}

/// Access to all sessions, used by service dispatch and tests.
impl ServerCore {
    /// Iterate sessions.
    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    /// Find the session owning the given subscription.
    pub fn find_subscription_session(&self, subscription_id: u32) -> Option<u32> {
        self.sessions
            .iter()
            .find(|(_, s)| s.subscriptions.contains_key(&subscription_id))
            .map(|(id, _)| *id)
    }

    /// Look up a node type as [`NodeType`], for service helpers.
    pub fn node(&self, node_id: &NodeId) -> Option<&NodeType> {
        self.nodestore.get(node_id)
    }
}
