//! Tenant-scoped fan-out of live payment events.
//!
//! Every connection owns a bounded queue. Publishing never waits on a slow connection: a full
//! queue loses that one event for that one connection, and a closed queue removes the
//! connection from the registry.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

use crate::domain::PaymentEvent;

pub const DEFAULT_TENANT: &str = "default";
/// Subscribing to this tenant id receives events for every tenant.
pub const WILDCARD_TENANT: &str = "*";

pub type ConnectionId = Uuid;
pub type EventReceiver = mpsc::Receiver<Arc<PaymentEvent>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    Unbound,
    Tenant(String),
    AllTenants,
}

impl Binding {
    /// Binding requested by a client. A missing or blank tenant id means the default tenant.
    pub fn requested(tenant_id: Option<&str>) -> Self {
        match tenant_id.map(str::trim).filter(|t| !t.is_empty()) {
            Some(WILDCARD_TENANT) => Binding::AllTenants,
            Some(tenant) => Binding::Tenant(tenant.to_string()),
            None => Binding::Tenant(DEFAULT_TENANT.to_string()),
        }
    }

    fn receives(&self, scope: Option<&str>) -> bool {
        match (self, scope) {
            (_, None) => true,
            (Binding::AllTenants, Some(_)) => true,
            (Binding::Tenant(bound), Some(tenant)) => bound == tenant,
            (Binding::Unbound, Some(_)) => false,
        }
    }
}

struct Subscriber {
    binding: Binding,
    sender: mpsc::Sender<Arc<PaymentEvent>>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub dropped: usize,
}

pub struct EventBroadcaster {
    subscribers: DashMap<ConnectionId, Subscriber>,
    buffer: usize,
}

impl EventBroadcaster {
    /// `buffer` is the per-connection queue capacity.
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: DashMap::new(),
            buffer: buffer.max(1),
        }
    }

    /// Registers a new, unbound connection.
    pub fn connect(&self) -> (ConnectionId, EventReceiver) {
        let id = Uuid::new_v4();
        (id, self.connect_with_id(id))
    }

    pub fn connect_with_id(&self, id: ConnectionId) -> EventReceiver {
        let (sender, receiver) = mpsc::channel(self.buffer);
        self.subscribers.insert(
            id,
            Subscriber {
                binding: Binding::Unbound,
                sender,
            },
        );
        tracing::info!(connection_id = %id, "subscriber connected");
        receiver
    }

    /// Replaces the connection's binding. Returns the new binding, or `None` for an unknown
    /// connection.
    pub fn subscribe(&self, id: ConnectionId, tenant_id: Option<&str>) -> Option<Binding> {
        let binding = Binding::requested(tenant_id);
        let mut subscriber = self.subscribers.get_mut(&id)?;
        subscriber.binding = binding.clone();
        tracing::info!(connection_id = %id, binding = ?binding, "subscriber bound");
        Some(binding)
    }

    /// Clears the binding only if it matches the requested tenant.
    pub fn unsubscribe(&self, id: ConnectionId, tenant_id: Option<&str>) -> bool {
        let requested = Binding::requested(tenant_id);
        match self.subscribers.get_mut(&id) {
            Some(mut subscriber) if subscriber.binding == requested => {
                subscriber.binding = Binding::Unbound;
                tracing::info!(connection_id = %id, "subscriber unbound");
                true
            }
            _ => false,
        }
    }

    pub fn disconnect(&self, id: ConnectionId) -> bool {
        let removed = self.subscribers.remove(&id).is_some();
        if removed {
            tracing::info!(connection_id = %id, "subscriber disconnected");
        }
        removed
    }

    pub fn binding(&self, id: ConnectionId) -> Option<Binding> {
        self.subscribers.get(&id).map(|s| s.binding.clone())
    }

    pub fn connection_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Delivers `event` to every connection bound to `tenant_id` plus wildcard subscribers.
    /// With no tenant the event goes to every connection.
    pub fn publish(&self, event: PaymentEvent, tenant_id: Option<&str>) -> DeliveryReport {
        let event = Arc::new(event);
        let mut report = DeliveryReport::default();
        let mut closed = Vec::new();

        for entry in self.subscribers.iter() {
            if !entry.binding.receives(tenant_id) {
                continue;
            }
            match entry.sender.try_send(Arc::clone(&event)) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    report.dropped += 1;
                    tracing::warn!(
                        connection_id = %entry.key(),
                        payment_id = %event.payment.id,
                        "subscriber queue full, event dropped"
                    );
                }
                Err(TrySendError::Closed(_)) => closed.push(*entry.key()),
            }
        }

        for id in closed {
            self.subscribers.remove(&id);
            tracing::debug!(connection_id = %id, "pruned closed subscriber");
        }

        tracing::debug!(
            tenant_id = tenant_id.unwrap_or("*"),
            delivered = report.delivered,
            dropped = report.dropped,
            "payment event published"
        );
        report
    }

    /// Drops every connection. Receivers observe the end of their stream.
    pub fn shutdown(&self) {
        let count = self.subscribers.len();
        self.subscribers.clear();
        tracing::info!(connections = count, "event broadcaster shut down");
    }
}
