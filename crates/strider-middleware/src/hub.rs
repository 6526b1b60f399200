//! Kind-partitioned sensor fan-out.
//!
//! Subscribers register per [`SensorKind`] so every component only receives
//! the traffic it cares about:
//!
//! | Kind | Typical subscribers |
//! |---|---|
//! | [`SensorKind::Orientation`] | world model, gait engine |
//! | [`SensorKind::Button`] | world model |
//! | [`SensorKind::GameControl`] | world model |
//! | [`SensorKind::TeammateMsg`] | world model |
//! | [`SensorKind::JointFeedback`] | world model |
//! | [`SensorKind::CameraFrame`] | world model (ball ageing) |
//!
//! Delivery happens on the publisher's thread.  Subscribers must therefore
//! be cheap: copy the payload under a short lock and return.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use strider_types::{SensorEvent, SensorKind};
use tracing::trace;

/// Receiver side of the hub.
pub trait SensorSubscriber: Send + Sync {
    /// Handle one event.  Must not block on I/O.
    fn on_sensor_event(&self, event: &SensorEvent);
}

/// Shared sensor hub.  Wrap in an [`Arc`] and hand a clone to every reader
/// thread.
#[derive(Default)]
pub struct SensorHub {
    subscribers: RwLock<HashMap<SensorKind, Vec<Arc<dyn SensorSubscriber>>>>,
}

impl SensorHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `subscriber` to `kind`.  Attaching the same subscriber twice
    /// delivers each event twice.
    pub fn attach(&self, kind: SensorKind, subscriber: Arc<dyn SensorSubscriber>) {
        self.subscribers.write().entry(kind).or_default().push(subscriber);
    }

    /// Attach `subscriber` to every kind.
    pub fn attach_all(&self, subscriber: Arc<dyn SensorSubscriber>) {
        let mut subscribers = self.subscribers.write();
        for kind in SensorKind::ALL {
            subscribers.entry(kind).or_default().push(Arc::clone(&subscriber));
        }
    }

    /// Remove every registration of `subscriber` for `kind`.  Identity is
    /// pointer equality of the `Arc`.
    pub fn detach(&self, kind: SensorKind, subscriber: &Arc<dyn SensorSubscriber>) {
        if let Some(list) = self.subscribers.write().get_mut(&kind) {
            list.retain(|s| !Arc::ptr_eq(s, subscriber));
        }
    }

    /// Remove every registration of `subscriber` for all kinds.
    pub fn detach_all(&self, subscriber: &Arc<dyn SensorSubscriber>) {
        for list in self.subscribers.write().values_mut() {
            list.retain(|s| !Arc::ptr_eq(s, subscriber));
        }
    }

    /// Deliver `event` to every subscriber of its kind.
    ///
    /// Returns the number of subscribers that received it.  Publishing with
    /// no subscribers is a normal condition (sensors may start before the
    /// consumers are wired).
    pub fn publish(&self, event: SensorEvent) -> usize {
        let kind = event.kind();
        // Clone the list so callbacks run without holding the registry lock.
        let targets: Vec<Arc<dyn SensorSubscriber>> = self
            .subscribers
            .read()
            .get(&kind)
            .cloned()
            .unwrap_or_default();
        for subscriber in &targets {
            subscriber.on_sensor_event(&event);
        }
        trace!(kind = ?kind, source = %event.source, delivered = targets.len(), "sensor event published");
        targets.len()
    }

    /// Number of subscribers currently attached to `kind`.
    pub fn subscriber_count(&self, kind: SensorKind) -> usize {
        self.subscribers.read().get(&kind).map_or(0, Vec::len)
    }
}
