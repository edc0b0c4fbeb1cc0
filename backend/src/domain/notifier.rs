use std::sync::Arc;

use shared::{Event, EventKind};

use crate::domain::hub::EventHub;

/// Pushes a change signal to the hub after every committed mutation.
///
/// The signal is deliberately bare: viewers re-fetch the aggregates
/// themselves instead of receiving them inline.
#[derive(Clone)]
pub struct ChangeNotifier {
    hub: Arc<EventHub>,
}

impl ChangeNotifier {
    pub fn new(hub: Arc<EventHub>) -> Self {
        Self { hub }
    }

    /// Tell every connected viewer that the aggregates changed.
    pub fn notify_reload(&self) {
        self.notify(EventKind::Reload);
    }

    pub fn notify(&self, kind: EventKind) {
        self.hub.broadcast(&Event::new(kind));
    }
}
