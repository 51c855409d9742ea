//! Delivery of observer notifications on a dedicated task.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::observer::{ObserverBridge, ObserverEvent, ObserverSender};

/// Drains the observer channel and invokes the bridge, one event at a time.
pub struct ObserverDispatcher {
    rx: mpsc::UnboundedReceiver<ObserverEvent>,
    observer: Arc<dyn ObserverBridge>,
}

impl ObserverDispatcher {
    pub fn new(
        rx: mpsc::UnboundedReceiver<ObserverEvent>,
        observer: Arc<dyn ObserverBridge>,
    ) -> Self {
        Self { rx, observer }
    }

    /// Create a channel and spawn a dispatcher for `observer` on the current runtime.
    pub fn spawn(
        observer: Arc<dyn ObserverBridge>,
        shutdown: broadcast::Receiver<()>,
    ) -> (ObserverSender, JoinHandle<()>) {
        let (sender, rx) = ObserverSender::channel();
        let handle = tokio::spawn(Self::new(rx, observer).run(shutdown));
        (sender, handle)
    }

    /// Deliver notifications until shutdown or until every sender is gone.
    ///
    /// Records hold senders, so an observer that retains records keeps the
    /// channel open; shutdown is the normal way to stop. Events already queued
    /// at shutdown are still delivered.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        let mut delivered = 0u64;
        loop {
            tokio::select! {
                event = self.rx.recv() => match event {
                    Some(event) => {
                        self.deliver(event);
                        delivered += 1;
                    }
                    None => break,
                },
                _ = shutdown.recv() => {
                    while let Ok(event) = self.rx.try_recv() {
                        self.deliver(event);
                        delivered += 1;
                    }
                    break;
                }
            }
        }
        tracing::debug!(delivered, "Observer dispatcher stopped");
    }

    fn deliver(&self, event: ObserverEvent) {
        match event {
            ObserverEvent::Added(record) => self.observer.session_added(record),
            ObserverEvent::Changed(record) => self.observer.session_changed(record),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;
    use crate::session::{SessionHandle, SessionRecord, SessionStore};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<(&'static str, u64)>>,
    }

    impl ObserverBridge for Recorder {
        fn session_added(&self, record: Arc<SessionRecord>) {
            self.events.lock().unwrap().push(("added", record.handle().0));
        }

        fn session_changed(&self, record: Arc<SessionRecord>) {
            self.events.lock().unwrap().push(("changed", record.handle().0));
        }
    }

    #[tokio::test]
    async fn test_dispatch_preserves_order() {
        let shutdown = Shutdown::new();
        let recorder = Arc::new(Recorder::default());
        let (sender, task) = ObserverDispatcher::spawn(recorder.clone(), shutdown.subscribe());

        let store = SessionStore::new(sender.clone());
        let record = store.create_and_register(SessionHandle(1)).unwrap();
        sender.session_added(record.clone());
        record.notify_changed();
        record.notify_changed();

        shutdown.trigger();
        task.await.unwrap();

        let events = recorder.events.lock().unwrap();
        assert_eq!(*events, vec![("added", 1), ("changed", 1), ("changed", 1)]);
    }

    #[tokio::test]
    async fn test_stops_when_senders_dropped() {
        let shutdown = Shutdown::new();
        let recorder = Arc::new(Recorder::default());
        let (sender, task) = ObserverDispatcher::spawn(recorder.clone(), shutdown.subscribe());

        drop(sender);
        task.await.unwrap();
        assert!(recorder.events.lock().unwrap().is_empty());
    }
}
