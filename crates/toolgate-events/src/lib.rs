use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use toolgate_protocol::{EventType, ListenerId, ToolEvent, ToolEventKind};
use tracing::{debug, warn};

pub type Listener = Arc<dyn Fn(&ToolEvent) -> Result<()> + Send + Sync>;

#[derive(Clone, Debug)]
pub struct EventStreamHub {
    sender: broadcast::Sender<ToolEvent>,
}

impl EventStreamHub {
    pub fn new(buffer: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer.max(1));
        Self { sender }
    }

    pub fn publish(&self, event: ToolEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ToolEvent> {
        self.sender.subscribe()
    }

    pub fn subscribe_stream(&self) -> BroadcastStream<ToolEvent> {
        BroadcastStream::new(self.sender.subscribe())
    }
}

#[derive(Clone)]
struct ListenerEntry {
    id: ListenerId,
    filter: Option<EventType>,
    listener: Listener,
}

/// Typed publish/subscribe fan-out owned by one coordinator.
///
/// Listeners run synchronously in registration order. A listener returning
/// `Err` or panicking is logged and skipped; the remaining listeners still
/// receive the event. Async consumers use [`EventBus::subscribe`] instead.
#[derive(Clone)]
pub struct EventBus {
    listeners: Arc<RwLock<Vec<ListenerEntry>>>,
    next_id: Arc<AtomicU64>,
    stream: EventStreamHub,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventBus {
    pub fn new(buffer: usize) -> Self {
        Self {
            listeners: Arc::new(RwLock::new(Vec::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            stream: EventStreamHub::new(buffer),
        }
    }

    /// Attach a listener for one event type.
    pub fn on<F>(&self, event_type: EventType, listener: F) -> ListenerId
    where
        F: Fn(&ToolEvent) -> Result<()> + Send + Sync + 'static,
    {
        self.attach(Some(event_type), Arc::new(listener))
    }

    /// Attach a listener for every event.
    pub fn on_any<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ToolEvent) -> Result<()> + Send + Sync + 'static,
    {
        self.attach(None, Arc::new(listener))
    }

    fn attach(&self, filter: Option<EventType>, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push(ListenerEntry {
            id,
            filter,
            listener,
        });
        debug!(listener = %id, event_type = ?filter, "listener attached");
        id
    }

    /// Detach a listener. Returns false when the id is unknown.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|entry| entry.id != id);
        before != listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn emit(&self, kind: ToolEventKind) -> ToolEvent {
        let event = ToolEvent::new(kind);
        self.publish(event.clone());
        event
    }

    pub fn emit_all(&self, kinds: impl IntoIterator<Item = ToolEventKind>) {
        for kind in kinds {
            self.emit(kind);
        }
    }

    pub fn publish(&self, event: ToolEvent) {
        let event_type = event.event_type();
        // Snapshot so listeners may attach/detach or emit while we iterate.
        let targets: Vec<ListenerEntry> = self
            .listeners
            .read()
            .iter()
            .filter(|entry| entry.filter.is_none_or(|filter| filter == event_type))
            .cloned()
            .collect();

        for entry in targets {
            match catch_unwind(AssertUnwindSafe(|| (entry.listener)(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    warn!(listener = %entry.id, event_type = %event_type, %error, "event listener failed");
                }
                Err(_) => {
                    warn!(listener = %entry.id, event_type = %event_type, "event listener panicked");
                }
            }
        }

        self.stream.publish(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ToolEvent> {
        self.stream.subscribe()
    }

    pub fn subscribe_stream(&self) -> BroadcastStream<ToolEvent> {
        self.stream.subscribe_stream()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::{Result, bail};
    use futures_util::StreamExt;
    use parking_lot::Mutex;
    use toolgate_protocol::{EventType, ToolEventKind};

    use crate::EventBus;

    fn unregistered(name: &str) -> ToolEventKind {
        ToolEventKind::Unregistered {
            tool_name: name.to_owned(),
        }
    }

    #[test]
    fn typed_listener_only_receives_matching_events() {
        let bus = EventBus::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        bus.on(EventType::Unregistered, move |event| {
            sink.lock().push(event.tool_name().to_owned());
            Ok(())
        });

        bus.emit(unregistered("a"));
        bus.emit(ToolEventKind::RebindCompleted {
            tool_name: "b".to_owned(),
        });

        assert_eq!(*seen.lock(), vec!["a".to_owned()]);
    }

    #[test]
    fn failing_and_panicking_listeners_do_not_block_others() {
        let bus = EventBus::default();
        let count = Arc::new(Mutex::new(0_u32));

        bus.on_any(|_| bail!("listener broke"));
        bus.on_any(|_| panic!("listener exploded"));
        let sink = count.clone();
        bus.on_any(move |_| {
            *sink.lock() += 1;
            Ok(())
        });

        bus.emit(unregistered("a"));
        bus.emit(unregistered("b"));
        assert_eq!(*count.lock(), 2);
    }

    #[test]
    fn off_detaches_listener() {
        let bus = EventBus::default();
        let count = Arc::new(Mutex::new(0_u32));
        let sink = count.clone();
        let id = bus.on_any(move |_| {
            *sink.lock() += 1;
            Ok(())
        });

        bus.emit(unregistered("a"));
        assert!(bus.off(id));
        assert!(!bus.off(id));
        bus.emit(unregistered("b"));

        assert_eq!(*count.lock(), 1);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn listener_may_emit_reentrantly() {
        let bus = EventBus::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let inner = bus.clone();
        bus.on(EventType::Unregistered, move |event| {
            inner.emit(ToolEventKind::RebindCompleted {
                tool_name: event.tool_name().to_owned(),
            });
            Ok(())
        });
        let sink = seen.clone();
        bus.on(EventType::RebindCompleted, move |event| {
            sink.lock().push(event.tool_name().to_owned());
            Ok(())
        });

        bus.emit(unregistered("x"));
        assert_eq!(*seen.lock(), vec!["x".to_owned()]);
    }

    #[tokio::test]
    async fn async_subscribers_receive_published_events() -> Result<()> {
        let bus = EventBus::new(16);
        let mut receiver = bus.subscribe();
        let mut stream = bus.subscribe_stream();

        bus.emit(unregistered("a"));

        let received = receiver.recv().await?;
        assert_eq!(received.event_type(), EventType::Unregistered);
        let streamed = stream.next().await.expect("stream yields event")?;
        assert_eq!(streamed.event_id, received.event_id);
        Ok(())
    }
}
