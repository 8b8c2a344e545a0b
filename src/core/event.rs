//! Modem events and listener dispatch
//!
//! Unsolicited lines are turned into [`ModemEvent`]s by the classifier and
//! handed to an [`EventBus`]. Listeners are registered per [`EventKind`] and
//! invoked synchronously, in registration order, on the engine task. Every
//! event is also published on a broadcast channel for async consumers.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Why a call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HangUpReason {
    /// Remote party busy
    Busy,
    /// Carrier lost, usually the remote party hung up
    NoCarrier,
    /// Remote party did not answer
    NoAnswer,
    /// No dial tone
    NoDialtone,
    /// We hung up
    Local,
}

impl HangUpReason {
    /// Modem result text for this reason
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Busy => "BUSY",
            Self::NoCarrier => "NO CARRIER",
            Self::NoAnswer => "NO ANSWER",
            Self::NoDialtone => "NO DIALTONE",
            Self::Local => "LOCAL",
        }
    }
}

impl fmt::Display for HangUpReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unsolicited modem event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ModemEvent {
    /// Incoming call, with the caller number once `+CLIP` reports it
    Ring {
        /// Caller number
        number: Option<String>,
    },
    /// New message stored at `index` (`+CMTI`)
    NewSms {
        /// Storage index
        index: u32,
    },
    /// Message received; reserved, not produced by the classifier
    SmsReceived {
        /// Storage index
        index: u32,
    },
    /// Call ended
    HangUp {
        /// Reason, if known
        reason: Option<HangUpReason>,
    },
    /// Status line such as `CALL READY` or `POWER DOWN`
    Common {
        /// Event name
        name: String,
        /// Optional payload
        payload: Option<String>,
    },
}

impl ModemEvent {
    /// Status event without payload
    pub fn common(name: &str) -> Self {
        Self::Common {
            name: name.to_string(),
            payload: None,
        }
    }

    /// Tag of this event
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Ring { .. } => EventKind::Ring,
            Self::NewSms { .. } => EventKind::NewSms,
            Self::SmsReceived { .. } => EventKind::SmsReceived,
            Self::HangUp { .. } => EventKind::HangUp,
            Self::Common { .. } => EventKind::Common,
        }
    }
}

impl fmt::Display for ModemEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ring { number: Some(n) } => write!(f, "RING from {n}"),
            Self::Ring { number: None } => write!(f, "RING"),
            Self::NewSms { index } => write!(f, "New SMS #{index}"),
            Self::SmsReceived { index } => write!(f, "SMS received #{index}"),
            Self::HangUp { reason: Some(r) } => write!(f, "Hang up ({r})"),
            Self::HangUp { reason: None } => write!(f, "Hang up"),
            Self::Common { name, payload: Some(p) } => write!(f, "{name}: {p}"),
            Self::Common { name, payload: None } => write!(f, "{name}"),
        }
    }
}

/// Event tag used as the listener key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// [`ModemEvent::Ring`]
    Ring,
    /// [`ModemEvent::NewSms`]
    NewSms,
    /// [`ModemEvent::SmsReceived`]
    SmsReceived,
    /// [`ModemEvent::HangUp`]
    HangUp,
    /// [`ModemEvent::Common`]
    Common,
}

/// Handle returned by listener registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

type Listener = Arc<dyn Fn(&ModemEvent) + Send + Sync>;
type LineHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Listener registry and dispatcher
pub struct EventBus {
    listeners: RwLock<HashMap<EventKind, Vec<(ListenerId, Listener)>>>,
    unrecognized: RwLock<Vec<(ListenerId, LineHook)>>,
    tx: broadcast::Sender<ModemEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Create an empty bus
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self {
            listeners: RwLock::new(HashMap::new()),
            unrecognized: RwLock::new(Vec::new()),
            tx,
        }
    }

    /// Register a listener for one kind of event
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&ModemEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(Uuid::new_v4());
        self.listeners
            .write()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    /// Register a hook for lines dropped while no command is pending
    pub fn on_unrecognized<F>(&self, hook: F) -> ListenerId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let id = ListenerId(Uuid::new_v4());
        self.unrecognized.write().push((id, Arc::new(hook)));
        id
    }

    /// Remove a listener or hook. Returns false if it was not registered.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut removed = false;
        for list in self.listeners.write().values_mut() {
            let before = list.len();
            list.retain(|(lid, _)| *lid != id);
            removed |= list.len() != before;
        }
        let mut hooks = self.unrecognized.write();
        let before = hooks.len();
        hooks.retain(|(lid, _)| *lid != id);
        removed || hooks.len() != before
    }

    /// Number of listeners registered for `kind`
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.read().get(&kind).map_or(0, Vec::len)
    }

    /// Subscribe to every event
    pub fn subscribe(&self) -> broadcast::Receiver<ModemEvent> {
        self.tx.subscribe()
    }

    /// Deliver an event to the listeners of its kind, then to subscribers
    pub fn emit(&self, event: &ModemEvent) {
        // Listeners run outside the lock so they may register or remove others
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .get(&event.kind())
            .map(|list| list.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default();

        tracing::debug!(kind = ?event.kind(), listeners = listeners.len(), "Event: {}", event);

        for listener in listeners {
            listener(event);
        }
        let _ = self.tx.send(event.clone());
    }

    /// Report a dropped line to the diagnostic hooks
    pub fn emit_unrecognized(&self, line: &str) {
        let hooks: Vec<LineHook> = self
            .unrecognized
            .read()
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();
        for hook in hooks {
            hook(line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_dispatch_in_registration_order() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let seen = seen.clone();
            bus.on(EventKind::Ring, move |_| seen.lock().push(tag));
        }

        bus.emit(&ModemEvent::Ring { number: None });
        assert_eq!(*seen.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_dispatch_only_to_matching_kind() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s = seen.clone();
        bus.on(EventKind::NewSms, move |e| s.lock().push(e.clone()));

        bus.emit(&ModemEvent::Ring { number: None });
        bus.emit(&ModemEvent::NewSms { index: 7 });

        assert_eq!(*seen.lock(), vec![ModemEvent::NewSms { index: 7 }]);
    }

    #[test]
    fn test_off_removes_listener() {
        let bus = EventBus::new();
        let id = bus.on(EventKind::HangUp, |_| {});
        assert_eq!(bus.listener_count(EventKind::HangUp), 1);
        assert!(bus.off(id));
        assert_eq!(bus.listener_count(EventKind::HangUp), 0);
        assert!(!bus.off(id));
    }

    #[test]
    fn test_listener_may_register_during_dispatch() {
        let bus = Arc::new(EventBus::new());
        let inner = bus.clone();
        bus.on(EventKind::Common, move |_| {
            inner.on(EventKind::Common, |_| {});
        });
        bus.emit(&ModemEvent::common("CALL READY"));
        assert_eq!(bus.listener_count(EventKind::Common), 2);
    }

    #[test]
    fn test_unrecognized_hook() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        bus.on_unrecognized(move |line| s.lock().push(line.to_string()));

        bus.emit_unrecognized("+CUSD: 0");
        assert_eq!(*seen.lock(), vec!["+CUSD: 0".to_string()]);
    }

    #[tokio::test]
    async fn test_subscribe_receives_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.emit(&ModemEvent::HangUp {
            reason: Some(HangUpReason::Busy),
        });
        assert_eq!(
            rx.recv().await.unwrap(),
            ModemEvent::HangUp {
                reason: Some(HangUpReason::Busy)
            }
        );
    }

    #[test]
    fn test_display() {
        let event = ModemEvent::Ring {
            number: Some("+15551234567".into()),
        };
        assert_eq!(event.to_string(), "RING from +15551234567");
        assert_eq!(ModemEvent::common("SMS READY").to_string(), "SMS READY");
    }
}
