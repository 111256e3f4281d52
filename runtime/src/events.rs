use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::mpsc::Sender;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UiEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    pub node_type: String,
    pub event: String,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    pub data: Value,
}

pub trait EventEmitter: Send + Sync {
    fn emit(&self, event: UiEvent);
}

/// Where a bound event goes. The shape is fixed when the handler is
/// registered, so dispatch never has to inspect it.
#[derive(Clone)]
pub enum EventHandler {
    Callable(Arc<dyn Fn(UiEvent) + Send + Sync>),
    Sink(Sender<UiEvent>),
    Emitter(Arc<dyn EventEmitter>),
}

impl EventHandler {
    pub fn callable<F>(handler: F) -> Self
    where
        F: Fn(UiEvent) + Send + Sync + 'static,
    {
        Self::Callable(Arc::new(handler))
    }

    pub fn dispatch(&self, event: UiEvent) {
        match self {
            Self::Callable(handler) => handler(event),
            Self::Sink(tx) => {
                let action = event.action.clone();
                if tx.send(event).is_err() {
                    tracing::warn!(%action, "event sink disconnected; dropping event");
                }
            }
            Self::Emitter(emitter) => emitter.emit(event),
        }
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shape = match self {
            Self::Callable(_) => "Callable",
            Self::Sink(_) => "Sink",
            Self::Emitter(_) => "Emitter",
        };
        f.debug_tuple("EventHandler").field(&shape).finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ActionTable {
    handlers: HashMap<String, EventHandler>,
    fallback: Option<EventHandler>,
}

impl ActionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&mut self, action: impl Into<String>, handler: EventHandler) -> &mut Self {
        self.handlers.insert(action.into(), handler);
        self
    }

    pub fn set_fallback(&mut self, handler: EventHandler) -> &mut Self {
        self.fallback = Some(handler);
        self
    }

    pub fn resolve(&self, action: &str) -> Option<&EventHandler> {
        self.handlers.get(action).or(self.fallback.as_ref())
    }
}
