//! Page-to-host message routing.
//!
//! Pages post named string messages to the host. Handlers are registered per message name;
//! anything without a handler goes to the optional fallback.

use crate::events::HostMessage;
use std::collections::HashMap;

pub type MessageHandler = Box<dyn FnMut(&HostMessage) + Send>;

#[derive(Default)]
pub struct MessageRegistry {
    handlers: HashMap<String, MessageHandler>,
    unhandled: Option<MessageHandler>,
}

impl MessageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `message`, replacing any previous handler for it.
    pub fn register<F>(&mut self, message: impl Into<String>, handler: F)
    where
        F: FnMut(&HostMessage) + Send + 'static,
    {
        self.handlers.insert(message.into(), Box::new(handler));
    }

    /// Returns true when a handler was removed.
    pub fn unregister(&mut self, message: &str) -> bool {
        self.handlers.remove(message).is_some()
    }

    pub fn set_unhandled<F>(&mut self, handler: F)
    where
        F: FnMut(&HostMessage) + Send + 'static,
    {
        self.unhandled = Some(Box::new(handler));
    }

    pub fn is_registered(&self, message: &str) -> bool {
        self.handlers.contains_key(message)
    }

    /// Routes a message. Returns false when neither a handler nor a fallback took it.
    pub fn dispatch(&mut self, msg: &HostMessage) -> bool {
        if let Some(handler) = self.handlers.get_mut(&msg.message) {
            handler(msg);
            return true;
        }
        match self.unhandled.as_mut() {
            Some(fallback) => {
                fallback(msg);
                true
            }
            None => {
                log::debug!("no handler for page message {:?} from {}", msg.message, msg.origin);
                false
            }
        }
    }
}

impl std::fmt::Debug for MessageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageRegistry")
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .field("unhandled", &self.unhandled.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn routes_to_registered_handler() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut registry = MessageRegistry::new();
        let sink = seen.clone();
        registry.register("ping", move |m| sink.lock().unwrap().push(m.origin.clone()));

        assert!(registry.dispatch(&HostMessage::new("ping", "https://a.test/", "host")));
        assert_eq!(*seen.lock().unwrap(), vec!["https://a.test/".to_string()]);
    }

    #[test]
    fn falls_back_when_unregistered() {
        let fallback = Arc::new(Mutex::new(0));
        let mut registry = MessageRegistry::new();
        registry.register("ping", |_| {});
        assert!(registry.unregister("ping"));
        assert!(!registry.unregister("ping"));

        assert!(!registry.dispatch(&HostMessage::new("ping", "o", "t")));

        let count = fallback.clone();
        registry.set_unhandled(move |_| *count.lock().unwrap() += 1);
        assert!(registry.dispatch(&HostMessage::new("ping", "o", "t")));
        assert_eq!(*fallback.lock().unwrap(), 1);
    }
}
