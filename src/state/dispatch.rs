//! Inbound message routing.
//!
//! The coordinator sends far more message types than we care about, so
//! anything without a registered handler is dropped quietly.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::error::HandlerError;
use crate::protocol::{message_name, Packet};

/// Handler invoked with the dispatch context and the packet being routed.
pub type Handler<C> = Box<dyn FnMut(&mut C, &Packet) -> Result<(), HandlerError> + Send>;

/// What happened to a dispatched packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    Handled,
    Dropped,
}

/// Persistent `type_id → handler` table, built once at startup.
pub struct Dispatcher<C> {
    handlers: HashMap<u32, Handler<C>>,
}

impl<C> Default for Dispatcher<C> {
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }
}

impl<C> Dispatcher<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Re-registering a type id replaces the previous
    /// handler; returns true if one was replaced.
    pub fn register<F>(&mut self, type_id: u32, handler: F) -> bool
    where
        F: FnMut(&mut C, &Packet) -> Result<(), HandlerError> + Send + 'static,
    {
        self.handlers.insert(type_id, Box::new(handler)).is_some()
    }

    pub fn is_registered(&self, type_id: u32) -> bool {
        self.handlers.contains_key(&type_id)
    }

    /// Route a packet. Unknown types are not an error.
    pub fn dispatch(&mut self, ctx: &mut C, packet: &Packet) -> Result<Dispatched, HandlerError> {
        match self.handlers.get_mut(&packet.type_id) {
            Some(handler) => {
                handler(ctx, packet)?;
                Ok(Dispatched::Handled)
            }
            None => {
                debug!(
                    type_id = packet.type_id,
                    name = message_name(packet.type_id).unwrap_or("unknown"),
                    "dropping unhandled coordinator message"
                );
                Ok(Dispatched::Dropped)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<C> fmt::Debug for Dispatcher<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.handlers.keys().copied().collect();
        ids.sort_unstable();
        f.debug_struct("Dispatcher").field("type_ids", &ids).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        calls: Vec<&'static str>,
    }

    fn packet(type_id: u32) -> Packet {
        Packet::new(type_id, Vec::new())
    }

    #[test]
    fn test_dispatch_to_registered_handler() {
        let mut dispatcher = Dispatcher::<Counter>::new();
        dispatcher.register(1, |ctx, _| {
            ctx.calls.push("one");
            Ok(())
        });

        let mut ctx = Counter::default();
        assert_eq!(dispatcher.dispatch(&mut ctx, &packet(1)).unwrap(), Dispatched::Handled);
        assert_eq!(ctx.calls, vec!["one"]);
    }

    #[test]
    fn test_unknown_type_dropped() {
        let mut dispatcher = Dispatcher::<Counter>::new();
        let mut ctx = Counter::default();

        assert_eq!(dispatcher.dispatch(&mut ctx, &packet(99)).unwrap(), Dispatched::Dropped);
        assert!(ctx.calls.is_empty());
    }

    #[test]
    fn test_register_replaces() {
        let mut dispatcher = Dispatcher::<Counter>::new();
        assert!(!dispatcher.register(1, |ctx, _| {
            ctx.calls.push("old");
            Ok(())
        }));
        assert!(dispatcher.register(1, |ctx, _| {
            ctx.calls.push("new");
            Ok(())
        }));
        assert_eq!(dispatcher.len(), 1);

        let mut ctx = Counter::default();
        dispatcher.dispatch(&mut ctx, &packet(1)).unwrap();
        assert_eq!(ctx.calls, vec!["new"]);
    }

    #[test]
    fn test_handler_error_propagates() {
        let mut dispatcher = Dispatcher::<Counter>::new();
        dispatcher.register(1, |_, _| Err(HandlerError::Rejected("nope".to_string())));

        let mut ctx = Counter::default();
        let err = dispatcher.dispatch(&mut ctx, &packet(1)).unwrap_err();
        assert_eq!(err.to_string(), "coordinator reported failure: nope");

        // Table is still usable afterwards
        assert!(dispatcher.is_registered(1));
    }
}
